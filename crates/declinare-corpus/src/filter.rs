//! Split a dump into per-POS files, optionally trimming each record.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info};

use declinare_types::{DictionaryEntry, Form, Pos, Script};

use crate::{Corpus, parse_entry};

/// Why an entry was left out of an output stream.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Error)]
pub enum Rejection {
    #[error("different language")]
    Language,
    #[error("part of speech has no output stream")]
    Pos,
    #[error("form-of reference")]
    FormOf,
    #[error("headword outside the language's script")]
    Script,
    #[error("every sense is excluded by tag")]
    ExcludedSenses,
    #[error("no forms survive the tag filter")]
    NoForms,
    #[error("no valid declension forms")]
    NoDeclensions,
}

/// Inclusion predicates for one language.
#[derive(Clone, Debug)]
pub struct EntryFilter {
    lang_code: String,
    script: Script,
}

impl EntryFilter {
    pub fn new(lang_code: impl Into<String>, script: Script) -> Self {
        Self {
            lang_code: lang_code.into(),
            script,
        }
    }

    pub fn lang_code(&self) -> &str {
        &self.lang_code
    }

    /// Decide which stream, if any, an entry belongs to.
    pub fn check(&self, entry: &DictionaryEntry) -> Result<Pos, Rejection> {
        if entry.lang_code != self.lang_code {
            return Err(Rejection::Language);
        }
        let pos = entry.stream().ok_or(Rejection::Pos)?;
        if entry.is_form_of() {
            return Err(Rejection::FormOf);
        }
        if !self.script.admits(&entry.word) {
            return Err(Rejection::Script);
        }
        if entry.all_senses_excluded() {
            return Err(Rejection::ExcludedSenses);
        }
        Ok(pos)
    }

    /// A noun that can back a quiz question, with its usable forms.
    pub fn check_quiz_noun<'a>(
        &self,
        entry: &'a DictionaryEntry,
    ) -> Result<Vec<&'a Form>, Rejection> {
        if self.check(entry)? != Pos::Noun {
            return Err(Rejection::Pos);
        }
        let declensions = entry.valid_declensions();
        if declensions.is_empty() {
            return Err(Rejection::NoDeclensions);
        }
        Ok(declensions)
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum FilterMode {
    /// Copy the input line of each qualifying entry byte for byte.
    #[default]
    Split,
    /// Keep only the fields the quiz reads, dropping excluded forms.
    Trim,
}

/// Reduced record written in [`FilterMode::Trim`].
#[derive(Debug, Serialize)]
pub struct TrimmedEntry<'a> {
    pub word: &'a str,
    pub lang_code: &'a str,
    pub pos: &'a str,
    pub forms: Vec<&'a Form>,
    pub head_templates: &'a [Value],
    pub senses: Vec<TrimmedSense<'a>>,
}

#[derive(Debug, Serialize)]
pub struct TrimmedSense<'a> {
    pub glosses: &'a [String],
}

/// Trim an entry; `None` when no form survives.
pub fn trim(entry: &DictionaryEntry) -> Option<TrimmedEntry<'_>> {
    let forms: Vec<&Form> = entry.forms.iter().filter(|f| !f.is_excluded()).collect();
    if forms.is_empty() {
        return None;
    }
    let senses = entry
        .senses
        .iter()
        .filter(|s| !s.is_excluded() && !s.glosses.is_empty())
        .map(|s| TrimmedSense {
            glosses: &s.glosses,
        })
        .collect();
    Some(TrimmedEntry {
        word: &entry.word,
        lang_code: &entry.lang_code,
        pos: &entry.pos,
        forms,
        head_templates: &entry.head_templates,
        senses,
    })
}

/// One writer per output stream.
pub struct PosSinks<W: Write> {
    sinks: BTreeMap<Pos, W>,
}

impl<W: Write> PosSinks<W> {
    pub fn new(mut make: impl FnMut(Pos) -> W) -> Self {
        Self {
            sinks: Pos::ALL.into_iter().map(|pos| (pos, make(pos))).collect(),
        }
    }

    fn write_record<T: Serialize>(&mut self, pos: Pos, record: &T) -> Result<()> {
        let Some(sink) = self.sinks.get_mut(&pos) else {
            return Ok(());
        };
        serde_json::to_writer(&mut *sink, record)?;
        sink.write_all(b"\n")?;
        Ok(())
    }

    /// Write one input line as-is, newline-terminated.
    pub fn write_raw(&mut self, pos: Pos, line: &[u8]) -> Result<()> {
        let Some(sink) = self.sinks.get_mut(&pos) else {
            return Ok(());
        };
        sink.write_all(line)?;
        sink.write_all(b"\n")?;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        for sink in self.sinks.values_mut() {
            sink.flush()?;
        }
        Ok(())
    }

    pub fn into_inner(self) -> BTreeMap<Pos, W> {
        self.sinks
    }
}

impl PosSinks<BufWriter<File>> {
    /// Create (or truncate) `<out_dir>/<lang>_<stem>.jsonl` for every stream.
    pub fn create(out_dir: &Path, lang_code: &str) -> Result<Self> {
        fs::create_dir_all(out_dir)
            .with_context(|| format!("create output dir {}", out_dir.display()))?;
        let mut sinks = BTreeMap::new();
        for pos in Pos::ALL {
            let path = output_path(out_dir, lang_code, pos);
            let file =
                File::create(&path).with_context(|| format!("create {}", path.display()))?;
            sinks.insert(pos, BufWriter::new(file));
        }
        Ok(Self { sinks })
    }
}

pub fn output_path(out_dir: &Path, lang_code: &str, pos: Pos) -> PathBuf {
    out_dir.join(format!("{lang_code}_{}.jsonl", pos.file_stem()))
}

/// Counters for one filter run.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FilterReport {
    pub lines: usize,
    pub malformed: usize,
    pub rejected: usize,
    pub written: BTreeMap<Pos, usize>,
}

impl FilterReport {
    pub fn written_total(&self) -> usize {
        self.written.values().sum()
    }
}

/// Stream every entry of `corpus` through `filter` into `sinks`.
pub fn run<W: Write>(
    corpus: &Corpus,
    filter: &EntryFilter,
    mode: FilterMode,
    sinks: &mut PosSinks<W>,
) -> Result<FilterReport> {
    let mut report = FilterReport::default();
    for (idx, line) in corpus.lines().enumerate() {
        let lineno = idx + 1;
        report.lines += 1;
        let entry = match parse_entry(line) {
            Ok(entry) => entry,
            Err(err) => {
                debug!("{}:{lineno} skipped malformed line: {err}", corpus.path().display());
                report.malformed += 1;
                continue;
            }
        };
        let pos = match filter.check(&entry) {
            Ok(pos) => pos,
            Err(_) => {
                report.rejected += 1;
                continue;
            }
        };
        match mode {
            FilterMode::Split => sinks.write_raw(pos, line)?,
            FilterMode::Trim => match trim(&entry) {
                Some(trimmed) => sinks.write_record(pos, &trimmed)?,
                None => {
                    debug!("dropped {:?}: {}", entry.word, Rejection::NoForms);
                    report.rejected += 1;
                    continue;
                }
            },
        }
        *report.written.entry(pos).or_default() += 1;
    }
    sinks.flush()?;
    info!(
        "{}: {} lines, {} written ({} nouns, {} verbs, {} adjs), {} rejected, {} malformed",
        corpus.path().display(),
        report.lines,
        report.written_total(),
        report.written.get(&Pos::Noun).copied().unwrap_or(0),
        report.written.get(&Pos::Verb).copied().unwrap_or(0),
        report.written.get(&Pos::Adj).copied().unwrap_or(0),
        report.rejected,
        report.malformed
    );
    Ok(report)
}
