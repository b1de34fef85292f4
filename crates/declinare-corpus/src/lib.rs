//! Read wiktextract dumps and derive the quiz data sets from them.
//!
//! A [`Corpus`] is a line-delimited JSON file held either memory-mapped or in
//! an owned buffer ([`LoadMode`]). On top of it:
//!
//! - [`filter`] splits a dump into per-POS files, optionally trimming each
//!   record down to the fields the quiz needs;
//! - [`topn`] selects the N most frequent nouns, merging inflected forms with
//!   their base word;
//! - [`sampler`] draws one random quiz-ready entry from a per-language file
//!   without loading it;
//! - [`config`] describes where each language's files live.
//!
//! # Example
//! ```no_run
//! use declinare_corpus::{Corpus, LoadMode};
//!
//! # fn main() -> anyhow::Result<()> {
//! let corpus = Corpus::open_with_mode("data/sv.jsonl", LoadMode::Mmap)?;
//! let nouns = corpus
//!     .entries()
//!     .filter_map(|(_, parsed)| parsed.ok())
//!     .filter(|e| e.pos == "noun")
//!     .count();
//! println!("{nouns} nouns");
//! # Ok(()) }
//! ```

pub mod config;
pub mod filter;
pub mod retry;
pub mod sampler;
pub mod topn;
pub mod wordlist;

use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use memmap2::Mmap;

use declinare_types::DictionaryEntry;

pub use config::{LanguageConfig, Languages, Tier};
pub use filter::{EntryFilter, FilterMode, FilterReport};
pub use sampler::{Sample, SampleError, Sampler};
pub use topn::{ExtractOptions, TopEntrySet};

/// Strategy for loading a corpus file.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum LoadMode {
    /// Memory-map the file (fast, zero-copy).
    #[default]
    Mmap,
    /// Read the file into an owned buffer (portable fallback).
    Owned,
}

enum Buffer {
    Mmap(Mmap),
    Owned(Vec<u8>),
}

impl Buffer {
    fn as_slice(&self) -> &[u8] {
        match self {
            Buffer::Mmap(m) => m.as_ref(),
            Buffer::Owned(v) => v.as_slice(),
        }
    }
}

/// A line-delimited JSON dump, one [`DictionaryEntry`] per line.
pub struct Corpus {
    path: PathBuf,
    buffer: Buffer,
}

impl Corpus {
    /// Open a corpus, memory-mapping it.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_mode(path, LoadMode::Mmap)
    }

    pub fn open_with_mode(path: impl AsRef<Path>, mode: LoadMode) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let buffer = load_file(&path, mode)?;
        Ok(Self { path, buffer })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Non-empty lines with any trailing `\r` removed.
    pub fn lines(&self) -> impl Iterator<Item = &[u8]> + '_ {
        self.buffer
            .as_slice()
            .split(|b| *b == b'\n')
            .map(strip_cr)
            .filter(|line| !line.is_empty())
    }

    /// Parse every line, paired with its 1-based position among non-empty lines.
    ///
    /// Malformed lines come back as `Err`; callers decide whether to skip.
    pub fn entries(
        &self,
    ) -> impl Iterator<Item = (usize, Result<DictionaryEntry, serde_json::Error>)> + '_ {
        self.lines()
            .enumerate()
            .map(|(idx, line)| (idx + 1, parse_entry(line)))
    }

    pub fn line_count(&self) -> usize {
        self.lines().count()
    }
}

pub fn parse_entry(line: &[u8]) -> Result<DictionaryEntry, serde_json::Error> {
    serde_json::from_slice(line)
}

/// Count the lines of a file without loading it, for the `lines` config keys.
pub fn count_lines(path: impl AsRef<Path>) -> Result<usize> {
    let path = path.as_ref();
    let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let mut reader = BufReader::new(file);
    let mut count = 0usize;
    let mut buf = Vec::new();
    loop {
        buf.clear();
        let read = reader
            .read_until(b'\n', &mut buf)
            .with_context(|| format!("read {}", path.display()))?;
        if read == 0 {
            break;
        }
        let line = buf.strip_suffix(b"\n").unwrap_or(&buf);
        if !strip_cr(line).is_empty() {
            count += 1;
        }
    }
    Ok(count)
}

fn load_file(path: &Path, mode: LoadMode) -> Result<Buffer> {
    let mut file = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let len = file
        .metadata()
        .with_context(|| format!("stat {}", path.display()))?
        .len();
    // Empty files cannot be mapped on every platform.
    if len == 0 {
        return Ok(Buffer::Owned(Vec::new()));
    }
    match mode {
        LoadMode::Mmap => unsafe { Mmap::map(&file) }
            .map(Buffer::Mmap)
            .with_context(|| format!("mmap {}", path.display())),
        LoadMode::Owned => {
            let mut buf = Vec::with_capacity(len as usize);
            file.read_to_end(&mut buf)
                .with_context(|| format!("read {}", path.display()))?;
            Ok(Buffer::Owned(buf))
        }
    }
}

fn strip_cr(line: &[u8]) -> &[u8] {
    if line.ends_with(b"\r") {
        &line[..line.len() - 1]
    } else {
        line
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_corpus(lines: &[&str]) -> NamedTempFile {
        let mut file = NamedTempFile::new().expect("temp file");
        for line in lines {
            writeln!(file, "{line}").unwrap();
        }
        file
    }

    #[test]
    fn iterates_lines_in_both_modes() {
        let file = write_corpus(&[
            r#"{"word":"hus","pos":"noun"}"#,
            "",
            "not json",
            r#"{"word":"bil","pos":"noun"}"#,
        ]);
        for mode in [LoadMode::Mmap, LoadMode::Owned] {
            let corpus = Corpus::open_with_mode(file.path(), mode).unwrap();
            assert_eq!(corpus.line_count(), 3);
            let parsed: Vec<_> = corpus.entries().collect();
            assert!(parsed[0].1.is_ok());
            assert_eq!(parsed[1].0, 2);
            assert!(parsed[1].1.is_err());
            assert_eq!(parsed[2].1.as_ref().unwrap().word, "bil");
        }
    }

    #[test]
    fn opens_empty_file() {
        let file = NamedTempFile::new().unwrap();
        let corpus = Corpus::open(file.path()).unwrap();
        assert_eq!(corpus.line_count(), 0);
        assert_eq!(count_lines(file.path()).unwrap(), 0);
    }

    #[test]
    fn counts_lines_with_crlf() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "a\r\nb\r\n\r\nc").unwrap();
        assert_eq!(count_lines(file.path()).unwrap(), 3);
    }

    #[test]
    fn missing_file_reports_path() {
        let err = Corpus::open("/nonexistent/declinare.jsonl").err().unwrap();
        assert!(format!("{err:#}").contains("/nonexistent/declinare.jsonl"));
    }
}
