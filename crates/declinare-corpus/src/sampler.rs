//! Draw one quiz-ready noun from a per-language file.
//!
//! Each attempt picks a uniform line index, streams the file up to that line
//! and tests the entry. Nothing is kept in memory between attempts.

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rand::Rng;
use thiserror::Error;
use tracing::{debug, warn};

use declinare_types::{DictionaryEntry, Form};

use crate::config::{Languages, Tier};
use crate::filter::{EntryFilter, Rejection};
use crate::retry;

pub const DEFAULT_MAX_ATTEMPTS: usize = 50;

/// Why a single attempt did not yield an entry.
#[derive(Debug, Error)]
pub enum AttemptFailure {
    #[error("no lines to sample")]
    EmptySource,
    #[error("read {path}: {source}")]
    Io { path: PathBuf, source: io::Error },
    #[error("line {0} is past the end of the file")]
    PastEnd(usize),
    #[error("line {line}: {source}")]
    Parse {
        line: usize,
        source: serde_json::Error,
    },
    #[error("{word:?} rejected: {reason}")]
    Rejected { word: String, reason: Rejection },
}

#[derive(Debug, Error)]
pub enum SampleError {
    #[error("unknown language {0:?}")]
    UnknownLanguage(String),
    #[error("language {0:?} has no file for the top tier")]
    MissingTier(String),
    #[error("no valid entry found after {attempts} attempts")]
    Exhausted {
        attempts: usize,
        last: Option<AttemptFailure>,
    },
}

/// A sampled entry with the forms a question can ask for.
#[derive(Clone, Debug, PartialEq)]
pub struct Sample {
    pub entry: DictionaryEntry,
    pub declensions: Vec<Form>,
    /// Attempts used, 1-based.
    pub attempts: usize,
}

#[derive(Clone, Debug)]
pub struct Sampler {
    languages: Arc<Languages>,
    max_attempts: usize,
}

impl Sampler {
    pub fn new(languages: Arc<Languages>) -> Self {
        Self {
            languages,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: usize) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn max_attempts(&self) -> usize {
        self.max_attempts
    }

    pub fn languages(&self) -> &Languages {
        &self.languages
    }

    pub fn sample<R: Rng + ?Sized>(
        &self,
        lang_code: &str,
        tier: Tier,
        rng: &mut R,
    ) -> Result<Sample, SampleError> {
        let lang = self
            .languages
            .get(lang_code)
            .ok_or_else(|| SampleError::UnknownLanguage(lang_code.to_string()))?;
        let (path, total) = lang
            .source(tier)
            .ok_or_else(|| SampleError::MissingTier(lang_code.to_string()))?;
        let filter = EntryFilter::new(lang_code, lang.script);

        let outcome = retry::bounded(self.max_attempts, |n| {
            attempt(path, total, &filter, &mut *rng).inspect_err(|err| {
                debug!("sampling {lang_code} attempt {n} failed: {err}");
            })
        });
        match outcome {
            Ok(found) => {
                let (entry, declensions) = found.value;
                Ok(Sample {
                    entry,
                    declensions,
                    attempts: found.attempts,
                })
            }
            Err(exhausted) => {
                warn!(
                    "failed to find valid {lang_code} entry in {} after {} attempts",
                    path.display(),
                    exhausted.attempts
                );
                Err(SampleError::Exhausted {
                    attempts: exhausted.attempts,
                    last: exhausted.last,
                })
            }
        }
    }
}

fn attempt<R: Rng + ?Sized>(
    path: &Path,
    total: usize,
    filter: &EntryFilter,
    rng: &mut R,
) -> Result<(DictionaryEntry, Vec<Form>), AttemptFailure> {
    if total == 0 {
        return Err(AttemptFailure::EmptySource);
    }
    let line_num = rng.gen_range(0..total);
    let line = read_line(path, line_num)?;
    let entry: DictionaryEntry =
        serde_json::from_str(&line).map_err(|source| AttemptFailure::Parse {
            line: line_num + 1,
            source,
        })?;
    let declensions = match filter.check_quiz_noun(&entry) {
        Ok(forms) => forms.into_iter().cloned().collect(),
        Err(reason) => {
            return Err(AttemptFailure::Rejected {
                word: entry.word,
                reason,
            });
        }
    };
    Ok((entry, declensions))
}

/// Read the 0-based non-blank line `index`, scanning from the start of the file.
///
/// Blank lines are skipped so indices agree with [`count_lines`](crate::count_lines).
pub fn read_line(path: &Path, index: usize) -> Result<String, AttemptFailure> {
    let io_err = |source| AttemptFailure::Io {
        path: path.to_path_buf(),
        source,
    };
    let file = File::open(path).map_err(io_err)?;
    let mut lines = BufReader::new(file).lines().filter(|line| {
        line.as_ref()
            .map_or(true, |text| !text.trim_end_matches('\r').is_empty())
    });
    match lines.nth(index) {
        Some(line) => line.map_err(io_err),
        None => Err(AttemptFailure::PastEnd(index + 1)),
    }
}
