//! Plain-text word lists: the extraction blacklist and the frequency ranking.
//!
//! Both are one word per line. Blank lines and `#` comments are ignored. A
//! missing file is an empty list, never an error.

use std::collections::HashSet;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use anyhow::{Context, Result};
use tracing::{info, warn};

/// Surface words that must never be picked by the top-N extractor.
pub fn load_blacklist(path: impl AsRef<Path>) -> Result<HashSet<String>> {
    let path = path.as_ref();
    let Some(reader) = open_optional(path)? else {
        warn!("blacklist {} not found, using an empty one", path.display());
        return Ok(HashSet::new());
    };
    let words = read_words(reader, path)?.into_iter().collect::<HashSet<_>>();
    info!("loaded {} blacklisted words from {}", words.len(), path.display());
    Ok(words)
}

/// Words in rank order, most frequent first.
///
/// Only the first whitespace-separated token of a line is used, so
/// `word<TAB>count` exports work unchanged. Repeats keep their first rank.
pub fn load_frequency_list(path: impl AsRef<Path>) -> Result<Vec<String>> {
    let path = path.as_ref();
    let Some(reader) = open_optional(path)? else {
        warn!("frequency list {} not found, nothing to rank", path.display());
        return Ok(Vec::new());
    };
    let mut seen = HashSet::new();
    let ranked: Vec<String> = read_words(reader, path)?
        .into_iter()
        .filter(|w| seen.insert(w.clone()))
        .collect();
    info!("loaded {} ranked words from {}", ranked.len(), path.display());
    Ok(ranked)
}

fn open_optional(path: &Path) -> Result<Option<BufReader<File>>> {
    if !path.exists() {
        return Ok(None);
    }
    let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
    Ok(Some(BufReader::new(file)))
}

fn read_words(reader: impl BufRead, path: &Path) -> Result<Vec<String>> {
    let mut words = Vec::new();
    for (lineno, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("read line {} in {}", lineno + 1, path.display()))?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        if let Some(word) = trimmed.split_whitespace().next() {
            words.push(word.to_string());
        }
    }
    Ok(words)
}
