//! Select the N most frequent nouns of a corpus.
//!
//! Inflected forms count towards their base word: a ranked word like `husen`
//! reaches the entry for `hus` through the [`SurfaceIndex`]. The first entry
//! reached in rank order wins and each base word is accepted once.
//!
//! Surface words shared with a different part of speech or etymology are
//! checked against the [`AmbiguityIndex`] so that e.g. a frequent verb form
//! does not promote a rare homographic noun.

use std::collections::{HashMap, HashSet};
use std::io::{self, Write};

use tracing::{debug, info};

use declinare_types::DictionaryEntry;

use crate::Corpus;

pub const DEFAULT_LIMIT: usize = 500;

pub type EntryId = usize;

/// Multimap from surface string to the entries reachable through it.
///
/// The index owns the entries; ids are positions in insertion order and
/// every id list keeps insertion order.
#[derive(Debug, Default)]
pub struct SurfaceIndex {
    entries: Vec<DictionaryEntry>,
    by_surface: HashMap<String, Vec<EntryId>>,
}

impl SurfaceIndex {
    pub fn insert<I, S>(&mut self, entry: DictionaryEntry, surfaces: I) -> EntryId
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let id = self.entries.len();
        self.entries.push(entry);
        for surface in surfaces {
            let ids = self.by_surface.entry(surface.into()).or_default();
            if ids.last() != Some(&id) {
                ids.push(id);
            }
        }
        id
    }

    pub fn lookup(&self, surface: &str) -> &[EntryId] {
        self.by_surface
            .get(surface)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn entry(&self, id: EntryId) -> Option<&DictionaryEntry> {
        self.entries.get(id)
    }

    /// The first entry indexed under `surface`.
    pub fn first(&self, surface: &str) -> Option<&DictionaryEntry> {
        self.lookup(surface)
            .first()
            .and_then(|id| self.entry(*id))
    }

    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    pub fn surface_count(&self) -> usize {
        self.by_surface.len()
    }
}

/// Surface word → every `(pos, etymology_number)` it is recorded under.
#[derive(Debug, Default)]
pub struct AmbiguityIndex {
    senses: HashMap<String, HashSet<(String, u32)>>,
}

impl AmbiguityIndex {
    pub fn insert(&mut self, word: &str, pos: &str, etymology: u32) {
        self.senses
            .entry(word.to_string())
            .or_default()
            .insert((pos.to_string(), etymology));
    }

    pub fn get(&self, word: &str) -> Option<&HashSet<(String, u32)>> {
        self.senses.get(word)
    }

    /// Unknown words, or words whose recorded senses include noun etymology 1.
    pub fn admits_primary_noun(&self, word: &str) -> bool {
        match self.senses.get(word) {
            None => true,
            Some(set) => set.is_empty() || set.contains(&("noun".to_string(), 1)),
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ExtractOptions {
    pub limit: usize,
    /// Only index entries of this language. `None` trusts the dump to be
    /// single-language.
    pub lang_code: Option<String>,
    /// Let form-of entries register their `(pos, etymology)` for the
    /// ambiguity check.
    pub count_form_of: bool,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIMIT,
            lang_code: None,
            count_form_of: false,
        }
    }
}

/// One accepted entry and the ranked word it was reached through.
#[derive(Clone, Debug, PartialEq)]
pub struct Accepted {
    pub entry: DictionaryEntry,
    pub via: String,
    /// 0-based position of `via` in the ranked list.
    pub rank: usize,
}

/// Deduplicated, rank-ordered result of an extraction.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TopEntrySet {
    accepted: Vec<Accepted>,
}

impl TopEntrySet {
    pub fn len(&self) -> usize {
        self.accepted.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accepted.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Accepted> {
        self.accepted.iter()
    }

    pub fn words(&self) -> Vec<&str> {
        self.accepted.iter().map(|a| a.entry.word.as_str()).collect()
    }

    /// Write one entry per line, in acceptance order.
    pub fn write_jsonl<W: Write>(&self, mut out: W) -> io::Result<()> {
        for accepted in &self.accepted {
            serde_json::to_writer(&mut out, &accepted.entry)?;
            out.write_all(b"\n")?;
        }
        out.flush()
    }
}

/// Index nouns of etymology 1 (or none) with a usable sense and declension,
/// keyed by their base word and every valid inflection.
pub fn build_surface_index(
    corpus: &Corpus,
    blacklist: &HashSet<String>,
    lang_code: Option<&str>,
) -> SurfaceIndex {
    let mut index = SurfaceIndex::default();
    for (lineno, parsed) in corpus.entries() {
        let entry = match parsed {
            Ok(entry) => entry,
            Err(err) => {
                debug!("{}:{lineno} skipped malformed line: {err}", corpus.path().display());
                continue;
            }
        };
        if lang_code.is_some_and(|code| entry.lang_code != code) {
            continue;
        }
        if !entry.is_primary_etymology() || entry.pos != "noun" || !entry.has_valid_sense() {
            continue;
        }
        if entry.word.is_empty() || blacklist.contains(&entry.word) {
            continue;
        }
        let forms: Vec<String> = entry
            .valid_declensions()
            .into_iter()
            .filter(|f| !f.is_suffix_fragment())
            .filter_map(|f| f.text().map(str::to_string))
            .collect();
        if forms.is_empty() {
            continue;
        }
        debug!("indexing {} and {} forms", entry.word, forms.len());
        let base = entry.word.clone();
        index.insert(entry, std::iter::once(base).chain(forms));
    }
    info!(
        "indexed {} nouns under {} surface forms",
        index.entry_count(),
        index.surface_count()
    );
    index
}

/// Record `(pos, etymology)` for every entry that carries an etymology number.
pub fn build_ambiguity_index(corpus: &Corpus, count_form_of: bool) -> AmbiguityIndex {
    let mut index = AmbiguityIndex::default();
    for (_, parsed) in corpus.entries() {
        let Ok(entry) = parsed else {
            continue;
        };
        let Some(etymology) = entry.etymology_number else {
            continue;
        };
        if entry.word.is_empty() || entry.pos.is_empty() {
            continue;
        }
        if !count_form_of && entry.is_form_of() {
            continue;
        }
        index.insert(&entry.word, &entry.pos, etymology);
    }
    index
}

/// Walk `ranked` in order and accept up to `limit` distinct base words.
pub fn select_top<I, S>(
    surfaces: &SurfaceIndex,
    ambiguity: &AmbiguityIndex,
    ranked: I,
    blacklist: &HashSet<String>,
    limit: usize,
) -> TopEntrySet
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen_base_words: HashSet<&str> = HashSet::new();
    let mut accepted = Vec::new();

    for (rank, word) in ranked.into_iter().enumerate() {
        if accepted.len() >= limit {
            break;
        }
        let word = word.as_ref();
        if blacklist.contains(word) {
            continue;
        }
        let candidates = surfaces.lookup(word);
        if candidates.len() > 1 {
            debug!("{word} reaches {} entries, taking the first", candidates.len());
        }
        let Some(entry) = surfaces.first(word) else {
            continue;
        };
        let base = entry.word.as_str();
        if seen_base_words.contains(base) {
            debug!("already accepted {base} (via {word})");
            continue;
        }
        if !ambiguity.admits_primary_noun(base) || !ambiguity.admits_primary_noun(word) {
            debug!(
                "ambiguous {base}/{word}: {:?} and {:?}",
                ambiguity.get(base),
                ambiguity.get(word)
            );
            continue;
        }
        debug!("accepting {base} (via {word})");
        seen_base_words.insert(base);
        accepted.push(Accepted {
            entry: entry.clone(),
            via: word.to_string(),
            rank,
        });
    }

    TopEntrySet { accepted }
}

/// Build both indices over `corpus` and select the top entries.
pub fn extract<I, S>(
    corpus: &Corpus,
    ranked: I,
    blacklist: &HashSet<String>,
    options: &ExtractOptions,
) -> TopEntrySet
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let surfaces = build_surface_index(corpus, blacklist, options.lang_code.as_deref());
    let ambiguity = build_ambiguity_index(corpus, options.count_form_of);
    let top = select_top(&surfaces, &ambiguity, ranked, blacklist, options.limit);
    info!(
        "selected {} of at most {} entries from {}",
        top.len(),
        options.limit,
        corpus.path().display()
    );
    top
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn surface_index_keeps_insertion_order_without_repeats() {
        let mut index = SurfaceIndex::default();
        let a = index.insert(
            DictionaryEntry {
                word: "hus".into(),
                ..DictionaryEntry::default()
            },
            ["hus", "huset", "hus"],
        );
        let b = index.insert(
            DictionaryEntry {
                word: "huset".into(),
                ..DictionaryEntry::default()
            },
            ["huset"],
        );
        assert_eq!(index.lookup("hus"), &[a]);
        assert_eq!(index.lookup("huset"), &[a, b]);
        assert_eq!(index.first("huset").unwrap().word, "hus");
        assert!(index.lookup("bil").is_empty());
        assert_eq!(index.surface_count(), 2);
    }

    #[test]
    fn ambiguity_admits_unknown_and_primary_nouns() {
        let mut index = AmbiguityIndex::default();
        index.insert("val", "noun", 1);
        index.insert("val", "noun", 2);
        index.insert("var", "verb", 1);
        index.insert("var", "noun", 2);
        assert!(index.admits_primary_noun("val"));
        assert!(!index.admits_primary_noun("var"));
        assert!(index.admits_primary_noun("hus"));
    }

    #[test]
    fn limit_zero_selects_nothing() {
        let mut surfaces = SurfaceIndex::default();
        surfaces.insert(
            DictionaryEntry {
                word: "hus".into(),
                ..DictionaryEntry::default()
            },
            ["hus"],
        );
        let top = select_top(
            &surfaces,
            &AmbiguityIndex::default(),
            ["hus"],
            &HashSet::new(),
            0,
        );
        assert!(top.is_empty());
    }
}
