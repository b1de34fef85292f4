//! Shared types that mirror the wiktextract line-delimited JSON format.
//!
//! One [`DictionaryEntry`] is one line of a dump. The fields the quiz and the
//! batch tools reason about (`word`, `pos`, `senses`, `forms`, ...) are typed;
//! everything else is kept in `extra` so an untrimmed entry can be written
//! back out without losing keys.
//!
//! The tag policy lives here too: [`EXCLUDED_TAGS`] marks senses and forms
//! that are archaic, dated or only table scaffolding, and
//! [`DictionaryEntry::valid_declensions`] / [`DictionaryEntry::flatten_senses`]
//! apply it.
//!
//! ```rust
//! use declinare_types::{DictionaryEntry, Pos};
//!
//! let line = r#"{"word":"hus","lang_code":"sv","pos":"noun",
//!     "senses":[{"glosses":["house"]}],
//!     "forms":[{"form":"husen","source":"declension","tags":["definite","plural"]}]}"#;
//! let entry: DictionaryEntry = serde_json::from_str(line).unwrap();
//! assert_eq!(entry.stream(), Some(Pos::Noun));
//! assert_eq!(entry.valid_declensions()[0].text(), Some("husen"));
//! assert_eq!(entry.flatten_senses(), vec!["house"]);
//! ```

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Tags that disqualify a sense or a form.
pub const EXCLUDED_TAGS: [&str; 6] = [
    "table-tags",
    "inflection-template",
    "archaic",
    "dated",
    "obsolete",
    "alternative",
];

/// Form strings used as "no such form" markers in declension tables.
pub const PLACEHOLDER_FORMS: [&str; 2] = ["-", "—"];

/// Bare endings listed instead of a full word (e.g. Romanian `-ului`).
pub const SUFFIX_FRAGMENTS: [&str; 8] = ["e", "ei", "i", "ii", "le", "lor", "ul", "ului"];

/// The form `source` value produced by declension tables.
pub const DECLENSION_SOURCE: &str = "declension";

/// True when any tag is in [`EXCLUDED_TAGS`].
pub fn has_excluded_tag(tags: &[String]) -> bool {
    tags.iter().any(|t| EXCLUDED_TAGS.contains(&t.as_str()))
}

/// Read `null` the same as a missing key.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Part of speech for which per-POS output streams exist.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub enum Pos {
    Noun,
    Verb,
    Adj,
}

impl Pos {
    pub const ALL: [Pos; 3] = [Pos::Noun, Pos::Verb, Pos::Adj];

    /// Parse the wiktextract `pos` string. Other parts of speech have no stream.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "noun" => Some(Pos::Noun),
            "verb" => Some(Pos::Verb),
            "adj" => Some(Pos::Adj),
            _ => None,
        }
    }

    /// The `pos` string as it appears in the dump.
    pub fn as_str(self) -> &'static str {
        match self {
            Pos::Noun => "noun",
            Pos::Verb => "verb",
            Pos::Adj => "adj",
        }
    }

    /// Suffix used for per-POS output files (`sv_nouns.jsonl`).
    pub fn file_stem(self) -> &'static str {
        match self {
            Pos::Noun => "nouns",
            Pos::Verb => "verbs",
            Pos::Adj => "adjs",
        }
    }
}

impl fmt::Display for Pos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Script a language's headwords are expected to be written in.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Script {
    /// Rejects words containing Cyrillic-block characters.
    #[default]
    Latin,
    /// Rejects words containing ASCII letters.
    Cyrillic,
    Any,
}

impl Script {
    pub fn admits(self, word: &str) -> bool {
        match self {
            Script::Latin => !word.chars().any(is_cyrillic),
            Script::Cyrillic => !word.chars().any(|c| c.is_ascii_alphabetic()),
            Script::Any => true,
        }
    }
}

fn is_cyrillic(c: char) -> bool {
    ('\u{0400}'..='\u{04FF}').contains(&c)
}

/// A gloss group. `form_of` is present on senses that only point at a lemma.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct Sense {
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub glosses: Vec<String>,
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub form_of: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Sense {
    pub fn is_excluded(&self) -> bool {
        has_excluded_tag(&self.tags)
    }
}

/// An inflected surface string with its grammatical tags.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct Form {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub form: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub tags: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Form {
    /// The surface string, if present and not blank or a placeholder.
    pub fn text(&self) -> Option<&str> {
        self.form
            .as_deref()
            .filter(|f| !f.trim().is_empty() && !PLACEHOLDER_FORMS.contains(f))
    }

    pub fn is_excluded(&self) -> bool {
        has_excluded_tag(&self.tags)
    }

    /// Declension-table form with a usable surface string and clean tags.
    pub fn is_valid_declension(&self) -> bool {
        self.source.as_deref() == Some(DECLENSION_SOURCE)
            && self.text().is_some()
            && !self.is_excluded()
    }

    pub fn is_suffix_fragment(&self) -> bool {
        self.form
            .as_deref()
            .is_some_and(|f| SUFFIX_FRAGMENTS.contains(&f))
    }
}

/// One dictionary record (word + language + POS + etymology).
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct DictionaryEntry {
    #[serde(default, deserialize_with = "null_as_default")]
    pub word: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub lang_code: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub pos: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub etymology_number: Option<u32>,
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub senses: Vec<Sense>,
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub forms: Vec<Form>,
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub head_templates: Vec<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl DictionaryEntry {
    /// Output stream for this entry's POS, if any.
    pub fn stream(&self) -> Option<Pos> {
        Pos::parse(&self.pos)
    }

    /// Any sense carries a `form_of` pointer to another lemma.
    pub fn is_form_of(&self) -> bool {
        self.senses.iter().any(|s| s.form_of.is_some())
    }

    /// Every sense is excluded by tag. Entries without senses are not.
    pub fn all_senses_excluded(&self) -> bool {
        !self.senses.is_empty() && self.senses.iter().all(Sense::is_excluded)
    }

    /// At least one sense survives the tag filter.
    pub fn has_valid_sense(&self) -> bool {
        self.senses.iter().any(|s| !s.is_excluded())
    }

    /// Etymology 1 or no etymology number at all.
    pub fn is_primary_etymology(&self) -> bool {
        matches!(self.etymology_number, None | Some(1))
    }

    /// Forms usable as quiz answers, in their original order.
    ///
    /// An empty result means the entry cannot back a question.
    pub fn valid_declensions(&self) -> Vec<&Form> {
        self.forms
            .iter()
            .filter(|f| f.is_valid_declension())
            .collect()
    }

    /// Glosses of non-excluded senses, flattened in order.
    pub fn flatten_senses(&self) -> Vec<&str> {
        self.senses
            .iter()
            .filter(|s| !s.is_excluded())
            .flat_map(|s| s.glosses.iter().map(String::as_str))
            .collect()
    }
}
