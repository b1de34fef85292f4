use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use declinare_types::Script;

pub const DEFAULT_TOP_LINES: usize = 500;

/// Which noun list a quiz question is drawn from.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
pub enum Tier {
    #[default]
    Full,
    /// The frequency-ranked top list.
    Top,
}

/// Where one language's quiz files live and how many lines they hold.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct LanguageConfig {
    /// Display name, also the Wiktionary section anchor.
    pub name: String,
    pub path: PathBuf,
    pub lines: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_path: Option<PathBuf>,
    #[serde(default = "default_top_lines")]
    pub top_lines: usize,
    #[serde(default)]
    pub script: Script,
}

fn default_top_lines() -> usize {
    DEFAULT_TOP_LINES
}

impl LanguageConfig {
    /// File and line count for a tier. `None` when the tier has no file.
    pub fn source(&self, tier: Tier) -> Option<(&Path, usize)> {
        match tier {
            Tier::Full => Some((self.path.as_path(), self.lines)),
            Tier::Top => self
                .top_path
                .as_deref()
                .map(|path| (path, self.top_lines)),
        }
    }

    /// Wiktionary anchor for this language (`Serbo-Croatian`, `Old_English`).
    pub fn anchor(&self) -> String {
        self.name.replace(' ', "_")
    }

    fn rebase(&mut self, root: &Path) {
        if self.path.is_relative() {
            self.path = root.join(&self.path);
        }
        if let Some(top) = self.top_path.as_mut()
            && top.is_relative()
        {
            *top = root.join(&*top);
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("syntax error in language config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("no languages configured")]
    Empty,
    #[error("default language {0:?} is not configured")]
    UnknownDefault(String),
}

#[derive(Deserialize)]
struct LanguagesFile {
    default: String,
    languages: BTreeMap<String, LanguageConfig>,
}

/// Immutable language table shared by the sampler and the web layer.
#[derive(Clone, Debug, PartialEq)]
pub struct Languages {
    default: String,
    languages: BTreeMap<String, LanguageConfig>,
}

impl Languages {
    pub fn new(
        default: impl Into<String>,
        languages: BTreeMap<String, LanguageConfig>,
    ) -> Result<Self, ConfigError> {
        let default = default.into();
        if languages.is_empty() {
            return Err(ConfigError::Empty);
        }
        if !languages.contains_key(&default) {
            return Err(ConfigError::UnknownDefault(default));
        }
        Ok(Self { default, languages })
    }

    /// Swedish, Romanian and Serbo-Croatian under `data/`.
    pub fn builtin() -> Self {
        let entry = |name: &str, code: &str, lines: usize| LanguageConfig {
            name: name.to_string(),
            path: PathBuf::from(format!("data/{code}_nouns.jsonl")),
            lines,
            top_path: Some(PathBuf::from(format!("data/{code}_nouns_top500.jsonl"))),
            top_lines: DEFAULT_TOP_LINES,
            script: Script::Latin,
        };
        let languages = BTreeMap::from([
            ("sv".to_string(), entry("Swedish", "sv", 37484)),
            ("ro".to_string(), entry("Romanian", "ro", 55167)),
            ("sh".to_string(), entry("Serbo-Croatian", "sh", 16107)),
        ]);
        Self {
            default: "sv".to_string(),
            languages,
        }
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let file: LanguagesFile = toml::from_str(raw)?;
        Self::new(file.default, file.languages)
    }

    /// Load a TOML language table. Relative paths are taken from the file's
    /// directory.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .with_context(|| format!("read language config {}", path.display()))?;
        let mut languages = Self::from_toml_str(&raw)
            .with_context(|| format!("parse language config {}", path.display()))?;
        if let Some(root) = path.parent() {
            languages.rebase(root);
        }
        Ok(languages)
    }

    fn rebase(&mut self, root: &Path) {
        for lang in self.languages.values_mut() {
            lang.rebase(root);
        }
    }

    pub fn default_code(&self) -> &str {
        &self.default
    }

    pub fn get(&self, code: &str) -> Option<&LanguageConfig> {
        self.languages.get(code)
    }

    /// Look up a language, falling back to the default for unknown codes.
    pub fn resolve<'a>(&'a self, code: Option<&'a str>) -> (&'a str, &'a LanguageConfig) {
        if let Some(code) = code
            && let Some((key, lang)) = self.languages.get_key_value(code)
        {
            return (key.as_str(), lang);
        }
        let (key, lang) = self
            .languages
            .get_key_value(&self.default)
            .expect("default language checked at construction");
        (key.as_str(), lang)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &LanguageConfig)> {
        self.languages.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.languages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.languages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
default = "ro"

[languages.ro]
name = "Romanian"
path = "ro_nouns.jsonl"
lines = 12

[languages.sh]
name = "Serbo-Croatian"
path = "/srv/sh_nouns.jsonl"
lines = 3
top_path = "sh_top.jsonl"
top_lines = 2
script = "any"
"#;

    #[test]
    fn parses_toml_with_defaults() {
        let langs = Languages::from_toml_str(SAMPLE).unwrap();
        assert_eq!(langs.default_code(), "ro");
        let ro = langs.get("ro").unwrap();
        assert_eq!(ro.top_lines, DEFAULT_TOP_LINES);
        assert_eq!(ro.script, Script::Latin);
        assert!(ro.source(Tier::Top).is_none());
        let sh = langs.get("sh").unwrap();
        assert_eq!(sh.script, Script::Any);
        assert_eq!(sh.source(Tier::Top).unwrap().1, 2);
        assert_eq!(sh.anchor(), "Serbo-Croatian");
    }

    #[test]
    fn rejects_unknown_default() {
        let raw = SAMPLE.replace("default = \"ro\"", "default = \"de\"");
        assert!(matches!(
            Languages::from_toml_str(&raw),
            Err(ConfigError::UnknownDefault(code)) if code == "de"
        ));
        assert!(matches!(
            Languages::from_toml_str("default = \"x\"\n[languages]\n"),
            Err(ConfigError::Empty)
        ));
    }

    #[test]
    fn resolve_falls_back_to_default() {
        let langs = Languages::builtin();
        assert_eq!(langs.resolve(Some("ro")).0, "ro");
        assert_eq!(langs.resolve(Some("xx")).0, "sv");
        assert_eq!(langs.resolve(None).1.name, "Swedish");
    }

    #[test]
    fn load_rebases_relative_paths() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("languages.toml");
        fs::write(&path, SAMPLE).unwrap();
        let langs = Languages::load(&path).unwrap();
        assert_eq!(langs.get("ro").unwrap().path, dir.path().join("ro_nouns.jsonl"));
        assert_eq!(
            langs.get("sh").unwrap().path,
            PathBuf::from("/srv/sh_nouns.jsonl")
        );
        assert_eq!(
            langs.get("sh").unwrap().top_path.as_deref(),
            Some(dir.path().join("sh_top.jsonl").as_path())
        );
    }
}
