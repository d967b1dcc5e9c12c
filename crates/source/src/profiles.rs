// ABOUTME: Source profiles: the selector set and capability flags of each scraped site section.
// ABOUTME: Built-in profiles are embedded JSON; a custom JSON file can replace them.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::compiled::compile_profile_selectors;
use crate::error::{Result, SourceError};

const BUILTIN_PROFILES_JSON: &str = include_str!("../data/source_profiles.json");

/// CSS selectors for one source. `None` means the source has no such level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectorSet {
    pub all: String,
    pub top: String,
    #[serde(default)]
    pub nested: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
}

impl SelectorSet {
    fn selectors(&self) -> impl Iterator<Item = &str> {
        [Some(self.all.as_str()), Some(self.top.as_str()), self.nested.as_deref(), self.date.as_deref()]
            .into_iter()
            .flatten()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceProfile {
    pub name: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    pub selectors: SelectorSet,
    /// Comments may hold a question and its answer in one block.
    #[serde(default)]
    pub qa_separable: bool,
    /// Records carry a link and an author (lawyer) name worth exporting.
    #[serde(default)]
    pub carries_author: bool,
}

/// Profiles by name.
#[derive(Debug, Clone, Default)]
pub struct ProfileRegistry {
    profiles: BTreeMap<String, SourceProfile>,
    aliases: BTreeMap<String, String>,
}

impl ProfileRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads the profiles shipped with the crate.
    pub fn load_builtin() -> Result<Self> {
        Self::from_json(BUILTIN_PROFILES_JSON)
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Parses a JSON array of profiles and compiles every selector up front.
    pub fn from_json(json: &str) -> Result<Self> {
        let profiles: Vec<SourceProfile> =
            serde_json::from_str(json).map_err(|e| SourceError::profiles(e.to_string()))?;
        let mut registry = Self::new();
        for profile in profiles {
            registry.register(profile)?;
        }
        Ok(registry)
    }

    pub fn register(&mut self, profile: SourceProfile) -> Result<()> {
        let invalid = compile_profile_selectors(profile.selectors.selectors());
        if !invalid.is_empty() {
            return Err(SourceError::profiles(format!(
                "profile `{}` has invalid selectors: {}",
                profile.name,
                invalid.join(", ")
            )));
        }
        for alias in &profile.aliases {
            self.aliases.insert(alias.clone(), profile.name.clone());
        }
        debug!(name = %profile.name, "registered source profile");
        self.profiles.insert(profile.name.clone(), profile);
        Ok(())
    }

    /// Looks a profile up by name or alias.
    pub fn get(&self, name: &str) -> Result<&SourceProfile> {
        let key = self.aliases.get(name).map(String::as_str).unwrap_or(name);
        self.profiles.get(key).ok_or_else(|| SourceError::UnknownProfile {
            name: name.to_string(),
            available: self.names().join(", "),
        })
    }

    pub fn names(&self) -> Vec<&str> {
        self.profiles.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn builtin_registry_has_all_sources() {
        let registry = ProfileRegistry::load_builtin().unwrap();
        assert_eq!(
            registry.names(),
            vec!["lawtalk_consult", "lawtalk_guide", "lawtalk_success", "naver_blog", "naver_cafe", "naver_kin"]
        );
    }

    #[test]
    fn only_naver_cafe_is_qa_separable() {
        let registry = ProfileRegistry::load_builtin().unwrap();
        for name in registry.names() {
            let profile = registry.get(name).unwrap();
            assert_eq!(profile.qa_separable, name == "naver_cafe", "{name}");
        }
    }

    #[test]
    fn lawtalk_profiles_have_no_nested_level() {
        let registry = ProfileRegistry::load_builtin().unwrap();
        let consult = registry.get("lawtalk_consult").unwrap();
        assert_eq!(consult.selectors.nested, None);
        assert_eq!(consult.selectors.date.as_deref(), Some(".answerDate"));
        assert!(consult.carries_author);
    }

    #[test]
    fn aliases_resolve_to_profiles() {
        let registry = ProfileRegistry::load_builtin().unwrap();
        assert_eq!(registry.get("lawtalk_상담사례").unwrap().name, "lawtalk_consult");
    }

    #[test]
    fn unknown_profile_lists_available_names() {
        let registry = ProfileRegistry::load_builtin().unwrap();
        let err = registry.get("daum_cafe").unwrap_err();
        assert!(err.is_unknown_profile());
        assert!(err.to_string().contains("naver_cafe"));
    }

    #[test]
    fn invalid_selector_is_rejected() {
        let json = r#"[{"name": "broken", "selectors": {"all": "(((", "top": "p"}}]"#;
        let err = ProfileRegistry::from_json(json).unwrap_err();
        assert!(matches!(err, SourceError::Profiles(_)));
    }

    #[test]
    fn profiles_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("profiles.json");
        fs::write(&path, r#"[{"name": "forum", "selectors": {"all": ".c", "top": ".c"}}]"#).unwrap();
        let registry = ProfileRegistry::from_path(&path).unwrap();
        let forum = registry.get("forum").unwrap();
        assert!(!forum.qa_separable);
        assert_eq!(forum.selectors.nested, None);
    }
}
