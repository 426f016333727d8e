use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;
use thiserror::Error;

/// Namespace used when an identifier is written without one (`desert` → `minecraft:desert`).
pub const DEFAULT_NAMESPACE: &str = "minecraft";

static NAMESPACE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9_.-]+$").expect("Invalid namespace regex"));

static PATH_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9_./-]+$").expect("Invalid path regex"));

static KEY_SANITIZER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-z0-9_./-]").expect("Invalid key sanitizer regex"));

static ID_SANITIZER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-z0-9_.-]").expect("Invalid id sanitizer regex"));

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResourceKeyError {
    #[error("identifier is empty")]
    Empty,

    #[error("invalid namespace '{0}' (allowed: a-z 0-9 _ . -)")]
    InvalidNamespace(String),

    #[error("invalid path '{0}' (allowed: a-z 0-9 _ . / -)")]
    InvalidPath(String),
}

/// A `namespace:path` identifier for biomes, dimensions, entity types, blocks and tags.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ResourceKey {
    namespace: String,
    path: String,
}

impl ResourceKey {
    pub fn new(namespace: &str, path: &str) -> Result<Self, ResourceKeyError> {
        if !NAMESPACE_PATTERN.is_match(namespace) {
            return Err(ResourceKeyError::InvalidNamespace(namespace.to_string()));
        }
        if !PATH_PATTERN.is_match(path) {
            return Err(ResourceKeyError::InvalidPath(path.to_string()));
        }
        Ok(Self {
            namespace: namespace.to_string(),
            path: path.to_string(),
        })
    }

    /// Parse `ns:path` or bare `path` (which lands in [`DEFAULT_NAMESPACE`]).
    pub fn parse(raw: &str) -> Result<Self, ResourceKeyError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(ResourceKeyError::Empty);
        }
        match raw.split_once(':') {
            Some((namespace, path)) => Self::new(namespace, path),
            None => Self::new(DEFAULT_NAMESPACE, raw),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.namespace, self.path)
    }
}

impl FromStr for ResourceKey {
    type Err = ResourceKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for ResourceKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ResourceKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// Lower-case and replace anything outside `[a-z0-9_./-]` with `_`.
pub fn sanitize_key(raw: &str) -> String {
    KEY_SANITIZER
        .replace_all(&raw.to_lowercase(), "_")
        .into_owned()
}

/// Lower-case and replace anything outside `[a-z0-9_.-]` with `_`.
pub fn sanitize_id(raw: &str) -> String {
    ID_SANITIZER.replace_all(&raw.to_lowercase(), "_").into_owned()
}

pub fn is_valid_namespace(raw: &str) -> bool {
    NAMESPACE_PATTERN.is_match(raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_with_namespace() {
        let key = ResourceKey::parse("minecraft:desert").unwrap();
        assert_eq!(key.namespace(), "minecraft");
        assert_eq!(key.path(), "desert");
    }

    #[test]
    fn test_parse_defaults_namespace() {
        let key = ResourceKey::parse("plains").unwrap();
        assert_eq!(key.to_string(), "minecraft:plains");
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert_eq!(ResourceKey::parse("  "), Err(ResourceKeyError::Empty));
        assert!(matches!(
            ResourceKey::parse("Mod:desert"),
            Err(ResourceKeyError::InvalidNamespace(_))
        ));
        assert!(matches!(
            ResourceKey::parse("minecraft:Desert Hills"),
            Err(ResourceKeyError::InvalidPath(_))
        ));
    }

    #[test]
    fn test_sanitize_key() {
        assert_eq!(sanitize_key("Alpha/Music/Boss Fight!"), "alpha/music/boss_fight_");
        assert_eq!(sanitize_id("My Pack (v2)"), "my_pack__v2_");
    }
}
