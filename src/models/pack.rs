use crate::models::resource_key::sanitize_id;
use serde::Deserialize;
use serde_json::Value;

/// Name of the per-pack metadata document at the pack root.
pub const PACK_METADATA_FILE: &str = "pack.mcmeta";

/// Optional icon at the pack root.
pub const PACK_ICON_FILE: &str = "pack.png";

/// Parsed `pack.mcmeta`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackMetadata {
    pub description: String,
    pub pack_format: i64,
}

#[derive(Deserialize)]
struct MetadataBody {
    description: Option<Value>,
    pack_format: Option<i64>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum MetadataDocument {
    Wrapped { pack: MetadataBody },
    Flat(MetadataBody),
}

impl PackMetadata {
    /// Parse either `{"pack": {...}}` or a flat `{description, pack_format}` object.
    ///
    /// `pack_format` is required. A missing description becomes
    /// `No description for <pack_id>`.
    pub fn parse(bytes: &[u8], pack_id: &str) -> Result<Self, String> {
        let document: MetadataDocument =
            serde_json::from_slice(bytes).map_err(|e| format!("invalid JSON: {}", e))?;
        let body = match document {
            MetadataDocument::Wrapped { pack } => pack,
            MetadataDocument::Flat(body) => body,
        };

        let pack_format = body
            .pack_format
            .ok_or_else(|| "missing 'pack_format'".to_string())?;

        let description = match body.description {
            Some(Value::String(text)) => text,
            // Text components: `{"text": "..."}`
            Some(Value::Object(map)) => match map.get("text") {
                Some(Value::String(text)) => text.clone(),
                _ => Value::Object(map).to_string(),
            },
            Some(Value::Null) | None => format!("No description for {}", pack_id),
            Some(other) => other.to_string(),
        };

        Ok(Self {
            description,
            pack_format,
        })
    }
}

/// Internal pack id for a pack root entry: lower-cased, sanitized, and with
/// `.zip` stripped for archives.
pub fn pack_id_from_file_name(file_name: &str, is_archive: bool) -> String {
    let stem = match file_name.len().checked_sub(4) {
        Some(split) if is_archive
            && file_name.is_char_boundary(split)
            && file_name[split..].eq_ignore_ascii_case(".zip") =>
        {
            &file_name[..split]
        }
        _ => file_name,
    };
    sanitize_id(stem)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_wrapped_metadata() {
        let meta =
            PackMetadata::parse(br#"{"pack": {"description": "Calm", "pack_format": 15}}"#, "p")
                .unwrap();
        assert_eq!(meta.description, "Calm");
        assert_eq!(meta.pack_format, 15);
    }

    #[test]
    fn test_parse_flat_metadata_and_default_description() {
        let meta = PackMetadata::parse(br#"{"pack_format": 12}"#, "alpha").unwrap();
        assert_eq!(meta.pack_format, 12);
        assert_eq!(meta.description, "No description for alpha");
    }

    #[test]
    fn test_parse_text_component_description() {
        let meta = PackMetadata::parse(
            br#"{"pack": {"description": {"text": "Boss themes"}, "pack_format": 15}}"#,
            "p",
        )
        .unwrap();
        assert_eq!(meta.description, "Boss themes");
    }

    #[test]
    fn test_missing_pack_format_rejected() {
        assert!(PackMetadata::parse(br#"{"pack": {"description": "x"}}"#, "p").is_err());
        assert!(PackMetadata::parse(b"not json", "p").is_err());
    }

    #[test]
    fn test_pack_id_from_file_name() {
        assert_eq!(pack_id_from_file_name("Epic Music.zip", true), "epic_music");
        assert_eq!(pack_id_from_file_name("Calm-Pack.ZIP", true), "calm-pack");
        assert_eq!(pack_id_from_file_name("Dir Pack", false), "dir_pack");
        assert_eq!(pack_id_from_file_name("odd.zip", false), "odd.zip");
    }
}
