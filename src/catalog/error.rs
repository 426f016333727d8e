use thiserror::Error;

/// Problems found while discovering packs.
///
/// Most of these are recovered from: the offending pack or rule file is
/// skipped, the error is logged and collected into the [`DiscoveryReport`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CatalogError {
    #[error("pack '{pack}' skipped: {message}")]
    Config { pack: String, message: String },

    #[error("rule '{file}' in pack '{pack}' skipped: {reason}")]
    Definition {
        pack: String,
        file: String,
        reason: String,
    },

    #[error("rule '{file}' in pack '{pack}' skipped: audio '{audio}' not found")]
    ResourceMissing {
        pack: String,
        file: String,
        audio: String,
    },

    #[error(
        "rule '{file}' in pack '{pack}' skipped: track key '{track_key}' already registered by pack '{existing_pack}'"
    )]
    ResourceIdCollision {
        pack: String,
        file: String,
        track_key: String,
        existing_pack: String,
    },

    #[error("I/O error in '{pack}': {message}")]
    Io { pack: String, message: String },

    #[error("failed to persist active packs to {path}: {message}")]
    Activation { path: String, message: String },
}

impl CatalogError {
    /// Pack the error is attributed to, if any.
    pub fn pack(&self) -> Option<&str> {
        match self {
            Self::Config { pack, .. }
            | Self::Definition { pack, .. }
            | Self::ResourceMissing { pack, .. }
            | Self::ResourceIdCollision { pack, .. }
            | Self::Io { pack, .. } => Some(pack),
            Self::Activation { .. } => None,
        }
    }
}

/// Outcome of one `discover()` run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DiscoveryReport {
    pub revision: u64,
    pub packs_loaded: usize,
    pub tracks_loaded: usize,
    pub diagnostics: Vec<CatalogError>,
}

impl DiscoveryReport {
    pub fn has_errors(&self) -> bool {
        !self.diagnostics.is_empty()
    }

    /// Diagnostics attributed to one pack.
    pub fn diagnostics_for<'a>(&'a self, pack: &'a str) -> impl Iterator<Item = &'a CatalogError> {
        self.diagnostics
            .iter()
            .filter(move |d| d.pack() == Some(pack))
    }
}
