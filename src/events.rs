// Catalog change events
//
// Emitted on a tokio broadcast channel by the PackCatalog. The provider uses
// them to invalidate its generated manifest; hosts may use them to refresh UI.

/// Change events emitted after the catalog or the active selection changes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CatalogChange {
    /// A discovery run replaced the catalog generation
    Reloaded {
        revision: u64,
        packs: usize,
        tracks: usize,
    },

    /// The ordered list of enabled packs was replaced
    ActivationChanged { revision: u64, active: Vec<String> },
}

impl CatalogChange {
    pub fn revision(&self) -> u64 {
        match self {
            Self::Reloaded { revision, .. } | Self::ActivationChanged { revision, .. } => *revision,
        }
    }
}
