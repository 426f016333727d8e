//! One music session: the catalog, provider, selector and world sampler
//! wired together for the host.

use crate::catalog::{ActivationStore, CatalogError, DiscoveryReport, PackCatalog};
use crate::config::ConfigManager;
use crate::evaluator::{WorldSampler, WorldView};
use crate::metrics::Metrics;
use crate::models::Settings;
use crate::provider::VirtualResourceProvider;
use crate::selector::{AudioHost, PlaybackSelector, SelectorState, SoundEvent, StartVerdict};
use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;

/// Owns exactly one catalog, provider, selector and combat tracker for the
/// lifetime of a game session.
///
/// All methods are expected to be called from the host's main thread; the
/// catalog and provider are `Arc`-shared so resource requests and reloads can
/// come from other threads.
pub struct MusicSession {
    settings: Settings,
    catalog: Arc<PackCatalog>,
    provider: Arc<VirtualResourceProvider>,
    selector: PlaybackSelector,
    sampler: WorldSampler,
    metrics: Arc<Metrics>,
}

impl MusicSession {
    pub fn new(settings: Settings, config: &ConfigManager) -> Result<Self> {
        let pack_root = config.pack_root(&settings);
        let catalog = Arc::new(PackCatalog::new(
            &pack_root,
            ActivationStore::new(config.activation_path()),
            &settings.resource_namespace,
        ));
        let provider = Arc::new(VirtualResourceProvider::new(
            Arc::clone(&catalog),
            settings.pack_format,
            &settings.pack_description,
        ));
        let sampler = WorldSampler::new(&settings.heuristics)
            .context("Invalid identifier in heuristic settings")?;
        let metrics = Arc::new(Metrics::new());
        let selector = PlaybackSelector::new(
            &settings.resource_namespace,
            settings.override_other_music,
            Arc::clone(&metrics),
        );

        tracing::info!(
            "Music session created: pack_root={}, namespace={}, override_other_music={}",
            pack_root,
            settings.resource_namespace,
            settings.override_other_music
        );

        Ok(Self {
            settings,
            catalog,
            provider,
            selector,
            sampler,
            metrics,
        })
    }

    /// Rediscover packs and rebuild the virtual pack (both reload phases).
    pub fn reload(&self) -> Result<DiscoveryReport> {
        let report = self.catalog.discover().context("Pack discovery failed")?;
        self.metrics.record_discovery(report.diagnostics.len());

        let prepared = self.provider.prepare();
        self.provider
            .apply(prepared)
            .context("Failed to rebuild the virtual pack")?;

        Ok(report)
    }

    /// One selector tick against the current world.
    pub fn tick(&mut self, world: &dyn WorldView, host: &mut dyn AudioHost) {
        let view = self.catalog.view();
        let scan_radius = view
            .active_tracks()
            .filter_map(|t| t.required_entity_radius())
            .reduce(f64::max);

        let snapshot = self.sampler.sample(world, scan_radius);
        self.selector
            .tick(snapshot.as_ref(), view.active_tracks(), host);
    }

    pub fn on_sound_starting(
        &mut self,
        event: &SoundEvent,
        host: &mut dyn AudioHost,
    ) -> StartVerdict {
        self.selector.on_sound_starting(event, host)
    }

    pub fn on_sound_started(&mut self, event: &SoundEvent, host: &mut dyn AudioHost) {
        self.selector.on_sound_started(event, host);
    }

    pub fn set_active_pack_ids(&self, ids: Vec<String>) -> Result<(), CatalogError> {
        self.catalog.set_active_pack_ids(ids)
    }

    /// Stop playback and log the session metrics.
    pub fn shutdown(&mut self, host: &mut dyn AudioHost) {
        self.selector.stop_all(host);
        self.metrics.log_summary();
        tracing::info!("Music session shut down");
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.settings.tick_interval_ms.max(1))
    }

    pub fn state(&self) -> SelectorState {
        self.selector.state()
    }

    pub fn selector(&self) -> &PlaybackSelector {
        &self.selector
    }

    pub fn in_combat(&self) -> bool {
        self.sampler.combat().in_combat()
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn catalog(&self) -> &Arc<PackCatalog> {
        &self.catalog
    }

    pub fn provider(&self) -> &Arc<VirtualResourceProvider> {
        &self.provider
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }
}
