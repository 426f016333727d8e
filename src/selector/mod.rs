//! Per-tick playback state machine.
//!
//! ```text
//! IDLE ──target──▶ PLAYING(key) ──new target──▶ STOPPING ──next tick──▶ PLAYING / IDLE
//! ```
//!
//! The selector is the single writer of playback state. It also arbitrates
//! against sounds that do not originate from it (other music, jukeboxes).

use crate::evaluator::matches_recorded;
use crate::metrics::Metrics;
use crate::models::{ResourceKey, TrackDefinition, WorldStateSnapshot};
use std::sync::Arc;
use thiserror::Error;

/// Opaque host identity of one playing sound instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PlaybackHandle(pub u64);

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AudioHostError {
    #[error("sound '{0}' is not registered with the host")]
    UnknownSound(String),

    #[error("audio engine unavailable: {0}")]
    Unavailable(String),
}

/// The host audio engine as seen by the selector.
#[cfg_attr(test, mockall::automock)]
pub trait AudioHost {
    fn start(&mut self, resource: &ResourceKey) -> Result<PlaybackHandle, AudioHostError>;
    fn stop(&mut self, handle: PlaybackHandle);
    fn is_active(&self, handle: PlaybackHandle) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SoundChannel {
    Music,
    /// Jukeboxes and other positional records.
    Record,
    Other,
}

/// A sound the host is about to start or has just started.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SoundEvent {
    pub location: ResourceKey,
    pub channel: SoundChannel,
    pub handle: PlaybackHandle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartVerdict {
    Allow,
    Veto,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreemptionCause {
    Record,
    ExternalMusic,
}

/// Selection is frozen while `handle` is reported active.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Preemption {
    pub handle: PlaybackHandle,
    pub cause: PreemptionCause,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectorState {
    Idle,
    Playing(String),
    /// One-tick transient after stopping for a new target.
    Stopping,
}

pub struct PlaybackSelector {
    reserved_namespace: String,
    override_other_music: bool,
    intended: Option<Arc<TrackDefinition>>,
    handle: Option<PlaybackHandle>,
    stopping: bool,
    preemption: Option<Preemption>,
    pending_yield: Option<PlaybackHandle>,
    metrics: Arc<Metrics>,
}

impl PlaybackSelector {
    pub fn new(
        reserved_namespace: &str,
        override_other_music: bool,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            reserved_namespace: reserved_namespace.to_string(),
            override_other_music,
            intended: None,
            handle: None,
            stopping: false,
            preemption: None,
            pending_yield: None,
            metrics,
        }
    }

    pub fn state(&self) -> SelectorState {
        if self.stopping {
            return SelectorState::Stopping;
        }
        match (&self.intended, self.handle) {
            (Some(track), Some(_)) => SelectorState::Playing(track.track_key.clone()),
            _ => SelectorState::Idle,
        }
    }

    pub fn intended_track_key(&self) -> Option<&str> {
        self.intended.as_deref().map(|t| t.track_key.as_str())
    }

    pub fn intended_resource(&self) -> Option<&ResourceKey> {
        self.intended.as_deref().map(|t| &t.resource_id)
    }

    pub fn handle(&self) -> Option<PlaybackHandle> {
        self.handle
    }

    pub fn preemption(&self) -> Option<Preemption> {
        self.preemption
    }

    pub fn set_override_other_music(&mut self, enabled: bool) {
        self.override_other_music = enabled;
    }

    /// Advance one tick.
    ///
    /// `snapshot` is `None` when the world or player is unavailable. `tracks`
    /// must be the active tracks in priority order.
    pub fn tick<'a, I>(
        &mut self,
        snapshot: Option<&WorldStateSnapshot>,
        tracks: I,
        host: &mut dyn AudioHost,
    ) where
        I: IntoIterator<Item = &'a Arc<TrackDefinition>>,
    {
        self.metrics.record_tick();

        let Some(snapshot) = snapshot else {
            if self.intended.is_some() || self.handle.is_some() {
                tracing::info!("World unavailable, stopping music");
            }
            self.release(host);
            return;
        };

        if let Some(preemption) = self.preemption {
            if host.is_active(preemption.handle) {
                self.metrics.record_frozen_tick();
                return;
            }
            tracing::info!(
                "Preempting {:?} audio finished, resuming selection",
                preemption.cause
            );
            self.preemption = None;
        }

        self.stopping = false;

        let target = self.select_target(snapshot, tracks);
        let target_key = target.as_deref().map(|t| t.track_key.as_str());

        if target_key != self.intended_track_key() {
            tracing::info!(
                "Target changed: {} -> {}",
                self.intended_track_key().unwrap_or("<none>"),
                target_key.unwrap_or("<none>")
            );
            let stopped = self.stop_current(host);
            self.intended = target;
            if stopped {
                self.stopping = true;
            } else {
                self.start_intended(host);
            }
            return;
        }

        // Self-heal
        match (self.intended.is_some(), self.handle) {
            (true, None) => self.start_intended(host),
            (true, Some(handle)) if !host.is_active(handle) => {
                tracing::debug!("Intended track no longer active, restarting");
                self.handle = None;
                self.metrics.record_restart();
                self.start_intended(host);
            }
            (false, Some(_)) => {
                self.stop_current(host);
            }
            _ => {}
        }
    }

    fn select_target<'a, I>(
        &self,
        snapshot: &WorldStateSnapshot,
        tracks: I,
    ) -> Option<Arc<TrackDefinition>>
    where
        I: IntoIterator<Item = &'a Arc<TrackDefinition>>,
    {
        tracks
            .into_iter()
            .find(|track| matches_recorded(track, snapshot, &self.metrics))
            .cloned()
    }

    /// Stop our playback. Returns whether something was actually playing.
    fn stop_current(&mut self, host: &mut dyn AudioHost) -> bool {
        let Some(handle) = self.handle.take() else {
            return false;
        };
        let was_active = host.is_active(handle);
        host.stop(handle);
        if was_active {
            self.metrics.record_stop();
        }
        was_active
    }

    fn start_intended(&mut self, host: &mut dyn AudioHost) {
        let Some(track) = self.intended.as_deref() else {
            return;
        };
        match host.start(&track.resource_id) {
            Ok(handle) => {
                tracing::info!("Playing '{}' ({})", track.track_key, track.resource_id);
                self.handle = Some(handle);
                self.metrics.record_start();
            }
            Err(e) => {
                tracing::warn!(
                    "Failed to start '{}' ({}), retrying next tick: {}",
                    track.track_key,
                    track.resource_id,
                    e
                );
                self.metrics.record_start_failure();
            }
        }
    }

    /// Stop our playback and forget the intent. A playing record keeps
    /// selection frozen until it ends.
    fn release(&mut self, host: &mut dyn AudioHost) {
        self.stop_current(host);
        self.intended = None;
        self.stopping = false;
        self.pending_yield = None;
        self.preemption = self
            .preemption
            .filter(|p| p.cause == PreemptionCause::Record);
    }

    /// Stop everything and forget the current intent.
    pub fn stop_all(&mut self, host: &mut dyn AudioHost) {
        self.release(host);
        self.preemption = None;
    }

    /// Veto-capable hook called before the host starts any music or record sound.
    pub fn on_sound_starting(
        &mut self,
        event: &SoundEvent,
        host: &mut dyn AudioHost,
    ) -> StartVerdict {
        match event.channel {
            SoundChannel::Record | SoundChannel::Other => StartVerdict::Allow,
            SoundChannel::Music if event.location.namespace() == self.reserved_namespace => {
                if self.intended_resource() == Some(&event.location) {
                    StartVerdict::Allow
                } else {
                    tracing::debug!("Vetoing stale own sound {}", event.location);
                    self.metrics.record_veto();
                    StartVerdict::Veto
                }
            }
            SoundChannel::Music => {
                if self.intended.is_none() {
                    return StartVerdict::Allow;
                }
                if self.override_other_music {
                    tracing::info!("Yielding to external music {}", event.location);
                    self.stop_current(host);
                    self.pending_yield = Some(event.handle);
                    self.metrics.record_yield();
                    StartVerdict::Allow
                } else {
                    tracing::debug!("Vetoing external music {}", event.location);
                    self.metrics.record_veto();
                    StartVerdict::Veto
                }
            }
        }
    }

    /// Observation hook called after the host started a sound.
    pub fn on_sound_started(&mut self, event: &SoundEvent, host: &mut dyn AudioHost) {
        match event.channel {
            SoundChannel::Record => {
                tracing::info!("Record {} started, pausing selection", event.location);
                self.stop_current(host);
                self.stopping = false;
                self.preemption = Some(Preemption {
                    handle: event.handle,
                    cause: PreemptionCause::Record,
                });
                self.metrics.record_preemption();
            }
            SoundChannel::Music if self.pending_yield == Some(event.handle) => {
                self.pending_yield = None;
                self.preemption = Some(Preemption {
                    handle: event.handle,
                    cause: PreemptionCause::ExternalMusic,
                });
            }
            _ => {}
        }
    }
}
