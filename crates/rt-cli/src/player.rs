//! Playback controller.
//!
//! Maps "what should be playing" onto bridge commands.  The caller owns the
//! `PlaybackState` and hands it to every operation; each mutation is written
//! through the injected `Storage` before the bridge is asked to act.
//!
//! `play` updates the state optimistically: it assumes the bridge succeeded
//! and leaves the correction to `reconcile`, which `rt status` runs.

use rt_proto::protocol::Episode;
use rt_proto::state::{PlaybackState, PlayingType, Storage};
use tracing::{debug, info, warn};

use crate::bridge::{classify, stream_label, Bridge, BridgeError, BridgeOp, Disposition, TrackStatus};
use crate::notify::{Launch, Notifier, Severity};

pub struct Player<B, S, N> {
    bridge: B,
    store: S,
    notifier: N,
    launch: Launch,
    live_url: String,
}

impl<B: Bridge, S: Storage, N: Notifier> Player<B, S, N> {
    pub fn new(bridge: B, store: S, notifier: N, launch: Launch, live_url: impl Into<String>) -> Self {
        Self {
            bridge,
            store,
            notifier,
            launch,
            live_url: live_url.into(),
        }
    }

    pub fn load_state(&self) -> PlaybackState {
        PlaybackState::load(&self.store)
    }

    pub fn launch(&self) -> Launch {
        self.launch
    }

    pub fn notifier(&self) -> &N {
        &self.notifier
    }

    #[cfg(test)]
    pub fn bridge(&self) -> &B {
        &self.bridge
    }

    fn persist(&self, state: &PlaybackState) {
        if let Err(e) = state.save(&self.store) {
            warn!("player: failed to persist playback state: {}", e);
        }
    }

    /// Apply the suppression policy to a failed bridge call.
    fn handle_failure(&self, op: BridgeOp, err: BridgeError, message: &str) {
        match classify(op, &err) {
            Disposition::Suppress => debug!("player: {:?} failed (suppressed): {}", op, err),
            Disposition::Report => {
                warn!("player: {:?} failed: {}", op, err);
                if self.launch.is_user() {
                    self.report(&err, message);
                }
            }
        }
    }

    fn report(&self, err: &BridgeError, message: &str) {
        match err {
            BridgeError::Unavailable(_) => self.notifier.hud("Error: media player not found"),
            other => self
                .notifier
                .toast(&format!("{}: {}", message, other), Severity::Failure),
        }
    }

    /// Stop whatever runs, then open `url`.
    async fn open(&self, state: &mut PlaybackState, url: &str) -> Result<String, BridgeError> {
        self.stop(state).await;
        self.bridge.start_stream(url, &stream_label(url)).await
    }

    /// Start failures are reported always, since the user explicitly asked
    /// for something new to play.
    fn start_failed(&self, url: &str, err: &BridgeError, message: &str) {
        warn!("player: start_stream({}) failed: {}", url, err);
        self.report(err, message);
    }

    pub async fn stream_episode(&self, state: &mut PlaybackState, episode: &Episode) -> Option<String> {
        info!("player: streaming episode {:?}", episode.title);
        let id = match self.open(state, &episode.audio_url).await {
            Ok(id) => id,
            Err(e) => {
                self.start_failed(&episode.audio_url, &e, "Failed to stream episode");
                return None;
            }
        };
        state.is_playing = true;
        state.playing_type = PlayingType::Episode;
        state.stream_id = Some(id.clone());
        state.episode = Some(episode.clone());
        self.persist(state);
        Some(id)
    }

    pub async fn stream_live(&self, state: &mut PlaybackState) -> Option<String> {
        match self.join_live(state).await {
            Ok(id) => Some(id),
            Err(e) => {
                self.start_failed(&self.live_url, &e, "Failed to stream live");
                None
            }
        }
    }

    /// `stream_live` without the failure notification, for callers that
    /// phrase their own.
    pub async fn join_live(&self, state: &mut PlaybackState) -> Result<String, BridgeError> {
        info!("player: streaming live from {}", self.live_url);
        let id = self.open(state, &self.live_url).await?;
        state.is_playing = true;
        state.playing_type = PlayingType::Live;
        state.stream_id = Some(id.clone());
        state.episode = None;
        self.persist(state);
        Ok(id)
    }

    pub async fn play(&self, state: &mut PlaybackState) {
        let Some(id) = state.stream_id.clone() else {
            debug!("player: play without a stream");
            if self.launch.is_user() {
                self.notifier.toast("Nothing to resume", Severity::Info);
            }
            return;
        };
        state.is_playing = true;
        self.persist(state);
        if let Err(e) = self.bridge.play(&id).await {
            self.handle_failure(BridgeOp::Play, e, "Failed to play track");
        }
    }

    pub async fn pause(&self, state: &mut PlaybackState) {
        state.is_playing = false;
        self.persist(state);
        if let Err(e) = self.bridge.pause().await {
            self.handle_failure(BridgeOp::Pause, e, "Failed to pause");
        }
    }

    pub async fn stop(&self, state: &mut PlaybackState) {
        let id = state.stream_id.take();
        state.is_playing = false;
        state.playing_type = PlayingType::Nothing;
        state.episode = None;
        self.persist(state);

        if let Some(id) = id {
            if let Err(e) = self.bridge.remove(&id).await {
                self.handle_failure(BridgeOp::Remove, e, "Failed to stop playback");
            }
        }
        if let Err(e) = self.bridge.stop().await {
            self.handle_failure(BridgeOp::Stop, e, "Failed to stop playback");
        }
    }

    /// Pause when playing, resume otherwise.  Returns the resulting flag.
    pub async fn toggle(&self, state: &mut PlaybackState) -> bool {
        let had_stream = state.stream_id.is_some();
        let was_playing = state.is_playing;
        if was_playing {
            self.pause(state).await;
        } else {
            self.play(state).await;
        }
        if had_stream && self.launch.is_user() {
            let msg = if was_playing {
                "Playback paused"
            } else {
                "Playback resumed"
            };
            self.notifier.toast(msg, Severity::Info);
        }
        state.is_playing
    }

    /// Bring the stored flags in line with what the player reports.
    pub async fn reconcile(&self, state: &mut PlaybackState) {
        let Some(id) = state.stream_id.clone() else {
            return;
        };
        let corrected = match self.bridge.probe(&id).await {
            Ok(TrackStatus::Playing) => PlaybackState {
                is_playing: true,
                ..state.clone()
            },
            Ok(TrackStatus::Paused) => PlaybackState {
                is_playing: false,
                ..state.clone()
            },
            Ok(TrackStatus::Missing) | Err(BridgeError::NotFound(_)) => PlaybackState::default(),
            Err(e) => {
                debug!("player: reconcile skipped: {}", e);
                return;
            }
        };
        if corrected != *state {
            info!("player: reconciled state: {}", corrected.describe());
            *state = corrected;
            self.persist(state);
        }
    }
}
