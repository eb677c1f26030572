//! Media-player automation bridge.
//!
//! The player controller only talks to this trait; `mpv::MpvBridge` is the
//! production implementation. Stream ids are opaque strings handed out by
//! `start_stream` and used to target later commands.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum BridgeError {
    /// The player application cannot be found or launched.
    #[error("media player unavailable: {0}")]
    Unavailable(String),
    /// The player received the command and reported an error.
    #[error("media player command failed: {0}")]
    CommandFailed(String),
    /// The referenced track is no longer loaded.
    #[error("track not found: {0}")]
    NotFound(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackStatus {
    Playing,
    Paused,
    Missing,
}

#[allow(async_fn_in_trait)]
pub trait Bridge {
    /// Open `url` as the only loaded stream, titled `label`, and start it.
    async fn start_stream(&self, url: &str, label: &str) -> Result<String, BridgeError>;
    /// Resume playback of a specific stream.
    async fn play(&self, stream_id: &str) -> Result<(), BridgeError>;
    async fn pause(&self) -> Result<(), BridgeError>;
    /// Drop a stream from the player queue.
    async fn remove(&self, stream_id: &str) -> Result<(), BridgeError>;
    /// Hard stop of whatever is playing.
    async fn stop(&self) -> Result<(), BridgeError>;
    async fn probe(&self, stream_id: &str) -> Result<TrackStatus, BridgeError>;
}

/// Which bridge call failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BridgeOp {
    Start,
    Play,
    Pause,
    Remove,
    Stop,
    Probe,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Log only; the user is not told.
    Suppress,
    /// Surface as a notification.
    Report,
}

/// Decide whether a bridge failure is worth telling the user about.
///
/// Removing or stopping a track that is already gone counts as success, and
/// pause failures are never surfaced so that toggling stays responsive.
pub fn classify(op: BridgeOp, err: &BridgeError) -> Disposition {
    match (op, err) {
        (BridgeOp::Remove | BridgeOp::Stop, BridgeError::NotFound(_)) => Disposition::Suppress,
        (BridgeOp::Pause, _) => Disposition::Suppress,
        _ => Disposition::Report,
    }
}

/// Label the player shows for a stream opened from `url`.
pub fn stream_label(url: &str) -> String {
    format!("Radio-T: {}", url)
}

/// In-memory bridge that records every call, for controller tests.
#[cfg(test)]
pub mod fake {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq)]
    pub enum Call {
        Start { url: String, label: String },
        Play(String),
        Pause,
        Remove(String),
        Stop,
        Probe(String),
    }

    #[derive(Default)]
    pub struct FakeBridge {
        calls: Mutex<Vec<Call>>,
        failures: Mutex<HashMap<BridgeOp, BridgeError>>,
        status: Mutex<Option<TrackStatus>>,
        next_id: Mutex<u64>,
    }

    impl FakeBridge {
        pub fn new() -> Self {
            Self::default()
        }

        /// Make every later call of `op` fail with `err`.
        pub fn fail(&self, op: BridgeOp, err: BridgeError) {
            self.failures.lock().unwrap().insert(op, err);
        }

        pub fn set_status(&self, status: TrackStatus) {
            *self.status.lock().unwrap() = Some(status);
        }

        pub fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }

        pub fn clear_calls(&self) {
            self.calls.lock().unwrap().clear();
        }

        fn record(&self, op: BridgeOp, call: Call) -> Result<(), BridgeError> {
            self.calls.lock().unwrap().push(call);
            match self.failures.lock().unwrap().get(&op) {
                Some(err) => Err(err.clone()),
                None => Ok(()),
            }
        }
    }

    impl Bridge for FakeBridge {
        async fn start_stream(&self, url: &str, label: &str) -> Result<String, BridgeError> {
            self.record(
                BridgeOp::Start,
                Call::Start {
                    url: url.to_string(),
                    label: label.to_string(),
                },
            )?;
            let mut next = self.next_id.lock().unwrap();
            *next += 1;
            Ok(next.to_string())
        }

        async fn play(&self, stream_id: &str) -> Result<(), BridgeError> {
            self.record(BridgeOp::Play, Call::Play(stream_id.to_string()))
        }

        async fn pause(&self) -> Result<(), BridgeError> {
            self.record(BridgeOp::Pause, Call::Pause)
        }

        async fn remove(&self, stream_id: &str) -> Result<(), BridgeError> {
            self.record(BridgeOp::Remove, Call::Remove(stream_id.to_string()))
        }

        async fn stop(&self) -> Result<(), BridgeError> {
            self.record(BridgeOp::Stop, Call::Stop)
        }

        async fn probe(&self, stream_id: &str) -> Result<TrackStatus, BridgeError> {
            self.record(BridgeOp::Probe, Call::Probe(stream_id.to_string()))?;
            Ok(self.status.lock().unwrap().unwrap_or(TrackStatus::Playing))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_errors() -> [BridgeError; 3] {
        [
            BridgeError::Unavailable("no mpv".into()),
            BridgeError::CommandFailed("boom".into()),
            BridgeError::NotFound("7".into()),
        ]
    }

    #[test]
    fn test_not_found_suppressed_only_for_remove_and_stop() {
        let nf = BridgeError::NotFound("7".into());
        assert_eq!(classify(BridgeOp::Remove, &nf), Disposition::Suppress);
        assert_eq!(classify(BridgeOp::Stop, &nf), Disposition::Suppress);
        assert_eq!(classify(BridgeOp::Play, &nf), Disposition::Report);
        assert_eq!(classify(BridgeOp::Start, &nf), Disposition::Report);
    }

    #[test]
    fn test_pause_failures_always_suppressed() {
        for err in all_errors() {
            assert_eq!(classify(BridgeOp::Pause, &err), Disposition::Suppress);
        }
    }

    #[test]
    fn test_other_failures_reported() {
        for op in [BridgeOp::Start, BridgeOp::Play, BridgeOp::Remove, BridgeOp::Stop] {
            assert_eq!(
                classify(op, &BridgeError::CommandFailed("x".into())),
                Disposition::Report
            );
            assert_eq!(
                classify(op, &BridgeError::Unavailable("x".into())),
                Disposition::Report
            );
        }
    }

    #[test]
    fn test_stream_label() {
        assert_eq!(
            stream_label("https://stream.radio-t.com"),
            "Radio-T: https://stream.radio-t.com"
        );
    }
}
