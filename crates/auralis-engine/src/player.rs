//! The player state machine: single source of truth for transport state.
//!
//! Every mutation goes through [`Player`]'s explicit transition methods
//! under one lock; observers receive pushed [`EngineEvent`]s and can
//! query a lock-free snapshot of the last published state at any time.
//! Each published snapshot carries a monotonically increasing version.

use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use crossbeam_channel::{Receiver, Sender, unbounded};
use parking_lot::Mutex;
use tracing::debug;

use crate::error::StateError;
use crate::events::EngineEvent;
use crate::track::{Track, TrackId};

/// Transport states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackState {
    /// Nothing loaded.
    #[default]
    Stopped,
    /// A track is being prepared.
    Loading,
    /// Audio is flowing.
    Playing,
    /// Playback suspended, position retained.
    Paused,
    /// Something failed; see the last error event.
    Error,
}

impl PlaybackState {
    fn name(self) -> &'static str {
        match self {
            PlaybackState::Stopped => "stopped",
            PlaybackState::Loading => "loading",
            PlaybackState::Playing => "playing",
            PlaybackState::Paused => "paused",
            PlaybackState::Error => "error",
        }
    }
}

/// Queue repeat behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RepeatMode {
    /// Stop at the end of the queue.
    #[default]
    None,
    /// Replay the current track forever.
    One,
    /// Wrap to the start of the queue.
    All,
}

/// A published snapshot of the player.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerState {
    /// Transport state.
    pub state: PlaybackState,
    /// Currently loaded track.
    pub current_track: Option<Track>,
    /// Playback position, samples.
    pub position_samples: u64,
    /// Current track duration, samples.
    pub duration_samples: u64,
    /// Output volume, 0-100.
    pub volume: u8,
    /// Mute flag (volume retained).
    pub muted: bool,
    /// The play queue.
    pub queue: Vec<Track>,
    /// Index of the current track within the queue.
    pub queue_index: usize,
    /// Whether shuffle reordered the queue.
    pub shuffle: bool,
    /// Repeat behavior.
    pub repeat: RepeatMode,
    /// Active mastering preset name.
    pub preset: String,
    /// Active mastering intensity, [0, 1].
    pub intensity: f32,
    /// Monotonically increasing snapshot version.
    pub version: u64,
}

impl Default for PlayerState {
    fn default() -> Self {
        Self {
            state: PlaybackState::Stopped,
            current_track: None,
            position_samples: 0,
            duration_samples: 0,
            volume: 80,
            muted: false,
            queue: Vec::new(),
            queue_index: 0,
            shuffle: false,
            repeat: RepeatMode::None,
            preset: "adaptive".to_string(),
            intensity: 0.5,
            version: 0,
        }
    }
}

impl PlayerState {
    /// Check the structural invariants.
    pub fn is_consistent(&self) -> bool {
        self.position_samples <= self.duration_samples
            && (self.current_track.is_none() || self.queue_index < self.queue.len().max(1))
            && self.volume <= 100
    }
}

/// Minimum interval between position-only publishes.
const POSITION_PUBLISH_INTERVAL: Duration = Duration::from_millis(950);

/// The state machine.
pub struct Player {
    state: Mutex<PlayerState>,
    published: ArcSwap<PlayerState>,
    subscribers: Mutex<Vec<Sender<EngineEvent>>>,
    last_position_publish: Mutex<Instant>,
    shuffle_seed: Mutex<u64>,
}

impl Player {
    /// Create a stopped player with defaults.
    pub fn new() -> Self {
        let initial = PlayerState::default();
        Self {
            state: Mutex::new(initial.clone()),
            published: ArcSwap::from_pointee(initial),
            subscribers: Mutex::new(Vec::new()),
            last_position_publish: Mutex::new(Instant::now() - POSITION_PUBLISH_INTERVAL),
            shuffle_seed: Mutex::new(0x9E37_79B9_7F4A_7C15),
        }
    }

    /// Subscribe to pushed events.
    pub fn subscribe(&self) -> Receiver<EngineEvent> {
        let (tx, rx) = unbounded();
        self.subscribers.lock().push(tx);
        rx
    }

    /// Snapshot of the last published state.
    pub fn snapshot(&self) -> Arc<PlayerState> {
        self.published.load_full()
    }

    // ------------------------------------------------------------------
    // Transport transitions
    // ------------------------------------------------------------------

    /// Begin loading a track. Legal from every state except `Error`
    /// (which requires `reset` first).
    pub fn load(&self, track: Track) -> Result<(), StateError> {
        self.transition("load", |s| {
            if s.state == PlaybackState::Error {
                return Err(illegal(s.state, "load"));
            }
            s.duration_samples = track.duration_samples;
            s.position_samples = 0;
            // Keep queue_index pointing at the track if it is queued.
            if let Some(pos) = s.queue.iter().position(|t| t.id == track.id) {
                s.queue_index = pos;
            }
            s.current_track = Some(track);
            s.state = PlaybackState::Loading;
            Ok(())
        })
    }

    /// The loaded track is ready; start playing.
    pub fn ready(&self) -> Result<(), StateError> {
        self.transition("ready", |s| {
            if s.state != PlaybackState::Loading {
                return Err(illegal(s.state, "ready"));
            }
            s.state = PlaybackState::Playing;
            Ok(())
        })
    }

    /// Resume from pause.
    pub fn play(&self) -> Result<(), StateError> {
        self.transition("play", |s| {
            if s.state != PlaybackState::Paused {
                return Err(illegal(s.state, "play"));
            }
            s.state = PlaybackState::Playing;
            Ok(())
        })
    }

    /// Pause playback.
    pub fn pause(&self) -> Result<(), StateError> {
        self.transition("pause", |s| {
            if s.state != PlaybackState::Playing {
                return Err(illegal(s.state, "pause"));
            }
            s.state = PlaybackState::Paused;
            Ok(())
        })
    }

    /// Stop playback and clear the position.
    pub fn stop(&self) -> Result<(), StateError> {
        self.transition("stop", |s| {
            if s.state == PlaybackState::Error {
                return Err(illegal(s.state, "stop"));
            }
            s.state = PlaybackState::Stopped;
            s.position_samples = 0;
            Ok(())
        })
    }

    /// The current track finished. Auto-advances per queue and repeat
    /// mode; returns the track to load next, if any.
    pub fn end_of_track(&self) -> Result<Option<Track>, StateError> {
        let mut next_track = None;
        let ended: Option<TrackId> = {
            let state = self.state.lock();
            state.current_track.as_ref().map(|t| t.id)
        };
        self.transition("end_of_track", |s| {
            if s.state != PlaybackState::Playing {
                return Err(illegal(s.state, "end_of_track"));
            }
            match s.repeat {
                RepeatMode::One => {
                    // Replay the same track from the top.
                    s.position_samples = 0;
                    next_track = s.current_track.clone();
                    s.state = PlaybackState::Loading;
                }
                RepeatMode::All | RepeatMode::None => {
                    let next_index = s.queue_index + 1;
                    let wrapped = if next_index < s.queue.len() {
                        Some(next_index)
                    } else if s.repeat == RepeatMode::All && !s.queue.is_empty() {
                        Some(0)
                    } else {
                        None
                    };
                    match wrapped {
                        Some(index) => {
                            s.queue_index = index;
                            let track = s.queue[index].clone();
                            s.duration_samples = track.duration_samples;
                            s.position_samples = 0;
                            s.current_track = Some(track.clone());
                            next_track = Some(track);
                            s.state = PlaybackState::Loading;
                        }
                        None => {
                            s.state = PlaybackState::Stopped;
                            s.position_samples = 0;
                        }
                    }
                }
            }
            Ok(())
        })?;
        if let Some(id) = ended {
            self.broadcast(EngineEvent::TrackEnded { id });
        }
        Ok(next_track)
    }

    /// Enter the error state, from anywhere.
    pub fn fail(&self, kind: &str, message: &str) {
        let _ = self.transition("error", |s| {
            s.state = PlaybackState::Error;
            Ok(())
        });
        self.broadcast(EngineEvent::Error {
            kind: kind.to_string(),
            message: message.to_string(),
        });
    }

    /// Leave the error state.
    pub fn reset(&self) -> Result<(), StateError> {
        self.transition("reset", |s| {
            if s.state != PlaybackState::Error {
                return Err(illegal(s.state, "reset"));
            }
            s.state = PlaybackState::Stopped;
            s.current_track = None;
            s.position_samples = 0;
            s.duration_samples = 0;
            Ok(())
        })
    }

    // ------------------------------------------------------------------
    // Queue
    // ------------------------------------------------------------------

    /// Append a track to the queue.
    pub fn enqueue(&self, track: Track) -> Result<(), StateError> {
        self.transition("enqueue", |s| {
            s.queue.push(track);
            Ok(())
        })
    }

    /// Remove the track at `index`.
    pub fn remove_from_queue(&self, index: usize) -> Result<(), StateError> {
        self.transition("remove_from_queue", |s| {
            if index >= s.queue.len() {
                return Err(StateError::InvalidQueueOp(format!(
                    "remove index {index} out of bounds ({})",
                    s.queue.len()
                )));
            }
            s.queue.remove(index);
            if index < s.queue_index {
                s.queue_index -= 1;
            } else if s.queue_index >= s.queue.len() && !s.queue.is_empty() {
                s.queue_index = s.queue.len() - 1;
            }
            Ok(())
        })
    }

    /// Reorder the queue by a permutation: `perm[new_pos] = old_pos`.
    /// The currently playing track follows its new index.
    pub fn reorder_queue(&self, perm: &[usize]) -> Result<(), StateError> {
        self.transition("reorder_queue", |s| {
            if perm.len() != s.queue.len() {
                return Err(StateError::InvalidQueueOp(format!(
                    "permutation length {} != queue length {}",
                    perm.len(),
                    s.queue.len()
                )));
            }
            let mut seen = vec![false; perm.len()];
            for &p in perm {
                if p >= perm.len() || seen[p] {
                    return Err(StateError::InvalidQueueOp(
                        "not a permutation".to_string(),
                    ));
                }
                seen[p] = true;
            }
            let old = std::mem::take(&mut s.queue);
            s.queue = perm.iter().map(|&p| old[p].clone()).collect();
            if let Some(new_index) = perm.iter().position(|&p| p == s.queue_index) {
                s.queue_index = new_index;
            }
            Ok(())
        })
    }

    /// Shuffle the queue, placing the current track at index 0.
    pub fn shuffle(&self) -> Result<(), StateError> {
        let mut seed = self.shuffle_seed.lock();
        *seed = seed
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        let mut rng = *seed;
        drop(seed);

        self.transition("shuffle", |s| {
            if s.queue.is_empty() {
                s.shuffle = true;
                return Ok(());
            }
            let current = s.queue_index.min(s.queue.len() - 1);
            let mut rest: Vec<Track> = s
                .queue
                .iter()
                .enumerate()
                .filter(|(i, _)| *i != current)
                .map(|(_, t)| t.clone())
                .collect();
            // Fisher-Yates with a xorshift step.
            for i in (1..rest.len()).rev() {
                rng ^= rng << 13;
                rng ^= rng >> 7;
                rng ^= rng << 17;
                let j = (rng % (i as u64 + 1)) as usize;
                rest.swap(i, j);
            }
            let mut queue = Vec::with_capacity(s.queue.len());
            queue.push(s.queue[current].clone());
            queue.extend(rest);
            s.queue = queue;
            s.queue_index = 0;
            s.shuffle = true;
            Ok(())
        })
    }

    // ------------------------------------------------------------------
    // Settings and position
    // ------------------------------------------------------------------

    /// Set output volume (clamped to 100).
    pub fn set_volume(&self, volume: u8) -> Result<(), StateError> {
        self.transition("set_volume", |s| {
            s.volume = volume.min(100);
            Ok(())
        })
    }

    /// Set the mute flag.
    pub fn set_muted(&self, muted: bool) -> Result<(), StateError> {
        self.transition("set_muted", |s| {
            s.muted = muted;
            Ok(())
        })
    }

    /// Set the repeat mode.
    pub fn set_repeat(&self, repeat: RepeatMode) -> Result<(), StateError> {
        self.transition("set_repeat", |s| {
            s.repeat = repeat;
            Ok(())
        })
    }

    /// Select a mastering preset and intensity.
    pub fn set_preset(&self, preset: String, intensity: f32) -> Result<(), StateError> {
        self.transition("set_preset", |s| {
            s.preset = preset;
            s.intensity = intensity.clamp(0.0, 1.0);
            Ok(())
        })
    }

    /// Report the playback position.
    ///
    /// Rate-limited to roughly 1 Hz so observers see smooth progress
    /// without a flood; a position at or past the duration publishes
    /// immediately.
    pub fn report_position(&self, position_samples: u64) {
        let (publish, state) = {
            let mut s = self.state.lock();
            s.position_samples = position_samples.min(s.duration_samples);
            let at_end = s.position_samples >= s.duration_samples && s.duration_samples > 0;
            let mut last = self.last_position_publish.lock();
            if at_end || last.elapsed() >= POSITION_PUBLISH_INTERVAL {
                *last = Instant::now();
                s.version += 1;
                (true, s.clone())
            } else {
                (false, s.clone())
            }
        };
        if publish {
            self.publish(state);
        }
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    /// Run one mutation under the lock; on success bump the version and
    /// publish, on failure leave the state untouched.
    fn transition(
        &self,
        action: &'static str,
        f: impl FnOnce(&mut PlayerState) -> Result<(), StateError>,
    ) -> Result<(), StateError> {
        let published = {
            let mut state = self.state.lock();
            let mut draft = state.clone();
            match f(&mut draft) {
                Ok(()) => {
                    draft.version = state.version + 1;
                    *state = draft.clone();
                    draft
                }
                Err(err) => {
                    debug!(action, %err, "transition rejected");
                    drop(state);
                    self.broadcast(EngineEvent::Error {
                        kind: "state".to_string(),
                        message: err.to_string(),
                    });
                    return Err(err);
                }
            }
        };
        self.publish(published);
        Ok(())
    }

    fn publish(&self, state: PlayerState) {
        self.published.store(Arc::new(state.clone()));
        self.broadcast(EngineEvent::StateChanged(state));
    }

    fn broadcast(&self, event: EngineEvent) {
        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }
}

impl Default for Player {
    fn default() -> Self {
        Self::new()
    }
}

fn illegal(from: PlaybackState, action: &'static str) -> StateError {
    StateError::IllegalTransition {
        from: from.name(),
        action,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn track(n: i64) -> Track {
        Track {
            id: TrackId(n),
            path: PathBuf::from(format!("/m/{n}.wav")),
            format: "wav".into(),
            title: format!("T{n}"),
            artist: None,
            album: None,
            sample_rate: 48000,
            channels: 2,
            duration_samples: 48000 * 60,
            fingerprint_status: Default::default(),
            fingerprint: None,
            fingerprint_error: None,
        }
    }

    #[test]
    fn happy_path_transitions() {
        let p = Player::new();
        p.load(track(1)).unwrap();
        assert_eq!(p.snapshot().state, PlaybackState::Loading);
        p.ready().unwrap();
        assert_eq!(p.snapshot().state, PlaybackState::Playing);
        p.pause().unwrap();
        p.play().unwrap();
        p.stop().unwrap();
        assert_eq!(p.snapshot().state, PlaybackState::Stopped);
    }

    #[test]
    fn illegal_transition_preserves_state() {
        let p = Player::new();
        let before = p.snapshot();
        let err = p.pause().unwrap_err();
        assert_eq!(
            err,
            StateError::IllegalTransition {
                from: "stopped",
                action: "pause"
            }
        );
        let after = p.snapshot();
        assert_eq!(before.state, after.state);
        assert_eq!(before.version, after.version);
    }

    #[test]
    fn error_state_requires_reset() {
        let p = Player::new();
        p.fail("decode", "bad file");
        assert_eq!(p.snapshot().state, PlaybackState::Error);
        assert!(p.load(track(1)).is_err());
        p.reset().unwrap();
        assert_eq!(p.snapshot().state, PlaybackState::Stopped);
        p.load(track(1)).unwrap();
    }

    #[test]
    fn versions_are_monotonic() {
        let p = Player::new();
        let mut last = p.snapshot().version;
        p.load(track(1)).unwrap();
        p.ready().unwrap();
        p.pause().unwrap();
        for _ in 0..3 {
            let v = p.snapshot().version;
            assert!(v >= last);
            last = v;
        }
        p.play().unwrap();
        assert!(p.snapshot().version > last);
    }

    #[test]
    fn auto_advance_through_queue() {
        let p = Player::new();
        p.enqueue(track(1)).unwrap();
        p.enqueue(track(2)).unwrap();
        p.load(track(1)).unwrap();
        p.ready().unwrap();

        let next = p.end_of_track().unwrap();
        assert_eq!(next.unwrap().id, TrackId(2));
        assert_eq!(p.snapshot().state, PlaybackState::Loading);
        assert_eq!(p.snapshot().queue_index, 1);

        p.ready().unwrap();
        let next = p.end_of_track().unwrap();
        assert!(next.is_none());
        assert_eq!(p.snapshot().state, PlaybackState::Stopped);
    }

    #[test]
    fn repeat_one_replays_current() {
        let p = Player::new();
        p.enqueue(track(1)).unwrap();
        p.set_repeat(RepeatMode::One).unwrap();
        p.load(track(1)).unwrap();
        p.ready().unwrap();
        let next = p.end_of_track().unwrap();
        assert_eq!(next.unwrap().id, TrackId(1));
    }

    #[test]
    fn repeat_all_wraps() {
        let p = Player::new();
        p.enqueue(track(1)).unwrap();
        p.enqueue(track(2)).unwrap();
        p.set_repeat(RepeatMode::All).unwrap();
        p.load(track(2)).unwrap();
        p.ready().unwrap();
        let next = p.end_of_track().unwrap();
        assert_eq!(next.unwrap().id, TrackId(1));
        assert_eq!(p.snapshot().queue_index, 0);
    }

    #[test]
    fn remove_before_current_shifts_index() {
        let p = Player::new();
        for n in 1..=3 {
            p.enqueue(track(n)).unwrap();
        }
        p.load(track(2)).unwrap();
        assert_eq!(p.snapshot().queue_index, 1);
        p.remove_from_queue(0).unwrap();
        assert_eq!(p.snapshot().queue_index, 0);
        assert_eq!(p.snapshot().queue[0].id, TrackId(2));
    }

    #[test]
    fn reorder_follows_current_track() {
        let p = Player::new();
        for n in 1..=3 {
            p.enqueue(track(n)).unwrap();
        }
        p.load(track(1)).unwrap();
        // New order: [t3, t1, t2]; current (old 0) moves to index 1.
        p.reorder_queue(&[2, 0, 1]).unwrap();
        let s = p.snapshot();
        assert_eq!(s.queue[0].id, TrackId(3));
        assert_eq!(s.queue_index, 1);
        assert_eq!(s.queue[s.queue_index].id, TrackId(1));
    }

    #[test]
    fn bad_permutation_rejected() {
        let p = Player::new();
        p.enqueue(track(1)).unwrap();
        p.enqueue(track(2)).unwrap();
        assert!(p.reorder_queue(&[0]).is_err());
        assert!(p.reorder_queue(&[0, 0]).is_err());
        assert!(p.reorder_queue(&[0, 5]).is_err());
    }

    #[test]
    fn shuffle_puts_current_first() {
        let p = Player::new();
        for n in 1..=10 {
            p.enqueue(track(n)).unwrap();
        }
        p.load(track(7)).unwrap();
        p.shuffle().unwrap();
        let s = p.snapshot();
        assert_eq!(s.queue[0].id, TrackId(7));
        assert_eq!(s.queue_index, 0);
        assert_eq!(s.queue.len(), 10);
        assert!(s.shuffle);
        // All tracks still present.
        let mut ids: Vec<i64> = s.queue.iter().map(|t| t.id.0).collect();
        ids.sort_unstable();
        assert_eq!(ids, (1..=10).collect::<Vec<_>>());
    }

    #[test]
    fn events_are_pushed_to_subscribers() {
        let p = Player::new();
        let rx = p.subscribe();
        p.load(track(1)).unwrap();
        match rx.recv_timeout(Duration::from_secs(1)).unwrap() {
            EngineEvent::StateChanged(s) => assert_eq!(s.state, PlaybackState::Loading),
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn position_reports_are_rate_limited() {
        let p = Player::new();
        p.load(track(1)).unwrap();
        p.ready().unwrap();
        let rx = p.subscribe();
        for pos in 0..100 {
            p.report_position(pos * 100);
        }
        // At ~1 Hz, a burst of 100 reports publishes at most twice.
        let mut state_changes = 0;
        while let Ok(event) = rx.try_recv() {
            if matches!(event, EngineEvent::StateChanged(_)) {
                state_changes += 1;
            }
        }
        assert!(state_changes <= 2, "published {state_changes} times");
    }

    #[test]
    fn position_clamped_to_duration() {
        let p = Player::new();
        p.load(track(1)).unwrap();
        p.ready().unwrap();
        p.report_position(u64::MAX);
        let s = p.snapshot();
        assert!(s.position_samples <= s.duration_samples);
        assert!(s.is_consistent());
    }
}
