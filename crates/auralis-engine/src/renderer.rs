//! Per-track rendering: decode, plan, resolve, process, stitch.
//!
//! [`TrackRenderer`] drives one track through the pipeline. Chunks are
//! rendered lazily and in ascending index order; each render resolves
//! parameters from the active preset and the track's fingerprint,
//! processes the chunk (pre-roll warmed, pre-roll stripped) through the
//! stage graph, and hands the result to the continuity controller.
//! Pure per-chunk renders are memoized in the shared [`ChunkCache`],
//! keyed by file signature, parameter digest and chunk index - any
//! change to the file or to the effective parameters re-keys the entry.
//!
//! The consumer pulls frames with [`next_frames`]; rendering is
//! cancellable at chunk boundaries.
//!
//! [`next_frames`]: TrackRenderer::next_frames

use std::io::Read;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::UNIX_EPOCH;

use auralis_config::{EngineConfig, PresetResolver};
use auralis_core::{ChunkDescriptor, ChunkStats, Fingerprint, StereoBuffer};
use auralis_dsp::StageGraph;
use auralis_io::{ChunkReader, DecodedAudio, decode_file, plan_chunks};
use crossbeam_channel::Sender;
use tracing::{debug, warn};

use crate::cache::TaggedCache;
use crate::error::EngineError;
use crate::events::EngineEvent;

/// Cache key for one rendered chunk.
pub type ChunkKey = (u64, u64, u32);

/// Shared rendered-chunk cache: `(file_signature, params_digest,
/// chunk_index) -> processed chunk body`.
pub type ChunkCache = TaggedCache<ChunkKey, Arc<StereoBuffer>>;

/// Stable signature of a file's identity: size, mtime (ns) and a hash
/// of the first 64 KiB of content. Any change re-keys every cached
/// chunk of the file.
pub fn file_signature(path: &Path) -> Result<u64, EngineError> {
    let metadata = std::fs::metadata(path).map_err(|source| {
        EngineError::Decode(auralis_io::DecodeError::Io {
            path: path.to_path_buf(),
            source,
        })
    })?;
    let mtime_ns = metadata
        .modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map_or(0, |d| d.as_nanos() as u64);

    let mut head = [0u8; 64 * 1024];
    let mut file = std::fs::File::open(path).map_err(|source| {
        EngineError::Decode(auralis_io::DecodeError::Io {
            path: path.to_path_buf(),
            source,
        })
    })?;
    let mut read_total = 0usize;
    loop {
        match file.read(&mut head[read_total..]) {
            Ok(0) => break,
            Ok(n) => read_total += n,
            Err(source) => {
                return Err(EngineError::Decode(auralis_io::DecodeError::Io {
                    path: path.to_path_buf(),
                    source,
                }));
            }
        }
        if read_total == head.len() {
            break;
        }
    }

    let mut hash = 0xcbf2_9ce4_8422_2325u64;
    let mut push = |bytes: &[u8]| {
        for &b in bytes {
            hash ^= u64::from(b);
            hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
        }
    };
    push(&metadata.len().to_le_bytes());
    push(&mtime_ns.to_le_bytes());
    push(&head[..read_total]);
    Ok(hash)
}

/// Settings a renderer needs, extracted from [`EngineConfig`].
#[derive(Debug, Clone)]
pub struct RenderConfig {
    /// Chunk duration, seconds.
    pub chunk_seconds: f64,
    /// Rendered overlap, seconds.
    pub overlap_seconds: f64,
    /// Pre-roll context, seconds.
    pub context_seconds: f64,
    /// Level-step budget for the continuity controller, dB.
    pub level_max_change_db: f32,
    /// Limiter ceiling, dBTP.
    pub limiter_ceiling_dbtp: f32,
    /// Active preset name.
    pub preset: String,
    /// Active intensity.
    pub intensity: f32,
}

impl RenderConfig {
    /// Derive from an engine config plus the active preset selection.
    pub fn from_engine(config: &EngineConfig, preset: String, intensity: f32) -> Self {
        Self {
            chunk_seconds: config.chunk_seconds,
            overlap_seconds: config.overlap_seconds,
            context_seconds: config.context_seconds,
            level_max_change_db: config.level_max_change_db,
            limiter_ceiling_dbtp: config.limiter_ceiling_dbtp,
            preset,
            intensity,
        }
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self::from_engine(&EngineConfig::default(), "adaptive".into(), 0.5)
    }
}

/// Renders one track as a pull-driven stream of frames.
pub struct TrackRenderer {
    audio: DecodedAudio,
    plan: Vec<ChunkDescriptor>,
    config: RenderConfig,
    fingerprint: Fingerprint,
    file_sig: u64,
    graph: StageGraph,
    continuity: crate::continuity::ContinuityController,
    resolver: Arc<PresetResolver>,
    cache: Option<Arc<ChunkCache>>,
    events: Option<Sender<EngineEvent>>,
    cancelled: Arc<AtomicBool>,
    next_chunk: usize,
    /// Rendered frames not yet pulled by the consumer.
    pending: StereoBuffer,
    position_samples: u64,
}

impl TrackRenderer {
    /// Open a file and prepare a renderer for it.
    ///
    /// `fingerprint` drives the `adaptive` preset; pass
    /// [`Fingerprint::neutral`] for un-fingerprinted tracks (extraction
    /// failures never block playback).
    pub fn open(
        path: &Path,
        config: RenderConfig,
        fingerprint: Option<Fingerprint>,
        resolver: Arc<PresetResolver>,
        cache: Option<Arc<ChunkCache>>,
    ) -> Result<Self, EngineError> {
        let file_sig = file_signature(path)?;
        let audio = decode_file(path)?;
        let plan = plan_chunks(
            audio.total_samples(),
            audio.sample_rate,
            config.chunk_seconds,
            config.overlap_seconds,
        )?;
        debug!(
            ?path,
            chunks = plan.len(),
            sample_rate = audio.sample_rate,
            frames = audio.total_samples(),
            "opened track for rendering"
        );
        let sample_rate = audio.sample_rate as f32;
        let level_budget = config.level_max_change_db;
        Ok(Self {
            audio,
            plan,
            fingerprint: fingerprint.unwrap_or_else(Fingerprint::neutral),
            file_sig,
            graph: StageGraph::new(sample_rate),
            continuity: crate::continuity::ContinuityController::new(level_budget),
            resolver,
            cache,
            events: None,
            cancelled: Arc::new(AtomicBool::new(false)),
            next_chunk: 0,
            pending: StereoBuffer::default(),
            position_samples: 0,
            config,
        })
    }

    /// Attach an event sink for `ChunkReady`/`Warning` events.
    pub fn with_events(mut self, events: Sender<EngineEvent>) -> Self {
        self.events = Some(events);
        self
    }

    /// Handle that cancels the render at the next chunk boundary.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancelled)
    }

    /// Total track length in samples.
    pub fn total_samples(&self) -> u64 {
        self.audio.total_samples()
    }

    /// Native sample rate of the track.
    pub fn sample_rate(&self) -> u32 {
        self.audio.sample_rate
    }

    /// Current playback position in samples.
    pub fn position_samples(&self) -> u64 {
        self.position_samples
    }

    /// The chunk plan (for observers and tests).
    pub fn plan(&self) -> &[ChunkDescriptor] {
        &self.plan
    }

    /// Pull up to `n` frames of rendered audio.
    ///
    /// Returns fewer than `n` frames only at end of track; an empty
    /// buffer means the track is finished (or the render was
    /// cancelled). Chunks are rendered on demand, in order.
    pub fn next_frames(&mut self, n: usize) -> Result<StereoBuffer, EngineError> {
        while self.pending.frames() < n {
            if self.cancelled.load(Ordering::Relaxed) {
                break;
            }
            match self.render_next_chunk()? {
                Some(emitted) => self.pending.extend(&emitted),
                None => break,
            }
        }
        let take = n.min(self.pending.frames());
        let out = self.pending.slice(0, take);
        self.pending = self.pending.slice(take, self.pending.frames());
        self.position_samples += take as u64;
        Ok(out)
    }

    /// Render the entire track in one call (offline mastering path).
    pub fn render_all(&mut self) -> Result<StereoBuffer, EngineError> {
        let mut out = StereoBuffer::default();
        while let Some(emitted) = self.render_next_chunk()? {
            out.extend(&emitted);
        }
        out.extend(&self.pending);
        self.pending = StereoBuffer::default();
        self.position_samples = out.frames() as u64;
        Ok(out)
    }

    /// Render and stitch the next chunk; `None` when the plan is done.
    fn render_next_chunk(&mut self) -> Result<Option<StereoBuffer>, EngineError> {
        let Some(&descriptor) = self.plan.get(self.next_chunk) else {
            return Ok(None);
        };
        self.next_chunk += 1;

        let mut params =
            self.resolver
                .resolve(&self.config.preset, &self.fingerprint, self.config.intensity)?;
        params.limiter_ceiling_dbtp = self.config.limiter_ceiling_dbtp;
        let params_digest = params.signature();

        let reader = ChunkReader::new(
            &self.audio,
            self.config.context_seconds,
            self.config.overlap_seconds,
        );
        let chunk = reader.read_chunk(descriptor);
        let declared = chunk.declared_frames;
        let tail = chunk.tail_frames;

        // Pure per-chunk render, memoized. The cached value is the
        // processed body (declared + tail, pre-roll stripped), before
        // any cross-chunk stitching.
        let key: ChunkKey = (self.file_sig, params_digest, descriptor.chunk_index);
        let graph = &mut self.graph;
        let events = self.events.as_ref();
        let mut render = || -> Result<Arc<StereoBuffer>, EngineError> {
            let mut buffer = chunk.samples.clone();
            graph.reset();
            let report = graph.process_chunk(&mut buffer, &params);
            if report.is_repaired() {
                warn!(
                    chunk = descriptor.chunk_index,
                    repaired = report.repaired_samples,
                    "non-finite samples repaired during render"
                );
                if let Some(tx) = events {
                    let _ = tx.send(EngineEvent::Warning {
                        message: format!(
                            "repaired {} non-finite samples in chunk {}",
                            report.repaired_samples, descriptor.chunk_index
                        ),
                    });
                }
            }
            let body = buffer.slice(chunk.pre_roll_frames, buffer.frames());
            Ok(Arc::new(body))
        };

        let body = match &self.cache {
            Some(cache) => {
                let track_tag = format!("chunks:{:x}", self.file_sig);
                cache.get_or_compute(
                    key,
                    &["chunks", track_tag.as_str()],
                    |v| v.byte_size() as u64,
                    render,
                )?
            }
            None => render()?,
        };

        let emitted = self
            .continuity
            .push_chunk((*body).clone(), declared, tail)?;

        if let Some(tx) = &self.events {
            let _ = tx.send(EngineEvent::ChunkReady {
                index: descriptor.chunk_index,
                stats: ChunkStats::measure(&emitted),
                repaired: false,
            });
        }
        Ok(Some(emitted))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use auralis_io::write_wav;
    use std::f32::consts::PI;
    use tempfile::TempDir;

    fn write_tone(dir: &TempDir, name: &str, freq: f32, amp: f32, seconds: f32, sr: u32) -> std::path::PathBuf {
        let n = (seconds * sr as f32) as usize;
        let v: Vec<f32> = (0..n)
            .map(|i| amp * (2.0 * PI * freq * i as f32 / sr as f32).sin())
            .collect();
        let path = dir.path().join(name);
        write_wav(&path, &StereoBuffer::from_mono(v), sr).unwrap();
        path
    }

    fn renderer(path: &Path, preset: &str, intensity: f32) -> TrackRenderer {
        let config = RenderConfig {
            preset: preset.into(),
            intensity,
            ..RenderConfig::default()
        };
        TrackRenderer::open(path, config, None, Arc::new(PresetResolver::new()), None).unwrap()
    }

    #[test]
    fn output_length_matches_input() {
        let dir = TempDir::new().unwrap();
        let path = write_tone(&dir, "t.wav", 440.0, 0.5, 25.0, 44100);
        let mut r = renderer(&path, "gentle", 0.5);
        let out = r.render_all().unwrap();
        let total = 25 * 44100;
        assert!(
            (out.frames() as i64 - total).unsigned_abs() <= 1,
            "length {} vs {}",
            out.frames(),
            total
        );
    }

    #[test]
    fn pull_interface_advances_position() {
        let dir = TempDir::new().unwrap();
        let path = write_tone(&dir, "t.wav", 440.0, 0.4, 3.0, 22050);
        let mut r = renderer(&path, "transparent", 0.0);
        let first = r.next_frames(1000).unwrap();
        assert_eq!(first.frames(), 1000);
        assert_eq!(r.position_samples(), 1000);
        // Drain the rest.
        let mut total = 1000;
        loop {
            let chunk = r.next_frames(4096).unwrap();
            if chunk.is_empty() {
                break;
            }
            total += chunk.frames();
        }
        assert_eq!(total as u64, r.total_samples());
    }

    #[test]
    fn cancellation_stops_at_chunk_boundary() {
        let dir = TempDir::new().unwrap();
        let path = write_tone(&dir, "t.wav", 440.0, 0.4, 30.0, 44100);
        let mut r = renderer(&path, "gentle", 0.5);
        let cancel = r.cancel_handle();
        let first = r.next_frames(1000).unwrap();
        assert_eq!(first.frames(), 1000);
        cancel.store(true, Ordering::Relaxed);
        // Buffered frames drain, then the stream ends early.
        let mut drained = 0u64;
        loop {
            let chunk = r.next_frames(1 << 20).unwrap();
            if chunk.is_empty() {
                break;
            }
            drained += chunk.frames() as u64;
        }
        assert!(drained + 1000 < r.total_samples());
    }

    #[test]
    fn cached_renders_are_identical_and_cheaper() {
        let dir = TempDir::new().unwrap();
        let path = write_tone(&dir, "t.wav", 440.0, 0.5, 12.0, 22050);
        let cache: Arc<ChunkCache> = Arc::new(TaggedCache::new(crate::cache::CacheConfig::default()));
        let resolver = Arc::new(PresetResolver::new());
        let config = RenderConfig {
            preset: "warm".into(),
            intensity: 0.7,
            ..RenderConfig::default()
        };

        let mut first = TrackRenderer::open(
            &path,
            config.clone(),
            None,
            Arc::clone(&resolver),
            Some(Arc::clone(&cache)),
        )
        .unwrap();
        let a = first.render_all().unwrap();
        let misses_after_first = cache.stats().misses;

        let mut second = TrackRenderer::open(
            &path,
            config,
            None,
            Arc::clone(&resolver),
            Some(Arc::clone(&cache)),
        )
        .unwrap();
        let b = second.render_all().unwrap();

        assert_eq!(a, b, "cached render must be byte-identical");
        assert_eq!(
            cache.stats().misses, misses_after_first,
            "second render must hit the cache"
        );
    }

    #[test]
    fn silence_through_transparent_is_silence() {
        // The S1 scenario: 10 s of stereo silence at 48 kHz, preset
        // transparent, intensity 0.
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("silence.wav");
        write_wav(&path, &StereoBuffer::silence(480_000), 48000).unwrap();

        let mut r = renderer(&path, "transparent", 0.0);
        let out = r.render_all().unwrap();
        assert_eq!(out.frames(), 480_000);
        assert_eq!(out.peak(), 0.0, "silence in, silence out");
    }

    #[test]
    fn chunk_ready_events_arrive_in_order() {
        let dir = TempDir::new().unwrap();
        let path = write_tone(&dir, "t.wav", 330.0, 0.4, 25.0, 22050);
        let (tx, rx) = crossbeam_channel::unbounded();
        let mut r = renderer(&path, "gentle", 0.4).with_events(tx);
        r.render_all().unwrap();

        let mut indices = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let EngineEvent::ChunkReady { index, .. } = event {
                indices.push(index);
            }
        }
        assert_eq!(indices, vec![0, 1, 2]);
    }
}
