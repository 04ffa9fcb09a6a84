//! Background fingerprint extraction.
//!
//! A priority queue of `(track, path)` jobs drained by a bounded worker
//! pool. Jobs prefer more recently added tracks (LIFO by enqueue
//! sequence). For each job a worker:
//!
//! 1. marks the track `Processing`,
//! 2. loads a valid `.25d` sidecar if one exists, otherwise decodes the
//!    file and runs the analyzer,
//! 3. persists the fingerprint to the sidecar and the catalog and marks
//!    the track `Complete` - or `Error` with the message on failure
//!    (failed jobs are not requeued automatically).
//!
//! The queue is rebuilt on startup from tracks whose status is
//! `Pending` or `Processing` (workers are not persistent, so
//! `Processing` means a previous run died mid-job). Shutdown stops
//! intake, cancels in-flight analysis at its internal checkpoints and
//! joins the workers; abandoned jobs are safely requeueable because
//! extraction is pure.

use std::collections::BinaryHeap;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;

use auralis_analysis::{CancelToken, FingerprintAnalyzer, load_valid_sidecar, save_sidecar};
use auralis_io::decode_file;
use parking_lot::{Condvar, Mutex};
use tracing::{debug, info, warn};

use crate::catalog::Catalog;
use crate::error::CatalogError;
use crate::track::{FingerprintStatus, TrackId};

#[derive(Debug, Clone, PartialEq, Eq)]
struct Job {
    /// Higher sequence = enqueued later = dequeued first.
    seq: u64,
    track_id: TrackId,
    path: PathBuf,
}

impl Ord for Job {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.seq.cmp(&other.seq)
    }
}

impl PartialOrd for Job {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

struct QueueState {
    heap: BinaryHeap<Job>,
    next_seq: u64,
    closed: bool,
}

struct Shared {
    state: Mutex<QueueState>,
    available: Condvar,
    cancel: CancelToken,
    shutting_down: AtomicBool,
}

/// The extraction queue and its worker pool.
pub struct FingerprintQueue {
    shared: Arc<Shared>,
    workers: Vec<JoinHandle<()>>,
    max_retries: u32,
}

impl FingerprintQueue {
    /// Start a queue with `workers` threads (0 means `max(cpu/2, 1)`).
    pub fn start(
        catalog: Arc<dyn Catalog>,
        workers: usize,
        max_retries: u32,
    ) -> Self {
        let worker_count = if workers > 0 {
            workers
        } else {
            (num_cpus::get() / 2).max(1)
        };
        let shared = Arc::new(Shared {
            state: Mutex::new(QueueState {
                heap: BinaryHeap::new(),
                next_seq: 0,
                closed: false,
            }),
            available: Condvar::new(),
            cancel: CancelToken::new(),
            shutting_down: AtomicBool::new(false),
        });

        let mut handles = Vec::with_capacity(worker_count);
        for worker_index in 0..worker_count {
            let shared = Arc::clone(&shared);
            let catalog = Arc::clone(&catalog);
            handles.push(
                std::thread::Builder::new()
                    .name(format!("fingerprint-{worker_index}"))
                    .spawn(move || worker_loop(&shared, &catalog, max_retries))
                    .expect("spawn fingerprint worker"),
            );
        }
        info!(workers = worker_count, "fingerprint queue started");
        Self {
            shared,
            workers: handles,
            max_retries,
        }
    }

    /// Enqueue one track for extraction.
    pub fn enqueue(&self, track_id: TrackId, path: PathBuf) {
        let mut state = self.shared.state.lock();
        if state.closed {
            warn!(?track_id, "queue closed, dropping fingerprint job");
            return;
        }
        state.next_seq += 1;
        let seq = state.next_seq;
        state.heap.push(Job {
            seq,
            track_id,
            path,
        });
        drop(state);
        self.shared.available.notify_one();
    }

    /// Rebuild the queue from the catalog's pending/processing tracks.
    /// Call once on startup.
    pub fn enqueue_pending(&self, catalog: &dyn Catalog, limit: usize) -> Result<usize, CatalogError> {
        let pending = catalog.list_pending_fingerprints(limit)?;
        let count = pending.len();
        for (id, path) in pending {
            self.enqueue(id, path);
        }
        debug!(count, "requeued pending fingerprints");
        Ok(count)
    }

    /// Jobs waiting to be picked up.
    pub fn backlog(&self) -> usize {
        self.shared.state.lock().heap.len()
    }

    /// Configured retry budget.
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Graceful shutdown: stop intake, let in-flight jobs hit their next
    /// cancellation checkpoint within `deadline`, then join the workers.
    pub fn shutdown(mut self, deadline: Duration) {
        {
            let mut state = self.shared.state.lock();
            state.closed = true;
            state.heap.clear();
        }
        self.shared.shutting_down.store(true, Ordering::SeqCst);
        self.shared.available.notify_all();

        // Give in-flight analysis one deadline's grace before cancelling
        // at its internal checkpoints.
        std::thread::sleep(deadline.min(Duration::from_millis(200)));
        self.shared.cancel.cancel();

        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
        info!("fingerprint queue stopped");
    }
}

fn worker_loop(shared: &Shared, catalog: &Arc<dyn Catalog>, max_retries: u32) {
    loop {
        let job = {
            let mut state = shared.state.lock();
            loop {
                if let Some(job) = state.heap.pop() {
                    break job;
                }
                if state.closed {
                    return;
                }
                shared.available.wait(&mut state);
            }
        };
        if shared.shutting_down.load(Ordering::SeqCst) {
            return;
        }
        run_job(shared, catalog.as_ref(), &job, max_retries);
    }
}

fn run_job(shared: &Shared, catalog: &dyn Catalog, job: &Job, max_retries: u32) {
    if catalog
        .set_fingerprint_status(job.track_id, FingerprintStatus::Processing, None)
        .is_err()
    {
        // Track vanished between enqueue and dequeue; nothing to do.
        return;
    }

    // A valid sidecar short-circuits the whole computation.
    if let Some(fingerprint) = load_valid_sidecar(&job.path) {
        debug!(?job.track_id, "fingerprint loaded from sidecar");
        persist(catalog, job, fingerprint);
        return;
    }

    let mut attempts = 0;
    loop {
        attempts += 1;
        match extract(shared, job) {
            Ok(fingerprint) => {
                if let Err(err) = save_sidecar(&job.path, &fingerprint) {
                    warn!(?job.path, %err, "failed to write sidecar");
                }
                persist(catalog, job, fingerprint);
                return;
            }
            Err(err) => {
                if shared.cancel.is_cancelled() {
                    // Abandoned in-flight job: leave it Processing; the
                    // next startup requeues it as pending.
                    debug!(?job.track_id, "fingerprint job cancelled");
                    return;
                }
                if attempts > max_retries {
                    warn!(?job.track_id, %err, "fingerprint extraction failed");
                    let _ = catalog.set_fingerprint_status(
                        job.track_id,
                        FingerprintStatus::Error,
                        Some(err),
                    );
                    return;
                }
                debug!(?job.track_id, attempts, "retrying fingerprint extraction");
            }
        }
    }
}

fn extract(shared: &Shared, job: &Job) -> Result<auralis_core::Fingerprint, String> {
    let audio = decode_file(&job.path).map_err(|e| e.to_string())?;
    FingerprintAnalyzer::new()
        .analyze(&audio.samples, audio.sample_rate, &shared.cancel)
        .map_err(|e| e.to_string())
}

fn persist(catalog: &dyn Catalog, job: &Job, fingerprint: auralis_core::Fingerprint) {
    if let Err(err) = catalog.save_fingerprint(job.track_id, fingerprint) {
        warn!(?job.track_id, %err, "failed to persist fingerprint");
        let _ = catalog.set_fingerprint_status(
            job.track_id,
            FingerprintStatus::Error,
            Some(err.to_string()),
        );
    }
}
