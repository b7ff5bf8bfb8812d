//! Supersedable background recomputation.
//!
//! A `RecomputeCoordinator` owns an [`ImageEngine`] and a pool of worker
//! threads. Every rank request is tagged with a generation number taken from
//! a counter that only ever grows. A worker publishes its result only if its
//! generation is still the latest one issued when it finishes, so the visible
//! pixels always belong to the most recently issued request, whatever the
//! order in which workers complete. Superseded work runs to completion and is
//! then dropped, including its errors.
//!
//! Results are delivered asynchronously through the channel returned by
//! [`RecomputeCoordinator::completions`].

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;

use crate::config::CoordinatorConfig;
use crate::engine::{compose_planes, ImageEngine};
use crate::pixels::PixelBuffer;
use crate::types::{Result, SvdImageError};
use crossbeam_channel::{unbounded, Receiver, Sender};
use log::{debug, info, warn};

/// Outcome of the most recently issued request.
#[derive(Debug)]
pub struct Completion {
    pub generation: u64,
    pub rank: i64,
    pub outcome: Result<Arc<PixelBuffer>>,
}

#[derive(Clone, Copy, Debug)]
struct Job {
    generation: u64,
    rank: i64,
}

struct State {
    engine: ImageEngine,
    latest: u64,
}

struct Shared {
    state: Mutex<State>,
    completions: Sender<Completion>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

pub struct RecomputeCoordinator {
    shared: Arc<Shared>,
    jobs: Option<Sender<Job>>,
    completions: Receiver<Completion>,
    workers: Vec<thread::JoinHandle<()>>,
}

impl RecomputeCoordinator {
    /// Take ownership of `engine` and spawn the worker pool.
    pub fn new(engine: ImageEngine, config: &CoordinatorConfig) -> Result<Self> {
        let (job_sender, job_receiver) = unbounded::<Job>();
        let (completion_sender, completion_receiver) = unbounded::<Completion>();

        let shared = Arc::new(Shared {
            state: Mutex::new(State { engine, latest: 0 }),
            completions: completion_sender,
        });

        let workers = (0..config.effective_workers())
            .map(|index| {
                let shared = Arc::clone(&shared);
                let jobs = job_receiver.clone();
                thread::Builder::new()
                    .name(format!("{}-{}", config.thread_name, index))
                    .spawn(move || worker_loop(&shared, &jobs))
                    .map_err(SvdImageError::from)
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            shared,
            jobs: Some(job_sender),
            completions: completion_receiver,
            workers,
        })
    }

    /// Schedule a reconstruction at rank `k` and return its generation.
    ///
    /// Every earlier request is superseded. The outcome, including a
    /// `RankOutOfRange` error, arrives on the completion channel unless a
    /// newer request is issued first. Fails with `WorkersUnavailable` if no
    /// worker is left to run it.
    pub fn request(&self, k: i64) -> Result<u64> {
        let generation = {
            let mut state = self.shared.lock();
            state.latest += 1;
            state.latest
        };

        debug!("issued rank {} as generation {}", k, generation);

        let job = Job { generation, rank: k };
        match &self.jobs {
            Some(jobs) if jobs.send(job).is_ok() => Ok(generation),
            _ => {
                warn!(
                    "no worker left to run generation {} at rank {}",
                    generation, k
                );
                Err(SvdImageError::WorkersUnavailable)
            }
        }
    }

    /// Channel on which completed, non superseded requests are reported.
    pub fn completions(&self) -> &Receiver<Completion> {
        &self.completions
    }

    /// Generation of the most recently issued request or load.
    pub fn latest_generation(&self) -> u64 {
        self.shared.lock().latest
    }

    /// The currently visible reconstruction.
    pub fn current_pixels(&self) -> Option<Arc<PixelBuffer>> {
        self.shared.lock().engine.shared_pixels()
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Run `f` against the engine while holding the state lock.
    pub fn with_engine<R, F: FnOnce(&ImageEngine) -> R>(&self, f: F) -> R {
        f(&self.shared.lock().engine)
    }

    /// Replace the engine with one loaded from `path`.
    ///
    /// Decoding and factorization happen on the calling thread without
    /// holding the lock. A successful load supersedes every pending request.
    /// On failure the current engine is left untouched.
    pub fn load(&self, path: &Path) -> Result<usize> {
        let engine = ImageEngine::open(path)?;
        let max_rank = engine.rank();

        let mut state = self.shared.lock();
        state.engine = engine;
        state.latest += 1;

        info!(
            "installed {} as generation {} with rank {}",
            path.display(),
            state.latest,
            max_rank
        );
        Ok(max_rank)
    }

    /// Save the current state through [`ImageEngine::save`].
    pub fn save(&self, path: &Path) -> Result<Option<f64>> {
        self.shared.lock().engine.save(path)
    }
}

impl Drop for RecomputeCoordinator {
    fn drop(&mut self) {
        // Invalidate queued jobs so the workers drain quickly.
        self.shared.lock().latest += 1;
        self.jobs.take();

        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
    }
}

fn worker_loop(shared: &Shared, jobs: &Receiver<Job>) {
    for job in jobs.iter() {
        run_job(shared, job);
    }
}

fn run_job(shared: &Shared, job: Job) {
    if let Some(outcome) = compose_job(shared, job) {
        finish_job(shared, job, outcome);
    }
}

/// Compose the pixels for `job` outside the lock.
///
/// Returns `None` if the job was superseded before it started.
fn compose_job(shared: &Shared, job: Job) -> Option<Result<PixelBuffer>> {
    let planes = {
        let state = shared.lock();
        if state.latest != job.generation {
            debug!(
                "skipping generation {}, latest is {}",
                job.generation, state.latest
            );
            return None;
        }
        state.engine.shared_planes()
    };

    if planes.is_empty() {
        return Some(Err(SvdImageError::NotLoaded));
    }
    Some(compose_planes(&planes, job.rank))
}

/// Publish `outcome` unless a newer generation was issued meanwhile.
fn finish_job(shared: &Shared, job: Job, outcome: Result<PixelBuffer>) {
    let mut state = shared.lock();
    if state.latest != job.generation {
        debug!(
            "discarding generation {} at rank {}, latest is {}",
            job.generation, job.rank, state.latest
        );
        return;
    }

    let outcome = outcome.map(|pixels| {
        let pixels = Arc::new(pixels);
        state.engine.publish(Arc::clone(&pixels));
        pixels
    });

    // Sent under the lock so that completions leave in generation order.
    let _ = shared.completions.send(Completion {
        generation: job.generation,
        rank: job.rank,
        outcome,
    });
}
