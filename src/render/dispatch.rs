use std::collections::BTreeMap;
use std::sync::Arc;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::cache::coherency::CoherencyManager;
use crate::draw::image::ImageDescriptor;
use crate::draw::target::TargetBuffer;
use crate::draw::task::{DrawTask, SkipReason, TaskId, TaskQueue, TaskState};
use crate::foundation::core::{Area, OPA_MIN};
use crate::foundation::error::{BlitError, BlitResult};
use crate::render::dma2d::{Dma2dOpts, Dma2dUnit, SoftDma2d};
use crate::render::gpu::{GpuOpts, GpuUnit, SoftGpu};
use crate::render::scheduler::OverlapWaves;
use crate::render::sw::SoftwareUnit;
use crate::render::unit::{DrawUnit, UnitId, UnitKind};

/// Dispatcher configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchOpts {
    /// Run disjoint tasks on distinct units concurrently.
    pub parallel: bool,
    /// Worker threads for parallel dispatch; `None` uses rayon's default.
    pub threads: Option<usize>,
    /// Upper bound on tasks started per scheduling round.
    pub max_batch: usize,
    /// Units built by [`Dispatcher::from_opts`], in registration order.
    pub units: Vec<UnitKind>,
    /// Cache maintenance around hardware access.
    pub cache_maintenance: bool,
}

impl Default for DispatchOpts {
    fn default() -> Self {
        Self {
            parallel: false,
            threads: None,
            max_batch: 16,
            units: vec![UnitKind::Dma2d, UnitKind::Gpu, UnitKind::Software],
            cache_maintenance: true,
        }
    }
}

fn parse_override<T: std::str::FromStr>(name: &str, raw: Option<String>) -> BlitResult<Option<T>> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    raw.trim()
        .parse::<T>()
        .map(Some)
        .map_err(|_| BlitError::config(format!("{name}={raw:?} is not a valid value")))
}

impl DispatchOpts {
    /// Parse options from JSON; missing fields keep their defaults.
    pub fn from_json(json: &str) -> BlitResult<Self> {
        let opts: Self = serde_json::from_str(json)
            .map_err(|e| BlitError::config(format!("parse dispatch options: {e}")))?;
        opts.validate()?;
        Ok(opts)
    }

    /// Apply `BLITCORE_PARALLEL`, `BLITCORE_THREADS` and `BLITCORE_MAX_BATCH` when set.
    pub fn with_env_overrides(self) -> BlitResult<Self> {
        self.with_overrides_from(|name| std::env::var(name).ok())
    }

    pub(crate) fn with_overrides_from(
        mut self,
        get: impl Fn(&str) -> Option<String>,
    ) -> BlitResult<Self> {
        const PARALLEL: &str = "BLITCORE_PARALLEL";
        const THREADS: &str = "BLITCORE_THREADS";
        const MAX_BATCH: &str = "BLITCORE_MAX_BATCH";

        if let Some(parallel) = get(PARALLEL) {
            self.parallel = match parallel.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" => false,
                other => {
                    return Err(BlitError::config(format!(
                        "{PARALLEL}={other:?} is not a boolean"
                    )));
                }
            };
        }
        if let Some(threads) = parse_override::<usize>(THREADS, get(THREADS))? {
            self.threads = Some(threads);
        }
        if let Some(max_batch) = parse_override::<usize>(MAX_BATCH, get(MAX_BATCH))? {
            self.max_batch = max_batch;
        }
        self.validate()?;
        Ok(self)
    }

    /// Set [`DispatchOpts::parallel`].
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Set [`DispatchOpts::threads`].
    pub fn with_threads(mut self, threads: Option<usize>) -> Self {
        self.threads = threads;
        self
    }

    /// Set [`DispatchOpts::units`].
    pub fn with_units(mut self, units: Vec<UnitKind>) -> Self {
        self.units = units;
        self
    }

    /// Reject settings no dispatcher can run with.
    pub fn validate(&self) -> BlitResult<()> {
        if self.threads == Some(0) {
            return Err(BlitError::config("'threads' must be >= 1 when set"));
        }
        if self.max_batch == 0 {
            return Err(BlitError::config("'max_batch' must be >= 1"));
        }
        Ok(())
    }
}

/// Outcome counters of one [`Dispatcher::dispatch`] call.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct DispatchStats {
    /// Tasks claimed.
    pub total: usize,
    /// Tasks completed.
    pub done: usize,
    /// Tasks retired without drawing.
    pub skipped: usize,
    /// Tasks retired after an error.
    pub failed: usize,
    /// Tasks executed by a less preferred unit than the best registered one.
    pub fallbacks: usize,
    /// Scheduling rounds.
    pub batches: usize,
    /// Completed tasks per unit kind.
    pub per_unit: BTreeMap<UnitKind, usize>,
}

/// Build a unit of `kind`; hardware kinds run on the CPU emulators.
pub fn create_unit(
    kind: UnitKind,
    coherency: Arc<CoherencyManager>,
    cache_maintenance: bool,
) -> Box<dyn DrawUnit> {
    match kind {
        UnitKind::Software => Box::new(SoftwareUnit::new(coherency)),
        UnitKind::Dma2d => Box::new(Dma2dUnit::new(
            Box::new(SoftDma2d::new()),
            coherency,
            Dma2dOpts::default().with_cache_maintenance(cache_maintenance),
        )),
        UnitKind::Gpu => Box::new(GpuUnit::new(
            Box::new(SoftGpu::new()),
            coherency,
            GpuOpts::default().with_cache_maintenance(cache_maintenance),
        )),
    }
}

fn build_thread_pool(threads: Option<usize>) -> BlitResult<rayon::ThreadPool> {
    if let Some(n) = threads
        && n == 0
    {
        return Err(BlitError::config("dispatch 'threads' must be >= 1 when set"));
    }

    let mut builder = rayon::ThreadPoolBuilder::new();
    if let Some(n) = threads {
        builder = builder.num_threads(n);
    }
    builder
        .build()
        .map_err(|e| BlitError::config(format!("failed to build rayon thread pool: {e}")))
}

/// Execute `task` on `unit` and join the unit.
fn run_on(
    unit: &mut dyn DrawUnit,
    task: &DrawTask,
    image: &ImageDescriptor,
    target: &mut TargetBuffer,
    clip: &Area,
) -> BlitResult<()> {
    unit.execute(task, image, target, clip)?;
    unit.wait_for_completion()
}

/// A claimed task that passed the pre-checks.
#[derive(Clone, Copy, Debug)]
struct Claimed {
    id: TaskId,
    clip: Area,
    unit: UnitId,
}

/// Owns the registered units and executes task queues against a target.
pub struct Dispatcher {
    units: Vec<Box<dyn DrawUnit>>,
    coherency: Arc<CoherencyManager>,
    opts: DispatchOpts,
    pool: Option<rayon::ThreadPool>,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let units: Vec<&str> = self.units.iter().map(|u| u.name()).collect();
        f.debug_struct("Dispatcher")
            .field("units", &units)
            .field("opts", &self.opts)
            .finish()
    }
}

impl Dispatcher {
    /// Dispatcher without units; register them with [`Dispatcher::register`].
    pub fn new(coherency: Arc<CoherencyManager>, opts: DispatchOpts) -> BlitResult<Self> {
        opts.validate()?;
        let pool = if opts.parallel {
            Some(build_thread_pool(opts.threads)?)
        } else {
            None
        };
        Ok(Self {
            units: Vec::new(),
            coherency,
            opts,
            pool,
        })
    }

    /// Dispatcher with the units listed in `opts.units`.
    pub fn from_opts(opts: DispatchOpts) -> BlitResult<Self> {
        if opts.units.is_empty() {
            return Err(BlitError::config("at least one unit must be configured"));
        }
        let coherency = Arc::new(CoherencyManager::default());
        let mut d = Self::new(coherency.clone(), opts)?;
        let kinds = d.opts.units.clone();
        for kind in kinds {
            d.register(create_unit(kind, coherency.clone(), d.opts.cache_maintenance));
        }
        Ok(d)
    }

    /// Add a unit; ids follow registration order.
    pub fn register(&mut self, unit: Box<dyn DrawUnit>) -> UnitId {
        let id = UnitId(self.units.len());
        tracing::debug!(unit = unit.name(), id = id.0, "registered draw unit");
        self.units.push(unit);
        id
    }

    /// Registered units as `(id, kind, name)`.
    pub fn units(&self) -> impl Iterator<Item = (UnitId, UnitKind, &str)> {
        self.units
            .iter()
            .enumerate()
            .map(|(i, u)| (UnitId(i), u.kind(), u.name()))
    }

    /// Shared cache-coherency manager.
    pub fn coherency(&self) -> &Arc<CoherencyManager> {
        &self.coherency
    }

    /// Options in effect.
    pub fn opts(&self) -> &DispatchOpts {
        &self.opts
    }

    /// Most preferred unit able to run `task`; ties go to the earliest registered.
    pub fn select(&self, task: &DrawTask, target: &TargetBuffer) -> Option<UnitId> {
        self.units
            .iter()
            .enumerate()
            .filter(|(_, u)| u.check(task, target).is_ok())
            .min_by_key(|(i, u)| (u.preference(), *i))
            .map(|(i, _)| UnitId(i))
    }

    fn best_preference(&self) -> Option<u32> {
        self.units.iter().map(|u| u.preference()).min()
    }

    fn software_unit(&self, except: UnitId) -> Option<UnitId> {
        self.units
            .iter()
            .enumerate()
            .find(|(i, u)| *i != except.0 && u.kind() == UnitKind::Software)
            .map(|(i, _)| UnitId(i))
    }

    /// Run every pending task of `queue` against `target`.
    ///
    /// Tasks whose clips overlap run in submission order. A task that cannot run is skipped
    /// or failed; the rest of the queue continues.
    #[tracing::instrument(skip_all, fields(tasks = queue.len(), parallel = self.opts.parallel))]
    pub fn dispatch(
        &mut self,
        queue: &mut TaskQueue,
        target: &mut TargetBuffer,
    ) -> BlitResult<DispatchStats> {
        let mut stats = DispatchStats::default();
        let claimed = self.claim(queue, target, &mut stats)?;

        if self.pool.is_none() {
            for c in claimed {
                stats.batches += 1;
                self.run_sequential(queue, target, c, &mut stats)?;
            }
        } else {
            let clips: Vec<Area> = claimed.iter().map(|c| c.clip).collect();
            let waves = OverlapWaves::new(&clips);
            tracing::trace!(waves = waves.len(), "overlap waves");
            for wave in waves.iter() {
                for chunk in wave.chunks(self.opts.max_batch) {
                    stats.batches += 1;
                    if let [i] = chunk {
                        self.run_sequential(queue, target, claimed[*i], &mut stats)?;
                    } else {
                        let batch: Vec<Claimed> = chunk.iter().map(|&i| claimed[i]).collect();
                        self.run_wave(queue, target, batch, &mut stats)?;
                    }
                }
            }
        }

        self.coherency.sync_all();
        tracing::debug!(
            total = stats.total,
            done = stats.done,
            skipped = stats.skipped,
            failed = stats.failed,
            fallbacks = stats.fallbacks,
            "dispatch finished"
        );
        Ok(stats)
    }

    /// Claim pending tasks, retire the ones with nothing to do, and pick a unit for the rest.
    fn claim(
        &self,
        queue: &mut TaskQueue,
        target: &TargetBuffer,
        stats: &mut DispatchStats,
    ) -> BlitResult<Vec<Claimed>> {
        let mut claimed = Vec::new();
        for id in queue.pending() {
            let rec = queue
                .get_mut(id)
                .ok_or_else(|| BlitError::validation(format!("unknown task {id:?}")))?;
            rec.state.advance(TaskState::Dispatched)?;
            stats.total += 1;

            let clip = rec.task.effective_clip(&target.area());
            let unit = clip.and_then(|_| self.select(&rec.task, target));
            let skip = match (clip, unit) {
                (None, _) => Some(SkipReason::EmptyClip),
                _ if rec.task.opa <= OPA_MIN => Some(SkipReason::InvisibleOpacity),
                (_, None) => Some(SkipReason::Unsupported),
                (Some(clip), Some(unit)) => {
                    if Some(self.units[unit.0].preference()) != self.best_preference() {
                        stats.fallbacks += 1;
                        tracing::debug!(
                            task = id.0,
                            unit = self.units[unit.0].name(),
                            "routed to fallback unit"
                        );
                    }
                    claimed.push(Claimed { id, clip, unit });
                    None
                }
            };
            if let Some(reason) = skip {
                tracing::debug!(task = id.0, ?reason, "task skipped");
                rec.state.advance(TaskState::Skipped(reason))?;
                stats.skipped += 1;
            }
        }
        Ok(claimed)
    }

    /// Move a claimed task to `Executing` and open its image; `None` when the task failed.
    fn open(
        queue: &mut TaskQueue,
        c: &Claimed,
        stats: &mut DispatchStats,
    ) -> BlitResult<Option<ImageDescriptor>> {
        let rec = queue
            .get_mut(c.id)
            .ok_or_else(|| BlitError::validation(format!("unknown task {:?}", c.id)))?;
        rec.state.advance(TaskState::Executing)?;
        match rec.task.src.open() {
            Ok(image) => Ok(Some(image)),
            Err(e) => {
                tracing::warn!(task = c.id.0, error = %e, "source image unavailable");
                rec.state.advance(TaskState::Failed(e.to_string()))?;
                stats.failed += 1;
                Ok(None)
            }
        }
    }

    fn finish(
        &self,
        queue: &mut TaskQueue,
        id: TaskId,
        unit: UnitId,
        result: BlitResult<()>,
        stats: &mut DispatchStats,
    ) -> BlitResult<()> {
        let rec = queue
            .get_mut(id)
            .ok_or_else(|| BlitError::validation(format!("unknown task {id:?}")))?;
        rec.unit = Some(unit);
        match result {
            Ok(()) => {
                rec.state.advance(TaskState::Done)?;
                stats.done += 1;
                *stats.per_unit.entry(self.units[unit.0].kind()).or_default() += 1;
            }
            Err(e) => {
                tracing::error!(
                    task = id.0,
                    unit = self.units[unit.0].name(),
                    error = %e,
                    "draw task failed"
                );
                rec.state.advance(TaskState::Failed(e.to_string()))?;
                stats.failed += 1;
            }
        }
        Ok(())
    }

    /// Re-run a task rejected at execution time on the software unit.
    fn fall_back(
        &mut self,
        task: &DrawTask,
        image: &ImageDescriptor,
        target: &mut TargetBuffer,
        c: &Claimed,
        err: BlitError,
        stats: &mut DispatchStats,
    ) -> (UnitId, BlitResult<()>) {
        let Some(sw) = self.software_unit(c.unit) else {
            return (c.unit, Err(err));
        };
        tracing::debug!(task = c.id.0, error = %err, "falling back to software");
        stats.fallbacks += 1;
        let result = run_on(self.units[sw.0].as_mut(), task, image, target, &c.clip);
        (sw, result)
    }

    fn run_sequential(
        &mut self,
        queue: &mut TaskQueue,
        target: &mut TargetBuffer,
        c: Claimed,
        stats: &mut DispatchStats,
    ) -> BlitResult<()> {
        let Some(image) = Self::open(queue, &c, stats)? else {
            return Ok(());
        };
        let task = match queue.get(c.id) {
            Some(rec) => rec.task.clone(),
            None => return Err(BlitError::validation(format!("unknown task {:?}", c.id))),
        };
        let result = run_on(self.units[c.unit.0].as_mut(), &task, &image, target, &c.clip);
        let (unit, result) = match result {
            Err(e) if e.is_unsupported() => self.fall_back(&task, &image, target, &c, e, stats),
            other => (c.unit, other),
        };
        self.finish(queue, c.id, unit, result, stats)
    }

    /// Run pairwise-disjoint tasks concurrently, one worker per unit, each on a private copy
    /// of its clip region.
    fn run_wave(
        &mut self,
        queue: &mut TaskQueue,
        target: &mut TargetBuffer,
        wave: Vec<Claimed>,
        stats: &mut DispatchStats,
    ) -> BlitResult<()> {
        struct Job {
            claimed: Claimed,
            task: DrawTask,
            image: ImageDescriptor,
            sub: TargetBuffer,
        }

        let mut per_unit: BTreeMap<usize, Vec<Job>> = BTreeMap::new();
        for c in wave {
            let Some(image) = Self::open(queue, &c, stats)? else {
                continue;
            };
            let task = match queue.get(c.id) {
                Some(rec) => rec.task.clone(),
                None => return Err(BlitError::validation(format!("unknown task {:?}", c.id))),
            };
            let sub = target.extract(&c.clip)?;
            per_unit.entry(c.unit.0).or_default().push(Job {
                claimed: c,
                task,
                image,
                sub,
            });
        }

        let mut work: Vec<(&mut Box<dyn DrawUnit>, Vec<Job>)> = Vec::new();
        for (i, unit) in self.units.iter_mut().enumerate() {
            if let Some(jobs) = per_unit.remove(&i) {
                work.push((unit, jobs));
            }
        }
        let run = move || {
            work.into_par_iter()
                .flat_map_iter(|(unit, jobs)| {
                    jobs.into_iter()
                        .map(|mut job| {
                            let r = run_on(
                                &mut **unit,
                                &job.task,
                                &job.image,
                                &mut job.sub,
                                &job.claimed.clip,
                            );
                            (job, r)
                        })
                        .collect::<Vec<_>>()
                })
                .collect::<Vec<_>>()
        };
        let results = match &self.pool {
            Some(pool) => pool.install(run),
            None => run(),
        };

        for (mut job, result) in results {
            let c = job.claimed;
            let (unit, result) = match result {
                Err(e) if e.is_unsupported() => {
                    self.fall_back(&job.task, &job.image, &mut job.sub, &c, e, stats)
                }
                other => (c.unit, other),
            };
            if result.is_ok() {
                if let Some(ca) = job.sub.cache_area(&job.sub.area()) {
                    self.coherency.prepare_cpu_access(&ca);
                }
                target.write_back(&job.sub)?;
            }
            self.finish(queue, c.id, unit, result, stats)?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/dispatch.rs"]
mod tests;
