//! Platform-adaptive task dispatcher.
//!
//! One [`ExecutionStrategy`] is selected at startup from a [`HostProbe`] and
//! the configured [`DispatchOptions`]. Every scheduling operation keeps the
//! same contract across strategies: delayed and periodic work returns a
//! [`ScheduledTaskHandle`], recipient-bound work runs on the context owning
//! the recipient, and async work never runs on the global context.
//!
//! Do not block a context thread on a [`JobResult`] for work routed to that
//! same context; the job would never get to run.

mod job;
#[cfg(test)]
mod tests;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

pub use job::JobResult;
use parking_lot::Mutex;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::affinity::{ContextAffinity, RegionId};
use crate::context::{ContextId, ContextRecord, ExecutionContext};
use crate::error::{DispatchError, Result};
use crate::handle::{ScheduledTaskHandle, TaskIdClock};
use crate::spawn::{runtime_handle, spawn_blocking_on, spawn_on};
use crate::strategy::{DispatchOptions, ExecutionStrategy, HostCapabilities, HostProbe};
use crate::TaskClass;

const MIN_PERIOD: Duration = Duration::from_millis(1);

/// Cheaply cloneable handle to the running dispatcher.
#[derive(Clone)]
pub struct Dispatcher {
	inner: Arc<DispatcherInner>,
}

struct DispatcherInner {
	strategy: ExecutionStrategy,
	global: ExecutionContext,
	regions: Vec<ExecutionContext>,
	pool: Option<ExecutionContext>,
	runtime: tokio::runtime::Handle,
	root: Mutex<CancellationToken>,
	ids: TaskIdClock,
	shut_down: AtomicBool,
}

impl Drop for DispatcherInner {
	fn drop(&mut self) {
		self.root.lock().cancel();
		for ctx in &self.regions {
			ctx.close();
		}
		if let Some(pool) = &self.pool {
			pool.close();
		}
		self.global.close();
	}
}

type Bound = (ExecutionStrategy, Vec<ExecutionContext>, Option<ExecutionContext>);

impl Dispatcher {
	/// Probes the host, binds the richest permitted strategy, and starts the
	/// execution contexts.
	///
	/// A strategy that fails to bind falls back to
	/// [`ExecutionStrategy::Unified`]. Only failing to start the global
	/// context itself is an error.
	pub fn start(options: DispatchOptions, probe: &dyn HostProbe) -> Result<Self> {
		let caps = probe.probe();
		let requested = ExecutionStrategy::select(&options, &caps);
		let runtime = runtime_handle();
		let global = ExecutionContext::start(ContextId::Global, "herald-global", 1, TaskClass::Render, runtime.clone())?;

		let (strategy, regions, pool) = match bind(requested, &caps, probe, &runtime) {
			Ok(bound) => bound,
			Err(err) => {
				tracing::warn!(requested = requested.name(), error = %err, "dispatch.fallback");
				(ExecutionStrategy::Unified, Vec::new(), None)
			}
		};

		tracing::info!(
			strategy = strategy.name(),
			regions = regions.len(),
			async_workers = pool.as_ref().map_or(0, |p| p.record().threads),
			"dispatch.start"
		);

		Ok(Self {
			inner: Arc::new(DispatcherInner {
				strategy,
				global,
				regions,
				pool,
				runtime,
				root: Mutex::new(CancellationToken::new()),
				ids: TaskIdClock::new(),
				shut_down: AtomicBool::new(false),
			}),
		})
	}

	/// Starts a dispatcher that never probes for richer modes.
	pub fn unified() -> Result<Self> {
		let options = DispatchOptions {
			preference: crate::StrategyPreference::Unified,
			..DispatchOptions::default()
		};
		Self::start(options, &HostCapabilities::default())
	}

	/// Strategy bound at startup.
	pub fn strategy(&self) -> ExecutionStrategy {
		self.inner.strategy
	}

	pub fn is_shut_down(&self) -> bool {
		self.inner.shut_down.load(Ordering::Acquire)
	}

	/// Runs `job` on the global context as soon as possible.
	pub fn run_now<F>(&self, job: F) -> Result<()>
	where
		F: FnOnce() + Send + 'static,
	{
		self.ensure_running()?;
		self.inner.global.post(Box::new(job))
	}

	/// Runs `f` on the global context and resolves with its value.
	pub fn run_now_async<F, R>(&self, f: F) -> JobResult<R>
	where
		F: FnOnce() -> R + Send + 'static,
		R: Send + 'static,
	{
		if let Err(err) = self.ensure_running() {
			return JobResult::failed(err);
		}
		let (done, result) = job::pair();
		match self.inner.global.post(Box::new(move || done.complete(f))) {
			Ok(()) => result,
			Err(err) => JobResult::failed(err),
		}
	}

	/// Runs `job` on the global context once `delay` has elapsed.
	pub fn run_later<F>(&self, delay: Duration, job: F) -> Result<ScheduledTaskHandle>
	where
		F: FnOnce() + Send + 'static,
	{
		self.schedule_once(delay, move |inner, token| {
			inner.global.post(Box::new(move || {
				if !token.is_cancelled() {
					job();
				}
			}))
		})
	}

	/// Runs `job` on the global context after `delay`, then every `period`
	/// until cancelled.
	///
	/// Runs never overlap: each tick is a separate job on the single global
	/// context. Ticks missed while the context is busy are skipped.
	pub fn run_every<F>(&self, delay: Duration, period: Duration, job: F) -> Result<ScheduledTaskHandle>
	where
		F: Fn() + Send + Sync + 'static,
	{
		self.ensure_running()?;
		let (handle, token) = self.new_handle();
		let task_id = handle.id();
		let weak = Arc::downgrade(&self.inner);
		let job = Arc::new(job);
		let period = period.max(MIN_PERIOD);

		spawn_on(&self.inner.runtime, TaskClass::Timer, async move {
			tokio::select! {
				biased;
				() = token.cancelled() => return,
				() = tokio::time::sleep(delay) => {}
			}

			let mut ticker = tokio::time::interval(period);
			ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
			ticker.tick().await;

			loop {
				let Some(inner) = weak.upgrade() else { break };
				let run = Arc::clone(&job);
				let guard = token.clone();
				let posted = inner.global.post(Box::new(move || {
					if !guard.is_cancelled() {
						run();
					}
				}));
				drop(inner);
				if posted.is_err() {
					break;
				}

				tokio::select! {
					biased;
					() = token.cancelled() => break,
					_ = ticker.tick() => {}
				}
			}
			tracing::trace!(task_id, "dispatch.timer.stopped");
		});

		Ok(handle)
	}

	/// Runs `job` on the context owning `target`.
	///
	/// The target is checked here and again right before `job` executes; a
	/// target retired in between silently drops the job.
	pub fn run_bound<A, F>(&self, target: &A, job: F) -> Result<()>
	where
		A: ContextAffinity + Clone + 'static,
		F: FnOnce() + Send + 'static,
	{
		self.ensure_running()?;
		post_bound(&self.inner, target, job)
	}

	/// Runs `f` on the context owning `target` and resolves with its value.
	pub fn run_bound_async<A, F, R>(&self, target: &A, f: F) -> JobResult<R>
	where
		A: ContextAffinity + Clone + 'static,
		F: FnOnce() -> R + Send + 'static,
		R: Send + 'static,
	{
		if let Err(err) = self.ensure_running() {
			return JobResult::failed(err);
		}
		if !target.is_valid() {
			return JobResult::failed(DispatchError::TargetRetired);
		}

		let (done, result) = job::pair();
		let guard = target.clone();
		let posted = self.inner.context_for(target.region()).post(Box::new(move || {
			if guard.is_valid() {
				done.complete(f);
			} else {
				done.fail(DispatchError::TargetRetired);
			}
		}));
		match posted {
			Ok(()) => result,
			Err(err) => JobResult::failed(err),
		}
	}

	/// Runs `job` on the context owning `target` once `delay` has elapsed.
	///
	/// The owning region is resolved when the delay expires, so a target
	/// that moved in the meantime is served by its new region.
	pub fn run_bound_later<A, F>(&self, target: &A, delay: Duration, job: F) -> Result<ScheduledTaskHandle>
	where
		A: ContextAffinity + Clone + 'static,
		F: FnOnce() + Send + 'static,
	{
		let target = target.clone();
		self.schedule_once(delay, move |inner, token| {
			post_bound(inner, &target, move || {
				if !token.is_cancelled() {
					job();
				}
			})
		})
	}

	/// Runs `f` off the global context and resolves with its value.
	///
	/// Uses the dedicated pool when the strategy has one, otherwise the
	/// runtime's blocking pool.
	pub fn run_async<F, R>(&self, f: F) -> JobResult<R>
	where
		F: FnOnce() -> R + Send + 'static,
		R: Send + 'static,
	{
		if let Err(err) = self.ensure_running() {
			return JobResult::failed(err);
		}
		let (done, result) = job::pair();
		match &self.inner.pool {
			Some(pool) => {
				if let Err(err) = pool.post(Box::new(move || done.complete(f))) {
					return JobResult::failed(err);
				}
			}
			None => {
				let _ = spawn_blocking_on(&self.inner.runtime, TaskClass::Parse, move || done.complete(f));
			}
		}
		result
	}

	/// Cancels every outstanding delayed and periodic task.
	///
	/// The dispatcher stays usable; tasks scheduled afterwards are unaffected.
	pub fn cancel_all(&self) {
		let mut root = self.inner.root.lock();
		root.cancel();
		*root = CancellationToken::new();
		tracing::debug!("dispatch.cancel_all");
	}

	/// Cancels all timers, drains queued jobs, and stops every context.
	///
	/// Later submissions fail with [`DispatchError::ShutDown`]. Idempotent.
	pub fn shutdown(&self) {
		if self.inner.shut_down.swap(true, Ordering::AcqRel) {
			return;
		}
		self.inner.root.lock().cancel();
		for ctx in &self.inner.regions {
			ctx.shutdown();
		}
		if let Some(pool) = &self.inner.pool {
			pool.shutdown();
		}
		self.inner.global.shutdown();
		tracing::info!(strategy = self.inner.strategy.name(), "dispatch.shutdown");
	}

	/// Status snapshot of every execution context.
	pub fn snapshots(&self) -> Vec<ContextRecord> {
		let inner = &self.inner;
		std::iter::once(&inner.global)
			.chain(inner.regions.iter())
			.chain(inner.pool.iter())
			.map(ExecutionContext::record)
			.collect()
	}

	fn ensure_running(&self) -> Result<()> {
		if self.is_shut_down() { Err(DispatchError::ShutDown) } else { Ok(()) }
	}

	fn new_handle(&self) -> (ScheduledTaskHandle, CancellationToken) {
		let token = self.inner.root.lock().child_token();
		let handle = ScheduledTaskHandle::new(self.inner.ids.next(), token.clone());
		(handle, token)
	}

	fn schedule_once<P>(&self, delay: Duration, post: P) -> Result<ScheduledTaskHandle>
	where
		P: FnOnce(&DispatcherInner, CancellationToken) -> Result<()> + Send + 'static,
	{
		self.ensure_running()?;
		let (handle, token) = self.new_handle();
		let task_id = handle.id();
		let weak: Weak<DispatcherInner> = Arc::downgrade(&self.inner);

		spawn_on(&self.inner.runtime, TaskClass::Timer, async move {
			tokio::select! {
				biased;
				() = token.cancelled() => {}
				() = tokio::time::sleep(delay) => {
					let Some(inner) = weak.upgrade() else { return };
					if let Err(err) = post(&inner, token.clone()) {
						tracing::debug!(task_id, error = %err, "dispatch.timer.dropped");
					}
				}
			}
		});

		Ok(handle)
	}
}

impl std::fmt::Debug for Dispatcher {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Dispatcher")
			.field("strategy", &self.inner.strategy)
			.field("shut_down", &self.is_shut_down())
			.finish_non_exhaustive()
	}
}

impl DispatcherInner {
	fn context_for(&self, region: Option<RegionId>) -> &ExecutionContext {
		match region {
			Some(region) if !self.regions.is_empty() => &self.regions[region as usize % self.regions.len()],
			_ => &self.global,
		}
	}
}

fn post_bound<A, F>(inner: &DispatcherInner, target: &A, job: F) -> Result<()>
where
	A: ContextAffinity + Clone + 'static,
	F: FnOnce() + Send + 'static,
{
	if !target.is_valid() {
		return Err(DispatchError::TargetRetired);
	}
	let guard = target.clone();
	inner.context_for(target.region()).post(Box::new(move || {
		if guard.is_valid() {
			job();
		} else {
			tracing::trace!("dispatch.bound.retired");
		}
	}))
}

fn bind(requested: ExecutionStrategy, caps: &HostCapabilities, probe: &dyn HostProbe, runtime: &tokio::runtime::Handle) -> Result<Bound> {
	match requested {
		ExecutionStrategy::Unified => Ok((requested, Vec::new(), None)),
		ExecutionStrategy::UnifiedWithAsyncPool { workers } => {
			if !caps.async_pool {
				return Err(DispatchError::Unavailable("host does not allow a dedicated async pool".into()));
			}
			let pool = start_pool(workers, runtime)?;
			Ok((requested, Vec::new(), Some(pool)))
		}
		ExecutionStrategy::Partitioned { regions, async_workers } => {
			if !caps.partitioned {
				return Err(DispatchError::Unavailable("host does not expose region schedulers".into()));
			}
			if regions == 0 {
				return Err(DispatchError::Unavailable("partitioned mode needs at least one region".into()));
			}

			let mut contexts = Vec::with_capacity(regions);
			for idx in 0..regions {
				let started = RegionId::try_from(idx)
					.map_err(|_| DispatchError::Unavailable(format!("region index {idx} out of range")))
					.and_then(|region| {
						probe.bind_region(region).map_err(DispatchError::Unavailable)?;
						ExecutionContext::start(
							ContextId::Region(region),
							&format!("herald-region-{region}"),
							1,
							TaskClass::Render,
							runtime.clone(),
						)
					});
				match started {
					Ok(ctx) => contexts.push(ctx),
					Err(err) => {
						contexts.iter().for_each(ExecutionContext::shutdown);
						return Err(err);
					}
				}
			}

			// Regions still bind when the host forbids a pool; async work then
			// goes to the runtime's blocking pool.
			let async_workers = if caps.async_pool { async_workers } else { 0 };
			let pool = if async_workers > 0 {
				match start_pool(async_workers, runtime) {
					Ok(pool) => Some(pool),
					Err(err) => {
						contexts.iter().for_each(ExecutionContext::shutdown);
						return Err(err);
					}
				}
			} else {
				None
			};
			Ok((ExecutionStrategy::Partitioned { regions, async_workers }, contexts, pool))
		}
	}
}

fn start_pool(workers: usize, runtime: &tokio::runtime::Handle) -> Result<ExecutionContext> {
	if workers == 0 {
		return Err(DispatchError::Unavailable("async pool needs at least one worker".into()));
	}
	ExecutionContext::start(ContextId::AsyncPool, "herald-async", workers, TaskClass::Parse, runtime.clone())
}
