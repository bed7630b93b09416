//! Named execution contexts.
//!
//! A context is one or more dedicated OS threads draining a shared FIFO job
//! mailbox. Single-threaded contexts (global, regions) execute jobs strictly
//! in post order; the async pool context spreads jobs over its threads.

use std::cell::Cell;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::JoinHandle;

use parking_lot::Mutex;

use crate::affinity::RegionId;
use crate::error::{DispatchError, Result};
use crate::mailbox::{Mailbox, MailboxReceiver, MailboxSender};
use crate::panic::panic_payload_message;
use crate::{TaskClass, spawn_named_thread};

pub(crate) type Job = Box<dyn FnOnce() + Send + 'static>;

/// Identifies one execution context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContextId {
	/// The single global context (main thread equivalent).
	Global,
	/// One region of a partitioned host.
	Region(RegionId),
	/// The dedicated async pool.
	AsyncPool,
}

impl std::fmt::Display for ContextId {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::Global => write!(f, "global"),
			Self::Region(id) => write!(f, "region-{id}"),
			Self::AsyncPool => write!(f, "async-pool"),
		}
	}
}

thread_local! {
	static CURRENT: Cell<Option<ContextId>> = const { Cell::new(None) };
}

/// Returns the execution context the calling thread belongs to, if any.
pub fn current_context() -> Option<ContextId> {
	CURRENT.with(Cell::get)
}

/// Status snapshot for one execution context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextRecord {
	pub id: ContextId,
	pub name: String,
	pub threads: usize,
	pub pending: usize,
	pub executed: u64,
	pub panicked: u64,
}

#[derive(Debug, Default)]
struct ContextStats {
	executed: AtomicU64,
	panicked: AtomicU64,
}

pub(crate) struct ExecutionContext {
	id: ContextId,
	name: String,
	tx: MailboxSender<Job>,
	stats: Arc<ContextStats>,
	threads: Mutex<Vec<JoinHandle<()>>>,
	thread_count: usize,
}

impl ExecutionContext {
	/// Starts a context backed by `threads` named OS threads.
	pub(crate) fn start(id: ContextId, name: &str, threads: usize, class: TaskClass, runtime: tokio::runtime::Handle) -> Result<Self> {
		let (tx, rx) = Mailbox::<Job>::unbounded().split();
		let stats = Arc::new(ContextStats::default());
		let mut handles = Vec::with_capacity(threads);

		for idx in 0..threads {
			let thread_name = if threads == 1 { name.to_string() } else { format!("{name}-{idx}") };
			let rx = rx.clone();
			let stats = Arc::clone(&stats);
			let runtime = runtime.clone();
			match spawn_named_thread(class, thread_name, move || run_context(id, rx, stats, runtime)) {
				Ok(handle) => handles.push(handle),
				Err(err) => {
					tx.close();
					for handle in handles {
						let _ = handle.join();
					}
					return Err(DispatchError::Unavailable(format!("failed to spawn {name} thread: {err}")));
				}
			}
		}

		tracing::debug!(context = %id, threads, "dispatch.context.start");
		Ok(Self {
			id,
			name: name.to_string(),
			tx,
			stats,
			threads: Mutex::new(handles),
			thread_count: threads,
		})
	}

	/// Queues one job. Fails once the context is shut down.
	pub(crate) fn post(&self, job: Job) -> Result<()> {
		self.tx.send(job).map_err(|_| DispatchError::ShutDown)
	}

	/// Closes the mailbox without waiting for the threads.
	pub(crate) fn close(&self) {
		self.tx.close();
	}

	/// Closes the mailbox, lets queued jobs drain, and joins the threads.
	///
	/// A context thread shutting down its own context skips joining itself.
	pub(crate) fn shutdown(&self) {
		self.tx.close();
		let handles = std::mem::take(&mut *self.threads.lock());
		let me = std::thread::current().id();
		for handle in handles {
			if handle.thread().id() == me {
				continue;
			}
			if handle.join().is_err() {
				tracing::error!(context = %self.id, "dispatch.context.join_failed");
			}
		}
	}

	pub(crate) fn record(&self) -> ContextRecord {
		ContextRecord {
			id: self.id,
			name: self.name.clone(),
			threads: self.thread_count,
			pending: self.tx.len(),
			executed: self.stats.executed.load(Ordering::Relaxed),
			panicked: self.stats.panicked.load(Ordering::Relaxed),
		}
	}
}

fn run_context(id: ContextId, rx: MailboxReceiver<Job>, stats: Arc<ContextStats>, runtime: tokio::runtime::Handle) {
	CURRENT.with(|current| current.set(Some(id)));
	// Jobs may schedule timers; give them the dispatcher's runtime.
	let _guard = runtime.enter();

	while let Some(job) = futures::executor::block_on(rx.recv()) {
		match std::panic::catch_unwind(AssertUnwindSafe(job)) {
			Ok(()) => {
				stats.executed.fetch_add(1, Ordering::Relaxed);
			}
			Err(payload) => {
				stats.panicked.fetch_add(1, Ordering::Relaxed);
				tracing::error!(context = %id, panic = %panic_payload_message(payload.as_ref()), "dispatch.context.job_panicked");
			}
		}
	}

	tracing::debug!(context = %id, "dispatch.context.exit");
}

#[cfg(test)]
mod tests {
	use std::sync::mpsc;
	use std::time::Duration;

	use super::*;

	fn runtime() -> tokio::runtime::Handle {
		crate::spawn::runtime_handle()
	}

	#[test]
	fn single_thread_context_runs_jobs_in_order() {
		let ctx = ExecutionContext::start(ContextId::Global, "test-global", 1, TaskClass::Render, runtime()).unwrap();
		let (tx, rx) = mpsc::channel();
		for i in 0..10 {
			let tx = tx.clone();
			ctx.post(Box::new(move || tx.send(i).unwrap())).unwrap();
		}
		let got: Vec<_> = (0..10).map(|_| rx.recv_timeout(Duration::from_secs(1)).unwrap()).collect();
		assert_eq!(got, (0..10).collect::<Vec<_>>());
		ctx.shutdown();
	}

	#[test]
	fn jobs_observe_their_context() {
		let ctx = ExecutionContext::start(ContextId::Region(3), "test-region", 1, TaskClass::Render, runtime()).unwrap();
		let (tx, rx) = mpsc::channel();
		ctx.post(Box::new(move || tx.send(current_context()).unwrap())).unwrap();
		assert_eq!(rx.recv_timeout(Duration::from_secs(1)).unwrap(), Some(ContextId::Region(3)));
		assert_eq!(current_context(), None);
		ctx.shutdown();
	}

	#[test]
	fn panicking_job_does_not_kill_context() {
		let ctx = ExecutionContext::start(ContextId::Global, "test-panic", 1, TaskClass::Render, runtime()).unwrap();
		let (tx, rx) = mpsc::channel();
		ctx.post(Box::new(|| panic!("job exploded"))).unwrap();
		ctx.post(Box::new(move || tx.send("after").unwrap())).unwrap();
		assert_eq!(rx.recv_timeout(Duration::from_secs(1)).unwrap(), "after");

		ctx.shutdown();
		let record = ctx.record();
		assert_eq!(record.panicked, 1);
		assert_eq!(record.executed, 1);
	}

	#[test]
	fn shutdown_drains_queued_jobs_then_rejects_posts() {
		let ctx = ExecutionContext::start(ContextId::AsyncPool, "test-pool", 2, TaskClass::Parse, runtime()).unwrap();
		let (tx, rx) = mpsc::channel();
		for i in 0..4 {
			let tx = tx.clone();
			ctx.post(Box::new(move || tx.send(i).unwrap())).unwrap();
		}
		ctx.shutdown();

		let mut got: Vec<_> = rx.try_iter().collect();
		got.sort_unstable();
		assert_eq!(got, vec![0, 1, 2, 3]);
		assert_eq!(ctx.post(Box::new(|| {})), Err(DispatchError::ShutDown));
	}
}
