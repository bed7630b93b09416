use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio_util::sync::CancellationToken;

/// Monotonic id clock for scheduled tasks.
#[derive(Debug, Default, Clone)]
pub(crate) struct TaskIdClock {
	next: Arc<AtomicU64>,
}

impl TaskIdClock {
	pub fn new() -> Self {
		Self::default()
	}

	/// Returns the next task id, starting at 1.
	pub fn next(&self) -> u64 {
		self.next.fetch_add(1, Ordering::AcqRel).wrapping_add(1)
	}
}

/// Cancellable handle for delayed and periodic work.
///
/// The handle is the same whichever [`ExecutionStrategy`](crate::ExecutionStrategy)
/// backs the dispatcher. Dropping it does not cancel the task.
#[derive(Debug, Clone)]
pub struct ScheduledTaskHandle {
	id: u64,
	cancel: CancellationToken,
}

impl ScheduledTaskHandle {
	pub(crate) fn new(id: u64, cancel: CancellationToken) -> Self {
		Self { id, cancel }
	}

	/// Returns the dispatcher-unique task id.
	pub const fn id(&self) -> u64 {
		self.id
	}

	/// Requests cancellation. Idempotent.
	///
	/// A run that is already executing on its context completes; no further
	/// runs start.
	pub fn cancel(&self) {
		if !self.cancel.is_cancelled() {
			tracing::trace!(task_id = self.id, "dispatch.task.cancel");
		}
		self.cancel.cancel();
	}

	/// Returns true once the task was cancelled directly or through
	/// [`Dispatcher::cancel_all`](crate::Dispatcher::cancel_all).
	pub fn is_cancelled(&self) -> bool {
		self.cancel.is_cancelled()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn ids_are_monotonic_from_one() {
		let clock = TaskIdClock::new();
		assert_eq!(clock.next(), 1);
		assert_eq!(clock.next(), 2);
		assert_eq!(clock.clone().next(), 3);
	}

	#[test]
	fn cancel_is_idempotent_and_shared_between_clones() {
		let handle = ScheduledTaskHandle::new(1, CancellationToken::new());
		let copy = handle.clone();
		assert!(!handle.is_cancelled());
		handle.cancel();
		handle.cancel();
		assert!(copy.is_cancelled());
	}

	#[test]
	fn parent_cancellation_is_observed() {
		let root = CancellationToken::new();
		let handle = ScheduledTaskHandle::new(7, root.child_token());
		root.cancel();
		assert!(handle.is_cancelled());
		assert_eq!(handle.id(), 7);
	}
}
