//! Error types for dispatch operations.

use thiserror::Error;

/// Errors surfaced by the [`Dispatcher`](crate::Dispatcher).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
	/// The dispatcher (or the context a job was routed to) has shut down.
	#[error("dispatcher has shut down")]
	ShutDown,

	/// The recipient a job was bound to is no longer valid.
	#[error("bound target is no longer valid")]
	TargetRetired,

	/// A concurrency mode could not be bound on this host.
	#[error("dispatch mode unavailable: {0}")]
	Unavailable(String),

	/// The job panicked while running on its context.
	#[error("job panicked: {0}")]
	Panicked(String),
}

/// Result type for dispatch operations.
pub type Result<T> = std::result::Result<T, DispatchError>;
