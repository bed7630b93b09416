use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::sync::oneshot;

use crate::error::{DispatchError, Result};
use crate::panic::panic_payload_message;

pub(crate) fn pair<R>() -> (JobCompleter<R>, JobResult<R>) {
	let (tx, rx) = oneshot::channel();
	(JobCompleter { tx }, JobResult { state: JobState::Waiting(rx) })
}

/// Producer half travelling with a job onto its context.
pub(crate) struct JobCompleter<R> {
	tx: oneshot::Sender<Result<R>>,
}

impl<R> JobCompleter<R> {
	/// Runs `f` and reports its value. A panic is reported as
	/// [`DispatchError::Panicked`] and then resumed so the context records it.
	pub(crate) fn complete<F: FnOnce() -> R>(self, f: F) {
		match std::panic::catch_unwind(AssertUnwindSafe(f)) {
			Ok(value) => {
				let _ = self.tx.send(Ok(value));
			}
			Err(payload) => {
				let _ = self.tx.send(Err(DispatchError::Panicked(panic_payload_message(payload.as_ref()))));
				std::panic::resume_unwind(payload);
			}
		}
	}

	pub(crate) fn fail(self, err: DispatchError) {
		let _ = self.tx.send(Err(err));
	}
}

/// Completion of a job handed to the [`Dispatcher`](crate::Dispatcher).
///
/// Resolves with the job's return value. Dropping it does not cancel the job.
#[must_use = "a JobResult does nothing unless awaited"]
pub struct JobResult<R> {
	state: JobState<R>,
}

enum JobState<R> {
	Failed(Option<DispatchError>),
	Waiting(oneshot::Receiver<Result<R>>),
}

impl<R> JobResult<R> {
	pub(crate) fn failed(err: DispatchError) -> Self {
		Self {
			state: JobState::Failed(Some(err)),
		}
	}
}

impl<R> Future for JobResult<R> {
	type Output = Result<R>;

	fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
		match &mut self.get_mut().state {
			JobState::Failed(err) => Poll::Ready(Err(err.take().unwrap_or(DispatchError::ShutDown))),
			// The completer is dropped unsent only when the job never ran.
			JobState::Waiting(rx) => Pin::new(rx).poll(cx).map(|res| res.unwrap_or(Err(DispatchError::ShutDown))),
		}
	}
}

impl<R> std::fmt::Debug for JobResult<R> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let state = match self.state {
			JobState::Failed(_) => "failed",
			JobState::Waiting(_) => "waiting",
		};
		f.debug_struct("JobResult").field("state", &state).finish()
	}
}
