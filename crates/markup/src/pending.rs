use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use herald_worker::{DispatchError, JobResult};
use tokio::sync::oneshot;

use crate::error::MarkupError;
use crate::message::ParsedMessage;

/// Parse result that is either already available or still being produced.
///
/// Awaiting it never blocks a thread. A parse whose worker panicked
/// resolves to an empty message; one whose job was dropped resolves to
/// [`MarkupError::Abandoned`].
#[must_use = "a PendingParse does nothing unless awaited"]
pub struct PendingParse {
	state: State,
}

enum State {
	Ready(Option<Arc<ParsedMessage>>),
	Channel(oneshot::Receiver<Arc<ParsedMessage>>),
	Dispatched(JobResult<Arc<ParsedMessage>>),
}

/// Producer half returned by [`PendingParse::channel`].
#[derive(Debug)]
pub struct ParseCompleter {
	tx: oneshot::Sender<Arc<ParsedMessage>>,
}

impl ParseCompleter {
	pub fn complete(self, message: Arc<ParsedMessage>) {
		let _ = self.tx.send(message);
	}
}

impl PendingParse {
	/// Already-resolved parse; no context hop when awaited.
	pub fn ready(message: Arc<ParsedMessage>) -> Self {
		Self {
			state: State::Ready(Some(message)),
		}
	}

	/// Pending parse resolved by whoever holds the completer.
	///
	/// Dropping the completer resolves the parse to [`MarkupError::Abandoned`].
	pub fn channel() -> (ParseCompleter, Self) {
		let (tx, rx) = oneshot::channel();
		(ParseCompleter { tx }, Self { state: State::Channel(rx) })
	}

	pub(crate) fn dispatched(job: JobResult<Arc<ParsedMessage>>) -> Self {
		Self {
			state: State::Dispatched(job),
		}
	}

	/// True when the result was available synchronously.
	pub fn is_ready(&self) -> bool {
		matches!(self.state, State::Ready(Some(_)))
	}
}

impl Future for PendingParse {
	type Output = Result<Arc<ParsedMessage>, MarkupError>;

	fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
		match &mut self.get_mut().state {
			State::Ready(message) => Poll::Ready(message.take().ok_or(MarkupError::Abandoned)),
			State::Channel(rx) => Pin::new(rx).poll(cx).map(|res| res.map_err(|_| MarkupError::Abandoned)),
			State::Dispatched(job) => Pin::new(job).poll(cx).map(|res| match res {
				Ok(message) => Ok(message),
				Err(DispatchError::Panicked(panic)) => {
					tracing::warn!(%panic, "markup.parse.failed");
					Ok(Arc::new(ParsedMessage::empty()))
				}
				Err(err) => {
					tracing::debug!(error = %err, "markup.parse.abandoned");
					Err(MarkupError::Abandoned)
				}
			}),
		}
	}
}

impl std::fmt::Debug for PendingParse {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let state = match self.state {
			State::Ready(_) => "ready",
			State::Channel(_) => "channel",
			State::Dispatched(_) => "dispatched",
		};
		f.debug_struct("PendingParse").field("state", &state).finish()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::segment::Segment;

	#[tokio::test]
	async fn ready_resolves_immediately() {
		let message = Arc::new(ParsedMessage::new(vec![Segment::Text("hi".into())]));
		let pending = PendingParse::ready(Arc::clone(&message));
		assert!(pending.is_ready());
		assert!(Arc::ptr_eq(&pending.await.unwrap(), &message));
	}

	#[tokio::test]
	async fn channel_resolves_when_completed() {
		let (done, pending) = PendingParse::channel();
		assert!(!pending.is_ready());
		done.complete(Arc::new(ParsedMessage::empty()));
		assert!(pending.await.unwrap().is_empty());
	}

	#[tokio::test]
	async fn dropped_completer_abandons() {
		let (done, pending) = PendingParse::channel();
		drop(done);
		assert_eq!(pending.await, Err(MarkupError::Abandoned));
	}
}
