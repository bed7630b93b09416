//! Unbounded FIFO mailbox shared by execution contexts and delivery loops.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::Notify;

/// Send failure carrying the rejected message back to the caller.
#[derive(Debug, PartialEq, Eq)]
pub struct MailboxClosed<T>(pub T);

impl<T> MailboxClosed<T> {
	pub fn into_inner(self) -> T {
		self.0
	}
}

impl<T> std::fmt::Display for MailboxClosed<T> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "mailbox closed")
	}
}

impl<T: std::fmt::Debug> std::error::Error for MailboxClosed<T> {}

struct State<T> {
	queue: VecDeque<T>,
	closed: bool,
}

struct Shared<T> {
	state: Mutex<State<T>>,
	notify: Notify,
}

impl<T> Shared<T> {
	fn close(&self) {
		self.state.lock().closed = true;
		self.notify.notify_waiters();
	}

	fn len(&self) -> usize {
		self.state.lock().queue.len()
	}
}

/// Producer half. Cheap to clone.
pub struct MailboxSender<T> {
	shared: Arc<Shared<T>>,
}

/// Consumer half. Cloning yields another consumer of the same queue, so a
/// pool of threads can drain one mailbox.
pub struct MailboxReceiver<T> {
	shared: Arc<Shared<T>>,
}

/// Unbounded FIFO mailbox.
///
/// Sending never waits; the lock is only held to push. Receiving is async,
/// so the same queue can feed runtime tasks and, through
/// [`futures::executor::block_on`], dedicated threads.
pub struct Mailbox<T> {
	shared: Arc<Shared<T>>,
}

impl<T> Clone for MailboxSender<T> {
	fn clone(&self) -> Self {
		Self {
			shared: Arc::clone(&self.shared),
		}
	}
}

impl<T> Clone for MailboxReceiver<T> {
	fn clone(&self) -> Self {
		Self {
			shared: Arc::clone(&self.shared),
		}
	}
}

impl<T> Default for Mailbox<T> {
	fn default() -> Self {
		Self::unbounded()
	}
}

impl<T> Mailbox<T> {
	pub fn unbounded() -> Self {
		Self {
			shared: Arc::new(Shared {
				state: Mutex::new(State {
					queue: VecDeque::new(),
					closed: false,
				}),
				notify: Notify::new(),
			}),
		}
	}

	pub fn sender(&self) -> MailboxSender<T> {
		MailboxSender {
			shared: Arc::clone(&self.shared),
		}
	}

	pub fn receiver(&self) -> MailboxReceiver<T> {
		MailboxReceiver {
			shared: Arc::clone(&self.shared),
		}
	}

	pub fn split(self) -> (MailboxSender<T>, MailboxReceiver<T>) {
		(self.sender(), self.receiver())
	}
}

impl<T> MailboxSender<T> {
	/// Appends one message, or hands it back if the mailbox is closed.
	pub fn send(&self, msg: T) -> Result<(), MailboxClosed<T>> {
		let mut state = self.shared.state.lock();
		if state.closed {
			return Err(MailboxClosed(msg));
		}
		state.queue.push_back(msg);
		drop(state);
		self.shared.notify.notify_one();
		Ok(())
	}

	/// Closes the mailbox. Receivers drain what is queued, then see `None`.
	pub fn close(&self) {
		self.shared.close();
	}

	pub fn is_closed(&self) -> bool {
		self.shared.state.lock().closed
	}

	pub fn len(&self) -> usize {
		self.shared.len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}

impl<T> MailboxReceiver<T> {
	/// Next message, or `None` once the mailbox is closed and drained.
	pub async fn recv(&self) -> Option<T> {
		loop {
			let notified = {
				let mut state = self.shared.state.lock();
				if let Some(msg) = state.queue.pop_front() {
					return Some(msg);
				}
				if state.closed {
					return None;
				}
				// Created under the lock so a racing close() still wakes us.
				self.shared.notify.notified()
			};
			notified.await;
		}
	}

	pub fn try_recv(&self) -> Option<T> {
		self.shared.state.lock().queue.pop_front()
	}

	/// Closes the mailbox from the consuming side.
	pub fn close(&self) {
		self.shared.close();
	}

	pub fn len(&self) -> usize {
		self.shared.len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}
