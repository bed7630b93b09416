//! Per-identity ordered delivery.
//!
//! Every identity gets one worker loop pulling tickets from a FIFO mailbox.
//! The loop awaits a ticket's parse, then its render hand-off, before it
//! takes the next ticket, so parses completing out of order still render
//! in submission order. Idle loops remove themselves from the queue table.


use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use herald_markup::PendingParse;
use herald_worker::{Mailbox, MailboxReceiver, MailboxSender, TaskClass};
use parking_lot::Mutex;
use tokio::time::Instant;

use crate::identity::Identity;
use crate::placeholder::Substitutions;
use crate::recipient::RecipientDirectory;
use crate::render::Renderer;

pub const DEFAULT_IDLE_REAP: Duration = Duration::from_secs(30);
pub const DEFAULT_STALL_WARNING: Duration = Duration::from_secs(10);

/// One queued, not-yet-rendered delivery.
#[derive(Debug)]
pub struct DeliveryTicket {
	pub parse: PendingParse,
	pub substitutions: Substitutions,
}

#[derive(Debug, Clone, Copy)]
pub struct QueueOptions {
	/// How long a loop may sit idle before it removes itself.
	pub idle_reap: Duration,
	/// In-flight age after which [`OrderedDeliveryQueue::sweep`] reports a queue.
	pub stall_warning: Duration,
}

impl Default for QueueOptions {
	fn default() -> Self {
		Self {
			idle_reap: DEFAULT_IDLE_REAP,
			stall_warning: DEFAULT_STALL_WARNING,
		}
	}
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStats {
	pub queues: usize,
	pub pending: usize,
	pub in_flight: usize,
	pub delivered: u64,
	pub dropped: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
	/// Entries whose loop had already exited.
	pub removed: usize,
	/// Queues whose in-flight ticket is older than the stall warning.
	pub stalled: usize,
}

/// Per-identity FIFO delivery in front of the [`Renderer`].
///
/// Submitting never blocks and never fails; tickets that cannot be
/// rendered are counted as dropped.
#[derive(Clone)]
pub struct OrderedDeliveryQueue {
	shared: Arc<QueueShared>,
}

struct QueueShared {
	queues: DashMap<Identity, QueueEntry>,
	directory: Arc<RecipientDirectory>,
	renderer: Renderer,
	options: QueueOptions,
	next_id: AtomicU64,
	delivered: AtomicU64,
	dropped: AtomicU64,
	closed: AtomicBool,
}

struct QueueEntry {
	id: u64,
	tx: MailboxSender<DeliveryTicket>,
	state: Arc<LoopState>,
}

#[derive(Default)]
struct LoopState {
	/// Tickets sent but not yet taken by the loop.
	queued: AtomicUsize,
	in_flight_since: Mutex<Option<Instant>>,
	exited: AtomicBool,
}

impl OrderedDeliveryQueue {
	pub fn new(directory: Arc<RecipientDirectory>, renderer: Renderer, options: QueueOptions) -> Self {
		Self {
			shared: Arc::new(QueueShared {
				queues: DashMap::new(),
				directory,
				renderer,
				options,
				next_id: AtomicU64::new(1),
				delivered: AtomicU64::new(0),
				dropped: AtomicU64::new(0),
				closed: AtomicBool::new(false),
			}),
		}
	}

	/// Appends a ticket to `identity`'s queue, starting a loop if none runs.
	pub fn submit(&self, identity: Identity, parse: PendingParse, substitutions: Substitutions) {
		let shared = &self.shared;
		if shared.closed.load(Ordering::Acquire) {
			shared.dropped.fetch_add(1, Ordering::Relaxed);
			tracing::debug!(%identity, reason = "closed", "delivery.drop");
			return;
		}

		let ticket = DeliveryTicket { parse, substitutions };
		// Sends happen under the entry guard so an idle loop cannot reap the
		// queue between our lookup and our send.
		match shared.queues.entry(identity) {
			Entry::Occupied(mut occupied) => {
				if let Err(ticket) = enqueue(occupied.get(), ticket) {
					let fresh = spawn_queue(shared, occupied.key().clone());
					if enqueue(&fresh, ticket).is_err() {
						shared.drop_ticket(occupied.key(), "closed", "fresh queue rejected ticket");
					}
					occupied.insert(fresh);
				}
			}
			Entry::Vacant(vacant) => {
				let fresh = spawn_queue(shared, vacant.key().clone());
				if enqueue(&fresh, ticket).is_err() {
					shared.drop_ticket(vacant.key(), "closed", "fresh queue rejected ticket");
				}
				vacant.insert(fresh);
			}
		}
	}

	/// Removes entries whose loop has exited and reports stalled queues.
	pub fn sweep(&self) -> SweepReport {
		let shared = &self.shared;
		let before = shared.queues.len();
		shared.queues.retain(|_, entry| !entry.state.exited.load(Ordering::Acquire));
		let removed = before.saturating_sub(shared.queues.len());

		let now = Instant::now();
		let mut stalled = 0;
		for entry in shared.queues.iter() {
			let since = *entry.state.in_flight_since.lock();
			if let Some(since) = since
				&& now.saturating_duration_since(since) > shared.options.stall_warning
			{
				stalled += 1;
				tracing::warn!(
					identity = %entry.key(),
					in_flight_ms = u64::try_from(now.saturating_duration_since(since).as_millis()).unwrap_or(u64::MAX),
					pending = entry.state.queued.load(Ordering::Acquire),
					"delivery.queue.stalled"
				);
			}
		}
		if removed > 0 {
			tracing::debug!(removed, "delivery.queue.sweep");
		}
		SweepReport { removed, stalled }
	}

	pub fn stats(&self) -> QueueStats {
		let shared = &self.shared;
		let mut stats = QueueStats {
			delivered: shared.delivered.load(Ordering::Relaxed),
			dropped: shared.dropped.load(Ordering::Relaxed),
			..QueueStats::default()
		};
		for entry in shared.queues.iter() {
			stats.queues += 1;
			stats.pending += entry.state.queued.load(Ordering::Acquire);
			if entry.state.in_flight_since.lock().is_some() {
				stats.in_flight += 1;
			}
		}
		stats
	}

	pub fn len(&self) -> usize {
		self.shared.queues.len()
	}

	pub fn is_empty(&self) -> bool {
		self.shared.queues.is_empty()
	}

	/// Stops accepting tickets and closes every mailbox. Loops drain what
	/// is already queued and exit.
	pub fn shutdown(&self) {
		if self.shared.closed.swap(true, Ordering::AcqRel) {
			return;
		}
		for entry in self.shared.queues.iter() {
			entry.tx.close();
		}
		tracing::debug!(queues = self.shared.queues.len(), "delivery.queue.shutdown");
	}
}

fn enqueue(entry: &QueueEntry, ticket: DeliveryTicket) -> Result<(), DeliveryTicket> {
	entry.state.queued.fetch_add(1, Ordering::AcqRel);
	match entry.tx.send(ticket) {
		Ok(()) => Ok(()),
		Err(closed) => {
			entry.state.queued.fetch_sub(1, Ordering::AcqRel);
			Err(closed.into_inner())
		}
	}
}

fn spawn_queue(shared: &Arc<QueueShared>, identity: Identity) -> QueueEntry {
	let id = shared.next_id.fetch_add(1, Ordering::Relaxed);
	let (tx, rx) = Mailbox::unbounded().split();
	let state = Arc::new(LoopState::default());
	tracing::debug!(%identity, queue_id = id, "delivery.queue.create");
	let _ = herald_worker::spawn(TaskClass::Delivery, run_queue(Arc::clone(shared), identity, id, Arc::clone(&state), rx));
	QueueEntry { id, tx, state }
}

/// Marks the loop exited and closes its mailbox however the loop ends.
struct ExitGuard {
	state: Arc<LoopState>,
	rx: MailboxReceiver<DeliveryTicket>,
}

impl Drop for ExitGuard {
	fn drop(&mut self) {
		self.rx.close();
		self.state.exited.store(true, Ordering::Release);
	}
}

struct InFlight<'a>(&'a LoopState);

impl<'a> InFlight<'a> {
	fn begin(state: &'a LoopState) -> Self {
		*state.in_flight_since.lock() = Some(Instant::now());
		Self(state)
	}
}

impl Drop for InFlight<'_> {
	fn drop(&mut self) {
		*self.0.in_flight_since.lock() = None;
	}
}

async fn run_queue(shared: Arc<QueueShared>, identity: Identity, id: u64, state: Arc<LoopState>, rx: MailboxReceiver<DeliveryTicket>) {
	let _exit = ExitGuard {
		state: Arc::clone(&state),
		rx: rx.clone(),
	};

	loop {
		let ticket = match tokio::time::timeout(shared.options.idle_reap, rx.recv()).await {
			Ok(Some(ticket)) => ticket,
			Ok(None) => break,
			Err(_) => {
				let reaped = shared
					.queues
					.remove_if(&identity, |_, entry| entry.id == id && entry.state.queued.load(Ordering::Acquire) == 0)
					.is_some();
				if !reaped && state.queued.load(Ordering::Acquire) > 0 {
					continue;
				}
				rx.close();
				while let Some(ticket) = rx.try_recv() {
					state.queued.fetch_sub(1, Ordering::AcqRel);
					shared.process(&identity, &state, ticket).await;
				}
				tracing::debug!(%identity, queue_id = id, "delivery.queue.reaped");
				return;
			}
		};
		state.queued.fetch_sub(1, Ordering::AcqRel);
		shared.process(&identity, &state, ticket).await;
	}
	tracing::debug!(%identity, queue_id = id, "delivery.queue.closed");
}

impl QueueShared {
	async fn process(&self, identity: &Identity, state: &LoopState, ticket: DeliveryTicket) {
		let _in_flight = InFlight::begin(state);

		let message = match ticket.parse.await {
			Ok(message) => message,
			Err(err) => {
				self.drop_ticket(identity, "parse", err);
				return;
			}
		};
		let Some(recipient) = self.directory.resolve(identity) else {
			self.drop_ticket(identity, "recipient_gone", "not online");
			return;
		};
		match self.renderer.deliver(&recipient, message, ticket.substitutions).await {
			Ok(()) => {
				self.delivered.fetch_add(1, Ordering::Relaxed);
			}
			Err(err) => self.drop_ticket(identity, "render", err),
		}
	}

	fn drop_ticket(&self, identity: &Identity, reason: &'static str, detail: impl std::fmt::Display) {
		self.dropped.fetch_add(1, Ordering::Relaxed);
		tracing::debug!(%identity, reason, detail = %detail, "delivery.drop");
	}
}
