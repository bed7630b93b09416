//! Live recipient handles and the liveness-checked directory.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use dashmap::DashMap;
use herald_worker::{ContextAffinity, RegionId};
use uuid::Uuid;

use crate::identity::Identity;

/// Default console sender name.
pub const CONSOLE_NAME: &str = "CONSOLE";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecipientKind {
	Player,
	Console,
}

struct RecipientState {
	id: Uuid,
	name: String,
	kind: RecipientKind,
	region: AtomicU32,
	online: AtomicBool,
}

/// Cheap cloneable handle to one recipient.
///
/// Console handles are always online and always bound to the global
/// context. Player handles go offline on [`RecipientDirectory::leave`], which
/// makes any job still bound to them a no-op.
#[derive(Clone)]
pub struct RecipientHandle {
	inner: Arc<RecipientState>,
}

impl RecipientHandle {
	pub fn player(id: Uuid, name: impl Into<String>, region: RegionId) -> Self {
		Self::build(id, name.into(), RecipientKind::Player, region)
	}

	pub fn console(name: impl Into<String>) -> Self {
		Self::build(Uuid::nil(), name.into(), RecipientKind::Console, 0)
	}

	fn build(id: Uuid, name: String, kind: RecipientKind, region: RegionId) -> Self {
		Self {
			inner: Arc::new(RecipientState {
				id,
				name,
				kind,
				region: AtomicU32::new(region),
				online: AtomicBool::new(true),
			}),
		}
	}

	pub fn id(&self) -> Uuid {
		self.inner.id
	}

	pub fn name(&self) -> &str {
		&self.inner.name
	}

	pub fn kind(&self) -> RecipientKind {
		self.inner.kind
	}

	pub fn is_console(&self) -> bool {
		self.inner.kind == RecipientKind::Console
	}

	/// Queue key for this recipient.
	pub fn identity(&self) -> Identity {
		match self.inner.kind {
			RecipientKind::Player => Identity::Recipient(self.inner.id),
			RecipientKind::Console => Identity::Sender(self.inner.name.clone()),
		}
	}

	pub fn is_online(&self) -> bool {
		self.is_console() || self.inner.online.load(Ordering::Acquire)
	}

	/// Records that the recipient now belongs to `region`.
	pub fn move_to_region(&self, region: RegionId) {
		self.inner.region.store(region, Ordering::Release);
	}

	/// Marks the handle offline. Idempotent.
	pub fn retire(&self) {
		self.inner.online.store(false, Ordering::Release);
	}

	pub fn same_as(&self, other: &Self) -> bool {
		Arc::ptr_eq(&self.inner, &other.inner)
	}
}

impl ContextAffinity for RecipientHandle {
	fn region(&self) -> Option<RegionId> {
		match self.inner.kind {
			RecipientKind::Player => Some(self.inner.region.load(Ordering::Acquire)),
			RecipientKind::Console => None,
		}
	}

	fn is_valid(&self) -> bool {
		self.is_online()
	}
}

impl std::fmt::Debug for RecipientHandle {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("RecipientHandle")
			.field("id", &self.inner.id)
			.field("name", &self.inner.name)
			.field("kind", &self.inner.kind)
			.field("region", &self.region())
			.field("online", &self.is_online())
			.finish()
	}
}

/// Identity to live handle lookup, maintained from join/leave events.
pub struct RecipientDirectory {
	players: DashMap<Uuid, RecipientHandle>,
	console: RecipientHandle,
}

impl RecipientDirectory {
	pub fn new(console_name: impl Into<String>) -> Self {
		Self {
			players: DashMap::new(),
			console: RecipientHandle::console(console_name),
		}
	}

	/// Inserts or replaces a player handle. A replaced handle is retired so
	/// work bound to it is dropped.
	pub fn join(&self, handle: RecipientHandle) {
		if handle.is_console() {
			return;
		}
		tracing::debug!(id = %handle.id(), name = handle.name(), "directory.join");
		if let Some(previous) = self.players.insert(handle.id(), handle.clone())
			&& !previous.same_as(&handle)
		{
			previous.retire();
		}
	}

	/// Retires and removes a player.
	pub fn leave(&self, id: Uuid) -> Option<RecipientHandle> {
		let (_, handle) = self.players.remove(&id)?;
		handle.retire();
		tracing::debug!(id = %id, name = handle.name(), "directory.leave");
		Some(handle)
	}

	/// Live handle for `identity`, if any.
	///
	/// Sender names resolve to the console when they match its name,
	/// otherwise to an online player with that name.
	pub fn resolve(&self, identity: &Identity) -> Option<RecipientHandle> {
		match identity {
			Identity::Recipient(id) => self.get(*id),
			Identity::Sender(name) if *name == self.console.name() => Some(self.console.clone()),
			Identity::Sender(name) => self.players.iter().find(|e| e.name() == name.as_str() && e.is_online()).map(|e| e.value().clone()),
		}
	}

	pub fn get(&self, id: Uuid) -> Option<RecipientHandle> {
		self.players.get(&id).filter(|h| h.is_online()).map(|h| h.value().clone())
	}

	pub fn console(&self) -> RecipientHandle {
		self.console.clone()
	}

	/// Every online player.
	pub fn online(&self) -> Vec<RecipientHandle> {
		self.players.iter().filter(|h| h.is_online()).map(|h| h.value().clone()).collect()
	}

	/// Removes players that went offline without a leave event.
	pub fn sweep(&self) -> usize {
		let before = self.players.len();
		self.players.retain(|_, h| h.is_online());
		let removed = before.saturating_sub(self.players.len());
		if removed > 0 {
			tracing::debug!(removed, "directory.sweep");
		}
		removed
	}

	pub fn len(&self) -> usize {
		self.players.len()
	}

	pub fn is_empty(&self) -> bool {
		self.players.is_empty()
	}
}

impl Default for RecipientDirectory {
	fn default() -> Self {
		Self::new(CONSOLE_NAME)
	}
}
