//! Active-overlay bookkeeping for expiry.

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use herald_markup::OverlayKind;
use uuid::Uuid;

/// Tracks which overlay generation is current per recipient and kind.
///
/// A delayed clear only fires when its generation is still the latest one,
/// so an overlay replaced before it expires is left alone.
#[derive(Default)]
pub struct OverlayLifecycle {
	active: DashMap<(Uuid, OverlayKind), u64>,
	next: AtomicU64,
}

impl OverlayLifecycle {
	pub fn new() -> Self {
		Self::default()
	}

	/// Records a newly shown overlay. Returns its generation and whether an
	/// older overlay of the same kind was still active.
	pub fn begin(&self, id: Uuid, kind: OverlayKind) -> (u64, bool) {
		let generation = self.next.fetch_add(1, Ordering::Relaxed) + 1;
		let previous = self.active.insert((id, kind), generation);
		(generation, previous.is_some())
	}

	/// Ends `generation` if it is still current. Returns true when the caller
	/// should clear the overlay.
	pub fn finish(&self, id: Uuid, kind: OverlayKind, generation: u64) -> bool {
		self.active.remove_if(&(id, kind), |_, current| *current == generation).is_some()
	}

	pub fn is_active(&self, id: Uuid, kind: OverlayKind) -> bool {
		self.active.contains_key(&(id, kind))
	}

	/// Drops every record for `id`.
	pub fn forget(&self, id: Uuid) {
		self.active.retain(|(owner, _), _| *owner != id);
	}

	/// Keeps only records whose recipient passes `keep`. Returns how many
	/// were removed.
	pub fn retain(&self, mut keep: impl FnMut(Uuid) -> bool) -> usize {
		let before = self.active.len();
		self.active.retain(|(owner, _), _| keep(*owner));
		before.saturating_sub(self.active.len())
	}

	pub fn len(&self) -> usize {
		self.active.len()
	}

	pub fn is_empty(&self) -> bool {
		self.active.is_empty()
	}
}
