//! Expire-after-write cache for parse results.

use std::hash::Hash;
use std::time::Duration;

use dashmap::DashMap;
use tokio::time::Instant;

/// Default time-to-live for cached parses.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(5 * 60);

/// Cache key. Save-keys live in their own namespace so they never collide
/// with message text.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ParseKey {
	Raw(String),
	Named(String),
}

struct CacheEntry<V> {
	value: V,
	written: Instant,
}

/// Concurrent map whose entries expire a fixed time after they were
/// written, regardless of access.
///
/// Expired entries are evicted lazily on lookup and in bulk by
/// [`TtlCache::purge_expired`]. There is no capacity bound.
pub struct TtlCache<K, V> {
	ttl: Duration,
	entries: DashMap<K, CacheEntry<V>>,
}

impl<K, V> TtlCache<K, V>
where
	K: Eq + Hash,
	V: Clone,
{
	pub fn new(ttl: Duration) -> Self {
		Self {
			ttl,
			entries: DashMap::new(),
		}
	}

	pub fn ttl(&self) -> Duration {
		self.ttl
	}

	pub fn get(&self, key: &K) -> Option<V> {
		let expired = match self.entries.get(key) {
			Some(entry) if !self.is_expired(&entry) => return Some(entry.value.clone()),
			Some(_) => true,
			None => false,
		};
		if expired {
			self.entries.remove_if(key, |_, entry| self.is_expired(entry));
		}
		None
	}

	/// Inserts or replaces `key`, restarting its TTL.
	pub fn insert(&self, key: K, value: V) {
		self.entries.insert(
			key,
			CacheEntry {
				value,
				written: Instant::now(),
			},
		);
	}

	pub fn remove(&self, key: &K) -> Option<V> {
		self.entries.remove(key).map(|(_, entry)| entry.value)
	}

	/// Drops every expired entry and returns how many were removed.
	pub fn purge_expired(&self) -> usize {
		let before = self.entries.len();
		self.entries.retain(|_, entry| !self.is_expired(entry));
		before.saturating_sub(self.entries.len())
	}

	/// Number of stored entries, including expired ones not yet purged.
	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	pub fn clear(&self) {
		self.entries.clear();
	}

	fn is_expired(&self, entry: &CacheEntry<V>) -> bool {
		entry.written.elapsed() >= self.ttl
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test(start_paused = true)]
	async fn entries_expire_after_ttl_from_write() {
		let cache = TtlCache::new(Duration::from_secs(300));
		cache.insert(ParseKey::Raw("hi".into()), 1);

		tokio::time::advance(Duration::from_secs(299)).await;
		assert_eq!(cache.get(&ParseKey::Raw("hi".into())), Some(1));

		tokio::time::advance(Duration::from_secs(1)).await;
		assert_eq!(cache.get(&ParseKey::Raw("hi".into())), None);
		assert!(cache.is_empty());
	}

	#[tokio::test(start_paused = true)]
	async fn reads_do_not_extend_lifetime() {
		let cache = TtlCache::new(Duration::from_secs(10));
		cache.insert("k", "v");
		for _ in 0..9 {
			tokio::time::advance(Duration::from_secs(1)).await;
			assert_eq!(cache.get(&"k"), Some("v"));
		}
		tokio::time::advance(Duration::from_secs(1)).await;
		assert_eq!(cache.get(&"k"), None);
	}

	#[tokio::test(start_paused = true)]
	async fn purge_removes_only_expired() {
		let cache = TtlCache::new(Duration::from_secs(10));
		cache.insert(1, "old");
		tokio::time::advance(Duration::from_secs(6)).await;
		cache.insert(2, "new");
		tokio::time::advance(Duration::from_secs(5)).await;

		assert_eq!(cache.purge_expired(), 1);
		assert_eq!(cache.len(), 1);
		assert_eq!(cache.get(&2), Some("new"));
	}

	#[test]
	fn named_and_raw_keys_do_not_collide() {
		let cache = TtlCache::new(DEFAULT_CACHE_TTL);
		cache.insert(ParseKey::Named("welcome".into()), "named");
		assert_eq!(cache.get(&ParseKey::Raw("welcome".into())), None);
	}
}
