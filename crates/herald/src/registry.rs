use std::collections::BTreeMap;

use parking_lot::RwLock;

use crate::error::{HeraldError, Result};

/// Raw text of named messages.
///
/// Parsed named messages live in the parse cache and expire with it; the
/// registry keeps the source so an expired entry can be parsed again.
#[derive(Debug, Default)]
pub struct MessageRegistry {
	messages: RwLock<BTreeMap<String, String>>,
}

impl MessageRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	/// Registers `raw` under `key`, returning the text it replaced.
	pub fn register(&self, key: impl Into<String>, raw: impl Into<String>) -> Result<Option<String>> {
		let key = key.into();
		if key.trim().is_empty() {
			return Err(HeraldError::EmptyKey);
		}
		Ok(self.messages.write().insert(key, raw.into()))
	}

	pub fn unregister(&self, key: &str) -> Option<String> {
		self.messages.write().remove(key)
	}

	pub fn get(&self, key: &str) -> Option<String> {
		self.messages.read().get(key).cloned()
	}

	pub fn contains(&self, key: &str) -> bool {
		self.messages.read().contains_key(key)
	}

	/// Registered keys in sorted order.
	pub fn keys(&self) -> Vec<String> {
		self.messages.read().keys().cloned().collect()
	}

	pub fn len(&self) -> usize {
		self.messages.read().len()
	}

	pub fn is_empty(&self) -> bool {
		self.messages.read().is_empty()
	}

	pub fn clear(&self) {
		self.messages.write().clear();
	}

	/// Registers every pair, skipping empty keys. Returns how many were added.
	pub fn import<I, K, V>(&self, messages: I) -> usize
	where
		I: IntoIterator<Item = (K, V)>,
		K: Into<String>,
		V: Into<String>,
	{
		let mut map = self.messages.write();
		let mut added = 0;
		for (key, raw) in messages {
			let key = key.into();
			if key.trim().is_empty() {
				continue;
			}
			map.insert(key, raw.into());
			added += 1;
		}
		added
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn register_replaces_and_rejects_empty_keys() {
		let registry = MessageRegistry::new();
		assert_eq!(registry.register("motd", "hello").unwrap(), None);
		assert_eq!(registry.register("motd", "hi").unwrap().as_deref(), Some("hello"));
		assert!(matches!(registry.register(" ", "x"), Err(HeraldError::EmptyKey)));
		assert_eq!(registry.get("motd").as_deref(), Some("hi"));
	}

	#[test]
	fn import_skips_empty_keys() {
		let registry = MessageRegistry::new();
		let added = registry.import([("b", "2"), ("", "skip"), ("a", "1")]);
		assert_eq!(added, 2);
		assert_eq!(registry.keys(), vec!["a".to_string(), "b".to_string()]);

		assert_eq!(registry.unregister("a").as_deref(), Some("1"));
		assert!(!registry.contains("a"));
		registry.clear();
		assert!(registry.is_empty());
	}
}
