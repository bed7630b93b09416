//! `{key}` placeholder values.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use dashmap::DashMap;
use thiserror::Error;

use crate::recipient::RecipientHandle;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlaceholderError {
	#[error("placeholder key cannot be empty")]
	EmptyKey,
}

/// One `{key}` replacement.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Placeholder {
	key: String,
	value: String,
}

impl Placeholder {
	pub fn new(key: impl Into<String>, value: impl ToString) -> Result<Self, PlaceholderError> {
		let key = key.into();
		if key.is_empty() {
			return Err(PlaceholderError::EmptyKey);
		}
		Ok(Self {
			key,
			value: value.to_string(),
		})
	}

	pub fn key(&self) -> &str {
		&self.key
	}

	pub fn value(&self) -> &str {
		&self.value
	}
}

impl std::fmt::Display for Placeholder {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{{{}}}", self.key)
	}
}

/// Caller-supplied placeholder pairs for one delivery.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Substitutions {
	pairs: Vec<Placeholder>,
}

impl Substitutions {
	pub fn new() -> Self {
		Self::default()
	}

	/// Adds a pair. Pairs with an empty key are ignored.
	#[must_use]
	pub fn with(mut self, key: impl Into<String>, value: impl ToString) -> Self {
		match Placeholder::new(key, value) {
			Ok(pair) => self.pairs.push(pair),
			Err(err) => tracing::debug!(error = %err, "delivery.placeholder.ignored"),
		}
		self
	}

	pub fn push(&mut self, pair: Placeholder) {
		self.pairs.push(pair);
	}

	pub fn iter(&self) -> std::slice::Iter<'_, Placeholder> {
		self.pairs.iter()
	}

	pub fn is_empty(&self) -> bool {
		self.pairs.is_empty()
	}

	pub fn len(&self) -> usize {
		self.pairs.len()
	}
}

impl FromIterator<Placeholder> for Substitutions {
	fn from_iter<I: IntoIterator<Item = Placeholder>>(iter: I) -> Self {
		Self {
			pairs: iter.into_iter().collect(),
		}
	}
}

type DynamicValue = Arc<dyn Fn(&RecipientHandle) -> Option<String> + Send + Sync>;

/// Placeholders applied to every delivery after the caller's own pairs.
///
/// Static values are fixed text. Dynamic values are computed per recipient;
/// a dynamic value that returns `None` or panics yields empty text.
#[derive(Default)]
pub struct UniversalPlaceholders {
	statics: DashMap<String, String>,
	dynamics: DashMap<String, DynamicValue>,
}

impl UniversalPlaceholders {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn add_static(&self, key: impl Into<String>, value: impl ToString) -> Result<(), PlaceholderError> {
		let key = key.into();
		if key.is_empty() {
			return Err(PlaceholderError::EmptyKey);
		}
		self.statics.insert(key, value.to_string());
		Ok(())
	}

	pub fn add_dynamic<F>(&self, key: impl Into<String>, value: F) -> Result<(), PlaceholderError>
	where
		F: Fn(&RecipientHandle) -> Option<String> + Send + Sync + 'static,
	{
		let key = key.into();
		if key.is_empty() {
			return Err(PlaceholderError::EmptyKey);
		}
		self.dynamics.insert(key, Arc::new(value));
		Ok(())
	}

	pub fn remove(&self, key: &str) {
		self.statics.remove(key);
		self.dynamics.remove(key);
	}

	pub fn clear(&self) {
		self.statics.clear();
		self.dynamics.clear();
	}

	pub fn is_empty(&self) -> bool {
		self.statics.is_empty() && self.dynamics.is_empty()
	}

	/// Resolves every universal placeholder for `recipient`. Dynamic values
	/// override static values of the same key.
	pub fn resolve(&self, recipient: &RecipientHandle) -> Vec<(String, String)> {
		let mut out: Vec<(String, String)> = self.statics.iter().map(|e| (e.key().clone(), e.value().clone())).collect();

		// Snapshot first; value functions may touch this registry.
		let dynamics: Vec<(String, DynamicValue)> = self.dynamics.iter().map(|e| (e.key().clone(), Arc::clone(e.value()))).collect();
		for (key, value) in dynamics {
			let resolved = match std::panic::catch_unwind(AssertUnwindSafe(|| value(recipient))) {
				Ok(resolved) => resolved.unwrap_or_default(),
				Err(_) => {
					tracing::warn!(key = %key, "delivery.placeholder.panicked");
					String::new()
				}
			};
			out.retain(|(k, _)| *k != key);
			out.push((key, resolved));
		}
		out
	}
}
