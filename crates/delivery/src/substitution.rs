//! Text substitution applied at render time.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::mpsc::{RecvTimeoutError, sync_channel};
use std::time::Duration;

use herald_worker::{ContextId, Dispatcher, current_context};

use crate::placeholder::{Substitutions, UniversalPlaceholders};
use crate::recipient::RecipientHandle;

/// Default bound on waiting for the global context to expand placeholders.
pub const DEFAULT_SUBSTITUTION_TIMEOUT: Duration = Duration::from_millis(100);

/// Injected text-replace dependency.
pub trait SubstitutionEngine: Send + Sync {
	fn apply(&self, text: &str, recipient: &RecipientHandle, pairs: &Substitutions) -> String;
}

/// Host placeholder service that may only run on the global context.
pub trait ExternalExpander: Send + Sync {
	/// Cheap pre-check; returning false skips the expander entirely.
	fn contains_placeholders(&self, text: &str) -> bool {
		let _ = text;
		true
	}

	fn expand(&self, text: &str, recipient: &RecipientHandle) -> String;
}

/// Replaces `{key}` tokens in a single pass.
///
/// Caller pairs win over universal placeholders. Unknown keys are left as
/// written and inserted values are never scanned again.
pub struct PlaceholderEngine {
	universal: Arc<UniversalPlaceholders>,
	external: Option<Arc<dyn ExternalExpander>>,
	dispatcher: Option<Dispatcher>,
	timeout: Duration,
}

impl PlaceholderEngine {
	pub fn new(universal: Arc<UniversalPlaceholders>) -> Self {
		Self {
			universal,
			external: None,
			dispatcher: None,
			timeout: DEFAULT_SUBSTITUTION_TIMEOUT,
		}
	}

	/// Enables an external expander. Calls made off the global context are
	/// marshalled through `dispatcher` and wait at most `timeout`.
	#[must_use]
	pub fn with_external(mut self, external: Arc<dyn ExternalExpander>, dispatcher: Dispatcher, timeout: Duration) -> Self {
		self.external = Some(external);
		self.dispatcher = Some(dispatcher);
		self.timeout = timeout;
		self
	}

	pub fn universal(&self) -> &Arc<UniversalPlaceholders> {
		&self.universal
	}

	fn expand_external(&self, external: &Arc<dyn ExternalExpander>, text: String, recipient: &RecipientHandle) -> String {
		if !external.contains_placeholders(&text) {
			return text;
		}
		if current_context() == Some(ContextId::Global) {
			return external.expand(&text, recipient);
		}
		let Some(dispatcher) = &self.dispatcher else {
			return text;
		};

		let (tx, rx) = sync_channel(1);
		let job_external = Arc::clone(external);
		let job_text = text.clone();
		let job_recipient = recipient.clone();
		let posted = dispatcher.run_now(move || {
			let _ = tx.send(job_external.expand(&job_text, &job_recipient));
		});
		if let Err(err) = posted {
			tracing::warn!(error = %err, "delivery.substitution.unavailable");
			return text;
		}

		match rx.recv_timeout(self.timeout) {
			Ok(expanded) => expanded,
			Err(RecvTimeoutError::Timeout) => {
				tracing::warn!(
					timeout_ms = u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX),
					recipient = recipient.name(),
					"delivery.substitution.timeout"
				);
				text
			}
			Err(RecvTimeoutError::Disconnected) => {
				tracing::warn!(recipient = recipient.name(), "delivery.substitution.failed");
				text
			}
		}
	}
}

impl SubstitutionEngine for PlaceholderEngine {
	fn apply(&self, text: &str, recipient: &RecipientHandle, pairs: &Substitutions) -> String {
		let mut values: HashMap<String, String> = if self.universal.is_empty() {
			HashMap::new()
		} else {
			self.universal.resolve(recipient).into_iter().collect()
		};
		for pair in pairs.iter() {
			values.insert(pair.key().to_string(), pair.value().to_string());
		}

		let replaced = replace_tokens(text, &values);
		match &self.external {
			Some(external) => self.expand_external(external, replaced, recipient),
			None => replaced,
		}
	}
}

fn replace_tokens(text: &str, values: &HashMap<String, String>) -> String {
	if values.is_empty() || !text.contains('{') {
		return text.to_string();
	}

	let mut out = String::with_capacity(text.len());
	let mut rest = text;
	while let Some(open) = rest.find('{') {
		out.push_str(&rest[..open]);
		let after = &rest[open + 1..];
		match after.find('}') {
			Some(close) if values.contains_key(&after[..close]) => {
				out.push_str(&values[&after[..close]]);
				rest = &after[close + 1..];
			}
			Some(_) => {
				out.push('{');
				rest = after;
			}
			None => {
				out.push_str(&rest[open..]);
				rest = "";
			}
		}
	}
	out.push_str(rest);
	out
}

#[cfg(test)]
mod tests {
	use std::time::Instant;

	use uuid::Uuid;

	use super::*;

	fn player() -> RecipientHandle {
		RecipientHandle::player(Uuid::new_v4(), "Steve", 0)
	}

	#[test]
	fn caller_pairs_override_universal() {
		let universal = Arc::new(UniversalPlaceholders::new());
		universal.add_static("player", "nobody").unwrap();
		universal.add_static("server", "hive").unwrap();
		let engine = PlaceholderEngine::new(universal);

		let pairs = Substitutions::new().with("player", "Steve");
		assert_eq!(engine.apply("{player} on {server}", &player(), &pairs), "Steve on hive");
	}

	#[test]
	fn unknown_and_unbalanced_tokens_are_kept() {
		let engine = PlaceholderEngine::new(Arc::new(UniversalPlaceholders::new()));
		let pairs = Substitutions::new().with("a", "1");
		assert_eq!(engine.apply("{{a}} {b} {a", &player(), &pairs), "{1} {b} {a");
	}

	#[test]
	fn inserted_values_are_not_rescanned() {
		let engine = PlaceholderEngine::new(Arc::new(UniversalPlaceholders::new()));
		let pairs = Substitutions::new().with("a", "{b}").with("b", "x");
		assert_eq!(engine.apply("{a}{b}", &player(), &pairs), "{b}x");
	}

	struct Upper;

	impl ExternalExpander for Upper {
		fn expand(&self, text: &str, _recipient: &RecipientHandle) -> String {
			text.to_uppercase()
		}
	}

	struct Stuck;

	impl ExternalExpander for Stuck {
		fn expand(&self, text: &str, _recipient: &RecipientHandle) -> String {
			std::thread::sleep(Duration::from_millis(300));
			text.to_string()
		}
	}

	#[tokio::test]
	async fn external_expander_runs_on_global_context() {
		let dispatcher = Dispatcher::unified().unwrap();
		let engine = PlaceholderEngine::new(Arc::new(UniversalPlaceholders::new())).with_external(
			Arc::new(Upper),
			dispatcher.clone(),
			Duration::from_secs(2),
		);
		let pairs = Substitutions::new().with("p", "steve");
		assert_eq!(engine.apply("hi {p}", &player(), &pairs), "HI STEVE");
		dispatcher.shutdown();
	}

	#[tokio::test]
	async fn slow_external_expander_falls_back_after_timeout() {
		let dispatcher = Dispatcher::unified().unwrap();
		let engine = PlaceholderEngine::new(Arc::new(UniversalPlaceholders::new())).with_external(
			Arc::new(Stuck),
			dispatcher.clone(),
			Duration::from_millis(20),
		);

		let started = Instant::now();
		let pairs = Substitutions::new().with("p", "steve");
		assert_eq!(engine.apply("hi {p}", &player(), &pairs), "hi steve");
		assert!(started.elapsed() < Duration::from_millis(250));
		dispatcher.shutdown();
	}
}
