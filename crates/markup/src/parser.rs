use std::sync::Arc;
use std::time::Duration;

use herald_worker::Dispatcher;

use crate::cache::{DEFAULT_CACHE_TTL, ParseKey, TtlCache};
use crate::message::ParsedMessage;
use crate::pending::PendingParse;
use crate::sound::SoundCatalog;
use crate::tokenizer::{Tokenized, tokenize};

/// Parser construction options.
#[derive(Debug, Clone)]
pub struct ParserOptions {
	pub cache_ttl: Duration,
	/// Sound names accepted in addition to the built-in catalog.
	pub extra_sounds: Vec<String>,
}

impl Default for ParserOptions {
	fn default() -> Self {
		Self {
			cache_ttl: DEFAULT_CACHE_TTL,
			extra_sounds: Vec::new(),
		}
	}
}

/// Cached, asynchronous markup parser.
///
/// Cache hits and blank input resolve without leaving the caller's context;
/// misses are tokenized through [`Dispatcher::run_async`], cached, then
/// resolved.
#[derive(Clone)]
pub struct MarkupParser {
	inner: Arc<ParserInner>,
}

struct ParserInner {
	dispatcher: Dispatcher,
	cache: TtlCache<ParseKey, Arc<ParsedMessage>>,
	catalog: SoundCatalog,
	empty: Arc<ParsedMessage>,
}

impl MarkupParser {
	pub fn new(dispatcher: Dispatcher, options: ParserOptions) -> Self {
		Self {
			inner: Arc::new(ParserInner {
				dispatcher,
				cache: TtlCache::new(options.cache_ttl),
				catalog: SoundCatalog::with_extra(&options.extra_sounds),
				empty: Arc::new(ParsedMessage::empty()),
			}),
		}
	}

	/// Parses `raw`, consulting the cache first.
	pub fn parse(&self, raw: &str) -> PendingParse {
		self.parse_keyed(raw, None)
	}

	/// Parses `raw` and additionally stores the result under save-key `key`.
	pub fn save_named(&self, key: &str, raw: &str) -> PendingParse {
		self.parse_keyed(raw, Some(key.to_string()))
	}

	/// Stores an already-built message under save-key `key`.
	pub fn store_named(&self, key: &str, message: Arc<ParsedMessage>) {
		self.inner.cache.insert(ParseKey::Named(key.to_string()), message);
	}

	/// Message saved under `key`, unless it expired.
	pub fn named(&self, key: &str) -> Option<Arc<ParsedMessage>> {
		self.inner.cache.get(&ParseKey::Named(key.to_string()))
	}

	/// Synchronous tokenization with this parser's sound catalog. Not cached.
	pub fn tokenize(&self, raw: &str) -> Tokenized {
		tokenize(raw, &self.inner.catalog)
	}

	pub fn catalog(&self) -> &SoundCatalog {
		&self.inner.catalog
	}

	/// Evicts expired cache entries; returns the number removed.
	pub fn purge_expired(&self) -> usize {
		self.inner.cache.purge_expired()
	}

	pub fn cache_len(&self) -> usize {
		self.inner.cache.len()
	}

	fn parse_keyed(&self, raw: &str, named: Option<String>) -> PendingParse {
		if raw.trim().is_empty() {
			let empty = Arc::clone(&self.inner.empty);
			if let Some(key) = named {
				self.store_named(&key, Arc::clone(&empty));
			}
			return PendingParse::ready(empty);
		}

		if let Some(hit) = self.inner.cache.get(&ParseKey::Raw(raw.to_string())) {
			tracing::trace!(len = raw.len(), "markup.cache.hit");
			if let Some(key) = named {
				self.store_named(&key, Arc::clone(&hit));
			}
			return PendingParse::ready(hit);
		}

		let inner = Arc::clone(&self.inner);
		let raw = raw.to_string();
		PendingParse::dispatched(self.inner.dispatcher.run_async(move || inner.parse_and_store(raw, named)))
	}
}

impl ParserInner {
	fn parse_and_store(&self, raw: String, named: Option<String>) -> Arc<ParsedMessage> {
		let tokenized = tokenize(&raw, &self.catalog);
		for tag in &tokenized.malformed {
			tracing::warn!(
				grammar = tag.grammar.as_str(),
				start = tag.span.start,
				tag = %tag.text,
				reason = %tag.reason,
				"markup.malformed"
			);
		}

		let message = Arc::new(tokenized.into_message());
		if let Some(key) = named {
			self.cache.insert(ParseKey::Named(key), Arc::clone(&message));
		}
		self.cache.insert(ParseKey::Raw(raw), Arc::clone(&message));
		message
	}
}

impl std::fmt::Debug for MarkupParser {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("MarkupParser")
			.field("cached", &self.inner.cache.len())
			.field("ttl", &self.inner.cache.ttl())
			.finish_non_exhaustive()
	}
}
