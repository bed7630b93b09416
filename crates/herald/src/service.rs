//! The running service handle.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use herald_delivery::{
	ExternalExpander, Identity, OrderedDeliveryQueue, PlaceholderEngine, QueueStats, RecipientDirectory, RecipientHandle, Renderer,
	RenderingSink, SubstitutionEngine, Substitutions, UniversalPlaceholders,
};
use herald_markup::{MarkupParser, ParsedMessage, PendingParse};
use herald_worker::{ContextRecord, Dispatcher, ExecutionStrategy, HostCapabilities, HostProbe, ScheduledTaskHandle, TaskClass};

use crate::config::HeraldConfig;
use crate::error::{HeraldError, Result};
use crate::registry::MessageRegistry;

/// Configures and starts a [`Herald`].
pub struct HeraldBuilder {
	sink: Arc<dyn RenderingSink>,
	config: HeraldConfig,
	probe: Arc<dyn HostProbe>,
	substitution: Option<Arc<dyn SubstitutionEngine>>,
	expander: Option<Arc<dyn ExternalExpander>>,
}

impl HeraldBuilder {
	#[must_use]
	pub fn config(mut self, config: HeraldConfig) -> Self {
		self.config = config;
		self
	}

	/// Host capability probe. Defaults to a host with no regions and no
	/// async pool.
	#[must_use]
	pub fn probe(mut self, probe: impl HostProbe + 'static) -> Self {
		self.probe = Arc::new(probe);
		self
	}

	/// Replaces the default [`PlaceholderEngine`]. Universal placeholders
	/// and the external expander only apply to the default engine.
	#[must_use]
	pub fn substitution(mut self, engine: Arc<dyn SubstitutionEngine>) -> Self {
		self.substitution = Some(engine);
		self
	}

	/// Host placeholder service run after `{key}` replacement.
	#[must_use]
	pub fn expander(mut self, expander: Arc<dyn ExternalExpander>) -> Self {
		self.expander = Some(expander);
		self
	}

	pub fn start(self) -> Result<Herald> {
		let config = self.config;
		config.validate()?;

		let dispatcher = Dispatcher::start(config.dispatch_options()?, self.probe.as_ref())?;
		let parser = MarkupParser::new(dispatcher.clone(), config.parser_options());
		let universal = Arc::new(UniversalPlaceholders::new());
		let substitution = match self.substitution {
			Some(engine) => engine,
			None => {
				let engine = PlaceholderEngine::new(Arc::clone(&universal));
				let engine = match self.expander {
					Some(expander) => engine.with_external(expander, dispatcher.clone(), config.substitution_timeout()),
					None => engine,
				};
				Arc::new(engine) as Arc<dyn SubstitutionEngine>
			}
		};
		let renderer = Renderer::new(self.sink, substitution, dispatcher.clone(), config.tick());
		let directory = Arc::new(RecipientDirectory::new(config.delivery.console_name.clone()));
		let queue = OrderedDeliveryQueue::new(Arc::clone(&directory), renderer.clone(), config.queue_options());
		let registry = MessageRegistry::new();
		registry.import(config.messages.clone());

		let interval = config.maintenance_interval();
		let maintenance = {
			let parser = parser.clone();
			let directory = Arc::clone(&directory);
			let queue = queue.clone();
			let renderer = renderer.clone();
			dispatcher.run_every(interval, interval, move || {
				let purged = parser.purge_expired();
				let departed = directory.sweep();
				let overlays = renderer.sweep_overlays(&directory);
				let report = queue.sweep();
				tracing::debug!(purged, departed, overlays, reaped = report.removed, stalled = report.stalled, "herald.maintenance");
			})?
		};

		tracing::info!(
			strategy = dispatcher.strategy().name(),
			messages = registry.len(),
			"herald.start"
		);
		Ok(Herald {
			inner: Arc::new(HeraldInner {
				dispatcher,
				parser,
				directory,
				universal,
				renderer,
				queue,
				registry,
				maintenance,
				running: AtomicBool::new(true),
			}),
		})
	}
}

/// Constructed-once message service.
///
/// Cheap to clone. Every operation returns [`HeraldError::NotRunning`] once
/// [`Herald::shutdown`] has been called; delivery itself never reports
/// errors to the caller.
#[derive(Clone)]
pub struct Herald {
	inner: Arc<HeraldInner>,
}

struct HeraldInner {
	dispatcher: Dispatcher,
	parser: MarkupParser,
	directory: Arc<RecipientDirectory>,
	universal: Arc<UniversalPlaceholders>,
	renderer: Renderer,
	queue: OrderedDeliveryQueue,
	registry: MessageRegistry,
	maintenance: ScheduledTaskHandle,
	running: AtomicBool,
}

impl Herald {
	pub fn builder(sink: Arc<dyn RenderingSink>) -> HeraldBuilder {
		HeraldBuilder {
			sink,
			config: HeraldConfig::default(),
			probe: Arc::new(HostCapabilities::default()),
			substitution: None,
			expander: None,
		}
	}

	/// Parses `raw`, consulting the parse cache first.
	pub fn parse(&self, raw: &str) -> Result<PendingParse> {
		Ok(self.running()?.parser.parse(raw))
	}

	/// Queues `raw` for `identity` behind everything submitted before it.
	pub fn submit(&self, identity: Identity, raw: &str, substitutions: Substitutions) -> Result<()> {
		let inner = self.running()?;
		inner.queue.submit(identity, inner.parser.parse(raw), substitutions);
		Ok(())
	}

	/// Queues each message in order, sharing `substitutions`.
	pub fn submit_list<I, S>(&self, identity: Identity, raws: I, substitutions: Substitutions) -> Result<()>
	where
		I: IntoIterator<Item = S>,
		S: AsRef<str>,
	{
		let inner = self.running()?;
		for raw in raws {
			inner.queue.submit(identity.clone(), inner.parser.parse(raw.as_ref()), substitutions.clone());
		}
		Ok(())
	}

	/// Queues an already-built message, such as composer output.
	pub fn send_parsed(&self, recipient: &RecipientHandle, message: impl Into<Arc<ParsedMessage>>, substitutions: Substitutions) -> Result<()> {
		let inner = self.running()?;
		inner.queue.submit(recipient.identity(), PendingParse::ready(message.into()), substitutions);
		Ok(())
	}

	/// Renders `raw` for every online player.
	pub fn broadcast(&self, raw: &str, substitutions: Substitutions) -> Result<()> {
		self.broadcast_where(|_| true, raw, substitutions)
	}

	/// Renders `raw` for every online player accepted by `filter`, each on
	/// its own context. The filter runs once the parse has resolved.
	pub fn broadcast_where<F>(&self, filter: F, raw: &str, substitutions: Substitutions) -> Result<()>
	where
		F: Fn(&RecipientHandle) -> bool + Send + 'static,
	{
		let inner = self.running()?;
		let pending = inner.parser.parse(raw);
		let directory = Arc::clone(&inner.directory);
		let renderer = inner.renderer.clone();
		let _ = herald_worker::spawn(TaskClass::Delivery, async move {
			let message = match pending.await {
				Ok(message) => message,
				Err(err) => {
					tracing::debug!(error = %err, "herald.broadcast.dropped");
					return;
				}
			};
			fan_out(&renderer, &directory, &filter, &message, &substitutions);
		});
		Ok(())
	}

	/// Renders an already-built message for every online player.
	pub fn broadcast_parsed(&self, message: impl Into<Arc<ParsedMessage>>, substitutions: Substitutions) -> Result<()> {
		let inner = self.running()?;
		fan_out(&inner.renderer, &inner.directory, &|_: &RecipientHandle| true, &message.into(), &substitutions);
		Ok(())
	}

	/// Queues every message for every online player.
	pub fn broadcast_list<I, S>(&self, raws: I, substitutions: Substitutions) -> Result<()>
	where
		I: IntoIterator<Item = S>,
		S: AsRef<str>,
	{
		let raws: Vec<String> = raws.into_iter().map(|raw| raw.as_ref().to_string()).collect();
		for recipient in self.running()?.directory.online() {
			self.submit_list(recipient.identity(), &raws, substitutions.clone())?;
		}
		Ok(())
	}

	/// Registers `raw` under `key` and parses it into the cache.
	pub fn save_named(&self, key: &str, raw: &str) -> Result<PendingParse> {
		let inner = self.running()?;
		inner.registry.register(key, raw)?;
		Ok(inner.parser.save_named(key, raw))
	}

	/// Queues the message saved under `key` for `recipient`.
	///
	/// A cached parse is used when present; otherwise the registered raw text
	/// is parsed again. Returns false when the key is unknown or the
	/// recipient is offline.
	pub fn send_named(&self, key: &str, recipient: &RecipientHandle, substitutions: Substitutions) -> Result<bool> {
		let inner = self.running()?;
		if !recipient.is_online() {
			return Ok(false);
		}
		let pending = match inner.parser.named(key) {
			Some(message) => PendingParse::ready(message),
			None => match inner.registry.get(key) {
				Some(raw) => inner.parser.save_named(key, &raw),
				None => {
					tracing::debug!(key, "herald.named.missing");
					return Ok(false);
				}
			},
		};
		inner.queue.submit(recipient.identity(), pending, substitutions);
		Ok(true)
	}

	pub fn directory(&self) -> &RecipientDirectory {
		&self.inner.directory
	}

	pub fn registry(&self) -> &MessageRegistry {
		&self.inner.registry
	}

	/// Placeholders applied to every delivery by the default engine.
	pub fn universal(&self) -> &UniversalPlaceholders {
		&self.inner.universal
	}

	pub fn console(&self) -> RecipientHandle {
		self.inner.directory.console()
	}

	pub fn strategy(&self) -> ExecutionStrategy {
		self.inner.dispatcher.strategy()
	}

	pub fn queue_stats(&self) -> QueueStats {
		self.inner.queue.stats()
	}

	pub fn snapshots(&self) -> Vec<ContextRecord> {
		self.inner.dispatcher.snapshots()
	}

	pub fn is_running(&self) -> bool {
		self.inner.running.load(Ordering::Acquire)
	}

	/// Stops maintenance, closes every queue, and joins the execution
	/// contexts. Idempotent.
	pub fn shutdown(&self) {
		self.inner.stop();
	}

	fn running(&self) -> Result<&HeraldInner> {
		if self.is_running() { Ok(&self.inner) } else { Err(HeraldError::NotRunning) }
	}
}

impl HeraldInner {
	fn stop(&self) {
		if !self.running.swap(false, Ordering::AcqRel) {
			return;
		}
		self.maintenance.cancel();
		self.queue.shutdown();
		self.dispatcher.shutdown();
		tracing::info!("herald.shutdown");
	}
}

impl Drop for HeraldInner {
	fn drop(&mut self) {
		self.stop();
	}
}

impl std::fmt::Debug for Herald {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Herald")
			.field("strategy", &self.inner.dispatcher.strategy())
			.field("running", &self.is_running())
			.field("recipients", &self.inner.directory.len())
			.finish_non_exhaustive()
	}
}

fn fan_out(
	renderer: &Renderer,
	directory: &RecipientDirectory,
	filter: &dyn Fn(&RecipientHandle) -> bool,
	message: &Arc<ParsedMessage>,
	substitutions: &Substitutions,
) {
	let mut reached = 0usize;
	for recipient in directory.online().into_iter().filter(|r| filter(r)) {
		let _ = renderer.deliver(&recipient, Arc::clone(message), substitutions.clone());
		reached += 1;
	}
	tracing::trace!(reached, "herald.broadcast");
}
