//! Segment rendering on the recipient's execution context.

use std::sync::Arc;
use std::time::Duration;

use herald_markup::{Overlay, OverlayKind, ParsedMessage, Segment, Ticks, TitleCard};
use herald_worker::{Dispatcher, JobResult};

use crate::overlay::OverlayLifecycle;
use crate::placeholder::Substitutions;
use crate::recipient::{RecipientDirectory, RecipientHandle};
use crate::sink::RenderingSink;
use crate::substitution::SubstitutionEngine;

/// Default host tick length.
pub const DEFAULT_TICK: Duration = Duration::from_millis(50);

/// Applies substitutions and drives the [`RenderingSink`] for one message.
#[derive(Clone)]
pub struct Renderer {
	inner: Arc<RendererInner>,
}

struct RendererInner {
	sink: Arc<dyn RenderingSink>,
	substitution: Arc<dyn SubstitutionEngine>,
	overlays: OverlayLifecycle,
	dispatcher: Dispatcher,
	tick: Duration,
}

impl Renderer {
	pub fn new(sink: Arc<dyn RenderingSink>, substitution: Arc<dyn SubstitutionEngine>, dispatcher: Dispatcher, tick: Duration) -> Self {
		Self {
			inner: Arc::new(RendererInner {
				sink,
				substitution,
				overlays: OverlayLifecycle::new(),
				dispatcher,
				tick,
			}),
		}
	}

	pub fn dispatcher(&self) -> &Dispatcher {
		&self.inner.dispatcher
	}

	pub fn overlays(&self) -> &OverlayLifecycle {
		&self.inner.overlays
	}

	/// Renders `message` on the context owning `recipient`.
	///
	/// Resolves once every segment has been handed to the sink, or with an
	/// error if the recipient went offline or the context is gone.
	pub fn deliver(&self, recipient: &RecipientHandle, message: Arc<ParsedMessage>, pairs: Substitutions) -> JobResult<()> {
		let renderer = self.clone();
		let target = recipient.clone();
		self.inner
			.dispatcher
			.run_bound_async(recipient, move || renderer.render(&target, &message, &pairs))
	}

	/// Renders every segment in order. Must run on the recipient's context.
	///
	/// Console recipients only receive text.
	pub fn render(&self, recipient: &RecipientHandle, message: &ParsedMessage, pairs: &Substitutions) {
		let inner = &self.inner;
		for segment in message {
			match segment {
				Segment::Text(text) => inner.sink.send_text(recipient, &inner.substitution.apply(text, recipient, pairs)),
				_ if recipient.is_console() => {}
				Segment::Sound(cue) => inner.sink.play_sound(recipient, cue),
				Segment::Overlay(Overlay::Title(card)) => {
					let card = TitleCard {
						title: inner.substitution.apply(&card.title, recipient, pairs),
						subtitle: card.subtitle.as_deref().map(|sub| inner.substitution.apply(sub, recipient, pairs)),
						times: card.times,
					};
					inner.sink.show_title(recipient, &card);
				}
				Segment::Overlay(overlay) => self.show_overlay(recipient, overlay, pairs),
			}
		}
		tracing::trace!(recipient = recipient.name(), segments = message.len(), "delivery.render");
	}

	fn show_overlay(&self, recipient: &RecipientHandle, overlay: &Overlay, pairs: &Substitutions) {
		let inner = &self.inner;
		let (overlay, duration) = match overlay {
			Overlay::Transient(bar) => {
				let mut bar = bar.clone();
				bar.content = inner.substitution.apply(&bar.content, recipient, pairs);
				let duration = bar.duration;
				(Overlay::Transient(bar), duration)
			}
			Overlay::Persistent(bar) => {
				let mut bar = bar.clone();
				bar.content = inner.substitution.apply(&bar.content, recipient, pairs);
				let duration = bar.duration;
				(Overlay::Persistent(bar), duration)
			}
			Overlay::Title(_) => return,
		};

		let kind = overlay.kind();
		let (generation, replaced) = inner.overlays.begin(recipient.id(), kind);
		if replaced {
			inner.sink.clear_overlay(recipient, kind);
		}
		inner.sink.show_overlay(recipient, &overlay);
		if duration > 0 {
			self.schedule_expiry(recipient, kind, generation, duration);
		}
	}

	fn schedule_expiry(&self, recipient: &RecipientHandle, kind: OverlayKind, generation: u64, duration: Ticks) {
		let Some(delay) = self.inner.tick.checked_mul(duration) else {
			tracing::debug!(recipient = recipient.name(), ?kind, duration, "delivery.overlay.unscheduled");
			return;
		};
		let renderer = self.clone();
		let target = recipient.clone();
		let scheduled = self.inner.dispatcher.run_bound_later(recipient, delay, move || {
			if renderer.inner.overlays.finish(target.id(), kind, generation) {
				renderer.inner.sink.clear_overlay(&target, kind);
			}
		});
		if let Err(err) = scheduled {
			tracing::debug!(error = %err, recipient = recipient.name(), ?kind, "delivery.overlay.unscheduled");
		}
	}

	/// Forgets overlays of recipients no longer in `directory`.
	pub fn sweep_overlays(&self, directory: &RecipientDirectory) -> usize {
		let removed = self.inner.overlays.retain(|id| directory.get(id).is_some());
		if removed > 0 {
			tracing::debug!(removed, "delivery.overlay.sweep");
		}
		removed
	}
}

#[cfg(test)]
mod tests {
	use herald_markup::{ActionBar, SoundCue};
	use parking_lot::Mutex;
	use pretty_assertions::assert_eq;
	use uuid::Uuid;

	use super::*;
	use crate::placeholder::UniversalPlaceholders;
	use crate::substitution::PlaceholderEngine;

	#[derive(Debug, Clone, PartialEq)]
	enum Seen {
		Text(String),
		Sound(String),
		Show(String),
		Title(String, Option<String>),
		Clear(OverlayKind),
	}

	#[derive(Default)]
	struct Recorder {
		seen: Mutex<Vec<Seen>>,
	}

	impl Recorder {
		fn take(&self) -> Vec<Seen> {
			std::mem::take(&mut *self.seen.lock())
		}
	}

	impl RenderingSink for Recorder {
		fn send_text(&self, _recipient: &RecipientHandle, text: &str) {
			self.seen.lock().push(Seen::Text(text.to_string()));
		}

		fn play_sound(&self, _recipient: &RecipientHandle, sound: &SoundCue) {
			self.seen.lock().push(Seen::Sound(sound.id.clone()));
		}

		fn show_overlay(&self, _recipient: &RecipientHandle, overlay: &Overlay) {
			let content = match overlay {
				Overlay::Transient(bar) => bar.content.clone(),
				Overlay::Persistent(bar) => bar.content.clone(),
				Overlay::Title(card) => card.title.clone(),
			};
			self.seen.lock().push(Seen::Show(content));
		}

		fn show_title(&self, _recipient: &RecipientHandle, title: &TitleCard) {
			self.seen.lock().push(Seen::Title(title.title.clone(), title.subtitle.clone()));
		}

		fn clear_overlay(&self, _recipient: &RecipientHandle, kind: OverlayKind) {
			self.seen.lock().push(Seen::Clear(kind));
		}
	}

	fn renderer(sink: &Arc<Recorder>, tick: Duration) -> (Renderer, Dispatcher) {
		let dispatcher = Dispatcher::unified().unwrap();
		let engine = Arc::new(PlaceholderEngine::new(Arc::new(UniversalPlaceholders::new())));
		let renderer = Renderer::new(Arc::clone(sink) as Arc<dyn RenderingSink>, engine, dispatcher.clone(), tick);
		(renderer, dispatcher)
	}

	fn sample() -> ParsedMessage {
		ParsedMessage::composer()
			.sound("click")
			.text("Hello {player}")
			.action_bar_for("hp {player}", 0)
			.title("Hi", Some("{player}"))
			.build()
	}

	#[tokio::test]
	async fn renders_segments_in_order_with_substitution() {
		let sink = Arc::new(Recorder::default());
		let (renderer, dispatcher) = renderer(&sink, DEFAULT_TICK);
		let player = RecipientHandle::player(Uuid::new_v4(), "Steve", 0);
		let pairs = Substitutions::new().with("player", "Steve");

		renderer.deliver(&player, Arc::new(sample()), pairs).await.unwrap();
		assert_eq!(
			sink.take(),
			vec![
				Seen::Sound("CLICK".into()),
				Seen::Text("Hello Steve".into()),
				Seen::Show("hp Steve".into()),
				Seen::Title("Hi".into(), Some("Steve".into())),
			]
		);
		dispatcher.shutdown();
	}

	#[tokio::test]
	async fn console_receives_text_only() {
		let sink = Arc::new(Recorder::default());
		let (renderer, dispatcher) = renderer(&sink, DEFAULT_TICK);
		let console = RecipientHandle::console("CONSOLE");

		renderer.deliver(&console, Arc::new(sample()), Substitutions::new()).await.unwrap();
		assert_eq!(sink.take(), vec![Seen::Text("Hello {player}".into())]);
		dispatcher.shutdown();
	}

	#[tokio::test]
	async fn expiry_clears_only_the_latest_overlay() {
		let sink = Arc::new(Recorder::default());
		let (renderer, dispatcher) = renderer(&sink, Duration::from_millis(1));
		let player = RecipientHandle::player(Uuid::new_v4(), "Steve", 0);

		let first = ParsedMessage::composer().action_bar_for("first", 20).build();
		let second = ParsedMessage::composer().action_bar_for("second", 0).build();
		renderer.deliver(&player, Arc::new(first), Substitutions::new()).await.unwrap();
		renderer.deliver(&player, Arc::new(second), Substitutions::new()).await.unwrap();
		tokio::time::sleep(Duration::from_millis(150)).await;

		assert_eq!(
			sink.take(),
			vec![Seen::Show("first".into()), Seen::Clear(OverlayKind::Transient), Seen::Show("second".into())]
		);
		assert!(renderer.overlays().is_active(player.id(), OverlayKind::Transient));
		dispatcher.shutdown();
	}

	#[tokio::test]
	async fn overlay_expires_after_its_duration() {
		let sink = Arc::new(Recorder::default());
		let (renderer, dispatcher) = renderer(&sink, Duration::from_millis(1));
		let player = RecipientHandle::player(Uuid::new_v4(), "Steve", 0);

		let message = ParsedMessage::composer()
			.boss_bar_with(herald_markup::BossBar { duration: 5, ..herald_markup::BossBar::new("boss") })
			.build();
		renderer.deliver(&player, Arc::new(message), Substitutions::new()).await.unwrap();
		tokio::time::sleep(Duration::from_millis(150)).await;

		assert_eq!(sink.take(), vec![Seen::Show("boss".into()), Seen::Clear(OverlayKind::Persistent)]);
		assert!(renderer.overlays().is_empty());
		dispatcher.shutdown();
	}

	#[tokio::test]
	async fn overflowing_overlay_duration_stays_shown() {
		let sink = Arc::new(Recorder::default());
		let (renderer, dispatcher) = renderer(&sink, Duration::from_secs(10_000_000_000));
		let player = RecipientHandle::player(Uuid::new_v4(), "Steve", 0);

		let message = ParsedMessage::composer().action_bar_for("forever", 4_000_000_000).text("after").build();
		renderer.deliver(&player, Arc::new(message), Substitutions::new()).await.unwrap();

		assert_eq!(sink.take(), vec![Seen::Show("forever".into()), Seen::Text("after".into())]);
		assert!(renderer.overlays().is_active(player.id(), OverlayKind::Transient));
		dispatcher.shutdown();
	}

	#[tokio::test]
	async fn retired_recipient_is_not_rendered() {
		let sink = Arc::new(Recorder::default());
		let (renderer, dispatcher) = renderer(&sink, DEFAULT_TICK);
		let player = RecipientHandle::player(Uuid::new_v4(), "Steve", 0);
		player.retire();

		let bar = ParsedMessage::new(vec![Segment::Overlay(Overlay::Transient(ActionBar::new("x")))]);
		assert!(renderer.deliver(&player, Arc::new(bar), Substitutions::new()).await.is_err());
		assert!(sink.take().is_empty());
		dispatcher.shutdown();
	}
}
