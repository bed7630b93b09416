use crate::segment::{ActionBar, BossBar, Overlay, Segment, SoundCue, Ticks, TitleCard, TitleTimes};

/// Ordered, immutable sequence of segments.
///
/// Produced once per distinct raw text and shared as `Arc<ParsedMessage>`;
/// nothing mutates it after construction.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedMessage {
	segments: Vec<Segment>,
}

impl ParsedMessage {
	pub fn new(segments: Vec<Segment>) -> Self {
		Self { segments }
	}

	pub fn empty() -> Self {
		Self::default()
	}

	/// Starts a programmatic message with the grammar's defaults.
	pub fn composer() -> Composer {
		Composer::default()
	}

	pub fn segments(&self) -> &[Segment] {
		&self.segments
	}

	pub fn iter(&self) -> std::slice::Iter<'_, Segment> {
		self.segments.iter()
	}

	pub fn len(&self) -> usize {
		self.segments.len()
	}

	pub fn is_empty(&self) -> bool {
		self.segments.is_empty()
	}
}

impl<'a> IntoIterator for &'a ParsedMessage {
	type Item = &'a Segment;
	type IntoIter = std::slice::Iter<'a, Segment>;

	fn into_iter(self) -> Self::IntoIter {
		self.segments.iter()
	}
}

/// Builder for messages assembled in code rather than parsed from markup.
#[derive(Debug, Clone, Default)]
#[must_use]
pub struct Composer {
	segments: Vec<Segment>,
}

impl Composer {
	/// Appends a text line. Blank text is ignored, as in parsed markup.
	pub fn text(mut self, text: impl AsRef<str>) -> Self {
		let text = text.as_ref().trim();
		if !text.is_empty() {
			self.segments.push(Segment::Text(text.to_string()));
		}
		self
	}

	pub fn sound(self, id: impl AsRef<str>) -> Self {
		self.push(Segment::Sound(SoundCue::new(id)))
	}

	pub fn sound_with(self, id: impl AsRef<str>, volume: f32, pitch: f32) -> Self {
		self.push(Segment::Sound(SoundCue::with(id, volume, pitch)))
	}

	pub fn action_bar(self, content: impl Into<String>) -> Self {
		self.push(Segment::Overlay(Overlay::Transient(ActionBar::new(content))))
	}

	pub fn action_bar_for(self, content: impl Into<String>, duration: Ticks) -> Self {
		self.push(Segment::Overlay(Overlay::Transient(ActionBar {
			content: content.into(),
			duration,
		})))
	}

	pub fn boss_bar(self, content: impl Into<String>) -> Self {
		self.push(Segment::Overlay(Overlay::Persistent(BossBar::new(content))))
	}

	pub fn boss_bar_with(self, bar: BossBar) -> Self {
		self.push(Segment::Overlay(Overlay::Persistent(bar)))
	}

	pub fn title(self, title: impl Into<String>, subtitle: Option<&str>) -> Self {
		self.title_with(title, subtitle, TitleTimes::default())
	}

	pub fn title_with(self, title: impl Into<String>, subtitle: Option<&str>, times: TitleTimes) -> Self {
		self.push(Segment::Overlay(Overlay::Title(TitleCard {
			title: title.into(),
			subtitle: subtitle.map(str::to_string),
			times,
		})))
	}

	pub fn build(self) -> ParsedMessage {
		ParsedMessage::new(self.segments)
	}

	fn push(mut self, segment: Segment) -> Self {
		self.segments.push(segment);
		self
	}
}

#[cfg(test)]
mod tests {
	use pretty_assertions::assert_eq;

	use super::*;
	use crate::segment::{BarColor, BarStyle, DEFAULT_ACTION_BAR_TICKS};

	#[test]
	fn composer_applies_grammar_defaults() {
		let msg = ParsedMessage::composer()
			.text("  hello  ")
			.text("   ")
			.sound("click")
			.action_bar("bar")
			.boss_bar("boss")
			.title("Hi", Some("there"))
			.build();

		assert_eq!(
			msg.segments(),
			&[
				Segment::Text("hello".into()),
				Segment::Sound(SoundCue {
					id: "CLICK".into(),
					volume: 1.0,
					pitch: 1.0
				}),
				Segment::Overlay(Overlay::Transient(ActionBar {
					content: "bar".into(),
					duration: DEFAULT_ACTION_BAR_TICKS
				})),
				Segment::Overlay(Overlay::Persistent(BossBar {
					content: "boss".into(),
					color: BarColor::White,
					style: BarStyle::Solid,
					progress: 1.0,
					duration: 600
				})),
				Segment::Overlay(Overlay::Title(TitleCard {
					title: "Hi".into(),
					subtitle: Some("there".into()),
					times: TitleTimes::new(10, 70, 20)
				})),
			]
		);
	}

	#[test]
	fn empty_composer_builds_empty_message() {
		assert!(ParsedMessage::composer().build().is_empty());
	}
}
