//! Typed, immutable message segments.

use std::str::FromStr;

/// Host scheduling quantum used for overlay durations.
pub type Ticks = u32;

pub const DEFAULT_VOLUME: f32 = 1.0;
pub const DEFAULT_PITCH: f32 = 1.0;
pub const DEFAULT_ACTION_BAR_TICKS: Ticks = 60;
pub const DEFAULT_BOSS_BAR_TICKS: Ticks = 600;
pub const DEFAULT_BOSS_BAR_PROGRESS: f32 = 1.0;

/// One renderable unit of a parsed message.
#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
	Text(String),
	Sound(SoundCue),
	Overlay(Overlay),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SoundCue {
	/// Upper-cased sound identifier.
	pub id: String,
	pub volume: f32,
	pub pitch: f32,
}

impl SoundCue {
	pub fn new(id: impl AsRef<str>) -> Self {
		Self::with(id, DEFAULT_VOLUME, DEFAULT_PITCH)
	}

	pub fn with(id: impl AsRef<str>, volume: f32, pitch: f32) -> Self {
		Self {
			id: id.as_ref().to_ascii_uppercase(),
			volume,
			pitch,
		}
	}
}

/// Overlay slot a segment occupies on the recipient's screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OverlayKind {
	/// Action bar line.
	Transient,
	/// Boss bar.
	Persistent,
	/// Title and subtitle.
	Title,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Overlay {
	Transient(ActionBar),
	Persistent(BossBar),
	Title(TitleCard),
}

impl Overlay {
	pub fn kind(&self) -> OverlayKind {
		match self {
			Self::Transient(_) => OverlayKind::Transient,
			Self::Persistent(_) => OverlayKind::Persistent,
			Self::Title(_) => OverlayKind::Title,
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionBar {
	pub content: String,
	pub duration: Ticks,
}

impl ActionBar {
	pub fn new(content: impl Into<String>) -> Self {
		Self {
			content: content.into(),
			duration: DEFAULT_ACTION_BAR_TICKS,
		}
	}
}

#[derive(Debug, Clone, PartialEq)]
pub struct BossBar {
	pub content: String,
	pub color: BarColor,
	pub style: BarStyle,
	/// Fill fraction in `[0, 1]`.
	pub progress: f32,
	pub duration: Ticks,
}

impl BossBar {
	pub fn new(content: impl Into<String>) -> Self {
		Self {
			content: content.into(),
			color: BarColor::default(),
			style: BarStyle::default(),
			progress: DEFAULT_BOSS_BAR_PROGRESS,
			duration: DEFAULT_BOSS_BAR_TICKS,
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TitleCard {
	pub title: String,
	pub subtitle: Option<String>,
	pub times: TitleTimes,
}

/// Fade-in, stay and fade-out durations of a title.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TitleTimes {
	pub fade_in: Ticks,
	pub stay: Ticks,
	pub fade_out: Ticks,
}

impl TitleTimes {
	pub const fn new(fade_in: Ticks, stay: Ticks, fade_out: Ticks) -> Self {
		Self { fade_in, stay, fade_out }
	}

	/// Total on-screen time.
	pub const fn total(&self) -> Ticks {
		self.fade_in.saturating_add(self.stay).saturating_add(self.fade_out)
	}
}

impl Default for TitleTimes {
	fn default() -> Self {
		Self::new(10, 70, 20)
	}
}

macro_rules! named_enum {
	($(#[$meta:meta])* $name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
		$(#[$meta])*
		#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
		pub enum $name {
			$($variant),+
		}

		impl $name {
			pub const ALL: &'static [Self] = &[$(Self::$variant),+];

			pub const fn as_str(self) -> &'static str {
				match self {
					$(Self::$variant => $text),+
				}
			}
		}

		impl FromStr for $name {
			type Err = ();

			/// Case-insensitive lookup by name.
			fn from_str(s: &str) -> Result<Self, Self::Err> {
				Self::ALL.iter().copied().find(|v| v.as_str().eq_ignore_ascii_case(s.trim())).ok_or(())
			}
		}

		impl std::fmt::Display for $name {
			fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
				f.write_str(self.as_str())
			}
		}
	};
}

named_enum!(
	/// Boss bar color. `White` is the neutral default.
	BarColor {
		Pink => "PINK",
		Blue => "BLUE",
		Red => "RED",
		Green => "GREEN",
		Yellow => "YELLOW",
		Purple => "PURPLE",
		White => "WHITE",
	}
);

named_enum!(
	/// Boss bar segmentation.
	BarStyle {
		Solid => "SOLID",
		Segmented6 => "SEGMENTED_6",
		Segmented10 => "SEGMENTED_10",
		Segmented12 => "SEGMENTED_12",
		Segmented20 => "SEGMENTED_20",
	}
);

impl Default for BarColor {
	fn default() -> Self {
		Self::White
	}
}

impl Default for BarStyle {
	fn default() -> Self {
		Self::Solid
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn bar_names_parse_case_insensitively() {
		assert_eq!("pink".parse(), Ok(BarColor::Pink));
		assert_eq!("Segmented_12".parse(), Ok(BarStyle::Segmented12));
		assert_eq!("ORANGE".parse::<BarColor>(), Err(()));
	}

	#[test]
	fn sound_ids_are_upper_cased() {
		assert_eq!(SoundCue::new("ui_button_click").id, "UI_BUTTON_CLICK");
	}

	#[test]
	fn title_total_saturates() {
		assert_eq!(TitleTimes::default().total(), 100);
		assert_eq!(TitleTimes::new(u32::MAX, 1, 1).total(), u32::MAX);
	}
}
