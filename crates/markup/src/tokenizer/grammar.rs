//! Tag grammars and segment construction from their captures.

use std::str::FromStr;
use std::sync::LazyLock;

use regex::{Captures, Regex};
use thiserror::Error;

use crate::segment::{
	ActionBar, BarColor, BarStyle, BossBar, DEFAULT_ACTION_BAR_TICKS, DEFAULT_BOSS_BAR_TICKS, DEFAULT_PITCH, DEFAULT_VOLUME, Overlay, Segment,
	SoundCue, Ticks, TitleCard, TitleTimes,
};
use crate::sound::SoundCatalog;

// Argument groups accept any text; bad numbers and names become malformed
// tags instead of literal text.
static SOUND: LazyLock<Regex> = LazyLock::new(|| compile(r"<sound:([A-Za-z0-9_]+)(?::([^:>]*))?(?::([^:>]*))?>"));
static ACTION_BAR: LazyLock<Regex> = LazyLock::new(|| compile(r"<actionbar(?::([^>]*))?>([^<]+)</actionbar>"));
static BOSS_BAR: LazyLock<Regex> = LazyLock::new(|| compile(r"<bossbar:([^:>]+):([^:>]+):([^:>]+)(?::([^:>]+))?>([^<]+)</bossbar>"));
static TITLE: LazyLock<Regex> = LazyLock::new(|| compile(r"<title(?::([^:>]*):([^:>]*):([^:>]*))?>([^|<]+)(?:\|([^<]+))?</title>"));

fn compile(pattern: &str) -> Regex {
	// Patterns are compile-time constants covered by tests.
	Regex::new(pattern).unwrap_or_else(|err| panic!("invalid built-in tag grammar {pattern}: {err}"))
}

/// One tag grammar. Declaration order is the tie-break priority for tags
/// starting at the same offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Grammar {
	Sound,
	ActionBar,
	BossBar,
	Title,
}

impl Grammar {
	pub const ALL: [Self; 4] = [Self::Sound, Self::ActionBar, Self::BossBar, Self::Title];

	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Sound => "sound",
			Self::ActionBar => "actionbar",
			Self::BossBar => "bossbar",
			Self::Title => "title",
		}
	}

	pub(super) fn regex(self) -> &'static Regex {
		match self {
			Self::Sound => LazyLock::force(&SOUND),
			Self::ActionBar => LazyLock::force(&ACTION_BAR),
			Self::BossBar => LazyLock::force(&BOSS_BAR),
			Self::Title => LazyLock::force(&TITLE),
		}
	}

	pub(super) fn build(self, caps: &Captures<'_>, catalog: &SoundCatalog) -> Result<Segment, MalformedReason> {
		match self {
			Self::Sound => build_sound(caps, catalog),
			Self::ActionBar => build_action_bar(caps),
			Self::BossBar => build_boss_bar(caps),
			Self::Title => build_title(caps),
		}
	}
}

impl std::fmt::Display for Grammar {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Why a matched tag produced no segment.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MalformedReason {
	#[error("unknown sound '{0}'")]
	UnknownSound(String),

	#[error("unknown bar color '{0}'")]
	UnknownColor(String),

	#[error("unknown bar style '{0}'")]
	UnknownStyle(String),

	#[error("invalid {field} '{value}'")]
	InvalidNumber { field: &'static str, value: String },

	/// Boss bar progress outside `[0, 1]`.
	#[error("progress '{0}' outside 0..=1")]
	ProgressOutOfRange(String),
}

fn group<'h>(caps: &Captures<'h>, idx: usize) -> Option<&'h str> {
	caps.get(idx).map(|m| m.as_str())
}

fn parse_scale(field: &'static str, value: Option<&str>, default: f32) -> Result<f32, MalformedReason> {
	let Some(value) = value else { return Ok(default) };
	match f32::from_str(value.trim()) {
		Ok(parsed) if parsed.is_finite() && parsed >= 0.0 => Ok(parsed),
		_ => Err(MalformedReason::InvalidNumber {
			field,
			value: value.to_string(),
		}),
	}
}

fn parse_ticks(field: &'static str, value: Option<&str>, default: Ticks) -> Result<Ticks, MalformedReason> {
	let Some(value) = value else { return Ok(default) };
	Ticks::from_str(value.trim()).map_err(|_| MalformedReason::InvalidNumber {
		field,
		value: value.to_string(),
	})
}

fn build_sound(caps: &Captures<'_>, catalog: &SoundCatalog) -> Result<Segment, MalformedReason> {
	let id = group(caps, 1).unwrap_or_default().to_ascii_uppercase();
	if !catalog.contains(&id) {
		return Err(MalformedReason::UnknownSound(id));
	}
	let volume = parse_scale("volume", group(caps, 2), DEFAULT_VOLUME)?;
	let pitch = parse_scale("pitch", group(caps, 3), DEFAULT_PITCH)?;
	Ok(Segment::Sound(SoundCue { id, volume, pitch }))
}

fn build_action_bar(caps: &Captures<'_>) -> Result<Segment, MalformedReason> {
	let duration = parse_ticks("duration", group(caps, 1), DEFAULT_ACTION_BAR_TICKS)?;
	let content = group(caps, 2).unwrap_or_default().to_string();
	Ok(Segment::Overlay(Overlay::Transient(ActionBar { content, duration })))
}

fn build_boss_bar(caps: &Captures<'_>) -> Result<Segment, MalformedReason> {
	let raw_color = group(caps, 1).unwrap_or_default();
	let color = BarColor::from_str(raw_color).map_err(|()| MalformedReason::UnknownColor(raw_color.to_string()))?;
	let raw_style = group(caps, 2).unwrap_or_default();
	let style = BarStyle::from_str(raw_style).map_err(|()| MalformedReason::UnknownStyle(raw_style.to_string()))?;

	let raw_progress = group(caps, 3).unwrap_or_default();
	let progress = f32::from_str(raw_progress.trim()).map_err(|_| MalformedReason::InvalidNumber {
		field: "progress",
		value: raw_progress.to_string(),
	})?;
	if !(0.0..=1.0).contains(&progress) {
		return Err(MalformedReason::ProgressOutOfRange(raw_progress.to_string()));
	}

	let duration = parse_ticks("duration", group(caps, 4), DEFAULT_BOSS_BAR_TICKS)?;
	let content = group(caps, 5).unwrap_or_default().to_string();
	Ok(Segment::Overlay(Overlay::Persistent(BossBar {
		content,
		color,
		style,
		progress,
		duration,
	})))
}

fn build_title(caps: &Captures<'_>) -> Result<Segment, MalformedReason> {
	let defaults = TitleTimes::default();
	let times = TitleTimes {
		fade_in: parse_ticks("fade-in", group(caps, 1), defaults.fade_in)?,
		stay: parse_ticks("stay", group(caps, 2), defaults.stay)?,
		fade_out: parse_ticks("fade-out", group(caps, 3), defaults.fade_out)?,
	};
	let title = group(caps, 4).unwrap_or_default().to_string();
	let subtitle = group(caps, 5).map(str::to_string);
	Ok(Segment::Overlay(Overlay::Title(TitleCard { title, subtitle, times })))
}
