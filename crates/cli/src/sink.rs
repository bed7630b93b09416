use std::io::Write;

use herald::segment::{Overlay, OverlayKind, SoundCue, TitleCard};
use herald::{RecipientHandle, RenderingSink};

/// Prints every rendering call as one terminal line.
#[derive(Debug, Default)]
pub struct TerminalSink;

impl TerminalSink {
	fn line(&self, recipient: &RecipientHandle, body: std::fmt::Arguments<'_>) {
		let mut out = std::io::stdout().lock();
		let _ = writeln!(out, "[{}] {body}", recipient.name());
	}
}

impl RenderingSink for TerminalSink {
	fn send_text(&self, recipient: &RecipientHandle, text: &str) {
		self.line(recipient, format_args!("{text}"));
	}

	fn play_sound(&self, recipient: &RecipientHandle, sound: &SoundCue) {
		self.line(recipient, format_args!("<sound {} volume={} pitch={}>", sound.id, sound.volume, sound.pitch));
	}

	fn show_overlay(&self, recipient: &RecipientHandle, overlay: &Overlay) {
		match overlay {
			Overlay::Transient(bar) => self.line(recipient, format_args!("<actionbar {}t> {}", bar.duration, bar.content)),
			Overlay::Persistent(bar) => self.line(
				recipient,
				format_args!("<bossbar {} {} {:.2} {}t> {}", bar.color, bar.style, bar.progress, bar.duration, bar.content),
			),
			Overlay::Title(card) => self.show_title(recipient, card),
		}
	}

	fn show_title(&self, recipient: &RecipientHandle, title: &TitleCard) {
		let times = title.times;
		match &title.subtitle {
			Some(sub) => self.line(
				recipient,
				format_args!("<title {}/{}/{}> {} | {sub}", times.fade_in, times.stay, times.fade_out, title.title),
			),
			None => self.line(recipient, format_args!("<title {}/{}/{}> {}", times.fade_in, times.stay, times.fade_out, title.title)),
		}
	}

	fn clear_overlay(&self, recipient: &RecipientHandle, kind: OverlayKind) {
		self.line(recipient, format_args!("<clear {kind:?}>"));
	}
}
