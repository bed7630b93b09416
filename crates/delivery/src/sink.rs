use herald_markup::{Overlay, OverlayKind, SoundCue, TitleCard};

use crate::recipient::RecipientHandle;

/// Host-side rendering calls.
///
/// Every method is invoked on the execution context owning the recipient,
/// so implementations may touch recipient state directly. Payloads arrive
/// with placeholders already substituted.
pub trait RenderingSink: Send + Sync {
	fn send_text(&self, recipient: &RecipientHandle, text: &str);

	fn play_sound(&self, recipient: &RecipientHandle, sound: &SoundCue);

	/// Shows a transient or persistent overlay, replacing any active overlay
	/// of the same kind.
	fn show_overlay(&self, recipient: &RecipientHandle, overlay: &Overlay);

	fn show_title(&self, recipient: &RecipientHandle, title: &TitleCard);

	/// Removes the recipient's active overlay of `kind`, if any.
	fn clear_overlay(&self, recipient: &RecipientHandle, kind: OverlayKind);
}
