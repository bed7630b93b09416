use thiserror::Error;

/// Errors resolving a [`PendingParse`](crate::PendingParse).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MarkupError {
	/// The parse job was dropped before producing a result, typically
	/// because the dispatcher shut down.
	#[error("parse abandoned before completion")]
	Abandoned,
}
