use uuid::Uuid;

/// Queue key for a delivery target.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Identity {
	/// A player or other entity, keyed by its stable id.
	Recipient(Uuid),
	/// A non-entity sender such as the console, keyed by name.
	Sender(String),
}

impl Identity {
	pub fn sender(name: impl Into<String>) -> Self {
		Self::Sender(name.into())
	}
}

impl From<Uuid> for Identity {
	fn from(id: Uuid) -> Self {
		Self::Recipient(id)
	}
}

impl std::fmt::Display for Identity {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::Recipient(id) => write!(f, "recipient:{id}"),
			Self::Sender(name) => write!(f, "sender:{name}"),
		}
	}
}
