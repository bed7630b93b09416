/// What a spawned task is for; carried into `worker.*` trace events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskClass {
	/// Recipient-bound rendering work executed on an execution context.
	Render,
	/// CPU-bound markup parsing executed off the dispatch contexts.
	Parse,
	/// Per-identity delivery loops awaiting parses and render hand-offs.
	Delivery,
	/// Delayed and periodic timers.
	Timer,
}

impl TaskClass {
	pub(crate) const fn as_str(self) -> &'static str {
		match self {
			Self::Render => "render",
			Self::Parse => "parse",
			Self::Delivery => "delivery",
			Self::Timer => "timer",
		}
	}
}
