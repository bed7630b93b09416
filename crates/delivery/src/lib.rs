//! Ordered delivery for herald.
//!
//! Tickets submitted for one [`Identity`] render strictly in submission
//! order on the execution context that owns the recipient. The
//! [`RecipientDirectory`] decides whether a recipient is still there;
//! [`Renderer`] applies substitutions and hands segments to the host's
//! [`RenderingSink`].

mod identity;
mod overlay;
mod placeholder;
mod queue;
mod recipient;
mod render;
mod sink;
mod substitution;

pub use identity::Identity;
pub use overlay::OverlayLifecycle;
pub use placeholder::{Placeholder, PlaceholderError, Substitutions, UniversalPlaceholders};
pub use queue::{
	DEFAULT_IDLE_REAP, DEFAULT_STALL_WARNING, DeliveryTicket, OrderedDeliveryQueue, QueueOptions, QueueStats, SweepReport,
};
pub use recipient::{CONSOLE_NAME, RecipientDirectory, RecipientHandle, RecipientKind};
pub use render::{DEFAULT_TICK, Renderer};
pub use sink::RenderingSink;
pub use substitution::{DEFAULT_SUBSTITUTION_TIMEOUT, ExternalExpander, PlaceholderEngine, SubstitutionEngine};
