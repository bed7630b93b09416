//! Herald delivers rich composite messages to recipients.
//!
//! Raw text with embedded sound, overlay and title tags is parsed once
//! (and cached), queued per recipient so it renders in submission order,
//! and rendered on whichever execution context owns the recipient.
//!
//! ```no_run
//! # use std::sync::Arc;
//! # fn demo(sink: Arc<dyn herald::RenderingSink>) -> herald::Result<()> {
//! let herald = herald::Herald::builder(sink).start()?;
//! let console = herald.console();
//! herald.submit(console.identity(), "<sound:CLICK>Server restarting in {n}s", herald::Substitutions::new().with("n", 30))?;
//! herald.shutdown();
//! # Ok(())
//! # }
//! ```

mod config;
mod error;
mod registry;
mod service;

pub use config::{DeliveryConfig, DispatchConfig, HeraldConfig, MarkupConfig};
pub use error::{ConfigError, HeraldError, Result};
pub use herald_delivery::{
	ExternalExpander, Identity, Placeholder, PlaceholderEngine, QueueStats, RecipientDirectory, RecipientHandle, RecipientKind, RenderingSink,
	SubstitutionEngine, Substitutions, UniversalPlaceholders,
};
pub use herald_markup::{ParsedMessage, PendingParse, segment};
pub use herald_worker::{ContextId, ExecutionStrategy, HostCapabilities, HostProbe, StrategyPreference, current_context};
pub use registry::MessageRegistry;
pub use service::{Herald, HeraldBuilder};
