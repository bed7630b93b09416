//! Execution contexts and platform-adaptive dispatch for herald.
//!
//! The [`Dispatcher`] picks one [`ExecutionStrategy`] at startup and hides it
//! behind a uniform scheduling API. Raw `tokio::spawn`/`std::thread::spawn`
//! are disallowed workspace-wide; use [`spawn`], [`spawn_blocking`] and
//! [`spawn_named_thread`] so every task carries a [`TaskClass`].

mod affinity;
mod class;
mod context;
mod dispatcher;
mod error;
mod handle;
pub mod mailbox;
mod panic;
mod spawn;
mod strategy;

pub use affinity::{ContextAffinity, RegionId};
pub use class::TaskClass;
pub use context::{ContextId, ContextRecord, current_context};
pub use dispatcher::{Dispatcher, JobResult};
pub use error::{DispatchError, Result};
pub use handle::ScheduledTaskHandle;
pub use mailbox::{Mailbox, MailboxClosed, MailboxReceiver, MailboxSender};
pub use spawn::{spawn, spawn_blocking, spawn_named_thread};
pub use strategy::{
	DEFAULT_ASYNC_WORKERS, DEFAULT_REGIONS, DispatchOptions, ExecutionStrategy, HostCapabilities, HostProbe, StrategyPreference,
};
