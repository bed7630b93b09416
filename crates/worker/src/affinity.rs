/// Region index used by the partitioned strategy.
pub type RegionId = u32;

/// Describes where a recipient-bound job is allowed to run.
///
/// Implemented by recipient handles. The dispatcher consults it at post time
/// and again right before the job executes, so a recipient that leaves or is
/// retired between the two drops the job instead of rendering to a stale
/// target.
pub trait ContextAffinity: Send + Sync {
	/// Region currently owning the target, or `None` for targets that live
	/// on the global context (console, system senders).
	fn region(&self) -> Option<RegionId>;

	/// Returns false once the target must no longer receive work.
	fn is_valid(&self) -> bool;
}

impl<T: ContextAffinity + ?Sized> ContextAffinity for std::sync::Arc<T> {
	fn region(&self) -> Option<RegionId> {
		(**self).region()
	}

	fn is_valid(&self) -> bool {
		(**self).is_valid()
	}
}

