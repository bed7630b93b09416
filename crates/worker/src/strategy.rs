//! Concurrency mode selection.

use std::str::FromStr;

use crate::affinity::RegionId;

/// Default size of the dedicated async pool.
pub const DEFAULT_ASYNC_WORKERS: usize = 2;
/// Default region count used when the host reports partitioning support.
pub const DEFAULT_REGIONS: usize = 4;

/// Which concurrency mode the dispatcher runs in. Exactly one is chosen at
/// startup and it never changes for the dispatcher's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionStrategy {
	/// One global context; async work goes to the runtime's blocking pool.
	Unified,
	/// One global context plus a dedicated async worker pool.
	UnifiedWithAsyncPool { workers: usize },
	/// Recipient work runs on the region owning the recipient.
	Partitioned { regions: usize, async_workers: usize },
}

impl ExecutionStrategy {
	pub const fn name(&self) -> &'static str {
		match self {
			Self::Unified => "unified",
			Self::UnifiedWithAsyncPool { .. } => "async-pool",
			Self::Partitioned { .. } => "partitioned",
		}
	}

	pub const fn is_partitioned(&self) -> bool {
		matches!(self, Self::Partitioned { .. })
	}

	/// Picks the richest mode the host reports, honoring an explicit preference.
	pub fn select(options: &DispatchOptions, caps: &HostCapabilities) -> Self {
		let partitioned = Self::Partitioned {
			regions: options.regions,
			async_workers: options.async_workers,
		};
		let pooled = Self::UnifiedWithAsyncPool {
			workers: options.async_workers,
		};

		match options.preference {
			StrategyPreference::Unified => Self::Unified,
			StrategyPreference::Partitioned => partitioned,
			StrategyPreference::AsyncPool => pooled,
			StrategyPreference::Auto if caps.partitioned => partitioned,
			StrategyPreference::Auto if caps.async_pool => pooled,
			StrategyPreference::Auto => Self::Unified,
		}
	}
}

impl std::fmt::Display for ExecutionStrategy {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.name())
	}
}

/// Operator preference from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StrategyPreference {
	#[default]
	Auto,
	Unified,
	Partitioned,
	AsyncPool,
}

impl FromStr for StrategyPreference {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.trim().to_ascii_lowercase().as_str() {
			"auto" => Ok(Self::Auto),
			"unified" => Ok(Self::Unified),
			"partitioned" => Ok(Self::Partitioned),
			"async-pool" | "async_pool" => Ok(Self::AsyncPool),
			other => Err(format!("unknown dispatch strategy '{other}' (expected auto, unified, partitioned or async-pool)")),
		}
	}
}

/// Sizing and preference for dispatcher startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchOptions {
	pub preference: StrategyPreference,
	pub regions: usize,
	pub async_workers: usize,
}

impl Default for DispatchOptions {
	fn default() -> Self {
		Self {
			preference: StrategyPreference::Auto,
			regions: DEFAULT_REGIONS,
			async_workers: DEFAULT_ASYNC_WORKERS,
		}
	}
}

/// What the host reports it can do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HostCapabilities {
	/// Host owns region schedulers recipients can be bound to.
	pub partitioned: bool,
	/// Host tolerates a dedicated async worker pool.
	pub async_pool: bool,
}

/// Capability probe supplied by the host embedding the dispatcher.
pub trait HostProbe: Send + Sync {
	fn probe(&self) -> HostCapabilities;

	/// Binds one region scheduler. Failing here makes the dispatcher fall
	/// back to [`ExecutionStrategy::Unified`].
	fn bind_region(&self, region: RegionId) -> Result<(), String> {
		let _ = region;
		Ok(())
	}
}

impl HostProbe for HostCapabilities {
	fn probe(&self) -> HostCapabilities {
		*self
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn opts(preference: StrategyPreference) -> DispatchOptions {
		DispatchOptions {
			preference,
			regions: 3,
			async_workers: 2,
		}
	}

	#[test]
	fn auto_picks_richest_reported_mode() {
		let both = HostCapabilities {
			partitioned: true,
			async_pool: true,
		};
		let pool_only = HostCapabilities {
			partitioned: false,
			async_pool: true,
		};
		let auto = opts(StrategyPreference::Auto);

		assert_eq!(
			ExecutionStrategy::select(&auto, &both),
			ExecutionStrategy::Partitioned {
				regions: 3,
				async_workers: 2
			}
		);
		assert_eq!(
			ExecutionStrategy::select(&auto, &pool_only),
			ExecutionStrategy::UnifiedWithAsyncPool { workers: 2 }
		);
		assert_eq!(
			ExecutionStrategy::select(&auto, &HostCapabilities::default()),
			ExecutionStrategy::Unified
		);
	}

	#[test]
	fn explicit_preference_overrides_probe() {
		let both = HostCapabilities {
			partitioned: true,
			async_pool: true,
		};
		assert_eq!(
			ExecutionStrategy::select(&opts(StrategyPreference::Unified), &both),
			ExecutionStrategy::Unified
		);
	}

	#[test]
	fn preference_parses_config_spellings() {
		assert_eq!("Auto".parse(), Ok(StrategyPreference::Auto));
		assert_eq!("async-pool".parse(), Ok(StrategyPreference::AsyncPool));
		assert_eq!("async_pool".parse(), Ok(StrategyPreference::AsyncPool));
		assert!("regional".parse::<StrategyPreference>().is_err());
	}
}
