use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::timeout;

use super::*;
use crate::context::current_context;
use crate::strategy::StrategyPreference;

const WAIT: Duration = Duration::from_secs(2);

#[derive(Debug, Default)]
struct Target {
	region: AtomicU32,
	retired: AtomicBool,
}

impl Target {
	fn in_region(region: RegionId) -> Arc<Self> {
		Arc::new(Self {
			region: AtomicU32::new(region),
			retired: AtomicBool::new(false),
		})
	}
}

impl ContextAffinity for Target {
	fn region(&self) -> Option<RegionId> {
		Some(self.region.load(Ordering::Acquire))
	}

	fn is_valid(&self) -> bool {
		!self.retired.load(Ordering::Acquire)
	}
}

struct FailingRegions;

impl HostProbe for FailingRegions {
	fn probe(&self) -> HostCapabilities {
		HostCapabilities {
			partitioned: true,
			async_pool: true,
		}
	}

	fn bind_region(&self, region: RegionId) -> std::result::Result<(), String> {
		Err(format!("region {region} scheduler unavailable"))
	}
}

fn partitioned(regions: usize) -> Dispatcher {
	let options = DispatchOptions {
		preference: StrategyPreference::Auto,
		regions,
		async_workers: 1,
	};
	let caps = HostCapabilities {
		partitioned: true,
		async_pool: true,
	};
	Dispatcher::start(options, &caps).unwrap()
}

#[tokio::test]
async fn run_now_executes_in_submission_order_on_global() {
	let dispatcher = Dispatcher::unified().unwrap();
	let (tx, mut rx) = mpsc::unbounded_channel();
	for i in 0..5 {
		let tx = tx.clone();
		dispatcher.run_now(move || tx.send((i, current_context())).unwrap()).unwrap();
	}

	for i in 0..5 {
		let got = timeout(WAIT, rx.recv()).await.unwrap().unwrap();
		assert_eq!(got, (i, Some(ContextId::Global)));
	}
	dispatcher.shutdown();
}

#[tokio::test]
async fn failed_region_bind_falls_back_to_unified() {
	let dispatcher = Dispatcher::start(DispatchOptions::default(), &FailingRegions).unwrap();
	assert_eq!(dispatcher.strategy(), ExecutionStrategy::Unified);

	let records = dispatcher.snapshots();
	assert_eq!(records.len(), 1);
	assert_eq!(records[0].id, ContextId::Global);

	let target = Target::in_region(2);
	let ran_on = dispatcher.run_bound_async(&target, current_context).await.unwrap();
	assert_eq!(ran_on, Some(ContextId::Global));
	dispatcher.shutdown();
}

#[tokio::test]
async fn forced_pool_without_host_support_falls_back_to_unified() {
	let options = DispatchOptions {
		preference: StrategyPreference::AsyncPool,
		..DispatchOptions::default()
	};
	let dispatcher = Dispatcher::start(options, &HostCapabilities::default()).unwrap();
	assert_eq!(dispatcher.strategy(), ExecutionStrategy::Unified);
	assert_eq!(dispatcher.snapshots().len(), 1);
	assert_eq!(dispatcher.run_async(|| 6 * 7).await, Ok(42));
	dispatcher.shutdown();
}

#[tokio::test]
async fn partitioned_host_without_pool_binds_regions_only() {
	let options = DispatchOptions {
		preference: StrategyPreference::Partitioned,
		regions: 2,
		async_workers: 3,
	};
	let caps = HostCapabilities {
		partitioned: true,
		async_pool: false,
	};
	let dispatcher = Dispatcher::start(options, &caps).unwrap();
	assert_eq!(
		dispatcher.strategy(),
		ExecutionStrategy::Partitioned {
			regions: 2,
			async_workers: 0
		}
	);

	let ids: Vec<ContextId> = dispatcher.snapshots().into_iter().map(|r| r.id).collect();
	assert!(ids.iter().all(|id| !matches!(id, ContextId::AsyncPool)));
	assert_eq!(dispatcher.run_async(|| "blocking").await, Ok("blocking"));
	dispatcher.shutdown();
}

#[tokio::test]
async fn zero_regions_falls_back_to_unified() {
	let dispatcher = partitioned(0);
	assert_eq!(dispatcher.strategy(), ExecutionStrategy::Unified);
	assert_eq!(dispatcher.run_async(|| 2 + 2).await, Ok(4));
	dispatcher.shutdown();
}

#[tokio::test]
async fn partitioned_routes_bound_work_to_owning_region() {
	let dispatcher = partitioned(3);
	assert!(dispatcher.strategy().is_partitioned());

	let near = Target::in_region(1);
	let wrapped = Target::in_region(5);
	assert_eq!(
		dispatcher.run_bound_async(&near, current_context).await,
		Ok(Some(ContextId::Region(1)))
	);
	assert_eq!(
		dispatcher.run_bound_async(&wrapped, current_context).await,
		Ok(Some(ContextId::Region(2)))
	);

	near.region.store(0, Ordering::Release);
	assert_eq!(
		dispatcher.run_bound_async(&near, current_context).await,
		Ok(Some(ContextId::Region(0)))
	);
	dispatcher.shutdown();
}

#[tokio::test]
async fn retired_target_rejects_bound_work() {
	let dispatcher = partitioned(2);
	let target = Target::in_region(0);
	target.retired.store(true, Ordering::Release);

	assert_eq!(dispatcher.run_bound(&target, || {}), Err(DispatchError::TargetRetired));
	assert_eq!(
		dispatcher.run_bound_async(&target, || ()).await,
		Err(DispatchError::TargetRetired)
	);
	dispatcher.shutdown();
}

#[tokio::test]
async fn async_work_never_runs_on_global() {
	for dispatcher in [Dispatcher::unified().unwrap(), partitioned(2)] {
		let ran_on = dispatcher.run_async(current_context).await.unwrap();
		assert_ne!(ran_on, Some(ContextId::Global));
		dispatcher.shutdown();
	}
}

#[tokio::test]
async fn panicking_job_reports_panicked() {
	let dispatcher = Dispatcher::unified().unwrap();
	let err = dispatcher.run_now_async(|| -> u32 { panic!("render failed") }).await.unwrap_err();
	assert_eq!(err, DispatchError::Panicked("render failed".into()));

	assert_eq!(dispatcher.run_now_async(|| 7).await, Ok(7));
	dispatcher.shutdown();
	assert_eq!(dispatcher.snapshots()[0].panicked, 1);
}

#[tokio::test]
async fn run_later_fires_once_after_delay() {
	let dispatcher = Dispatcher::unified().unwrap();
	let (tx, mut rx) = mpsc::unbounded_channel();
	let handle = dispatcher
		.run_later(Duration::from_millis(20), move || tx.send(current_context()).unwrap())
		.unwrap();

	assert_eq!(timeout(WAIT, rx.recv()).await.unwrap(), Some(Some(ContextId::Global)));
	assert!(!handle.is_cancelled());
	dispatcher.shutdown();
}

#[tokio::test]
async fn cancelled_run_later_never_runs() {
	let dispatcher = Dispatcher::unified().unwrap();
	let (tx, mut rx) = mpsc::unbounded_channel::<()>();
	let handle = dispatcher.run_later(Duration::from_millis(30), move || tx.send(()).unwrap()).unwrap();
	handle.cancel();

	// Sender is dropped with the cancelled job, closing the channel.
	assert_eq!(timeout(WAIT, rx.recv()).await.unwrap(), None);
	dispatcher.shutdown();
}

#[tokio::test]
async fn run_every_repeats_until_cancelled() {
	let dispatcher = Dispatcher::unified().unwrap();
	let (tx, mut rx) = mpsc::unbounded_channel();
	let handle = dispatcher
		.run_every(Duration::ZERO, Duration::from_millis(10), move || {
			let _ = tx.send(());
		})
		.unwrap();

	for _ in 0..3 {
		timeout(WAIT, rx.recv()).await.unwrap().unwrap();
	}
	handle.cancel();

	// Timer task exits and drops the last sender.
	while timeout(WAIT, rx.recv()).await.unwrap().is_some() {}
	dispatcher.shutdown();
}

#[tokio::test]
async fn cancel_all_stops_outstanding_and_keeps_dispatcher_usable() {
	let dispatcher = Dispatcher::unified().unwrap();
	let first = dispatcher.run_later(Duration::from_secs(60), || {}).unwrap();
	let periodic = dispatcher.run_every(Duration::from_secs(60), Duration::from_secs(60), || {}).unwrap();

	dispatcher.cancel_all();
	assert!(first.is_cancelled());
	assert!(periodic.is_cancelled());

	let (tx, mut rx) = mpsc::unbounded_channel();
	let later = dispatcher.run_later(Duration::from_millis(5), move || tx.send(1).unwrap()).unwrap();
	assert!(later.id() > periodic.id());
	assert_eq!(timeout(WAIT, rx.recv()).await.unwrap(), Some(1));
	dispatcher.shutdown();
}

#[tokio::test]
async fn run_bound_later_resolves_region_when_fired() {
	let dispatcher = partitioned(4);
	let target = Target::in_region(1);
	let (tx, mut rx) = mpsc::unbounded_channel();
	dispatcher
		.run_bound_later(&target, Duration::from_millis(30), move || tx.send(current_context()).unwrap())
		.unwrap();
	target.region.store(3, Ordering::Release);

	assert_eq!(timeout(WAIT, rx.recv()).await.unwrap(), Some(Some(ContextId::Region(3))));
	dispatcher.shutdown();
}

#[tokio::test]
async fn shutdown_rejects_new_work() {
	let dispatcher = Dispatcher::unified().unwrap();
	let pending = dispatcher.run_later(Duration::from_secs(60), || {}).unwrap();
	dispatcher.shutdown();
	dispatcher.shutdown();

	assert!(pending.is_cancelled());
	assert!(dispatcher.is_shut_down());
	assert_eq!(dispatcher.run_now(|| {}), Err(DispatchError::ShutDown));
	assert!(matches!(dispatcher.run_later(Duration::ZERO, || {}), Err(DispatchError::ShutDown)));
	assert_eq!(dispatcher.run_async(|| 1).await, Err(DispatchError::ShutDown));
	assert_eq!(dispatcher.run_now_async(|| 1).await, Err(DispatchError::ShutDown));
}
