// Refresh loop: fan out one fetch per device, wait for all, merge, publish.
// Cycles run inside one task and never overlap; a tick that fires mid-cycle is skipped.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use futures_util::future::join_all;
use tokio::sync::{oneshot, watch};
use tokio::time::{Duration, interval};
use tracing::{Instrument, instrument};

use crate::fetcher::{FetchError, ReadingFetcher};
use crate::models::{DeviceCatalog, DeviceId, DeviceSeries, Reading, Snapshot, Status};

pub type FetchOutcome = (DeviceId, Result<Vec<Reading>, FetchError>);

/// Folds one cycle's outcomes into the previous snapshot.
///
/// Successful devices get their series replaced wholesale; failed devices keep the
/// previous series. The last failure in `outcomes` order becomes the status message:
/// `Error` while no device has ever produced data, otherwise `Ready` with a notice.
pub fn merge(previous: &Snapshot, outcomes: Vec<FetchOutcome>) -> Snapshot {
    let mut series = previous.series.clone();
    let mut has_data = previous.has_data;
    let mut last_failure: Option<String> = None;

    for (id, outcome) in outcomes {
        match outcome {
            Ok(readings) => {
                if let Some(s) = series.get_mut(&id) {
                    s.readings = readings;
                    has_data = true;
                }
            }
            Err(e) => last_failure = Some(e.to_string()),
        }
    }

    let status = match last_failure {
        None => Status::Ready { notice: None },
        Some(message) if has_data => Status::Ready {
            notice: Some(message),
        },
        Some(message) => Status::Error { message },
    };

    Snapshot {
        cycle: previous.cycle + 1,
        status,
        has_data,
        series,
    }
}

/// Field-wise equality where floats compare by bit pattern, so a NaN reading
/// equals the same NaN on the next cycle.
fn same_reading(a: &Reading, b: &Reading) -> bool {
    a.timestamp == b.timestamp
        && a.temperature.to_bits() == b.temperature.to_bits()
        && a.humidity.to_bits() == b.humidity.to_bits()
        && a.illuminance == b.illuminance
        && a.light.to_bits() == b.light.to_bits()
}

fn same_series(
    a: &BTreeMap<DeviceId, DeviceSeries>,
    b: &BTreeMap<DeviceId, DeviceSeries>,
) -> bool {
    a.len() == b.len()
        && a.iter().zip(b).all(|((ia, sa), (ib, sb))| {
            ia == ib
                && sa.device == sb.device
                && sa.readings.len() == sb.readings.len()
                && sa
                    .readings
                    .iter()
                    .zip(&sb.readings)
                    .all(|(x, y)| same_reading(x, y))
        })
}

/// Owns the current snapshot and the fetcher for every catalog device.
pub struct RefreshCoordinator<F> {
    catalog: Arc<DeviceCatalog>,
    fetcher: Arc<F>,
    current: Arc<Snapshot>,
}

impl<F: ReadingFetcher> RefreshCoordinator<F> {
    pub fn new(catalog: Arc<DeviceCatalog>, fetcher: Arc<F>) -> Self {
        let current = Arc::new(Snapshot::initial(&catalog));
        Self {
            catalog,
            fetcher,
            current,
        }
    }

    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.current.clone()
    }

    /// Issues every device fetch concurrently and waits for all of them.
    /// Outcomes come back in catalog order.
    #[instrument(skip(self), fields(operation = "cycle", devices = self.catalog.len()))]
    pub async fn fetch_all(&self) -> Vec<FetchOutcome> {
        let fetcher = self.fetcher.as_ref();
        let fetches = self.catalog.iter().map(move |device| async move {
            let outcome = fetcher.fetch(device).await;
            if let Err(e) = &outcome {
                tracing::warn!(
                    device = %device.name,
                    operation = "fetch",
                    error = %e.message,
                    "device fetch failed; keeping previous series"
                );
            }
            (device.id, outcome)
        });
        join_all(fetches).await
    }

    /// Merges `outcomes` and returns the snapshot to publish. When nothing changed,
    /// the current `Arc` is returned as-is so identity diffing sees no update.
    pub fn apply(&mut self, outcomes: Vec<FetchOutcome>) -> Arc<Snapshot> {
        let failed = outcomes.iter().filter(|(_, o)| o.is_err()).count();
        let total = outcomes.len();
        let merged = merge(&self.current, outcomes);
        let unchanged = merged.status == self.current.status
            && merged.has_data == self.current.has_data
            && same_series(&merged.series, &self.current.series);

        if unchanged {
            tracing::debug!(cycle = self.current.cycle, "cycle produced no changes");
        } else {
            tracing::info!(
                cycle = merged.cycle,
                succeeded = total - failed,
                failed,
                "refresh cycle merged"
            );
            self.current = Arc::new(merged);
        }
        self.current.clone()
    }

    /// One full cycle: fetch all, then merge.
    #[instrument(skip(self), fields(operation = "cycle", cycle = self.current.cycle + 1))]
    pub async fn run_cycle(&mut self) -> Arc<Snapshot> {
        let outcomes = self.fetch_all().await;
        self.apply(outcomes)
    }
}

/// Refresh loop timing.
pub struct CoordinatorConfig {
    /// Seconds between cycle starts; the first cycle starts immediately.
    pub interval_secs: u64,
}

/// Handle to the running refresh loop.
pub struct RefreshHandle {
    alive: Arc<AtomicBool>,
    /// Taken on cancel; the loop only publishes while it is present.
    publisher: Arc<Mutex<Option<watch::Sender<Arc<Snapshot>>>>>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    snapshots: watch::Receiver<Arc<Snapshot>>,
    task: tokio::task::JoinHandle<()>,
}

impl RefreshHandle {
    /// Receiver for published snapshots; starts at the latest one.
    pub fn subscribe(&self) -> watch::Receiver<Arc<Snapshot>> {
        self.snapshots.clone()
    }

    pub fn latest(&self) -> Arc<Snapshot> {
        self.snapshots.borrow().clone()
    }

    /// Stops further ticks and closes the snapshot channel. Results of a cycle
    /// still in flight are discarded; `latest` keeps the last published snapshot.
    pub fn cancel(&mut self) {
        self.alive.store(false, Ordering::Release);
        self.publisher.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }

    pub fn is_cancelled(&self) -> bool {
        !self.alive.load(Ordering::Acquire)
    }

    /// Cancels and waits for the loop task to exit.
    pub async fn shutdown(mut self) {
        self.cancel();
        if let Err(e) = (&mut self.task).await {
            tracing::warn!(error = %e, "refresh loop task failed");
        }
    }
}

/// Spawns the refresh loop and returns its handle. The initial `Loading`
/// snapshot is visible to subscribers before the first cycle completes.
pub fn spawn<F: ReadingFetcher>(
    mut coordinator: RefreshCoordinator<F>,
    config: CoordinatorConfig,
) -> RefreshHandle {
    let (tx, rx) = watch::channel(coordinator.snapshot());
    let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();
    let alive = Arc::new(AtomicBool::new(true));
    let loop_alive = alive.clone();
    let publisher = Arc::new(Mutex::new(Some(tx)));
    let loop_publisher = publisher.clone();
    let period = Duration::from_secs(config.interval_secs);

    let span = tracing::span!(
        tracing::Level::DEBUG,
        "refresh",
        interval_secs = config.interval_secs
    );

    let task = tokio::spawn(
        async move {
            let mut tick = interval(period);
            tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            tracing::debug!("refresh loop started");

            loop {
                tokio::select! {
                    _ = tick.tick() => {
                        if !loop_alive.load(Ordering::Acquire) {
                            break;
                        }
                        let outcomes = coordinator.fetch_all().await;
                        if !loop_alive.load(Ordering::Acquire) {
                            tracing::debug!("refresh cancelled mid-cycle; discarding results");
                            break;
                        }
                        let previous = coordinator.snapshot();
                        let next = coordinator.apply(outcomes);
                        if Arc::ptr_eq(&previous, &next) {
                            continue;
                        }
                        let published = match loop_publisher
                            .lock()
                            .unwrap_or_else(|e| e.into_inner())
                            .as_ref()
                        {
                            Some(tx) => {
                                tx.send_replace(next);
                                true
                            }
                            None => false,
                        };
                        if !published {
                            tracing::debug!("refresh cancelled before publish; discarding results");
                            break;
                        }
                    }
                    _ = &mut shutdown_rx => break,
                }
            }
            tracing::debug!("refresh loop stopped");
        }
        .instrument(span),
    );

    RefreshHandle {
        alive,
        publisher,
        shutdown_tx: Some(shutdown_tx),
        snapshots: rx,
        task,
    }
}
