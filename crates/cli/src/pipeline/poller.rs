//! Poller - per-device orchestration of the ingestion pipeline.
//!
//! Data flows clock -> cursor -> fetch -> normalize -> filter -> dispatch.
//! Devices are processed sequentially within a tick; a failure on one
//! device never blocks the others, and a failed window is retried on the
//! next tick because its watermark does not advance.

use std::time::Instant;

use anyhow::Result;
use chrono::{DateTime, FixedOffset};
use contracts::{CanonicalEvent, CollectorBlueprint, FetchConfig, TimeWindow};
use device_gateway::{DeviceClock, DeviceGateway};
use dispatcher::{create_dispatcher, SinkDispatcher};
use ingestion::{EventFilter, EventNormalizer, PageFetcher};
use observability::{record_device_failure, record_window_processed};
use tokio::sync::watch;
use tokio::time::{sleep, Duration};
use tracing::{debug, error, info};
use windowing::{next_window, partition_by_day, widened, CursorConfig, WatermarkStore};

use super::stats::RunStats;

/// Settle time between stream catch-up passes
const STREAM_IDLE_SLEEP: Duration = Duration::from_secs(1);

/// One device's processing unit: the gateway plus the pipeline stages
/// resolved for that device. The watermark entry lives in the poller's
/// store and is only ever touched while this unit is being processed.
struct DeviceUnit {
    device_id: String,
    gateway: DeviceGateway,
    fetcher: PageFetcher,
    normalizer: EventNormalizer,
    filter: EventFilter,
}

/// Orchestrates the pipeline over all configured devices in bounded
/// (`pull`) or unbounded (`poll` / `stream`) mode.
pub struct Poller {
    fetch: FetchConfig,
    units: Vec<DeviceUnit>,
    clock: DeviceClock,
    dispatcher: SinkDispatcher,
    watermarks: WatermarkStore,
    stats: RunStats,
}

impl Poller {
    /// Build the device units and sinks from a validated blueprint
    pub fn new(blueprint: &CollectorBlueprint) -> Result<Self> {
        let mut units = Vec::with_capacity(blueprint.devices.len());
        for device in &blueprint.devices {
            let gateway = DeviceGateway::connect(&blueprint.fetch, device)?;
            units.push(DeviceUnit {
                device_id: device.device_id(),
                fetcher: PageFetcher::new(&blueprint.fetch, gateway.clone()),
                gateway,
                normalizer: EventNormalizer::new(blueprint, device),
                filter: EventFilter::new(blueprint, device),
            });
        }

        let dispatcher = create_dispatcher(&blueprint.sinks)?;
        let stats = RunStats::new(units.len(), dispatcher.len());

        Ok(Self {
            fetch: blueprint.fetch.clone(),
            units,
            clock: DeviceClock::new(&blueprint.fetch),
            dispatcher,
            watermarks: WatermarkStore::new(),
            stats,
        })
    }

    /// Unbounded poll loop: one window per device per tick.
    ///
    /// Shutdown is observed between windows, never mid-page.
    pub async fn run_poll(
        mut self,
        mut shutdown: watch::Receiver<bool>,
        max_ticks: Option<u64>,
    ) -> Result<RunStats> {
        let cursor = CursorConfig::poll(&self.fetch);
        let tick = Duration::from_secs(self.fetch.tick_secs.max(1));
        let started = Instant::now();
        let mut ticks = 0u64;

        loop {
            self.poll_tick(&cursor, &shutdown).await;
            ticks += 1;

            if *shutdown.borrow() {
                break;
            }
            if max_ticks.is_some_and(|max| ticks >= max) {
                info!(ticks, "reached tick limit");
                break;
            }

            tokio::select! {
                _ = sleep(tick) => {}
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        self.finish(started).await
    }

    /// Low-latency stream loop: each pass catches every device up to
    /// `device_now - lag` in slice-sized sub-windows.
    pub async fn run_stream(
        mut self,
        mut shutdown: watch::Receiver<bool>,
        max_ticks: Option<u64>,
    ) -> Result<RunStats> {
        let cursor = CursorConfig::stream(&self.fetch);
        let lag = chrono::Duration::seconds(self.fetch.stream_lag_secs.max(0));
        let started = Instant::now();
        let mut ticks = 0u64;

        loop {
            self.stream_tick(&cursor, lag, &shutdown).await;
            ticks += 1;

            if *shutdown.borrow() {
                break;
            }
            if max_ticks.is_some_and(|max| ticks >= max) {
                info!(ticks, "reached tick limit");
                break;
            }

            tokio::select! {
                _ = sleep(STREAM_IDLE_SLEEP) => {}
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        self.finish(started).await
    }

    /// Bounded historical pull over `[start, end)`, partitioned into day
    /// slices. Terminates naturally once the range is exhausted.
    pub async fn run_pull(
        mut self,
        start: DateTime<FixedOffset>,
        end: DateTime<FixedOffset>,
    ) -> Result<RunStats> {
        let started = Instant::now();
        let slices = partition_by_day(start, end);
        info!(slices = slices.len(), "range partitioned into day slices");

        for slice in &slices {
            if slice.is_empty() {
                continue;
            }
            for i in 0..self.units.len() {
                let unit = &self.units[i];
                if let Err(e) =
                    Self::pull_slice(unit, &mut self.dispatcher, &mut self.stats, slice).await
                {
                    record_device_failure(&unit.device_id);
                    self.stats.window_metrics.record_failure(&unit.device_id);
                    error!(
                        device = %unit.device_id,
                        window = %slice,
                        error = %e,
                        "slice failed, continuing with next device"
                    );
                }
            }
        }

        self.finish(started).await
    }

    /// One poll tick: read each device's clock, process at most one
    /// window per device, isolate failures.
    async fn poll_tick(&mut self, cursor: &CursorConfig, shutdown: &watch::Receiver<bool>) {
        for i in 0..self.units.len() {
            if *shutdown.borrow() {
                break;
            }
            let unit = &self.units[i];
            let device_now = self.clock.now(&unit.gateway).await;

            let Some(window) = next_window(self.watermarks.get(&unit.device_id), device_now, cursor)
            else {
                debug!(device = %unit.device_id, "caught up, nothing to fetch");
                continue;
            };

            if let Err(e) = Self::run_window(
                unit,
                &mut self.dispatcher,
                &mut self.watermarks,
                &mut self.stats,
                cursor,
                window,
                device_now,
            )
            .await
            {
                record_device_failure(&unit.device_id);
                self.stats.window_metrics.record_failure(&unit.device_id);
                error!(
                    device = %unit.device_id,
                    error = %e,
                    "device tick failed, window will be retried"
                );
            }
        }
    }

    /// One stream pass: catch each device up to `device_now - lag`
    async fn stream_tick(
        &mut self,
        cursor: &CursorConfig,
        lag: chrono::Duration,
        shutdown: &watch::Receiver<bool>,
    ) {
        for i in 0..self.units.len() {
            if *shutdown.borrow() {
                break;
            }
            let unit = &self.units[i];
            let device_now = self.clock.now(&unit.gateway).await;
            let target = device_now - lag;

            loop {
                if *shutdown.borrow() {
                    break;
                }
                let Some(window) =
                    next_window(self.watermarks.get(&unit.device_id), target, cursor)
                else {
                    break;
                };

                let outcome = Self::run_window(
                    unit,
                    &mut self.dispatcher,
                    &mut self.watermarks,
                    &mut self.stats,
                    cursor,
                    window,
                    target,
                )
                .await;

                if let Err(e) = outcome {
                    record_device_failure(&unit.device_id);
                    self.stats.window_metrics.record_failure(&unit.device_id);
                    error!(
                        device = %unit.device_id,
                        error = %e,
                        "stream window failed, retrying next pass"
                    );
                    break;
                }
            }
        }
    }

    /// Fetch, normalize, filter, and dispatch one window; advance the
    /// watermark only when everything succeeded.
    ///
    /// A window yielding zero raw records is retried once widened (up to
    /// the configured ceiling, never past `clock_bound`) before the empty
    /// result is accepted and the watermark advances anyway.
    async fn run_window(
        unit: &DeviceUnit,
        dispatcher: &mut SinkDispatcher,
        watermarks: &mut WatermarkStore,
        stats: &mut RunStats,
        cursor: &CursorConfig,
        window: TimeWindow,
        clock_bound: DateTime<FixedOffset>,
    ) -> Result<()> {
        let mut effective = window;
        let mut raw = unit.fetcher.fetch_window(&effective).await?;

        if raw.is_empty() {
            if let Some(wider) = widened(&window, clock_bound, cursor) {
                debug!(
                    device = %unit.device_id,
                    window = %wider,
                    "empty window, retrying widened"
                );
                raw = unit.fetcher.fetch_window(&wider).await?;
                effective = wider;
            }
        }

        let fetched = raw.len() as u64;
        let batch: Vec<CanonicalEvent> = raw
            .iter()
            .map(|record| unit.normalizer.normalize(record))
            .filter(|event| unit.filter.accept(event))
            .collect();
        let accepted = batch.len() as u64;

        dispatcher.dispatch(&batch).await?;
        watermarks.advance(&unit.device_id, effective.end);

        let span = effective.duration().num_milliseconds() as f64 / 1000.0;
        record_window_processed(&unit.device_id, fetched, accepted, span);
        stats
            .window_metrics
            .record_window(&unit.device_id, fetched, accepted, span);

        info!(
            device = %unit.device_id,
            window = %effective,
            fetched,
            accepted,
            "window processed"
        );
        Ok(())
    }

    /// Fetch and dispatch one historical slice. No widening and no
    /// watermark: the range is explicit and processed exactly once.
    async fn pull_slice(
        unit: &DeviceUnit,
        dispatcher: &mut SinkDispatcher,
        stats: &mut RunStats,
        window: &TimeWindow,
    ) -> Result<()> {
        let raw = unit.fetcher.fetch_window(window).await?;
        let fetched = raw.len() as u64;
        let batch: Vec<CanonicalEvent> = raw
            .iter()
            .map(|record| unit.normalizer.normalize(record))
            .filter(|event| unit.filter.accept(event))
            .collect();
        let accepted = batch.len() as u64;

        dispatcher.dispatch(&batch).await?;

        let span = window.duration().num_milliseconds() as f64 / 1000.0;
        record_window_processed(&unit.device_id, fetched, accepted, span);
        stats
            .window_metrics
            .record_window(&unit.device_id, fetched, accepted, span);

        info!(
            device = %unit.device_id,
            window = %window,
            fetched,
            accepted,
            "slice processed"
        );
        Ok(())
    }

    /// Flush sinks and seal the run statistics
    async fn finish(mut self, started: Instant) -> Result<RunStats> {
        self.stats.duplicates_skipped = self.dispatcher.duplicates_skipped();
        self.dispatcher.shutdown().await;
        self.stats.duration = started.elapsed();
        Ok(self.stats)
    }
}
