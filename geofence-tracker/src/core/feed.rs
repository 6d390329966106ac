/*!
Report sources: the synthetic movement generator and the live-feed adapter
*/

use std::time::Duration;

use async_stream::stream;
use futures::stream::BoxStream;
use futures::StreamExt;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::mpsc;
use tokio_stream::wrappers::IntervalStream;
use tracing::info;

use crate::core::config::SyntheticConfig;
use crate::core::geometry::{project_destination, Coordinate};
use crate::core::position::PositionReport;

/// A source of position report batches.
///
/// Both the synthetic generator and a live telemetry feed implement this
/// contract; detection never depends on which one is driving the loop.
pub trait ReportSource: Send {
    /// Name of the source
    fn name(&self) -> &'static str;

    /// Consume the source, yielding one batch of reports per tick until the
    /// underlying feed ends
    fn start(self: Box<Self>) -> BoxStream<'static, Vec<PositionReport>>;
}

/// Adapter for a live telemetry feed delivered over an mpsc channel.
///
/// The stream ends when every producer handle has been dropped.
pub struct ChannelFeed {
    receiver: mpsc::Receiver<PositionReport>,
}

impl ChannelFeed {
    pub fn new(receiver: mpsc::Receiver<PositionReport>) -> Self {
        Self { receiver }
    }
}

impl ReportSource for ChannelFeed {
    fn name(&self) -> &'static str {
        "channel"
    }

    fn start(self: Box<Self>) -> BoxStream<'static, Vec<PositionReport>> {
        let mut receiver = self.receiver;
        stream! {
            while let Some(first) = receiver.recv().await {
                // Drain whatever else is already queued into the same batch.
                let mut batch = vec![first];
                while let Ok(report) = receiver.try_recv() {
                    batch.push(report);
                }
                yield batch;
            }
        }
        .boxed()
    }
}

/// Synthetic fleet movement generator for test and demo load.
///
/// Every tick each simulated vehicle perturbs its speed by up to half a speed
/// step and its heading by up to one angular step, then advances along the
/// new heading for the distance covered during the tick interval.
pub struct SyntheticFeed {
    config: SyntheticConfig,
    rng: StdRng,
}

impl SyntheticFeed {
    pub fn new(config: SyntheticConfig) -> Self {
        Self {
            config,
            rng: StdRng::from_entropy(),
        }
    }

    /// Seeded variant for reproducible runs
    pub fn with_seed(config: SyntheticConfig, seed: u64) -> Self {
        Self {
            config,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    fn seed_fleet(&mut self) -> Vec<PositionReport> {
        let center = Coordinate::new(self.config.start_latitude, self.config.start_longitude);
        (0..self.config.entity_count)
            .map(|i| {
                let bearing = self.rng.gen_range(0.0..360.0);
                let offset = self.rng.gen_range(0.0..self.config.scatter_m.max(1.0));
                let mut report = PositionReport::new(
                    format!("vehicle-{:03}", i + 1),
                    project_destination(center, bearing, offset),
                    self.config.initial_speed_kmh,
                    self.rng.gen_range(0.0..360.0),
                );
                report.satellites = Some(self.rng.gen_range(6..=12));
                report
            })
            .collect()
    }

    fn advance(&mut self, previous: &PositionReport, elapsed: Duration) -> PositionReport {
        let half_step = self.config.speed_step_kmh / 2.0;
        let speed =
            (previous.speed_kmh + self.rng.gen_range(-half_step..=half_step)).max(0.0);
        let mut heading = (previous.heading_deg
            + self
                .rng
                .gen_range(-self.config.heading_step_deg..=self.config.heading_step_deg))
        .rem_euclid(360.0);
        // rem_euclid can round up to the modulus itself for tiny negative inputs.
        if heading >= 360.0 {
            heading = 0.0;
        }
        let distance_m = speed / 3.6 * elapsed.as_secs_f64();

        let mut report = PositionReport::new(
            previous.entity_id.clone(),
            project_destination(previous.coordinate, heading, distance_m),
            speed,
            heading,
        );
        report.driver_id = previous.driver_id.clone();
        report.satellites = previous.satellites;
        report
    }
}

impl ReportSource for SyntheticFeed {
    fn name(&self) -> &'static str {
        "synthetic"
    }

    fn start(self: Box<Self>) -> BoxStream<'static, Vec<PositionReport>> {
        let mut feed = *self;
        let tick = Duration::from_millis(feed.config.interval_ms.max(1));
        info!(
            "starting synthetic feed: {} vehicles every {:?}",
            feed.config.entity_count, tick
        );

        let mut ticks = IntervalStream::new(tokio::time::interval(tick));
        stream! {
            let mut fleet: Option<Vec<PositionReport>> = None;
            while ticks.next().await.is_some() {
                let current = match fleet.take() {
                    None => feed.seed_fleet(),
                    Some(previous) => previous
                        .iter()
                        .map(|report| feed.advance(report, tick))
                        .collect(),
                };
                yield current.clone();
                fleet = Some(current);
            }
        }
        .boxed()
    }
}
