//! Periodic drivers for the two simulation cadences.

use std::{sync::Arc, time::Duration};

use tokio::{
    task::JoinHandle,
    time::{interval, Instant, MissedTickBehavior},
};
use tokio_stream::{wrappers::IntervalStream, StreamExt};
use tracing::{debug, error};

use crate::{engine::Engine, hub::Hub, traffic::TrafficSimulator};

fn ticks(period: Duration) -> IntervalStream {
    let mut timer = interval(period);
    timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
    IntervalStream::new(timer)
}

/// Runs the slow pipeline once per `period` for the life of the process.
pub fn spawn_tick_loop(hub: Arc<Hub>, mut engine: Engine, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut stream = ticks(period);
        // The first interval tick completes immediately.
        stream.next().await;
        while stream.next().await.is_some() {
            match hub.run_tick(&mut engine) {
                Ok(summary) => debug!(
                    tick = summary.tick,
                    population = summary.population,
                    employed = summary.employed,
                    "tick"
                ),
                Err(err) => error!(%err, "tick failed"),
            }
        }
    })
}

/// Steps traffic every `period`, feeding it the measured elapsed time.
pub fn spawn_traffic_loop(
    hub: Arc<Hub>,
    mut simulator: TrafficSimulator,
    period: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut stream = ticks(period);
        stream.next().await;
        let mut last = Instant::now();
        while stream.next().await.is_some() {
            let now = Instant::now();
            let dt = now.duration_since(last).as_secs_f64();
            last = now;
            hub.run_traffic(&mut simulator, dt);
        }
    })
}
