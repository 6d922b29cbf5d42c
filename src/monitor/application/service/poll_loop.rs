//! The single polling loop that drives the alert engine.

use crate::{
    cluster::application::service::query_service::ClusterSource,
    monitor::application::service::{
        alert_engine::{AlertEngine, CycleReport},
        dispatcher::Dispatcher,
    },
};
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

pub struct PollLoop<S: ClusterSource> {
    source: S,
    engine: AlertEngine,
    dispatcher: Dispatcher,
    interval: Duration,
}

impl<S: ClusterSource> PollLoop<S> {
    pub fn new(source: S, engine: AlertEngine, dispatcher: Dispatcher, interval: Duration) -> Self {
        Self {
            source,
            engine,
            dispatcher,
            interval,
        }
    }

    pub fn engine(&self) -> &AlertEngine {
        &self.engine
    }

    /// Runs one cycle and delivers its alerts.
    pub async fn run_once(&mut self) -> CycleReport {
        let report = self.engine.run_cycle(&self.source).await;
        self.dispatcher.dispatch_all(&report.alerts).await;
        tracing::info!(
            online = report.online,
            nodes = report.nodes_seen,
            alerts = report.alerts.len(),
            "poll cycle finished"
        );
        report
    }

    /// Polls until `shutdown` is cancelled, then hands the engine back for teardown.
    ///
    /// Cycles never overlap: a cycle that overruns the interval delays the next
    /// tick. A cycle in flight at shutdown is abandoned; a panicking cycle is
    /// logged and the loop carries on.
    pub async fn run(mut self, shutdown: CancellationToken) -> AlertEngine {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tracing::info!(interval = ?self.interval, "poll loop started");

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let cycle = AssertUnwindSafe(self.run_once()).catch_unwind();
            tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::info!("shutdown requested; abandoning current cycle");
                    break;
                }
                outcome = cycle => {
                    if outcome.is_err() {
                        tracing::error!("poll cycle panicked; continuing with next tick");
                    }
                }
            }
        }

        tracing::info!("poll loop stopped");
        self.engine
    }
}
