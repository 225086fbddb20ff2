use anyhow::{bail, Context, Result};
use chrono::Utc;
use log::info;
use tokio::task::JoinHandle;
use tokio::time::{self, Duration, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::job::{AggregationOutcome, VisitLogAggregator};

const ENABLE_LOGS: bool = true;

use crate::{log_error, log_info};

/// Runs the aggregator on a fixed interval until stopped. Only one loop per
/// controller; overlapping runs are further excluded by the lock marker.
pub struct AggregationController {
    handle: Option<JoinHandle<()>>,
    cancel_token: Option<CancellationToken>,
}

impl AggregationController {
    pub fn new() -> Self {
        Self {
            handle: None,
            cancel_token: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }

    pub fn start(&mut self, aggregator: VisitLogAggregator, interval: Duration) -> Result<()> {
        if self.handle.is_some() {
            bail!("aggregation loop already active");
        }
        if interval.is_zero() {
            bail!("aggregation interval must be greater than zero");
        }

        let cancel_token = CancellationToken::new();
        let handle = tokio::spawn(aggregation_loop(aggregator, interval, cancel_token.clone()));

        self.handle = Some(handle);
        self.cancel_token = Some(cancel_token);
        Ok(())
    }

    pub async fn stop(&mut self) -> Result<()> {
        if let Some(token) = self.cancel_token.take() {
            token.cancel();
        }

        if let Some(handle) = self.handle.take() {
            handle
                .await
                .context("aggregation loop task failed to join")
        } else {
            Ok(())
        }
    }
}

impl Default for AggregationController {
    fn default() -> Self {
        Self::new()
    }
}

async fn aggregation_loop(
    aggregator: VisitLogAggregator,
    interval: Duration,
    cancel_token: CancellationToken,
) {
    let mut ticker = time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match aggregator.run(Utc::now().date_naive()).await {
                    Ok(AggregationOutcome::Completed(_)) => {}
                    Ok(AggregationOutcome::Skipped) => {
                        log_info!("aggregation tick skipped; lock held");
                    }
                    Err(err) => log_error!(
                        "aggregation of {} failed: {err:#}",
                        aggregator.log_path().display()
                    ),
                }
            }
            _ = cancel_token.cancelled() => {
                info!("aggregation loop shutting down");
                break;
            }
        }
    }
}
