//! Fixed-rate driver for an [`EstimatorNode`].
//!
//! One task owns the node.  Inbound samples and cycle ticks are interleaved
//! with `tokio::select!`, so the frame tree is never shared across tasks.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use aerostate_middleware::EstimatePublisher;
use aerostate_types::{EstimatorError, Measurement};
use chrono::Utc;
use tokio::sync::mpsc;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info};

use crate::estimator::CycleOutcome;
use crate::lifecycle::EstimatorNode;

/// Drive `node` at its configured frequency until `shutdown` is raised or
/// `samples` is closed.
///
/// Samples are handled as soon as they arrive; a rejected sample is logged by
/// the node and never stops the loop.  When the input channel closes one
/// last cycle runs so that the final samples are reflected in the output.
///
/// # Errors
///
/// [`EstimatorError::Config`] when the configured frequency is unusable.
pub async fn spin_loop<P: EstimatePublisher>(
    node: &mut EstimatorNode<P>,
    mut samples: mpsc::Receiver<Measurement>,
    shutdown: Arc<AtomicBool>,
) -> Result<(), EstimatorError> {
    let period = node.config().cycle_period()?;
    let mut ticker = time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    info!(period_ms = period.as_millis() as u64, "spin loop started");

    let mut cycles: u64 = 0;
    loop {
        tokio::select! {
            biased;

            sample = samples.recv() => match sample {
                Some(measurement) => {
                    // Rejections are already logged by the node.
                    let _ = node.handle_measurement(&measurement);
                }
                None => {
                    debug!("input channel closed");
                    if let CycleOutcome::Completed(_) = node.run(Utc::now()) {
                        cycles += 1;
                    }
                    break;
                }
            },
            _ = ticker.tick() => {
                if shutdown.load(Ordering::SeqCst) {
                    break;
                }
                if let CycleOutcome::Completed(_) = node.run(Utc::now()) {
                    cycles += 1;
                }
            }
        }
    }

    info!(cycles, "spin loop stopped");
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
