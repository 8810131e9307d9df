use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

use super::domain::{RequestId, UnitId};
use super::engine::{MatchError, MatchingEngine};
use super::store::{NotificationDispatcher, PersistentStore};

/// What one sweep cycle did.
#[derive(Debug, Clone, Default)]
pub struct SweepCycleOutcome {
    pub expired_units: Vec<UnitId>,
    pub rematched: Vec<RequestId>,
    pub unfulfillable: Vec<RequestId>,
}

impl SweepCycleOutcome {
    pub fn is_quiet(&self) -> bool {
        self.expired_units.is_empty()
    }
}

/// Recurring background scan that reclaims expired stock and re-evaluates
/// the requests whose reservations it invalidated. Runs as its own task on
/// an injected interval; a watch signal stops it between cycles, never
/// mid-transition.
pub struct ExpirationSweeper<S, N> {
    engine: Arc<MatchingEngine<S, N>>,
    interval: Duration,
    shutdown: watch::Receiver<bool>,
}

impl<S, N> ExpirationSweeper<S, N>
where
    S: PersistentStore + 'static,
    N: NotificationDispatcher + 'static,
{
    pub fn new(
        engine: Arc<MatchingEngine<S, N>>,
        interval: Duration,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            engine,
            interval,
            shutdown,
        }
    }

    /// One sweep: expire overdue units, then re-match the requests that lost
    /// a reservation. Idempotent when no time has elapsed since the last
    /// cycle.
    pub fn run_cycle(&self) -> Result<SweepCycleOutcome, MatchError> {
        let now = self.engine.now();
        let expired = self.engine.sweep_expired(now)?;
        if expired.is_empty() {
            return Ok(SweepCycleOutcome::default());
        }

        let rematch = self.engine.rematch_after_expiry(&expired)?;
        Ok(SweepCycleOutcome {
            expired_units: expired.into_iter().map(|entry| entry.unit_id).collect(),
            rematched: rematch.rematched,
            unfulfillable: rematch.unfulfillable,
        })
    }

    /// Periodic loop. Cycle failures (for instance a transient store outage)
    /// are logged and retried on the next tick rather than propagated; no
    /// request-handling path ever blocks on this task.
    pub async fn run(mut self) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => match self.run_cycle() {
                    Ok(outcome) if outcome.is_quiet() => {
                        tracing::debug!("sweep cycle: nothing to expire");
                    }
                    Ok(outcome) => {
                        tracing::info!(
                            expired = outcome.expired_units.len(),
                            rematched = outcome.rematched.len(),
                            unfulfillable = outcome.unfulfillable.len(),
                            "sweep cycle complete"
                        );
                    }
                    Err(err) => {
                        tracing::error!(error = %err, "sweep cycle failed; retrying next tick");
                    }
                },
                changed = self.shutdown.changed() => {
                    if changed.is_err() || *self.shutdown.borrow() {
                        tracing::info!("expiration sweeper stopping");
                        break;
                    }
                }
            }
        }
    }
}
