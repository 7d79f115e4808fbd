//! Durable deadline supervision.
//!
//! Matching timeouts and scheduled dispatches live in the store as
//! deadlines, not in-process timers. The supervisor polls for due ones and
//! hands each to the dispatcher; a deadline is removed only after its
//! handler ran, so a crash in between fires it again on the next start.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::domain::RideId;
use crate::store::{Deadline, DeadlineKind};

use super::error::DispatchError;
use super::orchestrator::Dispatcher;

/// What startup recovery found.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecoveryReport {
    /// Rides found searching.
    pub searching: usize,
    /// Deadlines re-armed because none was pending.
    pub armed: usize,
}

pub struct DeadlineSupervisor {
    dispatcher: Arc<Dispatcher>,
}

impl DeadlineSupervisor {
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self { dispatcher }
    }

    /// Arm a deadline for every searching ride that has none.
    pub async fn recover(&self) -> Result<RecoveryReport, DispatchError> {
        let store = self.dispatcher.store();
        let now = self.dispatcher.now();
        let timeout = self.dispatcher.config().match_timeout();

        let pending: HashSet<RideId> = store.deadlines().await?.iter().map(|d| d.ride).collect();
        let searching = store.searching_rides().await?;

        let mut report = RecoveryReport {
            searching: searching.len(),
            armed: 0,
        };
        for ride in searching.iter().filter(|r| !pending.contains(&r.id)) {
            let deadline = if ride.searching_since > now {
                Deadline {
                    ride: ride.id,
                    kind: DeadlineKind::Dispatch,
                    due_at: ride.searching_since,
                }
            } else {
                Deadline {
                    ride: ride.id,
                    kind: DeadlineKind::Expire,
                    due_at: ride.searching_since + timeout,
                }
            };
            store.put_deadline(deadline).await?;
            tracing::warn!(ride = %ride.id, kind = ?deadline.kind, due_at = %deadline.due_at, "Re-armed missing deadline");
            report.armed += 1;
        }
        tracing::info!(
            searching = report.searching,
            armed = report.armed,
            "Deadline recovery complete"
        );
        Ok(report)
    }

    /// Fire every deadline that is due. Returns how many were handled.
    pub async fn tick(&self) -> Result<usize, DispatchError> {
        let store = self.dispatcher.store();
        let now = self.dispatcher.now();
        let due: Vec<Deadline> = store
            .deadlines()
            .await?
            .into_iter()
            .take_while(|d| d.due_at <= now)
            .collect();

        let mut handled = 0;
        for deadline in due {
            let outcome = match deadline.kind {
                DeadlineKind::Dispatch => self
                    .dispatcher
                    .dispatch_scheduled(deadline.ride)
                    .await
                    .map(|_| ()),
                DeadlineKind::Expire => self.dispatcher.expire(deadline.ride).await.map(|_| ()),
            };
            match outcome {
                Ok(()) | Err(DispatchError::NotFound(_)) => {
                    store.remove_deadline(deadline).await?;
                    handled += 1;
                }
                Err(e) => {
                    tracing::warn!(ride = %deadline.ride, kind = ?deadline.kind, error = %e, "Deadline handler failed, will retry");
                }
            }
        }
        Ok(handled)
    }

    /// Poll for due deadlines until the runtime shuts down.
    pub fn spawn(self) -> JoinHandle<()> {
        let poll = self.dispatcher.config().supervisor_poll();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(poll);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                if let Err(e) = self.tick().await {
                    tracing::warn!(error = %e, "Deadline sweep failed");
                }
            }
        })
    }
}
