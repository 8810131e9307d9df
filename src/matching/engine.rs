use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::compatibility::CompatibilityResolver;
use super::domain::{
    BloodInventoryUnit, BloodRequest, DonorId, GeoPoint, LocationId, MatchId, MatchSource,
    MatchStatus, RequestId, RequestMatch, RequestStatus, UnitId,
};
use super::eligibility::EligibilityEvaluator;
use super::geo;
use super::ledger::{ExpiredUnit, InventoryLedger, LedgerError};
use super::store::{
    Clock, NotificationDispatcher, NotificationError, NotificationEvent, PersistentStore,
    StoreError,
};

/// Quantity a single proposed donor donation contributes toward a request.
const DONOR_DONATION_QUANTITY: u32 = 1;

static MATCH_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_match_id() -> MatchId {
    let id = MATCH_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    MatchId(format!("match-{id:06}"))
}

/// Error raised by the matching engine.
#[derive(Debug, thiserror::Error)]
pub enum MatchError {
    #[error("unknown blood request '{0}'")]
    RequestNotFound(String),
    #[error("unknown match '{0}'")]
    MatchNotFound(String),
    #[error("unknown location '{0}'")]
    LocationNotFound(String),
    #[error("request '{id}' is {status}, not open for matching")]
    RequestClosed { id: String, status: &'static str },
    #[error("match '{id}' is {status}, cannot transition")]
    MatchClosed { id: String, status: &'static str },
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Notification(#[from] NotificationError),
}

/// Outcome of one matching pass over a request.
#[derive(Debug, Clone, Serialize)]
pub struct MatchReport {
    pub request_id: RequestId,
    pub status: RequestStatus,
    pub quantity_needed: u32,
    /// Total quantity covered by Proposed and Confirmed matches after the
    /// pass, capped at `quantity_needed`.
    pub quantity_covered: u32,
    /// Matches newly proposed by this pass.
    pub proposed: Vec<RequestMatch>,
}

/// Requests touched by a post-expiry re-matching pass.
#[derive(Debug, Clone, Default)]
pub struct RematchOutcome {
    /// Requests that regained at least partial coverage.
    pub rematched: Vec<RequestId>,
    /// Requests left with no coverage at all.
    pub unfulfillable: Vec<RequestId>,
}

/// Orchestrator resolving which units or donors satisfy a request. Reads
/// unit state through the ledger only; all status mutation goes through the
/// ledger's compare-and-set operations.
pub struct MatchingEngine<S, N> {
    store: Arc<S>,
    ledger: InventoryLedger<S>,
    resolver: CompatibilityResolver,
    eligibility: EligibilityEvaluator,
    notifications: Arc<N>,
    clock: Arc<dyn Clock>,
}

impl<S, N> MatchingEngine<S, N>
where
    S: PersistentStore + 'static,
    N: NotificationDispatcher + 'static,
{
    pub fn new(
        store: Arc<S>,
        resolver: CompatibilityResolver,
        eligibility: EligibilityEvaluator,
        notifications: Arc<N>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let ledger = InventoryLedger::new(Arc::clone(&store));
        Self {
            store,
            ledger,
            resolver,
            eligibility,
            notifications,
            clock,
        }
    }

    pub fn ledger(&self) -> &InventoryLedger<S> {
        &self.ledger
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Resolve a pending request against stored inventory first, then the
    /// donor pool. Inventory is scanned in compatibility-closeness order,
    /// FEFO within each group, and reserved greedily; a reservation lost to
    /// a concurrent caller moves on to the next candidate instead of failing
    /// the request.
    pub fn match_request(&self, request_id: &RequestId) -> Result<MatchReport, MatchError> {
        let now = self.clock.now();
        let mut request = self.fetch_request(request_id)?;
        if !request.status.is_open() {
            return Err(MatchError::RequestClosed {
                id: request.id.0.clone(),
                status: request.status.label(),
            });
        }

        let mut covered = self.active_coverage(&request.id)?;
        let mut proposed = Vec::new();

        for group in self
            .resolver
            .compatible_donors(request.blood_group, &request.component_type)
        {
            while covered < request.quantity_needed {
                let remaining = request.quantity_needed - covered;
                let candidates =
                    self.ledger
                        .find_available(group, &request.component_type, 1)?;
                let Some(unit) = pick_candidate(&candidates, remaining) else {
                    break;
                };
                let take = remaining.min(unit.quantity);
                match self.ledger.reserve(&unit.id, &request.id, take) {
                    Ok(_) => {
                        let record = self.record_match(
                            &request.id,
                            MatchSource::InventoryUnit(unit.id.clone()),
                            take,
                            None,
                            now,
                        )?;
                        covered += take;
                        proposed.push(record);
                    }
                    Err(LedgerError::Conflict(reason)) => {
                        tracing::debug!(
                            unit = %unit.id.0,
                            request = %request.id.0,
                            %reason,
                            "reservation race lost; trying next candidate"
                        );
                    }
                    Err(other) => return Err(other.into()),
                }
            }
            if covered >= request.quantity_needed {
                break;
            }
        }

        if covered < request.quantity_needed {
            let donor_matches = self.propose_donors(&request, request.quantity_needed - covered, now)?;
            covered += donor_matches
                .iter()
                .map(|record| record.quantity_allocated)
                .sum::<u32>();
            proposed.extend(donor_matches);
        }

        let status = self.resolve_request_status(&mut request, now)?;
        if covered == 0 {
            self.notifications
                .publish(NotificationEvent::RequestUnfulfillable {
                    request_id: request.id.clone(),
                })?;
        }

        tracing::info!(
            request = %request.id.0,
            status = status.label(),
            covered,
            needed = request.quantity_needed,
            proposed = proposed.len(),
            "matching pass complete"
        );

        Ok(MatchReport {
            request_id: request.id,
            status,
            quantity_needed: request.quantity_needed,
            quantity_covered: covered.min(request.quantity_needed),
            proposed,
        })
    }

    /// Explicit confirmation once a human or downstream system accepts a
    /// proposed match. Inventory matches consume their unit; donor matches
    /// are handed to the donation workflow untouched.
    pub fn confirm_match(&self, match_id: &MatchId) -> Result<RequestMatch, MatchError> {
        let mut record = self.fetch_match(match_id)?;
        if record.status != MatchStatus::Proposed {
            return Err(MatchError::MatchClosed {
                id: record.id.0.clone(),
                status: record.status.label(),
            });
        }

        if let MatchSource::InventoryUnit(unit_id) = &record.source {
            self.ledger.confirm(unit_id)?;
        }
        record.status = MatchStatus::Confirmed;
        self.store.update_match(record.clone())?;

        let mut request = self.fetch_request(&record.request_id)?;
        self.resolve_request_status(&mut request, self.clock.now())?;

        self.notifications
            .publish(NotificationEvent::MatchConfirmed {
                request_id: record.request_id.clone(),
                match_id: record.id.clone(),
            })?;
        Ok(record)
    }

    /// Reject a proposed match, releasing its unit back to Available.
    pub fn reject_match(&self, match_id: &MatchId) -> Result<RequestMatch, MatchError> {
        let mut record = self.fetch_match(match_id)?;
        if record.status != MatchStatus::Proposed {
            return Err(MatchError::MatchClosed {
                id: record.id.0.clone(),
                status: record.status.label(),
            });
        }

        if let MatchSource::InventoryUnit(unit_id) = &record.source {
            self.ledger.release(unit_id)?;
        }
        record.status = MatchStatus::Rejected;
        self.store.update_match(record.clone())?;

        let mut request = self.fetch_request(&record.request_id)?;
        self.resolve_request_status(&mut request, self.clock.now())?;
        Ok(record)
    }

    /// Expire units past shelf life and notify per unit. Delegates the
    /// transitions to the ledger; called by the sweeper each cycle. The
    /// expiry is committed by the time the notification goes out, so
    /// delivery is best-effort: a failed publish is logged and never aborts
    /// the cycle, or the re-match work that follows could be lost for good.
    pub fn sweep_expired(&self, now: DateTime<Utc>) -> Result<Vec<ExpiredUnit>, MatchError> {
        let expired = self.ledger.sweep_expired(now)?;
        for unit in &expired {
            if let Err(err) = self.notifications.publish(NotificationEvent::UnitExpired {
                unit_id: unit.unit_id.clone(),
            }) {
                tracing::warn!(
                    unit = %unit.unit_id.0,
                    error = %err,
                    "unit-expired notification dropped"
                );
            }
        }
        Ok(expired)
    }

    /// Invalidate matches that lost their unit to expiry and attempt a
    /// replacement allocation for each affected request. Each entry is
    /// handled independently: a failure on one request is logged and the
    /// remaining requests are still re-matched.
    pub fn rematch_after_expiry(
        &self,
        expired: &[ExpiredUnit],
    ) -> Result<RematchOutcome, MatchError> {
        let mut outcome = RematchOutcome::default();

        for entry in expired {
            let Some(request_id) = &entry.reserved_for else {
                continue;
            };
            if let Err(err) = self.rematch_one(request_id, &entry.unit_id, &mut outcome) {
                tracing::error!(
                    request = %request_id.0,
                    unit = %entry.unit_id.0,
                    error = %err,
                    "re-match after expiry failed; request left for a later pass"
                );
            }
        }
        Ok(outcome)
    }

    fn rematch_one(
        &self,
        request_id: &RequestId,
        unit_id: &UnitId,
        outcome: &mut RematchOutcome,
    ) -> Result<(), MatchError> {
        self.supersede_unit_matches(request_id, unit_id)?;

        let mut request = self.fetch_request(request_id)?;
        if request.status.is_terminal() {
            return Ok(());
        }
        self.resolve_request_status(&mut request, self.clock.now())?;

        let request = self.fetch_request(request_id)?;
        if !request.status.is_open() {
            if request.status == RequestStatus::Expired {
                outcome.unfulfillable.push(request_id.clone());
                self.notifications
                    .publish(NotificationEvent::RequestUnfulfillable {
                        request_id: request_id.clone(),
                    })?;
            }
            return Ok(());
        }

        let report = self.match_request(request_id)?;
        if report.quantity_covered > 0 {
            outcome.rematched.push(request_id.clone());
        } else {
            outcome.unfulfillable.push(request_id.clone());
        }
        tracing::info!(
            request = %request_id.0,
            covered = report.quantity_covered,
            needed = report.quantity_needed,
            "re-match after expiry"
        );
        Ok(())
    }

    fn propose_donors(
        &self,
        request: &BloodRequest,
        remaining: u32,
        now: DateTime<Utc>,
    ) -> Result<Vec<RequestMatch>, MatchError> {
        let compatible = self
            .resolver
            .compatible_donors(request.blood_group, &request.component_type);
        if compatible.is_empty() {
            return Ok(Vec::new());
        }

        let origin = self.fetch_location(&request.location)?;
        let mut pool: Vec<(DonorId, GeoPoint)> = Vec::new();
        for donor in self.store.donors()? {
            if !compatible.contains(&donor.blood_group) {
                continue;
            }
            if !self.eligibility.is_eligible(&donor, now, request.urgency) {
                continue;
            }
            match self.store.location(&donor.location)? {
                Some(location) => pool.push((donor.id, location.position)),
                None => {
                    tracing::warn!(donor = %donor.id.0, "donor has no resolvable location; skipped")
                }
            }
        }

        let mut records = Vec::new();
        let mut left = remaining;
        for ranked in geo::rank_donors(&pool, origin) {
            if left == 0 {
                break;
            }
            let take = DONOR_DONATION_QUANTITY.min(left);
            let record = self.record_match(
                &request.id,
                MatchSource::Donor(ranked.donor_id),
                take,
                Some(ranked.distance_km),
                now,
            )?;
            left -= take;
            records.push(record);
        }
        Ok(records)
    }

    fn record_match(
        &self,
        request_id: &RequestId,
        source: MatchSource,
        quantity: u32,
        distance_km: Option<f64>,
        now: DateTime<Utc>,
    ) -> Result<RequestMatch, MatchError> {
        let record = RequestMatch {
            id: next_match_id(),
            request_id: request_id.clone(),
            source,
            quantity_allocated: quantity,
            distance_km,
            matched_at: now,
            status: MatchStatus::Proposed,
        };
        self.store.insert_match(record.clone())?;
        self.notifications.publish(NotificationEvent::MatchProposed {
            request_id: request_id.clone(),
            match_id: record.id.clone(),
        })?;
        Ok(record)
    }

    /// Recompute the request status from its matches and persist it when it
    /// changed. Fulfilled requires the confirmed sum alone to cover the
    /// need; a past-deadline request with zero coverage expires.
    fn resolve_request_status(
        &self,
        request: &mut BloodRequest,
        now: DateTime<Utc>,
    ) -> Result<RequestStatus, MatchError> {
        if request.status.is_terminal() {
            return Ok(request.status);
        }

        let matches = self.store.matches_for_request(&request.id)?;
        let covered: u32 = matches
            .iter()
            .filter(|record| record.status.is_active())
            .map(|record| record.quantity_allocated)
            .sum();
        let confirmed: u32 = matches
            .iter()
            .filter(|record| record.status == MatchStatus::Confirmed)
            .map(|record| record.quantity_allocated)
            .sum();

        let next = if confirmed >= request.quantity_needed {
            RequestStatus::Fulfilled
        } else if covered >= request.quantity_needed {
            RequestStatus::Matched
        } else if covered > 0 {
            RequestStatus::PartiallyMatched
        } else if request.deadline.is_some_and(|deadline| now >= deadline) {
            RequestStatus::Expired
        } else {
            RequestStatus::Pending
        };

        if next != request.status {
            request.status = next;
            self.store.update_request(request.clone())?;
        }
        Ok(next)
    }

    fn supersede_unit_matches(
        &self,
        request_id: &RequestId,
        unit_id: &UnitId,
    ) -> Result<(), MatchError> {
        for mut record in self.store.matches_for_request(request_id)? {
            let tied = matches!(&record.source, MatchSource::InventoryUnit(id) if id == unit_id);
            if tied && record.status.is_active() {
                record.status = MatchStatus::Superseded;
                self.store.update_match(record.clone())?;
                tracing::info!(
                    request = %request_id.0,
                    unit = %unit_id.0,
                    r#match = %record.id.0,
                    "match superseded by unit expiry"
                );
            }
        }
        Ok(())
    }

    fn active_coverage(&self, request_id: &RequestId) -> Result<u32, MatchError> {
        Ok(self
            .store
            .matches_for_request(request_id)?
            .iter()
            .filter(|record| record.status.is_active())
            .map(|record| record.quantity_allocated)
            .sum())
    }

    fn fetch_request(&self, id: &RequestId) -> Result<BloodRequest, MatchError> {
        self.store
            .request(id)?
            .ok_or_else(|| MatchError::RequestNotFound(id.0.clone()))
    }

    fn fetch_match(&self, id: &MatchId) -> Result<RequestMatch, MatchError> {
        self.store
            .match_record(id)?
            .ok_or_else(|| MatchError::MatchNotFound(id.0.clone()))
    }

    fn fetch_location(&self, id: &LocationId) -> Result<GeoPoint, MatchError> {
        Ok(self
            .store
            .location(id)?
            .ok_or_else(|| MatchError::LocationNotFound(id.0.clone()))?
            .position)
    }
}

/// FEFO with a best-fit tie-break: among the units sharing the earliest
/// expiry, take the smallest quantity that still covers the remainder; if
/// none covers it, take the largest so fewer units are consumed.
fn pick_candidate(
    candidates: &[BloodInventoryUnit],
    remaining: u32,
) -> Option<BloodInventoryUnit> {
    let earliest = candidates.first()?.expires_at;
    let bucket: Vec<&BloodInventoryUnit> = candidates
        .iter()
        .take_while(|unit| unit.expires_at == earliest)
        .collect();

    let best_fit = bucket
        .iter()
        .filter(|unit| unit.quantity >= remaining)
        .min_by(|a, b| a.quantity.cmp(&b.quantity).then_with(|| a.id.cmp(&b.id)));
    let fallback = bucket
        .iter()
        .max_by(|a, b| {
            a.quantity
                .cmp(&b.quantity)
                .then_with(|| b.id.cmp(&a.id))
        });

    best_fit.or(fallback).map(|unit| (*unit).clone())
}
