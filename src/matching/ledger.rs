use std::sync::Arc;

use chrono::{DateTime, Utc};

use super::domain::{
    BloodGroup, BloodInventoryUnit, ComponentTypeId, RequestId, UnitId, UnitStatus, ValidationError,
};
use super::store::{PersistentStore, StoreError};

/// Why a ledger transition was refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConflictReason {
    #[error("unit is {0}, not available")]
    NotAvailable(&'static str),
    #[error("unit already reserved by request '{0}'")]
    ReservedByOther(String),
    #[error("unit holds {available}, reservation wants {requested}")]
    InsufficientQuantity { available: u32, requested: u32 },
    #[error("unit is not reserved")]
    NotReserved,
    #[error("unit status changed concurrently")]
    StatusChanged,
}

/// Error raised by ledger operations.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("unknown inventory unit '{0}'")]
    UnitNotFound(String),
    #[error("reservation conflict: {0}")]
    Conflict(ConflictReason),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Store(StoreError),
}

/// A unit the sweep transitioned to Expired. `reserved_for` names the request
/// whose reservation was invalidated, so the caller can re-match it.
#[derive(Debug, Clone, PartialEq)]
pub struct ExpiredUnit {
    pub unit_id: UnitId,
    pub reserved_for: Option<RequestId>,
}

/// Owner of the unit state machine. Every transition is a conditional update
/// keyed on the status the ledger observed, so concurrent callers racing for
/// the same unit lose cleanly with a `Conflict` instead of double-reserving.
pub struct InventoryLedger<S> {
    store: Arc<S>,
}

impl<S> Clone for InventoryLedger<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S> InventoryLedger<S>
where
    S: PersistentStore,
{
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Available units of the given group/component holding at least
    /// `min_quantity`, soonest-to-expire first (FEFO), ties by unit id.
    pub fn find_available(
        &self,
        group: BloodGroup,
        component: &ComponentTypeId,
        min_quantity: u32,
    ) -> Result<Vec<BloodInventoryUnit>, LedgerError> {
        let mut units = self
            .store
            .units_by_group(UnitStatus::Available, group, component)
            .map_err(LedgerError::Store)?;
        units.retain(|unit| unit.quantity > 0 && unit.quantity >= min_quantity);
        units.sort_by(|a, b| {
            a.expires_at
                .cmp(&b.expires_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(units)
    }

    /// Claim `quantity` of an Available unit for a request. The commit is a
    /// compare-and-set on Available: if another caller got there first the
    /// result is a `Conflict` and the unit is untouched.
    pub fn reserve(
        &self,
        unit_id: &UnitId,
        request_id: &RequestId,
        quantity: u32,
    ) -> Result<BloodInventoryUnit, LedgerError> {
        if quantity == 0 {
            return Err(ValidationError::NonPositiveQuantity.into());
        }

        let current = self.fetch(unit_id)?;
        match current.status {
            UnitStatus::Available => {}
            UnitStatus::Reserved => {
                let owner = current
                    .reserved_for
                    .map(|id| id.0)
                    .unwrap_or_else(|| "unknown".to_string());
                return Err(LedgerError::Conflict(ConflictReason::ReservedByOther(owner)));
            }
            other => {
                return Err(LedgerError::Conflict(ConflictReason::NotAvailable(
                    other.label(),
                )))
            }
        }
        // Quantity is immutable while a unit stays Available, so this check
        // holds through the compare-and-set below.
        if current.quantity < quantity {
            return Err(LedgerError::Conflict(ConflictReason::InsufficientQuantity {
                available: current.quantity,
                requested: quantity,
            }));
        }

        let request = request_id.clone();
        let updated = self
            .store
            .update_unit_if(unit_id, UnitStatus::Available, &move |unit| {
                unit.status = UnitStatus::Reserved;
                unit.reserved_for = Some(request.clone());
                unit.reserved_quantity = Some(quantity);
            })
            .map_err(|err| Self::transition_error(unit_id, err))?;

        tracing::debug!(
            unit = %unit_id.0,
            request = %request_id.0,
            quantity,
            "unit reserved"
        );
        Ok(updated)
    }

    /// Reserved -> Used. The reservation fields clear; Used is terminal.
    pub fn confirm(&self, unit_id: &UnitId) -> Result<BloodInventoryUnit, LedgerError> {
        let current = self.fetch(unit_id)?;
        if current.status != UnitStatus::Reserved {
            return Err(LedgerError::Conflict(ConflictReason::NotReserved));
        }
        let updated = self
            .store
            .update_unit_if(unit_id, UnitStatus::Reserved, &|unit| {
                unit.status = UnitStatus::Used;
                unit.reserved_for = None;
                unit.reserved_quantity = None;
            })
            .map_err(|err| Self::transition_error(unit_id, err))?;
        tracing::debug!(unit = %unit_id.0, "unit consumed");
        Ok(updated)
    }

    /// Reserved -> Available, used when a proposed match is rejected or
    /// superseded.
    pub fn release(&self, unit_id: &UnitId) -> Result<BloodInventoryUnit, LedgerError> {
        let current = self.fetch(unit_id)?;
        if current.status != UnitStatus::Reserved {
            return Err(LedgerError::Conflict(ConflictReason::NotReserved));
        }
        let updated = self
            .store
            .update_unit_if(unit_id, UnitStatus::Reserved, &|unit| {
                unit.status = UnitStatus::Available;
                unit.reserved_for = None;
                unit.reserved_quantity = None;
            })
            .map_err(|err| Self::transition_error(unit_id, err))?;
        tracing::debug!(unit = %unit_id.0, "reservation released");
        Ok(updated)
    }

    /// Transition every Available or Reserved unit past its expiry to
    /// Expired, reporting invalidated reservations so their requests can be
    /// re-matched. Idempotent: an immediate second sweep finds nothing left
    /// to transition. A unit whose status moves concurrently is skipped and
    /// picked up on the next cycle.
    pub fn sweep_expired(&self, now: DateTime<Utc>) -> Result<Vec<ExpiredUnit>, LedgerError> {
        let candidates = self
            .store
            .units_expiring_by(now)
            .map_err(LedgerError::Store)?;

        let mut expired = Vec::new();
        for unit in candidates {
            let result = self
                .store
                .update_unit_if(&unit.id, unit.status, &|stored| {
                    stored.status = UnitStatus::Expired;
                    stored.reserved_for = None;
                    stored.reserved_quantity = None;
                });
            match result {
                Ok(_) => {
                    tracing::info!(unit = %unit.id.0, "unit expired");
                    expired.push(ExpiredUnit {
                        unit_id: unit.id,
                        reserved_for: unit.reserved_for,
                    });
                }
                Err(StoreError::Conflict) => {
                    tracing::debug!(unit = %unit.id.0, "expiry lost status race; deferring");
                }
                Err(StoreError::NotFound) => {}
                Err(err) => return Err(LedgerError::Store(err)),
            }
        }
        Ok(expired)
    }

    fn fetch(&self, unit_id: &UnitId) -> Result<BloodInventoryUnit, LedgerError> {
        self.store
            .unit(unit_id)
            .map_err(LedgerError::Store)?
            .ok_or_else(|| LedgerError::UnitNotFound(unit_id.0.clone()))
    }

    fn transition_error(unit_id: &UnitId, err: StoreError) -> LedgerError {
        match err {
            StoreError::NotFound => LedgerError::UnitNotFound(unit_id.0.clone()),
            StoreError::Conflict => LedgerError::Conflict(ConflictReason::StatusChanged),
            other => LedgerError::Store(other),
        }
    }
}
