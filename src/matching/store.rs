use std::collections::BTreeMap;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{
    BloodGroup, BloodInventoryUnit, BloodRequest, ComponentType, ComponentTypeId, DonorId,
    DonorProfile, Location, LocationId, MatchId, RequestId, RequestMatch, UnitId, UnitStatus,
};

/// Error enumeration for persistent-store failures. `Unavailable` is the
/// transient kind: retried by the sweeper on its next cycle, surfaced to
/// user-triggered callers so they can retry explicitly.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,
    #[error("conditional update lost: status changed concurrently")]
    Conflict,
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Durable backing store for all engine entities. Implementations must make
/// `update_unit_if` atomic with respect to every other mutation of the same
/// unit; that conditional update is the primitive the ledger builds its
/// compare-and-set transitions on.
pub trait PersistentStore: Send + Sync {
    fn unit(&self, id: &UnitId) -> Result<Option<BloodInventoryUnit>, StoreError>;
    fn insert_unit(&self, unit: BloodInventoryUnit) -> Result<(), StoreError>;
    /// Units with the given status, group, and component type.
    fn units_by_group(
        &self,
        status: UnitStatus,
        group: BloodGroup,
        component: &ComponentTypeId,
    ) -> Result<Vec<BloodInventoryUnit>, StoreError>;
    /// Available or Reserved units whose expiry is at or before `cutoff`.
    fn units_expiring_by(&self, cutoff: DateTime<Utc>)
        -> Result<Vec<BloodInventoryUnit>, StoreError>;
    /// Apply `mutate` to the unit only if its status is still `expected` at
    /// the moment of commit; fail with `Conflict` otherwise.
    fn update_unit_if(
        &self,
        id: &UnitId,
        expected: UnitStatus,
        mutate: &dyn Fn(&mut BloodInventoryUnit),
    ) -> Result<BloodInventoryUnit, StoreError>;

    fn request(&self, id: &RequestId) -> Result<Option<BloodRequest>, StoreError>;
    fn insert_request(&self, request: BloodRequest) -> Result<(), StoreError>;
    fn update_request(&self, request: BloodRequest) -> Result<(), StoreError>;

    fn match_record(&self, id: &MatchId) -> Result<Option<RequestMatch>, StoreError>;
    fn insert_match(&self, record: RequestMatch) -> Result<(), StoreError>;
    fn update_match(&self, record: RequestMatch) -> Result<(), StoreError>;
    fn matches_for_request(&self, id: &RequestId) -> Result<Vec<RequestMatch>, StoreError>;

    fn donor(&self, id: &DonorId) -> Result<Option<DonorProfile>, StoreError>;
    fn insert_donor(&self, donor: DonorProfile) -> Result<(), StoreError>;
    fn donors(&self) -> Result<Vec<DonorProfile>, StoreError>;

    fn location(&self, id: &LocationId) -> Result<Option<Location>, StoreError>;
    fn insert_location(&self, location: Location) -> Result<(), StoreError>;

    fn component_type(&self, id: &ComponentTypeId) -> Result<Option<ComponentType>, StoreError>;
    fn insert_component_type(&self, component: ComponentType) -> Result<(), StoreError>;
    fn component_types(&self) -> Result<Vec<ComponentType>, StoreError>;
}

/// Events handed to staff/donor notification delivery. Grouping, channels,
/// and transport are the dispatcher's concern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotificationEvent {
    MatchProposed {
        request_id: RequestId,
        match_id: MatchId,
    },
    MatchConfirmed {
        request_id: RequestId,
        match_id: MatchId,
    },
    UnitExpired {
        unit_id: UnitId,
    },
    RequestUnfulfillable {
        request_id: RequestId,
    },
}

impl NotificationEvent {
    /// JSON payload for push-channel adapters.
    pub fn payload(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

/// Notification dispatch error.
#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("notification transport unavailable: {0}")]
    Transport(String),
}

/// Trait describing the outbound notification hook.
pub trait NotificationDispatcher: Send + Sync {
    fn publish(&self, event: NotificationEvent) -> Result<(), NotificationError>;
}

/// Current-time source, injected so tests control time without real delays.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock implementation used in production wiring.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Settable clock for deterministic tests.
#[derive(Debug)]
pub struct ManualClock {
    instant: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn starting_at(instant: DateTime<Utc>) -> Self {
        Self {
            instant: Mutex::new(instant),
        }
    }

    pub fn set(&self, instant: DateTime<Utc>) {
        *self.instant.lock().expect("clock mutex poisoned") = instant;
    }

    pub fn advance(&self, by: Duration) {
        let mut instant = self.instant.lock().expect("clock mutex poisoned");
        *instant += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.instant.lock().expect("clock mutex poisoned")
    }
}

#[derive(Debug, Default)]
struct StoreInner {
    units: BTreeMap<UnitId, BloodInventoryUnit>,
    requests: BTreeMap<RequestId, BloodRequest>,
    matches: BTreeMap<MatchId, RequestMatch>,
    donors: BTreeMap<DonorId, DonorProfile>,
    locations: BTreeMap<LocationId, Location>,
    component_types: BTreeMap<ComponentTypeId, ComponentType>,
}

/// Mutex-serialized reference store. Serializing every mutation through one
/// lock gives `update_unit_if` the per-unit compare-and-set semantics the
/// ledger requires; iteration order is deterministic by id.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    inner: Mutex<StoreInner>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_inner<T>(&self, f: impl FnOnce(&mut StoreInner) -> T) -> Result<T, StoreError> {
        let mut inner = self
            .inner
            .lock()
            .map_err(|_| StoreError::Unavailable("store mutex poisoned".to_string()))?;
        Ok(f(&mut inner))
    }
}

impl PersistentStore for InMemoryStore {
    fn unit(&self, id: &UnitId) -> Result<Option<BloodInventoryUnit>, StoreError> {
        self.with_inner(|inner| inner.units.get(id).cloned())
    }

    fn insert_unit(&self, unit: BloodInventoryUnit) -> Result<(), StoreError> {
        self.with_inner(|inner| inner.units.insert(unit.id.clone(), unit))?;
        Ok(())
    }

    fn units_by_group(
        &self,
        status: UnitStatus,
        group: BloodGroup,
        component: &ComponentTypeId,
    ) -> Result<Vec<BloodInventoryUnit>, StoreError> {
        self.with_inner(|inner| {
            inner
                .units
                .values()
                .filter(|unit| {
                    unit.status == status
                        && unit.blood_group == group
                        && unit.component_type == *component
                })
                .cloned()
                .collect()
        })
    }

    fn units_expiring_by(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<BloodInventoryUnit>, StoreError> {
        self.with_inner(|inner| {
            inner
                .units
                .values()
                .filter(|unit| {
                    matches!(unit.status, UnitStatus::Available | UnitStatus::Reserved)
                        && unit.expires_at <= cutoff
                })
                .cloned()
                .collect()
        })
    }

    fn update_unit_if(
        &self,
        id: &UnitId,
        expected: UnitStatus,
        mutate: &dyn Fn(&mut BloodInventoryUnit),
    ) -> Result<BloodInventoryUnit, StoreError> {
        self.with_inner(|inner| {
            let unit = inner.units.get_mut(id).ok_or(StoreError::NotFound)?;
            if unit.status != expected {
                return Err(StoreError::Conflict);
            }
            mutate(unit);
            Ok(unit.clone())
        })?
    }

    fn request(&self, id: &RequestId) -> Result<Option<BloodRequest>, StoreError> {
        self.with_inner(|inner| inner.requests.get(id).cloned())
    }

    fn insert_request(&self, request: BloodRequest) -> Result<(), StoreError> {
        self.with_inner(|inner| inner.requests.insert(request.id.clone(), request))?;
        Ok(())
    }

    fn update_request(&self, request: BloodRequest) -> Result<(), StoreError> {
        self.with_inner(|inner| {
            if !inner.requests.contains_key(&request.id) {
                return Err(StoreError::NotFound);
            }
            inner.requests.insert(request.id.clone(), request);
            Ok(())
        })?
    }

    fn match_record(&self, id: &MatchId) -> Result<Option<RequestMatch>, StoreError> {
        self.with_inner(|inner| inner.matches.get(id).cloned())
    }

    fn insert_match(&self, record: RequestMatch) -> Result<(), StoreError> {
        self.with_inner(|inner| inner.matches.insert(record.id.clone(), record))?;
        Ok(())
    }

    fn update_match(&self, record: RequestMatch) -> Result<(), StoreError> {
        self.with_inner(|inner| {
            if !inner.matches.contains_key(&record.id) {
                return Err(StoreError::NotFound);
            }
            inner.matches.insert(record.id.clone(), record);
            Ok(())
        })?
    }

    fn matches_for_request(&self, id: &RequestId) -> Result<Vec<RequestMatch>, StoreError> {
        self.with_inner(|inner| {
            inner
                .matches
                .values()
                .filter(|record| record.request_id == *id)
                .cloned()
                .collect()
        })
    }

    fn donor(&self, id: &DonorId) -> Result<Option<DonorProfile>, StoreError> {
        self.with_inner(|inner| inner.donors.get(id).cloned())
    }

    fn insert_donor(&self, donor: DonorProfile) -> Result<(), StoreError> {
        self.with_inner(|inner| inner.donors.insert(donor.id.clone(), donor))?;
        Ok(())
    }

    fn donors(&self) -> Result<Vec<DonorProfile>, StoreError> {
        self.with_inner(|inner| inner.donors.values().cloned().collect())
    }

    fn location(&self, id: &LocationId) -> Result<Option<Location>, StoreError> {
        self.with_inner(|inner| inner.locations.get(id).cloned())
    }

    fn insert_location(&self, location: Location) -> Result<(), StoreError> {
        self.with_inner(|inner| inner.locations.insert(location.id.clone(), location))?;
        Ok(())
    }

    fn component_type(&self, id: &ComponentTypeId) -> Result<Option<ComponentType>, StoreError> {
        self.with_inner(|inner| inner.component_types.get(id).cloned())
    }

    fn insert_component_type(&self, component: ComponentType) -> Result<(), StoreError> {
        self.with_inner(|inner| {
            inner
                .component_types
                .insert(component.id.clone(), component)
        })?;
        Ok(())
    }

    fn component_types(&self) -> Result<Vec<ComponentType>, StoreError> {
        self.with_inner(|inner| inner.component_types.values().cloned().collect())
    }
}
