//! Supply/demand coordination for donated blood.
//!
//! Leaf components first: [`compatibility`] resolves ABO/Rh rules per
//! component type, [`eligibility`] applies donation-interval policy,
//! [`geo`] ranks candidates by great-circle distance. [`ledger`] owns the
//! inventory unit state machine on top of the [`store`] contracts, and
//! [`engine`] orchestrates them into ranked match proposals. [`sweeper`]
//! runs the recurring expiration scan.

pub mod compatibility;
pub mod domain;
pub mod eligibility;
pub mod engine;
pub mod geo;
pub mod ledger;
pub mod store;
pub mod sweeper;

#[cfg(test)]
mod tests;

pub use compatibility::CompatibilityResolver;
pub use domain::{
    Abo, BloodGroup, BloodInventoryUnit, BloodRequest, CompatibilityRule, ComponentType,
    ComponentTypeId, DonorId, DonorProfile, GeoPoint, Location, LocationId, MatchId, MatchSource,
    MatchStatus, RequestId, RequestMatch, RequestStatus, RhFactor, UnitId, UnitStatus, Urgency,
    ValidationError,
};
pub use eligibility::EligibilityEvaluator;
pub use engine::{MatchError, MatchReport, MatchingEngine, RematchOutcome};
pub use geo::{distance_km, rank_donors, RankedDonor};
pub use ledger::{ConflictReason, ExpiredUnit, InventoryLedger, LedgerError};
pub use store::{
    Clock, InMemoryStore, ManualClock, NotificationDispatcher, NotificationError,
    NotificationEvent, PersistentStore, StoreError, SystemClock,
};
pub use sweeper::{ExpirationSweeper, SweepCycleOutcome};
