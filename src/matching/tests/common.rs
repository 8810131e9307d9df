use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, TimeZone, Utc};

use crate::config::MatchingConfig;
use crate::matching::compatibility::CompatibilityResolver;
use crate::matching::domain::{
    BloodGroup, BloodInventoryUnit, BloodRequest, CompatibilityRule, ComponentType,
    ComponentTypeId, DonorId, DonorProfile, GeoPoint, Location, LocationId, RequestId, UnitId,
    Urgency,
};
use crate::matching::eligibility::EligibilityEvaluator;
use crate::matching::engine::MatchingEngine;
use crate::matching::store::{
    InMemoryStore, ManualClock, NotificationDispatcher, NotificationError, NotificationEvent,
    PersistentStore,
};

pub(super) fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0)
        .single()
        .expect("valid base time")
}

pub(super) fn day(n: i64) -> DateTime<Utc> {
    base_time() + Duration::days(n)
}

pub(super) fn group(label: &str) -> BloodGroup {
    BloodGroup::parse_label(label).expect("known blood group label")
}

pub(super) fn whole_blood() -> ComponentType {
    ComponentType::new(
        ComponentTypeId("whole-blood".to_string()),
        "Whole blood",
        35,
        CompatibilityRule::RedCell,
    )
    .expect("valid component")
}

pub(super) fn plasma() -> ComponentType {
    ComponentType::new(
        ComponentTypeId("plasma".to_string()),
        "Fresh frozen plasma",
        365,
        CompatibilityRule::Plasma,
    )
    .expect("valid component")
}

pub(super) fn platelets() -> ComponentType {
    ComponentType::new(
        ComponentTypeId("platelets".to_string()),
        "Platelets",
        5,
        CompatibilityRule::RedCell,
    )
    .expect("valid component")
}

pub(super) fn site(id: &str, latitude: f64, longitude: f64) -> Location {
    Location {
        id: LocationId(id.to_string()),
        name: format!("Site {id}"),
        address: "1 Collection Way".to_string(),
        position: GeoPoint::new(latitude, longitude).expect("valid coordinates"),
    }
}

pub(super) fn stock_unit(
    id: &str,
    label: &str,
    component: &ComponentType,
    quantity: u32,
    collected_at: DateTime<Utc>,
) -> BloodInventoryUnit {
    BloodInventoryUnit::collected(
        UnitId(id.to_string()),
        group(label),
        component,
        quantity,
        collected_at,
    )
    .expect("valid unit")
}

#[allow(clippy::too_many_arguments)]
pub(super) fn open_request(
    id: &str,
    label: &str,
    component: &ComponentType,
    quantity_needed: u32,
    urgency: Urgency,
    created_at: DateTime<Utc>,
    deadline: Option<DateTime<Utc>>,
) -> BloodRequest {
    BloodRequest::open(
        RequestId(id.to_string()),
        group(label),
        component.id.clone(),
        quantity_needed,
        LocationId("site-hq".to_string()),
        urgency,
        created_at,
        deadline,
    )
    .expect("valid request")
}

pub(super) fn donor_at(
    id: &str,
    label: &str,
    location: &str,
    last_donation_at: Option<DateTime<Utc>>,
) -> DonorProfile {
    DonorProfile {
        id: DonorId(id.to_string()),
        person_name: format!("Donor {id}"),
        blood_group: group(label),
        last_donation_at,
        location: LocationId(location.to_string()),
        medical_hold: false,
    }
}

/// Dispatcher capturing events so tests can assert integration boundaries.
#[derive(Debug, Default)]
pub(super) struct RecordingDispatcher {
    events: Mutex<Vec<NotificationEvent>>,
}

impl RecordingDispatcher {
    pub(super) fn events(&self) -> Vec<NotificationEvent> {
        self.events.lock().expect("events mutex poisoned").clone()
    }
}

impl NotificationDispatcher for RecordingDispatcher {
    fn publish(&self, event: NotificationEvent) -> Result<(), NotificationError> {
        self.events
            .lock()
            .expect("events mutex poisoned")
            .push(event);
        Ok(())
    }
}

pub(super) struct Harness {
    pub(super) store: Arc<InMemoryStore>,
    pub(super) clock: Arc<ManualClock>,
    pub(super) dispatcher: Arc<RecordingDispatcher>,
    pub(super) engine: Arc<MatchingEngine<InMemoryStore, RecordingDispatcher>>,
}

/// Engine wired against an in-memory store seeded with the standard
/// component types and a headquarters site in Des Moines.
pub(super) fn harness() -> Harness {
    let store = Arc::new(InMemoryStore::new());
    for component in [whole_blood(), plasma(), platelets()] {
        store
            .insert_component_type(component)
            .expect("seed component type");
    }
    store
        .insert_location(site("site-hq", 41.6, -93.6))
        .expect("seed hq site");

    let components = store.component_types().expect("component types load");
    let resolver = CompatibilityResolver::from_components(components.iter());
    let eligibility = EligibilityEvaluator::new(MatchingConfig::default());
    let clock = Arc::new(ManualClock::starting_at(base_time()));
    let dispatcher = Arc::new(RecordingDispatcher::default());

    let engine = Arc::new(MatchingEngine::new(
        Arc::clone(&store),
        resolver,
        eligibility,
        Arc::clone(&dispatcher),
        clock.clone(),
    ));

    Harness {
        store,
        clock,
        dispatcher,
        engine,
    }
}
