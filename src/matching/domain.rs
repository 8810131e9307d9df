use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Identifier wrapper for stored inventory units.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UnitId(pub String);

/// Identifier wrapper for blood requests.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RequestId(pub String);

/// Identifier wrapper for match records.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MatchId(pub String);

/// Identifier wrapper for donor profiles.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DonorId(pub String);

/// Identifier wrapper for shared location records.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LocationId(pub String);

/// Identifier wrapper for blood component types.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ComponentTypeId(pub String);

/// Input validation failures surfaced without retry.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("unknown blood group label '{0}'")]
    UnknownBloodGroup(String),
    #[error("latitude {0} outside [-90, 90]")]
    LatitudeOutOfRange(f64),
    #[error("longitude {0} outside [-180, 180]")]
    LongitudeOutOfRange(f64),
    #[error("quantity must be positive")]
    NonPositiveQuantity,
    #[error("shelf life must be at least one day")]
    ZeroShelfLife,
}

/// ABO antigen group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Abo {
    O,
    A,
    B,
    Ab,
}

/// RhD antigen factor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RhFactor {
    Negative,
    Positive,
}

/// ABO/Rh blood group. Immutable reference data carried by value; the label
/// ("O-", "AB+") is its identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BloodGroup {
    pub abo: Abo,
    pub rh: RhFactor,
}

impl BloodGroup {
    pub const fn new(abo: Abo, rh: RhFactor) -> Self {
        Self { abo, rh }
    }

    /// The eight ABO/Rh groups in label order.
    pub const ALL: [BloodGroup; 8] = [
        BloodGroup::new(Abo::O, RhFactor::Negative),
        BloodGroup::new(Abo::O, RhFactor::Positive),
        BloodGroup::new(Abo::A, RhFactor::Negative),
        BloodGroup::new(Abo::A, RhFactor::Positive),
        BloodGroup::new(Abo::B, RhFactor::Negative),
        BloodGroup::new(Abo::B, RhFactor::Positive),
        BloodGroup::new(Abo::Ab, RhFactor::Negative),
        BloodGroup::new(Abo::Ab, RhFactor::Positive),
    ];

    pub const fn label(self) -> &'static str {
        match (self.abo, self.rh) {
            (Abo::O, RhFactor::Negative) => "O-",
            (Abo::O, RhFactor::Positive) => "O+",
            (Abo::A, RhFactor::Negative) => "A-",
            (Abo::A, RhFactor::Positive) => "A+",
            (Abo::B, RhFactor::Negative) => "B-",
            (Abo::B, RhFactor::Positive) => "B+",
            (Abo::Ab, RhFactor::Negative) => "AB-",
            (Abo::Ab, RhFactor::Positive) => "AB+",
        }
    }

    pub fn parse_label(value: &str) -> Result<Self, ValidationError> {
        Self::ALL
            .into_iter()
            .find(|group| group.label().eq_ignore_ascii_case(value.trim()))
            .ok_or_else(|| ValidationError::UnknownBloodGroup(value.to_string()))
    }
}

/// Directionality of compatibility for a component type. Red cell components
/// follow donor-to-recipient ABO/Rh rules; plasma components invert the ABO
/// direction and ignore Rh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompatibilityRule {
    RedCell,
    Plasma,
}

/// Blood component reference data. `shelf_life_days` fixes the expiry offset
/// for every unit of this type; `compatibility` registers which directionality
/// the resolver applies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentType {
    pub id: ComponentTypeId,
    pub name: String,
    pub shelf_life_days: u32,
    pub compatibility: CompatibilityRule,
}

impl ComponentType {
    pub fn new(
        id: ComponentTypeId,
        name: impl Into<String>,
        shelf_life_days: u32,
        compatibility: CompatibilityRule,
    ) -> Result<Self, ValidationError> {
        if shelf_life_days == 0 {
            return Err(ValidationError::ZeroShelfLife);
        }
        Ok(Self {
            id,
            name: name.into(),
            shelf_life_days,
            compatibility,
        })
    }
}

/// Lifecycle state of a stored unit. Transitions are monotonic:
/// Available -> {Reserved | Expired} -> {Used | Expired}; Used and Expired are
/// terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnitStatus {
    Available,
    Reserved,
    Used,
    Expired,
}

impl UnitStatus {
    pub const fn label(self) -> &'static str {
        match self {
            UnitStatus::Available => "available",
            UnitStatus::Reserved => "reserved",
            UnitStatus::Used => "used",
            UnitStatus::Expired => "expired",
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, UnitStatus::Used | UnitStatus::Expired)
    }
}

/// A stored donation lot. `reserved_for` and `reserved_quantity` are set iff
/// the unit is Reserved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BloodInventoryUnit {
    pub id: UnitId,
    pub blood_group: BloodGroup,
    pub component_type: ComponentTypeId,
    pub quantity: u32,
    pub collected_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub status: UnitStatus,
    pub reserved_for: Option<RequestId>,
    pub reserved_quantity: Option<u32>,
}

impl BloodInventoryUnit {
    /// Intake constructor; expiry is the collection instant plus the
    /// component's shelf life.
    pub fn collected(
        id: UnitId,
        blood_group: BloodGroup,
        component: &ComponentType,
        quantity: u32,
        collected_at: DateTime<Utc>,
    ) -> Result<Self, ValidationError> {
        if quantity == 0 {
            return Err(ValidationError::NonPositiveQuantity);
        }
        Ok(Self {
            id,
            blood_group,
            component_type: component.id.clone(),
            quantity,
            collected_at,
            expires_at: collected_at + Duration::days(i64::from(component.shelf_life_days)),
            status: UnitStatus::Available,
            reserved_for: None,
            reserved_quantity: None,
        })
    }
}

/// How urgently a request must be satisfied; drives the donor eligibility
/// interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Urgency {
    Routine,
    Urgent,
    Emergency,
}

/// Lifecycle state of a blood request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestStatus {
    Pending,
    PartiallyMatched,
    Matched,
    Fulfilled,
    Cancelled,
    Expired,
}

impl RequestStatus {
    pub const fn label(self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::PartiallyMatched => "partially_matched",
            RequestStatus::Matched => "matched",
            RequestStatus::Fulfilled => "fulfilled",
            RequestStatus::Cancelled => "cancelled",
            RequestStatus::Expired => "expired",
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            RequestStatus::Fulfilled | RequestStatus::Cancelled | RequestStatus::Expired
        )
    }

    /// Statuses the engine will attempt to (re-)match.
    pub const fn is_open(self) -> bool {
        matches!(self, RequestStatus::Pending | RequestStatus::PartiallyMatched)
    }
}

/// A demand for blood, routine through emergency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BloodRequest {
    pub id: RequestId,
    pub blood_group: BloodGroup,
    pub component_type: ComponentTypeId,
    pub quantity_needed: u32,
    pub location: LocationId,
    pub urgency: Urgency,
    pub status: RequestStatus,
    pub created_at: DateTime<Utc>,
    pub deadline: Option<DateTime<Utc>>,
}

impl BloodRequest {
    #[allow(clippy::too_many_arguments)]
    pub fn open(
        id: RequestId,
        blood_group: BloodGroup,
        component_type: ComponentTypeId,
        quantity_needed: u32,
        location: LocationId,
        urgency: Urgency,
        created_at: DateTime<Utc>,
        deadline: Option<DateTime<Utc>>,
    ) -> Result<Self, ValidationError> {
        if quantity_needed == 0 {
            return Err(ValidationError::NonPositiveQuantity);
        }
        Ok(Self {
            id,
            blood_group,
            component_type,
            quantity_needed,
            location,
            urgency,
            status: RequestStatus::Pending,
            created_at,
            deadline,
        })
    }
}

/// Donor record as seen by the engine. Mutation (recording a completed
/// donation) belongs to the donation-event workflow; the engine only reads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DonorProfile {
    pub id: DonorId,
    pub person_name: String,
    pub blood_group: BloodGroup,
    pub last_donation_at: Option<DateTime<Utc>>,
    pub location: LocationId,
    pub medical_hold: bool,
}

/// Lifecycle state of a match record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchStatus {
    Proposed,
    Confirmed,
    Rejected,
    Superseded,
}

impl MatchStatus {
    pub const fn label(self) -> &'static str {
        match self {
            MatchStatus::Proposed => "proposed",
            MatchStatus::Confirmed => "confirmed",
            MatchStatus::Rejected => "rejected",
            MatchStatus::Superseded => "superseded",
        }
    }

    /// Proposed and Confirmed matches count toward request coverage.
    pub const fn is_active(self) -> bool {
        matches!(self, MatchStatus::Proposed | MatchStatus::Confirmed)
    }
}

/// The unit-or-donor origin of a match; a match never has both.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchSource {
    InventoryUnit(UnitId),
    Donor(DonorId),
}

/// One allocation toward a request. Several matches may partially fulfill the
/// same request; the sum of confirmed allocations never exceeds the quantity
/// needed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestMatch {
    pub id: MatchId,
    pub request_id: RequestId,
    pub source: MatchSource,
    pub quantity_allocated: u32,
    /// Distance from the request location; donor matches only.
    pub distance_km: Option<f64>,
    pub matched_at: DateTime<Utc>,
    pub status: MatchStatus,
}

/// Validated decimal-degree coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, ValidationError> {
        if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
            return Err(ValidationError::LatitudeOutOfRange(latitude));
        }
        if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
            return Err(ValidationError::LongitudeOutOfRange(longitude));
        }
        Ok(Self {
            latitude,
            longitude,
        })
    }
}

/// Shared site record referenced by requests, donors, and collection points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub id: LocationId,
    pub name: String,
    pub address: String,
    pub position: GeoPoint,
}
