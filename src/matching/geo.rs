use super::domain::{DonorId, GeoPoint};

const EARTH_RADIUS_KM: f64 = 6371.0;

/// Great-circle distance in kilometers between two decimal-degree points.
/// The square-root argument is clamped to [0, 1] so antipodal pairs cannot
/// drift outside asin's domain through floating-point overshoot.
pub fn distance_km(a: GeoPoint, b: GeoPoint) -> f64 {
    let lat_a = a.latitude.to_radians();
    let lat_b = b.latitude.to_radians();
    let d_lat = (b.latitude - a.latitude).to_radians();
    let d_lon = (b.longitude - a.longitude).to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat_a.cos() * lat_b.cos() * (d_lon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * h.clamp(0.0, 1.0).sqrt().asin()
}

/// A donor candidate with its computed distance from the request location.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedDonor {
    pub donor_id: DonorId,
    pub distance_km: f64,
}

/// Order donor candidates by ascending distance from `origin`. Ties break on
/// donor id so the ordering is reproducible.
pub fn rank_donors(candidates: &[(DonorId, GeoPoint)], origin: GeoPoint) -> Vec<RankedDonor> {
    let mut ranked: Vec<RankedDonor> = candidates
        .iter()
        .map(|(donor_id, position)| RankedDonor {
            donor_id: donor_id.clone(),
            distance_km: distance_km(origin, *position),
        })
        .collect();
    ranked.sort_by(|a, b| {
        a.distance_km
            .total_cmp(&b.distance_km)
            .then_with(|| a.donor_id.cmp(&b.donor_id))
    });
    ranked
}
