use crate::matching::domain::{DonorId, GeoPoint, ValidationError};
use crate::matching::geo::{distance_km, rank_donors};

fn point(latitude: f64, longitude: f64) -> GeoPoint {
    GeoPoint::new(latitude, longitude).expect("valid coordinates")
}

#[test]
fn identical_coordinates_are_zero_distance() {
    let origin = point(41.6, -93.6);
    assert_eq!(distance_km(origin, origin), 0.0);
}

#[test]
fn one_degree_of_longitude_at_the_equator() {
    let distance = distance_km(point(0.0, 0.0), point(0.0, 1.0));
    let expected = 111.19;
    assert!(
        (distance - expected).abs() / expected < 0.005,
        "expected ~{expected} km, got {distance}"
    );
}

#[test]
fn antipodal_points_stay_in_domain() {
    let distance = distance_km(point(90.0, 0.0), point(-90.0, 0.0));
    assert!(distance.is_finite());
    let half_circumference = 20015.0;
    assert!(
        (distance - half_circumference).abs() / half_circumference < 0.005,
        "expected ~{half_circumference} km, got {distance}"
    );
}

#[test]
fn ranking_orders_by_distance_then_id() {
    let origin = point(0.0, 0.0);
    let candidates = vec![
        (DonorId("d-far".to_string()), point(0.0, 2.0)),
        (DonorId("d-b".to_string()), point(0.0, 1.0)),
        (DonorId("d-a".to_string()), point(0.0, 1.0)),
    ];

    let ranked = rank_donors(&candidates, origin);
    let ids: Vec<&str> = ranked.iter().map(|r| r.donor_id.0.as_str()).collect();
    // d-a and d-b share a position; the id breaks the tie.
    assert_eq!(ids, vec!["d-a", "d-b", "d-far"]);
    assert!(ranked[0].distance_km <= ranked[1].distance_km);
    assert!(ranked[1].distance_km < ranked[2].distance_km);
}

#[test]
fn coordinates_outside_range_are_rejected() {
    match GeoPoint::new(95.0, 0.0) {
        Err(ValidationError::LatitudeOutOfRange(value)) => assert_eq!(value, 95.0),
        other => panic!("expected latitude validation error, got {other:?}"),
    }
    match GeoPoint::new(0.0, 181.0) {
        Err(ValidationError::LongitudeOutOfRange(value)) => assert_eq!(value, 181.0),
        other => panic!("expected longitude validation error, got {other:?}"),
    }
}
