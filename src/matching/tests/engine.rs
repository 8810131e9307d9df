use super::common::*;
use crate::matching::domain::{
    MatchId, MatchSource, MatchStatus, RequestId, RequestStatus, UnitId, UnitStatus, Urgency,
};
use crate::matching::engine::MatchError;
use crate::matching::store::{NotificationEvent, PersistentStore};

fn unit_status(harness: &Harness, id: &str) -> UnitStatus {
    harness
        .store
        .unit(&UnitId(id.to_string()))
        .expect("lookup succeeds")
        .expect("unit present")
        .status
}

fn request_status(harness: &Harness, id: &str) -> RequestStatus {
    harness
        .store
        .request(&RequestId(id.to_string()))
        .expect("lookup succeeds")
        .expect("request present")
        .status
}

#[test]
fn exact_group_stock_is_reserved_fefo() {
    let h = harness();
    let component = whole_blood();
    for unit in [
        stock_unit("u-late", "A+", &component, 2, day(10)),
        stock_unit("u-early", "A+", &component, 2, day(1)),
    ] {
        h.store.insert_unit(unit).expect("seed unit");
    }
    h.store
        .insert_request(open_request(
            "req-1",
            "A+",
            &component,
            2,
            Urgency::Routine,
            day(0),
            None,
        ))
        .expect("seed request");

    let report = h
        .engine
        .match_request(&RequestId("req-1".to_string()))
        .expect("matching succeeds");

    assert_eq!(report.status, RequestStatus::Matched);
    assert_eq!(report.quantity_covered, 2);
    assert_eq!(report.proposed.len(), 1);
    assert_eq!(
        report.proposed[0].source,
        MatchSource::InventoryUnit(UnitId("u-early".to_string()))
    );
    assert_eq!(unit_status(&h, "u-early"), UnitStatus::Reserved);
    assert_eq!(unit_status(&h, "u-late"), UnitStatus::Available);
}

#[test]
fn equal_expiry_prefers_smallest_sufficient_quantity() {
    let h = harness();
    let component = whole_blood();
    for unit in [
        stock_unit("u-big", "B-", &component, 10, day(0)),
        stock_unit("u-fit", "B-", &component, 3, day(0)),
        stock_unit("u-tiny", "B-", &component, 1, day(0)),
    ] {
        h.store.insert_unit(unit).expect("seed unit");
    }
    h.store
        .insert_request(open_request(
            "req-1",
            "B-",
            &component,
            3,
            Urgency::Routine,
            day(0),
            None,
        ))
        .expect("seed request");

    let report = h
        .engine
        .match_request(&RequestId("req-1".to_string()))
        .expect("matching succeeds");

    assert_eq!(report.proposed.len(), 1);
    assert_eq!(
        report.proposed[0].source,
        MatchSource::InventoryUnit(UnitId("u-fit".to_string())),
        "three units cover the need; the best fit wins over the larger lot"
    );
}

#[test]
fn emergency_ab_negative_draws_on_o_negative_not_ab_positive() {
    let h = harness();
    let component = whole_blood();
    for unit in [
        stock_unit("u-abpos", "AB+", &component, 5, day(0)),
        stock_unit("u-oneg", "O-", &component, 5, day(0)),
    ] {
        h.store.insert_unit(unit).expect("seed unit");
    }
    h.store
        .insert_request(open_request(
            "req-em",
            "AB-",
            &component,
            3,
            Urgency::Emergency,
            day(0),
            None,
        ))
        .expect("seed request");

    let report = h
        .engine
        .match_request(&RequestId("req-em".to_string()))
        .expect("matching succeeds");

    assert_eq!(report.status, RequestStatus::Matched);
    assert_eq!(
        report.proposed[0].source,
        MatchSource::InventoryUnit(UnitId("u-oneg".to_string()))
    );
    assert_eq!(unit_status(&h, "u-oneg"), UnitStatus::Reserved);
    assert_eq!(
        unit_status(&h, "u-abpos"),
        UnitStatus::Available,
        "AB+ stock is incompatible with an AB- recipient"
    );
}

#[test]
fn partial_stock_leaves_the_request_partially_matched() {
    let h = harness();
    let component = whole_blood();
    h.store
        .insert_unit(stock_unit("u-1", "O+", &component, 2, day(0)))
        .expect("seed unit");
    h.store
        .insert_request(open_request(
            "req-1",
            "O+",
            &component,
            5,
            Urgency::Routine,
            day(0),
            None,
        ))
        .expect("seed request");

    let report = h
        .engine
        .match_request(&RequestId("req-1".to_string()))
        .expect("matching succeeds");

    assert_eq!(report.status, RequestStatus::PartiallyMatched);
    assert_eq!(report.quantity_covered, 2);
    assert_eq!(request_status(&h, "req-1"), RequestStatus::PartiallyMatched);
}

#[test]
fn donor_fallback_ranks_eligible_donors_by_distance() {
    let h = harness();
    let component = whole_blood();
    for location in [
        site("site-near", 41.7, -93.6),
        site("site-far", 44.9, -93.3),
    ] {
        h.store.insert_location(location).expect("seed site");
    }
    for donor in [
        donor_at("d-far", "O-", "site-far", None),
        donor_at("d-near", "O-", "site-near", None),
        donor_at("d-recent", "O-", "site-near", Some(day(-10))),
        donor_at("d-wrong-group", "A+", "site-near", None),
    ] {
        h.store.insert_donor(donor).expect("seed donor");
    }
    let mut held = donor_at("d-held", "O-", "site-near", None);
    held.medical_hold = true;
    h.store.insert_donor(held).expect("seed donor");

    h.store
        .insert_request(open_request(
            "req-1",
            "O-",
            &component,
            2,
            Urgency::Routine,
            day(0),
            None,
        ))
        .expect("seed request");

    let report = h
        .engine
        .match_request(&RequestId("req-1".to_string()))
        .expect("matching succeeds");

    assert_eq!(report.status, RequestStatus::Matched);
    assert_eq!(report.proposed.len(), 2);
    assert_eq!(
        report.proposed[0].source,
        MatchSource::Donor(crate::matching::domain::DonorId("d-near".to_string()))
    );
    assert_eq!(
        report.proposed[1].source,
        MatchSource::Donor(crate::matching::domain::DonorId("d-far".to_string()))
    );
    assert!(report.proposed[0].distance_km.expect("donor distance") < report.proposed[1].distance_km.expect("donor distance"));

    let proposals = h
        .dispatcher
        .events()
        .iter()
        .filter(|event| matches!(event, NotificationEvent::MatchProposed { .. }))
        .count();
    assert_eq!(proposals, 2);
}

#[test]
fn proposed_allocations_never_exceed_the_need() {
    let h = harness();
    let component = whole_blood();
    for unit in [
        stock_unit("u-1", "A-", &component, 4, day(0)),
        stock_unit("u-2", "A-", &component, 4, day(1)),
    ] {
        h.store.insert_unit(unit).expect("seed unit");
    }
    h.store
        .insert_request(open_request(
            "req-1",
            "A-",
            &component,
            5,
            Urgency::Routine,
            day(0),
            None,
        ))
        .expect("seed request");

    let report = h
        .engine
        .match_request(&RequestId("req-1".to_string()))
        .expect("matching succeeds");

    let allocated: u32 = report
        .proposed
        .iter()
        .map(|record| record.quantity_allocated)
        .sum();
    assert_eq!(allocated, 5, "the second lot is drawn on only for the remainder");
    assert_eq!(report.status, RequestStatus::Matched);
}

#[test]
fn confirm_match_consumes_the_unit_and_fulfills_the_request() {
    let h = harness();
    let component = whole_blood();
    h.store
        .insert_unit(stock_unit("u-1", "O+", &component, 3, day(0)))
        .expect("seed unit");
    h.store
        .insert_request(open_request(
            "req-1",
            "O+",
            &component,
            3,
            Urgency::Urgent,
            day(0),
            None,
        ))
        .expect("seed request");

    let report = h
        .engine
        .match_request(&RequestId("req-1".to_string()))
        .expect("matching succeeds");
    let match_id = report.proposed[0].id.clone();

    let confirmed = h.engine.confirm_match(&match_id).expect("confirmation succeeds");
    assert_eq!(confirmed.status, MatchStatus::Confirmed);
    assert_eq!(unit_status(&h, "u-1"), UnitStatus::Used);
    assert_eq!(request_status(&h, "req-1"), RequestStatus::Fulfilled);
    assert!(h
        .dispatcher
        .events()
        .contains(&NotificationEvent::MatchConfirmed {
            request_id: RequestId("req-1".to_string()),
            match_id: match_id.clone(),
        }));

    // Confirmation is not repeatable.
    match h.engine.confirm_match(&match_id) {
        Err(MatchError::MatchClosed { status: "confirmed", .. }) => {}
        other => panic!("expected match-closed error, got {other:?}"),
    }
}

#[test]
fn reject_match_releases_the_unit_and_reopens_the_request() {
    let h = harness();
    let component = whole_blood();
    h.store
        .insert_unit(stock_unit("u-1", "O+", &component, 3, day(0)))
        .expect("seed unit");
    h.store
        .insert_request(open_request(
            "req-1",
            "O+",
            &component,
            3,
            Urgency::Routine,
            day(0),
            None,
        ))
        .expect("seed request");

    let report = h
        .engine
        .match_request(&RequestId("req-1".to_string()))
        .expect("matching succeeds");
    let match_id = report.proposed[0].id.clone();

    let rejected = h.engine.reject_match(&match_id).expect("rejection succeeds");
    assert_eq!(rejected.status, MatchStatus::Rejected);
    assert_eq!(unit_status(&h, "u-1"), UnitStatus::Available);
    assert_eq!(request_status(&h, "req-1"), RequestStatus::Pending);
}

#[test]
fn closed_requests_are_not_rematched() {
    let h = harness();
    let component = whole_blood();
    let mut request = open_request(
        "req-1",
        "O+",
        &component,
        1,
        Urgency::Routine,
        day(0),
        None,
    );
    request.status = RequestStatus::Cancelled;
    h.store.insert_request(request).expect("seed request");

    match h.engine.match_request(&RequestId("req-1".to_string())) {
        Err(MatchError::RequestClosed { status: "cancelled", .. }) => {}
        other => panic!("expected request-closed error, got {other:?}"),
    }
}

#[test]
fn unknown_request_reports_not_found() {
    let h = harness();
    match h.engine.match_request(&RequestId("ghost".to_string())) {
        Err(MatchError::RequestNotFound(id)) => assert_eq!(id, "ghost"),
        other => panic!("expected not-found error, got {other:?}"),
    }
}

#[test]
fn unknown_match_reports_not_found() {
    let h = harness();
    match h.engine.confirm_match(&MatchId("ghost".to_string())) {
        Err(MatchError::MatchNotFound(id)) => assert_eq!(id, "ghost"),
        other => panic!("expected not-found error, got {other:?}"),
    }
}

#[test]
fn notification_payloads_carry_the_event_identifiers() {
    let h = harness();
    let component = whole_blood();
    h.store
        .insert_unit(stock_unit("u-1", "O+", &component, 2, day(0)))
        .expect("seed unit");
    h.store
        .insert_request(open_request(
            "req-1",
            "O+",
            &component,
            2,
            Urgency::Routine,
            day(0),
            None,
        ))
        .expect("seed request");

    let report = h
        .engine
        .match_request(&RequestId("req-1".to_string()))
        .expect("matching succeeds");
    let match_id = report.proposed[0].id.clone();

    let events = h.dispatcher.events();
    let proposed = events
        .iter()
        .find(|event| matches!(event, NotificationEvent::MatchProposed { .. }))
        .expect("proposal event published");
    assert_eq!(
        proposed.payload(),
        serde_json::json!({
            "MatchProposed": {
                "request_id": "req-1",
                "match_id": match_id.0,
            }
        })
    );
}

#[test]
fn uncoverable_request_past_deadline_expires() {
    let h = harness();
    let component = whole_blood();
    h.store
        .insert_request(open_request(
            "req-1",
            "AB-",
            &component,
            2,
            Urgency::Emergency,
            day(0),
            Some(day(1)),
        ))
        .expect("seed request");
    h.clock.set(day(2));

    let report = h
        .engine
        .match_request(&RequestId("req-1".to_string()))
        .expect("matching pass completes");

    assert_eq!(report.status, RequestStatus::Expired);
    assert_eq!(report.quantity_covered, 0);
    assert!(h
        .dispatcher
        .events()
        .contains(&NotificationEvent::RequestUnfulfillable {
            request_id: RequestId("req-1".to_string()),
        }));
}
