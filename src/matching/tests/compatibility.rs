use super::common::*;
use crate::matching::compatibility::CompatibilityResolver;
use crate::matching::domain::{BloodGroup, ComponentTypeId};

fn resolver() -> CompatibilityResolver {
    let components = [whole_blood(), plasma()];
    CompatibilityResolver::from_components(components.iter())
}

#[test]
fn o_negative_whole_blood_serves_all_eight_groups() {
    let recipients = resolver().compatible_recipients(group("O-"), &whole_blood().id);
    assert_eq!(recipients.len(), 8);
    for candidate in BloodGroup::ALL {
        assert!(
            recipients.contains(&candidate),
            "O- should serve {}",
            candidate.label()
        );
    }
}

#[test]
fn ab_positive_whole_blood_serves_only_ab_positive() {
    let recipients = resolver().compatible_recipients(group("AB+"), &whole_blood().id);
    assert_eq!(recipients, vec![group("AB+")]);
}

#[test]
fn rh_positive_donor_excluded_for_rh_negative_recipient() {
    let recipients = resolver().compatible_recipients(group("A+"), &whole_blood().id);
    assert!(recipients.contains(&group("A+")));
    assert!(recipients.contains(&group("AB+")));
    assert!(!recipients.contains(&group("A-")));
    assert!(!recipients.contains(&group("AB-")));
}

#[test]
fn plasma_inverts_abo_direction() {
    // AB is the universal plasma donor.
    let ab_recipients = resolver().compatible_recipients(group("AB+"), &plasma().id);
    assert_eq!(ab_recipients.len(), 8);

    // O plasma serves only O recipients; Rh plays no role.
    let o_recipients = resolver().compatible_recipients(group("O+"), &plasma().id);
    assert_eq!(o_recipients, vec![group("O-"), group("O+")]);
}

#[test]
fn unknown_component_type_yields_empty_set() {
    let recipients =
        resolver().compatible_recipients(group("O-"), &ComponentTypeId("cryo".to_string()));
    assert!(recipients.is_empty());
    let donors = resolver().compatible_donors(group("O-"), &ComponentTypeId("cryo".to_string()));
    assert!(donors.is_empty());
}

#[test]
fn donor_ordering_puts_exact_group_first_and_universal_last() {
    let donors = resolver().compatible_donors(group("AB-"), &whole_blood().id);
    assert_eq!(
        donors,
        vec![group("AB-"), group("A-"), group("B-"), group("O-")]
    );
}

#[test]
fn donor_ordering_for_positive_recipient_prefers_same_rh() {
    let donors = resolver().compatible_donors(group("A+"), &whole_blood().id);
    assert_eq!(donors[0], group("A+"), "exact group leads");
    assert_eq!(
        donors.last(),
        Some(&group("O-")),
        "universal donor stock is drawn on last"
    );
    assert_eq!(donors.len(), 4, "A+, A-, O+, O- serve an A+ recipient");
}
