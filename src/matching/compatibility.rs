use std::collections::BTreeMap;

use super::domain::{Abo, BloodGroup, CompatibilityRule, ComponentType, ComponentTypeId, RhFactor};

/// Table-driven ABO/Rh compatibility. Component types register their
/// directionality rule at construction; asking about an unregistered
/// component yields an empty set rather than an error.
#[derive(Debug, Clone, Default)]
pub struct CompatibilityResolver {
    rules: BTreeMap<ComponentTypeId, CompatibilityRule>,
}

impl CompatibilityResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the table from component reference data.
    pub fn from_components<'a, I>(components: I) -> Self
    where
        I: IntoIterator<Item = &'a ComponentType>,
    {
        let mut resolver = Self::new();
        for component in components {
            resolver.register(component.id.clone(), component.compatibility);
        }
        resolver
    }

    pub fn register(&mut self, component: ComponentTypeId, rule: CompatibilityRule) {
        self.rules.insert(component, rule);
    }

    /// Recipient groups a donation of `donor` group may legally satisfy for
    /// the given component type.
    pub fn compatible_recipients(
        &self,
        donor: BloodGroup,
        component: &ComponentTypeId,
    ) -> Vec<BloodGroup> {
        let Some(rule) = self.rules.get(component) else {
            return Vec::new();
        };
        BloodGroup::ALL
            .into_iter()
            .filter(|recipient| serves(*rule, donor, *recipient))
            .collect()
    }

    /// Donor groups that may satisfy a recipient of `recipient` group,
    /// ordered by compatibility closeness: the exact group first, then the
    /// remaining compatible groups most-specific-first (fewest recipients
    /// served), so universal stock is drawn on last. Ties break on label.
    pub fn compatible_donors(
        &self,
        recipient: BloodGroup,
        component: &ComponentTypeId,
    ) -> Vec<BloodGroup> {
        let Some(rule) = self.rules.get(component) else {
            return Vec::new();
        };
        let mut donors: Vec<BloodGroup> = BloodGroup::ALL
            .into_iter()
            .filter(|donor| serves(*rule, *donor, recipient))
            .collect();
        donors.sort_by_key(|donor| {
            let exact = *donor != recipient;
            let reach = BloodGroup::ALL
                .into_iter()
                .filter(|candidate| serves(*rule, *donor, *candidate))
                .count();
            (exact, reach, donor.label())
        });
        donors
    }
}

fn serves(rule: CompatibilityRule, donor: BloodGroup, recipient: BloodGroup) -> bool {
    match rule {
        CompatibilityRule::RedCell => {
            abo_serves(donor.abo, recipient.abo) && rh_serves(donor.rh, recipient.rh)
        }
        // Plasma antibodies run the other way: the ABO direction inverts and
        // RhD plays no role.
        CompatibilityRule::Plasma => abo_serves(recipient.abo, donor.abo),
    }
}

fn abo_serves(donor: Abo, recipient: Abo) -> bool {
    matches!(
        (donor, recipient),
        (Abo::O, _) | (Abo::A, Abo::A | Abo::Ab) | (Abo::B, Abo::B | Abo::Ab) | (Abo::Ab, Abo::Ab)
    )
}

fn rh_serves(donor: RhFactor, recipient: RhFactor) -> bool {
    donor == RhFactor::Negative || recipient == RhFactor::Positive
}
