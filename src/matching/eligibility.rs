use chrono::{DateTime, Utc};

use super::domain::{DonorProfile, Urgency};
use crate::config::MatchingConfig;

/// Decides whether a donor may donate now. Pure given its inputs; the
/// interval policy is injected at construction, never read from ambient
/// state.
#[derive(Debug, Clone, Copy)]
pub struct EligibilityEvaluator {
    donation_interval_days: i64,
    emergency_donation_interval_days: i64,
}

impl EligibilityEvaluator {
    pub fn new(config: MatchingConfig) -> Self {
        Self {
            donation_interval_days: i64::from(config.donation_interval_days),
            emergency_donation_interval_days: i64::from(
                config.emergency_donation_interval_days,
            ),
        }
    }

    pub fn is_eligible(&self, donor: &DonorProfile, now: DateTime<Utc>, urgency: Urgency) -> bool {
        if donor.medical_hold {
            return false;
        }
        let Some(last) = donor.last_donation_at else {
            return true;
        };
        let days_since = (now - last).num_days();
        let required = match urgency {
            Urgency::Routine | Urgency::Urgent => self.donation_interval_days,
            Urgency::Emergency => self.emergency_donation_interval_days,
        };
        days_since >= required
    }
}
