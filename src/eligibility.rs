use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::membership::Membership;

/// Whether an expired membership may still book classes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpirationPolicy {
    /// Expiration is only shown to the student.
    #[default]
    DisplayOnly,
    Enforce,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum EligibilityReason {
    Eligible,
    NoMembership,
    NotCovered,
    Exhausted,
    Expired,
}

impl EligibilityReason {
    pub fn describe(self, class_type: &str) -> String {
        match self {
            EligibilityReason::Eligible => format!("You can book this {class_type} class"),
            EligibilityReason::NoMembership => "You have no active membership".to_string(),
            EligibilityReason::NotCovered => {
                format!("Your membership does not include {class_type} classes")
            }
            EligibilityReason::Exhausted => {
                format!("You have no {class_type} classes left on your membership")
            }
            EligibilityReason::Expired => "Your membership has expired".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Eligibility {
    pub bookable: bool,
    /// Classes of this type still available to the student.
    pub remaining: u32,
    pub reason: EligibilityReason,
    pub message: String,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct EligibilityEvaluator {
    policy: ExpirationPolicy,
}

impl EligibilityEvaluator {
    pub fn new(policy: ExpirationPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> ExpirationPolicy {
        self.policy
    }

    pub fn can_take_class_type(
        &self,
        plan: Option<&Membership>,
        class_type: &str,
        today: NaiveDate,
    ) -> bool {
        self.evaluate(plan, class_type, today).bookable
    }

    pub fn evaluate(
        &self,
        plan: Option<&Membership>,
        class_type: &str,
        today: NaiveDate,
    ) -> Eligibility {
        let (reason, remaining) = match plan {
            None => (EligibilityReason::NoMembership, 0),
            Some(plan) => {
                let remaining = plan.remaining_for(class_type);
                let reason = if !plan.covers(class_type) {
                    EligibilityReason::NotCovered
                } else if remaining == 0 {
                    EligibilityReason::Exhausted
                } else if self.policy == ExpirationPolicy::Enforce && plan.is_expired(today) {
                    EligibilityReason::Expired
                } else {
                    EligibilityReason::Eligible
                };
                (reason, remaining)
            }
        };

        Eligibility {
            bookable: reason == EligibilityReason::Eligible,
            remaining,
            reason,
            message: reason.describe(class_type),
        }
    }
}

/// Eligibility ignoring expiration, as the booking page has always done it.
pub fn can_take_class_type(plan: Option<&Membership>, class_type: &str) -> bool {
    plan.is_some_and(|plan| plan.remaining_for(class_type) > 0)
}
