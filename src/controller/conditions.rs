//! # Conditions
//!
//! Reads and writes the single condition of a given type on a status record.
//! `lastTransitionTime` only moves when the condition's `status` value changes;
//! reason and message edits alone never touch it.

use crate::controller::clock::format_timestamp;
use crate::crd::{CertificateRequestStatus, Condition, ConditionStatus, IssuerStatus};
use chrono::{DateTime, Utc};

/// Status records that carry a list of conditions
pub trait HasConditions {
    fn conditions(&self) -> &[Condition];
    fn conditions_mut(&mut self) -> &mut Vec<Condition>;
}

impl HasConditions for CertificateRequestStatus {
    fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    fn conditions_mut(&mut self) -> &mut Vec<Condition> {
        &mut self.conditions
    }
}

impl HasConditions for IssuerStatus {
    fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    fn conditions_mut(&mut self) -> &mut Vec<Condition> {
        &mut self.conditions
    }
}

/// First condition of the given type
pub fn get_condition<'a, S>(status: &'a S, condition_type: &str) -> Option<&'a Condition>
where
    S: HasConditions + ?Sized,
{
    status
        .conditions()
        .iter()
        .find(|c| c.r#type == condition_type)
}

/// Whether the condition of the given type exists with status `True`
pub fn is_condition_true<S>(status: &S, condition_type: &str) -> bool
where
    S: HasConditions + ?Sized,
{
    get_condition(status, condition_type).is_some_and(Condition::is_true)
}

/// Create or update the condition of the given type.
///
/// Returns `true` when the status value transitioned (or the condition is new).
pub fn set_condition<S>(
    status: &mut S,
    condition_type: &str,
    new_status: ConditionStatus,
    reason: &str,
    message: &str,
    now: DateTime<Utc>,
) -> bool
where
    S: HasConditions + ?Sized,
{
    let conditions = status.conditions_mut();
    let existing = conditions
        .iter_mut()
        .find(|c| c.r#type == condition_type);

    match existing {
        Some(condition) => {
            let transitioned = condition.status != new_status;
            if transitioned {
                condition.status = new_status;
                condition.last_transition_time = Some(format_timestamp(now));
            }
            condition.reason = Some(reason.to_string());
            condition.message = Some(message.to_string());
            transitioned
        }
        None => {
            conditions.push(Condition {
                r#type: condition_type.to_string(),
                status: new_status,
                last_transition_time: Some(format_timestamp(now)),
                reason: Some(reason.to_string()),
                message: Some(message.to_string()),
            });
            true
        }
    }
}
