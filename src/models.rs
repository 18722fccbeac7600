use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate};
use serde::{Deserialize, Deserializer, Serialize};
use tracing::warn;
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledClass {
    #[serde(alias = "_id")]
    pub id: String,
    pub title: String,
    /// Weekday name as published by the studio, e.g. `Lunes` or `Monday`.
    pub day: String,
    pub hour: String,
    #[serde(rename = "type")]
    pub class_type: String,
    #[serde(default)]
    pub teacher: String,
    #[serde(default, deserialize_with = "string_or_number")]
    pub duration: Option<String>,
    #[serde(default)]
    pub max_participants: u32,
    #[serde(default)]
    pub participants: Vec<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub what_include: Option<String>,
}

impl ScheduledClass {
    pub fn spots_left(&self) -> u32 {
        let taken = u32::try_from(self.participants.len()).unwrap_or(u32::MAX);
        self.max_participants.saturating_sub(taken)
    }
}

/// Membership exactly as the backend returns it. Turned into
/// [`crate::membership::Membership`] right after deserialization.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RawMembership {
    #[serde(default)]
    pub title: String,
    #[serde(default, deserialize_with = "flexible_date")]
    pub expiration_date: Option<NaiveDate>,
    #[serde(default)]
    pub current_classes: Option<i64>,
    #[serde(default)]
    pub allowed_class_types: Vec<String>,
    #[serde(default)]
    pub class_type_allocations: Option<Vec<RawAllocation>>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RawAllocation {
    pub class_type_id: String,
    #[serde(default)]
    pub total_count: i64,
    #[serde(default)]
    pub remaining_count: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StudentEnvelope {
    #[serde(default)]
    pub membership: Option<RawMembership>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReservationSummary {
    #[serde(alias = "class_id")]
    pub class_id: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReservationRequest<'a> {
    pub student_id: &'a str,
    pub class_id: &'a str,
}

/// Remaining-class counts reported after a reservation is created or deleted.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(untagged)]
pub enum RemainingClasses {
    Total(i64),
    PerType(BTreeMap<String, i64>),
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReservationResponse {
    #[serde(default)]
    pub remaining_classes: Option<RemainingClasses>,
    #[serde(default)]
    pub membership_type: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ErrorBody {
    pub error: Option<String>,
    pub message: Option<String>,
}

impl ErrorBody {
    pub fn into_message(self) -> Option<String> {
        self.error
            .or(self.message)
            .filter(|msg| !msg.trim().is_empty())
    }
}

/// Expiration is display-only, so a blank or malformed value must not reject
/// the whole membership.
fn flexible_date<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(raw) = Option::<String>::deserialize(deserializer)? else {
        return Ok(None);
    };
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(Some(dt.date_naive()));
    }
    match NaiveDate::parse_from_str(trimmed.get(..10).unwrap_or(trimmed), "%Y-%m-%d") {
        Ok(date) => Ok(Some(date)),
        Err(err) => {
            warn!(value = %raw, error = %err, "unreadable expiration date ignored");
            Ok(None)
        }
    }
}

fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<serde_json::Value>::deserialize(deserializer)? {
        Some(serde_json::Value::String(s)) => Some(s),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scheduled_class_from_backend_json() {
        let class: ScheduledClass = serde_json::from_value(serde_json::json!({
            "_id": "c1",
            "title": "Hatha matutino",
            "day": "Lunes",
            "hour": "08:00",
            "type": "Hatha",
            "teacher": "Ana",
            "duration": 60,
            "maxParticipants": 3,
            "participants": ["s1"]
        }))
        .unwrap();
        assert_eq!(class.id, "c1");
        assert_eq!(class.class_type, "Hatha");
        assert_eq!(class.duration.as_deref(), Some("60"));
        assert_eq!(class.spots_left(), 2);
    }

    #[test]
    fn test_spots_left_saturates() {
        let class: ScheduledClass = serde_json::from_value(serde_json::json!({
            "id": "c2", "title": "t", "day": "Martes", "hour": "9", "type": "x",
            "maxParticipants": 1, "participants": ["a", "b"]
        }))
        .unwrap();
        assert_eq!(class.spots_left(), 0);
    }

    #[test]
    fn test_membership_expiration_formats() {
        let plan: RawMembership = serde_json::from_value(serde_json::json!({
            "title": "Mensual",
            "expirationDate": "2025-03-01T03:00:00.000Z"
        }))
        .unwrap();
        assert_eq!(plan.expiration_date, NaiveDate::from_ymd_opt(2025, 3, 1));

        let plan: RawMembership =
            serde_json::from_value(serde_json::json!({ "expirationDate": "2025-04-10" })).unwrap();
        assert_eq!(plan.expiration_date, NaiveDate::from_ymd_opt(2025, 4, 10));
    }

    #[test]
    fn test_unreadable_expiration_keeps_membership() {
        for value in ["", "   ", "31/01/2099"] {
            let envelope: StudentEnvelope = serde_json::from_value(serde_json::json!({
                "membership": {
                    "title": "Mensual",
                    "expirationDate": value,
                    "currentClasses": 3,
                    "allowedClassTypes": ["hatha"]
                }
            }))
            .unwrap();
            let plan = envelope.membership.unwrap();
            assert_eq!(plan.expiration_date, None);
            assert_eq!(plan.current_classes, Some(3));
        }
    }

    #[test]
    fn test_remaining_classes_shapes() {
        let scalar: ReservationResponse =
            serde_json::from_value(serde_json::json!({ "remainingClasses": 4 })).unwrap();
        assert_eq!(scalar.remaining_classes, Some(RemainingClasses::Total(4)));

        let per_type: ReservationResponse = serde_json::from_value(serde_json::json!({
            "remainingClasses": { "hatha": 3 },
            "membershipType": "new"
        }))
        .unwrap();
        assert!(matches!(
            per_type.remaining_classes,
            Some(RemainingClasses::PerType(ref map)) if map["hatha"] == 3
        ));
    }

    #[test]
    fn test_error_body_prefers_error_field() {
        let body: ErrorBody =
            serde_json::from_str(r#"{"error":"Sin clases","message":"other"}"#).unwrap();
        assert_eq!(body.into_message().as_deref(), Some("Sin clases"));
        let body: ErrorBody = serde_json::from_str(r#"{"message":"   "}"#).unwrap();
        assert!(body.into_message().is_none());
    }
}
