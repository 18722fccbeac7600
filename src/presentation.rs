use chrono::{NaiveDate, Weekday};
use serde::Serialize;
use utoipa::ToSchema;

use crate::booking::BookingSession;
use crate::eligibility::Eligibility;
use crate::membership::{Membership, Quota};
use crate::models::ScheduledClass;

/// Parses Spanish or English weekday names, ignoring case and accents.
pub fn weekday_from_name(name: &str) -> Option<Weekday> {
    let folded: String = name
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| match c {
            'á' => 'a',
            'é' => 'e',
            'í' => 'i',
            'ó' => 'o',
            'ú' => 'u',
            other => other,
        })
        .collect();
    match folded.as_str() {
        "lunes" | "monday" => Some(Weekday::Mon),
        "martes" | "tuesday" => Some(Weekday::Tue),
        "miercoles" | "wednesday" => Some(Weekday::Wed),
        "jueves" | "thursday" => Some(Weekday::Thu),
        "viernes" | "friday" => Some(Weekday::Fri),
        "sabado" | "saturday" => Some(Weekday::Sat),
        "domingo" | "sunday" => Some(Weekday::Sun),
        _ => None,
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ClassView {
    #[serde(flatten)]
    pub class: ScheduledClass,
    pub spots_left: u32,
    pub booked: bool,
    pub eligibility: Eligibility,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DaySchedule {
    pub day: String,
    pub available: Vec<ClassView>,
    pub unavailable: Vec<ClassView>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TypeBalance {
    pub class_type: String,
    pub remaining: u32,
    /// `None` for legacy plans, which only track one counter.
    pub total: Option<u32>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MembershipCard {
    pub title: String,
    #[schema(value_type = Option<String>, format = "date", example = "2025-03-01")]
    pub expiration_date: Option<NaiveDate>,
    pub expired: bool,
    /// `allocated` or `legacy`.
    pub system: String,
    pub total_available: u32,
    pub balances: Vec<TypeBalance>,
}

impl MembershipCard {
    pub fn new(membership: &Membership, today: NaiveDate) -> Self {
        let (system, balances) = match &membership.quota {
            Quota::Allocated(allocations) => (
                "allocated",
                allocations
                    .iter()
                    .map(|a| TypeBalance {
                        class_type: a.class_type_id.clone(),
                        remaining: a.remaining_count,
                        total: Some(a.total_count),
                    })
                    .collect(),
            ),
            Quota::Legacy(legacy) => (
                "legacy",
                legacy
                    .allowed_class_types
                    .iter()
                    .map(|t| TypeBalance {
                        class_type: t.clone(),
                        remaining: legacy.current_classes,
                        total: None,
                    })
                    .collect(),
            ),
        };

        MembershipCard {
            title: membership.title.clone(),
            expiration_date: membership.expiration_date,
            expired: membership.is_expired(today),
            system: system.to_string(),
            total_available: membership.total_available(),
            balances,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct WeekSchedule {
    pub membership: Option<MembershipCard>,
    pub days: Vec<DaySchedule>,
}

#[derive(PartialEq, Eq)]
enum DayKey {
    Weekday(Weekday),
    Label(String),
}

/// Known weekdays group regardless of case, accents or language.
fn day_key(day: &str) -> DayKey {
    match weekday_from_name(day) {
        Some(weekday) => DayKey::Weekday(weekday),
        None => DayKey::Label(day.trim().to_lowercase()),
    }
}

fn day_rank(day: &str) -> u32 {
    weekday_from_name(day)
        .map(|w| w.num_days_from_monday())
        .unwrap_or(7)
}

/// Groups classes by day, Monday first. Unrecognised day labels go last in
/// the order they first appear; classes keep backend order within a day.
pub fn group_by_day(booking: &BookingSession) -> Vec<DaySchedule> {
    let mut days: Vec<DaySchedule> = Vec::new();

    for class in booking.classes() {
        let view = ClassView {
            class: class.clone(),
            spots_left: class.spots_left(),
            booked: booking.is_booked(&class.id),
            eligibility: booking.eligibility(class),
        };
        let open = view.booked || (view.eligibility.bookable && view.spots_left > 0);

        let key = day_key(&class.day);
        let position = days.iter().position(|d| day_key(&d.day) == key);
        let day = match position {
            Some(index) => &mut days[index],
            None => {
                days.push(DaySchedule {
                    day: class.day.trim().to_string(),
                    available: Vec::new(),
                    unavailable: Vec::new(),
                });
                let last = days.len() - 1;
                &mut days[last]
            }
        };
        if open {
            day.available.push(view);
        } else {
            day.unavailable.push(view);
        }
    }

    // Stable sort keeps first-seen order for unknown days.
    days.sort_by_key(|d| day_rank(&d.day));
    days
}

pub fn week_schedule(booking: &BookingSession) -> WeekSchedule {
    WeekSchedule {
        membership: booking
            .membership()
            .map(|m| MembershipCard::new(m, booking.today())),
        days: group_by_day(booking),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;
    use crate::auth::Session;
    use crate::booking::InFlight;
    use crate::eligibility::{EligibilityEvaluator, EligibilityReason};
    use crate::membership::{Allocation, LegacyQuota};

    fn class(id: &str, day: &str, class_type: &str, max: u32) -> ScheduledClass {
        serde_json::from_value(serde_json::json!({
            "id": id, "title": format!("{class_type} {day}"), "day": day,
            "hour": "08:00", "type": class_type, "maxParticipants": max
        }))
        .unwrap()
    }

    fn booking_with(membership: Option<Membership>, classes: Vec<ScheduledClass>) -> BookingSession {
        let mut booking = BookingSession::new(
            Session::new("s1", Some("token".into())),
            EligibilityEvaluator::default(),
            InFlight::new(),
            NaiveDate::from_ymd_opt(2025, 1, 10).unwrap(),
        );
        booking.set_membership(membership);
        booking.set_classes(classes);
        booking
    }

    #[test]
    fn test_weekday_names() {
        assert_eq!(weekday_from_name("Miércoles"), Some(Weekday::Wed));
        assert_eq!(weekday_from_name("SABADO"), Some(Weekday::Sat));
        assert_eq!(weekday_from_name(" friday "), Some(Weekday::Fri));
        assert_eq!(weekday_from_name("feriado"), None);
    }

    #[test]
    fn test_partition_by_allocation() {
        let membership = Membership {
            title: "Plan por tipo".into(),
            expiration_date: None,
            quota: Quota::Allocated(vec![Allocation {
                class_type_id: "hatha".into(),
                total_count: 2,
                remaining_count: 2,
            }]),
        };
        let booking = booking_with(
            Some(membership),
            vec![class("c1", "Lunes", "hatha", 10), class("c2", "Lunes", "ashtanga", 10)],
        );

        let days = group_by_day(&booking);
        assert_eq!(days.len(), 1);
        assert_eq!(days[0].available.len(), 1);
        assert_eq!(days[0].available[0].class.id, "c1");
        assert!(days[0].available[0].eligibility.bookable);
        assert_eq!(days[0].unavailable.len(), 1);
        assert_eq!(days[0].unavailable[0].class.id, "c2");
        assert_eq!(
            days[0].unavailable[0].eligibility.reason,
            EligibilityReason::NotCovered
        );
    }

    #[test]
    fn test_days_follow_week_order() {
        let booking = booking_with(
            None,
            vec![
                class("c1", "Viernes", "hatha", 5),
                class("c2", "Especial", "hatha", 5),
                class("c3", "lunes", "hatha", 5),
                class("c4", "Miércoles", "hatha", 5),
                class("c5", "Lunes", "yin", 5),
            ],
        );
        let days = group_by_day(&booking);
        let names: Vec<_> = days.iter().map(|d| d.day.as_str()).collect();
        assert_eq!(names, vec!["lunes", "Miércoles", "Viernes", "Especial"]);
        assert_eq!(days[0].unavailable.len(), 2);
    }

    #[test]
    fn test_day_labels_group_across_accents() {
        let booking = booking_with(
            None,
            vec![
                class("c1", "Miércoles", "hatha", 5),
                class("c2", "Miercoles", "yin", 5),
                class("c3", "MIÉRCOLES ", "vinyasa", 5),
                class("c4", "especial", "hatha", 5),
                class("c5", "Especial", "yin", 5),
            ],
        );
        let days = group_by_day(&booking);
        assert_eq!(days.len(), 2);
        assert_eq!(days[0].day, "Miércoles");
        assert_eq!(days[0].unavailable.len(), 3);
        assert_eq!(days[1].day, "especial");
        assert_eq!(days[1].unavailable.len(), 2);
    }

    #[test]
    fn test_full_class_is_unavailable_unless_booked() {
        let membership = Membership {
            title: "Plan clásico".into(),
            expiration_date: None,
            quota: Quota::Legacy(LegacyQuota {
                current_classes: 4,
                allowed_class_types: BTreeSet::from(["hatha".to_string()]),
            }),
        };
        let mut booking = booking_with(
            Some(membership),
            vec![class("c1", "Martes", "hatha", 0), class("c2", "Martes", "hatha", 0)],
        );
        booking.set_booked(["c2".to_string()]);

        let days = group_by_day(&booking);
        assert_eq!(days[0].available.len(), 1);
        assert_eq!(days[0].available[0].class.id, "c2");
        assert!(days[0].available[0].booked);
        assert_eq!(days[0].unavailable[0].class.id, "c1");
    }

    #[test]
    fn test_membership_card() {
        let membership = Membership {
            title: "Plan por tipo".into(),
            expiration_date: NaiveDate::from_ymd_opt(2025, 1, 5),
            quota: Quota::Allocated(vec![
                Allocation {
                    class_type_id: "Hatha".into(),
                    total_count: 4,
                    remaining_count: 3,
                },
                Allocation {
                    class_type_id: "Yin".into(),
                    total_count: 2,
                    remaining_count: 1,
                },
            ]),
        };
        let card = MembershipCard::new(&membership, NaiveDate::from_ymd_opt(2025, 1, 10).unwrap());
        assert!(card.expired);
        assert_eq!(card.system, "allocated");
        assert_eq!(card.total_available, 4);
        assert_eq!(card.balances.len(), 2);
        assert_eq!(card.balances[0].total, Some(4));
    }
}
