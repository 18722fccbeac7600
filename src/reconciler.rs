//! Applies server-confirmed remaining-class counts onto a local membership
//! snapshot. Pure: no I/O, and the same payload applied twice yields the same
//! membership.

use tracing::{debug, warn};

use crate::membership::{Membership, Quota, clamp_count, normalize_class_type};
use crate::models::RemainingClasses;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciled {
    pub membership: Membership,
    /// Types reported by the server that the local snapshot has no
    /// allocation for. They are dropped, never added.
    pub ignored_types: Vec<String>,
}

pub fn reconcile(
    previous: &Membership,
    class_type: &str,
    update: &RemainingClasses,
) -> Reconciled {
    let mut membership = previous.clone();
    let mut ignored_types = Vec::new();

    match (&mut membership.quota, update) {
        (Quota::Allocated(allocations), RemainingClasses::PerType(counts)) => {
            for (reported_type, remaining) in counts {
                match allocations.iter_mut().find(|a| a.matches(reported_type)) {
                    Some(allocation) => allocation.set_remaining(*remaining),
                    None => ignored_types.push(reported_type.clone()),
                }
            }
        }
        (Quota::Allocated(allocations), RemainingClasses::Total(remaining)) => {
            match allocations.iter_mut().find(|a| a.matches(class_type)) {
                Some(allocation) => allocation.set_remaining(*remaining),
                None => ignored_types.push(class_type.to_string()),
            }
        }
        (Quota::Legacy(legacy), RemainingClasses::Total(remaining)) => {
            legacy.current_classes = clamp_count(*remaining);
        }
        (Quota::Legacy(legacy), RemainingClasses::PerType(counts)) => {
            let total = counts.values().map(|v| (*v).max(0)).sum::<i64>();
            legacy.current_classes = clamp_count(total);
        }
    }

    if !ignored_types.is_empty() {
        warn!(
            membership = %membership.title,
            ignored = ?ignored_types,
            "server reported class types missing from local membership"
        );
    }
    debug!(
        class_type = %normalize_class_type(class_type),
        total_available = membership.total_available(),
        "membership reconciled"
    );

    Reconciled {
        membership,
        ignored_types,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeMap, BTreeSet};

    use super::*;
    use crate::eligibility::can_take_class_type;
    use crate::membership::{Allocation, LegacyQuota};

    fn allocated(entries: &[(&str, u32, u32)]) -> Membership {
        Membership {
            title: "Plan por tipo".into(),
            expiration_date: None,
            quota: Quota::Allocated(
                entries
                    .iter()
                    .map(|(id, total, remaining)| Allocation {
                        class_type_id: id.to_string(),
                        total_count: *total,
                        remaining_count: *remaining,
                    })
                    .collect(),
            ),
        }
    }

    fn per_type(entries: &[(&str, i64)]) -> RemainingClasses {
        RemainingClasses::PerType(
            entries
                .iter()
                .map(|(k, v)| (k.to_string(), *v))
                .collect::<BTreeMap<_, _>>(),
        )
    }

    #[test]
    fn test_per_type_update_is_idempotent() {
        let start = allocated(&[("Hatha", 4, 4), ("Ashtanga", 2, 2)]);
        let update = per_type(&[("hatha", 3), ("ashtanga", 1)]);

        let once = reconcile(&start, "hatha", &update);
        let twice = reconcile(&once.membership, "hatha", &update);
        assert_eq!(once.membership, twice.membership);
        assert_eq!(reconcile(&start, "hatha", &update), once);
    }

    #[test]
    fn test_aggregate_is_derived() {
        let start = allocated(&[("hatha", 4, 4), ("ashtanga", 2, 2)]);
        let result = reconcile(&start, "hatha", &per_type(&[("hatha", 3), ("ashtanga", 1)]));
        assert_eq!(result.membership.total_available(), 4);
    }

    #[test]
    fn test_unmatched_type_is_ignored() {
        let start = allocated(&[("hatha", 4, 4)]);
        let result = reconcile(&start, "hatha", &per_type(&[("hatha", 3), ("aerial", 5)]));
        let Quota::Allocated(allocations) = &result.membership.quota else {
            panic!("expected allocated quota");
        };
        assert_eq!(allocations.len(), 1);
        assert_eq!(allocations[0].remaining_count, 3);
        assert_eq!(result.ignored_types, vec!["aerial".to_string()]);
    }

    #[test]
    fn test_counts_stay_within_total() {
        let start = allocated(&[("hatha", 4, 1)]);
        let high = reconcile(&start, "hatha", &per_type(&[("hatha", 10)]));
        assert_eq!(high.membership.remaining_for("hatha"), 4);
        let low = reconcile(&start, "hatha", &per_type(&[("hatha", -2)]));
        assert_eq!(low.membership.remaining_for("hatha"), 0);
    }

    #[test]
    fn test_scalar_on_allocated_targets_class_type() {
        let start = allocated(&[("hatha", 4, 4), ("yin", 2, 2)]);
        let result = reconcile(&start, "Yin", &RemainingClasses::Total(1));
        assert_eq!(result.membership.remaining_for("yin"), 1);
        assert_eq!(result.membership.remaining_for("hatha"), 4);
    }

    #[test]
    fn test_legacy_scalar_overwrites_counter() {
        let start = Membership {
            title: "Plan clásico".into(),
            expiration_date: None,
            quota: Quota::Legacy(LegacyQuota {
                current_classes: 1,
                allowed_class_types: BTreeSet::from(["vinyasa".to_string()]),
            }),
        };
        assert!(can_take_class_type(Some(&start), "vinyasa"));

        let result = reconcile(&start, "vinyasa", &RemainingClasses::Total(0));
        assert_eq!(result.membership.total_available(), 0);
        assert!(!can_take_class_type(Some(&result.membership), "vinyasa"));
    }

    #[test]
    fn test_legacy_mapping_sums() {
        let start = Membership {
            title: "Plan clásico".into(),
            expiration_date: None,
            quota: Quota::Legacy(LegacyQuota {
                current_classes: 8,
                allowed_class_types: BTreeSet::from(["hatha".to_string()]),
            }),
        };
        let result = reconcile(&start, "hatha", &per_type(&[("hatha", 2), ("yin", 3)]));
        assert_eq!(result.membership.total_available(), 5);
    }
}
