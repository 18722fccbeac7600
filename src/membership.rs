//! Tagged membership model.
//!
//! The backend returns either a flat class counter with a list of allowed
//! class types, or a list of per-type allocations. The shape is decided once,
//! when a [`RawMembership`] is converted, and every query below works off the
//! resulting [`Quota`] variant.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use tracing::warn;

use crate::models::{RawAllocation, RawMembership};

/// Class types are compared case-insensitively everywhere.
pub fn normalize_class_type(class_type: &str) -> String {
    class_type.to_lowercase()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Membership {
    pub title: String,
    pub expiration_date: Option<NaiveDate>,
    pub quota: Quota,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Quota {
    Legacy(LegacyQuota),
    Allocated(Vec<Allocation>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyQuota {
    pub current_classes: u32,
    /// Lower-cased.
    pub allowed_class_types: BTreeSet<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Allocation {
    pub class_type_id: String,
    pub total_count: u32,
    pub remaining_count: u32,
}

impl Allocation {
    pub fn matches(&self, class_type: &str) -> bool {
        normalize_class_type(&self.class_type_id) == normalize_class_type(class_type)
    }

    /// Sets the remaining count, keeping it within `0..=total_count`.
    pub fn set_remaining(&mut self, remaining: i64) {
        self.remaining_count = clamp_count(remaining).min(self.total_count);
    }
}

pub(crate) fn clamp_count(value: i64) -> u32 {
    u32::try_from(value.max(0)).unwrap_or(u32::MAX)
}

impl From<RawMembership> for Membership {
    fn from(raw: RawMembership) -> Self {
        let quota = match raw.class_type_allocations {
            Some(allocations) if !allocations.is_empty() => {
                Quota::Allocated(ingest_allocations(&raw.title, allocations))
            }
            _ => Quota::Legacy(LegacyQuota {
                current_classes: clamp_count(raw.current_classes.unwrap_or(0)),
                allowed_class_types: raw
                    .allowed_class_types
                    .iter()
                    .map(|t| normalize_class_type(t))
                    .collect(),
            }),
        };

        Membership {
            title: raw.title,
            expiration_date: raw.expiration_date,
            quota,
        }
    }
}

fn ingest_allocations(title: &str, raw: Vec<RawAllocation>) -> Vec<Allocation> {
    let mut seen = BTreeSet::new();
    let mut allocations = Vec::with_capacity(raw.len());
    for entry in raw {
        if !seen.insert(normalize_class_type(&entry.class_type_id)) {
            warn!(
                membership = title,
                class_type = %entry.class_type_id,
                "duplicate class type allocation dropped"
            );
            continue;
        }
        let total_count = clamp_count(entry.total_count);
        let mut allocation = Allocation {
            class_type_id: entry.class_type_id,
            total_count,
            remaining_count: 0,
        };
        if entry.remaining_count > i64::from(total_count) {
            warn!(
                membership = title,
                class_type = %allocation.class_type_id,
                remaining = entry.remaining_count,
                total = total_count,
                "remaining count above total, clamping"
            );
        }
        allocation.set_remaining(entry.remaining_count);
        allocations.push(allocation);
    }
    allocations
}

impl Membership {
    pub fn is_new_system(&self) -> bool {
        matches!(self.quota, Quota::Allocated(_))
    }

    /// Remaining classes per lower-cased class type. Empty for legacy plans,
    /// which carry no per-type breakdown.
    pub fn available_by_type(&self) -> BTreeMap<String, u32> {
        match &self.quota {
            Quota::Allocated(allocations) => allocations
                .iter()
                .map(|a| (normalize_class_type(&a.class_type_id), a.remaining_count))
                .collect(),
            Quota::Legacy(_) => BTreeMap::new(),
        }
    }

    /// Informational total shown on the membership card. Never used to gate
    /// a booking.
    pub fn total_available(&self) -> u32 {
        match &self.quota {
            Quota::Allocated(allocations) => allocations
                .iter()
                .fold(0u32, |acc, a| acc.saturating_add(a.remaining_count)),
            Quota::Legacy(legacy) => legacy.current_classes,
        }
    }

    pub fn allocation(&self, class_type: &str) -> Option<&Allocation> {
        match &self.quota {
            Quota::Allocated(allocations) => allocations.iter().find(|a| a.matches(class_type)),
            Quota::Legacy(_) => None,
        }
    }

    /// Whether the plan covers `class_type` at all, regardless of what is left.
    pub fn covers(&self, class_type: &str) -> bool {
        match &self.quota {
            Quota::Allocated(_) => self.allocation(class_type).is_some(),
            Quota::Legacy(legacy) => legacy
                .allowed_class_types
                .contains(&normalize_class_type(class_type)),
        }
    }

    pub fn remaining_for(&self, class_type: &str) -> u32 {
        match &self.quota {
            Quota::Allocated(_) => self
                .allocation(class_type)
                .map(|a| a.remaining_count)
                .unwrap_or(0),
            Quota::Legacy(legacy) if self.covers(class_type) => legacy.current_classes,
            Quota::Legacy(_) => 0,
        }
    }

    pub fn is_expired(&self, today: NaiveDate) -> bool {
        self.expiration_date.is_some_and(|expires| expires < today)
    }
}

pub fn is_new_system(plan: Option<&Membership>) -> bool {
    plan.is_some_and(Membership::is_new_system)
}

pub fn available_by_type(plan: Option<&Membership>) -> BTreeMap<String, u32> {
    plan.map(Membership::available_by_type).unwrap_or_default()
}
