//! Search and sort over completed funerals (지난상가).

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::model::{Announcement, FuneralRecord};

/// Sort key for the completed list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    /// Procession time.
    #[default]
    FuneralTime,
    /// Room check-in time.
    PlacementTime,
    /// Deceased name.
    DeceasedName,
    /// Age.
    Age,
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    /// Smallest first.
    Asc,
    /// Largest first.
    #[default]
    Desc,
}

/// Query over completed funerals.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompletedQuery {
    /// Free-text filter; blank matches everything.
    pub search: String,
    /// Sort key.
    pub sort_by: SortKey,
    /// Sort direction.
    pub order: SortOrder,
}

fn contains_folded(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(needle)
}

/// Whether a record matches a lowercased, trimmed needle.
///
/// Looks at the deceased name and hanja name, the burial location, and
/// the chief mourner's name and phone.
fn matches(record: &FuneralRecord, needle: &str) -> bool {
    if contains_folded(&record.deceased_name, needle)
        || contains_folded(&record.deceased_hanja, needle)
        || contains_folded(&record.burial_location, needle)
    {
        return true;
    }
    record
        .chief_mourner()
        .is_some_and(|chief| contains_folded(&chief.name, needle) || chief.phone.contains(needle))
}

fn compare(a: &FuneralRecord, b: &FuneralRecord, key: SortKey) -> Ordering {
    match key {
        SortKey::FuneralTime => a.funeral_time.cmp(&b.funeral_time),
        SortKey::PlacementTime => a.placement_time.cmp(&b.placement_time),
        SortKey::DeceasedName => a.deceased_name.cmp(&b.deceased_name),
        SortKey::Age => a.age.unwrap_or(0).cmp(&b.age.unwrap_or(0)),
    }
}

impl CompletedQuery {
    /// Whether a single record passes the filter.
    #[must_use]
    pub fn matches(&self, record: &FuneralRecord) -> bool {
        let needle = self.search.trim().to_lowercase();
        needle.is_empty() || matches(record, &needle)
    }

    /// Filter and sort announcements.
    ///
    /// Missing times sort before any set time, as does a missing age.
    #[must_use]
    pub fn apply(&self, announcements: Vec<Announcement>) -> Vec<Announcement> {
        let needle = self.search.trim().to_lowercase();
        let mut found: Vec<Announcement> = announcements
            .into_iter()
            .filter(|a| needle.is_empty() || matches(&a.record, &needle))
            .collect();

        found.sort_by(|a, b| {
            let ordering = compare(&a.record, &b.record, self.sort_by);
            match self.order {
                SortOrder::Asc => ordering,
                SortOrder::Desc => ordering.reverse(),
            }
        });
        found
    }
}
