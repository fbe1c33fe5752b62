//! Grouped counting over canonical records.
//!
//! Each source is folded into a [`PartialSummary`] on its own; partials are
//! merged by summing matching keys. The date dimension stays sparse here and is
//! widened only when the output table is built.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use serde::Serialize;

use crate::{canonical::CanonicalRecord, config::Config};

/// Row identity of the summary: (SourceFile, AssignedTo).
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct GroupKey {
    pub source_file: String,
    pub assigned_to: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GroupTally {
    pub total: u64,
    pub completed: u64,
    pub pending: u64,
    /// Completed records per date; only dated completions land here.
    pub completed_by_date: BTreeMap<NaiveDate, u64>,
}

impl GroupTally {
    fn absorb(&mut self, other: GroupTally) {
        self.total += other.total;
        self.completed += other.completed;
        self.pending += other.pending;
        for (date, n) in other.completed_by_date {
            *self.completed_by_date.entry(date).or_default() += n;
        }
    }

    pub fn dated_completions(&self) -> u64 {
        self.completed_by_date.values().sum()
    }
}

/// Upper-cased labels of the two named status buckets.
#[derive(Clone, Debug)]
pub struct StatusLabels {
    pub completed: String,
    pub pending: String,
}

impl StatusLabels {
    pub fn from_config(config: &Config) -> Self {
        Self {
            completed: config.completed_status.trim().to_uppercase(),
            pending: config.pending_status.trim().to_uppercase(),
        }
    }
}

impl Default for StatusLabels {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Mergeable aggregation result for any subset of the batch.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PartialSummary {
    pub groups: BTreeMap<GroupKey, GroupTally>,
    /// Every non-null date seen, whatever the status.
    pub dates: BTreeSet<NaiveDate>,
    /// Records per non-null status; null statuses are left out.
    pub status_counts: BTreeMap<String, u64>,
    pub assignee_totals: BTreeMap<Option<String>, u64>,
    /// Records with a product description, per assignee.
    pub product_counts: BTreeMap<Option<String>, u64>,
    pub records: u64,
}

impl PartialSummary {
    pub fn from_records<'a, I>(records: I, labels: &StatusLabels) -> Self
    where
        I: IntoIterator<Item = &'a CanonicalRecord>,
    {
        let mut summary = Self::default();
        for record in records {
            summary.add(record, labels);
        }
        summary
    }

    pub fn add(&mut self, record: &CanonicalRecord, labels: &StatusLabels) {
        let key = GroupKey {
            source_file: record.source_file.clone(),
            assigned_to: record.assigned_to.clone(),
        };
        let tally = self.groups.entry(key).or_default();
        tally.total += 1;

        let status = record.status.as_deref();
        let completed = status == Some(labels.completed.as_str());
        if completed {
            tally.completed += 1;
        } else if status == Some(labels.pending.as_str()) {
            tally.pending += 1;
        }

        if let Some(date) = record.date {
            self.dates.insert(date);
            if completed {
                *tally.completed_by_date.entry(date).or_default() += 1;
            }
        }

        if let Some(status) = &record.status {
            *self.status_counts.entry(status.clone()).or_default() += 1;
        }
        *self
            .assignee_totals
            .entry(record.assigned_to.clone())
            .or_default() += 1;
        let products = self
            .product_counts
            .entry(record.assigned_to.clone())
            .or_default();
        if record.product_description.is_some() {
            *products += 1;
        }
        self.records += 1;
    }

    /// Sum two partials key by key. Associative and commutative.
    pub fn merge(self, other: Self) -> Self {
        let (mut big, small) = if self.groups.len() >= other.groups.len() {
            (self, other)
        } else {
            (other, self)
        };
        for (key, tally) in small.groups {
            big.groups.entry(key).or_default().absorb(tally);
        }
        big.dates.extend(small.dates);
        for (label, n) in small.status_counts {
            *big.status_counts.entry(label).or_default() += n;
        }
        for (who, n) in small.assignee_totals {
            *big.assignee_totals.entry(who).or_default() += n;
        }
        for (who, n) in small.product_counts {
            *big.product_counts.entry(who).or_default() += n;
        }
        big.records += small.records;
        big
    }

    pub fn is_empty(&self) -> bool {
        self.records == 0
    }
}
