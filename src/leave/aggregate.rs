//! Read-only views over a leave snapshot: the pending queue and the
//! per-employee category totals. Nothing here touches the store.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use utoipa::ToSchema;

use crate::model::leave_record::{LeaveCategory, LeaveRecord, LeaveStatus};

/// Group label for approved records without an employee name.
pub const UNKNOWN_EMPLOYEE: &str = "unknown";

/// Which records a caller is allowed to see. Built from the authenticated
/// user and passed into every aggregation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordScope {
    All,
    Own(String),
}

impl RecordScope {
    pub fn admits(&self, record: &LeaveRecord) -> bool {
        match self {
            RecordScope::All => true,
            RecordScope::Own(name) => {
                let name = name.trim();
                !name.is_empty() && name.to_lowercase() == record.employee_name.trim().to_lowercase()
            }
        }
    }
}

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema, EnumString,
    Display,
)]
pub enum PendingSort {
    #[serde(rename = "name-asc")]
    #[strum(serialize = "name-asc")]
    NameAsc,
    #[serde(rename = "name-desc")]
    #[strum(serialize = "name-desc")]
    NameDesc,
    #[serde(rename = "date-asc")]
    #[strum(serialize = "date-asc")]
    DateAsc,
    #[serde(rename = "date-desc")]
    #[strum(serialize = "date-desc")]
    DateDesc,
    #[serde(rename = "created-old")]
    #[strum(serialize = "created-old")]
    CreatedOld,
    #[default]
    #[serde(rename = "created-new")]
    #[strum(serialize = "created-new")]
    CreatedNew,
}

fn name_key(record: &LeaveRecord) -> String {
    record.employee_name.trim().to_lowercase()
}

fn created_key(record: &LeaveRecord) -> i64 {
    record.created_at.map(|t| t.timestamp_millis()).unwrap_or(0)
}

fn compare(sort: PendingSort, a: &LeaveRecord, b: &LeaveRecord) -> Ordering {
    match sort {
        PendingSort::NameAsc => name_key(a).cmp(&name_key(b)),
        PendingSort::NameDesc => name_key(b).cmp(&name_key(a)),
        PendingSort::DateAsc => a.start_date.cmp(&b.start_date),
        PendingSort::DateDesc => b.start_date.cmp(&a.start_date),
        PendingSort::CreatedOld => created_key(a).cmp(&created_key(b)),
        PendingSort::CreatedNew => created_key(b).cmp(&created_key(a)),
    }
}

/// Pending records visible to `scope`, ordered by `sort`. Ties keep input order.
pub fn pending_queue(
    records: &[LeaveRecord],
    sort: PendingSort,
    scope: &RecordScope,
) -> Vec<LeaveRecord> {
    let mut pending: Vec<LeaveRecord> = records
        .iter()
        .filter(|r| r.status == LeaveStatus::Pending && scope.admits(r))
        .cloned()
        .collect();

    pending.sort_by(|a, b| compare(sort, a, b));
    pending
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, ToSchema)]
#[schema(example = json!({
    "employee": "Ayu",
    "sick": 2,
    "annual_leave": 1,
    "important_leave": 0,
    "deferred_leave": 0,
    "total": 3
}))]
pub struct EmployeeTotals {
    pub employee: String,
    pub sick: u32,
    pub annual_leave: u32,
    pub important_leave: u32,
    pub deferred_leave: u32,
    pub total: u32,
}

impl EmployeeTotals {
    fn new(employee: String) -> Self {
        Self {
            employee,
            ..Self::default()
        }
    }

    fn add(&mut self, category: LeaveCategory) {
        match category {
            LeaveCategory::Sick => self.sick += 1,
            LeaveCategory::AnnualLeave => self.annual_leave += 1,
            LeaveCategory::ImportantLeave => self.important_leave += 1,
            LeaveCategory::DeferredLeave => self.deferred_leave += 1,
        }
        self.total = self.sick + self.annual_leave + self.important_leave + self.deferred_leave;
    }
}

/// Approved leave per employee and category, ordered by employee name.
/// `employee` narrows the output to one person (case-insensitive).
pub fn category_totals(
    records: &[LeaveRecord],
    scope: &RecordScope,
    employee: Option<&str>,
) -> Vec<EmployeeTotals> {
    let mut groups: BTreeMap<String, EmployeeTotals> = BTreeMap::new();

    for record in records
        .iter()
        .filter(|r| r.status == LeaveStatus::Approved && scope.admits(r))
    {
        let name = match record.employee_name.trim() {
            "" => UNKNOWN_EMPLOYEE,
            name => name,
        };
        let totals = groups
            .entry(name.to_string())
            .or_insert_with(|| EmployeeTotals::new(name.to_string()));
        for category in record.known_categories() {
            totals.add(category);
        }
    }

    let wanted = employee.map(|e| e.trim().to_lowercase());
    groups
        .into_values()
        .filter(|t| match &wanted {
            Some(w) => t.employee.to_lowercase() == *w,
            None => true,
        })
        .collect()
}
