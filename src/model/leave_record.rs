use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};
use utoipa::ToSchema;

/// Leave categories the aggregator knows how to count.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema,
    EnumString, Display, AsRefStr, EnumIter,
)]
pub enum LeaveCategory {
    Sick,
    AnnualLeave,
    ImportantLeave,
    DeferredLeave,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, EnumString, Display,
    AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum LeaveStatus {
    Pending,
    Approved,
    Rejected,
}

impl LeaveStatus {
    /// Pending is the only non-terminal state.
    pub fn can_transition_to(self, next: LeaveStatus) -> bool {
        matches!(
            (self, next),
            (LeaveStatus::Pending, LeaveStatus::Approved)
                | (LeaveStatus::Pending, LeaveStatus::Rejected)
        )
    }

    /// Initial status for a record entered by an actor of the given privilege.
    pub fn initial(privileged: bool) -> Self {
        if privileged {
            LeaveStatus::Approved
        } else {
            LeaveStatus::Pending
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "id": 7,
    "employee_name": "Ayu",
    "leave_categories": ["Sick"],
    "start_date": "2025-03-03",
    "end_date": "2025-03-03",
    "status": "pending",
    "created_at": "2025-03-01T08:30:00Z"
}))]
pub struct LeaveRecord {
    pub id: u64,
    pub employee_name: String,
    /// Raw category strings; unknown values are kept and skipped when counting.
    pub leave_categories: Vec<String>,
    #[schema(format = "date", value_type = String)]
    pub start_date: NaiveDate,
    #[schema(format = "date", value_type = String)]
    pub end_date: NaiveDate,
    pub status: LeaveStatus,
    #[schema(format = "date-time", value_type = Option<String>)]
    pub created_at: Option<DateTime<Utc>>,
}

impl LeaveRecord {
    /// Categories that parse into the fixed enumeration, in record order.
    pub fn known_categories(&self) -> impl Iterator<Item = LeaveCategory> + '_ {
        self.leave_categories
            .iter()
            .filter_map(|c| c.trim().parse::<LeaveCategory>().ok())
    }
}

/// Row shape of `leave_requests`; categories are stored comma separated.
#[derive(Debug, FromRow)]
pub struct LeaveRow {
    pub id: u64,
    pub employee_name: Option<String>,
    pub leave_categories: Option<String>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub status: String,
    pub created_at: Option<DateTime<Utc>>,
}

pub fn join_categories(categories: &[LeaveCategory]) -> String {
    categories
        .iter()
        .map(|c| c.as_ref())
        .collect::<Vec<_>>()
        .join(",")
}

impl TryFrom<LeaveRow> for LeaveRecord {
    type Error = strum::ParseError;

    fn try_from(row: LeaveRow) -> Result<Self, Self::Error> {
        let status = row.status.parse::<LeaveStatus>()?;
        let leave_categories = row
            .leave_categories
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(String::from)
            .collect();

        Ok(LeaveRecord {
            id: row.id,
            employee_name: row.employee_name.unwrap_or_default(),
            leave_categories,
            start_date: row.start_date,
            end_date: row.end_date,
            status,
            created_at: row.created_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(status: &str, categories: Option<&str>) -> LeaveRow {
        let day = NaiveDate::from_ymd_opt(2025, 3, 3).unwrap();
        LeaveRow {
            id: 1,
            employee_name: None,
            leave_categories: categories.map(String::from),
            start_date: day,
            end_date: day,
            status: status.to_string(),
            created_at: None,
        }
    }

    #[test]
    fn only_pending_moves_and_only_forward() {
        use LeaveStatus::*;
        assert!(Pending.can_transition_to(Approved));
        assert!(Pending.can_transition_to(Rejected));
        assert!(!Pending.can_transition_to(Pending));
        for terminal in [Approved, Rejected] {
            for next in [Pending, Approved, Rejected] {
                assert!(!terminal.can_transition_to(next));
            }
        }
    }

    #[test]
    fn initial_status_follows_privilege() {
        assert_eq!(LeaveStatus::initial(true), LeaveStatus::Approved);
        assert_eq!(LeaveStatus::initial(false), LeaveStatus::Pending);
    }

    #[test]
    fn row_conversion_splits_categories_and_defaults_name() {
        let record = LeaveRecord::try_from(row("approved", Some("Sick, AnnualLeave,,Bogus"))).unwrap();
        assert_eq!(record.status, LeaveStatus::Approved);
        assert_eq!(record.employee_name, "");
        assert_eq!(record.leave_categories, vec!["Sick", "AnnualLeave", "Bogus"]);
        assert_eq!(
            record.known_categories().collect::<Vec<_>>(),
            vec![LeaveCategory::Sick, LeaveCategory::AnnualLeave]
        );
    }

    #[test]
    fn row_with_unknown_status_is_rejected() {
        assert!(LeaveRecord::try_from(row("cancelled", None)).is_err());
        let record = LeaveRecord::try_from(row("pending", None)).unwrap();
        assert!(record.leave_categories.is_empty());
    }

    #[test]
    fn join_uses_wire_names() {
        assert_eq!(
            join_categories(&[LeaveCategory::ImportantLeave, LeaveCategory::DeferredLeave]),
            "ImportantLeave,DeferredLeave"
        );
    }
}
