use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum HolidayCategory {
    Statutory,
    Ceremonial,
}

impl HolidayCategory {
    pub fn color(self) -> &'static str {
        match self {
            HolidayCategory::Statutory => "#e53935",
            HolidayCategory::Ceremonial => "#8e24aa",
        }
    }
}

/// Calendar marker derived on every projection; never stored.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "id": "hari-raya-kuningan-2025-02-22",
    "title": "Hari Raya Kuningan",
    "date": "2025-02-22",
    "category": "ceremonial",
    "color": "#8e24aa"
}))]
pub struct HolidayEvent {
    pub id: String,
    pub title: String,
    #[schema(format = "date", value_type = String)]
    pub date: NaiveDate,
    pub category: HolidayCategory,
    pub color: String,
}

impl HolidayEvent {
    pub fn new(title: &str, date: NaiveDate, category: HolidayCategory) -> Self {
        Self {
            id: format!("{}-{}", slug(title), date.format("%Y-%m-%d")),
            title: title.to_string(),
            date,
            category,
            color: category.color().to_string(),
        }
    }
}

fn slug(title: &str) -> String {
    let mut out = String::with_capacity(title.len());
    let mut dash = false;
    for ch in title.chars() {
        if ch.is_alphanumeric() {
            out.extend(ch.to_lowercase());
            dash = false;
        } else if !dash && !out.is_empty() {
            out.push('-');
            dash = true;
        }
    }
    while out.ends_with('-') {
        out.pop();
    }
    out
}
