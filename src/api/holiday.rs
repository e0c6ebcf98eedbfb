use std::ops::RangeInclusive;

use crate::auth::auth::AuthUser;
use crate::config::Config;
use crate::error::AppError;
use crate::holiday::ceremonial::CeremonialCycle;
use crate::holiday::projector::{HolidayProjection, HolidayProjector};
use crate::holiday::statutory::{CachedHolidaySource, NagerDateClient, StatutoryHolidaySource};
use crate::model::holiday::HolidayEvent;
use actix_web::{HttpResponse, web};
use chrono::{Datelike, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

/// Statutory source wired into the app: Nager.Date behind a moka cache.
pub type HolidaySource = CachedHolidaySource<NagerDateClient>;

/// Widest window a single request may ask for.
pub const MAX_WINDOW_YEARS: i32 = 30;

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct HolidayQuery {
    /// First year, default current year minus HOLIDAY_YEAR_SPAN
    pub from_year: Option<i32>,
    /// Last year (inclusive), default current year plus HOLIDAY_YEAR_SPAN
    pub to_year: Option<i32>,
    /// Include ceremonial (Pawukon) observances, default true
    pub ceremonial: Option<bool>,
    /// Include statutory holidays and fixed observances, default true
    pub statutory: Option<bool>,
}

#[derive(Serialize, ToSchema)]
pub struct HolidayResponse {
    #[schema(example = 2021)]
    pub from_year: i32,
    #[schema(example = 2031)]
    pub to_year: i32,
    pub events: Vec<HolidayEvent>,
}

/// Years a request may name at all.
pub const YEAR_BOUNDS: RangeInclusive<i32> = 1..=9999;

/// Largest `HOLIDAY_YEAR_SPAN` whose default window still fits in one request.
pub const MAX_YEAR_SPAN: i32 = (MAX_WINDOW_YEARS - 1) / 2;

fn resolve_window(
    query: &HolidayQuery,
    current_year: i32,
    span: i32,
) -> Result<RangeInclusive<i32>, AppError> {
    let span = span.clamp(0, MAX_YEAR_SPAN);
    let from = query.from_year.unwrap_or(current_year.saturating_sub(span));
    let to = query.to_year.unwrap_or(current_year.saturating_add(span));

    if !YEAR_BOUNDS.contains(&from) || !YEAR_BOUNDS.contains(&to) {
        return Err(AppError::bad_request(format!(
            "Years must lie between {} and {}",
            YEAR_BOUNDS.start(),
            YEAR_BOUNDS.end()
        )));
    }
    if from > to {
        return Err(AppError::bad_request("from_year cannot be after to_year"));
    }
    if i64::from(to) - i64::from(from) + 1 > i64::from(MAX_WINDOW_YEARS) {
        return Err(AppError::bad_request(format!(
            "At most {MAX_WINDOW_YEARS} years per request"
        )));
    }
    Ok(from..=to)
}

/// Projects the window, skipping the network entirely when statutory
/// holidays are hidden.
pub async fn project_window<S: StatutoryHolidaySource>(
    source: &S,
    country: &str,
    window: &RangeInclusive<i32>,
    show_ceremonial: bool,
    show_statutory: bool,
) -> Vec<HolidayEvent> {
    let projector = HolidayProjector::new(CeremonialCycle::pawukon(), source, country);

    let projection = if show_statutory {
        projector.project(window).await
    } else {
        HolidayProjection {
            ceremonial: projector.project_ceremonial(window),
            statutory: Vec::new(),
        }
    };

    projection.merged(show_ceremonial, show_statutory)
}

/// Holiday and observance markers for the calendar
#[utoipa::path(
    get,
    path = "/api/v1/holidays",
    params(HolidayQuery),
    responses(
        (status = 200, description = "Holiday markers ordered by date", body = HolidayResponse),
        (status = 400, description = "Invalid year window"),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Holiday"
)]
pub async fn list_holidays(
    _auth: AuthUser,
    config: web::Data<Config>,
    source: web::Data<HolidaySource>,
    query: web::Query<HolidayQuery>,
) -> Result<HttpResponse, AppError> {
    let window = resolve_window(&query, Utc::now().year(), config.holiday_year_span)?;

    let events = project_window(
        source.get_ref(),
        &config.holiday_country,
        &window,
        query.ceremonial.unwrap_or(true),
        query.statutory.unwrap_or(true),
    )
    .await;

    Ok(HttpResponse::Ok().json(HolidayResponse {
        from_year: *window.start(),
        to_year: *window.end(),
        events,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::holiday::statutory::{HolidayFetchError, StatutoryHoliday};
    use crate::model::holiday::HolidayCategory;
    use chrono::NaiveDate;
    use std::cell::Cell;

    struct OneDayFeed {
        calls: Cell<usize>,
    }

    impl StatutoryHolidaySource for OneDayFeed {
        async fn fetch(
            &self,
            year: i32,
            _country: &str,
        ) -> Result<Vec<StatutoryHoliday>, HolidayFetchError> {
            self.calls.set(self.calls.get() + 1);
            Ok(vec![StatutoryHoliday {
                date: NaiveDate::from_ymd_opt(year, 3, 29).unwrap(),
                local_name: "Hari Suci Nyepi".into(),
            }])
        }
    }

    #[test]
    fn default_window_is_current_year_plus_minus_span() {
        let window = resolve_window(&HolidayQuery::default(), 2026, 5).unwrap();
        assert_eq!(window, 2021..=2031);
    }

    #[test]
    fn explicit_bounds_are_validated() {
        let query = HolidayQuery { from_year: Some(2027), to_year: Some(2025), ..Default::default() };
        assert!(resolve_window(&query, 2026, 5).is_err());

        let query = HolidayQuery { from_year: Some(2000), to_year: Some(2040), ..Default::default() };
        assert!(resolve_window(&query, 2026, 5).is_err());

        let query = HolidayQuery { from_year: Some(2025), ..Default::default() };
        assert_eq!(resolve_window(&query, 2026, 1).unwrap(), 2025..=2027);
    }

    #[test]
    fn extreme_years_are_rejected_not_overflowed() {
        let query = HolidayQuery {
            from_year: Some(i32::MIN),
            to_year: Some(i32::MAX),
            ..Default::default()
        };
        assert!(matches!(resolve_window(&query, 2026, 5), Err(AppError::BadRequest(_))));

        let query = HolidayQuery { to_year: Some(i32::MAX), ..Default::default() };
        assert!(matches!(resolve_window(&query, 2026, 5), Err(AppError::BadRequest(_))));

        // defaults near the edge of i32 saturate, then fail the bounds check
        assert!(resolve_window(&HolidayQuery::default(), i32::MAX, 5).is_err());
    }

    #[test]
    fn oversized_span_still_gives_a_valid_default_window() {
        let window = resolve_window(&HolidayQuery::default(), 2026, 40).unwrap();
        assert_eq!(window, 2012..=2040);
        assert!(window.end() - window.start() + 1 <= MAX_WINDOW_YEARS);
    }

    #[actix_web::test]
    async fn hidden_statutory_skips_the_feed() {
        let feed = OneDayFeed { calls: Cell::new(0) };
        let events = project_window(&feed, "ID", &(2025..=2026), true, false).await;
        assert_eq!(feed.calls.get(), 0);
        assert!(events.iter().all(|e| e.category == HolidayCategory::Ceremonial));
    }

    #[actix_web::test]
    async fn both_layers_merge_in_date_order() {
        let feed = OneDayFeed { calls: Cell::new(0) };
        let events = project_window(&feed, "ID", &(2025..=2025), true, true).await;
        assert_eq!(feed.calls.get(), 1);
        assert!(events.iter().any(|e| e.title == "Hari Suci Nyepi"));
        assert!(events.iter().any(|e| e.title == "Hari Raya Kuningan"));
        assert!(events.windows(2).all(|w| w[0].date <= w[1].date));
    }
}
