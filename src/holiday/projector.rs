use std::collections::HashSet;
use std::ops::RangeInclusive;

use futures::future::join_all;
use serde::Serialize;
use tracing::{debug, warn};
use utoipa::ToSchema;

use crate::holiday::ceremonial::CeremonialCycle;
use crate::holiday::statutory::{StatutoryHolidaySource, additional_observances};
use crate::model::holiday::{HolidayCategory, HolidayEvent};

/// Both halves of a projection; neither is ordered.
#[derive(Debug, Default, Serialize, ToSchema)]
pub struct HolidayProjection {
    pub ceremonial: Vec<HolidayEvent>,
    pub statutory: Vec<HolidayEvent>,
}

impl HolidayProjection {
    /// Applies the calendar's visibility toggles and orders by date for display.
    pub fn merged(self, show_ceremonial: bool, show_statutory: bool) -> Vec<HolidayEvent> {
        let mut events = Vec::new();
        if show_ceremonial {
            events.extend(self.ceremonial);
        }
        if show_statutory {
            events.extend(self.statutory);
        }
        events.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.title.cmp(&b.title)));
        events
    }
}

pub struct HolidayProjector<'a, S> {
    cycle: CeremonialCycle<'a>,
    source: &'a S,
    country: &'a str,
}

impl<'a, S: StatutoryHolidaySource> HolidayProjector<'a, S> {
    pub fn new(cycle: CeremonialCycle<'a>, source: &'a S, country: &'a str) -> Self {
        Self {
            cycle,
            source,
            country,
        }
    }

    /// Pure arithmetic; cannot fail.
    pub fn project_ceremonial(&self, years: &RangeInclusive<i32>) -> Vec<HolidayEvent> {
        self.cycle.project(years)
    }

    /// Fetches every year of the window concurrently. A year whose fetch fails
    /// contributes only the fixed extras.
    pub async fn project_statutory(&self, years: &RangeInclusive<i32>) -> Vec<HolidayEvent> {
        let per_year = join_all(years.clone().map(|year| self.statutory_for_year(year))).await;

        let mut seen = HashSet::new();
        per_year
            .into_iter()
            .flatten()
            .filter(|event| seen.insert(event.id.clone()))
            .collect()
    }

    pub async fn project(&self, years: &RangeInclusive<i32>) -> HolidayProjection {
        HolidayProjection {
            ceremonial: self.project_ceremonial(years),
            statutory: self.project_statutory(years).await,
        }
    }

    async fn statutory_for_year(&self, year: i32) -> Vec<HolidayEvent> {
        let mut events = match self.source.fetch(year, self.country).await {
            Ok(holidays) => {
                debug!(year, count = holidays.len(), "statutory holidays fetched");
                holidays
                    .into_iter()
                    .map(|h| HolidayEvent::new(&h.local_name, h.date, HolidayCategory::Statutory))
                    .collect()
            }
            Err(e) => {
                warn!(error = %e, year, country = self.country, "statutory holiday fetch failed");
                Vec::new()
            }
        };
        events.extend(additional_observances(year));
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::holiday::statutory::{ADDITIONAL_OBSERVANCES, HolidayFetchError, StatutoryHoliday};
    use chrono::{Datelike, NaiveDate};
    use std::collections::HashMap;

    /// Serves canned years; anything missing answers 500.
    struct FakeFeed {
        years: HashMap<i32, Vec<StatutoryHoliday>>,
    }

    impl FakeFeed {
        fn with_years(years: &[i32]) -> Self {
            let years = years
                .iter()
                .map(|&y| {
                    (
                        y,
                        vec![
                            StatutoryHoliday {
                                date: NaiveDate::from_ymd_opt(y, 1, 1).unwrap(),
                                local_name: "Tahun Baru Masehi".into(),
                            },
                            StatutoryHoliday {
                                date: NaiveDate::from_ymd_opt(y, 8, 17).unwrap(),
                                local_name: "Hari Kemerdekaan".into(),
                            },
                        ],
                    )
                })
                .collect();
            Self { years }
        }
    }

    impl StatutoryHolidaySource for FakeFeed {
        async fn fetch(
            &self,
            year: i32,
            _country: &str,
        ) -> Result<Vec<StatutoryHoliday>, HolidayFetchError> {
            self.years
                .get(&year)
                .cloned()
                .ok_or(HolidayFetchError::Status(500))
        }
    }

    fn projector(feed: &FakeFeed) -> HolidayProjector<'_, FakeFeed> {
        HolidayProjector::new(CeremonialCycle::pawukon(), feed, "ID")
    }

    #[actix_web::test]
    async fn failed_year_keeps_other_years_and_all_extras() {
        let feed = FakeFeed::with_years(&[2026]);
        let events = projector(&feed).project_statutory(&(2025..=2026)).await;

        let fetched: Vec<_> = events
            .iter()
            .filter(|e| e.title == "Hari Kemerdekaan" || e.title == "Tahun Baru Masehi")
            .collect();
        assert_eq!(fetched.len(), 2);
        assert!(fetched.iter().all(|e| e.date.year() == 2026));

        for year in [2025, 2026] {
            let extras = events
                .iter()
                .filter(|e| e.date.year() == year && e.title == "Hari Pahlawan")
                .count();
            assert_eq!(extras, 1, "extras missing for {year}");
        }
        assert_eq!(events.len(), 2 + 2 * ADDITIONAL_OBSERVANCES.len());
        assert!(events.iter().all(|e| e.category == HolidayCategory::Statutory));
    }

    #[actix_web::test]
    async fn every_year_failing_still_yields_extras() {
        let feed = FakeFeed::with_years(&[]);
        let events = projector(&feed).project_statutory(&(2024..=2026)).await;
        assert_eq!(events.len(), 3 * ADDITIONAL_OBSERVANCES.len());
    }

    #[actix_web::test]
    async fn feed_entries_matching_extras_are_not_duplicated() {
        let mut feed = FakeFeed::with_years(&[]);
        feed.years.insert(
            2025,
            vec![StatutoryHoliday {
                date: NaiveDate::from_ymd_opt(2025, 12, 22).unwrap(),
                local_name: "Hari Ibu".into(),
            }],
        );
        let events = projector(&feed).project_statutory(&(2025..=2025)).await;
        assert_eq!(events.iter().filter(|e| e.title == "Hari Ibu").count(), 1);
    }

    #[actix_web::test]
    async fn merged_respects_toggles_and_sorts_by_date() {
        let feed = FakeFeed::with_years(&[2025]);
        let p = projector(&feed);

        let all = p.project(&(2025..=2025)).await.merged(true, true);
        assert!(all.windows(2).all(|w| w[0].date <= w[1].date));
        assert!(all.iter().any(|e| e.category == HolidayCategory::Ceremonial));
        assert!(all.iter().any(|e| e.category == HolidayCategory::Statutory));

        let only_ceremonial = p.project(&(2025..=2025)).await.merged(true, false);
        assert!(only_ceremonial.iter().all(|e| e.category == HolidayCategory::Ceremonial));

        assert!(p.project(&(2025..=2025)).await.merged(false, false).is_empty());
    }
}
