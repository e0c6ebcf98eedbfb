use std::time::Duration;

use chrono::NaiveDate;
use derive_more::Display;
use moka::future::Cache;
use reqwest::Client;
use serde::Deserialize;

use crate::model::holiday::{HolidayCategory, HolidayEvent};

/// One entry of the public holiday feed. Extra fields in the payload are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatutoryHoliday {
    pub date: NaiveDate,
    pub local_name: String,
}

#[derive(Debug, Display)]
pub enum HolidayFetchError {
    #[display(fmt = "holiday feed request failed: {}", _0)]
    Http(reqwest::Error),
    #[display(fmt = "holiday feed answered with status {}", _0)]
    Status(u16),
}

impl std::error::Error for HolidayFetchError {}

impl From<reqwest::Error> for HolidayFetchError {
    fn from(e: reqwest::Error) -> Self {
        HolidayFetchError::Http(e)
    }
}

/// Per-year source of government-declared holidays.
pub trait StatutoryHolidaySource {
    async fn fetch(&self, year: i32, country: &str)
    -> Result<Vec<StatutoryHoliday>, HolidayFetchError>;
}

/// Observances added every year on a fixed month/day, independent of the feed.
pub const ADDITIONAL_OBSERVANCES: &[(&str, u32, u32)] = &[
    ("Hari Kartini", 4, 21),
    ("Hari Pendidikan Nasional", 5, 2),
    ("Hari Kebangkitan Nasional", 5, 20),
    ("Hari Kesaktian Pancasila", 10, 1),
    ("Hari Sumpah Pemuda", 10, 28),
    ("Hari Pahlawan", 11, 10),
    ("Hari Ibu", 12, 22),
];

pub fn additional_observances(year: i32) -> Vec<HolidayEvent> {
    ADDITIONAL_OBSERVANCES
        .iter()
        .filter_map(|&(title, month, day)| {
            NaiveDate::from_ymd_opt(year, month, day)
                .map(|date| HolidayEvent::new(title, date, HolidayCategory::Statutory))
        })
        .collect()
}

/* =========================
Nager.Date HTTP client
========================= */
pub struct NagerDateClient {
    client: Client,
    base_url: String,
}

impl NagerDateClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, year: i32, country: &str) -> String {
        format!("{}/api/v3/PublicHolidays/{}/{}", self.base_url, year, country)
    }
}

impl StatutoryHolidaySource for NagerDateClient {
    async fn fetch(
        &self,
        year: i32,
        country: &str,
    ) -> Result<Vec<StatutoryHoliday>, HolidayFetchError> {
        let response = self.client.get(self.url(year, country)).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(HolidayFetchError::Status(status.as_u16()));
        }

        Ok(response.json::<Vec<StatutoryHoliday>>().await?)
    }
}

/* =========================
Cache in front of any source
========================= */
/// Remembers successful fetches per (year, country). Failures are not cached,
/// so the next projection retries that year.
pub struct CachedHolidaySource<S> {
    inner: S,
    cache: Cache<(i32, String), Vec<StatutoryHoliday>>,
}

impl<S> CachedHolidaySource<S> {
    pub fn new(inner: S, ttl: Duration) -> Self {
        Self {
            inner,
            cache: Cache::builder()
                .max_capacity(256)
                .time_to_live(ttl)
                .build(),
        }
    }
}

impl<S: StatutoryHolidaySource> StatutoryHolidaySource for CachedHolidaySource<S> {
    async fn fetch(
        &self,
        year: i32,
        country: &str,
    ) -> Result<Vec<StatutoryHoliday>, HolidayFetchError> {
        let key = (year, country.to_uppercase());
        if let Some(hit) = self.cache.get(&key).await {
            return Ok(hit);
        }

        let holidays = self.inner.fetch(year, country).await?;
        self.cache.insert(key, holidays.clone()).await;
        Ok(holidays)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingSource {
        calls: AtomicUsize,
        fail: bool,
    }

    impl StatutoryHolidaySource for CountingSource {
        async fn fetch(
            &self,
            year: i32,
            _country: &str,
        ) -> Result<Vec<StatutoryHoliday>, HolidayFetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(HolidayFetchError::Status(503));
            }
            Ok(vec![StatutoryHoliday {
                date: NaiveDate::from_ymd_opt(year, 8, 17).unwrap(),
                local_name: "Hari Proklamasi Kemerdekaan R.I.".into(),
            }])
        }
    }

    #[test]
    fn extras_cover_every_entry_for_the_year() {
        let events = additional_observances(2026);
        assert_eq!(events.len(), ADDITIONAL_OBSERVANCES.len());
        assert!(events.iter().all(|e| e.category == HolidayCategory::Statutory));
        assert!(events.iter().any(|e| e.title == "Hari Kartini"
            && e.date == NaiveDate::from_ymd_opt(2026, 4, 21).unwrap()));
    }

    #[test]
    fn feed_payload_deserializes_with_extra_fields() {
        let body = r#"[{"date":"2025-08-17","localName":"Hari Ulang Tahun Kemerdekaan Republik Indonesia",
            "name":"Independence Day","countryCode":"ID","fixed":true,"global":true,
            "counties":null,"launchYear":null,"types":["Public"]}]"#;
        let parsed: Vec<StatutoryHoliday> = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].date, NaiveDate::from_ymd_opt(2025, 8, 17).unwrap());
        assert!(parsed[0].local_name.starts_with("Hari Ulang Tahun"));
    }

    #[test]
    fn client_builds_feed_url_without_double_slash() {
        let client = NagerDateClient::new("https://date.nager.at/", Duration::from_secs(1)).unwrap();
        assert_eq!(client.url(2025, "ID"), "https://date.nager.at/api/v3/PublicHolidays/2025/ID");
    }

    #[actix_web::test]
    async fn cache_serves_repeat_years_from_memory() {
        let source = CachedHolidaySource::new(
            CountingSource { calls: AtomicUsize::new(0), fail: false },
            Duration::from_secs(60),
        );

        let first = source.fetch(2025, "ID").await.unwrap();
        let second = source.fetch(2025, "id").await.unwrap();
        assert_eq!(first, second);
        assert_eq!(source.inner.calls.load(Ordering::SeqCst), 1);

        source.fetch(2026, "ID").await.unwrap();
        assert_eq!(source.inner.calls.load(Ordering::SeqCst), 2);
    }

    #[actix_web::test]
    async fn cache_does_not_remember_failures() {
        let source = CachedHolidaySource::new(
            CountingSource { calls: AtomicUsize::new(0), fail: true },
            Duration::from_secs(60),
        );

        assert!(matches!(source.fetch(2025, "ID").await, Err(HolidayFetchError::Status(503))));
        assert!(source.fetch(2025, "ID").await.is_err());
        assert_eq!(source.inner.calls.load(Ordering::SeqCst), 2);
    }
}
