//! Projection of the 210-day Pawukon cycle onto the Gregorian calendar.
//!
//! Every observance is a fixed day offset from one Galungan instance, so a
//! projection is just `reference + i * cycle + offset` over a range of cycle
//! indices, filtered to the requested years.

use std::collections::HashSet;
use std::ops::RangeInclusive;

use chrono::{Datelike, Duration, NaiveDate};
use once_cell::sync::Lazy;

use crate::model::holiday::{HolidayCategory, HolidayEvent};

/// Hari Raya Galungan, 12 February 2025.
pub static REFERENCE_GALUNGAN: Lazy<NaiveDate> =
    Lazy::new(|| NaiveDate::from_ymd_opt(2025, 2, 12).expect("valid reference date"));

pub const CYCLE_LENGTH_DAYS: i64 = 210;

/// Cycle indices always scanned on each side of the reference instance.
/// Only ever widened by `CeremonialCycle::index_range`.
pub const MIN_CYCLE_INDEX: i64 = 15;

/// (title, days relative to the same Galungan instance)
pub const PAWUKON_OFFSETS: &[(&str, i64)] = &[
    ("Hari Raya Saraswati", -35),
    ("Banyu Pinaruh", -34),
    ("Hari Raya Pagerwesi", -31),
    ("Sugihan Jawa", -6),
    ("Sugihan Bali", -5),
    ("Penampahan Galungan", -1),
    ("Hari Raya Galungan", 0),
    ("Umanis Galungan", 1),
    ("Pemacekan Agung", 5),
    ("Hari Raya Kuningan", 10),
];

#[derive(Debug, Clone)]
pub struct CeremonialCycle<'a> {
    reference: NaiveDate,
    cycle_length_days: i64,
    offsets: &'a [(&'a str, i64)],
}

impl CeremonialCycle<'static> {
    pub fn pawukon() -> Self {
        Self::new(*REFERENCE_GALUNGAN, CYCLE_LENGTH_DAYS, PAWUKON_OFFSETS)
    }
}

impl<'a> CeremonialCycle<'a> {
    pub fn new(reference: NaiveDate, cycle_length_days: i64, offsets: &'a [(&'a str, i64)]) -> Self {
        Self {
            reference,
            cycle_length_days: cycle_length_days.max(1),
            offsets,
        }
    }

    /// Every observance whose date falls in `years`, one event per distinct
    /// (title, date).
    pub fn project(&self, years: &RangeInclusive<i32>) -> Vec<HolidayEvent> {
        if years.is_empty() || self.offsets.is_empty() {
            return Vec::new();
        }

        let mut seen = HashSet::new();
        let mut events = Vec::new();

        for i in self.index_range(years) {
            let base = i * self.cycle_length_days;
            for &(title, offset) in self.offsets {
                let Some(date) = self
                    .reference
                    .checked_add_signed(Duration::days(base + offset))
                else {
                    continue;
                };
                if !years.contains(&date.year()) {
                    continue;
                }
                let event = HolidayEvent::new(title, date, HolidayCategory::Ceremonial);
                if seen.insert(event.id.clone()) {
                    events.push(event);
                }
            }
        }

        events
    }

    /// Cycle indices covering `years`, never narrower than
    /// `-MIN_CYCLE_INDEX..=MIN_CYCLE_INDEX`.
    fn index_range(&self, years: &RangeInclusive<i32>) -> RangeInclusive<i64> {
        let default = -MIN_CYCLE_INDEX..=MIN_CYCLE_INDEX;

        let (Some(first), Some(last)) = (
            NaiveDate::from_ymd_opt(*years.start(), 1, 1),
            NaiveDate::from_ymd_opt(*years.end(), 12, 31),
        ) else {
            return default;
        };

        let min_offset = self.offsets.iter().map(|(_, o)| *o).min().unwrap_or(0);
        let max_offset = self.offsets.iter().map(|(_, o)| *o).max().unwrap_or(0);
        let len = self.cycle_length_days;

        // smallest i with reference + i*len + max_offset >= first
        let lo = (first - self.reference).num_days() - max_offset;
        let lo = lo.div_euclid(len);
        // largest i with reference + i*len + min_offset <= last
        let hi = (last - self.reference).num_days() - min_offset;
        let hi = hi.div_euclid(len) + 1;

        lo.min(*default.start())..=hi.max(*default.end())
    }
}
