//! Mission time axis conversions.
//!
//! Dataset time coordinates are stored in days since the mission epoch
//! (2018-01-01). Presentation layers usually want fractional calendar
//! years; the conversion uses the 365.25-day year the products themselves
//! are referenced to.

use chrono::{NaiveDate, NaiveDateTime};

/// Mission epoch as a fractional year.
pub const MISSION_EPOCH: f64 = 2018.0;

/// Days per year used by the product time axes.
pub const DAYS_PER_YEAR: f64 = 365.25;

/// Convert days since the mission epoch to fractional calendar years.
pub fn days_to_decimal_years(days: f64) -> f64 {
    MISSION_EPOCH + days / DAYS_PER_YEAR
}

/// Convert fractional calendar years back to days since the mission epoch.
pub fn decimal_years_to_days(years: f64) -> f64 {
    (years - MISSION_EPOCH) * DAYS_PER_YEAR
}

/// The mission epoch as a calendar datetime.
pub fn epoch_datetime() -> NaiveDateTime {
    // 2018-01-01T00:00:00 is a valid date
    NaiveDate::from_ymd_opt(2018, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .expect("valid mission epoch")
}
