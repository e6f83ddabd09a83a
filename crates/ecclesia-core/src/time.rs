//! Calendar helpers for billing periods and payroll proration

use chrono::{DateTime, Datelike, Duration, Months, NaiveDate, TimeZone, Utc};

/// Usage-metric bucket for the month containing `now`, as `YYYY-MM-01`
pub fn billing_period(now: DateTime<Utc>) -> String {
    format!("{:04}-{:02}-01", now.year(), now.month())
}

/// First instant of the month containing `now`
pub fn month_start(now: DateTime<Utc>) -> DateTime<Utc> {
    let first = NaiveDate::from_ymd_opt(now.year(), now.month(), 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap_or_else(|| now.naive_utc());
    Utc.from_utc_datetime(&first)
}

/// Last second of the month containing `now`
pub fn month_end(now: DateTime<Utc>) -> DateTime<Utc> {
    add_months(month_start(now), 1) - Duration::seconds(1)
}

/// Number of days in the month containing `date`
pub fn days_in_month(date: DateTime<Utc>) -> u32 {
    let start = month_start(date);
    let next = add_months(start, 1);
    (next - start).num_days() as u32
}

/// Add calendar months, clamping to the end of shorter months
pub fn add_months(date: DateTime<Utc>, months: u32) -> DateTime<Utc> {
    date.checked_add_months(Months::new(months))
        .unwrap_or(date + Duration::days(30 * i64::from(months)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 12, 30, 0).unwrap()
    }

    #[test]
    fn test_billing_period() {
        assert_eq!(billing_period(at(2024, 3, 17)), "2024-03-01");
        assert_eq!(billing_period(at(2025, 11, 1)), "2025-11-01");
    }

    #[test]
    fn test_days_in_month() {
        assert_eq!(days_in_month(at(2024, 2, 10)), 29);
        assert_eq!(days_in_month(at(2023, 2, 10)), 28);
        assert_eq!(days_in_month(at(2024, 12, 31)), 31);
        assert_eq!(days_in_month(at(2024, 4, 1)), 30);
    }

    #[test]
    fn test_month_bounds() {
        let now = at(2024, 2, 10);
        assert_eq!(month_start(now), Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap());
        assert_eq!(month_end(now), Utc.with_ymd_and_hms(2024, 2, 29, 23, 59, 59).unwrap());
    }

    #[test]
    fn test_add_months_clamps() {
        let jan31 = at(2024, 1, 31);
        assert_eq!(add_months(jan31, 1).day(), 29);
    }
}
