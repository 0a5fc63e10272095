//! Billing period arithmetic and the upgrade proration computation.
//!
//! Month and year intervals use calendar addition (day-of-month preserved
//! where valid, clamped otherwise); day and week intervals are fixed
//! 24h multiples; one_time periods are zero-length.

use chrono::{DateTime, Duration, Months, Utc};
use thiserror::Error;

use crate::models::IntervalKind;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProrationError {
    /// The billing period spans less than one whole day, so a daily rate
    /// cannot be computed.
    #[error("the billing period spans less than one whole day")]
    EmptyPeriod,

    /// No whole days remain before the current period end.
    #[error("the current billing period has already ended")]
    PeriodEnded,

    /// Adding the interval to the period start overflows the calendar.
    #[error("billing period end is out of range")]
    PeriodOutOfRange,
}

/// Compute the end of a billing period starting at `start`.
pub fn period_end(
    start: DateTime<Utc>,
    kind: IntervalKind,
    count: i32,
) -> Result<DateTime<Utc>, ProrationError> {
    let end = match kind {
        IntervalKind::OneTime => Some(start),
        IntervalKind::Day => start.checked_add_signed(Duration::days(count as i64)),
        IntervalKind::Week => start.checked_add_signed(Duration::weeks(count as i64)),
        IntervalKind::Month => start.checked_add_months(Months::new(count as u32)),
        IntervalKind::Year => start.checked_add_months(Months::new(count as u32 * 12)),
    };
    end.ok_or(ProrationError::PeriodOutOfRange)
}

/// Compute the amount due on the new subscription when upgrading away from a
/// period that runs `period_start..period_end` with `amount_paid` on it.
///
/// The daily rate is real-valued; day counts truncate toward zero; the final
/// amount truncates toward zero and may be negative when the remaining credit
/// exceeds the new price. Negative results are deliberately not clamped.
pub fn prorated_amount(
    period_start: DateTime<Utc>,
    period_end: DateTime<Utc>,
    now: DateTime<Utc>,
    amount_paid: i64,
    new_price_amount: i64,
) -> Result<i64, ProrationError> {
    let total_days = (period_end - period_start).num_days();
    if total_days == 0 {
        return Err(ProrationError::EmptyPeriod);
    }

    let daily_rate = amount_paid as f64 / total_days as f64;

    let days_left = (period_end - now).num_days();
    if days_left <= 0 {
        return Err(ProrationError::PeriodEnded);
    }

    Ok((new_price_amount as f64 - daily_rate * days_left as f64) as i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn utc(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 30, 0).unwrap()
    }

    #[test]
    fn one_time_period_is_zero_length() {
        let start = utc(2025, 3, 10, 9);
        assert_eq!(period_end(start, IntervalKind::OneTime, 0), Ok(start));
    }

    #[test]
    fn day_and_week_are_fixed_duration() {
        let start = utc(2025, 3, 10, 9);
        assert_eq!(
            period_end(start, IntervalKind::Day, 10),
            Ok(utc(2025, 3, 20, 9))
        );
        assert_eq!(
            period_end(start, IntervalKind::Week, 2),
            Ok(utc(2025, 3, 24, 9))
        );
    }

    #[test]
    fn month_addition_preserves_day_of_month() {
        let start = utc(2025, 3, 15, 9);
        assert_eq!(
            period_end(start, IntervalKind::Month, 1),
            Ok(utc(2025, 4, 15, 9))
        );
    }

    #[test]
    fn month_addition_clamps_at_month_end() {
        // Jan 31 + 1 month lands on the last day of February.
        let start = utc(2025, 1, 31, 9);
        assert_eq!(
            period_end(start, IntervalKind::Month, 1),
            Ok(utc(2025, 2, 28, 9))
        );

        let leap_start = utc(2024, 1, 31, 9);
        assert_eq!(
            period_end(leap_start, IntervalKind::Month, 1),
            Ok(utc(2024, 2, 29, 9))
        );
    }

    #[test]
    fn year_addition_clamps_leap_day() {
        let start = utc(2024, 2, 29, 9);
        assert_eq!(
            period_end(start, IntervalKind::Year, 1),
            Ok(utc(2025, 2, 28, 9))
        );
    }

    #[test]
    fn prorates_half_of_a_thirty_day_period() {
        // 1000 paid over 30 days, 15 whole days left, new price 2000:
        // 2000 - (1000/30)*15 = 1500
        let start = utc(2025, 6, 1, 0);
        let end = utc(2025, 7, 1, 0);
        let now = utc(2025, 6, 16, 0) - Duration::hours(1);
        assert_eq!(prorated_amount(start, end, now, 1000, 2000), Ok(1500));
    }

    #[test]
    fn truncates_toward_zero() {
        // 29 of 30 days left on 1000: rate 33.33.., credit 966.66..
        // 2000 - 966.66 = 1033.33 -> 1033
        let start = utc(2025, 6, 1, 0);
        let end = utc(2025, 7, 1, 0);
        let now = start + Duration::hours(1);
        assert_eq!(prorated_amount(start, end, now, 1000, 2000), Ok(1033));
    }

    #[test]
    fn negative_credit_is_preserved() {
        // Remaining credit exceeds the new price; result stays negative.
        let start = utc(2025, 6, 1, 0);
        let end = utc(2025, 7, 1, 0);
        let now = start + Duration::hours(1);
        // 2000 - (10000/30)*29 = -7666.66.. -> -7666
        let amount = prorated_amount(start, end, now, 10000, 2000).unwrap();
        assert_eq!(amount, -7666);
    }

    #[test]
    fn zero_length_period_is_rejected() {
        let start = utc(2025, 6, 1, 0);
        assert_eq!(
            prorated_amount(start, start, start, 1000, 2000),
            Err(ProrationError::EmptyPeriod)
        );
    }

    #[test]
    fn ended_period_is_rejected() {
        let start = utc(2025, 6, 1, 0);
        let end = utc(2025, 7, 1, 0);
        assert_eq!(
            prorated_amount(start, end, end, 1000, 2000),
            Err(ProrationError::PeriodEnded)
        );
        assert_eq!(
            prorated_amount(start, end, end + Duration::days(3), 1000, 2000),
            Err(ProrationError::PeriodEnded)
        );
        // Less than one whole day left truncates to zero days and is
        // treated as ended.
        assert_eq!(
            prorated_amount(start, end, end - Duration::hours(5), 1000, 2000),
            Err(ProrationError::PeriodEnded)
        );
    }
}
