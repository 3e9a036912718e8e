//! Price reconciliation for the guest-details screen.
//!
//! The backend reports a list of date-ranged prices (optionally grouped per room)
//! and, separately, an authoritative total. The gap between the two is shown as
//! taxes and fees.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::models::{BreakdownEntry, RoomBreakdown};

const SECONDS_PER_DAY: i64 = 86_400;

/// Whole nights between two calendar dates, never negative.
pub fn nights_between(check_in: NaiveDate, check_out: NaiveDate) -> u32 {
    let days = (check_out - check_in).num_days();
    u32::try_from(days).unwrap_or(0)
}

/// Nights covered by a span, rounding any partial day up. Spans that run
/// backwards count as zero.
pub fn nights_spanned(from: NaiveDateTime, to: NaiveDateTime) -> u32 {
    let seconds = (to - from).num_seconds();
    if seconds <= 0 {
        return 0;
    }
    let nights = (seconds + SECONDS_PER_DAY - 1) / SECONDS_PER_DAY;
    u32::try_from(nights).unwrap_or(u32::MAX)
}

/// Accepts `YYYY-MM-DD`, naive date-times, and RFC 3339 timestamps.
pub fn parse_stay_date(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0);
    }
    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(dt);
        }
    }
    DateTime::parse_from_rfc3339(raw).ok().map(|dt| dt.naive_utc())
}

fn entry_nights(entry: &BreakdownEntry) -> Option<u32> {
    let from = parse_stay_date(&entry.from_date)?;
    let to = parse_stay_date(&entry.to_date)?;
    Some(nights_spanned(from, to))
}

/// Validated breakdown data. Anything short of a successful, non-empty response
/// is `Unavailable`.
#[derive(Debug, Clone, PartialEq)]
pub enum BreakdownOutcome {
    Available(Vec<RoomBreakdown>),
    Unavailable,
}

impl BreakdownOutcome {
    pub fn from_rooms(rooms: Vec<RoomBreakdown>) -> Self {
        if rooms.iter().all(|r| r.breakdown.is_empty()) {
            BreakdownOutcome::Unavailable
        } else {
            BreakdownOutcome::Available(rooms)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceStatus {
    Reconciled,
    // No usable breakdown yet; amounts are zero and must not be shown as a free stay
    Pending,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceSummary {
    pub status: PriceStatus,
    pub subtotal: Decimal,
    pub taxes: Decimal,
    pub total: Decimal,
    pub currency: String,
    pub nights: u32,
    pub per_night: Decimal,
    pub mixed_currencies: bool,
}

impl PriceSummary {
    fn pending(nights: u32, default_currency: &str) -> Self {
        Self {
            status: PriceStatus::Pending,
            subtotal: Decimal::ZERO,
            taxes: Decimal::ZERO,
            total: Decimal::ZERO,
            currency: default_currency.to_string(),
            nights,
            per_night: Decimal::ZERO,
            mixed_currencies: false,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == PriceStatus::Pending
    }
}

/// Builds the price summary.
///
/// An entry whose own range covers more than one night is taken as a nightly
/// rate for the whole stay and multiplied by `nights`; single-night entries are
/// summed as they are. Currencies are never converted: when rooms disagree the
/// first entry's currency wins and `mixed_currencies` is set.
pub fn reconcile(
    breakdown: &BreakdownOutcome,
    authoritative_total: Decimal,
    nights: u32,
    default_currency: &str,
) -> PriceSummary {
    let rooms = match breakdown {
        BreakdownOutcome::Available(rooms) if rooms.iter().any(|r| !r.breakdown.is_empty()) => rooms,
        _ => return PriceSummary::pending(nights, default_currency),
    };

    let stay_nights = Decimal::from(nights);
    let mut subtotal = Decimal::ZERO;
    let mut currencies: Vec<&str> = Vec::new();

    for room in rooms {
        for entry in &room.breakdown {
            let price = match entry_nights(entry) {
                Some(n) if n > 1 => entry.price * stay_nights,
                _ => entry.price,
            };
            subtotal += price;

            if let Some(currency) = entry.currency.as_deref().or(room.currency.as_deref()) {
                if !currencies.contains(&currency) {
                    currencies.push(currency);
                }
            }
        }
    }

    let mixed_currencies = currencies.len() > 1;
    if mixed_currencies {
        tracing::warn!(?currencies, "Price breakdown mixes currencies; amounts are summed unconverted");
    }

    let taxes = (authoritative_total - subtotal).max(Decimal::ZERO);
    let per_night = if nights == 0 {
        Decimal::ZERO
    } else {
        (subtotal / stay_nights).round_dp(2)
    };

    PriceSummary {
        status: PriceStatus::Reconciled,
        subtotal,
        taxes,
        total: subtotal + taxes,
        currency: currencies.first().map_or_else(|| default_currency.to_string(), |c| c.to_string()),
        nights,
        per_night,
        mixed_currencies,
    }
}

/// The nights × rate figure shown while the reconciled price is still pending.
pub fn naive_estimate(per_night: Decimal, nights: u32) -> Decimal {
    per_night * Decimal::from(nights)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(from: &str, to: &str, price: i64, currency: &str) -> BreakdownEntry {
        BreakdownEntry {
            from_date: from.into(),
            to_date: to.into(),
            price: Decimal::from(price),
            currency: Some(currency.into()),
        }
    }

    fn room(entries: Vec<BreakdownEntry>) -> RoomBreakdown {
        RoomBreakdown { room: None, currency: None, breakdown: entries }
    }

    #[test]
    fn nights_round_partial_days_up_and_never_go_negative() {
        let d = |s| NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap();
        assert_eq!(nights_between(d("2025-01-01"), d("2025-01-04")), 3);
        assert_eq!(nights_between(d("2025-01-04"), d("2025-01-01")), 0);

        let from = parse_stay_date("2025-01-01T14:00:00").unwrap();
        let to = parse_stay_date("2025-01-03T11:00:00").unwrap();
        assert_eq!(nights_spanned(from, to), 2);
        assert_eq!(nights_spanned(to, from), 0);
        assert!(parse_stay_date("2025-01-03T11:00:00+02:00").is_some());
        assert!(parse_stay_date("soon").is_none());
    }

    #[test]
    fn taxes_are_the_gap_to_the_authoritative_total() {
        let breakdown = BreakdownOutcome::Available(vec![room(vec![
            entry("2025-01-01", "2025-01-02", 100, "USD"),
            entry("2025-01-02", "2025-01-03", 120, "USD"),
        ])]);
        let summary = reconcile(&breakdown, Decimal::from(250), 2, "USD");
        assert_eq!(summary.status, PriceStatus::Reconciled);
        assert_eq!(summary.subtotal, Decimal::from(220));
        assert_eq!(summary.taxes, Decimal::from(30));
        assert_eq!(summary.total, Decimal::from(250));
        assert_eq!(summary.per_night, Decimal::from(110));
    }

    #[test]
    fn taxes_never_go_negative() {
        let breakdown = BreakdownOutcome::Available(vec![room(vec![entry("2025-01-01", "2025-01-02", 300, "EUR")])]);
        let summary = reconcile(&breakdown, Decimal::from(250), 1, "USD");
        assert_eq!(summary.taxes, Decimal::ZERO);
        assert_eq!(summary.total, Decimal::from(300));
        assert_eq!(summary.currency, "EUR");
    }

    #[test]
    fn multi_night_entries_are_applied_to_the_whole_stay() {
        // one entry for a three-night range, priced per night
        let breakdown = BreakdownOutcome::Available(vec![room(vec![entry("2025-01-01", "2025-01-04", 90, "USD")])]);
        let summary = reconcile(&breakdown, Decimal::from(300), 3, "USD");
        assert_eq!(summary.subtotal, Decimal::from(270));
        assert_eq!(summary.taxes, Decimal::from(30));
    }

    #[test]
    fn rooms_are_summed_together() {
        let breakdown = BreakdownOutcome::Available(vec![
            room(vec![entry("2025-01-01", "2025-01-02", 80, "USD")]),
            room(vec![entry("2025-01-01", "2025-01-02", 60, "USD")]),
        ]);
        let summary = reconcile(&breakdown, Decimal::from(150), 1, "USD");
        assert_eq!(summary.subtotal, Decimal::from(140));
        assert_eq!(summary.total, Decimal::from(150));
        assert!(!summary.mixed_currencies);
    }

    #[test]
    fn missing_breakdown_is_pending_whatever_the_total() {
        for outcome in [BreakdownOutcome::Unavailable, BreakdownOutcome::Available(vec![room(vec![])])] {
            let summary = reconcile(&outcome, Decimal::from(999), 2, "USD");
            assert!(summary.is_pending());
            assert_eq!(summary.total, Decimal::ZERO);
            assert_eq!(summary.per_night, Decimal::ZERO);
            assert_eq!(summary.currency, "USD");
        }
        assert_eq!(BreakdownOutcome::from_rooms(vec![room(vec![])]), BreakdownOutcome::Unavailable);
    }

    #[test]
    fn zero_nights_does_not_divide() {
        let breakdown = BreakdownOutcome::Available(vec![room(vec![entry("2025-01-01", "2025-01-01", 50, "USD")])]);
        let summary = reconcile(&breakdown, Decimal::from(50), 0, "USD");
        assert_eq!(summary.per_night, Decimal::ZERO);
        assert_eq!(summary.subtotal, Decimal::from(50));
    }

    #[test]
    fn mixed_currencies_are_flagged_not_converted() {
        let breakdown = BreakdownOutcome::Available(vec![
            room(vec![entry("2025-01-01", "2025-01-02", 100, "USD")]),
            room(vec![entry("2025-01-01", "2025-01-02", 100, "EUR")]),
        ]);
        let summary = reconcile(&breakdown, Decimal::from(200), 1, "GBP");
        assert!(summary.mixed_currencies);
        assert_eq!(summary.currency, "USD");
        assert_eq!(summary.subtotal, Decimal::from(200));
    }

    #[test]
    fn naive_estimate_is_rate_times_nights() {
        assert_eq!(naive_estimate(Decimal::new(9950, 2), 3), Decimal::new(29850, 2));
    }
}
