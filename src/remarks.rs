//! Best-effort extraction of hotel policy hints from remark strings.
//!
//! Remarks arrive as HTML-escaped markup mixed with free text. Nothing in this
//! module fails: a pattern that does not match simply leaves its field empty, and
//! the caller can always fall back to showing the raw text.

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;
use scraper::Html;
use serde::Serialize;
use std::str::FromStr;

const MIN_FRAGMENT_LEN: usize = 3;
const MIN_FEE_LEN: usize = 5;

static SEGMENT_BOUNDARY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)<br\s*/?>|\n|</?li[^>]*>|</?ul[^>]*>|</?p[^>]*>").expect("valid regex"));
static CHECK_IN_BEGIN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)CheckIn Time-Begin:?\s*([^<\n]+)").expect("valid regex"));
static CHECK_IN_END: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)CheckIn Time-End:?\s*([^<\n]+)").expect("valid regex"));
static CHECK_OUT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)CheckOut Time:?\s*([^<\n]+)").expect("valid regex"));
static MIN_AGE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)Minimum CheckIn Age:?\s*(\d+)").expect("valid regex"));
static OPTIONAL_FEES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)Optional Fees:?\s*(.*?)(?:<|\z)").expect("valid regex"));
static FEE_SEPARATOR: Lazy<Regex> = Lazy::new(|| Regex::new(r"[•\n]").expect("valid regex"));
static CARDS_ACCEPTED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)Cards Accepted:?\s*([^<\n]+)").expect("valid regex"));
static CANCELLATION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)starting\s*(?:from\s*)?:?\s*(\d{1,4}[-/.]\d{1,2}[-/.]\d{1,4})[^%]*?(\d+(?:\.\d+)?)\s*%")
        .expect("valid regex")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RemarkCategory {
    CheckIn,
    CheckOut,
    Fees,
    Payment,
    Pets,
    Age,
    Hours,
    Dining,
    Amenities,
    Transport,
    General,
}

impl RemarkCategory {
    // Checked in this order; the first keyword hit wins.
    const CLASSIFIED: [RemarkCategory; 10] = [
        RemarkCategory::CheckIn,
        RemarkCategory::CheckOut,
        RemarkCategory::Fees,
        RemarkCategory::Payment,
        RemarkCategory::Pets,
        RemarkCategory::Age,
        RemarkCategory::Hours,
        RemarkCategory::Dining,
        RemarkCategory::Amenities,
        RemarkCategory::Transport,
    ];

    fn keywords(self) -> &'static [&'static str] {
        match self {
            RemarkCategory::CheckIn => &["checkin", "check-in", "arrival"],
            RemarkCategory::CheckOut => &["checkout", "check-out", "departure"],
            RemarkCategory::Fees => &["fee", "charge", "deposit", "tax", "cost"],
            RemarkCategory::Payment => &["card", "payment", "cash", "credit", "debit"],
            RemarkCategory::Pets => &["pet", "animal", "dog", "cat"],
            RemarkCategory::Age => &["minimum", "age", "years"],
            RemarkCategory::Hours => &["hour", "time", "open", "close"],
            RemarkCategory::Dining => &["breakfast", "lunch", "dinner", "meal", "restaurant"],
            RemarkCategory::Amenities => &["wifi", "internet", "parking", "pool", "spa", "gym"],
            RemarkCategory::Transport => &["shuttle", "transport", "airport", "taxi"],
            RemarkCategory::General => &[],
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            RemarkCategory::CheckIn => "Check-in Information",
            RemarkCategory::CheckOut => "Check-out Information",
            RemarkCategory::Fees => "Fees & Charges",
            RemarkCategory::Payment => "Payment Information",
            RemarkCategory::Pets => "Pet Policy",
            RemarkCategory::Age => "Age Requirements",
            RemarkCategory::Hours => "Operating Hours",
            RemarkCategory::Dining => "Dining Information",
            RemarkCategory::Amenities => "Amenities",
            RemarkCategory::Transport => "Transportation",
            RemarkCategory::General => "Additional Information",
        }
    }

    pub fn classify(fragment: &str) -> Self {
        let lower = fragment.to_lowercase();
        Self::CLASSIFIED
            .into_iter()
            .find(|category| category.keywords().iter().any(|k| lower.contains(k)))
            .unwrap_or(RemarkCategory::General)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RemarkSection {
    pub category: RemarkCategory,
    pub title: &'static str,
    pub items: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PolicyInfo {
    pub check_in_begin: Option<String>,
    pub check_in_end: Option<String>,
    pub check_out: Option<String>,
    pub min_check_in_age: Option<u32>,
    pub optional_fees: Vec<String>,
    pub payment_methods: Vec<String>,
}

impl PolicyInfo {
    pub fn is_empty(&self) -> bool {
        *self == PolicyInfo::default()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CancellationClause {
    pub starting: String,
    // Parsed form of `starting`, when it is in a recognised date format
    pub starting_date: Option<NaiveDate>,
    pub percentage: Decimal,
}

pub fn decode_entities(raw: &str) -> String {
    html_escape::decode_html_entities(raw).into_owned()
}

/// Text content of a markup fragment with surrounding whitespace removed.
fn strip_markup(fragment: &str) -> String {
    if !fragment.contains('<') {
        return fragment.trim().to_string();
    }
    let parsed = Html::parse_fragment(fragment);
    parsed.root_element().text().collect::<String>().trim().to_string()
}

/// Splits remarks into display sections, merging neighbouring fragments of the
/// same category.
pub fn parse_remarks(raw: &str) -> Vec<RemarkSection> {
    if raw.trim().is_empty() {
        return Vec::new();
    }
    let decoded = decode_entities(raw);

    let mut sections: Vec<RemarkSection> = Vec::new();
    for fragment in SEGMENT_BOUNDARY.split(&decoded) {
        let clean = strip_markup(fragment);
        if clean.chars().count() < MIN_FRAGMENT_LEN {
            continue;
        }
        let category = RemarkCategory::classify(&clean);
        match sections.last_mut() {
            Some(current) if current.category == category => current.items.push(clean),
            _ => sections.push(RemarkSection { category, title: category.title(), items: vec![clean] }),
        }
    }
    sections
}

fn capture(pattern: &Regex, text: &str) -> Option<String> {
    pattern
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Pulls the well-known policy fields out of a remark string.
pub fn extract_policy_info(raw: &str) -> PolicyInfo {
    if raw.trim().is_empty() {
        return PolicyInfo::default();
    }
    let decoded = decode_entities(raw);

    let optional_fees = capture(&OPTIONAL_FEES, &decoded)
        .map(|fees| {
            FEE_SEPARATOR
                .split(&strip_markup(&fees))
                .map(str::trim)
                .filter(|fee| fee.chars().count() > MIN_FEE_LEN)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    let payment_methods = capture(&CARDS_ACCEPTED, &decoded)
        .map(|cards| {
            cards
                .split(',')
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    PolicyInfo {
        check_in_begin: capture(&CHECK_IN_BEGIN, &decoded),
        check_in_end: capture(&CHECK_IN_END, &decoded),
        check_out: capture(&CHECK_OUT, &decoded),
        min_check_in_age: capture(&MIN_AGE, &decoded).and_then(|age| age.parse().ok()),
        optional_fees,
        payment_methods,
    }
}

fn parse_clause_date(raw: &str) -> Option<NaiveDate> {
    ["%Y-%m-%d", "%d/%m/%Y", "%d-%m-%Y", "%d.%m.%Y", "%Y/%m/%d"]
        .into_iter()
        .find_map(|format| NaiveDate::parse_from_str(raw, format).ok())
}

/// Finds a "starting <date> ... <n>%" cancellation penalty clause.
pub fn extract_cancellation(raw: &str) -> Option<CancellationClause> {
    let decoded = decode_entities(raw);
    let captures = CANCELLATION.captures(&decoded)?;
    let starting = captures.get(1)?.as_str().to_string();
    let percentage = Decimal::from_str(captures.get(2)?.as_str()).ok()?;
    Some(CancellationClause {
        starting_date: parse_clause_date(&starting),
        starting,
        percentage,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const REMARKS: &str = "CheckIn Time-Begin: 2:00 PM&lt;br /&gt;CheckIn Time-End: midnight&lt;br /&gt;\
        CheckOut Time: 11:00 AM&lt;br /&gt;Minimum CheckIn Age: 18&lt;br /&gt;\
        Cards Accepted: Visa, Mastercard , American Express&lt;br /&gt;\
        &lt;p&gt;Pets not allowed&lt;/p&gt;";

    #[test]
    fn extracts_check_in_time() {
        let info = extract_policy_info("CheckIn Time-Begin: 2:00 PM ");
        assert_eq!(info.check_in_begin.as_deref(), Some("2:00 PM"));
        assert_eq!(info.check_out, None);
    }

    #[test]
    fn extracts_fields_from_escaped_markup() {
        let info = extract_policy_info(REMARKS);
        assert_eq!(info.check_in_begin.as_deref(), Some("2:00 PM"));
        assert_eq!(info.check_in_end.as_deref(), Some("midnight"));
        assert_eq!(info.check_out.as_deref(), Some("11:00 AM"));
        assert_eq!(info.min_check_in_age, Some(18));
        assert_eq!(info.payment_methods, vec!["Visa", "Mastercard", "American Express"]);
    }

    #[test]
    fn optional_fees_split_on_bullets() {
        let info = extract_policy_info("Optional Fees: • Breakfast USD 15 per person • Crib • Parking USD 20 per day<br>Other");
        assert_eq!(info.optional_fees, vec!["Breakfast USD 15 per person", "Parking USD 20 per day"]);
    }

    #[test]
    fn consecutive_fee_lines_share_a_section() {
        let sections = parse_remarks("Resort fee of 20 USD&lt;br&gt;City tax collected at the hotel&lt;br&gt;Pets are welcome");
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[0].category, RemarkCategory::Fees);
        assert_eq!(sections[0].title, "Fees & Charges");
        assert_eq!(sections[0].items.len(), 2);
        assert_eq!(sections[1].category, RemarkCategory::Pets);
    }

    #[test]
    fn classification_order_and_noise() {
        let sections = parse_remarks("<ul><li>ok</li><li>Check-in from 3pm</li><li>Lovely rooftop views</li></ul>");
        let categories: Vec<_> = sections.iter().map(|s| s.category).collect();
        assert_eq!(categories, vec![RemarkCategory::CheckIn, RemarkCategory::General]);
        assert_eq!(sections[1].title, "Additional Information");
    }

    #[test]
    fn nested_markup_is_stripped_from_items() {
        let sections = parse_remarks("<p><b>Free</b> WiFi in all rooms</p>");
        assert_eq!(sections[0].items, vec!["Free WiFi in all rooms"]);
        assert_eq!(sections[0].category, RemarkCategory::Amenities);
    }

    #[test]
    fn empty_and_unmatched_input_degrades_quietly() {
        assert!(parse_remarks("").is_empty());
        assert!(extract_policy_info("").is_empty());
        assert!(extract_policy_info("Nothing structured here").is_empty());
        assert_eq!(extract_cancellation("No penalty information"), None);
    }

    #[test]
    fn cancellation_clause_with_date_and_percentage() {
        let clause = extract_cancellation("CXL charges apply as follows: STARTING 28/02/2025 CXL-PENALTY AMOUNT: 100.00 %").unwrap();
        assert_eq!(clause.starting, "28/02/2025");
        assert_eq!(clause.starting_date, NaiveDate::from_ymd_opt(2025, 2, 28));
        assert_eq!(clause.percentage, Decimal::new(10000, 2));

        let iso = extract_cancellation("Starting from: 2025-03-01 a penalty of 50% applies").unwrap();
        assert_eq!(iso.starting_date, NaiveDate::from_ymd_opt(2025, 3, 1));
        assert_eq!(iso.percentage, Decimal::from(50));
    }
}
