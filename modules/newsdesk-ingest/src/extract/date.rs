// Publish-date extraction.
//
// A parsed date is only accepted inside a plausibility window around now;
// anything else (parse failure, far-future typo, ancient default) yields
// None. Unknown stays unknown; the pipeline never substitutes "now".

use chrono::{DateTime, NaiveDate, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

use newsdesk_common::RawItem;

/// Accept dates up to this many years in the past.
const MAX_YEARS_PAST: i64 = 10;
/// Accept dates up to this many years in the future.
const MAX_YEARS_FUTURE: i64 = 5;

/// Explicit date formats tried after RFC 2822 / RFC 3339.
const DATE_FORMATS: &[&str] = &[
    "%B %d, %Y",  // November 12, 2025
    "%b %d, %Y",  // Nov 12, 2025
    "%d-%b-%y",   // 06-Nov-25
    "%Y-%m-%d",   // 2025-11-12
    "%m/%d/%Y",   // 11/12/2025
    "%d %B %Y",   // 12 November 2025
    "%d %b %Y",   // 12 Nov 2025
    "%B %d %Y",   // November 12 2025
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
];

/// Window check: rejects implausible years rather than trusting them.
pub fn plausible(date: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    let min = now - chrono::Duration::days(MAX_YEARS_PAST * 366);
    let max = now + chrono::Duration::days(MAX_YEARS_FUTURE * 366);
    date >= min && date <= max
}

/// Parse a raw date string in any supported format. No window check here;
/// callers combine with `plausible`.
pub fn parse_raw_date(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }

    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(s, format) {
            return date.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc());
        }
        if let Ok(dt) = chrono::NaiveDateTime::parse_from_str(s, format) {
            return Some(dt.and_utc());
        }
    }

    None
}

static MONTH_NAME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"(?i)\b(jan(?:uary)?|feb(?:ruary)?|mar(?:ch)?|apr(?:il)?|may|jun(?:e)?",
        r"|jul(?:y)?|aug(?:ust)?|sep(?:t(?:ember)?)?|oct(?:ober)?|nov(?:ember)?",
        r"|dec(?:ember)?)\.?\s+(\d{1,2})(?:st|nd|rd|th)?,?\s+(\d{4})\b"
    ))
    .expect("valid month-name regex")
});
static ISO_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d{4})-(\d{2})-(\d{2})\b").expect("valid iso regex"));
static SLASH_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d{1,2})/(\d{1,2})/(\d{4})\b").expect("valid slash regex"));

fn month_number(name: &str) -> Option<u32> {
    let n = name.to_lowercase();
    let month = match &n[..3.min(n.len())] {
        "jan" => 1,
        "feb" => 2,
        "mar" => 3,
        "apr" => 4,
        "may" => 5,
        "jun" => 6,
        "jul" => 7,
        "aug" => 8,
        "sep" => 9,
        "oct" => 10,
        "nov" => 11,
        "dec" => 12,
        _ => return None,
    };
    Some(month)
}

/// Find the first plausible date embedded in free text. Used as the last
/// resort on scraped pages where no structured date exists.
pub fn find_date_in_text(text: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    if let Some(cap) = MONTH_NAME_RE.captures(text) {
        let month = month_number(&cap[1])?;
        let day: u32 = cap[2].parse().ok()?;
        let year: i32 = cap[3].parse().ok()?;
        if let Some(date) = NaiveDate::from_ymd_opt(year, month, day) {
            let dt = date.and_hms_opt(0, 0, 0)?.and_utc();
            if plausible(dt, now) {
                return Some(dt);
            }
        }
    }

    if let Some(cap) = ISO_RE.captures(text) {
        let (y, m, d) = (
            cap[1].parse().ok()?,
            cap[2].parse().ok()?,
            cap[3].parse().ok()?,
        );
        if let Some(date) = NaiveDate::from_ymd_opt(y, m, d) {
            let dt = date.and_hms_opt(0, 0, 0)?.and_utc();
            if plausible(dt, now) {
                return Some(dt);
            }
        }
    }

    if let Some(cap) = SLASH_RE.captures(text) {
        let (m, d, y) = (
            cap[1].parse().ok()?,
            cap[2].parse().ok()?,
            cap[3].parse().ok()?,
        );
        if let Some(date) = NaiveDate::from_ymd_opt(y, m, d) {
            let dt = date.and_hms_opt(0, 0, 0)?.and_utc();
            if plausible(dt, now) {
                return Some(dt);
            }
        }
    }

    None
}

/// Best plausible date carried by a feed item: the parsed date first, then
/// a re-parse of the raw date string the adapter kept around.
pub fn item_pub_date(item: &RawItem, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    if let Some(date) = item.pub_date {
        if plausible(date, now) {
            return Some(date);
        }
    }
    item.raw_date
        .as_deref()
        .and_then(parse_raw_date)
        .filter(|d| plausible(*d, now))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, TimeZone};

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 11, 20, 12, 0, 0).unwrap()
    }

    fn expect_date(s: &str, y: i32, m: u32, d: u32) {
        let parsed = parse_raw_date(s).unwrap_or_else(|| panic!("failed to parse {s:?}"));
        let date = parsed.date_naive();
        assert_eq!(
            (date.year(), date.month(), date.day()),
            (y, m, d),
            "wrong date for {s:?}"
        );
    }

    #[test]
    fn parses_supported_patterns() {
        expect_date("November 12, 2025", 2025, 11, 12);
        expect_date("Nov 12, 2025", 2025, 11, 12);
        expect_date("06-Nov-25", 2025, 11, 6);
        expect_date("2025-11-12", 2025, 11, 12);
        expect_date("11/12/2025", 2025, 11, 12);
        expect_date("Wed, 12 Nov 2025 10:00:00 GMT", 2025, 11, 12);
        expect_date("2025-11-12T08:30:00Z", 2025, 11, 12);
    }

    #[test]
    fn rejects_unparsable_strings() {
        assert!(parse_raw_date("yesterday").is_none());
        assert!(parse_raw_date("").is_none());
        assert!(parse_raw_date("soonish 2025").is_none());
    }

    #[test]
    fn plausibility_window() {
        let now = fixed_now();
        let ok_past = Utc.with_ymd_and_hms(2017, 1, 1, 0, 0, 0).unwrap();
        let too_old = Utc.with_ymd_and_hms(2014, 1, 1, 0, 0, 0).unwrap();
        let ok_future = Utc.with_ymd_and_hms(2029, 1, 1, 0, 0, 0).unwrap();
        let too_future = Utc.with_ymd_and_hms(2032, 1, 1, 0, 0, 0).unwrap();

        assert!(plausible(ok_past, now));
        assert!(!plausible(too_old, now));
        assert!(plausible(ok_future, now));
        assert!(!plausible(too_future, now));
    }

    #[test]
    fn finds_month_name_dates_in_text() {
        let now = fixed_now();
        let text = "Filed from the bureau.\nNovember 12, 2025 — the council met.";
        let found = find_date_in_text(text, now).unwrap();
        assert_eq!(found.date_naive().to_string(), "2025-11-12");

        // Implausible years embedded in text are skipped, not returned.
        assert!(find_date_in_text("Archived June 3, 1998", now).is_none());
    }

    #[test]
    fn item_date_falls_back_to_raw_string() {
        let now = fixed_now();
        let item = RawItem {
            raw_date: Some("Nov 12, 2025".to_string()),
            ..RawItem::default()
        };
        assert!(item_pub_date(&item, now).is_some());

        let undated = RawItem {
            raw_date: Some("every other tuesday".to_string()),
            ..RawItem::default()
        };
        assert!(item_pub_date(&undated, now).is_none());
    }
}
