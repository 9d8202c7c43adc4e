//! Date extraction for UK and EU invoices.

use chrono::NaiveDate;

use super::patterns::{
    DATE_DAY_MONTH, DATE_DMY, DATE_MONTH_DAY, DATE_YMD, INVOICE_DATE_LABEL, OTHER_DATE_LABEL,
};
use super::{ExtractionMatch, FieldExtractor};

/// Date field extractor. Numeric dates are read day-first.
pub struct DateExtractor;

impl DateExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for DateExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl FieldExtractor for DateExtractor {
    type Output = ExtractionMatch<NaiveDate>;

    fn extract(&self, text: &str) -> Option<Self::Output> {
        self.extract_all(text).into_iter().next()
    }

    /// All dates in the text, in order of appearance.
    fn extract_all(&self, text: &str) -> Vec<Self::Output> {
        let mut results: Vec<Self::Output> = Vec::new();

        // DD/MM/YYYY, DD.MM.YY, DD-MM-YYYY
        for caps in DATE_DMY.captures_iter(text) {
            let day: u32 = caps[1].parse().unwrap_or(0);
            let month: u32 = caps[2].parse().unwrap_or(0);
            let year = parse_year(&caps[3]);
            push_date(&mut results, NaiveDate::from_ymd_opt(year, month, day), 0.85, &caps);
        }

        // YYYY-MM-DD
        for caps in DATE_YMD.captures_iter(text) {
            let year: i32 = caps[1].parse().unwrap_or(0);
            let month: u32 = caps[2].parse().unwrap_or(0);
            let day: u32 = caps[3].parse().unwrap_or(0);
            push_date(&mut results, NaiveDate::from_ymd_opt(year, month, day), 0.9, &caps);
        }

        // "12th March 2024"
        for caps in DATE_DAY_MONTH.captures_iter(text) {
            let day: u32 = caps[1].parse().unwrap_or(0);
            let month = month_to_number(&caps[2]);
            let year: i32 = caps[3].parse().unwrap_or(0);
            push_date(&mut results, NaiveDate::from_ymd_opt(year, month, day), 0.95, &caps);
        }

        // "March 12, 2024"
        for caps in DATE_MONTH_DAY.captures_iter(text) {
            let month = month_to_number(&caps[1]);
            let day: u32 = caps[2].parse().unwrap_or(0);
            let year: i32 = caps[3].parse().unwrap_or(0);
            push_date(&mut results, NaiveDate::from_ymd_opt(year, month, day), 0.95, &caps);
        }

        results.sort_by_key(|m| m.position.map(|(start, _)| start).unwrap_or(usize::MAX));
        results
    }
}

fn push_date(
    results: &mut Vec<ExtractionMatch<NaiveDate>>,
    date: Option<NaiveDate>,
    confidence: f64,
    caps: &regex::Captures<'_>,
) {
    let (Some(date), Some(full_match)) = (date, caps.get(0)) else {
        return;
    };

    // Overlapping matches of different formats describe the same date
    let overlaps = results.iter().any(|r| {
        r.position
            .is_some_and(|(start, end)| start < full_match.end() && full_match.start() < end)
    });
    if overlaps {
        return;
    }

    results.push(
        ExtractionMatch::new(date, confidence, full_match.as_str())
            .with_position(full_match.start(), full_match.end()),
    );
}

/// Extract the invoice (issue) date.
///
/// A labeled date wins unless the label is a due, delivery or order date.
/// Otherwise the first date in the text is used.
pub fn extract_invoice_date(text: &str) -> Option<ExtractionMatch<NaiveDate>> {
    let extractor = DateExtractor::new();

    for caps in INVOICE_DATE_LABEL.captures_iter(text) {
        let (Some(label), Some(rest)) = (caps.get(0), caps.get(1)) else {
            continue;
        };

        let line_start = text[..label.start()].rfind('\n').map(|i| i + 1).unwrap_or(0);
        if OTHER_DATE_LABEL.is_match(&text[line_start..label.start()]) {
            continue;
        }

        if let Some(date) = extractor.extract(rest.as_str()) {
            return Some(ExtractionMatch::new(date.value, 0.95, date.source).with_position(
                rest.start() + date.position.map(|(s, _)| s).unwrap_or(0),
                rest.start() + date.position.map(|(_, e)| e).unwrap_or(0),
            ));
        }
    }

    extractor.extract(text)
}

fn parse_year(s: &str) -> i32 {
    let year: i32 = s.parse().unwrap_or(0);
    if year < 100 {
        // Two-digit year: 00-50 is 2000s, 51-99 is 1900s
        if year <= 50 { 2000 + year } else { 1900 + year }
    } else {
        year
    }
}

fn month_to_number(month: &str) -> u32 {
    match month.to_lowercase().get(..3) {
        Some("jan") => 1,
        Some("feb") => 2,
        Some("mar") => 3,
        Some("apr") => 4,
        Some("may") => 5,
        Some("jun") => 6,
        Some("jul") => 7,
        Some("aug") => 8,
        Some("sep") => 9,
        Some("oct") => 10,
        Some("nov") => 11,
        Some("dec") => 12,
        _ => 0,
    }
}
