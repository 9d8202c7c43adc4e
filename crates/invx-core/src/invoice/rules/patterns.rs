//! Common regex patterns for invoice extraction.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    // Monetary amounts: "1,234.56", "1234.56", "£12", "1.234,56", "12,50".
    // Bare integers only count when a currency symbol precedes them.
    pub static ref AMOUNT_PATTERN: Regex = Regex::new(
        r"([£$€])?\s?(-?(?:\d{1,3}(?:\.\d{3})+|\d+),\d{2}\b|-?(?:\d{1,3}(?:,\d{3})+|\d+)(?:\.\d{2})?)"
    ).unwrap();

    pub static ref CURRENCY_SYMBOL: Regex = Regex::new(r"[£$€]").unwrap();

    pub static ref CURRENCY_CODE: Regex = Regex::new(r"\b(GBP|EUR|USD)\b").unwrap();

    // Dates
    pub static ref DATE_DMY: Regex = Regex::new(
        r"\b(\d{1,2})[./\-](\d{1,2})[./\-](\d{4}|\d{2})\b"
    ).unwrap();

    pub static ref DATE_YMD: Regex = Regex::new(
        r"\b(\d{4})[./\-](\d{1,2})[./\-](\d{1,2})\b"
    ).unwrap();

    pub static ref DATE_DAY_MONTH: Regex = Regex::new(
        r"(?i)\b(\d{1,2})(?:st|nd|rd|th)?\s+(jan|feb|mar|apr|may|jun|jul|aug|sep|oct|nov|dec)[a-z]*\.?,?\s+(\d{4})\b"
    ).unwrap();

    pub static ref DATE_MONTH_DAY: Regex = Regex::new(
        r"(?i)\b(jan|feb|mar|apr|may|jun|jul|aug|sep|oct|nov|dec)[a-z]*\.?\s+(\d{1,2})(?:st|nd|rd|th)?,?\s+(\d{4})\b"
    ).unwrap();

    // Labeled invoice date; due and delivery dates are filtered out by the caller.
    pub static ref INVOICE_DATE_LABEL: Regex = Regex::new(
        r"(?i)\b(?:invoice\s+date|date\s+of\s+invoice|tax\s+point|issue\s+date|date)\b\s*[:\-]?\s*([^\n]*)"
    ).unwrap();

    pub static ref OTHER_DATE_LABEL: Regex = Regex::new(
        r"(?i)\b(?:due|delivery|order|payment|ship(?:ping)?|despatch|dispatch)\s*$"
    ).unwrap();

    // Invoice numbers, in priority order
    pub static ref INVOICE_NUMBER: Regex = Regex::new(
        r"(?i)\b(?:invoice\s*(?:no\.?|number|num\.?|#)|inv\.?\s*(?:no\.?|#))\s*[:#.\-]?\s*([A-Z0-9][A-Z0-9/\-_]*)"
    ).unwrap();

    pub static ref INVOICE_NUMBER_PREFIXED: Regex = Regex::new(
        r"(?i)\b(INV[-\s]?\d+[A-Z0-9/\-]*)\b"
    ).unwrap();

    pub static ref INVOICE_NUMBER_HASH: Regex = Regex::new(
        r"#\s?(\d{3,})\b"
    ).unwrap();

    // Supplier labels
    pub static ref SUPPLIER_LABEL: Regex = Regex::new(
        r"(?im)^\s*(?:supplier|vendor|from|issued\s+by|sold\s+by)\s*[:\-]\s*(\S[^\n]*)$"
    ).unwrap();

    // Totals
    pub static ref PRIORITY_TOTAL: Regex = Regex::new(
        r"(?i)\b(?:grand\s+total|total\s+due|amount\s+due|total|payable|balance)\b"
    ).unwrap();

    pub static ref NON_GRAND_TOTAL: Regex = Regex::new(
        r"(?i)\b(?:sub[\s\-]?total|net\s+total|total\s+net|vat\s+total|total\s+vat|tax\s+total|total\s+tax|total\s+(?:qty|quantity|items|units|weight))\b"
    ).unwrap();

    pub static ref SUBTOTAL_LABEL: Regex = Regex::new(
        r"(?i)\b(?:sub[\s\-]?total|net\s+total|total\s+net|net\s+amount|goods\s+total|total\s+excl(?:uding)?\.?\s+vat)\b"
    ).unwrap();

    pub static ref VAT_LABEL: Regex = Regex::new(
        r"(?i)\b(?:total\s+vat|vat\s+total|vat\s+amount|vat|tax)\b"
    ).unwrap();

    pub static ref VAT_REGISTRATION: Regex = Regex::new(
        r"(?i)\bvat\s*(?:reg(?:istration)?|no\.?|number)\b"
    ).unwrap();

    // Line-item table section markers
    pub static ref TABLE_HEADER_WORD: Regex = Regex::new(
        r"(?i)\b(description|item|items|product|details|qty|quantity|unit|price|rate|amount|total|code)\b"
    ).unwrap();

    pub static ref TABLE_HEADER_ANCHOR: Regex = Regex::new(
        r"(?i)\b(description|item|items|product|details|qty|quantity)\b"
    ).unwrap();

    pub static ref SUMMARY_LINE: Regex = Regex::new(
        r"(?i)^\s*(?:sub[\s\-]?total|net\s+total|grand\s+total|total|vat|balance|amount\s+due)\b"
    ).unwrap();

    // Lines that are never line items. Contact and account words only count
    // in label form ("Tel: ...", "Fax 0113 496 0001") so "Phone charger" stays.
    pub static ref SKIP_LINE: Regex = Regex::new(
        r"(?i)\b(?:invoice|page|sub[\s\-]?total|total|vat|tax|amount\s+due|balance|iban|sort\s+code)\b|\b(?:tel|telephone|phone|fax|e-?mail|account(?:\s+(?:no|number))?)\b\.?\s*(?:[:#]|\+?\d[\d\s]{5,})"
    ).unwrap();
}

/// True when the line looks like an item-table heading.
pub fn is_table_header(line: &str) -> bool {
    if !TABLE_HEADER_ANCHOR.is_match(line) {
        return false;
    }

    let mut words: Vec<String> = TABLE_HEADER_WORD
        .find_iter(line)
        .map(|m| m.as_str().to_lowercase())
        .collect();
    words.sort();
    words.dedup();

    words.len() >= 2 && !line.chars().any(|c| c.is_ascii_digit())
}

/// True when the line opens the totals block below the item table.
pub fn is_summary_line(line: &str) -> bool {
    SUMMARY_LINE.is_match(line)
}

/// True when the line can never be a line item.
pub fn is_skip_line(line: &str) -> bool {
    SKIP_LINE.is_match(line)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_header() {
        assert!(is_table_header("Description   Qty   Unit Price   Total"));
        assert!(is_table_header("QTY  ITEM  AMOUNT"));
        assert!(!is_table_header("Total 657.64"));
        assert!(!is_table_header("Item 12 of 30"));
        assert!(!is_table_header("Crate of Beer"));
    }

    #[test]
    fn test_summary_and_skip_lines() {
        assert!(is_summary_line("Sub-total 600.00"));
        assert!(is_summary_line("  VAT 20% 120.00"));
        assert!(is_summary_line("Balance due"));
        assert!(!is_summary_line("Crate of Beer 12 3.56 42.66"));

        assert!(is_skip_line("Invoice No: 1234"));
        assert!(is_skip_line("Page 1 of 2"));
        assert!(!is_skip_line("12 LITTRE PEPSI"));
    }

    #[test]
    fn test_contact_labels_only_skip_in_label_form() {
        assert!(is_skip_line("Tel: 0113 496 0000"));
        assert!(is_skip_line("Tel 0113 4960000"));
        assert!(is_skip_line("Fax. 0113 496 0001"));
        assert!(is_skip_line("E-mail: accounts@acme.example"));
        assert!(is_skip_line("Account No: 12345678"));
        assert!(is_skip_line("IBAN GB29 NWBK 6016"));

        assert!(!is_skip_line("Phone charger 2 5.00 10.00"));
        assert!(!is_skip_line("Fax toner 1 12.00 12.00"));
        assert!(!is_skip_line("Email marketing 1 50.00 50.00"));
        assert!(!is_skip_line("Phone 2 5.00 10.00"));
    }

    #[test]
    fn test_grand_total_keywords() {
        assert!(PRIORITY_TOTAL.is_match("Total 657.64"));
        assert!(NON_GRAND_TOTAL.is_match("Sub Total 600.00"));
        assert!(NON_GRAND_TOTAL.is_match("Total VAT 57.64"));
        assert!(!NON_GRAND_TOTAL.is_match("Total due 657.64"));
    }
}
