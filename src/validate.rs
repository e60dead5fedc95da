//! Billing row validation.
//!
//! A [`Validator`] owns an immutable [`RuleSet`] and classifies one
//! [`Record`] at a time. Checks run in a fixed order and stop at the first
//! failure, so a row that breaks several rules reports only the earliest:
//!
//! | Order | Rule | Violation |
//! |-------|------|-----------|
//! | 1 | product line is a known line | [`ViolationKind::UnrecognisedProductLine`] |
//! | 2 | currency is a known code | [`ViolationKind::UnrecognisedCurrency`] |
//! | 3 | date is a real `YYYY-MM-DD` date | [`ViolationKind::BadDateFormat`] |
//! | 4 | amount is a plain decimal number | [`ViolationKind::BadAmount`] |
//!
//! [`scan_content`] applies the validator to every data row of a CSV file
//! and stops at the first invalid row.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;

use crate::config::RulesConfig;
use crate::models::{Record, Rejection, ScanReport, Verdict, Violation, ViolationKind};

/// Product lines accepted when no rules are configured.
pub const DEFAULT_PRODUCT_LINES: &[&str] = &["Bakery", "Meat", "Dairy"];
/// Currency codes accepted when no rules are configured.
pub const DEFAULT_CURRENCIES: &[&str] = &["USD", "Rands", "Bitcoin"];

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Plain decimal literal of any magnitude: optional sign, digits, optional
/// fraction. No exponent, digit separators, or currency symbols.
static AMOUNT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[+-]?([0-9]+(\.[0-9]*)?|\.[0-9]+)$").expect("valid regex"));

/// The closed vocabularies a billing record is checked against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleSet {
    product_lines: BTreeSet<String>,
    currencies: BTreeSet<String>,
}

impl RuleSet {
    pub fn new<P, C>(product_lines: P, currencies: C) -> Self
    where
        P: IntoIterator,
        P::Item: Into<String>,
        C: IntoIterator,
        C::Item: Into<String>,
    {
        Self {
            product_lines: product_lines.into_iter().map(Into::into).collect(),
            currencies: currencies.into_iter().map(Into::into).collect(),
        }
    }
}

impl Default for RuleSet {
    fn default() -> Self {
        Self::new(
            DEFAULT_PRODUCT_LINES.iter().copied(),
            DEFAULT_CURRENCIES.iter().copied(),
        )
    }
}

impl From<&RulesConfig> for RuleSet {
    fn from(rules: &RulesConfig) -> Self {
        Self::new(rules.product_lines.iter().cloned(), rules.currencies.iter().cloned())
    }
}

/// Stateless record checker over a fixed [`RuleSet`].
#[derive(Debug, Clone, Default)]
pub struct Validator {
    rules: RuleSet,
}

impl Validator {
    pub fn new(rules: RuleSet) -> Self {
        Self { rules }
    }

    /// Classify one record. Same record, same verdict.
    pub fn validate(&self, record: &Record) -> Verdict {
        let invalid = |kind: ViolationKind, value: &str| {
            Verdict::Invalid(Violation {
                record_identifier: record.identifier.clone(),
                kind,
                offending_value: value.to_string(),
            })
        };

        if !self.rules.product_lines.contains(&record.product_line) {
            return invalid(ViolationKind::UnrecognisedProductLine, &record.product_line);
        }
        if !self.rules.currencies.contains(&record.currency) {
            return invalid(ViolationKind::UnrecognisedCurrency, &record.currency);
        }
        if !is_calendar_date(&record.date) {
            return invalid(ViolationKind::BadDateFormat, &record.date);
        }
        if !AMOUNT_RE.is_match(record.amount.trim()) {
            return invalid(ViolationKind::BadAmount, &record.amount);
        }

        Verdict::Valid
    }

    /// Extract a [`Record`] from raw fields and validate it.
    ///
    /// Rows too short to carry every referenced field are reported as
    /// [`ViolationKind::MalformedRecord`] with the whole row as the value.
    pub fn check_fields(&self, fields: &[&str]) -> Verdict {
        match Record::from_fields(fields) {
            Some(record) => self.validate(&record),
            None => Verdict::Invalid(Violation {
                record_identifier: fields.first().map(|f| f.to_string()).unwrap_or_default(),
                kind: ViolationKind::MalformedRecord,
                offending_value: fields.join(","),
            }),
        }
    }
}

/// `YYYY-MM-DD` with exactly four, two and two digits, naming a real day.
fn is_calendar_date(value: &str) -> bool {
    let bytes = value.as_bytes();
    let shape_ok = bytes.len() == 10
        && bytes.iter().enumerate().all(|(i, b)| match i {
            4 | 7 => *b == b'-',
            _ => b.is_ascii_digit(),
        });
    shape_ok && NaiveDate::parse_from_str(value, DATE_FORMAT).is_ok()
}

/// Validate every data row of a CSV document, stopping at the first failure.
///
/// The first line is the schema header and is never validated. Blank lines
/// are skipped. Rows are evaluated lazily, so nothing after the rejected row
/// is parsed.
pub fn scan_content(content: &str, validator: &Validator) -> ScanReport {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(content.as_bytes());

    let mut records_checked = 0;
    let rejection = reader.records().find_map(|row| {
        records_checked += 1;
        let (line, verdict) = match row {
            Ok(row) => {
                let line = row.position().map(|p| p.line()).unwrap_or_default();
                let fields: Vec<&str> = row.iter().collect();
                (line, validator.check_fields(&fields))
            }
            Err(e) => {
                let line = e.position().map(|p| p.line()).unwrap_or_default();
                let violation = Violation {
                    record_identifier: String::new(),
                    kind: ViolationKind::MalformedRecord,
                    offending_value: e.to_string(),
                };
                (line, Verdict::Invalid(violation))
            }
        };
        match verdict {
            Verdict::Valid => None,
            Verdict::Invalid(violation) => Some(Rejection { line, violation }),
        }
    });

    ScanReport {
        records_checked,
        rejection,
    }
}
