//! Core data models used throughout the billing quarantine engine.
//!
//! These types represent the records, verdicts, and per-file dispositions
//! that flow from the row validator to the quarantine controller.

use std::fmt;

/// Position of the record identifier within a billing row.
pub const FIELD_IDENTIFIER: usize = 0;
/// Position of the product line within a billing row.
pub const FIELD_PRODUCT_LINE: usize = 4;
/// Position of the billing date within a billing row.
pub const FIELD_DATE: usize = 6;
/// Position of the currency code within a billing row.
pub const FIELD_CURRENCY: usize = 7;
/// Position of the billed amount within a billing row.
pub const FIELD_AMOUNT: usize = 8;
/// Minimum number of fields a row needs before it can become a [`Record`].
pub const MIN_FIELDS: usize = FIELD_AMOUNT + 1;

/// One billing row with its referenced fields extracted by name.
///
/// Built with [`Record::from_fields`], which refuses rows that are too short
/// to carry every referenced position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub identifier: String,
    pub product_line: String,
    pub date: String,
    pub currency: String,
    pub amount: String,
    /// All fields of the row, in file order.
    pub fields: Vec<String>,
}

impl Record {
    /// Extract named fields from a positional row.
    ///
    /// Returns `None` when the row has fewer than [`MIN_FIELDS`] fields.
    pub fn from_fields<S: AsRef<str>>(fields: &[S]) -> Option<Self> {
        if fields.len() < MIN_FIELDS {
            return None;
        }
        let field = |i: usize| fields[i].as_ref().to_string();
        Some(Self {
            identifier: field(FIELD_IDENTIFIER),
            product_line: field(FIELD_PRODUCT_LINE),
            date: field(FIELD_DATE),
            currency: field(FIELD_CURRENCY),
            amount: field(FIELD_AMOUNT),
            fields: fields.iter().map(|f| f.as_ref().to_string()).collect(),
        })
    }
}

/// Why a record failed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViolationKind {
    UnrecognisedProductLine,
    UnrecognisedCurrency,
    BadDateFormat,
    BadAmount,
    MalformedRecord,
}

impl ViolationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ViolationKind::UnrecognisedProductLine => "unrecognised product line",
            ViolationKind::UnrecognisedCurrency => "unrecognised currency",
            ViolationKind::BadDateFormat => "bad date format",
            ViolationKind::BadAmount => "bad amount",
            ViolationKind::MalformedRecord => "malformed record",
        }
    }
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The first failed check for a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub record_identifier: String,
    pub kind: ViolationKind,
    pub offending_value: String,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} '{}' in record '{}'",
            self.kind, self.offending_value, self.record_identifier
        )
    }
}

/// Per-record validation outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Valid,
    Invalid(Violation),
}

/// The violation that stopped a file scan, with the 1-based line it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub line: u64,
    pub violation: Violation,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {}", self.line, self.violation)
    }
}

/// Result of scanning every data row of a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanReport {
    /// Records evaluated, including the rejected one.
    pub records_checked: usize,
    /// First invalid record, if the scan stopped early.
    pub rejection: Option<Rejection>,
}

/// A named object inside a storage container.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectRef {
    pub container: String,
    pub key: String,
}

impl ObjectRef {
    pub fn new(container: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            container: container.into(),
            key: key.into(),
        }
    }

    /// The same key inside another container.
    pub fn in_container(&self, container: &str) -> Self {
        Self::new(container, self.key.clone())
    }
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.container, self.key)
    }
}

/// Per-file outcome of one invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    /// Every record passed; the file was left in place.
    Accepted { records: usize },
    /// A record failed and the file now lives at `destination`.
    Quarantined {
        rejection: Rejection,
        destination: ObjectRef,
    },
}
