//! Document numbers: `{PREFIX}/{YYYY}/{MM}/{NNNN}`.

use chrono::{DateTime, Datelike, Utc};

use super::DocumentType;

/// Sequence key shared by all documents of one type and month.
pub fn sequence_key(document_type: DocumentType, at: DateTime<Utc>) -> String {
    format!(
        "{}/{:04}/{:02}",
        document_type.number_prefix(),
        at.year(),
        at.month()
    )
}

/// Appends the zero-padded sequence value to its key.
pub fn format_number(key: &str, sequence: u64) -> String {
    format!("{key}/{sequence:04}")
}
