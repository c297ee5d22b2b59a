use serde::{Deserialize, Serialize};
use std::fmt;

/// A single participant taken from the first column of an uploaded sheet
///
/// Entries keep the type the spreadsheet gave them, and serialize as bare
/// JSON scalars so the saved snapshot is a plain array such as
/// `["Alice", 42, true]`. Duplicates are valid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Entry {
    /// Boolean cell (`TRUE` / `FALSE`)
    Bool(bool),

    /// Whole number cell
    Int(i64),

    /// Numeric cell; spreadsheets store most numbers this way
    Float(f64),

    /// Text cell
    Text(String),
}

impl fmt::Display for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Entry::Bool(true) => f.write_str("TRUE"),
            Entry::Bool(false) => f.write_str("FALSE"),
            Entry::Int(value) => write!(f, "{}", value),
            Entry::Float(value) => write!(f, "{}", value),
            Entry::Text(text) => f.write_str(text),
        }
    }
}

impl From<&str> for Entry {
    fn from(text: &str) -> Self {
        Entry::Text(text.to_string())
    }
}

impl From<String> for Entry {
    fn from(text: String) -> Self {
        Entry::Text(text)
    }
}
