use crate::entry::Entry;
use calamine::{Data, DataType, Range, Reader, open_workbook_auto_from_rs};
use chrono::Timelike;
use std::io::Cursor;
use thiserror::Error;

/// File extensions accepted for upload
pub const ALLOWED_EXTENSIONS: &[&str] = &["xlsx", "xls"];

/// Options controlling how the first column is read
#[derive(Debug, Clone, Default)]
pub struct ReaderOptions {
    /// Treat the first row of the sheet as a column title and skip it
    pub header_row: bool,
}

/// Reasons an uploaded spreadsheet yields no entries
#[derive(Debug, Error)]
pub enum ReadError {
    #[error("invalid file type: {0:?}")]
    InvalidFileType(String),

    #[error("{0}")]
    Parse(#[from] calamine::Error),

    #[error("the spreadsheet has no rows")]
    EmptyFile,

    #[error("no valid entries found in the first column")]
    NoValidEntries,
}

/// Check if the filename has one of the given extensions
///
/// The comparison is case-insensitive and only looks at the text after the
/// last `.`; a name without any `.` is never allowed.
///
/// # Arguments
/// * `filename` - Name of the uploaded file as sent by the client
/// * `extensions` - Lowercase extensions without the leading dot
pub fn allowed_file(filename: &str, extensions: &[&str]) -> bool {
    filename
        .rsplit_once('.')
        .map(|(_, ext)| {
            extensions
                .iter()
                .any(|allowed| allowed.eq_ignore_ascii_case(ext))
        })
        .unwrap_or(false)
}

/// Read the entries of an uploaded spreadsheet
///
/// Validates the filename, parses the workbook (the format is detected from
/// the content, so `.xls` and `.xlsx` payloads both work) and collects the
/// non-empty values of the first column of the first worksheet, in row order.
///
/// # Arguments
/// * `filename` - Name of the uploaded file, used for the extension check
/// * `bytes` - Raw content of the uploaded file
/// * `options` - Reader options
///
/// # Returns
/// * `Result<Vec<Entry>, ReadError>` - The entries, never empty, or the reason there are none
///
/// # Examples
/// ```no_run
/// use lucky_draw::loader::{ReaderOptions, read_entries};
///
/// let bytes = std::fs::read("names.xlsx").unwrap();
/// match read_entries("names.xlsx", &bytes, &ReaderOptions::default()) {
///     Ok(entries) => println!("Read {} entries", entries.len()),
///     Err(e) => eprintln!("Error reading spreadsheet: {}", e),
/// }
/// ```
pub fn read_entries(
    filename: &str,
    bytes: &[u8],
    options: &ReaderOptions,
) -> Result<Vec<Entry>, ReadError> {
    if !allowed_file(filename, ALLOWED_EXTENSIONS) {
        return Err(ReadError::InvalidFileType(filename.to_string()));
    }

    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes))?;

    // A workbook without any worksheet has nothing to draw from
    let range = workbook
        .worksheet_range_at(0)
        .ok_or(ReadError::EmptyFile)??;

    first_column_entries(&range, options)
}

/// Collect the non-empty cells of column A
///
/// Positions are absolute: calamine trims leading empty columns from the
/// range, and a sheet whose column A is blank must not fall through to B.
fn first_column_entries(
    range: &Range<Data>,
    options: &ReaderOptions,
) -> Result<Vec<Entry>, ReadError> {
    let (Some((first_row, _)), Some((last_row, _))) = (range.start(), range.end()) else {
        return Err(ReadError::EmptyFile);
    };

    let first_row = first_row + u32::from(options.header_row);
    if first_row > last_row {
        return Err(ReadError::EmptyFile);
    }

    let entries: Vec<Entry> = (first_row..=last_row)
        .filter_map(|row| range.get_value((row, 0)))
        .filter_map(entry_from_cell)
        .collect();

    if entries.is_empty() {
        return Err(ReadError::NoValidEntries);
    }

    Ok(entries)
}

fn entry_from_cell(cell: &Data) -> Option<Entry> {
    match cell {
        // Error cells such as #N/A count as missing
        Data::Empty | Data::Error(_) => None,
        Data::String(text) if text.trim().is_empty() => None,
        Data::String(text) => Some(Entry::Text(text.clone())),
        Data::Int(value) => Some(Entry::Int(*value)),
        Data::Float(value) => Some(number_entry(*value)),
        Data::Bool(value) => Some(Entry::Bool(*value)),
        Data::DateTime(_) | Data::DateTimeIso(_) => Some(Entry::Text(date_text(cell))),
        other => Some(Entry::Text(other.to_string())),
    }
}

/// xlsx stores every number as a float; whole values become `Int`
fn number_entry(value: f64) -> Entry {
    const LIMIT: f64 = 9_223_372_036_854_775_808.0; // 2^63

    if value.fract() == 0.0 && value >= -LIMIT && value < LIMIT {
        Entry::Int(value as i64)
    } else {
        Entry::Float(value)
    }
}

/// `2024-03-01`, or `2024-03-01 10:30:00` when the cell has a time part
fn date_text(cell: &Data) -> String {
    match cell.as_datetime() {
        Some(datetime) if datetime.num_seconds_from_midnight() == 0 => {
            datetime.format("%Y-%m-%d").to_string()
        }
        Some(datetime) => datetime.format("%Y-%m-%d %H:%M:%S").to_string(),
        None => cell.to_string(),
    }
}
