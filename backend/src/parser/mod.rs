//! CSV decoder with encoding and delimiter auto-detection.
//!
//! Turns an uploaded byte buffer into a lazy sequence of [`CsvRow`] values laid
//! out according to a static column schema. Header names are matched exactly;
//! optional columns that are absent decode as empty strings, while a missing
//! required column rejects the whole upload before any row is produced.

use std::io::Cursor;

use csv::{ReaderBuilder, StringRecord, StringRecordsIntoIter, Trim};

use crate::error::{CsvError, CsvResult};

/// First data row number; row 1 is the header.
pub const FIRST_DATA_ROW: usize = 2;

/// One expected column of an entity's CSV layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column {
    /// Exact header text.
    pub name: &'static str,
    /// Whether the upload is rejected when the header lacks this column.
    pub required: bool,
}

impl Column {
    pub const fn required(name: &'static str) -> Self {
        Self { name, required: true }
    }

    pub const fn optional(name: &'static str) -> Self {
        Self { name, required: false }
    }
}

/// One decoded data row, values aligned with the schema it was decoded for.
#[derive(Debug, Clone, PartialEq)]
pub struct CsvRow {
    /// Row number as reported to users (header is row 1).
    pub number: usize,
    columns: &'static [Column],
    values: Vec<String>,
}

impl CsvRow {
    pub fn new(number: usize, columns: &'static [Column], values: Vec<String>) -> Self {
        Self { number, columns, values }
    }

    /// Value of `column`, or `""` when the column is unknown or was absent.
    pub fn get(&self, column: &str) -> &str {
        self.columns
            .iter()
            .position(|c| c.name == column)
            .and_then(|i| self.values.get(i))
            .map(String::as_str)
            .unwrap_or("")
    }

    /// `(column, value)` pairs in schema order.
    pub fn fields(&self) -> impl Iterator<Item = (&'static str, &str)> + '_ {
        self.columns
            .iter()
            .zip(&self.values)
            .map(|(c, v)| (c.name, v.as_str()))
    }
}

/// A data row the CSV reader could not split into fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowError {
    pub number: usize,
    pub message: String,
}

/// Lazy, single-pass iterator over the data rows of an upload.
pub struct CsvRows {
    records: StringRecordsIntoIter<Cursor<Vec<u8>>>,
    columns: &'static [Column],
    /// For each schema column, its index in the file's header (if present).
    positions: Vec<Option<usize>>,
    next_number: usize,
    /// Detected source encoding.
    pub encoding: String,
    /// Detected delimiter.
    pub delimiter: char,
    /// Header cells as they appear in the file.
    pub headers: Vec<String>,
}

impl CsvRows {
    fn project(&self, record: &StringRecord) -> Vec<String> {
        self.positions
            .iter()
            .map(|pos| {
                pos.and_then(|i| record.get(i))
                    .unwrap_or("")
                    .to_string()
            })
            .collect()
    }
}

impl Iterator for CsvRows {
    type Item = Result<CsvRow, RowError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let record = self.records.next()?;
            let number = self.next_number;

            match record {
                Ok(record) => {
                    // Whitespace-only lines survive the reader as a record of
                    // empty cells; they are not data.
                    if record.iter().all(str::is_empty) {
                        continue;
                    }
                    self.next_number += 1;
                    let values = self.project(&record);
                    return Some(Ok(CsvRow::new(number, self.columns, values)));
                }
                Err(e) => {
                    self.next_number += 1;
                    return Some(Err(RowError {
                        number,
                        message: format!("Malformed CSV record: {}", e),
                    }));
                }
            }
        }
    }
}

/// Detect the encoding of raw bytes.
///
/// Valid UTF-8 is taken at face value; anything else goes through chardet.
pub fn detect_encoding(bytes: &[u8]) -> String {
    if std::str::from_utf8(bytes).is_ok() {
        return "utf-8".to_string();
    }

    let charset = chardet::detect(bytes).0;
    match charset.to_lowercase().as_str() {
        "ascii" | "utf-8" | "utf8" => "utf-8".to_string(),
        "iso-8859-1" | "latin-1" | "latin1" => "iso-8859-1".to_string(),
        "iso-8859-15" | "latin-9" | "latin9" => "iso-8859-15".to_string(),
        "windows-1252" | "cp1252" => "windows-1252".to_string(),
        _ => charset,
    }
}

/// Decode bytes to a string using the given encoding, dropping a leading BOM.
pub fn decode_content(bytes: &[u8], encoding: &str) -> String {
    let text = match encoding.to_lowercase().as_str() {
        "utf-8" | "utf8" | "ascii" => String::from_utf8_lossy(bytes).into_owned(),
        // Latin-1 labels decode as windows-1252 (WHATWG label mapping).
        "iso-8859-1" | "latin-1" | "latin1" => encoding_rs::WINDOWS_1252.decode(bytes).0.into_owned(),
        "iso-8859-15" | "latin-9" | "latin9" => encoding_rs::ISO_8859_15.decode(bytes).0.into_owned(),
        "windows-1252" | "cp1252" => encoding_rs::WINDOWS_1252.decode(bytes).0.into_owned(),
        other => match encoding_rs::Encoding::for_label(other.as_bytes()) {
            Some(enc) => enc.decode(bytes).0.into_owned(),
            None => String::from_utf8_lossy(bytes).into_owned(),
        },
    };

    match text.strip_prefix('\u{feff}') {
        Some(stripped) => stripped.to_string(),
        None => text,
    }
}

/// Detect the delimiter by counting candidates in the header line.
///
/// Falls back to a comma when no candidate occurs (single-column files).
pub fn detect_delimiter(content: &str) -> char {
    let first_line = content.lines().next().unwrap_or("");

    let mut best_sep = ',';
    let mut best_count = 0;

    for sep in [',', ';', '\t', '|'] {
        let count = first_line.matches(sep).count();
        if count > best_count {
            best_count = count;
            best_sep = sep;
        }
    }

    best_sep
}

/// Decode an upload against `columns`.
///
/// Fails with [`CsvError::EmptyFile`] for a zero-byte upload and with
/// [`CsvError::MissingColumn`] when a required header is absent. Rows are
/// produced lazily by the returned iterator.
pub fn decode(bytes: &[u8], columns: &'static [Column]) -> CsvResult<CsvRows> {
    if bytes.is_empty() {
        return Err(CsvError::EmptyFile);
    }

    let encoding = detect_encoding(bytes);
    let content = decode_content(bytes, &encoding);
    let delimiter = detect_delimiter(&content);

    let mut reader = ReaderBuilder::new()
        .delimiter(delimiter as u8)
        .has_headers(true)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(Cursor::new(content.into_bytes()));

    let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    if headers.iter().all(String::is_empty) {
        return Err(CsvError::NoHeaders);
    }

    let mut positions = Vec::with_capacity(columns.len());
    for column in columns {
        let pos = headers.iter().position(|h| h == column.name);
        if pos.is_none() && column.required {
            return Err(CsvError::MissingColumn(column.name.to_string()));
        }
        positions.push(pos);
    }

    Ok(CsvRows {
        records: reader.into_records(),
        columns,
        positions,
        next_number: FIRST_DATA_ROW,
        encoding,
        delimiter,
        headers,
    })
}
