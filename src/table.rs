//! Raw CSV tables as delivered by the sources.

use anyhow::Result;
use csv::ReaderBuilder;

/// A headed table of string cells, column order preserved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawTable {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl RawTable {
    /// Decodes CSV bytes with a header row.
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes are not valid CSV or a row has a
    /// different number of fields than the header.
    pub fn from_csv(bytes: &[u8]) -> Result<Self> {
        let mut rdr = ReaderBuilder::new().has_headers(true).from_reader(bytes);

        let headers = rdr.headers()?.iter().map(str::to_string).collect();
        let mut rows = Vec::new();
        for record in rdr.records() {
            rows.push(record?.iter().map(str::to_string).collect());
        }

        Ok(Self { headers, rows })
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }
}
