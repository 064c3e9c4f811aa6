//! Chunked CSV reading with a row predicate.
//!
//! A source is consumed `chunk_size` raw records at a time so peak memory is
//! bounded by the chunk, not the file. Rows are filtered before they leave the
//! reader; malformed lines are skipped and counted.

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use csv::{ErrorKind, ReaderBuilder, StringRecord};
use tracing::{debug, warn};

use sentigraph_core::normalize::{columns, parse_date};
use sentigraph_core::{DateWindow, Fields, SentigraphError, SentigraphResult};

pub const MIN_CHUNK_SIZE: usize = 100;
pub const MAX_CHUNK_SIZE: usize = 5000;

/// Clamp a requested chunk size to `[MIN_CHUNK_SIZE, MAX_CHUNK_SIZE]`.
pub fn clamp_chunk_size(requested: usize) -> usize {
    requested.clamp(MIN_CHUNK_SIZE, MAX_CHUNK_SIZE)
}

/// One raw record with by-name column access.
#[derive(Debug, Clone)]
pub struct RawRow {
    header: Arc<HashMap<String, usize>>,
    record: StringRecord,
}

impl Fields for RawRow {
    fn raw(&self, column: &str) -> Option<&str> {
        let index = *self.header.get(column)?;
        self.record.get(index)
    }
}

/// Ticker equality plus an inclusive calendar-date window.
#[derive(Debug, Clone)]
pub struct RowFilter {
    ticker: String,
    window: DateWindow,
}

impl RowFilter {
    pub fn new(ticker: impl Into<String>, window: DateWindow) -> Self {
        Self { ticker: ticker.into(), window }
    }

    /// Rows with an unparsable date never pass.
    pub fn accepts(&self, row: &impl Fields) -> bool {
        row.field(columns::TICKER) == Some(self.ticker.as_str())
            && row
                .field(columns::DATE)
                .and_then(parse_date)
                .is_some_and(|date| self.window.contains(date))
    }
}

/// A CSV file read in bounded chunks.
#[derive(Debug, Clone)]
pub struct CsvSource {
    path: PathBuf,
    chunk_size: usize,
}

impl CsvSource {
    /// Fails with `SourceNotFound` when the file does not exist.
    pub fn open(path: impl AsRef<Path>, chunk_size: usize) -> SentigraphResult<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(SentigraphError::source_not_found(path));
        }
        Ok(Self {
            path: path.to_path_buf(),
            chunk_size: clamp_chunk_size(chunk_size),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Header names of the file.
    pub fn headers(&self) -> SentigraphResult<Vec<String>> {
        let mut reader = ReaderBuilder::new().from_path(&self.path)?;
        Ok(reader.headers()?.iter().map(str::to_string).collect())
    }

    /// Fail with `MissingColumn` on the first required column the header lacks.
    pub fn require_columns(&self, required: &[&str]) -> SentigraphResult<()> {
        let headers = self.headers()?;
        match required.iter().find(|c| !headers.iter().any(|h| h.trim() == **c)) {
            Some(column) => Err(SentigraphError::MissingColumn {
                column: column.to_string(),
                file: self.path.display().to_string(),
            }),
            None => Ok(()),
        }
    }

    /// Start a fresh pass over the file. Each call reopens it.
    pub fn chunks<F>(&self, filter: F) -> SentigraphResult<Chunks<File, F>>
    where
        F: Fn(&RawRow) -> bool,
    {
        let file = File::open(&self.path)?;
        Chunks::new(file, self.chunk_size, filter)
    }
}

/// One bounded slice of a source, already filtered.
#[derive(Debug)]
pub struct Chunk {
    pub index: usize,
    /// Records read from the source for this chunk, before filtering.
    pub scanned: usize,
    pub rows: Vec<RawRow>,
}

/// Lazy, finite sequence of [`Chunk`]s.
pub struct Chunks<R, F> {
    reader: csv::Reader<R>,
    header: Arc<HashMap<String, usize>>,
    chunk_size: usize,
    filter: F,
    next_index: usize,
    malformed: usize,
    done: bool,
}

impl<R: Read, F: Fn(&RawRow) -> bool> Chunks<R, F> {
    /// Read chunks from any CSV byte stream. `chunk_size` is used as given.
    pub fn new(source: R, chunk_size: usize, filter: F) -> SentigraphResult<Self> {
        let mut reader = ReaderBuilder::new().has_headers(true).from_reader(source);
        let header = reader
            .headers()?
            .iter()
            .enumerate()
            .map(|(i, name)| (name.trim().to_string(), i))
            .collect();

        Ok(Self {
            reader,
            header: Arc::new(header),
            chunk_size: chunk_size.max(1),
            filter,
            next_index: 0,
            malformed: 0,
            done: false,
        })
    }

    /// Lines skipped so far because they could not be parsed as CSV records.
    pub fn malformed(&self) -> usize {
        self.malformed
    }
}

impl<R: Read, F: Fn(&RawRow) -> bool> Iterator for Chunks<R, F> {
    type Item = Chunk;

    fn next(&mut self) -> Option<Chunk> {
        if self.done {
            return None;
        }

        let mut rows = Vec::new();
        let mut scanned = 0;
        while scanned < self.chunk_size {
            let mut record = StringRecord::new();
            match self.reader.read_record(&mut record) {
                Ok(true) => {
                    scanned += 1;
                    let row = RawRow { header: Arc::clone(&self.header), record };
                    if (self.filter)(&row) {
                        rows.push(row);
                    }
                }
                Ok(false) => {
                    self.done = true;
                    break;
                }
                Err(e) if matches!(e.kind(), ErrorKind::Io(_)) => {
                    warn!(error = %e, "Stopping source read after IO error");
                    self.done = true;
                    break;
                }
                Err(e) => {
                    scanned += 1;
                    self.malformed += 1;
                    debug!(error = %e, "Skipping malformed line");
                }
            }
        }

        if scanned == 0 {
            return None;
        }

        let chunk = Chunk { index: self.next_index, scanned, rows };
        self.next_index += 1;
        Some(chunk)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    use chrono::NaiveDate;

    fn window(start: &str, end: &str) -> DateWindow {
        DateWindow::new(
            NaiveDate::parse_from_str(start, "%Y-%m-%d").unwrap(),
            NaiveDate::parse_from_str(end, "%Y-%m-%d").unwrap(),
        )
    }

    const PRICES: &str = "Date,Open,High,Low,Close,Adj Close,Volume,Stock Name
2021-09-29,1,1,1,1,1,10,X
2021-09-30,1,1,1,1,1,10,X
2021-09-30,1,1,1,1,1,10,Y
2021-10-01,1,1,1,1,1,10,X
2021-10-02,1,1,1,1,1,10,X
";

    #[test]
    fn test_clamp() {
        assert_eq!(clamp_chunk_size(1), 100);
        assert_eq!(clamp_chunk_size(2000), 2000);
        assert_eq!(clamp_chunk_size(1_000_000), 5000);
    }

    #[test]
    fn test_filter_window_and_ticker() {
        let filter = RowFilter::new("X", window("2021-09-30", "2021-10-01"));
        let chunks: Vec<Chunk> = Chunks::new(PRICES.as_bytes(), 2, |r: &RawRow| filter.accepts(r))
            .unwrap()
            .collect();

        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks.iter().map(|c| c.scanned).sum::<usize>(), 5);
        let dates: Vec<&str> = chunks
            .iter()
            .flat_map(|c| c.rows.iter())
            .filter_map(|r| r.field("Date"))
            .collect();
        assert_eq!(dates, vec!["2021-09-30", "2021-10-01"]);
    }

    #[test]
    fn test_malformed_lines_skipped() {
        let data = "Date,Tweet,Stock Name\n2022-01-01,ok,X\n2022-01-01,too,many,fields,X\n2022-01-02,fine,X\n";
        let mut chunks = Chunks::new(data.as_bytes(), 10, |_: &RawRow| true).unwrap();
        let chunk = chunks.next().unwrap();
        assert_eq!(chunk.rows.len(), 2);
        assert_eq!(chunks.malformed(), 1);
        assert!(chunks.next().is_none());
    }

    #[test]
    fn test_missing_file() {
        let err = CsvSource::open("/definitely/not/here.csv", 500).unwrap_err();
        assert!(matches!(err, SentigraphError::SourceNotFound(_)));
    }

    #[test]
    fn test_restartable() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(PRICES.as_bytes()).unwrap();
        let source = CsvSource::open(file.path(), 10).unwrap();
        assert_eq!(source.chunk_size(), MIN_CHUNK_SIZE);

        let first: usize = source.chunks(|_| true).unwrap().map(|c| c.rows.len()).sum();
        let second: usize = source.chunks(|_| true).unwrap().map(|c| c.rows.len()).sum();
        assert_eq!(first, 5);
        assert_eq!(first, second);
        assert_eq!(source.headers().unwrap().len(), 8);
    }

    #[test]
    fn test_require_columns() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"Date,Stock Name\n2021-09-30,X\n").unwrap();
        let source = CsvSource::open(file.path(), 100).unwrap();

        assert!(source.require_columns(&["Date", "Stock Name"]).is_ok());
        let err = source.require_columns(&["Date", "Tweet"]).unwrap_err();
        assert!(matches!(err, SentigraphError::MissingColumn { ref column, .. } if column == "Tweet"));
    }
}
