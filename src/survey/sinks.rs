// The local destinations of the submissions.

use std::fs::OpenOptions;
use std::io::Write;
use std::thread;
use std::time::Duration;

use crate::survey::*;

const BOM: &str = "\u{feff}";
const HEADER_ATTEMPTS: usize = 100;
const HEADER_WAIT: Duration = Duration::from_millis(5);

/// One JSON file per submission, named after the record id.
pub struct JsonFileSink {
    directory: PathBuf,
}

impl JsonFileSink {
    pub fn new(directory: &Path) -> JsonFileSink {
        JsonFileSink {
            directory: directory.to_path_buf(),
        }
    }

    pub fn file_path(&self, record: &SubmissionRecord) -> PathBuf {
        self.directory
            .join(format!("responses_{}.json", record.id()))
    }
}

fn record_js(record: &SubmissionRecord) -> JSValue {
    let mut m = serde_json::Map::new();
    for (k, v) in record.fields() {
        m.insert(k.clone(), JSValue::String(v.clone()));
    }
    JSValue::Object(m)
}

impl RecordSink for JsonFileSink {
    fn name(&self) -> &str {
        "Local JSON"
    }

    fn kind(&self) -> SinkKind {
        SinkKind::Local
    }

    fn write(&mut self, record: &SubmissionRecord) -> Result<Vec<String>, SinkError> {
        let path = self.file_path(record);
        let pretty =
            serde_json::to_string_pretty(&record_js(record)).map_err(|e| SinkError::new(self.name(), e))?;
        // Ids are unique: an existing file is never overwritten.
        let mut f = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|e| SinkError::new(self.name(), format!("{}: {}", path.display(), e)))?;
        f.write_all(pretty.as_bytes())
            .map_err(|e| SinkError::new(self.name(), format!("{}: {}", path.display(), e)))?;
        debug!("JsonFileSink: wrote {:?}", path);
        Ok(vec![])
    }
}

/// A single CSV file holding every submission, one row each.
///
/// The header is written with the first row and never rewritten. Later
/// records are laid out along that header. Keys the header does not know are
/// appended at the end of the row.
pub struct CumulativeCsvSink {
    path: PathBuf,
}

impl CumulativeCsvSink {
    pub fn new(path: &Path) -> CumulativeCsvSink {
        CumulativeCsvSink {
            path: path.to_path_buf(),
        }
    }

    fn err(&self, e: impl std::fmt::Display) -> SinkError {
        SinkError::new(self.name(), format!("{}: {}", self.path.display(), e))
    }

    /// The header of the existing file, or `None` while its first line is
    /// not complete yet.
    fn read_header(&self) -> Result<Option<Vec<String>>, SinkError> {
        let contents = fs::read(&self.path).map_err(|e| self.err(e))?;
        let first_line = match contents.iter().position(|b| *b == b'\n') {
            Some(end) => &contents[..end],
            None => return Ok(None),
        };
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(first_line);
        match rdr.records().next() {
            None => Ok(None),
            Some(line_r) => {
                let line = line_r.map_err(|e| self.err(e))?;
                let header: Vec<String> = line
                    .iter()
                    .enumerate()
                    .map(|(idx, h)| {
                        if idx == 0 {
                            h.trim_start_matches(BOM).to_string()
                        } else {
                            h.to_string()
                        }
                    })
                    .collect();
                Ok(Some(header))
            }
        }
    }

    // The session that creates the file writes the header; the others wait
    // until its first line is complete.
    fn create_with_header(&self, record: &SubmissionRecord) -> Result<bool, SinkError> {
        let mut f = match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&self.path)
        {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => return Ok(false),
            Err(e) => return Err(self.err(e)),
        };
        let header: Vec<String> = record.keys().iter().map(|k| k.to_string()).collect();
        let values: Vec<String> = record.values().iter().map(|v| v.to_string()).collect();
        let mut bytes: Vec<u8> = BOM.as_bytes().to_vec();
        bytes.append(&mut csv_lines(&[header, values]).map_err(|e| self.err(e))?);
        f.write_all(&bytes).map_err(|e| self.err(e))?;
        info!("CumulativeCsvSink: created {:?}", self.path);
        Ok(true)
    }
}

/// Formats the lines as CSV, in memory.
fn csv_lines(lines: &[Vec<String>]) -> Result<Vec<u8>, String> {
    let mut wtr = csv::WriterBuilder::new().from_writer(vec![]);
    for l in lines {
        wtr.write_record(l).map_err(|e| e.to_string())?;
    }
    wtr.into_inner().map_err(|e| e.to_string())
}

/// Lays the record out along an existing header.
///
/// Returns the row and the keys of the record missing from the header.
pub fn row_for_header(record: &SubmissionRecord, header: &[String]) -> (Vec<String>, Vec<String>) {
    let mut row = record.values_for(header);
    let mut extra: Vec<String> = Vec::new();
    for (k, v) in record.fields() {
        if !header.contains(k) {
            extra.push(k.clone());
            row.push(v.clone());
        }
    }
    (row, extra)
}

/// Says where the values of a record went when its keys do not match the
/// header: which extra key sits in which unlabeled column, and which header
/// columns were left empty.
pub fn drift_notice(
    record: &SubmissionRecord,
    header: &[String],
    extra: &[String],
    target: &str,
) -> Option<String> {
    let missing: Vec<&str> = header
        .iter()
        .filter(|h| record.get(h).is_none())
        .map(|h| h.as_str())
        .collect();
    if extra.is_empty() && missing.is_empty() {
        return None;
    }
    let mut parts: Vec<String> = Vec::new();
    if !extra.is_empty() {
        let placed: Vec<String> = extra
            .iter()
            .enumerate()
            .map(|(idx, k)| format!("{}=column {}", k, header.len() + idx + 1))
            .collect();
        parts.push(format!("unlabeled columns {}", placed.join(", ")));
    }
    if !missing.is_empty() {
        parts.push(format!("empty columns {}", missing.join(", ")));
    }
    Some(format!(
        "record {} in {}: {}",
        record.id(),
        target,
        parts.join("; ")
    ))
}

impl RecordSink for CumulativeCsvSink {
    fn name(&self) -> &str {
        "Local CSV"
    }

    fn kind(&self) -> SinkKind {
        SinkKind::Local
    }

    fn write(&mut self, record: &SubmissionRecord) -> Result<Vec<String>, SinkError> {
        let mut attempts = 0;
        let header = loop {
            if self.create_with_header(record)? {
                return Ok(vec![]);
            }
            if let Some(header) = self.read_header()? {
                break header;
            }
            attempts += 1;
            if attempts >= HEADER_ATTEMPTS {
                return Err(self.err("the file has no complete header row"));
            }
            debug!("CumulativeCsvSink: waiting for the header of {:?}", self.path);
            thread::sleep(HEADER_WAIT);
        };

        let (row, extra) = row_for_header(record, &header);
        let target = self.path.display().to_string();
        let notices: Vec<String> = drift_notice(record, &header, &extra, &target)
            .into_iter()
            .collect();
        let bytes = csv_lines(&[row]).map_err(|e| self.err(e))?;
        let mut f = OpenOptions::new()
            .append(true)
            .open(&self.path)
            .map_err(|e| self.err(e))?;
        f.write_all(&bytes).map_err(|e| self.err(e))?;
        debug!("CumulativeCsvSink: appended record {} to {:?}", record.id(), self.path);
        Ok(notices)
    }
}
