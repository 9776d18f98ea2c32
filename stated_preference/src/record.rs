use chrono::{DateTime, Local};
use log::{info, warn};
use uuid::Uuid;

use crate::config::*;

pub const ID_KEY: &str = "id";
pub const TIMESTAMP_KEY: &str = "timestamp";

/// The final, flattened output of a completed session.
///
/// Keys come in a fixed order: identity, demographic fields in form order,
/// then the task responses in the order the tasks were shown. The record is
/// never modified after construction.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct SubmissionRecord {
    fields: Vec<(String, String)>,
}

impl SubmissionRecord {
    pub fn new(
        id: Uuid,
        timestamp: DateTime<Local>,
        demographics: &[(String, String)],
        responses: &[(String, String)],
    ) -> SubmissionRecord {
        let mut fields: Vec<(String, String)> = vec![
            (ID_KEY.to_string(), id.to_string()),
            (
                TIMESTAMP_KEY.to_string(),
                timestamp.format("%Y-%m-%dT%H:%M:%S%.6f").to_string(),
            ),
        ];
        // Later entries win on duplicate keys.
        for (k, v) in demographics.iter().chain(responses.iter()) {
            if let Some(existing) = fields.iter_mut().find(|(k2, _)| k2 == k) {
                existing.1 = v.clone();
            } else {
                fields.push((k.clone(), v.clone()));
            }
        }
        SubmissionRecord { fields }
    }

    pub fn id(&self) -> &str {
        self.get(ID_KEY).unwrap_or_default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn keys(&self) -> Vec<&str> {
        self.fields.iter().map(|(k, _)| k.as_str()).collect()
    }

    pub fn values(&self) -> Vec<&str> {
        self.fields.iter().map(|(_, v)| v.as_str()).collect()
    }

    /// The values in the order of the given header. Unknown keys give empty strings.
    pub fn values_for(&self, header: &[String]) -> Vec<String> {
        header
            .iter()
            .map(|h| self.get(h).unwrap_or_default().to_string())
            .collect()
    }

    pub fn fields(&self) -> &[(String, String)] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

// ********* Sinks **********

#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum SinkKind {
    /// Durable storage on this machine.
    Local,
    /// An external service.
    Remote,
}

/// A destination for completed submissions.
///
/// Implementations must only append: a record is never rewritten in place.
pub trait RecordSink {
    fn name(&self) -> &str;

    fn kind(&self) -> SinkKind;

    /// Writes the record. The returned strings are non-fatal notices
    /// (for example a header that does not match the record).
    fn write(&mut self, record: &SubmissionRecord) -> Result<Vec<String>, SinkError>;
}

#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum PersistStatus {
    /// Every sink accepted the record.
    Persisted,
    /// At least one local sink holds the record, but some sink failed.
    LocalOnly,
    /// No local sink holds the record.
    Failed,
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct DispatchReport {
    pub status: PersistStatus,
    pub failures: Vec<SinkError>,
    pub notices: Vec<String>,
}

/// Sends the record to every sink, in order.
///
/// The writes are independent: a failure is recorded and the remaining sinks
/// still run. Nothing is rolled back.
pub fn dispatch(record: &SubmissionRecord, sinks: &mut [Box<dyn RecordSink>]) -> DispatchReport {
    let mut failures: Vec<SinkError> = Vec::new();
    let mut notices: Vec<String> = Vec::new();
    let mut local_ok = 0;
    for sink in sinks.iter_mut() {
        match sink.write(record) {
            Ok(mut n) => {
                info!("dispatch: record {} saved to {}", record.id(), sink.name());
                for notice in n.iter() {
                    warn!("dispatch: {}: {}", sink.name(), notice);
                }
                notices.append(&mut n);
                if sink.kind() == SinkKind::Local {
                    local_ok += 1;
                }
            }
            Err(e) => {
                warn!("dispatch: record {}: {}", record.id(), e);
                failures.push(e);
            }
        }
    }
    let status = if local_ok == 0 {
        PersistStatus::Failed
    } else if failures.is_empty() {
        PersistStatus::Persisted
    } else {
        PersistStatus::LocalOnly
    };
    DispatchReport {
        status,
        failures,
        notices,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct MemorySink {
        kind: SinkKind,
        fail: bool,
        written: Vec<SubmissionRecord>,
    }

    impl RecordSink for MemorySink {
        fn name(&self) -> &str {
            "memory"
        }
        fn kind(&self) -> SinkKind {
            self.kind
        }
        fn write(&mut self, record: &SubmissionRecord) -> Result<Vec<String>, SinkError> {
            if self.fail {
                return Err(SinkError::new("memory", "unavailable"));
            }
            self.written.push(record.clone());
            Ok(vec![])
        }
    }

    fn sink(kind: SinkKind, fail: bool) -> Box<dyn RecordSink> {
        Box::new(MemorySink {
            kind,
            fail,
            written: vec![],
        })
    }

    fn record() -> SubmissionRecord {
        SubmissionRecord::new(
            Uuid::new_v4(),
            Local::now(),
            &[("residence".to_string(), "Pune".to_string())],
            &[
                ("Task_3".to_string(), "walking".to_string()),
                ("Task_1".to_string(), "e-rickshaw".to_string()),
            ],
        )
    }

    #[test]
    fn keys_keep_insertion_order() {
        let r = record();
        assert_eq!(r.keys(), vec!["id", "timestamp", "residence", "Task_3", "Task_1"]);
        assert_eq!(r.id().len(), 36);
        assert_eq!(
            r.values_for(&["Task_1".to_string(), "gender".to_string()]),
            vec!["e-rickshaw".to_string(), "".to_string()]
        );
    }

    #[test]
    fn remote_failure_keeps_local_writes() {
        let mut sinks = vec![
            sink(SinkKind::Local, false),
            sink(SinkKind::Local, false),
            sink(SinkKind::Remote, true),
        ];
        let report = dispatch(&record(), &mut sinks);
        assert_eq!(report.status, PersistStatus::LocalOnly);
        assert_eq!(report.failures.len(), 1);
    }

    #[test]
    fn all_sinks_run_after_a_failure() {
        let mut sinks = vec![
            sink(SinkKind::Local, true),
            sink(SinkKind::Local, true),
            sink(SinkKind::Remote, false),
        ];
        let report = dispatch(&record(), &mut sinks);
        assert_eq!(report.status, PersistStatus::Failed);
        assert_eq!(report.failures.len(), 2);
    }

    #[test]
    fn everything_saved() {
        let mut sinks = vec![sink(SinkKind::Local, false), sink(SinkKind::Remote, false)];
        let report = dispatch(&record(), &mut sinks);
        assert_eq!(report.status, PersistStatus::Persisted);
        assert!(report.failures.is_empty());
    }
}
