use super::{Record, RecordValue, Recorder};
use std::fmt::Write;

const RULE: &str = "=================================================================";

/// Streams records to stdout, one block per epoch.
///
/// ```text
/// =================================================================
/// Epoch 3
/// -----------------------------------------------------------------
/// episode_rewards           -312.581
/// frames                    2000.000
/// =================================================================
/// ```
#[derive(Debug, Default)]
pub struct StdoutRecorder;

impl StdoutRecorder {
    /// Constructs the recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Formats a record as printed by the recorder. Keys are sorted.
    pub fn format(epoch: Option<i64>, record: &Record) -> String {
        let mut out = String::new();
        let mut entries = record.iter().collect::<Vec<_>>();
        entries.sort_by(|a, b| a.0.cmp(b.0));

        let _ = writeln!(out, "{}", RULE);
        if let Some(epoch) = epoch {
            let _ = writeln!(out, "Epoch {}", epoch);
            let _ = writeln!(out, "{}", "-".repeat(RULE.len()));
        }
        for (k, v) in entries {
            let v = match v {
                RecordValue::Scalar(v) => format!("{:.3}", v),
                RecordValue::Array1(v) => format!("{:?}", v),
            };
            let _ = writeln!(out, "{:<25} {}", k, v);
        }
        let _ = write!(out, "{}", RULE);
        out
    }
}

impl Recorder for StdoutRecorder {
    fn write(&mut self, record: Record) {
        let epoch = record.get_scalar("epoch_idx").ok().map(|e| e as i64);
        println!("{}", Self::format(epoch, &record));
    }
}
