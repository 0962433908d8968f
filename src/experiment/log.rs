//! Markdown experiment log
//!
//! Each record is appended as one block:
//!
//! ```text
//! # Experiment 3
//! > ridge on scaled features
//!
//! **Mean score**: 9.8123
//!
//! **Time elapsed**: 0.42s
//!
//! (fenced estimator description)
//! ```
//!
//! The file is never created or rewritten here. Parsing is line-oriented and
//! tolerant: anything it does not recognise is skipped.

use serde::Serialize;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;
use tracing::{debug, warn};

use super::ExperimentRecord;
use crate::{Error, Result};

const HEADER_PREFIX: &str = "# Experiment";
const DESCRIPTION_PREFIX: &str = ">";
const SCORE_PREFIX: &str = "**Mean score**:";
const DURATION_PREFIX: &str = "**Time elapsed**:";
const FENCE: &str = "```";

/// Render the block appended for `record`.
#[must_use]
pub fn render_record(record: &ExperimentRecord) -> String {
    let description = record.description().replace(['\r', '\n'], " ");
    format!(
        "{HEADER_PREFIX} {}\n{DESCRIPTION_PREFIX} {description}\n\n\
         {SCORE_PREFIX} {:.4}\n\n\
         {DURATION_PREFIX} {}s\n\n\
         {FENCE}text\n{}\n{FENCE}\n\n",
        record.number(),
        record.mean_score(),
        (record.duration_secs() * 100.0).round() / 100.0,
        record.estimator().trim_end(),
    )
}

/// Append `record` to the existing log at `path`.
///
/// # Errors
///
/// Returns [`Error::LogFileMissing`] without writing anything if `path` does
/// not exist, or an IO error if the append fails.
pub fn append_record<P: AsRef<Path>>(path: P, record: &ExperimentRecord) -> Result<()> {
    let path = path.as_ref();
    if !path.is_file() {
        return Err(Error::LogFileMissing(path.to_path_buf()));
    }

    let mut file = OpenOptions::new().append(true).open(path)?;
    file.write_all(render_record(record).as_bytes())?;
    file.flush()?;

    debug!(path = %path.display(), number = record.number(), "experiment appended");
    Ok(())
}

/// One record recovered from the log
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParsedRecord {
    /// Position among parsed records, from 0
    pub index: usize,
    /// Number from the `# Experiment N` header, when present
    pub logged_number: Option<u32>,
    /// Description text
    pub description: String,
    /// Mean CV score
    pub mean_score: f64,
    /// Duration in seconds
    pub duration_secs: f64,
}

#[derive(Default)]
struct Pending {
    logged_number: Option<u32>,
    description: Option<String>,
    mean_score: Option<f64>,
    duration_secs: Option<f64>,
}

impl Pending {
    fn is_empty(&self) -> bool {
        self.description.is_none() && self.mean_score.is_none() && self.duration_secs.is_none()
    }

    fn complete(&mut self, index: usize) -> Option<ParsedRecord> {
        match (&self.description, self.mean_score, self.duration_secs) {
            (Some(description), Some(mean_score), Some(duration_secs)) => {
                let record = ParsedRecord {
                    index,
                    logged_number: self.logged_number,
                    description: description.clone(),
                    mean_score,
                    duration_secs,
                };
                *self = Self::default();
                Some(record)
            }
            _ => None,
        }
    }
}

/// Parse log text into records, in file order.
///
/// A record is emitted once its description, score and duration have all
/// been seen. The index is the record's position in the output, which can
/// differ from the logged experiment number.
#[must_use]
pub fn parse_log_str(text: &str) -> Vec<ParsedRecord> {
    let mut records = Vec::new();
    let mut pending = Pending::default();
    let mut in_fence = false;

    for (line_no, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.starts_with(FENCE) {
            in_fence = !in_fence;
            continue;
        }
        if in_fence {
            continue;
        }

        if let Some(rest) = line.strip_prefix(HEADER_PREFIX) {
            if !pending.is_empty() {
                warn!(line = line_no + 1, "incomplete experiment block dropped");
            }
            pending = Pending {
                logged_number: rest.trim().parse().ok(),
                ..Pending::default()
            };
        } else if let Some(rest) = line.strip_prefix(SCORE_PREFIX) {
            match rest.trim().parse::<f64>() {
                Ok(score) => pending.mean_score = Some(score),
                Err(_) => warn!(line = line_no + 1, "unparseable score skipped"),
            }
        } else if let Some(rest) = line.strip_prefix(DURATION_PREFIX) {
            let value = rest.trim();
            match value.strip_suffix('s').unwrap_or(value).trim().parse::<f64>() {
                Ok(secs) => pending.duration_secs = Some(secs),
                Err(_) => warn!(line = line_no + 1, "unparseable duration skipped"),
            }
        } else if let Some(rest) = line.strip_prefix(DESCRIPTION_PREFIX) {
            pending.description = Some(rest.trim().to_string());
        }

        if let Some(record) = pending.complete(records.len()) {
            records.push(record);
        }
    }
    records
}

/// Read and parse the log at `path`.
///
/// # Errors
///
/// Returns [`Error::LogFileMissing`] if `path` does not exist.
pub fn parse_log<P: AsRef<Path>>(path: P) -> Result<Vec<ParsedRecord>> {
    let path = path.as_ref();
    if !path.is_file() {
        return Err(Error::LogFileMissing(path.to_path_buf()));
    }
    Ok(parse_log_str(&fs::read_to_string(path)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(number: u32, score: f64) -> ExperimentRecord {
        ExperimentRecord::builder(number, format!("run {number}"))
            .mean_score(score)
            .duration_secs(1.234)
            .estimator("Pipeline(steps=[\n> not a description\n**Mean score**: 0.0\n])")
            .build()
    }

    #[test]
    fn test_render_block_layout() {
        let block = render_record(&record(2, 8.765_43));
        let lines: Vec<&str> = block.lines().collect();
        assert_eq!(lines[0], "# Experiment 2");
        assert_eq!(lines[1], "> run 2");
        assert_eq!(lines[3], "**Mean score**: 8.7654");
        assert_eq!(lines[5], "**Time elapsed**: 1.23s");
        assert_eq!(lines[7], "```text");
        assert!(block.ends_with("```\n\n"));
    }

    #[test]
    fn test_fenced_lines_are_ignored() {
        let text = render_record(&record(1, 5.0)) + &render_record(&record(2, 4.0));
        let parsed = parse_log_str(&text);
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].description, "run 1");
        assert!((parsed[1].mean_score - 4.0).abs() < 1e-12);
    }

    #[test]
    fn test_index_is_sequential_not_logged_number() {
        let text = render_record(&record(10, 5.0)) + &render_record(&record(4, 4.0));
        let parsed = parse_log_str(&text);
        assert_eq!(parsed[0].index, 0);
        assert_eq!(parsed[0].logged_number, Some(10));
        assert_eq!(parsed[1].index, 1);
        assert_eq!(parsed[1].logged_number, Some(4));
    }

    #[test]
    fn test_unparseable_score_drops_record() {
        let text = "# Experiment 1\n> bad\n**Mean score**: n/a\n**Time elapsed**: 1s\n\
                    # Experiment 2\n> good\n**Mean score**: 3.5\n**Time elapsed**: 2.5s\n";
        let parsed = parse_log_str(text);
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].description, "good");
        assert!((parsed[0].duration_secs - 2.5).abs() < 1e-12);
    }

    #[test]
    fn test_multiline_description_is_flattened() {
        let r = ExperimentRecord::builder(1, "first\nsecond")
            .mean_score(1.0)
            .build();
        let parsed = parse_log_str(&render_record(&r));
        assert_eq!(parsed[0].description, "first second");
    }
}
