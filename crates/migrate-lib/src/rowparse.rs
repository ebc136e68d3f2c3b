//! Export row parsing: one delimited row + header -> [`ParsedRow`].
//!
//! Column handling is declarative: [`rule_for`] maps a lower-cased header
//! name to a [`ColumnRule`], either a single-valued field (later columns
//! overwrite) or a repeating field (values append in column order).
//! Unmapped columns are ignored; blank cells are skipped entirely so they
//! never overwrite an earlier value or append an empty list element.
//!
//! Transformers are pure; a transformer failure is fatal for the run.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{MigrateError, Result};
use crate::model::{ParsedComment, ParsedRow};

/// Source date format used throughout the export, e.g. `Oct 15, 2014`.
const EXPORT_DATE_FORMAT: &str = "%b %d, %Y";

/// Comment trailer: `text (Author - Date)`.
static COMMENT_TRAILER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^(.*)\((.*) - (.*)\)\s*$").expect("valid comment pattern"));

/// How a mapped column contributes to the intermediate record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnRule {
    Single(SingleColumn),
    Repeated(RepeatedColumn),
}

/// Single-valued columns (a repeat overwrites).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SingleColumn {
    ExternalId,
    Title,
    Description,
    StoryType,
    Estimate,
    Priority,
    CurrentState,
    Labels,
    Url,
    CreatedAt,
    AcceptedAt,
    Deadline,
    RequestedBy,
    Iteration,
    IterationStart,
    IterationEnd,
}

/// Repeating columns (each occurrence appends, in column order).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepeatedColumn {
    Blocker,
    BlockerStatus,
    Task,
    TaskStatus,
    Reviewer,
    ReviewType,
    ReviewStatus,
    OwnedBy,
    Comment,
}

/// Look up the rule for a lower-cased column name.
#[must_use]
pub fn rule_for(column: &str) -> Option<ColumnRule> {
    use ColumnRule::{Repeated, Single};

    match column {
        "id" => Some(Single(SingleColumn::ExternalId)),
        "title" => Some(Single(SingleColumn::Title)),
        "description" => Some(Single(SingleColumn::Description)),
        "type" => Some(Single(SingleColumn::StoryType)),
        "estimate" => Some(Single(SingleColumn::Estimate)),
        "priority" => Some(Single(SingleColumn::Priority)),
        "current state" => Some(Single(SingleColumn::CurrentState)),
        "labels" => Some(Single(SingleColumn::Labels)),
        "url" => Some(Single(SingleColumn::Url)),
        "created at" => Some(Single(SingleColumn::CreatedAt)),
        "accepted at" => Some(Single(SingleColumn::AcceptedAt)),
        "deadline" => Some(Single(SingleColumn::Deadline)),
        "requested by" => Some(Single(SingleColumn::RequestedBy)),
        "iteration" => Some(Single(SingleColumn::Iteration)),
        "iteration start" => Some(Single(SingleColumn::IterationStart)),
        "iteration end" => Some(Single(SingleColumn::IterationEnd)),
        "blocker" => Some(Repeated(RepeatedColumn::Blocker)),
        "blocker status" => Some(Repeated(RepeatedColumn::BlockerStatus)),
        "task" => Some(Repeated(RepeatedColumn::Task)),
        "task status" => Some(Repeated(RepeatedColumn::TaskStatus)),
        "reviewer" => Some(Repeated(RepeatedColumn::Reviewer)),
        "review type" => Some(Repeated(RepeatedColumn::ReviewType)),
        "review status" => Some(Repeated(RepeatedColumn::ReviewStatus)),
        "owned by" => Some(Repeated(RepeatedColumn::OwnedBy)),
        "comment" => Some(Repeated(RepeatedColumn::Comment)),
        _ => None,
    }
}

/// Parse one export row against its lower-cased header.
///
/// `row_number` is 1-based and used only for error context.
///
/// # Errors
///
/// Returns `RowParse` if any cell fails its column transformer
/// (unparseable date, non-integer estimate, malformed comment trailer).
pub fn parse_row(headers: &[String], cells: &[String], row_number: usize) -> Result<ParsedRow> {
    let mut row = ParsedRow::default();

    for (ix, cell) in cells.iter().enumerate() {
        let value = cell.trim();
        if value.is_empty() {
            continue;
        }
        let Some(column) = headers.get(ix) else {
            continue;
        };
        let Some(rule) = rule_for(column) else {
            continue;
        };

        let fail = |reason: String| MigrateError::row_parse(row_number, column.clone(), reason);

        match rule {
            ColumnRule::Single(field) => match field {
                SingleColumn::ExternalId => row.external_id = Some(value.to_string()),
                SingleColumn::Title => row.name = Some(value.to_string()),
                SingleColumn::Description => row.description = Some(value.to_string()),
                SingleColumn::StoryType => row.story_type = Some(value.to_string()),
                SingleColumn::Estimate => {
                    row.estimate = Some(value.parse::<i64>().map_err(|e| fail(e.to_string()))?);
                }
                SingleColumn::Priority => row.priority = parse_priority(value),
                SingleColumn::CurrentState => row.state = Some(value.to_string()),
                SingleColumn::Labels => row.labels = parse_label_list(value),
                SingleColumn::Url => row.external_links = vec![value.to_string()],
                SingleColumn::CreatedAt => {
                    row.created_at = Some(parse_export_date(value).map_err(fail)?);
                }
                SingleColumn::AcceptedAt => {
                    row.accepted_at = Some(parse_export_date(value).map_err(fail)?);
                }
                SingleColumn::Deadline => {
                    row.deadline = Some(parse_export_date(value).map_err(fail)?);
                }
                SingleColumn::RequestedBy => row.requester = Some(value.to_string()),
                SingleColumn::Iteration => row.iteration_id = Some(value.to_string()),
                SingleColumn::IterationStart => {
                    row.iteration_start = Some(parse_export_date(value).map_err(fail)?);
                }
                SingleColumn::IterationEnd => {
                    row.iteration_end = Some(parse_export_date(value).map_err(fail)?);
                }
            },
            ColumnRule::Repeated(field) => match field {
                RepeatedColumn::Blocker => row.blockers.push(value.to_string()),
                RepeatedColumn::BlockerStatus => row.blocker_states.push(value.to_string()),
                RepeatedColumn::Task => row.task_titles.push(value.to_string()),
                RepeatedColumn::TaskStatus => row.task_states.push(value.to_string()),
                RepeatedColumn::Reviewer => row.reviewers.push(value.to_string()),
                RepeatedColumn::ReviewType => row.review_types.push(value.to_string()),
                RepeatedColumn::ReviewStatus => row.review_states.push(value.to_string()),
                RepeatedColumn::OwnedBy => row.owners.push(value.to_string()),
                RepeatedColumn::Comment => row.comments.push(parse_comment(value).map_err(fail)?),
            },
        }
    }

    Ok(row)
}

/// Parse an export date into ISO-8601 (`YYYY-MM-DD`).
fn parse_export_date(value: &str) -> std::result::Result<String, String> {
    NaiveDate::parse_from_str(value, EXPORT_DATE_FORMAT)
        .map(|d| d.format("%Y-%m-%d").to_string())
        .map_err(|e| format!("unparseable date '{value}': {e}"))
}

/// Parse an export date into an ISO-8601 datetime at midnight.
fn parse_export_datetime(value: &str) -> std::result::Result<String, String> {
    NaiveDate::parse_from_str(value, EXPORT_DATE_FORMAT)
        .map(|d| format!("{}T00:00:00", d.format("%Y-%m-%d")))
        .map_err(|e| format!("unparseable date '{value}': {e}"))
}

/// Split a comma-delimited label cell, trimming each name.
#[must_use]
pub fn parse_label_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .collect()
}

/// Normalize a priority token; `none` means no priority.
#[must_use]
pub fn parse_priority(value: &str) -> Option<String> {
    let lowered = value.to_lowercase();
    if lowered == "none" {
        None
    } else {
        Some(lowered)
    }
}

/// Decompose a comment cell into text, author, and creation date.
///
/// Comments without the `(Author - Date)` trailer keep the whole cell as
/// text.
fn parse_comment(value: &str) -> std::result::Result<ParsedComment, String> {
    COMMENT_TRAILER.captures(value).map_or_else(
        || {
            Ok(ParsedComment {
                text: value.to_string(),
                author: None,
                created_at: None,
            })
        },
        |caps| {
            let created_at = parse_export_datetime(caps[3].trim())?;
            Ok(ParsedComment {
                text: caps[1].trim().to_string(),
                author: Some(caps[2].trim().to_string()),
                created_at: Some(created_at),
            })
        },
    )
}

/// Streaming reader over an export file.
///
/// Headers are lower-cased once; each record is parsed on demand so a large
/// export never has to sit in memory twice.
pub struct ExportReader {
    headers: Vec<String>,
    reader: csv::Reader<BufReader<File>>,
    row_number: usize,
}

impl ExportReader {
    /// Open an export file and read its header row.
    ///
    /// # Errors
    ///
    /// Returns `FileNotFound` if the path does not exist, or `Csv` if the
    /// header cannot be read.
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                MigrateError::FileNotFound(path.to_path_buf())
            } else {
                MigrateError::Io(e)
            }
        })?;
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(BufReader::new(file));
        let headers = reader
            .headers()?
            .iter()
            .map(str::to_lowercase)
            .collect::<Vec<_>>();

        Ok(Self {
            headers,
            reader,
            row_number: 1,
        })
    }

    /// The lower-cased header row.
    #[must_use]
    pub fn headers(&self) -> &[String] {
        &self.headers
    }
}

impl Iterator for ExportReader {
    type Item = Result<ParsedRow>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut record = csv::StringRecord::new();
        match self.reader.read_record(&mut record) {
            Ok(false) => None,
            Ok(true) => {
                self.row_number += 1;
                let cells: Vec<String> = record.iter().map(ToString::to_string).collect();
                Some(parse_row(&self.headers, &cells, self.row_number))
            }
            Err(e) => Some(Err(MigrateError::Csv(e))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(names: &[&str]) -> Vec<String> {
        names.iter().map(ToString::to_string).collect()
    }

    fn cells(values: &[&str]) -> Vec<String> {
        values.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn parses_basic_fields() {
        let row = parse_row(
            &headers(&["title", "description"]),
            &cells(&["My Story Name", "My Story Description"]),
            2,
        )
        .unwrap();
        assert_eq!(row.name.as_deref(), Some("My Story Name"));
        assert_eq!(row.description.as_deref(), Some("My Story Description"));
    }

    #[test]
    fn repeated_comment_columns_preserve_order() {
        let row = parse_row(
            &headers(&["comment", "comment", "comment"]),
            &cells(&["Comment 1", "Comment 2", "Comment 3"]),
            2,
        )
        .unwrap();
        let texts: Vec<_> = row.comments.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["Comment 1", "Comment 2", "Comment 3"]);
    }

    #[test]
    fn label_list_trims_variants() {
        let row = parse_row(
            &headers(&["labels"]),
            &cells(&["a label , oneword, two words,three word salad"]),
            2,
        )
        .unwrap();
        assert_eq!(
            row.labels,
            vec!["a label", "oneword", "two words", "three word salad"]
        );
    }

    #[test]
    fn repeated_owner_columns_accumulate() {
        let row = parse_row(
            &headers(&["owned by", "owned by"]),
            &cells(&["Amy Williams", "Daniel McFadden"]),
            2,
        )
        .unwrap();
        assert_eq!(row.owners, vec!["Amy Williams", "Daniel McFadden"]);
    }

    #[test]
    fn blank_cells_are_skipped() {
        let row = parse_row(
            &headers(&["title", "comment", "comment", "comment"]),
            &cells(&["A Story", "First", "   ", "Third"]),
            2,
        )
        .unwrap();
        assert_eq!(row.comments.len(), 2);
        assert_eq!(row.comments[1].text, "Third");
    }

    #[test]
    fn comment_trailer_is_decomposed() {
        let row = parse_row(
            &headers(&["comment"]),
            &cells(&["Looks good to me (Amy Williams - Oct 15, 2014)"]),
            2,
        )
        .unwrap();
        let comment = &row.comments[0];
        assert_eq!(comment.text, "Looks good to me");
        assert_eq!(comment.author.as_deref(), Some("Amy Williams"));
        assert_eq!(comment.created_at.as_deref(), Some("2014-10-15T00:00:00"));
    }

    #[test]
    fn dates_become_iso() {
        let row = parse_row(
            &headers(&["created at", "deadline"]),
            &cells(&["Oct 15, 2014", "Nov 1, 2014"]),
            2,
        )
        .unwrap();
        assert_eq!(row.created_at.as_deref(), Some("2014-10-15"));
        assert_eq!(row.deadline.as_deref(), Some("2014-11-01"));
    }

    #[test]
    fn bad_date_is_fatal_with_context() {
        let err = parse_row(&headers(&["created at"]), &cells(&["yesterday"]), 7).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("Row 7"), "{msg}");
        assert!(msg.contains("created at"), "{msg}");
    }

    #[test]
    fn bad_estimate_is_fatal() {
        assert!(parse_row(&headers(&["estimate"]), &cells(&["large"]), 2).is_err());
    }

    #[test]
    fn priority_none_is_absent() {
        assert_eq!(parse_priority("p3 - Low").as_deref(), Some("p3 - low"));
        assert!(parse_priority("none").is_none());
    }

    #[test]
    fn unmapped_columns_are_ignored() {
        let row = parse_row(
            &headers(&["title", "pull request"]),
            &cells(&["A Story", "https://github.com/x/y/pull/1"]),
            2,
        )
        .unwrap();
        assert_eq!(row.name.as_deref(), Some("A Story"));
        assert!(row.external_links.is_empty());
    }
}
