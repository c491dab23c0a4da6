use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of OnVolunteers hours report, inferred from its contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportKind {
    Volunteer,
    Parking,
    Unknown,
}

impl ReportKind {
    /// Kinds that have an archive folder, a lake prefix and a table.
    pub const KNOWN: [ReportKind; 2] = [ReportKind::Volunteer, ReportKind::Parking];

    pub fn as_str(&self) -> &'static str {
        match self {
            ReportKind::Volunteer => "volunteer",
            ReportKind::Parking => "parking",
            ReportKind::Unknown => "unknown",
        }
    }

    /// Archive folder and file prefix, e.g. `parking-hours`.
    pub fn archive_prefix(&self) -> &'static str {
        match self {
            ReportKind::Volunteer => "volunteer-hours",
            ReportKind::Parking => "parking-hours",
            ReportKind::Unknown => "unknown-reports",
        }
    }

    /// Name of the analytical table holding this kind.
    pub fn table_name(&self) -> Option<&'static str> {
        match self {
            ReportKind::Volunteer => Some("volunteer_hours"),
            ReportKind::Parking => Some("parking_hours"),
            ReportKind::Unknown => None,
        }
    }
}

impl fmt::Display for ReportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a processed report came from and where it went.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Provenance {
    pub report_id: String,
    pub report_type: String,
    pub report_date: String,
    pub processed_timestamp: String,
    pub source_filename: String,
    pub email_id: String,
    pub email_sender: String,
    pub email_subject: String,
    pub gdrive_file_id: Option<String>,
    pub gdrive_folder_path: String,
}

/// Counters reported at the end of an inbox run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InboxRunSummary {
    pub emails_found: usize,
    pub attachments_processed: usize,
    pub uploaded: usize,
    pub unknown: usize,
    pub snapshots_written: usize,
    pub marked_read: usize,
    pub errors: Vec<String>,
}
