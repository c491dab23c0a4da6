//! Local archive of classified reports under `<reports_dir>/<kind>-hours/`.

use crate::error::Result;
use crate::types::ReportKind;
use chrono::{DateTime, Local, NaiveDate};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

const DATE_FORMATS: [&str; 2] = ["%Y-%m-%d", "%Y%m%d"];

/// A report moved to its final local location.
#[derive(Debug, Clone, PartialEq)]
pub struct ArchivedReport {
    pub path: PathBuf,
    pub file_name: String,
    pub report_date: NaiveDate,
}

/// Strips leading slashes and any directory part from an attachment name.
pub fn sanitize_attachment_name(name: &str) -> String {
    let trimmed = name.trim_start_matches('/');
    trimmed
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(trimmed)
        .to_string()
}

/// Date embedded in a portal file name such as
/// `OnVolunteers_Volunteer_Hours_Report2025-09-27__125741.xlsx`:
/// the text after the last `Report` up to `__`.
pub fn parse_report_date(file_name: &str) -> Option<NaiveDate> {
    let tail = file_name.rsplit("Report").next()?;
    let candidate = tail.split("__").next()?;
    let candidate = candidate.strip_suffix(".xlsx").unwrap_or(candidate);
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(candidate, fmt).ok())
}

/// Report date from the file name, falling back to `today`.
pub fn report_date_or(file_name: &str, today: NaiveDate) -> NaiveDate {
    match parse_report_date(file_name) {
        Some(date) => date,
        None => {
            warn!(
                "Could not parse date from filename: {}. Using current date.",
                file_name
            );
            today
        }
    }
}

pub fn archive_file_name(kind: ReportKind, date: NaiveDate) -> String {
    format!("{}-{}.xlsx", kind.archive_prefix(), date.format("%Y-%m-%d"))
}

/// Picks the final path: the plain name, or `_HHMM`-suffixed when the plain
/// name is taken. An existing suffixed file is overwritten.
pub fn resolve_target(
    target_dir: &Path,
    kind: ReportKind,
    date: NaiveDate,
    now: DateTime<Local>,
) -> PathBuf {
    let base_name = archive_file_name(kind, date);
    let base_path = target_dir.join(&base_name);
    if !base_path.exists() {
        return base_path;
    }

    info!("File {} already exists. Checking for timestamped version.", base_name);
    let stamped_name = format!(
        "{}-{}_{}.xlsx",
        kind.archive_prefix(),
        date.format("%Y-%m-%d"),
        now.format("%H%M")
    );
    let stamped_path = target_dir.join(&stamped_name);
    if stamped_path.exists() {
        info!("Timestamped file {} also exists. Overwriting.", stamped_name);
    } else {
        info!("Saving as timestamped file: {}", stamped_name);
    }
    stamped_path
}

/// Moves a downloaded report into its kind's archive folder.
pub fn archive_report(
    downloaded: &Path,
    reports_dir: &Path,
    kind: ReportKind,
    original_name: &str,
    now: DateTime<Local>,
) -> Result<ArchivedReport> {
    let report_date = report_date_or(original_name, now.date_naive());
    let target_dir = reports_dir.join(kind.archive_prefix());
    fs::create_dir_all(&target_dir)?;

    let path = resolve_target(&target_dir, kind, report_date, now);
    fs::rename(downloaded, &path)?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    info!("Renamed file to: {}", file_name);

    Ok(ArchivedReport {
        path,
        file_name,
        report_date,
    })
}
