use super::sheet::{ReportSheet, TOTAL_HOURS};
use crate::types::ReportKind;
use std::path::Path;
use tracing::{error, info, warn};

/// Result of classifying a sheet, kept for logging and tests.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Classification {
    pub kind: ReportKind,
    /// Mean of "Total Hours"; `None` when the column is missing or has no numbers.
    pub average_total_hours: Option<f64>,
}

/// Mean of the values present, skipping blanks.
pub fn mean(values: &[Option<f64>]) -> Option<f64> {
    let present: Vec<f64> = values.iter().flatten().copied().collect();
    if present.is_empty() {
        return None;
    }
    Some(present.iter().sum::<f64>() / present.len() as f64)
}

/// Volunteer reports average at least `threshold` total hours per family;
/// parking patrol reports average less.
pub fn classify(sheet: &ReportSheet, threshold: f64) -> Classification {
    let Some(total_hours) = sheet.numeric_column(TOTAL_HOURS) else {
        return Classification {
            kind: ReportKind::Unknown,
            average_total_hours: None,
        };
    };
    let average = mean(&total_hours);
    // An undefined mean never reaches the threshold
    let kind = match average {
        Some(avg) if avg >= threshold => ReportKind::Volunteer,
        _ => ReportKind::Parking,
    };
    Classification {
        kind,
        average_total_hours: average,
    }
}

/// Logs how a report was classified.
pub fn log_classification(name: &str, result: &Classification, threshold: f64) {
    match (result.kind, result.average_total_hours) {
        (ReportKind::Unknown, _) => warn!(
            "'{}' column not found in {}. Could not determine report type.",
            TOTAL_HOURS, name
        ),
        (kind, Some(avg)) => info!(
            "Report: {} - Average Total Hours: {:.2}. Threshold: {}. Determined type: {}",
            name, avg, threshold, kind
        ),
        (kind, None) => info!(
            "Report: {} - Average Total Hours: n/a. Threshold: {}. Determined type: {}",
            name, threshold, kind
        ),
    }
}

/// Reads and classifies a workbook; unreadable files are Unknown.
pub fn classify_file(path: &Path, threshold: f64) -> ReportKind {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    match ReportSheet::open(path) {
        Ok(sheet) => {
            let result = classify(&sheet, threshold);
            log_classification(&name, &result, threshold);
            result.kind
        }
        Err(e) => {
            error!("An error occurred while reading the excel file {}: {}", path.display(), e);
            ReportKind::Unknown
        }
    }
}
