//! Participation statistics over a single hours report.

use super::classify::mean;
use super::sheet::{ReportSheet, FINISHED_HOURS, FUNDRAISING_HOURS, TARGET_HOURS, TOTAL_HOURS};
use std::fmt;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CompletionBracket {
    UpTo25,
    UpTo50,
    UpTo75,
    UpTo100,
    Over100,
}

impl CompletionBracket {
    pub const ALL: [CompletionBracket; 5] = [
        CompletionBracket::UpTo25,
        CompletionBracket::UpTo50,
        CompletionBracket::UpTo75,
        CompletionBracket::UpTo100,
        CompletionBracket::Over100,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            CompletionBracket::UpTo25 => "0-25%",
            CompletionBracket::UpTo50 => "26-50%",
            CompletionBracket::UpTo75 => "51-75%",
            CompletionBracket::UpTo100 => "76-100%",
            CompletionBracket::Over100 => ">100%",
        }
    }

    /// Left-closed buckets `[0,25) [25,50) [50,75) [75,100) [100,inf)`.
    pub fn for_percent(percent: f64) -> Option<Self> {
        if percent.is_nan() || percent < 0.0 {
            return None;
        }
        Some(if percent < 25.0 {
            CompletionBracket::UpTo25
        } else if percent < 50.0 {
            CompletionBracket::UpTo50
        } else if percent < 75.0 {
            CompletionBracket::UpTo75
        } else if percent < 100.0 {
            CompletionBracket::UpTo100
        } else {
            CompletionBracket::Over100
        })
    }
}

impl fmt::Display for CompletionBracket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Each field is `None` when the columns it needs are absent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReportSummary {
    pub families: usize,
    pub completed_target: Option<usize>,
    pub with_finished_hours: Option<usize>,
    pub with_fundraising_hours: Option<usize>,
    pub average_total_hours: Option<f64>,
    pub completion_distribution: Option<Vec<(CompletionBracket, usize)>>,
}

/// Percent of target completed; missing or infinite ratios count as zero.
pub fn percent_complete(total: Option<f64>, target: Option<f64>) -> f64 {
    match (total, target) {
        (Some(total), Some(target)) => {
            let ratio = total / target;
            if ratio.is_finite() {
                ratio * 100.0
            } else {
                0.0
            }
        }
        _ => 0.0,
    }
}

fn count_positive(values: &[Option<f64>]) -> usize {
    values.iter().flatten().filter(|v| **v > 0.0).count()
}

pub fn analyze(sheet: &ReportSheet) -> ReportSummary {
    let total = sheet.numeric_column(TOTAL_HOURS);
    let target = sheet.numeric_column(TARGET_HOURS);

    let mut summary = ReportSummary {
        families: sheet.row_count(),
        with_finished_hours: sheet.numeric_column(FINISHED_HOURS).map(|v| count_positive(&v)),
        with_fundraising_hours: sheet
            .numeric_column(FUNDRAISING_HOURS)
            .map(|v| count_positive(&v)),
        average_total_hours: total.as_deref().and_then(mean),
        ..Default::default()
    };

    if let (Some(total), Some(target)) = (&total, &target) {
        summary.completed_target = Some(
            total
                .iter()
                .zip(target)
                .filter(|(t, g)| matches!((t, g), (Some(t), Some(g)) if t >= g))
                .count(),
        );

        let mut counts = [0usize; 5];
        for (t, g) in total.iter().zip(target) {
            if let Some(bracket) = CompletionBracket::for_percent(percent_complete(*t, *g)) {
                counts[bracket as usize] += 1;
            }
        }
        summary.completion_distribution = Some(
            CompletionBracket::ALL
                .iter()
                .map(|b| (*b, counts[*b as usize]))
                .collect(),
        );
    }

    summary
}

/// Emits the summary through tracing, one line per statistic.
pub fn log_summary(summary: &ReportSummary) {
    if let Some(n) = summary.completed_target {
        info!("Number of families who have completed their target hours: {}", n);
    }
    if let Some(n) = summary.with_finished_hours {
        info!("Number of families who have finished hours: {}", n);
    }
    if let Some(n) = summary.with_fundraising_hours {
        info!(
            "Number of families who have completed or registered fundraising hours: {}",
            n
        );
    }
    if let Some(avg) = summary.average_total_hours {
        info!("Average number of hours contributed per family: {:.2}", avg);
    }
    if let Some(distribution) = &summary.completion_distribution {
        info!("Distribution of families by percentage of target hours completed:");
        for (bracket, count) in distribution {
            info!("  {:<8} {}", bracket.label(), count);
        }
    }
}
