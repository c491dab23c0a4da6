use crate::error::{ReportError, Result};
use calamine::{open_workbook_auto, Data, Reader};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Text,
    Number,
}

/// A column the portal's hours reports are known to carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportColumn {
    pub name: &'static str,
    pub kind: ColumnKind,
}

const fn text(name: &'static str) -> ReportColumn {
    ReportColumn { name, kind: ColumnKind::Text }
}

const fn number(name: &'static str) -> ReportColumn {
    ReportColumn { name, kind: ColumnKind::Number }
}

pub const TOTAL_HOURS: &str = "Total Hours";
pub const TARGET_HOURS: &str = "Target Hours";
pub const FINISHED_HOURS: &str = "Finished Hours";
pub const FUNDRAISING_HOURS: &str = "FundRaising Hours";

/// Report columns in table order.
pub const REPORT_COLUMNS: [ReportColumn; 16] = [
    text("Last Name"),
    text("First Name"),
    text("Child Last Name"),
    text("Child First Name"),
    text("Children"),
    text("Email"),
    text("Telephone"),
    number("Upcoming Hours"),
    number("Pending Hours"),
    number(FINISHED_HOURS),
    number("Adhoc Hours"),
    number(TOTAL_HOURS),
    number(FUNDRAISING_HOURS),
    number(TARGET_HOURS),
    number("Adjustment Hours"),
    text("Adjust Notes"),
];

#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Number(f64),
    Text(String),
    Bool(bool),
}

impl Cell {
    /// Numeric value; numeric-looking text counts, blanks do not.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Cell::Number(n) if !n.is_nan() => Some(*n),
            Cell::Text(s) => s.trim().parse::<f64>().ok().filter(|n| !n.is_nan()),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<String> {
        match self {
            Cell::Empty => None,
            Cell::Text(s) => Some(s.clone()),
            Cell::Bool(b) => Some(b.to_string()),
            // Phone numbers and ids come through as floats
            Cell::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => Some(format!("{}", *n as i64)),
            Cell::Number(n) => Some(n.to_string()),
        }
    }
}

impl From<&Data> for Cell {
    fn from(value: &Data) -> Self {
        match value {
            Data::Empty => Cell::Empty,
            Data::Int(i) => Cell::Number(*i as f64),
            Data::Float(f) => Cell::Number(*f),
            Data::Bool(b) => Cell::Bool(*b),
            Data::String(s) if s.trim().is_empty() => Cell::Empty,
            Data::String(s) => Cell::Text(s.clone()),
            other => Cell::Text(other.to_string()),
        }
    }
}

/// The first worksheet of a report: a header row and data rows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReportSheet {
    headers: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

impl ReportSheet {
    /// Builds a sheet, trimming header names.
    pub fn new(headers: Vec<String>, rows: Vec<Vec<Cell>>) -> Self {
        let headers = headers.into_iter().map(|h| h.trim().to_string()).collect();
        Self { headers, rows }
    }

    pub fn open(path: &Path) -> Result<Self> {
        let mut workbook = open_workbook_auto(path)?;
        let range = workbook.worksheet_range_at(0).ok_or_else(|| {
            ReportError::MissingField(format!("worksheet in {}", path.display()))
        })??;

        let mut rows = range.rows();
        let headers = match rows.next() {
            Some(header_row) => header_row
                .iter()
                .map(|c| Cell::from(c).as_text().unwrap_or_default())
                .collect(),
            None => Vec::new(),
        };
        let rows = rows
            .map(|r| r.iter().map(Cell::from).collect::<Vec<_>>())
            .filter(|r: &Vec<Cell>| r.iter().any(|c| *c != Cell::Empty))
            .collect();
        Ok(Self::new(headers, rows))
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    pub fn cell(&self, row: usize, column: usize) -> &Cell {
        self.rows
            .get(row)
            .and_then(|r| r.get(column))
            .unwrap_or(&Cell::Empty)
    }

    /// Every row's value for `name`, `None` where blank or not numeric.
    pub fn numeric_column(&self, name: &str) -> Option<Vec<Option<f64>>> {
        let idx = self.column_index(name)?;
        Some((0..self.rows.len()).map(|r| self.cell(r, idx).as_f64()).collect())
    }

    pub fn text_column(&self, name: &str) -> Option<Vec<Option<String>>> {
        let idx = self.column_index(name)?;
        Some((0..self.rows.len()).map(|r| self.cell(r, idx).as_text()).collect())
    }

    /// Headers that are not part of the known report layout.
    pub fn unexpected_columns(&self) -> Vec<&str> {
        self.headers
            .iter()
            .filter(|h| !h.is_empty() && !REPORT_COLUMNS.iter().any(|c| c.name == h.as_str()))
            .map(|h| h.as_str())
            .collect()
    }
}
