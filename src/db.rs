use crate::data_lake::{self, LakeValue, PROVENANCE_COLUMNS};
use crate::error::Result;
use crate::report::sheet::{ColumnKind, REPORT_COLUMNS};
use crate::types::ReportKind;
use rusqlite::types::{ToSqlOutput, ValueRef};
use rusqlite::{params, Connection, ToSql};
use std::path::Path;
use tracing::info;

impl ToSql for LakeValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            LakeValue::Null => ToSqlOutput::Borrowed(ValueRef::Null),
            LakeValue::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            LakeValue::Number(n) => ToSqlOutput::Borrowed(ValueRef::Real(*n)),
        })
    }
}

/// Outcome of loading one report kind.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadOutcome {
    Loaded { table: &'static str, rows: usize, report_id: String },
    NoSnapshot,
}

/// Hours tables backed by a local SQLite file.
pub struct HoursDb {
    conn: Connection,
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn create_table_sql(table: &str) -> String {
    let columns: Vec<String> = PROVENANCE_COLUMNS
        .iter()
        .map(|c| format!("    {} TEXT", c))
        .chain(REPORT_COLUMNS.iter().map(|c| {
            let ty = match c.kind {
                ColumnKind::Text => "TEXT",
                ColumnKind::Number => "REAL",
            };
            format!("    {} {}", quote_ident(c.name), ty)
        }))
        .collect();
    format!("CREATE TABLE IF NOT EXISTS {} (\n{}\n);", table, columns.join(",\n"))
}

impl HoursDb {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        Ok(Self {
            conn: Connection::open(path)?,
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        Ok(Self {
            conn: Connection::open_in_memory()?,
        })
    }

    /// Creates the volunteer and parking tables if they do not exist.
    pub fn setup(&self) -> Result<()> {
        let mut sql = String::new();
        for kind in ReportKind::KNOWN {
            if let Some(table) = kind.table_name() {
                sql.push_str(&create_table_sql(table));
                sql.push('\n');
            }
        }
        self.conn.execute_batch(&sql)?;
        Ok(())
    }

    /// Loads a snapshot file, replacing rows from the same report.
    pub fn load_snapshot(&mut self, table: &'static str, path: &Path) -> Result<(usize, String)> {
        let snapshot = data_lake::read_snapshot(path)?;
        let report_id = snapshot.provenance().report_id;

        let column_list = snapshot
            .columns
            .iter()
            .map(|c| quote_ident(c))
            .collect::<Vec<_>>()
            .join(", ");
        let placeholders = (1..=snapshot.columns.len())
            .map(|i| format!("?{}", i))
            .collect::<Vec<_>>()
            .join(", ");
        let insert_sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            table, column_list, placeholders
        );

        let tx = self.conn.transaction()?;
        tx.execute(
            &format!("DELETE FROM {} WHERE report_id = ?1", table),
            params![report_id],
        )?;
        {
            let mut stmt = tx.prepare(&insert_sql)?;
            for row in &snapshot.rows {
                stmt.execute(rusqlite::params_from_iter(row.iter()))?;
            }
        }
        tx.commit()?;
        Ok((snapshot.rows.len(), report_id))
    }

    /// Loads the newest snapshot of `kind` from the lake.
    pub fn load_latest(&mut self, lake_dir: &Path, kind: ReportKind) -> Result<LoadOutcome> {
        let Some(table) = kind.table_name() else {
            return Ok(LoadOutcome::NoSnapshot);
        };
        let Some(path) = data_lake::latest_snapshot(lake_dir, kind)? else {
            info!("No {} hours parquet files found.", kind);
            return Ok(LoadOutcome::NoSnapshot);
        };

        info!("Loading data from {} into {} table...", path.display(), table);
        let (rows, report_id) = self.load_snapshot(table, &path)?;
        info!("{} rows of {} hours data loaded.", rows, kind);
        Ok(LoadOutcome::Loaded {
            table,
            rows,
            report_id,
        })
    }

    /// Runs `sql` and returns column names and stringified rows.
    pub fn query(&self, sql: &str) -> Result<QueryResult> {
        let mut stmt = self.conn.prepare(sql)?;
        let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();
        let width = columns.len();

        let mut rows = Vec::new();
        let mut cursor = stmt.query([])?;
        while let Some(row) = cursor.next()? {
            let mut values = Vec::with_capacity(width);
            for i in 0..width {
                values.push(render_value(row.get_ref(i)?));
            }
            rows.push(values);
        }
        Ok(QueryResult { columns, rows })
    }

    pub fn row_count(&self, table: &str) -> Result<i64> {
        Ok(self
            .conn
            .query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |r| r.get(0))?)
    }
}

fn render_value(value: ValueRef<'_>) -> String {
    match value {
        ValueRef::Null => "NULL".to_string(),
        ValueRef::Integer(i) => i.to_string(),
        ValueRef::Real(f) => f.to_string(),
        ValueRef::Text(t) => String::from_utf8_lossy(t).into_owned(),
        ValueRef::Blob(b) => format!("<{} bytes>", b.len()),
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl QueryResult {
    /// Column-aligned text table.
    pub fn render(&self) -> String {
        let mut widths: Vec<usize> = self.columns.iter().map(|c| c.chars().count()).collect();
        for row in &self.rows {
            for (w, v) in widths.iter_mut().zip(row) {
                *w = (*w).max(v.chars().count());
            }
        }
        let line = |cells: &[String]| {
            cells
                .iter()
                .zip(&widths)
                .map(|(c, w)| format!("{:<width$}", c, width = *w))
                .collect::<Vec<_>>()
                .join("  ")
                .trim_end()
                .to_string()
        };

        let mut out = vec![line(&self.columns)];
        out.push(
            widths
                .iter()
                .map(|w| "-".repeat(*w))
                .collect::<Vec<_>>()
                .join("  "),
        );
        out.extend(self.rows.iter().map(|r| line(r)));
        out.push(format!("({} rows)", self.rows.len()));
        out.join("\n")
    }
}
