use crate::error::{ReportError, Result};

/// Turns a non-2xx Google API response into `ReportError::Google`.
pub async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(ReportError::Google {
        status: status.as_u16(),
        body,
    })
}

/// Quotes a value for a Drive `q` expression.
pub fn drive_query_literal(value: &str) -> String {
    format!("'{}'", value.replace('\\', "\\\\").replace('\'', "\\'"))
}
