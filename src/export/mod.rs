//! Result export to CSV and JSON

use std::path::Path;

use crate::error::Result;
use crate::types::results::ResultRecord;

/// CSV header row
pub const CSV_HEADER: &str = "label,description,value,link";

/// Render results as CSV
///
/// Every value is quoted and embedded quotes are doubled. Missing fields are
/// empty strings.
#[must_use]
pub fn results_to_csv(results: &[ResultRecord]) -> String {
    let mut out = String::with_capacity(CSV_HEADER.len() + 1 + results.len() * 64);
    out.push_str(CSV_HEADER);
    out.push('\n');
    for record in results {
        let fields = [
            record.label(),
            record.description(),
            record.value(),
            record.link(),
        ];
        let row: Vec<String> = fields
            .iter()
            .map(|field| quote(field.as_deref().unwrap_or_default()))
            .collect();
        out.push_str(&row.join(","));
        out.push('\n');
    }
    out
}

/// Render results as a pretty-printed JSON array of the raw records
///
/// # Errors
/// Returns error if serialization fails
pub fn results_to_json(results: &[ResultRecord]) -> Result<String> {
    Ok(serde_json::to_string_pretty(results)?)
}

/// Write results as CSV to `path`
///
/// # Errors
/// Returns error if the file cannot be written
pub async fn write_csv(path: impl AsRef<Path>, results: &[ResultRecord]) -> Result<()> {
    tokio::fs::write(path.as_ref(), results_to_csv(results)).await?;
    log::info!(
        "Wrote {} result(s) to {}",
        results.len(),
        path.as_ref().display()
    );
    Ok(())
}

/// Write results as JSON to `path`
///
/// # Errors
/// Returns error if serialization fails or the file cannot be written
pub async fn write_json(path: impl AsRef<Path>, results: &[ResultRecord]) -> Result<()> {
    tokio::fs::write(path.as_ref(), results_to_json(results)?).await?;
    log::info!(
        "Wrote {} result(s) to {}",
        results.len(),
        path.as_ref().display()
    );
    Ok(())
}

fn quote(field: &str) -> String {
    format!("\"{}\"", field.replace('"', "\"\""))
}
