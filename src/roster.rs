use crate::models::ApplicantRecord;
use std::io::Read;
use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum RosterError {
    #[error("failed to read roster {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("invalid roster data: {0}")]
    Csv(#[from] csv::Error),
    #[error("column '{column}' not found in roster; found columns: {found:?}")]
    MissingColumn { column: String, found: Vec<String> },
}

/// Load applicants in file order. Rows with both names blank are skipped.
pub fn load_roster(
    path: &Path,
    first_column: &str,
    last_column: &str,
) -> Result<Vec<ApplicantRecord>, RosterError> {
    let file = std::fs::File::open(path).map_err(|source| RosterError::Io {
        path: path.display().to_string(),
        source,
    })?;
    read_roster(file, first_column, last_column)
}

pub fn read_roster<R: Read>(
    reader: R,
    first_column: &str,
    last_column: &str,
) -> Result<Vec<ApplicantRecord>, RosterError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    let column_index = |column: &str| {
        headers
            .iter()
            .position(|header| header == column)
            .ok_or_else(|| RosterError::MissingColumn {
                column: column.to_string(),
                found: headers.clone(),
            })
    };
    let first_index = column_index(first_column)?;
    let last_index = column_index(last_column)?;

    let mut applicants = Vec::new();
    for row in reader.records() {
        let row = row?;
        let first = row.get(first_index).unwrap_or("").trim();
        let last = row.get(last_index).unwrap_or("").trim();
        if first.is_empty() && last.is_empty() {
            continue;
        }
        applicants.push(ApplicantRecord::new(first, last));
    }

    tracing::debug!(count = applicants.len(), "roster loaded");
    Ok(applicants)
}
