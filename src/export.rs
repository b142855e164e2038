use anyhow::{Context, Result};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::info;

use crate::models::Job;

pub const CSV_HEADER: &str = "Title,Company,Location,Salary,Site,Job URL,Company URL,Description";

static NON_ALNUM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-zA-Z0-9]").expect("valid regex"));

fn quote(value: &str) -> String {
    format!("\"{}\"", value.replace('"', "\"\""))
}

pub fn job_to_csv(job: &Job) -> String {
    let row = [
        &job.title,
        &job.company,
        &job.location,
        &job.salary_range,
        &job.site,
        &job.job_url,
        &job.company_url,
        &job.description,
    ]
    .iter()
    .map(|field| quote(field))
    .collect::<Vec<_>>()
    .join(",");

    format!("{}\n{}", CSV_HEADER, row)
}

/// `job_<company>_<millis>.csv`, with every non-alphanumeric character of
/// the company name replaced by `_`.
pub fn job_file_name(job: &Job, epoch_millis: i64) -> String {
    format!(
        "job_{}_{}.csv",
        NON_ALNUM.replace_all(&job.company, "_"),
        epoch_millis
    )
}

pub fn default_export_dir() -> PathBuf {
    directories::UserDirs::new()
        .and_then(|dirs| dirs.download_dir().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."))
}

pub fn export_job(job: &Job, dir: &Path) -> Result<String> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create export directory {}", dir.display()))?;

    let file_name = job_file_name(job, chrono::Utc::now().timestamp_millis());
    let path = dir.join(&file_name);
    std::fs::write(&path, job_to_csv(job))
        .with_context(|| format!("Failed to write {}", path.display()))?;

    info!(job_id = %job.id, path = %path.display(), "exported job");
    Ok(file_name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_job() -> Job {
        Job {
            id: "job_1".to_string(),
            site: "seek".to_string(),
            title: "Engineer".to_string(),
            company: "Tech Corp".to_string(),
            location: "Sydney".to_string(),
            job_url: "https://example.com/1".to_string(),
            salary_range: String::new(),
            company_url: String::new(),
            description: "He said \"go\"".to_string(),
        }
    }

    #[test]
    fn test_csv_quotes_every_field() {
        let csv = job_to_csv(&sample_job());
        let mut lines = csv.lines();
        assert_eq!(lines.next(), Some(CSV_HEADER));
        assert_eq!(
            lines.next(),
            Some(r#""Engineer","Tech Corp","Sydney","","seek","https://example.com/1","","He said ""go""""#)
        );
        assert_eq!(lines.next(), None);
    }

    #[test]
    fn test_file_name_sanitizes_company() {
        let name = job_file_name(&sample_job(), 1700000000123);
        assert_eq!(name, "job_Tech_Corp_1700000000123.csv");

        let mut job = sample_job();
        job.company = "AT&T (AU) Pty.".to_string();
        assert_eq!(job_file_name(&job, 5), "job_AT_T__AU__Pty__5.csv");
    }

    #[test]
    fn test_export_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let file_name = export_job(&sample_job(), dir.path()).unwrap();

        let pattern = Regex::new(r"^job_Tech_Corp_\d+\.csv$").unwrap();
        assert!(pattern.is_match(&file_name), "unexpected name {}", file_name);

        let written = std::fs::read_to_string(dir.path().join(&file_name)).unwrap();
        assert_eq!(written, job_to_csv(&sample_job()));
    }
}
