use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub site: String, // "linkedin", "indeed", "seek", etc.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub title: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub company: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub location: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub job_url: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub salary_range: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub company_url: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub description: String,
}

// The backend sends `null` for missing text columns.
fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkType {
    #[default]
    All,
    Remote,
    Hybrid,
    Onsite,
}

impl WorkType {
    pub const ALL: [WorkType; 4] = [
        WorkType::All,
        WorkType::Remote,
        WorkType::Hybrid,
        WorkType::Onsite,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            WorkType::All => "all",
            WorkType::Remote => "remote",
            WorkType::Hybrid => "hybrid",
            WorkType::Onsite => "onsite",
        }
    }

    pub fn cycle(self) -> Self {
        let idx = Self::ALL.iter().position(|w| *w == self).unwrap_or(0);
        Self::ALL[(idx + 1) % Self::ALL.len()]
    }
}

impl fmt::Display for WorkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WorkType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "all" => Ok(WorkType::All),
            "remote" => Ok(WorkType::Remote),
            "hybrid" => Ok(WorkType::Hybrid),
            "onsite" | "on-site" => Ok(WorkType::Onsite),
            other => Err(format!(
                "unknown work type '{}' (expected all, remote, hybrid or onsite)",
                other
            )),
        }
    }
}

/// Body of the search request. Built fresh for every search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchParams {
    pub role: String,
    pub country: String,
    pub location: String,
    pub salary: String,
    pub work_type: WorkType,
    pub limit: u32,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            role: String::new(),
            country: "AU".to_string(),
            location: "Australia".to_string(),
            salary: String::new(),
            work_type: WorkType::All,
            limit: 25,
        }
    }
}

/// Jobs grouped under one company name. Derived, never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompanyInfo {
    pub name: String,
    pub job_count: usize,
    pub locations: Vec<String>,
    pub sources: Vec<String>,
    pub jobs: Vec<Job>,
}

/// A job the user exported to CSV and flagged as saved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedJobInfo {
    pub job_id: String,
    pub file_name: String,
    pub saved_at: i64, // epoch millis
}
