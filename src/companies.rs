use regex::Regex;
use std::collections::HashMap;
use std::sync::{Arc, LazyLock};
use url::form_urlencoded;

use crate::models::{CompanyInfo, Job};

pub const UNKNOWN_COMPANY: &str = "Unknown";

/// Group jobs by company, busiest companies first.
///
/// Companies with equal job counts keep the order in which they first
/// appear in `jobs`, and each company's members keep input order.
pub fn aggregate(jobs: &[Job]) -> Vec<CompanyInfo> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut companies: Vec<CompanyInfo> = Vec::new();

    for job in jobs {
        let name = if job.company.is_empty() {
            UNKNOWN_COMPANY
        } else {
            job.company.as_str()
        };

        let slot = *index.entry(name).or_insert_with(|| {
            companies.push(CompanyInfo {
                name: name.to_string(),
                job_count: 0,
                locations: Vec::new(),
                sources: Vec::new(),
                jobs: Vec::new(),
            });
            companies.len() - 1
        });

        let info = &mut companies[slot];
        info.job_count += 1;
        info.jobs.push(job.clone());

        if !job.location.is_empty() && !info.locations.contains(&job.location) {
            info.locations.push(job.location.clone());
        }
        if !job.site.is_empty() && !info.sources.contains(&job.site) {
            info.sources.push(job.site.clone());
        }
    }

    // sort_by is stable: ties stay in first-seen order
    companies.sort_by(|a, b| b.job_count.cmp(&a.job_count));
    companies
}

/// Caches `aggregate` output for the last job list it saw.
///
/// The cache key is the identity of the shared list, so a render loop can
/// ask for companies every frame and only pays for a regroup after the
/// search session publishes a new list.
#[derive(Default)]
pub struct CompanyView {
    source: Option<Arc<Vec<Job>>>,
    companies: Vec<CompanyInfo>,
}

impl CompanyView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn companies(&mut self, jobs: &Arc<Vec<Job>>) -> &[CompanyInfo] {
        let fresh = match &self.source {
            Some(prev) => !Arc::ptr_eq(prev, jobs),
            None => true,
        };
        if fresh {
            self.companies = aggregate(jobs);
            self.source = Some(Arc::clone(jobs));
        }
        &self.companies
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompanyLinks {
    pub glassdoor: String,
    pub linkedin: String,
}

static NON_SLUG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-z0-9]+").expect("valid regex"));

pub fn company_links(name: &str) -> CompanyLinks {
    // Spaces as %20, not the form-encoded '+'
    let keyword = form_urlencoded::byte_serialize(name.as_bytes())
        .collect::<String>()
        .replace('+', "%20");
    let glassdoor = format!(
        "https://www.glassdoor.com/Search/results.htm?keyword={}",
        keyword
    );

    let slug = NON_SLUG.replace_all(&name.to_lowercase(), "-").into_owned();

    CompanyLinks {
        glassdoor,
        linkedin: format!("https://www.linkedin.com/company/{}", slug),
    }
}
