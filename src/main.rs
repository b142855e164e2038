mod companies;
mod config;
mod db;
mod export;
mod logging;
mod models;
mod saved;
mod search;
mod tui;

use anyhow::{anyhow, Result};
use clap::{Args, Parser, Subcommand};
use config::Config;
use db::{Database, KeyValueStore, MemoryStore};
use models::{SearchParams, WorkType};
use saved::SavedJobs;
use search::{HttpBackend, SearchSession};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "career-hunter")]
#[command(about = "Job search dashboard - search listings, group by company, save the ones you like")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one search and print the results
    Search {
        #[command(flatten)]
        params: SearchArgs,

        /// Group results by company
        #[arg(long)]
        companies: bool,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,

        /// Export the job with this ID to CSV and mark it saved
        #[arg(long, value_name = "JOB_ID")]
        export: Option<String>,
    },

    /// Interactive dashboard
    Dashboard {
        #[command(flatten)]
        params: SearchArgs,
    },

    /// Manage saved jobs
    Saved {
        #[command(subcommand)]
        command: SavedCommands,
    },
}

#[derive(Args)]
struct SearchArgs {
    /// Job role/title to search for
    #[arg(short, long, default_value = "")]
    role: String,

    /// Country code (AU, US, UK, NZ, CA, IN, SG)
    #[arg(short, long, default_value = "AU")]
    country: String,

    /// Location/city to search in
    #[arg(short, long, default_value = "Australia")]
    location: String,

    /// Salary range, e.g. 200k-250k
    #[arg(short, long, default_value = "")]
    salary: String,

    /// Work arrangement (all, remote, hybrid, onsite)
    #[arg(short, long, default_value = "all")]
    work_type: WorkType,

    /// Maximum number of results per source
    #[arg(short = 'n', long, default_value = "25")]
    limit: u32,
}

impl From<SearchArgs> for SearchParams {
    fn from(args: SearchArgs) -> Self {
        SearchParams {
            role: args.role,
            country: args.country,
            location: args.location,
            salary: args.salary,
            work_type: args.work_type,
            limit: args.limit,
        }
    }
}

#[derive(Subcommand)]
enum SavedCommands {
    /// List saved jobs
    List,

    /// Unmark a saved job
    Remove {
        /// Job ID
        job_id: String,
    },

    /// Unmark all saved jobs
    Clear,
}

/// Saved jobs backed by the database, or by memory if it cannot be opened.
fn open_saved_jobs(config: &Config) -> SavedJobs {
    let store: Box<dyn KeyValueStore> = match Database::open(config.db_path.as_deref()) {
        Ok(db) => {
            info!(path = %db.path().display(), "opened database");
            Box::new(db)
        }
        Err(e) => {
            warn!("Saved jobs will not persist: {:#}", e);
            Box::new(MemoryStore::default())
        }
    };
    SavedJobs::open(store)
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env()?;

    match &cli.command {
        Commands::Dashboard { .. } => logging::init_file(&config.log_file())?,
        _ => logging::init_stderr(),
    }

    let mut saved = open_saved_jobs(&config);

    match cli.command {
        Commands::Search {
            params,
            companies: by_company,
            json,
            export: export_id,
        } => {
            let runtime = tokio::runtime::Runtime::new()?;
            let backend = HttpBackend::new(&config.api_url, config.request_timeout)?;
            info!(endpoint = backend.endpoint(), "searching");
            let session = SearchSession::new(Arc::new(backend));

            runtime.block_on(session.search(params.into()));
            let state = session.snapshot();

            if let Some(error) = state.error {
                return Err(anyhow!(error));
            }

            if let Some(job_id) = export_id {
                let job = state
                    .jobs
                    .iter()
                    .find(|j| j.id == job_id)
                    .ok_or_else(|| anyhow!("Job '{}' is not in the results", job_id))?;
                let file_name = export::export_job(job, &config.export_dir)?;
                saved.save_job(&job.id, &file_name);
                println!("Saved as {}", config.export_dir.join(&file_name).display());
                return Ok(());
            }

            if by_company {
                let grouped = companies::aggregate(&state.jobs);
                if json {
                    println!("{}", serde_json::to_string_pretty(&grouped)?);
                } else if grouped.is_empty() {
                    println!("No jobs found.");
                } else {
                    println!(
                        "{:<30} {:>5} {:<36} {:<20}",
                        "COMPANY", "OPEN", "LOCATIONS", "SOURCES"
                    );
                    println!("{}", "-".repeat(94));
                    for company in grouped {
                        println!(
                            "{:<30} {:>5} {:<36} {:<20}",
                            truncate(&company.name, 28),
                            company.job_count,
                            truncate(&company.locations.join(", "), 34),
                            truncate(&company.sources.join(", "), 20)
                        );
                    }
                }
            } else if json {
                println!("{}", serde_json::to_string_pretty(state.jobs.as_ref())?);
            } else if state.jobs.is_empty() {
                println!("No jobs found.");
            } else {
                println!(
                    "{:<14} {:<30} {:<20} {:<16} {:<14} {:<10} {:<5}",
                    "ID", "TITLE", "COMPANY", "LOCATION", "SALARY", "SOURCE", "SAVED"
                );
                println!("{}", "-".repeat(115));
                for job in state.jobs.iter() {
                    let salary = if job.salary_range.is_empty() {
                        "N/A"
                    } else {
                        job.salary_range.as_str()
                    };
                    println!(
                        "{:<14} {:<30} {:<20} {:<16} {:<14} {:<10} {:<5}",
                        truncate(&job.id, 14),
                        truncate(&job.title, 28),
                        truncate(&job.company, 18),
                        truncate(&job.location, 14),
                        truncate(salary, 14),
                        truncate(&job.site, 10),
                        if saved.is_job_saved(&job.id) { "yes" } else { "" }
                    );
                }
            }
        }

        Commands::Dashboard { params } => {
            let runtime = tokio::runtime::Runtime::new()?;
            let backend = HttpBackend::new(&config.api_url, config.request_timeout)?;
            let session = SearchSession::new(Arc::new(backend));
            tui::run_dashboard(
                session,
                runtime.handle().clone(),
                saved,
                config.export_dir.clone(),
                params.into(),
            )?;
        }

        Commands::Saved { command } => match command {
            SavedCommands::List => {
                if saved.is_empty() {
                    println!("No saved jobs.");
                } else {
                    println!("{:<24} {:<44} {:<20}", "JOB ID", "FILE", "SAVED");
                    println!("{}", "-".repeat(90));
                    for info in saved.list() {
                        let when = chrono::DateTime::from_timestamp_millis(info.saved_at)
                            .map(|t| {
                                t.with_timezone(&chrono::Local)
                                    .format("%Y-%m-%d %H:%M")
                                    .to_string()
                            })
                            .unwrap_or_default();
                        println!(
                            "{:<24} {:<44} {:<20}",
                            truncate(&info.job_id, 24),
                            truncate(&info.file_name, 44),
                            when
                        );
                    }
                }
            }

            SavedCommands::Remove { job_id } => {
                if saved.is_job_saved(&job_id) {
                    saved.unsave_job(&job_id);
                    println!("Unsaved '{}'.", job_id);
                } else {
                    println!("Job '{}' is not saved.", job_id);
                }
            }

            SavedCommands::Clear => {
                let count = saved.len();
                saved.clear();
                println!("Cleared {} saved job(s).", count);
            }
        },
    }

    Ok(())
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
