use anyhow::{Context, Result};
use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

const DEFAULT_LEVEL: &str = "info";

// Dependencies that are chatty at info level.
const NOISY: &[(&str, &str)] = &[
    ("hyper", "warn"),
    ("hyper_util", "warn"),
    ("reqwest", "warn"),
    ("rusqlite", "warn"),
];

fn build_env_filter() -> EnvFilter {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return filter;
    }
    let mut directives = vec![DEFAULT_LEVEL.to_string()];
    for (target, level) in NOISY {
        directives.push(format!("{}={}", target, level));
    }
    EnvFilter::new(directives.join(","))
}

pub fn init_stderr() {
    tracing_subscriber::fmt()
        .with_env_filter(build_env_filter())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

pub fn init_file(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open log file {}", path.display()))?;

    tracing_subscriber::fmt()
        .with_env_filter(build_env_filter())
        .with_ansi(false)
        .with_writer(Mutex::new(file))
        .init();
    Ok(())
}
