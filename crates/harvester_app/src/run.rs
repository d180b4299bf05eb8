use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use engine_logging::{engine_info, engine_warn};
use harvester_core::ListRequest;
use harvester_engine::{AtomicFileWriter, ClientSettings, GitHubClient, Harvester, Issue};
use tokio_util::sync::CancellationToken;

use crate::config::AppConfig;

/// Outcome of one harvest run, as written to disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub output: PathBuf,
    pub fetched: usize,
    pub written: usize,
    pub failed_pages: usize,
}

/// Harvests the configured repository and writes the selected issues as JSON.
pub async fn run(
    config: &AppConfig,
    token: Option<String>,
    cancel: CancellationToken,
) -> Result<RunSummary> {
    let client = GitHubClient::new(ClientSettings {
        base_url: config.api_base_url.clone(),
        token,
        ..ClientSettings::default()
    })
    .context("failed to build API client")?;

    let harvester =
        Harvester::new(client, config.options.to_fetch_options()).with_cancellation(cancel);
    let request = ListRequest::new(&config.owner, &config.repository, config.state);
    let harvest = harvester.harvest(&request).await?;

    let fetched = harvest.items.len();
    let failed_pages = harvest.warnings.len();
    let selected = select_issues(harvest.items, &config.allowed_authors);
    let output = write_issues(&config.output, &selected)?;

    engine_info!(
        "Wrote {} of {} fetched items to {:?}",
        selected.len(),
        fetched,
        output
    );
    if failed_pages > 0 {
        engine_warn!(
            "Output for {} is incomplete: {} pages failed",
            request,
            failed_pages
        );
    }

    Ok(RunSummary {
        output,
        fetched,
        written: selected.len(),
        failed_pages,
    })
}

/// Drops pull requests and, when `allowed_authors` is non-empty, issues by
/// anyone else.
pub fn select_issues(items: Vec<Issue>, allowed_authors: &[String]) -> Vec<Issue> {
    items
        .into_iter()
        .filter(|issue| !issue.is_pull_request())
        .filter(|issue| {
            allowed_authors.is_empty()
                || issue
                    .author_login()
                    .is_some_and(|login| allowed_authors.iter().any(|a| a == login))
        })
        .collect()
}

fn write_issues(output: &Path, issues: &[Issue]) -> Result<PathBuf> {
    let filename = output
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| anyhow!("output {:?} does not name a file", output))?;
    let dir = match output.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let path = AtomicFileWriter::new(dir)
        .write_json(filename, issues)
        .with_context(|| format!("failed to write {:?}", output))?;
    Ok(path)
}
