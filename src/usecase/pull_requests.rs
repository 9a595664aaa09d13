use thiserror::Error;
use tracing::{debug, info, warn};

use super::CancelToken;
use crate::domain::config::Config;
use crate::domain::notice::{Notice, Severity};
use crate::domain::pull_request::PullRequest;
use crate::repo::Cache;
use crate::repo::github::model::SearchPage;
use crate::repo::github::{ApiError, GithubApi, MAX_SEARCH_PAGES, search_page_url, search_query};

/// Why a load produced no rows.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("GitHub token is missing. Please set it in Settings to view private PRs.")]
    MissingToken,
    #[error("GitHub username is missing. Please set it in Settings.")]
    MissingUsername,
    #[error(
        "Invalid GitHub token or insufficient permissions. Please check your token in Settings (ensure 'repo' scope)."
    )]
    BadCredentials,
    #[error("Error fetching pull requests: {status} - {message}")]
    Api { status: u16, message: String },
    #[error("Could not connect to GitHub: {0}")]
    Network(String),
    #[error("Could not set up the GitHub client: {0}")]
    Client(String),
    #[error("superseded by a newer refresh")]
    Cancelled,
}

impl FetchError {
    pub fn severity(&self) -> Severity {
        match self {
            FetchError::MissingToken | FetchError::MissingUsername => Severity::Warning,
            FetchError::Cancelled => Severity::Info,
            _ => Severity::Error,
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            FetchError::MissingToken => "Authentication Required",
            FetchError::MissingUsername => "Configuration Required",
            FetchError::BadCredentials => "Authentication Failed",
            FetchError::Api { .. } => "API Error",
            FetchError::Network(_) => "Network Error",
            FetchError::Client(_) => "Client Error",
            FetchError::Cancelled => "Cancelled",
        }
    }

    pub fn to_notice(&self) -> Notice {
        Notice::new(self.severity(), self.title(), self.to_string())
    }
}

impl From<ApiError> for FetchError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::Unauthorized => FetchError::BadCredentials,
            ApiError::Status { status, message } => FetchError::Api { status, message },
            other => FetchError::Network(other.to_string()),
        }
    }
}

pub fn ensure_credentials(config: &Config) -> Result<(), FetchError> {
    if config.token.trim().is_empty() {
        return Err(FetchError::MissingToken);
    }
    if config.username.trim().is_empty() {
        return Err(FetchError::MissingUsername);
    }
    Ok(())
}

/// Keeps PRs whose repository owner matches `username`, or the opposite when
/// `show_others_only` is set.
pub fn retain_by_owner(
    pulls: Vec<PullRequest>,
    username: &str,
    show_others_only: bool,
) -> Vec<PullRequest> {
    pulls
        .into_iter()
        .filter(|pr| pr.repo_owner().eq_ignore_ascii_case(username) != show_others_only)
        .collect()
}

/// Collects every open PR authored by the configured user, page by page.
///
/// Pages are served from `cache` while fresh. Any failed page aborts the whole
/// search and nothing gathered so far is returned.
pub fn search_pull_requests<A>(
    api: &A,
    cache: &mut dyn Cache<SearchPage>,
    config: &Config,
    cancel: &CancelToken,
) -> Result<Vec<PullRequest>, FetchError>
where
    A: GithubApi + ?Sized,
{
    ensure_credentials(config)?;
    let username = config.username.trim();
    let query = search_query(username, config.show_others_only);
    info!(%query, "fetching pull requests");

    let mut pulls = Vec::new();
    for page in 1..=MAX_SEARCH_PAGES {
        if cancel.is_cancelled() {
            return Err(FetchError::Cancelled);
        }
        let url = search_page_url(api.api_base(), &query, page);
        let result = match cache.get(&url) {
            Some(cached) => {
                debug!(%url, "search page served from cache");
                cached
            }
            None => {
                let fetched = api.search_page(&url).map_err(|err| {
                    warn!(%url, error = %err, "search request failed");
                    FetchError::from(err)
                })?;
                if fetched.is_empty() {
                    break;
                }
                cache.put(&url, fetched.clone());
                fetched
            }
        };
        pulls.extend(result.pull_requests());
        if !result.has_next {
            break;
        }
        if page == MAX_SEARCH_PAGES {
            debug!(pages = MAX_SEARCH_PAGES, "search page cap reached; listing truncated");
        }
    }

    Ok(retain_by_owner(pulls, username, config.show_others_only))
}
