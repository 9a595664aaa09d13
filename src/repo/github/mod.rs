pub mod auth;
#[cfg(test)]
pub mod fake;
pub mod model;

use std::time::Duration;

use anyhow::{Result, anyhow};
use model::{ReviewPayload, SearchPage};
use octocrab::{Octocrab, Page};
use thiserror::Error;
use tokio::runtime::Handle;
use tracing::debug;

pub const DEFAULT_API_BASE: &str = "https://api.github.com";
pub const PER_PAGE: u32 = 100;
/// GitHub search never returns more than 1000 results.
pub const MAX_SEARCH_PAGES: u32 = 10;
const SEARCH_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ApiError {
    #[error("bad credentials (HTTP 401)")]
    Unauthorized,
    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    #[error("{0}")]
    Transport(String),
}

impl From<octocrab::Error> for ApiError {
    fn from(err: octocrab::Error) -> Self {
        match err {
            octocrab::Error::GitHub { source, .. } => {
                let status = source.status_code.as_u16();
                if status == 401 {
                    ApiError::Unauthorized
                } else {
                    ApiError::Status {
                        status,
                        message: source.message.clone(),
                    }
                }
            }
            other => ApiError::Transport(other.to_string()),
        }
    }
}

/// Owner, repo and number of a pull request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PrRef {
    pub owner: String,
    pub repo: String,
    pub number: u64,
}

/// The two hosting API calls the viewer needs.
pub trait GithubApi {
    fn api_base(&self) -> &str;
    /// Fetches one search page by its full url.
    fn search_page(&self, url: &str) -> Result<SearchPage, ApiError>;
    fn list_reviews(&self, pr: &PrRef) -> Result<Vec<ReviewPayload>, ApiError>;
}

pub fn search_query(username: &str, show_others_only: bool) -> String {
    let scope = if show_others_only { "-user" } else { "user" };
    format!("is:pr+state:open+author:{username}+{scope}:{username}+archived:false")
}

pub fn search_page_url(api_base: &str, query: &str, page: u32) -> String {
    format!(
        "{}/search/issues?q={query}&page={page}&per_page={PER_PAGE}",
        api_base.trim_end_matches('/')
    )
}

/// Path and query of `url` below `api_base`. octocrab joins its own base
/// path in front of every request, so full urls must not be passed to it.
pub fn api_route<'a>(api_base: &str, url: &'a str) -> &'a str {
    url.strip_prefix(api_base.trim_end_matches('/'))
        .filter(|rest| rest.starts_with('/'))
        .unwrap_or(url)
}

pub fn reviews_route(pr: &PrRef) -> String {
    format!(
        "/repos/{}/{}/pulls/{}/reviews?per_page={PER_PAGE}",
        pr.owner, pr.repo, pr.number
    )
}

/// Parses `.../repos/{owner}/{repo}/issues/{number}` into its parts.
///
/// Search results address PRs through the issues API; the `pulls` form is
/// accepted too.
pub fn parse_pr_api_url(url: &str) -> Option<PrRef> {
    let (_, path) = url.split_once("/repos/")?;
    let mut segments = path.split('/').filter(|s| !s.is_empty());
    let owner = segments.next()?;
    let repo = segments.next()?;
    if !matches!(segments.next()?, "issues" | "pulls") {
        return None;
    }
    let number = segments.next()?.parse().ok()?;
    Some(PrRef {
        owner: owner.to_string(),
        repo: repo.to_string(),
        number,
    })
}

/// octocrab-backed client. Calls block the current thread on `handle`.
pub struct OctocrabApi {
    octo: Octocrab,
    handle: Handle,
    api_base: String,
}

impl OctocrabApi {
    pub fn connect(handle: Handle, token: &str, api_base: &str) -> Result<Self> {
        let api_base = api_base.trim_end_matches('/');
        let _guard = handle.enter();
        let mut builder = Octocrab::builder().personal_token(token.to_owned());
        if api_base != DEFAULT_API_BASE {
            builder = builder
                .base_uri(api_base)
                .map_err(|e| anyhow!("invalid GitHub API url {api_base}: {e}"))?;
        }
        let octo = builder
            .build()
            .map_err(|e| anyhow!("failed to init GitHub client: {e}"))?;
        Ok(Self {
            octo,
            handle,
            api_base: api_base.to_string(),
        })
    }
}

impl GithubApi for OctocrabApi {
    fn api_base(&self) -> &str {
        &self.api_base
    }

    fn search_page(&self, url: &str) -> Result<SearchPage, ApiError> {
        let route = api_route(&self.api_base, url);
        debug!(%url, %route, "calling GitHub search API");
        self.handle.block_on(async {
            let request = self.octo.get::<Page<serde_json::Value>, _, _>(route, None::<&()>);
            let page = tokio::time::timeout(SEARCH_TIMEOUT, request)
                .await
                .map_err(|_| ApiError::Timeout(SEARCH_TIMEOUT))??;
            Ok::<_, ApiError>(SearchPage::new(
                page.items,
                page.total_count,
                page.next.is_some(),
            ))
        })
    }

    fn list_reviews(&self, pr: &PrRef) -> Result<Vec<ReviewPayload>, ApiError> {
        let route = reviews_route(pr);
        debug!(%route, "calling GitHub reviews API");
        let reviews = self
            .handle
            .block_on(self.octo.get::<Vec<ReviewPayload>, _, _>(route, None::<&()>))?;
        Ok(reviews)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_scopes_to_own_or_foreign_repos() {
        assert_eq!(
            search_query("alice", false),
            "is:pr+state:open+author:alice+user:alice+archived:false"
        );
        assert_eq!(
            search_query("alice", true),
            "is:pr+state:open+author:alice+-user:alice+archived:false"
        );
    }

    #[test]
    fn page_url_carries_page_and_size() {
        assert_eq!(
            search_page_url("https://api.github.com/", "q1", 3),
            "https://api.github.com/search/issues?q=q1&page=3&per_page=100"
        );
    }

    #[test]
    fn routes_are_relative_to_api_base() {
        let ghe = "https://ghe.corp/api/v3";
        let url = search_page_url(ghe, "q1", 2);
        assert_eq!(api_route(ghe, &url), "/search/issues?q=q1&page=2&per_page=100");
        assert_eq!(
            api_route("https://ghe.corp/api/v3/", &url),
            "/search/issues?q=q1&page=2&per_page=100"
        );

        let url = search_page_url(DEFAULT_API_BASE, "q1", 1);
        assert_eq!(api_route(DEFAULT_API_BASE, &url), "/search/issues?q=q1&page=1&per_page=100");

        // a different host is passed through untouched
        assert_eq!(api_route(ghe, "https://other.host/x"), "https://other.host/x");
        assert_eq!(api_route(ghe, "https://ghe.corp/api/v30/x"), "https://ghe.corp/api/v30/x");
    }

    #[test]
    fn reviews_route_has_no_base_path() {
        let pr = PrRef {
            owner: "team".into(),
            repo: "svc".into(),
            number: 7,
        };
        assert_eq!(reviews_route(&pr), "/repos/team/svc/pulls/7/reviews?per_page=100");
    }

    #[test]
    fn parses_pull_request_api_url() {
        let pr = parse_pr_api_url("https://api.github.com/repos/alice/tool/issues/42").unwrap();
        assert_eq!(
            pr,
            PrRef {
                owner: "alice".into(),
                repo: "tool".into(),
                number: 42
            }
        );

        let pulls = parse_pr_api_url("https://api.github.com/repos/alice/tool/pulls/42").unwrap();
        assert_eq!(pulls, pr);

        let ghe = parse_pr_api_url("https://ghe.corp/api/v3/repos/team/svc/issues/7").unwrap();
        assert_eq!(ghe.owner, "team");
        assert_eq!(ghe.number, 7);
    }

    #[test]
    fn rejects_non_pull_urls() {
        assert!(parse_pr_api_url("https://api.github.com/repos/alice/tool/commits/42").is_none());
        assert!(parse_pr_api_url("https://api.github.com/repos/alice/tool/issues/abc").is_none());
        assert!(parse_pr_api_url("https://api.github.com/users/alice").is_none());
    }
}
