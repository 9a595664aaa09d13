use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::JoinHandle;

use anyhow::{Context, Result};
use tracing::{debug, error, info, warn};

use crate::domain::config::Config;
use crate::domain::pull_request::PrRow;
use crate::repo::Cache;
use crate::repo::github::GithubApi;
use crate::repo::github::model::{ReviewRecord, SearchPage};
use crate::usecase::CancelToken;
use crate::usecase::pull_requests::{FetchError, ensure_credentials, search_pull_requests};
use crate::usecase::review_state::review_state;

/// Builds an API client for the credentials of one load.
pub type Connect = Box<dyn FnMut(&Config) -> Result<Box<dyn GithubApi>> + Send>;

/// The two cache tables, owned by the worker thread.
pub struct Caches {
    pub pulls: Box<dyn Cache<SearchPage> + Send>,
    pub reviews: Box<dyn Cache<ReviewRecord> + Send>,
}

impl Caches {
    fn clear(&mut self) {
        self.pulls.clear();
        self.reviews.clear();
    }

    fn flush(&self) {
        if let Err(err) = self.pulls.flush() {
            warn!(error = %format!("{err:#}"), "failed to save PR cache");
        }
        if let Err(err) = self.reviews.flush() {
            warn!(error = %format!("{err:#}"), "failed to save review cache");
        }
    }
}

#[derive(Debug, Clone)]
pub struct SyncRequest {
    pub config: Config,
    /// Empty both caches before fetching.
    pub hard_refresh: bool,
}

#[derive(Debug)]
pub enum SyncEvent {
    Loaded { generation: u64, rows: Vec<PrRow> },
    Failed { generation: u64, error: FetchError },
}

impl SyncEvent {
    pub fn generation(&self) -> u64 {
        match self {
            SyncEvent::Loaded { generation, .. } | SyncEvent::Failed { generation, .. } => {
                *generation
            }
        }
    }
}

enum Command {
    Load { generation: u64, request: SyncRequest },
    Shutdown,
}

/// Handle to the background thread that talks to GitHub.
pub struct SyncWorker {
    commands: Sender<Command>,
    events: Receiver<SyncEvent>,
    latest: Arc<AtomicU64>,
    thread: Option<JoinHandle<()>>,
}

impl SyncWorker {
    pub fn spawn(caches: Caches, connect: Connect) -> Result<Self> {
        let (commands, command_rx) = mpsc::channel();
        let (event_tx, events) = mpsc::channel();
        let latest = Arc::new(AtomicU64::new(0));
        let state = WorkerState {
            caches,
            connect,
            latest: latest.clone(),
        };
        let thread = std::thread::Builder::new()
            .name("prwatch-sync".into())
            .spawn(move || state.run(command_rx, event_tx))
            .context("failed to spawn sync thread")?;
        Ok(Self {
            commands,
            events,
            latest,
            thread: Some(thread),
        })
    }

    /// Queues a load and returns its generation. Any earlier load still
    /// queued or running is superseded.
    pub fn request(&self, request: SyncRequest) -> u64 {
        let generation = self.latest.fetch_add(1, Ordering::SeqCst) + 1;
        if self
            .commands
            .send(Command::Load {
                generation,
                request,
            })
            .is_err()
        {
            error!("sync thread is gone; load request dropped");
        }
        generation
    }

    pub fn latest_generation(&self) -> u64 {
        self.latest.load(Ordering::SeqCst)
    }

    pub fn try_recv(&self) -> Option<SyncEvent> {
        self.events.try_recv().ok()
    }

    #[cfg(test)]
    pub fn recv_timeout(&self, timeout: std::time::Duration) -> Option<SyncEvent> {
        self.events.recv_timeout(timeout).ok()
    }

    /// Stops the thread after it saves both caches.
    pub fn shutdown(&mut self) {
        let Some(thread) = self.thread.take() else {
            return;
        };
        // Makes a running load stop at its next checkpoint.
        self.latest.fetch_add(1, Ordering::SeqCst);
        let _ = self.commands.send(Command::Shutdown);
        if thread.join().is_err() {
            error!("sync thread panicked");
        }
    }
}

impl Drop for SyncWorker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

struct WorkerState {
    caches: Caches,
    connect: Connect,
    latest: Arc<AtomicU64>,
}

impl WorkerState {
    fn run(mut self, commands: Receiver<Command>, events: Sender<SyncEvent>) {
        while let Ok(first) = commands.recv() {
            let Some((generation, request)) = coalesce(first, &commands) else {
                break;
            };
            let cancel = CancelToken::new(self.latest.clone(), generation);
            let event = match self.load(&request, &cancel) {
                Ok(rows) => SyncEvent::Loaded { generation, rows },
                Err(FetchError::Cancelled) => {
                    debug!(generation, "load superseded");
                    continue;
                }
                Err(error) => SyncEvent::Failed { generation, error },
            };
            if events.send(event).is_err() {
                break;
            }
        }
        self.caches.flush();
        info!("sync thread stopped");
    }

    fn load(&mut self, request: &SyncRequest, cancel: &CancelToken) -> Result<Vec<PrRow>, FetchError> {
        if request.hard_refresh {
            debug!("clearing caches");
            self.caches.clear();
        }
        ensure_credentials(&request.config)?;
        let api = (self.connect)(&request.config)
            .map_err(|err| FetchError::Client(format!("{err:#}")))?;

        let pulls = search_pull_requests(
            api.as_ref(),
            self.caches.pulls.as_mut(),
            &request.config,
            cancel,
        )?;
        info!(
            count = pulls.len(),
            user = %request.config.username,
            generation = cancel.generation(),
            "loaded open pull requests"
        );

        let mut rows = Vec::with_capacity(pulls.len());
        for pr in &pulls {
            if cancel.is_cancelled() {
                return Err(FetchError::Cancelled);
            }
            let state = review_state(api.as_ref(), self.caches.reviews.as_mut(), &pr.url);
            rows.push(PrRow::new(pr, state));
        }
        Ok(rows)
    }
}

/// Drains queued commands so only the newest load runs. A hard refresh
/// anywhere in the queue still clears the caches. `None` means shut down.
fn coalesce(first: Command, commands: &Receiver<Command>) -> Option<(u64, SyncRequest)> {
    let mut pending = match first {
        Command::Load {
            generation,
            request,
        } => (generation, request),
        Command::Shutdown => return None,
    };
    while let Ok(next) = commands.try_recv() {
        match next {
            Command::Load {
                generation,
                mut request,
            } => {
                request.hard_refresh |= pending.1.hard_refresh;
                pending = (generation, request);
            }
            Command::Shutdown => return None,
        }
    }
    Some(pending)
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use super::*;
    use crate::domain::review::ReviewState;
    use crate::repo::github::fake::{FAKE_API_BASE, FakeApi, pr_ref, review, search_item};
    use crate::repo::github::{search_page_url, search_query};
    use crate::repo::memory::MemoryCache;

    const WAIT: Duration = Duration::from_secs(5);

    fn config() -> Config {
        Config {
            username: "alice".into(),
            token: "t".into(),
            show_others_only: false,
        }
    }

    fn fake() -> FakeApi {
        FakeApi::default()
            .with_search(
                search_page_url(FAKE_API_BASE, &search_query("alice", false), 1),
                SearchPage::new(
                    vec![
                        search_item("alice", "tool", 1, "Add cache"),
                        search_item("alice", "site", 2, "Fix typo"),
                    ],
                    Some(2),
                    false,
                ),
            )
            .with_reviews(
                pr_ref("alice", "tool", 1),
                vec![review("bob", "APPROVED", Some("2024-05-01T00:00:00Z"))],
            )
    }

    fn memory_caches() -> Caches {
        Caches {
            pulls: Box::new(MemoryCache::<SearchPage>::default()),
            reviews: Box::new(MemoryCache::<ReviewRecord>::default()),
        }
    }

    fn connect_to(api: FakeApi) -> Connect {
        Box::new(move |_cfg: &Config| -> Result<Box<dyn GithubApi>> { Ok(Box::new(api.clone())) })
    }

    #[test]
    fn load_produces_rows_with_review_state() {
        let worker = SyncWorker::spawn(memory_caches(), connect_to(fake())).unwrap();
        let generation = worker.request(SyncRequest {
            config: config(),
            hard_refresh: false,
        });

        match worker.recv_timeout(WAIT) {
            Some(SyncEvent::Loaded { generation: g, rows }) => {
                assert_eq!(g, generation);
                assert_eq!(rows.len(), 2);
                assert_eq!(rows[0].title, "Add cache");
                assert_eq!(rows[0].state, ReviewState::AllApproved);
                assert_eq!(rows[0].repo, "tool");
                assert_eq!(rows[1].state, ReviewState::ReviewRequired);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn issue_shaped_search_urls_resolve_review_state() {
        let api = fake();
        let worker = SyncWorker::spawn(memory_caches(), connect_to(api.clone())).unwrap();
        worker.request(SyncRequest {
            config: config(),
            hard_refresh: false,
        });

        let Some(SyncEvent::Loaded { rows, .. }) = worker.recv_timeout(WAIT) else {
            panic!("load did not finish");
        };
        assert!(rows.iter().all(|row| row.state != ReviewState::Unknown));
        let calls = api.calls();
        assert!(calls.contains(&"reviews alice/tool#1".to_string()));
        assert!(calls.contains(&"reviews alice/site#2".to_string()));
    }

    #[test]
    fn soft_reload_uses_cache_and_hard_refresh_refetches() {
        let api = fake();
        let worker = SyncWorker::spawn(memory_caches(), connect_to(api.clone())).unwrap();

        for hard_refresh in [false, false, true] {
            worker.request(SyncRequest {
                config: config(),
                hard_refresh,
            });
            assert!(matches!(
                worker.recv_timeout(WAIT),
                Some(SyncEvent::Loaded { .. })
            ));
        }
        // one search + two review calls per live load
        assert_eq!(api.calls().len(), 6);
    }

    #[test]
    fn missing_token_is_reported_without_connecting() {
        let connected = Arc::new(Mutex::new(false));
        let flag = connected.clone();
        let connect: Connect = Box::new(move |_cfg: &Config| -> Result<Box<dyn GithubApi>> {
            *flag.lock().unwrap() = true;
            Ok(Box::new(FakeApi::default()))
        });
        let worker = SyncWorker::spawn(memory_caches(), connect).unwrap();
        let mut cfg = config();
        cfg.token.clear();
        worker.request(SyncRequest {
            config: cfg,
            hard_refresh: false,
        });

        match worker.recv_timeout(WAIT) {
            Some(SyncEvent::Failed { error, .. }) => assert_eq!(error, FetchError::MissingToken),
            other => panic!("unexpected event: {other:?}"),
        }
        assert!(!*connected.lock().unwrap());
    }

    #[test]
    fn connect_failure_becomes_client_error() {
        let connect: Connect = Box::new(|_cfg: &Config| -> Result<Box<dyn GithubApi>> {
            Err(anyhow::anyhow!("bad base url"))
        });
        let worker = SyncWorker::spawn(memory_caches(), connect).unwrap();
        worker.request(SyncRequest {
            config: config(),
            hard_refresh: false,
        });
        match worker.recv_timeout(WAIT) {
            Some(SyncEvent::Failed { error, .. }) => {
                assert_eq!(error, FetchError::Client("bad base url".into()))
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn coalesce_keeps_newest_and_merges_hard_refresh() {
        let (tx, rx) = mpsc::channel();
        let load = |generation, hard_refresh| Command::Load {
            generation,
            request: SyncRequest {
                config: config(),
                hard_refresh,
            },
        };
        tx.send(load(2, true)).unwrap();
        tx.send(load(3, false)).unwrap();

        let (generation, request) = coalesce(load(1, false), &rx).unwrap();
        assert_eq!(generation, 3);
        assert!(request.hard_refresh);

        tx.send(Command::Shutdown).unwrap();
        assert!(coalesce(load(4, false), &rx).is_none());
    }

    #[test]
    fn superseded_token_reports_cancelled() {
        let latest = Arc::new(AtomicU64::new(2));
        let mut state = WorkerState {
            caches: memory_caches(),
            connect: connect_to(fake()),
            latest: latest.clone(),
        };
        let stale = CancelToken::new(latest, 1);
        let result = state.load(
            &SyncRequest {
                config: config(),
                hard_refresh: false,
            },
            &stale,
        );
        assert_eq!(result, Err(FetchError::Cancelled));
    }
}
