use std::time::{Duration, Instant};

use ratatui::widgets::TableState;
use tracing::{info, warn};

use crate::domain::config::Config;
use crate::domain::notice::Notice;
#[cfg(test)]
use crate::domain::notice::Severity;
use crate::domain::pull_request::{Column, PrRow};
use crate::repo::config::ConfigStore;
use crate::sync::{SyncEvent, SyncRequest, SyncWorker};
use crate::usecase::sort::{SortState, sort_rows};

const DOUBLE_CLICK: Duration = Duration::from_millis(400);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Settings,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingsField {
    Username,
    Token,
}

#[derive(Debug, Clone)]
pub struct SettingsForm {
    pub username: String,
    pub token: String,
    pub focus: SettingsField,
}

impl SettingsForm {
    fn from_config(config: &Config) -> Self {
        Self {
            username: config.username.clone(),
            token: config.token.clone(),
            focus: SettingsField::Username,
        }
    }

    fn focused_mut(&mut self) -> &mut String {
        match self.focus {
            SettingsField::Username => &mut self.username,
            SettingsField::Token => &mut self.token,
        }
    }
}

/// Screen positions of the table, recorded at draw time for mouse hits.
#[derive(Debug, Clone, Default)]
pub struct TableGeometry {
    pub header_y: u16,
    pub body_y: u16,
    pub body_height: u16,
    /// Column extents as `[start, end)` x-ranges.
    pub columns: Vec<(Column, u16, u16)>,
}

impl TableGeometry {
    pub fn column_at(&self, x: u16) -> Option<Column> {
        self.columns
            .iter()
            .find(|(_, start, end)| (*start..*end).contains(&x))
            .map(|(column, _, _)| *column)
    }
}

pub struct App {
    store: ConfigStore,
    sync: SyncWorker,
    pub config: Config,
    pub rows: Vec<PrRow>,
    pub table_state: TableState,
    pub sort: Option<SortState>,
    pub mode: InputMode,
    pub settings: SettingsForm,
    pub notice: Option<Notice>,
    pub status: Option<String>,
    pub is_syncing: bool,
    pub last_loaded: Option<Instant>,
    pub geometry: TableGeometry,
    refresh_every: Duration,
    next_refresh: Option<Instant>,
    last_click: Option<(usize, Instant)>,
}

impl App {
    pub fn new(store: ConfigStore, config: Config, sync: SyncWorker, refresh_every: Duration) -> Self {
        let settings = SettingsForm::from_config(&config);
        Self {
            store,
            sync,
            config,
            rows: Vec::new(),
            table_state: TableState::default(),
            sort: None,
            mode: InputMode::Normal,
            settings,
            notice: None,
            status: None,
            is_syncing: false,
            last_loaded: None,
            geometry: TableGeometry::default(),
            refresh_every,
            next_refresh: None,
            last_click: None,
        }
    }

    /// Asks the worker for a fresh table. The auto-refresh timer is cancelled
    /// until the result arrives.
    pub fn start_sync(&mut self, hard_refresh: bool) {
        self.sync.request(SyncRequest {
            config: self.config.clone(),
            hard_refresh,
        });
        self.is_syncing = true;
        self.next_refresh = None;
    }

    /// Manual refresh: bypasses both caches.
    pub fn refresh(&mut self) {
        self.set_status("Refreshing (cache cleared)");
        self.start_sync(true);
    }

    /// Applies finished loads. Results of superseded requests are ignored.
    pub fn poll_sync(&mut self, now: Instant) {
        while let Some(event) = self.sync.try_recv() {
            if event.generation() != self.sync.latest_generation() {
                continue;
            }
            self.is_syncing = false;
            self.next_refresh = Some(now + self.refresh_every);
            match event {
                SyncEvent::Loaded { rows, .. } => self.apply_rows(rows, now),
                SyncEvent::Failed { error, .. } => {
                    self.rows.clear();
                    self.table_state.select(None);
                    self.notice = Some(error.to_notice());
                    self.set_status(error.title());
                }
            }
        }
    }

    /// Fires the periodic reload once its deadline has passed.
    pub fn tick(&mut self, now: Instant) {
        self.poll_sync(now);
        if self.next_refresh.is_some_and(|due| now >= due) {
            self.start_sync(false);
        }
    }

    fn apply_rows(&mut self, rows: Vec<PrRow>, now: Instant) {
        self.rows = rows;
        if let Some(sort) = self.sort {
            sort_rows(&mut self.rows, sort);
        }
        self.clamp_selection();
        self.last_loaded = Some(now);
        let count = self.rows.len();
        self.set_status(&format!(
            "Loaded {count} open pull requests for {} ({})",
            self.config.username,
            self.config.filter_label()
        ));
    }

    fn clamp_selection(&mut self) {
        if self.rows.is_empty() {
            self.table_state.select(None);
        } else {
            let idx = self.table_state.selected().unwrap_or(0);
            self.table_state.select(Some(idx.min(self.rows.len() - 1)));
        }
    }

    pub fn select_next(&mut self) {
        if !self.rows.is_empty() {
            let idx = self.table_state.selected().map_or(0, |i| i + 1);
            self.table_state.select(Some(idx.min(self.rows.len() - 1)));
        }
    }

    pub fn select_previous(&mut self) {
        if let Some(idx) = self.table_state.selected() {
            self.table_state.select(Some(idx.saturating_sub(1)));
        }
    }

    pub fn sort_by(&mut self, column: Column) {
        let sort = SortState::toggle(self.sort, column);
        let selected_url = self.selected_row().map(|r| r.url.clone());
        sort_rows(&mut self.rows, sort);
        self.sort = Some(sort);
        if let Some(url) = selected_url {
            let idx = self.rows.iter().position(|r| r.url == url);
            self.table_state.select(idx);
        }
    }

    pub fn selected_row(&self) -> Option<&PrRow> {
        self.table_state.selected().and_then(|i| self.rows.get(i))
    }

    pub fn open_selected(&mut self) {
        let Some(url) = self.selected_row().map(|r| r.url.clone()) else {
            return;
        };
        match open::that(&url) {
            Ok(()) => self.set_status(&format!("Opened {url}")),
            Err(err) => {
                warn!(%url, error = %err, "failed to open browser");
                self.notice = Some(Notice::error("Browser Error", format!("Could not open {url}: {err}")));
            }
        }
    }

    /// Selects the clicked row; returns true on the second click of a double-click.
    pub fn click_row(&mut self, idx: usize, now: Instant) -> bool {
        if idx >= self.rows.len() {
            return false;
        }
        self.table_state.select(Some(idx));
        let double = self
            .last_click
            .is_some_and(|(prev, at)| prev == idx && now.duration_since(at) <= DOUBLE_CLICK);
        self.last_click = if double { None } else { Some((idx, now)) };
        double
    }

    pub fn toggle_filter(&mut self) {
        self.config.show_others_only = !self.config.show_others_only;
        info!(show_others_only = self.config.show_others_only, "filter toggled");
        self.persist_config();
        self.rows.clear();
        self.table_state.select(None);
        self.start_sync(false);
    }

    pub fn open_settings(&mut self) {
        self.settings = SettingsForm::from_config(&self.config);
        self.mode = InputMode::Settings;
    }

    pub fn cancel_settings(&mut self) {
        self.mode = InputMode::Normal;
        self.set_status("Settings unchanged");
    }

    pub fn settings_next_field(&mut self) {
        self.settings.focus = match self.settings.focus {
            SettingsField::Username => SettingsField::Token,
            SettingsField::Token => SettingsField::Username,
        };
    }

    pub fn settings_input(&mut self, c: char) {
        self.settings.focused_mut().push(c);
    }

    pub fn settings_backspace(&mut self) {
        self.settings.focused_mut().pop();
    }

    /// Rejects an empty username; an empty token is accepted.
    pub fn save_settings(&mut self) {
        let username = self.settings.username.trim().to_string();
        if username.is_empty() {
            self.notice = Some(Notice::warning(
                "Input Error",
                "GitHub Username cannot be empty.",
            ));
            return;
        }
        self.config.username = username;
        self.config.token = self.settings.token.trim().to_string();
        self.persist_config();
        self.mode = InputMode::Normal;
        self.start_sync(false);
    }

    fn persist_config(&mut self) {
        if let Err(err) = self.store.save(&self.config) {
            warn!(error = %format!("{err:#}"), "failed to save config");
            self.notice = Some(Notice::error("Error Saving Config", format!("{err:#}")));
        }
    }

    pub fn dismiss_notice(&mut self) {
        self.notice = None;
    }

    pub fn set_status(&mut self, msg: &str) {
        self.status = Some(msg.to_string());
    }

    #[cfg(test)]
    pub fn notice_severity(&self) -> Option<Severity> {
        self.notice.as_ref().map(|n| n.severity)
    }

    /// Stops the worker, which saves both caches.
    pub fn shutdown(&mut self) {
        self.next_refresh = None;
        self.sync.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::review::ReviewState;
    use crate::repo::github::GithubApi;
    use crate::repo::github::fake::FakeApi;
    use crate::repo::github::model::{ReviewRecord, SearchPage};
    use crate::repo::memory::MemoryCache;
    use crate::sync::Caches;

    fn test_app(dir: &tempfile::TempDir, config: Config) -> App {
        let caches = Caches {
            pulls: Box::new(MemoryCache::<SearchPage>::default()),
            reviews: Box::new(MemoryCache::<ReviewRecord>::default()),
        };
        let worker = SyncWorker::spawn(
            caches,
            Box::new(|_cfg: &Config| -> anyhow::Result<Box<dyn GithubApi>> {
                Ok(Box::new(FakeApi::default()))
            }),
        )
        .unwrap();
        App::new(
            ConfigStore::new(dir.path().join("config.json")),
            config,
            worker,
            Duration::from_secs(30),
        )
    }

    fn alice() -> Config {
        Config {
            username: "alice".into(),
            token: "t".into(),
            show_others_only: false,
        }
    }

    fn row(title: &str) -> PrRow {
        PrRow {
            title: title.into(),
            state: ReviewState::Approved,
            repo: "tool".into(),
            url: format!("https://github.test/{title}"),
        }
    }

    #[test]
    fn empty_username_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = test_app(&dir, alice());
        app.open_settings();
        app.settings.username.clear();
        app.save_settings();

        assert_eq!(app.mode, InputMode::Settings);
        assert_eq!(app.notice_severity(), Some(Severity::Warning));
        assert_eq!(app.config.username, "alice");
        assert!(!dir.path().join("config.json").exists());
    }

    #[test]
    fn saving_settings_persists_and_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = test_app(&dir, alice());
        app.open_settings();
        app.settings.username = "bob".into();
        app.settings_next_field();
        app.settings.token.clear();
        app.save_settings();

        assert_eq!(app.mode, InputMode::Normal);
        assert!(app.is_syncing);
        let saved = ConfigStore::new(dir.path().join("config.json")).load_with(|| None);
        assert_eq!(saved.username, "bob");
        assert!(saved.token.is_empty());
    }

    #[test]
    fn toggle_filter_persists_flag() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = test_app(&dir, alice());
        app.toggle_filter();
        assert!(app.config.show_others_only);
        let saved = ConfigStore::new(dir.path().join("config.json")).load_with(|| None);
        assert!(saved.show_others_only);
    }

    #[test]
    fn sort_keeps_selected_row() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = test_app(&dir, alice());
        app.rows = vec![row("b"), row("c"), row("a")];
        app.table_state.select(Some(0));

        app.sort_by(Column::Title);
        let titles: Vec<_> = app.rows.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, ["a", "b", "c"]);
        assert_eq!(app.selected_row().map(|r| r.title.as_str()), Some("b"));

        app.sort_by(Column::Title);
        assert_eq!(app.rows[0].title, "c");
    }

    #[test]
    fn double_click_needs_same_row_within_window() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = test_app(&dir, alice());
        app.rows = vec![row("a"), row("b")];
        let t0 = Instant::now();

        assert!(!app.click_row(0, t0));
        assert!(app.click_row(0, t0 + Duration::from_millis(200)));
        assert!(!app.click_row(1, t0 + Duration::from_millis(300)));
        assert!(!app.click_row(1, t0 + Duration::from_secs(2)));
        assert!(!app.click_row(5, t0));
    }

    #[test]
    fn missing_token_surfaces_warning_notice() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = alice();
        cfg.token.clear();
        let mut app = test_app(&dir, cfg);
        app.start_sync(false);

        let deadline = Instant::now() + Duration::from_secs(5);
        while app.is_syncing && Instant::now() < deadline {
            app.poll_sync(Instant::now());
            std::thread::sleep(Duration::from_millis(10));
        }
        assert!(!app.is_syncing);
        assert_eq!(app.notice_severity(), Some(Severity::Warning));
        assert!(app.rows.is_empty());
    }

    #[test]
    fn geometry_maps_x_to_column() {
        let geometry = TableGeometry {
            header_y: 4,
            body_y: 5,
            body_height: 10,
            columns: vec![(Column::Title, 2, 20), (Column::State, 21, 30)],
        };
        assert_eq!(geometry.column_at(2), Some(Column::Title));
        assert_eq!(geometry.column_at(25), Some(Column::State));
        assert_eq!(geometry.column_at(20), None);
    }
}
