use std::io::{Stdout, stdout};
use std::time::{Duration, Instant};

use anyhow::Result;
use crossterm::{
    event::{
        self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
        KeyModifiers, MouseButton, MouseEvent, MouseEventKind,
    },
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    Terminal,
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Clear, HighlightSpacing, Paragraph, Row, Table, Wrap},
};

use crate::app::{App, InputMode, SettingsField, TableGeometry};
use crate::domain::notice::Severity;
use crate::domain::pull_request::{Column, PrRow};
use crate::domain::review::ReviewState;
use crate::usecase::sort::SortState;

const HIGHLIGHT_SYMBOL: &str = "➤ ";
const COLUMN_WIDTHS: [Constraint; 4] = [
    Constraint::Percentage(40),
    Constraint::Percentage(16),
    Constraint::Percentage(16),
    Constraint::Percentage(28),
];

type Tui = Terminal<CrosstermBackend<Stdout>>;

pub fn run(mut app: App, tick_rate: Duration) -> Result<()> {
    enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = event_loop(&mut terminal, &mut app, tick_rate);

    app.shutdown();
    cleanup_terminal(&mut terminal)?;
    res
}

fn event_loop(terminal: &mut Tui, app: &mut App, tick_rate: Duration) -> Result<()> {
    let mut last_tick = Instant::now();
    loop {
        app.tick(Instant::now());
        terminal.draw(|f| draw(f, app))?;

        let timeout = tick_rate
            .checked_sub(last_tick.elapsed())
            .unwrap_or_else(|| Duration::from_secs(0));

        if event::poll(timeout)? {
            match event::read()? {
                Event::Key(key) if key.kind == KeyEventKind::Press => {
                    if handle_key(app, key) {
                        return Ok(());
                    }
                }
                Event::Mouse(mouse) => handle_mouse(app, mouse),
                _ => {}
            }
        }

        if last_tick.elapsed() >= tick_rate {
            last_tick = Instant::now();
        }
    }
}

/// Returns true when the user asked to quit.
fn handle_key(app: &mut App, key: KeyEvent) -> bool {
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        return true;
    }
    if app.notice.is_some() {
        app.dismiss_notice();
        return false;
    }
    match app.mode {
        InputMode::Normal => match key.code {
            KeyCode::Char('q') => return true,
            KeyCode::Char('j') | KeyCode::Down => app.select_next(),
            KeyCode::Char('k') | KeyCode::Up => app.select_previous(),
            KeyCode::Char('r') => app.refresh(),
            KeyCode::Char('f') => app.toggle_filter(),
            KeyCode::Char('s') => app.open_settings(),
            KeyCode::Enter | KeyCode::Char('o') => app.open_selected(),
            KeyCode::Char(c @ '1'..='4') => {
                let idx = c as usize - '1' as usize;
                if let Some(column) = Column::from_index(idx) {
                    app.sort_by(column);
                }
            }
            _ => {}
        },
        InputMode::Settings => match key.code {
            KeyCode::Esc => app.cancel_settings(),
            KeyCode::Enter => app.save_settings(),
            KeyCode::Tab | KeyCode::BackTab | KeyCode::Up | KeyCode::Down => {
                app.settings_next_field()
            }
            KeyCode::Backspace => app.settings_backspace(),
            KeyCode::Char(c) => app.settings_input(c),
            _ => {}
        },
    }
    false
}

fn handle_mouse(app: &mut App, mouse: MouseEvent) {
    match mouse.kind {
        MouseEventKind::Down(MouseButton::Left) => {
            if app.notice.is_some() {
                app.dismiss_notice();
                return;
            }
            if app.mode != InputMode::Normal {
                return;
            }
            let geometry = &app.geometry;
            if mouse.row == geometry.header_y {
                if let Some(column) = geometry.column_at(mouse.column) {
                    app.sort_by(column);
                }
                return;
            }
            if mouse.row >= geometry.body_y && mouse.row < geometry.body_y + geometry.body_height {
                let idx = app.table_state.offset() + usize::from(mouse.row - geometry.body_y);
                if app.click_row(idx, Instant::now()) {
                    app.open_selected();
                }
            }
        }
        MouseEventKind::ScrollDown if app.mode == InputMode::Normal => app.select_next(),
        MouseEventKind::ScrollUp if app.mode == InputMode::Normal => app.select_previous(),
        _ => {}
    }
}

fn draw(f: &mut ratatui::Frame, app: &mut App) {
    let size = f.area();

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(1),
            Constraint::Length(3),
        ])
        .split(size);

    f.render_widget(render_header(app), chunks[0]);

    app.geometry = table_geometry(chunks[1]);
    let table = render_table(&app.rows, app.sort);
    f.render_stateful_widget(table, chunks[1], &mut app.table_state);

    f.render_widget(render_footer(app), chunks[2]);

    if app.mode == InputMode::Settings {
        draw_settings(f, app, size);
    }
    if app.notice.is_some() {
        draw_notice(f, app, size);
    }
}

fn render_header(app: &App) -> Paragraph<'static> {
    let user = if app.config.username.is_empty() {
        "(no user)".to_string()
    } else {
        app.config.username.clone()
    };
    let mut spans = vec![
        Span::styled("prwatch", Style::default().fg(Color::Cyan)),
        Span::raw("  |  "),
        Span::raw(format!("user: {user}")),
        Span::raw("  |  "),
        Span::styled(
            format!("showing: {}", app.config.filter_label()),
            Style::default().fg(Color::Yellow),
        ),
        Span::raw("  |  "),
        Span::raw(format!("open: {}", app.rows.len())),
    ];
    if let Some(at) = app.last_loaded {
        spans.push(Span::raw("  |  "));
        spans.push(Span::styled(
            format!("refreshed {}s ago", at.elapsed().as_secs()),
            Style::default().fg(Color::DarkGray),
        ));
    }
    if app.is_syncing {
        spans.push(Span::raw("  |  "));
        spans.push(Span::styled(
            "⏳ Syncing GitHub...",
            Style::default().fg(Color::Magenta),
        ));
    }
    Paragraph::new(Line::from(spans))
        .block(Block::default().title("Open Pull Requests").borders(Borders::ALL))
        .wrap(Wrap { trim: true })
}

fn table_geometry(area: Rect) -> TableGeometry {
    let inner = Block::default().borders(Borders::ALL).inner(area);
    let symbol_width = HIGHLIGHT_SYMBOL.chars().count() as u16;
    let columns_area = Rect {
        x: inner.x.saturating_add(symbol_width),
        width: inner.width.saturating_sub(symbol_width),
        ..inner
    };
    let rects = Layout::horizontal(COLUMN_WIDTHS)
        .spacing(1)
        .split(columns_area);
    TableGeometry {
        header_y: inner.y,
        body_y: inner.y.saturating_add(1),
        body_height: inner.height.saturating_sub(1),
        columns: Column::ALL
            .iter()
            .zip(rects.iter())
            .map(|(column, rect)| (*column, rect.x, rect.x + rect.width))
            .collect(),
    }
}

fn render_table(rows: &[PrRow], sort: Option<SortState>) -> Table<'_> {
    let header = Row::new(Column::ALL.iter().map(|column| {
        let marker = match sort {
            Some(sort) if sort.column == *column => {
                if sort.descending {
                    " ▼"
                } else {
                    " ▲"
                }
            }
            _ => "",
        };
        Cell::from(format!("{}{marker}", column.heading()))
    }))
    .style(
        Style::default()
            .fg(Color::Cyan)
            .add_modifier(Modifier::BOLD),
    );

    let rows = rows.iter().map(|row| {
        Row::new(vec![
            Cell::from(row.title.as_str()),
            Cell::from(Span::styled(row.state.as_str(), state_style(row.state))),
            Cell::from(row.repo.as_str()),
            Cell::from(row.url.as_str()),
        ])
    });

    Table::new(rows, COLUMN_WIDTHS)
        .header(header)
        .column_spacing(1)
        .block(
            Block::default()
                .title("Pull requests (j/k move ; 1-4 or click header sort ; Enter/double-click open)")
                .borders(Borders::ALL),
        )
        .row_highlight_style(
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD | Modifier::REVERSED),
        )
        .highlight_symbol(HIGHLIGHT_SYMBOL)
        .highlight_spacing(HighlightSpacing::Always)
}

fn state_style(state: ReviewState) -> Style {
    let color = match state {
        ReviewState::ChangesRequested => Color::Red,
        ReviewState::AllApproved => Color::Green,
        ReviewState::Approved => Color::LightGreen,
        ReviewState::ReviewRequired => Color::Yellow,
        ReviewState::ReviewInProgress => Color::Blue,
        ReviewState::Unknown => Color::DarkGray,
    };
    Style::default().fg(color)
}

fn render_footer(app: &App) -> Paragraph<'_> {
    let toggle = if app.config.show_others_only {
        "f show mine PRs"
    } else {
        "f show others PRs"
    };
    let help = format!("r refresh ; {toggle} ; s settings ; q quit");
    let msg = app.status.as_deref().unwrap_or("Waiting for first load");
    let line = Line::from(vec![
        Span::raw(msg),
        Span::raw("  |  "),
        Span::styled(help, Style::default().fg(Color::DarkGray)),
    ]);
    Paragraph::new(line).block(Block::default().title("Status").borders(Borders::ALL))
}

fn draw_settings(f: &mut ratatui::Frame, app: &App, area: Rect) {
    let popup = centered_rect(64, 9, area);
    let form = &app.settings;
    let field = |label: &'static str, value: String, focused: bool| {
        let style = if focused {
            Style::default().fg(Color::Yellow)
        } else {
            Style::default()
        };
        let cursor = if focused { "█" } else { "" };
        Line::from(vec![
            Span::raw(label),
            Span::styled(value, style),
            Span::styled(cursor, style),
        ])
    };
    let masked = "*".repeat(form.token.chars().count());
    let lines = vec![
        field(
            "GitHub Username: ",
            form.username.clone(),
            form.focus == SettingsField::Username,
        ),
        field("GitHub Token:    ", masked, form.focus == SettingsField::Token),
        Line::raw(""),
        Line::styled(
            "Token requires 'repo' scope for private PRs.",
            Style::default().fg(Color::DarkGray),
        ),
        Line::raw(""),
        Line::styled(
            "Enter save ; Tab switch field ; Esc cancel",
            Style::default().fg(Color::DarkGray),
        ),
    ];
    f.render_widget(Clear, popup);
    f.render_widget(
        Paragraph::new(lines).block(Block::default().title("Settings").borders(Borders::ALL)),
        popup,
    );
}

fn draw_notice(f: &mut ratatui::Frame, app: &App, area: Rect) {
    let Some(notice) = app.notice.as_ref() else {
        return;
    };
    let color = match notice.severity {
        Severity::Info => Color::Cyan,
        Severity::Warning => Color::Yellow,
        Severity::Error => Color::Red,
    };
    let popup = centered_rect(60, 8, area);
    let lines = vec![
        Line::raw(notice.message.as_str()),
        Line::raw(""),
        Line::styled("press any key", Style::default().fg(Color::DarkGray)),
    ];
    f.render_widget(Clear, popup);
    f.render_widget(
        Paragraph::new(lines)
            .wrap(Wrap { trim: true })
            .block(
                Block::default()
                    .title(notice.title.as_str())
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(color)),
            ),
        popup,
    );
}

fn centered_rect(width: u16, height: u16, area: Rect) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    }
}

fn cleanup_terminal(terminal: &mut Tui) -> Result<()> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen, DisableMouseCapture)?;
    terminal.show_cursor()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn geometry_tracks_block_and_highlight_column() {
        let geometry = table_geometry(Rect::new(0, 3, 100, 20));
        assert_eq!(geometry.header_y, 4);
        assert_eq!(geometry.body_y, 5);
        assert_eq!(geometry.body_height, 17);
        assert_eq!(geometry.columns.len(), 4);
        assert_eq!(geometry.columns[0].0, Column::Title);
        assert_eq!(geometry.columns[0].1, 3);
        assert_eq!(geometry.column_at(2), None);
        assert_eq!(geometry.column_at(3), Some(Column::Title));
        assert_eq!(geometry.column_at(98), Some(Column::Url));
    }

    #[test]
    fn centered_rect_fits_small_areas() {
        let r = centered_rect(60, 8, Rect::new(0, 0, 40, 6));
        assert_eq!(r, Rect::new(0, 0, 40, 6));
        let r = centered_rect(10, 4, Rect::new(0, 0, 20, 10));
        assert_eq!(r, Rect::new(5, 3, 10, 4));
    }
}
