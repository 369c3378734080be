pub mod components;
pub mod keymap;
pub mod screens;

mod terminal;
mod theme;

use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    style::Style,
    text::{Line, Span},
    widgets::{Block, Paragraph},
};

use crate::app::{AppState, Screen};

pub use terminal::{AppTerminal as Terminal, restore_terminal, setup_terminal};
pub use theme::Theme;

use components::hints::{KeyHint, hint_separator, hints_to_spans};

pub fn render(frame: &mut Frame<'_>, state: &AppState) {
    let area = frame.area();
    let theme = Theme::default();
    frame.render_widget(
        Block::default().style(Style::default().bg(theme.background).fg(theme.text)),
        area,
    );
    match state.screen {
        Screen::Login => screens::login::render(frame, area, state),
        Screen::Receipts | Screen::Statistics => render_shell(frame, area, state, &theme),
    }
    components::toast::render(frame, area, state.toast.as_ref());
}

fn render_shell(frame: &mut Frame<'_>, area: Rect, state: &AppState, theme: &Theme) {
    // Info bar, content, bottom bar
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Min(0),
            Constraint::Length(1),
        ])
        .split(area);

    render_info_bar(frame, layout[0], state, theme);
    match state.screen {
        Screen::Statistics => screens::stats::render(frame, layout[1], state),
        _ => screens::receipts::render(frame, layout[1], state),
    }
    render_bottom_bar(frame, layout[2], state, theme);

    if let Some(modal) = &state.modal {
        components::modal::render(frame, area, modal);
    }
}

fn render_info_bar(frame: &mut Frame<'_>, area: Rect, state: &AppState, theme: &Theme) {
    let refresh = state
        .last_refresh
        .map(|dt| dt.format("%H:%M:%S").to_string())
        .unwrap_or_else(|| "-".to_string());
    let receipts = &state.receipts;

    let mut line = vec![
        Span::styled("Backend", Style::default().fg(theme.text_muted)),
        Span::raw(format!(": {}  ", state.base_url)),
        Span::styled("Refresh", Style::default().fg(theme.text_muted)),
        Span::raw(format!(": {refresh}  ")),
    ];
    if receipts.syncing {
        line.push(Span::styled("동기화 중… ", Style::default().fg(theme.warning)));
    }
    if receipts.exporting {
        line.push(Span::styled("내보내는 중… ", Style::default().fg(theme.warning)));
    }
    if receipts.auto_matching {
        line.push(Span::styled("자동 매칭 중… ", Style::default().fg(theme.warning)));
    }

    frame.render_widget(Paragraph::new(Line::from(line)), area);
}

fn render_bottom_bar(frame: &mut Frame<'_>, area: Rect, state: &AppState, theme: &Theme) {
    let mut parts = hints_to_spans(&context_hints(state), theme);
    parts.push(hint_separator(theme));
    parts.extend(hints_to_spans(&[KeyHint::new("q", "quit")], theme));
    frame.render_widget(Paragraph::new(Line::from(parts)), area);
}

fn context_hints(state: &AppState) -> Vec<KeyHint> {
    use crate::app::modal::Modal;

    match (&state.screen, &state.modal) {
        (Screen::Statistics, _) => vec![
            KeyHint::new("r", "refresh"),
            KeyHint::new("Esc", "back"),
        ],
        (_, Some(Modal::Detail(_))) => vec![
            KeyHint::new("r", "reload"),
            KeyHint::new("m", "match"),
            KeyHint::new("d", "download"),
            KeyHint::new("Esc", "close"),
        ],
        (_, Some(Modal::Match(_))) => vec![
            KeyHint::new("Tab", "next"),
            KeyHint::new("Enter", "submit / add key=value"),
            KeyHint::new("Esc", "cancel"),
        ],
        (_, Some(Modal::Export(_))) => vec![
            KeyHint::new("↑↓", "format"),
            KeyHint::new("Enter", "export"),
            KeyHint::new("Esc", "cancel"),
        ],
        (_, Some(Modal::Filter(_))) => vec![
            KeyHint::new("Tab", "next"),
            KeyHint::new("←→", "choice"),
            KeyHint::new("Enter", "apply"),
            KeyHint::new("Esc", "cancel"),
        ],
        _ => vec![
            KeyHint::new("↑↓", "select"),
            KeyHint::new("Enter", "detail"),
            KeyHint::new("Space", "toggle"),
            KeyHint::new("a", "page"),
            KeyHint::new("c", "clear"),
            KeyHint::new("n/p", "page"),
            KeyHint::new("1/2/3", "sort"),
            KeyHint::new("/", "filters"),
            KeyHint::new("s", "sync"),
            KeyHint::new("m", "match"),
            KeyHint::new("A", "auto"),
            KeyHint::new("x", "export"),
            KeyHint::new("d", "download"),
            KeyHint::new("t", "stats"),
        ],
    }
}

/// Fixed-size rect centred in `area`, clamped to it.
pub(crate) fn centered_box(width: u16, height: u16, area: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(0),
            Constraint::Length(height.min(area.height)),
            Constraint::Min(0),
        ])
        .split(area);

    let horizontal = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Min(0),
            Constraint::Length(width.min(area.width)),
            Constraint::Min(0),
        ])
        .split(vertical[1]);

    horizontal[1]
}
