use ratatui::{
    Frame,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::Style,
    text::Span,
    widgets::{Block, BorderType, Borders, Clear, Paragraph},
};

use crate::{
    app::AppState,
    ui::{centered_box, theme::Theme},
};

pub fn render(frame: &mut Frame<'_>, area: Rect, state: &AppState) {
    let theme = Theme::default();

    let card_area = centered_box(48, 6, area);
    frame.render_widget(Clear, card_area);

    let block = Block::default()
        .title(" 로그인 ")
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(theme.border));

    let inner = block.inner(card_area);
    frame.render_widget(block, card_area);

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1), // Prompt
            Constraint::Length(1), // Spacer
            Constraint::Length(1), // Token
        ])
        .margin(1)
        .split(inner);

    frame.render_widget(
        Paragraph::new(Span::styled(
            "액세스 토큰을 입력하세요",
            Style::default().fg(theme.text_muted),
        )),
        rows[0],
    );
    let display = format!("{}│", mask_token(&state.login.token));
    frame.render_widget(
        Paragraph::new(Span::styled(display, Style::default().fg(theme.accent))),
        rows[2],
    );

    if let Some(message) = &state.login.message {
        let error_area = Rect {
            x: card_area.x,
            y: card_area.y + card_area.height + 1,
            width: card_area.width,
            height: 1,
        };
        if error_area.bottom() <= area.bottom() {
            frame.render_widget(
                Paragraph::new(Span::styled(
                    message.as_str(),
                    Style::default().fg(theme.error),
                ))
                .alignment(Alignment::Center),
                error_area,
            );
        }
    }
}

/// Masks the token, keeping its last four characters for recognition.
fn mask_token(token: &str) -> String {
    let count = token.chars().count();
    if count <= 4 {
        return "•".repeat(count);
    }
    let tail: String = token.chars().skip(count - 4).collect();
    format!("{}{tail}", "•".repeat(count - 4))
}
