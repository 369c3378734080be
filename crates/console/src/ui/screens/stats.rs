use ratatui::{
    Frame,
    layout::{Alignment, Rect},
    style::Style,
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Paragraph},
};

use crate::{
    app::AppState,
    display,
    ui::theme::Theme,
};

pub fn render(frame: &mut Frame<'_>, area: Rect, state: &AppState) {
    let theme = Theme::default();
    let stats = &state.statistics;
    let range = state.receipts.criteria.date_range;

    let block = Block::default()
        .title(format!(
            " 통계 {} ~ {} ",
            range.start().format("%Y-%m-%d"),
            range.end().format("%Y-%m-%d")
        ))
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(theme.border));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    if let Some(error) = &stats.error {
        frame.render_widget(
            Paragraph::new(Line::from(vec![
                Span::styled(error.as_str(), Style::default().fg(theme.error)),
                Span::raw(" Press "),
                Span::styled("r", Style::default().fg(theme.accent)),
                Span::raw(" to refresh."),
            ]))
            .alignment(Alignment::Center),
            inner,
        );
        return;
    }

    let Some(data) = &stats.data else {
        let message = if stats.loading {
            "불러오는 중…"
        } else {
            "데이터가 없습니다."
        };
        frame.render_widget(
            Paragraph::new(message).alignment(Alignment::Center),
            inner,
        );
        return;
    };

    let rows = display::summary_lines(data);
    let width = rows.iter().map(|(key, _)| key.len()).max().unwrap_or(0);
    let lines: Vec<Line<'_>> = rows
        .into_iter()
        .map(|(key, value)| {
            Line::from(vec![
                Span::styled(
                    format!("{key:<width$}  "),
                    Style::default().fg(theme.text_muted),
                ),
                Span::raw(value),
            ])
        })
        .collect();
    frame.render_widget(Paragraph::new(lines), inner);
}
