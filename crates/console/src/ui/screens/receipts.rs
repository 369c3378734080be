use api_types::receipt::{SortDirection, SortField};
use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState},
};

use crate::{
    app::{
        AppState,
        receipts::{ListStatus, ReceiptsState},
    },
    display,
    ui::theme::Theme,
};

pub fn render(frame: &mut Frame<'_>, area: Rect, state: &AppState) {
    let theme = Theme::default();
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(4), Constraint::Min(0)])
        .split(area);

    render_header(frame, layout[0], &state.receipts, &theme);
    render_table(frame, layout[1], &state.receipts, &theme);
}

fn render_header(frame: &mut Frame<'_>, area: Rect, receipts: &ReceiptsState, theme: &Theme) {
    let criteria = &receipts.criteria;
    let label = |text: &'static str| Span::styled(text, Style::default().fg(theme.text_muted));

    let mut filters = vec![
        label("기간"),
        Span::raw(format!(
            ": {} ~ {}   ",
            criteria.date_range.start().format("%Y-%m-%d"),
            criteria.date_range.end().format("%Y-%m-%d")
        )),
        label("상태"),
        Span::raw(format!(
            ": {}   ",
            display::match_filter_label(criteria.match_status)
        )),
        label("유형"),
        Span::raw(format!(
            ": {}",
            display::type_filter_label(criteria.receipt_type)
        )),
    ];
    if let Some(card_id) = criteria.card_id {
        filters.push(Span::raw("   "));
        filters.push(label("카드"));
        filters.push(Span::raw(format!(": {card_id}")));
    }
    if let Some(merchant) = &criteria.merchant_name {
        filters.push(Span::raw("   "));
        filters.push(label("가맹점"));
        filters.push(Span::raw(format!(": {merchant}")));
    }
    if criteria.min_amount.is_some() || criteria.max_amount.is_some() {
        let bound = |amount: Option<rust_decimal::Decimal>| {
            amount.map(display::format_won).unwrap_or_default()
        };
        filters.push(Span::raw("   "));
        filters.push(label("금액"));
        filters.push(Span::raw(format!(
            ": {} ~ {}",
            bound(criteria.min_amount),
            bound(criteria.max_amount)
        )));
    }

    let page = &receipts.page;
    let mut paging = vec![
        label("페이지"),
        Span::raw(format!(
            ": {}/{} ({}건/페이지)   ",
            page.display_number(),
            page.page_count(),
            page.size
        )),
        label("전체"),
        Span::raw(format!(": {}건   ", page.total)),
        label("선택"),
        Span::raw(format!(": {}건", receipts.selection.len())),
    ];
    match receipts.status {
        ListStatus::Loading => {
            paging.push(Span::styled("   불러오는 중…", Style::default().fg(theme.warning)));
        }
        ListStatus::Failed => {
            if let Some(err) = &receipts.error {
                paging.push(Span::raw("   "));
                paging.push(Span::styled(err.as_str(), Style::default().fg(theme.error)));
            }
        }
        ListStatus::Idle | ListStatus::Loaded => {}
    }

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(theme.border))
        .title(" 영수증 ");
    let content = Paragraph::new(vec![Line::from(filters), Line::from(paging)]).block(block);
    frame.render_widget(content, area);
}

fn sort_marker(receipts: &ReceiptsState, field: SortField) -> &'static str {
    match receipts.sort {
        Some(order) if order.field == field => match order.direction {
            SortDirection::Asc => " ▲",
            SortDirection::Desc => " ▼",
        },
        _ => "",
    }
}

fn render_table(frame: &mut Frame<'_>, area: Rect, receipts: &ReceiptsState, theme: &Theme) {
    let header = Row::new(vec![
        Cell::from(""),
        Cell::from(format!(
            "거래일시{}",
            sort_marker(receipts, SortField::TransactionDate)
        )),
        Cell::from(format!(
            "가맹점{}",
            sort_marker(receipts, SortField::MerchantName)
        )),
        Cell::from(format!("금액{}", sort_marker(receipts, SortField::Amount))),
        Cell::from("카드"),
        Cell::from("유형"),
        Cell::from("상태"),
        Cell::from("검증"),
    ])
    .style(
        Style::default()
            .fg(theme.text_muted)
            .add_modifier(Modifier::BOLD),
    );

    let rows = receipts.rows.iter().map(|receipt| {
        let marker = if receipts.is_selected(receipt.receipt_id) {
            "[x]"
        } else {
            "[ ]"
        };
        let (status, status_tone) = display::match_status_tag(&receipt.match_status);
        let (verified, verified_tone) = display::verification_badge(receipt.is_verified);
        Row::new(vec![
            Cell::from(marker),
            Cell::from(display::format_transaction_date(&receipt.transaction_date)),
            Cell::from(receipt.merchant_name.as_str()),
            Cell::from(Line::from(display::format_won(receipt.amount)).right_aligned()),
            Cell::from(receipt.card_alias.as_deref().unwrap_or("-")),
            Cell::from(display::receipt_type_label(&receipt.receipt_type)),
            Cell::from(Span::styled(status, theme.tone(status_tone))),
            Cell::from(Span::styled(verified, theme.tone(verified_tone))),
        ])
    });

    let widths = [
        Constraint::Length(3),
        Constraint::Length(16),
        Constraint::Min(16),
        Constraint::Length(14),
        Constraint::Length(12),
        Constraint::Length(10),
        Constraint::Length(8),
        Constraint::Length(4),
    ];

    let mut table_state = TableState::default();
    if !receipts.rows.is_empty() {
        table_state.select(Some(receipts.cursor));
    }

    let table = Table::new(rows, widths)
        .header(header)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(theme.border)),
        )
        .row_highlight_style(
            Style::default()
                .fg(theme.accent)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("» ");

    if receipts.rows.is_empty() && receipts.status != ListStatus::Loading {
        frame.render_widget(table, area);
        let hint = Rect {
            x: area.x + 2,
            y: area.y + 2,
            width: area.width.saturating_sub(4),
            height: 1.min(area.height.saturating_sub(3)),
        };
        frame.render_widget(
            Paragraph::new(Span::styled(
                "조회된 영수증이 없습니다.",
                Style::default().fg(theme.text_muted),
            )),
            hint,
        );
        return;
    }

    frame.render_stateful_widget(table, area, &mut table_state);
}
