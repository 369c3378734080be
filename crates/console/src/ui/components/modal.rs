use ratatui::{
    Frame,
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Clear, Paragraph, Wrap},
};

use crate::{
    app::{
        filter::{FilterField, FilterForm},
        modal::{DetailView, EXPORT_FORMATS, ExportPicker, MatchForm, Modal},
    },
    display,
    ui::{centered_box, theme::Theme},
};

pub fn render(frame: &mut Frame<'_>, area: Rect, modal: &Modal) {
    let theme = Theme::default();
    match modal {
        Modal::Detail(view) => render_detail(frame, area, view, &theme),
        Modal::Match(form) => render_match(frame, area, form, &theme),
        Modal::Export(picker) => render_export(frame, area, picker, &theme),
        Modal::Filter(form) => render_filter(frame, area, form, &theme),
    }
}

fn panel<'a>(title: String, theme: &Theme) -> Block<'a> {
    Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(theme.accent))
        .style(Style::default().bg(theme.panel).fg(theme.text))
}

fn field<'a>(label: &str, value: String, theme: &Theme) -> Line<'a> {
    Line::from(vec![
        Span::styled(format!("{label:<10}"), Style::default().fg(theme.text_muted)),
        Span::raw(value),
    ])
}

fn optional(value: Option<&str>) -> String {
    value.unwrap_or("-").to_string()
}

fn render_detail(frame: &mut Frame<'_>, area: Rect, view: &DetailView, theme: &Theme) {
    let receipt = &view.receipt;
    let rect = centered_box(64, 22, area);
    frame.render_widget(Clear, rect);

    let (status, tone) = display::match_status_tag(&receipt.match_status);
    let (verified, verified_tone) = display::verification_badge(receipt.is_verified);

    let mut lines = vec![
        field("가맹점", receipt.merchant_name.clone(), theme),
        field(
            "거래일시",
            display::format_transaction_date(&receipt.transaction_date),
            theme,
        ),
        field("금액", display::format_won(receipt.amount), theme),
        field(
            "부가세",
            receipt
                .vat_amount
                .map(display::format_won)
                .unwrap_or_else(|| "-".to_string()),
            theme,
        ),
        field("카드", optional(receipt.card_alias.as_deref()), theme),
        field("카드사", optional(receipt.card_company.as_deref()), theme),
        field("카드번호", optional(receipt.card_number_masked.as_deref()), theme),
        field("승인번호", optional(receipt.approval_number.as_deref()), theme),
        field(
            "증빙 유형",
            display::receipt_type_label(&receipt.receipt_type).to_string(),
            theme,
        ),
        Line::from(vec![
            Span::styled(format!("{:<10}", "매칭 상태"), Style::default().fg(theme.text_muted)),
            Span::styled(status, theme.tone(tone)),
            Span::raw("   "),
            Span::styled("검증 ", Style::default().fg(theme.text_muted)),
            Span::styled(verified, theme.tone(verified_tone)),
        ]),
    ];

    if !receipt.matches.is_empty() {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            "매칭 내역",
            Style::default().fg(theme.accent),
        )));
        for info in &receipt.matches {
            lines.push(Line::from(format!(
                "  {} {} {}",
                optional(info.erp_ledger_id.as_deref()),
                optional(info.account_name.as_deref()),
                info.matched_amount
                    .map(display::format_won)
                    .unwrap_or_else(|| "-".to_string()),
            )));
        }
    }

    if view.reloading {
        lines.push(Line::from(Span::styled(
            "불러오는 중…",
            Style::default().fg(theme.warning),
        )));
    }
    if let Some(err) = &view.error {
        lines.push(Line::from(Span::styled(
            err.as_str(),
            Style::default().fg(theme.error),
        )));
    }

    let title = format!(" 영수증 #{} ", receipt.receipt_id);
    frame.render_widget(
        Paragraph::new(lines)
            .block(panel(title, theme))
            .wrap(Wrap { trim: false }),
        rect,
    );
}

fn render_match(frame: &mut Frame<'_>, area: Rect, form: &MatchForm, theme: &Theme) {
    let height = u16::try_from(form.fields.len() + 8).unwrap_or(u16::MAX);
    let rect = centered_box(64, height, area);
    frame.render_widget(Clear, rect);

    let mut lines = Vec::with_capacity(form.fields.len() + 4);
    for (index, entry) in form.fields.iter().enumerate() {
        let focused = index == form.focus;
        lines.push(input_line(&entry.key, &entry.value, focused, theme));
    }
    lines.push(Line::from(""));
    lines.push(input_line("+ key=value", &form.extra, form.on_extra_line(), theme));

    if form.submitting {
        lines.push(Line::from(Span::styled(
            "전송 중…",
            Style::default().fg(theme.warning),
        )));
    }
    if let Some(err) = &form.error {
        lines.push(Line::from(Span::styled(
            err.as_str(),
            Style::default().fg(theme.error),
        )));
    }

    let title = format!(" 매칭 · {} ", form.merchant_name);
    frame.render_widget(Paragraph::new(lines).block(panel(title, theme)), rect);
}

fn input_line<'a>(label: &str, value: &str, focused: bool, theme: &Theme) -> Line<'a> {
    let cursor = if focused { "│" } else { "" };
    let style = if focused {
        Style::default().fg(theme.accent)
    } else {
        Style::default().fg(theme.text)
    };
    Line::from(vec![
        Span::styled(format!("{label:<14}"), Style::default().fg(theme.text_muted)),
        Span::styled(format!("{value}{cursor}"), style),
    ])
}

fn render_export(frame: &mut Frame<'_>, area: Rect, picker: &ExportPicker, theme: &Theme) {
    let rect = centered_box(30, 7, area);
    frame.render_widget(Clear, rect);

    let lines: Vec<Line<'_>> = EXPORT_FORMATS
        .iter()
        .map(|format| {
            let label = display::export_format_label(*format);
            if *format == picker.format() {
                Line::from(Span::styled(
                    format!("» {label}"),
                    Style::default()
                        .fg(theme.accent)
                        .add_modifier(Modifier::BOLD),
                ))
            } else {
                Line::from(format!("  {label}"))
            }
        })
        .collect();

    frame.render_widget(
        Paragraph::new(lines).block(panel(" 내보내기 ".to_string(), theme)),
        rect,
    );
}

fn render_filter(frame: &mut Frame<'_>, area: Rect, form: &FilterForm, theme: &Theme) {
    let rect = centered_box(56, 14, area);
    frame.render_widget(Clear, rect);

    let mut lines: Vec<Line<'_>> = FilterField::ALL
        .iter()
        .map(|field| {
            let focused = *field == form.focused();
            let value = if field.is_choice() {
                format!("‹ {} ›", form.value(*field))
            } else {
                form.value(*field).to_string()
            };
            input_line(field.label(), &value, focused && !field.is_choice(), theme).patch_style(
                if focused {
                    Style::default().add_modifier(Modifier::BOLD)
                } else {
                    Style::default()
                },
            )
        })
        .collect();

    if let Some(err) = &form.error {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            err.clone(),
            Style::default().fg(theme.error),
        )));
    }

    frame.render_widget(
        Paragraph::new(lines).block(panel(" 검색 조건 ".to_string(), theme)),
        rect,
    );
}
