use api_types::{
    Summary,
    export::ExportFormat,
    receipt::{MatchStatus, MatchStatusFilter, ReceiptType, ReceiptTypeFilter},
};
use chrono::NaiveDateTime;
use num_format::{Locale, ToFormattedString as _};
use rust_decimal::{Decimal, RoundingStrategy, prelude::ToPrimitive};

/// Semantic colour of a badge; the theme decides the actual colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Success,
    Warning,
    Default,
}

/// Label and tone for a match status. Unknown codes render as unmatched.
pub fn match_status_tag(status: &MatchStatus) -> (&'static str, Tone) {
    match status {
        MatchStatus::Matched => ("매칭완료", Tone::Success),
        MatchStatus::Pending => ("검토중", Tone::Warning),
        MatchStatus::Unmatched | MatchStatus::Other(_) => ("미매칭", Tone::Default),
    }
}

/// Label for a receipt type. Unknown codes are shown as-is.
pub fn receipt_type_label(kind: &ReceiptType) -> &str {
    match kind {
        ReceiptType::CardSlip => "카드전표",
        ReceiptType::TaxInvoice => "세금계산서",
        ReceiptType::CashReceipt => "현금영수증",
        ReceiptType::Other(code) => code.as_str(),
    }
}

pub fn verification_badge(verified: bool) -> (&'static str, Tone) {
    if verified {
        ("완료", Tone::Success)
    } else {
        ("대기", Tone::Default)
    }
}

/// Whole won with grouped thousands, e.g. `1,234,567원`.
pub fn format_won(amount: Decimal) -> String {
    let rounded = amount.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
    let whole = rounded.to_i64().unwrap_or_default();
    format!("{}원", whole.to_formatted_string(&Locale::en))
}

pub fn format_transaction_date(value: &NaiveDateTime) -> String {
    value.format("%Y-%m-%d %H:%M").to_string()
}

pub fn match_filter_label(filter: MatchStatusFilter) -> &'static str {
    match filter {
        MatchStatusFilter::All => "전체",
        MatchStatusFilter::Matched => "매칭완료",
        MatchStatusFilter::Pending => "검토중",
        MatchStatusFilter::Unmatched => "미매칭",
    }
}

pub fn type_filter_label(filter: ReceiptTypeFilter) -> &'static str {
    match filter {
        ReceiptTypeFilter::All => "전체",
        ReceiptTypeFilter::CardSlip => "카드전표",
        ReceiptTypeFilter::TaxInvoice => "세금계산서",
        ReceiptTypeFilter::CashReceipt => "현금영수증",
    }
}

pub fn export_format_label(format: ExportFormat) -> &'static str {
    match format {
        ExportFormat::Excel => "Excel",
        ExportFormat::Pdf => "PDF",
        ExportFormat::Csv => "CSV",
    }
}

/// Sorted `key, value` pairs of an opaque backend summary. Strings lose
/// their quotes; nested values stay compact JSON.
pub fn summary_lines(summary: &Summary) -> Vec<(String, String)> {
    let mut lines: Vec<(String, String)> = summary
        .iter()
        .map(|(key, value)| {
            let text = match value {
                serde_json::Value::String(text) => text.clone(),
                serde_json::Value::Null => "-".to_string(),
                other => other.to_string(),
            };
            (key.clone(), text)
        })
        .collect();
    lines.sort_by(|a, b| a.0.cmp(&b.0));
    lines
}

/// One-line digest for toasts.
pub fn summary_text(summary: &Summary, limit: usize) -> String {
    summary_lines(summary)
        .into_iter()
        .take(limit)
        .map(|(key, value)| format!("{key}={value}"))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn amounts_use_grouped_won() {
        assert_eq!(format_won(Decimal::new(1_234_567, 0)), "1,234,567원");
        assert_eq!(format_won(Decimal::ZERO), "0원");
        assert_eq!(format_won(Decimal::new(999, 0)), "999원");
        assert_eq!(format_won(Decimal::new(12_500_50, 2)), "12,501원");
    }

    #[test]
    fn unknown_match_status_falls_back_to_unmatched() {
        let unknown = MatchStatus::Other("PARTIAL".to_string());
        assert_eq!(match_status_tag(&unknown), match_status_tag(&MatchStatus::Unmatched));
        assert_eq!(match_status_tag(&MatchStatus::Matched), ("매칭완료", Tone::Success));
        assert_eq!(match_status_tag(&MatchStatus::Pending), ("검토중", Tone::Warning));
    }

    #[test]
    fn unknown_receipt_type_passes_through() {
        assert_eq!(receipt_type_label(&ReceiptType::TaxInvoice), "세금계산서");
        assert_eq!(
            receipt_type_label(&ReceiptType::Other("E_TICKET".to_string())),
            "E_TICKET"
        );
    }

    #[test]
    fn verification_badge_is_binary() {
        assert_eq!(verification_badge(true), ("완료", Tone::Success));
        assert_eq!(verification_badge(false), ("대기", Tone::Default));
    }

    #[test]
    fn summaries_render_sorted_and_compact() {
        let summary: Summary = serde_json::from_str(
            r#"{"syncedCount": 12, "provider": "KB", "errors": ["timeout"], "note": null}"#,
        )
        .unwrap();
        assert_eq!(
            summary_lines(&summary),
            vec![
                ("errors".to_string(), "[\"timeout\"]".to_string()),
                ("note".to_string(), "-".to_string()),
                ("provider".to_string(), "KB".to_string()),
                ("syncedCount".to_string(), "12".to_string()),
            ]
        );
        assert_eq!(summary_text(&summary, 1), "errors=[\"timeout\"]");
    }
}
