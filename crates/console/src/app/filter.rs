use api_types::receipt::{MatchStatusFilter, ReceiptTypeFilter};
use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::query::{DateRange, ReceiptSearchCriteria};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterField {
    StartDate,
    EndDate,
    CardId,
    Merchant,
    MinAmount,
    MaxAmount,
    MatchStatus,
    ReceiptType,
}

impl FilterField {
    pub const ALL: [FilterField; 8] = [
        FilterField::StartDate,
        FilterField::EndDate,
        FilterField::CardId,
        FilterField::Merchant,
        FilterField::MinAmount,
        FilterField::MaxAmount,
        FilterField::MatchStatus,
        FilterField::ReceiptType,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::StartDate => "시작일",
            Self::EndDate => "종료일",
            Self::CardId => "카드 ID",
            Self::Merchant => "가맹점",
            Self::MinAmount => "최소 금액",
            Self::MaxAmount => "최대 금액",
            Self::MatchStatus => "매칭 상태",
            Self::ReceiptType => "증빙 유형",
        }
    }

    pub fn is_choice(self) -> bool {
        matches!(self, Self::MatchStatus | Self::ReceiptType)
    }
}

const MATCH_FILTERS: [MatchStatusFilter; 4] = [
    MatchStatusFilter::All,
    MatchStatusFilter::Matched,
    MatchStatusFilter::Pending,
    MatchStatusFilter::Unmatched,
];

const TYPE_FILTERS: [ReceiptTypeFilter; 4] = [
    ReceiptTypeFilter::All,
    ReceiptTypeFilter::CardSlip,
    ReceiptTypeFilter::TaxInvoice,
    ReceiptTypeFilter::CashReceipt,
];

fn cycle<T: Copy + PartialEq>(options: &[T], current: T, forward: bool) -> T {
    let len = options.len();
    let index = options.iter().position(|o| *o == current).unwrap_or(0);
    let next = if forward {
        (index + 1) % len
    } else {
        (index + len - 1) % len
    };
    options[next]
}

/// Editable copy of the search criteria. Text stays raw until applied.
#[derive(Debug, Clone)]
pub struct FilterForm {
    pub start_date: String,
    pub end_date: String,
    pub card_id: String,
    pub merchant: String,
    pub min_amount: String,
    pub max_amount: String,
    pub match_status: MatchStatusFilter,
    pub receipt_type: ReceiptTypeFilter,
    pub focus: usize,
    pub error: Option<String>,
}

impl FilterForm {
    pub fn from_criteria(criteria: &ReceiptSearchCriteria) -> Self {
        let text = |value: Option<String>| value.unwrap_or_default();
        Self {
            start_date: criteria.date_range.start().format("%Y-%m-%d").to_string(),
            end_date: criteria.date_range.end().format("%Y-%m-%d").to_string(),
            card_id: text(criteria.card_id.map(|id| id.to_string())),
            merchant: text(criteria.merchant_name.clone()),
            min_amount: text(criteria.min_amount.map(|a| a.to_string())),
            max_amount: text(criteria.max_amount.map(|a| a.to_string())),
            match_status: criteria.match_status,
            receipt_type: criteria.receipt_type,
            focus: 0,
            error: None,
        }
    }

    pub fn focused(&self) -> FilterField {
        FilterField::ALL[self.focus % FilterField::ALL.len()]
    }

    pub fn next_field(&mut self) {
        self.focus = (self.focus + 1) % FilterField::ALL.len();
    }

    pub fn prev_field(&mut self) {
        self.focus = (self.focus + FilterField::ALL.len() - 1) % FilterField::ALL.len();
    }

    /// Text of a field as drawn in the form.
    pub fn value(&self, field: FilterField) -> &str {
        match field {
            FilterField::StartDate => &self.start_date,
            FilterField::EndDate => &self.end_date,
            FilterField::CardId => &self.card_id,
            FilterField::Merchant => &self.merchant,
            FilterField::MinAmount => &self.min_amount,
            FilterField::MaxAmount => &self.max_amount,
            FilterField::MatchStatus => crate::display::match_filter_label(self.match_status),
            FilterField::ReceiptType => crate::display::type_filter_label(self.receipt_type),
        }
    }

    fn text_mut(&mut self) -> Option<&mut String> {
        match self.focused() {
            FilterField::StartDate => Some(&mut self.start_date),
            FilterField::EndDate => Some(&mut self.end_date),
            FilterField::CardId => Some(&mut self.card_id),
            FilterField::Merchant => Some(&mut self.merchant),
            FilterField::MinAmount => Some(&mut self.min_amount),
            FilterField::MaxAmount => Some(&mut self.max_amount),
            FilterField::MatchStatus | FilterField::ReceiptType => None,
        }
    }

    pub fn push_char(&mut self, c: char) {
        if let Some(text) = self.text_mut() {
            text.push(c);
        }
    }

    pub fn backspace(&mut self) {
        if let Some(text) = self.text_mut() {
            text.pop();
        }
    }

    /// Steps a choice field through its options.
    pub fn cycle_choice(&mut self, forward: bool) {
        match self.focused() {
            FilterField::MatchStatus => {
                self.match_status = cycle(&MATCH_FILTERS, self.match_status, forward);
            }
            FilterField::ReceiptType => {
                self.receipt_type = cycle(&TYPE_FILTERS, self.receipt_type, forward);
            }
            _ => {}
        }
    }

    /// Parses the form. On failure the message is also kept on the form.
    pub fn parse(&mut self) -> Result<ReceiptSearchCriteria, String> {
        let parsed = self.try_parse();
        self.error = parsed.as_ref().err().cloned();
        parsed
    }

    fn try_parse(&self) -> Result<ReceiptSearchCriteria, String> {
        let start = parse_date(FilterField::StartDate, &self.start_date)?;
        let end = parse_date(FilterField::EndDate, &self.end_date)?;
        let date_range = DateRange::new(start, end).map_err(|_| "시작일이 종료일보다 늦습니다.".to_string())?;

        let card_id = match self.card_id.trim() {
            "" => None,
            raw => Some(
                raw.parse::<i64>()
                    .map_err(|_| format!("{}: 숫자를 입력하세요.", FilterField::CardId.label()))?,
            ),
        };
        let merchant_name = Some(self.merchant.trim().to_string()).filter(|name| !name.is_empty());

        let criteria = ReceiptSearchCriteria {
            date_range,
            card_id,
            merchant_name,
            min_amount: parse_amount(FilterField::MinAmount, &self.min_amount)?,
            max_amount: parse_amount(FilterField::MaxAmount, &self.max_amount)?,
            match_status: self.match_status,
            receipt_type: self.receipt_type,
        };
        criteria.validate().map_err(|err| match err {
            crate::query::CriteriaError::InvertedAmounts => {
                "최소 금액이 최대 금액보다 큽니다.".to_string()
            }
            crate::query::CriteriaError::NegativeAmount => {
                "금액은 0 이상이어야 합니다.".to_string()
            }
            crate::query::CriteriaError::InvertedDates => {
                "시작일이 종료일보다 늦습니다.".to_string()
            }
        })?;
        Ok(criteria)
    }
}

fn parse_date(field: FilterField, raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| format!("{}: YYYY-MM-DD 형식으로 입력하세요.", field.label()))
}

fn parse_amount(field: FilterField, raw: &str) -> Result<Option<Decimal>, String> {
    let cleaned: String = raw.chars().filter(|c| *c != ',').collect();
    match cleaned.trim() {
        "" => Ok(None),
        value => value
            .parse::<Decimal>()
            .map(Some)
            .map_err(|_| format!("{}: 숫자를 입력하세요.", field.label())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn criteria() -> ReceiptSearchCriteria {
        ReceiptSearchCriteria::defaults_for(NaiveDate::from_ymd_opt(2025, 6, 15).unwrap())
    }

    #[test]
    fn unchanged_form_parses_back_to_the_same_criteria() {
        let original = criteria();
        let mut form = FilterForm::from_criteria(&original);
        assert_eq!(form.start_date, "2025-05-15");
        assert_eq!(form.parse().unwrap(), original);
    }

    #[test]
    fn text_and_choice_fields_are_applied() {
        let mut form = FilterForm::from_criteria(&criteria());
        form.card_id = "42".to_string();
        form.merchant = "  스타벅스 ".to_string();
        form.min_amount = "1,000".to_string();
        form.focus = 6;
        form.cycle_choice(true);
        form.next_field();
        form.cycle_choice(false);

        let parsed = form.parse().unwrap();
        assert_eq!(parsed.card_id, Some(42));
        assert_eq!(parsed.merchant_name.as_deref(), Some("스타벅스"));
        assert_eq!(parsed.min_amount, Some(Decimal::new(1000, 0)));
        assert_eq!(parsed.match_status, MatchStatusFilter::Matched);
        assert_eq!(parsed.receipt_type, ReceiptTypeFilter::CashReceipt);
    }

    #[test]
    fn typing_edits_only_text_fields() {
        let mut form = FilterForm::from_criteria(&criteria());
        form.focus = 3;
        form.push_char('a');
        form.push_char('b');
        form.backspace();
        assert_eq!(form.merchant, "a");

        form.focus = 6;
        form.push_char('x');
        assert_eq!(form.value(FilterField::MatchStatus), "전체");
    }

    #[test]
    fn invalid_input_reports_inline() {
        let mut form = FilterForm::from_criteria(&criteria());
        form.start_date = "2025/05/01".to_string();
        assert!(form.parse().is_err());
        assert!(form.error.as_deref().unwrap().contains("YYYY-MM-DD"));

        let mut form = FilterForm::from_criteria(&criteria());
        form.start_date = "2025-07-01".to_string();
        assert_eq!(form.parse().unwrap_err(), "시작일이 종료일보다 늦습니다.");

        let mut form = FilterForm::from_criteria(&criteria());
        form.min_amount = "500".to_string();
        form.max_amount = "100".to_string();
        assert!(form.parse().is_err());

        form.max_amount = "1000".to_string();
        assert!(form.parse().is_ok());
        assert!(form.error.is_none());
    }
}
