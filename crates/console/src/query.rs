use api_types::receipt::{
    MatchStatusFilter, ReceiptListQuery, ReceiptSearch, ReceiptTypeFilter, SortDirection,
    SortField,
};
use chrono::{Months, NaiveDate, Utc};
use chrono_tz::Tz;
use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CriteriaError {
    #[error("start date is after end date")]
    InvertedDates,
    #[error("minimum amount is greater than maximum amount")]
    InvertedAmounts,
    #[error("amounts cannot be negative")]
    NegativeAmount,
}

/// Calendar day in the console's configured timezone.
pub fn today_in(tz: Tz) -> NaiveDate {
    Utc::now().with_timezone(&tz).date_naive()
}

/// Inclusive date range. Always `start <= end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, CriteriaError> {
        if start > end {
            return Err(CriteriaError::InvertedDates);
        }
        Ok(Self { start, end })
    }

    /// `[today - 1 month, today]`. Short months clamp to their last day.
    pub fn last_month(today: NaiveDate) -> Self {
        let start = today.checked_sub_months(Months::new(1)).unwrap_or(today);
        Self { start, end: today }
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReceiptSearchCriteria {
    pub date_range: DateRange,
    pub card_id: Option<i64>,
    pub merchant_name: Option<String>,
    pub min_amount: Option<Decimal>,
    pub max_amount: Option<Decimal>,
    pub match_status: MatchStatusFilter,
    pub receipt_type: ReceiptTypeFilter,
}

impl ReceiptSearchCriteria {
    /// Unfiltered criteria over the last month.
    pub fn defaults_for(today: NaiveDate) -> Self {
        Self {
            date_range: DateRange::last_month(today),
            card_id: None,
            merchant_name: None,
            min_amount: None,
            max_amount: None,
            match_status: MatchStatusFilter::All,
            receipt_type: ReceiptTypeFilter::All,
        }
    }

    pub fn validate(&self) -> Result<(), CriteriaError> {
        let negative = |amount: Option<Decimal>| amount.is_some_and(|a| a.is_sign_negative());
        if negative(self.min_amount) || negative(self.max_amount) {
            return Err(CriteriaError::NegativeAmount);
        }
        if let (Some(min), Some(max)) = (self.min_amount, self.max_amount) {
            if min > max {
                return Err(CriteriaError::InvertedAmounts);
            }
        }
        Ok(())
    }

    pub fn to_search(&self) -> ReceiptSearch {
        ReceiptSearch {
            start_date: self.date_range.start(),
            end_date: self.date_range.end(),
            card_id: self.card_id,
            merchant_name: self
                .merchant_name
                .as_deref()
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map(str::to_string),
            min_amount: self.min_amount,
            max_amount: self.max_amount,
            match_status: self.match_status,
            receipt_type: self.receipt_type,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    /// Zero-based.
    pub index: u32,
    pub size: u32,
    /// Total rows reported by the last successful fetch.
    pub total: u64,
}

impl PageRequest {
    pub fn first(size: u32) -> Self {
        Self {
            index: 0,
            size: size.max(1),
            total: 0,
        }
    }

    pub fn page_count(&self) -> u32 {
        let size = u64::from(self.size.max(1));
        let pages = self.total.div_ceil(size).max(1);
        u32::try_from(pages).unwrap_or(u32::MAX)
    }

    pub fn has_next(&self) -> bool {
        self.index + 1 < self.page_count()
    }

    pub fn has_prev(&self) -> bool {
        self.index > 0
    }

    /// One-based page number, as shown to users.
    pub fn display_number(&self) -> u32 {
        self.index + 1
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortOrder {
    pub field: SortField,
    pub direction: SortDirection,
}

impl SortOrder {
    /// Cycles a column through descending, ascending and backend default.
    pub fn cycle(current: Option<SortOrder>, field: SortField) -> Option<SortOrder> {
        match current {
            Some(order) if order.field == field => match order.direction {
                SortDirection::Desc => Some(SortOrder {
                    field,
                    direction: SortDirection::Asc,
                }),
                SortDirection::Asc => None,
            },
            _ => Some(SortOrder {
                field,
                direction: SortDirection::Desc,
            }),
        }
    }
}

pub fn list_query(
    criteria: &ReceiptSearchCriteria,
    page: &PageRequest,
    sort: Option<SortOrder>,
) -> ReceiptListQuery {
    ReceiptListQuery {
        search: criteria.to_search(),
        page: page.index,
        size: page.size,
        sort_by: sort.map(|order| order.field),
        sort_direction: sort.map(|order| order.direction),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn default_range_spans_last_month_inclusive() {
        let criteria = ReceiptSearchCriteria::defaults_for(date(2025, 6, 15));
        assert_eq!(criteria.date_range.start(), date(2025, 5, 15));
        assert_eq!(criteria.date_range.end(), date(2025, 6, 15));
        assert_eq!(criteria.match_status, MatchStatusFilter::All);
        assert_eq!(criteria.receipt_type, ReceiptTypeFilter::All);
        assert!(criteria.card_id.is_none());
    }

    #[test]
    fn default_range_clamps_short_months() {
        let range = DateRange::last_month(date(2024, 3, 31));
        assert_eq!(range.start(), date(2024, 2, 29));
    }

    #[test]
    fn inverted_ranges_are_rejected() {
        assert_eq!(
            DateRange::new(date(2025, 2, 1), date(2025, 1, 1)),
            Err(CriteriaError::InvertedDates)
        );

        let mut criteria = ReceiptSearchCriteria::defaults_for(date(2025, 6, 15));
        criteria.min_amount = Some(Decimal::new(5000, 0));
        criteria.max_amount = Some(Decimal::new(1000, 0));
        assert_eq!(criteria.validate(), Err(CriteriaError::InvertedAmounts));

        criteria.max_amount = Some(Decimal::new(5000, 0));
        assert!(criteria.validate().is_ok());

        criteria.min_amount = Some(Decimal::new(-1, 0));
        assert_eq!(criteria.validate(), Err(CriteriaError::NegativeAmount));
    }

    #[test]
    fn blank_merchant_is_not_sent() {
        let mut criteria = ReceiptSearchCriteria::defaults_for(date(2025, 6, 15));
        criteria.merchant_name = Some("   ".to_string());
        assert!(criteria.to_search().merchant_name.is_none());

        criteria.merchant_name = Some(" 스타벅스 ".to_string());
        assert_eq!(criteria.to_search().merchant_name.as_deref(), Some("스타벅스"));
    }

    #[test]
    fn list_query_serializes_wire_names() {
        let criteria = ReceiptSearchCriteria::defaults_for(date(2025, 6, 15));
        let page = PageRequest {
            index: 2,
            size: 20,
            total: 0,
        };
        let query = list_query(
            &criteria,
            &page,
            Some(SortOrder {
                field: SortField::Amount,
                direction: SortDirection::Asc,
            }),
        );
        let json = serde_json::to_value(&query).unwrap();
        assert_eq!(json["startDate"], "2025-05-15");
        assert_eq!(json["endDate"], "2025-06-15");
        assert_eq!(json["matchStatus"], "ALL");
        assert_eq!(json["receiptType"], "ALL");
        assert_eq!(json["page"], 2);
        assert_eq!(json["size"], 20);
        assert_eq!(json["sortBy"], "amount");
        assert_eq!(json["sortDirection"], "ASC");
        assert!(json.get("cardId").is_none());
    }

    #[test]
    fn page_bounds_follow_total() {
        let mut page = PageRequest::first(20);
        assert_eq!(page.page_count(), 1);
        assert!(!page.has_next());

        page.total = 41;
        assert_eq!(page.page_count(), 3);
        assert!(page.has_next());
        page.index = 2;
        assert!(!page.has_next());
        assert!(page.has_prev());
        assert_eq!(page.display_number(), 3);
    }

    #[test]
    fn sort_cycles_desc_asc_default() {
        let first = SortOrder::cycle(None, SortField::Amount);
        assert_eq!(first.map(|o| o.direction), Some(SortDirection::Desc));
        let second = SortOrder::cycle(first, SortField::Amount);
        assert_eq!(second.map(|o| o.direction), Some(SortDirection::Asc));
        assert_eq!(SortOrder::cycle(second, SortField::Amount), None);

        let other = SortOrder::cycle(second, SortField::TransactionDate);
        assert_eq!(other.map(|o| o.field), Some(SortField::TransactionDate));
    }
}
