use std::collections::BTreeSet;

use api_types::{
    export::{ExportFormat, ExportRequest},
    matching::AutoMatchRequest,
    receipt::{MatchStatus, Receipt, ReceiptListQuery, ReceiptPage, SortField},
};
use chrono::NaiveTime;

use crate::{
    client::ClientError,
    query::{PageRequest, ReceiptSearchCriteria, SortOrder, list_query},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListStatus {
    Idle,
    Loading,
    Loaded,
    Failed,
}

/// A list fetch tagged with the sequence number it was issued under.
#[derive(Debug, Clone, PartialEq)]
pub struct ListRequest {
    pub seq: u64,
    pub query: ReceiptListQuery,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    Applied,
    /// The total shrank below the current page; the page index was pulled
    /// back to the last page and this request loads it.
    Reissued(ListRequest),
    Failed,
    /// A newer request was issued after this one; the response was dropped.
    Stale,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportScope {
    Selection(Vec<i64>),
    Criteria,
}

/// State of the receipts workspace: criteria, paging, rows and selection.
///
/// Every method that needs data returns the [`ListRequest`] to run; the
/// caller executes it and feeds the response back through
/// [`ReceiptsState::apply_fetch`].
#[derive(Debug)]
pub struct ReceiptsState {
    pub criteria: ReceiptSearchCriteria,
    pub page: PageRequest,
    pub sort: Option<SortOrder>,
    pub rows: Vec<Receipt>,
    pub status: ListStatus,
    pub cursor: usize,
    pub selection: BTreeSet<i64>,
    pub syncing: bool,
    pub exporting: bool,
    pub auto_matching: bool,
    pub error: Option<String>,
    /// Sequence number of the most recent list request.
    pub(super) issued: u64,
}

impl ReceiptsState {
    pub fn new(criteria: ReceiptSearchCriteria, page_size: u32) -> Self {
        Self {
            criteria,
            page: PageRequest::first(page_size),
            sort: None,
            rows: Vec::new(),
            status: ListStatus::Idle,
            cursor: 0,
            selection: BTreeSet::new(),
            syncing: false,
            exporting: false,
            auto_matching: false,
            error: None,
            issued: 0,
        }
    }

    pub fn is_loading(&self) -> bool {
        self.status == ListStatus::Loading
    }

    /// Enters `Loading` and returns the request to run.
    pub fn begin_fetch(&mut self) -> ListRequest {
        self.issued += 1;
        self.status = ListStatus::Loading;
        ListRequest {
            seq: self.issued,
            query: list_query(&self.criteria, &self.page, self.sort),
        }
    }

    /// Applies a list response unless a newer request superseded it.
    ///
    /// Failures keep the previous rows on screen.
    pub fn apply_fetch(
        &mut self,
        seq: u64,
        result: Result<ReceiptPage, ClientError>,
    ) -> FetchOutcome {
        if seq != self.issued {
            tracing::debug!("dropping stale list response #{seq}, latest is #{}", self.issued);
            return FetchOutcome::Stale;
        }
        match result {
            Ok(page) => {
                self.rows = page.content;
                self.page.total = page.total_elements;
                self.status = ListStatus::Loaded;
                self.error = None;
                self.cursor = self.cursor.min(self.rows.len().saturating_sub(1));
                let last = self.page.page_count() - 1;
                if self.page.index > last {
                    tracing::debug!(
                        "page {} is past the end after refresh, moving to {last}",
                        self.page.index
                    );
                    self.page.index = last;
                    self.cursor = 0;
                    return FetchOutcome::Reissued(self.begin_fetch());
                }
                FetchOutcome::Applied
            }
            Err(err) => {
                self.status = ListStatus::Failed;
                self.error = match err {
                    ClientError::Unauthorized => None,
                    other => Some(crate::app::toast::error_detail(&other)),
                };
                FetchOutcome::Failed
            }
        }
    }

    /// New criteria always restart from the first page.
    pub fn set_criteria(&mut self, criteria: ReceiptSearchCriteria) -> ListRequest {
        self.criteria = criteria;
        self.page.index = 0;
        self.cursor = 0;
        self.begin_fetch()
    }

    pub fn next_page(&mut self) -> Option<ListRequest> {
        if !self.page.has_next() {
            return None;
        }
        self.page.index += 1;
        self.cursor = 0;
        Some(self.begin_fetch())
    }

    pub fn prev_page(&mut self) -> Option<ListRequest> {
        if !self.page.has_prev() {
            return None;
        }
        self.page.index -= 1;
        self.cursor = 0;
        Some(self.begin_fetch())
    }

    pub fn set_page_size(&mut self, size: u32) -> Option<ListRequest> {
        let size = size.max(1);
        if size == self.page.size {
            return None;
        }
        self.page.size = size;
        self.page.index = 0;
        self.cursor = 0;
        Some(self.begin_fetch())
    }

    pub fn cycle_sort(&mut self, field: SortField) -> ListRequest {
        self.sort = SortOrder::cycle(self.sort, field);
        self.page.index = 0;
        self.cursor = 0;
        self.begin_fetch()
    }

    pub fn current(&self) -> Option<&Receipt> {
        self.rows.get(self.cursor)
    }

    pub fn select_next(&mut self) {
        if self.rows.is_empty() {
            return;
        }
        self.cursor = (self.cursor + 1).min(self.rows.len() - 1);
    }

    pub fn select_prev(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn toggle_current(&mut self) {
        let Some(id) = self.current().map(|row| row.receipt_id) else {
            return;
        };
        if !self.selection.remove(&id) {
            self.selection.insert(id);
        }
    }

    /// Selects every row on the page, or clears them if all were selected.
    pub fn toggle_page(&mut self) {
        let ids: Vec<i64> = self.rows.iter().map(|row| row.receipt_id).collect();
        if ids.iter().all(|id| self.selection.contains(id)) {
            for id in &ids {
                self.selection.remove(id);
            }
        } else {
            self.selection.extend(ids);
        }
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear();
    }

    pub fn is_selected(&self, receipt_id: i64) -> bool {
        self.selection.contains(&receipt_id)
    }

    /// Matching is offered for anything not already matched.
    pub fn can_match(receipt: &Receipt) -> bool {
        receipt.match_status != MatchStatus::Matched
    }

    /// Returns `false` when a sync is already running.
    pub fn begin_sync(&mut self) -> bool {
        if self.syncing {
            return false;
        }
        self.syncing = true;
        true
    }

    /// Ends the sync; success refreshes the list exactly once.
    pub fn finish_sync(&mut self, succeeded: bool) -> Option<ListRequest> {
        self.syncing = false;
        succeeded.then(|| self.begin_fetch())
    }

    /// A completed manual match invalidates rows and selection.
    pub fn on_match_succeeded(&mut self) -> ListRequest {
        self.selection.clear();
        self.begin_fetch()
    }

    pub fn export_scope(&self) -> ExportScope {
        if self.selection.is_empty() {
            ExportScope::Criteria
        } else {
            ExportScope::Selection(self.selection.iter().copied().collect())
        }
    }

    pub fn export_request(&self, format: ExportFormat) -> ExportRequest {
        let receipt_ids = match self.export_scope() {
            ExportScope::Selection(ids) => Some(ids),
            ExportScope::Criteria => None,
        };
        ExportRequest {
            receipt_ids,
            format,
            search: self.criteria.to_search(),
        }
    }

    /// Auto-match over the active date range, narrowed to the selection
    /// when there is one.
    pub fn auto_match_request(&self) -> AutoMatchRequest {
        let range = self.criteria.date_range;
        let end_of_day = NaiveTime::from_hms_opt(23, 59, 59).unwrap_or(NaiveTime::MIN);
        let receipt_ids = match self.export_scope() {
            ExportScope::Selection(ids) => Some(ids),
            ExportScope::Criteria => None,
        };
        AutoMatchRequest {
            start_date: range.start().and_time(NaiveTime::MIN),
            end_date: range.end().and_time(end_of_day),
            card_ids: self.criteria.card_id.map(|id| vec![id]),
            receipt_ids,
            dry_run: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use api_types::receipt::{MatchStatusFilter, ReceiptType};
    use chrono::NaiveDate;
    use reqwest::StatusCode;
    use rust_decimal::Decimal;

    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 15).unwrap()
    }

    fn receipt(id: i64, status: MatchStatus) -> Receipt {
        Receipt {
            receipt_id: id,
            transaction_date: today().and_hms_opt(9, 0, 0).unwrap(),
            merchant_name: format!("merchant {id}"),
            amount: Decimal::new(1000 * id, 0),
            card_alias: Some("법인카드".to_string()),
            receipt_type: ReceiptType::CardSlip,
            match_status: status,
            is_verified: true,
            receipt_number: None,
            approval_number: None,
            merchant_category: None,
            vat_amount: None,
            total_amount: None,
            card_company: None,
            card_number_masked: None,
            has_document: None,
            matches: Vec::new(),
        }
    }

    fn page_of(ids: &[i64], total: u64) -> ReceiptPage {
        ReceiptPage {
            content: ids
                .iter()
                .map(|id| receipt(*id, MatchStatus::Unmatched))
                .collect(),
            total_elements: total,
        }
    }

    fn state() -> ReceiptsState {
        ReceiptsState::new(ReceiptSearchCriteria::defaults_for(today()), 20)
    }

    fn server_error() -> ClientError {
        ClientError::Server {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            body: "boom".to_string(),
        }
    }

    #[test]
    fn initial_fetch_uses_default_criteria_on_first_page() {
        let mut state = state();
        assert_eq!(state.status, ListStatus::Idle);

        let req = state.begin_fetch();
        assert_eq!(state.status, ListStatus::Loading);
        assert_eq!(req.query.page, 0);
        assert_eq!(req.query.size, 20);
        assert_eq!(
            req.query.search.start_date,
            NaiveDate::from_ymd_opt(2025, 5, 15).unwrap()
        );
        assert_eq!(req.query.search.end_date, today());
    }

    #[test]
    fn criteria_change_resets_page_and_updates_total() {
        let mut state = state();
        let req = state.begin_fetch();
        state.apply_fetch(req.seq, Ok(page_of(&[1, 2], 100)));
        let req = state.next_page().unwrap();
        assert_eq!(req.query.page, 1);
        state.apply_fetch(req.seq, Ok(page_of(&[21, 22], 100)));

        let mut criteria = state.criteria.clone();
        criteria.match_status = MatchStatusFilter::Pending;
        let req = state.set_criteria(criteria);
        assert_eq!(req.query.page, 0);
        assert_eq!(req.query.search.match_status, MatchStatusFilter::Pending);

        assert_eq!(state.apply_fetch(req.seq, Ok(page_of(&[5], 1))), FetchOutcome::Applied);
        assert_eq!(state.page.total, 1);
        assert_eq!(state.page.index, 0);
        assert_eq!(state.status, ListStatus::Loaded);
    }

    #[test]
    fn stale_responses_are_dropped() {
        let mut state = state();
        let old = state.begin_fetch();
        let new = state.begin_fetch();

        assert_eq!(state.apply_fetch(new.seq, Ok(page_of(&[7], 1))), FetchOutcome::Applied);
        assert_eq!(
            state.apply_fetch(old.seq, Ok(page_of(&[1, 2, 3], 3))),
            FetchOutcome::Stale
        );
        assert_eq!(state.rows.len(), 1);
        assert_eq!(state.rows[0].receipt_id, 7);
        assert_eq!(state.page.total, 1);
    }

    #[test]
    fn shrinking_total_moves_back_to_last_page() {
        let mut state = state();
        let req = state.begin_fetch();
        state.apply_fetch(req.seq, Ok(page_of(&[1], 60)));
        state.next_page().unwrap();
        let req = state.next_page().unwrap();
        assert_eq!(req.query.page, 2);
        state.apply_fetch(req.seq, Ok(page_of(&[41], 60)));

        let req = state.begin_fetch();
        let outcome = state.apply_fetch(req.seq, Ok(page_of(&[], 30)));
        let FetchOutcome::Reissued(follow_up) = outcome else {
            panic!("expected a follow-up fetch, got {outcome:?}");
        };
        assert_eq!(state.page.index, 1);
        assert_eq!(follow_up.query.page, 1);
        assert_eq!(follow_up.seq, req.seq + 1);
        assert!(state.is_loading());

        assert_eq!(
            state.apply_fetch(follow_up.seq, Ok(page_of(&[21, 22], 30))),
            FetchOutcome::Applied
        );
        assert_eq!(state.page.index, 1);
        assert_eq!(state.rows.len(), 2);
    }

    #[test]
    fn empty_result_stays_on_first_page() {
        let mut state = state();
        let req = state.begin_fetch();
        assert_eq!(state.apply_fetch(req.seq, Ok(page_of(&[], 0))), FetchOutcome::Applied);
        assert_eq!(state.page.index, 0);
    }

    #[test]
    fn failures_keep_previous_rows() {
        let mut state = state();
        let req = state.begin_fetch();
        state.apply_fetch(req.seq, Ok(page_of(&[1, 2], 2)));

        let req = state.begin_fetch();
        assert_eq!(state.apply_fetch(req.seq, Err(server_error())), FetchOutcome::Failed);
        assert_eq!(state.status, ListStatus::Failed);
        assert_eq!(state.rows.len(), 2);
        assert_eq!(state.page.total, 2);
        assert_eq!(state.error.as_deref(), Some("500: boom"));
    }

    #[test]
    fn unauthorized_failure_sets_no_message() {
        let mut state = state();
        let req = state.begin_fetch();
        state.apply_fetch(req.seq, Err(ClientError::Unauthorized));
        assert_eq!(state.status, ListStatus::Failed);
        assert!(state.error.is_none());
    }

    #[test]
    fn successful_sync_triggers_exactly_one_refetch() {
        let mut state = state();
        assert!(state.begin_sync());
        assert!(!state.begin_sync());
        assert!(state.syncing);

        let refetch = state.finish_sync(true);
        assert!(refetch.is_some());
        assert!(!state.syncing);
        assert_eq!(state.status, ListStatus::Loading);

        assert!(state.begin_sync());
        assert!(state.finish_sync(false).is_none());
    }

    #[test]
    fn failed_sync_leaves_rows_untouched() {
        let mut state = state();
        let req = state.begin_fetch();
        state.apply_fetch(req.seq, Ok(page_of(&[1], 1)));

        state.begin_sync();
        assert!(state.finish_sync(false).is_none());
        assert_eq!(state.status, ListStatus::Loaded);
        assert_eq!(state.rows.len(), 1);
    }

    #[test]
    fn export_scope_prefers_selection() {
        let mut state = state();
        assert_eq!(state.export_scope(), ExportScope::Criteria);
        let body = state.export_request(ExportFormat::Pdf);
        assert!(body.receipt_ids.is_none());

        let req = state.begin_fetch();
        state.apply_fetch(req.seq, Ok(page_of(&[4, 9], 2)));
        state.toggle_current();
        state.select_next();
        state.toggle_current();
        assert_eq!(state.export_scope(), ExportScope::Selection(vec![4, 9]));

        let body = state.export_request(ExportFormat::Excel);
        assert_eq!(body.receipt_ids, Some(vec![4, 9]));
        assert_eq!(body.search, state.criteria.to_search());
    }

    #[test]
    fn selection_survives_paging() {
        let mut state = state();
        let req = state.begin_fetch();
        state.apply_fetch(req.seq, Ok(page_of(&[1, 2], 40)));
        state.toggle_page();
        assert_eq!(state.selection.len(), 2);

        let req = state.next_page().unwrap();
        state.apply_fetch(req.seq, Ok(page_of(&[21, 22], 40)));
        assert!(state.is_selected(1));
        state.toggle_current();
        assert_eq!(state.selection.len(), 3);

        state.toggle_page();
        state.toggle_page();
        assert!(!state.is_selected(21));
        assert!(state.is_selected(2));
    }

    #[test]
    fn match_success_refetches_and_clears_selection() {
        let mut state = state();
        let req = state.begin_fetch();
        state.apply_fetch(req.seq, Ok(page_of(&[1], 1)));
        state.toggle_current();

        let req = state.on_match_succeeded();
        assert!(state.selection.is_empty());
        assert_eq!(state.status, ListStatus::Loading);
        assert_eq!(req.query.page, state.page.index);
    }

    #[test]
    fn matched_receipts_cannot_be_matched_again() {
        assert!(!ReceiptsState::can_match(&receipt(1, MatchStatus::Matched)));
        assert!(ReceiptsState::can_match(&receipt(1, MatchStatus::Pending)));
        assert!(ReceiptsState::can_match(&receipt(
            1,
            MatchStatus::Other("PARTIAL".to_string())
        )));
    }

    #[test]
    fn paging_stops_at_bounds() {
        let mut state = state();
        assert!(state.prev_page().is_none());
        let req = state.begin_fetch();
        state.apply_fetch(req.seq, Ok(page_of(&[1], 20)));
        assert!(state.next_page().is_none());

        let req = state.set_page_size(10).unwrap();
        assert_eq!(req.query.size, 10);
        assert!(state.set_page_size(10).is_none());
    }

    #[test]
    fn auto_match_covers_whole_days() {
        let state = state();
        let request = state.auto_match_request();
        assert_eq!(
            request.start_date.format("%Y-%m-%d %H:%M:%S").to_string(),
            "2025-05-15 00:00:00"
        );
        assert_eq!(
            request.end_date.format("%Y-%m-%d %H:%M:%S").to_string(),
            "2025-06-15 23:59:59"
        );
        assert!(request.receipt_ids.is_none());
    }
}
