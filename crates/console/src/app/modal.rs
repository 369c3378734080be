use api_types::{
    export::ExportFormat,
    matching::MatchData,
    receipt::Receipt,
};

use super::{filter::FilterForm, receipts::ReceiptsState};

/// Overlay drawn on top of the receipts table.
#[derive(Debug)]
pub enum Modal {
    Detail(DetailView),
    Match(MatchForm),
    Export(ExportPicker),
    Filter(FilterForm),
}

/// Read-only panel over a row that has already been fetched.
#[derive(Debug)]
pub struct DetailView {
    pub receipt: Receipt,
    pub reloading: bool,
    pub error: Option<String>,
}

impl DetailView {
    pub fn new(receipt: Receipt) -> Self {
        Self {
            receipt,
            reloading: false,
            error: None,
        }
    }

    /// Replaces the row with the full detail payload when ids agree.
    pub fn apply_detail(&mut self, receipt: Receipt) {
        self.reloading = false;
        if receipt.receipt_id == self.receipt.receipt_id {
            self.receipt = receipt;
            self.error = None;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchField {
    pub key: String,
    pub value: String,
}

impl MatchField {
    fn new(key: &str, value: impl Into<String>) -> Self {
        Self {
            key: key.to_string(),
            value: value.into(),
        }
    }
}

/// Manual match form.
///
/// The payload is a free key/value map; the backend owns its validation.
/// The last focus slot is a `key=value` line for adding extra fields.
#[derive(Debug)]
pub struct MatchForm {
    pub receipt_id: i64,
    pub merchant_name: String,
    pub fields: Vec<MatchField>,
    pub extra: String,
    pub focus: usize,
    pub submitting: bool,
    pub error: Option<String>,
}

impl MatchForm {
    /// `None` for receipts that are already matched.
    pub fn open(receipt: &Receipt) -> Option<Self> {
        if !ReceiptsState::can_match(receipt) {
            return None;
        }
        Some(Self {
            receipt_id: receipt.receipt_id,
            merchant_name: receipt.merchant_name.clone(),
            fields: vec![
                MatchField::new("erpLedgerId", ""),
                MatchField::new("accountCode", ""),
                MatchField::new("accountName", ""),
                MatchField::new("costCenter", ""),
                MatchField::new("matchedAmount", receipt.amount.normalize().to_string()),
                MatchField::new("notes", ""),
            ],
            extra: String::new(),
            focus: 0,
            submitting: false,
            error: None,
        })
    }

    pub fn on_extra_line(&self) -> bool {
        self.focus == self.fields.len()
    }

    pub fn next_field(&mut self) {
        self.focus = (self.focus + 1) % (self.fields.len() + 1);
    }

    pub fn prev_field(&mut self) {
        self.focus = self
            .focus
            .checked_sub(1)
            .unwrap_or(self.fields.len());
    }

    pub fn active_input_mut(&mut self) -> &mut String {
        match self.fields.get_mut(self.focus) {
            Some(field) => &mut field.value,
            None => &mut self.extra,
        }
    }

    /// Turns the `key=value` line into a field. Existing keys are updated.
    pub fn commit_extra(&mut self) -> bool {
        let Some((key, value)) = self.extra.split_once('=') else {
            self.error = Some("key=value 형식으로 입력하세요.".to_string());
            return false;
        };
        let key = key.trim();
        if key.is_empty() {
            self.error = Some("항목 이름이 비어 있습니다.".to_string());
            return false;
        }
        let value = value.trim().to_string();
        match self.fields.iter_mut().find(|field| field.key == key) {
            Some(field) => field.value = value,
            None => self.fields.push(MatchField::new(key, value)),
        }
        self.extra.clear();
        self.error = None;
        self.focus = self.fields.len();
        true
    }

    /// Non-blank fields as the request payload.
    pub fn match_data(&self) -> MatchData {
        self.fields
            .iter()
            .filter(|field| !field.value.trim().is_empty())
            .map(|field| {
                (
                    field.key.clone(),
                    serde_json::Value::String(field.value.trim().to_string()),
                )
            })
            .collect()
    }

    /// Returns the payload to send, or `None` while a submit is in flight.
    pub fn begin_submit(&mut self) -> Option<MatchData> {
        if self.submitting {
            return None;
        }
        let data = self.match_data();
        if data.is_empty() {
            self.error = Some("입력된 매칭 정보가 없습니다.".to_string());
            return None;
        }
        self.submitting = true;
        self.error = None;
        Some(data)
    }

    /// Keeps the form open with an inline error.
    pub fn fail(&mut self, message: String) {
        self.submitting = false;
        self.error = Some(message);
    }
}

pub const EXPORT_FORMATS: [ExportFormat; 3] =
    [ExportFormat::Excel, ExportFormat::Pdf, ExportFormat::Csv];

#[derive(Debug, Default)]
pub struct ExportPicker {
    pub selected: usize,
}

impl ExportPicker {
    pub fn next(&mut self) {
        self.selected = (self.selected + 1) % EXPORT_FORMATS.len();
    }

    pub fn prev(&mut self) {
        self.selected = (self.selected + EXPORT_FORMATS.len() - 1) % EXPORT_FORMATS.len();
    }

    pub fn format(&self) -> ExportFormat {
        EXPORT_FORMATS[self.selected % EXPORT_FORMATS.len()]
    }
}

#[cfg(test)]
mod tests {
    use api_types::receipt::{MatchStatus, ReceiptType};
    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    use super::*;

    fn receipt(status: MatchStatus) -> Receipt {
        Receipt {
            receipt_id: 11,
            transaction_date: NaiveDate::from_ymd_opt(2025, 6, 1)
                .unwrap()
                .and_hms_opt(10, 0, 0)
                .unwrap(),
            merchant_name: "문구점".to_string(),
            amount: Decimal::new(3300000, 2),
            card_alias: None,
            receipt_type: ReceiptType::TaxInvoice,
            match_status: status,
            is_verified: false,
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

    #[test]
    fn matched_receipts_do_not_open_the_form() {
        assert!(MatchForm::open(&receipt(MatchStatus::Matched)).is_none());
        assert!(MatchForm::open(&receipt(MatchStatus::Unmatched)).is_some());
    }

    #[test]
    fn payload_skips_blank_fields_and_prefills_amount() {
        let mut form = MatchForm::open(&receipt(MatchStatus::Pending)).unwrap();
        *form.active_input_mut() = "LEDGER-9".to_string();

        let data = form.match_data();
        assert_eq!(data.len(), 2);
        assert_eq!(data["erpLedgerId"], "LEDGER-9");
        assert_eq!(data["matchedAmount"], "33000");
    }

    #[test]
    fn extra_line_adds_or_updates_fields() {
        let mut form = MatchForm::open(&receipt(MatchStatus::Unmatched)).unwrap();
        form.prev_field();
        assert!(form.on_extra_line());

        form.extra = "projectCode = P-01".to_string();
        assert!(form.commit_extra());
        assert_eq!(form.match_data()["projectCode"], "P-01");

        form.extra = "notes=점심".to_string();
        assert!(form.commit_extra());
        assert_eq!(form.match_data()["notes"], "점심");

        form.extra = "missing separator".to_string();
        assert!(!form.commit_extra());
        assert!(form.error.is_some());
    }

    #[test]
    fn submit_is_single_flight_and_failure_reopens() {
        let mut form = MatchForm::open(&receipt(MatchStatus::Unmatched)).unwrap();
        assert!(form.begin_submit().is_some());
        assert!(form.begin_submit().is_none());

        form.fail("400: accountCode invalid".to_string());
        assert!(!form.submitting);
        assert_eq!(form.error.as_deref(), Some("400: accountCode invalid"));
        assert!(form.begin_submit().is_some());
    }

    #[test]
    fn detail_ignores_payload_for_other_receipt() {
        let mut view = DetailView::new(receipt(MatchStatus::Unmatched));
        view.reloading = true;

        let mut other = receipt(MatchStatus::Matched);
        other.receipt_id = 99;
        view.apply_detail(other);
        assert!(!view.reloading);
        assert_eq!(view.receipt.receipt_id, 11);

        let mut fresh = receipt(MatchStatus::Matched);
        fresh.approval_number = Some("A-1".to_string());
        view.apply_detail(fresh);
        assert_eq!(view.receipt.approval_number.as_deref(), Some("A-1"));
    }

    #[test]
    fn export_picker_wraps() {
        let mut picker = ExportPicker::default();
        assert_eq!(picker.format(), ExportFormat::Excel);
        picker.prev();
        assert_eq!(picker.format(), ExportFormat::Csv);
        picker.next();
        picker.next();
        assert_eq!(picker.format(), ExportFormat::Pdf);
    }
}
