use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Untyped JSON object returned by endpoints whose payload shape is owned by
/// the backend (sync summaries, statistics).
pub type Summary = serde_json::Map<String, serde_json::Value>;

/// Backend timestamps are serialized as `yyyy-MM-dd HH:mm:ss`.
///
/// Deserialization also accepts the ISO form (`2025-01-31T09:30:00`) since
/// some endpoints skip the explicit pattern.
pub mod wire_datetime {
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer, de::Error as _};

    pub const FORMAT: &str = "%Y-%m-%d %H:%M:%S";

    pub fn serialize<S: Serializer>(value: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.format(FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDateTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).ok_or_else(|| D::Error::custom(format!("invalid timestamp: {raw}")))
    }

    pub fn parse(raw: &str) -> Option<NaiveDateTime> {
        NaiveDateTime::parse_from_str(raw, FORMAT)
            .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f"))
            .ok()
    }
}

/// Reads an explicit `null` as the type's default. Pair it with
/// `#[serde(default)]` so a missing key behaves the same way.
pub fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Declares a backend enum code that keeps unknown values as raw strings
/// instead of failing to decode.
macro_rules! open_code {
    (
        $(#[$meta:meta])*
        $name:ident { $($variant:ident => $code:literal),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(from = "String", into = "String")]
        pub enum $name {
            $($variant,)+
            /// A code this client does not know about, kept verbatim.
            Other(String),
        }

        impl $name {
            pub fn as_str(&self) -> &str {
                match self {
                    $(Self::$variant => $code,)+
                    Self::Other(code) => code.as_str(),
                }
            }
        }

        impl From<String> for $name {
            fn from(code: String) -> Self {
                match code.as_str() {
                    $($code => Self::$variant,)+
                    _ => Self::Other(code),
                }
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> Self {
                match value {
                    $name::Other(code) => code,
                    other => other.as_str().to_string(),
                }
            }
        }
    };
}

pub mod receipt {
    use super::*;

    open_code! {
        /// Reconciliation state of a receipt as reported by the backend.
        MatchStatus {
            Matched => "MATCHED",
            Pending => "PENDING",
            Unmatched => "UNMATCHED",
        }
    }

    open_code! {
        /// Kind of proof-of-payment document.
        ReceiptType {
            CardSlip => "CARD_SLIP",
            TaxInvoice => "TAX_INVOICE",
            CashReceipt => "CASH_RECEIPT",
        }
    }

    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "SCREAMING_SNAKE_CASE")]
    pub enum MatchStatusFilter {
        #[default]
        All,
        Matched,
        Pending,
        Unmatched,
    }

    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "SCREAMING_SNAKE_CASE")]
    pub enum ReceiptTypeFilter {
        #[default]
        All,
        CardSlip,
        TaxInvoice,
        CashReceipt,
    }

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
    pub enum SortField {
        #[serde(rename = "transactionDate")]
        TransactionDate,
        #[serde(rename = "amount")]
        Amount,
        #[serde(rename = "merchantName")]
        MerchantName,
    }

    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "UPPERCASE")]
    pub enum SortDirection {
        Asc,
        #[default]
        Desc,
    }

    /// Search filters, shared by list, export, statistics and auto-match.
    ///
    /// Dates are inclusive calendar days (`YYYY-MM-DD`). Unset filters are
    /// omitted from the request.
    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct ReceiptSearch {
        pub start_date: NaiveDate,
        pub end_date: NaiveDate,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub card_id: Option<i64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub merchant_name: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub min_amount: Option<Decimal>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub max_amount: Option<Decimal>,
        pub match_status: MatchStatusFilter,
        pub receipt_type: ReceiptTypeFilter,
    }

    /// Query string of `GET /receipts`.
    #[derive(Clone, Debug, PartialEq, Serialize)]
    #[serde(rename_all = "camelCase")]
    pub struct ReceiptListQuery {
        #[serde(flatten)]
        pub search: ReceiptSearch,
        /// Zero-based page index.
        pub page: u32,
        pub size: u32,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub sort_by: Option<SortField>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub sort_direction: Option<SortDirection>,
    }

    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct MatchInfo {
        pub match_id: Option<i64>,
        pub erp_ledger_id: Option<String>,
        pub account_code: Option<String>,
        pub account_name: Option<String>,
        pub matched_amount: Option<Decimal>,
        pub match_status: Option<String>,
    }

    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct Receipt {
        pub receipt_id: i64,
        #[serde(with = "crate::wire_datetime")]
        pub transaction_date: NaiveDateTime,
        pub merchant_name: String,
        pub amount: Decimal,
        #[serde(default)]
        pub card_alias: Option<String>,
        pub receipt_type: ReceiptType,
        pub match_status: MatchStatus,
        #[serde(default, deserialize_with = "crate::null_as_default")]
        pub is_verified: bool,

        // Detail fields; the list endpoint may leave them out.
        #[serde(default)]
        pub receipt_number: Option<String>,
        #[serde(default)]
        pub approval_number: Option<String>,
        #[serde(default)]
        pub merchant_category: Option<String>,
        #[serde(default)]
        pub vat_amount: Option<Decimal>,
        #[serde(default)]
        pub total_amount: Option<Decimal>,
        #[serde(default)]
        pub card_company: Option<String>,
        #[serde(default)]
        pub card_number_masked: Option<String>,
        #[serde(default)]
        pub has_document: Option<bool>,
        #[serde(default, deserialize_with = "crate::null_as_default")]
        pub matches: Vec<MatchInfo>,
    }

    /// Spring-style page of receipts.
    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct ReceiptPage {
        pub content: Vec<Receipt>,
        pub total_elements: u64,
    }
}

pub mod sync {
    use super::*;

    #[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct SyncRequest {
        /// Empty means every registered card.
        pub card_ids: Vec<i64>,
    }

    pub type SyncResult = Summary;
}

pub mod matching {
    use super::*;

    /// Manual match payload. Its keys are defined and validated by the
    /// backend (`erpLedgerId`, `accountCode`, `matchedAmount`, ...).
    pub type MatchData = serde_json::Map<String, serde_json::Value>;

    #[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase", default)]
    pub struct MatchResult {
        pub match_id: Option<i64>,
        pub receipt_id: Option<i64>,
        pub erp_ledger_id: Option<String>,
        pub account_code: Option<String>,
        pub account_name: Option<String>,
        pub matched_amount: Option<Decimal>,
        pub remaining_amount: Option<Decimal>,
        pub match_status: Option<String>,
        pub approval_status: Option<String>,
        pub notes: Option<String>,
    }

    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct AutoMatchRequest {
        #[serde(with = "crate::wire_datetime")]
        pub start_date: NaiveDateTime,
        #[serde(with = "crate::wire_datetime")]
        pub end_date: NaiveDateTime,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub card_ids: Option<Vec<i64>>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub receipt_ids: Option<Vec<i64>>,
        pub dry_run: bool,
    }

    #[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase", default)]
    pub struct MatchingStatistics {
        pub total_receipts: Option<u32>,
        pub eligible_receipts: Option<u32>,
        pub successful_matches: Option<u32>,
        pub failed_matches: Option<u32>,
        pub low_confidence_matches: Option<u32>,
        pub average_confidence_score: Option<f64>,
    }

    #[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase", default)]
    pub struct AutoMatchResult {
        pub batch_id: Option<String>,
        /// `COMPLETED`, `FAILED` or `PARTIAL_SUCCESS`.
        pub status: Option<String>,
        pub processing_time_millis: Option<u64>,
        pub statistics: Option<MatchingStatistics>,
        #[serde(deserialize_with = "crate::null_as_default")]
        pub errors: Vec<String>,
        #[serde(deserialize_with = "crate::null_as_default")]
        pub warnings: Vec<String>,
    }

    impl AutoMatchResult {
        /// Percentage of eligible receipts that were matched.
        pub fn success_rate(&self) -> f64 {
            let Some(stats) = &self.statistics else {
                return 0.0;
            };
            match (stats.eligible_receipts, stats.successful_matches) {
                (Some(eligible), Some(matched)) if eligible > 0 => {
                    f64::from(matched) * 100.0 / f64::from(eligible)
                }
                _ => 0.0,
            }
        }
    }
}

pub mod export {
    use super::*;
    use crate::receipt::ReceiptSearch;

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "UPPERCASE")]
    pub enum ExportFormat {
        Excel,
        Pdf,
        Csv,
    }

    impl ExportFormat {
        /// File extension for saved exports. Excel files get `xlsx` rather
        /// than the lowercased format code (`excel`) the web console used.
        pub fn extension(self) -> &'static str {
            match self {
                Self::Excel => "xlsx",
                Self::Pdf => "pdf",
                Self::Csv => "csv",
            }
        }
    }

    /// Body of `POST /receipts/export`.
    ///
    /// `receipt_ids` is `null` when the export covers the search criteria
    /// instead of an explicit selection.
    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct ExportRequest {
        pub receipt_ids: Option<Vec<i64>>,
        pub format: ExportFormat,
        #[serde(flatten)]
        pub search: ReceiptSearch,
    }
}

pub mod stats {
    pub type Statistics = super::Summary;
}
