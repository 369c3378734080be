use std::{fmt, sync::Arc, time::Duration};

use api_types::{
    export::ExportRequest,
    matching::{AutoMatchRequest, AutoMatchResult, MatchData, MatchResult},
    receipt::{Receipt, ReceiptListQuery, ReceiptPage, ReceiptSearch},
    stats::Statistics,
    sync::{SyncRequest, SyncResult},
};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::{Deserialize, de::DeserializeOwned};

use crate::{
    error::Result,
    save::receipt_file_name,
    session::{TokenSource, UnauthorizedHandler},
};

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    /// 401. The login redirect has already been requested.
    #[error("unauthorized")]
    Unauthorized,
    #[error("{status}: {body}")]
    Server { status: StatusCode, body: String },
}

/// Error bodies come either from Spring (`message`) or from gateways
/// (`error`).
#[derive(Debug, Deserialize)]
struct ErrorResponse {
    message: Option<String>,
    error: Option<String>,
}

/// A single receipt document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Download {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

#[derive(Clone)]
pub struct Client {
    base_url: String,
    http: reqwest::Client,
    tokens: Arc<dyn TokenSource>,
    unauthorized: Arc<dyn UnauthorizedHandler>,
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl Client {
    pub fn new(
        base_url: &str,
        timeout: Option<Duration>,
        tokens: Arc<dyn TokenSource>,
        unauthorized: Arc<dyn UnauthorizedHandler>,
    ) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http: builder.build()?,
            tokens,
            unauthorized,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Adds the bearer token when the session has one.
    fn authorize(&self, req: RequestBuilder) -> RequestBuilder {
        match self.tokens.token() {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    async fn send(&self, req: RequestBuilder) -> std::result::Result<Response, ClientError> {
        let res = self.authorize(req).send().await.map_err(|err| {
            tracing::warn!("request failed: {err}");
            ClientError::Network(err)
        })?;

        let status = res.status();
        if status.is_success() {
            return Ok(res);
        }
        if status == StatusCode::UNAUTHORIZED {
            self.unauthorized.redirect_to_login();
            return Err(ClientError::Unauthorized);
        }

        let body = error_body(res).await;
        tracing::warn!("backend answered {status}: {body}");
        Err(ClientError::Server { status, body })
    }

    async fn get_json<T: DeserializeOwned, Q: serde::Serialize + ?Sized>(
        &self,
        path: &str,
        query: Option<&Q>,
    ) -> std::result::Result<T, ClientError> {
        tracing::debug!("GET {path}");
        let mut req = self.http.get(self.url(path));
        if let Some(query) = query {
            req = req.query(query);
        }
        Ok(self.send(req).await?.json::<T>().await?)
    }

    async fn post_json<B: serde::Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> std::result::Result<T, ClientError> {
        tracing::debug!("POST {path}");
        let req = self.http.post(self.url(path)).json(body);
        Ok(self.send(req).await?.json::<T>().await?)
    }

    pub async fn list_receipts(
        &self,
        query: &ReceiptListQuery,
    ) -> std::result::Result<ReceiptPage, ClientError> {
        self.get_json("receipts", Some(query)).await
    }

    pub async fn get_receipt(&self, receipt_id: i64) -> std::result::Result<Receipt, ClientError> {
        self.get_json(&format!("receipts/{receipt_id}"), None::<&()>)
            .await
    }

    /// An empty `card_ids` syncs every registered card.
    pub async fn sync_receipts(
        &self,
        card_ids: Vec<i64>,
    ) -> std::result::Result<SyncResult, ClientError> {
        self.post_json("receipts/sync", &SyncRequest { card_ids })
            .await
    }

    pub async fn match_receipt(
        &self,
        receipt_id: i64,
        match_data: &MatchData,
    ) -> std::result::Result<MatchResult, ClientError> {
        self.post_json(&format!("receipts/{receipt_id}/match"), match_data)
            .await
    }

    pub async fn auto_match(
        &self,
        request: &AutoMatchRequest,
    ) -> std::result::Result<AutoMatchResult, ClientError> {
        self.post_json("receipts/match/auto", request).await
    }

    pub async fn download_receipt(
        &self,
        receipt_id: i64,
    ) -> std::result::Result<Download, ClientError> {
        let path = format!("receipts/{receipt_id}/download");
        tracing::debug!("GET {path}");
        let res = self.send(self.http.get(self.url(&path))).await?;
        let bytes = res.bytes().await?;
        Ok(Download {
            file_name: receipt_file_name(receipt_id),
            bytes: bytes.to_vec(),
        })
    }

    pub async fn export_receipts(
        &self,
        request: &ExportRequest,
    ) -> std::result::Result<Vec<u8>, ClientError> {
        tracing::debug!("POST receipts/export");
        let req = self.http.post(self.url("receipts/export")).json(request);
        let res = self.send(req).await?;
        Ok(res.bytes().await?.to_vec())
    }

    pub async fn statistics(
        &self,
        search: &ReceiptSearch,
    ) -> std::result::Result<Statistics, ClientError> {
        self.get_json("receipts/statistics", Some(search)).await
    }
}

async fn error_body(res: Response) -> String {
    let text = res.text().await.unwrap_or_default();
    if let Ok(parsed) = serde_json::from_str::<ErrorResponse>(&text) {
        if let Some(message) = parsed.message.or(parsed.error) {
            return message;
        }
    }
    let trimmed = text.trim();
    if trimmed.is_empty() {
        "unknown error".to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Mutex,
        atomic::{AtomicUsize, Ordering},
    };

    use api_types::{
        export::ExportFormat,
        receipt::{MatchStatus, MatchStatusFilter, ReceiptTypeFilter},
    };
    use axum::{
        Json, Router,
        extract::{Path, Query, State},
        http::{HeaderMap, StatusCode as AxumStatus},
        routing::{get, post},
    };
    use chrono::NaiveDate;
    use serde_json::{Value, json};

    use super::*;

    struct FixedToken(Option<String>);

    impl TokenSource for FixedToken {
        fn token(&self) -> Option<String> {
            self.0.clone()
        }
    }

    #[derive(Default)]
    struct CountingRedirect(AtomicUsize);

    impl UnauthorizedHandler for CountingRedirect {
        fn redirect_to_login(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[derive(Clone, Default)]
    struct Seen {
        auth: Arc<Mutex<Vec<Option<String>>>>,
        query: Arc<Mutex<Option<std::collections::HashMap<String, String>>>>,
        body: Arc<Mutex<Option<Value>>>,
    }

    fn receipt_json(id: i64, status: &str) -> Value {
        json!({
            "receiptId": id,
            "transactionDate": "2025-03-04 12:30:00",
            "merchantName": "Coffee Lab",
            "amount": 12500,
            "cardAlias": null,
            "receiptType": "CARD_SLIP",
            "matchStatus": status,
            "isVerified": null,
            "vatAmount": null,
            "matches": null
        })
    }

    async fn list(
        State(seen): State<Seen>,
        headers: HeaderMap,
        Query(query): Query<std::collections::HashMap<String, String>>,
    ) -> Json<Value> {
        let auth = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        seen.auth.lock().unwrap().push(auth);
        *seen.query.lock().unwrap() = Some(query);
        Json(json!({
            "content": [receipt_json(1, "MATCHED"), receipt_json(2, "SOMETHING_NEW")],
            "totalElements": 42,
            "number": 0
        }))
    }

    async fn export(State(seen): State<Seen>, Json(body): Json<Value>) -> Vec<u8> {
        *seen.body.lock().unwrap() = Some(body);
        b"PK\x03\x04xlsx".to_vec()
    }

    async fn download(Path(id): Path<i64>) -> Vec<u8> {
        format!("pdf-{id}").into_bytes()
    }

    async fn broken() -> (AxumStatus, Json<Value>) {
        (
            AxumStatus::INTERNAL_SERVER_ERROR,
            Json(json!({"message": "sync provider unavailable"})),
        )
    }

    async fn expired() -> (AxumStatus, &'static str) {
        (AxumStatus::UNAUTHORIZED, "{not json")
    }

    async fn spawn_backend(seen: Seen) -> String {
        let app = Router::new()
            .route("/api/receipts", get(list))
            .route("/api/receipts/export", post(export))
            .route("/api/receipts/sync", post(broken))
            .route("/api/receipts/{id}/download", get(download))
            .route("/api/receipts/statistics", get(expired))
            .with_state(seen);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}/api")
    }

    fn client(base_url: &str, token: Option<&str>) -> (Client, Arc<CountingRedirect>) {
        let redirect = Arc::new(CountingRedirect::default());
        let client = Client::new(
            base_url,
            None,
            Arc::new(FixedToken(token.map(str::to_string))),
            redirect.clone(),
        )
        .unwrap();
        (client, redirect)
    }

    fn search() -> ReceiptSearch {
        ReceiptSearch {
            start_date: NaiveDate::from_ymd_opt(2025, 2, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
            card_id: Some(7),
            merchant_name: None,
            min_amount: None,
            max_amount: None,
            match_status: MatchStatusFilter::Unmatched,
            receipt_type: ReceiptTypeFilter::All,
        }
    }

    #[tokio::test]
    async fn list_sends_bearer_and_query() {
        let seen = Seen::default();
        let base = spawn_backend(seen.clone()).await;
        let (client, _) = client(&base, Some("tok-123"));

        let page = client
            .list_receipts(&ReceiptListQuery {
                search: search(),
                page: 1,
                size: 20,
                sort_by: None,
                sort_direction: None,
            })
            .await
            .unwrap();

        assert_eq!(page.total_elements, 42);
        assert_eq!(page.content.len(), 2);
        assert_eq!(
            page.content[1].match_status,
            MatchStatus::Other("SOMETHING_NEW".to_string())
        );
        assert!(page.content.iter().all(|row| row.matches.is_empty() && !row.is_verified));

        let auth = seen.auth.lock().unwrap().clone();
        assert_eq!(auth, vec![Some("Bearer tok-123".to_string())]);

        let query = seen.query.lock().unwrap().clone().unwrap();
        assert_eq!(query.get("startDate").map(String::as_str), Some("2025-02-01"));
        assert_eq!(query.get("cardId").map(String::as_str), Some("7"));
        assert_eq!(query.get("matchStatus").map(String::as_str), Some("UNMATCHED"));
        assert_eq!(query.get("page").map(String::as_str), Some("1"));
        assert!(!query.contains_key("merchantName"));
    }

    #[tokio::test]
    async fn missing_token_omits_header() {
        let seen = Seen::default();
        let base = spawn_backend(seen.clone()).await;
        let (client, _) = client(&base, None);

        client
            .list_receipts(&ReceiptListQuery {
                search: search(),
                page: 0,
                size: 20,
                sort_by: None,
                sort_direction: None,
            })
            .await
            .unwrap();

        assert_eq!(seen.auth.lock().unwrap().clone(), vec![None]);
    }

    #[tokio::test]
    async fn unauthorized_redirects_without_reading_body() {
        let base = spawn_backend(Seen::default()).await;
        let (client, redirect) = client(&base, Some("expired"));

        let err = client.statistics(&search()).await.unwrap_err();
        assert!(matches!(err, ClientError::Unauthorized));
        assert_eq!(redirect.0.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn server_errors_carry_status_and_message() {
        let base = spawn_backend(Seen::default()).await;
        let (client, redirect) = client(&base, Some("tok"));

        let err = client.sync_receipts(Vec::new()).await.unwrap_err();
        match err {
            ClientError::Server { status, body } => {
                assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
                assert_eq!(body, "sync provider unavailable");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(redirect.0.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn export_posts_selection_with_criteria() {
        let seen = Seen::default();
        let base = spawn_backend(seen.clone()).await;
        let (client, _) = client(&base, Some("tok"));

        let bytes = client
            .export_receipts(&ExportRequest {
                receipt_ids: Some(vec![3, 5]),
                format: ExportFormat::Excel,
                search: search(),
            })
            .await
            .unwrap();
        assert!(bytes.starts_with(b"PK"));

        let body = seen.body.lock().unwrap().clone().unwrap();
        assert_eq!(body["receiptIds"], json!([3, 5]));
        assert_eq!(body["format"], "EXCEL");
        assert_eq!(body["startDate"], "2025-02-01");
        assert_eq!(body["cardId"], 7);
    }

    #[tokio::test]
    async fn download_names_file_after_receipt() {
        let base = spawn_backend(Seen::default()).await;
        let (client, _) = client(&base, Some("tok"));

        let download = client.download_receipt(9).await.unwrap();
        assert_eq!(download.file_name, "receipt_9.pdf");
        assert_eq!(download.bytes, b"pdf-9");
    }

    #[tokio::test]
    async fn unreachable_backend_is_a_network_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let (client, redirect) = client(&format!("http://{addr}/api"), Some("tok"));

        let err = client.get_receipt(1).await.unwrap_err();
        assert!(matches!(err, ClientError::Network(_)));
        assert_eq!(redirect.0.load(Ordering::SeqCst), 0);
    }
}
