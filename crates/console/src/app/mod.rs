pub mod filter;
pub mod modal;
pub mod receipts;
pub mod toast;

use std::{future::Future, sync::Arc, time::Duration, time::Instant};

use api_types::{
    export::ExportFormat,
    matching::{AutoMatchResult, MatchResult},
    receipt::{Receipt, ReceiptPage, SortField},
    stats::Statistics,
    sync::SyncResult,
};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use crossterm::event::{self, Event, KeyEvent};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::{
    client::{Client, ClientError, Download},
    config::AppConfig,
    display,
    error::{AppError, Result},
    query::{ReceiptSearchCriteria, today_in},
    save::{DirectorySink, FileSink, export_file_name},
    session::Session,
    ui::{
        self,
        keymap::{AppAction, map_key},
    },
};

use self::{
    filter::FilterForm,
    modal::{DetailView, ExportPicker, MatchForm, Modal},
    receipts::{FetchOutcome, ListRequest, ReceiptsState},
    toast::{ToastState, error_detail, failure_toast},
};

const PAGE_SIZES: [u32; 4] = [10, 20, 50, 100];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Login,
    Receipts,
    Statistics,
}

#[derive(Debug, Default)]
pub struct LoginState {
    pub token: String,
    pub message: Option<String>,
}

#[derive(Debug, Default)]
pub struct StatisticsState {
    pub data: Option<Statistics>,
    pub loading: bool,
    pub error: Option<String>,
}

#[derive(Debug)]
pub struct AppState {
    pub screen: Screen,
    pub login: LoginState,
    pub receipts: ReceiptsState,
    pub modal: Option<Modal>,
    pub statistics: StatisticsState,
    pub toast: Option<ToastState>,
    pub base_url: String,
    pub last_refresh: Option<DateTime<Tz>>,
}

impl AppState {
    /// Whether printable keys go into a text field.
    pub fn accepts_text(&self) -> bool {
        match self.screen {
            Screen::Login => true,
            Screen::Statistics => false,
            Screen::Receipts => matches!(self.modal, Some(Modal::Match(_) | Modal::Filter(_))),
        }
    }
}

/// Completion of a request task, delivered to the event loop.
#[derive(Debug)]
pub enum AppEvent {
    ReceiptsLoaded {
        seq: u64,
        result: std::result::Result<ReceiptPage, ClientError>,
    },
    SyncFinished(std::result::Result<SyncResult, ClientError>),
    MatchFinished {
        receipt_id: i64,
        result: std::result::Result<MatchResult, ClientError>,
    },
    AutoMatchFinished(std::result::Result<AutoMatchResult, ClientError>),
    ExportFinished {
        format: ExportFormat,
        result: std::result::Result<Vec<u8>, ClientError>,
    },
    DownloadFinished(std::result::Result<Download, ClientError>),
    DetailLoaded {
        receipt_id: i64,
        result: std::result::Result<Receipt, ClientError>,
    },
    StatisticsLoaded(std::result::Result<Statistics, ClientError>),
}

pub struct App {
    client: Client,
    session: Arc<Session>,
    sink: Box<dyn FileSink>,
    tz: Tz,
    events: UnboundedSender<AppEvent>,
    inbox: UnboundedReceiver<AppEvent>,
    pub state: AppState,
    should_quit: bool,
}

impl App {
    pub fn new(config: AppConfig) -> Result<Self> {
        let tz = config.tz()?;
        let session = Arc::new(Session::new(config.token.clone()));
        let client = Client::new(
            &config.base_url,
            config.request_timeout_secs.map(Duration::from_secs),
            session.clone(),
            session.clone(),
        )?;
        let sink = DirectorySink::new(config.export_dir.clone());
        tracing::info!("downloads and exports go to {}", sink.dir().display());
        Ok(Self::with_parts(client, session, Box::new(sink), tz, &config))
    }

    fn with_parts(
        client: Client,
        session: Arc<Session>,
        sink: Box<dyn FileSink>,
        tz: Tz,
        config: &AppConfig,
    ) -> Self {
        let (events, inbox) = mpsc::unbounded_channel();
        let criteria = ReceiptSearchCriteria::defaults_for(today_in(tz));
        let screen = if session.has_token() {
            Screen::Receipts
        } else {
            Screen::Login
        };
        let state = AppState {
            screen,
            login: LoginState::default(),
            receipts: ReceiptsState::new(criteria, config.page_size),
            modal: None,
            statistics: StatisticsState::default(),
            toast: None,
            base_url: config.base_url.clone(),
            last_refresh: None,
        };

        Self {
            client,
            session,
            sink,
            tz,
            events,
            inbox,
            state,
            should_quit: false,
        }
    }

    pub async fn run(&mut self) -> Result<()> {
        if self.state.screen == Screen::Receipts {
            self.refresh();
        }
        let mut terminal = ui::setup_terminal()?;
        let result = self.event_loop(&mut terminal).await;
        ui::restore_terminal(&mut terminal)?;
        result
    }

    async fn event_loop(&mut self, terminal: &mut ui::Terminal) -> Result<()> {
        let tick_rate = Duration::from_millis(200);

        while !self.should_quit {
            self.drain_events();
            self.check_session();
            self.expire_toast(Instant::now());

            terminal
                .draw(|frame| ui::render(frame, &self.state))
                .map_err(|err| AppError::Terminal(err.to_string()))?;

            if event::poll(tick_rate)? {
                match event::read()? {
                    Event::Key(key) => self.handle_key(key),
                    Event::Resize(_, _) => {}
                    _ => {}
                }
            }
            tokio::task::yield_now().await;
        }

        Ok(())
    }

    fn drain_events(&mut self) {
        while let Ok(event) = self.inbox.try_recv() {
            self.handle_event(event);
        }
    }

    fn check_session(&mut self) {
        if !self.session.take_login_redirect() {
            return;
        }
        self.session.sign_out();
        self.state.screen = Screen::Login;
        self.state.modal = None;
        self.state.login.token.clear();
        self.state.login.message = Some("세션이 만료되었습니다. 토큰을 다시 입력하세요.".to_string());
    }

    fn expire_toast(&mut self, now: Instant) {
        if self.state.toast.as_ref().is_some_and(|toast| toast.is_expired(now)) {
            self.state.toast = None;
        }
    }

    fn today(&self) -> chrono::NaiveDate {
        today_in(self.tz)
    }

    /// Runs a request on the runtime and posts its result to the loop.
    fn spawn<F, Fut>(&self, job: F)
    where
        F: FnOnce(Client) -> Fut,
        Fut: Future<Output = AppEvent> + Send + 'static,
    {
        let task = job(self.client.clone());
        let events = self.events.clone();
        tokio::spawn(async move {
            let event = task.await;
            if events.send(event).is_err() {
                tracing::debug!("event loop is gone, dropping response");
            }
        });
    }

    fn fetch(&self, request: ListRequest) {
        let ListRequest { seq, query } = request;
        tracing::debug!("list request #{seq} page {}", query.page);
        self.spawn(move |client| async move {
            let result = client.list_receipts(&query).await;
            AppEvent::ReceiptsLoaded { seq, result }
        });
    }

    fn refresh(&mut self) {
        let request = self.state.receipts.begin_fetch();
        self.fetch(request);
    }

    fn handle_key(&mut self, key: KeyEvent) {
        let action = map_key(key, self.state.accepts_text());
        if action == AppAction::Quit {
            self.should_quit = true;
            return;
        }

        match self.state.screen {
            Screen::Login => self.handle_login_key(action),
            Screen::Statistics => self.handle_statistics_key(action),
            Screen::Receipts => {
                if self.state.modal.is_some() {
                    self.handle_modal_key(action);
                } else {
                    self.handle_receipts_key(action);
                }
            }
        }
    }

    fn handle_login_key(&mut self, action: AppAction) {
        match action {
            AppAction::Input(ch) => self.state.login.token.push(ch),
            AppAction::Backspace => {
                self.state.login.token.pop();
            }
            AppAction::Cancel => self.state.login.token.clear(),
            AppAction::Submit => self.attempt_login(),
            _ => {}
        }
    }

    fn attempt_login(&mut self) {
        let token = self.state.login.token.trim().to_string();
        if token.is_empty() {
            self.state.login.message = Some("토큰을 입력하세요.".to_string());
            return;
        }
        self.session.sign_in(token);
        self.state.login = LoginState::default();
        self.state.screen = Screen::Receipts;
        tracing::info!("session token set, loading receipts");
        self.refresh();
    }

    fn handle_statistics_key(&mut self, action: AppAction) {
        match action {
            AppAction::Cancel | AppAction::Input('t' | 'b') => {
                self.state.screen = Screen::Receipts;
            }
            AppAction::Input('r') => self.load_statistics(),
            _ => {}
        }
    }

    fn load_statistics(&mut self) {
        self.state.statistics.loading = true;
        let search = self.state.receipts.criteria.to_search();
        self.spawn(move |client| async move {
            AppEvent::StatisticsLoaded(client.statistics(&search).await)
        });
    }

    fn handle_receipts_key(&mut self, action: AppAction) {
        match action {
            AppAction::Up | AppAction::Input('k') => self.state.receipts.select_prev(),
            AppAction::Down | AppAction::Input('j') => self.state.receipts.select_next(),
            AppAction::Right | AppAction::Input('n') => {
                if let Some(request) = self.state.receipts.next_page() {
                    self.fetch(request);
                }
            }
            AppAction::Left | AppAction::Input('p') => {
                if let Some(request) = self.state.receipts.prev_page() {
                    self.fetch(request);
                }
            }
            AppAction::Submit => self.open_detail(),
            AppAction::Input(' ') => self.state.receipts.toggle_current(),
            AppAction::Input('a') => self.state.receipts.toggle_page(),
            AppAction::Input('c') => self.state.receipts.clear_selection(),
            AppAction::Input('r') => self.refresh(),
            AppAction::Input('z') => self.cycle_page_size(),
            AppAction::Input('1') => self.sort_by(SortField::TransactionDate),
            AppAction::Input('2') => self.sort_by(SortField::Amount),
            AppAction::Input('3') => self.sort_by(SortField::MerchantName),
            AppAction::Input('/') => {
                let form = FilterForm::from_criteria(&self.state.receipts.criteria);
                self.state.modal = Some(Modal::Filter(form));
            }
            AppAction::Input('s') => self.start_sync(),
            AppAction::Input('x') => {
                self.state.modal = Some(Modal::Export(ExportPicker::default()));
            }
            AppAction::Input('m') => self.open_match(),
            AppAction::Input('d') => {
                if let Some(receipt_id) = self.state.receipts.current().map(|r| r.receipt_id) {
                    self.start_download(receipt_id);
                }
            }
            AppAction::Input('A') => self.start_auto_match(),
            AppAction::Input('t') => {
                self.state.screen = Screen::Statistics;
                self.load_statistics();
            }
            _ => {}
        }
    }

    fn cycle_page_size(&mut self) {
        let current = self.state.receipts.page.size;
        let next = PAGE_SIZES
            .iter()
            .copied()
            .find(|size| *size > current)
            .unwrap_or(PAGE_SIZES[0]);
        if let Some(request) = self.state.receipts.set_page_size(next) {
            self.fetch(request);
        }
    }

    fn sort_by(&mut self, field: SortField) {
        let request = self.state.receipts.cycle_sort(field);
        self.fetch(request);
    }

    fn open_detail(&mut self) {
        if let Some(receipt) = self.state.receipts.current() {
            self.state.modal = Some(Modal::Detail(DetailView::new(receipt.clone())));
        }
    }

    fn open_match(&mut self) {
        let Some(receipt) = self.state.receipts.current() else {
            return;
        };
        match MatchForm::open(receipt) {
            Some(form) => self.state.modal = Some(Modal::Match(form)),
            None => self.state.toast = Some(ToastState::info("이미 매칭된 영수증입니다.")),
        }
    }

    fn start_sync(&mut self) {
        if !self.state.receipts.begin_sync() {
            self.state.toast = Some(ToastState::info("동기화가 이미 진행 중입니다."));
            return;
        }
        let card_ids: Vec<i64> = self.state.receipts.criteria.card_id.into_iter().collect();
        tracing::info!("syncing receipts for cards {card_ids:?}");
        self.spawn(move |client| async move {
            AppEvent::SyncFinished(client.sync_receipts(card_ids).await)
        });
    }

    fn start_export(&mut self, format: ExportFormat) {
        if self.state.receipts.exporting {
            return;
        }
        self.state.receipts.exporting = true;
        let request = self.state.receipts.export_request(format);
        tracing::info!(
            "exporting {} as {format:?}",
            match &request.receipt_ids {
                Some(ids) => format!("{} selected receipts", ids.len()),
                None => "receipts matching the criteria".to_string(),
            }
        );
        self.spawn(move |client| async move {
            let result = client.export_receipts(&request).await;
            AppEvent::ExportFinished { format, result }
        });
    }

    fn start_download(&mut self, receipt_id: i64) {
        self.spawn(move |client| async move {
            AppEvent::DownloadFinished(client.download_receipt(receipt_id).await)
        });
    }

    fn start_auto_match(&mut self) {
        if self.state.receipts.auto_matching {
            return;
        }
        self.state.receipts.auto_matching = true;
        let request = self.state.receipts.auto_match_request();
        self.spawn(move |client| async move {
            AppEvent::AutoMatchFinished(client.auto_match(&request).await)
        });
    }

    fn handle_modal_key(&mut self, action: AppAction) {
        let Some(modal) = self.state.modal.as_mut() else {
            return;
        };
        match modal {
            Modal::Detail(view) => match action {
                AppAction::Cancel | AppAction::Submit => self.state.modal = None,
                AppAction::Input('r') => {
                    view.reloading = true;
                    let receipt_id = view.receipt.receipt_id;
                    self.spawn(move |client| async move {
                        let result = client.get_receipt(receipt_id).await;
                        AppEvent::DetailLoaded { receipt_id, result }
                    });
                }
                AppAction::Input('d') => {
                    let receipt_id = view.receipt.receipt_id;
                    self.start_download(receipt_id);
                }
                AppAction::Input('m') => match MatchForm::open(&view.receipt) {
                    Some(form) => self.state.modal = Some(Modal::Match(form)),
                    None => {
                        self.state.toast = Some(ToastState::info("이미 매칭된 영수증입니다."));
                    }
                },
                _ => {}
            },
            Modal::Match(form) => match action {
                AppAction::Cancel => self.state.modal = None,
                AppAction::NextField | AppAction::Down => form.next_field(),
                AppAction::PrevField | AppAction::Up => form.prev_field(),
                AppAction::Input(ch) => form.active_input_mut().push(ch),
                AppAction::Backspace => {
                    form.active_input_mut().pop();
                }
                AppAction::Submit => {
                    if form.on_extra_line() && !form.extra.trim().is_empty() {
                        form.commit_extra();
                        return;
                    }
                    let receipt_id = form.receipt_id;
                    if let Some(data) = form.begin_submit() {
                        tracing::info!("matching receipt {receipt_id}");
                        self.spawn(move |client| async move {
                            let result = client.match_receipt(receipt_id, &data).await;
                            AppEvent::MatchFinished { receipt_id, result }
                        });
                    }
                }
                _ => {}
            },
            Modal::Export(picker) => match action {
                AppAction::Cancel => self.state.modal = None,
                AppAction::Up | AppAction::Left => picker.prev(),
                AppAction::Down | AppAction::Right | AppAction::NextField => picker.next(),
                AppAction::Submit => {
                    let format = picker.format();
                    self.state.modal = None;
                    self.start_export(format);
                }
                _ => {}
            },
            Modal::Filter(form) => match action {
                AppAction::Cancel => self.state.modal = None,
                AppAction::NextField | AppAction::Down => form.next_field(),
                AppAction::PrevField | AppAction::Up => form.prev_field(),
                AppAction::Left => form.cycle_choice(false),
                AppAction::Right => form.cycle_choice(true),
                AppAction::Input(' ') if form.focused().is_choice() => form.cycle_choice(true),
                AppAction::Input(ch) => form.push_char(ch),
                AppAction::Backspace => form.backspace(),
                AppAction::Submit => {
                    if let Ok(criteria) = form.parse() {
                        self.state.modal = None;
                        let request = self.state.receipts.set_criteria(criteria);
                        self.fetch(request);
                    }
                }
                _ => {}
            },
        }
    }

    fn handle_event(&mut self, event: AppEvent) {
        match event {
            AppEvent::ReceiptsLoaded { seq, result } => {
                let toast = result
                    .as_ref()
                    .err()
                    .and_then(|err| failure_toast("영수증 목록을 불러오지 못했습니다", err));
                match self.state.receipts.apply_fetch(seq, result) {
                    FetchOutcome::Applied => {
                        self.state.last_refresh = Some(Utc::now().with_timezone(&self.tz));
                    }
                    FetchOutcome::Reissued(request) => self.fetch(request),
                    FetchOutcome::Failed => {
                        if toast.is_some() {
                            self.state.toast = toast;
                        }
                    }
                    FetchOutcome::Stale => {}
                }
            }
            AppEvent::SyncFinished(result) => match result {
                Ok(summary) => {
                    tracing::info!("sync finished");
                    let digest = display::summary_text(&summary, 3);
                    let message = if digest.is_empty() {
                        "동기화가 완료되었습니다.".to_string()
                    } else {
                        format!("동기화가 완료되었습니다. ({digest})")
                    };
                    self.state.toast = Some(ToastState::success(message));
                    if let Some(request) = self.state.receipts.finish_sync(true) {
                        self.fetch(request);
                    }
                }
                Err(err) => {
                    self.state.receipts.finish_sync(false);
                    self.set_failure("동기화에 실패했습니다", &err);
                }
            },
            AppEvent::MatchFinished { receipt_id, result } => match result {
                Ok(_) => {
                    tracing::info!("receipt {receipt_id} matched");
                    if matches!(&self.state.modal, Some(Modal::Match(form)) if form.receipt_id == receipt_id)
                    {
                        self.state.modal = None;
                    }
                    self.state.toast = Some(ToastState::success("매칭이 완료되었습니다."));
                    let request = self.state.receipts.on_match_succeeded();
                    self.fetch(request);
                }
                Err(err) => match self.state.modal.as_mut() {
                    Some(Modal::Match(form)) if form.receipt_id == receipt_id => {
                        form.fail(error_detail(&err));
                    }
                    _ => self.set_failure("매칭에 실패했습니다", &err),
                },
            },
            AppEvent::AutoMatchFinished(result) => {
                self.state.receipts.auto_matching = false;
                match result {
                    Ok(report) => {
                        let stats = report.statistics.clone().unwrap_or_default();
                        self.state.toast = Some(ToastState::success(format!(
                            "자동 매칭 완료: {}/{}건 ({:.1}%)",
                            stats.successful_matches.unwrap_or(0),
                            stats.eligible_receipts.or(stats.total_receipts).unwrap_or(0),
                            report.success_rate(),
                        )));
                        self.refresh();
                    }
                    Err(err) => self.set_failure("자동 매칭에 실패했습니다", &err),
                }
            }
            AppEvent::ExportFinished { format, result } => {
                self.state.receipts.exporting = false;
                match result {
                    Ok(bytes) => {
                        let file_name = export_file_name(self.today(), format);
                        self.save_file(&file_name, &bytes, "내보내기가 완료되었습니다");
                    }
                    Err(err) => self.set_failure("내보내기에 실패했습니다", &err),
                }
            }
            AppEvent::DownloadFinished(result) => match result {
                Ok(download) => {
                    self.save_file(&download.file_name, &download.bytes, "다운로드가 완료되었습니다");
                }
                Err(err) => self.set_failure("다운로드에 실패했습니다", &err),
            },
            AppEvent::DetailLoaded { receipt_id, result } => {
                let Some(Modal::Detail(view)) = self.state.modal.as_mut() else {
                    return;
                };
                if view.receipt.receipt_id != receipt_id {
                    return;
                }
                match result {
                    Ok(receipt) => view.apply_detail(receipt),
                    Err(err) => {
                        view.reloading = false;
                        if !matches!(err, ClientError::Unauthorized) {
                            view.error = Some(error_detail(&err));
                        }
                    }
                }
            }
            AppEvent::StatisticsLoaded(result) => {
                self.state.statistics.loading = false;
                match result {
                    Ok(data) => {
                        self.state.statistics.data = Some(data);
                        self.state.statistics.error = None;
                    }
                    Err(ClientError::Unauthorized) => {}
                    Err(err) => self.state.statistics.error = Some(error_detail(&err)),
                }
            }
        }
    }

    fn save_file(&mut self, file_name: &str, bytes: &[u8], done: &str) {
        match self.sink.persist(file_name, bytes) {
            Ok(path) => {
                tracing::info!("saved {} bytes to {}", bytes.len(), path.display());
                self.state.toast = Some(ToastState::success(format!("{done}: {}", path.display())));
            }
            Err(err) => {
                tracing::warn!("failed to save {file_name}: {err}");
                self.state.toast = Some(ToastState::error(format!("파일을 저장하지 못했습니다 ({err})")));
            }
        }
    }

    fn set_failure(&mut self, action: &str, err: &ClientError) {
        if let Some(toast) = failure_toast(action, err) {
            self.state.toast = Some(toast);
        }
    }
}
