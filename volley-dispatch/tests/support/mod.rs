//! Shared mock collaborators for integration tests
//!
//! Provides configurable transport, renderer, and template-engine mocks
//! that track what the engine did to them: delivery records with timing,
//! in-flight gauges, open/close counters, and compilation counts.
#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use std::{
    collections::HashSet,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::{Duration, Instant},
};

use async_trait::async_trait;
use volley_dispatch::{
    BatchDispatcher, BatchRequest, CompiledTemplate, DeliveryError, DeliveryReceipt,
    DispatchConfig, DocumentRenderer, GenerationSpec, OutboundMessage, OutputFormat, RenderError,
    RetryPolicy, SenderCredential, TagMap, Target, TemplateEngine, TemplateError, Transport,
    TransportFactory,
};

/// One successful delivery as the mock transport saw it.
#[derive(Debug, Clone)]
pub struct DeliveredRecord {
    pub to: String,
    pub from_address: String,
    pub from_name: String,
    pub subject: String,
    pub attachment_names: Vec<String>,
    pub started: Instant,
    pub finished: Instant,
}

/// Observations shared by every handle a factory opens.
#[derive(Default)]
pub struct TransportLog {
    delivered: Mutex<Vec<DeliveredRecord>>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
    closes: AtomicUsize,
}

impl TransportLog {
    pub fn records(&self) -> Vec<DeliveredRecord> {
        self.delivered.lock().unwrap().clone()
    }

    pub fn record_for(&self, email: &str) -> Option<DeliveredRecord> {
        self.records().into_iter().find(|record| record.to == email)
    }

    pub fn delivered_count(&self) -> usize {
        self.delivered.lock().unwrap().len()
    }

    /// High-water mark of concurrently in-flight transport calls.
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    fn enter(&self) {
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(current, Ordering::SeqCst);
    }

    fn exit(&self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

struct MockTransport {
    account: String,
    delay: Duration,
    fail_recipients: HashSet<String>,
    invalid_accounts: HashSet<String>,
    log: Arc<TransportLog>,
}

#[async_trait]
impl Transport for MockTransport {
    async fn deliver(&self, message: &OutboundMessage) -> Result<DeliveryReceipt, DeliveryError> {
        let started = Instant::now();
        self.log.enter();
        tokio::time::sleep(self.delay).await;
        self.log.exit();

        if self.fail_recipients.contains(&message.to) {
            return Err(DeliveryError::Rejected(format!(
                "550 mock rejected {}",
                message.to
            )));
        }

        self.log.delivered.lock().unwrap().push(DeliveredRecord {
            to: message.to.clone(),
            from_address: message.from_address.clone(),
            from_name: message.from_name.clone(),
            subject: message.subject.clone(),
            attachment_names: message
                .attachments
                .iter()
                .map(|attachment| attachment.filename.clone())
                .collect(),
            started,
            finished: Instant::now(),
        });

        Ok(DeliveryReceipt {
            message_id: format!("<{}@mock>", message.to),
        })
    }

    async fn verify(&self) -> Result<(), DeliveryError> {
        self.log.enter();
        tokio::time::sleep(self.delay).await;
        self.log.exit();

        if self.invalid_accounts.contains(&self.account) {
            return Err(DeliveryError::AuthenticationFailed(format!(
                "535 bad credentials for {}",
                self.account
            )));
        }
        Ok(())
    }

    async fn close(&self) {
        self.log.closes.fetch_add(1, Ordering::SeqCst);
    }
}

/// Factory handing out [`MockTransport`] handles that all report into one
/// shared [`TransportLog`].
pub struct MockTransportFactory {
    pub log: Arc<TransportLog>,
    opened: AtomicUsize,
    delay: Duration,
    fail_recipients: HashSet<String>,
    invalid_accounts: HashSet<String>,
}

impl Default for MockTransportFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTransportFactory {
    pub fn new() -> Self {
        Self {
            log: Arc::new(TransportLog::default()),
            opened: AtomicUsize::new(0),
            delay: Duration::ZERO,
            fail_recipients: HashSet::new(),
            invalid_accounts: HashSet::new(),
        }
    }

    /// Every transport call (deliver or verify) takes this long.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Deliveries to this recipient fail with a 550.
    #[must_use]
    pub fn failing_recipient(mut self, email: &str) -> Self {
        self.fail_recipients.insert(email.to_owned());
        self
    }

    /// Verification for this account fails with a 535.
    #[must_use]
    pub fn invalid_account(mut self, account: &str) -> Self {
        self.invalid_accounts.insert(account.to_owned());
        self
    }

    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }
}

impl TransportFactory for MockTransportFactory {
    fn open(&self, credential: &SenderCredential) -> Result<Arc<dyn Transport>, DeliveryError> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(MockTransport {
            account: credential.login_user().to_owned(),
            delay: self.delay,
            fail_recipients: self.fail_recipients.clone(),
            invalid_accounts: self.invalid_accounts.clone(),
            log: Arc::clone(&self.log),
        }))
    }
}

/// `{{tag}}` substitution engine that counts compilations.
#[derive(Default)]
pub struct BraceEngine {
    compiles: AtomicUsize,
}

impl BraceEngine {
    pub fn compiles(&self) -> usize {
        self.compiles.load(Ordering::SeqCst)
    }
}

struct BraceTemplate {
    source: String,
}

impl TemplateEngine for BraceEngine {
    fn compile(&self, source: &str) -> Result<Arc<dyn CompiledTemplate>, TemplateError> {
        self.compiles.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(BraceTemplate {
            source: source.to_owned(),
        }))
    }
}

impl CompiledTemplate for BraceTemplate {
    fn inject(&self, tags: &TagMap) -> Result<String, TemplateError> {
        let mut rendered = self.source.clone();
        for (key, value) in tags {
            rendered = rendered.replace(&format!("{{{{{key}}}}}"), value);
        }
        Ok(rendered)
    }
}

/// Renderer that always succeeds with format-stamped bytes.
pub struct StaticRenderer;

#[async_trait]
impl DocumentRenderer for StaticRenderer {
    async fn render(&self, _html: &str, format: OutputFormat) -> Result<Vec<u8>, RenderError> {
        Ok(format.extension().as_bytes().to_vec())
    }
}

pub fn credentials(count: usize) -> Vec<SenderCredential> {
    (0..count)
        .map(|index| SenderCredential {
            email: format!("sender{index}@example.com"),
            username: None,
            password: "secret".to_string(),
            host: "smtp.example.com".to_string(),
            port: 587,
        })
        .collect()
}

pub fn targets(count: usize) -> Vec<Target> {
    (0..count)
        .map(|index| Target {
            email: format!("user{index}@example.com"),
            name: Some(format!("User {index}")),
            invoice_id: None,
            custom: ahash::AHashMap::default(),
        })
        .collect()
}

/// A plain-HTML request; subjects and names are literal strings so rotation
/// can be asserted directly from delivery records.
pub fn request(
    target_count: usize,
    credential_count: usize,
    subjects: &[&str],
    sender_names: &[&str],
) -> BatchRequest {
    BatchRequest {
        targets: targets(target_count),
        credentials: credentials(credential_count),
        subjects: subjects.iter().map(|s| (*s).to_owned()).collect(),
        sender_names: sender_names.iter().map(|s| (*s).to_owned()).collect(),
        generation: GenerationSpec {
            html_template: "<p>Hello {{name}}, invoice {{invoice}}</p>".to_string(),
            text_template: "Hello {{name}}".to_string(),
            format: OutputFormat::Html,
            attachments: Vec::new(),
        },
    }
}

/// A config with test-friendly render backoff (no jitter, 1 ms base).
pub fn config(
    chunk_size: usize,
    max_concurrency: usize,
    inter_chunk_delay_ms: u64,
    report_every: usize,
) -> DispatchConfig {
    DispatchConfig {
        max_concurrency,
        chunk_size,
        inter_chunk_delay_ms,
        report_every,
        verify_concurrency: 5,
        render_retry: RetryPolicy {
            max_retries: 3,
            initial_delay_ms: 1,
            jitter_factor: 0.0,
        },
    }
}

/// A fully wired dispatcher over the mocks, keeping the concrete handles
/// around for observation.
pub struct Harness {
    pub dispatcher: BatchDispatcher,
    pub factory: Arc<MockTransportFactory>,
    pub engine: Arc<BraceEngine>,
}

pub fn harness(config: DispatchConfig, factory: MockTransportFactory) -> Harness {
    volley_common::logging::init();

    let factory = Arc::new(factory);
    let engine = Arc::new(BraceEngine::default());

    let factory_seam: Arc<dyn TransportFactory> = factory.clone();
    let engine_seam: Arc<dyn TemplateEngine> = engine.clone();
    let dispatcher = BatchDispatcher::new(config, factory_seam, engine_seam, Arc::new(StaticRenderer));

    Harness {
        dispatcher,
        factory,
        engine,
    }
}

/// The index a mock target's address encodes.
pub fn target_index(email: &str) -> usize {
    email
        .strip_prefix("user")
        .and_then(|rest| rest.strip_suffix("@example.com"))
        .and_then(|digits| digits.parse().ok())
        .expect("not a mock target address")
}
