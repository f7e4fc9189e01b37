//! Per-target personalization: context enrichment, template injection, and
//! attachment generation.

use std::sync::Arc;

use chrono::{Datelike, Local};
use parking_lot::Mutex;
use tracing::warn;
use ulid::Ulid;

use crate::{
    error::{DispatchError, RenderError},
    render::DocumentRenderer,
    retry::RetryPolicy,
    template::{TagMap, TemplateCache, TemplateEngine},
    types::{Attachment, GenerationSpec, OutputFormat, Target},
};

/// Fallback display name for targets that arrive without one.
const DEFAULT_NAME: &str = "Valued Customer";

/// The fully personalized content for one target.
#[derive(Debug, Clone)]
pub struct Personalized {
    pub subject: String,
    pub text_body: String,
    pub html_body: String,
    pub attachments: Vec<Attachment>,
    pub invoice_id: String,
}

/// Formatted date tags, recomputed only when the calendar day changes.
struct DateTags {
    day: u32,
    today: String,
    tomorrow: String,
}

/// Monotonic invoice-id source.
///
/// A ULID carries a millisecond timestamp plus random bits, and the
/// generator increments within the same millisecond - collision-resistant
/// at high throughput without cryptographic cost.
struct InvoiceSequence(Mutex<ulid::Generator>);

impl InvoiceSequence {
    fn new() -> Self {
        Self(Mutex::new(ulid::Generator::new()))
    }

    fn next(&self) -> String {
        let ulid = {
            let mut generator = self.0.lock();
            // The generator only fails when the random component overflows
            // within one millisecond; a fresh ULID is as good then.
            generator.generate().unwrap_or_else(|_| Ulid::new())
        };
        format!("INV-{ulid}")
    }
}

/// Builds [`Personalized`] content for targets.
///
/// Owns the process-lifetime caches (compiled templates, formatted dates)
/// and the render backoff policy. Shared across all concurrent dispatch
/// units; each unit gets its own enriched context and never mutates it
/// afterwards.
pub struct Personalizer {
    templates: TemplateCache,
    renderer: Arc<dyn DocumentRenderer>,
    retry: RetryPolicy,
    invoices: InvoiceSequence,
    dates: Mutex<Option<DateTags>>,
}

impl Personalizer {
    #[must_use]
    pub fn new(
        engine: Arc<dyn TemplateEngine>,
        renderer: Arc<dyn DocumentRenderer>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            templates: TemplateCache::new(engine),
            renderer,
            retry,
            invoices: InvoiceSequence::new(),
            dates: Mutex::new(None),
        }
    }

    /// Compiled-template cache size, observable for stats and tests.
    #[must_use]
    pub fn compiled_templates(&self) -> usize {
        self.templates.len()
    }

    /// Produce the personalized subject, bodies, and attachments for one
    /// target.
    ///
    /// # Errors
    ///
    /// Template failures, and render failures once the backoff budget for
    /// transient ones is exhausted, propagate for the dispatch unit to
    /// classify.
    pub async fn personalize(
        &self,
        target: &Target,
        subject_template: &str,
        generation: &GenerationSpec,
    ) -> Result<Personalized, DispatchError> {
        let (tags, invoice_id) = self.enrich(target);

        let subject = self.templates.inject(subject_template, &tags)?;
        let text_body = self.templates.inject(&generation.text_template, &tags)?;
        let html_body = self.templates.inject(&generation.html_template, &tags)?;

        let mut attachments = Vec::new();
        if generation.format != OutputFormat::Html {
            let content = self.render_with_retry(&html_body, generation.format).await?;
            attachments.push(Attachment {
                filename: format!("{invoice_id}.{}", generation.format.extension()),
                content,
            });
        }
        attachments.extend(generation.attachments.iter().cloned());

        Ok(Personalized {
            subject,
            text_body,
            html_body,
            attachments,
            invoice_id,
        })
    }

    /// Target data merged with derived tags, computed once per dispatch.
    /// Custom data wins on key collisions.
    fn enrich(&self, target: &Target) -> (TagMap, String) {
        let invoice_id = target
            .invoice_id
            .clone()
            .unwrap_or_else(|| self.invoices.next());

        let (today, tomorrow) = self.date_tags();

        let mut tags = TagMap::default();
        tags.insert(
            "name".to_string(),
            target
                .name
                .clone()
                .unwrap_or_else(|| DEFAULT_NAME.to_string()),
        );
        tags.insert("email".to_string(), target.email.clone());
        tags.insert("invoice".to_string(), invoice_id.clone());
        tags.insert("today_date".to_string(), today);
        tags.insert("tomorrow_date".to_string(), tomorrow);

        for (key, value) in &target.custom {
            tags.insert(key.clone(), value.clone());
        }

        (tags, invoice_id)
    }

    /// Formatted date tags, cached until the calendar day rolls over.
    fn date_tags(&self) -> (String, String) {
        let now = Local::now();
        let day = now.day();

        let mut cached = self.dates.lock();
        if let Some(tags) = cached.as_ref()
            && tags.day == day
        {
            return (tags.today.clone(), tags.tomorrow.clone());
        }

        let today = now.format("%B %-d, %Y").to_string();
        let tomorrow = (now + chrono::Duration::days(1))
            .format("%B %-d, %Y")
            .to_string();
        *cached = Some(DateTags {
            day,
            today: today.clone(),
            tomorrow: tomorrow.clone(),
        });

        (today, tomorrow)
    }

    /// Render with bounded exponential backoff on transient failures;
    /// permanent failures propagate on the first attempt.
    async fn render_with_retry(
        &self,
        html: &str,
        format: OutputFormat,
    ) -> Result<Vec<u8>, RenderError> {
        let mut retries = 0;
        loop {
            match self.renderer.render(html, format).await {
                Ok(content) => return Ok(content),
                Err(error) if error.is_transient() && self.retry.should_retry(retries) => {
                    let delay = self.retry.delay_for(retries);
                    warn!(
                        retry = retries + 1,
                        max_retries = self.retry.max_retries,
                        delay = ?delay,
                        error = %error,
                        "Transient render failure, backing off"
                    );
                    tokio::time::sleep(delay).await;
                    retries += 1;
                }
                Err(error) => return Err(error),
            }
        }
    }
}
