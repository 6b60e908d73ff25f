pub mod attributes;
pub mod lines;
pub mod template;
pub mod variants;

use crate::catalog::CatalogClient;
use crate::config::{SyncConfig, VariantMissPolicy};
use crate::images::ImageFetcher;
use crate::models::{RunReport, RunStatus, StageReport};
use crate::odoo::OdooClient;
use crate::pubsub::Publisher;
use attributes::AttributeResolver;
use serde_json::{Value, json};
use std::{future::Future, sync::Arc, time::Instant};
use thiserror::Error;
use tracing::info;

/// One offset, end to end: fetch, create the template, update its variants
/// and schedule the next offset.
#[derive(Clone)]
pub struct Reconciler {
    settings: ReconcileSettings,
    catalog: Arc<CatalogClient>,
    odoo: Arc<OdooClient>,
    images: Arc<ImageFetcher>,
    publisher: Arc<Publisher>,
}

#[derive(Debug, Clone, Copy)]
pub struct ReconcileSettings {
    pub default_category_id: i64,
    pub variant_miss: VariantMissPolicy,
}

impl Reconciler {
    pub fn new(config: &SyncConfig) -> Self {
        Self {
            settings: ReconcileSettings {
                default_category_id: config.odoo.default_category_id,
                variant_miss: config.variant_miss,
            },
            catalog: Arc::new(CatalogClient::new(&config.catalog)),
            odoo: Arc::new(OdooClient::new(&config.odoo)),
            images: Arc::new(ImageFetcher::new(&config.images)),
            publisher: Arc::new(Publisher::new(&config.pubsub)),
        }
    }

    /// Entry point for trigger messages: reconciles `offset` and, when a
    /// product was found, publishes `offset + 1`.
    pub async fn handle_trigger(&self, offset: u64) -> Result<RunReport, ReconcileError> {
        self.run(offset, true).await
    }

    pub async fn run(&self, offset: u64, publish: bool) -> Result<RunReport, ReconcileError> {
        let result = self.run_inner(offset, publish).await;
        let outcome = match &result {
            Ok(report) if report.status == RunStatus::Reconciled => "reconciled",
            Ok(_) => "end_of_catalog",
            Err(_) => "failed",
        };
        crate::metrics::run_finished(outcome);
        result
    }

    async fn run_inner(&self, offset: u64, publish: bool) -> Result<RunReport, ReconcileError> {
        let mut report = self.reconcile_offset(offset).await?;
        if !publish || report.status != RunStatus::Reconciled {
            return Ok(report);
        }

        let publisher = &self.publisher;
        capture_stage("publish_continuation", &mut report.stages, async {
            let message_id = publisher
                .publish_next(offset)
                .await
                .map_err(|err| ReconcileError::internal("publish_continuation", err.to_string()))?;
            Ok(StageOutcome::new(
                (),
                json!({
                    "topic": publisher.topic_path(),
                    "next_offset": offset + 1,
                    "message_id": message_id,
                }),
            ))
        })
        .await?;
        report.continuation_published = true;
        Ok(report)
    }

    /// Everything except the continuation. An empty catalog page ends the run
    /// before any ERP call is made.
    pub async fn reconcile_offset(&self, offset: u64) -> Result<RunReport, ReconcileError> {
        if offset.checked_add(1).is_none() {
            return Err(ReconcileError::invalid_input(
                "fetch_product",
                format!("offset {offset} leaves no room for a continuation"),
            ));
        }
        let mut stages = Vec::new();

        let catalog = &self.catalog;
        let product = capture_stage("fetch_product", &mut stages, async {
            let product = catalog
                .fetch_product(offset)
                .await
                .map_err(|err| ReconcileError::internal("fetch_product", err.to_string()))?;
            let output = match &product {
                Some(product) => json!({
                    "offset": offset,
                    "found": true,
                    "name": product.name,
                    "variants": product.variants.len(),
                    "images": product.images.len(),
                }),
                None => json!({"offset": offset, "found": false}),
            };
            Ok(StageOutcome::new(product, output))
        })
        .await?;

        let Some(product) = product else {
            info!(target = "sync.reconcile", offset, "end_of_catalog");
            return Ok(RunReport::end_of_catalog(offset, stages));
        };

        let session = self
            .odoo
            .login()
            .await
            .map_err(|err| ReconcileError::internal("create_template", err.to_string()))?;
        let mut resolver = AttributeResolver::new(session);
        let images = self.images.as_ref();
        let settings = self.settings;

        let receipt = capture_stage("create_template", &mut stages, async {
            let receipt = template::create_template(
                session,
                &mut resolver,
                images,
                &product,
                settings.default_category_id,
            )
            .await
            .map_err(|err| ReconcileError::internal("create_template", err.to_string()))?;
            let output = json!({
                "template_id": receipt.template_id,
                "name": product.name,
                "receipt": receipt,
            });
            Ok(StageOutcome::new(receipt, output))
        })
        .await?;

        capture_stage("update_variants", &mut stages, async {
            let summary = variants::update_variants(
                session,
                &mut resolver,
                images,
                receipt.template_id,
                &product,
                settings.variant_miss,
            )
            .await;
            let output = serde_json::to_value(&summary).unwrap_or(Value::Null);
            Ok(StageOutcome::new((), output))
        })
        .await?;

        info!(
            target = "sync.reconcile",
            offset,
            template_id = receipt.template_id,
            uid = session.uid(),
            created_attributes = resolver.created_attributes(),
            created_values = resolver.created_values(),
            "product_reconciled"
        );
        Ok(RunReport::reconciled(offset, receipt.template_id, stages))
    }
}

async fn capture_stage<T, Fut>(
    name: &'static str,
    stages: &mut Vec<StageReport>,
    fut: Fut,
) -> Result<T, ReconcileError>
where
    Fut: Future<Output = Result<StageOutcome<T>, ReconcileError>>,
{
    let started = Instant::now();
    let outcome = fut.await?;
    let elapsed_ms = started.elapsed().as_millis();
    crate::metrics::stage_elapsed(name, elapsed_ms);
    stages.push(StageReport::new(name, elapsed_ms, outcome.output));
    Ok(outcome.value)
}

#[derive(Debug, Error)]
#[error("stage `{stage}` failed: {message}")]
pub struct ReconcileError {
    stage: &'static str,
    message: String,
    kind: ReconcileErrorKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileErrorKind {
    InvalidInput,
    Internal,
}

impl ReconcileError {
    pub fn invalid_input(stage: &'static str, message: impl Into<String>) -> Self {
        Self {
            stage,
            message: message.into(),
            kind: ReconcileErrorKind::InvalidInput,
        }
    }

    pub fn internal(stage: &'static str, message: impl Into<String>) -> Self {
        Self {
            stage,
            message: message.into(),
            kind: ReconcileErrorKind::Internal,
        }
    }

    pub fn stage(&self) -> &'static str {
        self.stage
    }

    pub fn kind(&self) -> ReconcileErrorKind {
        self.kind
    }

    pub fn detail(&self) -> &str {
        &self.message
    }
}

#[derive(Debug)]
pub struct StageOutcome<T> {
    pub value: T,
    pub output: Value,
}

impl<T> StageOutcome<T> {
    fn new(value: T, output: Value) -> Self {
        Self { value, output }
    }
}
