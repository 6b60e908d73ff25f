use crate::catalog::{AttributePair, CatalogProduct, CatalogVariant};
use crate::config::VariantMissPolicy;
use crate::images::ImageFetcher;
use crate::odoo::models::{TEMPLATE_ATTRIBUTE_VALUE, VARIANT, VariantUpdate};
use crate::odoo::{Domain, OdooError, OdooSession};
use crate::reconcile::attributes::AttributeResolver;
use serde::Serialize;
use tracing::{info, warn};

#[derive(Debug, Clone, Default, Serialize)]
pub struct VariantSummary {
    pub policy: &'static str,
    /// Source variants inspected, matched or not.
    pub processed: usize,
    pub not_processed: usize,
    pub updated_ids: Vec<i64>,
    pub unmatched: Vec<Vec<AttributePair>>,
    /// Source variants that matched more than one ERP variant.
    pub ambiguous: usize,
    pub images_missing: usize,
    pub halted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Copies `default_code` and image of each catalog variant onto the matching
/// ERP variants of `template_id`.
///
/// Never fails: an ERP error stops the loop and is recorded in the summary,
/// leaving the template in place.
pub async fn update_variants(
    session: OdooSession<'_>,
    resolver: &mut AttributeResolver<'_>,
    images: &ImageFetcher,
    template_id: i64,
    product: &CatalogProduct,
    policy: VariantMissPolicy,
) -> VariantSummary {
    let mut summary = VariantSummary {
        policy: policy.as_str(),
        ..VariantSummary::default()
    };
    let result = walk_variants(
        session,
        resolver,
        images,
        template_id,
        product,
        policy,
        &mut summary,
    )
    .await;
    if let Err(err) = result {
        warn!(target = "sync.reconcile", template_id, error = %err, "variant_update_aborted");
        summary.error = Some(err.to_string());
        summary.halted = true;
    }
    summary.not_processed = product.variants.len() - summary.processed;
    summary
}

async fn walk_variants(
    session: OdooSession<'_>,
    resolver: &mut AttributeResolver<'_>,
    images: &ImageFetcher,
    template_id: i64,
    product: &CatalogProduct,
    policy: VariantMissPolicy,
    summary: &mut VariantSummary,
) -> Result<(), OdooError> {
    for variant in &product.variants {
        let matched = locate(session, resolver, template_id, variant).await?;
        summary.processed += 1;

        if matched.is_empty() {
            warn!(
                target = "sync.reconcile",
                template_id,
                attributes = ?variant.attributes,
                policy = policy.as_str(),
                "variant_unmatched"
            );
            crate::metrics::variant_miss();
            summary.unmatched.push(variant.attributes.clone());
            match policy {
                VariantMissPolicy::Halt => {
                    summary.halted = true;
                    break;
                }
                VariantMissPolicy::Skip => continue,
            }
        }
        if matched.len() > 1 {
            summary.ambiguous += 1;
        }

        let image = match &variant.image {
            Some(url) => images.fetch_optional(url).await,
            None => None,
        };
        if image.is_none() {
            summary.images_missing += 1;
        }
        let update = VariantUpdate {
            default_code: variant.default_code.as_deref(),
            image_1920: image.as_deref(),
        };
        for id in &matched {
            session.write(VARIANT, &[*id], &update).await?;
        }
        info!(
            target = "sync.reconcile",
            template_id,
            variant_ids = ?matched,
            default_code = variant.default_code.as_deref().unwrap_or_default(),
            "variant_updated"
        );
        summary.updated_ids.extend(matched);
    }
    Ok(())
}

/// ERP variants of the template carrying every attribute value of the
/// source variant.
async fn locate(
    session: OdooSession<'_>,
    resolver: &mut AttributeResolver<'_>,
    template_id: i64,
    variant: &CatalogVariant,
) -> Result<Vec<i64>, OdooError> {
    let mut domain = Domain::new().where_eq("product_tmpl_id", template_id);
    for pair in &variant.attributes {
        let (_, value_id) = resolver.resolve_pair(pair).await?;
        let ptav_ids = session
            .search(
                TEMPLATE_ATTRIBUTE_VALUE,
                &Domain::new()
                    .where_eq("product_attribute_value_id", value_id)
                    .where_eq("product_tmpl_id", template_id),
            )
            .await?;
        domain = domain.where_in("product_template_attribute_value_ids", &ptav_ids);
    }
    session.search(VARIANT, &domain).await
}
