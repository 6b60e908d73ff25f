use crate::catalog::{CatalogProduct, ExtraImage};
use crate::images::{ImageError, ImageFetcher};
use crate::odoo::models::{IMAGE, NewProductImage, NewTemplate, TEMPLATE};
use crate::odoo::{OdooError, OdooSession};
use crate::reconcile::attributes::AttributeResolver;
use crate::reconcile::lines::AttributeLineSet;
use serde::Serialize;
use thiserror::Error;
use tracing::info;

/// Storable product type; tracked in inventory.
const PRODUCT_TYPE: &str = "product";

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error(transparent)]
    Odoo(#[from] OdooError),
    #[error("main image unavailable: {0}")]
    MainImage(#[from] ImageError),
}

#[derive(Debug, Clone, Serialize)]
pub struct TemplateReceipt {
    pub template_id: i64,
    pub attribute_lines: usize,
    pub candidate_pairs: usize,
    pub gallery_attached: usize,
    pub gallery_skipped: usize,
}

/// Resolves every attribute pair of the product into merged template lines.
///
/// Variant pairs come first. A product-level pair is only considered when no
/// variant uses its attribute name.
pub async fn collect_attribute_lines(
    resolver: &mut AttributeResolver<'_>,
    product: &CatalogProduct,
) -> Result<AttributeLineSet, OdooError> {
    let mut lines = AttributeLineSet::default();
    for variant in &product.variants {
        for pair in &variant.attributes {
            let (attribute_id, value_id) = resolver.resolve_pair(pair).await?;
            lines.insert(attribute_id, value_id);
        }
    }

    let covered = product.variant_attribute_names();
    for pair in &product.attributes {
        if covered.contains(&pair.name.as_str()) {
            continue;
        }
        let (attribute_id, value_id) = resolver.resolve_pair(pair).await?;
        lines.insert(attribute_id, value_id);
    }
    Ok(lines)
}

/// Creates the template, its attribute lines and gallery. A template is
/// created on every call; there is no lookup for an existing one.
pub async fn create_template(
    session: OdooSession<'_>,
    resolver: &mut AttributeResolver<'_>,
    images: &ImageFetcher,
    product: &CatalogProduct,
    category_id: i64,
) -> Result<TemplateReceipt, TemplateError> {
    let lines = collect_attribute_lines(resolver, product).await?;
    let candidate_pairs = lines.candidates();
    let lines = lines.into_lines();

    let image_1920 = images.fetch_required(&product.main_image).await?;
    let template_id = session
        .create(
            TEMPLATE,
            &NewTemplate {
                name: &product.name,
                product_type: PRODUCT_TYPE,
                image_1920,
                categ_id: category_id,
                attribute_line_ids: &lines,
            },
        )
        .await?;
    info!(
        target = "sync.odoo",
        template_id,
        name = %product.name,
        attribute_lines = lines.len(),
        "template_created"
    );

    let (gallery_attached, gallery_skipped) =
        attach_gallery(session, images, template_id, &product.images).await?;

    Ok(TemplateReceipt {
        template_id,
        attribute_lines: lines.len(),
        candidate_pairs,
        gallery_attached,
        gallery_skipped,
    })
}

async fn attach_gallery(
    session: OdooSession<'_>,
    images: &ImageFetcher,
    template_id: i64,
    gallery: &[ExtraImage],
) -> Result<(usize, usize), OdooError> {
    let mut attached = 0;
    let mut skipped = 0;
    for image in gallery {
        let Some(image_1920) = images.fetch_optional(&image.url).await else {
            skipped += 1;
            continue;
        };
        session
            .create(
                IMAGE,
                &NewProductImage {
                    name: &image.name,
                    image_1920,
                    product_tmpl_id: template_id,
                },
            )
            .await?;
        attached += 1;
    }
    Ok((attached, skipped))
}
