use serde::ser::{SerializeTuple, Serializer};
use serde::Serialize;
use serde_json::json;
use serde_with::skip_serializing_none;

pub const ATTRIBUTE: &str = "product.attribute";
pub const ATTRIBUTE_VALUE: &str = "product.attribute.value";
pub const TEMPLATE: &str = "product.template";
pub const TEMPLATE_ATTRIBUTE_VALUE: &str = "product.template.attribute.value";
pub const VARIANT: &str = "product.product";
pub const IMAGE: &str = "product.image";

/// x2many command: link a freshly created sub-record.
const CMD_CREATE: u8 = 0;
/// x2many command: replace the relation with the given ids.
const CMD_SET: u8 = 6;

#[derive(Debug, Serialize)]
pub struct NewAttribute<'a> {
    pub name: &'a str,
    pub create_variant: &'static str,
}

impl<'a> NewAttribute<'a> {
    /// Attributes created here always spawn one variant per distinct value.
    pub fn always_variant(name: &'a str) -> Self {
        Self {
            name,
            create_variant: "always",
        }
    }
}

#[derive(Debug, Serialize)]
pub struct NewAttributeValue<'a> {
    pub name: &'a str,
    pub attribute_id: i64,
}

/// One attribute offered by a template together with every value it allows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeLine {
    pub attribute_id: i64,
    pub value_ids: Vec<i64>,
}

impl Serialize for AttributeLine {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut command = serializer.serialize_tuple(3)?;
        command.serialize_element(&CMD_CREATE)?;
        command.serialize_element(&0)?;
        command.serialize_element(&json!({
            "attribute_id": self.attribute_id,
            "value_ids": [[CMD_SET, 0, self.value_ids]],
        }))?;
        command.end()
    }
}

#[derive(Debug, Serialize)]
pub struct NewTemplate<'a> {
    pub name: &'a str,
    #[serde(rename = "type")]
    pub product_type: &'static str,
    pub image_1920: String,
    pub categ_id: i64,
    pub attribute_line_ids: &'a [AttributeLine],
}

#[derive(Debug, Serialize)]
pub struct NewProductImage<'a> {
    pub name: &'a str,
    pub image_1920: String,
    pub product_tmpl_id: i64,
}

#[skip_serializing_none]
#[derive(Debug, Serialize)]
pub struct VariantUpdate<'a> {
    pub default_code: Option<&'a str>,
    pub image_1920: Option<&'a str>,
}
