use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Deserialize)]
pub struct ProductPage {
    #[serde(default)]
    pub results: Vec<CatalogProduct>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogProduct {
    pub name: String,
    pub main_image: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub attributes: Vec<AttributePair>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub images: Vec<ExtraImage>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub variants: Vec<CatalogVariant>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogVariant {
    #[serde(default)]
    pub default_code: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub attributes: Vec<AttributePair>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributePair {
    pub name: String,
    #[serde(deserialize_with = "scalar_as_text")]
    pub value: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtraImage {
    #[serde(default)]
    pub name: String,
    pub url: String,
}

impl CatalogProduct {
    /// Names of every attribute used by at least one variant, first occurrence first.
    pub fn variant_attribute_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for variant in &self.variants {
            for attribute in &variant.attributes {
                if !names.contains(&attribute.name.as_str()) {
                    names.push(attribute.name.as_str());
                }
            }
        }
        names
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn scalar_as_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(text) => Ok(text),
        Value::Number(number) => Ok(number.to_string()),
        Value::Bool(flag) => Ok(flag.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "attribute value must be a scalar, got {other}"
        ))),
    }
}
