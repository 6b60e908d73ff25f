use std::time::Duration;
use thiserror::Error;

const DEFAULT_CATALOG_BASE_URL: &str = "https://catalogiq.app";
const DEFAULT_PUBSUB_ENDPOINT: &str = "https://pubsub.googleapis.com";
const DEFAULT_METADATA_TOKEN_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),
    #[error("invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub catalog: CatalogConfig,
    pub odoo: OdooConfig,
    pub pubsub: PubsubConfig,
    pub images: ImageConfig,
    pub variant_miss: VariantMissPolicy,
}

#[derive(Debug, Clone)]
pub struct CatalogConfig {
    pub base_url: String,
    pub api_key: String,
}

#[derive(Debug, Clone)]
pub struct OdooConfig {
    pub base_url: String,
    pub database: String,
    pub username: String,
    pub password: String,
    pub default_category_id: i64,
}

#[derive(Debug, Clone)]
pub struct PubsubConfig {
    pub endpoint: String,
    pub project: String,
    pub topic: String,
    pub credentials: PubsubCredentials,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PubsubCredentials {
    /// Emulator or pre-authorised proxy.
    Anonymous,
    Static(String),
    MetadataServer { token_url: String },
}

#[derive(Debug, Clone)]
pub struct ImageConfig {
    pub size_suffix: Option<String>,
    pub download_timeout: Duration,
}

/// What to do with the remaining variants of a product once one of them
/// matches no ERP variant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum VariantMissPolicy {
    #[default]
    Halt,
    Skip,
}

impl VariantMissPolicy {
    pub fn from_raw(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "halt" | "stop" => Some(Self::Halt),
            "skip" | "continue" => Some(Self::Skip),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Halt => "halt",
            Self::Skip => "skip",
        }
    }
}

impl SyncConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let required = |key: &'static str| get(key).ok_or(ConfigError::Missing(key));

        let catalog = CatalogConfig {
            base_url: get("CATALOG_BASE_URL")
                .unwrap_or_else(|| DEFAULT_CATALOG_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            api_key: required("CATALOGIQ_API_KEY")?,
        };

        let default_category_id = match get("ODOO_DEFAULT_CATEGORY_ID") {
            Some(raw) => raw
                .parse::<i64>()
                .ok()
                .filter(|id| *id > 0)
                .ok_or(ConfigError::Invalid {
                    key: "ODOO_DEFAULT_CATEGORY_ID",
                    value: raw,
                })?,
            None => 1,
        };
        let odoo = OdooConfig {
            base_url: required("ODOO_URL")?.trim_end_matches('/').to_string(),
            database: required("ODOO_DB")?,
            username: required("ODOO_USERNAME")?,
            password: required("ODOO_PASSWORD")?,
            default_category_id,
        };

        let project = required("PUBSUB_PROJECT")?;
        let topic = required("PUBSUB_TOPIC")?;
        let (endpoint, credentials) = match get("PUBSUB_EMULATOR_HOST") {
            Some(host) => (format!("http://{host}"), PubsubCredentials::Anonymous),
            None => {
                let endpoint = get("PUBSUB_ENDPOINT")
                    .unwrap_or_else(|| DEFAULT_PUBSUB_ENDPOINT.to_string());
                let credentials = match get("PUBSUB_ACCESS_TOKEN") {
                    Some(token) => PubsubCredentials::Static(token),
                    None => PubsubCredentials::MetadataServer {
                        token_url: get("GCE_METADATA_TOKEN_URL")
                            .unwrap_or_else(|| DEFAULT_METADATA_TOKEN_URL.to_string()),
                    },
                };
                (endpoint, credentials)
            }
        };
        let pubsub = PubsubConfig {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            project,
            topic,
            credentials,
        };

        let size_suffix = match lookup("IMAGE_SIZE_SUFFIX") {
            Some(raw) => Some(raw.trim().trim_matches('/').to_string()).filter(|s| !s.is_empty()),
            None => Some("800x800".to_string()),
        };
        let download_timeout = match get("IMAGE_TIMEOUT_SECS") {
            Some(raw) => raw
                .parse::<u64>()
                .ok()
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs)
                .ok_or(ConfigError::Invalid {
                    key: "IMAGE_TIMEOUT_SECS",
                    value: raw,
                })?,
            None => Duration::from_secs(5),
        };

        let variant_miss = match get("VARIANT_MISS_POLICY") {
            Some(raw) => VariantMissPolicy::from_raw(&raw).ok_or(ConfigError::Invalid {
                key: "VARIANT_MISS_POLICY",
                value: raw,
            })?,
            None => VariantMissPolicy::default(),
        };

        Ok(Self {
            catalog,
            odoo,
            pubsub,
            images: ImageConfig {
                size_suffix,
                download_timeout,
            },
            variant_miss,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn base_vars() -> HashMap<&'static str, &'static str> {
        HashMap::from([
            ("CATALOGIQ_API_KEY", "ciq-key"),
            ("ODOO_URL", "https://erp.example.com/"),
            ("ODOO_DB", "prod"),
            ("ODOO_USERNAME", "sync@example.com"),
            ("ODOO_PASSWORD", "secret"),
            ("PUBSUB_PROJECT", "acme"),
            ("PUBSUB_TOPIC", "catalog-offsets"),
        ])
    }

    fn load(vars: &HashMap<&'static str, &'static str>) -> Result<SyncConfig, ConfigError> {
        SyncConfig::from_lookup(|key| vars.get(key).map(|v| v.to_string()))
    }

    #[test]
    fn defaults_apply_when_only_required_values_are_set() {
        let cfg = load(&base_vars()).expect("config");
        assert_eq!(cfg.catalog.base_url, "https://catalogiq.app");
        assert_eq!(cfg.odoo.base_url, "https://erp.example.com");
        assert_eq!(cfg.odoo.default_category_id, 1);
        assert_eq!(cfg.pubsub.endpoint, "https://pubsub.googleapis.com");
        assert!(matches!(
            cfg.pubsub.credentials,
            PubsubCredentials::MetadataServer { .. }
        ));
        assert_eq!(cfg.images.size_suffix.as_deref(), Some("800x800"));
        assert_eq!(cfg.images.download_timeout, Duration::from_secs(5));
        assert_eq!(cfg.variant_miss, VariantMissPolicy::Halt);
    }

    #[test]
    fn missing_required_value_is_named() {
        let mut vars = base_vars();
        vars.remove("ODOO_PASSWORD");
        let err = load(&vars).expect_err("should fail");
        assert_eq!(err, ConfigError::Missing("ODOO_PASSWORD"));
    }

    #[test]
    fn emulator_host_disables_credentials() {
        let mut vars = base_vars();
        vars.insert("PUBSUB_EMULATOR_HOST", "localhost:8085");
        vars.insert("PUBSUB_ACCESS_TOKEN", "ignored");
        let cfg = load(&vars).expect("config");
        assert_eq!(cfg.pubsub.endpoint, "http://localhost:8085");
        assert_eq!(cfg.pubsub.credentials, PubsubCredentials::Anonymous);
    }

    #[test]
    fn variant_miss_policy_is_parsed_and_validated() {
        let mut vars = base_vars();
        vars.insert("VARIANT_MISS_POLICY", "Skip");
        assert_eq!(load(&vars).unwrap().variant_miss, VariantMissPolicy::Skip);

        vars.insert("VARIANT_MISS_POLICY", "sometimes");
        assert!(matches!(
            load(&vars),
            Err(ConfigError::Invalid {
                key: "VARIANT_MISS_POLICY",
                ..
            })
        ));
    }

    #[test]
    fn empty_size_suffix_disables_resizing() {
        let mut vars = base_vars();
        vars.insert("IMAGE_SIZE_SUFFIX", "");
        let cfg = load(&vars).expect("config");
        assert_eq!(cfg.images.size_suffix, None);
    }
}
