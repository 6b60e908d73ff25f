//! Fakes shared by the unit tests: a stateful ERP behind the JSON-RPC
//! endpoint plus mounting helpers for the catalog, image host and Pub/Sub.

use crate::catalog::AttributePair;
use crate::config::{
    CatalogConfig, ImageConfig, OdooConfig, PubsubConfig, PubsubCredentials, SyncConfig,
    VariantMissPolicy,
};
use crate::odoo::models::{ATTRIBUTE_VALUE, TEMPLATE, TEMPLATE_ATTRIBUTE_VALUE, VARIANT};
use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use serde_json::{Map, Value, json};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

pub const PUBLISH_PATH: &str = "/v1/projects/acme/topics/catalog-offsets:publish";

pub fn test_config(server: &MockServer) -> SyncConfig {
    SyncConfig {
        catalog: CatalogConfig {
            base_url: server.uri(),
            api_key: "ciq-test".into(),
        },
        odoo: OdooConfig {
            base_url: server.uri(),
            database: "test".into(),
            username: "sync@example.com".into(),
            password: "secret".into(),
            default_category_id: 1,
        },
        pubsub: PubsubConfig {
            endpoint: server.uri(),
            project: "acme".into(),
            topic: "catalog-offsets".into(),
            credentials: PubsubCredentials::Anonymous,
        },
        images: ImageConfig {
            size_suffix: None,
            download_timeout: Duration::from_secs(2),
        },
        variant_miss: VariantMissPolicy::Halt,
    }
}

/// Two-variant tee: Color {Red, Blue} x Size {M}, plus a product-level Brand
/// and a product-level Color that the variants already cover.
pub fn sample_product(server: &MockServer) -> Value {
    let uri = server.uri();
    json!({
        "name": "Tee",
        "main_image": format!("{uri}/img/tee"),
        "attributes": [
            {"name": "Brand", "value": "Acme"},
            {"name": "Color", "value": "Red"}
        ],
        "images": [{"name": "Back", "url": format!("{uri}/img/tee-back")}],
        "variants": [
            {
                "default_code": "TEE-RED-M",
                "image": format!("{uri}/img/tee-red"),
                "attributes": [
                    {"name": "Color", "value": "Red"},
                    {"name": "Size", "value": "M"}
                ]
            },
            {
                "default_code": "TEE-BLUE-M",
                "image": format!("{uri}/img/tee-blue"),
                "attributes": [
                    {"name": "Color", "value": "Blue"},
                    {"name": "Size", "value": "M"}
                ]
            }
        ]
    })
}

pub fn pair(name: &str, value: &str) -> AttributePair {
    AttributePair {
        name: name.into(),
        value: value.into(),
    }
}

pub async fn mount_catalog_page(server: &MockServer, offset: u64, results: Vec<Value>) {
    Mock::given(method("GET"))
        .and(path("/api/v1/products"))
        .and(query_param("offset", offset.to_string()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"results": results})))
        .mount(server)
        .await;
}

pub async fn mount_image(server: &MockServer, image_path: &str, status: u16) {
    Mock::given(method("GET"))
        .and(path(image_path))
        .respond_with(ResponseTemplate::new(status).set_body_bytes(b"IMG".to_vec()))
        .mount(server)
        .await;
}

pub async fn mount_sample_images(server: &MockServer) {
    for image_path in ["/img/tee", "/img/tee-back", "/img/tee-red", "/img/tee-blue"] {
        mount_image(server, image_path, 200).await;
    }
}

pub async fn mount_pubsub(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path(PUBLISH_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"messageIds": ["m-1"]})))
        .mount(server)
        .await;
}

/// Decoded payloads of every publish request the server has seen.
pub async fn published_payloads(server: &MockServer) -> Vec<Value> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|request| request.url.path() == PUBLISH_PATH)
        .filter_map(|request| serde_json::from_slice::<Value>(&request.body).ok())
        .filter_map(|body| body["messages"][0]["data"].as_str().map(str::to_string))
        .filter_map(|data| BASE64.decode(data).ok())
        .filter_map(|raw| serde_json::from_slice(&raw).ok())
        .collect()
}

/// In-memory ERP answering `common.authenticate` and `object.execute_kw`
/// (search, create, write). Creating a template with attribute lines
/// materialises its template attribute values and one variant per
/// combination, like the real server does.
#[derive(Clone, Default)]
pub struct FakeOdoo {
    state: Arc<Mutex<FakeState>>,
}

#[derive(Default)]
struct FakeState {
    next_id: i64,
    records: HashMap<String, Vec<Map<String, Value>>>,
    calls: Vec<(String, String)>,
    reject_login: bool,
    failing: Option<(String, String)>,
    excluded_values: Vec<String>,
}

impl FakeOdoo {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn mount(&self, server: &MockServer) {
        Mock::given(method("POST"))
            .and(path("/jsonrpc"))
            .respond_with(self.clone())
            .mount(server)
            .await;
    }

    pub fn reject_login(&self) {
        self.state.lock().unwrap().reject_login = true;
    }

    pub fn fail_on(&self, model: &str, operation: &str) {
        self.state.lock().unwrap().failing = Some((model.into(), operation.into()));
    }

    /// Templates generate no variant carrying an attribute value of this name.
    pub fn exclude_value(&self, name: &str) {
        self.state.lock().unwrap().excluded_values.push(name.into());
    }

    pub fn seed(&self, model: &str, values: Value) -> i64 {
        let values = values.as_object().cloned().unwrap_or_default();
        self.state.lock().unwrap().insert(model, values)
    }

    pub fn records(&self, model: &str) -> Vec<Map<String, Value>> {
        self.state
            .lock()
            .unwrap()
            .records
            .get(model)
            .cloned()
            .unwrap_or_default()
    }

    pub fn count(&self, model: &str, operation: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter(|(m, op)| m == model && op == operation)
            .count()
    }

    pub fn total_calls(&self) -> usize {
        self.state.lock().unwrap().calls.len()
    }

    /// Variants of `template_id` whose `default_code` was written.
    pub fn coded_variants(&self, template_id: i64) -> Vec<String> {
        self.records(VARIANT)
            .iter()
            .filter(|row| row["product_tmpl_id"] == json!(template_id))
            .filter_map(|row| row.get("default_code").and_then(Value::as_str))
            .map(str::to_string)
            .collect()
    }
}

impl Respond for FakeOdoo {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let body: Value = serde_json::from_slice(&request.body).unwrap_or(Value::Null);
        let params = &body["params"];
        let mut state = self.state.lock().unwrap();
        let outcome = match (params["service"].as_str(), params["method"].as_str()) {
            (Some("common"), Some("authenticate")) => {
                Ok(if state.reject_login { json!(false) } else { json!(2) })
            }
            (Some("object"), Some("execute_kw")) => {
                let args = &params["args"];
                let model = args[3].as_str().unwrap_or_default().to_string();
                let operation = args[4].as_str().unwrap_or_default().to_string();
                state.execute(&model, &operation, &args[5])
            }
            _ => Err("unknown service".to_string()),
        };
        let payload = match outcome {
            Ok(result) => json!({"jsonrpc": "2.0", "id": body["id"], "result": result}),
            Err(message) => json!({
                "jsonrpc": "2.0",
                "id": body["id"],
                "error": {
                    "code": 200,
                    "message": "Odoo Server Error",
                    "data": {"name": "odoo.exceptions.UserError", "message": message}
                }
            }),
        };
        ResponseTemplate::new(200).set_body_json(payload)
    }
}

impl FakeState {
    fn execute(&mut self, model: &str, operation: &str, args: &Value) -> Result<Value, String> {
        self.calls.push((model.to_string(), operation.to_string()));
        if self.failing.as_ref() == Some(&(model.to_string(), operation.to_string())) {
            return Err(format!("{model}.{operation} rejected"));
        }
        match operation {
            "search" => Ok(json!(self.search(model, &args[0]))),
            "create" => {
                let values = args[0].as_object().cloned().ok_or("create expects a dict")?;
                Ok(json!(self.create(model, values)))
            }
            "write" => {
                let ids: Vec<Value> = args[0].as_array().cloned().unwrap_or_default();
                let values = args[1].as_object().cloned().ok_or("write expects a dict")?;
                for row in self.records.entry(model.to_string()).or_default() {
                    if ids.contains(&row["id"]) {
                        row.extend(values.clone());
                    }
                }
                Ok(json!(true))
            }
            other => Err(format!("unsupported method {other}")),
        }
    }

    fn insert(&mut self, model: &str, mut values: Map<String, Value>) -> i64 {
        self.next_id += 1;
        let id = self.next_id;
        values.insert("id".into(), json!(id));
        self.records.entry(model.to_string()).or_default().push(values);
        id
    }

    fn create(&mut self, model: &str, values: Map<String, Value>) -> i64 {
        let lines = match model {
            TEMPLATE => values.get("attribute_line_ids").cloned(),
            _ => None,
        };
        let id = self.insert(model, values);
        if let Some(Value::Array(commands)) = lines {
            self.expand_template(id, &commands);
        }
        id
    }

    fn expand_template(&mut self, template_id: i64, commands: &[Value]) {
        let mut axes: Vec<Vec<i64>> = Vec::new();
        let mut excluded: Vec<i64> = Vec::new();
        for command in commands {
            let line = &command[2];
            let value_ids: Vec<i64> = line["value_ids"][0][2]
                .as_array()
                .map(|ids| ids.iter().filter_map(Value::as_i64).collect())
                .unwrap_or_default();
            let mut axis = Vec::new();
            for value_id in value_ids {
                let ptav = json!({
                    "product_tmpl_id": template_id,
                    "attribute_id": line["attribute_id"],
                    "product_attribute_value_id": value_id,
                });
                let ptav = ptav.as_object().cloned().unwrap_or_default();
                let ptav_id = self.insert(TEMPLATE_ATTRIBUTE_VALUE, ptav);
                if self.value_is_excluded(value_id) {
                    excluded.push(ptav_id);
                }
                axis.push(ptav_id);
            }
            axes.push(axis);
        }

        let mut combinations: Vec<Vec<i64>> = vec![Vec::new()];
        for axis in &axes {
            combinations = combinations
                .iter()
                .flat_map(|prefix| {
                    axis.iter().map(move |ptav| {
                        let mut combination = prefix.clone();
                        combination.push(*ptav);
                        combination
                    })
                })
                .collect();
        }
        combinations.retain(|combination| !combination.iter().any(|id| excluded.contains(id)));
        for combination in combinations {
            let variant = json!({
                "product_tmpl_id": template_id,
                "product_template_attribute_value_ids": combination,
            });
            self.insert(VARIANT, variant.as_object().cloned().unwrap_or_default());
        }
    }

    fn value_is_excluded(&self, value_id: i64) -> bool {
        self.records
            .get(ATTRIBUTE_VALUE)
            .into_iter()
            .flatten()
            .filter(|row| row["id"] == json!(value_id))
            .filter_map(|row| row["name"].as_str())
            .any(|name| self.excluded_values.iter().any(|excluded| excluded == name))
    }

    fn search(&self, model: &str, domain: &Value) -> Vec<i64> {
        let conditions = domain.as_array().cloned().unwrap_or_default();
        self.records
            .get(model)
            .map(|rows| {
                rows.iter()
                    .filter(|row| conditions.iter().all(|condition| holds(row, condition)))
                    .filter_map(|row| row["id"].as_i64())
                    .collect()
            })
            .unwrap_or_default()
    }
}

fn holds(row: &Map<String, Value>, condition: &Value) -> bool {
    let field = condition[0].as_str().unwrap_or_default();
    let expected = &condition[2];
    let actual = row.get(field).unwrap_or(&Value::Null);
    match condition[1].as_str() {
        Some("=") => actual == expected,
        Some("in") => {
            let wanted = expected.as_array().cloned().unwrap_or_default();
            match actual {
                Value::Array(have) => have.iter().any(|value| wanted.contains(value)),
                scalar => wanted.contains(scalar),
            }
        }
        _ => false,
    }
}
