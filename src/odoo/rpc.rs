use crate::config::OdooConfig;
use crate::http::build_client;
use crate::odoo::domain::Domain;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum OdooError {
    #[error("request failed: {0}")]
    Request(String),
    #[error("rpc endpoint returned HTTP {0}")]
    Status(u16),
    #[error("{call} failed: {name}: {message}")]
    Rpc {
        call: String,
        name: String,
        message: String,
    },
    #[error("authentication rejected for user `{0}`")]
    AuthenticationFailed(String),
    #[error("invalid response for {call}: {detail}")]
    Deserialize { call: String, detail: String },
}

/// JSON-RPC transport and credentials for one ERP database. Holds no login
/// state; every run obtains its own [`OdooSession`].
pub struct OdooClient {
    endpoint: String,
    database: String,
    username: String,
    password: String,
    http: Client,
    next_id: AtomicU64,
}

/// An authenticated handle bound to the uid returned by `login`.
#[derive(Debug, Clone, Copy)]
pub struct OdooSession<'a> {
    client: &'a OdooClient,
    uid: i64,
}

#[derive(Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    method: &'static str,
    params: RpcParams<'a>,
    id: u64,
}

#[derive(Serialize)]
struct RpcParams<'a> {
    service: &'a str,
    method: &'a str,
    args: Value,
}

#[derive(Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Value,
    #[serde(default)]
    error: Option<RpcFault>,
}

#[derive(Deserialize)]
struct RpcFault {
    #[serde(default)]
    message: String,
    #[serde(default)]
    data: Option<RpcFaultData>,
}

#[derive(Deserialize)]
struct RpcFaultData {
    #[serde(default)]
    name: String,
    #[serde(default)]
    message: String,
}

impl std::fmt::Debug for OdooClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OdooClient")
            .field("endpoint", &self.endpoint)
            .field("database", &self.database)
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

impl OdooClient {
    pub fn new(config: &OdooConfig) -> Self {
        Self {
            endpoint: format!("{}/jsonrpc", config.base_url),
            database: config.database.clone(),
            username: config.username.clone(),
            password: config.password.clone(),
            http: build_client(),
            next_id: AtomicU64::new(1),
        }
    }

    pub async fn login(&self) -> Result<OdooSession<'_>, OdooError> {
        let args = json!([self.database, self.username, self.password, {}]);
        let uid = self.call("common", "authenticate", args).await?;
        match uid.as_i64() {
            Some(uid) if uid > 0 => {
                info!(target = "sync.odoo", uid, database = %self.database, "odoo_session_opened");
                Ok(OdooSession { client: self, uid })
            }
            _ => Err(OdooError::AuthenticationFailed(self.username.clone())),
        }
    }

    async fn call(&self, service: &str, method: &str, args: Value) -> Result<Value, OdooError> {
        let label = || format!("{service}.{method}");
        let body = RpcRequest {
            jsonrpc: "2.0",
            method: "call",
            params: RpcParams {
                service,
                method,
                args,
            },
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
        };
        let response = self
            .http
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|err| OdooError::Request(err.to_string()))?;

        if !response.status().is_success() {
            return Err(OdooError::Status(response.status().as_u16()));
        }

        let payload: RpcResponse = response
            .json()
            .await
            .map_err(|err| OdooError::Deserialize {
                call: label(),
                detail: err.to_string(),
            })?;

        if let Some(fault) = payload.error {
            let (name, message) = match fault.data {
                Some(data) if !data.message.is_empty() => (data.name, data.message),
                Some(data) => (data.name, fault.message),
                None => (String::new(), fault.message),
            };
            return Err(OdooError::Rpc {
                call: label(),
                name,
                message,
            });
        }
        Ok(payload.result)
    }
}

impl OdooSession<'_> {
    pub fn uid(&self) -> i64 {
        self.uid
    }

    pub async fn execute<T: DeserializeOwned>(
        &self,
        model: &str,
        method: &str,
        args: Value,
    ) -> Result<T, OdooError> {
        let client = self.client;
        let call_args = json!([
            client.database,
            self.uid,
            client.password,
            model,
            method,
            args
        ]);
        let result = client
            .call("object", "execute_kw", call_args)
            .await
            .map_err(|err| match err {
                OdooError::Rpc { name, message, .. } => OdooError::Rpc {
                    call: format!("{model}.{method}"),
                    name,
                    message,
                },
                other => other,
            })?;
        debug!(target = "sync.odoo", model, method, "odoo_call_ok");
        serde_json::from_value(result).map_err(|err| OdooError::Deserialize {
            call: format!("{model}.{method}"),
            detail: err.to_string(),
        })
    }

    pub async fn search(&self, model: &str, domain: &Domain) -> Result<Vec<i64>, OdooError> {
        self.execute(model, "search", json!([domain])).await
    }

    pub async fn create<P: Serialize>(&self, model: &str, values: &P) -> Result<i64, OdooError> {
        self.execute(model, "create", json!([values])).await
    }

    pub async fn write<P: Serialize>(
        &self,
        model: &str,
        ids: &[i64],
        values: &P,
    ) -> Result<bool, OdooError> {
        self.execute(model, "write", json!([ids, values])).await
    }
}
