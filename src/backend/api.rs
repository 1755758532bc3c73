//! JSON-RPC client for the monitoring server API.
//!
//! The protocol is JSON-RPC 2.0 over HTTP: `user.login` yields an auth token
//! which is attached to every subsequent call. The server encodes most
//! numbers as strings; the typed wrappers below parse them at the boundary
//! and surface anything unexpected as `BackendError`.

use std::sync::atomic::{AtomicU64, Ordering};

use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use super::BackendError;

pub struct RpcClient {
    http: Client,
    url: String,
    username: String,
    password: String,
    auth_token: RwLock<Option<String>>,
    request_id: AtomicU64,
}

#[derive(Deserialize)]
struct RpcEnvelope {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcError>,
}

#[derive(Deserialize)]
struct RpcError {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
    #[serde(default)]
    data: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RemoteTemplate {
    #[serde(rename = "templateid")]
    pub template_id: String,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RemoteItem {
    #[serde(rename = "itemid")]
    pub item_id: String,
    #[serde(rename = "key_")]
    pub key: String,
    #[serde(default)]
    pub name: String,
    pub value_type: String,
    #[serde(default)]
    pub units: String,
    #[serde(default)]
    pub history: String,
    #[serde(default)]
    pub delay: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RemoteTrigger {
    #[serde(rename = "triggerid")]
    pub trigger_id: String,
    /// The server calls the trigger name "description".
    pub description: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RemoteService {
    #[serde(rename = "serviceid")]
    pub service_id: String,
    pub name: String,
    pub algorithm: String,
    #[serde(rename = "sortorder", default)]
    pub sort_order: String,
    #[serde(rename = "goodsla", default)]
    pub good_sla: String,
    #[serde(rename = "triggerid", default)]
    pub trigger_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RemoteEvent {
    pub clock: String,
    pub value: String,
}

/// Parse a server-side stringly-typed integer, tolerating suffixed interval
/// forms like "90d" or "15m" by taking the leading digits.
pub fn parse_remote_int(raw: &str) -> Option<i64> {
    if raw.is_empty() {
        return None;
    }
    let digits: String = raw.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}

impl RpcClient {
    pub fn new(
        url: &str,
        username: &str,
        password: &str,
        verify_tls: bool,
    ) -> Result<Self, BackendError> {
        if !verify_tls {
            warn!(url, "TLS certificate verification disabled for monitoring server");
        }
        let http = Client::builder()
            .danger_accept_invalid_certs(!verify_tls)
            .build()
            .map_err(|e| BackendError::Transport {
                operation: "client construction".to_string(),
                source: e,
            })?;
        Ok(Self {
            http,
            url: url.to_string(),
            username: username.to_string(),
            password: password.to_string(),
            auth_token: RwLock::new(None),
            request_id: AtomicU64::new(1),
        })
    }

    async fn login(&self) -> Result<String, BackendError> {
        let token: String = self
            .raw_call(
                "user.login",
                json!({"username": self.username, "password": self.password}),
                None,
            )
            .await?;
        *self.auth_token.write().await = Some(token.clone());
        Ok(token)
    }

    async fn auth_token(&self) -> Result<String, BackendError> {
        if let Some(token) = self.auth_token.read().await.clone() {
            return Ok(token);
        }
        self.login().await
    }

    async fn raw_call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Value,
        auth: Option<&str>,
    ) -> Result<T, BackendError> {
        let id = self.request_id.fetch_add(1, Ordering::Relaxed);
        let mut body = json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": id,
        });
        if let Some(token) = auth {
            body["auth"] = json!(token);
        }
        debug!(method, id, "calling monitoring server");

        let response = self
            .http
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| BackendError::Transport {
                operation: method.to_string(),
                source: e,
            })?;
        let envelope: RpcEnvelope =
            response
                .json()
                .await
                .map_err(|e| BackendError::Transport {
                    operation: method.to_string(),
                    source: e,
                })?;

        if let Some(error) = envelope.error {
            let detail = error
                .data
                .as_ref()
                .and_then(|d| d.as_str())
                .unwrap_or_default();
            return Err(BackendError::Api {
                operation: method.to_string(),
                message: format!("{} {} (code {})", error.message, detail, error.code),
            });
        }
        let result = envelope
            .result
            .ok_or_else(|| BackendError::malformed(method, "response has neither result nor error"))?;
        serde_json::from_value(result)
            .map_err(|e| BackendError::malformed(method, format!("unexpected result shape: {e}")))
    }

    /// Authenticated call; logs in lazily on first use and retries once on an
    /// expired session.
    pub async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T, BackendError> {
        let token = self.auth_token().await?;
        match self.raw_call(method, params.clone(), Some(&token)).await {
            Err(BackendError::Api { message, .. }) if message.contains("re-login") => {
                let token = self.login().await?;
                self.raw_call(method, params, Some(&token)).await
            }
            other => other,
        }
    }

    // --- host groups ---

    pub async fn get_group_id(&self, name: &str) -> Result<Option<String>, BackendError> {
        let groups: Vec<Value> = self
            .call("hostgroup.get", json!({"filter": {"name": [name]}}))
            .await?;
        Ok(groups
            .first()
            .and_then(|g| g.get("groupid"))
            .and_then(|v| v.as_str())
            .map(str::to_string))
    }

    pub async fn get_or_create_group(&self, name: &str) -> Result<(String, bool), BackendError> {
        if let Some(id) = self.get_group_id(name).await? {
            return Ok((id, false));
        }
        let created: Value = self
            .call("hostgroup.create", json!({"name": name}))
            .await?;
        let id = created
            .get("groupids")
            .and_then(|v| v.get(0))
            .and_then(|v| v.as_str())
            .ok_or_else(|| {
                BackendError::malformed("hostgroup.create", format!("no group id for \"{name}\""))
            })?;
        Ok((id.to_string(), true))
    }

    // --- hosts ---

    pub async fn get_host_id(&self, host_name: &str) -> Result<Option<String>, BackendError> {
        let hosts: Vec<Value> = self
            .call("host.get", json!({"filter": {"host": [host_name]}}))
            .await?;
        Ok(hosts
            .first()
            .and_then(|h| h.get("hostid"))
            .and_then(|v| v.as_str())
            .map(str::to_string))
    }

    /// Existence check by the unique `host` field before creating; one
    /// interface, one group, N templates.
    pub async fn get_or_create_host(
        &self,
        host_name: &str,
        visible_name: &str,
        group_id: &str,
        template_ids: &[String],
        interface_parameters: &Value,
    ) -> Result<(String, bool), BackendError> {
        if let Some(id) = self.get_host_id(host_name).await? {
            return Ok((id, false));
        }
        let templates: Vec<Value> = template_ids
            .iter()
            .map(|id| json!({"templateid": id}))
            .collect();
        let created: Value = self
            .call(
                "host.create",
                json!({
                    "host": host_name,
                    "name": visible_name,
                    "interfaces": [interface_parameters],
                    "groups": [{"groupid": group_id}],
                    "templates": templates,
                }),
            )
            .await?;
        let id = created
            .get("hostids")
            .and_then(|v| v.get(0))
            .and_then(|v| v.as_str())
            .ok_or_else(|| {
                BackendError::malformed("host.create", format!("no host id for \"{host_name}\""))
            })?;
        Ok((id.to_string(), true))
    }

    pub async fn update_host(&self, host_id: &str, mut fields: Value) -> Result<(), BackendError> {
        fields["hostid"] = json!(host_id);
        let _: Value = self.call("host.update", fields).await?;
        Ok(())
    }

    pub async fn delete_host(&self, host_id: &str) -> Result<(), BackendError> {
        let _: Value = self.call("host.delete", json!([host_id])).await?;
        Ok(())
    }

    // --- catalog ---

    pub async fn list_templates(&self) -> Result<Vec<RemoteTemplate>, BackendError> {
        self.call("template.get", json!({"output": ["templateid", "name"]}))
            .await
    }

    pub async fn list_items(&self, template_id: &str) -> Result<Vec<RemoteItem>, BackendError> {
        self.call(
            "item.get",
            json!({
                "output": ["itemid", "key_", "name", "value_type", "units", "history", "delay"],
                "templateids": template_id,
            }),
        )
        .await
    }

    pub async fn list_triggers(&self, template_id: &str) -> Result<Vec<RemoteTrigger>, BackendError> {
        self.call(
            "trigger.get",
            json!({
                "output": ["triggerid", "description"],
                "templateids": template_id,
            }),
        )
        .await
    }

    // --- IT services ---

    pub async fn list_services(&self) -> Result<Vec<RemoteService>, BackendError> {
        self.call(
            "service.get",
            json!({"output": ["serviceid", "name", "algorithm", "sortorder", "goodsla", "triggerid"]}),
        )
        .await
    }

    pub async fn create_service(
        &self,
        name: &str,
        algorithm: i32,
        sort_order: i32,
        agreed_sla: Option<f64>,
        trigger_id: Option<&str>,
    ) -> Result<String, BackendError> {
        let mut params = json!({
            "name": name,
            "algorithm": algorithm,
            "sortorder": sort_order,
            "showsla": if agreed_sla.is_some() { 1 } else { 0 },
        });
        if let Some(sla) = agreed_sla {
            params["goodsla"] = json!(sla);
        }
        if let Some(trigger_id) = trigger_id {
            params["triggerid"] = json!(trigger_id);
        }
        let created: Value = self.call("service.create", params).await?;
        let id = created
            .get("serviceids")
            .and_then(|v| v.get(0))
            .and_then(|v| v.as_str())
            .ok_or_else(|| {
                BackendError::malformed("service.create", format!("no service id for \"{name}\""))
            })?;
        Ok(id.to_string())
    }

    pub async fn delete_services(&self, service_ids: &[String]) -> Result<(), BackendError> {
        if service_ids.is_empty() {
            return Ok(());
        }
        let _: Value = self.call("service.delete", json!(service_ids)).await?;
        Ok(())
    }

    /// SLA percentage for one service over [from, to).
    pub async fn get_sla(&self, service_id: &str, from: i64, to: i64) -> Result<f64, BackendError> {
        let result: Value = self
            .call(
                "service.getsla",
                json!({
                    "serviceids": service_id,
                    "intervals": [{"from": from, "to": to}],
                }),
            )
            .await?;
        result
            .get(service_id)
            .and_then(|s| s.get("sla"))
            .and_then(|v| v.get(0))
            .and_then(|v| v.get("sla"))
            .and_then(|v| v.as_f64())
            .ok_or_else(|| {
                BackendError::malformed(
                    "service.getsla",
                    format!("no SLA value for service {service_id}"),
                )
            })
    }

    pub async fn get_trigger_events(
        &self,
        trigger_id: &str,
        from: i64,
        to: i64,
    ) -> Result<Vec<RemoteEvent>, BackendError> {
        self.call(
            "event.get",
            json!({
                "output": ["clock", "value"],
                "objectids": trigger_id,
                "time_from": from,
                "time_till": to,
                "sortfield": ["clock"],
                "sortorder": "ASC",
            }),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_remote_int() {
        assert_eq!(parse_remote_int("90"), Some(90));
        assert_eq!(parse_remote_int("90d"), Some(90));
        assert_eq!(parse_remote_int("15m"), Some(15));
        assert_eq!(parse_remote_int(""), None);
        assert_eq!(parse_remote_int("auto"), None);
    }

    #[test]
    fn test_remote_item_deserialization() {
        let raw = serde_json::json!({
            "itemid": "10",
            "key_": "cpu",
            "name": "CPU utilisation",
            "value_type": "0",
            "units": "%",
            "history": "90",
            "delay": "60",
        });
        let item: RemoteItem = serde_json::from_value(raw).unwrap();
        assert_eq!(item.item_id, "10");
        assert_eq!(item.key, "cpu");
        assert_eq!(parse_remote_int(&item.value_type), Some(0));
    }

    #[test]
    fn test_envelope_error_takes_precedence() {
        let raw = r#"{"jsonrpc":"2.0","error":{"code":-32602,"message":"Invalid params.","data":"No permissions."},"id":1}"#;
        let envelope: RpcEnvelope = serde_json::from_str(raw).unwrap();
        assert!(envelope.result.is_none());
        let error = envelope.error.unwrap();
        assert_eq!(error.code, -32602);
        assert_eq!(error.message, "Invalid params.");
    }
}
