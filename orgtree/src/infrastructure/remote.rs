//! HTTP implementation of the remote tree service.
//!
//! REST layout below `<base_url>/tree`:
//! - `GET    /tree`      full collection
//! - `POST   /tree`      create
//! - `PUT    /tree/{id}` update
//! - `DELETE /tree/{id}` delete
//!
//! Backends may deliver ids as strings, so every id and parent id is coerced
//! to an integer on receipt.

use std::time::Duration;

use reqwest::blocking::{Client, Response};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::domain::{NodeId, NodeType, TreeNode};
use crate::infrastructure::error::{RemoteError, RemoteResult};
use crate::infrastructure::traits::RemoteStore;

/// Id as it may appear on the wire: number, float or numeric string.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WireId {
    Int(i64),
    Float(f64),
    Text(String),
}

impl WireId {
    fn to_id(&self) -> Option<NodeId> {
        match self {
            WireId::Int(i) => Some(*i),
            WireId::Float(f) => float_to_id(*f),
            WireId::Text(s) => {
                let s = s.trim();
                s.parse::<NodeId>()
                    .ok()
                    .or_else(|| s.parse::<f64>().ok().and_then(float_to_id))
            }
        }
    }
}

fn float_to_id(f: f64) -> Option<NodeId> {
    if f.is_finite() && f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64 {
        Some(f as NodeId)
    } else {
        None
    }
}

#[derive(Debug, Deserialize)]
struct WireNode {
    id: WireId,
    name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(rename = "type")]
    node_type: String,
    #[serde(rename = "parentId", default)]
    parent_id: Option<WireId>,
}

impl TryFrom<WireNode> for TreeNode {
    type Error = String;

    fn try_from(wire: WireNode) -> Result<Self, Self::Error> {
        let id = wire
            .id
            .to_id()
            .ok_or_else(|| format!("id is not an integer: {:?}", wire.id))?;
        let parent_id = match &wire.parent_id {
            None => None,
            Some(p) => Some(
                p.to_id()
                    .ok_or_else(|| format!("node {id}: parentId is not an integer: {p:?}"))?,
            ),
        };
        let node_type = wire
            .node_type
            .parse::<NodeType>()
            .map_err(|e| format!("node {id}: {e}"))?;
        Ok(TreeNode {
            id,
            name: wire.name,
            description: wire.description.unwrap_or_default(),
            node_type,
            parent_id,
        })
    }
}

/// Decode one wire record.
pub fn decode_node(value: Value) -> Result<TreeNode, String> {
    let wire: WireNode = serde_json::from_value(value).map_err(|e| e.to_string())?;
    TreeNode::try_from(wire)
}

/// Decode the collection payload.
///
/// A body that is not an array is rejected as a whole; records that fail to
/// decode are skipped with a warning.
pub fn decode_node_list(body: Value) -> RemoteResult<Vec<TreeNode>> {
    let items = match body {
        Value::Array(items) => items,
        other => {
            return Err(RemoteError::MalformedPayload(format!(
                "expected a JSON array of nodes, got {}",
                json_kind(&other)
            )))
        }
    };

    let total = items.len();
    let mut nodes = Vec::with_capacity(total);
    for (i, item) in items.into_iter().enumerate() {
        match decode_node(item) {
            Ok(node) => nodes.push(node),
            Err(e) => warn!("skipping record {}: {}", i, e),
        }
    }
    debug!("decode_node_list: {} of {} records usable", nodes.len(), total);
    Ok(nodes)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Record echoed by a create/update, or what was sent if the echo is unusable.
fn decode_echo(sent: &TreeNode, body: &str) -> TreeNode {
    if body.trim().is_empty() {
        return sent.clone();
    }
    let decoded = serde_json::from_str::<Value>(body)
        .map_err(|e| e.to_string())
        .and_then(decode_node);
    match decoded {
        Ok(node) => node,
        Err(e) => {
            debug!("unusable echo for node {}: {}", sent.id, e);
            sent.clone()
        }
    }
}

/// Remote store backed by a REST service.
#[derive(Debug, Clone)]
pub struct HttpRemoteStore {
    client: Client,
    base_url: String,
}

impl HttpRemoteStore {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> RemoteResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RemoteError::transport("build http client", e))?;
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn collection_url(&self) -> String {
        format!("{}/tree", self.base_url)
    }

    pub fn item_url(&self, id: NodeId) -> String {
        format!("{}/tree/{}", self.base_url, id)
    }
}

fn ensure_success(method: &'static str, url: &str, resp: Response) -> RemoteResult<Response> {
    let status = resp.status();
    if status.is_success() {
        Ok(resp)
    } else {
        Err(RemoteError::Status {
            method,
            url: url.to_string(),
            status: status.as_u16(),
        })
    }
}

impl RemoteStore for HttpRemoteStore {
    #[instrument(level = "debug", skip(self))]
    fn fetch_all(&self) -> RemoteResult<Vec<TreeNode>> {
        let url = self.collection_url();
        let resp = self
            .client
            .get(&url)
            .send()
            .map_err(|e| RemoteError::transport(format!("GET {url}"), e))?;
        let body = ensure_success("GET", &url, resp)?
            .text()
            .map_err(|e| RemoteError::transport(format!("read body of GET {url}"), e))?;
        let value: Value = serde_json::from_str(&body)
            .map_err(|e| RemoteError::decode(format!("GET {url}"), e))?;
        decode_node_list(value)
    }

    #[instrument(level = "debug", skip(self, node), fields(id = node.id))]
    fn create(&self, node: &TreeNode) -> RemoteResult<TreeNode> {
        let url = self.collection_url();
        let resp = self
            .client
            .post(&url)
            .json(node)
            .send()
            .map_err(|e| RemoteError::transport(format!("POST {url}"), e))?;
        let body = ensure_success("POST", &url, resp)?.text().unwrap_or_default();
        Ok(decode_echo(node, &body))
    }

    #[instrument(level = "debug", skip(self, node))]
    fn update(&self, id: NodeId, node: &TreeNode) -> RemoteResult<TreeNode> {
        let url = self.item_url(id);
        let resp = self
            .client
            .put(&url)
            .json(node)
            .send()
            .map_err(|e| RemoteError::transport(format!("PUT {url}"), e))?;
        let body = ensure_success("PUT", &url, resp)?.text().unwrap_or_default();
        Ok(decode_echo(node, &body))
    }

    #[instrument(level = "debug", skip(self))]
    fn remove(&self, id: NodeId) -> RemoteResult<()> {
        let url = self.item_url(id);
        let resp = self
            .client
            .delete(&url)
            .send()
            .map_err(|e| RemoteError::transport(format!("DELETE {url}"), e))?;
        ensure_success("DELETE", &url, resp)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn given_string_ids_when_decoding_then_coerces_to_integers() {
        let body = json!([
            {"id": "1", "name": "Inst", "description": "An institute", "type": "institute", "parentId": null},
            {"id": "2", "name": "Sch", "description": "A school", "type": "school", "parentId": "1"},
            {"id": 3.0, "name": "Dept", "description": "A dept", "type": "department", "parentId": 2}
        ]);

        let nodes = decode_node_list(body).unwrap();

        assert_eq!(nodes.len(), 3);
        assert_eq!(nodes[0].id, 1);
        assert_eq!(nodes[0].parent_id, None);
        assert_eq!(nodes[1].parent_id, Some(1));
        assert_eq!(nodes[2].id, 3);
    }

    #[test]
    fn given_object_payload_when_decoding_then_malformed() {
        let result = decode_node_list(json!({"tree": []}));

        assert!(matches!(result, Err(RemoteError::MalformedPayload(_))));
    }

    #[test]
    fn given_bad_records_when_decoding_then_skips_only_those() {
        let body = json!([
            {"id": "abc", "name": "Bad id", "type": "school", "parentId": null},
            {"id": 2, "name": "Bad type", "type": "faculty", "parentId": null},
            {"id": 3, "type": "school", "parentId": null},
            {"id": 4, "name": "Good", "type": "Teacher"}
        ]);

        let nodes = decode_node_list(body).unwrap();

        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].id, 4);
        assert_eq!(nodes[0].node_type, NodeType::Teacher);
        assert_eq!(nodes[0].description, "");
        assert!(nodes[0].is_root());
    }

    #[test]
    fn given_empty_or_garbage_echo_when_decoding_then_falls_back_to_sent() {
        let sent = TreeNode::new(9, "Sent", "sent node", NodeType::School, None);

        assert_eq!(decode_echo(&sent, ""), sent);
        assert_eq!(decode_echo(&sent, "not json"), sent);
        let echoed = decode_echo(
            &sent,
            r#"{"id":"12","name":"Sent","description":"sent node","type":"school","parentId":null}"#,
        );
        assert_eq!(echoed.id, 12);
    }

    #[test]
    fn given_trailing_slash_when_building_urls_then_single_separator() {
        let store = HttpRemoteStore::new("http://localhost:7000/", Duration::from_secs(1)).unwrap();

        assert_eq!(store.collection_url(), "http://localhost:7000/tree");
        assert_eq!(store.item_url(5), "http://localhost:7000/tree/5");
    }
}
