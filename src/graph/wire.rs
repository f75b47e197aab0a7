//! Plain-data wire form of a node, as persisted and exchanged with the render layer.
//!
//! The JSON shape is `{ "id", "type", "position", "data" }`, where the structure of `data`
//! depends on `type`. Conversion into the typed [`Node`] validates the `type` string and the
//! payload, so a persisted workflow never yields a node whose payload does not match its kind.
use super::node::{
    ActionData, BoundaryData, LogicData, LoopData, Node, NodeData, NodeFamily, NodeKind, Position,
    ResourceData,
};
use crate::error::WorkflowError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Keys the render layer may attach to node data that are never part of a node's identity.
const DERIVED_DATA_KEYS: &[&str] = &["executionState"];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawNode {
    pub id: String,
    #[serde(rename = "type")]
    pub node_type: String,
    #[serde(default)]
    pub position: Position,
    #[serde(default)]
    pub data: Value,
}

impl TryFrom<RawNode> for Node {
    type Error = WorkflowError;

    fn try_from(raw: RawNode) -> Result<Self, Self::Error> {
        let kind =
            NodeKind::from_name(&raw.node_type).ok_or_else(|| WorkflowError::UnknownNodeType {
                node_id: raw.id.clone(),
                type_name: raw.node_type.clone(),
            })?;

        let payload = strip_derived_keys(raw.data);
        let data = match kind.family() {
            NodeFamily::Structural | NodeFamily::LoopBoundary => {
                NodeData::Boundary(parse_payload::<BoundaryData>(&raw.id, payload)?)
            }
            NodeFamily::Action => NodeData::Action(parse_payload::<ActionData>(&raw.id, payload)?),
            NodeFamily::Logic => NodeData::Logic(parse_payload::<LogicData>(&raw.id, payload)?),
            NodeFamily::Loop => NodeData::Loop(parse_payload::<LoopData>(&raw.id, payload)?),
            NodeFamily::Resource => {
                NodeData::Resource(parse_payload::<ResourceData>(&raw.id, payload)?)
            }
        };

        Ok(Node {
            id: raw.id,
            kind,
            position: raw.position,
            data,
        })
    }
}

impl From<Node> for RawNode {
    fn from(node: Node) -> Self {
        let data = match &node.data {
            NodeData::Boundary(d) => serde_json::to_value(d),
            NodeData::Action(d) => serde_json::to_value(d),
            NodeData::Logic(d) => serde_json::to_value(d),
            NodeData::Loop(d) => serde_json::to_value(d),
            NodeData::Resource(d) => serde_json::to_value(d),
        }
        // Payloads only hold string-keyed maps, which always serialize.
        .unwrap_or_default();

        RawNode {
            id: node.id,
            node_type: node.kind.as_str().to_string(),
            position: node.position,
            data,
        }
    }
}

fn strip_derived_keys(data: Value) -> Value {
    match data {
        Value::Null => Value::Object(serde_json::Map::new()),
        Value::Object(mut map) => {
            for key in DERIVED_DATA_KEYS {
                map.remove(*key);
            }
            Value::Object(map)
        }
        other => other,
    }
}

fn parse_payload<T: DeserializeOwned>(node_id: &str, data: Value) -> Result<T, WorkflowError> {
    serde_json::from_value(data).map_err(|e| WorkflowError::InvalidNodeData {
        node_id: node_id.to_string(),
        message: e.to_string(),
    })
}
