//! The flat id -> node mapping holding the macro tree.
//!
//! Nodes received as json text are kept as that text, next to the parsed node. The text is what gets saved and
//! sent to the host, so nodes this firmware can't parse still round-trip unchanged. Nodes received as json objects,
//! and groups whose inline children were moved out, are stored re-serialized with their keys in sorted order.
use alloc::collections::BTreeMap;
use alloc::format;
use alloc::string::{String, ToString};
use alloc::vec::Vec;

use serde_json::{Map, Value};

use crate::node::{MacroNode, NodeError, NodeId, ROOT_ID};
use crate::storage::{FileStorage, StorageError};

/// Root group used when there's no usable macro file
pub const DEFAULT_ROOT: &str = "{\"type\":\"group\",\"label\":\"Macros\",\"content\":[false,false,false,false,false,false,false,false,false,false,false,false],\"encoder\":{\"switch\":[],\"increased\":[],\"decreased\":[]}}";

static BLANK: MacroNode = MacroNode::Blank;

#[derive(Clone, Debug)]
struct Entry {
    raw: String,
    /// `None` if `raw` doesn't parse, the node then resolves as blank
    node: Option<MacroNode>,
}

#[derive(Clone, Debug, Default)]
pub struct MacroStore {
    nodes: BTreeMap<NodeId, Entry>,
    /// Items put since the last [`MacroStore::begin_transfer`]
    received: usize,
}

impl MacroStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store holding only the default root group
    pub fn default_root() -> Self {
        let mut store = Self::new();
        store.upsert(ROOT_ID, &Value::String(DEFAULT_ROOT.to_string()));
        store
    }

    /// Build a store from either persisted shape.
    ///
    /// The flat shape maps ids to nodes, each node a json string or object. The nested shape is a single root
    /// group object with its children inline, it's flattened with the root at [`ROOT_ID`].
    pub fn from_json(value: &Value) -> Result<Self, NodeError> {
        let object = value.as_object().ok_or(NodeError::NotAnObject)?;
        let mut store = Self::new();
        if object.contains_key("type") || object.contains_key("content") {
            store.upsert(ROOT_ID, value);
        } else {
            for (id, node) in object {
                store.upsert(id, node);
            }
        }
        Ok(store)
    }

    /// Load the store from `path`. Any error, or a file without a root node, yields [`MacroStore::default_root`].
    pub fn load<S: FileStorage>(storage: &mut S, path: &str) -> Self {
        let loaded = storage.read(path).and_then(|bytes| {
            let value: Value = serde_json::from_slice(&bytes).map_err(|_| StorageError::Corrupted)?;
            Self::from_json(&value).map_err(|_| StorageError::Corrupted)
        });
        match loaded {
            Ok(store) if store.contains(ROOT_ID) => {
                info!("Loaded {} macro nodes from {}", store.len(), path);
                store
            }
            Ok(_) => {
                error!("Macro file {} has no root node, using defaults", path);
                Self::default_root()
            }
            Err(e) => {
                error!("Failed to load macros from {}: {:?}", path, e);
                Self::default_root()
            }
        }
    }

    /// Save the flat shape to `path`. Returns `false` without writing when the storage is read-only.
    pub fn save<S: FileStorage>(&self, storage: &mut S, path: &str) -> bool {
        if storage.is_read_only() {
            return false;
        }
        let bytes = match serde_json::to_vec(&self.to_json()) {
            Ok(bytes) => bytes,
            Err(_) => {
                error!("Failed to serialize macros");
                return false;
            }
        };
        match storage.write(path, &bytes) {
            Ok(()) => true,
            Err(e) => {
                error!("Failed to save macros to {}: {:?}", path, e);
                false
            }
        }
    }

    /// The flat shape: `{"<id>": "<json string>"}`
    pub fn to_json(&self) -> Value {
        let map: Map<String, Value> = self
            .nodes
            .iter()
            .map(|(id, entry)| (id.clone(), Value::String(entry.raw.clone())))
            .collect();
        Value::Object(map)
    }

    /// Resolve `id`. Nodes which failed to parse resolve as [`MacroNode::Blank`]
    pub fn get(&self, id: &str) -> Option<&MacroNode> {
        self.nodes.get(id).map(|entry| entry.node.as_ref().unwrap_or(&BLANK))
    }

    /// The json text of `id`
    pub fn raw(&self, id: &str) -> Option<&str> {
        self.nodes.get(id).map(|entry| entry.raw.as_str())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    /// Insert or replace a node. `content` is either the node's json text or its json object.
    ///
    /// Inline children of a group are moved to their own ids `"<id>.<slot>"`.
    pub fn upsert(&mut self, id: &str, content: &Value) {
        match content {
            Value::String(raw) => match serde_json::from_str::<Value>(raw) {
                Ok(value) if value.is_object() => self.insert_value(id.to_string(), value, Some(raw.clone())),
                _ => {
                    warn!("Macro node {} is not a json object, kept as is", id);
                    self.nodes.insert(
                        id.to_string(),
                        Entry {
                            raw: raw.clone(),
                            node: None,
                        },
                    );
                }
            },
            other => self.insert_value(id.to_string(), other.clone(), None),
        }
    }

    /// Insert a parsed node, `raw` is the text it was parsed from
    fn insert_value(&mut self, id: NodeId, mut value: Value, mut raw: Option<String>) {
        let is_group = value.get("type").and_then(Value::as_str) == Some("group");
        if is_group && let Some(Value::Array(items)) = value.get_mut("content") {
            let mut children = Vec::new();
            for (slot, item) in items.iter_mut().enumerate() {
                if item.is_object() {
                    let child_id = format!("{}.{}", id, slot);
                    children.push((child_id.clone(), item.take()));
                    *item = Value::String(child_id);
                }
            }
            if !children.is_empty() {
                raw = None;
            }
            for (child_id, child) in children {
                self.insert_value(child_id, child, None);
            }
        }
        let node = MacroNode::from_value(&value).ok();
        let raw = raw.unwrap_or_else(|| serde_json::to_string(&value).unwrap_or_default());
        self.nodes.insert(id, Entry { raw, node });
    }

    /// Swap in a whole new tree
    pub fn replace(&mut self, other: MacroStore) {
        *self = other;
    }

    /// Start a streamed transfer: the store is cleared and filled by [`MacroStore::put`]
    pub fn begin_transfer(&mut self) {
        self.nodes.clear();
        self.received = 0;
    }

    pub fn put(&mut self, id: &str, content: &Value) {
        self.upsert(id, content);
        self.received += 1;
    }

    /// End a streamed transfer, returns the number of items received.
    ///
    /// Inline children are stored as nodes of their own, so [`MacroStore::len`] can be larger.
    pub fn end_transfer(&self) -> usize {
        if !self.contains(ROOT_ID) {
            warn!("Macro transfer has no root node");
        }
        self.received
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Iterate `(id, json text)` pairs in id order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.nodes.iter().map(|(id, entry)| (id.as_str(), entry.raw.as_str()))
    }
}
