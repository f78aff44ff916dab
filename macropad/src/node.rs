//! Nodes of the macro tree.
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use core::fmt;

use macropad_types::color::Rgb;
use serde_json::Value;

use crate::instruction::Instruction;

/// Stable id of a node in the [`MacroStore`](crate::macro_store::MacroStore)
pub type NodeId = String;

/// Id of the root group
pub const ROOT_ID: &str = "0";

/// A slot in a group's content
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NodeRef {
    /// `false` or `null`, the key stays blank
    Empty,
    Id(NodeId),
}

impl NodeRef {
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::String(id) => NodeRef::Id(id.clone()),
            Value::Number(n) => NodeRef::Id(n.to_string()),
            Value::Bool(false) | Value::Null => NodeRef::Empty,
            _ => {
                // Inline nodes are flattened by the store before parsing
                debug!("Unsupported node reference, slot left empty");
                NodeRef::Empty
            }
        }
    }

    pub fn id(&self) -> Option<&str> {
        match self {
            NodeRef::Empty => None,
            NodeRef::Id(id) => Some(id),
        }
    }
}

/// Instruction sequences bound to the rotary encoder while a group is open
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EncoderBindings {
    pub switch: Vec<Instruction>,
    pub increased: Vec<Instruction>,
    pub decreased: Vec<Instruction>,
}

impl EncoderBindings {
    fn from_value(value: Option<&Value>) -> Self {
        let Some(value) = value else {
            return Self::default();
        };
        let sequence = |key: &str| value.get(key).map(Instruction::parse_sequence).unwrap_or_default();
        Self {
            switch: sequence("switch"),
            increased: sequence("increased"),
            decreased: sequence("decreased"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum NodeKind {
    Group,
    Macro,
    Blank,
}

#[derive(Clone, Debug, PartialEq)]
pub enum MacroNode {
    Group {
        label: String,
        /// LED color of the key opening this group
        color: Rgb,
        content: Vec<NodeRef>,
        encoder: EncoderBindings,
    },
    Macro {
        label: String,
        color: Rgb,
        retrigger: bool,
        instructions: Vec<Instruction>,
    },
    Blank,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum NodeError {
    InvalidJson,
    NotAnObject,
}

impl fmt::Display for NodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeError::InvalidJson => f.write_str("node is not valid json"),
            NodeError::NotAnObject => f.write_str("node is not a json object"),
        }
    }
}

impl MacroNode {
    /// Parse a node from its json object.
    ///
    /// `"type": "group"` and `"type": "blank"` select those kinds, anything else is a macro.
    pub fn from_value(value: &Value) -> Result<Self, NodeError> {
        let object = value.as_object().ok_or(NodeError::NotAnObject)?;
        let label = || object.get("label").and_then(Value::as_str).unwrap_or_default().to_string();
        let color = || object.get("color").and_then(Rgb::from_json).unwrap_or(Rgb::BLACK);
        let node = match object.get("type").and_then(Value::as_str) {
            Some("blank") => MacroNode::Blank,
            Some("group") => MacroNode::Group {
                label: label(),
                color: color(),
                content: object
                    .get("content")
                    .and_then(Value::as_array)
                    .map(|items| items.iter().map(NodeRef::from_value).collect())
                    .unwrap_or_default(),
                encoder: EncoderBindings::from_value(object.get("encoder")),
            },
            _ => MacroNode::Macro {
                label: label(),
                color: color(),
                retrigger: object.get("retrigger").and_then(Value::as_bool).unwrap_or(false),
                instructions: object
                    .get("content")
                    .map(Instruction::parse_sequence)
                    .unwrap_or_default(),
            },
        };
        Ok(node)
    }

    pub fn from_json_str(raw: &str) -> Result<Self, NodeError> {
        let value: Value = serde_json::from_str(raw).map_err(|_| NodeError::InvalidJson)?;
        Self::from_value(&value)
    }

    pub fn kind(&self) -> NodeKind {
        match self {
            MacroNode::Group { .. } => NodeKind::Group,
            MacroNode::Macro { .. } => NodeKind::Macro,
            MacroNode::Blank => NodeKind::Blank,
        }
    }

    /// LED color, blank nodes are dark
    pub fn color(&self) -> Rgb {
        match self {
            MacroNode::Group { color, .. } | MacroNode::Macro { color, .. } => *color,
            MacroNode::Blank => Rgb::BLACK,
        }
    }

    pub fn label(&self) -> &str {
        match self {
            MacroNode::Group { label, .. } | MacroNode::Macro { label, .. } => label,
            MacroNode::Blank => "",
        }
    }
}
