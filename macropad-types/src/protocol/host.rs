//! Request and response types of the json line protocol.
//!
//! Each line sent by the host is one request object `{"command": str, "content"?: any, "id"?: str}`.
//! Each line sent by the device is one [`Response`] object.
use alloc::string::{String, ToString};
use alloc::vec::Vec;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Commands understood by the device
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    GetSettings,
    SetSettings,
    GetMacros,
    SetMacros,
    SaveMacros,
    EnableUsb,
    SoftReset,
    HardReset,
    /// Anything else, kept for the error message
    Unknown(String),
}

impl Command {
    pub fn parse(name: &str) -> Self {
        match name {
            "get_settings" => Command::GetSettings,
            "set_settings" => Command::SetSettings,
            "get_macros" => Command::GetMacros,
            "set_macros" => Command::SetMacros,
            "save_macros" => Command::SaveMacros,
            "enable_usb" => Command::EnableUsb,
            "soft_reset" => Command::SoftReset,
            "hard_reset" => Command::HardReset,
            other => Command::Unknown(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Command::GetSettings => "get_settings",
            Command::SetSettings => "set_settings",
            Command::GetMacros => "get_macros",
            Command::SetMacros => "set_macros",
            Command::SaveMacros => "save_macros",
            Command::EnableUsb => "enable_usb",
            Command::SoftReset => "soft_reset",
            Command::HardReset => "hard_reset",
            Command::Unknown(name) => name,
        }
    }

    /// Whether the command cannot be processed without a `content` field
    pub fn requires_content(&self) -> bool {
        matches!(self, Command::SetSettings | Command::SetMacros)
    }
}

/// A decoded request line
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub command: Command,
    pub content: Option<Value>,
    pub id: Option<Value>,
}

/// Why a json payload is not a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RequestError {
    /// The payload has no string `command` field
    MissingCommand,
}

impl Request {
    pub fn from_value(payload: &Value) -> Result<Self, RequestError> {
        let command = payload
            .get("command")
            .and_then(Value::as_str)
            .ok_or(RequestError::MissingCommand)?;
        Ok(Self {
            command: Command::parse(command),
            content: payload.get("content").cloned(),
            id: payload.get("id").cloned(),
        })
    }

    /// The `id` of a streamed item as a string, numbers are converted to their decimal form
    pub fn id_string(&self) -> Option<String> {
        match self.id.as_ref()? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

/// A response or notification line sent by the device.
///
/// Exactly one of `ack`, `err` and `warn` is set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Response {
    #[serde(rename = "ACK", skip_serializing_if = "Option::is_none")]
    pub ack: Option<String>,
    #[serde(rename = "ID", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "CONTENT", skip_serializing_if = "Option::is_none")]
    pub content: Option<Value>,
    #[serde(rename = "ERR", skip_serializing_if = "Option::is_none")]
    pub err: Option<String>,
    #[serde(rename = "WARN", skip_serializing_if = "Option::is_none")]
    pub warn: Option<String>,
}

impl Response {
    pub fn ack(message: impl Into<String>) -> Self {
        Self {
            ack: Some(message.into()),
            ..Default::default()
        }
    }

    pub fn ack_with(message: impl Into<String>, content: impl Into<Value>) -> Self {
        Self {
            ack: Some(message.into()),
            content: Some(content.into()),
            ..Default::default()
        }
    }

    /// One streamed item of a transfer
    pub fn item(message: impl Into<String>, id: impl Into<String>, content: impl Into<Value>) -> Self {
        Self {
            ack: Some(message.into()),
            id: Some(id.into()),
            content: Some(content.into()),
            ..Default::default()
        }
    }

    pub fn err(message: impl Into<String>) -> Self {
        Self {
            err: Some(message.into()),
            ..Default::default()
        }
    }

    pub fn warn(message: impl Into<String>) -> Self {
        Self {
            warn: Some(message.into()),
            ..Default::default()
        }
    }

    /// Serialize to one compact json line, including the trailing `\n`
    pub fn to_line(&self) -> Vec<u8> {
        // A struct of strings and json values always serializes
        let mut line = serde_json::to_vec(self).unwrap_or_default();
        line.push(b'\n');
        line
    }
}
