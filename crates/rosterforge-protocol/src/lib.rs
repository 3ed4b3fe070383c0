//! Machine-readable response payloads shared by the rosterforge CLI and any
//! UI layer that drives the engine. Field names are camelCase on the wire.

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const PROTOCOL_VERSION: &str = "v1";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CostumeEntry {
    pub index: usize,
    pub name: String,
    pub file_name: String,
    pub color_smash_group: Option<u32>,
    #[serde(rename = "hasCSP")]
    pub has_csp: bool,
    pub has_icon: bool,
    pub csp: Option<String>,
    pub icon: Option<String>,
}

/// Identity of a costume record that was inserted or removed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CostumeIdentity {
    pub index: usize,
    pub name: String,
    pub file_name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReorderedIndices {
    pub from_index: usize,
    pub to_index: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fighter: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fighter_internal_id: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inserted_costume: Option<CostumeIdentity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub costume_count: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub removed_costume: Option<CostumeIdentity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remaining_costumes: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reordered: Option<ReorderedIndices>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub costumes: Option<Vec<CostumeEntry>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    /// Set on failures that happened after the in-memory mutation succeeded,
    /// i.e. the change exists in memory but was not saved.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mutation_applied: Option<bool>,
}

impl CommandResponse {
    pub fn ok() -> Self {
        Self {
            success: true,
            ..Self::default()
        }
    }

    pub fn failure(error_code: &str, error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            error_code: Some(error_code.to_string()),
            ..Self::default()
        }
    }

    pub fn with_fighter(mut self, name: &str, internal_id: usize) -> Self {
        self.fighter = Some(name.to_string());
        self.fighter_internal_id = Some(internal_id);
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn to_pretty_json(&self) -> Result<String, String> {
        serde_json::to_string_pretty(self).map_err(|e| format!("Could not serialize response: {e}"))
    }
}
