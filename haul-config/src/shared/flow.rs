use std::fmt;

use serde::{Deserialize, Serialize};

use crate::shared::{MoverConfig, ValidationError};

/// How a run treats the destination's existing contents.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    /// Reads only rows past the persisted watermark and appends them.
    #[default]
    Incremental,
    /// Reads everything and replaces the destination's contents.
    FullDrop,
}

impl RunMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunMode::Incremental => "incremental",
            RunMode::FullDrop => "full_drop",
        }
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Value kind of a watermark column, which decides how values are ordered.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum WatermarkKind {
    /// Ordered numerically.
    Integer,
    /// Ordered chronologically.
    Timestamp,
    /// Ordered lexically.
    String,
}

impl WatermarkKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            WatermarkKind::Integer => "integer",
            WatermarkKind::Timestamp => "timestamp",
            WatermarkKind::String => "string",
        }
    }
}

impl fmt::Display for WatermarkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Incremental cursor settings for a flow.
///
/// The same `column` is used both to filter reads and to compute the next watermark.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct WatermarkConfig {
    pub column: String,
    pub kind: WatermarkKind,
}

/// One entity moved by one mover.
///
/// Entity identity is always explicit: `flow_name` and `entity_name` are both required.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct FlowConfig {
    pub flow_name: String,
    pub entity_name: String,
    #[serde(default)]
    pub run_mode: RunMode,
    #[serde(default)]
    pub watermark: Option<WatermarkConfig>,
    /// Columns identifying a row in the destination. Never used as a watermark column.
    #[serde(default)]
    pub primary_key: Vec<String>,
    #[serde(default)]
    pub mover: MoverConfig,
}

impl FlowConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.flow_name.trim().is_empty() {
            return Err(ValidationError::MissingField("flow_name".to_string()));
        }

        if self.entity_name.trim().is_empty() {
            return Err(ValidationError::MissingField(format!(
                "flows[{}].entity_name",
                self.flow_name
            )));
        }

        if let Some(watermark) = &self.watermark {
            if watermark.column.trim().is_empty() {
                return Err(ValidationError::MissingField(format!(
                    "flows[{}.{}].watermark.column",
                    self.flow_name, self.entity_name
                )));
            }
        }

        self.mover.validate()
    }
}
