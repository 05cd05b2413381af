//! Edit command schema.
//!
//! One `EditCommand` describes one atomic document edit as produced by the AI
//! backend. Commands arrive loosely typed: the sheet may be named or indexed,
//! `detailedCommand` may be a literal, a formula, a style object, or a JSON
//! string holding a style object. Normalization (unwrapping of
//! `nestedCommands` wrappers) happens in the sync crate before these types
//! are deserialized.

use serde::{Deserialize, Serialize};

/// Target sheet, by name or by zero-based index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SheetRef {
    Index(u64),
    Name(String),
}

impl std::fmt::Display for SheetRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SheetRef::Index(i) => write!(f, "#{}", i),
            SheetRef::Name(name) => write!(f, "{:?}", name),
        }
    }
}

/// Kind of edit. Unrecognized values deserialize to `Unknown` and are ignored by the apply engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandType {
    ValueChange,
    UseFormula,
    ControlSheet,
    SortData,
    ApplyStyle,
    FilterData,
    SummaryEditHistory,
    #[serde(other)]
    Unknown,
}

impl CommandType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommandType::ValueChange => "value_change",
            CommandType::UseFormula => "use_formula",
            CommandType::ControlSheet => "control_sheet",
            CommandType::SortData => "sort_data",
            CommandType::ApplyStyle => "apply_style",
            CommandType::FilterData => "filter_data",
            CommandType::SummaryEditHistory => "summary_edit_history",
            CommandType::Unknown => "unknown",
        }
    }
}

/// Payload of a command: literal/formula text, a style command, or anything else the AI sent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DetailedCommand {
    Style(StyleCommand),
    Text(String),
    Other(serde_json::Value),
}

impl Default for DetailedCommand {
    fn default() -> Self {
        DetailedCommand::Text(String::new())
    }
}

impl DetailedCommand {
    /// Literal text for value/formula commands. Numbers and booleans are
    /// rendered with their JSON spelling, null becomes empty.
    pub fn as_text(&self) -> String {
        match self {
            DetailedCommand::Text(s) => s.clone(),
            DetailedCommand::Other(serde_json::Value::Null) => String::new(),
            DetailedCommand::Other(serde_json::Value::String(s)) => s.clone(),
            DetailedCommand::Other(v) => v.to_string(),
            DetailedCommand::Style(style) => serde_json::to_string(style).unwrap_or_default(),
        }
    }

    /// Style payload, parsing a JSON-encoded string if that is what arrived.
    pub fn as_style(&self) -> Option<StyleCommand> {
        match self {
            DetailedCommand::Style(style) => Some(style.clone()),
            DetailedCommand::Text(s) => serde_json::from_str(s).ok(),
            DetailedCommand::Other(v) => serde_json::from_value(v.clone()).ok(),
        }
    }
}

/// One canonical edit command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditCommand {
    pub sheet_identifier: SheetRef,
    pub command_type: CommandType,
    /// `[row, col]` or `[startRow, startCol, endRow, endCol]`, zero-based, inclusive.
    /// Signed so that negative coordinates survive deserialization and are rejected by validation.
    pub range: Vec<i64>,
    #[serde(default)]
    pub detailed_command: DetailedCommand,
}

// =============================================================================
// Style sub-schema
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StyleMethod {
    /// Merge a style object onto each cell in one step
    StyleObject,
    /// Call one styling primitive per present attribute
    DirectMethod,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StyleCommand {
    pub method: StyleMethod,
    #[serde(default)]
    pub properties: StyleProperties,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HorizontalAlign {
    Left,
    #[serde(alias = "centre")]
    Center,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerticalAlign {
    Top,
    #[serde(alias = "center")]
    Middle,
    Bottom,
}

/// One border edge. `style` is a free-form line style name ("thin", "dashed", ...).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BorderInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
}

/// Sparse style record. Every field is optional; absence means "leave unchanged".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StyleProperties {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub background_color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font_color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font_family: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font_size: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bold: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub italic: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub underline: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strikethrough: Option<bool>,
    /// CSS-like decoration: "underline", "line-through", "underline line-through" or "none"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_decoration: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub horizontal_alignment: Option<HorizontalAlign>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vertical_alignment: Option<VerticalAlign>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wrap_text: Option<bool>,
    /// Applies to all four edges; per-edge fields override it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub border: Option<BorderInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub border_top: Option<BorderInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub border_right: Option<BorderInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub border_bottom: Option<BorderInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub border_left: Option<BorderInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locked: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hidden: Option<bool>,
    /// Number format pattern
    #[serde(skip_serializing_if = "Option::is_none")]
    pub formatter: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub watermark: Option<String>,
}

impl StyleProperties {
    pub fn is_empty(&self) -> bool {
        *self == StyleProperties::default()
    }
}
