use serde::{Deserialize, Serialize};

/// Horizontal text alignment
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Alignment {
    #[default]
    Left,
    Center,
    Right,
}

/// Vertical text alignment
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum VerticalAlignment {
    Top,
    #[default]
    Middle,
    Bottom,
}

/// Text overflow behavior
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TextOverflow {
    #[default]
    Clip,       // Text is clipped at cell boundary
    Wrap,       // Text wraps to multiple lines within the cell
    Overflow,   // Text overflows into adjacent empty cells
}

/// Line style of a single cell edge
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BorderLineStyle {
    #[default]
    Thin,
    Medium,
    Thick,
    Dashed,
    Dotted,
    Double,
    None,
}

/// One painted cell edge
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Border {
    pub color: Option<String>,
    pub style: BorderLineStyle,
}

/// Per-edge borders. `None` means the edge is not painted.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Borders {
    pub top: Option<Border>,
    pub right: Option<Border>,
    pub bottom: Option<Border>,
    pub left: Option<Border>,
}

impl Borders {
    pub fn is_empty(&self) -> bool {
        self.top.is_none() && self.right.is_none() && self.bottom.is_none() && self.left.is_none()
    }
}

/// Cell formatting options
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct CellFormat {
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
    pub strikethrough: bool,
    pub alignment: Alignment,
    pub vertical_alignment: VerticalAlignment,
    pub text_overflow: TextOverflow,
    pub font_family: Option<String>,  // None = inherit from settings
    pub font_size: Option<f32>,
    pub font_color: Option<String>,
    pub background_color: Option<String>,
    #[serde(skip_serializing_if = "Borders::is_empty")]
    pub borders: Borders,
    /// Number format pattern, e.g. "0.00%" or "yyyy-mm-dd"
    pub number_format: Option<String>,
    pub locked: bool,
    pub hidden: bool,
    pub watermark: Option<String>,
}

impl CellFormat {
    pub fn is_default(&self) -> bool {
        *self == CellFormat::default()
    }
}

/// Stored cell content. Formulas are kept as source text; this engine does not evaluate them.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum CellValue {
    #[default]
    Empty,
    Text(String),
    Number(f64),
    Formula(String),
    /// Anchor of an array formula covering `rows` x `cols` cells.
    ArrayFormula { source: String, rows: usize, cols: usize },
}

impl CellValue {
    pub fn from_input(input: &str) -> Self {
        let trimmed = input.trim();

        if trimmed.is_empty() {
            return CellValue::Empty;
        }

        if trimmed.starts_with('=') {
            return CellValue::Formula(trimmed.to_string());
        }

        if let Ok(num) = trimmed.parse::<f64>() {
            if num.is_finite() {
                return CellValue::Number(num);
            }
        }

        CellValue::Text(trimmed.to_string())
    }

    pub fn raw_display(&self) -> String {
        match self {
            CellValue::Empty => String::new(),
            CellValue::Text(s) => s.clone(),
            CellValue::Number(n) => {
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    format!("{}", *n as i64)
                } else {
                    format!("{}", n)
                }
            }
            CellValue::Formula(source) => source.clone(),
            CellValue::ArrayFormula { source, .. } => format!("{{{}}}", source),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, CellValue::Empty)
    }

    pub fn formula_source(&self) -> Option<&str> {
        match self {
            CellValue::Formula(source) => Some(source),
            CellValue::ArrayFormula { source, .. } => Some(source),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Cell {
    pub value: CellValue,
    pub format: CellFormat,
    /// If this cell is covered by an array formula, points to the anchor cell (row, col)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub array_parent: Option<(usize, usize)>,
}

impl Cell {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, input: &str) {
        self.value = CellValue::from_input(input);
        self.array_parent = None;
    }

    /// True when the cell carries neither content nor formatting and can be dropped from storage.
    pub fn is_blank(&self) -> bool {
        self.value.is_empty() && self.format.is_default() && self.array_parent.is_none()
    }

    pub fn is_array_member(&self) -> bool {
        self.array_parent.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_input_detects_kinds() {
        assert_eq!(CellValue::from_input(""), CellValue::Empty);
        assert_eq!(CellValue::from_input("  "), CellValue::Empty);
        assert_eq!(CellValue::from_input("42"), CellValue::Number(42.0));
        assert_eq!(CellValue::from_input("=A1+1"), CellValue::Formula("=A1+1".into()));
        assert_eq!(CellValue::from_input("hello"), CellValue::Text("hello".into()));
    }

    #[test]
    fn test_non_finite_numbers_stay_text() {
        assert_eq!(CellValue::from_input("NaN"), CellValue::Text("NaN".into()));
        assert_eq!(CellValue::from_input("inf"), CellValue::Text("inf".into()));
    }

    #[test]
    fn test_raw_display() {
        assert_eq!(CellValue::Number(3.0).raw_display(), "3");
        assert_eq!(CellValue::Number(2.5).raw_display(), "2.5");
        let array = CellValue::ArrayFormula { source: "=A1:B2*2".into(), rows: 2, cols: 2 };
        assert_eq!(array.raw_display(), "{=A1:B2*2}");
    }

    #[test]
    fn test_cell_format_defaults() {
        let format = CellFormat::default();
        assert!(!format.bold);
        assert!(!format.locked);
        assert_eq!(format.alignment, Alignment::Left);
        assert_eq!(format.vertical_alignment, VerticalAlignment::Middle);
        assert_eq!(format.text_overflow, TextOverflow::Clip);
        assert!(format.borders.is_empty());
        assert!(format.is_default());
    }

    #[test]
    fn test_blank_cell() {
        let mut cell = Cell::new();
        assert!(cell.is_blank());
        cell.format.italic = true;
        assert!(!cell.is_blank());
    }

    #[test]
    fn test_cell_value_json_shape() {
        let json = serde_json::to_value(CellValue::Text("X".into())).unwrap();
        assert_eq!(json, serde_json::json!({"kind": "text", "data": "X"}));
        let back: CellValue = serde_json::from_value(json).unwrap();
        assert_eq!(back, CellValue::Text("X".into()));
    }
}
