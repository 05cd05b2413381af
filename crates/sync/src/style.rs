//! Style sub-engine.
//!
//! Compiles a sparse `StyleCommand` into a list of concrete format
//! operations. Only fields present in the command produce operations, so
//! absent attributes are never reset. Every operation assigns a value rather
//! than toggling one, which makes re-application idempotent.

use sheetpilot_engine::cell::{
    Alignment, Border, BorderLineStyle, CellFormat, TextOverflow, VerticalAlignment,
};
use sheetpilot_engine::sheet::Sheet;
use sheetpilot_protocol::{
    BorderInfo, HorizontalAlign, StyleCommand, StyleMethod, StyleProperties, VerticalAlign,
};

use crate::range::CellRange;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    Top,
    Right,
    Bottom,
    Left,
}

impl Edge {
    pub const ALL: [Edge; 4] = [Edge::Top, Edge::Right, Edge::Bottom, Edge::Left];
}

/// One styling primitive.
#[derive(Debug, Clone, PartialEq)]
pub enum StyleOp {
    BackgroundColor(String),
    FontColor(String),
    FontFamily(String),
    FontSize(f32),
    Bold(bool),
    Italic(bool),
    Underline(bool),
    Strikethrough(bool),
    HorizontalAlign(Alignment),
    VerticalAlign(VerticalAlignment),
    Overflow(TextOverflow),
    Border(Edge, Border),
    Locked(bool),
    Hidden(bool),
    NumberFormat(String),
    Watermark(String),
}

impl StyleOp {
    pub fn apply(&self, format: &mut CellFormat) {
        match self {
            StyleOp::BackgroundColor(c) => format.background_color = Some(c.clone()),
            StyleOp::FontColor(c) => format.font_color = Some(c.clone()),
            StyleOp::FontFamily(f) => format.font_family = Some(f.clone()),
            StyleOp::FontSize(s) => format.font_size = Some(*s),
            StyleOp::Bold(v) => format.bold = *v,
            StyleOp::Italic(v) => format.italic = *v,
            StyleOp::Underline(v) => format.underline = *v,
            StyleOp::Strikethrough(v) => format.strikethrough = *v,
            StyleOp::HorizontalAlign(a) => format.alignment = *a,
            StyleOp::VerticalAlign(a) => format.vertical_alignment = *a,
            StyleOp::Overflow(o) => format.text_overflow = *o,
            StyleOp::Border(edge, border) => {
                let slot = match edge {
                    Edge::Top => &mut format.borders.top,
                    Edge::Right => &mut format.borders.right,
                    Edge::Bottom => &mut format.borders.bottom,
                    Edge::Left => &mut format.borders.left,
                };
                *slot = match border.style {
                    BorderLineStyle::None => None,
                    _ => Some(border.clone()),
                };
            }
            StyleOp::Locked(v) => format.locked = *v,
            StyleOp::Hidden(v) => format.hidden = *v,
            StyleOp::NumberFormat(p) => format.number_format = Some(p.clone()),
            StyleOp::Watermark(w) => format.watermark = Some(w.clone()),
        }
    }
}

/// Compiled style command, ready to run against a range.
#[derive(Debug, Clone, PartialEq)]
pub struct StylePlan {
    method: StyleMethod,
    ops: Vec<StyleOp>,
}

impl StylePlan {
    pub fn compile(cmd: &StyleCommand) -> Self {
        Self { method: cmd.method, ops: compile_ops(&cmd.properties) }
    }

    pub fn ops(&self) -> &[StyleOp] {
        &self.ops
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Apply every operation to one format.
    pub fn apply_to(&self, format: &mut CellFormat) {
        for op in &self.ops {
            op.apply(format);
        }
    }

    /// Apply to every cell of `range` inside one paint suspension.
    ///
    /// `style_object` merges the whole patch in one write per cell;
    /// `direct_method` issues one write per primitive per cell. Both end in
    /// the same format.
    pub fn run(&self, sheet: &mut Sheet, range: &CellRange) {
        if self.ops.is_empty() {
            return;
        }
        sheet.batch(|sheet| match self.method {
            StyleMethod::StyleObject => {
                for (row, col) in range.cells() {
                    sheet.update_format(row, col, |f| self.apply_to(f));
                }
            }
            StyleMethod::DirectMethod => {
                for op in &self.ops {
                    for (row, col) in range.cells() {
                        sheet.update_format(row, col, |f| op.apply(f));
                    }
                }
            }
        });
    }
}

/// Bind a style command to a range, returning the deferred application.
pub fn style_applier(range: CellRange, cmd: &StyleCommand) -> impl Fn(&mut Sheet) {
    let plan = StylePlan::compile(cmd);
    move |sheet: &mut Sheet| plan.run(sheet, &range)
}

fn compile_ops(p: &StyleProperties) -> Vec<StyleOp> {
    let mut ops = Vec::new();

    if let Some(c) = &p.background_color {
        ops.push(StyleOp::BackgroundColor(c.clone()));
    }
    if let Some(c) = &p.font_color {
        ops.push(StyleOp::FontColor(c.clone()));
    }
    if let Some(f) = &p.font_family {
        ops.push(StyleOp::FontFamily(f.clone()));
    }
    if let Some(s) = p.font_size.filter(|s| s.is_finite() && *s > 0.0) {
        ops.push(StyleOp::FontSize(s));
    }
    if let Some(v) = p.bold {
        ops.push(StyleOp::Bold(v));
    }
    if let Some(v) = p.italic {
        ops.push(StyleOp::Italic(v));
    }

    // textDecoration first so explicit underline/strikethrough flags win.
    if let Some(deco) = &p.text_decoration {
        let deco = deco.to_ascii_lowercase();
        ops.push(StyleOp::Underline(deco.contains("underline")));
        ops.push(StyleOp::Strikethrough(deco.contains("line-through")));
    }
    if let Some(v) = p.underline {
        ops.push(StyleOp::Underline(v));
    }
    if let Some(v) = p.strikethrough {
        ops.push(StyleOp::Strikethrough(v));
    }

    if let Some(a) = p.horizontal_alignment {
        ops.push(StyleOp::HorizontalAlign(match a {
            HorizontalAlign::Left => Alignment::Left,
            HorizontalAlign::Center => Alignment::Center,
            HorizontalAlign::Right => Alignment::Right,
        }));
    }
    if let Some(a) = p.vertical_alignment {
        ops.push(StyleOp::VerticalAlign(match a {
            VerticalAlign::Top => VerticalAlignment::Top,
            VerticalAlign::Middle => VerticalAlignment::Middle,
            VerticalAlign::Bottom => VerticalAlignment::Bottom,
        }));
    }
    if let Some(wrap) = p.wrap_text {
        ops.push(StyleOp::Overflow(if wrap { TextOverflow::Wrap } else { TextOverflow::Clip }));
    }

    // `border` covers all edges; per-edge fields override it.
    let edges = [
        (Edge::Top, &p.border_top),
        (Edge::Right, &p.border_right),
        (Edge::Bottom, &p.border_bottom),
        (Edge::Left, &p.border_left),
    ];
    for (edge, specific) in edges {
        if let Some(info) = specific.as_ref().or(p.border.as_ref()) {
            ops.push(StyleOp::Border(edge, to_border(info)));
        }
    }

    if let Some(v) = p.locked {
        ops.push(StyleOp::Locked(v));
    }
    if let Some(v) = p.hidden {
        ops.push(StyleOp::Hidden(v));
    }
    if let Some(f) = &p.formatter {
        ops.push(StyleOp::NumberFormat(f.clone()));
    }
    if let Some(w) = &p.watermark {
        ops.push(StyleOp::Watermark(w.clone()));
    }

    ops
}

fn to_border(info: &BorderInfo) -> Border {
    Border {
        color: info.color.clone(),
        style: info.style.as_deref().map(line_style).unwrap_or_default(),
    }
}

/// Unknown style names fall back to thin.
fn line_style(name: &str) -> BorderLineStyle {
    match name.trim().to_ascii_lowercase().as_str() {
        "medium" => BorderLineStyle::Medium,
        "thick" => BorderLineStyle::Thick,
        "dashed" => BorderLineStyle::Dashed,
        "dotted" => BorderLineStyle::Dotted,
        "double" => BorderLineStyle::Double,
        "none" => BorderLineStyle::None,
        _ => BorderLineStyle::Thin,
    }
}
