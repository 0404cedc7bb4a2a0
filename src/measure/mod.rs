//! The measurement annotation model: one entity per drawn line, with
//! derived geometry and display style.

mod collection;

pub use collection::{EndpointHandle, MeasurementCollection};

use crate::geometry::{Color, ImagePoint};
use serde::{Deserialize, Serialize};

/// Opaque entity id. Assigned by the collection at creation, stable for the
/// entity's lifetime, never reused within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MeasurementId(u64);

impl MeasurementId {
    pub(crate) const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u64 {
        self.0
    }
}

/// Endpoint marker rendering variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PointStyle {
    Round,
    Arrow,
    Square,
    Diamond,
}

/// Directional default offset of the label from the line midpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextPosition {
    Top,
    Bottom,
    Left,
    Right,
}

/// Where the label anchors relative to the segment midpoint.
///
/// Exactly one variant is effective at render time. An explicit offset, once
/// set, takes precedence permanently for the entity; editing the directional
/// preference afterwards does not dislodge it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LabelPlacement {
    Directional(TextPosition),
    Explicit { dx: f64, dy: f64 },
}

impl LabelPlacement {
    pub const fn is_explicit(self) -> bool {
        matches!(self, Self::Explicit { .. })
    }
}

/// Style fields shared by creation defaults and per-entity overrides.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeasurementStyle {
    pub color: Color,
    pub point_style: PointStyle,
    pub placement: LabelPlacement,
    pub line_width: f64,
    pub font_size: f64,
    pub pointer_width: f64,
}

impl Default for MeasurementStyle {
    fn default() -> Self {
        Self {
            color: Color::BLACK,
            point_style: PointStyle::Round,
            placement: LabelPlacement::Directional(TextPosition::Top),
            line_width: 2.0,
            font_size: 14.0,
            pointer_width: 5.0,
        }
    }
}

/// One user-drawn line annotation in image space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "MeasurementWire", into = "MeasurementWire")]
pub struct Measurement {
    pub id: MeasurementId,
    pub start: ImagePoint,
    pub end: ImagePoint,
    /// Euclidean distance between the endpoints in image-space units.
    /// Recomputed whenever either endpoint changes, never stored stale.
    pub pixel_length: f64,
    pub actual_value: Option<String>,
    pub label: Option<String>,
    pub style: MeasurementStyle,
}

impl Measurement {
    pub(crate) fn new(
        id: MeasurementId,
        start: ImagePoint,
        end: ImagePoint,
        style: MeasurementStyle,
    ) -> Self {
        Self {
            id,
            start,
            end,
            pixel_length: start.distance_to(end),
            actual_value: None,
            label: None,
            style,
        }
    }

    pub fn midpoint(&self) -> ImagePoint {
        self.start.midpoint(self.end)
    }

    pub(crate) fn recompute_length(&mut self) {
        self.pixel_length = self.start.distance_to(self.end);
    }

    /// The displayed label text: `actual_value` when present, else the pixel
    /// length formatted to one decimal, with the free-text label appended.
    pub fn label_text(&self) -> String {
        let value = match self.actual_value.as_deref() {
            Some(value) if !value.is_empty() => value.to_string(),
            _ => format!("{:.1}px", self.pixel_length),
        };
        match self.label.as_deref() {
            Some(label) if !label.is_empty() => format!("{value} - {label}"),
            _ => value,
        }
    }
}

/// Partial update applied to a single entity. Unset fields leave the entity
/// untouched; endpoint changes recompute `pixel_length`.
///
/// Empty strings for `actual_value`/`label` clear the field, matching the
/// free-text inputs of the sidebar collaborator.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeasurementPatch {
    pub start: Option<ImagePoint>,
    pub end: Option<ImagePoint>,
    pub actual_value: Option<String>,
    pub label: Option<String>,
    pub color: Option<Color>,
    pub point_style: Option<PointStyle>,
    pub text_position: Option<TextPosition>,
    pub explicit_offset: Option<(f64, f64)>,
    pub line_width: Option<f64>,
    pub font_size: Option<f64>,
    pub pointer_width: Option<f64>,
}

impl MeasurementPatch {
    pub(crate) fn apply_to(&self, entity: &mut Measurement) {
        let mut endpoints_changed = false;
        if let Some(start) = self.start {
            entity.start = start;
            endpoints_changed = true;
        }
        if let Some(end) = self.end {
            entity.end = end;
            endpoints_changed = true;
        }
        if endpoints_changed {
            entity.recompute_length();
        }

        if let Some(value) = &self.actual_value {
            entity.actual_value = normalize_text(value);
        }
        if let Some(label) = &self.label {
            entity.label = normalize_text(label);
        }
        if let Some(color) = self.color {
            entity.style.color = color;
        }
        if let Some(point_style) = self.point_style {
            entity.style.point_style = point_style;
        }
        if let Some((dx, dy)) = self.explicit_offset {
            entity.style.placement = LabelPlacement::Explicit { dx, dy };
        } else if let Some(position) = self.text_position {
            // Explicit offsets keep precedence once set.
            if !entity.style.placement.is_explicit() {
                entity.style.placement = LabelPlacement::Directional(position);
            }
        }
        if let Some(line_width) = self.line_width {
            entity.style.line_width = line_width.max(0.1);
        }
        if let Some(font_size) = self.font_size {
            entity.style.font_size = font_size.max(1.0);
        }
        if let Some(pointer_width) = self.pointer_width {
            entity.style.pointer_width = pointer_width.max(0.5);
        }
    }
}

fn normalize_text(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Flat wire form matching the stored representation of earlier versions of
/// the tool (`start_x`/`start_y` floats, hex color, optional text offsets).
#[derive(Debug, Clone, Serialize, Deserialize)]
struct MeasurementWire {
    id: MeasurementId,
    start_x: f64,
    start_y: f64,
    end_x: f64,
    end_y: f64,
    pixel_length: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    actual_value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    label: Option<String>,
    color: Color,
    point_style: PointStyle,
    text_position: TextPosition,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text_offset_x: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text_offset_y: Option<f64>,
    line_width: f64,
    font_size: f64,
    pointer_width: f64,
}

impl From<MeasurementWire> for Measurement {
    fn from(wire: MeasurementWire) -> Self {
        let placement = match (wire.text_offset_x, wire.text_offset_y) {
            (Some(dx), Some(dy)) => LabelPlacement::Explicit { dx, dy },
            _ => LabelPlacement::Directional(wire.text_position),
        };
        let start = ImagePoint::new(wire.start_x, wire.start_y);
        let end = ImagePoint::new(wire.end_x, wire.end_y);
        Self {
            id: wire.id,
            start,
            end,
            // Derived, so never trusted from the wire.
            pixel_length: start.distance_to(end),
            actual_value: wire.actual_value,
            label: wire.label,
            style: MeasurementStyle {
                color: wire.color,
                point_style: wire.point_style,
                placement,
                line_width: wire.line_width,
                font_size: wire.font_size,
                pointer_width: wire.pointer_width,
            },
        }
    }
}

impl From<Measurement> for MeasurementWire {
    fn from(entity: Measurement) -> Self {
        let (text_position, text_offset_x, text_offset_y) = match entity.style.placement {
            LabelPlacement::Directional(position) => (position, None, None),
            LabelPlacement::Explicit { dx, dy } => (TextPosition::Top, Some(dx), Some(dy)),
        };
        Self {
            id: entity.id,
            start_x: entity.start.x,
            start_y: entity.start.y,
            end_x: entity.end.x,
            end_y: entity.end.y,
            pixel_length: entity.pixel_length,
            actual_value: entity.actual_value,
            label: entity.label,
            color: entity.style.color,
            point_style: entity.style.point_style,
            text_position,
            text_offset_x,
            text_offset_y,
            line_width: entity.style.line_width,
            font_size: entity.style.font_size,
            pointer_width: entity.style.pointer_width,
        }
    }
}
