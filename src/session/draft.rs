//! In-progress style/label edits, decoupled from the committed entity so a
//! cancel leaves the entity untouched.

use super::MeasureSession;
use crate::geometry::Color;
use crate::measure::{
    LabelPlacement, Measurement, MeasurementId, MeasurementPatch, PointStyle, TextPosition,
};

/// A full shadow copy of the editable fields of one entity. At most one
/// draft exists at a time, system-wide.
#[derive(Debug, Clone, PartialEq)]
pub struct EditDraft {
    editing_id: MeasurementId,
    pub actual_value: String,
    pub label: String,
    pub color: Color,
    pub point_style: PointStyle,
    pub text_position: TextPosition,
    pub line_width: f64,
    pub font_size: f64,
    pub pointer_width: f64,
}

impl EditDraft {
    fn from_measurement(entity: &Measurement) -> Self {
        let text_position = match entity.style.placement {
            LabelPlacement::Directional(position) => position,
            // An explicit offset keeps precedence; the directional choice
            // shown in the editor is only a fallback preference.
            LabelPlacement::Explicit { .. } => TextPosition::Top,
        };
        Self {
            editing_id: entity.id,
            actual_value: entity.actual_value.clone().unwrap_or_default(),
            label: entity.label.clone().unwrap_or_default(),
            color: entity.style.color,
            point_style: entity.style.point_style,
            text_position,
            line_width: entity.style.line_width,
            font_size: entity.style.font_size,
            pointer_width: entity.style.pointer_width,
        }
    }

    pub fn editing_id(&self) -> MeasurementId {
        self.editing_id
    }

    fn into_patch(self) -> MeasurementPatch {
        MeasurementPatch {
            actual_value: Some(self.actual_value),
            label: Some(self.label),
            color: Some(self.color),
            point_style: Some(self.point_style),
            text_position: Some(self.text_position),
            line_width: Some(self.line_width),
            font_size: Some(self.font_size),
            pointer_width: Some(self.pointer_width),
            ..MeasurementPatch::default()
        }
    }
}

impl MeasureSession {
    /// Starts editing `id`, taking a shadow copy of its editable fields.
    /// Any unsaved prior draft is discarded, last write wins.
    pub fn begin_edit(&mut self, id: MeasurementId) -> bool {
        let Some(entity) = self.collection.get(id) else {
            tracing::debug!(id = id.raw(), "begin_edit for missing measurement ignored");
            return false;
        };
        if let Some(prior) = &self.draft {
            if prior.editing_id != id {
                tracing::debug!(
                    prior = prior.editing_id.raw(),
                    next = id.raw(),
                    "discarding unsaved edit draft"
                );
            }
        }
        self.draft = Some(EditDraft::from_measurement(entity));
        true
    }

    pub fn editing_id(&self) -> Option<MeasurementId> {
        self.draft.as_ref().map(EditDraft::editing_id)
    }

    pub fn draft(&self) -> Option<&EditDraft> {
        self.draft.as_ref()
    }

    pub fn draft_mut(&mut self) -> Option<&mut EditDraft> {
        self.draft.as_mut()
    }

    /// Applies the draft to its entity and leaves edit mode. A draft whose
    /// entity was deleted in the meantime is dropped silently.
    pub fn commit_edit(&mut self) -> bool {
        match self.draft.take() {
            Some(draft) => {
                let id = draft.editing_id;
                self.collection.update(id, &draft.into_patch())
            }
            None => false,
        }
    }

    /// Leaves edit mode without touching the entity.
    pub fn cancel_edit(&mut self) {
        self.draft = None;
    }
}
