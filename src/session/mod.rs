//! The interactive measurement session: one image, one ordered collection
//! of measurements, a selection, an active tool, and at most one edit draft.
//!
//! The session is an explicit context object; every mutation goes through
//! it, and the embedding shell re-renders the interactive canvas after each
//! one. Nothing here persists measurements: on save the whole collection is
//! copied out through an export snapshot.

mod draft;
mod gesture;

pub use draft::EditDraft;
pub use gesture::{
    GestureState, COPY_OFFSET_PX, ENDPOINT_GRAB_RADIUS_PX, HIT_TOLERANCE_PX, MIN_DRAG_DISTANCE_PX,
};

use crate::geometry::{ImagePoint, ImageSize};
use crate::measure::{
    Measurement, MeasurementCollection, MeasurementId, MeasurementPatch, MeasurementStyle,
};

/// The active tool. Ruler shares the line tool's creation behavior; it is
/// presentational only, with no unit-conversion step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolKind {
    Select,
    Line,
    Ruler,
    Move,
    Copy,
}

impl ToolKind {
    pub const fn creates_measurements(self) -> bool {
        matches!(self, Self::Line | Self::Ruler)
    }
}

/// Image lifecycle. The session is not interactive until the image's
/// natural dimensions are known, because image-space coordinates are
/// meaningless before that.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Loading,
    Ready,
    Failed,
}

#[derive(Debug)]
pub struct MeasureSession {
    image_name: String,
    image_reference: String,
    image_size: Option<ImageSize>,
    phase: SessionPhase,
    defaults: MeasurementStyle,
    collection: MeasurementCollection,
    selected: Option<MeasurementId>,
    active_tool: ToolKind,
    /// Interactive canvas scale: display pixels per image pixel.
    display_scale: f64,
    gesture: GestureState,
    draft: Option<EditDraft>,
}

impl MeasureSession {
    pub fn new(image_name: impl Into<String>, image_reference: impl Into<String>) -> Self {
        Self::with_defaults(image_name, image_reference, MeasurementStyle::default())
    }

    pub fn with_defaults(
        image_name: impl Into<String>,
        image_reference: impl Into<String>,
        defaults: MeasurementStyle,
    ) -> Self {
        Self {
            image_name: image_name.into(),
            image_reference: image_reference.into(),
            image_size: None,
            phase: SessionPhase::Loading,
            defaults,
            collection: MeasurementCollection::new(),
            selected: None,
            active_tool: ToolKind::Line,
            display_scale: 1.0,
            gesture: GestureState::Idle,
            draft: None,
        }
    }

    pub fn image_name(&self) -> &str {
        &self.image_name
    }

    pub fn image_reference(&self) -> &str {
        &self.image_reference
    }

    pub fn image_size(&self) -> Option<ImageSize> {
        self.image_size
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    /// Called once the image decode resolved and natural dimensions are
    /// known. Degenerate dimensions count as a load failure.
    pub fn image_ready(&mut self, size: ImageSize) {
        if size.is_empty() {
            tracing::warn!(?size, "image reported empty dimensions");
            self.phase = SessionPhase::Failed;
            return;
        }
        tracing::debug!(?size, "session ready");
        self.image_size = Some(size);
        self.phase = SessionPhase::Ready;
    }

    pub fn image_failed(&mut self) {
        tracing::warn!(reference = %self.image_reference, "image load failed");
        self.phase = SessionPhase::Failed;
    }

    pub fn is_interactive(&self) -> bool {
        self.phase == SessionPhase::Ready
    }

    /// Display/natural ratio of the interactive canvas. Pointer input is
    /// divided by this at event entry so everything downstream works in
    /// image space.
    pub fn set_display_scale(&mut self, scale: f64) {
        if scale.is_finite() && scale > 0.0 {
            self.display_scale = scale;
        }
    }

    pub fn display_scale(&self) -> f64 {
        self.display_scale
    }

    pub fn collection(&self) -> &MeasurementCollection {
        &self.collection
    }

    pub fn measurements(&self) -> &[Measurement] {
        self.collection.as_slice()
    }

    pub fn selected_id(&self) -> Option<MeasurementId> {
        self.selected
    }

    pub fn select(&mut self, id: Option<MeasurementId>) {
        self.selected = id.filter(|id| self.collection.get(*id).is_some());
    }

    pub fn active_tool(&self) -> ToolKind {
        self.active_tool
    }

    /// Switches tools. Any in-progress gesture is discarded so no partial
    /// entity is ever committed. `Move` needs something to move and is
    /// refused on an empty collection; `Copy` acts immediately on the
    /// selection and lands back in `Select`.
    pub fn set_tool(&mut self, tool: ToolKind) {
        self.gesture = GestureState::Idle;
        match tool {
            ToolKind::Move if self.collection.is_empty() => {
                tracing::debug!("move tool refused: no measurements");
            }
            ToolKind::Copy => {
                if let Some(id) = self.selected {
                    if let Some(copy_id) = self.collection.duplicate(id, COPY_OFFSET_PX) {
                        self.selected = Some(copy_id);
                    }
                }
                self.active_tool = ToolKind::Select;
            }
            tool => self.active_tool = tool,
        }
    }

    /// Adds a measurement with the session's default style (sidebar
    /// collaborator entry point; gesture creation goes through pointer
    /// events).
    pub fn add_measurement(&mut self, start: ImagePoint, end: ImagePoint) -> MeasurementId {
        self.collection.create(start, end, self.defaults)
    }

    pub fn update_measurement(&mut self, id: MeasurementId, patch: MeasurementPatch) -> bool {
        self.collection.update(id, &patch)
    }

    /// Deletes an entity; the selection is cleared when it pointed at the
    /// deleted entity and left alone otherwise. Stale ids are no-ops.
    pub fn delete_measurement(&mut self, id: MeasurementId) -> bool {
        let removed = self.collection.remove(id).is_some();
        if removed && self.selected == Some(id) {
            self.selected = None;
        }
        removed
    }

    /// Replaces the in-session collection with a pre-existing one (e.g.
    /// loaded from storage). An empty input leaves the session unchanged.
    pub fn load_existing(&mut self, measurements: Vec<Measurement>) {
        if measurements.is_empty() {
            return;
        }
        tracing::debug!(count = measurements.len(), "loading existing measurements");
        self.collection.replace(measurements);
        self.selected = None;
        self.draft = None;
        self.gesture = GestureState::Idle;
    }

    /// Session-wide default style applied to newly created measurements.
    pub fn defaults(&self) -> MeasurementStyle {
        self.defaults
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ready() -> MeasureSession {
        let mut session = MeasureSession::new("dress.jpg", "https://example.test/dress.jpg");
        session.image_ready(ImageSize::new(400, 300));
        session
    }

    #[test]
    fn session_starts_loading_with_the_line_tool() {
        let session = MeasureSession::new("a.png", "file:///a.png");
        assert_eq!(session.phase(), SessionPhase::Loading);
        assert_eq!(session.active_tool(), ToolKind::Line);
        assert!(!session.is_interactive());
    }

    #[test]
    fn empty_image_dimensions_fail_the_session() {
        let mut session = MeasureSession::new("a.png", "file:///a.png");
        session.image_ready(ImageSize::new(0, 100));
        assert_eq!(session.phase(), SessionPhase::Failed);
        assert!(!session.is_interactive());
    }

    #[test]
    fn deleting_the_selected_measurement_clears_the_selection() {
        let mut session = ready();
        let a = session.add_measurement(ImagePoint::new(0.0, 0.0), ImagePoint::new(50.0, 0.0));
        let b = session.add_measurement(ImagePoint::new(0.0, 10.0), ImagePoint::new(50.0, 10.0));

        session.select(Some(a));
        session.delete_measurement(b);
        assert_eq!(session.selected_id(), Some(a));

        session.delete_measurement(a);
        assert_eq!(session.selected_id(), None);
    }

    #[test]
    fn move_tool_is_refused_while_the_collection_is_empty() {
        let mut session = ready();
        session.set_tool(ToolKind::Move);
        assert_eq!(session.active_tool(), ToolKind::Line);

        session.add_measurement(ImagePoint::new(0.0, 0.0), ImagePoint::new(50.0, 0.0));
        session.set_tool(ToolKind::Move);
        assert_eq!(session.active_tool(), ToolKind::Move);
    }

    #[test]
    fn copy_duplicates_the_selection_and_lands_in_select() {
        let mut session = ready();
        let id = session.add_measurement(ImagePoint::new(10.0, 10.0), ImagePoint::new(60.0, 10.0));
        session.select(Some(id));

        session.set_tool(ToolKind::Copy);
        assert_eq!(session.active_tool(), ToolKind::Select);
        assert_eq!(session.collection().len(), 2);
        let copy_id = session.selected_id().expect("duplicate selected");
        assert_ne!(copy_id, id);
        let copy = session.collection().get(copy_id).unwrap();
        assert_eq!(copy.start, ImagePoint::new(10.0 + COPY_OFFSET_PX, 10.0 + COPY_OFFSET_PX));
    }

    #[test]
    fn copy_without_a_selection_only_switches_to_select() {
        let mut session = ready();
        session.add_measurement(ImagePoint::new(0.0, 0.0), ImagePoint::new(50.0, 0.0));
        session.set_tool(ToolKind::Copy);
        assert_eq!(session.active_tool(), ToolKind::Select);
        assert_eq!(session.collection().len(), 1);
    }

    #[test]
    fn load_existing_replaces_state_only_when_non_empty() {
        let mut session = ready();
        let id = session.add_measurement(ImagePoint::new(0.0, 0.0), ImagePoint::new(50.0, 0.0));
        session.select(Some(id));

        session.load_existing(Vec::new());
        assert_eq!(session.collection().len(), 1);
        assert_eq!(session.selected_id(), Some(id));

        let stored: Vec<Measurement> =
            serde_json::from_str(include_existing_json()).expect("stored collection parses");
        session.load_existing(stored);
        assert_eq!(session.collection().len(), 2);
        assert_eq!(session.selected_id(), None);
    }

    #[test]
    fn selecting_a_stale_id_clears_instead() {
        let mut session = ready();
        let id = session.add_measurement(ImagePoint::new(0.0, 0.0), ImagePoint::new(50.0, 0.0));
        session.delete_measurement(id);
        session.select(Some(id));
        assert_eq!(session.selected_id(), None);
    }

    fn include_existing_json() -> &'static str {
        r##"[
            {
                "id": 3,
                "start_x": 10.0, "start_y": 20.0, "end_x": 90.0, "end_y": 20.0,
                "pixel_length": 80.0,
                "actual_value": "30cm",
                "color": "#0044ff",
                "point_style": "arrow",
                "text_position": "top",
                "line_width": 2.0, "font_size": 14.0, "pointer_width": 5.0
            },
            {
                "id": 4,
                "start_x": 10.0, "start_y": 40.0, "end_x": 90.0, "end_y": 80.0,
                "pixel_length": 89.4,
                "color": "#000000",
                "point_style": "round",
                "text_position": "bottom",
                "line_width": 2.0, "font_size": 14.0, "pointer_width": 5.0
            }
        ]"##
    }
}
