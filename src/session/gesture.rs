//! Pointer gesture handling. Events arrive in display coordinates and are
//! converted to image space at entry; everything downstream of the three
//! handlers works in image pixels.

use super::{MeasureSession, ToolKind};
use crate::geometry::{distance_to_segment, ImagePoint};
use crate::measure::{EndpointHandle, MeasurementId};

/// Hit tolerance around a measurement's segment, in display pixels.
pub const HIT_TOLERANCE_PX: f64 = 10.0;

/// Grab radius around an endpoint handle, in display pixels.
pub const ENDPOINT_GRAB_RADIUS_PX: f64 = 10.0;

/// Drags shorter than this (display pixels) are accidental clicks and
/// create nothing.
pub const MIN_DRAG_DISTANCE_PX: f64 = 5.0;

/// Offset applied to both axes of a duplicated measurement, in image pixels.
pub const COPY_OFFSET_PX: f64 = 20.0;

/// One pointer gesture at a time; a new press always replaces whatever was
/// in flight.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GestureState {
    Idle,
    Drawing {
        start: ImagePoint,
        current: ImagePoint,
    },
    DraggingBody {
        id: MeasurementId,
        last: ImagePoint,
    },
    DraggingEndpoint {
        id: MeasurementId,
        handle: EndpointHandle,
    },
}

impl MeasureSession {
    fn to_image(&self, x: f64, y: f64) -> ImagePoint {
        ImagePoint::new(x / self.display_scale, y / self.display_scale)
    }

    pub fn gesture(&self) -> GestureState {
        self.gesture
    }

    /// The in-flight segment of a drawing gesture, for rubber-band preview.
    pub fn gesture_preview(&self) -> Option<(ImagePoint, ImagePoint)> {
        match self.gesture {
            GestureState::Drawing { start, current } => Some((start, current)),
            _ => None,
        }
    }

    pub fn pointer_down(&mut self, x: f64, y: f64) {
        if !self.is_interactive() {
            return;
        }
        let point = self.to_image(x, y);
        match self.active_tool {
            ToolKind::Line | ToolKind::Ruler => {
                self.gesture = GestureState::Drawing {
                    start: point,
                    current: point,
                };
            }
            ToolKind::Select => {
                self.selected = self.hit_test(point);
            }
            ToolKind::Move => {
                if let Some((id, handle)) = self.grab_endpoint(point) {
                    self.gesture = GestureState::DraggingEndpoint { id, handle };
                } else if let Some(id) = self.hit_test(point) {
                    self.selected = Some(id);
                    self.gesture = GestureState::DraggingBody { id, last: point };
                }
            }
            // Copy acts at tool switch and never stays active.
            ToolKind::Copy => {}
        }
    }

    pub fn pointer_move(&mut self, x: f64, y: f64) {
        if !self.is_interactive() {
            return;
        }
        let point = self.to_image(x, y);
        match self.gesture {
            GestureState::Drawing { start, .. } => {
                self.gesture = GestureState::Drawing {
                    start,
                    current: point,
                };
            }
            GestureState::DraggingBody { id, last } => {
                self.collection
                    .translate(id, point.x - last.x, point.y - last.y);
                self.gesture = GestureState::DraggingBody { id, last: point };
            }
            GestureState::DraggingEndpoint { id, handle } => {
                self.collection.move_endpoint(id, handle, point);
            }
            GestureState::Idle => {}
        }
    }

    pub fn pointer_up(&mut self, x: f64, y: f64) {
        if !self.is_interactive() {
            return;
        }
        let point = self.to_image(x, y);
        let gesture = std::mem::replace(&mut self.gesture, GestureState::Idle);
        match gesture {
            GestureState::Drawing { start, .. } => {
                let min_drag = MIN_DRAG_DISTANCE_PX / self.display_scale;
                if start.distance_to(point) < min_drag {
                    tracing::debug!("drag below threshold, nothing created");
                    return;
                }
                let id = self.collection.create(start, point, self.defaults);
                self.selected = Some(id);
            }
            GestureState::DraggingEndpoint { id, handle } => {
                self.collection.move_endpoint(id, handle, point);
            }
            GestureState::DraggingBody { .. } | GestureState::Idle => {}
        }
    }

    /// Topmost measurement within the hit tolerance of `point`. Later
    /// entities paint on top, so on a tie the later one wins.
    pub fn hit_test(&self, point: ImagePoint) -> Option<MeasurementId> {
        let tolerance = HIT_TOLERANCE_PX / self.display_scale;
        let mut best: Option<(MeasurementId, f64)> = None;
        for m in self.collection.iter() {
            let d = distance_to_segment(point, m.start, m.end);
            if d > tolerance {
                continue;
            }
            match best {
                Some((_, best_d)) if d > best_d => {}
                _ => best = Some((m.id, d)),
            }
        }
        best.map(|(id, _)| id)
    }

    /// Endpoint handle of the selected measurement within grab range, if
    /// any. Only the Move tool reaches here; only the selection exposes
    /// handles.
    fn grab_endpoint(&self, point: ImagePoint) -> Option<(MeasurementId, EndpointHandle)> {
        let id = self.selected?;
        let entity = self.collection.get(id)?;
        let radius = ENDPOINT_GRAB_RADIUS_PX / self.display_scale;
        if point.distance_to(entity.start) <= radius {
            Some((id, EndpointHandle::Start))
        } else if point.distance_to(entity.end) <= radius {
            Some((id, EndpointHandle::End))
        } else {
            None
        }
    }
}
