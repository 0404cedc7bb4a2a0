use super::{Measurement, MeasurementId, MeasurementPatch, MeasurementStyle};
use crate::geometry::ImagePoint;

/// Which end of a measurement a drag handle refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointHandle {
    Start,
    End,
}

/// Ordered collection of measurements. Insertion order is preserved and is
/// the paint order; ids are allocated monotonically and never reused.
#[derive(Debug, Clone, Default)]
pub struct MeasurementCollection {
    items: Vec<Measurement>,
    next_id: u64,
}

impl MeasurementCollection {
    pub fn new() -> Self {
        Self {
            items: Vec::new(),
            next_id: 1,
        }
    }

    fn allocate_id(&mut self) -> MeasurementId {
        let id = MeasurementId::new(self.next_id);
        self.next_id = self.next_id.saturating_add(1);
        id
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn as_slice(&self) -> &[Measurement] {
        &self.items
    }

    pub fn iter(&self) -> impl Iterator<Item = &Measurement> {
        self.items.iter()
    }

    pub fn get(&self, id: MeasurementId) -> Option<&Measurement> {
        self.items.iter().find(|m| m.id == id)
    }

    fn get_mut(&mut self, id: MeasurementId) -> Option<&mut Measurement> {
        self.items.iter_mut().find(|m| m.id == id)
    }

    /// Creates a measurement from a completed two-point gesture, computing
    /// `pixel_length` and assigning a fresh id.
    pub fn create(
        &mut self,
        start: ImagePoint,
        end: ImagePoint,
        style: MeasurementStyle,
    ) -> MeasurementId {
        let id = self.allocate_id();
        self.items.push(Measurement::new(id, start, end, style));
        id
    }

    /// Merges `patch` into the matching entity. A stale id is a logged
    /// no-op, not an error: the eventing shell may race with deletion.
    pub fn update(&mut self, id: MeasurementId, patch: &MeasurementPatch) -> bool {
        match self.get_mut(id) {
            Some(entity) => {
                patch.apply_to(entity);
                true
            }
            None => {
                tracing::debug!(id = id.raw(), "update for missing measurement ignored");
                false
            }
        }
    }

    /// Drags both endpoints by the same delta, preserving length and shape.
    pub fn translate(&mut self, id: MeasurementId, dx: f64, dy: f64) -> bool {
        match self.get_mut(id) {
            Some(entity) => {
                entity.start = entity.start.translated(dx, dy);
                entity.end = entity.end.translated(dx, dy);
                true
            }
            None => false,
        }
    }

    /// Moves a single endpoint and recomputes `pixel_length`.
    pub fn move_endpoint(&mut self, id: MeasurementId, handle: EndpointHandle, to: ImagePoint) -> bool {
        match self.get_mut(id) {
            Some(entity) => {
                match handle {
                    EndpointHandle::Start => entity.start = to,
                    EndpointHandle::End => entity.end = to,
                }
                entity.recompute_length();
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, id: MeasurementId) -> Option<Measurement> {
        let index = self.items.iter().position(|m| m.id == id)?;
        Some(self.items.remove(index))
    }

    /// Duplicates an entity with a fresh id and a visible offset on both
    /// axes. Returns `None` for a stale id.
    pub fn duplicate(&mut self, id: MeasurementId, offset: f64) -> Option<MeasurementId> {
        let source = self.get(id)?.clone();
        let new_id = self.allocate_id();
        let mut copy = source;
        copy.id = new_id;
        copy.start = copy.start.translated(offset, offset);
        copy.end = copy.end.translated(offset, offset);
        self.items.push(copy);
        Some(new_id)
    }

    /// Replaces the whole collection, e.g. when a stored set of measurements
    /// is loaded into the session. The id allocator advances past the
    /// maximum loaded id so later creations stay unique.
    pub fn replace(&mut self, items: Vec<Measurement>) {
        self.next_id = items
            .iter()
            .map(|m| m.id.raw())
            .max()
            .unwrap_or(0)
            .saturating_add(1)
            .max(self.next_id);
        self.items = items;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Color;
    use crate::measure::{LabelPlacement, PointStyle, TextPosition};

    fn collection() -> MeasurementCollection {
        MeasurementCollection::new()
    }

    fn line(c: &mut MeasurementCollection, x0: f64, y0: f64, x1: f64, y1: f64) -> MeasurementId {
        c.create(
            ImagePoint::new(x0, y0),
            ImagePoint::new(x1, y1),
            MeasurementStyle::default(),
        )
    }

    #[test]
    fn create_assigns_fresh_ids_and_preserves_insertion_order() {
        let mut c = collection();
        let a = line(&mut c, 0.0, 0.0, 10.0, 0.0);
        let b = line(&mut c, 0.0, 5.0, 10.0, 5.0);
        assert_ne!(a, b);
        let order: Vec<_> = c.iter().map(|m| m.id).collect();
        assert_eq!(order, vec![a, b]);
    }

    #[test]
    fn pixel_length_tracks_endpoint_updates() {
        let mut c = collection();
        let id = line(&mut c, 10.0, 10.0, 110.0, 10.0);
        assert_eq!(c.get(id).unwrap().pixel_length, 100.0);

        c.move_endpoint(id, EndpointHandle::End, ImagePoint::new(110.0, 60.0));
        let length = c.get(id).unwrap().pixel_length;
        assert!((length - 111.80339887498949).abs() < 1e-9);
    }

    #[test]
    fn update_with_stale_id_is_a_no_op() {
        let mut c = collection();
        let id = line(&mut c, 0.0, 0.0, 10.0, 0.0);
        c.remove(id);
        let patch = MeasurementPatch {
            color: Some(Color::new(1, 2, 3)),
            ..MeasurementPatch::default()
        };
        assert!(!c.update(id, &patch));
        assert!(c.is_empty());
    }

    #[test]
    fn translate_preserves_pixel_length() {
        let mut c = collection();
        let id = line(&mut c, 10.0, 10.0, 110.0, 10.0);
        c.translate(id, 7.0, -3.0);
        let m = c.get(id).unwrap();
        assert_eq!(m.start, ImagePoint::new(17.0, 7.0));
        assert_eq!(m.end, ImagePoint::new(117.0, 7.0));
        assert_eq!(m.pixel_length, 100.0);
    }

    #[test]
    fn duplicate_offsets_geometry_and_keeps_style_and_labels() {
        let mut c = collection();
        let id = line(&mut c, 10.0, 10.0, 110.0, 10.0);
        let patch = MeasurementPatch {
            actual_value: Some("15cm".to_string()),
            point_style: Some(PointStyle::Arrow),
            text_position: Some(TextPosition::Right),
            ..MeasurementPatch::default()
        };
        c.update(id, &patch);

        let copy_id = c.duplicate(id, 20.0).expect("source exists");
        assert_ne!(copy_id, id);
        let copy = c.get(copy_id).unwrap();
        assert_eq!(copy.start, ImagePoint::new(30.0, 30.0));
        assert_eq!(copy.end, ImagePoint::new(130.0, 30.0));
        assert_eq!(copy.pixel_length, 100.0);
        assert_eq!(copy.actual_value.as_deref(), Some("15cm"));
        assert_eq!(copy.style.point_style, PointStyle::Arrow);
        assert_eq!(
            copy.style.placement,
            LabelPlacement::Directional(TextPosition::Right)
        );
        assert_eq!(c.len(), 2);
    }

    #[test]
    fn duplicate_of_missing_entity_returns_none() {
        let mut c = collection();
        let id = line(&mut c, 0.0, 0.0, 10.0, 0.0);
        c.remove(id);
        assert_eq!(c.duplicate(id, 20.0), None);
    }

    #[test]
    fn replace_advances_the_id_allocator_past_loaded_ids() {
        let mut c = collection();
        let a = line(&mut c, 0.0, 0.0, 10.0, 0.0);
        let loaded = vec![
            Measurement::new(
                MeasurementId::new(40),
                ImagePoint::new(0.0, 0.0),
                ImagePoint::new(5.0, 0.0),
                MeasurementStyle::default(),
            ),
            Measurement::new(
                MeasurementId::new(41),
                ImagePoint::new(0.0, 1.0),
                ImagePoint::new(5.0, 1.0),
                MeasurementStyle::default(),
            ),
        ];
        c.replace(loaded);
        assert!(c.get(a).is_none());
        assert_eq!(c.len(), 2);

        let fresh = line(&mut c, 0.0, 2.0, 5.0, 2.0);
        assert!(fresh.raw() > 41);
    }
}
