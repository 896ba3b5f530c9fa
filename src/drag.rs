//! Dragging the crop selection around the canvas

use crate::crop::{CropRegion, Size};

#[derive(Copy, Clone, Debug, PartialEq, Default)]
pub enum DragState {
    #[default]
    Idle,
    Dragging {
        /// Pointer position when the drag started
        pointer: (f64, f64),
        /// Region's top-left corner when the drag started
        origin: (f64, f64),
    },
}

/// The crop selection as a fixed-size handle that can be moved, but never leaves the canvas.
///
/// Every position it reports satisfies `0 ≤ x ≤ bounds.width − width` (same for y).
/// If the region is larger than the canvas the only valid position on that axis is 0.
#[derive(Clone, Debug)]
pub struct CropHandle {
    region: CropRegion,
    bounds: Size,
    state: DragState,
}

impl CropHandle {
    #[must_use]
    pub fn new(region: CropRegion, bounds: Size) -> Self {
        let mut handle = Self { region, bounds, state: DragState::Idle };
        handle.clamp();
        handle
    }

    #[inline]
    #[must_use]
    pub fn region(&self) -> CropRegion {
        self.region
    }

    #[inline]
    #[must_use]
    pub fn state(&self) -> DragState {
        self.state
    }

    #[inline]
    #[must_use]
    pub fn is_dragging(&self) -> bool {
        matches!(self.state, DragState::Dragging { .. })
    }

    /// Starts a drag if the pointer is over the handle. Returns whether it did.
    pub fn pointer_down(&mut self, x: f64, y: f64) -> bool {
        if !self.region.contains(x, y) {
            return false;
        }
        self.state = DragState::Dragging {
            pointer: (x, y),
            origin: (self.region.x, self.region.y),
        };
        true
    }

    /// Returns `true` if the region moved
    pub fn pointer_move(&mut self, x: f64, y: f64) -> bool {
        let DragState::Dragging { pointer, origin } = self.state else {
            return false;
        };
        let new_x = Self::clamp_axis(origin.0 + (x - pointer.0), self.bounds.width, self.region.width);
        let new_y = Self::clamp_axis(origin.1 + (y - pointer.1), self.bounds.height, self.region.height);
        if new_x == self.region.x && new_y == self.region.y {
            return false;
        }
        self.region.x = new_x;
        self.region.y = new_y;
        true
    }

    /// Ends the drag wherever the pointer is
    pub fn pointer_up(&mut self) {
        self.state = DragState::Idle;
    }

    /// The canvas is now shown at a different size
    pub fn set_bounds(&mut self, bounds: Size) {
        self.bounds = bounds;
        self.clamp();
    }

    pub fn resize(&mut self, width: f64, height: f64) {
        self.region.width = width.max(0.);
        self.region.height = height.max(0.);
        self.clamp();
    }

    fn clamp(&mut self) {
        self.region.x = Self::clamp_axis(self.region.x, self.bounds.width, self.region.width);
        self.region.y = Self::clamp_axis(self.region.y, self.bounds.height, self.region.height);
    }

    #[inline]
    fn clamp_axis(pos: f64, canvas: f64, size: f64) -> f64 {
        let max = (canvas - size).max(0.);
        if pos.is_nan() {
            return 0.;
        }
        pos.clamp(0., max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle() -> CropHandle {
        CropHandle::new(CropRegion::new(10., 10., 50., 50.), Size::new(200., 100.))
    }

    #[test]
    fn drag_moves_by_pointer_delta() {
        let mut h = handle();
        assert!(h.pointer_down(20., 30.));
        assert!(h.is_dragging());
        assert!(h.pointer_move(35., 25.));
        assert_eq!((h.region().x, h.region().y), (25., 5.));
        h.pointer_up();
        assert!(!h.is_dragging());
        assert!(!h.pointer_move(100., 100.));
        assert_eq!((h.region().x, h.region().y), (25., 5.));
    }

    #[test]
    fn pointer_down_outside_is_ignored() {
        let mut h = handle();
        assert!(!h.pointer_down(5., 5.));
        assert_eq!(h.state(), DragState::Idle);
    }

    #[test]
    fn never_leaves_canvas() {
        let mut h = handle();
        assert!(h.pointer_down(30., 30.));
        for &(x, y) in &[(-500., -500.), (1000., 1000.), (30., 1000.), (-3., 31.), (170., 69.), (181., 81.)] {
            h.pointer_move(x, y);
            let r = h.region();
            assert!(r.x >= 0. && r.x <= 150., "{x},{y} -> {r:?}");
            assert!(r.y >= 0. && r.y <= 50., "{x},{y} -> {r:?}");
        }
        h.pointer_move(1000., 1000.);
        assert_eq!((h.region().x, h.region().y), (150., 50.));
    }

    #[test]
    fn shrinking_canvas_reclamps() {
        let mut h = handle();
        h.pointer_down(20., 20.);
        h.pointer_move(200., 200.);
        h.set_bounds(Size::new(80., 40.));
        assert_eq!((h.region().x, h.region().y), (30., 0.));
        h.resize(100., 10.);
        assert_eq!((h.region().x, h.region().y), (0., 0.));
    }
}
