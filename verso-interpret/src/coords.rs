//! Conversion between user space and device space.
//!
//! Content streams address the page from the bottom-left corner with the
//! y-axis pointing up; the emitted output uses the top-left corner with
//! the y-axis pointing down. The page may additionally be rotated in
//! quadrant steps and cropped to a box that does not start at the origin.

use kurbo::{Affine, Point, Rect};

/// The geometry of the page being interpreted.
#[derive(Debug, Clone, Copy)]
pub struct PageGeometry {
    /// The media box in user space.
    pub media_box: Rect,
    /// The crop box in user space. Output is produced relative to this
    /// box; it defaults to the media box.
    pub crop_box: Rect,
    /// Page rotation in degrees, normalized to 0, 90, 180 or 270.
    pub rotation: u16,
}

impl PageGeometry {
    /// Create a new page geometry.
    pub fn new(media_box: Rect, crop_box: Option<Rect>, rotation: i32) -> Self {
        Self {
            media_box,
            crop_box: crop_box.unwrap_or(media_box),
            rotation: rotation.rem_euclid(360) as u16 / 90 * 90,
        }
    }

    /// The size of the device surface, with width and height swapped for
    /// quadrant rotations.
    pub fn device_size(&self) -> (f64, f64) {
        let (w, h) = (self.crop_box.width(), self.crop_box.height());
        match self.rotation {
            90 | 270 => (h, w),
            _ => (w, h),
        }
    }

    /// The device surface as a rectangle anchored at the origin.
    pub fn device_rect(&self) -> Rect {
        let (w, h) = self.device_size();
        Rect::new(0.0, 0.0, w, h)
    }

    /// The transform from user space to device space.
    ///
    /// Applies the y-flip, the rotation quadrant and the crop-box offset.
    pub fn base_transform(&self) -> Affine {
        let b = self.crop_box;
        match self.rotation {
            90 => Affine::new([0.0, 1.0, 1.0, 0.0, -b.y0, -b.x0]),
            180 => Affine::new([-1.0, 0.0, 0.0, 1.0, b.x1, -b.y0]),
            270 => Affine::new([0.0, -1.0, -1.0, 0.0, b.y1, b.x1]),
            _ => Affine::new([1.0, 0.0, 0.0, -1.0, -b.x0, b.y1]),
        }
    }

    /// The transform from device space back to user space.
    pub fn inverse_transform(&self) -> Affine {
        self.base_transform().inverse()
    }

    /// The same geometry with the rotation removed.
    ///
    /// Soft-mask buffers are rendered in this unrotated frame and
    /// counter-rotated afterwards.
    pub(crate) fn unrotated(&self) -> Self {
        Self {
            rotation: 0,
            ..*self
        }
    }

    /// Map a user-space point to device space.
    pub fn to_device(&self, p: Point) -> Point {
        self.base_transform() * p
    }

    /// Map a device-space point back to user space.
    pub fn to_user(&self, p: Point) -> Point {
        self.inverse_transform() * p
    }
}

/// Remap a device-space rectangle rendered in the unrotated frame into
/// the rotated device frame, by quadrant.
///
/// `size` is the unrotated device size of the page.
pub(crate) fn remap_rect_for_rotation(r: Rect, size: (f64, f64), rotation: u16) -> Rect {
    let (w, h) = size;
    match rotation {
        90 => Rect::new(h - r.y1, r.x0, h - r.y0, r.x1),
        180 => Rect::new(w - r.x1, h - r.y1, w - r.x0, h - r.y0),
        270 => Rect::new(r.y0, w - r.x1, r.y1, w - r.x0),
        _ => r,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(w: f64, h: f64, rotation: i32) -> PageGeometry {
        PageGeometry::new(Rect::new(0.0, 0.0, w, h), None, rotation)
    }

    #[test]
    fn flips_y_axis() {
        let g = page(612.0, 200.0, 0);
        // A user-space rectangle from (0, 0) to (100, 100) on a page of
        // height 200 must span y 100..200 in device space.
        let p0 = g.to_device(Point::new(0.0, 0.0));
        let p1 = g.to_device(Point::new(100.0, 100.0));
        assert_eq!(p0, Point::new(0.0, 200.0));
        assert_eq!(p1, Point::new(100.0, 100.0));
    }

    #[test]
    fn round_trips_through_device_space() {
        for rotation in [0, 90, 180, 270] {
            let g = page(612.0, 792.0, rotation);
            let p = Point::new(123.25, 456.5);
            let back = g.to_user(g.to_device(p));
            assert!((back.x - p.x).abs() < 1e-9, "rotation {rotation}");
            assert!((back.y - p.y).abs() < 1e-9, "rotation {rotation}");
        }
    }

    #[test]
    fn rotation_swaps_device_size() {
        assert_eq!(page(612.0, 792.0, 90).device_size(), (792.0, 612.0));
        assert_eq!(page(612.0, 792.0, 180).device_size(), (612.0, 792.0));
    }

    #[test]
    fn rotated_corners_stay_on_the_surface() {
        for rotation in [90, 180, 270] {
            let g = page(612.0, 792.0, rotation);
            let surface = g.device_rect();
            for corner in [
                Point::new(0.0, 0.0),
                Point::new(612.0, 0.0),
                Point::new(0.0, 792.0),
                Point::new(612.0, 792.0),
            ] {
                let p = g.to_device(corner);
                assert!(
                    p.x >= -1e-9
                        && p.y >= -1e-9
                        && p.x <= surface.x1 + 1e-9
                        && p.y <= surface.y1 + 1e-9,
                    "rotation {rotation}: {corner:?} mapped to {p:?}"
                );
            }
        }
    }

    #[test]
    fn crop_box_offsets_the_origin() {
        let g = PageGeometry::new(
            Rect::new(0.0, 0.0, 612.0, 792.0),
            Some(Rect::new(10.0, 20.0, 610.0, 780.0)),
            0,
        );
        let p = g.to_device(Point::new(10.0, 780.0));
        assert_eq!(p, Point::new(0.0, 0.0));
    }

    #[test]
    fn quadrant_remap_matches_rotated_transform() {
        use kurbo::Shape;

        for rotation in [90u16, 180, 270] {
            let g = page(600.0, 800.0, rotation as i32);
            let unrotated = g.unrotated();
            let user = Rect::new(50.0, 100.0, 150.0, 300.0);

            let staged = (unrotated.base_transform() * user.to_path(0.1)).bounding_box();
            let remapped = remap_rect_for_rotation(staged, unrotated.device_size(), rotation);
            let direct = (g.base_transform() * user.to_path(0.1)).bounding_box();

            assert!((remapped.x0 - direct.x0).abs() < 1e-6, "rotation {rotation}");
            assert!((remapped.y0 - direct.y0).abs() < 1e-6, "rotation {rotation}");
            assert!((remapped.x1 - direct.x1).abs() < 1e-6, "rotation {rotation}");
            assert!((remapped.y1 - direct.y1).abs() < 1e-6, "rotation {rotation}");
        }
    }

    #[test]
    fn quadrant_remap_is_involution_at_180() {
        let size = (600.0, 800.0);
        let r = Rect::new(10.0, 20.0, 110.0, 70.0);
        let once = remap_rect_for_rotation(r, size, 180);
        let twice = remap_rect_for_rotation(once, size, 180);
        assert_eq!(twice, r);
    }
}
