//! Intersect-only clip regions.
//!
//! A clip region can only ever shrink. It is represented as the list of
//! device-space paths whose geometric intersection forms the region,
//! together with the running intersection of their bounding boxes, which
//! bounds offscreen buffers and shading fills.
//!
//! Regions are compared by cache key, never structurally: some sinks
//! hand out a fresh object on every query even when nothing changed, so
//! the engine tracks the identity of the last region it pushed and skips
//! redundant device updates itself.

use std::sync::Arc;

use kurbo::{BezPath, Rect, Shape};

use crate::paint::FillRule;
use crate::util::hash128;

/// An intersect-only clip region in device space.
#[derive(Debug, Clone)]
pub struct ClipRegion {
    key: u128,
    paths: Vec<(BezPath, FillRule)>,
    bbox: Rect,
}

impl ClipRegion {
    /// The root region covering the whole device surface.
    pub fn page(device_rect: Rect) -> Arc<Self> {
        Arc::new(Self {
            key: hash128(&(device_rect.x1.to_bits(), device_rect.y1.to_bits())),
            paths: Vec::new(),
            bbox: device_rect,
        })
    }

    /// Intersect this region with a device-space path.
    ///
    /// Returns a new region; the old one is untouched (parent stack
    /// frames keep referring to it).
    pub fn intersect(self: &Arc<Self>, path: BezPath, rule: FillRule) -> Arc<Self> {
        let path_bbox = path.bounding_box();
        let bbox = self.bbox.intersect(path_bbox);
        // Normalize an empty intersection so area comparisons behave.
        let bbox = if bbox.width() <= 0.0 || bbox.height() <= 0.0 {
            Rect::new(bbox.x0, bbox.y0, bbox.x0, bbox.y0)
        } else {
            bbox
        };

        let key = hash128(&(self.key, path.to_svg(), rule));
        let mut paths = self.paths.clone();
        paths.push((path, rule));

        Arc::new(Self { key, paths, bbox })
    }

    /// The identity of this region.
    ///
    /// Two regions with equal keys clip identically; the engine uses
    /// this to skip redundant device updates.
    pub fn key(&self) -> u128 {
        self.key
    }

    /// The intersection paths making up this region, outermost first.
    ///
    /// Empty for the unclipped page region.
    pub fn paths(&self) -> &[(BezPath, FillRule)] {
        &self.paths
    }

    /// A conservative device-space bound of the region.
    pub fn bbox(&self) -> Rect {
        self.bbox
    }

    /// Whether the region has collapsed to nothing.
    pub fn is_empty(&self) -> bool {
        self.bbox.width() <= 0.0 || self.bbox.height() <= 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rect_path(x0: f64, y0: f64, x1: f64, y1: f64) -> BezPath {
        Rect::new(x0, y0, x1, y1).to_path(0.1)
    }

    #[test]
    fn intersection_is_monotonic() {
        let page = ClipRegion::page(Rect::new(0.0, 0.0, 600.0, 800.0));
        let a = page.intersect(rect_path(10.0, 10.0, 500.0, 700.0), FillRule::NonZero);
        let b = a.intersect(rect_path(100.0, 0.0, 800.0, 800.0), FillRule::NonZero);

        assert!(a.bbox().area() <= page.bbox().area());
        assert!(b.bbox().area() <= a.bbox().area());
        assert_eq!(b.bbox(), Rect::new(100.0, 10.0, 500.0, 700.0));
    }

    #[test]
    fn disjoint_intersection_is_empty() {
        let page = ClipRegion::page(Rect::new(0.0, 0.0, 100.0, 100.0));
        let a = page.intersect(rect_path(0.0, 0.0, 10.0, 10.0), FillRule::NonZero);
        let b = a.intersect(rect_path(50.0, 50.0, 60.0, 60.0), FillRule::NonZero);

        assert!(b.is_empty());
        assert_eq!(b.bbox().area(), 0.0);
    }

    #[test]
    fn identity_changes_with_each_intersection() {
        let page = ClipRegion::page(Rect::new(0.0, 0.0, 100.0, 100.0));
        let a = page.intersect(rect_path(0.0, 0.0, 50.0, 50.0), FillRule::NonZero);

        assert_ne!(page.key(), a.key());

        // The same intersection applied to the same parent yields the
        // same identity, so a redundant update can be elided.
        let b = page.intersect(rect_path(0.0, 0.0, 50.0, 50.0), FillRule::NonZero);
        assert_eq!(a.key(), b.key());

        // The winding rule participates in the identity.
        let c = page.intersect(rect_path(0.0, 0.0, 50.0, 50.0), FillRule::EvenOdd);
        assert_ne!(a.key(), c.key());
    }
}
