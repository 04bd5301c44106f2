//! The clip-path registry.
//!
//! Every unique clip geometry string gets a stable integer id the first
//! time it is seen; later occurrences are referenced, never re-emitted.
//! Keying on the formatted string means two regions that round to the
//! same two-decimal geometry share one definition.

use rustc_hash::FxHashMap;
use verso_interpret::ClipRegion;

use crate::path::to_svg_d;
use crate::{ClipDef, ClipId, Sink};

#[derive(Debug, Default)]
pub(crate) struct ClipRegistry {
    by_geometry: FxHashMap<String, ClipId>,
}

impl ClipRegistry {
    /// The id for a region, defining it through the sink on first
    /// sight. The page region (no clip paths) needs no reference.
    pub(crate) fn id_for(
        &mut self,
        region: &ClipRegion,
        sink: &mut impl Sink,
    ) -> Option<ClipId> {
        if region.paths().is_empty() {
            return None;
        }

        let paths: Vec<_> = region
            .paths()
            .iter()
            .map(|(path, rule)| (to_svg_d(path), *rule))
            .collect();

        let mut key = String::new();
        for (d, rule) in &paths {
            key.push_str(d);
            key.push(match rule {
                verso_interpret::FillRule::NonZero => 'n',
                verso_interpret::FillRule::EvenOdd => 'e',
            });
        }

        if let Some(id) = self.by_geometry.get(&key) {
            return Some(*id);
        }

        // Ids count from 1: the first clip path on a page is clipPath1.
        let id = ClipId(self.by_geometry.len() as u32 + 1);
        self.by_geometry.insert(key, id);
        sink.define_clip(ClipDef { id, paths });

        Some(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CollectSink;
    use kurbo::{Rect, Shape};
    use verso_interpret::FillRule;

    fn region(x1: f64) -> std::sync::Arc<ClipRegion> {
        ClipRegion::page(Rect::new(0.0, 0.0, 600.0, 800.0)).intersect(
            Rect::new(0.0, 0.0, x1, 100.0).to_path(0.1),
            FillRule::NonZero,
        )
    }

    #[test]
    fn ids_are_one_based_and_stable() {
        let mut registry = ClipRegistry::default();
        let mut sink = CollectSink::default();

        let a = registry.id_for(&region(50.0), &mut sink).unwrap();
        let b = registry.id_for(&region(60.0), &mut sink).unwrap();
        let a_again = registry.id_for(&region(50.0), &mut sink).unwrap();

        assert_eq!(a, ClipId(1));
        assert_eq!(b, ClipId(2));
        assert_eq!(a_again, a);
        // Two unique geometries means exactly two definitions.
        assert_eq!(sink.clip_defs.len(), 2);
    }

    #[test]
    fn page_region_needs_no_reference() {
        let mut registry = ClipRegistry::default();
        let mut sink = CollectSink::default();
        let page = ClipRegion::page(Rect::new(0.0, 0.0, 600.0, 800.0));

        assert!(registry.id_for(&page, &mut sink).is_none());
        assert!(sink.clip_defs.is_empty());
    }
}
