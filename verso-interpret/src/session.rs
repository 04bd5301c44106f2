//! Per-conversion session state.
//!
//! Everything that outlives a single operator but must not outlive the
//! conversion lives here: the glyph outline cache and the diagnostics
//! the caller can inspect afterwards. The caller creates the session,
//! passes it into the engine, and drops it when the conversion is done;
//! nothing is process-global.

use std::sync::{Arc, Mutex};

use kurbo::BezPath;
use rustc_hash::FxHashMap;

use crate::font::{Font, OutlineProvider};

/// A conversion session.
///
/// Cheap to clone; clones share the same cache. A session may be reused
/// across the pages of one document, but not across threads rendering
/// concurrently.
#[derive(Clone, Default)]
pub struct Session(Arc<Mutex<SessionRepr>>);

#[derive(Default)]
struct SessionRepr {
    glyphs: FxHashMap<(u64, u16), Option<Arc<BezPath>>>,
    diagnostics: Diagnostics,
}

/// Diagnostics collected while rendering.
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    /// How often each (font family, code) pair was rendered.
    pub code_points: FxHashMap<(Arc<str>, u16), u64>,
    /// Codes that were drawn as placeholder boxes because the font had
    /// no glyph for them.
    pub placeholder_glyphs: Vec<(Arc<str>, u16)>,
}

impl Session {
    /// Create a new session.
    pub fn new() -> Self {
        Self::default()
    }

    /// The cached outline for a (font, code) pair, building it through
    /// the provider on first request. The result is immutable once
    /// cached; `None` is cached too, so absent glyphs are only looked up
    /// once.
    pub fn glyph_outline(
        &self,
        font: &Font,
        code: u16,
        provider: &dyn OutlineProvider,
    ) -> Option<Arc<BezPath>> {
        let mut repr = self.0.lock().unwrap();
        repr.glyphs
            .entry((font.id, code))
            .or_insert_with(|| provider.outline(font, code).map(Arc::new))
            .clone()
    }

    pub(crate) fn record_code_point(&self, font: &Font, code: u16) {
        let mut repr = self.0.lock().unwrap();
        *repr
            .diagnostics
            .code_points
            .entry((font.family.clone(), code))
            .or_insert(0) += 1;
    }

    pub(crate) fn record_placeholder(&self, font: &Font, code: u16) {
        let mut repr = self.0.lock().unwrap();
        repr.diagnostics
            .placeholder_glyphs
            .push((font.family.clone(), code));
    }

    /// A snapshot of the diagnostics collected so far.
    pub fn diagnostics(&self) -> Diagnostics {
        self.0.lock().unwrap().diagnostics.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kurbo::{Rect, Shape};

    struct CountingProvider(std::cell::Cell<u32>);

    impl OutlineProvider for CountingProvider {
        fn outline(&self, _: &Font, code: u16) -> Option<BezPath> {
            self.0.set(self.0.get() + 1);
            (code != 0).then(|| Rect::new(0.0, 0.0, 500.0, 700.0).to_path(0.1))
        }
    }

    fn test_font(id: u64) -> Font {
        Font {
            id,
            family: "Times".into(),
            weight: 400,
            italic: false,
            embedded: true,
            code_len: 1,
            matrix: Font::default_matrix(),
            widths: FxHashMap::default(),
            default_width: 500.0,
            unicode: None,
        }
    }

    #[test]
    fn outlines_are_built_once_per_code() {
        let session = Session::new();
        let provider = CountingProvider(std::cell::Cell::new(0));
        let font = test_font(7);

        let a = session.glyph_outline(&font, 65, &provider).unwrap();
        let b = session.glyph_outline(&font, 65, &provider).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(provider.0.get(), 1);

        // Absent glyphs are cached as absent.
        assert!(session.glyph_outline(&font, 0, &provider).is_none());
        assert!(session.glyph_outline(&font, 0, &provider).is_none());
        assert_eq!(provider.0.get(), 2);
    }

    #[test]
    fn distinct_fonts_do_not_share_cache_slots() {
        let session = Session::new();
        let provider = CountingProvider(std::cell::Cell::new(0));

        session.glyph_outline(&test_font(1), 65, &provider);
        session.glyph_outline(&test_font(2), 65, &provider);
        assert_eq!(provider.0.get(), 2);
    }

    #[test]
    fn diagnostics_census() {
        let session = Session::new();
        let font = test_font(1);
        session.record_code_point(&font, 65);
        session.record_code_point(&font, 65);
        session.record_placeholder(&font, 12);

        let d = session.diagnostics();
        assert_eq!(d.code_points[&(font.family.clone(), 65)], 2);
        assert_eq!(d.placeholder_glyphs.len(), 1);
    }
}
