/*!
Stages interpreted page content as SVG-like vector primitives.

[`SvgDevice`] implements the interpreter's device boundary and pushes
structured primitives (paths, text runs, images, plus the clip-path and
glyph registries) into a caller-supplied [`Sink`]. Writing the actual
XML (or any other encoding) is the consumer's job.
*/

use std::fmt::{self, Display, Formatter};

use verso_interpret::resource::ResourceResolver;
use verso_interpret::{
    Error, FillRule, InterpreterSettings, Page, RenderTarget, Session,
};

mod clip;
mod glyph;
mod image;
mod paint;
mod path;
mod render;

pub use render::SvgDevice;

/// Convert one page into primitives pushed to the sink.
pub fn convert(
    page: &Page,
    resources: &dyn ResourceResolver,
    session: &Session,
    settings: &InterpreterSettings,
    target: RenderTarget,
    sink: &mut impl Sink,
) -> Result<(), Error> {
    let mut device = SvgDevice::new(sink);
    verso_interpret::render_page(page, resources, session, settings, target, &mut device)
}

/// Receives the staged primitives.
///
/// Definitions (clip paths, glyph outlines) arrive before the first
/// element referencing them.
pub trait Sink {
    /// An element in painting order.
    fn element(&mut self, element: SvgElement);

    /// A clip-path definition, emitted once per unique geometry.
    fn define_clip(&mut self, def: ClipDef);

    /// A glyph-outline definition, emitted once per (font, code) pair.
    fn define_glyph(&mut self, def: GlyphDef);
}

/// A sink that simply collects everything.
#[derive(Debug, Default)]
pub struct CollectSink {
    /// The elements, in painting order.
    pub elements: Vec<SvgElement>,
    /// The clip-path definitions.
    pub clip_defs: Vec<ClipDef>,
    /// The glyph definitions.
    pub glyph_defs: Vec<GlyphDef>,
}

impl Sink for CollectSink {
    fn element(&mut self, element: SvgElement) {
        self.elements.push(element);
    }

    fn define_clip(&mut self, def: ClipDef) {
        self.clip_defs.push(def);
    }

    fn define_glyph(&mut self, def: GlyphDef) {
        self.glyph_defs.push(def);
    }
}

/// A staged element.
#[derive(Debug, Clone)]
pub enum SvgElement {
    /// A path.
    Path(SvgPath),
    /// A text run (one glyph).
    Text(SvgText),
    /// A raster image.
    Image(SvgImage),
}

/// A path primitive in device space.
#[derive(Debug, Clone)]
pub struct SvgPath {
    /// The geometry, formatted at two decimal places.
    pub d: String,
    /// Fill colour as `#rrggbb`, or `none`.
    pub fill: String,
    /// Fill rule.
    pub fill_rule: FillRule,
    /// Fill opacity when not fully opaque.
    pub fill_opacity: Option<f32>,
    /// Stroke colour as `#rrggbb`, or `none`.
    pub stroke: String,
    /// Stroke opacity when not fully opaque.
    pub stroke_opacity: Option<f32>,
    /// Stroke width in device units.
    pub stroke_width: Option<f64>,
    /// Dash array, formatted, when dashed.
    pub stroke_dash: Option<String>,
    /// Reference into the clip registry.
    pub clip: Option<ClipId>,
    /// Render with antialiasing disabled.
    pub crisp: bool,
}

/// A text primitive: one placed glyph.
#[derive(Debug, Clone)]
pub struct SvgText {
    /// Device-space position (top-left origin).
    pub x: f64,
    /// Device-space position.
    pub y: f64,
    /// The Unicode rendition, when known.
    pub unicode: Option<String>,
    /// Font family.
    pub font_family: String,
    /// Device-space font size.
    pub font_size: f64,
    /// Bold face.
    pub bold: bool,
    /// Italic face.
    pub italic: bool,
    /// Fill colour as `#rrggbb`, or `none`.
    pub fill: String,
    /// Stroke colour as `#rrggbb`, or `none`.
    pub stroke: String,
    /// Stroke width, for stroked text.
    pub stroke_width: Option<f64>,
    /// The declared advance, in em units.
    pub width: f64,
    /// A rotation transform wrapping the glyph, when the rendering
    /// matrix is rotated or sheared beyond tolerance. The position
    /// stays in `x`/`y`; coordinates are not rebaked.
    pub rotation: Option<[f64; 6]>,
    /// The glyph outline reference and its glyph-space-to-device
    /// transform, for vector rendition.
    pub glyph: Option<(GlyphId, [f64; 6])>,
    /// Whether the glyph is the placeholder box.
    pub placeholder: bool,
    /// Reference into the clip registry.
    pub clip: Option<ClipId>,
}

/// An image primitive.
#[derive(Debug, Clone)]
pub struct SvgImage {
    /// The payload as a `data:image/png;base64,…` URL.
    pub href: String,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Maps image pixel space into device space.
    pub transform: [f64; 6],
    /// Whether the image should be smoothed when scaled.
    pub smooth: bool,
    /// Reference into the clip registry.
    pub clip: Option<ClipId>,
}

/// A clip-path definition.
#[derive(Debug, Clone)]
pub struct ClipDef {
    /// The registry id.
    pub id: ClipId,
    /// The intersection paths, outermost first, with their rules.
    pub paths: Vec<(String, FillRule)>,
}

/// A glyph-outline definition, in 1000-unit glyph space.
#[derive(Debug, Clone)]
pub struct GlyphDef {
    /// The registry id.
    pub id: GlyphId,
    /// The outline geometry.
    pub d: String,
}

/// A stable 1-based clip-path id, rendered as `clipPath<N>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClipId(pub u32);

impl Display for ClipId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "clipPath{}", self.0)
    }
}

/// A stable glyph-outline id, rendered as `g<N>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GlyphId(pub u32);

impl Display for GlyphId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "g{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clip_ids_render_one_based() {
        assert_eq!(ClipId(1).to_string(), "clipPath1");
        assert_eq!(ClipId(14).to_string(), "clipPath14");
    }

    #[test]
    fn glyph_ids_render_like_defs() {
        assert_eq!(GlyphId(0).to_string(), "g0");
    }
}
