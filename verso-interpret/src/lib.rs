/*!
Interprets one decoded page of a content stream into device-independent
vector drawing instructions.

The caller supplies the already-tokenized operations, resolved resources
and a glyph-outline provider; the engine drives a [`Device`] with paths,
glyphs and images in a top-left-origin device space. Transparency groups
and soft masks are realized through private offscreen raster buffers and
come back out as images.

```
use verso_interpret::{
    InterpreterSettings, Page, PageGeometry, RenderTarget, Session,
};
use verso_interpret::resource::NoResources;
use kurbo::Rect;

let page = Page {
    geometry: PageGeometry::new(Rect::new(0.0, 0.0, 612.0, 792.0), None, 0),
    content: vec![],
    annotations: vec![],
};
let session = Session::new();
# struct NullDevice;
# impl verso_interpret::Device for NullDevice {
#     fn set_clip(&mut self, _: &verso_interpret::ClipRegion) {}
#     fn fill_path(&mut self, _: &kurbo::BezPath, _: kurbo::Affine, _: &verso_interpret::Paint, _: &verso_interpret::FillProps) {}
#     fn stroke_path(&mut self, _: &kurbo::BezPath, _: kurbo::Affine, _: &verso_interpret::Paint, _: &verso_interpret::StrokeProps) {}
#     fn draw_glyph(&mut self, _: &verso_interpret::PlacedGlyph<'_>, _: kurbo::Affine, _: &verso_interpret::Paint, _: &verso_interpret::GlyphDrawMode) {}
#     fn draw_image(&mut self, _: &verso_interpret::RgbaData, _: kurbo::Affine) {}
#     fn draw_stencil(&mut self, _: &verso_interpret::LumaData, _: kurbo::Affine, _: &verso_interpret::Paint) {}
# }
# let mut device = NullDevice;
verso_interpret::render_page(
    &page,
    &NoResources,
    &session,
    &InterpreterSettings::default(),
    RenderTarget::Screen,
    &mut device,
)
.unwrap();
```
*/

pub mod annotation;
pub mod clip;
pub mod color;
mod compositor;
pub mod context;
pub mod coords;
pub mod device;
pub mod error;
pub mod font;
mod interpret;
pub mod ops;
pub mod paint;
mod raster;
pub mod resource;
pub mod session;
pub mod soft_mask;
mod util;
mod x_object;

pub use annotation::{Annotation, AnnotationBorder, AnnotationFlags, AnnotationKind, RenderTarget};
pub use clip::ClipRegion;
pub use color::{Color, ColorComponents, ColorSpace, ToRgbFn};
pub use context::Context;
pub use coords::PageGeometry;
pub use device::{Device, GlyphDrawMode, LumaData, PlacedGlyph, RgbaData};
pub use error::{
    Error, InterpreterWarning, ResourceError, StructuralError, UnsupportedFeature, WarningSinkFn,
};
pub use font::{Font, NoOutlines, OutlineProvider, UNITS_PER_EM};
pub use interpret::{InterpreterSettings, interpret};
pub use ops::{Op, Operand, RawOperation};
pub use paint::{BlendMode, FillProps, FillRule, Paint, PaintKind, StrokeProps};
pub use session::{Diagnostics, Session};
pub use soft_mask::{MaskKind, SoftMask};

use annotation::render_annotations;
use resource::ResourceResolver;

/// One decoded page, ready for interpretation.
pub struct Page {
    /// The page geometry: media box, crop box and rotation.
    pub geometry: PageGeometry,
    /// The tokenized content stream.
    pub content: Vec<RawOperation>,
    /// The page's annotations, rendered after the content.
    pub annotations: Vec<Annotation>,
}

/// Render a full page: the content stream first, then its visible
/// annotations, each with independent state.
///
/// A failure renders the page unusable but leaves the session (and with
/// it, sibling pages) intact.
pub fn render_page(
    page: &Page,
    resources: &dyn ResourceResolver,
    session: &Session,
    settings: &InterpreterSettings,
    target: RenderTarget,
    device: &mut impl Device,
) -> Result<(), Error> {
    let mut context = Context::new(page.geometry, session.clone(), settings.clone());
    interpret(&page.content, resources, &mut context, device)?;

    render_annotations(
        &page.annotations,
        page.geometry,
        session,
        settings,
        target,
        device,
    );

    Ok(())
}
