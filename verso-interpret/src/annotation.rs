//! Annotation rendering.
//!
//! Annotations are drawn after the main content, each with fresh state
//! derived from the page geometry so one annotation can never pollute
//! another or the page itself. An annotation with an appearance stream
//! recurses into the interpreter; without one, link and ink annotations
//! fall back to built-in renditions.

use std::sync::Arc;

use bitflags::bitflags;
use kurbo::{Affine, BezPath, Point, Rect, Shape};
use log::warn;
use smallvec::SmallVec;

use crate::color::Color;
use crate::context::Context;
use crate::coords::PageGeometry;
use crate::device::Device;
use crate::error::Error;
use crate::interpret::InterpreterSettings;
use crate::paint::{Paint, StrokeProps};
use crate::resource::FormXObject;
use crate::session::Session;

bitflags! {
    /// Annotation flags, with the bit values of the file format.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct AnnotationFlags: u32 {
        /// Do not render without a handler.
        const INVISIBLE = 1 << 0;
        /// Never render.
        const HIDDEN = 1 << 1;
        /// Render when printing.
        const PRINT = 1 << 2;
        /// Do not render on screen.
        const NO_VIEW = 1 << 5;
    }
}

/// What the page is being rendered for; decides which annotations are
/// visible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenderTarget {
    /// On-screen rendition.
    #[default]
    Screen,
    /// Print rendition.
    Print,
}

/// The subtype payload of an annotation.
#[derive(Debug, Clone, Default)]
pub enum AnnotationKind {
    /// A link annotation; rendered as a border by default.
    Link,
    /// An ink annotation: freehand point lists, connected by straight
    /// lines.
    Ink {
        /// One list of user-space points per stroke.
        strokes: Vec<Vec<Point>>,
    },
    /// Any other subtype; rendered only through its appearance stream.
    #[default]
    Other,
}

/// An annotation's border characteristics.
#[derive(Debug, Clone)]
pub struct AnnotationBorder {
    /// Border width in user-space units.
    pub width: f32,
    /// Dash pattern. An all-zero array means solid.
    pub dash: SmallVec<[f32; 4]>,
    /// Draw only an underline instead of the full rectangle.
    pub underline: bool,
}

impl Default for AnnotationBorder {
    fn default() -> Self {
        Self {
            width: 1.0,
            dash: SmallVec::new(),
            underline: false,
        }
    }
}

/// An annotation attached to the page.
#[derive(Clone)]
pub struct Annotation {
    /// The annotation rectangle in user space.
    pub rect: Rect,
    /// Visibility flags.
    pub flags: AnnotationFlags,
    /// The subtype payload.
    pub kind: AnnotationKind,
    /// The annotation colour. Defaults to black when absent.
    pub color: Option<Color>,
    /// Border style.
    pub border: AnnotationBorder,
    /// The appearance stream, if one was resolved.
    pub appearance: Option<Arc<FormXObject>>,
}

impl Annotation {
    fn visible(&self, target: RenderTarget) -> bool {
        if self.flags.contains(AnnotationFlags::HIDDEN) {
            return false;
        }
        match target {
            RenderTarget::Print => self.flags.contains(AnnotationFlags::PRINT),
            RenderTarget::Screen => !self.flags.contains(AnnotationFlags::NO_VIEW),
        }
    }

    /// The effective border, with an all-zero dash array normalized to
    /// solid.
    fn effective_border(&self) -> AnnotationBorder {
        let mut border = self.border.clone();
        if border.dash.iter().all(|d| *d == 0.0) {
            border.dash.clear();
        }
        border
    }

    fn effective_color(&self) -> Color {
        // Black is the conventional reading of an unspecified colour.
        self.color.unwrap_or(Color::BLACK)
    }
}

/// Render the page's annotations.
///
/// Each annotation failure is contained: a broken appearance stream is
/// logged and the remaining annotations still render.
pub(crate) fn render_annotations(
    annotations: &[Annotation],
    geometry: PageGeometry,
    session: &Session,
    settings: &InterpreterSettings,
    target: RenderTarget,
    device: &mut impl Device,
) {
    for annotation in annotations {
        if !annotation.visible(target) {
            continue;
        }

        if let Err(err) = render_annotation(annotation, geometry, session, settings, device) {
            warn!("skipping annotation: {err}");
        }
    }
}

fn render_annotation(
    annotation: &Annotation,
    geometry: PageGeometry,
    session: &Session,
    settings: &InterpreterSettings,
    device: &mut impl Device,
) -> Result<(), Error> {
    // Fresh state per annotation, derived from the page geometry alone.
    let mut context = Context::new(geometry, session.clone(), settings.clone());

    match &annotation.appearance {
        Some(appearance) => {
            let transform = appearance_transform(annotation.rect, appearance);
            context.pre_concat_transform(transform);
            crate::x_object::draw_form_xobject(appearance, &mut context, device)
        }
        None => match &annotation.kind {
            AnnotationKind::Link => draw_link_border(annotation, &mut context, device),
            AnnotationKind::Ink { strokes } => {
                draw_ink(annotation, strokes, &mut context, device)
            }
            AnnotationKind::Other => Ok(()),
        },
    }
}

/// Map an appearance stream onto the annotation rectangle: the
/// matrix-transformed bounding box is scaled and translated so it
/// coincides with the rectangle.
fn appearance_transform(rect: Rect, appearance: &FormXObject) -> Affine {
    let transformed = (appearance.matrix * appearance.bbox.to_path(0.1)).bounding_box();
    if transformed.width() <= 0.0 || transformed.height() <= 0.0 {
        return Affine::IDENTITY;
    }

    Affine::translate((rect.x0, rect.y0))
        * Affine::scale_non_uniform(
            rect.width() / transformed.width(),
            rect.height() / transformed.height(),
        )
        * Affine::translate((-transformed.x0, -transformed.y0))
}

fn border_stroke_props(border: &AnnotationBorder) -> StrokeProps {
    StrokeProps {
        line_width: border.width,
        dash_array: border.dash.clone(),
        ..StrokeProps::default()
    }
}

fn draw_link_border(
    annotation: &Annotation,
    context: &mut Context,
    device: &mut impl Device,
) -> Result<(), Error> {
    let border = annotation.effective_border();
    if border.width == 0.0 {
        return Ok(());
    }

    let rect = annotation.rect;
    let mut path = BezPath::new();
    if border.underline {
        path.move_to((rect.x0, rect.y0));
        path.line_to((rect.x1, rect.y0));
    } else {
        path = rect.to_path(0.1);
    }

    context.sync_clip(device);
    device.stroke_path(
        &path,
        context.get().ctm,
        &Paint::solid(annotation.effective_color()),
        &border_stroke_props(&border),
    );

    Ok(())
}

fn draw_ink(
    annotation: &Annotation,
    strokes: &[Vec<Point>],
    context: &mut Context,
    device: &mut impl Device,
) -> Result<(), Error> {
    let border = annotation.effective_border();
    if border.width == 0.0 {
        return Ok(());
    }

    let paint = Paint::solid(annotation.effective_color());
    let props = border_stroke_props(&border);

    context.sync_clip(device);
    for stroke in strokes {
        if stroke.len() < 2 {
            continue;
        }

        // The points are connected by straight lines; curve fitting is
        // viewer-dependent and not attempted.
        let mut path = BezPath::new();
        path.move_to(stroke[0]);
        for p in &stroke[1..] {
            path.line_to(*p);
        }

        device.stroke_path(&path, context.get().ctm, &paint, &props);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn annotation(flags: AnnotationFlags) -> Annotation {
        Annotation {
            rect: Rect::new(0.0, 0.0, 100.0, 20.0),
            flags,
            kind: AnnotationKind::Link,
            color: None,
            border: AnnotationBorder::default(),
            appearance: None,
        }
    }

    #[test]
    fn hidden_annotations_never_render() {
        let a = annotation(AnnotationFlags::HIDDEN);
        assert!(!a.visible(RenderTarget::Screen));
        assert!(!a.visible(RenderTarget::Print));
    }

    #[test]
    fn print_target_requires_print_flag() {
        assert!(annotation(AnnotationFlags::PRINT).visible(RenderTarget::Print));
        assert!(!annotation(AnnotationFlags::empty()).visible(RenderTarget::Print));
    }

    #[test]
    fn no_view_hides_on_screen_only() {
        let a = annotation(AnnotationFlags::NO_VIEW | AnnotationFlags::PRINT);
        assert!(!a.visible(RenderTarget::Screen));
        assert!(a.visible(RenderTarget::Print));
    }

    #[test]
    fn all_zero_dash_becomes_solid() {
        let mut a = annotation(AnnotationFlags::empty());
        a.border.dash = smallvec::smallvec![0.0, 0.0, 0.0];
        assert!(a.effective_border().dash.is_empty());

        a.border.dash = smallvec::smallvec![3.0, 1.0];
        assert_eq!(a.effective_border().dash.as_slice(), &[3.0, 1.0]);
    }

    #[test]
    fn missing_color_defaults_to_black() {
        assert_eq!(annotation(AnnotationFlags::empty()).effective_color(), Color::BLACK);
    }

    #[test]
    fn appearance_maps_bbox_onto_rect() {
        use crate::resource::NoResources;

        let appearance = FormXObject {
            matrix: Affine::IDENTITY,
            bbox: Rect::new(0.0, 0.0, 10.0, 10.0),
            group: None,
            content: vec![],
            resources: Arc::new(NoResources),
        };
        let t = appearance_transform(Rect::new(100.0, 200.0, 150.0, 220.0), &appearance);

        let p0 = t * Point::new(0.0, 0.0);
        let p1 = t * Point::new(10.0, 10.0);
        assert_eq!(p0, Point::new(100.0, 200.0));
        assert_eq!(p1, Point::new(150.0, 220.0));
    }
}
