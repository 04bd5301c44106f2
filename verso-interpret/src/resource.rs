//! Resolved resources consumed by the interpreter.
//!
//! Document parsing happens outside the engine; a [`ResourceResolver`]
//! hands over fully resolved model objects. Lookup failures come in two
//! flavors: `Ok(None)` means the name simply is not there (the engine
//! degrades with a warning), `Err` means resolution itself broke and the
//! page fails.

use std::fmt::{self, Debug, Formatter};
use std::sync::Arc;

use kurbo::{Affine, Rect};
use smallvec::SmallVec;

use crate::color::{Color, ColorComponents, ColorSpace};
use crate::error::ResourceError;
use crate::font::Font;
use crate::ops::RawOperation;
use crate::paint::BlendMode;

/// The result of a resource lookup.
pub type ResourceResult<T> = Result<Option<T>, ResourceError>;

/// Resolves names appearing in the content stream to model objects.
pub trait ResourceResolver {
    /// Look up a font.
    fn font(&self, name: &str) -> ResourceResult<Arc<Font>>;

    /// Look up a colour space.
    fn color_space(&self, name: &str) -> ResourceResult<ColorSpace>;

    /// Look up a shading.
    fn shading(&self, name: &str) -> ResourceResult<Arc<Shading>>;

    /// Look up a pattern.
    fn pattern(&self, name: &str) -> ResourceResult<Arc<Pattern>>;

    /// Look up a form or image XObject.
    fn x_object(&self, name: &str) -> ResourceResult<XObject>;

    /// Look up an extended graphics state.
    fn ext_g_state(&self, name: &str) -> ResourceResult<ExtGState>;
}

/// A resolver with no resources.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoResources;

impl ResourceResolver for NoResources {
    fn font(&self, _: &str) -> ResourceResult<Arc<Font>> {
        Ok(None)
    }

    fn color_space(&self, _: &str) -> ResourceResult<ColorSpace> {
        Ok(None)
    }

    fn shading(&self, _: &str) -> ResourceResult<Arc<Shading>> {
        Ok(None)
    }

    fn pattern(&self, _: &str) -> ResourceResult<Arc<Pattern>> {
        Ok(None)
    }

    fn x_object(&self, _: &str) -> ResourceResult<XObject> {
        Ok(None)
    }

    fn ext_g_state(&self, _: &str) -> ResourceResult<ExtGState> {
        Ok(None)
    }
}

/// A form or image XObject.
#[derive(Clone)]
pub enum XObject {
    /// A form.
    Form(Arc<FormXObject>),
    /// An image.
    Image(Arc<ImageXObject>),
}

/// A form XObject: a nested content stream with its own resources.
pub struct FormXObject {
    /// The form matrix, mapping form space into the surrounding space.
    pub matrix: Affine,
    /// The bounding box in form space. Content is clipped to it.
    pub bbox: Rect,
    /// Transparency-group attributes, when the form is one.
    pub group: Option<TransparencyGroup>,
    /// The decoded content stream.
    pub content: Vec<RawOperation>,
    /// The form's own resources.
    pub resources: Arc<dyn ResourceResolver>,
}

impl Debug for FormXObject {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("FormXObject")
            .field("matrix", &self.matrix)
            .field("bbox", &self.bbox)
            .field("group", &self.group)
            .field("ops", &self.content.len())
            .finish()
    }
}

/// Transparency-group attributes of a form.
#[derive(Debug, Clone, Copy, Default)]
pub struct TransparencyGroup {
    /// Whether the group's colour space is a single gray channel. Gray
    /// groups composite through a gray+alpha buffer to save memory.
    pub gray: bool,
    /// Whether the group is isolated.
    pub isolated: bool,
    /// Whether the group is knockout.
    pub knockout: bool,
}

/// An image XObject with its samples already decoded.
#[derive(Clone)]
pub struct ImageXObject {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Whether the image should be smoothed when scaled.
    pub interpolate: bool,
    /// The decoded samples.
    pub data: ImageData,
}

impl Debug for ImageXObject {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "ImageXObject({}x{})", self.width, self.height)
    }
}

/// Decoded image samples.
#[derive(Clone)]
pub enum ImageData {
    /// RGB samples, 3 bytes per pixel, with an optional alpha plane of
    /// one byte per pixel.
    Rgb {
        /// The RGB samples.
        data: Vec<u8>,
        /// The alpha plane.
        alpha: Option<Vec<u8>>,
    },
    /// A 1-bit stencil expanded to one coverage byte per pixel; painted
    /// with the current fill paint.
    Stencil {
        /// Coverage per pixel, 0 or 255.
        coverage: Vec<u8>,
    },
}

impl ImageXObject {
    /// Interleave the samples into RGBA, padding or truncating to the
    /// declared dimensions.
    pub fn to_rgba8(&self) -> Vec<u8> {
        let len = self.width as usize * self.height as usize * 4;
        let mut out = match &self.data {
            ImageData::Rgb { data, alpha } => {
                let alpha = alpha.as_deref();
                data.chunks(3)
                    .enumerate()
                    .flat_map(|(i, px)| {
                        let a = alpha.and_then(|a| a.get(i).copied()).unwrap_or(255);
                        [
                            px.first().copied().unwrap_or(0),
                            px.get(1).copied().unwrap_or(0),
                            px.get(2).copied().unwrap_or(0),
                            a,
                        ]
                    })
                    .collect::<Vec<u8>>()
            }
            ImageData::Stencil { coverage } => coverage
                .iter()
                .flat_map(|c| [0, 0, 0, *c])
                .collect::<Vec<u8>>(),
        };

        out.truncate(len);
        out.resize(len, 0);

        out
    }
}

/// A shading definition.
///
/// Gradient function synthesis is the serializer's concern; the engine
/// carries the shading through as a referenced paint together with the
/// data needed to bound and approximate it.
#[derive(Debug, Clone)]
pub struct Shading {
    /// A caller-assigned identity, unique per shading.
    pub id: u64,
    /// The bounding box in the shading's target space, if declared.
    pub bbox: Option<Rect>,
    /// A flat colour approximating the shading, used when a raster
    /// fallback is unavoidable (soft-mask buffers).
    pub mean_color: Color,
}

/// A pattern definition.
#[derive(Debug, Clone)]
pub enum Pattern {
    /// A shading pattern.
    Shading(ShadingPattern),
    /// A tiling pattern. Painting with one is an unsupported-feature
    /// error; silently approximating it would look wrong.
    Tiling {
        /// The declared paint type (1 colored, 2 uncolored).
        paint_type: u8,
    },
}

/// A shading pattern: a shading anchored by a pattern matrix.
#[derive(Debug, Clone)]
pub struct ShadingPattern {
    /// The shading.
    pub shading: Arc<Shading>,
    /// The pattern matrix, relative to the space the pattern was
    /// selected in.
    pub matrix: Affine,
}

/// An extended graphics state (`gs`) dictionary, already resolved.
#[derive(Clone, Default)]
pub struct ExtGState {
    /// New line width.
    pub line_width: Option<f32>,
    /// New line cap style.
    pub line_cap: Option<i32>,
    /// New line join style.
    pub line_join: Option<i32>,
    /// New miter limit.
    pub miter_limit: Option<f32>,
    /// New dash pattern and phase.
    pub dash: Option<(SmallVec<[f32; 4]>, f32)>,
    /// New stroking alpha.
    pub stroke_alpha: Option<f32>,
    /// New non-stroking alpha.
    pub fill_alpha: Option<f32>,
    /// New blend mode.
    pub blend_mode: Option<BlendMode>,
    /// New soft mask, or an explicit `/None` clearing it.
    pub soft_mask: Option<SoftMaskSlot>,
    /// New font and size.
    pub font: Option<(Arc<Font>, f32)>,
}

/// The `/SMask` entry of an extended graphics state.
#[derive(Clone)]
pub enum SoftMaskSlot {
    /// `/SMask /None`: clear the active mask.
    Clear,
    /// Install a mask.
    Set(SoftMaskDef),
}

/// An unresolved soft-mask dictionary.
#[derive(Clone)]
pub struct SoftMaskDef {
    /// The declared subtype. `Luminosity` and `Alpha` are valid;
    /// anything else is a hard error when the mask is used.
    pub subtype: Arc<str>,
    /// The transparency group to render as the mask.
    pub group: Arc<FormXObject>,
    /// The backdrop colour for luminosity masks, in the group's colour
    /// space.
    pub backdrop: Option<ColorComponents>,
}

impl Debug for SoftMaskDef {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "SoftMaskDef({})", self.subtype)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rgba_interleaving_pads_missing_alpha() {
        let image = ImageXObject {
            width: 2,
            height: 1,
            interpolate: false,
            data: ImageData::Rgb {
                data: vec![10, 20, 30, 40, 50, 60],
                alpha: None,
            },
        };
        assert_eq!(image.to_rgba8(), vec![10, 20, 30, 255, 40, 50, 60, 255]);
    }

    #[test]
    fn rgba_interleaving_truncates_and_pads_to_declared_size() {
        let image = ImageXObject {
            width: 2,
            height: 2,
            interpolate: false,
            data: ImageData::Rgb {
                data: vec![1, 2, 3],
                alpha: None,
            },
        };
        let rgba = image.to_rgba8();
        assert_eq!(rgba.len(), 16);
        assert_eq!(&rgba[0..4], &[1, 2, 3, 255]);
        assert_eq!(&rgba[4..8], &[0, 0, 0, 0]);
    }

    #[test]
    fn stencil_coverage_lands_in_alpha() {
        let image = ImageXObject {
            width: 2,
            height: 1,
            interpolate: false,
            data: ImageData::Stencil {
                coverage: vec![255, 0],
            },
        };
        assert_eq!(image.to_rgba8(), vec![0, 0, 0, 255, 0, 0, 0, 0]);
    }
}
