//! The output boundary of the interpreter.

use kurbo::{Affine, BezPath};

use crate::clip::ClipRegion;
use crate::font::Font;
use crate::paint::{FillProps, Paint, StrokeProps};

/// A device receiving the drawing instructions produced by the
/// interpreter.
///
/// Paths arrive in user space with the transform to device space
/// alongside; stroke properties are already scaled to device units.
/// `set_clip` is only called when the active clip region actually
/// changed; redundant updates are elided by the engine.
pub trait Device {
    /// Replace the active clip region.
    fn set_clip(&mut self, clip: &ClipRegion);

    /// Fill a path.
    fn fill_path(&mut self, path: &BezPath, transform: Affine, paint: &Paint, props: &FillProps);

    /// Stroke a path.
    fn stroke_path(
        &mut self,
        path: &BezPath,
        transform: Affine,
        paint: &Paint,
        props: &StrokeProps,
    );

    /// Draw a glyph.
    fn draw_glyph(
        &mut self,
        glyph: &PlacedGlyph<'_>,
        transform: Affine,
        paint: &Paint,
        mode: &GlyphDrawMode,
    );

    /// Draw an RGBA image. The transform maps image pixel space
    /// (top-left origin) into device space.
    fn draw_image(&mut self, image: &RgbaData, transform: Affine);

    /// Draw a stencil with the given paint. The transform maps stencil
    /// pixel space into device space.
    fn draw_stencil(&mut self, stencil: &LumaData, transform: Affine, paint: &Paint);
}

/// How a glyph should be drawn.
#[derive(Clone, Debug)]
pub enum GlyphDrawMode {
    /// Fill the outline.
    Fill,
    /// Stroke the outline.
    Stroke(StrokeProps),
    /// Do not mark the surface; emitted anyway so text can still be
    /// mined from invisible runs.
    Invisible,
}

/// A glyph placed on the page.
#[derive(Clone, Debug)]
pub struct PlacedGlyph<'a> {
    /// The outline in glyph space, when one exists.
    pub outline: Option<&'a BezPath>,
    /// Maps glyph space into user space: text rendering matrix × font
    /// matrix, plus the width stretch for non-embedded fonts.
    pub glyph_transform: Affine,
    /// The font.
    pub font: &'a Font,
    /// The character code.
    pub code: u16,
    /// The Unicode mapping of the code, if known.
    pub unicode: Option<char>,
    /// The declared advance in text space units.
    pub advance: f32,
    /// Whether the outline is the placeholder box.
    pub is_placeholder: bool,
}

/// An RGBA raster payload.
#[derive(Clone)]
pub struct RgbaData {
    /// The samples; `width * height * 4` bytes.
    pub data: Vec<u8>,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Whether the image should be smoothed when scaled.
    pub interpolate: bool,
}

/// A single-channel raster payload.
#[derive(Clone)]
pub struct LumaData {
    /// The samples; `width * height` bytes.
    pub data: Vec<u8>,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Whether the image should be smoothed when scaled.
    pub interpolate: bool,
}
