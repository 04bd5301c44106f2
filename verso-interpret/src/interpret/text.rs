use std::sync::Arc;

use kurbo::{Affine, BezPath};
use log::warn;

use crate::context::Context;
use crate::device::{Device, GlyphDrawMode, PlacedGlyph};
use crate::error::{Error, InterpreterWarning};
use crate::font::{Font, UNITS_PER_EM, placeholder_outline};
use crate::interpret::path::{device_stroke_props, fill_path_impl, get_paint, stroke_path_impl};
use crate::paint::FillRule;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) enum TextRenderingMode {
    #[default]
    Fill,
    Stroke,
    FillStroke,
    Invisible,
    FillAndClip,
    StrokeAndClip,
    FillAndStrokeAndClip,
    Clip,
}

impl TextRenderingMode {
    pub(crate) fn from_i32(mode: i32) -> Option<Self> {
        Some(match mode {
            0 => Self::Fill,
            1 => Self::Stroke,
            2 => Self::FillStroke,
            3 => Self::Invisible,
            4 => Self::FillAndClip,
            5 => Self::StrokeAndClip,
            6 => Self::FillAndStrokeAndClip,
            7 => Self::Clip,
            _ => return None,
        })
    }

    fn fills(self) -> bool {
        matches!(
            self,
            Self::Fill | Self::FillStroke | Self::FillAndClip | Self::FillAndStrokeAndClip
        )
    }

    fn strokes(self) -> bool {
        matches!(
            self,
            Self::Stroke | Self::FillStroke | Self::StrokeAndClip | Self::FillAndStrokeAndClip
        )
    }

    fn clips(self) -> bool {
        matches!(
            self,
            Self::Clip | Self::FillAndClip | Self::StrokeAndClip | Self::FillAndStrokeAndClip
        )
    }
}

pub(crate) fn next_line(context: &mut Context, tx: f64, ty: f64) {
    let ts = &mut context.get_mut().text_state;
    let new_matrix = ts.text_line_matrix * Affine::translate((tx, ty));
    ts.text_line_matrix = new_matrix;
    ts.text_matrix = new_matrix;
}

pub(crate) fn show_text_string(
    context: &mut Context,
    device: &mut impl Device,
    text: &[u8],
) -> Result<(), Error> {
    let Some(font) = context.get().text_state.font.clone() else {
        warn!("tried to show text without an active font");

        return Ok(());
    };

    let mut at = 0;
    while at < text.len() {
        let (code, consumed) = font.read_code(text, at);
        at += consumed;

        show_code(context, device, &font, code)?;

        let width = font.width(code);
        context
            .get_mut()
            .text_state
            .apply_code_advance(width, code, font.code_len);
    }

    Ok(())
}

fn show_code(
    context: &mut Context,
    device: &mut impl Device,
    font: &Arc<Font>,
    code: u16,
) -> Result<(), Error> {
    context.session.record_code_point(font, code);

    let provider = context.settings.outline_provider.clone();
    let mapped = provider.maps(font, code);
    let outline = if mapped {
        context.session.glyph_outline(font, code, &*provider)
    } else {
        None
    };

    let placeholder;
    let (outline, is_placeholder) = match (&outline, mapped) {
        (Some(o), _) => (Some(&**o), false),
        (None, true) => {
            // The glyph exists but no outline could be extracted; keep
            // the advance so the layout survives.
            context.warn(InterpreterWarning::MissingGlyphOutline {
                font: font.family.clone(),
                code,
            });
            (None, false)
        }
        (None, false) => {
            context.warn(InterpreterWarning::PlaceholderGlyph {
                font: font.family.clone(),
                code,
            });
            context.session.record_placeholder(font, code);
            placeholder = placeholder_outline();
            (Some(&placeholder), true)
        }
    };

    let width = font.width(code);
    let glyph_transform = glyph_transform(context, &*provider, font, code, width);

    let glyph = PlacedGlyph {
        outline,
        glyph_transform,
        font,
        code,
        unicode: font.to_unicode(code),
        advance: width / UNITS_PER_EM,
        is_placeholder,
    };

    show_glyph(context, device, &glyph)
}

/// The transform from glyph space into user space for the next glyph:
/// text rendering matrix × font matrix, with non-embedded outlines
/// stretched along x so the rendered advance matches the declared one.
fn glyph_transform(
    context: &Context,
    provider: &dyn crate::font::OutlineProvider,
    font: &Font,
    code: u16,
    declared_width: f32,
) -> Affine {
    let mut t = context.get().text_state.text_transform() * font.matrix;

    if !font.embedded
        && let Some(font_width) = provider.advance(font, code)
        && font_width > 0.0
        && (font_width - declared_width).abs() > 1e-4
    {
        t *= Affine::scale_non_uniform((declared_width / font_width) as f64, 1.0);
    }

    t
}

fn show_glyph(
    context: &mut Context,
    device: &mut impl Device,
    glyph: &PlacedGlyph<'_>,
) -> Result<(), Error> {
    let mode = context.get().text_state.render_mode;

    if mode.clips() {
        buffer_clip_glyph(context, glyph);
    }

    // With an active soft mask the glyph geometry is routed through the
    // masked paint pipeline like any other path.
    if context.get().soft_mask.is_some() {
        if let Some(outline) = glyph.outline {
            let path = glyph.glyph_transform * outline.clone();
            if mode.fills() {
                fill_path_impl(context, device, FillRule::NonZero, Some(&path))?;
            }
            if mode.strokes() {
                stroke_path_impl(context, device, Some(&path))?;
            }
        }
        return Ok(());
    }

    context.sync_clip(device);

    let ctm = context.get().ctm;

    if mode.fills() || mode == TextRenderingMode::Invisible {
        let paint = get_paint(context, false)?;
        let draw_mode = if mode == TextRenderingMode::Invisible {
            GlyphDrawMode::Invisible
        } else {
            GlyphDrawMode::Fill
        };
        device.draw_glyph(glyph, ctm, &paint, &draw_mode);
    }

    if mode.strokes() {
        let paint = get_paint(context, true)?;
        let props = device_stroke_props(context.get());
        device.draw_glyph(glyph, ctm, &paint, &GlyphDrawMode::Stroke(props));
    }

    Ok(())
}

/// Buffer a glyph outline into the pending text clip.
///
/// A clipping text run is one compound region; it is intersected into
/// the graphics state once, at the end of the text object.
fn buffer_clip_glyph(context: &mut Context, glyph: &PlacedGlyph<'_>) {
    let Some(outline) = glyph.outline else {
        return;
    };

    let outline: BezPath = glyph.glyph_transform * outline.clone();
    if outline.segments().next().is_some() {
        context.get_mut().text_state.clip_paths.extend(outline);
    }
}

/// Intersect the buffered text clip into the graphics state.
pub(crate) fn end_text(context: &mut Context) {
    let has_outline = context
        .get()
        .text_state
        .clip_paths
        .segments()
        .next()
        .is_some();

    if has_outline {
        let clip_path = context.get().ctm * context.get().text_state.clip_paths.clone();
        context.intersect_clip(clip_path, FillRule::NonZero);
    }

    context.get_mut().text_state.clip_paths.truncate(0);
}
