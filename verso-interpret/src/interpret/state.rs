use std::sync::Arc;

use kurbo::{Affine, BezPath, Cap, Join};

use crate::clip::ClipRegion;
use crate::color::{ColorComponents, ColorSpace};
use crate::context::Context;
use crate::error::{Error, InterpreterWarning};
use crate::font::{Font, UNITS_PER_EM};
use crate::interpret::text::TextRenderingMode;
use crate::paint::{BlendMode, StrokeProps};
use crate::resource::{ExtGState, Pattern, SoftMaskSlot};
use crate::soft_mask::SoftMask;

#[derive(Clone, Debug)]
pub(crate) struct State {
    // CTM, including the page's base transform.
    pub(crate) ctm: Affine,

    // Current clip region; only ever shrinks until popped.
    pub(crate) clip: Arc<ClipRegion>,

    // Stroke parameters, in user-space units; scaled to device units
    // when a stroke is emitted.
    pub(crate) stroke_props: StrokeProps,

    // Stroke paint parameters.
    pub(crate) stroke_color: ColorComponents,
    pub(crate) stroke_cs: ColorSpace,
    pub(crate) stroke_pattern: Option<Arc<Pattern>>,
    pub(crate) stroke_alpha: f32,

    // Non-stroke paint parameters.
    pub(crate) fill_color: ColorComponents,
    pub(crate) fill_cs: ColorSpace,
    pub(crate) fill_pattern: Option<Arc<Pattern>>,
    pub(crate) fill_alpha: f32,

    // Text state.
    pub(crate) text_state: TextState,

    // Miscellaneous.
    pub(crate) soft_mask: Option<SoftMask>,
    pub(crate) blend_mode: BlendMode,
}

impl State {
    pub(crate) fn new(ctm: Affine, clip: Arc<ClipRegion>) -> Self {
        Self {
            ctm,
            clip,
            stroke_props: StrokeProps::default(),
            stroke_color: ColorSpace::device_gray().initial_color(),
            stroke_cs: ColorSpace::device_gray(),
            stroke_pattern: None,
            stroke_alpha: 1.0,
            fill_color: ColorSpace::device_gray().initial_color(),
            fill_cs: ColorSpace::device_gray(),
            fill_pattern: None,
            fill_alpha: 1.0,
            text_state: TextState::default(),
            soft_mask: None,
            blend_mode: BlendMode::default(),
        }
    }

    pub(crate) fn paint_data(&self, is_stroke: bool) -> PaintData {
        if is_stroke {
            PaintData {
                alpha: self.stroke_alpha,
                color: self.stroke_color.clone(),
                color_space: self.stroke_cs.clone(),
                pattern: self.stroke_pattern.clone(),
            }
        } else {
            PaintData {
                alpha: self.fill_alpha,
                color: self.fill_color.clone(),
                color_space: self.fill_cs.clone(),
                pattern: self.fill_pattern.clone(),
            }
        }
    }
}

pub(crate) struct PaintData {
    pub(crate) alpha: f32,
    pub(crate) color: ColorComponents,
    pub(crate) color_space: ColorSpace,
    pub(crate) pattern: Option<Arc<Pattern>>,
}

#[derive(Clone, Debug)]
pub(crate) struct TextState {
    pub(crate) char_space: f32,
    pub(crate) word_space: f32,
    // Note that this stores the percentage, not the factor.
    pub(crate) horizontal_scaling: f32,
    pub(crate) leading: f32,
    pub(crate) font: Option<Arc<Font>>,
    pub(crate) font_size: f32,
    pub(crate) rise: f32,
    pub(crate) render_mode: TextRenderingMode,

    pub(crate) text_matrix: Affine,
    pub(crate) text_line_matrix: Affine,

    // In clip rendering modes the glyphs are collected here and applied
    // as one compound clip at the end of the text object.
    pub(crate) clip_paths: BezPath,
}

impl TextState {
    fn params_transform(&self) -> Affine {
        Affine::new([
            self.font_size as f64 * self.horizontal_scaling() as f64,
            0.0,
            0.0,
            self.font_size as f64,
            0.0,
            self.rise as f64,
        ])
    }

    fn horizontal_scaling(&self) -> f32 {
        self.horizontal_scaling / 100.0
    }

    /// The text rendering matrix, mapping text space into user space.
    pub(crate) fn text_transform(&self) -> Affine {
        self.text_matrix * self.params_transform()
    }

    pub(crate) fn apply_adjustment(&mut self, adjustment: f32) {
        let tx = -adjustment / UNITS_PER_EM * self.font_size * self.horizontal_scaling();
        self.text_matrix *= Affine::translate((tx as f64, 0.0));
    }

    pub(crate) fn apply_code_advance(&mut self, glyph_width: f32, code: u16, code_len: u8) {
        let word_space = if code == 32 && code_len == 1 {
            self.word_space
        } else {
            0.0
        };

        let tx = (glyph_width / UNITS_PER_EM * self.font_size + self.char_space + word_space)
            * self.horizontal_scaling();

        self.text_matrix *= Affine::translate((tx as f64, 0.0));
    }
}

impl Default for TextState {
    fn default() -> Self {
        Self {
            char_space: 0.0,
            word_space: 0.0,
            horizontal_scaling: 100.0,
            leading: 0.0,
            font: None,
            // Not in the specification, but defined so no option is
            // needed.
            font_size: 1.0,
            rise: 0.0,
            render_mode: TextRenderingMode::default(),
            text_matrix: Affine::IDENTITY,
            text_line_matrix: Affine::IDENTITY,
            clip_paths: BezPath::default(),
        }
    }
}

pub(crate) fn convert_line_cap(cap: i32) -> Cap {
    match cap {
        1 => Cap::Round,
        2 => Cap::Square,
        _ => Cap::Butt,
    }
}

pub(crate) fn convert_line_join(join: i32) -> Join {
    match join {
        1 => Join::Round,
        2 => Join::Bevel,
        _ => Join::Miter,
    }
}

pub(crate) fn handle_gs(gs: &ExtGState, context: &mut Context) -> Result<(), Error> {
    let ctm = context.get().ctm;
    let state = context.get_mut();

    if let Some(w) = gs.line_width {
        state.stroke_props.line_width = w;
    }
    if let Some(c) = gs.line_cap {
        state.stroke_props.line_cap = convert_line_cap(c);
    }
    if let Some(j) = gs.line_join {
        state.stroke_props.line_join = convert_line_join(j);
    }
    if let Some(m) = gs.miter_limit {
        state.stroke_props.miter_limit = m;
    }
    if let Some((array, phase)) = &gs.dash {
        state.stroke_props.dash_array = array.clone();
        state.stroke_props.dash_offset = *phase;
    }
    if let Some(a) = gs.stroke_alpha {
        state.stroke_alpha = a;
    }
    if let Some(a) = gs.fill_alpha {
        state.fill_alpha = a;
    }
    if let Some((font, size)) = &gs.font {
        state.text_state.font = Some(font.clone());
        state.text_state.font_size = *size;
    }
    if let Some(mode) = gs.blend_mode {
        state.blend_mode = mode;
    }

    if gs.blend_mode.is_some_and(|m| m != BlendMode::Normal) {
        context.warn(InterpreterWarning::ApproximatedBlendMode);
    }

    match &gs.soft_mask {
        Some(SoftMaskSlot::Clear) => context.get_mut().soft_mask = None,
        Some(SoftMaskSlot::Set(def)) => {
            // An invalid subtype is refused outright rather than
            // rendered as a guess.
            let mask = SoftMask::new(def, ctm)?;
            context.get_mut().soft_mask = Some(mask);
        }
        None => {}
    }

    Ok(())
}
