//! Paints and path-painting properties handed to devices.

use std::sync::Arc;

use kurbo::{Affine, Cap, Join};
use smallvec::{SmallVec, smallvec};

use crate::color::Color;
use crate::resource::Shading;

/// A fill rule.
#[derive(Clone, Debug, Copy, Hash, PartialEq, Eq)]
pub enum FillRule {
    /// Non-zero filling.
    NonZero,
    /// Even-odd filling.
    EvenOdd,
}

/// A paint applied to a fill or stroke.
#[derive(Clone, Debug)]
pub struct Paint {
    /// A transform from the paint's own space into device space. Only
    /// meaningful for shadings, which are anchored in the pattern space
    /// active when they were selected.
    pub paint_transform: Affine,
    /// The underlying kind of paint.
    pub kind: PaintKind,
}

/// The kind of a paint.
#[derive(Clone, Debug)]
pub enum PaintKind {
    /// A solid RGBA colour.
    Color(Color),
    /// A shading, referenced rather than rasterized.
    Shading(Arc<Shading>),
}

impl Paint {
    /// A solid-colour paint.
    pub fn solid(color: Color) -> Self {
        Self {
            paint_transform: Affine::IDENTITY,
            kind: PaintKind::Color(color),
        }
    }

    /// The flat colour of this paint, if it has one.
    pub fn as_color(&self) -> Option<Color> {
        match &self.kind {
            PaintKind::Color(c) => Some(*c),
            PaintKind::Shading(_) => None,
        }
    }
}

/// Stroke properties, already scaled into device units.
#[derive(Clone, Debug)]
pub struct StrokeProps {
    /// The line width.
    pub line_width: f32,
    /// The line cap.
    pub line_cap: Cap,
    /// The line join.
    pub line_join: Join,
    /// The miter limit.
    pub miter_limit: f32,
    /// The dash array.
    pub dash_array: SmallVec<[f32; 4]>,
    /// The dash offset.
    pub dash_offset: f32,
}

impl Default for StrokeProps {
    fn default() -> Self {
        Self {
            line_width: 1.0,
            line_cap: Cap::Butt,
            line_join: Join::Miter,
            miter_limit: 10.0,
            dash_array: smallvec![],
            dash_offset: 0.0,
        }
    }
}

/// Fill properties.
#[derive(Clone, Debug)]
pub struct FillProps {
    /// The fill rule.
    pub fill_rule: FillRule,
    /// Whether the region should be antialiased. Disabled for large
    /// rectangular fills to avoid seams between abutting gradient
    /// slices.
    pub anti_alias: bool,
}

impl Default for FillProps {
    fn default() -> Self {
        Self {
            fill_rule: FillRule::NonZero,
            anti_alias: true,
        }
    }
}

/// The blend mode of the graphics state.
///
/// Stored and forwarded; only `Normal` affects compositing, every other
/// mode is approximated by it with a warning.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BlendMode {
    /// Source-over compositing.
    #[default]
    Normal,
    /// Any other named blend mode.
    Other,
}
