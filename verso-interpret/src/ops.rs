//! The operator boundary.
//!
//! Content arrives as raw `(operator, operands)` tuples. They are decoded
//! exactly once, here, into the closed [`Op`] enum; the dispatcher then
//! works by exhaustive match and never sees an operator name again.

use std::sync::Arc;

use kurbo::{Affine, Point};
use smallvec::SmallVec;

use crate::resource::ImageXObject;

/// A raw operation as produced by the content-stream tokenizer.
#[derive(Debug, Clone)]
pub struct RawOperation {
    /// The operator name.
    pub operator: String,
    /// The operands preceding it, in stream order.
    pub operands: SmallVec<[Operand; 6]>,
}

impl RawOperation {
    /// Create a raw operation.
    pub fn new(operator: impl Into<String>, operands: impl IntoIterator<Item = Operand>) -> Self {
        Self {
            operator: operator.into(),
            operands: operands.into_iter().collect(),
        }
    }
}

/// A single operand.
#[derive(Debug, Clone)]
pub enum Operand {
    /// A numeric operand.
    Number(f64),
    /// A name operand (without the leading slash).
    Name(String),
    /// A string operand, kept as raw bytes.
    String(Vec<u8>),
    /// An array operand.
    Array(Vec<Operand>),
    /// A boolean operand.
    Bool(bool),
    /// An already-decoded inline image.
    Image(Arc<ImageXObject>),
    /// A null or otherwise irrelevant operand.
    Null,
}

impl Operand {
    fn as_f32(&self) -> Option<f32> {
        match self {
            Self::Number(n) => Some(*n as f32),
            _ => None,
        }
    }

    fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    fn as_i32(&self) -> Option<i32> {
        match self {
            Self::Number(n) => Some(*n as i32),
            _ => None,
        }
    }

    fn as_name(&self) -> Option<&str> {
        match self {
            Self::Name(n) => Some(n),
            _ => None,
        }
    }

    fn as_string(&self) -> Option<&[u8]> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    fn as_array(&self) -> Option<&[Operand]> {
        match self {
            Self::Array(a) => Some(a),
            _ => None,
        }
    }
}

/// One item of a `TJ` array.
#[derive(Debug, Clone)]
pub enum TextItem {
    /// A string to show.
    Show(Vec<u8>),
    /// A positional adjustment in thousandths of text space.
    Adjust(f32),
}

/// A decoded operator.
#[derive(Debug, Clone)]
pub enum Op {
    // Graphics state.
    SaveState,
    RestoreState,
    Transform(Affine),
    LineWidth(f32),
    LineCap(i32),
    LineJoin(i32),
    MiterLimit(f32),
    DashPattern(SmallVec<[f32; 4]>, f32),
    RenderingIntent,
    Flatness,
    SetGraphicsState(String),

    // Path construction.
    MoveTo(Point),
    LineTo(Point),
    CubicTo(Point, Point, Point),
    CubicStartTo(Point, Point),
    CubicEndTo(Point, Point),
    ClosePath,
    RectPath(f64, f64, f64, f64),

    // Path painting.
    StrokePath,
    CloseAndStrokePath,
    FillNonZero,
    FillNonZeroCompatibility,
    FillEvenOdd,
    FillAndStrokeNonZero,
    FillAndStrokeEvenOdd,
    CloseFillAndStrokeNonZero,
    CloseFillAndStrokeEvenOdd,
    EndPath,
    ClipNonZero,
    ClipEvenOdd,

    // Colour.
    ColorSpaceStroke(String),
    ColorSpaceNonStroke(String),
    StrokeColor(SmallVec<[f32; 4]>),
    NonStrokeColor(SmallVec<[f32; 4]>),
    StrokeColorNamed(SmallVec<[f32; 4]>, Option<String>),
    NonStrokeColorNamed(SmallVec<[f32; 4]>, Option<String>),
    StrokeGray(f32),
    NonStrokeGray(f32),
    StrokeRgb(f32, f32, f32),
    NonStrokeRgb(f32, f32, f32),
    StrokeCmyk(f32, f32, f32, f32),
    NonStrokeCmyk(f32, f32, f32, f32),

    // XObjects, shadings, inline images.
    Shading(String),
    XObject(String),
    InlineImage(Arc<ImageXObject>),
    /// `BI`/`ID`: the prelude of an inline image whose decoded payload
    /// arrives with the closing operator.
    InlineImagePrelude,

    // Text.
    CharSpacing(f32),
    WordSpacing(f32),
    HorizontalScaling(f32),
    TextLeading(f32),
    TextFont(String, f32),
    TextRenderingMode(i32),
    TextRise(f32),
    BeginText,
    EndText,
    NextLine(f64, f64),
    NextLineAndSetLeading(f64, f64),
    SetTextMatrix(Affine),
    NextLineUsingLeading,
    ShowText(Vec<u8>),
    NextLineAndShowText(Vec<u8>),
    ShowTextWithParameters(f32, f32, Vec<u8>),
    ShowTexts(Vec<TextItem>),

    // Marked content and compatibility sections: recognized, ignored.
    MarkedContent,
    Compatibility,
    GlyphMetrics,
}

/// The operator kinds, keyed by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OpKind {
    SaveState,
    RestoreState,
    Transform,
    LineWidth,
    LineCap,
    LineJoin,
    MiterLimit,
    DashPattern,
    RenderingIntent,
    Flatness,
    SetGraphicsState,
    MoveTo,
    LineTo,
    CubicTo,
    CubicStartTo,
    CubicEndTo,
    ClosePath,
    RectPath,
    StrokePath,
    CloseAndStrokePath,
    FillNonZero,
    FillNonZeroCompatibility,
    FillEvenOdd,
    FillAndStrokeNonZero,
    FillAndStrokeEvenOdd,
    CloseFillAndStrokeNonZero,
    CloseFillAndStrokeEvenOdd,
    EndPath,
    ClipNonZero,
    ClipEvenOdd,
    ColorSpaceStroke,
    ColorSpaceNonStroke,
    StrokeColor,
    NonStrokeColor,
    StrokeColorNamed,
    NonStrokeColorNamed,
    StrokeGray,
    NonStrokeGray,
    StrokeRgb,
    NonStrokeRgb,
    StrokeCmyk,
    NonStrokeCmyk,
    Shading,
    XObject,
    InlineImage,
    InlineImagePrelude,
    CharSpacing,
    WordSpacing,
    HorizontalScaling,
    TextLeading,
    TextFont,
    TextRenderingMode,
    TextRise,
    BeginText,
    EndText,
    NextLine,
    NextLineAndSetLeading,
    SetTextMatrix,
    NextLineUsingLeading,
    ShowText,
    NextLineAndShowText,
    ShowTextWithParameters,
    ShowTexts,
    MarkedContent,
    Compatibility,
    GlyphMetrics,
}

static OPERATORS: phf::Map<&'static str, OpKind> = phf::phf_map! {
    "q" => OpKind::SaveState,
    "Q" => OpKind::RestoreState,
    "cm" => OpKind::Transform,
    "w" => OpKind::LineWidth,
    "J" => OpKind::LineCap,
    "j" => OpKind::LineJoin,
    "M" => OpKind::MiterLimit,
    "d" => OpKind::DashPattern,
    "ri" => OpKind::RenderingIntent,
    "i" => OpKind::Flatness,
    "gs" => OpKind::SetGraphicsState,
    "m" => OpKind::MoveTo,
    "l" => OpKind::LineTo,
    "c" => OpKind::CubicTo,
    "v" => OpKind::CubicStartTo,
    "y" => OpKind::CubicEndTo,
    "h" => OpKind::ClosePath,
    "re" => OpKind::RectPath,
    "S" => OpKind::StrokePath,
    "s" => OpKind::CloseAndStrokePath,
    "f" => OpKind::FillNonZero,
    "F" => OpKind::FillNonZeroCompatibility,
    "f*" => OpKind::FillEvenOdd,
    "B" => OpKind::FillAndStrokeNonZero,
    "B*" => OpKind::FillAndStrokeEvenOdd,
    "b" => OpKind::CloseFillAndStrokeNonZero,
    "b*" => OpKind::CloseFillAndStrokeEvenOdd,
    "n" => OpKind::EndPath,
    "W" => OpKind::ClipNonZero,
    "W*" => OpKind::ClipEvenOdd,
    "CS" => OpKind::ColorSpaceStroke,
    "cs" => OpKind::ColorSpaceNonStroke,
    "SC" => OpKind::StrokeColor,
    "sc" => OpKind::NonStrokeColor,
    "SCN" => OpKind::StrokeColorNamed,
    "scn" => OpKind::NonStrokeColorNamed,
    "G" => OpKind::StrokeGray,
    "g" => OpKind::NonStrokeGray,
    "RG" => OpKind::StrokeRgb,
    "rg" => OpKind::NonStrokeRgb,
    "K" => OpKind::StrokeCmyk,
    "k" => OpKind::NonStrokeCmyk,
    "sh" => OpKind::Shading,
    "Do" => OpKind::XObject,
    "BI" => OpKind::InlineImagePrelude,
    "ID" => OpKind::InlineImagePrelude,
    "EI" => OpKind::InlineImage,
    "Tc" => OpKind::CharSpacing,
    "Tw" => OpKind::WordSpacing,
    "Tz" => OpKind::HorizontalScaling,
    "TL" => OpKind::TextLeading,
    "Tf" => OpKind::TextFont,
    "Tr" => OpKind::TextRenderingMode,
    "Ts" => OpKind::TextRise,
    "BT" => OpKind::BeginText,
    "ET" => OpKind::EndText,
    "Td" => OpKind::NextLine,
    "TD" => OpKind::NextLineAndSetLeading,
    "Tm" => OpKind::SetTextMatrix,
    "T*" => OpKind::NextLineUsingLeading,
    "Tj" => OpKind::ShowText,
    "'" => OpKind::NextLineAndShowText,
    "\"" => OpKind::ShowTextWithParameters,
    "TJ" => OpKind::ShowTexts,
    "MP" => OpKind::MarkedContent,
    "DP" => OpKind::MarkedContent,
    "BMC" => OpKind::MarkedContent,
    "BDC" => OpKind::MarkedContent,
    "EMC" => OpKind::MarkedContent,
    "BX" => OpKind::Compatibility,
    "EX" => OpKind::Compatibility,
    "d0" => OpKind::GlyphMetrics,
    "d1" => OpKind::GlyphMetrics,
};

/// The outcome of decoding one raw operation.
pub enum Decoded {
    /// A recognized, well-formed operator.
    Op(Op),
    /// A recognized operator with operands of the wrong shape.
    Malformed,
    /// An operator this interpreter does not know.
    Unknown,
}

impl Op {
    /// Decode a raw operation.
    pub fn decode(raw: &RawOperation) -> Decoded {
        let Some(kind) = OPERATORS.get(raw.operator.as_str()) else {
            return Decoded::Unknown;
        };

        match Self::extract(*kind, &raw.operands) {
            Some(op) => Decoded::Op(op),
            None => Decoded::Malformed,
        }
    }

    fn extract(kind: OpKind, o: &[Operand]) -> Option<Self> {
        let f = |i: usize| o.get(i).and_then(Operand::as_f32);
        let d = |i: usize| o.get(i).and_then(Operand::as_f64);
        let name = |i: usize| o.get(i).and_then(Operand::as_name).map(str::to_owned);
        let point = |i: usize| Some(Point::new(d(i)?, d(i + 1)?));
        let matrix = || {
            Some(Affine::new([
                d(0)?,
                d(1)?,
                d(2)?,
                d(3)?,
                d(4)?,
                d(5)?,
            ]))
        };
        let numbers = |ops: &[Operand]| {
            ops.iter()
                .map(Operand::as_f32)
                .collect::<Option<SmallVec<[f32; 4]>>>()
        };

        Some(match kind {
            OpKind::SaveState => Self::SaveState,
            OpKind::RestoreState => Self::RestoreState,
            OpKind::Transform => Self::Transform(matrix()?),
            OpKind::LineWidth => Self::LineWidth(f(0)?),
            OpKind::LineCap => Self::LineCap(o.first()?.as_i32()?),
            OpKind::LineJoin => Self::LineJoin(o.first()?.as_i32()?),
            OpKind::MiterLimit => Self::MiterLimit(f(0)?),
            OpKind::DashPattern => {
                let array = numbers(o.first()?.as_array()?)?;
                Self::DashPattern(array, f(1)?)
            }
            OpKind::RenderingIntent => Self::RenderingIntent,
            OpKind::Flatness => Self::Flatness,
            OpKind::SetGraphicsState => Self::SetGraphicsState(name(0)?),
            OpKind::MoveTo => Self::MoveTo(point(0)?),
            OpKind::LineTo => Self::LineTo(point(0)?),
            OpKind::CubicTo => Self::CubicTo(point(0)?, point(2)?, point(4)?),
            OpKind::CubicStartTo => Self::CubicStartTo(point(0)?, point(2)?),
            OpKind::CubicEndTo => Self::CubicEndTo(point(0)?, point(2)?),
            OpKind::ClosePath => Self::ClosePath,
            OpKind::RectPath => Self::RectPath(d(0)?, d(1)?, d(2)?, d(3)?),
            OpKind::StrokePath => Self::StrokePath,
            OpKind::CloseAndStrokePath => Self::CloseAndStrokePath,
            OpKind::FillNonZero => Self::FillNonZero,
            OpKind::FillNonZeroCompatibility => Self::FillNonZeroCompatibility,
            OpKind::FillEvenOdd => Self::FillEvenOdd,
            OpKind::FillAndStrokeNonZero => Self::FillAndStrokeNonZero,
            OpKind::FillAndStrokeEvenOdd => Self::FillAndStrokeEvenOdd,
            OpKind::CloseFillAndStrokeNonZero => Self::CloseFillAndStrokeNonZero,
            OpKind::CloseFillAndStrokeEvenOdd => Self::CloseFillAndStrokeEvenOdd,
            OpKind::EndPath => Self::EndPath,
            OpKind::ClipNonZero => Self::ClipNonZero,
            OpKind::ClipEvenOdd => Self::ClipEvenOdd,
            OpKind::ColorSpaceStroke => Self::ColorSpaceStroke(name(0)?),
            OpKind::ColorSpaceNonStroke => Self::ColorSpaceNonStroke(name(0)?),
            OpKind::StrokeColor => Self::StrokeColor(numbers(o)?),
            OpKind::NonStrokeColor => Self::NonStrokeColor(numbers(o)?),
            OpKind::StrokeColorNamed | OpKind::NonStrokeColorNamed => {
                let (components, pattern) = match o.last() {
                    Some(Operand::Name(n)) => {
                        (numbers(&o[..o.len() - 1])?, Some(n.clone()))
                    }
                    _ => (numbers(o)?, None),
                };

                if kind == OpKind::StrokeColorNamed {
                    Self::StrokeColorNamed(components, pattern)
                } else {
                    Self::NonStrokeColorNamed(components, pattern)
                }
            }
            OpKind::StrokeGray => Self::StrokeGray(f(0)?),
            OpKind::NonStrokeGray => Self::NonStrokeGray(f(0)?),
            OpKind::StrokeRgb => Self::StrokeRgb(f(0)?, f(1)?, f(2)?),
            OpKind::NonStrokeRgb => Self::NonStrokeRgb(f(0)?, f(1)?, f(2)?),
            OpKind::StrokeCmyk => Self::StrokeCmyk(f(0)?, f(1)?, f(2)?, f(3)?),
            OpKind::NonStrokeCmyk => Self::NonStrokeCmyk(f(0)?, f(1)?, f(2)?, f(3)?),
            OpKind::Shading => Self::Shading(name(0)?),
            OpKind::XObject => Self::XObject(name(0)?),
            OpKind::InlineImage => match o.first()? {
                Operand::Image(image) => Self::InlineImage(image.clone()),
                _ => return None,
            },
            OpKind::InlineImagePrelude => Self::InlineImagePrelude,
            OpKind::CharSpacing => Self::CharSpacing(f(0)?),
            OpKind::WordSpacing => Self::WordSpacing(f(0)?),
            OpKind::HorizontalScaling => Self::HorizontalScaling(f(0)?),
            OpKind::TextLeading => Self::TextLeading(f(0)?),
            OpKind::TextFont => Self::TextFont(name(0)?, f(1)?),
            OpKind::TextRenderingMode => Self::TextRenderingMode(o.first()?.as_i32()?),
            OpKind::TextRise => Self::TextRise(f(0)?),
            OpKind::BeginText => Self::BeginText,
            OpKind::EndText => Self::EndText,
            OpKind::NextLine => Self::NextLine(d(0)?, d(1)?),
            OpKind::NextLineAndSetLeading => Self::NextLineAndSetLeading(d(0)?, d(1)?),
            OpKind::SetTextMatrix => Self::SetTextMatrix(matrix()?),
            OpKind::NextLineUsingLeading => Self::NextLineUsingLeading,
            OpKind::ShowText => Self::ShowText(o.first()?.as_string()?.to_vec()),
            OpKind::NextLineAndShowText => {
                Self::NextLineAndShowText(o.first()?.as_string()?.to_vec())
            }
            OpKind::ShowTextWithParameters => {
                Self::ShowTextWithParameters(f(0)?, f(1)?, o.get(2)?.as_string()?.to_vec())
            }
            OpKind::ShowTexts => {
                let items = o
                    .first()?
                    .as_array()?
                    .iter()
                    .filter_map(|item| match item {
                        Operand::Number(n) => Some(TextItem::Adjust(*n as f32)),
                        Operand::String(s) => Some(TextItem::Show(s.clone())),
                        _ => None,
                    })
                    .collect();
                Self::ShowTexts(items)
            }
            OpKind::MarkedContent => Self::MarkedContent,
            OpKind::Compatibility => Self::Compatibility,
            OpKind::GlyphMetrics => Self::GlyphMetrics,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(op: &str, operands: &[Operand]) -> RawOperation {
        RawOperation::new(op, operands.to_vec())
    }

    #[test]
    fn decodes_path_operators() {
        let decoded = Op::decode(&raw("m", &[Operand::Number(1.0), Operand::Number(2.0)]));
        assert!(matches!(decoded, Decoded::Op(Op::MoveTo(p)) if p == Point::new(1.0, 2.0)));

        let decoded = Op::decode(&raw("re", &[0.0, 0.0, 10.0, 20.0].map(Operand::Number)));
        assert!(matches!(
            decoded,
            Decoded::Op(Op::RectPath(0.0, 0.0, 10.0, 20.0))
        ));
    }

    #[test]
    fn unknown_operator_is_flagged_not_fatal() {
        assert!(matches!(Op::decode(&raw("xyz", &[])), Decoded::Unknown));
    }

    #[test]
    fn wrong_operand_shape_is_malformed() {
        let decoded = Op::decode(&raw("m", &[Operand::Number(1.0)]));
        assert!(matches!(decoded, Decoded::Malformed));

        let decoded = Op::decode(&raw("Tf", &[Operand::Number(12.0)]));
        assert!(matches!(decoded, Decoded::Malformed));
    }

    #[test]
    fn scn_with_trailing_name_selects_a_pattern() {
        let decoded = Op::decode(&raw(
            "scn",
            &[Operand::Name("P1".into())],
        ));
        match decoded {
            Decoded::Op(Op::NonStrokeColorNamed(components, Some(name))) => {
                assert!(components.is_empty());
                assert_eq!(name, "P1");
            }
            _ => panic!("expected a named colour"),
        }
    }

    #[test]
    fn tj_array_mixes_strings_and_adjustments() {
        let decoded = Op::decode(&raw(
            "TJ",
            &[Operand::Array(vec![
                Operand::String(b"ab".to_vec()),
                Operand::Number(-250.0),
                Operand::String(b"c".to_vec()),
            ])],
        ));
        match decoded {
            Decoded::Op(Op::ShowTexts(items)) => {
                assert_eq!(items.len(), 3);
                assert!(matches!(&items[1], TextItem::Adjust(a) if *a == -250.0));
            }
            _ => panic!("expected a TJ decode"),
        }
    }

    #[test]
    fn dash_pattern_decodes_array_and_phase() {
        let decoded = Op::decode(&raw(
            "d",
            &[
                Operand::Array(vec![Operand::Number(3.0), Operand::Number(1.0)]),
                Operand::Number(0.5),
            ],
        ));
        match decoded {
            Decoded::Op(Op::DashPattern(array, phase)) => {
                assert_eq!(array.as_slice(), &[3.0, 1.0]);
                assert_eq!(phase, 0.5);
            }
            _ => panic!("expected a dash pattern"),
        }
    }
}
