//! Soft masks as carried in the graphics state.

use std::fmt::{self, Debug, Formatter};
use std::sync::Arc;

use kurbo::Affine;

use crate::color::ColorComponents;
use crate::error::UnsupportedFeature;
use crate::resource::{FormXObject, SoftMaskDef};

/// The subtype of a soft mask.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MaskKind {
    /// Mask values are derived from the luminosity of the rendered
    /// group.
    Luminosity,
    /// Mask values are the alpha channel of the rendered group.
    Alpha,
}

/// An active soft mask.
///
/// Captures the transform current when the mask was installed: the mask
/// group is anchored there, not wherever the mask later gets used.
#[derive(Clone)]
pub struct SoftMask {
    /// The mask subtype.
    pub kind: MaskKind,
    /// The group rendered to obtain mask values.
    pub group: Arc<FormXObject>,
    /// The backdrop colour for luminosity masks.
    pub backdrop: Option<ColorComponents>,
    /// The transform at install time.
    pub ctm: Affine,
}

impl Debug for SoftMask {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "SoftMask({:?})", self.kind)
    }
}

impl SoftMask {
    /// Resolve a soft-mask definition against the transform at install
    /// time.
    ///
    /// A subtype other than `Luminosity` or `Alpha` is refused: guessing
    /// at its meaning would silently corrupt the rendition.
    pub fn new(def: &SoftMaskDef, ctm: Affine) -> Result<Self, UnsupportedFeature> {
        let kind = match &*def.subtype {
            "Luminosity" => MaskKind::Luminosity,
            "Alpha" => MaskKind::Alpha,
            other => {
                return Err(UnsupportedFeature::InvalidSoftMaskSubtype(other.into()));
            }
        };

        Ok(Self {
            kind,
            group: def.group.clone(),
            backdrop: if kind == MaskKind::Luminosity {
                def.backdrop.clone()
            } else {
                None
            },
            ctm,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::NoResources;
    use kurbo::Rect;
    use smallvec::smallvec;

    fn def(subtype: &str) -> SoftMaskDef {
        SoftMaskDef {
            subtype: subtype.into(),
            group: Arc::new(FormXObject {
                matrix: Affine::IDENTITY,
                bbox: Rect::new(0.0, 0.0, 10.0, 10.0),
                group: None,
                content: vec![],
                resources: Arc::new(NoResources),
            }),
            backdrop: Some(smallvec![1.0]),
        }
    }

    #[test]
    fn invalid_subtype_is_refused() {
        let err = SoftMask::new(&def("Shape"), Affine::IDENTITY).unwrap_err();
        assert!(matches!(
            err,
            UnsupportedFeature::InvalidSoftMaskSubtype(_)
        ));
    }

    #[test]
    fn alpha_masks_drop_the_backdrop() {
        let mask = SoftMask::new(&def("Alpha"), Affine::IDENTITY).unwrap();
        assert_eq!(mask.kind, MaskKind::Alpha);
        assert!(mask.backdrop.is_none());

        let mask = SoftMask::new(&def("Luminosity"), Affine::IDENTITY).unwrap();
        assert!(mask.backdrop.is_some());
    }
}
