//! Color spaces and RGB approximation.
//!
//! The engine does not do colour management; every colour space carries a
//! components-to-RGB function, either one of the built-in device
//! formulas or one injected by the caller alongside the resolved
//! resources.

use std::fmt::{self, Debug, Formatter};
use std::sync::Arc;

use smallvec::{SmallVec, smallvec};

/// Raw colour components as they appear in the content stream.
pub type ColorComponents = SmallVec<[f32; 4]>;

/// A function converting colour components into RGB, each in 0..=1.
pub type ToRgbFn = Arc<dyn Fn(&[f32]) -> [f32; 3] + Send + Sync>;

/// A colour space.
#[derive(Clone)]
pub struct ColorSpace(Arc<ColorSpaceRepr>);

struct ColorSpaceRepr {
    kind: ColorSpaceKind,
    num_components: u8,
    to_rgb: Option<ToRgbFn>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColorSpaceKind {
    DeviceGray,
    DeviceRgb,
    DeviceCmyk,
    Pattern,
    Custom,
}

impl Debug for ColorSpace {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "ColorSpace({:?})", self.0.kind)
    }
}

impl ColorSpace {
    fn new_builtin(kind: ColorSpaceKind, num_components: u8) -> Self {
        Self(Arc::new(ColorSpaceRepr {
            kind,
            num_components,
            to_rgb: None,
        }))
    }

    /// The device gray colour space.
    pub fn device_gray() -> Self {
        Self::new_builtin(ColorSpaceKind::DeviceGray, 1)
    }

    /// The device RGB colour space.
    pub fn device_rgb() -> Self {
        Self::new_builtin(ColorSpaceKind::DeviceRgb, 3)
    }

    /// The device CMYK colour space.
    pub fn device_cmyk() -> Self {
        Self::new_builtin(ColorSpaceKind::DeviceCmyk, 4)
    }

    /// The pattern colour space. Paint operations using it take their
    /// colour from the active pattern instead of the components.
    pub fn pattern() -> Self {
        Self::new_builtin(ColorSpaceKind::Pattern, 1)
    }

    /// A colour space with a caller-supplied RGB conversion.
    pub fn custom(num_components: u8, to_rgb: ToRgbFn) -> Self {
        Self(Arc::new(ColorSpaceRepr {
            kind: ColorSpaceKind::Custom,
            num_components,
            to_rgb: Some(to_rgb),
        }))
    }

    /// Resolve one of the device colour space names.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "DeviceGray" | "G" | "CalGray" => Some(Self::device_gray()),
            "DeviceRGB" | "RGB" | "CalRGB" => Some(Self::device_rgb()),
            "DeviceCMYK" | "CMYK" => Some(Self::device_cmyk()),
            "Pattern" => Some(Self::pattern()),
            _ => None,
        }
    }

    /// The number of components a colour in this space carries.
    pub fn num_components(&self) -> u8 {
        self.0.num_components
    }

    /// Whether this is the pattern colour space.
    pub fn is_pattern(&self) -> bool {
        self.0.kind == ColorSpaceKind::Pattern
    }

    /// Whether this space renders into a single gray channel.
    pub fn is_gray(&self) -> bool {
        self.0.kind == ColorSpaceKind::DeviceGray
    }

    /// The initial colour of this space (black).
    pub fn initial_color(&self) -> ColorComponents {
        match self.0.kind {
            ColorSpaceKind::DeviceCmyk => smallvec![0.0, 0.0, 0.0, 1.0],
            _ => smallvec![0.0; self.0.num_components as usize],
        }
    }

    /// Approximate the given components as RGB.
    ///
    /// Short component lists are padded with the initial colour so a
    /// malformed stream degrades instead of panicking.
    pub fn to_rgb(&self, components: &[f32]) -> [f32; 3] {
        let c = |i: usize| components.get(i).copied().unwrap_or(0.0).clamp(0.0, 1.0);

        match self.0.kind {
            ColorSpaceKind::DeviceGray => [c(0), c(0), c(0)],
            ColorSpaceKind::DeviceRgb => [c(0), c(1), c(2)],
            ColorSpaceKind::DeviceCmyk => {
                let k = c(3);
                [
                    (1.0 - c(0)) * (1.0 - k),
                    (1.0 - c(1)) * (1.0 - k),
                    (1.0 - c(2)) * (1.0 - k),
                ]
            }
            ColorSpaceKind::Pattern => [0.0, 0.0, 0.0],
            ColorSpaceKind::Custom => match &self.0.to_rgb {
                Some(f) => f(components),
                None => [0.0, 0.0, 0.0],
            },
        }
    }
}

/// A resolved RGBA colour.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    /// Red, green, blue in 0..=1.
    pub rgb: [f32; 3],
    /// Alpha in 0..=1.
    pub alpha: f32,
}

impl Color {
    /// A fully opaque black.
    pub const BLACK: Self = Self {
        rgb: [0.0, 0.0, 0.0],
        alpha: 1.0,
    };

    /// Resolve a colour from a space, components and constant alpha.
    pub fn from_components(cs: &ColorSpace, components: &[f32], alpha: f32) -> Self {
        Self {
            rgb: cs.to_rgb(components),
            alpha: alpha.clamp(0.0, 1.0),
        }
    }

    /// This colour as 8-bit RGBA.
    pub fn to_rgba8(&self) -> [u8; 4] {
        let q = |v: f32| (v.clamp(0.0, 1.0) * 255.0 + 0.5) as u8;
        [q(self.rgb[0]), q(self.rgb[1]), q(self.rgb[2]), q(self.alpha)]
    }

    /// The luminance of this colour, used for luminosity soft masks.
    pub fn luminance(&self) -> f32 {
        0.299 * self.rgb[0] + 0.587 * self.rgb[1] + 0.114 * self.rgb[2]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cmyk_black_is_black() {
        let cs = ColorSpace::device_cmyk();
        assert_eq!(cs.to_rgb(&[0.0, 0.0, 0.0, 1.0]), [0.0, 0.0, 0.0]);
    }

    #[test]
    fn cmyk_cyan() {
        let cs = ColorSpace::device_cmyk();
        let rgb = cs.to_rgb(&[1.0, 0.0, 0.0, 0.0]);
        assert_eq!(rgb, [0.0, 1.0, 1.0]);
    }

    #[test]
    fn short_component_lists_degrade_to_black() {
        let cs = ColorSpace::device_rgb();
        assert_eq!(cs.to_rgb(&[]), [0.0, 0.0, 0.0]);
    }

    #[test]
    fn custom_space_uses_injected_conversion() {
        let cs = ColorSpace::custom(1, Arc::new(|c: &[f32]| [c[0], 0.0, 1.0 - c[0]]));
        assert_eq!(cs.to_rgb(&[1.0]), [1.0, 0.0, 0.0]);
    }

    #[test]
    fn rgba8_quantization_rounds() {
        let c = Color {
            rgb: [0.5, 0.0, 1.0],
            alpha: 1.0,
        };
        assert_eq!(c.to_rgba8(), [128, 0, 255, 255]);
    }
}
