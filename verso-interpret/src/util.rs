use std::hash::{Hash, Hasher};

use siphasher::sip128::{Hasher128, SipHasher13};

/// Hash an object into a 128-bit cache key.
pub(crate) fn hash128<T: Hash + ?Sized>(value: &T) -> u128 {
    let mut state = SipHasher13::new();
    value.hash(&mut state);
    state.finish128().as_u128()
}

/// The uniform scale factor of an affine transform, used to map line widths
/// and dash lengths into device space.
pub(crate) fn uniform_scale(transform: &kurbo::Affine) -> f32 {
    let c = transform.as_coeffs();
    let sx = (c[0] * c[0] + c[1] * c[1]).sqrt();
    let sy = (c[2] * c[2] + c[3] * c[3]).sqrt();

    (sx * sy).sqrt() as f32
}

#[cfg(test)]
mod tests {
    use super::*;
    use kurbo::Affine;

    #[test]
    fn uniform_scale_of_plain_scaling() {
        let t = Affine::scale_non_uniform(2.0, 8.0);
        assert!((uniform_scale(&t) - 4.0).abs() < 1e-6);
    }

    #[test]
    fn uniform_scale_unaffected_by_rotation() {
        let t = Affine::rotate(1.1) * Affine::scale(3.0);
        assert!((uniform_scale(&t) - 3.0).abs() < 1e-4);
    }

    #[test]
    fn hash128_is_stable_per_value() {
        assert_eq!(hash128(&(1u32, "a")), hash128(&(1u32, "a")));
        assert_ne!(hash128(&(1u32, "a")), hash128(&(2u32, "a")));
    }
}
