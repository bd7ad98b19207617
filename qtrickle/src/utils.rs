use core::fmt;

/// Creates an enum that can be converted from and to a primitive type, with invalid values becoming
/// a catch-all `Unknown` variant.
macro_rules! enum_with_unknown {
    (
        $( #[$enum_attr:meta] )*
        $v:vis enum $name:ident($ty:ty) {
            $(
              $( #[$variant_attr:meta] )*
              $variant:ident = $value:expr $(,)*
            ),*
        }
    ) => {
        $( #[$enum_attr] )*
        $v enum $name {
            $(
              $( #[$variant_attr] )*
              $variant,
            )*
            Unknown($ty)
        }

        impl ::core::convert::From<$ty> for $name {
            fn from(value: $ty) -> Self {
                match value {
                    $( $value => $name::$variant, )*
                    other => $name::Unknown(other)
                }
            }
        }

        impl ::core::convert::From<$name> for $ty {
            fn from(value: $name) -> Self {
                match value {
                    $( $name::$variant => $value, )*
                    $name::Unknown(other) => other
                }
            }
        }
    }
}

/// `Debug`-formats its contents as a hexadecimal byte slice.
#[derive(Copy, Clone)]
pub struct HexSlice<T>(pub T)
where
    T: AsRef<[u8]>;

impl<T: AsRef<[u8]>> fmt::Debug for HexSlice<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, byte) in self.0.as_ref().iter().enumerate() {
            if i != 0 {
                f.write_str(" ")?;
            }
            write!(f, "{:02x}", byte)?;
        }
        f.write_str("]")
    }
}

/// Rounds a non-negative `f32` up to the next integer.
///
/// `core` has no `f32::ceil` without `std`, so this does it by truncation. Negative and NaN inputs
/// yield 0, values above `u32::MAX` saturate.
pub fn ceil_u32(value: f32) -> u32 {
    let truncated = value as u32;
    if (truncated as f32) < value {
        truncated.saturating_add(1)
    } else {
        truncated
    }
}

/// Divides `num` by `den` as `f32`, returning 0 for a zero denominator.
pub fn ratio(num: u32, den: u32) -> f32 {
    if den == 0 {
        0.0
    } else {
        num as f32 / den as f32
    }
}

/// Narrows a counter to `u16`, saturating at `u16::MAX`.
pub fn saturate_u16(value: u32) -> u16 {
    if value > u32::from(u16::MAX) {
        u16::MAX
    } else {
        value as u16
    }
}

/// Draws a uniformly distributed value in `0..=span` from `rng`.
pub fn uniform_inclusive<R: rand_core::RngCore + ?Sized>(rng: &mut R, span: u32) -> u32 {
    match span.checked_add(1) {
        Some(modulus) => rng.next_u32() % modulus,
        None => rng.next_u32(),
    }
}

/// Draws an `f32` in `[0, 1)` from `rng`, using 24 random bits.
pub fn unit_interval<R: rand_core::RngCore + ?Sized>(rng: &mut R) -> f32 {
    (rng.next_u32() >> 8) as f32 / (1u32 << 24) as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ceil() {
        assert_eq!(ceil_u32(0.0), 0);
        assert_eq!(ceil_u32(0.01), 1);
        assert_eq!(ceil_u32(2.0), 2);
        assert_eq!(ceil_u32(2.5), 3);
        assert_eq!(ceil_u32(-1.5), 0);
        assert_eq!(ceil_u32(f32::NAN), 0);
    }

    #[test]
    fn ratio_zero_denominator() {
        assert_eq!(ratio(5, 0), 0.0);
        assert_eq!(ratio(1, 4), 0.25);
    }

    #[test]
    fn saturate() {
        assert_eq!(saturate_u16(7), 7);
        assert_eq!(saturate_u16(70_000), u16::MAX);
    }

    #[test]
    fn hex_slice() {
        let s = format!("{:?}", HexSlice(&[0x01u8, 0xab, 0x00][..]));
        assert_eq!(s, "[01 ab 00]");
    }
}
