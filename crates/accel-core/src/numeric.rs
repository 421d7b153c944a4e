//! Element types that can live in device buffers
//!
//! `Numeric` describes any plain-old-data number the host can hold; only two
//! of them, `i32` and `f32`, have device kernels. [`ElementKind::check`] is the
//! type-check step that maps an element type onto one of those two variants
//! and rejects everything else before a device is touched.
//!
//! The per-type policies (kernel name tag, whether work-group recursion is
//! available, how the standard deviation is finished) live on [`ElementKind`]
//! so the engine never branches on a type name.

use bytemuck::Pod;
use num_traits::Num;
use serde::{Deserialize, Serialize};
use std::fmt::{Debug, Display};
use std::str::FromStr;

use crate::{Error, Result};

/// Base trait for numeric element types
pub trait Numeric:
    Pod + Num + Copy + PartialOrd + Debug + Display + FromStr + Send + Sync + 'static
{
    /// Device kernel family for this type, `None` when no kernels exist
    const KIND: Option<ElementKind> = None;

    /// Smallest representable finite value (identity for `max`)
    fn lowest() -> Self;

    /// Largest representable finite value (identity for `min`)
    fn highest() -> Self;

    /// Addition with device semantics (integers wrap)
    fn accumulate(self, other: Self) -> Self;

    /// Convert from f64 (for creating constants)
    fn from_f64(val: f64) -> Self;

    /// Convert to f64 (for operations that need f64)
    fn to_f64(&self) -> f64;

    /// Parse one input token, `None` when it holds no value of this type
    ///
    /// Integers take the leading `[+-]digits` prefix and ignore the rest, so
    /// `12.5` reads as 12. Floats must parse in full.
    fn parse_token(token: &str) -> Option<Self> {
        token.parse().ok()
    }
}

/// Length of the leading `[+-]?[0-9]+` run of `token`, 0 when there is none
fn integer_prefix_len(token: &str) -> usize {
    let bytes = token.as_bytes();
    let sign = usize::from(matches!(bytes.first(), Some(b'+' | b'-')));
    let digits = bytes[sign..].iter().take_while(|b| b.is_ascii_digit()).count();
    if digits == 0 {
        0
    } else {
        sign + digits
    }
}

/// The two element variants with device kernels
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ElementKind {
    /// 32-bit signed integers, kernels suffixed `_INT`
    Int,
    /// 32-bit floats, kernels suffixed `_FLOAT`
    Float,
}

/// How the standard deviation slot read back from the device is finished
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StdDevPolicy {
    /// Device returns the sum of squared deviations; host divides and takes the root
    HostFinalize,
    /// Device returns the standard deviation itself
    DeviceFinal,
}

impl ElementKind {
    /// Type-check an element type, failing for anything without kernels
    pub fn check<T: Numeric>() -> Result<Self> {
        T::KIND.ok_or(Error::UnsupportedElementType(std::any::type_name::<T>()))
    }

    /// Suffix used in device kernel names
    pub fn tag(self) -> &'static str {
        match self {
            Self::Int => "INT",
            Self::Float => "FLOAT",
        }
    }

    /// Whether `*_WG_REDUCE_*` kernels exist for this variant
    pub fn supports_group_recursion(self) -> bool {
        matches!(self, Self::Float)
    }

    /// Standard deviation finalisation contract of this variant's `std` kernel
    pub fn std_dev_policy(self) -> StdDevPolicy {
        match self {
            Self::Int => StdDevPolicy::HostFinalize,
            Self::Float => StdDevPolicy::DeviceFinal,
        }
    }
}

impl Display for ElementKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tag())
    }
}

impl StdDevPolicy {
    /// Turn the value read from slot 0 into the standard deviation
    pub fn finalize(self, slot: f64, raw_len: usize) -> f64 {
        match self {
            Self::HostFinalize => (slot / raw_len as f64).sqrt(),
            Self::DeviceFinal => slot,
        }
    }
}

macro_rules! impl_integer_numeric {
    ($t:ty, $kind:expr) => {
        impl Numeric for $t {
            const KIND: Option<ElementKind> = $kind;

            fn lowest() -> Self {
                <$t>::MIN
            }

            fn highest() -> Self {
                <$t>::MAX
            }

            fn accumulate(self, other: Self) -> Self {
                self.wrapping_add(other)
            }

            fn from_f64(val: f64) -> Self {
                val as $t
            }

            fn to_f64(&self) -> f64 {
                *self as f64
            }

            fn parse_token(token: &str) -> Option<Self> {
                match integer_prefix_len(token) {
                    0 => None,
                    len => token[..len].parse().ok(),
                }
            }
        }
    };
}

macro_rules! impl_float_numeric {
    ($t:ty, $kind:expr) => {
        impl Numeric for $t {
            const KIND: Option<ElementKind> = $kind;

            fn lowest() -> Self {
                <$t>::MIN
            }

            fn highest() -> Self {
                <$t>::MAX
            }

            fn accumulate(self, other: Self) -> Self {
                self + other
            }

            fn from_f64(val: f64) -> Self {
                val as $t
            }

            fn to_f64(&self) -> f64 {
                *self as f64
            }
        }
    };
}

impl_integer_numeric!(i32, Some(ElementKind::Int));
impl_integer_numeric!(u32, None);
impl_integer_numeric!(i64, None);
impl_float_numeric!(f32, Some(ElementKind::Float));
impl_float_numeric!(f64, None);
