//! Payload sum type and compile-time variant indexing.
//!
//! A bus carries a closed set of message types expressed as one enum. The
//! [`payload!`](crate::payload) macro generates the enum together with the
//! two traits below: [`Payload`] gives the bus a runtime discriminant to
//! key the subscription table, and [`VariantOf`] gives subscribers the
//! compile-time index and typed extraction for a single variant.
//!
//! The variant set is fixed at compile time; there is no runtime type
//! registration. Enums larger than
//! [`MAX_PAYLOAD_VARIANTS`](crate::config::MAX_PAYLOAD_VARIANTS) are
//! rejected at build time.

/// A closed payload sum type a bus can transport.
///
/// Implemented by the `payload!` macro; manual implementations must keep
/// `discriminant()` consistent with each variant's [`VariantOf::INDEX`].
pub trait Payload: Send + 'static {
    /// Number of variants in the sum type
    const VARIANT_COUNT: usize;

    /// Discriminant of this value, in `[0, VARIANT_COUNT)`
    fn discriminant(&self) -> usize;
}

/// A single variant type of the payload sum type `P`.
pub trait VariantOf<P: Payload>: Sized + Send + 'static {
    /// Compile-time index of this variant within `P`
    const INDEX: usize;

    /// Extract a reference to this variant, or `None` when `payload` holds
    /// a different one.
    fn from_payload(payload: &P) -> Option<&Self>;
}

/// Define a closed payload enum with compile-time variant indexing.
///
/// Generates the enum itself, [`Payload`], one [`VariantOf`] impl per
/// variant type, and `From<T>` conversions so variants publish directly:
///
/// ```rust
/// use ferrobus_core::payload;
///
/// #[derive(Debug, Clone)]
/// pub struct SensorReading { pub temperature: f32 }
/// #[derive(Debug, Clone)]
/// pub struct MotorCommand { pub speed: i32 }
///
/// payload! {
///     pub enum RobotPayload {
///         Sensor(SensorReading),
///         Motor(MotorCommand),
///     }
/// }
///
/// use ferrobus_core::{Payload, VariantOf};
/// assert_eq!(RobotPayload::VARIANT_COUNT, 2);
/// assert_eq!(<MotorCommand as VariantOf<RobotPayload>>::INDEX, 1);
/// ```
///
/// Each variant type may appear only once; the variant count must not
/// exceed `MAX_PAYLOAD_VARIANTS`.
#[macro_export]
macro_rules! payload {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $($variant:ident($ty:ty)),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        $vis enum $name {
            $($variant($ty)),+
        }

        impl $crate::bus::payload::Payload for $name {
            const VARIANT_COUNT: usize = $crate::payload!(@count $($variant)+);

            #[inline]
            fn discriminant(&self) -> usize {
                match self {
                    $(Self::$variant(_) =>
                        <$ty as $crate::bus::payload::VariantOf<$name>>::INDEX),+
                }
            }
        }

        const _: () = assert!(
            <$name as $crate::bus::payload::Payload>::VARIANT_COUNT
                <= $crate::config::MAX_PAYLOAD_VARIANTS,
            "payload! enum exceeds MAX_PAYLOAD_VARIANTS"
        );

        $crate::payload!(@variant_impls $name, 0usize, $($variant($ty)),+);

        $(
            impl ::core::convert::From<$ty> for $name {
                #[inline]
                fn from(value: $ty) -> Self {
                    Self::$variant(value)
                }
            }
        )+
    };

    (@count) => { 0usize };
    (@count $head:ident $($rest:ident)*) => { 1usize + $crate::payload!(@count $($rest)*) };

    (@variant_impls $name:ident, $idx:expr, $variant:ident($ty:ty)) => {
        impl $crate::bus::payload::VariantOf<$name> for $ty {
            const INDEX: usize = $idx;

            #[inline]
            #[allow(unreachable_patterns)]
            fn from_payload(payload: &$name) -> ::core::option::Option<&Self> {
                match payload {
                    $name::$variant(value) => ::core::option::Option::Some(value),
                    _ => ::core::option::Option::None,
                }
            }
        }
    };
    (@variant_impls $name:ident, $idx:expr, $variant:ident($ty:ty), $($rest:ident($rty:ty)),+) => {
        $crate::payload!(@variant_impls $name, $idx, $variant($ty));
        $crate::payload!(@variant_impls $name, $idx + 1usize, $($rest($rty)),+);
    };
}
