//! The type-to-descriptor table.
//!
//! Every host type that can cross the boundary implements [`JavaType`],
//! whose associated constants are evaluated at compile time. Types with no
//! entry simply do not implement the trait, so using one in a signature is a
//! build failure:
//!
//! ```compile_fail
//! use jbridge_core::{signature, Descriptor};
//!
//! // `u8` has no foreign counterpart.
//! const SIG: Descriptor = signature::<(), (u8,)>();
//! ```
//!
//! ```compile_fail
//! use jbridge_core::{signature, Descriptor};
//!
//! // "No value" is a return type only.
//! const SIG: Descriptor = signature::<(), ((),)>();
//! ```

use std::fmt::Debug;

use crate::descriptor::Descriptor;
use crate::kind::{PrimitiveKind, TypeClass, ValueKind};
use crate::value::{JObject, JValue};

/// A host type with a foreign descriptor.
pub trait JavaType: 'static {
    const DESCRIPTOR: Descriptor;
    const KIND: ValueKind;
    const CLASS: TypeClass;
}

/// Types allowed in a parameter list: everything except `()`.
pub trait Parameter: JavaType {}

/// Object-like types, passed as handles.
pub trait ReferenceType: JavaType {
    /// Name accepted by class lookup: the internal name of a class, or the
    /// full descriptor of an array type.
    const LOOKUP_NAME: Descriptor;
}

impl<T: ReferenceType> Parameter for T {}

mod sealed {
    pub trait Sealed {}
}

/// The eight primitive types.
pub trait Primitive:
    JavaType + Parameter + Copy + Default + PartialEq + Debug + Send + Sync + sealed::Sealed
{
    const PRIMITIVE: PrimitiveKind;

    fn into_value(self) -> JValue;

    fn from_value(value: JValue) -> Option<Self>;
}

// ============================================================================
// Table entries
// ============================================================================

macro_rules! impl_primitive {
    ($($ty:ty => $kind:ident),* $(,)?) => {
        $(
            impl sealed::Sealed for $ty {}

            impl JavaType for $ty {
                const DESCRIPTOR: Descriptor = Descriptor::primitive(PrimitiveKind::$kind);
                const KIND: ValueKind = ValueKind::$kind;
                const CLASS: TypeClass = TypeClass::Primitive(PrimitiveKind::$kind);
            }

            impl Parameter for $ty {}

            impl Primitive for $ty {
                const PRIMITIVE: PrimitiveKind = PrimitiveKind::$kind;

                #[inline]
                fn into_value(self) -> JValue {
                    JValue::$kind(self)
                }

                #[inline]
                fn from_value(value: JValue) -> Option<Self> {
                    match value {
                        JValue::$kind(v) => Some(v),
                        _ => None,
                    }
                }
            }
        )*
    };
}

impl_primitive!(
    bool => Boolean,
    i8 => Byte,
    u16 => Char,
    i16 => Short,
    i32 => Int,
    i64 => Long,
    f32 => Float,
    f64 => Double,
);

impl JavaType for () {
    const DESCRIPTOR: Descriptor = Descriptor::VOID;
    const KIND: ValueKind = ValueKind::Void;
    const CLASS: TypeClass = TypeClass::Void;
}

const OBJECT_NAME: Descriptor = Descriptor::new("java/lang/Object");

impl JavaType for JObject {
    const DESCRIPTOR: Descriptor = Descriptor::object(&OBJECT_NAME);
    const KIND: ValueKind = ValueKind::Object;
    const CLASS: TypeClass = TypeClass::Raw;
}

impl ReferenceType for JObject {
    const LOOKUP_NAME: Descriptor = OBJECT_NAME;
}

/// A nullable reference has the descriptor of the reference.
impl<T: ReferenceType> JavaType for Option<T> {
    const DESCRIPTOR: Descriptor = T::DESCRIPTOR;
    const KIND: ValueKind = ValueKind::Object;
    const CLASS: TypeClass = T::CLASS;
}

impl<T: ReferenceType> ReferenceType for Option<T> {
    const LOOKUP_NAME: Descriptor = T::LOOKUP_NAME;
}

// ============================================================================
// Parameter lists
// ============================================================================

/// A parameter list, as a tuple of [`Parameter`] types.
pub trait Params: 'static {
    /// `(` + each parameter descriptor in order + `)`.
    const DESCRIPTOR: Descriptor;
    const COUNT: usize;
}

macro_rules! impl_params {
    ($($name:ident)*) => {
        impl<$($name: Parameter),*> Params for ($($name,)*) {
            const DESCRIPTOR: Descriptor = Descriptor::EMPTY
                .push_byte(b'(')
                $(.append(&<$name as JavaType>::DESCRIPTOR))*
                .push_byte(b')');
            const COUNT: usize = <[&str]>::len(&[$(stringify!($name)),*]);
        }
    };
}

impl_params!();
impl_params!(A);
impl_params!(A B);
impl_params!(A B C);
impl_params!(A B C D);
impl_params!(A B C D E);
impl_params!(A B C D E F);
impl_params!(A B C D E F G);
impl_params!(A B C D E F G H);
impl_params!(A B C D E F G H I);
impl_params!(A B C D E F G H I J);

/// Method signature for return type `R` and parameter tuple `P`.
///
/// ```
/// use jbridge_core::{signature, Descriptor};
///
/// const SIG: Descriptor = signature::<i64, (i32, bool)>();
/// assert_eq!(SIG.as_str(), "(IZ)J");
/// ```
pub const fn signature<R: JavaType, P: Params>() -> Descriptor {
    P::DESCRIPTOR.append(&R::DESCRIPTOR)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primitive_table() {
        assert_eq!(bool::DESCRIPTOR, "Z");
        assert_eq!(i8::DESCRIPTOR, "B");
        assert_eq!(u16::DESCRIPTOR, "C");
        assert_eq!(i16::DESCRIPTOR, "S");
        assert_eq!(i32::DESCRIPTOR, "I");
        assert_eq!(i64::DESCRIPTOR, "J");
        assert_eq!(f32::DESCRIPTOR, "F");
        assert_eq!(f64::DESCRIPTOR, "D");
        assert_eq!(<() as JavaType>::DESCRIPTOR, "V");
    }

    #[test]
    fn primitive_values() {
        assert_eq!(7i32.into_value(), JValue::Int(7));
        assert_eq!(i64::from_value(JValue::Long(-1)), Some(-1));
        assert_eq!(i64::from_value(JValue::Int(-1)), None);
        assert_eq!(u16::from_value(JValue::Char(120)), Some(120));
    }

    #[test]
    fn raw_object() {
        assert_eq!(JObject::DESCRIPTOR, "Ljava/lang/Object;");
        assert_eq!(JObject::CLASS, TypeClass::Raw);
        assert_eq!(Option::<JObject>::DESCRIPTOR, "Ljava/lang/Object;");
    }

    #[test]
    fn parameter_lists() {
        assert_eq!(<() as JavaType>::DESCRIPTOR, "V");
        assert_eq!(<() as Params>::DESCRIPTOR, "()");
        assert_eq!(<(i32,) as Params>::DESCRIPTOR, "(I)");
        assert_eq!(<(bool, f64, JObject) as Params>::DESCRIPTOR, "(ZDLjava/lang/Object;)");
        assert_eq!(<() as Params>::COUNT, 0);
        assert_eq!(<(i8, i8, i8) as Params>::COUNT, 3);
    }

    #[test]
    fn signatures_keep_parameter_order() {
        assert_eq!(signature::<(), (i32, i64)>(), "(IJ)V");
        assert_eq!(signature::<(), (i64, i32)>(), "(JI)V");
        assert_eq!(signature::<f32, ()>(), "()F");
    }
}
