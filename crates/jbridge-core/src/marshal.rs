//! Host <-> foreign value conversion and the single dispatch entry point.
//!
//! [`IntoArg<P>`] converts a host argument for a parameter declared as `P`,
//! [`FromReturn`] converts what the runtime returned back into the declared
//! return type, and [`invoke`] routes one call through
//! [`JniEnv::call_method`](crate::runtime::JniEnv::call_method) keyed by the
//! return type's [`ValueKind`].
//!
//! Strings are the one conversion with a side effect: every string argument
//! allocates a new foreign string.

use crate::array::{ObjectArray, PrimitiveArray};
use crate::class::{JavaClass, Mirror, StringClass};
use crate::descriptor::Descriptor;
use crate::error::{Error, Result};
use crate::kind::{TypeClass, ValueKind};
use crate::logging::trace;
use crate::object::Lazy;
use crate::runtime::Env;
use crate::types::{JavaType, Parameter, Params, Primitive, ReferenceType, signature};
use crate::value::{JObject, JValue, MethodId, Target};

// ============================================================================
// Arguments
// ============================================================================

/// A host value accepted for a parameter declared as `P`.
pub trait IntoArg<P: JavaType> {
    fn into_arg(self, env: &Env) -> Result<JValue>;
}

impl<T: Primitive> IntoArg<T> for T {
    #[inline]
    fn into_arg(self, _env: &Env) -> Result<JValue> {
        Ok(self.into_value())
    }
}

impl<M: Mirror> IntoArg<M> for &M {
    #[inline]
    fn into_arg(self, _env: &Env) -> Result<JValue> {
        Ok(JValue::Object(self.raw()))
    }
}

impl<T: JavaClass> IntoArg<T> for &Lazy<T> {
    #[inline]
    fn into_arg(self, _env: &Env) -> Result<JValue> {
        Ok(JValue::Object(self.raw()))
    }
}

impl<T: JavaClass> IntoArg<Lazy<T>> for &Lazy<T> {
    #[inline]
    fn into_arg(self, _env: &Env) -> Result<JValue> {
        Ok(JValue::Object(self.raw()))
    }
}

impl<P: StringClass> IntoArg<P> for &str {
    fn into_arg(self, env: &Env) -> Result<JValue> {
        env.new_string(self).map(JValue::Object)
    }
}

impl<P: StringClass> IntoArg<P> for &String {
    fn into_arg(self, env: &Env) -> Result<JValue> {
        env.new_string(self).map(JValue::Object)
    }
}

impl<P: StringClass> IntoArg<P> for String {
    fn into_arg(self, env: &Env) -> Result<JValue> {
        env.new_string(&self).map(JValue::Object)
    }
}

impl<T: Primitive> IntoArg<PrimitiveArray<T>> for &PrimitiveArray<T> {
    #[inline]
    fn into_arg(self, _env: &Env) -> Result<JValue> {
        Ok(JValue::Object(self.raw()))
    }
}

impl<E: ReferenceType> IntoArg<ObjectArray<E>> for &ObjectArray<E> {
    #[inline]
    fn into_arg(self, _env: &Env) -> Result<JValue> {
        Ok(JValue::Object(self.raw()))
    }
}

/// Raw handles pass through for any reference parameter.
impl<P: ReferenceType> IntoArg<P> for JObject {
    #[inline]
    fn into_arg(self, _env: &Env) -> Result<JValue> {
        Ok(JValue::Object(self))
    }
}

/// `None` passes null.
impl<P: ReferenceType, A: IntoArg<P>> IntoArg<P> for Option<A> {
    fn into_arg(self, env: &Env) -> Result<JValue> {
        match self {
            Some(value) => value.into_arg(env),
            None => Ok(JValue::Object(JObject::NULL)),
        }
    }
}

/// An argument list for the parameter tuple `P`.
pub trait Args<P: Params> {
    /// Converted arguments in declared order.
    fn into_args(self, env: &Env) -> Result<Vec<JValue>>;
}

impl Args<()> for () {
    #[inline]
    fn into_args(self, _env: &Env) -> Result<Vec<JValue>> {
        Ok(Vec::new())
    }
}

macro_rules! impl_args {
    ($($param:ident $arg:ident),+) => {
        impl<$($param: Parameter, $arg: IntoArg<$param>),+> Args<($($param,)+)> for ($($arg,)+) {
            #[allow(non_snake_case)]
            fn into_args(self, env: &Env) -> Result<Vec<JValue>> {
                let ($($arg,)+) = self;
                Ok(vec![$($arg.into_arg(env)?),+])
            }
        }
    };
}

impl_args!(P1 A1);
impl_args!(P1 A1, P2 A2);
impl_args!(P1 A1, P2 A2, P3 A3);
impl_args!(P1 A1, P2 A2, P3 A3, P4 A4);
impl_args!(P1 A1, P2 A2, P3 A3, P4 A4, P5 A5);
impl_args!(P1 A1, P2 A2, P3 A3, P4 A4, P5 A5, P6 A6);
impl_args!(P1 A1, P2 A2, P3 A3, P4 A4, P5 A5, P6 A6, P7 A7);
impl_args!(P1 A1, P2 A2, P3 A3, P4 A4, P5 A5, P6 A6, P7 A7, P8 A8);
impl_args!(P1 A1, P2 A2, P3 A3, P4 A4, P5 A5, P6 A6, P7 A7, P8 A8, P9 A9);
impl_args!(P1 A1, P2 A2, P3 A3, P4 A4, P5 A5, P6 A6, P7 A7, P8 A8, P9 A9, P10 A10);

// ============================================================================
// Returns
// ============================================================================

/// A declared return type, built from the raw value the runtime returned.
///
/// Only complete classes convert. A forward-declared class must be returned
/// as [`Lazy`]:
///
/// ```compile_fail
/// use jbridge_core::{JavaClass, Method};
///
/// struct Later;
/// impl JavaClass for Later {
///     const SCOPED_NAME: &'static str = "demo::Later";
/// }
///
/// fn call(env: &jbridge_core::Env, site: &Method<jbridge_core::JString, Later, ()>, s: &jbridge_core::JString) {
///     let _ = site.invoke(env, s, ());
/// }
/// ```
pub trait FromReturn: JavaType + Sized {
    fn from_return(env: &Env, value: JValue) -> Result<Self>;
}

impl FromReturn for () {
    fn from_return(_env: &Env, value: JValue) -> Result<Self> {
        value.expect_kind(ValueKind::Void).map(|_| ())
    }
}

macro_rules! impl_primitive_return {
    ($($ty:ty),*) => {
        $(
            impl FromReturn for $ty {
                #[inline]
                fn from_return(_env: &Env, value: JValue) -> Result<Self> {
                    <$ty as Primitive>::from_value(value).ok_or(Error::TypeMismatch {
                        expected: <$ty as Primitive>::PRIMITIVE.name(),
                        found: value.kind().name(),
                    })
                }
            }
        )*
    };
}

impl_primitive_return!(bool, i8, u16, i16, i32, i64, f32, f64);

impl<M: Mirror> FromReturn for M {
    fn from_return(env: &Env, value: JValue) -> Result<Self> {
        M::wrap(env, value.object()?)
    }
}

/// Null becomes `None`.
impl<T: FromReturn + ReferenceType> FromReturn for Option<T> {
    fn from_return(env: &Env, value: JValue) -> Result<Self> {
        if value.object()?.is_null() {
            Ok(None)
        } else {
            T::from_return(env, value).map(Some)
        }
    }
}

impl<T: JavaClass> FromReturn for Lazy<T> {
    #[inline]
    fn from_return(_env: &Env, value: JValue) -> Result<Self> {
        value.object().map(Lazy::from_raw)
    }
}

impl FromReturn for JObject {
    #[inline]
    fn from_return(_env: &Env, value: JValue) -> Result<Self> {
        value.object()
    }
}

impl<T: Primitive> FromReturn for PrimitiveArray<T> {
    fn from_return(env: &Env, value: JValue) -> Result<Self> {
        PrimitiveArray::from_raw(env, value.object()?)
    }
}

impl<E: ReferenceType> FromReturn for ObjectArray<E> {
    fn from_return(env: &Env, value: JValue) -> Result<Self> {
        let raw = RawArray::from_value(env, value)?;
        Ok(ObjectArray::from_raw_array(raw))
    }
}

/// A returned array before its element type is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawArray {
    pub handle: JObject,
    pub len: usize,
}

impl RawArray {
    pub fn from_value(env: &Env, value: JValue) -> Result<Self> {
        let handle = value.object()?;
        if handle.is_null() {
            return Err(Error::NullReference("array"));
        }
        let len = env.array_length(handle)?;
        Ok(RawArray { handle, len })
    }
}

// ============================================================================
// Boxing
// ============================================================================

/// A primitive passed or returned as its wrapper class.
///
/// Boxing calls `valueOf` on the wrapper class; unboxing calls the
/// matching `<kind>Value` method. Both look the method up on every call.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Boxed<T: Primitive>(pub T);

impl<T: Primitive> JavaType for Boxed<T> {
    const DESCRIPTOR: Descriptor = Descriptor::object(&Descriptor::new(T::PRIMITIVE.wrapper_class()));
    const KIND: ValueKind = ValueKind::Object;
    const CLASS: TypeClass = TypeClass::Raw;
}

impl<T: Primitive> ReferenceType for Boxed<T> {
    const LOOKUP_NAME: Descriptor = Descriptor::new(T::PRIMITIVE.wrapper_class());
}

impl<T: Primitive> IntoArg<Boxed<T>> for Boxed<T> {
    fn into_arg(self, env: &Env) -> Result<JValue> {
        let class = env.find_class(T::PRIMITIVE.wrapper_class())?;
        let value_of = signature::<Boxed<T>, (T,)>();
        let method = env.method_id(class, "valueOf", value_of.as_str(), true);
        let boxed = method.and_then(|method| {
            env.call_method(ValueKind::Object, Target::Static(class), method, &[self.0.into_value()])
        });
        env.delete_local_ref(class);
        boxed
    }
}

impl<T: Primitive> FromReturn for Boxed<T> {
    fn from_return(env: &Env, value: JValue) -> Result<Self> {
        let object = value.object()?;
        if object.is_null() {
            return Err(Error::NullReference(T::PRIMITIVE.wrapper_class()));
        }
        let class = env.find_class(T::PRIMITIVE.wrapper_class())?;
        let name = format!("{}Value", T::PRIMITIVE.name());
        let unbox = signature::<T, ()>();
        let method = env.method_id(class, &name, unbox.as_str(), false);
        env.delete_local_ref(class);
        let raw = env.call_method(T::KIND, Target::Instance(object), method?, &[])?;
        T::from_value(raw).map(Boxed).ok_or(Error::TypeMismatch {
            expected: T::PRIMITIVE.name(),
            found: raw.kind().name(),
        })
    }
}

// ============================================================================
// Dispatch
// ============================================================================

/// Invokes `method` on `target` and converts the result to `R`.
///
/// The entry point is chosen by `R::KIND`, once per call.
#[cfg_attr(feature = "profiling", profiling::function)]
pub fn invoke<R: FromReturn>(env: &Env, target: Target, method: MethodId, args: &[JValue]) -> Result<R> {
    if let Target::Instance(object) = target {
        if object.is_null() {
            return Err(Error::NullReference("receiver"));
        }
    }
    trace!(kind = %R::KIND, ?target, args = args.len(), "invoke");
    let value = env.call_method(R::KIND, target, method, args)?;
    R::from_return(env, value)
}

/// Converts an argument tuple without invoking anything.
pub fn convert_args<P: Params, A: Args<P>>(env: &Env, args: A) -> Result<Vec<JValue>> {
    let values = args.into_args(env)?;
    debug_assert_eq!(values.len(), P::COUNT);
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::JString;
    use crate::runtime::Jvm;
    use crate::runtime::sim::SimVm;

    fn env(sim: &SimVm) -> Env {
        Jvm::new(sim.clone()).attach().unwrap()
    }

    #[test]
    fn primitive_args_pass_through() {
        let sim = SimVm::new();
        let env = env(&sim);
        let values = convert_args::<(i32, bool, f64), _>(&env, (7, true, 0.5)).unwrap();
        assert_eq!(values, vec![JValue::Int(7), JValue::Boolean(true), JValue::Double(0.5)]);
    }

    #[test]
    fn strings_allocate_per_argument() {
        let sim = SimVm::new();
        let env = env(&sim);
        let values = convert_args::<(JString, JString), _>(&env, ("a", String::from("b"))).unwrap();
        assert_eq!(sim.stats().strings_created, 2);
        assert_eq!(sim.string_value(values[1].object().unwrap()).as_deref(), Some("b"));
    }

    #[test]
    fn none_passes_null() {
        let sim = SimVm::new();
        let env = env(&sim);
        let values = convert_args::<(JString,), _>(&env, (None::<&str>,)).unwrap();
        assert_eq!(values, vec![JValue::Object(JObject::NULL)]);
        assert_eq!(sim.stats().strings_created, 0);
    }

    #[test]
    fn primitive_return_kind_is_checked() {
        let sim = SimVm::new();
        let env = env(&sim);
        assert_eq!(i32::from_return(&env, JValue::Int(3)), Ok(3));
        assert_eq!(
            i32::from_return(&env, JValue::Long(3)),
            Err(Error::TypeMismatch {
                expected: "int",
                found: "long"
            })
        );
        assert_eq!(<()>::from_return(&env, JValue::Void), Ok(()));
    }

    #[test]
    fn null_mirror_return() {
        let sim = SimVm::new();
        let env = env(&sim);
        let null = JValue::Object(JObject::NULL);
        assert!(matches!(JString::from_return(&env, null), Err(Error::NullReference(_))));
        assert_eq!(Option::<JString>::from_return(&env, null), Ok(None));
        assert!(Lazy::<JString>::from_return(&env, null).unwrap().is_null());
    }

    #[test]
    fn boxing_round_trip() {
        let sim = SimVm::new();
        let env = env(&sim);
        assert_eq!(Boxed::<i32>::DESCRIPTOR, "Ljava/lang/Integer;");
        assert_eq!(Boxed::<u16>::LOOKUP_NAME, "java/lang/Character");

        let boxed = IntoArg::<Boxed<i32>>::into_arg(Boxed(41), &env).unwrap();
        let back = Boxed::<i32>::from_return(&env, boxed).unwrap();
        assert_eq!(back, Boxed(41));

        let flag = IntoArg::<Boxed<bool>>::into_arg(Boxed(true), &env).unwrap();
        assert_eq!(Boxed::<bool>::from_return(&env, flag), Ok(Boxed(true)));
    }

    #[test]
    fn invoke_rejects_null_receiver() {
        let sim = SimVm::new();
        let env = env(&sim);
        let class = env.find_class("java/lang/String").unwrap();
        let length = env.method_id(class, "length", "()I", false).unwrap();
        let err = invoke::<i32>(&env, Target::Instance(JObject::NULL), length, &[]).unwrap_err();
        assert_eq!(err, Error::NullReference("receiver"));
        assert_eq!(sim.stats().invocations, 0);
    }
}
