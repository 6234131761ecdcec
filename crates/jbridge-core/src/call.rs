//! Call-site declaration forms.
//!
//! Each form is meant to live in a `static`, so its [`CallSite`] memo lasts
//! for the process. The member signature is a constant computed from the
//! type parameters; the name is the foreign member name, so an alias is
//! simply a static whose Rust name differs from it.
//!
//! ```
//! use jbridge_core::{JString, Method};
//! use jbridge_core::runtime::{sim::SimVm, Jvm};
//!
//! static LENGTH: Method<JString, i32, ()> = Method::new("length");
//!
//! assert_eq!(LENGTH.signature(), "()I");
//!
//! let env = Jvm::new(SimVm::new()).attach().unwrap();
//! let text = JString::new(&env, "four").unwrap();
//! assert_eq!(LENGTH.invoke(&env, &text, ()), Ok(4));
//! ```

use std::fmt;
use std::marker::PhantomData;

use crate::class::{JavaClass, Mirror, effective_name};
use crate::descriptor::Descriptor;
use crate::error::Result;
use crate::marshal::{Args, FromReturn, IntoArg, invoke};
use crate::member::{CallSite, Member, MemberKey, MemberKind};
use crate::object::{Lazy, Object};
use crate::runtime::Env;
use crate::types::{JavaType, Params, Primitive, ReferenceType, signature};
use crate::value::{FieldId, JObject, MethodId, Target};

/// Something that can receive an instance call on class `C`.
pub trait Instance<C: JavaClass> {
    fn instance_handle(&self) -> JObject;
}

impl<M: Mirror> Instance<M> for M {
    #[inline]
    fn instance_handle(&self) -> JObject {
        self.raw()
    }
}

impl<C: JavaClass> Instance<C> for Lazy<C> {
    #[inline]
    fn instance_handle(&self) -> JObject {
        self.raw()
    }
}

/// Class whose lookup name is used for a declaration on `C`.
fn class_of<C: ReferenceType>() -> &'static str {
    const { &C::LOOKUP_NAME }.as_str()
}

macro_rules! call_site_debug {
    ($ty:ident < $($param:ident),+ >) => {
        impl<$($param),+> fmt::Debug for $ty<$($param),+> {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.debug_struct(stringify!($ty))
                    .field("name", &self.name)
                    .field("resolved", &self.site.is_resolved())
                    .finish()
            }
        }
    };
}

// ============================================================================
// Methods
// ============================================================================

/// An instance method `name` on `C` returning `R` with parameters `P`.
pub struct Method<C, R, P> {
    name: &'static str,
    site: CallSite<MethodId>,
    _marker: PhantomData<fn() -> (C, R, P)>,
}

impl<C, R, P> Method<C, R, P> {
    pub const fn new(name: &'static str) -> Self {
        Method {
            name,
            site: CallSite::new(),
            _marker: PhantomData,
        }
    }

    pub const fn name(&self) -> &'static str {
        self.name
    }
}

impl<C: ReferenceType, R: JavaType, P: Params> Method<C, R, P> {
    pub const SIGNATURE: Descriptor = signature::<R, P>();

    pub fn signature(&self) -> &'static str {
        const { &Self::SIGNATURE }.as_str()
    }

    /// Resolves the member without calling it.
    pub fn resolve(&self, env: &Env) -> Result<&Member<MethodId>> {
        let key = MemberKey {
            class: class_of::<C>(),
            name: self.name,
            signature: self.signature(),
            kind: MemberKind::Method,
        };
        self.site.resolve(env, &key)
    }
}

impl<C: JavaClass, R: FromReturn, P: Params> Method<C, R, P> {
    pub fn invoke<A: Args<P>>(&self, env: &Env, receiver: &impl Instance<C>, args: A) -> Result<R> {
        let member = self.resolve(env)?;
        let args = args.into_args(env)?;
        invoke(env, Target::Instance(receiver.instance_handle()), member.id, &args)
    }
}

call_site_debug!(Method<C, R, P>);

/// A static method `name` on `C`.
pub struct StaticMethod<C, R, P> {
    name: &'static str,
    site: CallSite<MethodId>,
    _marker: PhantomData<fn() -> (C, R, P)>,
}

impl<C, R, P> StaticMethod<C, R, P> {
    pub const fn new(name: &'static str) -> Self {
        StaticMethod {
            name,
            site: CallSite::new(),
            _marker: PhantomData,
        }
    }

    pub const fn name(&self) -> &'static str {
        self.name
    }
}

impl<C: ReferenceType, R: JavaType, P: Params> StaticMethod<C, R, P> {
    pub const SIGNATURE: Descriptor = signature::<R, P>();

    pub fn signature(&self) -> &'static str {
        const { &Self::SIGNATURE }.as_str()
    }

    pub fn resolve(&self, env: &Env) -> Result<&Member<MethodId>> {
        let key = MemberKey {
            class: class_of::<C>(),
            name: self.name,
            signature: self.signature(),
            kind: MemberKind::StaticMethod,
        };
        self.site.resolve(env, &key)
    }
}

impl<C: ReferenceType, R: FromReturn, P: Params> StaticMethod<C, R, P> {
    pub fn invoke<A: Args<P>>(&self, env: &Env, args: A) -> Result<R> {
        let member = self.resolve(env)?;
        let args = args.into_args(env)?;
        invoke(env, Target::Static(member.class), member.id, &args)
    }
}

call_site_debug!(StaticMethod<C, R, P>);

/// A constructor of `C` with parameters `P`.
pub struct Constructor<C, P> {
    name: &'static str,
    site: CallSite<MethodId>,
    _marker: PhantomData<fn() -> (C, P)>,
}

impl<C, P> Constructor<C, P> {
    pub const fn new() -> Self {
        Constructor {
            name: "<init>",
            site: CallSite::new(),
            _marker: PhantomData,
        }
    }
}

impl<C, P> Default for Constructor<C, P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Mirror, P: Params> Constructor<C, P> {
    pub const SIGNATURE: Descriptor = signature::<(), P>();

    pub fn signature(&self) -> &'static str {
        const { &Self::SIGNATURE }.as_str()
    }

    /// Allocates and initializes a new `C`.
    pub fn construct<A: Args<P>>(&self, env: &Env, args: A) -> Result<C> {
        let key = MemberKey {
            class: effective_name::<C>(),
            name: self.name,
            signature: self.signature(),
            kind: MemberKind::Constructor,
        };
        let member = self.site.resolve(env, &key)?;
        let args = args.into_args(env)?;
        let object = env.new_object(member.class, member.id, &args)?;
        Ok(C::from_object(Object::from_parts(object, member.class)))
    }
}

call_site_debug!(Constructor<C, P>);

// ============================================================================
// Fields
// ============================================================================

/// An instance field `name` on `C` of type `T`.
pub struct Field<C, T> {
    name: &'static str,
    site: CallSite<FieldId>,
    _marker: PhantomData<fn() -> (C, T)>,
}

impl<C, T> Field<C, T> {
    pub const fn new(name: &'static str) -> Self {
        Field {
            name,
            site: CallSite::new(),
            _marker: PhantomData,
        }
    }

    pub const fn name(&self) -> &'static str {
        self.name
    }
}

impl<C: JavaClass, T: JavaType> Field<C, T> {
    pub fn signature(&self) -> &'static str {
        const { &T::DESCRIPTOR }.as_str()
    }

    pub fn resolve(&self, env: &Env) -> Result<&Member<FieldId>> {
        let key = MemberKey {
            class: effective_name::<C>(),
            name: self.name,
            signature: self.signature(),
            kind: MemberKind::Field,
        };
        self.site.resolve(env, &key)
    }

    pub fn set<A: IntoArg<T>>(&self, env: &Env, receiver: &impl Instance<C>, value: A) -> Result<()> {
        let member = self.resolve(env)?;
        let value = value.into_arg(env)?;
        env.set_field(Target::Instance(receiver.instance_handle()), member.id, value)
    }
}

impl<C: JavaClass, T: FromReturn> Field<C, T> {
    pub fn get(&self, env: &Env, receiver: &impl Instance<C>) -> Result<T> {
        let member = self.resolve(env)?;
        let value = env.get_field(T::KIND, Target::Instance(receiver.instance_handle()), member.id)?;
        T::from_return(env, value)
    }
}

impl<C: JavaClass, T: Primitive + FromReturn> Field<C, T> {
    /// Reads, applies `f`, writes back, and returns the new value.
    pub fn update(&self, env: &Env, receiver: &impl Instance<C>, f: impl FnOnce(T) -> T) -> Result<T> {
        let next = f(self.get(env, receiver)?);
        self.set(env, receiver, next)?;
        Ok(next)
    }
}

call_site_debug!(Field<C, T>);

/// A static field `name` on `C` of type `T`.
pub struct StaticField<C, T> {
    name: &'static str,
    site: CallSite<FieldId>,
    _marker: PhantomData<fn() -> (C, T)>,
}

impl<C, T> StaticField<C, T> {
    pub const fn new(name: &'static str) -> Self {
        StaticField {
            name,
            site: CallSite::new(),
            _marker: PhantomData,
        }
    }

    pub const fn name(&self) -> &'static str {
        self.name
    }
}

impl<C: ReferenceType, T: JavaType> StaticField<C, T> {
    pub fn signature(&self) -> &'static str {
        const { &T::DESCRIPTOR }.as_str()
    }

    pub fn resolve(&self, env: &Env) -> Result<&Member<FieldId>> {
        let key = MemberKey {
            class: class_of::<C>(),
            name: self.name,
            signature: self.signature(),
            kind: MemberKind::StaticField,
        };
        self.site.resolve(env, &key)
    }

    pub fn set<A: IntoArg<T>>(&self, env: &Env, value: A) -> Result<()> {
        let member = self.resolve(env)?;
        let value = value.into_arg(env)?;
        env.set_field(Target::Static(member.class), member.id, value)
    }
}

impl<C: ReferenceType, T: FromReturn> StaticField<C, T> {
    pub fn get(&self, env: &Env) -> Result<T> {
        let member = self.resolve(env)?;
        let value = env.get_field(T::KIND, Target::Static(member.class), member.id)?;
        T::from_return(env, value)
    }
}

impl<C: ReferenceType, T: Primitive + FromReturn> StaticField<C, T> {
    pub fn update(&self, env: &Env, f: impl FnOnce(T) -> T) -> Result<T> {
        let next = f(self.get(env)?);
        self.set(env, next)?;
        Ok(next)
    }
}

call_site_debug!(StaticField<C, T>);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::object::JString;
    use crate::runtime::Jvm;
    use crate::runtime::sim::SimVm;
    use crate::value::JValue;

    #[derive(Clone, Copy, Debug)]
    struct Counter(Object);

    impl JavaClass for Counter {
        const SCOPED_NAME: &'static str = "calls::Counter";
    }

    impl Mirror for Counter {
        fn from_object(object: Object) -> Self {
            Counter(object)
        }

        fn object(&self) -> &Object {
            &self.0
        }
    }

    fn define(sim: &SimVm) {
        sim.define_class("calls/Counter")
            .field("count", "I")
            .static_field("created", "J", JValue::Long(0))
            .constructor("(I)V", |call| {
                call.set_field("count", call.arg(0)?)?;
                let created = match call.static_field("created")? {
                    JValue::Long(n) => n + 1,
                    _ => 1,
                };
                call.set_static_field("created", JValue::Long(created))?;
                Ok(JValue::Void)
            })
            .method("add", "(I)I", |call| {
                let by: i32 = call.arg_as(0)?;
                let count = match call.field("count")? {
                    JValue::Int(n) => n + by,
                    _ => by,
                };
                call.set_field("count", JValue::Int(count))?;
                Ok(JValue::Int(count))
            })
            .method("label", "(Ljava/lang/String;)Ljava/lang/String;", |call| {
                let text = call.string_arg(0)?;
                let out = call.env().new_string(&format!("[{text}]"))?;
                Ok(JValue::Object(out))
            })
            .define()
            .unwrap();
    }

    #[test]
    fn signatures_are_constants() {
        static NEW: Constructor<Counter, (i32,)> = Constructor::new();
        static ADD: Method<Counter, i32, (i32,)> = Method::new("add");
        static LABEL: Method<Counter, JString, (JString,)> = Method::new("label");
        static COUNT: Field<Counter, i32> = Field::new("count");
        static CREATED: StaticField<Counter, i64> = StaticField::new("created");

        assert_eq!(NEW.signature(), "(I)V");
        assert_eq!(ADD.signature(), "(I)I");
        assert_eq!(LABEL.signature(), "(Ljava/lang/String;)Ljava/lang/String;");
        assert_eq!(COUNT.signature(), "I");
        assert_eq!(CREATED.signature(), "J");
        assert_eq!(ADD.name(), "add");
    }

    #[test]
    fn construct_invoke_and_fields() {
        let sim = SimVm::new();
        define(&sim);
        let env = Jvm::new(sim.clone()).attach().unwrap();

        static NEW: Constructor<Counter, (i32,)> = Constructor::new();
        static ADD: Method<Counter, i32, (i32,)> = Method::new("add");
        static LABEL: Method<Counter, JString, (JString,)> = Method::new("label");
        static COUNT: Field<Counter, i32> = Field::new("count");
        static CREATED: StaticField<Counter, i64> = StaticField::new("created");

        let counter = NEW.construct(&env, (5,)).unwrap();
        assert_eq!(ADD.invoke(&env, &counter, (2,)), Ok(7));
        assert_eq!(COUNT.get(&env, &counter), Ok(7));

        COUNT.set(&env, &counter, 10).unwrap();
        assert_eq!(COUNT.update(&env, &counter, |n| n * 2), Ok(20));
        assert_eq!(ADD.invoke(&env, &counter, (1,)), Ok(21));

        let label = LABEL.invoke(&env, &counter, ("x",)).unwrap();
        assert_eq!(label.to_string(&env).unwrap(), "[x]");

        NEW.construct(&env, (0,)).unwrap();
        assert_eq!(CREATED.get(&env), Ok(2));
        assert_eq!(CREATED.update(&env, |n| n + 40), Ok(42));
        assert_eq!(sim.static_value("calls/Counter", "created"), Some(JValue::Long(42)));

        let stats = sim.stats();
        assert_eq!(stats.method_lookups, 3);
        assert_eq!(stats.field_lookups, 2);
    }

    #[test]
    fn lazy_receiver() {
        let sim = SimVm::new();
        define(&sim);
        let env = Jvm::new(sim.clone()).attach().unwrap();

        static NEW: Constructor<Counter, (i32,)> = Constructor::new();
        static ADD: Method<Counter, i32, (i32,)> = Method::new("add");

        let counter = NEW.construct(&env, (1,)).unwrap();
        let lazy = Lazy::<Counter>::from(&counter);
        assert_eq!(ADD.invoke(&env, &lazy, (1,)), Ok(2));
    }

    #[test]
    fn missing_member_fails_every_time() {
        let sim = SimVm::new();
        define(&sim);
        let env = Jvm::new(sim.clone()).attach().unwrap();

        static NEW: Constructor<Counter, (i32,)> = Constructor::new();
        static NOPE: Method<Counter, (), ()> = Method::new("nope");

        let counter = NEW.construct(&env, (1,)).unwrap();
        let first = NOPE.invoke(&env, &counter, ()).unwrap_err();
        assert!(matches!(first, Error::MemberNotFound { kind: MemberKind::Method, .. }));
        assert_eq!(NOPE.invoke(&env, &counter, ()).unwrap_err(), first);
        assert_eq!(sim.stats().method_lookups, 2);
    }
}
