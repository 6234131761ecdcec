//! The mirror base and the lazy reference.

use std::fmt;
use std::marker::PhantomData;

use crate::class::{JavaClass, Mirror, StringClass, effective_name};
use crate::descriptor::Descriptor;
use crate::error::{Error, Result};
use crate::kind::{TypeClass, ValueKind};
use crate::runtime::Env;
use crate::tagged::{Handles, Tagged};
use crate::types::{JavaType, ReferenceType};
use crate::value::{JClass, JObject};

/// Identity of one foreign object: its handle and its class handle.
///
/// Cloning copies both handles; it does not create references.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Debug)]
pub struct Object {
    object: Tagged,
    class: Tagged,
}

impl Object {
    /// Wraps a handle received from the runtime as an instance of `C`.
    pub fn wrap<C: JavaClass>(env: &Env, raw: JObject) -> Result<Self> {
        if raw.is_null() {
            return Err(Error::NullReference(effective_name::<C>()));
        }
        let class = env.find_class(effective_name::<C>())?;
        Ok(Object::from_parts(raw, class))
    }

    pub const fn from_parts(object: JObject, class: JClass) -> Self {
        Object {
            object: Tagged::new(object),
            class: Tagged::new(class),
        }
    }

    /// Default-constructs a new `C` through its `()V` constructor.
    pub fn construct<C: JavaClass>(env: &Env) -> Result<Self> {
        let class = env.find_class(effective_name::<C>())?;
        let init = env.method_id(class, "<init>", "()V", false)?;
        let object = env.new_object(class, init, &[])?;
        Ok(Object::from_parts(object, class))
    }

    pub const fn raw(&self) -> JObject {
        self.object.get()
    }

    pub const fn class(&self) -> JClass {
        self.class.get()
    }

    /// True when both handles refer to the same foreign object.
    pub fn is_same(&self, env: &Env, other: &Object) -> bool {
        env.is_same_object(self.raw(), other.raw())
    }
}

impl Handles for Object {
    fn visit_handles(&mut self, visitor: &mut dyn FnMut(&mut Tagged)) {
        visitor(&mut self.object);
        visitor(&mut self.class);
    }
}

/// A handle to a `T` that may not be complete yet.
///
/// A method can return `Lazy<B>` while `B` is only forward declared. Identity
/// access works for any `T`; [`Lazy::resolve`] needs `T: Mirror`.
pub struct Lazy<T: JavaClass> {
    object: Tagged,
    _marker: PhantomData<fn() -> T>,
}

impl<T: JavaClass> Lazy<T> {
    pub const fn from_raw(raw: JObject) -> Self {
        Lazy {
            object: Tagged::new(raw),
            _marker: PhantomData,
        }
    }

    pub const fn raw(&self) -> JObject {
        self.object.get()
    }

    pub const fn is_null(&self) -> bool {
        self.raw().is_null()
    }
}

impl<T: Mirror> Lazy<T> {
    /// The complete wrapper for the same handle.
    pub fn resolve(&self, env: &Env) -> Result<T> {
        T::wrap(env, self.raw())
    }
}

impl<T: Mirror> From<&T> for Lazy<T> {
    fn from(value: &T) -> Self {
        Lazy::from_raw(value.raw())
    }
}

impl<T: JavaClass> Clone for Lazy<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T: JavaClass> Copy for Lazy<T> {}

impl<T: JavaClass> PartialEq for Lazy<T> {
    fn eq(&self, other: &Self) -> bool {
        self.object == other.object
    }
}

impl<T: JavaClass> Eq for Lazy<T> {}

impl<T: JavaClass> fmt::Debug for Lazy<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Lazy")
            .field(&effective_name::<T>())
            .field(&self.raw())
            .finish()
    }
}

impl<T: JavaClass> JavaType for Lazy<T> {
    const DESCRIPTOR: Descriptor = <T as JavaType>::DESCRIPTOR;
    const KIND: ValueKind = ValueKind::Object;
    const CLASS: TypeClass = TypeClass::Deferred;
}

impl<T: JavaClass> ReferenceType for Lazy<T> {
    const LOOKUP_NAME: Descriptor = T::NAME;
}

impl<T: JavaClass> Handles for Lazy<T> {
    fn visit_handles(&mut self, visitor: &mut dyn FnMut(&mut Tagged)) {
        visitor(&mut self.object);
    }
}

/// `java.lang.String`.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct JString(Object);

impl JavaClass for JString {
    const SCOPED_NAME: &'static str = "java::lang::String";
}

impl Mirror for JString {
    fn from_object(object: Object) -> Self {
        JString(object)
    }

    fn object(&self) -> &Object {
        &self.0
    }
}

impl StringClass for JString {}

impl Handles for JString {
    fn visit_handles(&mut self, visitor: &mut dyn FnMut(&mut Tagged)) {
        self.0.visit_handles(visitor);
    }
}

impl JString {
    /// Allocates a new foreign string.
    pub fn new(env: &Env, text: &str) -> Result<Self> {
        let raw = env.new_string(text)?;
        Self::wrap(env, raw)
    }

    /// Reads the contents back.
    pub fn to_string(&self, env: &Env) -> Result<String> {
        env.read_string(self.raw())
    }
}
