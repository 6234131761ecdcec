//! Mirrored classes and the descriptor override registry.
//!
//! Declaring a class is two steps, and the first is enough to mention the
//! class anywhere in a signature:
//!
//! 1. [`JavaClass`] registers the class name. A type that stops here is
//!    *forward declared*: its descriptor is known but it cannot be
//!    constructed from a returned handle, so methods returning it must
//!    declare [`Lazy<T>`](crate::Lazy) instead.
//! 2. [`Mirror`] completes the type by tying it to an [`Object`].
//!
//! `JavaClass::OVERRIDE` is the override entry. When present it wins over
//! the name derived from `SCOPED_NAME`, which is how names the scoped form
//! cannot spell (nested classes, renamed packages) are expressed.
//!
//! ```
//! use jbridge_core::{JavaClass, JavaType};
//!
//! struct Entry;
//!
//! impl JavaClass for Entry {
//!     const SCOPED_NAME: &'static str = "java::util::Map::Entry";
//!     const OVERRIDE: Option<&'static str> = Some("java/util/Map$Entry");
//! }
//!
//! assert_eq!(Entry::DESCRIPTOR.as_str(), "Ljava/util/Map$Entry;");
//! ```

use crate::descriptor::Descriptor;
use crate::error::Result;
use crate::kind::{TypeClass, ValueKind};
use crate::object::Object;
use crate::runtime::Env;
use crate::types::{JavaType, ReferenceType};
use crate::value::{JClass, JObject};

/// A class of the foreign runtime, complete or forward declared.
pub trait JavaClass: 'static {
    /// Self-declared name, `::` separated.
    const SCOPED_NAME: &'static str;

    /// Override entry for the internal name.
    const OVERRIDE: Option<&'static str> = None;

    /// Effective internal name, `/` separated.
    const NAME: Descriptor = class_name(Self::SCOPED_NAME, Self::OVERRIDE);
}

/// Resolves an internal class name: the override if any, otherwise the
/// scoped name with separators converted.
pub const fn class_name(scoped: &str, override_name: Option<&str>) -> Descriptor {
    match override_name {
        Some(name) => Descriptor::new(name),
        None => Descriptor::scoped_path(scoped),
    }
}

/// Effective internal name of `T`.
pub fn effective_name<T: JavaClass>() -> &'static str {
    const { &T::NAME }.as_str()
}

impl<T: JavaClass> JavaType for T {
    const DESCRIPTOR: Descriptor = Descriptor::object(&T::NAME);
    const KIND: ValueKind = ValueKind::Object;
    const CLASS: TypeClass = TypeClass::Mirror;
}

impl<T: JavaClass> ReferenceType for T {
    const LOOKUP_NAME: Descriptor = T::NAME;
}

/// A complete mirrored class backed by an [`Object`].
pub trait Mirror: JavaClass + Sized {
    fn from_object(object: Object) -> Self;

    fn object(&self) -> &Object;

    fn raw(&self) -> JObject {
        self.object().raw()
    }

    fn class(&self) -> JClass {
        self.object().class()
    }

    /// Wraps a handle received from the runtime.
    fn wrap(env: &Env, raw: JObject) -> Result<Self> {
        Object::wrap::<Self>(env, raw).map(Self::from_object)
    }
}

/// Classes that a host string converts into.
pub trait StringClass: JavaClass {}
