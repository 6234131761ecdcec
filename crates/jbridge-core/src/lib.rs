//! Core of the jbridge JNI-style bridge.
//!
//! Host types mirror classes of a foreign object runtime. Their descriptors
//! are computed at compile time from the type structure, member handles are
//! resolved once per call site and cached, and arguments and returns are
//! converted through a dispatch selected by the declared return kind.
//!
//! The layers, bottom up:
//!
//! - [`descriptor`], [`kind`] and [`types`] build descriptor text in `const`
//!   context and classify every type that can appear in a signature.
//! - [`class`] and [`object`] declare mirrored classes: [`JavaClass`] for
//!   the name, [`Mirror`] for the complete type, [`Lazy`] for handles to
//!   types that are only forward declared.
//! - [`member`] memoizes member lookups per call site; [`call`] builds the
//!   typed call sites ([`Method`], [`StaticMethod`], [`Constructor`],
//!   [`Field`], [`StaticField`]) on top of it; [`marshal`] converts values
//!   across the boundary.
//! - [`tagged`] and [`shared`] handle promotion of local handles to global
//!   references; [`array`] wraps primitive and object arrays.
//! - [`runtime`] is the seam to the foreign runtime, with an in-memory
//!   [`runtime::sim`] backend and a real one behind the `jvm` feature.

pub mod array;
pub mod call;
pub mod class;
pub mod descriptor;
pub mod error;
pub mod kind;
mod logging;
pub mod marshal;
pub mod member;
pub mod object;
pub mod runtime;
pub mod shared;
pub mod tagged;
pub mod types;
pub mod value;

pub use array::{
    BooleanArray, ByteArray, CharArray, DoubleArray, FloatArray, IntArray, LongArray, ObjectArray,
    PrimitiveArray, ShortArray,
};
pub use call::{Constructor, Field, Instance, Method, StaticField, StaticMethod};
pub use class::{JavaClass, Mirror, StringClass};
pub use descriptor::{Descriptor, MethodShape};
pub use error::{Error, Result};
pub use kind::{PrimitiveKind, TypeClass, ValueKind};
pub use marshal::{Args, Boxed, FromReturn, IntoArg};
pub use member::{CallSite, MemberKind};
pub use object::{JString, Lazy, Object};
pub use runtime::{Config, Env, Jvm, ReleaseMode, env, init, init_with_config, vm};
pub use shared::{GlobalRef, Shared, promote_object, promote_to_shared};
pub use tagged::{Handles, Tagged};
pub use types::{JavaType, Parameter, Params, Primitive, ReferenceType, signature};
pub use value::{FieldId, JClass, JObject, JValue, MethodId, RefKind, Target};
