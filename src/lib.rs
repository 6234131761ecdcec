//! jbridge: typed calls into a JNI-style managed runtime.
//!
//! This crate re-exports [`jbridge_core`] together with the derives from
//! `jbridge_macros`. A mirrored class is declared once and its members are
//! declared as statics, each of which resolves its member handle on first use:
//!
//! ```
//! use jbridge::prelude::*;
//! use jbridge::runtime::sim::SimVm;
//!
//! #[derive(Mirror, Clone, Copy)]
//! #[jbridge(class = "java::lang::StringBuilder")]
//! struct StringBuilder(Object);
//!
//! static NEW: Constructor<StringBuilder, ()> = Constructor::new();
//! static APPEND: Method<StringBuilder, StringBuilder, (JString,)> = Method::new("append");
//! static TO_STRING: Method<StringBuilder, JString, ()> = Method::new("toString");
//!
//! let sim = SimVm::new();
//! sim.define_class("java/lang/StringBuilder")
//!     .field("text", "Ljava/lang/String;")
//!     .constructor("()V", |_| Ok(JValue::Void))
//!     .method("append", "(Ljava/lang/String;)Ljava/lang/StringBuilder;", |call| {
//!         let mut text = match call.field("text")? {
//!             JValue::Object(s) if !s.is_null() => call.env().read_string(s)?,
//!             _ => String::new(),
//!         };
//!         text.push_str(&call.string_arg(0)?);
//!         call.set_field("text", JValue::Object(call.env().new_string(&text)?))?;
//!         Ok(JValue::Object(call.this()?))
//!     })
//!     .method("toString", "()Ljava/lang/String;", |call| call.field("text"))
//!     .define()?;
//!
//! let env = Jvm::new(sim).attach()?;
//! let builder = NEW.construct(&env, ())?;
//! APPEND.invoke(&env, &builder, ("abc",))?;
//! APPEND.invoke(&env, &builder, ("def",))?;
//! assert_eq!(TO_STRING.invoke(&env, &builder, ())?.to_string(&env)?, "abcdef");
//! # Ok::<(), jbridge::Error>(())
//! ```

pub use jbridge_core::*;
pub use jbridge_macros::{Handles, Mirror};

/// The names needed to declare mirrors and call through them.
pub mod prelude {
    pub use jbridge_core::{
        BooleanArray, Boxed, ByteArray, CharArray, Constructor, DoubleArray, Env, Error, Field,
        FloatArray, Handles, Instance, IntArray, JObject, JString, JValue, JavaClass, Jvm, Lazy,
        LongArray, Method, Mirror, Object, ObjectArray, PrimitiveArray, Result, Shared,
        ShortArray, StaticField, StaticMethod, promote_to_shared,
    };
    pub use jbridge_macros::{Handles, Mirror};
}
