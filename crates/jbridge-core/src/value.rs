//! Raw values exchanged with the foreign runtime.

use std::fmt;
use std::num::NonZeroUsize;

use crate::error::{Error, Result};
use crate::kind::ValueKind;

/// An untyped foreign object handle. Zero is null.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct JObject(usize);

/// Handles to class objects are ordinary object handles.
pub type JClass = JObject;

impl JObject {
    pub const NULL: JObject = JObject(0);

    pub const fn from_raw(raw: usize) -> Self {
        JObject(raw)
    }

    pub const fn into_raw(self) -> usize {
        self.0
    }

    pub const fn is_null(self) -> bool {
        self.0 == 0
    }

    /// `None` for null.
    pub const fn non_null(self) -> Option<JObject> {
        if self.is_null() { None } else { Some(self) }
    }
}

impl fmt::Debug for JObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            f.write_str("JObject(null)")
        } else {
            write!(f, "JObject({:#x})", self.0)
        }
    }
}

macro_rules! member_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
        pub struct $name(NonZeroUsize);

        impl $name {
            /// `None` when the runtime returned a null id.
            pub const fn from_raw(raw: usize) -> Option<Self> {
                match NonZeroUsize::new(raw) {
                    Some(id) => Some($name(id)),
                    None => None,
                }
            }

            pub const fn into_raw(self) -> usize {
                self.0.get()
            }
        }
    };
}

member_id!(
    /// Opaque method handle returned by method lookup.
    MethodId
);
member_id!(
    /// Opaque field handle returned by field lookup.
    FieldId
);

/// A value in the foreign runtime's calling convention.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum JValue {
    Void,
    Boolean(bool),
    Byte(i8),
    Char(u16),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Object(JObject),
}

impl JValue {
    pub const fn kind(&self) -> ValueKind {
        match self {
            JValue::Void => ValueKind::Void,
            JValue::Boolean(_) => ValueKind::Boolean,
            JValue::Byte(_) => ValueKind::Byte,
            JValue::Char(_) => ValueKind::Char,
            JValue::Short(_) => ValueKind::Short,
            JValue::Int(_) => ValueKind::Int,
            JValue::Long(_) => ValueKind::Long,
            JValue::Float(_) => ValueKind::Float,
            JValue::Double(_) => ValueKind::Double,
            JValue::Object(_) => ValueKind::Object,
        }
    }

    /// Zero value of a kind, as fields and arrays are initialized.
    pub const fn zeroed(kind: ValueKind) -> Self {
        match kind {
            ValueKind::Void => JValue::Void,
            ValueKind::Boolean => JValue::Boolean(false),
            ValueKind::Byte => JValue::Byte(0),
            ValueKind::Char => JValue::Char(0),
            ValueKind::Short => JValue::Short(0),
            ValueKind::Int => JValue::Int(0),
            ValueKind::Long => JValue::Long(0),
            ValueKind::Float => JValue::Float(0.0),
            ValueKind::Double => JValue::Double(0.0),
            ValueKind::Object => JValue::Object(JObject::NULL),
        }
    }

    /// The object handle, or a type mismatch.
    pub fn object(self) -> Result<JObject> {
        match self {
            JValue::Object(object) => Ok(object),
            other => Err(Error::TypeMismatch {
                expected: ValueKind::Object.name(),
                found: other.kind().name(),
            }),
        }
    }

    /// Fails unless this value has `kind`.
    pub fn expect_kind(self, kind: ValueKind) -> Result<Self> {
        if self.kind() == kind {
            Ok(self)
        } else {
            Err(Error::TypeMismatch {
                expected: kind.name(),
                found: self.kind().name(),
            })
        }
    }
}

impl From<JObject> for JValue {
    fn from(object: JObject) -> Self {
        JValue::Object(object)
    }
}

/// Receiver of a member access: an instance, or a class for statics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Instance(JObject),
    Static(JClass),
}

impl Target {
    pub const fn is_static(self) -> bool {
        matches!(self, Target::Static(_))
    }

    pub const fn handle(self) -> JObject {
        match self {
            Target::Instance(object) | Target::Static(object) => object,
        }
    }
}

/// Lifetime class of a reference as reported by the runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RefKind {
    Invalid,
    Local,
    Global,
    WeakGlobal,
}
