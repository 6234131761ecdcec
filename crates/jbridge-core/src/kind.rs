//! Value kinds and type classification.
//!
//! [`ValueKind`] is the closed tag every invocation dispatches on: the
//! foreign runtime has a distinct entry point per primitive return kind, one
//! for void and one for objects. [`TypeClass`] is the coarser predicate set
//! the marshalling layer uses to decide how a declared type is converted.

use std::fmt;

use num_enum::{IntoPrimitive, TryFromPrimitive};

/// The eight primitive kinds of the foreign runtime.
///
/// Discriminants are the descriptor codes, so a code byte converts with
/// `PrimitiveKind::try_from(b'I')`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum PrimitiveKind {
    Boolean = b'Z',
    Byte = b'B',
    Char = b'C',
    Short = b'S',
    Int = b'I',
    Long = b'J',
    Float = b'F',
    Double = b'D',
}

impl PrimitiveKind {
    /// All primitive kinds in declaration order.
    pub const ALL: [PrimitiveKind; 8] = [
        PrimitiveKind::Boolean,
        PrimitiveKind::Byte,
        PrimitiveKind::Char,
        PrimitiveKind::Short,
        PrimitiveKind::Int,
        PrimitiveKind::Long,
        PrimitiveKind::Float,
        PrimitiveKind::Double,
    ];

    /// Single-letter descriptor code.
    pub const fn code(self) -> u8 {
        self as u8
    }

    /// Name as written in the foreign language.
    pub const fn name(self) -> &'static str {
        match self {
            PrimitiveKind::Boolean => "boolean",
            PrimitiveKind::Byte => "byte",
            PrimitiveKind::Char => "char",
            PrimitiveKind::Short => "short",
            PrimitiveKind::Int => "int",
            PrimitiveKind::Long => "long",
            PrimitiveKind::Float => "float",
            PrimitiveKind::Double => "double",
        }
    }

    /// Size in bytes of one array element.
    pub const fn size(self) -> usize {
        match self {
            PrimitiveKind::Boolean | PrimitiveKind::Byte => 1,
            PrimitiveKind::Char | PrimitiveKind::Short => 2,
            PrimitiveKind::Int | PrimitiveKind::Float => 4,
            PrimitiveKind::Long | PrimitiveKind::Double => 8,
        }
    }

    /// Internal name of the class that boxes this primitive.
    pub const fn wrapper_class(self) -> &'static str {
        match self {
            PrimitiveKind::Boolean => "java/lang/Boolean",
            PrimitiveKind::Byte => "java/lang/Byte",
            PrimitiveKind::Char => "java/lang/Character",
            PrimitiveKind::Short => "java/lang/Short",
            PrimitiveKind::Int => "java/lang/Integer",
            PrimitiveKind::Long => "java/lang/Long",
            PrimitiveKind::Float => "java/lang/Float",
            PrimitiveKind::Double => "java/lang/Double",
        }
    }
}

impl fmt::Display for PrimitiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Dispatch tag for a value crossing the boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Void,
    Boolean,
    Byte,
    Char,
    Short,
    Int,
    Long,
    Float,
    Double,
    /// Any reference: objects, strings, arrays.
    Object,
}

impl ValueKind {
    pub const fn from_primitive(kind: PrimitiveKind) -> Self {
        match kind {
            PrimitiveKind::Boolean => ValueKind::Boolean,
            PrimitiveKind::Byte => ValueKind::Byte,
            PrimitiveKind::Char => ValueKind::Char,
            PrimitiveKind::Short => ValueKind::Short,
            PrimitiveKind::Int => ValueKind::Int,
            PrimitiveKind::Long => ValueKind::Long,
            PrimitiveKind::Float => ValueKind::Float,
            PrimitiveKind::Double => ValueKind::Double,
        }
    }

    pub const fn primitive(self) -> Option<PrimitiveKind> {
        match self {
            ValueKind::Boolean => Some(PrimitiveKind::Boolean),
            ValueKind::Byte => Some(PrimitiveKind::Byte),
            ValueKind::Char => Some(PrimitiveKind::Char),
            ValueKind::Short => Some(PrimitiveKind::Short),
            ValueKind::Int => Some(PrimitiveKind::Int),
            ValueKind::Long => Some(PrimitiveKind::Long),
            ValueKind::Float => Some(PrimitiveKind::Float),
            ValueKind::Double => Some(PrimitiveKind::Double),
            ValueKind::Void | ValueKind::Object => None,
        }
    }

    /// Leading descriptor byte of a type of this kind.
    pub const fn code(self) -> u8 {
        match self {
            ValueKind::Void => b'V',
            ValueKind::Object => b'L',
            _ => match self.primitive() {
                Some(p) => p.code(),
                None => b'?',
            },
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            ValueKind::Void => "void",
            ValueKind::Object => "object",
            _ => match self.primitive() {
                Some(p) => p.name(),
                None => "?",
            },
        }
    }
}

impl From<PrimitiveKind> for ValueKind {
    fn from(kind: PrimitiveKind) -> Self {
        ValueKind::from_primitive(kind)
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// How a declared host type is marshalled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeClass {
    Void,
    Primitive(PrimitiveKind),
    PrimitiveArray(PrimitiveKind),
    /// A mirrored class, complete or forward declared.
    Mirror,
    /// An array whose elements are references.
    MirrorArray,
    /// A lazy reference to a possibly incomplete class.
    Deferred,
    /// An untyped object handle.
    Raw,
}

impl TypeClass {
    pub const fn is_primitive(self) -> bool {
        matches!(self, TypeClass::Primitive(_))
    }

    pub const fn is_array(self) -> bool {
        matches!(self, TypeClass::PrimitiveArray(_) | TypeClass::MirrorArray)
    }

    pub const fn is_mirror(self) -> bool {
        matches!(self, TypeClass::Mirror)
    }

    pub const fn is_deferred(self) -> bool {
        matches!(self, TypeClass::Deferred)
    }

    /// True for everything passed as an object handle.
    pub const fn is_reference(self) -> bool {
        !matches!(self, TypeClass::Void | TypeClass::Primitive(_))
    }
}
