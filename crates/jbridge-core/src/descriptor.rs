//! Compile-time descriptor synthesis.
//!
//! A [`Descriptor`] is a fixed-capacity byte buffer built entirely by
//! `const fn`s, so every type and member descriptor in a program is computed
//! during compilation and lives in read-only data. The grammar is the
//! foreign runtime's:
//!
//! | Type | Descriptor |
//! |------|------------|
//! | `boolean byte char short int long float double` | `Z B C S I J F D` |
//! | no value | `V` |
//! | class `a::b::C` | `La/b/C;` |
//! | array of `T` | `[` + descriptor of `T` |
//! | method | `(` + parameters + `)` + return |
//!
//! ```
//! use jbridge_core::Descriptor;
//!
//! const PATH: Descriptor = Descriptor::scoped_path("java::lang::String");
//! const STRING: Descriptor = Descriptor::object(&PATH);
//! const STRINGS: Descriptor = Descriptor::array(&STRING);
//!
//! assert_eq!(STRINGS.as_str(), "[Ljava/lang/String;");
//! ```
//!
//! Exceeding [`MAX_DESCRIPTOR_LEN`] fails const evaluation, which is a build
//! error rather than a runtime one.

use std::fmt;
use std::hash::{Hash, Hasher};

use crate::error::{Error, Result};
use crate::kind::{PrimitiveKind, ValueKind};

/// Capacity of a [`Descriptor`] buffer in bytes.
pub const MAX_DESCRIPTOR_LEN: usize = 512;

/// An immutable descriptor string computed at compile time.
#[derive(Clone, Copy)]
pub struct Descriptor {
    bytes: [u8; MAX_DESCRIPTOR_LEN],
    len: usize,
}

impl Descriptor {
    pub const EMPTY: Descriptor = Descriptor {
        bytes: [0; MAX_DESCRIPTOR_LEN],
        len: 0,
    };

    /// The "no value" descriptor.
    pub const VOID: Descriptor = Descriptor::EMPTY.push_byte(b'V');

    pub const fn new(text: &str) -> Self {
        Self::EMPTY.push_str(text)
    }

    /// Appends one ASCII byte.
    pub const fn push_byte(mut self, byte: u8) -> Self {
        assert!(byte.is_ascii(), "descriptor bytes must be ASCII");
        assert!(self.len < MAX_DESCRIPTOR_LEN, "descriptor exceeds MAX_DESCRIPTOR_LEN");
        self.bytes[self.len] = byte;
        self.len += 1;
        self
    }

    pub const fn push_str(self, text: &str) -> Self {
        let bytes = text.as_bytes();
        self.push_range(bytes, 0, bytes.len())
    }

    pub const fn append(self, other: &Descriptor) -> Self {
        self.push_range(&other.bytes, 0, other.len)
    }

    /// Copies `src[start..end]`. `src` is always UTF-8 split on ASCII
    /// boundaries, so the buffer stays valid UTF-8.
    const fn push_range(mut self, src: &[u8], start: usize, end: usize) -> Self {
        assert!(
            self.len + (end - start) <= MAX_DESCRIPTOR_LEN,
            "descriptor exceeds MAX_DESCRIPTOR_LEN"
        );
        let mut i = start;
        while i < end {
            self.bytes[self.len] = src[i];
            self.len += 1;
            i += 1;
        }
        self
    }

    /// Converts a scoped name (`a::b::C`) into a slash path (`a/b/C`).
    ///
    /// Single left-to-right scan. Each `::` becomes one `/`; every other
    /// byte is copied unchanged. A separator found before the end of the
    /// previous replacement stops the scan.
    pub const fn scoped_path(scoped: &str) -> Self {
        let src = scoped.as_bytes();
        let mut out = Self::EMPTY;
        let mut prev = 0;
        while let Some(pos) = find_separator(src, prev) {
            if pos < prev {
                break;
            }
            out = out.push_range(src, prev, pos).push_byte(b'/');
            prev = pos + 2;
        }
        out.push_range(src, prev, src.len())
    }

    pub const fn primitive(kind: PrimitiveKind) -> Self {
        Self::EMPTY.push_byte(kind.code())
    }

    /// `L<path>;`
    pub const fn object(path: &Descriptor) -> Self {
        Self::EMPTY.push_byte(b'L').append(path).push_byte(b';')
    }

    /// One array dimension around `element`.
    pub const fn array(element: &Descriptor) -> Self {
        Self::EMPTY.push_byte(b'[').append(element)
    }

    pub const fn array_of(element: &Descriptor, dimensions: usize) -> Self {
        let mut out = Self::EMPTY;
        let mut i = 0;
        while i < dimensions {
            out = out.push_byte(b'[');
            i += 1;
        }
        out.append(element)
    }

    /// `(<params>)<ret>` from individual parameter descriptors.
    pub const fn method(params: &[Descriptor], ret: &Descriptor) -> Self {
        let mut out = Self::EMPTY.push_byte(b'(');
        let mut i = 0;
        while i < params.len() {
            out = out.append(&params[i]);
            i += 1;
        }
        out.push_byte(b')').append(ret)
    }

    pub const fn as_bytes(&self) -> &[u8] {
        self.bytes.split_at(self.len).0
    }

    pub const fn as_str(&self) -> &str {
        // SAFETY: every byte comes from a `&str` copied on ASCII boundaries or
        // from `push_byte`, which only accepts ASCII.
        unsafe { std::str::from_utf8_unchecked(self.as_bytes()) }
    }

    pub const fn len(&self) -> usize {
        self.len
    }

    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of leading `[`.
    pub const fn dimensions(&self) -> usize {
        let mut i = 0;
        while i < self.len && self.bytes[i] == b'[' {
            i += 1;
        }
        i
    }
}

const fn find_separator(src: &[u8], from: usize) -> Option<usize> {
    let mut i = from;
    while i + 1 < src.len() {
        if src[i] == b':' && src[i + 1] == b':' {
            return Some(i);
        }
        i += 1;
    }
    None
}

/// Number of `::` separators in a scoped name, counted the way
/// [`Descriptor::scoped_path`] replaces them.
pub const fn scope_depth(scoped: &str) -> usize {
    let src = scoped.as_bytes();
    let mut count = 0;
    let mut from = 0;
    while let Some(pos) = find_separator(src, from) {
        count += 1;
        from = pos + 2;
    }
    count
}

impl PartialEq for Descriptor {
    fn eq(&self, other: &Self) -> bool {
        self.as_bytes() == other.as_bytes()
    }
}

impl Eq for Descriptor {}

impl PartialEq<str> for Descriptor {
    fn eq(&self, other: &str) -> bool {
        self.as_str() == other
    }
}

impl PartialEq<&str> for Descriptor {
    fn eq(&self, other: &&str) -> bool {
        self.as_str() == *other
    }
}

impl Hash for Descriptor {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.as_bytes().hash(state);
    }
}

impl AsRef<str> for Descriptor {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Debug for Descriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Descriptor({:?})", self.as_str())
    }
}

impl fmt::Display for Descriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Parsing
// ============================================================================

/// Kinds of a method descriptor's parameters and return value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodShape {
    pub params: Vec<ValueKind>,
    pub ret: ValueKind,
}

fn malformed(text: &str, reason: &'static str) -> Error {
    Error::MalformedDescriptor {
        descriptor: text.to_string(),
        reason,
    }
}

/// Parses one field type starting at `pos`, returning its kind and the
/// position after it.
fn parse_type(text: &str, pos: usize, allow_void: bool) -> Result<(ValueKind, usize)> {
    let bytes = text.as_bytes();
    let Some(&first) = bytes.get(pos) else {
        return Err(malformed(text, "unexpected end"));
    };
    match first {
        b'V' if allow_void => Ok((ValueKind::Void, pos + 1)),
        b'V' => Err(malformed(text, "void is only valid as a return type")),
        b'[' => {
            let mut end = pos;
            while bytes.get(end) == Some(&b'[') {
                end += 1;
            }
            let (_, next) = parse_type(text, end, false)?;
            Ok((ValueKind::Object, next))
        }
        b'L' => match text[pos..].find(';') {
            Some(offset) if offset > 1 => Ok((ValueKind::Object, pos + offset + 1)),
            Some(_) => Err(malformed(text, "empty class name")),
            None => Err(malformed(text, "unterminated class name")),
        },
        code => PrimitiveKind::try_from(code)
            .map(|kind| (ValueKind::from_primitive(kind), pos + 1))
            .map_err(|_| malformed(text, "unknown type code")),
    }
}

/// Parses a complete field descriptor such as `I` or `[Ljava/lang/String;`.
pub fn parse_field(text: &str) -> Result<ValueKind> {
    let (kind, next) = parse_type(text, 0, false)?;
    if next != text.len() {
        return Err(malformed(text, "trailing characters"));
    }
    Ok(kind)
}

/// Parses a method descriptor such as `(ILjava/lang/String;)V`.
pub fn parse_method(text: &str) -> Result<MethodShape> {
    if !text.starts_with('(') {
        return Err(malformed(text, "missing '('"));
    }
    let mut params = Vec::new();
    let mut pos = 1;
    loop {
        match text.as_bytes().get(pos) {
            Some(b')') => break,
            Some(_) => {
                let (kind, next) = parse_type(text, pos, false)?;
                params.push(kind);
                pos = next;
            }
            None => return Err(malformed(text, "missing ')'")),
        }
    }
    let (ret, next) = parse_type(text, pos + 1, true)?;
    if next != text.len() {
        return Err(malformed(text, "trailing characters"));
    }
    Ok(MethodShape { params, ret })
}
