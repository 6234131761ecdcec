//! Tagged handle words and the promote/demote walk.
//!
//! A [`Tagged`] stores `raw | TAG`, so a stored handle is recognizable by its
//! high bits alone and zero stays "absent". Which words of an aggregate are
//! handles is declared by the aggregate itself through [`Handles`]; nothing
//! here inspects raw memory.
//!
//! ```
//! use jbridge_core::tagged::{decode, encode, is_encoded};
//! use jbridge_core::JObject;
//!
//! let handle = JObject::from_raw(0x7f00_1000);
//! assert!(is_encoded(encode(handle)));
//! assert_eq!(decode(encode(handle)), handle);
//! assert!(!is_encoded(0));
//! ```

use crate::error::Result;
use crate::logging::trace;
use crate::runtime::Env;
use crate::value::{JObject, RefKind};

/// Marker occupying the high bits of an encoded handle.
#[cfg(target_pointer_width = "64")]
pub const TAG: usize = 0xECD8_0000_0000_0000;

#[cfg(target_pointer_width = "32")]
pub const TAG: usize = 0xEC00_0000;

/// Encodes a handle. Null encodes as zero.
#[inline]
pub const fn encode(raw: JObject) -> usize {
    if raw.is_null() {
        0
    } else {
        raw.into_raw() | TAG
    }
}

/// Strips the marker.
#[inline]
pub const fn decode(word: usize) -> JObject {
    JObject::from_raw(word & !TAG)
}

#[inline]
pub const fn is_encoded(word: usize) -> bool {
    word & TAG == TAG
}

/// True when `raw` survives an encode/decode round trip.
pub const fn is_representable(raw: JObject) -> bool {
    raw.into_raw() & TAG == 0
}

/// One encoded handle word.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Debug)]
pub struct Tagged(usize);

impl Tagged {
    pub const ABSENT: Tagged = Tagged(0);

    pub const fn new(raw: JObject) -> Self {
        Tagged(encode(raw))
    }

    pub const fn get(self) -> JObject {
        decode(self.0)
    }

    pub fn set(&mut self, raw: JObject) {
        self.0 = encode(raw);
    }

    pub const fn bits(self) -> usize {
        self.0
    }

    pub const fn is_encoded(self) -> bool {
        is_encoded(self.0)
    }

    pub fn clear(&mut self) {
        self.0 = 0;
    }
}

impl From<JObject> for Tagged {
    fn from(raw: JObject) -> Self {
        Tagged::new(raw)
    }
}

/// Values that can enumerate their embedded handle slots.
///
/// Implemented for the bridge's own handle holders, the common containers
/// and tuples, and as a no-op for primitives. Use `#[derive(Handles)]` for
/// structs.
pub trait Handles {
    fn visit_handles(&mut self, visitor: &mut dyn FnMut(&mut Tagged));
}

impl Handles for Tagged {
    fn visit_handles(&mut self, visitor: &mut dyn FnMut(&mut Tagged)) {
        visitor(self);
    }
}

macro_rules! impl_no_handles {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Handles for $ty {
                #[inline]
                fn visit_handles(&mut self, _visitor: &mut dyn FnMut(&mut Tagged)) {}
            }
        )*
    };
}

impl_no_handles!(
    (),
    bool,
    i8,
    u8,
    u16,
    i16,
    u32,
    i32,
    i64,
    u64,
    usize,
    f32,
    f64,
    String,
);

impl<T: Handles> Handles for Option<T> {
    fn visit_handles(&mut self, visitor: &mut dyn FnMut(&mut Tagged)) {
        if let Some(inner) = self {
            inner.visit_handles(visitor);
        }
    }
}

impl<T: Handles + ?Sized> Handles for Box<T> {
    fn visit_handles(&mut self, visitor: &mut dyn FnMut(&mut Tagged)) {
        (**self).visit_handles(visitor);
    }
}

impl<T: Handles> Handles for [T] {
    fn visit_handles(&mut self, visitor: &mut dyn FnMut(&mut Tagged)) {
        for item in self {
            item.visit_handles(visitor);
        }
    }
}

impl<T: Handles, const N: usize> Handles for [T; N] {
    fn visit_handles(&mut self, visitor: &mut dyn FnMut(&mut Tagged)) {
        self.as_mut_slice().visit_handles(visitor);
    }
}

impl<T: Handles> Handles for Vec<T> {
    fn visit_handles(&mut self, visitor: &mut dyn FnMut(&mut Tagged)) {
        self.as_mut_slice().visit_handles(visitor);
    }
}

macro_rules! impl_tuple_handles {
    ($($name:ident)+) => {
        impl<$($name: Handles),+> Handles for ($($name,)+) {
            #[allow(non_snake_case)]
            fn visit_handles(&mut self, visitor: &mut dyn FnMut(&mut Tagged)) {
                let ($($name,)+) = self;
                $($name.visit_handles(visitor);)+
            }
        }
    };
}

impl_tuple_handles!(A);
impl_tuple_handles!(A B);
impl_tuple_handles!(A B C);
impl_tuple_handles!(A B C D);
impl_tuple_handles!(A B C D E);
impl_tuple_handles!(A B C D E F);
impl_tuple_handles!(A B C D E F G);
impl_tuple_handles!(A B C D E F G H);

/// Number of encoded handles in `value`.
pub fn count_handles<T: Handles + ?Sized>(value: &mut T) -> usize {
    let mut count = 0;
    value.visit_handles(&mut |slot| {
        if slot.is_encoded() {
            count += 1;
        }
    });
    count
}

/// Replaces every encoded handle in `value` with a new global reference.
///
/// Returns the number of handles promoted. If any promotion fails, the
/// slots promoted so far are released again and the error is returned.
pub fn promote<T: Handles + ?Sized>(env: &Env, value: &mut T) -> Result<usize> {
    let mut promoted = 0;
    let mut failure = None;
    value.visit_handles(&mut |slot| {
        if failure.is_some() || !slot.is_encoded() {
            return;
        }
        match env.new_global_ref(slot.get()) {
            Ok(global) => {
                slot.set(global);
                promoted += 1;
            }
            Err(err) => failure = Some(err),
        }
    });

    if let Some(err) = failure {
        let mut remaining = promoted;
        value.visit_handles(&mut |slot| {
            if remaining > 0 && slot.is_encoded() {
                env.delete_global_ref(slot.get());
                slot.clear();
                remaining -= 1;
            }
        });
        return Err(err);
    }

    trace!(count = promoted, "promoted handles");
    Ok(promoted)
}

/// Releases every encoded global reference in `value` and clears its slot.
///
/// Slots holding references of any other kind are left untouched. Returns
/// the number of references released.
pub fn demote<T: Handles + ?Sized>(env: &Env, value: &mut T) -> usize {
    let mut released = 0;
    value.visit_handles(&mut |slot| {
        if slot.is_encoded() && env.ref_kind(slot.get()) == RefKind::Global {
            env.delete_global_ref(slot.get());
            slot.clear();
            released += 1;
        }
    });
    trace!(count = released, "demoted handles");
    released
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_is_zero() {
        assert_eq!(encode(JObject::NULL), 0);
        assert!(!is_encoded(0));
        assert!(!Tagged::ABSENT.is_encoded());
        assert_eq!(Tagged::default(), Tagged::ABSENT);
        assert!(Tagged::ABSENT.get().is_null());
    }

    #[test]
    fn tag_round_trip() {
        for raw in [1usize, 0x10, 0x7fff_f000, 0x1000_0000] {
            let handle = JObject::from_raw(raw);
            assert!(is_representable(handle));
            let word = encode(handle);
            assert!(is_encoded(word));
            assert_eq!(word & TAG, TAG);
            assert_eq!(decode(word), handle);
        }
    }

    #[test]
    fn partial_tag_is_not_encoded() {
        assert!(!is_encoded(TAG & (TAG << 1)));
        assert!(!is_encoded(0x1234));
    }

    #[test]
    fn tagged_set_and_clear() {
        let mut slot = Tagged::new(JObject::from_raw(0x40));
        assert!(slot.is_encoded());
        slot.set(JObject::from_raw(0x80));
        assert_eq!(slot.get(), JObject::from_raw(0x80));
        slot.clear();
        assert!(!slot.is_encoded());
    }

    #[test]
    fn visits_nested_aggregates() {
        let a = Tagged::new(JObject::from_raw(0x10));
        let b = Tagged::new(JObject::from_raw(0x20));
        let mut value = (a, 7i32, vec![Some(b), None], [Tagged::ABSENT; 2]);
        assert_eq!(count_handles(&mut value), 2);

        let mut seen = Vec::new();
        value.visit_handles(&mut |slot| seen.push(slot.bits()));
        assert_eq!(seen.len(), 4);
        assert_eq!(seen[0], a.bits());
        assert_eq!(seen[1], b.bits());
    }
}
