//! Array wrappers.
//!
//! A [`PrimitiveArray`] pins the elements of a foreign array for as long as
//! it is bound and writes them back when it is released:
//!
//! ```text
//! Unbound --new/from_slice/from_raw--> Bound --drop/release/take/replace--> Released
//! ```
//!
//! Element access goes through an internal lock. Out-of-range indices are
//! reported as [`Error::IndexOutOfRange`] and leave the wrapper untouched.
//!
//! An [`ObjectArray`] holds the array handle only, since object elements
//! cannot be pinned; every element access is a runtime call.

use std::fmt;
use std::marker::PhantomData;
use std::ptr::NonNull;

use parking_lot::Mutex;

use crate::descriptor::Descriptor;
use crate::error::{Error, Result};
use crate::kind::{TypeClass, ValueKind};
use crate::logging::{error, trace};
use crate::marshal::{FromReturn, IntoArg, RawArray};
use crate::runtime::{Env, Jvm, ReleaseMode};
use crate::tagged::{Handles, Tagged};
use crate::types::{JavaType, Primitive, ReferenceType};
use crate::value::{JObject, JValue};

// ============================================================================
// Primitive arrays
// ============================================================================

struct Pin<T> {
    jvm: Jvm,
    array: Tagged,
    elements: NonNull<T>,
    len: usize,
}

// SAFETY: the pinned buffer is owned by the pin until it is released, and
// every access to it goes through the wrapper's lock.
unsafe impl<T: Send> Send for Pin<T> {}

impl<T: Primitive> Pin<T> {
    fn as_slice(&self) -> &[T] {
        // SAFETY: `elements` points at `len` pinned elements of `T` that stay
        // valid until the pin is released.
        unsafe { std::slice::from_raw_parts(self.elements.as_ptr(), self.len) }
    }

    fn as_mut_slice(&mut self) -> &mut [T] {
        // SAFETY: as in `as_slice`, and `&mut self` is exclusive.
        unsafe { std::slice::from_raw_parts_mut(self.elements.as_ptr(), self.len) }
    }

    fn unpin(&self, mode: ReleaseMode) -> Result<()> {
        let env = self.jvm.attach()?;
        env.unpin_array(T::PRIMITIVE, self.array.get(), self.elements.cast(), mode);
        trace!(kind = %T::PRIMITIVE, len = self.len, ?mode, "unpinned array");
        Ok(())
    }
}

/// A pinned view of a foreign `T[]`.
///
/// ```
/// use jbridge_core::IntArray;
/// use jbridge_core::runtime::{sim::SimVm, Jvm};
///
/// let env = Jvm::new(SimVm::new()).attach().unwrap();
/// let array = IntArray::new(&env, 4).unwrap();
/// array.set(2, 7).unwrap();
/// assert_eq!(array.get(2), Ok(7));
/// assert!(array.get(4).is_err());
/// ```
pub struct PrimitiveArray<T: Primitive> {
    pin: Mutex<Option<Pin<T>>>,
}

pub type BooleanArray = PrimitiveArray<bool>;
pub type ByteArray = PrimitiveArray<i8>;
pub type CharArray = PrimitiveArray<u16>;
pub type ShortArray = PrimitiveArray<i16>;
pub type IntArray = PrimitiveArray<i32>;
pub type LongArray = PrimitiveArray<i64>;
pub type FloatArray = PrimitiveArray<f32>;
pub type DoubleArray = PrimitiveArray<f64>;

impl<T: Primitive> PrimitiveArray<T> {
    /// Allocates a zeroed foreign array of `len` elements and pins it.
    pub fn new(env: &Env, len: usize) -> Result<Self> {
        let raw = env.new_primitive_array(T::PRIMITIVE, len)?;
        Self::from_raw(env, raw)
    }

    /// Allocates a foreign array holding `values`, written through.
    pub fn from_slice(env: &Env, values: &[T]) -> Result<Self> {
        let array = Self::new(env, values.len())?;
        if let Some(pin) = array.pin.lock().as_mut() {
            pin.as_mut_slice().copy_from_slice(values);
        }
        array.commit()?;
        Ok(array)
    }

    /// Pins an existing foreign array.
    pub fn from_raw(env: &Env, raw: JObject) -> Result<Self> {
        if raw.is_null() {
            return Err(Error::NullReference("array"));
        }
        let len = env.array_length(raw)?;
        let elements = env.pin_array(T::PRIMITIVE, raw)?;
        trace!(kind = %T::PRIMITIVE, len, "pinned array");
        Ok(PrimitiveArray {
            pin: Mutex::new(Some(Pin {
                jvm: env.jvm().clone(),
                array: Tagged::new(raw),
                elements: elements.cast(),
                len,
            })),
        })
    }

    /// Number of elements; zero when unbound.
    pub fn len(&self) -> usize {
        self.pin.lock().as_ref().map_or(0, |pin| pin.len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_bound(&self) -> bool {
        self.pin.lock().is_some()
    }

    /// The backing array handle; null when unbound.
    pub fn raw(&self) -> JObject {
        self.pin.lock().as_ref().map_or(JObject::NULL, |pin| pin.array.get())
    }

    pub fn get(&self, index: usize) -> Result<T> {
        let guard = self.pin.lock();
        let slice = guard.as_ref().map(Pin::as_slice).unwrap_or_default();
        slice
            .get(index)
            .copied()
            .ok_or(Error::IndexOutOfRange {
                index,
                len: slice.len(),
            })
    }

    pub fn set(&self, index: usize, value: T) -> Result<()> {
        let mut guard = self.pin.lock();
        let slice = guard.as_mut().map(Pin::as_mut_slice).unwrap_or_default();
        let len = slice.len();
        let slot = slice.get_mut(index).ok_or(Error::IndexOutOfRange { index, len })?;
        *slot = value;
        Ok(())
    }

    pub fn to_vec(&self) -> Vec<T> {
        self.with_slice(<[T]>::to_vec)
    }

    /// Runs `f` over the elements while holding the lock.
    pub fn with_slice<R>(&self, f: impl FnOnce(&[T]) -> R) -> R {
        let guard = self.pin.lock();
        f(guard.as_ref().map(Pin::as_slice).unwrap_or_default())
    }

    pub fn with_slice_mut<R>(&self, f: impl FnOnce(&mut [T]) -> R) -> R {
        let mut guard = self.pin.lock();
        f(guard.as_mut().map(Pin::as_mut_slice).unwrap_or_default())
    }

    /// Writes the elements back while keeping them pinned.
    pub fn commit(&self) -> Result<()> {
        match self.pin.lock().as_ref() {
            Some(pin) => pin.unpin(ReleaseMode::Commit),
            None => Ok(()),
        }
    }

    /// Unpins with the configured release mode, leaving the wrapper unbound.
    pub fn release(&self) -> Result<()> {
        let pin = self.pin.lock().take();
        match pin {
            Some(pin) => pin.unpin(pin.jvm.config().release_mode),
            None => Ok(()),
        }
    }

    /// Moves the binding out, leaving `self` unbound.
    pub fn take(&mut self) -> Self {
        std::mem::take(self)
    }

    /// Releases the current binding, then adopts `other`'s.
    pub fn replace(&mut self, mut other: Self) -> Result<()> {
        self.release()?;
        *self.pin.get_mut() = other.pin.get_mut().take();
        Ok(())
    }

    /// Allocates a new foreign array with a copy of the elements.
    pub fn try_clone(&self, env: &Env) -> Result<Self> {
        if !self.is_bound() {
            return Ok(Self::default());
        }
        let values = self.to_vec();
        Self::from_slice(env, &values)
    }
}

impl<T: Primitive> Default for PrimitiveArray<T> {
    fn default() -> Self {
        PrimitiveArray {
            pin: Mutex::new(None),
        }
    }
}

impl<T: Primitive> Drop for PrimitiveArray<T> {
    fn drop(&mut self) {
        if let Some(pin) = self.pin.get_mut().take() {
            if let Err(err) = pin.unpin(pin.jvm.config().release_mode) {
                error!(%err, "failed to release array elements");
            }
        }
    }
}

impl<T: Primitive> fmt::Debug for PrimitiveArray<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let guard = self.pin.lock();
        match guard.as_ref() {
            Some(pin) => f
                .debug_struct("PrimitiveArray")
                .field("kind", &T::PRIMITIVE)
                .field("array", &pin.array.get())
                .field("elements", &pin.as_slice())
                .finish(),
            None => f.write_str("PrimitiveArray(unbound)"),
        }
    }
}

impl<T: Primitive> JavaType for PrimitiveArray<T> {
    const DESCRIPTOR: Descriptor = Descriptor::array(&T::DESCRIPTOR);
    const KIND: ValueKind = ValueKind::Object;
    const CLASS: TypeClass = TypeClass::PrimitiveArray(T::PRIMITIVE);
}

impl<T: Primitive> ReferenceType for PrimitiveArray<T> {
    const LOOKUP_NAME: Descriptor = Self::DESCRIPTOR;
}

impl<T: Primitive> Handles for PrimitiveArray<T> {
    fn visit_handles(&mut self, visitor: &mut dyn FnMut(&mut Tagged)) {
        if let Some(pin) = self.pin.get_mut() {
            visitor(&mut pin.array);
        }
    }
}

// ============================================================================
// Object arrays
// ============================================================================

/// A foreign array of references to `E`.
pub struct ObjectArray<E> {
    array: Mutex<Tagged>,
    len: usize,
    _marker: PhantomData<fn() -> E>,
}

impl<E> ObjectArray<E> {
    /// Length used by [`ObjectArray::with_default_capacity`].
    pub const DEFAULT_CAPACITY: usize = 10;

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn raw(&self) -> JObject {
        self.array.lock().get()
    }

    pub(crate) fn from_raw_array(raw: RawArray) -> Self {
        ObjectArray {
            array: Mutex::new(Tagged::new(raw.handle)),
            len: raw.len,
            _marker: PhantomData,
        }
    }

    fn check(&self, index: usize) -> Result<()> {
        if index < self.len {
            Ok(())
        } else {
            Err(Error::IndexOutOfRange { index, len: self.len })
        }
    }

    /// The element handle at `index`, null for an empty slot.
    pub fn get_raw(&self, env: &Env, index: usize) -> Result<JObject> {
        self.check(index)?;
        let array = self.array.lock();
        env.object_array_element(array.get(), index)
    }
}

impl<E: ReferenceType> ObjectArray<E> {
    /// Allocates an array of `len` null elements.
    pub fn new(env: &Env, len: usize) -> Result<Self> {
        let name = E::LOOKUP_NAME;
        let class = env.find_class(name.as_str())?;
        let array = env.new_object_array(len, class, JObject::NULL);
        env.delete_local_ref(class);
        Ok(Self::from_raw_array(RawArray {
            handle: array?,
            len,
        }))
    }

    pub fn with_default_capacity(env: &Env) -> Result<Self> {
        Self::new(env, Self::DEFAULT_CAPACITY)
    }

    pub fn from_raw(env: &Env, raw: JObject) -> Result<Self> {
        RawArray::from_value(env, JValue::Object(raw)).map(Self::from_raw_array)
    }

    pub fn set<A: IntoArg<E>>(&self, env: &Env, index: usize, value: A) -> Result<()> {
        self.check(index)?;
        let value = value.into_arg(env)?.object()?;
        let array = self.array.lock();
        env.set_object_array_element(array.get(), index, value)
    }
}

impl<E: FromReturn + ReferenceType> ObjectArray<E> {
    /// The element at `index` converted to `E`.
    pub fn get(&self, env: &Env, index: usize) -> Result<E> {
        let raw = self.get_raw(env, index)?;
        E::from_return(env, JValue::Object(raw))
    }
}

impl<E> Clone for ObjectArray<E> {
    /// Copies the handle; both wrappers see the same foreign array.
    fn clone(&self) -> Self {
        ObjectArray {
            array: Mutex::new(*self.array.lock()),
            len: self.len,
            _marker: PhantomData,
        }
    }
}

impl<E> fmt::Debug for ObjectArray<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectArray")
            .field("array", &self.raw())
            .field("len", &self.len)
            .finish()
    }
}

impl<E: ReferenceType> JavaType for ObjectArray<E> {
    const DESCRIPTOR: Descriptor = Descriptor::array(&E::DESCRIPTOR);
    const KIND: ValueKind = ValueKind::Object;
    const CLASS: TypeClass = TypeClass::MirrorArray;
}

impl<E: ReferenceType> ReferenceType for ObjectArray<E> {
    const LOOKUP_NAME: Descriptor = Self::DESCRIPTOR;
}

impl<E> Handles for ObjectArray<E> {
    fn visit_handles(&mut self, visitor: &mut dyn FnMut(&mut Tagged)) {
        visitor(self.array.get_mut());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::JString;
    use crate::runtime::sim::SimVm;
    use crate::runtime::{Config, Jvm};

    fn env(sim: &SimVm) -> Env {
        Jvm::new(sim.clone()).attach().unwrap()
    }

    #[test]
    fn descriptors() {
        assert_eq!(IntArray::DESCRIPTOR, "[I");
        assert_eq!(ObjectArray::<IntArray>::DESCRIPTOR, "[[I");
        assert_eq!(ObjectArray::<JString>::DESCRIPTOR, "[Ljava/lang/String;");
        assert_eq!(ObjectArray::<JString>::LOOKUP_NAME, "[Ljava/lang/String;");
        assert_eq!(DoubleArray::CLASS, TypeClass::PrimitiveArray(crate::kind::PrimitiveKind::Double));
    }

    #[test]
    fn set_get_and_bounds() {
        let sim = SimVm::new();
        let env = env(&sim);
        let array = LongArray::new(&env, 3).unwrap();
        assert_eq!(array.len(), 3);
        for i in 0..3 {
            array.set(i, i as i64 * 10).unwrap();
        }
        assert_eq!(array.to_vec(), vec![0, 10, 20]);
        assert_eq!(array.get(3), Err(Error::IndexOutOfRange { index: 3, len: 3 }));
        assert_eq!(array.set(3, 1), Err(Error::IndexOutOfRange { index: 3, len: 3 }));
        assert_eq!(array.to_vec(), vec![0, 10, 20]);
    }

    #[test]
    fn drop_writes_back() {
        let sim = SimVm::new();
        let env = env(&sim);
        let raw = {
            let array = IntArray::from_slice(&env, &[1, 2, 3]).unwrap();
            array.set(0, 9).unwrap();
            array.raw()
        };
        assert_eq!(sim.pinned_arrays(), 0);

        let again = IntArray::from_raw(&env, raw).unwrap();
        assert_eq!(again.to_vec(), vec![9, 2, 3]);
    }

    #[test]
    fn abort_mode_discards() {
        let sim = SimVm::new();
        let env = Jvm::with_config(sim.clone(), Config::default().release_mode(ReleaseMode::Abort))
            .attach()
            .unwrap();
        let array = ByteArray::new(&env, 2).unwrap();
        array.set(1, 5).unwrap();
        let raw = array.raw();
        array.release().unwrap();
        assert!(!array.is_bound());
        assert_eq!(array.len(), 0);

        let again = ByteArray::from_raw(&env, raw).unwrap();
        assert_eq!(again.get(1), Ok(0));
    }

    #[test]
    fn commit_keeps_pin() {
        let sim = SimVm::new();
        let env = env(&sim);
        let array = ShortArray::new(&env, 1).unwrap();
        array.set(0, 3).unwrap();
        array.commit().unwrap();
        assert!(array.is_bound());
        assert_eq!(sim.pinned_arrays(), 1);
        drop(array);
        assert_eq!(sim.pinned_arrays(), 0);
    }

    #[test]
    fn take_leaves_source_unbound() {
        let sim = SimVm::new();
        let env = env(&sim);
        let mut source = FloatArray::from_slice(&env, &[1.5]).unwrap();
        let moved = source.take();
        assert!(!source.is_bound());
        assert!(source.raw().is_null());
        assert_eq!(moved.get(0), Ok(1.5));
        drop(source);
        assert_eq!(sim.stats().arrays_released, 0);
        drop(moved);
        assert_eq!(sim.stats().arrays_released, 1);
    }

    #[test]
    fn replace_releases_old_binding() {
        let sim = SimVm::new();
        let env = env(&sim);
        let mut array = CharArray::from_slice(&env, &[b'a' as u16]).unwrap();
        array.replace(CharArray::new(&env, 4).unwrap()).unwrap();
        assert_eq!(array.len(), 4);
        assert_eq!(sim.stats().arrays_released, 1);
        assert_eq!(sim.pinned_arrays(), 1);
    }

    #[test]
    fn try_clone_is_deep() {
        let sim = SimVm::new();
        let env = env(&sim);
        let original = BooleanArray::from_slice(&env, &[true, false]).unwrap();
        let copy = original.try_clone(&env).unwrap();
        copy.set(1, true).unwrap();
        assert_eq!(original.to_vec(), vec![true, false]);
        assert_eq!(copy.to_vec(), vec![true, true]);
        assert!(!env.is_same_object(original.raw(), copy.raw()));
    }

    #[test]
    fn unbound_access_is_out_of_range() {
        let array = DoubleArray::default();
        assert!(array.is_empty());
        assert_eq!(array.get(0), Err(Error::IndexOutOfRange { index: 0, len: 0 }));
        assert!(array.release().is_ok());
    }

    #[test]
    fn object_array_elements() {
        let sim = SimVm::new();
        let env = env(&sim);
        let array = ObjectArray::<JString>::with_default_capacity(&env).unwrap();
        assert_eq!(array.len(), ObjectArray::<JString>::DEFAULT_CAPACITY);

        array.set(&env, 3, "three").unwrap();
        assert_eq!(array.get(&env, 3).unwrap().to_string(&env).unwrap(), "three");
        assert!(array.get_raw(&env, 0).unwrap().is_null());
        assert_eq!(
            array.set(&env, 10, "x"),
            Err(Error::IndexOutOfRange { index: 10, len: 10 })
        );

        let alias = array.clone();
        assert_eq!(alias.raw(), array.raw());
        assert!(ObjectArray::<JString>::from_raw(&env, JObject::NULL).is_err());
    }
}
