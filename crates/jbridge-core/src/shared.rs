//! Promoted references with shared ownership.
//!
//! [`promote_to_shared`] turns every handle inside a value into a global
//! reference and returns a [`Shared`] that releases them when the last clone
//! goes away. [`promote_object`] is the single-handle form: it asks the
//! runtime for one global reference directly instead of walking a value.
//!
//! Release happens on whichever thread drops the last clone; that thread is
//! attached on demand.

use std::fmt;
use std::mem::ManuallyDrop;
use std::ops::Deref;
use std::sync::Arc;

use crate::call::Instance;
use crate::class::JavaClass;
use crate::error::Result;
use crate::logging::{debug, error, warn};
use crate::runtime::{Env, Jvm};
use crate::tagged::{Handles, Tagged, demote, promote};
use crate::value::{JObject, RefKind};

struct SharedInner<T: Handles> {
    jvm: Jvm,
    value: ManuallyDrop<T>,
}

impl<T: Handles> Drop for SharedInner<T> {
    fn drop(&mut self) {
        // Copy the handles out first so the value's own drop (an array
        // unpinning its elements) still sees live references.
        let mut handles: Vec<Tagged> = Vec::new();
        self.value.visit_handles(&mut |slot| {
            if slot.is_encoded() {
                handles.push(*slot);
            }
        });
        // SAFETY: `value` is never touched again after this point.
        unsafe { ManuallyDrop::drop(&mut self.value) };

        match self.jvm.attach() {
            Ok(env) => {
                let released = demote(&env, &mut handles);
                debug!(released, "released shared value");
            }
            Err(err) => error!(%err, count = handles.len(), "leaking global references"),
        }
    }
}

/// A value whose handles have been promoted to global references.
///
/// Cloning shares the same promoted handles. Dereferences to `T`.
pub struct Shared<T: Handles> {
    inner: Arc<SharedInner<T>>,
}

impl<T: Handles> Shared<T> {
    /// Number of clones sharing the promoted handles.
    pub fn share_count(this: &Self) -> usize {
        Arc::strong_count(&this.inner)
    }
}

impl<T: Handles> Clone for Shared<T> {
    fn clone(&self) -> Self {
        Shared {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Handles> Deref for Shared<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.inner.value
    }
}

impl<T: Handles + fmt::Debug> fmt::Debug for Shared<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Shared").field(&*self.inner.value).finish()
    }
}

impl<C: JavaClass, T: Handles + Instance<C>> Instance<C> for Shared<T> {
    fn instance_handle(&self) -> JObject {
        self.inner.value.instance_handle()
    }
}

/// Promotes every handle in `value` and wraps it for shared ownership.
///
/// ```
/// use jbridge_core::{promote_to_shared, JString, Mirror};
/// use jbridge_core::runtime::{sim::SimVm, Jvm};
///
/// let sim = SimVm::new();
/// let env = Jvm::new(sim.clone()).attach().unwrap();
/// let text = JString::new(&env, "kept").unwrap();
///
/// let shared = promote_to_shared(&env, text).unwrap();
/// assert_eq!(sim.live_global_refs(), 2); // the object and its class
/// assert_eq!(shared.to_string(&env).unwrap(), "kept");
///
/// drop(shared);
/// assert_eq!(sim.live_global_refs(), 0);
/// ```
pub fn promote_to_shared<T: Handles>(env: &Env, mut value: T) -> Result<Shared<T>> {
    let promoted = promote(env, &mut value)?;
    debug!(promoted, "promoted shared value");
    Ok(Shared {
        inner: Arc::new(SharedInner {
            jvm: env.jvm().clone(),
            value: ManuallyDrop::new(value),
        }),
    })
}

struct GlobalInner {
    jvm: Jvm,
    handle: JObject,
}

impl Drop for GlobalInner {
    fn drop(&mut self) {
        let env = match self.jvm.attach() {
            Ok(env) => env,
            Err(err) => {
                error!(%err, handle = ?self.handle, "leaking global reference");
                return;
            }
        };
        match env.ref_kind(self.handle) {
            RefKind::Global => env.delete_global_ref(self.handle),
            kind => warn!(?kind, handle = ?self.handle, "not releasing a non-global reference"),
        }
    }
}

/// One promoted object handle with shared ownership.
#[derive(Clone)]
pub struct GlobalRef {
    inner: Arc<GlobalInner>,
}

impl GlobalRef {
    pub fn raw(&self) -> JObject {
        self.inner.handle
    }

    pub fn is_null(&self) -> bool {
        self.inner.handle.is_null()
    }
}

impl fmt::Debug for GlobalRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("GlobalRef").field(&self.inner.handle).finish()
    }
}

/// Promotes a single handle without walking any value.
pub fn promote_object(env: &Env, object: JObject) -> Result<GlobalRef> {
    let handle = env.new_global_ref(object)?;
    Ok(GlobalRef {
        inner: Arc::new(GlobalInner {
            jvm: env.jvm().clone(),
            handle,
        }),
    })
}
