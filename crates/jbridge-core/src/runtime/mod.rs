//! The seam to the foreign runtime.
//!
//! [`JavaVm`] is the process-wide invocation interface and [`JniEnv`] the
//! per-thread entry-point table. Everything above this module talks to the
//! runtime only through these two traits, which is what lets the in-memory
//! [`sim::SimVm`] and the real `jni` backend share all of the bridge.
//!
//! A [`Jvm`] wraps a `JavaVm` and hands out per-thread [`Env`]s, attaching
//! the calling thread on first use and detaching it when the thread exits.
//! The process-wide handle is installed once with [`init`].

mod attach;
#[cfg(feature = "jvm")]
pub mod jni;
pub mod sim;

use std::fmt;
use std::ops::Deref;
use std::ptr::NonNull;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use crate::error::{Error, Result};
use crate::kind::{PrimitiveKind, ValueKind};
use crate::logging::info;
use crate::value::{FieldId, JClass, JObject, JValue, MethodId, RefKind, Target};

pub use attach::is_attached;

/// Options passed when attaching a thread.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttachOptions {
    pub thread_name: Option<String>,
    pub daemon: bool,
}

/// Write-back mode when unpinning array elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ReleaseMode {
    /// Copy back and free the buffer.
    #[default]
    CopyBack,
    /// Copy back and keep the buffer.
    Commit,
    /// Free the buffer without copying back.
    Abort,
}

impl ReleaseMode {
    pub const fn code(self) -> i32 {
        match self {
            ReleaseMode::CopyBack => 0,
            ReleaseMode::Commit => 1,
            ReleaseMode::Abort => 2,
        }
    }
}

/// The process-wide invocation interface.
pub trait JavaVm: Send + Sync + 'static {
    /// Attaches the calling thread and returns its entry-point table.
    fn attach_current_thread(&self, options: &AttachOptions) -> Result<Box<dyn JniEnv>>;

    fn detach_current_thread(&self);
}

/// Per-thread entry points of the foreign runtime.
///
/// Handles returned from lookups and allocations are local references
/// unless stated otherwise.
pub trait JniEnv {
    fn find_class(&self, name: &str) -> Result<JClass>;

    fn method_id(&self, class: JClass, name: &str, signature: &str, is_static: bool)
    -> Result<MethodId>;

    fn field_id(&self, class: JClass, name: &str, signature: &str, is_static: bool)
    -> Result<FieldId>;

    /// Invokes a method through the entry point for `kind`.
    fn call_method(
        &self,
        kind: ValueKind,
        target: Target,
        method: MethodId,
        args: &[JValue],
    ) -> Result<JValue>;

    fn new_object(&self, class: JClass, constructor: MethodId, args: &[JValue]) -> Result<JObject>;

    fn get_field(&self, kind: ValueKind, target: Target, field: FieldId) -> Result<JValue>;

    fn set_field(&self, target: Target, field: FieldId, value: JValue) -> Result<()>;

    fn new_string(&self, text: &str) -> Result<JObject>;

    fn read_string(&self, string: JObject) -> Result<String>;

    fn new_global_ref(&self, object: JObject) -> Result<JObject>;

    fn delete_global_ref(&self, object: JObject);

    fn delete_local_ref(&self, object: JObject);

    fn ref_kind(&self, object: JObject) -> RefKind;

    fn is_same_object(&self, a: JObject, b: JObject) -> bool;

    fn array_length(&self, array: JObject) -> Result<usize>;

    fn new_primitive_array(&self, kind: PrimitiveKind, len: usize) -> Result<JObject>;

    /// Pins the elements of a primitive array. The pointer stays valid until
    /// a matching [`unpin_array`](Self::unpin_array) with a freeing mode.
    fn pin_array(&self, kind: PrimitiveKind, array: JObject) -> Result<NonNull<u8>>;

    fn unpin_array(&self, kind: PrimitiveKind, array: JObject, elements: NonNull<u8>, mode: ReleaseMode);

    fn new_object_array(&self, len: usize, element_class: JClass, initial: JObject) -> Result<JObject>;

    fn object_array_element(&self, array: JObject, index: usize) -> Result<JObject>;

    fn set_object_array_element(&self, array: JObject, index: usize, value: JObject) -> Result<()>;
}

// ============================================================================
// Configuration
// ============================================================================

/// Settings applied by a [`Jvm`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
    /// Name given to threads attached by the bridge.
    pub thread_name: Option<String>,
    /// Attach threads as daemons.
    pub daemon: bool,
    /// Mode used when array wrappers release their elements.
    pub release_mode: ReleaseMode,
}

impl Config {
    pub fn thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = Some(name.into());
        self
    }

    pub fn daemon(mut self, daemon: bool) -> Self {
        self.daemon = daemon;
        self
    }

    pub fn release_mode(mut self, mode: ReleaseMode) -> Self {
        self.release_mode = mode;
        self
    }

    /// Defaults overridden by `JBRIDGE_THREAD_NAME` and `JBRIDGE_DAEMON`.
    pub fn from_env() -> Self {
        let mut config = Config::default();
        if let Ok(name) = std::env::var("JBRIDGE_THREAD_NAME") {
            if !name.is_empty() {
                config.thread_name = Some(name);
            }
        }
        if let Ok(flag) = std::env::var("JBRIDGE_DAEMON") {
            config.daemon = matches!(flag.as_str(), "1" | "true" | "yes");
        }
        config
    }

    fn attach_options(&self) -> AttachOptions {
        AttachOptions {
            thread_name: self.thread_name.clone(),
            daemon: self.daemon,
        }
    }
}

// ============================================================================
// Jvm / Env
// ============================================================================

/// Identity of one [`Jvm`] instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VmId(u64);

static NEXT_VM_ID: AtomicU64 = AtomicU64::new(1);

struct JvmInner {
    id: VmId,
    config: Config,
    vm: Box<dyn JavaVm>,
}

/// Shared handle to a foreign runtime.
#[derive(Clone)]
pub struct Jvm {
    inner: Arc<JvmInner>,
}

impl Jvm {
    pub fn new(vm: impl JavaVm) -> Self {
        Self::with_config(vm, Config::default())
    }

    pub fn with_config(vm: impl JavaVm, config: Config) -> Self {
        let id = VmId(NEXT_VM_ID.fetch_add(1, Ordering::Relaxed));
        Jvm {
            inner: Arc::new(JvmInner {
                id,
                config,
                vm: Box::new(vm),
            }),
        }
    }

    pub fn id(&self) -> VmId {
        self.inner.id
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// The calling thread's environment, attaching it on first use.
    pub fn attach(&self) -> Result<Env> {
        attach::current(self)
    }

    fn attach_options(&self) -> AttachOptions {
        self.inner.config.attach_options()
    }

    fn raw(&self) -> &dyn JavaVm {
        &*self.inner.vm
    }
}

impl fmt::Debug for Jvm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Jvm")
            .field("id", &self.inner.id)
            .field("config", &self.inner.config)
            .finish()
    }
}

/// A thread's attached environment.
///
/// Cheap to clone and bound to the thread that attached it. Dereferences to
/// the runtime's [`JniEnv`].
#[derive(Clone)]
pub struct Env {
    raw: Rc<dyn JniEnv>,
    jvm: Jvm,
}

impl Env {
    fn new(raw: Rc<dyn JniEnv>, jvm: Jvm) -> Self {
        Env { raw, jvm }
    }

    pub fn jvm(&self) -> &Jvm {
        &self.jvm
    }

    pub fn vm_id(&self) -> VmId {
        self.jvm.id()
    }
}

impl Deref for Env {
    type Target = dyn JniEnv;

    fn deref(&self) -> &Self::Target {
        &*self.raw
    }
}

impl fmt::Debug for Env {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Env").field("vm", &self.jvm.id()).finish()
    }
}

// ============================================================================
// Process initialization
// ============================================================================

static PROCESS_VM: OnceLock<Jvm> = OnceLock::new();

/// Installs the process VM, configured from the environment.
///
/// Must be called exactly once, before [`vm`] or [`env`].
pub fn init(vm: impl JavaVm) -> Result<&'static Jvm> {
    init_with_config(vm, Config::from_env())
}

pub fn init_with_config(vm: impl JavaVm, config: Config) -> Result<&'static Jvm> {
    let mut installed = false;
    let jvm = PROCESS_VM.get_or_init(|| {
        installed = true;
        Jvm::with_config(vm, config)
    });
    if installed {
        info!(vm = ?jvm.id(), "bridge initialized");
        Ok(jvm)
    } else {
        Err(Error::AlreadyInitialized)
    }
}

/// The process VM.
pub fn vm() -> Result<&'static Jvm> {
    PROCESS_VM.get().ok_or(Error::NotInitialized)
}

/// The calling thread's environment on the process VM.
pub fn env() -> Result<Env> {
    vm()?.attach()
}
