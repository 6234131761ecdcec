//! An in-memory managed runtime.
//!
//! `SimVm` implements [`JavaVm`] and [`JniEnv`] over a small object heap so
//! the bridge can be exercised without a real VM. It keeps the distinctions
//! that matter to the bridge:
//!
//! - local and global references are separate handle values for one object;
//! - member lookups, invocations and field accesses are type checked
//!   against their descriptors;
//! - pinned array elements live in a separate buffer until released.
//!
//! Classes are defined with a builder whose members are Rust closures:
//!
//! ```
//! use jbridge_core::runtime::sim::SimVm;
//! use jbridge_core::JValue;
//!
//! let sim = SimVm::new();
//! sim.define_class("demo/Counter")
//!     .field("count", "I")
//!     .method("bump", "(I)I", |call| {
//!         let by: i32 = call.arg_as(0)?;
//!         let next = match call.field("count")? {
//!             JValue::Int(count) => count + by,
//!             _ => by,
//!         };
//!         call.set_field("count", JValue::Int(next))?;
//!         Ok(JValue::Int(next))
//!     })
//!     .define()
//!     .unwrap();
//! ```
//!
//! Every counter in [`SimStats`] is kept per calling thread.

use std::fmt;
use std::ptr::NonNull;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread::{self, ThreadId};

use parking_lot::{Mutex, MutexGuard};
use rustc_hash::FxHashMap;

use super::{AttachOptions, JavaVm, JniEnv, ReleaseMode};
use crate::descriptor::{MethodShape, parse_field, parse_method};
use crate::error::{Error, Result};
use crate::kind::{PrimitiveKind, ValueKind};
use crate::member::MemberKind;
use crate::types::Primitive;
use crate::value::{FieldId, JClass, JObject, JValue, MethodId, RefKind, Target};

/// Body of a simulated method.
pub type MethodBody = Arc<dyn Fn(&SimCall<'_>) -> Result<JValue> + Send + Sync>;

const HANDLE_BASE: usize = 0x1000;
const HANDLE_STRIDE: usize = 0x10;
const MEMBER_SHIFT: u32 = 20;
const MEMBER_MASK: usize = (1 << MEMBER_SHIFT) - 1;

const STRING_CLASS: ClassId = ClassId(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct ObjectId(u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct ClassId(usize);

/// Counters for the calling thread.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SimStats {
    pub class_lookups: usize,
    pub method_lookups: usize,
    pub field_lookups: usize,
    pub field_accesses: usize,
    pub invocations: usize,
    pub objects_created: usize,
    pub strings_created: usize,
    pub global_refs_created: usize,
    pub global_refs_deleted: usize,
    /// Deletes of handles that were not live global references.
    pub invalid_releases: usize,
    pub arrays_pinned: usize,
    pub arrays_released: usize,
}

/// One recorded method or constructor invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    pub class: String,
    pub name: String,
    pub signature: String,
    pub args: Vec<JValue>,
}

// ============================================================================
// Heap
// ============================================================================

enum HeapObject {
    Class(ClassId),
    Instance { class: ClassId, fields: Vec<JValue> },
    Str(String),
    Primitives { kind: PrimitiveKind, bytes: Vec<u8> },
    Objects { items: Vec<Option<ObjectId>> },
}

struct RefEntry {
    object: ObjectId,
    kind: RefKind,
}

struct MethodDef {
    name: String,
    signature: String,
    shape: MethodShape,
    is_static: bool,
    body: MethodBody,
}

struct FieldDef {
    name: String,
    signature: String,
    kind: ValueKind,
    is_static: bool,
    initial: JValue,
}

struct ClassDef {
    name: String,
    object: ObjectId,
    methods: Vec<MethodDef>,
    fields: Vec<FieldDef>,
    statics: Vec<JValue>,
}

/// Elements handed out by `pin_array`, owned until released.
struct PinBuffer {
    array: ObjectId,
    words: NonNull<u64>,
    len: usize,
    bytes: usize,
}

// SAFETY: the buffer is uniquely owned by the heap entry; writers outside the
// heap lock only go through the pointer handed out by `pin_array`.
unsafe impl Send for PinBuffer {}

impl PinBuffer {
    fn new(array: ObjectId, contents: &[u8]) -> Self {
        let len = contents.len().div_ceil(8).max(1);
        let mut words = vec![0u64; len];
        for (word, chunk) in words.iter_mut().zip(contents.chunks(8)) {
            let mut raw = [0u8; 8];
            raw[..chunk.len()].copy_from_slice(chunk);
            *word = u64::from_ne_bytes(raw);
        }
        let words = NonNull::from(Box::leak(words.into_boxed_slice())).cast::<u64>();
        PinBuffer {
            array,
            words,
            len,
            bytes: contents.len(),
        }
    }

    fn address(&self) -> usize {
        self.words.as_ptr() as usize
    }

    fn contents(&self) -> Vec<u8> {
        // SAFETY: `words` points at `len` initialized u64s owned by this
        // buffer, which covers `bytes` bytes.
        let bytes = unsafe { std::slice::from_raw_parts(self.words.as_ptr().cast::<u8>(), self.bytes) };
        bytes.to_vec()
    }
}

impl Drop for PinBuffer {
    fn drop(&mut self) {
        let slice = std::ptr::slice_from_raw_parts_mut(self.words.as_ptr(), self.len);
        // SAFETY: allocated by `Box::leak` in `new` with exactly this length.
        drop(unsafe { Box::from_raw(slice) });
    }
}

struct Heap {
    objects: Vec<HeapObject>,
    refs: FxHashMap<usize, RefEntry>,
    next_handle: usize,
    classes: Vec<ClassDef>,
    class_names: FxHashMap<String, ClassId>,
    pins: FxHashMap<usize, PinBuffer>,
    stats: FxHashMap<ThreadId, SimStats>,
    log: FxHashMap<ThreadId, Vec<Invocation>>,
}

impl Heap {
    fn new() -> Self {
        let mut heap = Heap {
            objects: Vec::new(),
            refs: FxHashMap::default(),
            next_handle: HANDLE_BASE,
            classes: Vec::new(),
            class_names: FxHashMap::default(),
            pins: FxHashMap::default(),
            stats: FxHashMap::default(),
            log: FxHashMap::default(),
        };
        heap.insert_class("java/lang/Object");
        heap.insert_class("java/lang/String");
        heap
    }

    fn alloc(&mut self, object: HeapObject) -> ObjectId {
        let id = ObjectId(self.objects.len() as u32);
        self.objects.push(object);
        id
    }

    fn new_ref(&mut self, object: ObjectId, kind: RefKind) -> JObject {
        let raw = self.next_handle;
        self.next_handle += HANDLE_STRIDE;
        self.refs.insert(raw, RefEntry { object, kind });
        JObject::from_raw(raw)
    }

    fn local(&mut self, object: ObjectId) -> JObject {
        self.new_ref(object, RefKind::Local)
    }

    fn resolve(&self, handle: JObject) -> Result<ObjectId> {
        if handle.is_null() {
            return Err(Error::NullReference("object"));
        }
        self.refs
            .get(&handle.into_raw())
            .map(|entry| entry.object)
            .ok_or_else(|| Error::Runtime(format!("invalid reference {handle:?}")))
    }

    fn get(&self, id: ObjectId) -> Result<&HeapObject> {
        self.objects
            .get(id.0 as usize)
            .ok_or_else(|| Error::Runtime(format!("dangling object {}", id.0)))
    }

    fn get_mut(&mut self, id: ObjectId) -> Result<&mut HeapObject> {
        self.objects
            .get_mut(id.0 as usize)
            .ok_or_else(|| Error::Runtime(format!("dangling object {}", id.0)))
    }

    fn stats(&mut self, thread: ThreadId) -> &mut SimStats {
        self.stats.entry(thread).or_default()
    }

    fn insert_class(&mut self, name: &str) -> ClassId {
        let id = ClassId(self.classes.len());
        let object = self.alloc(HeapObject::Class(id));
        self.classes.push(ClassDef {
            name: name.to_string(),
            object,
            methods: Vec::new(),
            fields: Vec::new(),
            statics: Vec::new(),
        });
        self.class_names.insert(name.to_string(), id);
        id
    }

    /// Class by name. Array classes exist implicitly.
    fn lookup_class(&mut self, name: &str) -> Option<ClassId> {
        if let Some(id) = self.class_names.get(name) {
            return Some(*id);
        }
        if name.starts_with('[') && parse_field(name).is_ok() {
            return Some(self.insert_class(name));
        }
        None
    }

    fn class_handle(&self, class: JClass) -> Result<ClassId> {
        match self.get(self.resolve(class)?)? {
            HeapObject::Class(id) => Ok(*id),
            _ => Err(Error::Runtime(format!("{class:?} is not a class"))),
        }
    }

    fn class(&self, id: ClassId) -> Result<&ClassDef> {
        self.classes
            .get(id.0)
            .ok_or_else(|| Error::Runtime(format!("unknown class {}", id.0)))
    }

    fn class_named(&self, name: &str) -> Result<ClassId> {
        self.class_names
            .get(name)
            .copied()
            .ok_or_else(|| Error::ClassNotFound(name.to_string()))
    }

    fn method(&self, method: MethodId) -> Result<(ClassId, &MethodDef)> {
        let (class, index) = member_parts(method.into_raw())?;
        let def = self
            .class(class)?
            .methods
            .get(index)
            .ok_or_else(|| Error::Runtime(format!("unknown method id {method:?}")))?;
        Ok((class, def))
    }

    fn field(&self, field: FieldId) -> Result<(ClassId, usize, &FieldDef)> {
        let (class, index) = member_parts(field.into_raw())?;
        let def = self
            .class(class)?
            .fields
            .get(index)
            .ok_or_else(|| Error::Runtime(format!("unknown field id {field:?}")))?;
        Ok((class, index, def))
    }

    fn instance(&mut self, class: ClassId) -> Result<ObjectId> {
        let fields = self
            .class(class)?
            .fields
            .iter()
            .map(|f| f.initial)
            .collect();
        Ok(self.alloc(HeapObject::Instance { class, fields }))
    }

    fn field_slot(&mut self, target: Target, class: ClassId, index: usize) -> Result<&mut JValue> {
        let slot = match target {
            Target::Static(_) => self.classes.get_mut(class.0).and_then(|c| c.statics.get_mut(index)),
            Target::Instance(object) => {
                let id = self.resolve(object)?;
                match self.get_mut(id)? {
                    HeapObject::Instance { class: owner, fields } if *owner == class => fields.get_mut(index),
                    _ => None,
                }
            }
        };
        slot.ok_or_else(|| Error::Runtime(format!("field {index} not present on {target:?}")))
    }

    fn record(&mut self, thread: ThreadId, method: MethodId, args: &[JValue]) -> Result<()> {
        let (class, def) = self.method(method)?;
        let entry = Invocation {
            class: self.class(class)?.name.clone(),
            name: def.name.clone(),
            signature: def.signature.clone(),
            args: args.to_vec(),
        };
        self.log.entry(thread).or_default().push(entry);
        self.stats(thread).invocations += 1;
        Ok(())
    }
}

fn member_raw(class: ClassId, index: usize) -> usize {
    ((class.0 + 1) << MEMBER_SHIFT) | (index + 1)
}

fn member_parts(raw: usize) -> Result<(ClassId, usize)> {
    let class = (raw >> MEMBER_SHIFT).checked_sub(1);
    let index = (raw & MEMBER_MASK).checked_sub(1);
    match (class, index) {
        (Some(class), Some(index)) => Ok((ClassId(class), index)),
        _ => Err(Error::Runtime(format!("malformed member id {raw:#x}"))),
    }
}

fn check_args(shape: &MethodShape, args: &[JValue]) -> Result<()> {
    if shape.params.len() != args.len() {
        return Err(Error::Runtime(format!(
            "expected {} arguments, got {}",
            shape.params.len(),
            args.len()
        )));
    }
    for (param, arg) in shape.params.iter().zip(args) {
        arg.expect_kind(*param)?;
    }
    Ok(())
}

fn encode_element(value: JValue, out: &mut [u8]) -> Result<()> {
    match value {
        JValue::Boolean(v) => out[0] = v as u8,
        JValue::Byte(v) => out[0] = v as u8,
        JValue::Char(v) => out.copy_from_slice(&v.to_ne_bytes()),
        JValue::Short(v) => out.copy_from_slice(&v.to_ne_bytes()),
        JValue::Int(v) => out.copy_from_slice(&v.to_ne_bytes()),
        JValue::Long(v) => out.copy_from_slice(&v.to_ne_bytes()),
        JValue::Float(v) => out.copy_from_slice(&v.to_ne_bytes()),
        JValue::Double(v) => out.copy_from_slice(&v.to_ne_bytes()),
        JValue::Void | JValue::Object(_) => {
            return Err(Error::TypeMismatch {
                expected: "primitive",
                found: value.kind().name(),
            });
        }
    }
    Ok(())
}

fn bytes<const N: usize>(src: &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&src[..N]);
    out
}

fn decode_element(kind: PrimitiveKind, src: &[u8]) -> JValue {
    match kind {
        PrimitiveKind::Boolean => JValue::Boolean(src[0] != 0),
        PrimitiveKind::Byte => JValue::Byte(src[0] as i8),
        PrimitiveKind::Char => JValue::Char(u16::from_ne_bytes(bytes(src))),
        PrimitiveKind::Short => JValue::Short(i16::from_ne_bytes(bytes(src))),
        PrimitiveKind::Int => JValue::Int(i32::from_ne_bytes(bytes(src))),
        PrimitiveKind::Long => JValue::Long(i64::from_ne_bytes(bytes(src))),
        PrimitiveKind::Float => JValue::Float(f32::from_ne_bytes(bytes(src))),
        PrimitiveKind::Double => JValue::Double(f64::from_ne_bytes(bytes(src))),
    }
}

// ============================================================================
// SimVm
// ============================================================================

struct Shared {
    heap: Mutex<Heap>,
    attaches: AtomicUsize,
    detaches: AtomicUsize,
    last_options: Mutex<Option<AttachOptions>>,
}

/// Handle to an in-memory runtime. Clones share the same heap.
#[derive(Clone)]
pub struct SimVm {
    shared: Arc<Shared>,
}

impl Default for SimVm {
    fn default() -> Self {
        Self::new()
    }
}

impl SimVm {
    /// A runtime with `java/lang/Object`, `java/lang/String` and the eight
    /// primitive wrapper classes.
    pub fn new() -> Self {
        let vm = SimVm {
            shared: Arc::new(Shared {
                heap: Mutex::new(Heap::new()),
                attaches: AtomicUsize::new(0),
                detaches: AtomicUsize::new(0),
                last_options: Mutex::new(None),
            }),
        };
        vm.install_builtins();
        vm
    }

    fn install_builtins(&self) {
        {
            let mut heap = self.heap();
            let length: MethodBody = Arc::new(|call: &SimCall<'_>| {
                let text = call.env().read_string(call.this()?)?;
                Ok(JValue::Int(text.encode_utf16().count() as i32))
            });
            if let Some(string) = heap.classes.get_mut(STRING_CLASS.0) {
                string.methods.push(MethodDef {
                    name: "length".into(),
                    signature: "()I".into(),
                    shape: MethodShape {
                        params: Vec::new(),
                        ret: ValueKind::Int,
                    },
                    is_static: false,
                    body: length,
                });
            }
        }

        for kind in PrimitiveKind::ALL {
            let wrapper = kind.wrapper_class();
            let code = kind.code() as char;
            let value_of = format!("({code})L{wrapper};");
            let getter = format!("{}Value", kind.name());
            // Builtins are well formed; a failure here would leave the class
            // undefined and surface as ClassNotFound on use.
            let _ = self
                .define_class(wrapper)
                .field("value", &code.to_string())
                .static_method("valueOf", &value_of, move |call| {
                    let boxed = call.new_instance(wrapper)?;
                    call.set_field_of(boxed, "value", call.arg(0)?)?;
                    Ok(JValue::Object(boxed))
                })
                .method(&getter, &format!("(){code}"), |call| call.field("value"))
                .define();
        }
    }

    fn heap(&self) -> MutexGuard<'_, Heap> {
        self.shared.heap.lock()
    }

    /// Starts a class definition.
    pub fn define_class(&self, name: &str) -> ClassBuilder {
        ClassBuilder {
            vm: self.clone(),
            name: name.to_string(),
            methods: Vec::new(),
            fields: Vec::new(),
            error: None,
        }
    }

    /// Counters of the calling thread.
    pub fn stats(&self) -> SimStats {
        let thread = thread::current().id();
        self.heap().stats.get(&thread).copied().unwrap_or_default()
    }

    pub fn reset_stats(&self) {
        let thread = thread::current().id();
        self.heap().stats.remove(&thread);
    }

    /// Invocations made by the calling thread, oldest first.
    pub fn invocations(&self) -> Vec<Invocation> {
        let thread = thread::current().id();
        self.heap().log.get(&thread).cloned().unwrap_or_default()
    }

    pub fn clear_invocations(&self) {
        let thread = thread::current().id();
        self.heap().log.remove(&thread);
    }

    pub fn attach_count(&self) -> usize {
        self.shared.attaches.load(Ordering::SeqCst)
    }

    pub fn detach_count(&self) -> usize {
        self.shared.detaches.load(Ordering::SeqCst)
    }

    /// Options of the most recent attach.
    pub fn last_attach_options(&self) -> Option<AttachOptions> {
        self.shared.last_options.lock().clone()
    }

    /// Global references currently alive across all threads.
    pub fn live_global_refs(&self) -> usize {
        self.heap()
            .refs
            .values()
            .filter(|entry| entry.kind == RefKind::Global)
            .count()
    }

    /// Arrays currently pinned.
    pub fn pinned_arrays(&self) -> usize {
        self.heap().pins.len()
    }

    /// Contents of a string object, for inspection.
    pub fn string_value(&self, handle: JObject) -> Option<String> {
        let heap = self.heap();
        let id = heap.resolve(handle).ok()?;
        match heap.get(id).ok()? {
            HeapObject::Str(text) => Some(text.clone()),
            _ => None,
        }
    }

    /// Value of a static field, for inspection.
    pub fn static_value(&self, class: &str, field: &str) -> Option<JValue> {
        let heap = self.heap();
        let id = heap.class_names.get(class)?;
        let def = heap.classes.get(id.0)?;
        let index = def.fields.iter().position(|f| f.is_static && f.name == field)?;
        def.statics.get(index).copied()
    }
}

impl fmt::Debug for SimVm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let heap = self.heap();
        f.debug_struct("SimVm")
            .field("classes", &heap.classes.len())
            .field("objects", &heap.objects.len())
            .field("refs", &heap.refs.len())
            .finish()
    }
}

impl JavaVm for SimVm {
    fn attach_current_thread(&self, options: &AttachOptions) -> Result<Box<dyn JniEnv>> {
        self.shared.attaches.fetch_add(1, Ordering::SeqCst);
        *self.shared.last_options.lock() = Some(options.clone());
        Ok(Box::new(SimEnv {
            vm: self.clone(),
            thread: thread::current().id(),
        }))
    }

    fn detach_current_thread(&self) {
        self.shared.detaches.fetch_add(1, Ordering::SeqCst);
    }
}

// ============================================================================
// Class builder
// ============================================================================

/// Accumulates members for [`SimVm::define_class`].
pub struct ClassBuilder {
    vm: SimVm,
    name: String,
    methods: Vec<MethodDef>,
    fields: Vec<FieldDef>,
    error: Option<Error>,
}

impl ClassBuilder {
    fn add_method(
        mut self,
        name: &str,
        signature: &str,
        is_static: bool,
        body: impl Fn(&SimCall<'_>) -> Result<JValue> + Send + Sync + 'static,
    ) -> Self {
        match parse_method(signature) {
            Ok(shape) => self.methods.push(MethodDef {
                name: name.to_string(),
                signature: signature.to_string(),
                shape,
                is_static,
                body: Arc::new(body),
            }),
            Err(err) => {
                self.error.get_or_insert(err);
            }
        }
        self
    }

    fn add_field(mut self, name: &str, signature: &str, is_static: bool, initial: Option<JValue>) -> Self {
        let field = parse_field(signature).and_then(|kind| {
            let initial = match initial {
                Some(value) => value.expect_kind(kind)?,
                None => JValue::zeroed(kind),
            };
            Ok(FieldDef {
                name: name.to_string(),
                signature: signature.to_string(),
                kind,
                is_static,
                initial,
            })
        });
        match field {
            Ok(field) => self.fields.push(field),
            Err(err) => {
                self.error.get_or_insert(err);
            }
        }
        self
    }

    /// Adds an `<init>` overload; `signature` must return `V`.
    pub fn constructor(
        self,
        signature: &str,
        body: impl Fn(&SimCall<'_>) -> Result<JValue> + Send + Sync + 'static,
    ) -> Self {
        self.add_method("<init>", signature, false, body)
    }

    pub fn method(
        self,
        name: &str,
        signature: &str,
        body: impl Fn(&SimCall<'_>) -> Result<JValue> + Send + Sync + 'static,
    ) -> Self {
        self.add_method(name, signature, false, body)
    }

    pub fn static_method(
        self,
        name: &str,
        signature: &str,
        body: impl Fn(&SimCall<'_>) -> Result<JValue> + Send + Sync + 'static,
    ) -> Self {
        self.add_method(name, signature, true, body)
    }

    /// Instance field, zero initialized per object.
    pub fn field(self, name: &str, signature: &str) -> Self {
        self.add_field(name, signature, false, None)
    }

    pub fn static_field(self, name: &str, signature: &str, value: JValue) -> Self {
        self.add_field(name, signature, true, Some(value))
    }

    /// Registers the class.
    pub fn define(self) -> Result<()> {
        if let Some(err) = self.error {
            return Err(err);
        }
        let mut heap = self.vm.heap();
        if heap.class_names.contains_key(&self.name) {
            return Err(Error::Runtime(format!("class {} already defined", self.name)));
        }
        let id = heap.insert_class(&self.name);
        let statics = self
            .fields
            .iter()
            .map(|f| if f.is_static { f.initial } else { JValue::Void })
            .collect();
        let def = &mut heap.classes[id.0];
        def.methods = self.methods;
        def.fields = self.fields;
        def.statics = statics;
        Ok(())
    }
}

// ============================================================================
// Method context
// ============================================================================

/// What a simulated method body sees.
pub struct SimCall<'a> {
    env: &'a SimEnv,
    class: ClassId,
    this: Option<JObject>,
    args: &'a [JValue],
}

impl SimCall<'_> {
    pub fn env(&self) -> &dyn JniEnv {
        self.env
    }

    pub fn args(&self) -> &[JValue] {
        self.args
    }

    pub fn arg(&self, index: usize) -> Result<JValue> {
        self.args
            .get(index)
            .copied()
            .ok_or(Error::IndexOutOfRange {
                index,
                len: self.args.len(),
            })
    }

    pub fn arg_as<T: Primitive>(&self, index: usize) -> Result<T> {
        let value = self.arg(index)?;
        T::from_value(value).ok_or(Error::TypeMismatch {
            expected: T::PRIMITIVE.name(),
            found: value.kind().name(),
        })
    }

    pub fn object_arg(&self, index: usize) -> Result<JObject> {
        self.arg(index)?.object()
    }

    pub fn string_arg(&self, index: usize) -> Result<String> {
        self.env.read_string(self.object_arg(index)?)
    }

    /// The receiver; an error inside static methods.
    pub fn this(&self) -> Result<JObject> {
        self.this.ok_or(Error::NullReference("receiver"))
    }

    pub fn field(&self, name: &str) -> Result<JValue> {
        self.field_of(self.this()?, name)
    }

    pub fn set_field(&self, name: &str, value: JValue) -> Result<()> {
        self.set_field_of(self.this()?, name, value)
    }

    pub fn field_of(&self, object: JObject, name: &str) -> Result<JValue> {
        let mut heap = self.env.vm.heap();
        let (class, index) = instance_field(&heap, object, name)?;
        heap.field_slot(Target::Instance(object), class, index).map(|slot| *slot)
    }

    pub fn set_field_of(&self, object: JObject, name: &str, value: JValue) -> Result<()> {
        let mut heap = self.env.vm.heap();
        let (class, index) = instance_field(&heap, object, name)?;
        let slot = heap.field_slot(Target::Instance(object), class, index)?;
        *slot = value.expect_kind(slot.kind())?;
        Ok(())
    }

    /// Static field of the declaring class.
    pub fn static_field(&self, name: &str) -> Result<JValue> {
        let heap = self.env.vm.heap();
        let def = heap.class(self.class)?;
        def.fields
            .iter()
            .position(|f| f.is_static && f.name == name)
            .and_then(|index| def.statics.get(index).copied())
            .ok_or_else(|| Error::Runtime(format!("no static field {name} on {}", def.name)))
    }

    pub fn set_static_field(&self, name: &str, value: JValue) -> Result<()> {
        let mut heap = self.env.vm.heap();
        let def = heap
            .classes
            .get_mut(self.class.0)
            .ok_or_else(|| Error::Runtime("declaring class vanished".into()))?;
        let index = def
            .fields
            .iter()
            .position(|f| f.is_static && f.name == name)
            .ok_or_else(|| Error::Runtime(format!("no static field {name}")))?;
        let kind = def.fields[index].kind;
        def.statics[index] = value.expect_kind(kind)?;
        Ok(())
    }

    /// Allocates an instance without running a constructor.
    pub fn new_instance(&self, class: &str) -> Result<JObject> {
        let mut heap = self.env.vm.heap();
        let id = heap.class_named(class)?;
        let object = heap.instance(id)?;
        heap.stats(self.env.thread).objects_created += 1;
        Ok(heap.local(object))
    }

    /// Allocates a primitive array holding `values`.
    pub fn new_array(&self, kind: PrimitiveKind, values: &[JValue]) -> Result<JObject> {
        let mut bytes = vec![0u8; values.len() * kind.size()];
        for (value, out) in values.iter().zip(bytes.chunks_mut(kind.size())) {
            encode_element(value.expect_kind(kind.into())?, out)?;
        }
        let mut heap = self.env.vm.heap();
        let id = heap.alloc(HeapObject::Primitives { kind, bytes });
        Ok(heap.local(id))
    }

    /// Elements of a primitive array, or local refs of an object array.
    pub fn array_values(&self, array: JObject) -> Result<Vec<JValue>> {
        let mut heap = self.env.vm.heap();
        let id = heap.resolve(array)?;
        match heap.get(id)? {
            HeapObject::Primitives { kind, bytes } => Ok(bytes
                .chunks(kind.size())
                .map(|chunk| decode_element(*kind, chunk))
                .collect()),
            HeapObject::Objects { items } => {
                let items = items.clone();
                Ok(items
                    .into_iter()
                    .map(|item| match item {
                        Some(object) => JValue::Object(heap.local(object)),
                        None => JValue::Object(JObject::NULL),
                    })
                    .collect())
            }
            _ => Err(Error::Runtime(format!("{array:?} is not an array"))),
        }
    }
}

fn instance_field(heap: &Heap, object: JObject, name: &str) -> Result<(ClassId, usize)> {
    let id = heap.resolve(object)?;
    let HeapObject::Instance { class, .. } = heap.get(id)? else {
        return Err(Error::Runtime(format!("{object:?} has no fields")));
    };
    let def = heap.class(*class)?;
    def.fields
        .iter()
        .position(|f| !f.is_static && f.name == name)
        .map(|index| (*class, index))
        .ok_or_else(|| Error::Runtime(format!("no field {name} on {}", def.name)))
}

// ============================================================================
// SimEnv
// ============================================================================

/// A thread's view of a [`SimVm`].
pub struct SimEnv {
    vm: SimVm,
    thread: ThreadId,
}

impl SimEnv {
    fn invoke(&self, class: ClassId, body: MethodBody, this: Option<JObject>, args: &[JValue]) -> Result<JValue> {
        let call = SimCall {
            env: self,
            class,
            this,
            args,
        };
        body(&call)
    }

    fn lookup_kind(name: &str, is_static: bool, is_field: bool) -> MemberKind {
        match (is_field, is_static) {
            (true, true) => MemberKind::StaticField,
            (true, false) => MemberKind::Field,
            (false, _) if name == "<init>" => MemberKind::Constructor,
            (false, true) => MemberKind::StaticMethod,
            (false, false) => MemberKind::Method,
        }
    }
}

impl fmt::Debug for SimEnv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimEnv").field("thread", &self.thread).finish()
    }
}

impl JniEnv for SimEnv {
    fn find_class(&self, name: &str) -> Result<JClass> {
        let mut heap = self.vm.heap();
        heap.stats(self.thread).class_lookups += 1;
        let id = heap
            .lookup_class(name)
            .ok_or_else(|| Error::ClassNotFound(name.to_string()))?;
        let object = heap.class(id)?.object;
        Ok(heap.local(object))
    }

    fn method_id(&self, class: JClass, name: &str, signature: &str, is_static: bool) -> Result<MethodId> {
        let mut heap = self.vm.heap();
        heap.stats(self.thread).method_lookups += 1;
        let id = heap.class_handle(class)?;
        let def = heap.class(id)?;
        def.methods
            .iter()
            .position(|m| m.name == name && m.signature == signature && m.is_static == is_static)
            .and_then(|index| MethodId::from_raw(member_raw(id, index)))
            .ok_or_else(|| Error::MemberNotFound {
                kind: Self::lookup_kind(name, is_static, false),
                class: def.name.clone(),
                name: name.to_string(),
                signature: signature.to_string(),
            })
    }

    fn field_id(&self, class: JClass, name: &str, signature: &str, is_static: bool) -> Result<FieldId> {
        let mut heap = self.vm.heap();
        heap.stats(self.thread).field_lookups += 1;
        let id = heap.class_handle(class)?;
        let def = heap.class(id)?;
        def.fields
            .iter()
            .position(|f| f.name == name && f.signature == signature && f.is_static == is_static)
            .and_then(|index| FieldId::from_raw(member_raw(id, index)))
            .ok_or_else(|| Error::MemberNotFound {
                kind: Self::lookup_kind(name, is_static, true),
                class: def.name.clone(),
                name: name.to_string(),
                signature: signature.to_string(),
            })
    }

    fn call_method(&self, kind: ValueKind, target: Target, method: MethodId, args: &[JValue]) -> Result<JValue> {
        let (class, body, ret) = {
            let mut heap = self.vm.heap();
            let (class, def) = heap.method(method)?;
            if def.is_static != target.is_static() || def.name == "<init>" {
                return Err(Error::Runtime(format!(
                    "{} cannot be invoked on {target:?}",
                    def.name
                )));
            }
            if def.shape.ret != kind {
                return Err(Error::TypeMismatch {
                    expected: def.shape.ret.name(),
                    found: kind.name(),
                });
            }
            check_args(&def.shape, args)?;
            match target {
                Target::Instance(object) => {
                    heap.resolve(object)?;
                }
                Target::Static(handle) => {
                    if heap.class_handle(handle)? != class {
                        return Err(Error::Runtime("static call through a foreign class".into()));
                    }
                }
            }
            let body = def.body.clone();
            let ret = def.shape.ret;
            heap.record(self.thread, method, args)?;
            (class, body, ret)
        };

        let this = match target {
            Target::Instance(object) => Some(object),
            Target::Static(_) => None,
        };
        let result = self.invoke(class, body, this, args)?;
        result.expect_kind(ret)
    }

    fn new_object(&self, class: JClass, constructor: MethodId, args: &[JValue]) -> Result<JObject> {
        let (class_id, body, this) = {
            let mut heap = self.vm.heap();
            let class_id = heap.class_handle(class)?;
            let (owner, def) = heap.method(constructor)?;
            if owner != class_id || def.name != "<init>" {
                return Err(Error::Runtime(format!("{} is not a constructor of this class", def.name)));
            }
            check_args(&def.shape, args)?;
            let body = def.body.clone();
            heap.record(self.thread, constructor, args)?;
            let object = heap.instance(class_id)?;
            heap.stats(self.thread).objects_created += 1;
            (class_id, body, heap.local(object))
        };
        self.invoke(class_id, body, Some(this), args)?;
        Ok(this)
    }

    fn get_field(&self, kind: ValueKind, target: Target, field: FieldId) -> Result<JValue> {
        let mut heap = self.vm.heap();
        heap.stats(self.thread).field_accesses += 1;
        let (class, index, def) = heap.field(field)?;
        if def.is_static != target.is_static() {
            return Err(Error::Runtime(format!("{} accessed on {target:?}", def.name)));
        }
        if def.kind != kind {
            return Err(Error::TypeMismatch {
                expected: def.kind.name(),
                found: kind.name(),
            });
        }
        heap.field_slot(target, class, index).map(|slot| *slot)
    }

    fn set_field(&self, target: Target, field: FieldId, value: JValue) -> Result<()> {
        let mut heap = self.vm.heap();
        heap.stats(self.thread).field_accesses += 1;
        let (class, index, def) = heap.field(field)?;
        if def.is_static != target.is_static() {
            return Err(Error::Runtime(format!("{} accessed on {target:?}", def.name)));
        }
        let value = value.expect_kind(def.kind)?;
        *heap.field_slot(target, class, index)? = value;
        Ok(())
    }

    fn new_string(&self, text: &str) -> Result<JObject> {
        let mut heap = self.vm.heap();
        heap.stats(self.thread).strings_created += 1;
        let id = heap.alloc(HeapObject::Str(text.to_string()));
        Ok(heap.local(id))
    }

    fn read_string(&self, string: JObject) -> Result<String> {
        let heap = self.vm.heap();
        match heap.get(heap.resolve(string)?)? {
            HeapObject::Str(text) => Ok(text.clone()),
            _ => Err(Error::TypeMismatch {
                expected: "string",
                found: "object",
            }),
        }
    }

    fn new_global_ref(&self, object: JObject) -> Result<JObject> {
        if object.is_null() {
            return Ok(JObject::NULL);
        }
        let mut heap = self.vm.heap();
        let id = heap.resolve(object)?;
        heap.stats(self.thread).global_refs_created += 1;
        Ok(heap.new_ref(id, RefKind::Global))
    }

    fn delete_global_ref(&self, object: JObject) {
        let mut heap = self.vm.heap();
        let raw = object.into_raw();
        let is_global = heap.refs.get(&raw).map(|e| e.kind) == Some(RefKind::Global);
        if is_global {
            heap.refs.remove(&raw);
            heap.stats(self.thread).global_refs_deleted += 1;
        } else {
            heap.stats(self.thread).invalid_releases += 1;
        }
    }

    fn delete_local_ref(&self, object: JObject) {
        let mut heap = self.vm.heap();
        let raw = object.into_raw();
        if heap.refs.get(&raw).map(|e| e.kind) == Some(RefKind::Local) {
            heap.refs.remove(&raw);
        }
    }

    fn ref_kind(&self, object: JObject) -> RefKind {
        self.vm
            .heap()
            .refs
            .get(&object.into_raw())
            .map(|e| e.kind)
            .unwrap_or(RefKind::Invalid)
    }

    fn is_same_object(&self, a: JObject, b: JObject) -> bool {
        if a.is_null() || b.is_null() {
            return a.is_null() && b.is_null();
        }
        let heap = self.vm.heap();
        match (heap.resolve(a), heap.resolve(b)) {
            (Ok(a), Ok(b)) => a == b,
            _ => false,
        }
    }

    fn array_length(&self, array: JObject) -> Result<usize> {
        let heap = self.vm.heap();
        match heap.get(heap.resolve(array)?)? {
            HeapObject::Primitives { kind, bytes } => Ok(bytes.len() / kind.size()),
            HeapObject::Objects { items } => Ok(items.len()),
            _ => Err(Error::Runtime(format!("{array:?} is not an array"))),
        }
    }

    fn new_primitive_array(&self, kind: PrimitiveKind, len: usize) -> Result<JObject> {
        let mut heap = self.vm.heap();
        heap.stats(self.thread).objects_created += 1;
        let id = heap.alloc(HeapObject::Primitives {
            kind,
            bytes: vec![0; len * kind.size()],
        });
        Ok(heap.local(id))
    }

    fn pin_array(&self, kind: PrimitiveKind, array: JObject) -> Result<NonNull<u8>> {
        let mut heap = self.vm.heap();
        let id = heap.resolve(array)?;
        let pin = match heap.get(id)? {
            HeapObject::Primitives { kind: actual, bytes } if *actual == kind => PinBuffer::new(id, bytes),
            HeapObject::Primitives { kind: actual, .. } => {
                return Err(Error::TypeMismatch {
                    expected: kind.name(),
                    found: actual.name(),
                });
            }
            _ => return Err(Error::Runtime(format!("{array:?} is not a primitive array"))),
        };
        let elements = pin.words.cast::<u8>();
        heap.pins.insert(pin.address(), pin);
        heap.stats(self.thread).arrays_pinned += 1;
        Ok(elements)
    }

    fn unpin_array(&self, _kind: PrimitiveKind, array: JObject, elements: NonNull<u8>, mode: ReleaseMode) {
        let mut heap = self.vm.heap();
        let address = elements.as_ptr() as usize;
        let Some(pin) = heap.pins.get(&address) else {
            heap.stats(self.thread).invalid_releases += 1;
            return;
        };
        if heap.resolve(array).ok() != Some(pin.array) {
            heap.stats(self.thread).invalid_releases += 1;
            return;
        }
        let target = pin.array;
        if mode != ReleaseMode::Abort {
            let contents = pin.contents();
            if let Ok(HeapObject::Primitives { bytes, .. }) = heap.get_mut(target) {
                bytes.copy_from_slice(&contents);
            }
        }
        if mode != ReleaseMode::Commit {
            heap.pins.remove(&address);
            heap.stats(self.thread).arrays_released += 1;
        }
    }

    fn new_object_array(&self, len: usize, element_class: JClass, initial: JObject) -> Result<JObject> {
        let mut heap = self.vm.heap();
        heap.class_handle(element_class)?;
        let initial = if initial.is_null() {
            None
        } else {
            Some(heap.resolve(initial)?)
        };
        heap.stats(self.thread).objects_created += 1;
        let id = heap.alloc(HeapObject::Objects {
            items: vec![initial; len],
        });
        Ok(heap.local(id))
    }

    fn object_array_element(&self, array: JObject, index: usize) -> Result<JObject> {
        let mut heap = self.vm.heap();
        let item = match heap.get(heap.resolve(array)?)? {
            HeapObject::Objects { items } => *items.get(index).ok_or(Error::IndexOutOfRange {
                index,
                len: items.len(),
            })?,
            _ => return Err(Error::Runtime(format!("{array:?} is not an object array"))),
        };
        Ok(match item {
            Some(object) => heap.local(object),
            None => JObject::NULL,
        })
    }

    fn set_object_array_element(&self, array: JObject, index: usize, value: JObject) -> Result<()> {
        let mut heap = self.vm.heap();
        let value = if value.is_null() {
            None
        } else {
            Some(heap.resolve(value)?)
        };
        let id = heap.resolve(array)?;
        match heap.get_mut(id)? {
            HeapObject::Objects { items } => {
                let len = items.len();
                let slot = items.get_mut(index).ok_or(Error::IndexOutOfRange { index, len })?;
                *slot = value;
                Ok(())
            }
            _ => Err(Error::Runtime(format!("{array:?} is not an object array"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(sim: &SimVm) -> SimEnv {
        SimEnv {
            vm: sim.clone(),
            thread: thread::current().id(),
        }
    }

    #[test]
    fn builtin_classes() {
        let sim = SimVm::new();
        let env = env(&sim);
        assert!(env.find_class("java/lang/Object").is_ok());
        assert!(env.find_class("java/lang/Integer").is_ok());
        assert_eq!(
            env.find_class("no/such/Thing"),
            Err(Error::ClassNotFound("no/such/Thing".into()))
        );
        assert!(env.find_class("[I").is_ok());
        assert!(env.find_class("[Q").is_err());
        assert_eq!(sim.stats().class_lookups, 5);
    }

    #[test]
    fn string_length() {
        let sim = SimVm::new();
        let env = env(&sim);
        let class = env.find_class("java/lang/String").unwrap();
        let length = env.method_id(class, "length", "()I", false).unwrap();
        let text = env.new_string("héllo").unwrap();
        let result = env
            .call_method(ValueKind::Int, Target::Instance(text), length, &[])
            .unwrap();
        assert_eq!(result, JValue::Int(5));
        assert_eq!(sim.string_value(text).as_deref(), Some("héllo"));
    }

    #[test]
    fn dispatch_is_type_checked() {
        let sim = SimVm::new();
        sim.define_class("sim/Adder")
            .static_method("add", "(II)I", |call| {
                Ok(JValue::Int(call.arg_as::<i32>(0)? + call.arg_as::<i32>(1)?))
            })
            .define()
            .unwrap();
        let env = env(&sim);
        let class = env.find_class("sim/Adder").unwrap();
        let add = env.method_id(class, "add", "(II)I", true).unwrap();

        let ok = env.call_method(ValueKind::Int, Target::Static(class), add, &[JValue::Int(2), JValue::Int(3)]);
        assert_eq!(ok, Ok(JValue::Int(5)));

        let wrong_kind = env.call_method(ValueKind::Long, Target::Static(class), add, &[JValue::Int(2), JValue::Int(3)]);
        assert!(matches!(wrong_kind, Err(Error::TypeMismatch { .. })));

        let wrong_arg = env.call_method(ValueKind::Int, Target::Static(class), add, &[JValue::Int(2), JValue::Long(3)]);
        assert!(matches!(wrong_arg, Err(Error::TypeMismatch { .. })));

        assert_eq!(sim.invocations().len(), 1);
        assert_eq!(sim.invocations()[0].name, "add");
    }

    #[test]
    fn missing_member_reports_kind() {
        let sim = SimVm::new();
        let env = env(&sim);
        let class = env.find_class("java/lang/String").unwrap();
        let err = env.method_id(class, "<init>", "()V", false).unwrap_err();
        assert!(matches!(err, Error::MemberNotFound { kind: MemberKind::Constructor, .. }));
        let err = env.field_id(class, "count", "I", true).unwrap_err();
        assert!(matches!(err, Error::MemberNotFound { kind: MemberKind::StaticField, .. }));
    }

    #[test]
    fn global_refs_are_distinct_handles() {
        let sim = SimVm::new();
        let env = env(&sim);
        let local = env.new_string("x").unwrap();
        let global = env.new_global_ref(local).unwrap();
        assert_ne!(local, global);
        assert!(env.is_same_object(local, global));
        assert_eq!(env.ref_kind(local), RefKind::Local);
        assert_eq!(env.ref_kind(global), RefKind::Global);
        assert_eq!(sim.live_global_refs(), 1);

        env.delete_global_ref(global);
        env.delete_global_ref(global);
        assert_eq!(env.ref_kind(global), RefKind::Invalid);
        assert_eq!(sim.stats().global_refs_deleted, 1);
        assert_eq!(sim.stats().invalid_releases, 1);
    }

    #[test]
    fn pinned_elements_write_back() {
        let sim = SimVm::new();
        let env = env(&sim);
        let array = env.new_primitive_array(PrimitiveKind::Int, 3).unwrap();
        let elements = env.pin_array(PrimitiveKind::Int, array).unwrap();
        // SAFETY: three i32 elements were pinned.
        unsafe { elements.cast::<i32>().as_ptr().add(1).write(42) };

        env.unpin_array(PrimitiveKind::Int, array, elements, ReleaseMode::CopyBack);
        assert_eq!(sim.pinned_arrays(), 0);

        let elements = env.pin_array(PrimitiveKind::Int, array).unwrap();
        // SAFETY: as above.
        let value = unsafe { elements.cast::<i32>().as_ptr().add(1).read() };
        assert_eq!(value, 42);
        env.unpin_array(PrimitiveKind::Int, array, elements, ReleaseMode::Abort);
        assert_eq!(sim.stats().arrays_released, 2);
    }

    #[test]
    fn aborted_release_discards_writes() {
        let sim = SimVm::new();
        let env = env(&sim);
        let array = env.new_primitive_array(PrimitiveKind::Byte, 2).unwrap();
        let elements = env.pin_array(PrimitiveKind::Byte, array).unwrap();
        // SAFETY: two bytes were pinned.
        unsafe { elements.as_ptr().write(9) };
        env.unpin_array(PrimitiveKind::Byte, array, elements, ReleaseMode::Abort);

        let elements = env.pin_array(PrimitiveKind::Byte, array).unwrap();
        // SAFETY: as above.
        assert_eq!(unsafe { elements.as_ptr().read() }, 0);
        env.unpin_array(PrimitiveKind::Byte, array, elements, ReleaseMode::CopyBack);
    }

    #[test]
    fn static_field_initial_value() {
        let sim = SimVm::new();
        sim.define_class("sim/Consts")
            .static_field("ANSWER", "I", JValue::Int(42))
            .static_field("RATIO", "D", JValue::Double(0.5))
            .define()
            .unwrap();
        assert_eq!(sim.static_value("sim/Consts", "ANSWER"), Some(JValue::Int(42)));
        assert_eq!(sim.static_value("sim/Consts", "RATIO"), Some(JValue::Double(0.5)));

        let bad = sim.define_class("sim/Bad").static_field("X", "I", JValue::Long(1)).define();
        assert!(matches!(bad, Err(Error::TypeMismatch { .. })));
    }

    #[test]
    fn duplicate_class_rejected() {
        let sim = SimVm::new();
        sim.define_class("sim/Once").define().unwrap();
        assert!(sim.define_class("sim/Once").define().is_err());
        assert!(sim.define_class("sim/Broken").method("m", "(", |_| Ok(JValue::Void)).define().is_err());
    }

    #[test]
    fn object_arrays() {
        let sim = SimVm::new();
        let env = env(&sim);
        let class = env.find_class("java/lang/String").unwrap();
        let array = env.new_object_array(2, class, JObject::NULL).unwrap();
        let text = env.new_string("a").unwrap();
        env.set_object_array_element(array, 1, text).unwrap();
        assert!(env.object_array_element(array, 0).unwrap().is_null());
        let item = env.object_array_element(array, 1).unwrap();
        assert!(env.is_same_object(item, text));
        assert_eq!(
            env.object_array_element(array, 2),
            Err(Error::IndexOutOfRange { index: 2, len: 2 })
        );
        assert_eq!(env.array_length(array), Ok(2));
    }
}
