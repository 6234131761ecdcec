//! Backend over a real JNI function table.
//!
//! Every entry point is reached through the `JNINativeInterface_` table of
//! the attached thread. A pending exception after a call is cleared and
//! reported as an [`Error`]; lookups that return null are reported as
//! [`Error::ClassNotFound`] or [`Error::MemberNotFound`].

use std::ffi::{CString, c_void};
use std::ptr::{self, NonNull};

use jni_sys::{
    JNI_OK, JNI_VERSION_1_6, JNIEnv, JNINativeInterface_, JavaVM, JavaVMAttachArgs, jboolean,
    jfieldID, jmethodID, jobject, jobjectRefType, jsize, jvalue,
};

use super::{AttachOptions, JavaVm, JniEnv, ReleaseMode};
use crate::error::{Error, Result};
use crate::kind::{PrimitiveKind, ValueKind};
use crate::logging::{trace, warn};
use crate::member::MemberKind;
use crate::value::{FieldId, JClass, JObject, JValue, MethodId, RefKind, Target};

fn entry<F>(function: Option<F>, name: &'static str) -> Result<F> {
    function.ok_or_else(|| Error::Runtime(format!("missing JNI entry point {name}")))
}

fn obj(handle: JObject) -> jobject {
    handle.into_raw() as jobject
}

fn handle(raw: jobject) -> JObject {
    JObject::from_raw(raw as usize)
}

fn jsize_of(len: usize) -> Result<jsize> {
    jsize::try_from(len).map_err(|_| Error::Runtime(format!("length {len} exceeds jsize")))
}

fn to_jvalue(value: &JValue) -> jvalue {
    match *value {
        JValue::Boolean(v) => jvalue { z: v as jboolean },
        JValue::Byte(v) => jvalue { b: v },
        JValue::Char(v) => jvalue { c: v },
        JValue::Short(v) => jvalue { s: v },
        JValue::Int(v) => jvalue { i: v },
        JValue::Long(v) => jvalue { j: v },
        JValue::Float(v) => jvalue { f: v },
        JValue::Double(v) => jvalue { d: v },
        JValue::Object(v) => jvalue { l: obj(v) },
        JValue::Void => jvalue { j: 0 },
    }
}

const VOID_VALUE: Error = Error::TypeMismatch {
    expected: "value",
    found: "void",
};

/// A `JavaVM*` obtained from the embedding process.
pub struct JniVm {
    raw: *mut JavaVM,
}

// SAFETY: the invocation interface is documented as callable from any thread.
unsafe impl Send for JniVm {}
unsafe impl Sync for JniVm {}

impl JniVm {
    /// Wraps an invocation interface pointer.
    ///
    /// # Safety
    ///
    /// `raw` must point at a live `JavaVM` that outlives the returned value.
    pub unsafe fn from_raw(raw: *mut JavaVM) -> Result<Self> {
        if raw.is_null() {
            return Err(Error::NullReference("JavaVM"));
        }
        Ok(JniVm { raw })
    }

    /// Recovers the invocation interface from an attached thread's `JNIEnv*`,
    /// typically inside `JNI_OnLoad` or a native method.
    ///
    /// # Safety
    ///
    /// `env` must be the valid `JNIEnv*` of the calling thread.
    pub unsafe fn from_env(env: *mut JNIEnv) -> Result<Self> {
        if env.is_null() {
            return Err(Error::NullReference("JNIEnv"));
        }
        let mut vm: *mut JavaVM = ptr::null_mut();
        // SAFETY: `env` is valid per the caller's contract.
        let code = unsafe {
            let get_vm = entry((**env).GetJavaVM, "GetJavaVM")?;
            get_vm(env, &mut vm)
        };
        if code != JNI_OK {
            return Err(Error::Runtime(format!("GetJavaVM returned {code}")));
        }
        // SAFETY: the runtime hands out a VM pointer that lives for the process.
        unsafe { Self::from_raw(vm) }
    }

    pub fn raw(&self) -> *mut JavaVM {
        self.raw
    }
}

impl JavaVm for JniVm {
    fn attach_current_thread(&self, options: &AttachOptions) -> Result<Box<dyn JniEnv>> {
        let name = options
            .thread_name
            .as_deref()
            .map(CString::new)
            .transpose()
            .map_err(|_| Error::Attach("thread name contains a NUL byte".into()))?;
        let mut args = JavaVMAttachArgs {
            version: JNI_VERSION_1_6,
            name: name.as_ref().map_or(ptr::null_mut(), |n| n.as_ptr().cast_mut()),
            group: ptr::null_mut(),
        };
        let mut env: *mut c_void = ptr::null_mut();

        // SAFETY: `self.raw` is live per `from_raw`; `args` and `name` outlive the call.
        let code = unsafe {
            let table = &**self.raw;
            let attach = if options.daemon {
                entry(table.AttachCurrentThreadAsDaemon, "AttachCurrentThreadAsDaemon")?
            } else {
                entry(table.AttachCurrentThread, "AttachCurrentThread")?
            };
            attach(self.raw, &mut env, (&mut args as *mut JavaVMAttachArgs).cast())
        };
        if code != JNI_OK || env.is_null() {
            return Err(Error::Attach(format!("AttachCurrentThread returned {code}")));
        }
        Ok(Box::new(JniTable { raw: env.cast() }))
    }

    fn detach_current_thread(&self) {
        // SAFETY: `self.raw` is live per `from_raw`.
        unsafe {
            match (**self.raw).DetachCurrentThread {
                Some(detach) => {
                    let code = detach(self.raw);
                    if code != JNI_OK {
                        warn!(code, "DetachCurrentThread failed");
                    }
                }
                None => warn!("missing JNI entry point DetachCurrentThread"),
            }
        }
    }
}

/// The attached thread's `JNIEnv*`.
struct JniTable {
    raw: *mut JNIEnv,
}

macro_rules! get_typed {
    ($table:expr, $kind:expr, ($($arg:expr),*);
     $boolean:ident, $byte:ident, $char:ident, $short:ident, $int:ident,
     $long:ident, $float:ident, $double:ident, $object:ident) => {
        match $kind {
            ValueKind::Boolean => {
                JValue::Boolean(unsafe { entry($table.$boolean, stringify!($boolean))?($($arg),*) } != 0)
            }
            ValueKind::Byte => JValue::Byte(unsafe { entry($table.$byte, stringify!($byte))?($($arg),*) }),
            ValueKind::Char => JValue::Char(unsafe { entry($table.$char, stringify!($char))?($($arg),*) }),
            ValueKind::Short => JValue::Short(unsafe { entry($table.$short, stringify!($short))?($($arg),*) }),
            ValueKind::Int => JValue::Int(unsafe { entry($table.$int, stringify!($int))?($($arg),*) }),
            ValueKind::Long => JValue::Long(unsafe { entry($table.$long, stringify!($long))?($($arg),*) }),
            ValueKind::Float => JValue::Float(unsafe { entry($table.$float, stringify!($float))?($($arg),*) }),
            ValueKind::Double => {
                JValue::Double(unsafe { entry($table.$double, stringify!($double))?($($arg),*) })
            }
            ValueKind::Object => {
                JValue::Object(handle(unsafe { entry($table.$object, stringify!($object))?($($arg),*) }))
            }
            ValueKind::Void => return Err(VOID_VALUE),
        }
    };
}

macro_rules! set_typed {
    ($table:expr, $value:expr, ($($arg:expr),*);
     $boolean:ident, $byte:ident, $char:ident, $short:ident, $int:ident,
     $long:ident, $float:ident, $double:ident, $object:ident) => {
        match $value {
            JValue::Boolean(v) => unsafe { entry($table.$boolean, stringify!($boolean))?($($arg,)* v as jboolean) },
            JValue::Byte(v) => unsafe { entry($table.$byte, stringify!($byte))?($($arg,)* v) },
            JValue::Char(v) => unsafe { entry($table.$char, stringify!($char))?($($arg,)* v) },
            JValue::Short(v) => unsafe { entry($table.$short, stringify!($short))?($($arg,)* v) },
            JValue::Int(v) => unsafe { entry($table.$int, stringify!($int))?($($arg,)* v) },
            JValue::Long(v) => unsafe { entry($table.$long, stringify!($long))?($($arg,)* v) },
            JValue::Float(v) => unsafe { entry($table.$float, stringify!($float))?($($arg,)* v) },
            JValue::Double(v) => unsafe { entry($table.$double, stringify!($double))?($($arg,)* v) },
            JValue::Object(v) => unsafe { entry($table.$object, stringify!($object))?($($arg,)* obj(v)) },
            JValue::Void => return Err(VOID_VALUE),
        }
    };
}

impl JniTable {
    fn table(&self) -> &JNINativeInterface_ {
        // SAFETY: `raw` is the attached thread's env and stays valid while
        // the thread is attached, which outlives every `Env` handed out.
        unsafe { &**self.raw }
    }

    /// Clears a pending exception, returning whether there was one.
    fn clear_exception(&self) -> bool {
        let table = self.table();
        let (Some(check), Some(clear)) = (table.ExceptionCheck, table.ExceptionClear) else {
            return false;
        };
        // SAFETY: plain queries on a valid env.
        unsafe {
            if check(self.raw) != 0 {
                clear(self.raw);
                true
            } else {
                false
            }
        }
    }

    fn check(&self, operation: &'static str) -> Result<()> {
        if self.clear_exception() {
            trace!(operation, "cleared pending exception");
            Err(Error::Runtime(format!("exception thrown by {operation}")))
        } else {
            Ok(())
        }
    }

    fn cstring(text: &str) -> Result<CString> {
        CString::new(text).map_err(|_| Error::Runtime(format!("'{text}' contains a NUL byte")))
    }
}

impl JniEnv for JniTable {
    fn find_class(&self, name: &str) -> Result<JClass> {
        let c_name = Self::cstring(name)?;
        let t = self.table();
        // SAFETY: valid env and NUL-terminated name.
        let class = unsafe { entry(t.FindClass, "FindClass")?(self.raw, c_name.as_ptr()) };
        if class.is_null() {
            self.clear_exception();
            return Err(Error::ClassNotFound(name.to_string()));
        }
        Ok(handle(class))
    }

    fn method_id(&self, class: JClass, name: &str, signature: &str, is_static: bool) -> Result<MethodId> {
        let (c_name, c_sig) = (Self::cstring(name)?, Self::cstring(signature)?);
        let t = self.table();
        let lookup = if is_static {
            entry(t.GetStaticMethodID, "GetStaticMethodID")?
        } else {
            entry(t.GetMethodID, "GetMethodID")?
        };
        // SAFETY: valid env, class handle and NUL-terminated strings.
        let id: jmethodID = unsafe { lookup(self.raw, obj(class), c_name.as_ptr(), c_sig.as_ptr()) };
        MethodId::from_raw(id as usize).ok_or_else(|| {
            self.clear_exception();
            let kind = match (name, is_static) {
                ("<init>", _) => MemberKind::Constructor,
                (_, true) => MemberKind::StaticMethod,
                (_, false) => MemberKind::Method,
            };
            Error::MemberNotFound {
                kind,
                class: String::new(),
                name: name.to_string(),
                signature: signature.to_string(),
            }
        })
    }

    fn field_id(&self, class: JClass, name: &str, signature: &str, is_static: bool) -> Result<FieldId> {
        let (c_name, c_sig) = (Self::cstring(name)?, Self::cstring(signature)?);
        let t = self.table();
        let lookup = if is_static {
            entry(t.GetStaticFieldID, "GetStaticFieldID")?
        } else {
            entry(t.GetFieldID, "GetFieldID")?
        };
        // SAFETY: valid env, class handle and NUL-terminated strings.
        let id: jfieldID = unsafe { lookup(self.raw, obj(class), c_name.as_ptr(), c_sig.as_ptr()) };
        FieldId::from_raw(id as usize).ok_or_else(|| {
            self.clear_exception();
            Error::MemberNotFound {
                kind: if is_static { MemberKind::StaticField } else { MemberKind::Field },
                class: String::new(),
                name: name.to_string(),
                signature: signature.to_string(),
            }
        })
    }

    fn call_method(&self, kind: ValueKind, target: Target, method: MethodId, args: &[JValue]) -> Result<JValue> {
        let t = self.table();
        let args: Vec<jvalue> = args.iter().map(to_jvalue).collect();
        let (env, ptr) = (self.raw, args.as_ptr());
        let id = method.into_raw() as jmethodID;

        let value = match (target, kind) {
            (Target::Instance(this), ValueKind::Void) => {
                unsafe { entry(t.CallVoidMethodA, "CallVoidMethodA")?(env, obj(this), id, ptr) };
                JValue::Void
            }
            (Target::Static(class), ValueKind::Void) => {
                unsafe { entry(t.CallStaticVoidMethodA, "CallStaticVoidMethodA")?(env, obj(class), id, ptr) };
                JValue::Void
            }
            (Target::Instance(this), kind) => get_typed!(t, kind, (env, obj(this), id, ptr);
                CallBooleanMethodA, CallByteMethodA, CallCharMethodA, CallShortMethodA,
                CallIntMethodA, CallLongMethodA, CallFloatMethodA, CallDoubleMethodA,
                CallObjectMethodA),
            (Target::Static(class), kind) => get_typed!(t, kind, (env, obj(class), id, ptr);
                CallStaticBooleanMethodA, CallStaticByteMethodA, CallStaticCharMethodA,
                CallStaticShortMethodA, CallStaticIntMethodA, CallStaticLongMethodA,
                CallStaticFloatMethodA, CallStaticDoubleMethodA, CallStaticObjectMethodA),
        };
        self.check("method call")?;
        Ok(value)
    }

    fn new_object(&self, class: JClass, constructor: MethodId, args: &[JValue]) -> Result<JObject> {
        let t = self.table();
        let args: Vec<jvalue> = args.iter().map(to_jvalue).collect();
        // SAFETY: valid env, class, constructor id and argument array.
        let object = unsafe {
            entry(t.NewObjectA, "NewObjectA")?(
                self.raw,
                obj(class),
                constructor.into_raw() as jmethodID,
                args.as_ptr(),
            )
        };
        self.check("constructor")?;
        Ok(handle(object))
    }

    fn get_field(&self, kind: ValueKind, target: Target, field: FieldId) -> Result<JValue> {
        let t = self.table();
        let (env, id) = (self.raw, field.into_raw() as jfieldID);
        let value = match target {
            Target::Instance(this) => get_typed!(t, kind, (env, obj(this), id);
                GetBooleanField, GetByteField, GetCharField, GetShortField, GetIntField,
                GetLongField, GetFloatField, GetDoubleField, GetObjectField),
            Target::Static(class) => get_typed!(t, kind, (env, obj(class), id);
                GetStaticBooleanField, GetStaticByteField, GetStaticCharField,
                GetStaticShortField, GetStaticIntField, GetStaticLongField,
                GetStaticFloatField, GetStaticDoubleField, GetStaticObjectField),
        };
        self.check("field read")?;
        Ok(value)
    }

    fn set_field(&self, target: Target, field: FieldId, value: JValue) -> Result<()> {
        let t = self.table();
        let (env, id) = (self.raw, field.into_raw() as jfieldID);
        match target {
            Target::Instance(this) => set_typed!(t, value, (env, obj(this), id);
                SetBooleanField, SetByteField, SetCharField, SetShortField, SetIntField,
                SetLongField, SetFloatField, SetDoubleField, SetObjectField),
            Target::Static(class) => set_typed!(t, value, (env, obj(class), id);
                SetStaticBooleanField, SetStaticByteField, SetStaticCharField,
                SetStaticShortField, SetStaticIntField, SetStaticLongField,
                SetStaticFloatField, SetStaticDoubleField, SetStaticObjectField),
        }
        self.check("field write")
    }

    fn new_string(&self, text: &str) -> Result<JObject> {
        let units: Vec<u16> = text.encode_utf16().collect();
        let len = jsize_of(units.len())?;
        let t = self.table();
        // SAFETY: `units` holds `len` UTF-16 code units.
        let string = unsafe { entry(t.NewString, "NewString")?(self.raw, units.as_ptr(), len) };
        self.check("NewString")?;
        if string.is_null() {
            return Err(Error::Runtime("NewString returned null".into()));
        }
        Ok(handle(string))
    }

    fn read_string(&self, string: JObject) -> Result<String> {
        if string.is_null() {
            return Err(Error::NullReference("java/lang/String"));
        }
        let t = self.table();
        // SAFETY: valid env and string handle; the region stays within `len`.
        let units = unsafe {
            let len = entry(t.GetStringLength, "GetStringLength")?(self.raw, obj(string));
            let mut units = vec![0u16; usize::try_from(len).unwrap_or_default()];
            entry(t.GetStringRegion, "GetStringRegion")?(self.raw, obj(string), 0, len, units.as_mut_ptr());
            units
        };
        self.check("GetStringRegion")?;
        String::from_utf16(&units).map_err(|err| Error::Runtime(err.to_string()))
    }

    fn new_global_ref(&self, object: JObject) -> Result<JObject> {
        if object.is_null() {
            return Ok(JObject::NULL);
        }
        let t = self.table();
        // SAFETY: valid env and handle.
        let global = unsafe { entry(t.NewGlobalRef, "NewGlobalRef")?(self.raw, obj(object)) };
        if global.is_null() {
            self.clear_exception();
            return Err(Error::Runtime("NewGlobalRef returned null".into()));
        }
        Ok(handle(global))
    }

    fn delete_global_ref(&self, object: JObject) {
        if object.is_null() {
            return;
        }
        // SAFETY: valid env; the caller owns the global reference.
        match self.table().DeleteGlobalRef {
            Some(delete) => unsafe { delete(self.raw, obj(object)) },
            None => warn!("missing JNI entry point DeleteGlobalRef"),
        }
    }

    fn delete_local_ref(&self, object: JObject) {
        if object.is_null() {
            return;
        }
        // SAFETY: valid env; the caller owns the local reference.
        match self.table().DeleteLocalRef {
            Some(delete) => unsafe { delete(self.raw, obj(object)) },
            None => warn!("missing JNI entry point DeleteLocalRef"),
        }
    }

    fn ref_kind(&self, object: JObject) -> RefKind {
        if object.is_null() {
            return RefKind::Invalid;
        }
        let Some(query) = self.table().GetObjectRefType else {
            return RefKind::Invalid;
        };
        // SAFETY: valid env and handle.
        match unsafe { query(self.raw, obj(object)) } {
            jobjectRefType::JNILocalRefType => RefKind::Local,
            jobjectRefType::JNIGlobalRefType => RefKind::Global,
            _ => RefKind::Invalid,
        }
    }

    fn is_same_object(&self, a: JObject, b: JObject) -> bool {
        match self.table().IsSameObject {
            // SAFETY: valid env; null handles are allowed.
            Some(same) => unsafe { same(self.raw, obj(a), obj(b)) != 0 },
            None => a == b,
        }
    }

    fn array_length(&self, array: JObject) -> Result<usize> {
        let t = self.table();
        // SAFETY: valid env and array handle.
        let len = unsafe { entry(t.GetArrayLength, "GetArrayLength")?(self.raw, obj(array)) };
        self.check("GetArrayLength")?;
        usize::try_from(len).map_err(|_| Error::Runtime(format!("negative array length {len}")))
    }

    fn new_primitive_array(&self, kind: PrimitiveKind, len: usize) -> Result<JObject> {
        let t = self.table();
        let (env, len) = (self.raw, jsize_of(len)?);
        // SAFETY: valid env and non-negative length.
        let array = unsafe {
            match kind {
                PrimitiveKind::Boolean => entry(t.NewBooleanArray, "NewBooleanArray")?(env, len),
                PrimitiveKind::Byte => entry(t.NewByteArray, "NewByteArray")?(env, len),
                PrimitiveKind::Char => entry(t.NewCharArray, "NewCharArray")?(env, len),
                PrimitiveKind::Short => entry(t.NewShortArray, "NewShortArray")?(env, len),
                PrimitiveKind::Int => entry(t.NewIntArray, "NewIntArray")?(env, len),
                PrimitiveKind::Long => entry(t.NewLongArray, "NewLongArray")?(env, len),
                PrimitiveKind::Float => entry(t.NewFloatArray, "NewFloatArray")?(env, len),
                PrimitiveKind::Double => entry(t.NewDoubleArray, "NewDoubleArray")?(env, len),
            }
        };
        self.check("array allocation")?;
        Ok(handle(array))
    }

    fn pin_array(&self, kind: PrimitiveKind, array: JObject) -> Result<NonNull<u8>> {
        let t = self.table();
        let (env, array, copy) = (self.raw, obj(array), ptr::null_mut());
        // SAFETY: valid env and an array handle of the matching element kind.
        let elements: *mut u8 = unsafe {
            match kind {
                PrimitiveKind::Boolean => {
                    entry(t.GetBooleanArrayElements, "GetBooleanArrayElements")?(env, array, copy).cast()
                }
                PrimitiveKind::Byte => entry(t.GetByteArrayElements, "GetByteArrayElements")?(env, array, copy).cast(),
                PrimitiveKind::Char => entry(t.GetCharArrayElements, "GetCharArrayElements")?(env, array, copy).cast(),
                PrimitiveKind::Short => {
                    entry(t.GetShortArrayElements, "GetShortArrayElements")?(env, array, copy).cast()
                }
                PrimitiveKind::Int => entry(t.GetIntArrayElements, "GetIntArrayElements")?(env, array, copy).cast(),
                PrimitiveKind::Long => entry(t.GetLongArrayElements, "GetLongArrayElements")?(env, array, copy).cast(),
                PrimitiveKind::Float => {
                    entry(t.GetFloatArrayElements, "GetFloatArrayElements")?(env, array, copy).cast()
                }
                PrimitiveKind::Double => {
                    entry(t.GetDoubleArrayElements, "GetDoubleArrayElements")?(env, array, copy).cast()
                }
            }
        };
        self.check("array pin")?;
        // An empty array may legitimately come back as null.
        Ok(NonNull::new(elements).unwrap_or(NonNull::dangling()))
    }

    fn unpin_array(&self, kind: PrimitiveKind, array: JObject, elements: NonNull<u8>, mode: ReleaseMode) {
        let t = self.table();
        let (env, array, mode) = (self.raw, obj(array), mode.code());
        let elements = elements.as_ptr();
        // SAFETY: `elements` came from the matching `pin_array` call.
        let released = unsafe {
            match kind {
                PrimitiveKind::Boolean => t.ReleaseBooleanArrayElements.map(|f| f(env, array, elements.cast(), mode)),
                PrimitiveKind::Byte => t.ReleaseByteArrayElements.map(|f| f(env, array, elements.cast(), mode)),
                PrimitiveKind::Char => t.ReleaseCharArrayElements.map(|f| f(env, array, elements.cast(), mode)),
                PrimitiveKind::Short => t.ReleaseShortArrayElements.map(|f| f(env, array, elements.cast(), mode)),
                PrimitiveKind::Int => t.ReleaseIntArrayElements.map(|f| f(env, array, elements.cast(), mode)),
                PrimitiveKind::Long => t.ReleaseLongArrayElements.map(|f| f(env, array, elements.cast(), mode)),
                PrimitiveKind::Float => t.ReleaseFloatArrayElements.map(|f| f(env, array, elements.cast(), mode)),
                PrimitiveKind::Double => t.ReleaseDoubleArrayElements.map(|f| f(env, array, elements.cast(), mode)),
            }
        };
        if released.is_none() {
            warn!(%kind, "missing JNI entry point to release array elements");
        }
    }

    fn new_object_array(&self, len: usize, element_class: JClass, initial: JObject) -> Result<JObject> {
        let t = self.table();
        let len = jsize_of(len)?;
        // SAFETY: valid env, class and initial element.
        let array = unsafe {
            entry(t.NewObjectArray, "NewObjectArray")?(self.raw, len, obj(element_class), obj(initial))
        };
        self.check("NewObjectArray")?;
        Ok(handle(array))
    }

    fn object_array_element(&self, array: JObject, index: usize) -> Result<JObject> {
        let t = self.table();
        let index = jsize_of(index)?;
        // SAFETY: valid env and array; bounds violations raise an exception.
        let element = unsafe { entry(t.GetObjectArrayElement, "GetObjectArrayElement")?(self.raw, obj(array), index) };
        self.check("GetObjectArrayElement")?;
        Ok(handle(element))
    }

    fn set_object_array_element(&self, array: JObject, index: usize, value: JObject) -> Result<()> {
        let t = self.table();
        let index = jsize_of(index)?;
        // SAFETY: valid env and array; bounds and store violations raise an exception.
        unsafe { entry(t.SetObjectArrayElement, "SetObjectArrayElement")?(self.raw, obj(array), index, obj(value)) };
        self.check("SetObjectArrayElement")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_vm_is_rejected() {
        let err = unsafe { JniVm::from_raw(ptr::null_mut()) }.err();
        assert_eq!(err, Some(Error::NullReference("JavaVM")));
        let err = unsafe { JniVm::from_env(ptr::null_mut()) }.err();
        assert_eq!(err, Some(Error::NullReference("JNIEnv")));
    }

    #[test]
    fn jvalue_conversion() {
        let value = to_jvalue(&JValue::Int(-7));
        assert_eq!(unsafe { value.i }, -7);
        let value = to_jvalue(&JValue::Boolean(true));
        assert_eq!(unsafe { value.z }, 1);
        let value = to_jvalue(&JValue::Object(JObject::from_raw(0x40)));
        assert_eq!(unsafe { value.l } as usize, 0x40);
    }

    #[test]
    fn jsize_bounds() {
        assert_eq!(jsize_of(12), Ok(12));
        assert!(jsize_of(usize::MAX).is_err());
    }
}
