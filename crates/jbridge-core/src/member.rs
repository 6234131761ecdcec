//! Member resolution, memoized per call site.
//!
//! Every declared method, field or constructor owns one [`CallSite`]. The
//! first use resolves the class and member through the runtime's lookup
//! calls and stores the outcome; every later use returns the same
//! [`Member`] without touching the runtime. A failed lookup is stored too,
//! since a member that is missing now stays missing for the life of the
//! process.

use std::fmt;
use std::sync::OnceLock;

use crate::error::{Error, Result};
use crate::logging::{debug, warn};
use crate::runtime::{Env, VmId};
use crate::value::{FieldId, JClass, MethodId};

/// What a call site refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemberKind {
    Method,
    StaticMethod,
    Constructor,
    Field,
    StaticField,
}

impl MemberKind {
    pub const fn is_static(self) -> bool {
        matches!(self, MemberKind::StaticMethod | MemberKind::StaticField)
    }

    pub const fn name(self) -> &'static str {
        match self {
            MemberKind::Method => "method",
            MemberKind::StaticMethod => "static method",
            MemberKind::Constructor => "constructor",
            MemberKind::Field => "field",
            MemberKind::StaticField => "static field",
        }
    }
}

impl fmt::Display for MemberKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The fixed lookup key of a call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MemberKey<'a> {
    /// Internal class name, `/` separated.
    pub class: &'a str,
    pub name: &'a str,
    pub signature: &'a str,
    pub kind: MemberKind,
}

impl fmt::Display for MemberKey<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}.{}{}", self.kind, self.class, self.name, self.signature)
    }
}

/// Id types a call site can resolve to.
pub trait MemberId: Copy + Send + Sync + fmt::Debug + 'static {
    fn lookup(env: &Env, class: JClass, key: &MemberKey<'_>) -> Result<Self>;
}

impl MemberId for MethodId {
    fn lookup(env: &Env, class: JClass, key: &MemberKey<'_>) -> Result<Self> {
        env.method_id(class, key.name, key.signature, key.kind.is_static())
    }
}

impl MemberId for FieldId {
    fn lookup(env: &Env, class: JClass, key: &MemberKey<'_>) -> Result<Self> {
        env.field_id(class, key.name, key.signature, key.kind.is_static())
    }
}

/// A resolved member: a global reference to its class and the member id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Member<Id> {
    pub class: JClass,
    pub id: Id,
}

struct Resolution<Id> {
    vm: VmId,
    outcome: Result<Member<Id>>,
}

/// Per-call-site memo of a member resolution.
///
/// ```
/// use jbridge_core::member::{CallSite, MemberKey, MemberKind};
/// use jbridge_core::runtime::{sim::SimVm, Jvm};
/// use jbridge_core::MethodId;
///
/// static LENGTH: CallSite<MethodId> = CallSite::new();
///
/// let sim = SimVm::new();
/// let env = Jvm::new(sim.clone()).attach().unwrap();
/// let key = MemberKey {
///     class: "java/lang/String",
///     name: "length",
///     signature: "()I",
///     kind: MemberKind::Method,
/// };
///
/// let first = LENGTH.resolve(&env, &key).unwrap();
/// let second = LENGTH.resolve(&env, &key).unwrap();
/// assert!(std::ptr::eq(first, second));
/// assert_eq!(sim.stats().method_lookups, 1);
/// ```
pub struct CallSite<Id> {
    cell: OnceLock<Resolution<Id>>,
}

impl<Id> CallSite<Id> {
    pub const fn new() -> Self {
        CallSite {
            cell: OnceLock::new(),
        }
    }

    /// True once the first resolution, successful or not, has happened.
    pub fn is_resolved(&self) -> bool {
        self.cell.get().is_some()
    }
}

impl<Id> Default for CallSite<Id> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Id: MemberId> CallSite<Id> {
    /// Resolves `key` on first use and returns the cached outcome after.
    ///
    /// `key` must be the same on every call; it is only consulted the first
    /// time.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn resolve(&self, env: &Env, key: &MemberKey<'_>) -> Result<&Member<Id>> {
        let mut fresh = false;
        let resolution = self.cell.get_or_init(|| {
            fresh = true;
            Resolution {
                vm: env.vm_id(),
                outcome: lookup(env, key),
            }
        });

        if resolution.vm != env.vm_id() {
            return Err(Error::VmMismatch(key.to_string()));
        }
        match &resolution.outcome {
            Ok(member) => Ok(member),
            Err(err) => {
                if !fresh {
                    warn!(%key, %err, "serving cached lookup failure");
                }
                Err(err.clone())
            }
        }
    }
}

impl<Id: fmt::Debug> fmt::Debug for CallSite<Id> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.cell.get() {
            None => f.write_str("CallSite(unresolved)"),
            Some(resolution) => f
                .debug_struct("CallSite")
                .field("vm", &resolution.vm)
                .field("outcome", &resolution.outcome)
                .finish(),
        }
    }
}

fn lookup<Id: MemberId>(env: &Env, key: &MemberKey<'_>) -> Result<Member<Id>> {
    debug!(%key, "resolving member");
    let local = env.find_class(key.class)?;
    // The runtime only sees the class handle; report the name that was asked for.
    let id = Id::lookup(env, local, key).map_err(|err| match err {
        Error::MemberNotFound {
            kind,
            name,
            signature,
            ..
        } => Error::MemberNotFound {
            kind,
            class: key.class.to_string(),
            name,
            signature,
        },
        other => other,
    });
    let class = id.and_then(|id| {
        let class = env.new_global_ref(local)?;
        Ok(Member { class, id })
    });
    env.delete_local_ref(local);
    class
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::Jvm;
    use crate::runtime::sim::SimVm;
    use crate::value::{JValue, RefKind};

    fn key<'a>(class: &'a str, name: &'a str, signature: &'a str, kind: MemberKind) -> MemberKey<'a> {
        MemberKey {
            class,
            name,
            signature,
            kind,
        }
    }

    #[test]
    fn kind_names() {
        assert_eq!(MemberKind::StaticField.to_string(), "static field");
        assert!(MemberKind::StaticMethod.is_static());
        assert!(!MemberKind::Constructor.is_static());
        let k = key("a/B", "run", "()V", MemberKind::Method);
        assert_eq!(k.to_string(), "method a/B.run()V");
    }

    #[test]
    fn resolves_once() {
        static SITE: CallSite<MethodId> = CallSite::new();
        let sim = SimVm::new();
        let env = Jvm::new(sim.clone()).attach().unwrap();
        let k = key("java/lang/String", "length", "()I", MemberKind::Method);

        assert!(!SITE.is_resolved());
        let first = SITE.resolve(&env, &k).unwrap();
        let second = SITE.resolve(&env, &k).unwrap();
        assert!(std::ptr::eq(first, second));
        assert!(SITE.is_resolved());

        let stats = sim.stats();
        assert_eq!(stats.class_lookups, 1);
        assert_eq!(stats.method_lookups, 1);
        assert_eq!(env.ref_kind(first.class), RefKind::Global);
    }

    #[test]
    fn failure_is_cached() {
        static SITE: CallSite<FieldId> = CallSite::new();
        let sim = SimVm::new();
        let env = Jvm::new(sim.clone()).attach().unwrap();
        let k = key("java/lang/String", "missing", "I", MemberKind::Field);

        let first = SITE.resolve(&env, &k).unwrap_err();
        assert!(first.is_lookup_failure());
        assert_eq!(SITE.resolve(&env, &k).unwrap_err(), first);
        assert_eq!(sim.stats().field_lookups, 1);
        assert_eq!(sim.live_global_refs(), 0);
    }

    #[test]
    fn missing_class_is_cached() {
        static SITE: CallSite<MethodId> = CallSite::new();
        let sim = SimVm::new();
        let env = Jvm::new(sim.clone()).attach().unwrap();
        let k = key("no/Such", "run", "()V", MemberKind::StaticMethod);

        assert_eq!(
            SITE.resolve(&env, &k).unwrap_err(),
            Error::ClassNotFound("no/Such".into())
        );
        assert!(SITE.resolve(&env, &k).is_err());
        assert_eq!(sim.stats().class_lookups, 1);
    }

    #[test]
    fn other_vm_is_rejected() {
        static SITE: CallSite<MethodId> = CallSite::new();
        let k = key("java/lang/String", "length", "()I", MemberKind::Method);

        let first = Jvm::new(SimVm::new()).attach().unwrap();
        SITE.resolve(&first, &k).unwrap();

        let second = Jvm::new(SimVm::new()).attach().unwrap();
        assert!(matches!(SITE.resolve(&second, &k), Err(Error::VmMismatch(_))));
    }

    #[test]
    fn resolved_member_is_callable() {
        static SITE: CallSite<MethodId> = CallSite::new();
        let sim = SimVm::new();
        let env = Jvm::new(sim.clone()).attach().unwrap();
        let k = key("java/lang/String", "length", "()I", MemberKind::Method);
        let member = SITE.resolve(&env, &k).unwrap();

        let text = env.new_string("four").unwrap();
        let len = env
            .call_method(
                crate::kind::ValueKind::Int,
                crate::value::Target::Instance(text),
                member.id,
                &[],
            )
            .unwrap();
        assert_eq!(len, JValue::Int(4));
    }
}
