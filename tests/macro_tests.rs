//! Integration tests for the jbridge derives.

use jbridge::prelude::*;
use jbridge::runtime::sim::SimVm;
use jbridge::tagged::count_handles;
use jbridge::{JavaType, RefKind};

/// Nested class with an explicit internal name.
#[derive(Mirror, Clone, Copy, Debug, PartialEq)]
#[jbridge(class = "java::util::Map::Entry", descriptor = "java/util/Map$Entry")]
struct Entry {
    object: Object,
}

#[derive(Mirror, Clone, Copy, Debug)]
#[jbridge(class = "java::lang::CharSequence", string)]
struct CharSequence(Object);

#[derive(Mirror, Clone, Copy, Debug)]
#[jbridge(class = "macros::Text")]
struct Text(Object);

#[derive(Handles)]
struct Session {
    entry: Entry,
    label: Option<JString>,
    #[jbridge(skip)]
    note: String,
}

#[derive(Handles)]
struct Both(Lazy<JString>, #[jbridge(skip)] u128);

#[derive(Handles)]
struct Nothing;

#[derive(Handles)]
struct Holder<T> {
    items: Vec<T>,
    #[jbridge(skip)]
    tag: &'static str,
}

fn define(sim: &SimVm) {
    sim.define_class("java/util/Map$Entry")
        .constructor("()V", |_| Ok(JValue::Void))
        .define()
        .unwrap();
    sim.define_class("macros/Text")
        .static_method("measure", "(Ljava/lang/CharSequence;)I", |call| {
            Ok(JValue::Int(call.string_arg(0)?.chars().count() as i32))
        })
        .define()
        .unwrap();
}

#[test]
fn mirror_names() {
    assert_eq!(Entry::SCOPED_NAME, "java::util::Map::Entry");
    assert_eq!(Entry::NAME, "java/util/Map$Entry");
    assert_eq!(<Entry as JavaType>::DESCRIPTOR, "Ljava/util/Map$Entry;");

    // Without an override the scoped name is converted.
    assert_eq!(Text::NAME, "macros/Text");
    assert_eq!(<CharSequence as JavaType>::DESCRIPTOR, "Ljava/lang/CharSequence;");
}

#[test]
fn mirror_over_named_field() {
    let sim = SimVm::new();
    define(&sim);
    let env = Jvm::new(sim.clone()).attach().unwrap();

    let entry = Object::construct::<Entry>(&env).map(Entry::from_object).unwrap();
    assert!(!entry.raw().is_null());
    assert_eq!(entry.object().raw(), entry.object.raw());

    let rewrapped = Entry::wrap(&env, entry.raw()).unwrap();
    assert!(rewrapped.object().is_same(&env, entry.object()));
    assert_eq!(Entry::wrap(&env, JObject::NULL), Err(Error::NullReference("java/util/Map$Entry")));
}

#[test]
fn string_flag_accepts_host_text() {
    static MEASURE: StaticMethod<Text, i32, (CharSequence,)> = StaticMethod::new("measure");

    assert_eq!(MEASURE.signature(), "(Ljava/lang/CharSequence;)I");
    let sim = SimVm::new();
    define(&sim);
    let env = Jvm::new(sim.clone()).attach().unwrap();
    assert_eq!(MEASURE.invoke(&env, ("héllo",)), Ok(5));
    assert_eq!(MEASURE.invoke(&env, (String::from("four"),)), Ok(4));
}

#[test]
fn handles_derive_visits_fields_in_order() {
    let sim = SimVm::new();
    define(&sim);
    let env = Jvm::new(sim.clone()).attach().unwrap();
    let entry = Object::construct::<Entry>(&env).map(Entry::from_object).unwrap();
    let label = JString::new(&env, "label").unwrap();

    let mut session = Session {
        entry,
        label: Some(label),
        note: "not a handle".into(),
    };
    assert_eq!(count_handles(&mut session), 4);
    session.label = None;
    assert_eq!(count_handles(&mut session), 2);

    let mut order = Vec::new();
    session.visit_handles(&mut |slot| order.push(slot.get()));
    assert_eq!(order, vec![entry.raw(), entry.class()]);
    assert_eq!(session.note, "not a handle");
}

#[test]
fn handles_derive_shapes() {
    let raw = JObject::from_raw(0x40);
    let mut both = Both(Lazy::from_raw(raw), 99);
    assert_eq!(count_handles(&mut both), 1);
    assert_eq!(both.1, 99);

    assert_eq!(count_handles(&mut Nothing), 0);

    let mut holder = Holder {
        items: vec![Lazy::<JString>::from_raw(raw), Lazy::from_raw(JObject::NULL)],
        tag: "pair",
    };
    assert_eq!(count_handles(&mut holder), 1);
    assert_eq!(holder.tag, "pair");

    let mut numbers = Holder {
        items: vec![1i32, 2, 3],
        tag: "plain",
    };
    assert_eq!(count_handles(&mut numbers), 0);
}

#[test]
fn derived_aggregate_promotes_to_shared() {
    let sim = SimVm::new();
    define(&sim);
    let env = Jvm::new(sim.clone()).attach().unwrap();
    let entry = Object::construct::<Entry>(&env).map(Entry::from_object).unwrap();

    let session = Session {
        entry,
        label: Some(JString::new(&env, "kept").unwrap()),
        note: String::new(),
    };
    let shared = promote_to_shared(&env, session).unwrap();
    assert_eq!(sim.live_global_refs(), 4);
    assert_eq!(env.ref_kind(shared.entry.raw()), RefKind::Global);
    assert_eq!(env.ref_kind(entry.raw()), RefKind::Local);
    assert_eq!(
        shared.label.as_ref().map(|l| l.to_string(&env).unwrap()).as_deref(),
        Some("kept")
    );

    drop(shared);
    assert_eq!(sim.live_global_refs(), 0);
    assert_eq!(sim.stats().invalid_releases, 0);
}
