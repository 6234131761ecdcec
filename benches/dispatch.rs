//! Dispatch benchmarks against the simulated runtime.
//!
//! Measures the steady-state cost of the bridge itself: cached member
//! lookups, argument conversion and array element access.
//!
//! ```bash
//! cargo bench --bench dispatch
//! ```

use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use std::hint::black_box;

use jbridge::prelude::*;
use jbridge::runtime::sim::SimVm;
use jbridge::{Descriptor, JavaType};

#[derive(Mirror, Clone, Copy)]
#[jbridge(class = "bench::Counter")]
struct Counter(Object);

static NEW: Constructor<Counter, ()> = Constructor::new();
static ADD: Method<Counter, i64, (i64,)> = Method::new("add");
static NAME: Method<Counter, (), (JString,)> = Method::new("name");
static TOTAL: Field<Counter, i64> = Field::new("total");

/// Call sites bind to the first runtime they resolve against, so every
/// benchmark shares this one.
fn setup() -> (Env, Counter) {
    let sim = SimVm::new();
    sim.define_class("bench/Counter")
        .field("total", "J")
        .constructor("()V", |_| Ok(JValue::Void))
        .method("add", "(J)J", |call| {
            let total = match call.field("total")? {
                JValue::Long(v) => v,
                _ => 0,
            };
            let next = total.wrapping_add(call.arg_as::<i64>(0)?);
            call.set_field("total", JValue::Long(next))?;
            Ok(JValue::Long(next))
        })
        .method("name", "(Ljava/lang/String;)V", |_| Ok(JValue::Void))
        .define()
        .expect("define bench class");
    let env = Jvm::new(sim).attach().expect("attach");
    let counter = NEW.construct(&env, ()).expect("construct");
    (env, counter)
}

fn bench_calls(c: &mut Criterion, env: &Env, counter: &Counter) {
    let mut group = c.benchmark_group("dispatch/calls");

    group.bench_function("method_primitive", |b| {
        b.iter(|| ADD.invoke(env, counter, (black_box(1i64),)).expect("add"))
    });

    group.bench_function("method_string_arg", |b| {
        b.iter(|| NAME.invoke(env, counter, (black_box("label"),)).expect("name"))
    });

    group.bench_function("field_get", |b| {
        b.iter(|| TOTAL.get(env, counter).expect("total"))
    });

    group.finish();
}

fn bench_descriptors(c: &mut Criterion) {
    let mut group = c.benchmark_group("dispatch/descriptors");

    group.bench_function("signature_const", |b| b.iter(|| black_box(ADD.signature())));

    group.bench_function("scoped_path_runtime", |b| {
        b.iter(|| Descriptor::scoped_path(black_box("java::util::concurrent::ConcurrentHashMap")))
    });

    group.bench_function("mirror_descriptor", |b| {
        b.iter(|| black_box(<Counter as JavaType>::DESCRIPTOR.as_str().len()))
    });

    group.finish();
}

fn bench_arrays(c: &mut Criterion, env: &Env) {
    let values: Vec<i32> = (0..1024).collect();
    let array = IntArray::from_slice(env, &values).expect("array");
    let mut group = c.benchmark_group("dispatch/arrays");
    group.throughput(Throughput::Elements(values.len() as u64));

    group.bench_function("get_set", |b| {
        b.iter(|| {
            for i in 0..array.len() {
                let v = array.get(i).expect("get");
                array.set(i, v.wrapping_add(1)).expect("set");
            }
        })
    });

    group.bench_function("with_slice_sum", |b| {
        b.iter(|| array.with_slice(|s| s.iter().map(|&v| i64::from(v)).sum::<i64>()))
    });

    group.finish();
}

fn bench_dispatch(c: &mut Criterion) {
    let (env, counter) = setup();
    bench_calls(c, &env, &counter);
    bench_descriptors(c);
    bench_arrays(c, &env);
}

criterion_group!(benches, bench_dispatch);
criterion_main!(benches);
