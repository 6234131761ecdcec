//! Property-based tests for descriptors, handle tagging, arrays and promotion.

use jbridge::descriptor::{parse_field, parse_method, scope_depth};
use jbridge::prelude::*;
use jbridge::runtime::sim::SimVm;
use jbridge::tagged::{TAG, decode, demote, encode, is_encoded, is_representable, promote};
use jbridge::{Descriptor, PrimitiveKind, ValueKind};
use proptest::prelude::*;

fn primitive_kind() -> impl Strategy<Value = PrimitiveKind> {
    prop::sample::select(PrimitiveKind::ALL.to_vec())
}

proptest! {
    #[test]
    fn primitive_descriptor_parses_back(kind in primitive_kind()) {
        let descriptor = Descriptor::primitive(kind);
        prop_assert_eq!(descriptor.len(), 1);
        prop_assert_eq!(parse_field(descriptor.as_str()), Ok(ValueKind::from_primitive(kind)));
    }

    #[test]
    fn array_descriptor_counts_dimensions(kind in primitive_kind(), dimensions in 1usize..12) {
        let descriptor = Descriptor::array_of(&Descriptor::primitive(kind), dimensions);
        prop_assert_eq!(descriptor.dimensions(), dimensions);
        prop_assert_eq!(descriptor.len(), dimensions + 1);
        prop_assert_eq!(parse_field(descriptor.as_str()), Ok(ValueKind::Object));

        let nested = Descriptor::array(&Descriptor::array_of(&Descriptor::primitive(kind), dimensions - 1));
        prop_assert_eq!(nested, descriptor);
    }

    #[test]
    fn scoped_path_replaces_each_separator(
        segments in prop::collection::vec("[A-Za-z_][A-Za-z0-9_$]{0,8}", 1..6)
    ) {
        let scoped = segments.join("::");
        let path = Descriptor::scoped_path(&scoped);
        prop_assert_eq!(path.as_str(), segments.join("/"));
        prop_assert_eq!(scope_depth(&scoped), segments.len() - 1);
        prop_assert_eq!(path.as_str().matches('/').count(), segments.len() - 1);
    }

    #[test]
    fn method_descriptor_parses_back(
        params in prop::collection::vec(primitive_kind(), 0..8),
        ret in primitive_kind(),
    ) {
        let parts: Vec<Descriptor> = params.iter().map(|&k| Descriptor::primitive(k)).collect();
        let descriptor = Descriptor::method(&parts, &Descriptor::primitive(ret));
        let shape = parse_method(descriptor.as_str()).unwrap();
        let expected: Vec<ValueKind> = params.iter().map(|&k| ValueKind::from_primitive(k)).collect();
        prop_assert_eq!(shape.params, expected);
        prop_assert_eq!(shape.ret, ValueKind::from_primitive(ret));
    }

    #[test]
    fn tagging_preserves_representable_handles(raw in 1usize..usize::MAX) {
        let handle = JObject::from_raw(raw);
        let word = encode(handle);
        prop_assert!(is_encoded(word));
        if raw & TAG == 0 {
            prop_assert!(is_representable(handle));
            prop_assert_eq!(decode(word), handle);
        } else {
            prop_assert!(!is_representable(handle));
        }
    }

    #[test]
    fn array_elements_round_trip(
        values in prop::collection::vec(any::<i32>(), 0..48),
        index in 0usize..64,
    ) {
        let env = Jvm::new(SimVm::new()).attach().unwrap();
        let array = IntArray::from_slice(&env, &values).unwrap();
        prop_assert_eq!(array.len(), values.len());
        prop_assert_eq!(array.to_vec(), values.clone());

        if index < values.len() {
            array.set(index, -1).unwrap();
            prop_assert_eq!(array.get(index), Ok(-1));
        } else {
            prop_assert_eq!(
                array.get(index),
                Err(Error::IndexOutOfRange { index, len: values.len() })
            );
        }
    }

    #[test]
    fn promotion_counts_present_handles(present in prop::collection::vec(any::<bool>(), 0..8)) {
        let sim = SimVm::new();
        let env = Jvm::new(sim.clone()).attach().unwrap();
        let mut slots: Vec<Option<Lazy<JString>>> = present
            .iter()
            .map(|&keep| keep.then(|| Lazy::from(&JString::new(&env, "x").unwrap())))
            .collect();
        let expected = present.iter().filter(|&&keep| keep).count();

        prop_assert_eq!(promote(&env, &mut slots), Ok(expected));
        prop_assert_eq!(sim.live_global_refs(), expected);
        prop_assert_eq!(demote(&env, &mut slots), expected);
        prop_assert_eq!(sim.live_global_refs(), 0);
    }
}
