//! Tests for the host-facing object API on `Interpreter`: reference counting,
//! the container operations, the total order and `Object` conversion.
//!
//! Every `Value` a test obtains is handed back with `release`, so the tests also
//! pass under the `ref-count-panic` feature.

use std::cmp::Ordering;

use cinder::{CodeBuilder, ExcType, Interpreter, Kind, MAX_DATA_RECURSION_DEPTH, Object, Opcode, Value};
use pretty_assertions::assert_eq;

// =============================================================================
// 1. Reference counting
// =============================================================================

/// A new object starts with one reference; acquire and release move the count.
#[test]
fn acquire_and_release_track_the_count() {
    let mut interp = Interpreter::new();
    let s = interp.new_str("hello").unwrap();
    assert_eq!(interp.refcount(&s), 1);

    let other = interp.acquire(&s);
    assert_eq!(interp.refcount(&s), 2);
    assert!(other.is(&s));

    interp.release(other);
    assert_eq!(interp.refcount(&s), 1);

    let id = s.id();
    interp.release(s);
    assert!(!interp.is_live(id), "last release destroys the object");
}

/// Releasing None is a no-op.
#[test]
fn release_none_is_noop() {
    let mut interp = Interpreter::new();
    let before = interp.heap_stats().live_objects;
    interp.release(None::<Value>);
    assert_eq!(interp.heap_stats().live_objects, before);
}

/// Destroying a container releases the references it held.
#[test]
fn destroying_a_list_releases_items() {
    let mut interp = Interpreter::new();
    let item = interp.new_int(5).unwrap();
    let kept = interp.acquire(&item);
    let list = interp.new_list(vec![item]).unwrap();
    assert_eq!(interp.refcount(&kept), 2);

    interp.release(list);
    assert_eq!(interp.refcount(&kept), 1);
    interp.release(kept);
}

/// The None and bool singletons are shared objects.
#[test]
fn singletons_are_shared() {
    let mut interp = Interpreter::new();
    let a = interp.none();
    let b = interp.none();
    assert!(a.is(&b));
    assert_eq!(interp.kind(&a), Kind::None);

    let t = interp.bool_value(true);
    let f = interp.bool_value(false);
    assert_eq!(interp.to_object(&t), Object::Int(1));
    assert_eq!(interp.to_object(&f), Object::Int(0));
    assert!(interp.is_truthy(&t));
    assert!(!interp.is_truthy(&f));
    assert!(!interp.is_truthy(&a));
    for value in [a, b, t, f] {
        interp.release(value);
    }
}

/// Releasing a very deeply nested list frees every level without growing the
/// host stack.
#[test]
fn releasing_deep_nesting_frees_every_level() {
    let mut interp = Interpreter::new();
    let baseline = interp.heap_stats();
    let deep = nested_list(&mut interp, 200_000);
    assert_eq!(interp.heap_stats().live_objects, baseline.live_objects + 200_001);
    interp.release(deep);
    assert_eq!(interp.heap_stats(), baseline);
}

/// Heap snapshots count live objects by kind name.
#[test]
fn heap_stats_count_by_kind() {
    let mut interp = Interpreter::new();
    let before = interp.heap_stats();
    let list = interp.new_list(vec![]).unwrap();
    let after = interp.heap_stats();
    assert_eq!(after.live_objects, before.live_objects + 1);
    assert_eq!(
        after.objects_by_kind.get("list").copied().unwrap_or(0),
        before.objects_by_kind.get("list").copied().unwrap_or(0) + 1
    );
    interp.release(list);
    assert_eq!(interp.heap_stats().live_objects, before.live_objects);
}

// =============================================================================
// 2. Dictionaries
// =============================================================================

/// Insert, lookup and remove by string key; removal releases the value.
#[test]
fn dict_insert_lookup_remove() {
    let mut interp = Interpreter::new();
    let dict = interp.new_dict().unwrap();
    let value = interp.new_int(42).unwrap();
    let id = value.id();
    interp.dict_insert(&dict, "answer", value).unwrap();

    let found = interp.dict_lookup(&dict, "answer").map(|v| interp.to_object(v));
    assert_eq!(found, Some(Object::Int(42)));
    assert_eq!(interp.dict_len(&dict), Some(1));

    interp.dict_remove(&dict, "answer").unwrap();
    assert!(interp.dict_lookup(&dict, "answer").is_none());
    assert!(!interp.is_live(id));
    interp.release(dict);
}

/// Removing an absent key is a RuntimeError.
#[test]
fn dict_remove_missing_key() {
    let mut interp = Interpreter::new();
    let dict = interp.new_dict().unwrap();
    let err = interp.dict_remove(&dict, "nope").unwrap_err();
    assert_eq!(err.exc_type(), Some(ExcType::RuntimeError));
    assert_eq!(err.message(), Some("key not in dictionary"));
    interp.release(dict);
}

/// The table grows through the prime sizes as entries are added.
#[test]
fn dict_capacity_grows_through_primes() {
    let mut interp = Interpreter::new();
    let dict = interp.new_dict().unwrap();
    assert_eq!(interp.dict_capacity(&dict), Some(3));
    let mut capacities = Vec::new();
    for i in 0..10 {
        let value = interp.new_int(i).unwrap();
        interp.dict_insert(&dict, &format!("key{i}"), value).unwrap();
        capacities.push(interp.dict_capacity(&dict).unwrap());
    }
    assert_eq!(capacities, vec![3, 3, 7, 7, 7, 13, 13, 13, 13, 31]);
    for i in 0..10 {
        let found = interp.dict_lookup(&dict, &format!("key{i}")).map(|v| interp.to_object(v));
        assert_eq!(found, Some(Object::Int(i)), "key{i} survives the rebuilds");
    }
    interp.release(dict);
}

/// Slot iteration visits every live key exactly once and skips removed ones.
#[test]
fn dict_slot_iteration() {
    let mut interp = Interpreter::new();
    let dict = interp.new_dict().unwrap();
    for key in ["a", "b", "c", "d"] {
        let none = interp.none();
        interp.dict_insert(&dict, key, none).unwrap();
    }
    interp.dict_remove(&dict, "b").unwrap();
    let capacity = interp.dict_capacity(&dict).unwrap();
    let mut keys: Vec<String> = (0..capacity).filter_map(|i| interp.dict_key_at(&dict, i)).collect();
    keys.sort();
    assert_eq!(keys, vec!["a", "c", "d"]);
    interp.release(dict);
}

/// Replacing a key releases the displaced value and keeps the length.
#[test]
fn dict_replace_releases_old_value() {
    let mut interp = Interpreter::new();
    let dict = interp.new_dict().unwrap();
    let first = interp.new_str("first").unwrap();
    let first_id = first.id();
    interp.dict_insert(&dict, "k", first).unwrap();
    let second = interp.new_str("second").unwrap();
    interp.dict_insert(&dict, "k", second).unwrap();
    assert!(!interp.is_live(first_id));
    assert_eq!(interp.dict_len(&dict), Some(1));
    interp.release(dict);
}

// =============================================================================
// 3. Lists, tuples and strings
// =============================================================================

fn int_list(interp: &mut Interpreter, items: &[i64]) -> Value {
    let items = items.iter().map(|&i| interp.new_int(i).unwrap()).collect();
    interp.new_list(items).unwrap()
}

/// `list_set` replaces an item and releases the old one.
#[test]
fn list_set_replaces_item() {
    let mut interp = Interpreter::new();
    let list = int_list(&mut interp, &[1, 2, 3]);
    let old_id = interp.list_get(&list, 1).unwrap().id();
    let value = interp.new_int(20).unwrap();
    interp.list_set(&list, 1, value).unwrap();
    assert!(!interp.is_live(old_id));
    assert_eq!(
        interp.to_object(&list),
        Object::List(vec![Object::Int(1), Object::Int(20), Object::Int(3)])
    );
    interp.release(list);
}

/// `list_set` past the end is an error and leaves the list untouched.
#[test]
fn list_set_out_of_range() {
    let mut interp = Interpreter::new();
    let list = int_list(&mut interp, &[1]);
    let value = interp.new_int(2).unwrap();
    let err = interp.list_set(&list, 5, value).unwrap_err();
    assert_eq!(err.exc_type(), Some(ExcType::RuntimeError));
    assert_eq!(interp.len(&list), Some(1));
    interp.release(list);
}

/// `tuple_set` rebinds an item in place; the length stays fixed.
#[test]
fn tuple_set_rebinds_item() {
    let mut interp = Interpreter::new();
    let items = vec![interp.none(), interp.none()];
    let tuple = interp.new_tuple(items).unwrap();
    let value = interp.new_str("a").unwrap();
    interp.tuple_set(&tuple, 0, value).unwrap();
    let value = interp.new_int(3).unwrap();
    let err = interp.tuple_set(&tuple, 2, value).unwrap_err();
    assert_eq!(err.message(), Some("tuple index out of range"));
    assert_eq!(
        interp.to_object(&tuple),
        Object::Tuple(vec![Object::String("a".to_owned()), Object::None])
    );
    interp.release(tuple);
}

/// Insertion positions are clamped to the list bounds, so a negative position inserts at the front.
#[test]
fn list_insert_clamps() {
    let mut interp = Interpreter::new();
    let list = int_list(&mut interp, &[1, 2]);
    for (index, value) in [(100, 9), (-100, 0), (1, 5)] {
        let value = interp.new_int(value).unwrap();
        interp.list_insert(&list, index, value).unwrap();
    }
    assert_eq!(
        interp.to_object(&list),
        Object::List(vec![Object::Int(0), Object::Int(5), Object::Int(1), Object::Int(2), Object::Int(9)])
    );
    interp.release(list);
}

/// Appending to something that is not a list is a SystemError and releases the value.
#[test]
fn list_append_to_non_list() {
    let mut interp = Interpreter::new();
    let dict = interp.new_dict().unwrap();
    let value = interp.new_int(1).unwrap();
    let id = value.id();
    let err = interp.list_append(&dict, value).unwrap_err();
    assert_eq!(err.exc_type(), Some(ExcType::SystemError));
    assert!(!interp.is_live(id));
    interp.release(dict);
}

/// A slice of a list is a new list sharing the items.
#[test]
fn list_slice_is_a_copy() {
    let mut interp = Interpreter::new();
    let list = int_list(&mut interp, &[1, 2, 3, 4]);
    let slice = interp.slice(&list, Some(1), Some(3)).unwrap();
    assert!(!slice.is(&list));
    assert_eq!(interp.to_object(&slice), Object::List(vec![Object::Int(2), Object::Int(3)]));
    let shared = interp.list_get(&list, 1).unwrap();
    assert_eq!(interp.refcount(shared), 2);

    let whole = interp.slice(&list, None, None).unwrap();
    assert!(!whole.is(&list), "lists are always copied");
    for value in [list, slice, whole] {
        interp.release(value);
    }
}

/// Whole-range slices of strings and tuples return the object itself.
#[test]
fn whole_range_slice_shares_immutables() {
    let mut interp = Interpreter::new();
    let s = interp.new_str("abc").unwrap();
    let same = interp.slice(&s, Some(-10), Some(10)).unwrap();
    assert!(same.is(&s));

    let one = interp.new_int(1).unwrap();
    let tuple = interp.new_tuple(vec![one]).unwrap();
    let same_tuple = interp.slice(&tuple, None, None).unwrap();
    assert!(same_tuple.is(&tuple));

    let part = interp.slice(&s, Some(1), None).unwrap();
    assert_eq!(interp.to_object(&part), Object::String("bc".to_owned()));
    for value in [s, same, tuple, same_tuple, part] {
        interp.release(value);
    }
}

/// Concatenating with an empty string or tuple returns the other operand.
#[test]
fn concat_with_empty_shares_operand() {
    let mut interp = Interpreter::new();
    let s = interp.new_str("abc").unwrap();
    let empty = interp.new_str("").unwrap();
    let result = interp.concat(&s, &empty).unwrap();
    assert!(result.is(&s));
    for value in [s, empty, result] {
        interp.release(value);
    }
}

/// Indexing honours negative indices and reports out-of-range with the kind name.
#[test]
fn index_sequences() {
    let mut interp = Interpreter::new();
    let list = int_list(&mut interp, &[10, 20, 30]);
    let last = interp.index(&list, -1).unwrap();
    assert_eq!(interp.to_object(&last), Object::Int(30));
    let err = interp.index(&list, 3).unwrap_err();
    assert_eq!(err.message(), Some("list index out of range"));

    let s = interp.new_str("xyz").unwrap();
    let err = interp.index(&s, -4).unwrap_err();
    assert_eq!(err.message(), Some("string index out of range"));
    for value in [list, last, s] {
        interp.release(value);
    }
}

/// Length is defined for sequences and dicts only.
#[test]
fn len_of_kinds() {
    let mut interp = Interpreter::new();
    let s = interp.new_str("four").unwrap();
    let i = interp.new_int(4).unwrap();
    assert_eq!(interp.len(&s), Some(4));
    assert_eq!(interp.len(&i), None);
    interp.release(s);
    interp.release(i);
}

// =============================================================================
// 4. Ordering
// =============================================================================

/// Different kinds order by kind name: "float" < "int" < "list" < "string".
#[test]
fn cross_kind_total_order() {
    let mut interp = Interpreter::new();
    let values = vec![
        interp.new_str("a").unwrap(),
        interp.new_int(-100).unwrap(),
        interp.new_list(vec![]).unwrap(),
        interp.new_float(1e9).unwrap(),
    ];
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| interp.compare(&values[a], &values[b]).unwrap());
    let kinds: Vec<Kind> = order.iter().map(|&i| interp.kind(&values[i])).collect();
    assert_eq!(kinds, vec![Kind::Float, Kind::Int, Kind::List, Kind::Str]);
    for value in values {
        interp.release(value);
    }
}

/// A NaN compares equal to every float, so the float order stops being
/// transitive once a NaN is involved.
#[test]
fn nan_compares_equal() {
    let mut interp = Interpreter::new();
    let nan = interp.new_float(f64::NAN).unwrap();
    let one = interp.new_float(1.0).unwrap();
    let two = interp.new_float(2.0).unwrap();
    assert_eq!(interp.compare(&nan, &one).unwrap(), Ordering::Equal);
    assert_eq!(interp.compare(&nan, &two).unwrap(), Ordering::Equal);
    assert_eq!(interp.compare(&two, &nan).unwrap(), Ordering::Equal);
    assert_eq!(interp.compare(&one, &two).unwrap(), Ordering::Less);
    for value in [nan, one, two] {
        interp.release(value);
    }
}

/// Checks reflexivity, antisymmetry and transitivity of `compare` over every
/// pair and triple of `values`.
fn assert_total_order(interp: &Interpreter, values: &[Value]) {
    let cmp = |a: usize, b: usize| interp.compare(&values[a], &values[b]).unwrap();
    let n = values.len();
    for a in 0..n {
        assert_eq!(cmp(a, a), Ordering::Equal, "value {a} is not equal to itself");
        for b in 0..n {
            assert_eq!(cmp(a, b), cmp(b, a).reverse(), "values {a} and {b} are not antisymmetric");
            for c in 0..n {
                if cmp(a, b) != Ordering::Greater && cmp(b, c) != Ordering::Greater {
                    assert_ne!(cmp(a, c), Ordering::Greater, "values {a}, {b}, {c} are not transitive");
                }
            }
        }
    }
}

/// Values of mixed kinds form a total order, stable across repeated calls.
#[test]
fn mixed_kinds_are_totally_ordered() {
    let mut interp = Interpreter::new();
    let empty_list = interp.new_list(vec![]).unwrap();
    let one = interp.new_int(1).unwrap();
    let singleton_list = interp.new_list(vec![one]).unwrap();
    let values = vec![
        interp.new_str("b").unwrap(),
        interp.new_int(5).unwrap(),
        interp.new_float(0.5).unwrap(),
        interp.none(),
        interp.new_str("a").unwrap(),
        interp.new_tuple(vec![]).unwrap(),
        interp.new_dict().unwrap(),
        interp.new_int(-1).unwrap(),
        empty_list,
        singleton_list,
        interp.new_float(-3.0).unwrap(),
    ];
    assert_total_order(&interp, &values);
    assert_total_order(&interp, &values);
    for value in values {
        interp.release(value);
    }
}

/// Kinds without a value order fall back to identity: distinct dicts and
/// distinct functions never compare equal, and the order is consistent.
#[test]
fn identity_ordered_kinds_are_totally_ordered() {
    let mut interp = Interpreter::new();
    let mut body = CodeBuilder::new("f.py");
    body.emit_name(Opcode::LoadName, "none").emit(Opcode::ReturnValue);
    let mut b = CodeBuilder::new("main.py");
    b.load_const(body.build()).emit(Opcode::BuildFunction).emit(Opcode::ReturnValue);
    let code = interp.load_code(&b.build()).unwrap();
    let globals = interp.new_dict().unwrap();

    let values = vec![
        interp.new_dict().unwrap(),
        interp.eval(&code, &globals, &globals, None).unwrap(),
        interp.new_dict().unwrap(),
        interp.eval(&code, &globals, &globals, None).unwrap(),
    ];
    assert_eq!(interp.kind(&values[1]), Kind::Func);
    assert_ne!(interp.compare(&values[0], &values[2]).unwrap(), Ordering::Equal);
    assert_ne!(interp.compare(&values[1], &values[3]).unwrap(), Ordering::Equal);
    assert_total_order(&interp, &values);
    for value in values {
        interp.release(value);
    }
    interp.release(code);
    interp.release(globals);
}

/// Nested lists and tuples compare item by item, recursively, then by length.
#[test]
fn nested_sequences_are_totally_ordered() {
    let mut interp = Interpreter::new();
    let mut values = Vec::new();
    let shapes: [(&[i64], &[i64]); 4] = [(&[1, 2], &[1]), (&[1, 2], &[]), (&[2], &[0, 0]), (&[], &[1])];
    for (outer, inner) in shapes {
        let first = int_list(&mut interp, outer);
        let second = int_list(&mut interp, inner);
        let first_tuple = int_list(&mut interp, outer);
        let tuple = interp.new_tuple(vec![first_tuple]).unwrap();
        values.push(interp.new_list(vec![first, second]).unwrap());
        values.push(tuple);
    }
    let copy = int_list(&mut interp, &[1, 2]);
    let nested_copy = int_list(&mut interp, &[1]);
    values.push(interp.new_list(vec![copy, nested_copy]).unwrap());
    assert_eq!(interp.compare(&values[0], &values[8]).unwrap(), Ordering::Equal);
    assert_eq!(interp.compare(&values[2], &values[0]).unwrap(), Ordering::Less);
    assert_total_order(&interp, &values);
    for value in values {
        interp.release(value);
    }
}

/// Builds `[[...[1]...]]` with `depth` list levels.
fn nested_list(interp: &mut Interpreter, depth: usize) -> Value {
    let mut value = interp.new_int(1).unwrap();
    for _ in 0..depth {
        value = interp.new_list(vec![value]).unwrap();
    }
    value
}

/// Comparing structures nested past the data recursion limit is a
/// RuntimeError rather than a stack overflow.
#[test]
fn deep_comparison_is_a_runtime_error() {
    let mut interp = Interpreter::new();
    let limit = usize::from(MAX_DATA_RECURSION_DEPTH);

    let shallow_a = nested_list(&mut interp, limit / 2);
    let shallow_b = nested_list(&mut interp, limit / 2);
    assert_eq!(interp.compare(&shallow_a, &shallow_b).unwrap(), Ordering::Equal);

    let deep_a = nested_list(&mut interp, limit + 10);
    let deep_b = nested_list(&mut interp, limit + 10);
    let err = interp.compare(&deep_a, &deep_b).unwrap_err();
    assert_eq!(err.exc_type(), Some(ExcType::RuntimeError));
    assert_eq!(err.message(), Some("maximum recursion depth exceeded in comparison"));

    for value in [shallow_a, shallow_b, deep_a, deep_b] {
        interp.release(value);
    }
}

/// Strings compare bytewise.
#[test]
fn strings_compare_bytewise() {
    let mut interp = Interpreter::new();
    let upper = interp.new_str("Z").unwrap();
    let lower = interp.new_str("a").unwrap();
    assert_eq!(interp.compare(&upper, &lower).unwrap(), Ordering::Less);
    interp.release(upper);
    interp.release(lower);
}

// =============================================================================
// 5. Object conversion
// =============================================================================

/// A nested object survives the trip onto the heap and back.
#[test]
fn object_to_heap_and_back() {
    let mut interp = Interpreter::new();
    let object = Object::Dict(vec![(
        "items".to_owned(),
        Object::List(vec![
            Object::Int(1),
            Object::Float(2.5),
            Object::Tuple(vec![Object::String("x".to_owned()), Object::None]),
        ]),
    )]);
    let value = interp.from_object(&object).unwrap();
    assert_eq!(interp.kind(&value), Kind::Dict);
    assert_eq!(interp.to_object(&value), object);
    interp.release(value);
}

/// Output-only variants cannot be turned into heap objects.
#[test]
fn output_only_objects_are_rejected() {
    let mut interp = Interpreter::new();
    let err = interp.from_object(&Object::Module("math".to_owned())).unwrap_err();
    assert_eq!(err.to_string(), "'module' is not a valid input value");
}

/// A list containing itself converts with a cycle marker.
#[test]
fn self_referencing_list_converts_with_cycle() {
    let mut interp = Interpreter::new();
    let list = interp.new_list(vec![]).unwrap();
    let inner = interp.acquire(&list);
    interp.list_append(&list, inner).unwrap();
    assert_eq!(
        interp.to_object(&list),
        Object::List(vec![Object::Cycle(list.id(), "[...]".to_owned())])
    );
    assert_eq!(interp.to_object(&list).repr(), "[[...]]");
    // break the cycle so the list can be reclaimed
    let none = interp.none();
    interp.list_set(&list, 0, none).unwrap();
    interp.release(list);
}

/// The repr quotes strings and marks one-element tuples with a trailing comma.
#[test]
fn object_repr() {
    let object = Object::Tuple(vec![Object::String("it's".to_owned())]);
    assert_eq!(object.repr(), "('it\\'s',)");
    assert_eq!(object.to_string(), "('it\\'s',)");
    assert_eq!(Object::String("raw".to_owned()).to_string(), "raw");
    assert_eq!(Object::Float(2.0).repr(), "2.0");
}

/// `Object` values convert into plain Rust types.
#[test]
fn object_try_into_rust_types() {
    let n: i64 = (&Object::Int(7)).try_into().unwrap();
    assert_eq!(n, 7);
    let s: String = (&Object::String("hi".to_owned())).try_into().unwrap();
    assert_eq!(s, "hi");
    let err = i64::try_from(&Object::None).unwrap_err();
    assert_eq!(err.to_string(), "expected int, got none");
}
