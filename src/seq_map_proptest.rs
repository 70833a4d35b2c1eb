#![cfg(test)]

// Property tests for SeqMap kept inside the crate so they can evolve with
// the internals. The model is a plain Vec of (key, value) pairs; after every
// operation both containers must agree on length, and at the end on the full
// ordered sequence and on dual addressing.

use crate::seq_map::{InsertError, SeqMap};
use proptest::prelude::*;

// Pool-indexed operations to improve shrinking: indices shrink to earlier
// keys and op lists shrink in length.
#[derive(Clone, Debug)]
enum Op {
    Push(i32),
    Insert(usize, i32),
    InsertAt(usize, i32),
    InsertKeyedAt(usize, usize, i32),
    Set(usize, i32),
    SetByKey(usize, i32),
    RemoveKey(usize),
    RemoveAt(usize),
    RemoveValue(i32),
    Clear,
}

fn arb_scenario() -> impl Strategy<Value = (Vec<String>, Vec<Op>)> {
    proptest::collection::vec("k[a-d]{1,3}", 1..=6).prop_flat_map(|pool| {
        let idxs: Vec<usize> = (0..pool.len()).collect();
        let key_idx = proptest::sample::select(idxs);
        let op = prop_oneof![
            (-50i32..50).prop_map(Op::Push),
            (key_idx.clone(), -50i32..50).prop_map(|(k, v)| Op::Insert(k, v)),
            (0usize..8, -50i32..50).prop_map(|(i, v)| Op::InsertAt(i, v)),
            (0usize..8, key_idx.clone(), -50i32..50)
                .prop_map(|(i, k, v)| Op::InsertKeyedAt(i, k, v)),
            (0usize..8, -50i32..50).prop_map(|(i, v)| Op::Set(i, v)),
            (key_idx.clone(), -50i32..50).prop_map(|(k, v)| Op::SetByKey(k, v)),
            key_idx.clone().prop_map(Op::RemoveKey),
            (0usize..8).prop_map(Op::RemoveAt),
            (-50i32..50).prop_map(Op::RemoveValue),
            Just(Op::Clear),
        ];
        (Just(pool), proptest::collection::vec(op, 1..80))
    })
}

proptest! {
    #[test]
    fn seq_map_matches_vec_model((pool, ops) in arb_scenario()) {
        let map: SeqMap<i32> = SeqMap::new();
        let mut model: Vec<(String, i32)> = Vec::new();

        for op in ops {
            match op {
                Op::Push(v) => {
                    let key = map.push(v);
                    prop_assert!(!model.iter().any(|(k, _)| *k == key));
                    model.push((key, v));
                }
                Op::Insert(ki, v) => {
                    let key = pool[ki].clone();
                    let old = map.insert(key.clone(), v);
                    match model.iter_mut().find(|(k, _)| *k == key) {
                        Some(entry) => {
                            prop_assert_eq!(old, Some(entry.1));
                            entry.1 = v;
                        }
                        None => {
                            prop_assert_eq!(old, None);
                            model.push((key, v));
                        }
                    }
                }
                Op::InsertAt(i, v) => {
                    match map.insert_at(i, v) {
                        Ok(key) => {
                            prop_assert!(i < model.len());
                            model.insert(i, (key, v));
                        }
                        Err(InsertError::PositionOutOfRange { index, len }) => {
                            prop_assert_eq!(index, i);
                            prop_assert_eq!(len, model.len());
                            prop_assert!(i >= model.len());
                        }
                        Err(other) => prop_assert!(false, "unexpected error: {other:?}"),
                    }
                }
                Op::InsertKeyedAt(i, ki, v) => {
                    let key = pool[ki].clone();
                    let dup = model.iter().any(|(k, _)| *k == key);
                    match map.insert_keyed_at(i, key.clone(), v) {
                        Ok(()) => {
                            prop_assert!(i < model.len() && !dup);
                            model.insert(i, (key, v));
                        }
                        Err(InsertError::PositionOutOfRange { .. }) => {
                            prop_assert!(i >= model.len());
                        }
                        Err(InsertError::DuplicateKey(_)) => {
                            prop_assert!(i < model.len() && dup);
                        }
                        Err(InsertError::EmptyKey) => prop_assert!(false, "pool keys are non-empty"),
                    }
                }
                Op::Set(i, v) => {
                    let applied = map.set(i, v);
                    prop_assert_eq!(applied, i < model.len());
                    if applied {
                        model[i].1 = v;
                    }
                }
                Op::SetByKey(ki, v) => {
                    let key = pool[ki].clone();
                    let applied = map.set_by_key(&key, v);
                    match model.iter_mut().find(|(k, _)| *k == key) {
                        Some(entry) => {
                            prop_assert!(applied);
                            entry.1 = v;
                        }
                        None => prop_assert!(!applied),
                    }
                }
                Op::RemoveKey(ki) => {
                    let key = pool[ki].clone();
                    let removed = map.remove(&key);
                    let pos = model.iter().position(|(k, _)| *k == key);
                    prop_assert_eq!(removed, pos.is_some());
                    if let Some(pos) = pos {
                        model.remove(pos);
                    }
                }
                Op::RemoveAt(i) => {
                    let removed = map.remove_at(i);
                    prop_assert_eq!(removed, i < model.len());
                    if removed {
                        model.remove(i);
                    }
                }
                Op::RemoveValue(v) => {
                    let removed = map.remove_value(&v);
                    let pos = model.iter().position(|(_, mv)| *mv == v);
                    prop_assert_eq!(removed, pos.is_some());
                    if let Some(pos) = pos {
                        model.remove(pos);
                    }
                }
                Op::Clear => {
                    map.clear();
                    model.clear();
                }
            }

            prop_assert_eq!(map.len(), model.len());
        }

        // Final state: ordered sequence and both addressing modes agree.
        let entries: Vec<(String, usize, i32)> = map.entries().collect();
        let expected: Vec<(String, usize, i32)> = model
            .iter()
            .enumerate()
            .map(|(i, (k, v))| (k.clone(), i, *v))
            .collect();
        prop_assert_eq!(entries, expected);

        for (i, (key, value)) in model.iter().enumerate() {
            prop_assert_eq!(map.get(i).unwrap(), *value);
            prop_assert_eq!(map.get_by_key(key).unwrap(), *value);
            prop_assert_eq!(map.try_get(key), Some(*value));
            prop_assert!(map.contains_key(key));
            let key_at = map.key_at(i);
            prop_assert_eq!(key_at.as_deref(), Some(key.as_str()));
        }
        prop_assert_eq!(map.keys(), model.iter().map(|(k, _)| k.clone()).collect::<Vec<_>>());
        prop_assert_eq!(map.values(), model.iter().map(|(_, v)| *v).collect::<Vec<_>>());
    }
}
