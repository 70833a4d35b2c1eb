use std::sync::Arc;

use seqmap::{InsertError, SeqMap};

#[test]
fn pushes_get_default_keys_in_order() {
    let m: SeqMap<&str> = SeqMap::new();
    m.push("a");
    m.push("b");
    assert_eq!(m.get(0).unwrap(), "a");
    assert_eq!(m.get(1).unwrap(), "b");
    assert_eq!(m.keys(), vec!["Name0", "Name1"]);
}

#[test]
fn removal_renumbers_positions() {
    let m: SeqMap<&str> = SeqMap::new();
    m.insert("k1", "x");
    m.insert("k2", "y");
    assert!(m.remove("k1"));
    assert_eq!(m.len(), 1);
    assert_eq!(m.get_by_key("k2").unwrap(), "y");
    assert_eq!(m.index_of(&"y"), Some(0));
}

#[test]
fn insert_at_rejects_empty_map() {
    let m: SeqMap<&str> = SeqMap::new();
    assert_eq!(
        m.insert_at(0, "z"),
        Err(InsertError::PositionOutOfRange { index: 0, len: 0 })
    );
}

#[test]
fn duplicate_key_overwrites_instead_of_duplicating() {
    let m: SeqMap<&str> = SeqMap::new();
    m.insert("k", "p");
    m.insert("k", "q");
    assert_eq!(m.len(), 1);
    assert_eq!(m.get_by_key("k").unwrap(), "q");
}

#[test]
fn dual_addressing_agrees_after_mixed_mutations() {
    let m: SeqMap<String> = SeqMap::new();
    m.insert("alpha", "1".to_owned());
    m.push("2".to_owned());
    m.insert("gamma", "3".to_owned());
    m.insert_keyed_at(1, "beta", "1.5".to_owned()).unwrap();
    m.remove_at(2);
    m.set_by_key("gamma", "3!".to_owned());

    for (key, index, value) in m.entries() {
        assert_eq!(m.get(index).unwrap(), value);
        assert_eq!(m.get_by_key(&key).unwrap(), value);
        assert_eq!(m.key_at(index).unwrap(), key);
    }
    assert_eq!(m.keys(), vec!["alpha", "beta", "gamma"]);
    assert_eq!(m.values(), vec!["1", "1.5", "3!"]);
}

#[test]
fn iteration_matches_positional_order() {
    let m: SeqMap<i32> = SeqMap::new();
    for v in 0..10 {
        m.push(v);
    }
    m.remove_at(3);
    m.insert_at(0, 99).unwrap();

    let via_iter: Vec<i32> = m.iter().collect();
    let via_index: Vec<i32> = (0..m.len()).map(|i| m.get(i).unwrap()).collect();
    assert_eq!(via_iter, via_index);

    // IntoIterator on &SeqMap and restartability.
    let again: Vec<i32> = (&m).into_iter().collect();
    assert_eq!(again, via_iter);
}

#[test]
fn copy_into_bulk_exports_in_order() {
    let m: SeqMap<i32> = SeqMap::new();
    m.push(10);
    m.push(20);
    m.push(30);
    let mut buf = vec![0; 5];
    m.copy_into(&mut buf, 2);
    assert_eq!(buf, vec![0, 0, 10, 20, 30]);
}

#[test]
fn concurrent_pushes_are_all_observed() {
    let m: Arc<SeqMap<u32>> = Arc::new(SeqMap::new());
    let threads: Vec<_> = (0..4)
        .map(|t| {
            let m = Arc::clone(&m);
            std::thread::spawn(move || {
                for i in 0..250 {
                    m.push(t * 1000 + i);
                }
            })
        })
        .collect();
    for t in threads {
        t.join().unwrap();
    }

    assert_eq!(m.len(), 1000);
    // Every generated key is unique, so every pushed value is reachable.
    let mut values = m.values();
    values.sort_unstable();
    let mut expected: Vec<u32> = (0..4).flat_map(|t| (0..250).map(move |i| t * 1000 + i)).collect();
    expected.sort_unstable();
    assert_eq!(values, expected);
}

#[test]
fn concurrent_reads_during_writes_are_consistent() {
    let m: Arc<SeqMap<usize>> = Arc::new(SeqMap::new());
    for i in 0..100 {
        m.push(i);
    }

    let writer = {
        let m = Arc::clone(&m);
        std::thread::spawn(move || {
            for i in 0..100 {
                m.remove_at(0);
                m.push(1000 + i);
            }
        })
    };
    let reader = {
        let m = Arc::clone(&m);
        std::thread::spawn(move || {
            for _ in 0..200 {
                // Snapshots are internally consistent even mid-churn.
                let entries: Vec<_> = m.entries().collect();
                for (i, (_, index, _)) in entries.iter().enumerate() {
                    assert_eq!(*index, i);
                }
            }
        })
    };
    writer.join().unwrap();
    reader.join().unwrap();
    assert_eq!(m.len(), 100);
}
