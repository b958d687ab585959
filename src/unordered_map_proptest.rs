#![cfg(test)]

// Property tests for UnorderedMap kept inside the crate so they can check
// the occupied-bucket markers directly.

use crate::error::Error;
use crate::unordered_map::UnorderedMap;
use proptest::prelude::*;
use std::collections::{BTreeSet, HashMap};
use std::string::String;
use std::vec::Vec;

const CAP: usize = 6;
const BUCKETS: usize = 5;
type Sut = UnorderedMap<String, i32, CAP, BUCKETS>;

// Pool-indexed operations so failing cases shrink towards earlier keys.
#[derive(Clone, Debug)]
enum Op {
    Insert(usize, i32),
    InsertWith(usize, i32),
    Bump(usize, i32),
    Erase(usize),
    EraseAt(usize),
    At(usize),
    Contains(String),
    Clear,
    Iterate,
}

fn arb_scenario() -> impl Strategy<Value = (Vec<String>, Vec<Op>)> {
    proptest::collection::vec("[a-z]{0,4}", 1..=10).prop_flat_map(|pool| {
        let idxs: Vec<usize> = (0..pool.len()).collect();
        let idx = proptest::sample::select(idxs);
        let op = prop_oneof![
            4 => (idx.clone(), any::<i32>()).prop_map(|(i, v)| Op::Insert(i, v)),
            2 => (idx.clone(), any::<i32>()).prop_map(|(i, v)| Op::InsertWith(i, v)),
            2 => (idx.clone(), -100i32..100).prop_map(|(i, d)| Op::Bump(i, d)),
            3 => idx.clone().prop_map(Op::Erase),
            2 => idx.clone().prop_map(Op::EraseAt),
            2 => idx.clone().prop_map(Op::At),
            1 => "[a-z]{0,4}".prop_map(Op::Contains),
            1 => Just(Op::Clear),
            2 => Just(Op::Iterate),
        ];
        proptest::collection::vec(op, 1..80).prop_map(move |ops| (pool.clone(), ops))
    })
}

// The markers must bound exactly the buckets that hold model keys.
fn check_markers(sut: &Sut, model: &HashMap<String, i32>) -> Result<(), TestCaseError> {
    let occupied: BTreeSet<usize> = model.keys().map(|k| sut.bucket(k.as_str())).collect();
    let expected = match (occupied.first(), occupied.last()) {
        (Some(&lo), Some(&hi)) => (lo, hi),
        _ => (0, 0),
    };
    prop_assert_eq!(sut.markers(), expected);
    if !model.is_empty() {
        prop_assert_eq!(sut.begin().bucket(), expected.0);
    } else {
        prop_assert!(sut.begin().is_end());
    }
    Ok(())
}

// Property: state-machine equivalence against std::collections::HashMap.
// - Inserts of present keys report `false` and change nothing.
// - Inserts of absent keys fail with `MapFull` exactly when the model
//   already holds CAP keys.
// - `erase`/`erase_at` remove exactly the model's entry.
// - Iteration yields every live entry once and matches the model.
// - First/last markers bound the occupied buckets after every step.
proptest! {
    #![proptest_config(ProptestConfig { cases: 128, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine((pool, ops) in arb_scenario()) {
        let mut sut = Sut::new();
        let mut model: HashMap<String, i32> = HashMap::new();

        for op in ops {
            match op {
                Op::Insert(i, v) => {
                    let k = pool[i].clone();
                    let already = model.contains_key(&k);
                    match sut.insert(k.clone(), v) {
                        Ok((cursor, inserted)) => {
                            prop_assert_eq!(inserted, !already);
                            prop_assert_eq!(sut.entry_at(cursor).map(|(kk, _)| kk.clone()), Some(k.clone()));
                            model.entry(k).or_insert(v);
                        }
                        Err(e) => {
                            prop_assert_eq!(e, Error::MapFull);
                            prop_assert!(!already && model.len() == CAP);
                        }
                    }
                }
                Op::InsertWith(i, v) => {
                    let k = pool[i].clone();
                    let already = model.contains_key(&k);
                    let mut ran = false;
                    let res = sut.insert_with(k.clone(), || {
                        ran = true;
                        v
                    });
                    match res {
                        Ok((_, inserted)) => {
                            prop_assert_eq!(inserted, !already);
                            prop_assert_eq!(ran, inserted);
                            model.entry(k).or_insert(v);
                        }
                        Err(e) => {
                            prop_assert_eq!(e, Error::MapFull);
                            prop_assert!(!ran);
                        }
                    }
                }
                Op::Bump(i, d) => {
                    let k = pool[i].clone();
                    let full = model.len() == CAP && !model.contains_key(&k);
                    match sut.get_or_insert_default(k.clone()) {
                        Ok(v) => {
                            *v = v.wrapping_add(d);
                            let m = model.entry(k).or_insert(0);
                            *m = m.wrapping_add(d);
                        }
                        Err(e) => {
                            prop_assert_eq!(e, Error::MapFull);
                            prop_assert!(full);
                        }
                    }
                }
                Op::Erase(i) => {
                    let k = &pool[i];
                    let expected = usize::from(model.remove(k).is_some());
                    prop_assert_eq!(sut.erase(k.as_str()), expected);
                    prop_assert!(sut.find(k.as_str()).is_end());
                }
                Op::EraseAt(i) => {
                    let k = &pool[i];
                    let cursor = sut.find(k.as_str());
                    prop_assert_eq!(cursor.is_end(), !model.contains_key(k));
                    let expected_next = sut.next_cursor(cursor);
                    let next = sut.erase_at(cursor);
                    prop_assert_eq!(next, expected_next);
                    model.remove(k);
                }
                Op::At(i) => {
                    let k = &pool[i];
                    match model.get(k) {
                        Some(v) => prop_assert_eq!(sut.at(k.as_str()), Ok(v)),
                        None => prop_assert_eq!(sut.at(k.as_str()), Err(Error::MapOutOfRange)),
                    }
                }
                Op::Contains(s) => {
                    prop_assert_eq!(sut.contains_key(s.as_str()), model.contains_key(&s));
                    prop_assert_eq!(sut.count(s.as_str()), usize::from(model.contains_key(&s)));
                }
                Op::Clear => {
                    sut.clear();
                    model.clear();
                }
                Op::Iterate => {
                    let seen: Vec<(String, i32)> = sut.iter().map(|(k, v)| (k.clone(), *v)).collect();
                    prop_assert_eq!(seen.len(), model.len());
                    let unique: BTreeSet<&String> = seen.iter().map(|(k, _)| k).collect();
                    prop_assert_eq!(unique.len(), seen.len());
                    for (k, v) in &seen {
                        prop_assert_eq!(model.get(k), Some(v));
                    }
                    prop_assert_eq!(sut.distance(sut.begin(), sut.end()), Ok(model.len()));
                }
            }

            prop_assert_eq!(sut.len(), model.len());
            prop_assert_eq!(sut.is_empty(), model.is_empty());
            prop_assert_eq!(sut.len() + sut.available(), CAP);
            check_markers(&sut, &model)?;
        }
    }
}

// Property: erasing any valid cursor range removes exactly the entries
// the range walked over and keeps the markers consistent.
proptest! {
    #![proptest_config(ProptestConfig { cases: 128, .. ProptestConfig::default() })]
    #[test]
    fn prop_erase_range(keys in proptest::collection::btree_set("[a-z]{1,3}", 0..=CAP), a in 0usize..=CAP, b in 0usize..=CAP) {
        let mut sut = Sut::new();
        for k in &keys {
            sut.insert(k.clone(), 0).unwrap();
        }
        let order: Vec<String> = sut.keys().cloned().collect();
        let (lo, hi) = (a.min(b).min(order.len()), a.max(b).min(order.len()));

        let mut cursors = Vec::new();
        let mut c = sut.begin();
        cursors.push(c);
        while !c.is_end() {
            c = sut.next_cursor(c);
            cursors.push(c);
        }
        let (first, last) = (cursors[lo], cursors[hi]);

        if lo < hi {
            prop_assert_eq!(sut.erase_range(last, first), Err(Error::InvalidIteratorRange));
            prop_assert_eq!(sut.len(), order.len());
        }
        prop_assert_eq!(sut.distance(first, last), Ok(hi - lo));
        sut.erase_range(first, last).unwrap();

        let mut model: HashMap<String, i32> = HashMap::new();
        for (i, k) in order.iter().enumerate() {
            if i < lo || i >= hi {
                model.insert(k.clone(), 0);
            }
        }
        prop_assert_eq!(sut.len(), model.len());
        for k in model.keys() {
            prop_assert!(sut.contains_key(k.as_str()));
        }
        check_markers(&sut, &model)?;
    }
}
