// UnorderedMap property tests through the public API.
//
// Property 1: equivalence with BTreeMap under heavy collisions.
//  - Model: BTreeMap<u16, u32>; the map uses an identity hasher over few
//    buckets so chains are long and buckets empty and refill often.
//  - Operations: insert, remove, increment via get_mut, erase via cursor.
//  - Invariant after each step: len() matches, every model key maps to
//    its model value, iteration yields exactly the model, begin() sits in
//    the lowest occupied bucket and the last cursor in the highest.
//  - Capacity: an insert of a new key fails with MapFull iff the model
//    already holds N keys, and the failure changes nothing.
//
// Property 2: copies and moves preserve contents.
//  - clone(), assign_from() into a wider map and take_from() all produce a
//    map equal to the source as a key/value set.
use fixed_delegate_map::{Cursor, Error, UnorderedMap};
use proptest::prelude::*;
use std::collections::BTreeMap;
use std::hash::{BuildHasherDefault, Hasher};

#[derive(Default)]
struct Identity(u64);

impl Hasher for Identity {
    fn finish(&self) -> u64 {
        self.0
    }
    fn write(&mut self, bytes: &[u8]) {
        for b in bytes {
            self.0 = (self.0 << 8) | u64::from(*b);
        }
    }
    fn write_u16(&mut self, n: u16) {
        self.0 = u64::from(n);
    }
}

const CAP: usize = 12;
const BUCKETS: usize = 7;
type Sut = UnorderedMap<u16, u32, CAP, BUCKETS, BuildHasherDefault<Identity>>;

fn occupied_span(sut: &Sut) -> Option<(usize, usize)> {
    let first = sut.begin();
    if first.is_end() {
        return None;
    }
    let mut last: Cursor = first;
    let mut c = sut.next_cursor(first);
    while !c.is_end() {
        last = c;
        c = sut.next_cursor(c);
    }
    Some((first.bucket(), last.bucket()))
}

fn check(sut: &Sut, model: &BTreeMap<u16, u32>) -> Result<(), TestCaseError> {
    prop_assert_eq!(sut.len(), model.len());
    for (k, v) in model {
        prop_assert_eq!(sut.get(k), Some(v));
    }
    let mut seen: Vec<(u16, u32)> = sut.iter().map(|(k, v)| (*k, *v)).collect();
    seen.sort_unstable();
    let expected: Vec<(u16, u32)> = model.iter().map(|(k, v)| (*k, *v)).collect();
    prop_assert_eq!(seen, expected);

    let buckets = model.keys().map(|k| usize::from(*k) % BUCKETS);
    let span = buckets.clone().min().zip(buckets.max());
    prop_assert_eq!(occupied_span(sut), span);
    Ok(())
}

proptest! {
    #[test]
    fn prop_matches_btreemap(ops in proptest::collection::vec((0u8..4, 0u16..40, any::<u32>()), 1..150)) {
        let mut sut = Sut::default();
        let mut model: BTreeMap<u16, u32> = BTreeMap::new();

        for (op, k, v) in ops {
            match op {
                // Insert; an existing key keeps its value.
                0 => {
                    let present = model.contains_key(&k);
                    match sut.insert(k, v) {
                        Ok((_, inserted)) => {
                            prop_assert_eq!(inserted, !present);
                            model.entry(k).or_insert(v);
                        }
                        Err(e) => {
                            prop_assert_eq!(e, Error::MapFull);
                            prop_assert!(!present);
                            prop_assert_eq!(model.len(), CAP);
                        }
                    }
                }
                // Remove by key.
                1 => {
                    prop_assert_eq!(sut.remove(&k), model.remove(&k));
                }
                // Increment in place.
                2 => {
                    if let Some(x) = sut.get_mut(&k) {
                        *x = x.wrapping_add(v);
                    }
                    if let Some(x) = model.get_mut(&k) {
                        *x = x.wrapping_add(v);
                    }
                }
                // Erase via cursor.
                3 => {
                    let c = sut.find(&k);
                    let next = sut.next_cursor(c);
                    prop_assert_eq!(sut.erase_at(c), next);
                    model.remove(&k);
                }
                _ => unreachable!(),
            }
            check(&sut, &model)?;
        }
    }
}

proptest! {
    #[test]
    fn prop_copies_and_moves(entries in proptest::collection::btree_map(0u16..500, any::<u32>(), 0..=CAP)) {
        let src = Sut::try_from_iter(entries.clone()).unwrap();
        prop_assert_eq!(&src.clone(), &src);

        let mut wide: UnorderedMap<u16, u32, 32, 5> = UnorderedMap::new();
        wide.insert(9999, 0).unwrap();
        wide.assign_from(&src).unwrap();
        prop_assert_eq!(wide.len(), entries.len());
        prop_assert!(!wide.contains_key(&9999));

        let mut moved = Sut::default();
        moved.take_from(&mut wide).unwrap();
        prop_assert!(wide.is_empty());
        prop_assert!(wide.begin().is_end());
        check(&moved, &entries)?;
    }
}
