// Delegate integration suite.
//
// Each test documents what behavior is being verified. The core
// invariants exercised:
// - Unbound: calling reports UninitializedCallable; call_if/call_or do not.
// - Binding: every binding kind forwards arguments and results unchanged.
// - Copy semantics: a bound closure is a copy, independent of its source.
// - Cleanup: each payload is destroyed exactly once, on rebind, clear or drop.
// - Identity: equality compares the operation table and the bound target.
use fixed_delegate_map::{Delegate, Error, StaticInstance, UnorderedMap};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

fn add(a: i32, b: i32) -> i32 {
    a + b
}

fn sub(a: i32, b: i32) -> i32 {
    a - b
}

#[derive(Default)]
struct Recorder {
    calls: Vec<(i32, i32)>,
}

impl Recorder {
    fn record(&mut self, a: i32, b: i32) -> i32 {
        self.calls.push((a, b));
        self.calls.len() as i32
    }

    fn total(&self, a: i32, b: i32) -> i32 {
        self.calls.iter().map(|(x, y)| x + y).sum::<i32>() + a + b
    }
}

// Test: unbound behavior.
// Verifies: call errs, call_if is None, call_or runs the fallback with the
// same arguments.
#[test]
fn unbound_delegate() {
    let mut d: Delegate<fn(i32, i32) -> i32> = Delegate::default();
    assert_eq!(d.call((3, 4)), Err(Error::UninitializedCallable));
    assert_eq!(d.call_if((3, 4)), None);
    assert_eq!(d.call_or(sub, (3, 4)), -1);
    assert_eq!(d.call_or(|a: i32, b: i32| a * b, (3, 4)), 12);
}

// Test: free function round trip.
// Verifies: d(3, 4) == add(3, 4) for item and pointer bindings.
#[test]
fn free_function_round_trip() {
    let mut item = Delegate::<fn(i32, i32) -> i32>::from_fn(add);
    let mut ptr = Delegate::<fn(i32, i32) -> i32>::from_fn_ptr(add);
    for (a, b) in [(3, 4), (-1, 1), (i32::MAX, 0)] {
        assert_eq!(item.call((a, b)), Ok(add(a, b)));
        assert_eq!(ptr.call((a, b)), Ok(add(a, b)));
    }
    ptr.set_fn_ptr(sub);
    assert_eq!(ptr.call((3, 4)), Ok(-1));
}

// Test: member bindings see and mutate the bound instance.
#[test]
fn member_bindings() {
    let rec = RefCell::new(Recorder::default());
    let mut record = Delegate::<fn(i32, i32) -> i32>::from_method(&rec, Recorder::record);
    assert_eq!(record.call((1, 2)), Ok(1));
    assert_eq!(record.call((3, 4)), Ok(2));
    assert_eq!(rec.borrow().calls, [(1, 2), (3, 4)]);

    let snapshot = Recorder {
        calls: vec![(1, 1)],
    };
    let mut total = Delegate::<fn(i32, i32) -> i32>::from_const_method(&snapshot, Recorder::total);
    assert_eq!(total.call((5, 5)), Ok(12));
}

// Test: closure capture is by copy.
// Verifies: the wrapper's counter and the original closure's counter
// evolve independently.
#[test]
fn closure_state_is_copied() {
    let mut n = 0u32;
    let mut counter = move || {
        n += 1;
        n
    };
    let mut d = Delegate::<fn() -> u32>::from_closure(counter);
    assert_eq!(counter(), 1);
    assert_eq!(counter(), 2);
    assert_eq!(d.call(()), Ok(1));
    assert_eq!(counter(), 3);
    assert_eq!(d.call(()), Ok(2));
}

#[derive(Default)]
struct Tally {
    made: Cell<usize>,
    dropped: Cell<usize>,
}

struct Tracked(Rc<Tally>);

impl Tracked {
    fn new(t: &Rc<Tally>) -> Self {
        t.made.set(t.made.get() + 1);
        Tracked(Rc::clone(t))
    }
}

impl Clone for Tracked {
    fn clone(&self) -> Self {
        Tracked::new(&self.0)
    }
}

impl Drop for Tracked {
    fn drop(&mut self) {
        self.0.dropped.set(self.0.dropped.get() + 1);
    }
}

// Test: resource cleanup across many wrappers.
// Assumes: each Tracked construction (new or clone) bumps `made`.
// Verifies: after rebinding and dropping every wrapper, made == dropped,
// and each rebind destroys the previous payload immediately.
#[test]
fn construct_and_destroy_counts_match() {
    let tally = Rc::new(Tally::default());
    {
        let mut wrappers: Vec<Delegate<fn() -> usize>> = (0..8)
            .map(|_| {
                let t = Tracked::new(&tally);
                Delegate::from_closure(move || t.0.made.get())
            })
            .collect();
        assert_eq!(tally.made.get(), 8);
        assert_eq!(tally.dropped.get(), 0);

        let copies: Vec<_> = wrappers.iter().map(Clone::clone).collect();
        assert_eq!(tally.made.get(), 16);

        for (i, w) in wrappers.iter_mut().enumerate() {
            let before = tally.dropped.get();
            let t = Tracked::new(&tally);
            w.set_closure(move || t.0.dropped.get());
            assert_eq!(tally.dropped.get(), before + 1, "rebind {i} destroys the old payload once");
        }
        drop(copies);
        assert_eq!(tally.dropped.get(), 16);
    }
    assert_eq!(tally.made.get(), 24);
    assert_eq!(tally.made.get(), tally.dropped.get());
}

static LIMIT: Recorder = Recorder { calls: Vec::new() };

struct TheLimit;

impl StaticInstance for TheLimit {
    type Target = Recorder;
    fn instance() -> &'static Recorder {
        &LIMIT
    }
}

// Test: compile-time instance binding needs no runtime instance.
#[test]
fn static_binding() {
    let mut d = Delegate::<fn(i32, i32) -> i32>::from_static::<TheLimit, _>(Recorder::total);
    assert_eq!(d.call((2, 3)), Ok(5));
    let copy = d.clone();
    assert_eq!(d, copy, "zero-sized payloads compare by table only");
}

// Test: identity equality.
// Verifies: same target compares equal across storage sizes; a different
// function or a different instance does not.
#[test]
fn equality_by_identity() {
    let a = Delegate::<fn(i32, i32) -> i32>::from_fn_ptr(add);
    let b = Delegate::<fn(i32, i32) -> i32>::from_fn_ptr(add);
    let c = Delegate::<fn(i32, i32) -> i32>::from_fn_ptr(sub);
    assert_eq!(a, b);
    assert_ne!(a, c);

    let wide: Delegate<fn(i32, i32) -> i32, 24> = a.widen();
    assert_eq!(a, wide);

    let r1 = RefCell::new(Recorder::default());
    let r2 = RefCell::new(Recorder::default());
    let m1 = Delegate::<fn(i32, i32) -> i32>::from_method(&r1, Recorder::record);
    let m2 = Delegate::<fn(i32, i32) -> i32>::from_method(&r2, Recorder::record);
    assert_eq!(m1, m1.clone());
    assert_ne!(m1, m2);
    assert_ne!(m1, a);
}

// Test: a delegate-typed fallback.
#[test]
fn fallback_delegate() {
    let mut primary = Delegate::<fn(i32, i32) -> i32>::new();
    let mut backup = Delegate::<fn(i32, i32) -> i32, 8>::from_fn(sub);
    assert_eq!(primary.call_or_delegate(&mut backup, (9, 4)), Ok(5));
    backup.clear();
    assert_eq!(
        primary.call_or_delegate(&mut backup, (9, 4)),
        Err(Error::UninitializedCallable)
    );
}

// Test: delegates as map values, a fixed-size command table.
// Verifies: both components compose without allocation and a missing
// command falls back cleanly.
#[test]
fn command_table() {
    let log = RefCell::new(Recorder::default());
    let mut table: UnorderedMap<&str, Delegate<fn(i32, i32) -> i32>, 4> = UnorderedMap::new();
    table.insert("add", Delegate::from_fn(add)).unwrap();
    table.insert("sub", Delegate::from_fn_ptr(sub)).unwrap();
    table
        .insert("log", Delegate::from_method(&log, Recorder::record))
        .unwrap();
    let scale = 10;
    table
        .insert("scale", Delegate::from_closure(move |a: i32, b: i32| (a + b) * scale))
        .unwrap();
    assert_eq!(
        table.insert("extra", Delegate::new()),
        Err(Error::MapFull)
    );

    let mut run = |name: &str, a, b| {
        table
            .get_mut(name)
            .map(|d| d.call_or(|_: i32, _: i32| -1, (a, b)))
            .unwrap_or(i32::MIN)
    };
    assert_eq!(run("add", 2, 3), 5);
    assert_eq!(run("sub", 2, 3), -1);
    assert_eq!(run("scale", 2, 3), 50);
    assert_eq!(run("log", 2, 3), 1);
    assert_eq!(run("missing", 2, 3), i32::MIN);
    assert_eq!(log.borrow().calls, [(2, 3)]);
}
