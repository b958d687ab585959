//! Delegate: a heap-free, fixed-size wrapper around any callable of one
//! signature.
//!
//! Design
//! - The callable (the "payload") is moved into an inline byte buffer of
//!   `size_of::<usize>() + EXTRA` bytes, aligned to at least
//!   `align_of::<A>()`. Nothing is ever boxed.
//! - Dispatch goes through an operation table `{invoke, copy, destroy,
//!   identity}` of plain function pointers. There is exactly one table per
//!   (payload type, signature); it is a `const` promoted to static memory
//!   and only ever referenced, never owned or mutated.
//! - Payloads that do not fit the buffer, or need stricter alignment, are
//!   rejected when the binding is monomorphised: a build error, never a
//!   runtime truncation.
//! - Single-threaded: `Delegate` is `!Send`/`!Sync`.
//!
//! Equality
//! - Two delegates are equal when they share an operation table and the
//!   same identity word. The identity word is the bound instance address
//!   for method bindings, the function address for function pointers and
//!   0 for zero-sized payloads (function items, static bindings,
//!   capture-less closures).
//! - Inline closures that capture state are identified by where they are
//!   stored, so such a delegate is only equal to itself: a copy with the
//!   very same captured state compares unequal. Equality is identity, not
//!   value comparison.
//! - Operation tables are promoted constants. Rust does not promise that a
//!   constant has a single address across codegen units, so delegates
//!   built in different crates may compare unequal even when bound to the
//!   same thing.

use crate::callable::{Callable, ConstMethod, Method, SharedCallable, Signature, StaticInstance};
use crate::error::{Error, Result};
use core::cell::RefCell;
use core::fmt;
use core::marker::PhantomData;
use core::mem::{align_of, needs_drop, size_of, MaybeUninit};
use core::ptr;

const WORD: usize = size_of::<usize>();

// Inline payload buffer. `word` sits at offset 0 and `extra` follows it
// without padding, so the first `WORD + EXTRA` bytes are contiguous.
#[repr(C)]
struct Storage<const EXTRA: usize, A> {
    _align: [A; 0],
    word: MaybeUninit<usize>,
    extra: [MaybeUninit<u8>; EXTRA],
}

impl<const EXTRA: usize, A> Storage<EXTRA, A> {
    const SIZE: usize = WORD + EXTRA;
    const ALIGN: usize = align_of::<Self>();

    fn zeroed() -> Self {
        Self {
            _align: [],
            word: MaybeUninit::new(0),
            extra: [MaybeUninit::new(0); EXTRA],
        }
    }

    fn as_ptr(&self) -> *const u8 {
        (self as *const Self).cast()
    }

    fn as_mut_ptr(&mut self) -> *mut u8 {
        (self as *mut Self).cast()
    }
}

struct Ops<S: Signature> {
    invoke: unsafe fn(*mut u8, S::Args) -> S::Output,
    copy: unsafe fn(*const u8, *mut u8),
    destroy: Option<unsafe fn(*mut u8)>,
    identity: unsafe fn(*const u8) -> usize,
}

// A payload type that knows how to call itself out of raw storage.
trait Erased<S: Signature>: Clone {
    unsafe fn invoke(this: *mut u8, args: S::Args) -> S::Output;

    unsafe fn identity(this: *const u8) -> usize {
        if size_of::<Self>() == 0 {
            0
        } else {
            this as usize
        }
    }
}

unsafe fn copy_payload<P: Clone>(src: *const u8, dst: *mut u8) {
    dst.cast::<P>().write((*src.cast::<P>()).clone());
}

unsafe fn destroy_payload<P>(this: *mut u8) {
    ptr::drop_in_place(this.cast::<P>());
}

struct Table<P, S>(PhantomData<(fn() -> P, S)>);

impl<P: Erased<S>, S: Signature> Table<P, S> {
    const OPS: Ops<S> = Ops {
        invoke: <P as Erased<S>>::invoke,
        copy: copy_payload::<P>,
        destroy: if needs_drop::<P>() {
            Some(destroy_payload::<P>)
        } else {
            None
        },
        identity: <P as Erased<S>>::identity,
    };
}

struct Fits<P, const EXTRA: usize, A>(PhantomData<(fn() -> P, A)>);

impl<P, const EXTRA: usize, A> Fits<P, EXTRA, A> {
    const OK: () = {
        assert!(
            size_of::<P>() <= Storage::<EXTRA, A>::SIZE,
            "insufficient storage in delegate"
        );
        assert!(
            align_of::<P>() <= Storage::<EXTRA, A>::ALIGN,
            "insufficient alignment of delegate"
        );
    };
}

struct Widening<const FROM: usize, FA, const TO: usize, TA>(PhantomData<(FA, TA)>);

impl<const FROM: usize, FA, const TO: usize, TA> Widening<FROM, FA, TO, TA> {
    const OK: () = {
        assert!(FROM <= TO, "cannot copy a delegate into smaller storage");
        assert!(
            Storage::<FROM, FA>::ALIGN <= Storage::<TO, TA>::ALIGN,
            "cannot copy a delegate into storage with weaker alignment"
        );
    };
}

struct ZeroSized<F>(PhantomData<fn() -> F>);

impl<F> ZeroSized<F> {
    const OK: () = assert!(
        size_of::<F>() == 0,
        "from_fn expects a function item or capture-less closure; use from_fn_ptr"
    );
}

// Closures, function objects and function items.
#[derive(Clone)]
struct InlineFn<F>(F);

impl<S, F> Erased<S> for InlineFn<F>
where
    S: Signature,
    F: Callable<S::Args, Output = S::Output> + Clone,
{
    unsafe fn invoke(this: *mut u8, args: S::Args) -> S::Output {
        (*this.cast::<Self>()).0.invoke(args)
    }
}

#[derive(Clone, Copy)]
struct FnPtr<S>(S);

impl<S: Signature> Erased<S> for FnPtr<S> {
    unsafe fn invoke(this: *mut u8, args: S::Args) -> S::Output {
        Signature::call((*this.cast::<Self>()).0, args)
    }

    unsafe fn identity(this: *const u8) -> usize {
        (*this.cast::<Self>()).0.addr()
    }
}

// Method with a `&mut T` receiver. The instance is reached through its
// `RefCell`, so a re-entrant call through a copy panics instead of
// aliasing `&mut T`.
struct BoundMut<'a, T: ?Sized, M> {
    cell: &'a RefCell<T>,
    method: M,
}

impl<'a, T: ?Sized, M: Clone> Clone for BoundMut<'a, T, M> {
    fn clone(&self) -> Self {
        Self {
            cell: self.cell,
            method: self.method.clone(),
        }
    }
}

impl<'a, S, T, M> Erased<S> for BoundMut<'a, T, M>
where
    S: Signature,
    T: ?Sized,
    M: Method<T, S::Args, Output = S::Output> + Clone,
{
    unsafe fn invoke(this: *mut u8, args: S::Args) -> S::Output {
        let bound = &*this.cast::<Self>();
        let mut instance = bound.cell.borrow_mut();
        bound.method.invoke_on(&mut *instance, args)
    }

    unsafe fn identity(this: *const u8) -> usize {
        (*this.cast::<Self>()).cell as *const RefCell<T> as *const u8 as usize
    }
}

struct BoundRef<'a, T: ?Sized, M> {
    instance: &'a T,
    method: M,
}

impl<'a, T: ?Sized, M: Clone> Clone for BoundRef<'a, T, M> {
    fn clone(&self) -> Self {
        Self {
            instance: self.instance,
            method: self.method.clone(),
        }
    }
}

impl<'a, S, T, M> Erased<S> for BoundRef<'a, T, M>
where
    S: Signature,
    T: ?Sized,
    M: ConstMethod<T, S::Args, Output = S::Output> + Clone,
{
    unsafe fn invoke(this: *mut u8, args: S::Args) -> S::Output {
        let bound = &*this.cast::<Self>();
        bound.method.invoke_on(bound.instance, args)
    }

    unsafe fn identity(this: *const u8) -> usize {
        (*this.cast::<Self>()).instance as *const T as *const u8 as usize
    }
}

// Instance and method both fixed at compile time.
struct StaticBound<I, M> {
    method: M,
    _instance: PhantomData<fn() -> I>,
}

impl<I, M: Clone> Clone for StaticBound<I, M> {
    fn clone(&self) -> Self {
        Self {
            method: self.method.clone(),
            _instance: PhantomData,
        }
    }
}

impl<S, I, M> Erased<S> for StaticBound<I, M>
where
    S: Signature,
    I: StaticInstance,
    M: ConstMethod<I::Target, S::Args, Output = S::Output> + Clone,
{
    unsafe fn invoke(this: *mut u8, args: S::Args) -> S::Output {
        (*this.cast::<Self>()).method.invoke_on(I::instance(), args)
    }
}

// The compile-time instance is itself the callable.
struct StaticFunctor<I>(PhantomData<fn() -> I>);

impl<I> Clone for StaticFunctor<I> {
    fn clone(&self) -> Self {
        StaticFunctor(PhantomData)
    }
}

impl<S, I> Erased<S> for StaticFunctor<I>
where
    S: Signature,
    I: StaticInstance,
    I::Target: SharedCallable<S::Args, Output = S::Output>,
{
    unsafe fn invoke(_this: *mut u8, args: S::Args) -> S::Output {
        I::instance().invoke_shared(args)
    }
}

/// Type-erased callable with signature `S` held in inline storage.
///
/// `S` is written as a function pointer type, arguments are passed as a
/// tuple:
///
/// ```
/// use fixed_delegate_map::Delegate;
///
/// fn add(a: i32, b: i32) -> i32 {
///     a + b
/// }
///
/// let mut d = Delegate::<fn(i32, i32) -> i32>::from_fn(add);
/// assert_eq!(d.call((3, 4)), Ok(7));
/// ```
///
/// Closures larger than the storage are rejected at build time:
///
/// ```compile_fail
/// use fixed_delegate_map::Delegate;
///
/// let big = [0u64; 4];
/// let d = Delegate::<fn() -> u64>::from_closure(move || big[0]);
/// ```
///
/// Binding a method to a temporary does not borrow-check:
///
/// ```compile_fail
/// use core::cell::RefCell;
/// use fixed_delegate_map::Delegate;
///
/// struct Counter(i32);
/// impl Counter {
///     fn add(&mut self, n: i32) -> i32 {
///         self.0 += n;
///         self.0
///     }
/// }
///
/// let mut d = Delegate::<fn(i32) -> i32>::from_method(&RefCell::new(Counter(0)), Counter::add);
/// d.call((1,)).unwrap();
/// ```
///
/// So are payloads that need stricter alignment than the storage offers.
/// The closure moves the whole value so the capture keeps its alignment:
///
/// ```compile_fail
/// use fixed_delegate_map::Delegate;
///
/// #[derive(Clone, Copy)]
/// #[repr(align(16))]
/// struct Wide(u64);
///
/// let w = Wide(7);
/// let d = Delegate::<fn() -> u64, 8>::from_closure(move || {
///     let x: Wide = w;
///     x.0
/// });
/// ```
///
/// `from_fn` only takes zero-sized callables; a capturing closure belongs
/// in `from_closure`:
///
/// ```compile_fail
/// use fixed_delegate_map::Delegate;
///
/// let n = 3u8;
/// let d = Delegate::<fn() -> u8>::from_fn(move || n);
/// ```
pub struct Delegate<'a, S: Signature, const EXTRA: usize = 0, A = usize> {
    storage: Storage<EXTRA, A>,
    ops: Option<&'a Ops<S>>,
    _marker: PhantomData<(&'a (), *mut ())>,
}

impl<'a, S: Signature, const EXTRA: usize, A> Delegate<'a, S, EXTRA, A> {
    /// Bytes available to a payload.
    pub const STORAGE_SIZE: usize = Storage::<EXTRA, A>::SIZE;
    /// Strictest payload alignment accepted.
    pub const STORAGE_ALIGN: usize = Storage::<EXTRA, A>::ALIGN;

    /// An unbound delegate.
    pub fn new() -> Self {
        Self {
            storage: Storage::zeroed(),
            ops: None,
            _marker: PhantomData,
        }
    }

    fn with_payload<P: Erased<S> + 'a>(payload: P) -> Self {
        let mut d = Self::new();
        d.install(payload);
        d
    }

    fn install<P: Erased<S> + 'a>(&mut self, payload: P) {
        let () = Fits::<P, EXTRA, A>::OK;
        self.clear();
        self.storage = Storage::zeroed();
        // SAFETY: `Fits` proved size and alignment; the previous payload was
        // destroyed by `clear`.
        unsafe { self.storage.as_mut_ptr().cast::<P>().write(payload) };
        self.ops = Some(&Table::<P, S>::OPS);
    }

    /// Bind a function item (or a closure that captures nothing). No
    /// payload is stored.
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Callable<S::Args, Output = S::Output> + Copy + 'a,
    {
        let () = ZeroSized::<F>::OK;
        Self::with_payload(InlineFn(f))
    }

    /// Bind a function pointer; its address is the payload.
    pub fn from_fn_ptr(f: S) -> Self
    where
        S: 'a,
    {
        Self::with_payload(FnPtr(f))
    }

    /// Bind a method taking `&mut T`.
    pub fn from_method<T, M>(instance: &'a RefCell<T>, method: M) -> Self
    where
        T: ?Sized,
        M: Method<T, S::Args, Output = S::Output> + Clone + 'a,
    {
        Self::with_payload(BoundMut {
            cell: instance,
            method,
        })
    }

    /// Bind a method taking `&T`.
    pub fn from_const_method<T, M>(instance: &'a T, method: M) -> Self
    where
        T: ?Sized,
        M: ConstMethod<T, S::Args, Output = S::Output> + Clone + 'a,
    {
        Self::with_payload(BoundRef { instance, method })
    }

    /// Bind a method on an instance known at compile time.
    pub fn from_static<I, M>(method: M) -> Self
    where
        I: StaticInstance + 'a,
        M: ConstMethod<I::Target, S::Args, Output = S::Output> + Clone + 'a,
    {
        Self::with_payload(StaticBound::<I, M> {
            method,
            _instance: PhantomData,
        })
    }

    /// Bind a compile-time instance that is itself callable.
    pub fn from_static_functor<I>() -> Self
    where
        I: StaticInstance + 'a,
        I::Target: SharedCallable<S::Args, Output = S::Output>,
    {
        Self::with_payload(StaticFunctor::<I>(PhantomData))
    }

    /// Copy a closure or function object into the inline storage.
    pub fn from_closure<F>(f: F) -> Self
    where
        F: Callable<S::Args, Output = S::Output> + Clone + 'a,
    {
        Self::with_payload(InlineFn(f))
    }

    /// Rebind to a function item; see `from_fn`.
    pub fn set_fn<F>(&mut self, f: F)
    where
        F: Callable<S::Args, Output = S::Output> + Copy + 'a,
    {
        let () = ZeroSized::<F>::OK;
        self.install(InlineFn(f));
    }

    /// Rebind to a function pointer.
    pub fn set_fn_ptr(&mut self, f: S)
    where
        S: 'a,
    {
        self.install(FnPtr(f));
    }

    /// Rebind to a `&mut T` method on `instance`.
    pub fn set_method<T, M>(&mut self, instance: &'a RefCell<T>, method: M)
    where
        T: ?Sized,
        M: Method<T, S::Args, Output = S::Output> + Clone + 'a,
    {
        self.install(BoundMut {
            cell: instance,
            method,
        });
    }

    /// Rebind to a `&T` method on `instance`.
    pub fn set_const_method<T, M>(&mut self, instance: &'a T, method: M)
    where
        T: ?Sized,
        M: ConstMethod<T, S::Args, Output = S::Output> + Clone + 'a,
    {
        self.install(BoundRef { instance, method });
    }

    /// Rebind to a method on the compile-time instance `I`.
    pub fn set_static<I, M>(&mut self, method: M)
    where
        I: StaticInstance + 'a,
        M: ConstMethod<I::Target, S::Args, Output = S::Output> + Clone + 'a,
    {
        self.install(StaticBound::<I, M> {
            method,
            _instance: PhantomData,
        });
    }

    /// Rebind to the compile-time callable instance `I`.
    pub fn set_static_functor<I>(&mut self)
    where
        I: StaticInstance + 'a,
        I::Target: SharedCallable<S::Args, Output = S::Output>,
    {
        self.install(StaticFunctor::<I>(PhantomData));
    }

    /// Rebind to a closure; the previous payload is destroyed first.
    pub fn set_closure<F>(&mut self, f: F)
    where
        F: Callable<S::Args, Output = S::Output> + Clone + 'a,
    {
        self.install(InlineFn(f));
    }

    pub fn is_bound(&self) -> bool {
        self.ops.is_some()
    }

    /// Destroy the payload and become unbound.
    pub fn clear(&mut self) {
        if let Some(ops) = self.ops.take() {
            if let Some(destroy) = ops.destroy {
                // SAFETY: `ops` was installed together with the payload it
                // destroys; `ops` is already detached, so this runs once.
                unsafe { destroy(self.storage.as_mut_ptr()) };
            }
        }
    }

    /// Invoke the bound callable.
    pub fn call(&mut self, args: S::Args) -> Result<S::Output> {
        match self.ops {
            // SAFETY: the storage holds the payload `ops` was built for.
            Some(ops) => Ok(unsafe { (ops.invoke)(self.storage.as_mut_ptr(), args) }),
            None => {
                log::debug!("invoked an unbound delegate");
                Err(Error::UninitializedCallable)
            }
        }
    }

    /// Invoke if bound; `None` otherwise. For `()` signatures
    /// `is_some()` tells whether anything ran.
    pub fn call_if(&mut self, args: S::Args) -> Option<S::Output> {
        let ops = self.ops?;
        // SAFETY: as in `call`.
        Some(unsafe { (ops.invoke)(self.storage.as_mut_ptr(), args) })
    }

    /// Invoke if bound, otherwise run `fallback` with the same arguments.
    pub fn call_or<F>(&mut self, mut fallback: F, args: S::Args) -> S::Output
    where
        F: Callable<S::Args, Output = S::Output>,
    {
        match self.ops {
            // SAFETY: as in `call`.
            Some(ops) => unsafe { (ops.invoke)(self.storage.as_mut_ptr(), args) },
            None => fallback.invoke(args),
        }
    }

    /// Invoke if bound, otherwise invoke `fallback`. Fails only when both
    /// are unbound.
    pub fn call_or_delegate<const M: usize, B>(
        &mut self,
        fallback: &mut Delegate<'_, S, M, B>,
        args: S::Args,
    ) -> Result<S::Output> {
        match self.ops {
            // SAFETY: as in `call`.
            Some(ops) => Ok(unsafe { (ops.invoke)(self.storage.as_mut_ptr(), args) }),
            None => fallback.call(args),
        }
    }

    /// Copy into a delegate with at least as much storage and alignment.
    ///
    /// ```compile_fail
    /// use fixed_delegate_map::Delegate;
    ///
    /// let wide = Delegate::<fn() -> u8, 16>::from_fn(|| 1u8);
    /// let narrow: Delegate<fn() -> u8, 0> = wide.widen();
    /// ```
    ///
    /// Equal size with weaker alignment is rejected as well:
    ///
    /// ```compile_fail
    /// use fixed_delegate_map::Delegate;
    ///
    /// let strict = Delegate::<fn() -> u8, 8, u128>::from_fn(|| 1u8);
    /// let weak: Delegate<fn() -> u8, 8> = strict.widen();
    /// ```
    pub fn widen<const M: usize, B>(&self) -> Delegate<'a, S, M, B> {
        let () = Widening::<EXTRA, A, M, B>::OK;
        let mut wide = Delegate::new();
        wide.copy_payload_from(self);
        wide
    }

    /// Replace this delegate's payload with a copy of `other`'s; `other`
    /// may use smaller storage.
    pub fn assign_from<const M: usize, B>(&mut self, other: &Delegate<'a, S, M, B>) {
        let () = Widening::<M, B, EXTRA, A>::OK;
        self.clear();
        self.storage = Storage::zeroed();
        self.copy_payload_from(other);
    }

    // Requires `self` to be unbound with zeroed storage.
    fn copy_payload_from<const M: usize, B>(&mut self, other: &Delegate<'a, S, M, B>) {
        debug_assert!(self.ops.is_none());
        if let Some(ops) = other.ops {
            // SAFETY: the payload fits `other`'s storage, which is no larger
            // or stricter than ours (checked by `Widening`).
            unsafe { (ops.copy)(other.storage.as_ptr(), self.storage.as_mut_ptr()) };
            self.ops = Some(ops);
        }
    }

    fn identity(&self) -> usize {
        match self.ops {
            // SAFETY: the storage holds the payload `ops` was built for.
            Some(ops) => unsafe { (ops.identity)(self.storage.as_ptr()) },
            None => 0,
        }
    }
}

impl<'a, S: Signature, const EXTRA: usize, A> Default for Delegate<'a, S, EXTRA, A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a, S: Signature, const EXTRA: usize, A> Clone for Delegate<'a, S, EXTRA, A> {
    fn clone(&self) -> Self {
        let mut d = Self::new();
        d.copy_payload_from(self);
        d
    }
}

impl<'a, S: Signature, const EXTRA: usize, A> Drop for Delegate<'a, S, EXTRA, A> {
    fn drop(&mut self) {
        self.clear();
    }
}

/// Identity comparison: same operation table and same bound target.
///
/// This is stricter than comparing payload bytes. A closure that captures
/// state is identified by where it is stored, so `d != d.clone()` for such
/// a closure even though both hold the same captured values.
impl<'a, 'b, S, const N: usize, NA, const M: usize, MA> PartialEq<Delegate<'b, S, M, MA>>
    for Delegate<'a, S, N, NA>
where
    S: Signature,
{
    fn eq(&self, other: &Delegate<'b, S, M, MA>) -> bool {
        match (self.ops, other.ops) {
            (None, None) => true,
            (Some(x), Some(y)) => ptr::eq(x, y) && self.identity() == other.identity(),
            _ => false,
        }
    }
}

impl<'a, S: Signature, const EXTRA: usize, A> Eq for Delegate<'a, S, EXTRA, A> {}

impl<'a, S: Signature, const EXTRA: usize, A> fmt::Debug for Delegate<'a, S, EXTRA, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Delegate")
            .field("bound", &self.is_bound())
            .field("identity", &format_args!("{:#x}", self.identity()))
            .field("storage", &Self::STORAGE_SIZE)
            .finish()
    }
}
