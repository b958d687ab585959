//! Call signatures and the adapters that let any Rust callable be driven
//! with a tuple of arguments.
//!
//! A delegate's signature is written as a function pointer type, e.g.
//! `fn(i32, i32) -> i32`; its argument list travels as the tuple
//! `(i32, i32)`. The adapters below are implemented for every closure,
//! function item and function pointer of arity 0 through 8.

/// A function pointer type naming a call signature.
pub trait Signature: Copy {
    /// Argument list as a tuple.
    type Args;
    type Output;

    /// Call the function pointer itself.
    fn call(self, args: Self::Args) -> Self::Output;

    /// Address of the function.
    fn addr(self) -> usize;
}

/// Anything callable through `&mut self` (`FnMut`).
pub trait Callable<Args> {
    type Output;
    fn invoke(&mut self, args: Args) -> Self::Output;
}

/// Anything callable through `&self` (`Fn`).
pub trait SharedCallable<Args> {
    type Output;
    fn invoke_shared(&self, args: Args) -> Self::Output;
}

/// A method taking `&mut T` as its receiver.
pub trait Method<T: ?Sized, Args> {
    type Output;
    fn invoke_on(&self, this: &mut T, args: Args) -> Self::Output;
}

/// A method taking `&T` as its receiver.
pub trait ConstMethod<T: ?Sized, Args> {
    type Output;
    fn invoke_on(&self, this: &T, args: Args) -> Self::Output;
}

/// An instance fixed at compile time, typically a `static` item.
///
/// ```
/// use fixed_delegate_map::StaticInstance;
///
/// struct Offset(i32);
/// static OFFSET: Offset = Offset(10);
///
/// struct TheOffset;
/// impl StaticInstance for TheOffset {
///     type Target = Offset;
///     fn instance() -> &'static Offset {
///         &OFFSET
///     }
/// }
/// assert_eq!(TheOffset::instance().0, 10);
/// ```
pub trait StaticInstance {
    type Target: ?Sized + 'static;
    fn instance() -> &'static Self::Target;
}

macro_rules! impl_arity {
    ($($ty:ident $val:ident),*) => {
        impl<R, $($ty),*> Signature for fn($($ty),*) -> R {
            type Args = ($($ty,)*);
            type Output = R;

            #[inline]
            fn call(self, args: Self::Args) -> R {
                let ($($val,)*) = args;
                self($($val),*)
            }

            #[inline]
            fn addr(self) -> usize {
                self as usize
            }
        }

        impl<F, R, $($ty),*> Callable<($($ty,)*)> for F
        where
            F: FnMut($($ty),*) -> R,
        {
            type Output = R;

            #[inline]
            fn invoke(&mut self, args: ($($ty,)*)) -> R {
                let ($($val,)*) = args;
                self($($val),*)
            }
        }

        impl<F, R, $($ty),*> SharedCallable<($($ty,)*)> for F
        where
            F: Fn($($ty),*) -> R,
        {
            type Output = R;

            #[inline]
            fn invoke_shared(&self, args: ($($ty,)*)) -> R {
                let ($($val,)*) = args;
                self($($val),*)
            }
        }

        impl<F, T: ?Sized, R, $($ty),*> Method<T, ($($ty,)*)> for F
        where
            F: Fn(&mut T, $($ty),*) -> R,
        {
            type Output = R;

            #[inline]
            fn invoke_on(&self, this: &mut T, args: ($($ty,)*)) -> R {
                let ($($val,)*) = args;
                self(this, $($val),*)
            }
        }

        impl<F, T: ?Sized, R, $($ty),*> ConstMethod<T, ($($ty,)*)> for F
        where
            F: Fn(&T, $($ty),*) -> R,
        {
            type Output = R;

            #[inline]
            fn invoke_on(&self, this: &T, args: ($($ty,)*)) -> R {
                let ($($val,)*) = args;
                self(this, $($val),*)
            }
        }
    };
}

impl_arity!();
impl_arity!(A1 a1);
impl_arity!(A1 a1, A2 a2);
impl_arity!(A1 a1, A2 a2, A3 a3);
impl_arity!(A1 a1, A2 a2, A3 a3, A4 a4);
impl_arity!(A1 a1, A2 a2, A3 a3, A4 a4, A5 a5);
impl_arity!(A1 a1, A2 a2, A3 a3, A4 a4, A5 a5, A6 a6);
impl_arity!(A1 a1, A2 a2, A3 a3, A4 a4, A5 a5, A6 a6, A7 a7);
impl_arity!(A1 a1, A2 a2, A3 a3, A4 a4, A5 a5, A6 a6, A7 a7, A8 a8);
