//! The dual-mode region abstraction
//!
//! Every region can be used in two explicit ways:
//!
//! - as a guard around a block: [`Region::enter`] / [`Region::scope`]
//! - as a transform over a callable: [`Region::wrap`] and friends, which
//!   return a [`Traced`] callable
//!
//! In both shapes `end()` runs on every exit path once `begin()` has
//! succeeded, including unwinding panics.
//!
//! # Composition
//!
//! Transforms compose explicitly through [`Traced::traced_by`]. The outer
//! region sees the identity of the innermost callable, so a stack of
//! anonymous regions is named after the function it ultimately wraps.
//! Receiver-taking methods are wrapped as plain functions and bound to a
//! receiver at call time with [`Traced::bind`]; associated functions need
//! no special treatment.

use core::any::Any;
use core::fmt;
use std::sync::Arc;

use crate::error::{RegionError, RegionResult};
use crate::naming::Identity;

/// A region that can be marked around code
pub trait Region {
    /// Mark the beginning of the region
    ///
    /// # Errors
    ///
    /// Returns backend errors unchanged, or a naming error when the region
    /// name cannot be resolved.
    fn begin(&self) -> RegionResult<()>;

    /// Mark the end of the region
    ///
    /// # Errors
    ///
    /// Returns backend errors unchanged.
    fn end(&self) -> RegionResult<()>;

    /// Called once for every deferred wrap, with the wrapped callable's
    /// identity, before the [`Traced`] value is produced
    ///
    /// # Errors
    ///
    /// Named regions reject a second anonymous wrap.
    fn on_wrap(&self, _identity: &Identity) -> RegionResult<()> {
        Ok(())
    }

    /// Begin the region and return a guard that ends it when dropped
    ///
    /// # Errors
    ///
    /// Returns the error of [`Region::begin`]; no guard exists then.
    fn enter(&self) -> RegionResult<RegionGuard<'_, Self>>
    where
        Self: Sized,
    {
        self.begin()?;
        Ok(RegionGuard::armed(self))
    }

    /// Run `body` inside the region
    ///
    /// # Errors
    ///
    /// Returns the error of `begin()` (the body does not run) or of
    /// `end()` (the body's output is dropped).
    fn scope<T>(&self, body: impl FnOnce() -> T) -> RegionResult<T>
    where
        Self: Sized,
    {
        let guard = self.enter()?;
        let output = body();
        guard.exit()?;
        Ok(output)
    }

    /// Apply the region to a function, method or closure
    ///
    /// # Errors
    ///
    /// See [`Region::on_wrap`].
    fn wrap<F>(&self, f: F) -> RegionResult<Traced<Self, F>>
    where
        Self: Sized + Clone,
    {
        self.wrap_as(f, Identity::of_fn::<F>())
    }

    /// Apply the region to a callable object, named after its type
    ///
    /// # Errors
    ///
    /// See [`Region::on_wrap`].
    fn wrap_object<F>(&self, f: F) -> RegionResult<Traced<Self, F>>
    where
        Self: Sized + Clone,
    {
        self.wrap_as(f, Identity::of_object::<F>())
    }

    /// Apply the region to a callable with an explicit identity
    ///
    /// # Errors
    ///
    /// See [`Region::on_wrap`].
    fn wrap_as<F>(&self, f: F, identity: Identity) -> RegionResult<Traced<Self, F>>
    where
        Self: Sized + Clone,
    {
        self.on_wrap(&identity)?;
        Ok(Traced::new(self.clone(), f, identity))
    }

    /// Apply the region to a type-erased value
    ///
    /// Accepts a [`DynCallable`] or a plain `fn()` pointer.
    ///
    /// # Errors
    ///
    /// Returns [`RegionError::NotCallable`] for anything else, before the
    /// deferred-wrap hook runs.
    fn wrap_any(
        &self,
        target: Box<dyn Any + Send + Sync>,
        identity: Identity,
    ) -> RegionResult<Traced<Self, ErasedFn>>
    where
        Self: Sized + Clone,
    {
        let callable = match target.downcast::<DynCallable>() {
            Ok(callable) => *callable,
            Err(other) => match other.downcast::<fn()>() {
                Ok(func) => {
                    let func = *func;
                    Arc::new(move || func()) as DynCallable
                }
                Err(_) => return Err(RegionError::NotCallable),
            },
        };
        self.wrap_as(ErasedFn(callable), identity)
    }
}

/// Type-erased nullary callable accepted by [`Region::wrap_any`]
pub type DynCallable = Arc<dyn Fn() + Send + Sync>;

/// Callable half of a [`Region::wrap_any`] result
#[derive(Clone)]
pub struct ErasedFn(DynCallable);

impl ErasedFn {
    /// Erase a nullary closure
    pub fn new(f: impl Fn() + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }
}

impl fmt::Debug for ErasedFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ErasedFn(..)")
    }
}

impl Invoke<()> for ErasedFn {
    type Output = ();

    fn invoke(&self, (): ()) {
        (self.0)();
    }
}

/// Ends its region when dropped
///
/// Prefer [`RegionGuard::exit`] on the normal path: it reports the
/// `end()` error, which `Drop` can only log.
#[must_use = "the region ends as soon as the guard is dropped"]
pub struct RegionGuard<'a, R: Region + ?Sized> {
    region: &'a R,
    armed: bool,
}

impl<'a, R: Region + ?Sized> RegionGuard<'a, R> {
    /// Guard for a region whose `begin()` already succeeded
    pub(crate) fn armed(region: &'a R) -> Self {
        Self {
            region,
            armed: true,
        }
    }

    /// End the region now
    ///
    /// # Errors
    ///
    /// Returns the error of [`Region::end`].
    pub fn exit(mut self) -> RegionResult<()> {
        self.armed = false;
        self.region.end()
    }
}

impl<R: Region + ?Sized> Drop for RegionGuard<'_, R> {
    fn drop(&mut self) {
        if self.armed
            && let Err(e) = self.region.end()
        {
            tracing::warn!(error = %e, "region end failed while dropping guard");
        }
    }
}

impl<R: Region + ?Sized> fmt::Debug for RegionGuard<'_, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegionGuard")
            .field("armed", &self.armed)
            .finish()
    }
}

/// Call a value with a tuple of arguments
///
/// Implemented for every `Fn` of up to six arguments, for [`Traced`] and
/// for [`Bound`].
pub trait Invoke<Args> {
    /// Return type
    type Output;

    /// Call with `args`
    fn invoke(&self, args: Args) -> Self::Output;
}

/// A callable wrapped by a region
pub struct Traced<R, F> {
    region: R,
    func: F,
    identity: Identity,
}

impl<R: Region, F> Traced<R, F> {
    pub(crate) fn new(region: R, func: F, identity: Identity) -> Self {
        Self {
            region,
            func,
            identity,
        }
    }

    /// The wrapping region
    pub fn region(&self) -> &R {
        &self.region
    }

    /// Identity of the wrapped callable
    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// The wrapped callable
    pub fn inner(&self) -> &F {
        &self.func
    }

    /// Unwrap into the region and the callable
    pub fn into_parts(self) -> (R, F) {
        (self.region, self.func)
    }

    /// Call the wrapped callable inside the region
    ///
    /// The callable's output is returned unchanged; a panic keeps
    /// unwinding after the region has ended.
    ///
    /// # Errors
    ///
    /// Returns the error of `begin()` (the callable does not run) or of
    /// `end()`.
    pub fn call<A>(&self, args: A) -> RegionResult<F::Output>
    where
        F: Invoke<A>,
    {
        self.region.begin()?;
        let guard = RegionGuard::armed(&self.region);
        let output = self.func.invoke(args);
        guard.exit()?;
        Ok(output)
    }

    /// Bind a receiver, for wrapped methods taking `&T` first
    pub fn bind<'a, T: ?Sized>(&'a self, receiver: &'a T) -> Bound<'a, R, F, T> {
        Bound {
            traced: self,
            receiver,
        }
    }

    /// Apply a further region on top of this one
    ///
    /// The outer region is named after the innermost callable.
    ///
    /// # Errors
    ///
    /// See [`Region::on_wrap`].
    pub fn traced_by<O>(self, outer: &O) -> RegionResult<Traced<O, Self>>
    where
        O: Region + Clone,
    {
        let identity = self.identity.clone();
        outer.wrap_as(self, identity)
    }
}

impl<R: Region + Clone, F: Clone> Clone for Traced<R, F> {
    fn clone(&self) -> Self {
        Self {
            region: self.region.clone(),
            func: self.func.clone(),
            identity: self.identity.clone(),
        }
    }
}

impl<R: Region + fmt::Debug, F> fmt::Debug for Traced<R, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Traced")
            .field("region", &self.region)
            .field("identity", &self.identity)
            .finish_non_exhaustive()
    }
}

impl<R: Region, F: Invoke<A>, A> Invoke<A> for Traced<R, F> {
    type Output = RegionResult<F::Output>;

    fn invoke(&self, args: A) -> Self::Output {
        self.call(args)
    }
}

/// A traced method bound to its receiver
pub struct Bound<'a, R, F, T: ?Sized> {
    traced: &'a Traced<R, F>,
    receiver: &'a T,
}

impl<'a, R: Region, F, T: ?Sized> Bound<'a, R, F, T> {
    /// Call the method with the receiver prepended to `args`
    ///
    /// # Errors
    ///
    /// See [`Traced::call`].
    pub fn call<A>(&self, args: A) -> <Self as Invoke<A>>::Output
    where
        Self: Invoke<A>,
    {
        self.invoke(args)
    }

    /// The bound receiver
    pub fn receiver(&self) -> &'a T {
        self.receiver
    }
}

impl<R: Region + fmt::Debug, F, T: ?Sized> fmt::Debug for Bound<'_, R, F, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bound")
            .field("traced", self.traced)
            .finish_non_exhaustive()
    }
}

macro_rules! impl_invoke {
    ($($arg:ident: $ty:ident),*) => {
        impl<Func, Ret, $($ty,)*> Invoke<($($ty,)*)> for Func
        where
            Func: Fn($($ty),*) -> Ret,
        {
            type Output = Ret;

            #[inline]
            fn invoke(&self, ($($arg,)*): ($($ty,)*)) -> Ret {
                (self)($($arg),*)
            }
        }

        impl<'a, R, F, T, $($ty,)*> Invoke<($($ty,)*)> for Bound<'a, R, F, T>
        where
            R: Region,
            T: ?Sized,
            F: Invoke<(&'a T, $($ty,)*)>,
        {
            type Output = RegionResult<F::Output>;

            #[inline]
            fn invoke(&self, ($($arg,)*): ($($ty,)*)) -> Self::Output {
                self.traced.call((self.receiver, $($arg,)*))
            }
        }
    };
}

impl_invoke!();
impl_invoke!(a1: A1);
impl_invoke!(a1: A1, a2: A2);
impl_invoke!(a1: A1, a2: A2, a3: A3);
impl_invoke!(a1: A1, a2: A2, a3: A3, a4: A4);
impl_invoke!(a1: A1, a2: A2, a3: A3, a4: A4, a5: A5);
impl_invoke!(a1: A1, a2: A2, a3: A3, a4: A4, a5: A5, a6: A6);
