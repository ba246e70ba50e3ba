use std::alloc::{handle_alloc_error, Layout};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::mem;
use std::ops::Deref;
use std::ptr::{self, NonNull};

use super::control_block::ControlBlock;
use super::error::{AllocError, Expired};
use super::weak::Weak;

/// [`Shared`] is a reference-counted handle to an instance of `T` that can be shared among
/// threads.
///
/// The instance is dropped when the last [`Shared`] pointing to it is dropped; outstanding
/// [`Weak`] handles do not keep it alive. A [`Shared`] can also be null, in which case it refers
/// to nothing.
pub struct Shared<T> {
    control: Option<NonNull<ControlBlock>>,
    _phantom: PhantomData<T>,
}

impl<T> Shared<T> {
    /// Creates a null [`Shared`].
    ///
    /// # Examples
    ///
    /// ```
    /// use lfrc::Shared;
    ///
    /// let shared: Shared<usize> = Shared::null();
    /// assert!(!shared.is_valid());
    /// assert_eq!(shared.reference_count(), 0);
    /// assert!(shared.as_ptr().is_null());
    /// ```
    #[inline]
    #[must_use]
    pub const fn null() -> Self {
        Self {
            control: None,
            _phantom: PhantomData,
        }
    }

    /// Creates a new [`Shared`] that owns the supplied instance.
    ///
    /// # Panics
    ///
    /// Aborts through [`handle_alloc_error`] if memory allocation failed.
    ///
    /// # Examples
    ///
    /// ```
    /// use lfrc::Shared;
    ///
    /// let shared: Shared<usize> = Shared::new(31);
    /// assert_eq!(*shared, 31);
    /// assert_eq!(shared.reference_count(), 1);
    /// ```
    #[inline]
    pub fn new(instance: T) -> Self {
        Self::from_box(Box::new(instance))
    }

    /// Creates a new [`Shared`] that owns the supplied instance.
    ///
    /// # Errors
    ///
    /// Returns [`AllocError`] if the control block could not be allocated; the instance has been
    /// dropped by then.
    ///
    /// # Examples
    ///
    /// ```
    /// use lfrc::Shared;
    ///
    /// let shared = Shared::try_new(String::from("shared")).unwrap();
    /// assert_eq!(shared.len(), 6);
    /// ```
    #[inline]
    pub fn try_new(instance: T) -> Result<Self, AllocError> {
        Self::try_from_box(Box::new(instance))
    }

    /// Creates a new [`Shared`] by taking over a uniquely owned instance.
    ///
    /// # Panics
    ///
    /// Aborts through [`handle_alloc_error`] if memory allocation failed.
    ///
    /// # Examples
    ///
    /// ```
    /// use lfrc::Shared;
    ///
    /// let boxed = Box::new(7_u8);
    /// let address: *const u8 = &*boxed;
    ///
    /// let shared = Shared::from_box(boxed);
    /// assert_eq!(shared.as_ptr(), address);
    /// ```
    #[inline]
    #[must_use]
    pub fn from_box(boxed: Box<T>) -> Self {
        match Self::try_from_box(boxed) {
            Ok(shared) => shared,
            Err(AllocError) => handle_alloc_error(Layout::new::<ControlBlock>()),
        }
    }

    /// Creates a new [`Shared`] by taking over a uniquely owned instance.
    ///
    /// # Errors
    ///
    /// Returns [`AllocError`] if the control block could not be allocated; the instance has been
    /// dropped by then.
    #[inline]
    pub fn try_from_box(boxed: Box<T>) -> Result<Self, AllocError> {
        unsafe { Self::from_raw(Box::into_raw(boxed)) }
    }

    /// Creates a new [`Shared`] from a raw pointer.
    ///
    /// A null pointer yields a null [`Shared`] without allocating anything.
    ///
    /// # Errors
    ///
    /// Returns [`AllocError`] if the control block could not be allocated; the instance has been
    /// dropped by then.
    ///
    /// # Safety
    ///
    /// A non-null `ptr` must have been returned by [`Box::into_raw`], and must not be used by the
    /// caller afterwards.
    ///
    /// # Examples
    ///
    /// ```
    /// use lfrc::Shared;
    ///
    /// let raw = Box::into_raw(Box::new(11_u64));
    /// let shared = unsafe { Shared::from_raw(raw).unwrap() };
    /// assert_eq!(shared.as_ptr(), raw.cast_const());
    ///
    /// let null = unsafe { Shared::<u64>::from_raw(std::ptr::null_mut()).unwrap() };
    /// assert!(!null.is_valid());
    /// ```
    #[inline]
    pub unsafe fn from_raw(ptr: *mut T) -> Result<Self, AllocError> {
        let Some(managed) = NonNull::new(ptr) else {
            return Ok(Self::null());
        };
        match ControlBlock::create(managed) {
            Ok(control) => Ok(Self::from_control(control)),
            Err(error) => {
                drop(Box::from_raw(ptr));
                Err(error)
            }
        }
    }

    /// Returns `true` if the [`Shared`] refers to an instance.
    ///
    /// # Examples
    ///
    /// ```
    /// use lfrc::Shared;
    ///
    /// let mut shared = Shared::new(1);
    /// assert!(shared.is_valid());
    ///
    /// shared.reset();
    /// assert!(!shared.is_valid());
    /// ```
    #[inline]
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.control.is_some()
    }

    /// Returns a pointer to the instance, or a null pointer if the [`Shared`] is null.
    #[inline]
    #[must_use]
    pub fn as_ptr(&self) -> *const T {
        self.block().map_or(ptr::null(), |block| block.managed_ptr::<T>())
    }

    /// Returns a reference to the instance, or `None` if the [`Shared`] is null.
    ///
    /// # Examples
    ///
    /// ```
    /// use lfrc::Shared;
    ///
    /// let shared = Shared::new(5);
    /// assert_eq!(shared.get(), Some(&5));
    /// assert_eq!(Shared::<i32>::null().get(), None);
    /// ```
    #[inline]
    #[must_use]
    pub fn get(&self) -> Option<&T> {
        unsafe { self.as_ptr().as_ref() }
    }

    /// Returns a reference to the instance without checking if the [`Shared`] is null.
    ///
    /// # Safety
    ///
    /// The [`Shared`] must not be null.
    #[inline]
    #[must_use]
    pub unsafe fn get_unchecked(&self) -> &T {
        &*self.as_ptr()
    }

    /// Returns the number of [`Shared`] instances that refer to the same instance.
    ///
    /// Other threads may change the number at any time, so the value is only good for
    /// diagnostics. A null [`Shared`] returns `0`.
    ///
    /// # Examples
    ///
    /// ```
    /// use lfrc::Shared;
    ///
    /// let shared = Shared::new(3);
    /// let cloned = shared.clone();
    /// assert_eq!(shared.reference_count(), 2);
    ///
    /// drop(cloned);
    /// assert_eq!(shared.reference_count(), 1);
    /// ```
    #[inline]
    #[must_use]
    pub fn reference_count(&self) -> usize {
        self.block().map_or(0, ControlBlock::strong_count)
    }

    /// Returns the number of [`Weak`] instances that refer to the same instance.
    ///
    /// The value is only good for diagnostics.
    ///
    /// # Examples
    ///
    /// ```
    /// use lfrc::Shared;
    ///
    /// let shared = Shared::new(3);
    /// let weak = shared.downgrade();
    /// assert_eq!(shared.weak_count(), 1);
    /// assert_eq!(shared.reference_count(), 1);
    /// ```
    #[inline]
    #[must_use]
    pub fn weak_count(&self) -> usize {
        self.block()
            .map_or(0, |block| block.weak_count().saturating_sub(1))
    }

    /// Creates a new [`Weak`] observing the same instance.
    ///
    /// # Examples
    ///
    /// ```
    /// use lfrc::Shared;
    ///
    /// let shared = Shared::new(17);
    /// let weak = shared.downgrade();
    /// assert!(!weak.expired());
    ///
    /// drop(shared);
    /// assert!(weak.expired());
    /// ```
    #[inline]
    #[must_use]
    pub fn downgrade(&self) -> Weak<T> {
        Weak::from(self)
    }

    /// Moves the reference out of `self`, leaving a null [`Shared`] behind.
    ///
    /// The counters are left untouched.
    ///
    /// # Examples
    ///
    /// ```
    /// use lfrc::Shared;
    ///
    /// let mut shared = Shared::new(9);
    /// let moved = shared.take();
    /// assert!(!shared.is_valid());
    /// assert_eq!(moved.reference_count(), 1);
    /// ```
    #[inline]
    #[must_use]
    pub fn take(&mut self) -> Self {
        mem::take(self)
    }

    /// Drops the reference held by `self`, leaving a null [`Shared`] behind.
    #[inline]
    pub fn reset(&mut self) {
        drop(self.take());
    }

    /// Swaps the references held by `self` and `other`.
    #[inline]
    pub fn swap(&mut self, other: &mut Self) {
        mem::swap(self, other);
    }

    /// Returns `true` if both refer to the same instance, or both are null.
    #[inline]
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        self.control == other.control
    }

    /// Returns the control block.
    #[inline]
    pub(super) const fn control(&self) -> Option<NonNull<ControlBlock>> {
        self.control
    }

    /// Creates a [`Shared`] from a control block.
    ///
    /// # Safety
    ///
    /// One strong reference must have been reserved for the new [`Shared`].
    #[inline]
    pub(super) const unsafe fn from_control(control: NonNull<ControlBlock>) -> Self {
        Self {
            control: Some(control),
            _phantom: PhantomData,
        }
    }

    #[inline]
    fn block(&self) -> Option<&ControlBlock> {
        self.control.as_ref().map(|control| unsafe { control.as_ref() })
    }
}

impl<T> Clone for Shared<T> {
    #[inline]
    fn clone(&self) -> Self {
        if let Some(block) = self.block() {
            block.increment_strong();
        }
        Self {
            control: self.control,
            _phantom: PhantomData,
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Shared<T> {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.get() {
            Some(instance) => f
                .debug_struct("Shared")
                .field("instance", instance)
                .field("reference_count", &self.reference_count())
                .finish(),
            None => f.write_str("Shared(null)"),
        }
    }
}

impl<T> fmt::Pointer for Shared<T> {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Pointer::fmt(&self.as_ptr(), f)
    }
}

impl<T> Default for Shared<T> {
    #[inline]
    fn default() -> Self {
        Self::null()
    }
}

impl<T> Deref for Shared<T> {
    type Target = T;

    /// Dereferences the [`Shared`].
    ///
    /// # Panics
    ///
    /// Panics if the [`Shared`] is null.
    #[inline]
    fn deref(&self) -> &Self::Target {
        match self.get() {
            Some(instance) => instance,
            None => panic!("dereferenced a null Shared"),
        }
    }
}

impl<T> Drop for Shared<T> {
    #[inline]
    fn drop(&mut self) {
        if let Some(control) = self.control.take() {
            unsafe {
                ControlBlock::decrement_strong_and_maybe_destroy_object(control);
            }
        }
    }
}

impl<T> From<Box<T>> for Shared<T> {
    #[inline]
    fn from(boxed: Box<T>) -> Self {
        Self::from_box(boxed)
    }
}

impl<'w, T> TryFrom<&'w Weak<T>> for Shared<T> {
    type Error = Expired;

    /// Promotes a [`Weak`] into a [`Shared`].
    ///
    /// # Errors
    ///
    /// Returns [`Expired`] if the [`Weak`] is null, or the instance has already been dropped.
    #[inline]
    fn try_from(weak: &'w Weak<T>) -> Result<Self, Self::Error> {
        let Some(control) = weak.control() else {
            return Err(Expired);
        };
        unsafe {
            control.as_ref().try_increment_strong_if_alive()?;
            Ok(Self::from_control(control))
        }
    }
}

impl<T> PartialEq for Shared<T> {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl<T> PartialEq<Weak<T>> for Shared<T> {
    #[inline]
    fn eq(&self, other: &Weak<T>) -> bool {
        self.control == other.control()
    }
}

impl<T> Eq for Shared<T> {}

impl<T> PartialOrd for Shared<T> {
    #[inline]
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Shared<T> {
    #[inline]
    fn cmp(&self, other: &Self) -> Ordering {
        self.control.cmp(&other.control)
    }
}

impl<T> Hash for Shared<T> {
    #[inline]
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.control.hash(state);
    }
}

unsafe impl<T: Send + Sync> Send for Shared<T> {}

unsafe impl<T: Send + Sync> Sync for Shared<T> {}
