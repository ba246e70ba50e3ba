use std::fmt;
use std::marker::PhantomData;
use std::mem;
use std::ptr::NonNull;

use super::control_block::ControlBlock;
use super::shared::Shared;

/// [`Weak`] observes an instance owned by [`Shared`] without keeping it alive.
///
/// A [`Weak`] can not be dereferenced; it can only tell whether the instance is still alive, and
/// try to become a [`Shared`]. It keeps the control block alive, never the instance.
pub struct Weak<T> {
    control: Option<NonNull<ControlBlock>>,
    _phantom: PhantomData<*const T>,
}

impl<T> Weak<T> {
    /// Creates a null [`Weak`].
    ///
    /// # Examples
    ///
    /// ```
    /// use lfrc::Weak;
    ///
    /// let weak: Weak<usize> = Weak::new();
    /// assert!(weak.expired());
    /// assert!(!weak.lock().is_valid());
    /// ```
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            control: None,
            _phantom: PhantomData,
        }
    }

    /// Returns `true` if the [`Weak`] is null, or the instance has been dropped.
    ///
    /// A `false` result can be stale as soon as it is returned since another thread may drop the
    /// last [`Shared`] at any time; use [`Weak::lock`] when the answer matters.
    ///
    /// # Examples
    ///
    /// ```
    /// use lfrc::Shared;
    ///
    /// let shared = Shared::new(1);
    /// let weak = shared.downgrade();
    /// assert!(!weak.expired());
    ///
    /// drop(shared);
    /// assert!(weak.expired());
    /// ```
    #[inline]
    #[must_use]
    pub fn expired(&self) -> bool {
        self.block().map_or(true, |block| block.strong_count() == 0)
    }

    /// Tries to get a [`Shared`] to the instance.
    ///
    /// Returns a null [`Shared`] if the instance has already been dropped.
    ///
    /// # Examples
    ///
    /// ```
    /// use lfrc::Shared;
    ///
    /// let shared = Shared::new(23);
    /// let weak = shared.downgrade();
    ///
    /// let locked = weak.lock();
    /// assert_eq!(*locked, 23);
    /// assert_eq!(shared.reference_count(), 2);
    ///
    /// drop(shared);
    /// drop(locked);
    /// assert!(!weak.lock().is_valid());
    /// ```
    #[inline]
    #[must_use]
    pub fn lock(&self) -> Shared<T> {
        Shared::<T>::try_from(self).unwrap_or_default()
    }

    /// Tries to get a [`Shared`] to the instance.
    ///
    /// Returns `None` if the instance has already been dropped.
    ///
    /// # Examples
    ///
    /// ```
    /// use lfrc::Shared;
    ///
    /// let shared = Shared::new(String::from("alive"));
    /// let weak = shared.downgrade();
    /// assert_eq!(weak.upgrade().as_deref().map(String::as_str), Some("alive"));
    ///
    /// drop(shared);
    /// assert!(weak.upgrade().is_none());
    /// ```
    #[inline]
    #[must_use]
    pub fn upgrade(&self) -> Option<Shared<T>> {
        Shared::<T>::try_from(self).ok()
    }

    /// Returns the number of [`Shared`] instances that refer to the observed instance.
    ///
    /// The value is only good for diagnostics. A null [`Weak`] returns `0`.
    #[inline]
    #[must_use]
    pub fn reference_count(&self) -> usize {
        self.block().map_or(0, ControlBlock::strong_count)
    }

    /// Moves the reference out of `self`, leaving a null [`Weak`] behind.
    #[inline]
    #[must_use]
    pub fn take(&mut self) -> Self {
        mem::take(self)
    }

    /// Drops the reference held by `self`, leaving a null [`Weak`] behind.
    #[inline]
    pub fn reset(&mut self) {
        drop(self.take());
    }

    /// Swaps the references held by `self` and `other`.
    #[inline]
    pub fn swap(&mut self, other: &mut Self) {
        mem::swap(self, other);
    }

    /// Returns `true` if both observe the same instance, or both are null.
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

    #[inline]
    fn block(&self) -> Option<&ControlBlock> {
        self.control.as_ref().map(|control| unsafe { control.as_ref() })
    }
}

impl<T> Clone for Weak<T> {
    #[inline]
    fn clone(&self) -> Self {
        if let Some(block) = self.block() {
            block.increment_weak();
        }
        Self {
            control: self.control,
            _phantom: PhantomData,
        }
    }
}

impl<T> fmt::Debug for Weak<T> {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.control {
            Some(control) => f
                .debug_struct("Weak")
                .field("control", &control)
                .field("expired", &self.expired())
                .finish(),
            None => f.write_str("Weak(null)"),
        }
    }
}

impl<T> Default for Weak<T> {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Drop for Weak<T> {
    #[inline]
    fn drop(&mut self) {
        if let Some(control) = self.control.take() {
            unsafe {
                ControlBlock::decrement_weak_and_maybe_destroy_block(control);
            }
        }
    }
}

impl<'s, T> From<&'s Shared<T>> for Weak<T> {
    #[inline]
    fn from(shared: &'s Shared<T>) -> Self {
        let control = shared.control();
        if let Some(control) = control {
            unsafe {
                control.as_ref().increment_weak();
            }
        }
        Self {
            control,
            _phantom: PhantomData,
        }
    }
}

impl<T> PartialEq for Weak<T> {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl<T> PartialEq<Shared<T>> for Weak<T> {
    #[inline]
    fn eq(&self, other: &Shared<T>) -> bool {
        self.control == other.control()
    }
}

impl<T> Eq for Weak<T> {}

unsafe impl<T: Send + Sync> Send for Weak<T> {}

unsafe impl<T: Send + Sync> Sync for Weak<T> {}
