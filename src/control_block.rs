use std::alloc::{self, Layout};
use std::process;
use std::ptr::{self, NonNull};
use std::sync::atomic::Ordering::{Acquire, Relaxed, Release};

use log::{debug, trace};

use super::error::{AllocError, Expired};
use super::exit_guard::ExitGuard;
use super::maybe_std::{fence, AtomicPtr, AtomicUsize};

/// Counters beyond this value abort the process instead of wrapping around to a false zero.
const MAX_REFCOUNT: usize = isize::MAX as usize;

/// [`ControlBlock`] is the record shared by every [`Shared`](super::Shared) and
/// [`Weak`](super::Weak) referring to the same instance.
///
/// `strong` counts owners. `weak` counts observers plus one unit held jointly by all the owners;
/// that unit is given back by whichever owner brings `strong` to zero, right after the instance is
/// dropped, so the block is always released by the last reference of any kind.
///
/// The block does not know the type of the instance: the instance is dropped through
/// `drop_managed`, a function captured when the block was created.
pub(super) struct ControlBlock {
    strong: AtomicUsize,
    weak: AtomicUsize,
    managed: AtomicPtr<()>,
    drop_managed: unsafe fn(*mut ()),
}

impl ControlBlock {
    /// Allocates a new [`ControlBlock`] managing the supplied instance.
    ///
    /// Both counters start at `1`: the creating owner, and the collective interest of the owners.
    ///
    /// # Errors
    ///
    /// Returns [`AllocError`] if memory could not be obtained; ownership of `managed` stays with
    /// the caller in that case.
    pub(super) fn create<T>(managed: NonNull<T>) -> Result<NonNull<ControlBlock>, AllocError> {
        let layout = Layout::new::<Self>();
        let Some(block) = NonNull::new(unsafe { raw_alloc(layout) }.cast::<Self>()) else {
            debug!("failed to allocate a control block for {:p}", managed);
            return Err(AllocError);
        };
        unsafe {
            block.as_ptr().write(Self {
                strong: AtomicUsize::new(1),
                weak: AtomicUsize::new(1),
                managed: AtomicPtr::new(managed.as_ptr().cast::<()>()),
                drop_managed: drop_boxed::<T>,
            });
        }
        Ok(block)
    }

    /// Returns a pointer to the managed instance.
    ///
    /// The result is only meaningful while the caller holds a strong reference.
    #[inline]
    pub(super) fn managed_ptr<T>(&self) -> *const T {
        self.managed.load(Relaxed).cast::<T>().cast_const()
    }

    /// Returns the current number of strong references.
    ///
    /// The value can be stale as soon as it is returned.
    #[inline]
    pub(super) fn strong_count(&self) -> usize {
        self.strong.load(Relaxed)
    }

    /// Returns the current value of the weak counter including the collective owner interest.
    #[inline]
    pub(super) fn weak_count(&self) -> usize {
        self.weak.load(Relaxed)
    }

    /// Adds a strong reference.
    ///
    /// The caller must already hold a strong reference, so the counter cannot be zero.
    #[inline]
    pub(super) fn increment_strong(&self) {
        let previous = self.strong.fetch_add(1, Relaxed);
        debug_assert_ne!(previous, 0);
        if previous > MAX_REFCOUNT {
            process::abort();
        }
    }

    /// Adds a strong reference if the instance has not been dropped.
    ///
    /// The zero check and the increment are committed by the same compare-and-swap, so the
    /// counter can never be revived once it reached zero.
    ///
    /// # Errors
    ///
    /// Returns [`Expired`] if the strong counter was observed to be zero.
    #[inline]
    pub(super) fn try_increment_strong_if_alive(&self) -> Result<(), Expired> {
        let mut current = self.strong.load(Relaxed);
        loop {
            if current == 0 {
                debug!("promotion denied: {:p} is expired", self);
                return Err(Expired);
            }
            if current > MAX_REFCOUNT {
                process::abort();
            }
            match self
                .strong
                .compare_exchange_weak(current, current + 1, Acquire, Relaxed)
            {
                Ok(_) => return Ok(()),
                Err(actual) => {
                    current = actual;
                }
            }
        }
    }

    /// Drops a strong reference.
    ///
    /// If it was the last one, the instance is dropped, and then the collective owner interest in
    /// the weak counter is given back, which may release the block as well. The weak counter is
    /// decremented even if dropping the instance unwinds.
    ///
    /// Returns `true` if the instance was dropped.
    ///
    /// # Safety
    ///
    /// The caller must own one strong reference to `this` and must not use it afterwards.
    #[inline]
    pub(super) unsafe fn decrement_strong_and_maybe_destroy_object(this: NonNull<Self>) -> bool {
        if this.as_ref().strong.fetch_sub(1, Release) != 1 {
            return false;
        }
        fence(Acquire);

        let _release_interest = ExitGuard::new(this, |this| unsafe {
            Self::decrement_weak_and_maybe_destroy_block(this);
        });
        let block = this.as_ref();
        let managed = block.managed.swap(ptr::null_mut(), Relaxed);
        if !managed.is_null() {
            trace!("dropping the instance at {:p} managed by {:p}", managed, block);
            (block.drop_managed)(managed);
        }
        true
    }

    /// Adds a weak reference.
    #[inline]
    pub(super) fn increment_weak(&self) {
        let previous = self.weak.fetch_add(1, Relaxed);
        debug_assert_ne!(previous, 0);
        if previous > MAX_REFCOUNT {
            process::abort();
        }
    }

    /// Drops a weak reference, and releases the block if it was the last one.
    ///
    /// Returns `true` if the block was released.
    ///
    /// # Safety
    ///
    /// The caller must own one weak reference to `this`, or the collective owner interest, and
    /// must not use it afterwards.
    #[inline]
    pub(super) unsafe fn decrement_weak_and_maybe_destroy_block(this: NonNull<Self>) -> bool {
        if this.as_ref().weak.fetch_sub(1, Release) != 1 {
            return false;
        }
        fence(Acquire);

        debug_assert_eq!(this.as_ref().strong.load(Relaxed), 0);
        debug_assert!(this.as_ref().managed.load(Relaxed).is_null());
        trace!("releasing the control block at {:p}", this);
        ptr::drop_in_place(this.as_ptr());
        alloc::dealloc(this.as_ptr().cast::<u8>(), Layout::new::<Self>());
        true
    }
}

/// Drops an instance that was handed over as a `Box<T>`.
unsafe fn drop_boxed<T>(managed: *mut ()) {
    drop(Box::from_raw(managed.cast::<T>()));
}

#[cfg(not(test))]
#[inline]
unsafe fn raw_alloc(layout: Layout) -> *mut u8 {
    alloc::alloc(layout)
}

#[cfg(test)]
unsafe fn raw_alloc(layout: Layout) -> *mut u8 {
    if fail_point::take() {
        ptr::null_mut()
    } else {
        alloc::alloc(layout)
    }
}
