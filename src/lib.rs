#![deny(missing_docs, clippy::all, clippy::pedantic)]
#![doc = include_str!("../README.md")]

mod error;
pub use error::{AllocError, Expired};

mod shared;
pub use shared::Shared;

mod weak;
pub use weak::Weak;

mod control_block;
mod exit_guard;

#[cfg(all(loom, test))]
mod maybe_std {
    pub(crate) use loom::sync::atomic::{fence, AtomicPtr, AtomicUsize};
}

#[cfg(not(all(loom, test)))]
mod maybe_std {
    pub(crate) use std::sync::atomic::{fence, AtomicPtr, AtomicUsize};
}
