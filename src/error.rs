use thiserror::Error;

/// [`AllocError`] is returned when memory for a control block could not be obtained.
///
/// The operation that returns it has already dropped the instance it was asked to manage, so
/// nothing is leaked on this path.
#[derive(Clone, Copy, Debug, Eq, Error, PartialEq)]
#[error("control block allocation failed")]
pub struct AllocError;

/// [`Expired`] is returned when a [`Weak`](super::Weak) is promoted after the last
/// [`Shared`](super::Shared) owning the instance was dropped.
///
/// Only the `TryFrom<&Weak<T>>` conversion of [`Shared`](super::Shared) reports it;
/// [`Weak::lock`](super::Weak::lock) turns it into an empty [`Shared`](super::Shared).
#[derive(Clone, Copy, Debug, Eq, Error, PartialEq)]
#[error("managed instance has already been destroyed")]
pub struct Expired;
