/// [`ExitGuard`] captures a value and invokes a closure on it when dropped, including while the
/// thread is unwinding.
pub(crate) struct ExitGuard<T, F: FnOnce(T)> {
    drop_callback: Option<(T, F)>,
}

impl<T, F: FnOnce(T)> ExitGuard<T, F> {
    /// Creates a new [`ExitGuard`] with the specified variables captured.
    #[inline]
    pub(crate) const fn new(captured: T, drop_callback: F) -> Self {
        Self {
            drop_callback: Some((captured, drop_callback)),
        }
    }
}

impl<T, F: FnOnce(T)> Drop for ExitGuard<T, F> {
    #[inline]
    fn drop(&mut self) {
        if let Some((c, f)) = self.drop_callback.take() {
            f(c);
        }
    }
}
