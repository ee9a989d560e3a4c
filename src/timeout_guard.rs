//! A "scope guard" that will reset a session's read timeout when it goes out of scope.

use crate::{
    backend::Backend,
    error::{Error, SessionClosedError},
};
use std::{io, marker::PhantomData, time::Duration};

/// A session, as required by the [`TimeoutGuard`].
pub trait Port<B>: private::Sealed {
    /// Get the underlying backend, if it has not been released.
    #[doc(hidden)]
    fn backend_mut(&mut self) -> Option<&mut B>;
    /// Poison the session.
    #[doc(hidden)]
    fn poison(&mut self, e: io::Error);
}

mod private {
    /// Marks a trait a sealed.
    pub trait Sealed {}
    impl<B> Sealed for crate::session::Session<B> {}
}

/// A "scope guard" that will update the session's read timeout and then
/// reset it when it goes out of scope.
///
/// To create a guard, use the session's [`timeout_guard`](crate::session::Session::timeout_guard) method.
///
/// While the guard is in scope, the session can only be accessed through the guard.
/// However, because the guard implements [`Deref`](std::ops::Deref) and
/// [`DerefMut`](std::ops::DerefMut) callers can treat the guard as the session.
///
/// If the original timeout cannot be restored, the session is poisoned and
/// the error is returned by the next operation.
#[derive(Debug)]
pub struct TimeoutGuard<'a, B: Backend, P: Port<B>> {
    /// The underlying session.
    port: &'a mut P,
    /// The original timeout that will be restored when the guard is dropped.
    original_timeout: Option<Duration>,
    backend_marker: PhantomData<B>,
}

impl<'a, B: Backend, P: Port<B>> TimeoutGuard<'a, B, P> {
    /// Update the session's timeout and return a [`TimeoutGuard`] wrapping the session.
    pub(crate) fn new(port: &'a mut P, timeout: Option<Duration>) -> Result<Self, Error> {
        let backend = port.backend_mut().ok_or(SessionClosedError)?;
        let original_timeout = backend.read_timeout()?;
        backend.set_read_timeout(timeout)?;
        Ok(TimeoutGuard {
            port,
            original_timeout,
            backend_marker: PhantomData,
        })
    }
}

impl<'a, B: Backend, P: Port<B>> std::ops::Deref for TimeoutGuard<'a, B, P> {
    type Target = P;
    /// Get a shared reference to the underlying session.
    fn deref(&self) -> &Self::Target {
        self.port
    }
}

impl<'a, B: Backend, P: Port<B>> std::ops::DerefMut for TimeoutGuard<'a, B, P> {
    /// Get an exclusive reference to the underlying session.
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.port
    }
}

impl<'a, B: Backend, P: Port<B>> std::ops::Drop for TimeoutGuard<'a, B, P> {
    fn drop(&mut self) {
        // A session closed through the guard has nothing left to restore.
        let Some(backend) = self.port.backend_mut() else {
            return;
        };
        if let Err(err) = backend.set_read_timeout(self.original_timeout) {
            let message = if let Some(timeout) = self.original_timeout {
                format!(
                    "failed to reset timeout to {} ms: {err}",
                    timeout.as_millis()
                )
            } else {
                format!("failed to reset to an infinite timeout: {err}")
            };
            self.port.poison(io::Error::other(message));
        }
    }
}
