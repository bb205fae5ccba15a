//! A [`SecureLink`] that both the main loop and the radio interrupt can reach.
//!
//! The CCM* scratch buffers and the AES engine are single-user. Every access goes through a
//! critical section so a receive in the ISR cannot interleave with a transmit.

use core::cell::RefCell;

use critical_section::Mutex;

use super::security::SecureLink;

pub struct SharedLink<E> {
    inner: Mutex<RefCell<Option<SecureLink<E>>>>,
}

impl<E> SharedLink<E> {
    pub const fn new() -> Self {
        Self {
            inner: Mutex::new(RefCell::new(None)),
        }
    }

    /// Put `link` in place, returning the one it replaces.
    pub fn install(&self, link: SecureLink<E>) -> Option<SecureLink<E>> {
        critical_section::with(|cs| self.inner.borrow(cs).replace(Some(link)))
    }

    pub fn take(&self) -> Option<SecureLink<E>> {
        critical_section::with(|cs| self.inner.borrow(cs).take())
    }

    pub fn is_installed(&self) -> bool {
        critical_section::with(|cs| {
            self.inner
                .borrow(cs)
                .try_borrow()
                .map_or(true, |link| link.is_some())
        })
    }

    /// Run `f` on the link inside a critical section.
    ///
    /// Returns `None` when no link is installed, or when called from inside another `with`.
    pub fn with<R>(&self, f: impl FnOnce(&mut SecureLink<E>) -> R) -> Option<R> {
        critical_section::with(|cs| {
            let mut link = self.inner.borrow(cs).try_borrow_mut().ok()?;
            link.as_mut().map(f)
        })
    }
}

impl<E> Default for SharedLink<E> {
    fn default() -> Self {
        Self::new()
    }
}
