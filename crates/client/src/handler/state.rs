use std::sync::atomic::{AtomicU8, Ordering};

use crate::HttpError;

/// Where a handler is in its life.
///
/// `Configurable` moves to `Sending` on the first send and never back. Either
/// moves to `Disposed`, which is final.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum LifecycleState {
    Configurable = 0,
    Sending = 1,
    Disposed = 2,
}

impl LifecycleState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => LifecycleState::Configurable,
            1 => LifecycleState::Sending,
            _ => LifecycleState::Disposed,
        }
    }
}

/// Checked, thread safe [`LifecycleState`] transitions.
#[derive(Debug)]
pub struct Lifecycle {
    object: &'static str,
    state: AtomicU8,
}

impl Lifecycle {
    /// `object` names the owner in disposed errors.
    pub fn new(object: &'static str) -> Self {
        Self { object, state: AtomicU8::new(LifecycleState::Configurable as u8) }
    }

    pub fn state(&self) -> LifecycleState {
        LifecycleState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn is_started(&self) -> bool {
        self.state() == LifecycleState::Sending
    }

    pub fn is_disposed(&self) -> bool {
        self.state() == LifecycleState::Disposed
    }

    /// Trips the started latch. Fails only once disposed.
    pub fn start_sending(&self) -> Result<(), HttpError> {
        match self.state.compare_exchange(
            LifecycleState::Configurable as u8,
            LifecycleState::Sending as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            Ok(_) => Ok(()),
            Err(current) if LifecycleState::from_u8(current) == LifecycleState::Disposed => {
                Err(HttpError::disposed(self.object))
            }
            Err(_) => Ok(()),
        }
    }

    /// Fails unless configuration may still change.
    pub fn check_configurable(&self) -> Result<(), HttpError> {
        match self.state() {
            LifecycleState::Configurable => Ok(()),
            LifecycleState::Sending => Err(HttpError::invalid_operation(format!(
                "{} properties can only be changed before the first request is sent",
                self.object
            ))),
            LifecycleState::Disposed => Err(HttpError::disposed(self.object)),
        }
    }

    pub fn check_not_disposed(&self) -> Result<(), HttpError> {
        if self.is_disposed() { Err(HttpError::disposed(self.object)) } else { Ok(()) }
    }

    /// Moves to `Disposed`, returning true for the call that did it.
    pub fn dispose(&self) -> bool {
        self.state.swap(LifecycleState::Disposed as u8, Ordering::AcqRel) != LifecycleState::Disposed as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transitions() {
        let lifecycle = Lifecycle::new("handler");
        assert!(lifecycle.check_configurable().is_ok());

        lifecycle.start_sending().unwrap();
        lifecycle.start_sending().unwrap();
        assert!(lifecycle.is_started());
        assert!(matches!(lifecycle.check_configurable(), Err(HttpError::InvalidOperation { .. })));

        assert!(lifecycle.dispose());
        assert!(!lifecycle.dispose());
        assert!(lifecycle.start_sending().unwrap_err().is_disposed());
        assert!(lifecycle.check_configurable().unwrap_err().is_disposed());
    }
}
