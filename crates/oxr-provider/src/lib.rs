#![forbid(unsafe_code)]

pub mod action;
pub mod code;
pub mod context;
pub mod dummy;
pub mod extensions;
pub mod input;
pub mod profiles;
pub mod provider;
pub mod runtime;
pub mod session;
pub mod types;

pub use action::{Action, ActionSet, ActionStates};
pub use code::XrCode;
pub use context::{InstanceContext, SessionContext};
pub use dummy::DummyRuntime;
pub use extensions::{Extension, ExtensionAdapter, ExtensionRegistry};
pub use input::{Input, SyncStats, MAX_READERS};
pub use profiles::{Component, ControllerProfile, Qualifier};
pub use provider::{AppInfo, Provider};
pub use runtime::{GraphicsBinding, RawResult, XrRuntime};
pub use session::{Session, SessionOptions};

use std::sync::{Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};

use thiserror::Error;

use crate::types::ActionType;

#[derive(Debug, Error)]
pub enum ProviderError {
    /// The runtime returned a non-success code; kept verbatim.
    #[error("runtime refused the call: {0}")]
    Runtime(XrCode),
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("not present: {0}")]
    NotPresent(String),
    #[error("provider already initialized")]
    AlreadyInitialized,
    #[error("provider not initialized")]
    NotInitialized,
    #[error("runtime refused instance creation: {0}")]
    RuntimeRefused(XrCode),
    #[error("system unavailable: {0}")]
    SystemUnavailable(XrCode),
    #[error("a session already exists")]
    SessionExists,
    #[error("action set '{0}' is already attached")]
    ActionSetAttached(String),
    #[error("action '{action}' is {actual:?}, not {requested:?}")]
    TypeMismatch {
        action: String,
        actual: ActionType,
        requested: ActionType,
    },
}

impl ProviderError {
    pub fn validation(msg: impl std::fmt::Display) -> Self {
        Self::Validation(msg.to_string())
    }

    pub fn not_present(msg: impl std::fmt::Display) -> Self {
        Self::NotPresent(msg.to_string())
    }

    /// Raw result code equivalent of this error.
    pub fn code(&self) -> XrCode {
        match self {
            Self::Runtime(code) | Self::RuntimeRefused(code) | Self::SystemUnavailable(code) => {
                *code
            }
            Self::Validation(_) => XrCode::ERROR_VALIDATION_FAILURE,
            Self::NotPresent(_) => XrCode::ERROR_EXTENSION_NOT_PRESENT,
            Self::AlreadyInitialized | Self::NotInitialized | Self::SessionExists => {
                XrCode::ERROR_CALL_ORDER_INVALID
            }
            Self::ActionSetAttached(_) => XrCode::ERROR_ACTIONSETS_ALREADY_ATTACHED,
            Self::TypeMismatch { .. } => XrCode::ERROR_ACTION_TYPE_MISMATCH,
        }
    }
}

impl From<XrCode> for ProviderError {
    fn from(code: XrCode) -> Self {
        Self::Runtime(code)
    }
}

pub type ProviderResult<T> = Result<T, ProviderError>;

/// Locks `mutex`, recovering the data if a reader thread panicked.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

pub(crate) fn read_lock<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    match lock.read() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

pub(crate) fn write_lock<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    match lock.write() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(
            ProviderError::validation("null session").code(),
            XrCode::ERROR_VALIDATION_FAILURE
        );
        assert_eq!(
            ProviderError::Runtime(XrCode::ERROR_SESSION_LOST).code(),
            XrCode::ERROR_SESSION_LOST
        );
        assert_eq!(
            ProviderError::ActionSetAttached("gameplay".into()).code(),
            XrCode::ERROR_ACTIONSETS_ALREADY_ATTACHED
        );
    }

    #[test]
    fn test_from_code_is_runtime_refusal() {
        let err: ProviderError = XrCode::ERROR_HANDLE_INVALID.into();
        assert!(matches!(err, ProviderError::Runtime(XrCode::ERROR_HANDLE_INVALID)));
        assert_eq!(
            err.to_string(),
            "runtime refused the call: XR_ERROR_HANDLE_INVALID"
        );
    }
}
