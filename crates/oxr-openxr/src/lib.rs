//! [`XrRuntime`](oxr_provider::XrRuntime) over the system OpenXR loader.
//!
//! The provider core speaks in integer handles; this crate turns them back
//! into `openxr::sys` handles and calls the entry points the loader resolved
//! for the live instance. Only one instance is live at a time.

mod convert;
mod extensions;
mod runtime;

pub use runtime::OpenXrRuntime;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum OpenXrError {
    #[error("unable to load the OpenXR loader: {0}")]
    Load(String),
}

pub type OpenXrResult<T> = Result<T, OpenXrError>;
