//! C bindings for the Torii client.
//!
//! - Handles are opaque pointers, each released by its `*_destroy` function.
//! - Fallible functions return a tagged [`Result`]. Errors are `DojoError`
//!   handles released with `dojo_error_destroy`.
//! - String output is appended to a caller owned [`DojoWrite`] buffer.
//! - No panic crosses the boundary: it is reported as a `RuntimeError`.

pub mod clause;
pub mod client;
pub mod error;
pub mod query;
pub mod types;
pub mod write;

use std::ffi::c_char;
use std::panic::{catch_unwind, AssertUnwindSafe};

use torii_client::subscription::panic_message;
use torii_client::Error;
use tracing::error;
use tracing_subscriber::EnvFilter;

pub use crate::client::ToriiClient;
pub use crate::types::{FieldElement, Result};
pub use crate::write::DojoWrite;

pub(crate) const LOG_TARGET: &str = "torii::c";

/// Runs an entry point, turning a panic into a `RuntimeError`.
pub(crate) fn ffi_guard<T>(f: impl FnOnce() -> types::FfiResult<T>) -> Result<T> {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result.into(),
        Err(panic) => {
            let reason = panic_message(&*panic);
            error!(target: LOG_TARGET, reason = %reason, "Panic in foreign call.");
            Result::err(Error::Panic(reason))
        }
    }
}

/// Like [`ffi_guard`] for entry points without a result. A panic is only logged.
pub(crate) fn ffi_guard_void(f: impl FnOnce()) {
    if let Err(panic) = catch_unwind(AssertUnwindSafe(f)) {
        error!(target: LOG_TARGET, reason = %panic_message(&*panic), "Panic in foreign call.");
    }
}

/// Installs a global `tracing` subscriber writing to stderr.
///
/// `filter` uses the `RUST_LOG` syntax, e.g. `torii=debug`. Null reads the
/// filter from `RUST_LOG`. Returns false if a subscriber was already set or
/// the filter is invalid.
///
/// # Safety
/// `filter` is null or a NUL terminated string.
#[no_mangle]
pub unsafe extern "C" fn client_init_logging(filter: *const c_char) -> bool {
    let filter = if filter.is_null() {
        EnvFilter::from_default_env()
    } else {
        let Ok(directives) = (unsafe { types::str_arg(filter, "filter") }) else {
            return false;
        };
        match EnvFilter::try_new(directives) {
            Ok(filter) => filter,
            Err(_) => return false,
        }
    };

    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).try_init().is_ok()
}
