use torii_client::{DojoError, ErrorType};

use crate::types::{mut_arg, ref_arg, slice_arg, Result};
use crate::write::DojoWrite;
use crate::ffi_guard;

/// Creates an error from a UTF-8 message of `len` bytes.
///
/// # Safety
/// `message` points to `len` readable bytes.
#[no_mangle]
pub unsafe extern "C" fn dojo_error_new(
    error_type: ErrorType,
    message: *const u8,
    len: usize,
) -> Result<*mut DojoError> {
    ffi_guard(|| {
        let message = unsafe { slice_arg(message, len, "message") }?;
        let error = DojoError::from_utf8(error_type, message)?;
        Ok(Box::into_raw(Box::new(error)))
    })
}

/// Category of `error`. A null error reads as `InvalidInput`.
///
/// # Safety
/// `error` is null or a live error.
#[no_mangle]
pub unsafe extern "C" fn dojo_error_type(error: *const DojoError) -> ErrorType {
    unsafe { ref_arg(error, "error") }.map_or(ErrorType::InvalidInput, DojoError::error_type)
}

/// Appends the message of `error` to `write`. Returns the number of bytes written.
///
/// # Safety
/// `error` and `write` are null or live handles.
#[no_mangle]
pub unsafe extern "C" fn dojo_error_message(
    error: *const DojoError,
    write: *mut DojoWrite,
) -> Result<usize> {
    ffi_guard(|| {
        let error = unsafe { ref_arg(error, "error") }?;
        Ok(unsafe { mut_arg(write, "write") }?.write_text(error.message()))
    })
}

/// # Safety
/// `error` is null or an error returned by this library, not destroyed yet.
#[no_mangle]
pub unsafe extern "C" fn dojo_error_destroy(error: *mut DojoError) {
    if !error.is_null() {
        drop(unsafe { Box::from_raw(error) });
    }
}
