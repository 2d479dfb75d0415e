//! Caller owned output buffers.
//!
//! String output is appended to a [`DojoWrite`] instead of being returned as
//! an owned C string, so no allocation ever crosses the boundary.

use std::fmt;

use serde::Serialize;
use torii_client::{DojoError, ErrorType};

use crate::types::{ref_arg, FfiResult};

/// A growable byte buffer. Contents are UTF-8 and not NUL terminated.
#[derive(Debug, Default)]
pub struct DojoWrite {
    buf: Vec<u8>,
}

impl DojoWrite {
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Appends `value` as JSON. Returns the number of bytes written.
    pub(crate) fn write_json<T: Serialize>(&mut self, value: &T) -> FfiResult<usize> {
        let before = self.buf.len();
        serde_json::to_writer(&mut self.buf, value).map_err(|e| {
            self.buf.truncate(before);
            DojoError::new(ErrorType::ParseError, format!("Failed to encode output: {e}"))
        })?;
        Ok(self.buf.len() - before)
    }

    /// Appends `text`. Returns the number of bytes written.
    pub(crate) fn write_text(&mut self, text: &str) -> usize {
        self.buf.extend_from_slice(text.as_bytes());
        text.len()
    }
}

impl fmt::Write for DojoWrite {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.write_text(s);
        Ok(())
    }
}

/// Creates an empty buffer. Release it with [`dojo_write_destroy`].
#[no_mangle]
pub extern "C" fn dojo_write_new() -> *mut DojoWrite {
    Box::into_raw(Box::default())
}

/// Number of bytes in the buffer.
///
/// # Safety
/// `write` is null or a live buffer.
#[no_mangle]
pub unsafe extern "C" fn dojo_write_len(write: *const DojoWrite) -> usize {
    unsafe { ref_arg(write, "write") }.map_or(0, |w| w.buf.len())
}

/// Start of the buffer contents. Valid until the next call that writes to or
/// destroys the buffer.
///
/// # Safety
/// `write` is null or a live buffer.
#[no_mangle]
pub unsafe extern "C" fn dojo_write_data(write: *const DojoWrite) -> *const u8 {
    unsafe { ref_arg(write, "write") }.map_or(std::ptr::null(), |w| w.buf.as_ptr())
}

/// Empties the buffer, keeping its capacity.
///
/// # Safety
/// `write` is null or a live buffer.
#[no_mangle]
pub unsafe extern "C" fn dojo_write_clear(write: *mut DojoWrite) {
    if let Some(write) = unsafe { write.as_mut() } {
        write.buf.clear();
    }
}

/// # Safety
/// `write` is null or a buffer returned by [`dojo_write_new`], not destroyed yet.
#[no_mangle]
pub unsafe extern "C" fn dojo_write_destroy(write: *mut DojoWrite) {
    if !write.is_null() {
        drop(unsafe { Box::from_raw(write) });
    }
}
