//! Numeric locale pinning.
//!
//! Rust's float formatting and parsing never consult the C locale, but linked
//! C code and external trainer processes do. A host locale with a decimal
//! comma would make `svm_learn` misread `0,5`-style values or write them, so
//! the process locale is forced to `C` before any numeric file I/O and child
//! trainers inherit an explicit `C` environment.

use std::process::Command;

/// Locale name used for every numeric text exchange.
pub const NUMERIC_LOCALE: &str = "C";

/// Force the process-wide C library locale to `C`.
///
/// Returns `false` when the C library rejected the request.
pub fn pin_numeric_locale() -> bool {
    let pinned = set_process_locale();
    if pinned {
        tracing::debug!("Process numeric locale pinned to {NUMERIC_LOCALE}");
    } else {
        tracing::warn!("Unable to pin process locale to {NUMERIC_LOCALE}");
    }
    pinned
}

/// Configure a child process so its numeric I/O uses the `C` locale.
pub fn apply_numeric_locale(command: &mut Command) -> &mut Command {
    command
        .env("LC_ALL", NUMERIC_LOCALE)
        .env("LC_NUMERIC", NUMERIC_LOCALE)
        .env("LANG", NUMERIC_LOCALE)
}

#[cfg(not(target_os = "windows"))]
fn set_process_locale() -> bool {
    // SAFETY: called from the single-threaded pipeline setup; the string is a
    // valid NUL-terminated literal.
    unsafe {
        let all = libc::setlocale(libc::LC_ALL, c"C".as_ptr());
        let numeric = libc::setlocale(libc::LC_NUMERIC, c"C".as_ptr());
        !all.is_null() && !numeric.is_null()
    }
}

#[cfg(target_os = "windows")]
fn set_process_locale() -> bool {
    true
}
