//! The runtime library linked into compiled Spackel programs.
//!
//! Compiled objects import these C ABI functions for IO. Output is flushed
//! on every call: the generated `main` returns through the C runtime, so no
//! Rust exit path runs that would flush a buffered stream.

use std::fmt;
use std::io::{self, Write};

fn emit(args: fmt::Arguments<'_>) {
    let mut out = io::stdout().lock();
    // Like printf, write failures are ignored.
    let _ = out.write_fmt(args);
    let _ = out.flush();
}

/// Prints the value in decimal without a newline.
#[no_mangle]
pub extern "C" fn spkl_print_i32(value: i32) {
    emit(format_args!("{value}"));
}

/// Prints the value in decimal followed by a newline.
#[no_mangle]
pub extern "C" fn spkl_println_i32(value: i32) {
    emit(format_args!("{value}\n"));
}

/// Prints the value as a Unicode character.
#[no_mangle]
pub extern "C" fn spkl_print_char(value: i32) {
    emit(format_args!("{}", decode(value)));
}

/// The Unicode scalar value named by `value` reinterpreted as a `u32`, or
/// U+FFFD when it is a surrogate or out of range.
fn decode(value: i32) -> char {
    char::from_u32(value as u32).unwrap_or(char::REPLACEMENT_CHARACTER)
}
