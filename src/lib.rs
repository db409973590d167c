//! An implementation of Spackel, a small stack-based language where every
//! instruction is a whitespace-separated word operating on a stack of 32-bit
//! integers.
//!
//! A program is a flat sequence of instructions with compile-time `macro`
//! definitions and no control flow. The front end ([`Program::parse`]) turns
//! source text into a flat instruction sequence, which can then either be
//! interpreted ([`vm::run`]) or compiled into a native object file
//! ([`codegen::compile`]) that links against a small runtime library for IO.
//!
//! ```
//! use spackel::program::Program;
//! use spackel::vm;
//!
//! let program = Program::parse(b"macro double dup + end 21 double println").unwrap();
//! let mut output = Vec::new();
//! vm::run(&program, &mut output).unwrap();
//! assert_eq!(output, b"42\n");
//! ```
//!
//! [`Program::parse`]: program::Program::parse

use thiserror::Error;

pub mod codegen;
pub mod expand;
pub mod lexer;
pub mod ops;
pub mod parser;
pub mod pos;
pub mod program;
pub mod vm;

/// Any error from the front end (lexing, parsing or macro expansion).
#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    #[error(transparent)]
    Lex(#[from] lexer::LexError),
    #[error(transparent)]
    Parse(#[from] parser::ParseError),
    #[error(transparent)]
    Macro(#[from] expand::MacroError),
}
