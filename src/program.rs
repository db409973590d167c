//! The flattened instruction sequence shared by both backends.

use std::fmt;

use crate::expand;
use crate::lexer;
use crate::ops::Op;
use crate::parser;
use crate::pos::Pos;
use crate::Error;

/// A fully resolved instruction. Macro calls never survive expansion, so
/// there is no call variant here.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Instruction {
    Push(i32),
    Op(Op),
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instruction::Push(value) => write!(f, "{value}"),
            Instruction::Op(op) => write!(f, "{op}"),
        }
    }
}

/// A flat Spackel program. Every instruction carries the position it was
/// written at; for instructions from a macro body that is the position
/// inside the definition, not the call site.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Program {
    pub instructions: Vec<(Instruction, Pos)>,
}

impl Program {
    /// Runs the whole front end on raw source: the UTF-8 check, lexing,
    /// parsing and macro expansion.
    ///
    /// # Example
    /// ```
    /// use spackel::program::{Instruction, Program};
    ///
    /// let program = Program::parse(b"macro double dup + end 21 double").unwrap();
    /// let instructions: Vec<Instruction> =
    ///     program.instructions.iter().map(|&(inst, _)| inst).collect();
    /// assert_eq!(instructions.len(), 3);
    /// ```
    pub fn parse(source: &[u8]) -> Result<Self, Error> {
        let tokens = lexer::lex(source)?;
        let items = parser::parse(tokens)?;
        Ok(expand::expand(items)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expand::MacroError;
    use crate::lexer::LexError;
    use crate::parser::ParseError;

    #[test]
    fn front_end_errors_carry_their_stage() {
        assert!(matches!(
            Program::parse(b"\xff"),
            Err(Error::Lex(LexError::InvalidUtf8 { .. })),
        ));
        assert!(matches!(Program::parse(b"end"), Err(Error::Parse(ParseError::StrayEnd { .. }))));
        assert!(matches!(
            Program::parse(b"nonsense"),
            Err(Error::Macro(MacroError::UnknownInstruction { .. })),
        ));
    }

    #[test]
    fn instructions_display_as_written() {
        assert_eq!(Instruction::Push(-3).to_string(), "-3");
        assert_eq!(Instruction::Op(Op::PrintChar).to_string(), "print-char");
    }
}
