//! Executing Spackel programs directly.

use std::io::Write;

use smallvec::SmallVec;
use thiserror::Error;

use crate::ops::{silly_add, Op};
use crate::pos::Pos;
use crate::program::{Instruction, Program};


/// An error within a single instruction.
#[derive(Error, Debug)]
pub enum OperationError {
    #[error("Removing from an empty stack")]
    StackUnderflow,
    #[error("Division by zero")]
    DivisionByZero,
    #[error("Remainder by zero")]
    RemainderByZero,
    #[error("Writing output failed: {0}")]
    Io(#[from] std::io::Error),
}

/// An error that happened while running a Spackel program.
#[derive(Debug, Error)]
pub enum RunError {
    /// A specific instruction failed.
    #[error("Instruction `{instruction}` at {pos} failed: {error}")]
    InstructionFailed {
        /// The instruction which failed.
        instruction: Instruction,
        /// Where the instruction appears in the source.
        pos: Pos,
        /// The specific error within the instruction.
        error: OperationError,
    },
}

/// The successful result of running a Spackel program.
#[derive(Debug, Clone)]
pub struct RunResult {
    /// The stack left over after the program has finished.
    pub stack: Vec<i32>,
    /// The number of instructions which have been run.
    pub instructions_run: u64,
}

/// The internal state of the VM.
#[derive(Debug)]
struct State<W> {
    stack: Vec<i32>,
    out: W,
}

impl<W: Write> State<W> {
    fn pop(&mut self) -> Result<i32, OperationError> {
        self.stack.pop().ok_or(OperationError::StackUnderflow)
    }

    fn push(&mut self, value: i32) {
        self.stack.push(value);
    }

    fn apply(&mut self, instruction: Instruction) -> Result<(), OperationError> {
        let op = match instruction {
            Instruction::Push(value) => {
                self.push(value);
                return Ok(());
            }
            Instruction::Op(op) => op,
        };

        if let Some(shuffle) = op.shuffle() {
            let mut popped: SmallVec<[i32; 2]> = SmallVec::new();
            for _ in 0..shuffle.arity {
                popped.push(self.pop()?);
            }
            for &source in shuffle.pushes {
                self.push(popped[source]);
            }
            return Ok(());
        }

        match op {
            Op::Add => {
                let b = self.pop()?;
                let a = self.pop()?;
                self.push(a.wrapping_add(b));
            }
            Op::Sub => {
                let b = self.pop()?;
                let a = self.pop()?;
                self.push(a.wrapping_sub(b));
            }
            Op::Mul => {
                let b = self.pop()?;
                let a = self.pop()?;
                self.push(a.wrapping_mul(b));
            }
            Op::Div => {
                let b = self.pop()?;
                let a = self.pop()?;
                if b == 0 {
                    return Err(OperationError::DivisionByZero);
                }
                // wrapping_div turns i32::MIN / -1 into i32::MIN
                self.push(a.wrapping_div(b));
            }
            Op::Rem => {
                let b = self.pop()?;
                let a = self.pop()?;
                if b == 0 {
                    return Err(OperationError::RemainderByZero);
                }
                self.push(a.wrapping_rem(b));
            }
            Op::SillyAdd => {
                let b = self.pop()?;
                let a = self.pop()?;
                self.push(silly_add(a, b));
            }
            Op::SharpS => self.push(1945),
            Op::Print => {
                let value = self.pop()?;
                write!(self.out, "{value}")?;
            }
            Op::Println => {
                let value = self.pop()?;
                writeln!(self.out, "{value}")?;
            }
            Op::PrintChar => {
                let value = self.pop()?;
                let c = char::from_u32(value as u32).unwrap_or(char::REPLACEMENT_CHARACTER);
                write!(self.out, "{c}")?;
            }
            Op::Drop | Op::Dup | Op::Swap | Op::Over | Op::Nip | Op::Tuck => {
                unreachable!("handled as shuffles")
            }
        }

        Ok(())
    }
}

/// Runs a program against a fresh stack, writing IO output to `out`.
///
/// A failed instruction ends the run. Output written before the failure has
/// already gone to `out` and stays there.
///
/// # Example
/// ```
/// use spackel::program::Program;
/// use spackel::vm;
///
/// let program = Program::parse(b"2 3 + 4 *").unwrap();
/// let result = vm::run(&program, std::io::sink()).unwrap();
/// assert_eq!(result.stack, vec![20]);
/// ```
pub fn run<W: Write>(program: &Program, out: W) -> Result<RunResult, RunError> {
    let mut state = State { stack: Vec::new(), out };
    let mut instructions_run = 0;

    for &(instruction, pos) in &program.instructions {
        state
            .apply(instruction)
            .map_err(|error| RunError::InstructionFailed { instruction, pos, error })?;
        instructions_run += 1;
    }

    Ok(RunResult { stack: state.stack, instructions_run })
}
