//! The built-in Spackel operators and their stack effects.
//!
//! Both the interpreter and the compiler consume the tables in this module,
//! so an operator's arity, shape and special cases are defined exactly once.

use std::fmt;

/// A built-in operator.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Op {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    /// `+🤡`, addition with a few joke inputs overridden.
    SillyAdd,
    /// `ß`, pushes 1945.
    SharpS,
    Drop,
    Dup,
    Swap,
    Over,
    Nip,
    Tuck,
    Print,
    Println,
    PrintChar,
}

/// Every operator, in the order they are documented.
pub const ALL_OPS: [Op; 16] = [
    Op::Add,
    Op::Sub,
    Op::Mul,
    Op::Div,
    Op::Rem,
    Op::SillyAdd,
    Op::SharpS,
    Op::Drop,
    Op::Dup,
    Op::Swap,
    Op::Over,
    Op::Nip,
    Op::Tuck,
    Op::Print,
    Op::Println,
    Op::PrintChar,
];

/// Input pairs for [`Op::SillyAdd`] with a fixed result, checked before
/// falling back to ordinary addition. Entries are `((a, b), result)` where
/// `a` was pushed before `b`.
pub const SILLY_ADD_OVERRIDES: [((i32, i32), i32); 3] =
    [((9, 10), 21), ((10, 9), 21), ((1, 1), 1)];

/// Addition with the [`SILLY_ADD_OVERRIDES`] table applied.
pub fn silly_add(a: i32, b: i32) -> i32 {
    for ((x, y), result) in SILLY_ADD_OVERRIDES {
        if (a, b) == (x, y) {
            return result;
        }
    }
    a.wrapping_add(b)
}

/// A pure reordering of the top of the stack: pop `arity` values, then push
/// copies of them selected by `pushes`, bottom first. Index 0 is the value
/// popped first (the old top of the stack).
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Shuffle {
    pub arity: usize,
    pub pushes: &'static [usize],
}

impl Op {
    /// Looks up the operator a word refers to.
    pub fn from_word(word: &str) -> Option<Op> {
        Some(match word {
            "+" => Op::Add,
            "-" => Op::Sub,
            "*" => Op::Mul,
            "/" => Op::Div,
            "%" => Op::Rem,
            "+🤡" => Op::SillyAdd,
            "ß" => Op::SharpS,
            "drop" => Op::Drop,
            "dup" => Op::Dup,
            "swap" => Op::Swap,
            "over" => Op::Over,
            "nip" => Op::Nip,
            "tuck" => Op::Tuck,
            "print" => Op::Print,
            "println" => Op::Println,
            "print-char" => Op::PrintChar,
            _ => return None,
        })
    }

    /// The word form of this operator.
    pub fn word(self) -> &'static str {
        match self {
            Op::Add => "+",
            Op::Sub => "-",
            Op::Mul => "*",
            Op::Div => "/",
            Op::Rem => "%",
            Op::SillyAdd => "+🤡",
            Op::SharpS => "ß",
            Op::Drop => "drop",
            Op::Dup => "dup",
            Op::Swap => "swap",
            Op::Over => "over",
            Op::Nip => "nip",
            Op::Tuck => "tuck",
            Op::Print => "print",
            Op::Println => "println",
            Op::PrintChar => "print-char",
        }
    }

    /// Number of values the operator pops.
    pub fn arity(self) -> usize {
        match self {
            Op::SharpS => 0,
            Op::Drop | Op::Dup | Op::Print | Op::Println | Op::PrintChar => 1,
            Op::Add
            | Op::Sub
            | Op::Mul
            | Op::Div
            | Op::Rem
            | Op::SillyAdd
            | Op::Swap
            | Op::Over
            | Op::Nip
            | Op::Tuck => 2,
        }
    }

    /// Number of values the operator pushes.
    pub fn results(self) -> usize {
        match self {
            Op::Drop | Op::Print | Op::Println | Op::PrintChar => 0,
            Op::Add
            | Op::Sub
            | Op::Mul
            | Op::Div
            | Op::Rem
            | Op::SillyAdd
            | Op::SharpS
            | Op::Nip => 1,
            Op::Dup | Op::Swap => 2,
            Op::Over | Op::Tuck => 3,
        }
    }

    /// The shape transformation of a pure stack-manipulation operator, or
    /// `None` for operators that compute or perform IO.
    pub fn shuffle(self) -> Option<Shuffle> {
        let shuffle = match self {
            Op::Drop => Shuffle { arity: 1, pushes: &[] },
            Op::Dup => Shuffle { arity: 1, pushes: &[0, 0] },
            Op::Swap => Shuffle { arity: 2, pushes: &[0, 1] },
            // a b -> a b a
            Op::Over => Shuffle { arity: 2, pushes: &[1, 0, 1] },
            Op::Nip => Shuffle { arity: 2, pushes: &[0] },
            // a b -> b a b
            Op::Tuck => Shuffle { arity: 2, pushes: &[0, 1, 0] },
            _ => return None,
        };
        Some(shuffle)
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.word())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn words_round_trip() {
        for op in ALL_OPS {
            assert_eq!(Op::from_word(op.word()), Some(op));
            assert_eq!(op.to_string(), op.word());
        }
    }

    #[test]
    fn keywords_and_unknown_words_are_not_operators() {
        for word in ["macro", "end", "69", "", "kombucha", "Dup"] {
            assert_eq!(Op::from_word(word), None);
        }
    }

    #[test]
    fn shuffles_are_consistent_with_arity_and_results() {
        for op in ALL_OPS {
            let Some(shuffle) = op.shuffle() else { continue };
            assert_eq!(shuffle.arity, op.arity());
            assert_eq!(shuffle.pushes.len(), op.results());
            assert!(shuffle.pushes.iter().all(|&source| source < shuffle.arity));
        }
    }

    #[test]
    fn silly_add_overrides_and_fallback() {
        assert_eq!(silly_add(9, 10), 21);
        assert_eq!(silly_add(10, 9), 21);
        assert_eq!(silly_add(1, 1), 1);
        assert_eq!(silly_add(2, 3), 5);
        assert_eq!(silly_add(1, 9), 10);
        assert_eq!(silly_add(i32::MAX, 1), i32::MIN);
    }
}
