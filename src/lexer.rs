//! Splitting Spackel source text into tokens.
//!
//! Tokens are whitespace-separated. A `#` starts a comment which runs to the
//! end of the line and may directly follow a word without whitespace.

use thiserror::Error;

use crate::pos::Pos;

/// A single lexical unit of a Spackel program.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Token<'src> {
    /// A decimal integer with an optional sign, fitting in 32 bits.
    Integer(i32),
    /// Any other run of non-whitespace characters. Digit runs which do not
    /// fit in 32 bits are words too, so they fail later as unknown
    /// instructions rather than silently truncating.
    Word(&'src str),
    /// The text of a `#` comment, without the `#` or the line break.
    Comment(&'src str),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LexError {
    #[error("Source is not valid UTF-8 (at byte {offset})")]
    InvalidUtf8 { offset: usize },
}

/// Checks that the input is UTF-8 and returns a token iterator over it.
/// This is the only point where lexing can fail.
pub fn lex(source: &[u8]) -> Result<Lexer<'_>, LexError> {
    let source = std::str::from_utf8(source)
        .map_err(|e| LexError::InvalidUtf8 { offset: e.valid_up_to() })?;
    Ok(Lexer::new(source))
}

/// An iterator over tokens and their positions.
#[derive(Clone, Debug)]
pub struct Lexer<'src> {
    rest: &'src str,
    line: u32,
    column: u32,
}

impl<'src> Lexer<'src> {
    pub fn new(source: &'src str) -> Self {
        Lexer { rest: source, line: 1, column: 1 }
    }

    fn bump(&mut self, c: char) {
        self.rest = &self.rest[c.len_utf8()..];
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
    }

    /// Consumes characters while `keep` holds and returns the consumed text.
    fn take_while(&mut self, keep: impl Fn(char) -> bool) -> &'src str {
        let start = self.rest;
        while let Some(c) = self.rest.chars().next() {
            if !keep(c) {
                break;
            }
            self.bump(c);
        }
        &start[..start.len() - self.rest.len()]
    }
}

impl<'src> Iterator for Lexer<'src> {
    type Item = (Token<'src>, Pos);

    fn next(&mut self) -> Option<Self::Item> {
        self.take_while(char::is_whitespace);
        let c = self.rest.chars().next()?;
        let pos = Pos::new(self.line, self.column);
        let token = if c == '#' {
            self.bump(c);
            Token::Comment(self.take_while(|c| c != '\n'))
        } else {
            let text = self.take_while(|c| !c.is_whitespace() && c != '#');
            // i32 parsing accepts exactly an optional sign followed by
            // digits, which is also the literal syntax. Everything else,
            // including out-of-range digit runs, stays a word.
            match text.parse::<i32>() {
                Ok(value) => Token::Integer(value),
                Err(_) => Token::Word(text),
            }
        };
        Some((token, pos))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(source: &str) -> Vec<Token<'_>> {
        Lexer::new(source).map(|(token, _)| token).collect()
    }

    #[test]
    fn splits_on_whitespace() {
        assert_eq!(
            tokens("1 2\t+\nprintln"),
            vec![
                Token::Integer(1),
                Token::Integer(2),
                Token::Word("+"),
                Token::Word("println"),
            ],
        );
    }

    #[test]
    fn signs_are_part_of_literals() {
        assert_eq!(tokens("-5 +5"), vec![Token::Integer(-5), Token::Integer(5)]);
    }

    #[test]
    fn numeric_looking_words_stay_words() {
        assert_eq!(
            tokens("1+ 5x 1.5"),
            vec![Token::Word("1+"), Token::Word("5x"), Token::Word("1.5")],
        );
    }

    #[test]
    fn out_of_range_digit_runs_are_words() {
        assert_eq!(
            tokens("2147483647 2147483648 -2147483648 -2147483649"),
            vec![
                Token::Integer(i32::MAX),
                Token::Word("2147483648"),
                Token::Integer(i32::MIN),
                Token::Word("-2147483649"),
            ],
        );
    }

    #[test]
    fn comments_run_to_end_of_line() {
        assert_eq!(
            tokens("1 # one\n2"),
            vec![Token::Integer(1), Token::Comment(" one"), Token::Integer(2)],
        );
    }

    #[test]
    fn hash_terminates_a_word() {
        assert_eq!(tokens("foo#bar"), vec![Token::Word("foo"), Token::Comment("bar")]);
    }

    #[test]
    fn non_ascii_words() {
        assert_eq!(tokens("ß +🤡"), vec![Token::Word("ß"), Token::Word("+🤡")]);
    }

    #[test]
    fn positions_are_one_indexed_characters() {
        let positions: Vec<(u32, u32)> =
            Lexer::new("1 2\n  +\nß dup").map(|(_, pos)| (pos.line, pos.column)).collect();
        assert_eq!(positions, vec![(1, 1), (1, 3), (2, 3), (3, 1), (3, 3)]);
    }

    #[test]
    fn rejects_invalid_utf8() {
        assert_eq!(lex(b"1 \xff 2").unwrap_err(), LexError::InvalidUtf8 { offset: 2 });
    }

    #[test]
    fn empty_input_has_no_tokens() {
        assert_eq!(tokens(""), vec![]);
        assert_eq!(tokens(" \n\t "), vec![]);
    }
}
