//! Parsing the token stream into macro definitions and instructions.

use thiserror::Error;

use crate::lexer::Token;
use crate::ops::Op;
use crate::pos::Pos;

/// An instruction as written in the source, before macro expansion. A word
/// that is not a built-in operator is a macro call, unresolved until the
/// expander has seen every definition in the file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RawInst {
    Push(i32),
    Builtin(Op),
    Call(String),
}

/// A top-level item of a source file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Item {
    Inst(RawInst, Pos),
    Macro(MacroDef),
}

/// A `macro NAME ... end` definition.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MacroDef {
    pub name: String,
    /// Position of the name token, for definition-site error reports.
    pub name_pos: Pos,
    pub body: Vec<(RawInst, Pos)>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("`end` at {pos} without a matching `macro`")]
    StrayEnd { pos: Pos },
    #[error("Macro `{name}` starting at {pos} is never closed by `end`")]
    UnterminatedMacro { name: String, pos: Pos },
    #[error("`macro` at {pos} inside the body of `{outer}`; definitions cannot be nested")]
    NestedMacro { outer: String, pos: Pos },
    #[error("Expected a name after `macro` at {pos}")]
    MissingMacroName { pos: Pos },
    #[error("`{found}` at {pos} cannot be used as a macro name")]
    InvalidMacroName { found: String, pos: Pos },
}

/// Parses a token stream into items. Comments are dropped here, words are
/// classified as built-ins or calls, and the `macro`/`end` structure is
/// checked. Whether a call refers to anything is the expander's concern.
pub fn parse<'src>(
    mut tokens: impl Iterator<Item = (Token<'src>, Pos)>,
) -> Result<Vec<Item>, ParseError> {
    let mut items = Vec::new();
    // The currently open definition and the position of its `macro` keyword.
    let mut open: Option<(MacroDef, Pos)> = None;

    while let Some((token, pos)) = tokens.next() {
        let inst = match token {
            Token::Comment(_) => continue,
            Token::Integer(value) => RawInst::Push(value),
            Token::Word("end") => match open.take() {
                Some((def, _)) => {
                    items.push(Item::Macro(def));
                    continue;
                }
                None => return Err(ParseError::StrayEnd { pos }),
            },
            Token::Word("macro") => {
                if let Some((def, _)) = &open {
                    return Err(ParseError::NestedMacro { outer: def.name.clone(), pos });
                }
                let (name, name_pos) = match next_significant(&mut tokens) {
                    Some((Token::Word(name), name_pos)) if name != "macro" && name != "end" => {
                        (name.to_owned(), name_pos)
                    }
                    Some((Token::Word(found), found_pos)) => {
                        return Err(ParseError::InvalidMacroName {
                            found: found.to_owned(),
                            pos: found_pos,
                        })
                    }
                    Some((Token::Integer(value), found_pos)) => {
                        return Err(ParseError::InvalidMacroName {
                            found: value.to_string(),
                            pos: found_pos,
                        })
                    }
                    Some((Token::Comment(_), _)) | None => {
                        return Err(ParseError::MissingMacroName { pos })
                    }
                };
                open = Some((MacroDef { name, name_pos, body: Vec::new() }, pos));
                continue;
            }
            Token::Word(word) => match Op::from_word(word) {
                Some(op) => RawInst::Builtin(op),
                None => RawInst::Call(word.to_owned()),
            },
        };

        match &mut open {
            Some((def, _)) => def.body.push((inst, pos)),
            None => items.push(Item::Inst(inst, pos)),
        }
    }

    if let Some((def, pos)) = open {
        return Err(ParseError::UnterminatedMacro { name: def.name, pos });
    }

    Ok(items)
}

/// The next non-comment token, if any.
fn next_significant<'src>(
    tokens: &mut impl Iterator<Item = (Token<'src>, Pos)>,
) -> Option<(Token<'src>, Pos)> {
    tokens.find(|(token, _)| !matches!(token, Token::Comment(_)))
}
