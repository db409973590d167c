//! Macro expansion: from parsed items to a flat program.
//!
//! Definitions are file-scoped and may appear after their uses. Every
//! definition is validated even if nothing calls it, so a broken dead macro
//! is still an error.

use rustc_hash::{FxHashMap, FxHashSet};
use thiserror::Error;

use crate::ops::Op;
use crate::parser::{Item, MacroDef, RawInst};
use crate::pos::Pos;
use crate::program::{Instruction, Program};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MacroError {
    #[error("Macro `{name}` is defined twice (second definition at {pos})")]
    DuplicateMacro { name: String, pos: Pos },
    #[error("Macro `{name}` at {pos} would shadow the built-in operator of the same name")]
    ShadowsBuiltin { name: String, pos: Pos },
    #[error("Macro `{name}` expands into itself (via the call at {pos})")]
    MacroCycle { name: String, pos: Pos },
    #[error("Unknown instruction `{word}` at {pos}")]
    UnknownInstruction { word: String, pos: Pos },
}

/// Inlines every macro call, producing the flat program.
pub fn expand(items: Vec<Item>) -> Result<Program, MacroError> {
    let mut table: FxHashMap<String, MacroDef> = FxHashMap::default();
    // Definition order, so validation reports errors deterministically.
    let mut order: Vec<String> = Vec::new();
    let mut top_level: Vec<(RawInst, Pos)> = Vec::new();

    for item in items {
        match item {
            Item::Macro(def) => {
                if Op::from_word(&def.name).is_some() {
                    return Err(MacroError::ShadowsBuiltin {
                        name: def.name,
                        pos: def.name_pos,
                    });
                }
                if table.contains_key(&def.name) {
                    return Err(MacroError::DuplicateMacro {
                        name: def.name,
                        pos: def.name_pos,
                    });
                }
                order.push(def.name.clone());
                table.insert(def.name.clone(), def);
            }
            Item::Inst(inst, pos) => top_level.push((inst, pos)),
        }
    }

    let mut expander = Expander {
        table,
        expanded: FxHashMap::default(),
        in_progress: FxHashSet::default(),
    };

    for name in &order {
        expander.expand_macro(name)?;
    }

    let mut instructions = Vec::new();
    expander.expand_into(&top_level, &mut instructions)?;
    Ok(Program { instructions })
}

struct Expander {
    table: FxHashMap<String, MacroDef>,
    /// Fully flattened bodies, memoized per macro.
    expanded: FxHashMap<String, Vec<(Instruction, Pos)>>,
    /// Macros whose flattening is on the call stack. Reaching one again
    /// means its body expands into itself.
    in_progress: FxHashSet<String>,
}

impl Expander {
    fn expand_macro(&mut self, name: &str) -> Result<(), MacroError> {
        if self.expanded.contains_key(name) {
            return Ok(());
        }
        self.in_progress.insert(name.to_owned());
        // The body is cloned so flattening may borrow the expander mutably.
        let body = self.table[name].body.clone();
        let mut flat = Vec::new();
        self.expand_into(&body, &mut flat)?;
        self.in_progress.remove(name);
        self.expanded.insert(name.to_owned(), flat);
        Ok(())
    }

    fn expand_into(
        &mut self,
        body: &[(RawInst, Pos)],
        out: &mut Vec<(Instruction, Pos)>,
    ) -> Result<(), MacroError> {
        for (inst, pos) in body {
            match inst {
                RawInst::Push(value) => out.push((Instruction::Push(*value), *pos)),
                RawInst::Builtin(op) => out.push((Instruction::Op(*op), *pos)),
                RawInst::Call(name) => {
                    if !self.table.contains_key(name) {
                        return Err(MacroError::UnknownInstruction {
                            word: name.clone(),
                            pos: *pos,
                        });
                    }
                    if self.in_progress.contains(name) {
                        return Err(MacroError::MacroCycle { name: name.clone(), pos: *pos });
                    }
                    self.expand_macro(name)?;
                    out.extend_from_slice(&self.expanded[name]);
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Lexer;
    use crate::parser;

    fn expand_str(source: &str) -> Result<Program, MacroError> {
        expand(parser::parse(Lexer::new(source)).unwrap())
    }

    fn instructions(source: &str) -> Vec<Instruction> {
        expand_str(source)
            .unwrap()
            .instructions
            .into_iter()
            .map(|(inst, _)| inst)
            .collect()
    }

    #[test]
    fn macro_bodies_are_inlined_at_each_call_site() {
        assert_eq!(
            instructions("macro double dup + end 21 double double"),
            vec![
                Instruction::Push(21),
                Instruction::Op(Op::Dup),
                Instruction::Op(Op::Add),
                Instruction::Op(Op::Dup),
                Instruction::Op(Op::Add),
            ],
        );
    }

    #[test]
    fn macros_may_be_used_before_their_definition() {
        assert_eq!(
            instructions("four macro four two two + end macro two 2 end"),
            vec![Instruction::Push(2), Instruction::Push(2), Instruction::Op(Op::Add)],
        );
    }

    #[test]
    fn inlined_instructions_keep_their_definition_positions() {
        let program = expand_str("macro two\n2\nend\ntwo two").unwrap();
        let positions: Vec<Pos> = program.instructions.iter().map(|&(_, pos)| pos).collect();
        assert_eq!(positions, vec![Pos::new(2, 1), Pos::new(2, 1)]);
    }

    #[test]
    fn duplicate_definitions_are_rejected() {
        assert_eq!(
            expand_str("macro a 1 end macro a 2 end"),
            Err(MacroError::DuplicateMacro { name: "a".to_owned(), pos: Pos::new(1, 21) }),
        );
    }

    #[test]
    fn builtin_names_cannot_be_redefined() {
        assert_eq!(
            expand_str("macro dup dup dup end"),
            Err(MacroError::ShadowsBuiltin { name: "dup".to_owned(), pos: Pos::new(1, 7) }),
        );
        assert!(matches!(
            expand_str("macro +🤡 1 end"),
            Err(MacroError::ShadowsBuiltin { .. }),
        ));
    }

    #[test]
    fn self_recursive_macros_are_rejected() {
        assert_eq!(
            expand_str("macro loop 1 loop end loop"),
            Err(MacroError::MacroCycle { name: "loop".to_owned(), pos: Pos::new(1, 14) }),
        );
    }

    #[test]
    fn mutually_recursive_macros_are_rejected() {
        assert!(matches!(
            expand_str("macro a b end macro b a end 1"),
            Err(MacroError::MacroCycle { .. }),
        ));
    }

    #[test]
    fn diamond_shaped_reuse_is_not_a_cycle() {
        assert_eq!(
            instructions("macro two 2 end macro four two two + end four four *"),
            vec![
                Instruction::Push(2),
                Instruction::Push(2),
                Instruction::Op(Op::Add),
                Instruction::Push(2),
                Instruction::Push(2),
                Instruction::Op(Op::Add),
                Instruction::Op(Op::Mul),
            ],
        );
    }

    #[test]
    fn unused_broken_macros_are_still_errors() {
        assert!(matches!(
            expand_str("macro unused unused end 1 println"),
            Err(MacroError::MacroCycle { .. }),
        ));
        assert!(matches!(
            expand_str("macro unused zzz end 1 println"),
            Err(MacroError::UnknownInstruction { .. }),
        ));
    }

    #[test]
    fn unknown_words_are_reported_with_position() {
        assert_eq!(
            expand_str("1 2\nfrobnicate"),
            Err(MacroError::UnknownInstruction {
                word: "frobnicate".to_owned(),
                pos: Pos::new(2, 1),
            }),
        );
    }

    #[test]
    fn empty_source_expands_to_an_empty_program() {
        assert!(instructions("# nothing but a comment").is_empty());
    }
}
