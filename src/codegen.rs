//! Compiling Spackel programs to native object files.
//!
//! The value stack lives in a stack slot of the generated entry function.
//! Programs are straight-line, so the stack depth before every instruction
//! is known at compile time and values are addressed with constant offsets.
//! An instruction that can never have enough operands is compiled to a trap
//! instead; the output written up to that point still happens.
//!
//! `/` and `%` keep their checked semantics by delegating the zero-divisor
//! case to the target's division trap. The divisor -1 gets an inline branch
//! so that `i32::MIN / -1` wraps like every other operator instead of
//! faulting in hardware.
//!
//! IO compiles to calls into the runtime library (`spkl_print_i32`,
//! `spkl_println_i32` and `spkl_print_char`), left as undefined imports in
//! the emitted object.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use cranelift::prelude::{
    codegen::{
        self,
        ir::{Function, StackSlot, TrapCode, UserFuncName},
        Context,
    },
    isa, settings,
    types::I32,
    AbiParam, Configurable, FunctionBuilder, FunctionBuilderContext, InstBuilder, IntCC,
    Signature, StackSlotData, StackSlotKind, Value,
};
use cranelift_module::{FuncId, Linkage, Module};
use cranelift_object::{ObjectBuilder, ObjectModule};
use rustc_hash::FxHashMap;
use target_lexicon::Triple;
use thiserror::Error;

use crate::ops::{Op, SILLY_ADD_OVERRIDES};
use crate::program::{Instruction, Program};


/// Trap emitted in place of an instruction that would pop from an empty
/// stack.
const TRAP_STACK_UNDERFLOW: TrapCode = TrapCode::User(1);

/// Each stack value is an `I32`.
const VALUE_BYTES: usize = 4;

#[derive(Debug, Error)]
pub enum CompileError {
    #[error("Invalid target triple `{triple}`: {message}")]
    InvalidTarget { triple: String, message: String },
    #[error("Unsupported target `{triple}`: {source}")]
    UnsupportedTarget {
        triple: String,
        #[source]
        source: isa::LookupError,
    },
    #[error("Code generation is not supported on this host: {0}")]
    UnsupportedHost(&'static str),
    #[error("Invalid code generation settings: {0}")]
    Settings(#[from] settings::SetError),
    #[error("Code generation failed: {0}")]
    Codegen(#[from] codegen::CodegenError),
    #[error("Object module error: {0}")]
    Module(#[from] cranelift_module::ModuleError),
    #[error("Emitting the object file failed: {0}")]
    Emit(String),
    #[error("Failed to write `{path}`: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Compiles a program and writes a relocatable object file to `out_path`.
/// The object exports `main` and must be linked against the Spackel runtime
/// library to become an executable.
pub fn compile(
    program: &Program,
    target_triple: Option<&str>,
    out_path: &Path,
) -> Result<(), CompileError> {
    let bytes = compile_to_bytes(program, target_triple)?;
    std::fs::write(out_path, bytes)
        .map_err(|source| CompileError::Io { path: out_path.to_owned(), source })
}

/// Compiles a program into the bytes of a relocatable object file, for the
/// given target triple or for the host.
pub fn compile_to_bytes(
    program: &Program,
    target_triple: Option<&str>,
) -> Result<Vec<u8>, CompileError> {
    let mut shared_builder = settings::builder();
    shared_builder.enable("is_pic")?;
    shared_builder.set("opt_level", "speed_and_size")?;
    let shared_flags = settings::Flags::new(shared_builder);

    let isa = match target_triple {
        Some(name) => {
            let triple = Triple::from_str(name).map_err(|e| CompileError::InvalidTarget {
                triple: name.to_owned(),
                message: e.to_string(),
            })?;
            isa::lookup(triple)
                .map_err(|source| CompileError::UnsupportedTarget {
                    triple: name.to_owned(),
                    source,
                })?
                .finish(shared_flags)?
        }
        None => cranelift_native::builder()
            .map_err(CompileError::UnsupportedHost)?
            .finish(shared_flags)?,
    };

    let object_builder =
        ObjectBuilder::new(isa.clone(), "spackel", cranelift_module::default_libcall_names())?;

    let mut compiler = Compiler {
        call_conv: isa.default_call_conv(),
        module: ObjectModule::new(object_builder),
        runtime_functions: FxHashMap::default(),
    };
    compiler.compile_main(program)?;

    compiler.module.finish().emit().map_err(|e| CompileError::Emit(e.to_string()))
}

struct Compiler {
    call_conv: isa::CallConv,
    module: ObjectModule,
    /// Runtime IO functions, declared lazily on first call.
    runtime_functions: FxHashMap<&'static str, FuncId>,
}

impl Compiler {
    fn compile_main(&mut self, program: &Program) -> Result<(), CompileError> {
        let signature = Signature {
            params: Vec::new(),
            returns: vec![AbiParam::new(I32)],
            call_conv: self.call_conv,
        };
        let main_id = self.module.declare_function("main", Linkage::Export, &signature)?;

        let mut ctx = Context::new();
        ctx.func = Function::with_name_signature(UserFuncName::default(), signature);
        let mut func_ctx = FunctionBuilderContext::new();
        let mut fb = FunctionBuilder::new(&mut ctx.func, &mut func_ctx);

        let block = fb.create_block();
        fb.append_block_params_for_function_params(block);
        fb.switch_to_block(block);
        fb.seal_block(block);

        let slot = fb.create_sized_stack_slot(StackSlotData {
            kind: StackSlotKind::ExplicitSlot,
            size: slot_size(program),
        });

        let mut depth = 0;
        let mut trapped = false;
        for &(instruction, _) in &program.instructions {
            match instruction {
                Instruction::Push(value) => {
                    let pushed = fb.ins().iconst(I32, i64::from(value));
                    store_at(&mut fb, slot, depth, pushed);
                    depth += 1;
                }
                Instruction::Op(op) => {
                    if depth < op.arity() {
                        // This instruction can never have enough operands.
                        // Everything before it has already run and produced
                        // its output; the program ends here in a trap.
                        fb.ins().trap(TRAP_STACK_UNDERFLOW);
                        trapped = true;
                        break;
                    }
                    depth = self.compile_op(op, depth, slot, &mut fb)?;
                }
            }
        }

        if !trapped {
            let exit_code = fb.ins().iconst(I32, 0);
            fb.ins().return_(&[exit_code]);
        }

        fb.finalize();

        if std::env::var_os("SPACKEL_DUMP_CLIF").is_some() {
            eprintln!("{}", ctx.func.display());
        }

        self.module.define_function(main_id, &mut ctx)?;
        Ok(())
    }

    /// Emits one operator at a known stack depth and returns the new depth.
    /// The caller has already checked `depth >= op.arity()`.
    fn compile_op(
        &mut self,
        op: Op,
        depth: usize,
        slot: StackSlot,
        fb: &mut FunctionBuilder,
    ) -> Result<usize, CompileError> {
        if let Some(shuffle) = op.shuffle() {
            let popped: Vec<Value> =
                (0..shuffle.arity).map(|i| load_at(fb, slot, depth - 1 - i)).collect();
            let base = depth - shuffle.arity;
            for (i, &source) in shuffle.pushes.iter().enumerate() {
                store_at(fb, slot, base + i, popped[source]);
            }
            return Ok(base + shuffle.pushes.len());
        }

        match op {
            Op::Add | Op::Sub | Op::Mul | Op::SillyAdd => {
                let b = load_at(fb, slot, depth - 1);
                let a = load_at(fb, slot, depth - 2);
                let result = match op {
                    Op::Add => fb.ins().iadd(a, b),
                    Op::Sub => fb.ins().isub(a, b),
                    Op::Mul => fb.ins().imul(a, b),
                    _ => silly_add(fb, a, b),
                };
                store_at(fb, slot, depth - 2, result);
                Ok(depth - 1)
            }
            Op::Div | Op::Rem => {
                let b = load_at(fb, slot, depth - 1);
                let a = load_at(fb, slot, depth - 2);
                let result = division(fb, op, a, b);
                store_at(fb, slot, depth - 2, result);
                Ok(depth - 1)
            }
            Op::SharpS => {
                let pushed = fb.ins().iconst(I32, 1945);
                store_at(fb, slot, depth, pushed);
                Ok(depth + 1)
            }
            Op::Print => {
                let top = load_at(fb, slot, depth - 1);
                self.call_runtime("spkl_print_i32", top, fb)?;
                Ok(depth - 1)
            }
            Op::Println => {
                let top = load_at(fb, slot, depth - 1);
                self.call_runtime("spkl_println_i32", top, fb)?;
                Ok(depth - 1)
            }
            Op::PrintChar => {
                let top = load_at(fb, slot, depth - 1);
                self.call_runtime("spkl_print_char", top, fb)?;
                Ok(depth - 1)
            }
            Op::Drop | Op::Dup | Op::Swap | Op::Over | Op::Nip | Op::Tuck => {
                unreachable!("handled as shuffles")
            }
        }
    }

    /// Emits a call to a runtime IO function taking one `I32` argument.
    fn call_runtime(
        &mut self,
        name: &'static str,
        arg: Value,
        fb: &mut FunctionBuilder,
    ) -> Result<(), CompileError> {
        let func_id = match self.runtime_functions.get(name) {
            Some(&func_id) => func_id,
            None => {
                let signature = Signature {
                    params: vec![AbiParam::new(I32)],
                    returns: Vec::new(),
                    call_conv: self.call_conv,
                };
                let func_id = self.module.declare_function(name, Linkage::Import, &signature)?;
                self.runtime_functions.insert(name, func_id);
                func_id
            }
        };
        let func_ref = self.module.declare_func_in_func(func_id, fb.func);
        fb.ins().call(func_ref, &[arg]);
        Ok(())
    }
}

/// Size in bytes of the stack slot: the peak depth the program reaches, and
/// at least one value so the slot is never zero-sized. Simulation stops where
/// the program statically underflows, which is also where emission stops.
fn slot_size(program: &Program) -> u32 {
    let mut depth = 0;
    let mut max_depth = 1;
    for &(instruction, _) in &program.instructions {
        match instruction {
            Instruction::Push(_) => depth += 1,
            Instruction::Op(op) => {
                if depth < op.arity() {
                    break;
                }
                depth = depth - op.arity() + op.results();
            }
        }
        max_depth = max_depth.max(depth);
    }
    (max_depth * VALUE_BYTES) as u32
}

fn load_at(fb: &mut FunctionBuilder, slot: StackSlot, index: usize) -> Value {
    fb.ins().stack_load(I32, slot, (index * VALUE_BYTES) as i32)
}

fn store_at(fb: &mut FunctionBuilder, slot: StackSlot, index: usize, value: Value) {
    fb.ins().stack_store(value, slot, (index * VALUE_BYTES) as i32);
}

/// Folds the override table into a chain of selects over the plain sum.
fn silly_add(fb: &mut FunctionBuilder, a: Value, b: Value) -> Value {
    let mut result = fb.ins().iadd(a, b);
    for ((x, y), special) in SILLY_ADD_OVERRIDES {
        let a_matches = fb.ins().icmp_imm(IntCC::Equal, a, i64::from(x));
        let b_matches = fb.ins().icmp_imm(IntCC::Equal, b, i64::from(y));
        let both = fb.ins().band(a_matches, b_matches);
        let special = fb.ins().iconst(I32, i64::from(special));
        result = fb.ins().select(both, special, result);
    }
    result
}

/// `sdiv` and `srem` trap on a zero divisor, which is the wanted behavior,
/// but they would also trap on `i32::MIN / -1`. That case has to wrap, so
/// the divisor -1 branches to a path that avoids dividing: `a / -1` is the
/// negation of `a` and `a % -1` is zero.
fn division(fb: &mut FunctionBuilder, op: Op, a: Value, b: Value) -> Value {
    let minus_one_block = fb.create_block();
    let divide_block = fb.create_block();
    let join_block = fb.create_block();
    let result = fb.append_block_param(join_block, I32);

    let is_minus_one = fb.ins().icmp_imm(IntCC::Equal, b, -1);
    fb.ins().brif(is_minus_one, minus_one_block, &[], divide_block, &[]);
    fb.seal_block(minus_one_block);
    fb.seal_block(divide_block);

    fb.switch_to_block(minus_one_block);
    let wrapped = match op {
        Op::Div => fb.ins().ineg(a),
        _ => fb.ins().iconst(I32, 0),
    };
    fb.ins().jump(join_block, &[wrapped]);

    fb.switch_to_block(divide_block);
    let divided = match op {
        Op::Div => fb.ins().sdiv(a, b),
        _ => fb.ins().srem(a, b),
    };
    fb.ins().jump(join_block, &[divided]);

    fb.seal_block(join_block);
    fb.switch_to_block(join_block);
    result
}
