use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::Context;
use clap::{Parser, Subcommand};
use spackel::program::Program;
use spackel::vm::RunResult;
use spackel::{codegen, vm};

/// Run or compile Spackel programs.
#[derive(Parser, Debug)]
#[command()]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a program in the interpreter.
    Run {
        /// File containing a Spackel program.
        #[arg()]
        file: PathBuf,
        /// Print statistics after running the program.
        #[arg(long, short = 's')]
        stats: bool,
    },
    /// Compile a program to a native object file.
    ///
    /// The object exports `main` and becomes an executable once linked
    /// against the Spackel runtime library, e.g.
    /// `cc program.o libspackel_runtime.a -o program`.
    Build {
        /// File containing a Spackel program.
        #[arg()]
        file: PathBuf,
        /// Where to write the object file.
        /// Defaults to the program file with an `.o` extension.
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
        /// Target triple to compile for. Defaults to the host.
        #[arg(long)]
        target: Option<String>,
    },
}

fn load_program(file: &Path) -> anyhow::Result<Program> {
    let source =
        std::fs::read(file).with_context(|| format!("Failed to read {}", file.display()))?;
    Ok(Program::parse(&source)?)
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    match args.command {
        Command::Run { file, stats } => {
            let program = load_program(&file)?;

            let mut out = std::io::BufWriter::new(std::io::stdout().lock());
            let start_time = Instant::now();
            let result = vm::run(&program, &mut out);
            // Flush even when the run failed; output written before the
            // failing instruction still counts.
            let flushed = out.flush();
            let result = result?;
            flushed?;
            let elapsed = start_time.elapsed();

            if stats {
                print_stats(&result, elapsed);
            }
        }
        Command::Build { file, output, target } => {
            let program = load_program(&file)?;
            let out_path = output.unwrap_or_else(|| file.with_extension("o"));
            codegen::compile(&program, target.as_deref(), &out_path)?;
        }
    }

    Ok(())
}

fn print_stats(result: &RunResult, elapsed: Duration) {
    let instructions_per_second = result.instructions_run as f64 / elapsed.as_secs_f64();
    eprintln!("Execution time: {:?}", elapsed);
    eprintln!(
        "Instructions executed: {} ({}/s)",
        result.instructions_run,
        match instructions_per_second {
            n if n >= 1_000_000.0 => format!("{:.1}M", n / 1_000_000.0),
            n if n >= 1_000.0 => format!("{:.1}k", n / 1_000.0),
            n => format!("{:.1}", n),
        }
    );
    eprintln!("Values left on the stack: {}", result.stack.len());
}
