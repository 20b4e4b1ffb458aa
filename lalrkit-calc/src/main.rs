//! Command-line interface for the lalrkit calculator.
//!
//! `eval` evaluates one expression given on the command line; `parse`
//! evaluates each non-empty line of a file.

use anyhow::Context;
use clap::{Parser as ClapParser, Subcommand};
use lalrkit_calc::Calculator;

#[derive(ClapParser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Command
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Evaluate a single expression
    Eval {
        /// The expression, e.g. "1 + 2 * (3 + 4)"
        expression: String,
    },
    /// Evaluate every non-empty line of a file
    Parse {
        /// Input file with one expression per line
        #[arg(short, long)]
        input: String,
    },
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let args = Args::parse();
    let calc = Calculator::new()?;

    match args.command {
        Commands::Eval { expression } => {
            let value = calc.evaluate(&expression)?;
            println!("{value}");
        }
        Commands::Parse { input } => {
            let text = std::fs::read_to_string(&input)
                .with_context(|| format!("can't open {input:?}"))?;
            for line in text.lines().filter(|l| !l.trim().is_empty()) {
                match calc.evaluate(line) {
                    Ok(value) => println!("{line} = {value}"),
                    Err(err) => eprintln!("{line}: {err}"),
                }
            }
        }
    }
    Ok(())
}
