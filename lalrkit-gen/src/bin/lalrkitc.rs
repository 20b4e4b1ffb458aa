#[cfg(feature = "cli")]
mod real {
    use clap::Parser;
    use lalrkit::codec::encode_state_machines;
    use lalrkit::StderrSink;
    use lalrkit_gen::Grammar;
    use std::path::PathBuf;

    #[derive(Parser)]
    #[command(about = "Compile a grammar into lalrkit state-machine tables")]
    struct Args {
        /// Path to the input grammar file
        #[arg(short = 'g', long)]
        grammar: PathBuf,

        /// Path to write the serialized tables
        #[arg(short = 'o', long)]
        output: PathBuf,

        /// Also write a human-readable dump of productions, FIRST/FOLLOW,
        /// and the canonical collection
        #[arg(short = 'd', long)]
        dump: Option<PathBuf>,
    }

    pub fn main() -> anyhow::Result<()> {
        let args = Args::parse();
        let source = std::fs::read_to_string(&args.grammar)?;
        let mut sink = StderrSink;
        let mut grammar = Grammar::parse(&source)?;
        let machines = lalrkit_gen::generate(&mut grammar, &mut sink)?;
        let bytes = encode_state_machines(&machines.parser, &machines.lexer, &machines.whitespace);
        std::fs::write(&args.output, bytes)?;
        if let Some(path) = args.dump {
            let mut out = std::fs::File::create(path)?;
            lalrkit_gen::describe(&mut out, &grammar)?;
        }
        Ok(())
    }
}

#[cfg(feature = "cli")]
fn main() -> anyhow::Result<()> {
    env_logger::init();
    real::main()
}

#[cfg(not(feature = "cli"))]
fn main() {
    eprintln!("lalrkitc disabled (compiled without `cli` feature)");
}
