use anyhow::Context;
use clap::Parser;
use log::info;
use std::path::PathBuf;
use std::process;

/// Compiler for a small Arabic-keyword procedural language.
#[derive(Parser)]
#[command(name = "arabc")]
#[command(about = "Translate Arabic-keyword source to three-address IR and x86 assembly")]
struct Cli {
    /// Source file to compile
    input: PathBuf,

    /// Dump the token sequence
    #[arg(long)]
    tokens: bool,

    /// Dump the syntax tree
    #[arg(long)]
    ast: bool,

    /// Dump the three-address intermediate code
    #[arg(long)]
    ir: bool,

    /// Write the assembly to a file instead of stdout
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let src = std::fs::read_to_string(&cli.input)
        .with_context(|| format!("failed to read {}", cli.input.display()))?;

    let compilation = match arabc::compile(&src) {
        Ok(compilation) => compilation,
        Err(err) => {
            eprintln!("{}", err.display(&src));
            process::exit(1);
        }
    };
    info!("compiled {}", cli.input.display());

    if cli.tokens {
        println!("--- tokens ---");
        for token in &compilation.tokens {
            println!("{:?} at {}", token.kind, token.span);
        }
    }
    if cli.ast {
        println!("--- syntax tree ---");
        println!("{:#?}", compilation.program);
    }
    if cli.ir {
        println!("--- intermediate code ---");
        print!("{}", compilation.render_ir());
    }

    match &cli.output {
        Some(path) => {
            std::fs::write(path, &compilation.assembly)
                .with_context(|| format!("failed to write {}", path.display()))?;
            info!("wrote {}", path.display());
        }
        None => print!("{}", compilation.assembly),
    }

    Ok(())
}
