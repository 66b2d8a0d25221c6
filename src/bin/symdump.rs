//! Command-line driver: dump one binary's debugging metadata as a text
//! symbol file.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;

use symdump::{write_symbol_file, DumpOptions, SymbolData};

#[derive(Parser, Debug)]
#[command(name = "symdump", version, about = "Dump debugging metadata from ELF and PE binaries as a text symbol file")]
struct Args {
    /// Object file to read (ELF or PE)
    object_file: PathBuf,

    /// Write the symbol file here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Directory to search for a .gnu_debuglink companion file (repeatable)
    #[arg(long = "debug-dir")]
    debug_dirs: Vec<PathBuf>,

    /// Emit only STACK CFI records
    #[arg(long, conflicts_with = "no_cfi")]
    only_cfi: bool,

    /// Omit STACK CFI records
    #[arg(long)]
    no_cfi: bool,

    /// Do not resolve references between compilation units
    #[arg(long)]
    no_inter_cu_refs: bool,
}

fn main() -> anyhow::Result<()> {
    symdump::logging::init_tracing();
    let args = Args::parse();

    let options = DumpOptions {
        symbol_data: if args.only_cfi {
            SymbolData::OnlyCfi
        } else if args.no_cfi {
            SymbolData::NoCfi
        } else {
            SymbolData::All
        },
        handle_inter_cu_refs: !args.no_inter_cu_refs,
    };

    let mut out: BufWriter<Box<dyn Write>> = match &args.output {
        Some(path) => BufWriter::new(Box::new(
            File::create(path)
                .with_context(|| format!("cannot create {}", path.display()))?,
        )),
        None => BufWriter::new(Box::new(io::stdout())),
    };

    write_symbol_file(&args.object_file, &args.debug_dirs, &options, &mut out)
        .with_context(|| format!("failed to dump {}", args.object_file.display()))?;
    out.flush()?;

    Ok(())
}
