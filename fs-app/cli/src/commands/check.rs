//! Check command implementation
//!
//! Decodes every record of an operation log the same way `replay` does,
//! without mounting or touching any filesystem.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Args;
use crashreplay::tokenizer::{tokenize, LOG_DELIMITERS};
use crashreplay::Operation;
use log::{debug, info};

#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Operation log to check
    pub log: PathBuf,

    /// Print every decoded operation
    #[arg(short, long)]
    pub print: bool,

    /// Treat unrecognized operation names as errors
    #[arg(long)]
    pub strict: bool,
}

pub fn run(args: CheckArgs) -> Result<()> {
    info!("Checking {}", args.log.display());

    let file = File::open(&args.log)
        .with_context(|| format!("Failed to open operation log: {}", args.log.display()))?;
    let reader = BufReader::new(file);

    let mut seq = 0u64;
    let mut unrecognized = 0u64;

    for (lineno, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("Failed to read line {}", lineno + 1))?;
        if line.trim().is_empty() {
            continue;
        }

        let fields = tokenize(&line, LOG_DELIMITERS)?;
        let op = Operation::parse(&fields)
            .with_context(|| format!("seq={} (line {}): {:?}", seq, lineno + 1, line))?;

        if let Operation::Unrecognized { name } = &op {
            if args.strict {
                bail!("seq={} (line {}): unrecognized operation {:?}", seq, lineno + 1, name);
            }
            unrecognized += 1;
        }
        debug!("seq={} decoded {:?}", seq, op);
        if args.print {
            println!("seq={} {}", seq, op);
        }
        seq += 1;
    }

    println!("✓ {} records decoded ({} unrecognized)", seq, unrecognized);
    Ok(())
}
