use std::io;
use std::path::PathBuf;

use anyhow::Context;
use aqa::trace::{Silent, TextTracer};
use aqa::{Program, RunOptions, Vm};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Run an AQA assembly program, tracing every step")]
struct Args {
  /// Program source: a JSON memory image, then one instruction per line
  path: PathBuf,

  /// Stop with an error after this many steps
  #[arg(long, value_name = "N")]
  max_steps: Option<u64>,

  /// Do not print the per-step trace
  #[arg(short, long)]
  quiet: bool,
}

fn main() -> anyhow::Result<()> {
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(io::stderr)
    .init();

  let args = Args::parse();
  let program = Program::load(&args.path)
    .with_context(|| format!("failed to load `{}`", args.path.display()))?;
  let options = RunOptions {
    max_steps: args.max_steps,
  };

  let mut vm = Vm::new(&program);
  let result = if args.quiet {
    vm.run(options, &mut Silent)
  } else {
    let stdout = io::stdout();
    vm.run(options, &mut TextTracer::new(stdout.lock()))
  };
  let outcome = result.with_context(|| format!("failed to run `{}`", args.path.display()))?;

  info!(
    state = ?outcome.state,
    operations = outcome.operations,
    memory = %vm.machine().memory,
    registers = %vm.machine().registers,
    "final state"
  );
  Ok(())
}
