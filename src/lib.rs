//! Interpreter for the AQA teaching assembly language
//!
//! A program is a JSON memory image followed by one instruction per line:
//!
//! ```text
//! [1, 2, 3]
//! MOV R0, #5
//! LDR R1, 0
//! ADD R2, R0, R1
//! HALT
//! ```
//!
//! Every line is matched against the [instruction table](isa) when the
//! program is loaded, labels are resolved, and then the [`vm::Vm`] runs it
//! one slot at a time, handing a [`trace::Step`] to a [`trace::Tracer`]
//! after each one.

pub mod error;
pub mod grammar;
pub mod isa;
pub mod machine;
pub mod program;
pub mod trace;
pub mod vm;

use std::path::Path;

pub use error::{Error, Result};
pub use program::Program;
pub use vm::{Outcome, RunOptions, Vm};

use trace::Tracer;

/// Parse `source` and run it to completion
pub fn run_source<T>(source: &str, options: RunOptions, tracer: &mut T) -> Result<Outcome>
where
  T: Tracer + ?Sized,
{
  let program = Program::parse(source)?;
  Vm::new(&program).run(options, tracer)
}

/// Load the program at `path` and run it to completion
pub fn run_file<T>(path: impl AsRef<Path>, options: RunOptions, tracer: &mut T) -> Result<Outcome>
where
  T: Tracer + ?Sized,
{
  let program = Program::load(path)?;
  Vm::new(&program).run(options, tracer)
}
