use std::io::{self, Write};

use crate::machine::{Memory, Registers};

const SEPARATOR: &str = "==============";

/// The machine state right after one step
#[derive(Debug, Clone, Copy)]
pub struct Step<'a> {
  /// Program slot that was executed
  pub counter: usize,
  /// Steps executed so far, including this one
  pub operations: u64,
  pub text: &'a str,
  pub name: &'a str,
  pub memory: &'a Memory,
  pub registers: &'a Registers,
}

/// Somewhere to send a record of every executed step
pub trait Tracer {
  fn record(&mut self, step: &Step<'_>) -> io::Result<()>;
}

impl<T> Tracer for &mut T
where
  T: Tracer + ?Sized,
{
  fn record(&mut self, step: &Step<'_>) -> io::Result<()> {
    (**self).record(step)
  }
}

/// Writes a human readable block per step
pub struct TextTracer<W> {
  out: W,
}

impl<W> TextTracer<W>
where
  W: Write,
{
  pub fn new(out: W) -> Self {
    Self { out }
  }

  pub fn into_inner(self) -> W {
    self.out
  }
}

impl<W> Tracer for TextTracer<W>
where
  W: Write,
{
  fn record(&mut self, step: &Step<'_>) -> io::Result<()> {
    writeln!(self.out, "{SEPARATOR}")?;
    writeln!(self.out, "Instruction Counter: {}", step.counter)?;
    writeln!(self.out, "Operations: {}", step.operations)?;
    writeln!(self.out, "Line: {}", step.text)?;
    writeln!(self.out, "Type: {}", step.name)?;
    writeln!(self.out, "Memory: {}", step.memory)?;
    writeln!(self.out, "Registers: {}", step.registers)
  }
}

/// Discards every step
#[derive(Debug, Default, Clone, Copy)]
pub struct Silent;

impl Tracer for Silent {
  fn record(&mut self, _: &Step<'_>) -> io::Result<()> {
    Ok(())
  }
}
