//! The instruction table
//!
//! | Name                     | Assembly                     | Semantics/RTL                 |
//! |--------------------------|------------------------------|-------------------------------|
//! | Load to register         | `LDR Rd, m`                  | `r[d] ← m[m]`                 |
//! | Store to memory          | `STR Rs, m`                  | `m[m] ← r[s]`                 |
//! | Add                      | `ADD Rd, Rn, <op>`           | `r[d] ← r[n] + op`            |
//! | Subtract                 | `SUB Rd, Rn, <op>`           | `r[d] ← r[n] − op`            |
//! | Copy to register         | `MOV Rd, <op>`               | `r[d] ← op`                   |
//! | Compare                  | `CMP Rn, <op>`               | `cmp ← EQ/GT/LT of r[n], op`  |
//! | Branch if equal to       | `BEQ label`                  | `if cmp = EQ : pc ← label`    |
//! | Branch if not equal to   | `BNE label`                  | `if cmp ≠ EQ : pc ← label`    |
//! | Branch if greater than   | `BGT label`                  | `if cmp = GT : pc ← label`    |
//! | Branch if less than      | `BLT label`                  | `if cmp = LT : pc ← label`    |
//! | Branch                   | `B label`                    | `pc ← label`                  |
//! | AND                      | `AND Rd, Rn, <op>`           | `r[d] ← r[n] & op`            |
//! | OR                       | `ORR Rd, Rn, <op>`           | `r[d] ← r[n] \| op`           |
//! | XOR                      | `EOR Rd, Rn, <op>`           | `r[d] ← r[n] ^ op`            |
//! | NOT                      | `MVN Rd, <op>`               | `r[d] ← ~op`                  |
//! | Logically shift left     | `LSL Rd, Rn, <op>`           | `r[d] ← r[n] << op`           |
//! | Logically shift right    | `LSR Rd, Rn, <op>`           | `r[d] ← r[n] >> op`           |
//! | Halt                     | `HALT`                       | `(stop execution)`            |
//! | Label                    | `label:`                     | `(nothing)`                   |
//!
//! `<op>` is either `Rm` or `#n`. Arithmetic wraps at 32 bits and shift
//! amounts are taken modulo 32. `LSR` shifts in the sign bit.
//!
//! Lines are matched against the table in order and the first match wins,
//! so the conditional branches sit before `B` and the label declaration
//! comes last.

use std::fmt;
use std::sync::OnceLock;

use crate::error::{Error, Result};
use crate::grammar::{Captures, Grammar};
use crate::machine::{Flag, Machine, Word};
use crate::program::Labels;

/// What the machine should do after an instruction has executed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
  /// Move on to the next line
  Continue,
  /// Continue from the given line of the program
  Jump(usize),
  /// Stop the machine
  Halt,
}

/// What an instruction can see besides the machine itself
#[derive(Debug, Clone, Copy)]
pub struct Context<'a> {
  pub labels: &'a Labels,
  /// 1-based source line of the instruction being executed
  pub line: usize,
}

type Action = fn(&mut Machine, &Context<'_>, &Captures) -> Result<Control>;

/// A single entry of the instruction table
pub struct InstructionSpec {
  name: &'static str,
  template: &'static str,
  grammar: Grammar,
  action: Action,
}

impl InstructionSpec {
  fn new(name: &'static str, template: &'static str, action: Action) -> Self {
    Self {
      name,
      template,
      grammar: Grammar::compile(template),
      action,
    }
  }

  pub fn name(&self) -> &'static str {
    self.name
  }

  pub fn matches(&self, line: &str) -> Option<Captures> {
    self.grammar.matches(line)
  }

  pub fn match_prefix<'a>(&self, line: &'a str) -> Option<(Captures, &'a str)> {
    self.grammar.match_prefix(line)
  }

  pub fn execute(
    &self,
    machine: &mut Machine,
    context: &Context<'_>,
    captures: &Captures,
  ) -> Result<Control> {
    (self.action)(machine, context, captures)
  }

  /// Whether this is the label declaration rather than an instruction
  pub fn declares_label(&self) -> bool {
    std::ptr::eq(self, label_declaration())
  }
}

impl fmt::Debug for InstructionSpec {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("InstructionSpec")
      .field("name", &self.name)
      .field("template", &self.template)
      .finish_non_exhaustive()
  }
}

/// Every instruction, in matching order
pub fn table() -> &'static [InstructionSpec] {
  static TABLE: OnceLock<Vec<InstructionSpec>> = OnceLock::new();
  TABLE.get_or_init(|| {
    vec![
      InstructionSpec::new("Load to register", "LDR <register>, <memory>", load),
      InstructionSpec::new("Store to memory", "STR <register>, <memory>", store),
      InstructionSpec::new("Add", "ADD <register>, <register>, <operand>", add),
      InstructionSpec::new("Subtract", "SUB <register>, <register>, <operand>", sub),
      InstructionSpec::new("Copy to register", "MOV <register>, <operand>", mov),
      InstructionSpec::new("Compare", "CMP <register>, <operand>", compare),
      InstructionSpec::new("Branch if equal to", "BEQ <label>", branch_if_equal),
      InstructionSpec::new("Branch if not equal to", "BNE <label>", branch_if_not_equal),
      InstructionSpec::new("Branch if greater than", "BGT <label>", branch_if_greater),
      InstructionSpec::new("Branch if less than", "BLT <label>", branch_if_less),
      InstructionSpec::new("Branch", "B <label>", branch),
      InstructionSpec::new("AND", "AND <register>, <register>, <operand>", and),
      InstructionSpec::new("OR", "ORR <register>, <register>, <operand>", or),
      InstructionSpec::new("XOR", "EOR <register>, <register>, <operand>", xor),
      InstructionSpec::new("NOT", "MVN <register>, <operand>", not),
      InstructionSpec::new("Logically shift left", "LSL <register>, <register>, <operand>", shift_left),
      InstructionSpec::new("Logically shift right", "LSR <register>, <register>, <operand>", shift_right),
      InstructionSpec::new("Halt", "HALT", halt),
      InstructionSpec::new("Label", "<label>:", label),
    ]
  })
}

/// The entry for `label:` lines
pub fn label_declaration() -> &'static InstructionSpec {
  let table = table();
  &table[table.len() - 1]
}

/// Find the first entry that accepts `line`
pub fn lookup(line: &str) -> Option<(&'static InstructionSpec, Captures)> {
  table()
    .iter()
    .find_map(|spec| spec.matches(line).map(|captures| (spec, captures)))
}

// r[d] ← m[m]
fn load(machine: &mut Machine, _: &Context<'_>, captures: &Captures) -> Result<Control> {
  let d = captures.register(0)?;
  let m = captures.address(1)?;
  let value = machine.memory.read(m);
  machine.registers.write(d, value);
  Ok(Control::Continue)
}

// m[m] ← r[s]
fn store(machine: &mut Machine, context: &Context<'_>, captures: &Captures) -> Result<Control> {
  let s = captures.register(0)?;
  let m = captures.address(1)?;
  let value = machine.registers.read(s);
  machine
    .memory
    .write(m, value)
    .ok_or(Error::AddressOutOfRange {
      address: m,
      line: context.line,
    })?;
  Ok(Control::Continue)
}

// r[d] ← r[n] ∘ op
fn data_processing(
  machine: &mut Machine,
  captures: &Captures,
  op: fn(Word, Word) -> Word,
) -> Result<Control> {
  let d = captures.register(0)?;
  let n = captures.register(1)?;
  let rn = machine.registers.read(n);
  let operand = machine.operand(captures.operand(2)?);
  machine.registers.write(d, op(rn, operand));
  Ok(Control::Continue)
}

fn add(machine: &mut Machine, _: &Context<'_>, captures: &Captures) -> Result<Control> {
  data_processing(machine, captures, Word::wrapping_add)
}

fn sub(machine: &mut Machine, _: &Context<'_>, captures: &Captures) -> Result<Control> {
  data_processing(machine, captures, Word::wrapping_sub)
}

fn and(machine: &mut Machine, _: &Context<'_>, captures: &Captures) -> Result<Control> {
  data_processing(machine, captures, |a, b| a & b)
}

fn or(machine: &mut Machine, _: &Context<'_>, captures: &Captures) -> Result<Control> {
  data_processing(machine, captures, |a, b| a | b)
}

fn xor(machine: &mut Machine, _: &Context<'_>, captures: &Captures) -> Result<Control> {
  data_processing(machine, captures, |a, b| a ^ b)
}

// the shift amount is reduced modulo the word width, as the host does
fn shift_left(machine: &mut Machine, _: &Context<'_>, captures: &Captures) -> Result<Control> {
  data_processing(machine, captures, |a, b| a.wrapping_shl(b as u32))
}

fn shift_right(machine: &mut Machine, _: &Context<'_>, captures: &Captures) -> Result<Control> {
  data_processing(machine, captures, |a, b| a.wrapping_shr(b as u32))
}

// r[d] ← op
fn mov(machine: &mut Machine, _: &Context<'_>, captures: &Captures) -> Result<Control> {
  let d = captures.register(0)?;
  let value = machine.operand(captures.operand(1)?);
  machine.registers.write(d, value);
  Ok(Control::Continue)
}

// r[d] ← ~op
fn not(machine: &mut Machine, _: &Context<'_>, captures: &Captures) -> Result<Control> {
  let d = captures.register(0)?;
  let value = machine.operand(captures.operand(1)?);
  machine.registers.write(d, !value);
  Ok(Control::Continue)
}

fn compare(machine: &mut Machine, _: &Context<'_>, captures: &Captures) -> Result<Control> {
  let n = captures.register(0)?;
  let rn = machine.registers.read(n);
  let operand = machine.operand(captures.operand(1)?);
  machine.registers.set_flag(Flag::compare(rn, operand));
  Ok(Control::Continue)
}

fn branch_when(context: &Context<'_>, captures: &Captures, taken: bool) -> Result<Control> {
  if !taken {
    return Ok(Control::Continue);
  }
  let label = captures.label(0)?;
  context
    .labels
    .get(label)
    .map(Control::Jump)
    .ok_or_else(|| Error::LabelNotFound {
      label: label.to_owned(),
      line: context.line,
    })
}

fn branch_if_equal(machine: &mut Machine, context: &Context<'_>, captures: &Captures) -> Result<Control> {
  let taken = machine.registers.flag() == Some(Flag::Eq);
  branch_when(context, captures, taken)
}

// an unset flag counts as not equal
fn branch_if_not_equal(
  machine: &mut Machine,
  context: &Context<'_>,
  captures: &Captures,
) -> Result<Control> {
  let taken = machine.registers.flag() != Some(Flag::Eq);
  branch_when(context, captures, taken)
}

fn branch_if_greater(
  machine: &mut Machine,
  context: &Context<'_>,
  captures: &Captures,
) -> Result<Control> {
  let taken = machine.registers.flag() == Some(Flag::Gt);
  branch_when(context, captures, taken)
}

fn branch_if_less(machine: &mut Machine, context: &Context<'_>, captures: &Captures) -> Result<Control> {
  let taken = machine.registers.flag() == Some(Flag::Lt);
  branch_when(context, captures, taken)
}

fn branch(_: &mut Machine, context: &Context<'_>, captures: &Captures) -> Result<Control> {
  branch_when(context, captures, true)
}

fn halt(_: &mut Machine, _: &Context<'_>, _: &Captures) -> Result<Control> {
  Ok(Control::Halt)
}

fn label(_: &mut Machine, _: &Context<'_>, _: &Captures) -> Result<Control> {
  Ok(Control::Continue)
}
