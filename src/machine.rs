use std::collections::BTreeMap;
use std::fmt;

use tracing::warn;

use crate::grammar::Operand;

/// The type of a single register or memory cell
pub type Word = i32;

/// An index to a register
pub type RegIdx = u32;

/// The result of the last `CMP`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flag {
  Eq,
  Gt,
  Lt,
}

impl Flag {
  pub fn compare(lhs: Word, rhs: Word) -> Self {
    if lhs == rhs {
      Self::Eq
    } else if lhs > rhs {
      Self::Gt
    } else {
      Self::Lt
    }
  }
}

impl fmt::Display for Flag {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(match self {
      Self::Eq => "EQ",
      Self::Gt => "GT",
      Self::Lt => "LT",
    })
  }
}

/// Memory never grows past this many words through stores
pub const MAX_MEMORY: usize = 1 << 16;

/// Word-addressed memory, seeded from the program's memory image
///
/// Stores past the end grow the memory up to [`MAX_MEMORY`] words, filling
/// any gap with zeros.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Memory(Vec<Word>);

impl Memory {
  pub fn read(&self, address: usize) -> Word {
    match self.0.get(address) {
      Some(value) => *value,
      None => {
        warn!(address, len = self.0.len(), "read past the end of memory, using 0");
        0
      }
    }
  }

  /// Store `value`, or `None` if that would grow memory past [`MAX_MEMORY`]
  pub fn write(&mut self, address: usize, value: Word) -> Option<()> {
    if address >= self.0.len() {
      if address >= MAX_MEMORY {
        return None;
      }
      warn!(address, len = self.0.len(), "store past the end of memory, growing it");
      self.0.resize(address + 1, 0);
    }
    self.0.get_mut(address).map(|prev| {
      *prev = value;
    })
  }

  pub fn as_slice(&self) -> &[Word] {
    &self.0
  }
}

impl From<Vec<Word>> for Memory {
  fn from(words: Vec<Word>) -> Self {
    Self(words)
  }
}

impl fmt::Display for Memory {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str("[")?;
    for (i, value) in self.0.iter().enumerate() {
      if i > 0 {
        f.write_str(", ")?;
      }
      write!(f, "{value}")?;
    }
    f.write_str("]")
  }
}

/// The register file. Registers only exist once written, and the flag only
/// once a compare has run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Registers {
  values: BTreeMap<RegIdx, Word>,
  flag: Option<Flag>,
}

impl Registers {
  pub fn get(&self, register: RegIdx) -> Option<Word> {
    self.values.get(&register).copied()
  }

  /// Read a register as an instruction would: unset registers read as 0
  pub fn read(&self, register: RegIdx) -> Word {
    self.get(register).unwrap_or_else(|| {
      warn!(register, "read of unset register, using 0");
      0
    })
  }

  pub fn write(&mut self, register: RegIdx, value: Word) {
    self.values.insert(register, value);
  }

  pub fn flag(&self) -> Option<Flag> {
    self.flag
  }

  pub fn set_flag(&mut self, flag: Flag) {
    self.flag = Some(flag);
  }
}

impl fmt::Display for Registers {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str("{")?;
    let mut first = true;
    for (register, value) in &self.values {
      if !first {
        f.write_str(", ")?;
      }
      first = false;
      write!(f, "R{register}: {value}")?;
    }
    if let Some(flag) = self.flag {
      if !first {
        f.write_str(", ")?;
      }
      write!(f, "cmp: {flag}")?;
    }
    f.write_str("}")
  }
}

/// All mutable state a program can touch
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Machine {
  pub memory: Memory,
  pub registers: Registers,
}

impl Machine {
  pub fn new(memory: impl Into<Memory>) -> Self {
    Self {
      memory: memory.into(),
      registers: Registers::default(),
    }
  }

  /// Resolve an operand to the value it names
  pub fn operand(&self, operand: Operand) -> Word {
    match operand {
      Operand::Register(r) => self.registers.read(r),
      Operand::Immediate(v) => v,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  mod memory {
    use super::*;

    #[test]
    fn read_out_of_range_is_zero() {
      let memory = Memory::from(vec![4, 5]);
      assert_eq!(memory.read(1), 5);
      assert_eq!(memory.read(9), 0);
    }

    #[test]
    fn write_past_end_grows() {
      let mut memory = Memory::from(vec![1]);
      assert_eq!(memory.write(3, 7), Some(()));
      assert_eq!(memory.as_slice(), &[1, 0, 0, 7]);
    }

    #[test]
    fn write_past_limit_fails() {
      let mut memory = Memory::from(vec![1]);
      assert_eq!(memory.write(MAX_MEMORY, 7), None);
      assert_eq!(memory.write(usize::MAX, 7), None);
      assert_eq!(memory.as_slice(), &[1]);
      assert_eq!(memory.write(MAX_MEMORY - 1, 7), Some(()));
      assert_eq!(memory.as_slice().len(), MAX_MEMORY);
    }

    #[test]
    fn image_larger_than_limit_stays_writable() {
      let mut memory = Memory::from(vec![0; MAX_MEMORY + 2]);
      assert_eq!(memory.write(MAX_MEMORY + 1, 3), Some(()));
      assert_eq!(memory.read(MAX_MEMORY + 1), 3);
    }

    #[test]
    fn display() {
      assert_eq!(Memory::from(vec![1, -2, 3]).to_string(), "[1, -2, 3]");
      assert_eq!(Memory::default().to_string(), "[]");
    }
  }

  mod registers {
    use super::*;

    #[test]
    fn unset_until_written() {
      let mut regs = Registers::default();
      assert_eq!(regs.get(2), None);
      assert_eq!(regs.read(2), 0);
      regs.write(2, 9);
      assert_eq!(regs.get(2), Some(9));
    }

    #[test]
    fn display_orders_registers_and_appends_flag() {
      let mut regs = Registers::default();
      assert_eq!(regs.to_string(), "{}");
      regs.write(10, 1);
      regs.write(2, 5);
      assert_eq!(regs.to_string(), "{R2: 5, R10: 1}");
      regs.set_flag(Flag::Gt);
      assert_eq!(regs.to_string(), "{R2: 5, R10: 1, cmp: GT}");
    }

    #[test]
    fn flag_alone() {
      let mut regs = Registers::default();
      regs.set_flag(Flag::Eq);
      assert_eq!(regs.to_string(), "{cmp: EQ}");
    }
  }

  #[test]
  fn compare() {
    assert_eq!(Flag::compare(3, 3), Flag::Eq);
    assert_eq!(Flag::compare(4, 3), Flag::Gt);
    assert_eq!(Flag::compare(-4, 3), Flag::Lt);
  }

  #[test]
  fn operand_resolution() {
    let mut machine = Machine::default();
    machine.registers.write(1, 11);
    assert_eq!(machine.operand(Operand::Register(1)), 11);
    assert_eq!(machine.operand(Operand::Immediate(4)), 4);
  }
}
