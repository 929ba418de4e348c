//! Instruction templates and the matcher compiled from them
//!
//! A template is written the way the instruction is written in a program,
//! with placeholders standing in for its operands:
//!
//! | Placeholder  | Accepts               | Captures                  |
//! |--------------|-----------------------|---------------------------|
//! | `<register>` | `R` then digits       | [`Capture::Register`]     |
//! | `<memory>`   | digits                | [`Capture::Address`]      |
//! | `<operand>`  | `R` or `#` then digits| [`Capture::Operand`]      |
//! | `<label>`    | letters/digits/`_`    | [`Capture::Label`]        |
//!
//! Whitespace in a template accepts zero or one whitespace character, so
//! `ADD R0,R1,#2` and `ADD R0, R1, #2` both match `ADD <register>, <register>, <operand>`.
//! Everything else must appear literally.

use crate::error::{Error, Result};
use crate::machine::{RegIdx, Word};

const PLACEHOLDERS: [(&str, Piece); 4] = [
  ("<register>", Piece::Register),
  ("<memory>", Piece::Memory),
  ("<operand>", Piece::Operand),
  ("<label>", Piece::Label),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Piece {
  Text(char),
  Space,
  Register,
  Memory,
  Operand,
  Label,
}

/// The second source of a data-processing instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operand {
  /// `R<n>`, the current contents of register `n`
  Register(RegIdx),
  /// `#<n>`, the literal value `n`
  Immediate(Word),
}

/// A single value pulled out of a matched line, in template order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Capture {
  Register(RegIdx),
  Address(usize),
  Operand(Operand),
  Label(String),
}

/// The captures of one matched line
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Captures(Vec<Capture>);

impl Captures {
  pub fn register(&self, index: usize) -> Result<RegIdx> {
    match self.0.get(index) {
      Some(Capture::Register(r)) => Ok(*r),
      _ => Err(Error::MissingField { index }),
    }
  }

  pub fn address(&self, index: usize) -> Result<usize> {
    match self.0.get(index) {
      Some(Capture::Address(a)) => Ok(*a),
      _ => Err(Error::MissingField { index }),
    }
  }

  pub fn operand(&self, index: usize) -> Result<Operand> {
    match self.0.get(index) {
      Some(Capture::Operand(op)) => Ok(*op),
      _ => Err(Error::MissingField { index }),
    }
  }

  pub fn label(&self, index: usize) -> Result<&str> {
    match self.0.get(index) {
      Some(Capture::Label(name)) => Ok(name),
      _ => Err(Error::MissingField { index }),
    }
  }
}

/// A compiled instruction template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grammar {
  pieces: Vec<Piece>,
}

impl Grammar {
  /// Compile a template into its matcher. Anything that is not a known
  /// placeholder or whitespace is literal text.
  pub fn compile(template: &str) -> Self {
    let mut pieces = Vec::new();
    let mut rest = template;
    'outer: while let Some(c) = rest.chars().next() {
      for (name, piece) in PLACEHOLDERS {
        if let Some(tail) = rest.strip_prefix(name) {
          pieces.push(piece);
          rest = tail;
          continue 'outer;
        }
      }
      pieces.push(if c.is_whitespace() {
        Piece::Space
      } else {
        Piece::Text(c)
      });
      rest = &rest[c.len_utf8()..];
    }
    Self { pieces }
  }

  /// Match the whole of `line`
  pub fn matches(&self, line: &str) -> Option<Captures> {
    match self.match_prefix(line)? {
      (captures, "") => Some(captures),
      _ => None,
    }
  }

  /// Match the start of `line`, returning whatever text is left over
  pub fn match_prefix<'a>(&self, line: &'a str) -> Option<(Captures, &'a str)> {
    let mut rest = line;
    let mut captures = Vec::new();
    for piece in &self.pieces {
      match piece {
        Piece::Text(c) => rest = rest.strip_prefix(*c)?,
        Piece::Space => {
          if let Some(c) = rest.chars().next().filter(|c| c.is_whitespace()) {
            rest = &rest[c.len_utf8()..];
          }
        }
        Piece::Register => {
          let (r, tail) = number(rest.strip_prefix('R')?)?;
          captures.push(Capture::Register(r));
          rest = tail;
        }
        Piece::Memory => {
          let (a, tail) = number(rest)?;
          captures.push(Capture::Address(a));
          rest = tail;
        }
        Piece::Operand => {
          let (op, tail) = if let Some(tail) = rest.strip_prefix('R') {
            let (r, tail) = number(tail)?;
            (Operand::Register(r), tail)
          } else {
            let (v, tail) = number(rest.strip_prefix('#')?)?;
            (Operand::Immediate(v), tail)
          };
          captures.push(Capture::Operand(op));
          rest = tail;
        }
        Piece::Label => {
          let end = rest
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
            .unwrap_or(rest.len());
          if end == 0 {
            return None;
          }
          captures.push(Capture::Label(rest[..end].to_owned()));
          rest = &rest[end..];
        }
      }
    }
    Some((Captures(captures), rest))
  }
}

// a run of ascii digits; too many digits for `T` is no match at all
fn number<T: std::str::FromStr>(s: &str) -> Option<(T, &str)> {
  let end = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
  if end == 0 {
    return None;
  }
  let value = s[..end].parse().ok()?;
  Some((value, &s[end..]))
}
