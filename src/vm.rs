use tracing::{info, trace};

use crate::error::{Error, Result};
use crate::isa::{Context, Control};
use crate::machine::Machine;
use crate::program::Program;
use crate::trace::{Step, Tracer};

/// Where the machine is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
  Active,
  /// A `HALT` was executed
  Halted,
  /// The program counter ran off the end of the program
  Finished,
}

/// Knobs for a whole run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunOptions {
  /// Give up after this many steps; `None` runs until the program stops
  pub max_steps: Option<u64>,
}

/// Summary of a completed run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Outcome {
  /// Either [`State::Halted`] or [`State::Finished`]
  pub state: State,
  pub operations: u64,
}

/// Executes a [`Program`] one slot at a time
///
/// The program counter indexes slots of the program, label declarations
/// included, and a taken branch lands on the label's own slot.
#[derive(Debug)]
pub struct Vm<'p> {
  program: &'p Program,
  pc: usize,
  operations: u64,
  machine: Machine,
  state: State,
}

impl<'p> Vm<'p> {
  /// Create a machine for `program`, holding its initial memory
  pub fn new(program: &'p Program) -> Self {
    Self {
      program,
      pc: 0,
      operations: 0,
      machine: Machine::new(program.memory().to_vec()),
      state: if program.is_empty() {
        State::Finished
      } else {
        State::Active
      },
    }
  }

  pub fn pc(&self) -> usize {
    self.pc
  }

  pub fn operations(&self) -> u64 {
    self.operations
  }

  pub fn machine(&self) -> &Machine {
    &self.machine
  }

  pub fn state(&self) -> State {
    self.state
  }

  /// Execute the slot under the program counter, record it, and move the
  /// program counter on. Does nothing once the machine has stopped.
  pub fn step<T>(&mut self, tracer: &mut T) -> Result<State>
  where
    T: Tracer + ?Sized,
  {
    if self.state != State::Active {
      return Ok(self.state);
    }
    let program = self.program;
    let Some(parsed) = program.lines().get(self.pc) else {
      self.state = State::Finished;
      return Ok(self.state);
    };

    let context = Context {
      labels: program.labels(),
      line: parsed.line,
    };
    let control = parsed
      .spec
      .execute(&mut self.machine, &context, &parsed.captures)?;
    self.operations += 1;
    trace!(pc = self.pc, line = parsed.line, text = %parsed.text, ?control, "step");

    tracer.record(&Step {
      counter: self.pc,
      operations: self.operations,
      text: &parsed.text,
      name: parsed.spec.name(),
      memory: &self.machine.memory,
      registers: &self.machine.registers,
    })?;

    match control {
      Control::Continue => self.pc += 1,
      Control::Jump(target) => self.pc = target,
      Control::Halt => self.state = State::Halted,
    }
    if self.state == State::Active && self.pc >= program.len() {
      self.state = State::Finished;
    }
    Ok(self.state)
  }

  /// Step until the program halts or runs off its end
  pub fn run<T>(&mut self, options: RunOptions, tracer: &mut T) -> Result<Outcome>
  where
    T: Tracer + ?Sized,
  {
    while self.state == State::Active {
      if let Some(limit) = options.max_steps {
        if self.operations >= limit {
          return Err(Error::StepLimit { limit });
        }
      }
      self.step(tracer)?;
    }
    info!(state = ?self.state, operations = self.operations, "program stopped");
    Ok(Outcome {
      state: self.state,
      operations: self.operations,
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  use crate::machine::Flag;
  use crate::trace::{Silent, TextTracer};

  /// Keeps the counter and text of every step
  #[derive(Default)]
  struct Recorder(Vec<(usize, u64, String)>);

  impl Tracer for Recorder {
    fn record(&mut self, step: &Step<'_>) -> std::io::Result<()> {
      self.0.push((step.counter, step.operations, step.text.to_owned()));
      Ok(())
    }
  }

  fn program(source: &str) -> Program {
    Program::parse(source).unwrap()
  }

  fn run(source: &str) -> (Machine, Outcome) {
    let program = program(source);
    let mut vm = Vm::new(&program);
    let outcome = vm.run(RunOptions::default(), &mut Silent).unwrap();
    (vm.machine().clone(), outcome)
  }

  mod vm {
    use super::*;

    #[test]
    fn new() {
      let program = program("[4, 5]\nHALT");
      let vm = Vm::new(&program);
      assert_eq!(vm.pc(), 0);
      assert_eq!(vm.operations(), 0);
      assert_eq!(vm.state(), State::Active);
      assert_eq!(vm.machine().memory.as_slice(), &[4, 5]);
      assert_eq!(vm.machine().registers.get(0), None);
    }

    #[test]
    fn new_empty_program_is_finished() {
      let program = program("[]");
      let mut vm = Vm::new(&program);
      assert_eq!(vm.state(), State::Finished);
      assert_eq!(vm.step(&mut Silent).unwrap(), State::Finished);
      assert_eq!(vm.operations(), 0);
    }

    #[test]
    fn step_sequential() {
      let program = program("[]\nMOV R0, #1\nMOV R1, #2");
      let mut vm = Vm::new(&program);
      assert_eq!(vm.step(&mut Silent).unwrap(), State::Active);
      assert_eq!(vm.pc(), 1);
      assert_eq!(vm.step(&mut Silent).unwrap(), State::Finished);
      assert_eq!(vm.pc(), 2);
      assert_eq!(vm.operations(), 2);
      // cant progress
      assert_eq!(vm.step(&mut Silent).unwrap(), State::Finished);
      assert_eq!(vm.operations(), 2);
    }

    #[test]
    fn step_halt() {
      let program = program("[]\nHALT\nMOV R0, #1");
      let mut vm = Vm::new(&program);
      assert_eq!(vm.step(&mut Silent).unwrap(), State::Halted);
      assert_eq!(vm.pc(), 0);
      assert_eq!(vm.step(&mut Silent).unwrap(), State::Halted);
      assert_eq!(vm.machine().registers.get(0), None);
    }

    #[test]
    fn step_branch_lands_on_label_slot() {
      let program = program("[]\nB skip\nMOV R0, #1\nskip:\nHALT");
      let mut vm = Vm::new(&program);
      vm.step(&mut Silent).unwrap();
      assert_eq!(vm.pc(), 2);
      vm.step(&mut Silent).unwrap();
      assert_eq!(vm.pc(), 3);
    }

    #[test]
    fn step_branch_to_first_slot() {
      let program = program("[]\ntop:\nB top");
      let mut vm = Vm::new(&program);
      vm.step(&mut Silent).unwrap();
      vm.step(&mut Silent).unwrap();
      assert_eq!(vm.pc(), 0);
      assert_eq!(vm.state(), State::Active);
    }
  }

  mod run {
    use super::*;

    #[test]
    fn mov_load_add() {
      let (machine, outcome) = run("[1,2,3]\nMOV R0,#5\nLDR R1,0\nADD R2,R0,R1\nHALT");
      let regs = &machine.registers;
      assert_eq!(regs.get(0), Some(5));
      assert_eq!(regs.get(1), Some(1));
      assert_eq!(regs.get(2), Some(6));
      assert_eq!(machine.memory.as_slice(), &[1, 2, 3]);
      assert_eq!(outcome.state, State::Halted);
      assert_eq!(outcome.operations, 4);
    }

    #[test]
    fn compare_then_branch_skips() {
      let (machine, outcome) = run("[]\nMOV R0,#5\nCMP R0,#5\nBEQ done\nMOV R1,#1\ndone: HALT");
      assert_eq!(machine.registers.get(1), None);
      assert_eq!(machine.registers.flag(), Some(Flag::Eq));
      assert_eq!(outcome.state, State::Halted);
      // MOV, CMP, BEQ, done:, HALT
      assert_eq!(outcome.operations, 5);
    }

    #[test]
    fn falls_off_the_end() {
      let (machine, outcome) = run("[0]\nMOV R0, #3\nSTR R0, 0");
      assert_eq!(machine.memory.as_slice(), &[3]);
      assert_eq!(outcome.state, State::Finished);
    }

    #[test]
    fn countdown_loop() {
      let (machine, outcome) = run(
        "[0]\n\
         MOV R0, #3\n\
         MOV R1, #0\n\
         loop:\n\
         ADD R1, R1, #2\n\
         SUB R0, R0, #1\n\
         CMP R0, #0\n\
         BGT loop\n\
         STR R1, 0\n\
         HALT\n",
      );
      assert_eq!(machine.memory.as_slice(), &[6]);
      assert_eq!(machine.registers.get(0), Some(0));
      assert_eq!(outcome.state, State::Halted);
      // 2 setup + 3 passes of 5 + 2 tail
      assert_eq!(outcome.operations, 19);
    }

    #[test]
    fn trace_counts_every_step() {
      let program = program("[]\nB end\nMOV R0, #1\nend:\nHALT");
      let mut vm = Vm::new(&program);
      let mut recorder = Recorder::default();
      vm.run(RunOptions::default(), &mut recorder).unwrap();
      assert_eq!(
        recorder.0,
        vec![
          (0, 1, "B end".to_owned()),
          (2, 2, "end:".to_owned()),
          (3, 3, "HALT".to_owned()),
        ]
      );
    }

    #[test]
    fn text_trace_of_halting_step() {
      let program = program("[7]\nHALT");
      let mut vm = Vm::new(&program);
      let mut tracer = TextTracer::new(Vec::new());
      vm.run(RunOptions::default(), &mut tracer).unwrap();
      let out = String::from_utf8(tracer.into_inner()).unwrap();
      assert_eq!(
        out,
        "==============\n\
         Instruction Counter: 0\n\
         Operations: 1\n\
         Line: HALT\n\
         Type: Halt\n\
         Memory: [7]\n\
         Registers: {}\n"
      );
    }

    #[test]
    fn unknown_label_when_taken() {
      let program = program("[]\nMOV R0, #1\nB nowhere");
      let mut vm = Vm::new(&program);
      let err = vm.run(RunOptions::default(), &mut Silent).unwrap_err();
      match err {
        Error::LabelNotFound { label, line } => {
          assert_eq!(label, "nowhere");
          assert_eq!(line, 3);
        }
        other => panic!("unexpected error: {other}"),
      }
      assert_eq!(vm.operations(), 1);
    }

    #[test]
    fn store_past_memory_limit() {
      let program = program("[0]\nMOV R0, #1\nSTR R0, 18446744073709551615\nHALT");
      let mut vm = Vm::new(&program);
      let err = vm.run(RunOptions::default(), &mut Silent).unwrap_err();
      match err {
        Error::AddressOutOfRange { address, line } => {
          assert_eq!(address, usize::MAX);
          assert_eq!(line, 3);
        }
        other => panic!("unexpected error: {other}"),
      }
      assert_eq!(vm.machine().memory.as_slice(), &[0]);
      assert_eq!(vm.operations(), 1);
    }

    #[test]
    fn step_limit() {
      let program = program("[]\nspin:\nB spin");
      let mut vm = Vm::new(&program);
      let options = RunOptions {
        max_steps: Some(10),
      };
      let err = vm.run(options, &mut Silent).unwrap_err();
      assert!(matches!(err, Error::StepLimit { limit: 10 }));
      assert_eq!(vm.operations(), 10);
    }
  }
}
