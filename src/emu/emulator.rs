//! A reference host: fetches words from a loaded program, advances the program counter and
//! feeds each instruction to the [`Engine`].

use std::collections::VecDeque;

use anyhow::{anyhow, Context, Result};

use crate::plat::{
    catalog::{Catalog, ResolvedInstruction},
    Word,
};

use super::{
    debugger::Debugger,
    engine::{Console, ControlFlow, Engine, Output},
    ram::{Ram, DEFAULT_DATA_BASE, DEFAULT_DATA_SIZE},
    registers::RegisterFile,
};

/// Base address programs are loaded at unless configured otherwise.
pub const DEFAULT_TEXT_BASE: u32 = 0x0040_0000;

/// How many executed instructions the debugger can look back on.
const HISTORY_LEN: usize = 1024;

/// Host settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmuConfig {
    pub text_base: u32,
    pub data_base: u32,
    pub data_size: u32,
    /// Seed for `drop`. Random if unset.
    pub seed: Option<u64>,
    /// Stop after this many instructions.
    pub max_steps: Option<u64>,
}

impl Default for EmuConfig {
    fn default() -> Self {
        Self {
            text_base: DEFAULT_TEXT_BASE,
            data_base: DEFAULT_DATA_BASE,
            data_size: DEFAULT_DATA_SIZE,
            seed: None,
            max_steps: None,
        }
    }
}

/// The emulator's current state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmuState {
    /// The emulator is allowed to run.
    Continue,
    /// Stops execution and hands control to the debugger, without ending the run.
    Pause,
    /// Halt execution.
    Halt,
}

/// The program counter, which doubles as the engine's control-flow delegate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgramCounter {
    pub value: u32,
}

impl ControlFlow for ProgramCounter {
    fn program_counter(&self) -> u32 {
        self.value
    }

    fn jump(&mut self, address: u32) {
        self.value = address;
    }

    fn branch(&mut self, offset: Word) {
        self.value = self.value.wrapping_add((offset as u32).wrapping_mul(4));
    }
}

/// Parses a program listing: one hexadecimal instruction word per line, `#` starts a comment.
///
/// # Errors
///
/// This function will return an error if a line isn't a 32-bit hex number.
pub fn parse_program(listing: &str) -> Result<Vec<u32>> {
    let mut words = vec![];
    for (n, line) in listing.lines().enumerate() {
        let line = line.split('#').next().unwrap_or_default().trim();
        if line.is_empty() {
            continue;
        }
        let digits = line
            .strip_prefix("0x")
            .or_else(|| line.strip_prefix("0X"))
            .unwrap_or(line)
            .replace('_', "");
        let word = u32::from_str_radix(&digits, 16)
            .with_context(|| format!("line {}: `{line}` is not an instruction word", n + 1))?;
        words.push(word);
    }
    Ok(words)
}

/// The main emulation context.
pub struct Emulator<'c, O: Output = Console> {
    pub regs: RegisterFile,
    pub ram: Ram,
    pub pc: ProgramCounter,
    pub state: EmuState,
    pub instr_history: VecDeque<(u32, ResolvedInstruction)>,
    pub steps: u64,
    pub out: O,
    program: Vec<u32>,
    config: EmuConfig,
    engine: Engine<'c>,
}

impl<'c> Emulator<'c> {
    /// Loads a program into a new [Emulator] printing to stdout.
    pub fn new(catalog: &'c Catalog, program: Vec<u32>, config: EmuConfig) -> Self {
        Self::with_output(catalog, program, config, Console)
    }
}

impl<'c, O: Output> Emulator<'c, O> {
    /// Loads a program into a new [Emulator] printing to `out`.
    pub fn with_output(catalog: &'c Catalog, program: Vec<u32>, config: EmuConfig, out: O) -> Self {
        let engine = match config.seed {
            Some(seed) => Engine::seeded(catalog, seed),
            None => Engine::from_entropy(catalog),
        };
        Self {
            regs: RegisterFile::new(),
            ram: Ram::new(config.data_base, config.data_size),
            pc: ProgramCounter {
                value: config.text_base,
            },
            state: EmuState::Continue,
            instr_history: VecDeque::new(),
            steps: 0,
            out,
            program,
            config,
            engine,
        }
    }

    pub fn catalog(&self) -> &'c Catalog {
        self.engine.catalog()
    }

    pub fn program(&self) -> &[u32] {
        &self.program
    }

    /// The word at `address`, if it lies inside the loaded program.
    pub fn fetch(&self, address: u32) -> Option<u32> {
        let offset = address.checked_sub(self.config.text_base)?;
        if offset % 4 != 0 {
            return None;
        }
        self.program.get((offset / 4) as usize).copied()
    }

    /// Runs the emulator until it halts, entering the debugger whenever it pauses.
    pub fn run_while_continue(&mut self) -> Result<()> {
        loop {
            match self.state {
                EmuState::Continue => {}
                EmuState::Halt => break,
                EmuState::Pause => {
                    self.debug()?;
                    continue;
                }
            }
            self.step_instr()?;
        }
        Ok(())
    }

    pub fn cont(&mut self) -> Result<()> {
        self.state = EmuState::Continue;
        self.run_while_continue()
    }

    /// Executes a single instruction.
    ///
    /// # Errors
    ///
    /// This function will return an error, and halt the emulator, if the instruction can't be
    /// decoded or fails.
    pub fn step_instr(&mut self) -> Result<()> {
        if self.state == EmuState::Halt {
            return Ok(());
        }
        if let Some(limit) = self.config.max_steps {
            if self.steps >= limit {
                log::warn!("step limit of {limit} reached, halting");
                self.state = EmuState::Halt;
                return Ok(());
            }
        }

        let pc = self.pc.value;
        let Some(word) = self.fetch(pc) else {
            let end = self
                .config
                .text_base
                .wrapping_add(4 * self.program.len() as u32);
            if pc == end {
                log::info!("program finished after {} instruction(s)", self.steps);
                self.state = EmuState::Halt;
                return Ok(());
            }
            self.state = EmuState::Halt;
            return Err(anyhow!("program counter {pc:#010x} is outside the program"));
        };

        let result = self.execute_word(pc, word);
        if result.is_err() {
            self.state = EmuState::Halt;
        }
        result
    }

    fn execute_word(&mut self, pc: u32, word: u32) -> Result<()> {
        let catalog = self.catalog();
        let instr = catalog
            .resolve(word)
            .with_context(|| format!("[pc={pc:#010x}] cannot decode {word:#010x}"))?;
        log::debug!(">>> [pc={pc:#010x}] {}", catalog.render(&instr));

        self.pc.value = pc.wrapping_add(4);
        let result = self.engine.execute(
            &instr,
            &mut self.regs,
            &mut self.ram,
            &mut self.pc,
            &mut self.out,
        );
        if result.is_err() {
            // Leave the PC on the faulting instruction.
            self.pc.value = pc;
        }
        result.with_context(|| format!("[pc={pc:#010x}] `{}` failed", catalog.render(&instr)))?;

        if self.instr_history.len() == HISTORY_LEN {
            self.instr_history.pop_front();
        }
        self.instr_history.push_back((pc, instr));
        self.steps += 1;
        Ok(())
    }

    pub fn debug(&mut self) -> Result<()> {
        Debugger::new(self).repl()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{emu::board::Board, plat::Mnemonic};

    fn assemble(catalog: &Catalog, listing: &[(Mnemonic, &[Word])]) -> Vec<u32> {
        listing
            .iter()
            .map(|(m, ops)| catalog.encode(*m, ops).unwrap())
            .collect()
    }

    fn config() -> EmuConfig {
        EmuConfig {
            seed: Some(1),
            max_steps: Some(10_000),
            ..EmuConfig::default()
        }
    }

    #[test]
    fn test_parse_program() {
        let words = parse_program(
            "# demo\n0x2108000a\n\n  0000003F  # downstack\n0x0000_003b\n",
        )
        .unwrap();
        assert_eq!(words, vec![0x2108_000a, 0x0000_003f, 0x0000_003b]);
        assert!(parse_program("harddrop").is_err());
    }

    #[test]
    fn test_branch_and_jump_targets() {
        let mut pc = ProgramCounter { value: 0x0040_0008 };
        pc.branch(-2);
        assert_eq!(pc.value, 0x0040_0000);
        pc.branch(3);
        assert_eq!(pc.value, 0x0040_000c);
        pc.jump(0x0040_0100);
        assert_eq!(pc.program_counter(), 0x0040_0100);
    }

    #[test]
    fn test_runs_to_completion() {
        let catalog = Catalog::new().unwrap();
        let program = assemble(
            &catalog,
            &[
                (Mnemonic::Combo, &[2]),
                (Mnemonic::Downstack, &[]),
                (Mnemonic::Viewboard, &[]),
            ],
        );
        let mut emu = Emulator::with_output(&catalog, program, config(), Vec::<String>::new());
        emu.run_while_continue().unwrap();
        assert_eq!(emu.state, EmuState::Halt);
        assert_eq!(emu.steps, 3);
        assert_eq!(
            Board::read(&emu.regs),
            Board {
                columns: [1; 10],
                score: 1
            }
        );
        assert_eq!(emu.out.len(), 1);
        assert_eq!(emu.instr_history.len(), 3);
    }

    #[test]
    fn test_loop_with_branch() {
        // $t0 counts down from 3, $s1 counts iterations.
        let catalog = Catalog::new().unwrap();
        let program = assemble(
            &catalog,
            &[
                (Mnemonic::Harddrop, &[8, 0, 3]),
                (Mnemonic::Harddrop, &[17, 17, 1]),
                (Mnemonic::Slowgravity, &[8, 8, 1]),
                (Mnemonic::Nonclear, &[8, 0, -3]),
            ],
        );
        let mut emu = Emulator::with_output(&catalog, program, config(), Vec::<String>::new());
        emu.run_while_continue().unwrap();
        assert_eq!(emu.regs.get(17).unwrap(), 3);
        assert_eq!(emu.regs.get(8).unwrap(), 0);
        assert_eq!(emu.steps, 1 + 3 * 3);
    }

    #[test]
    fn test_jump_skips_instruction() {
        let catalog = Catalog::new().unwrap();
        // shift to the third word: (0x0040_0008 >> 2)
        let program = assemble(
            &catalog,
            &[
                (Mnemonic::Shift, &[0x0010_0002]),
                (Mnemonic::Harddrop, &[9, 0, 1]),
                (Mnemonic::Harddrop, &[10, 0, 1]),
            ],
        );
        let mut emu = Emulator::with_output(&catalog, program, config(), Vec::<String>::new());
        emu.run_while_continue().unwrap();
        assert_eq!(emu.regs.get(9).unwrap(), 0);
        assert_eq!(emu.regs.get(10).unwrap(), 1);
    }

    #[test]
    fn test_fault_halts() {
        let catalog = Catalog::new().unwrap();
        let program = assemble(
            &catalog,
            &[
                (Mnemonic::Harddrop, &[8, 0, 0x7fff]),
                (Mnemonic::Hold, &[8, 1, 0]),
                (Mnemonic::Harddrop, &[9, 0, 1]),
            ],
        );
        let mut emu = Emulator::with_output(&catalog, program, config(), Vec::<String>::new());
        let err = emu.run_while_continue().unwrap_err();
        assert!(err.to_string().contains("hold"));
        assert_eq!(emu.state, EmuState::Halt);
        assert_eq!(emu.steps, 1);
        assert_eq!(emu.regs.get(9).unwrap(), 0);
        assert_eq!(emu.pc.value, DEFAULT_TEXT_BASE + 4);
        assert_eq!(
            emu.fetch(emu.pc.value),
            Some(catalog.encode(Mnemonic::Hold, &[8, 1, 0]).unwrap())
        );
    }

    #[test]
    fn test_undecodable_word_halts() {
        let catalog = Catalog::new().unwrap();
        let mut emu =
            Emulator::with_output(&catalog, vec![0xffff_ffff], config(), Vec::<String>::new());
        assert!(emu.run_while_continue().is_err());
        assert_eq!(emu.state, EmuState::Halt);
        assert_eq!(emu.pc.value, DEFAULT_TEXT_BASE);
    }

    #[test]
    fn test_step_limit() {
        let catalog = Catalog::new().unwrap();
        // Branch to itself forever.
        let program = assemble(&catalog, &[(Mnemonic::Lineclear, &[0, 0, -1])]);
        let mut emu = Emulator::with_output(&catalog, program, config(), Vec::<String>::new());
        emu.run_while_continue().unwrap();
        assert_eq!(emu.steps, 10_000);
    }
}
