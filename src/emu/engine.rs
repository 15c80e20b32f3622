//! Dispatches resolved instructions to their handlers.

use std::io::Write;

use rand::{rngs::SmallRng, RngCore, SeedableRng};

use crate::plat::{
    catalog::{Catalog, Descriptor, ResolvedInstruction},
    Word,
};

use super::{ram::Ram, registers::RegisterFile, EResult, EmuError};

/// Moves the program counter on behalf of jump and branch instructions.
pub trait ControlFlow {
    /// The program counter as seen by the executing instruction, i.e. already advanced past it.
    fn program_counter(&self) -> u32;
    /// Continues execution at `address`.
    fn jump(&mut self, address: u32);
    /// Moves the program counter by `offset` words.
    fn branch(&mut self, offset: Word);
}

/// Where instructions print to.
pub trait Output {
    fn emit(&mut self, text: &str);
}

impl Output for Vec<String> {
    fn emit(&mut self, text: &str) {
        self.push(text.to_owned());
    }
}

/// Prints straight to stdout.
#[derive(Debug, Default, Clone, Copy)]
pub struct Console;

impl Output for Console {
    fn emit(&mut self, text: &str) {
        let mut stdout = std::io::stdout().lock();
        // Output failures have nowhere to go.
        let _ = stdout.write_all(text.as_bytes());
        let _ = stdout.flush();
    }
}

/// Machine state and collaborators a handler runs against.
pub struct Cpu<'a> {
    pub regs: &'a mut RegisterFile,
    pub ram: &'a mut Ram,
    pub flow: &'a mut dyn ControlFlow,
    pub out: &'a mut dyn Output,
    pub rng: &'a mut dyn RngCore,
}

/// The semantics of one instruction. Handlers either commit every write or none.
///
/// # Panics
///
/// Handlers index their operand list directly and panic if it is shorter than the format needs.
/// [`Engine::execute`] checks the count first.
pub type Handler = fn(&mut Cpu<'_>, &[Word]) -> EResult<()>;

/// Executes resolved instructions against a catalog.
pub struct Engine<'c, R = SmallRng> {
    catalog: &'c Catalog,
    rng: R,
}

impl<'c> Engine<'c> {
    /// Creates an engine whose random draws are fixed by `seed`.
    pub fn seeded(catalog: &'c Catalog, seed: u64) -> Self {
        Self::new(catalog, SmallRng::seed_from_u64(seed))
    }

    /// Creates an engine with a randomly seeded generator.
    pub fn from_entropy(catalog: &'c Catalog) -> Self {
        Self::new(catalog, SmallRng::from_entropy())
    }
}

impl<'c, R: RngCore> Engine<'c, R> {
    pub fn new(catalog: &'c Catalog, rng: R) -> Self {
        Self { catalog, rng }
    }

    pub fn catalog(&self) -> &'c Catalog {
        self.catalog
    }

    fn descriptor(&self, instr: &ResolvedInstruction) -> EResult<&'c Descriptor> {
        let desc = self
            .catalog
            .lookup(instr.key)
            .ok_or(EmuError::UnknownInstruction(instr.key))?;
        if instr.operands.len() != desc.operand_count() {
            return Err(EmuError::OperandCount {
                mnemonic: desc.mnemonic,
                expected: desc.operand_count(),
                found: instr.operands.len(),
            });
        }
        Ok(desc)
    }

    /// Runs one instruction to completion.
    ///
    /// # Errors
    ///
    /// This function will return an error if the instruction is unknown or its handler fails.
    /// Nothing is modified in that case.
    pub fn execute(
        &mut self,
        instr: &ResolvedInstruction,
        regs: &mut RegisterFile,
        ram: &mut Ram,
        flow: &mut dyn ControlFlow,
        out: &mut dyn Output,
    ) -> EResult<()> {
        let desc = self.descriptor(instr)?;
        log::trace!("> {}", desc.render(&instr.operands));
        let mut cpu = Cpu {
            regs,
            ram,
            flow,
            out,
            rng: &mut self.rng,
        };
        (desc.handler)(&mut cpu, &instr.operands).map_err(|e| {
            log::debug!("{} aborted: {}", desc.mnemonic, e);
            e
        })
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! A scratch machine for handler tests.

    use super::*;

    /// Records every jump and branch instead of moving anything.
    #[derive(Debug, Default)]
    pub struct Flow {
        pub pc: u32,
        pub jumps: Vec<u32>,
        pub branches: Vec<Word>,
    }

    impl ControlFlow for Flow {
        fn program_counter(&self) -> u32 {
            self.pc
        }

        fn jump(&mut self, address: u32) {
            self.jumps.push(address);
        }

        fn branch(&mut self, offset: Word) {
            self.branches.push(offset);
        }
    }

    pub struct Rig {
        pub catalog: Catalog,
        pub regs: RegisterFile,
        pub ram: Ram,
        pub flow: Flow,
        pub out: Vec<String>,
        pub rng: SmallRng,
    }

    impl Rig {
        pub fn new() -> Self {
            Self {
                catalog: Catalog::new().unwrap(),
                regs: RegisterFile::new(),
                ram: Ram::default(),
                flow: Flow::default(),
                out: vec![],
                rng: SmallRng::seed_from_u64(0),
            }
        }

        /// Restarts the random stream `drop` draws from.
        pub fn reseed(&mut self, seed: u64) {
            self.rng = SmallRng::seed_from_u64(seed);
        }

        pub fn run(&mut self, mnemonic: crate::plat::Mnemonic, operands: &[Word]) -> EResult<()> {
            let instr = self.catalog.instr(mnemonic, operands);
            let mut engine = Engine::new(&self.catalog, &mut self.rng);
            engine.execute(
                &instr,
                &mut self.regs,
                &mut self.ram,
                &mut self.flow,
                &mut self.out,
            )
        }

        pub fn set(&mut self, reg: Word, value: Word) {
            self.regs.set(reg, value).unwrap();
        }

        pub fn get(&self, reg: Word) -> Word {
            self.regs.get(reg).unwrap()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::Rig;
    use super::*;
    use crate::plat::{Mnemonic, OpKey};

    #[test]
    fn test_unknown_instruction() {
        let mut rig = Rig::new();
        let key = OpKey {
            opcode: 0x3f,
            funct: None,
        };
        let mut engine = Engine::seeded(&rig.catalog, 0);
        let err = engine
            .execute(
                &ResolvedInstruction::new(key, vec![]),
                &mut rig.regs,
                &mut rig.ram,
                &mut rig.flow,
                &mut rig.out,
            )
            .unwrap_err();
        assert_eq!(err, EmuError::UnknownInstruction(key));
    }

    #[test]
    fn test_operand_count_checked() {
        let mut rig = Rig::new();
        assert_eq!(
            rig.run(Mnemonic::Stack, &[8, 9]),
            Err(EmuError::OperandCount {
                mnemonic: Mnemonic::Stack,
                expected: 3,
                found: 2
            })
        );
        assert_eq!(rig.regs, RegisterFile::new());
    }

    #[test]
    fn test_short_operand_lists_never_reach_handlers() {
        let mut rig = Rig::new();
        for desc in rig.catalog.descriptors().to_vec() {
            for found in 0..desc.operand_count() {
                let operands = vec![8; found];
                assert_eq!(
                    rig.run(desc.mnemonic, &operands),
                    Err(EmuError::OperandCount {
                        mnemonic: desc.mnemonic,
                        expected: desc.operand_count(),
                        found
                    })
                );
            }
        }
        assert_eq!(rig.regs, RegisterFile::new());
        assert!(rig.out.is_empty());
    }

    #[test]
    fn test_dispatches_by_key() {
        let mut rig = Rig::new();
        rig.set(9, 2);
        rig.set(10, 3);
        rig.run(Mnemonic::Stack, &[8, 9, 10]).unwrap();
        assert_eq!(rig.get(8), 5);
        rig.run(Mnemonic::Garbage, &[8, 9, 10]).unwrap();
        assert_eq!(rig.get(8), -1);
    }
}
