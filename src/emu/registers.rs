use std::fmt;

use crate::plat::Word;

use super::{EResult, EmuError};

/// Number of register slots: 32 general purpose registers plus HI and LO.
pub const NUM_REGISTERS: usize = 34;

/// Index of a register slot, checked against [`NUM_REGISTERS`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Register(u8);

impl Register {
    pub const ZERO: Register = Register(0);
    /// `$v0`, where `ghostpiece` conventionally writes its preview.
    pub const V0: Register = Register(2);
    pub const T0: Register = Register(8);
    pub const T1: Register = Register(9);
    pub const T2: Register = Register(10);
    pub const T3: Register = Register(11);
    pub const T4: Register = Register(12);
    pub const T5: Register = Register(13);
    pub const T6: Register = Register(14);
    pub const T7: Register = Register(15);
    /// `$s0`, the score counter.
    pub const S0: Register = Register(16);
    pub const T8: Register = Register(24);
    pub const T9: Register = Register(25);
    pub const SP: Register = Register(29);
    /// High word of a product, or the remainder of a division.
    pub const HI: Register = Register(32);
    /// Low word of a product, or the quotient of a division.
    pub const LO: Register = Register(33);

    const NAMES: [&str; NUM_REGISTERS] = [
        "$zero", "$at", "$v0", "$v1", "$a0", "$a1", "$a2", "$a3", "$t0", "$t1", "$t2", "$t3",
        "$t4", "$t5", "$t6", "$t7", "$s0", "$s1", "$s2", "$s3", "$s4", "$s5", "$s6", "$s7",
        "$t8", "$t9", "$k0", "$k1", "$gp", "$sp", "$fp", "$ra", "hi", "lo",
    ];

    pub fn index(self) -> usize {
        self.0 as usize
    }

    pub fn name(self) -> &'static str {
        Self::NAMES[self.index()]
    }

    /// Every register slot in index order.
    pub fn all() -> impl Iterator<Item = Register> {
        (0..NUM_REGISTERS as u8).map(Register)
    }
}

impl TryFrom<Word> for Register {
    type Error = EmuError;

    fn try_from(value: Word) -> EResult<Self> {
        if (0..NUM_REGISTERS as Word).contains(&value) {
            Ok(Self(value as u8))
        } else {
            Err(EmuError::InvalidRegister(value))
        }
    }
}

impl From<Register> for Word {
    fn from(reg: Register) -> Word {
        reg.0 as Word
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The register file. All slots start at zero.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterFile {
    slots: [Word; NUM_REGISTERS],
}

impl RegisterFile {
    pub fn new() -> Self {
        Self {
            slots: [0; NUM_REGISTERS],
        }
    }

    /// Checks that `index` names a register slot.
    ///
    /// # Errors
    ///
    /// Returns [`EmuError::InvalidRegister`] if it doesn't.
    pub fn check(&self, index: Word) -> EResult<Register> {
        Register::try_from(index)
    }

    /// Reads the register at `index`.
    ///
    /// # Errors
    ///
    /// Returns [`EmuError::InvalidRegister`] if `index` is out of range.
    pub fn get(&self, index: Word) -> EResult<Word> {
        Ok(self.read(self.check(index)?))
    }

    /// Writes `value` to the register at `index`.
    ///
    /// # Errors
    ///
    /// Returns [`EmuError::InvalidRegister`] if `index` is out of range.
    pub fn set(&mut self, index: Word, value: Word) -> EResult<()> {
        let reg = self.check(index)?;
        self.write(reg, value);
        Ok(())
    }

    pub fn read(&self, reg: Register) -> Word {
        self.slots[reg.index()]
    }

    pub fn write(&mut self, reg: Register, value: Word) {
        self.slots[reg.index()] = value;
    }

    pub fn hi(&self) -> Word {
        self.read(Register::HI)
    }

    pub fn lo(&self) -> Word {
        self.read(Register::LO)
    }

    /// A copy of every slot, in index order.
    pub fn snapshot(&self) -> [Word; NUM_REGISTERS] {
        self.slots
    }
}

impl Default for RegisterFile {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_set() {
        let mut regs = RegisterFile::new();
        regs.set(8, -7).unwrap();
        regs.set(33, i32::MAX).unwrap();
        assert_eq!(regs.get(8).unwrap(), -7);
        assert_eq!(regs.lo(), i32::MAX);
        assert_eq!(regs.get(0).unwrap(), 0);
    }

    #[test]
    fn test_out_of_range() {
        let mut regs = RegisterFile::new();
        assert_eq!(regs.get(34), Err(EmuError::InvalidRegister(34)));
        assert_eq!(regs.get(-1), Err(EmuError::InvalidRegister(-1)));
        assert_eq!(regs.set(100, 1), Err(EmuError::InvalidRegister(100)));
        assert_eq!(regs, RegisterFile::new());
    }

    #[test]
    fn test_names() {
        assert_eq!(Register::try_from(8).unwrap().to_string(), "$t0");
        assert_eq!(Register::try_from(25).unwrap().to_string(), "$t9");
        assert_eq!(Register::S0.name(), "$s0");
        assert_eq!(Register::HI.name(), "hi");
        assert_eq!(Register::all().count(), NUM_REGISTERS);
    }
}
