//! The execution core and its reference host.

use std::fmt;

use thiserror::Error;

use crate::plat::{Mnemonic, OpKey, Word};

pub mod alu;
pub mod board;
pub mod debugger;
pub mod emulator;
pub mod engine;
pub mod exec;
pub mod ram;
pub mod registers;

/// Why a memory access was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressFault {
    /// Not a multiple of 4.
    Misaligned,
    /// Outside the mapped data segment.
    Unmapped,
}

impl fmt::Display for AddressFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddressFault::Misaligned => f.write_str("misaligned"),
            AddressFault::Unmapped => f.write_str("unmapped"),
        }
    }
}

/// A failure that aborts the current instruction.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EmuError {
    #[error("arithmetic overflow")]
    ArithmeticOverflow,
    #[error("address error: {fault} word access at {address:#010x}")]
    AddressError { address: u32, fault: AddressFault },
    #[error("invalid register: {0}")]
    InvalidRegister(Word),
    #[error("unknown instruction: {0}")]
    UnknownInstruction(OpKey),
    #[error("`{mnemonic}` takes {expected} operand(s), got {found}")]
    OperandCount {
        mnemonic: Mnemonic,
        expected: usize,
        found: usize,
    },
}

/// Type alias for Result<T, [EmuError]>.
pub type EResult<T> = Result<T, EmuError>;
