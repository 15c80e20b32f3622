//! The game layer: ten registers read as the columns of a board, one as the score.
//!
//! Every rule here is all-or-nothing. A rule whose condition doesn't hold leaves the board,
//! the score and the output untouched.

use std::fmt::Write;

use crate::plat::Word;

use super::{
    alu::sext16,
    engine::Cpu,
    registers::{Register, RegisterFile},
    EResult,
};

/// The board columns: `$t0`-`$t7` followed by `$t8`-`$t9`.
pub const BOARD: [Register; 10] = [
    Register::T0,
    Register::T1,
    Register::T2,
    Register::T3,
    Register::T4,
    Register::T5,
    Register::T6,
    Register::T7,
    Register::T8,
    Register::T9,
];

/// The score counter.
pub const SCORE: Register = Register::S0;

/// Height at which a column tops out.
pub const TOP: Word = 20;

/// A read-only view of the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Board {
    pub columns: [Word; 10],
    pub score: Word,
}

impl Board {
    pub fn read(regs: &RegisterFile) -> Self {
        Self {
            columns: BOARD.map(|r| regs.read(r)),
            score: regs.read(SCORE),
        }
    }

    /// Writes the board back. The inverse of [`Board::read`].
    pub fn write(&self, regs: &mut RegisterFile) {
        for (reg, value) in BOARD.iter().zip(self.columns) {
            regs.write(*reg, value);
        }
        regs.write(SCORE, self.score);
    }

    fn lower(&mut self, rows: Word, points: Word) {
        for column in &mut self.columns {
            *column = column.wrapping_sub(rows);
        }
        self.score = self.score.wrapping_add(points);
    }

    /// The text `viewboard` prints.
    pub fn render(&self) -> String {
        let mut out = String::from("The current board is: \n");
        for reg in BOARD {
            let _ = write!(out, "{reg} ");
        }
        out.push('\n');
        for value in self.columns {
            let _ = write!(out, "{value} ");
        }
        out.push('\n');
        out
    }
}

fn clear_rows(cpu: &mut Cpu<'_>, rows: Word, points: Word) -> bool {
    let mut board = Board::read(cpu.regs);
    if board.columns.iter().any(|&c| c < rows) {
        return false;
    }
    board.lower(rows, points);
    board.write(cpu.regs);
    log::debug!("cleared {rows} row(s), score now {}", board.score);
    true
}

/// `downstack`
pub fn downstack(cpu: &mut Cpu<'_>, _ops: &[Word]) -> EResult<()> {
    clear_rows(cpu, 1, 1);
    Ok(())
}

/// `tetris`
pub fn tetris(cpu: &mut Cpu<'_>, _ops: &[Word]) -> EResult<()> {
    if clear_rows(cpu, 4, 5) {
        cpu.out.emit("Tetris! Score: +5\n");
    }
    Ok(())
}

/// `topout`
pub fn topout(cpu: &mut Cpu<'_>, _ops: &[Word]) -> EResult<()> {
    let board = Board::read(cpu.regs);
    if board.columns.iter().any(|&c| c >= TOP) {
        Board {
            columns: [0; 10],
            score: 0,
        }
        .write(cpu.regs);
        log::debug!("topped out with score {}", board.score);
        cpu.out.emit(&format!(
            "Your final score was {}!\nResetting game.\n",
            board.score
        ));
    }
    Ok(())
}

/// `allclear`
pub fn allclear(cpu: &mut Cpu<'_>, _ops: &[Word]) -> EResult<()> {
    let score = cpu.regs.read(SCORE);
    if Board::read(cpu.regs).columns.iter().all(|&c| c == 0) {
        cpu.regs.write(SCORE, score.wrapping_mul(2));
        cpu.out.emit("All clear! Doubling score.\n");
    }
    Ok(())
}

/// `viewboard`
pub fn viewboard(cpu: &mut Cpu<'_>, _ops: &[Word]) -> EResult<()> {
    cpu.out.emit(&Board::read(cpu.regs).render());
    Ok(())
}

/// `combo imm`
pub fn combo(cpu: &mut Cpu<'_>, ops: &[Word]) -> EResult<()> {
    let imm = sext16(ops[0]);
    for reg in BOARD {
        let value = cpu.regs.read(reg).wrapping_add(imm);
        cpu.regs.write(reg, value);
    }
    Ok(())
}
