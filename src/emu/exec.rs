//! Handlers for the arithmetic, memory and control-flow instructions.
//!
//! Operand counts are checked by the engine before any handler runs.

use rand::Rng;

use crate::plat::Word;

use super::{
    alu::{self, sext16},
    engine::Cpu,
    registers::Register,
    EResult,
};

/// `harddrop d, s, imm`
pub fn harddrop(cpu: &mut Cpu<'_>, ops: &[Word]) -> EResult<()> {
    let dest = cpu.regs.check(ops[0])?;
    let sum = alu::add(cpu.regs.get(ops[1])?, sext16(ops[2]))?;
    cpu.regs.write(dest, sum);
    Ok(())
}

/// `stack d, a, b`
pub fn stack(cpu: &mut Cpu<'_>, ops: &[Word]) -> EResult<()> {
    let dest = cpu.regs.check(ops[0])?;
    let sum = alu::add(cpu.regs.get(ops[1])?, cpu.regs.get(ops[2])?)?;
    cpu.regs.write(dest, sum);
    Ok(())
}

/// `garbage d, a, b`
pub fn garbage(cpu: &mut Cpu<'_>, ops: &[Word]) -> EResult<()> {
    let dest = cpu.regs.check(ops[0])?;
    let dif = alu::sub(cpu.regs.get(ops[1])?, cpu.regs.get(ops[2])?)?;
    cpu.regs.write(dest, dif);
    Ok(())
}

/// `attack d, a, b`
pub fn attack(cpu: &mut Cpu<'_>, ops: &[Word]) -> EResult<()> {
    let dest = cpu.regs.check(ops[0])?;
    let (hi, lo) = alu::mul_wide(cpu.regs.get(ops[1])?, cpu.regs.get(ops[2])?);
    cpu.regs.write(dest, lo);
    cpu.regs.write(Register::HI, hi);
    cpu.regs.write(Register::LO, lo);
    Ok(())
}

/// `delay a, b`
pub fn delay(cpu: &mut Cpu<'_>, ops: &[Word]) -> EResult<()> {
    let a = cpu.regs.get(ops[0])?;
    let b = cpu.regs.get(ops[1])?;
    match alu::div_rem(a, b) {
        Some((rem, quot)) => {
            cpu.regs.write(Register::HI, rem);
            cpu.regs.write(Register::LO, quot);
        }
        // No arithmetic exception under any circumstances.
        None => log::debug!("delay: division by zero, HI/LO left as they were"),
    }
    Ok(())
}

fn effective_address(cpu: &Cpu<'_>, offset: Word, base: Word) -> EResult<u32> {
    Ok(cpu.regs.get(base)?.wrapping_add(sext16(offset)) as u32)
}

/// `hold t, off(base)`
pub fn hold(cpu: &mut Cpu<'_>, ops: &[Word]) -> EResult<()> {
    let value = cpu.regs.get(ops[0])?;
    let address = effective_address(cpu, ops[1], ops[2])?;
    cpu.ram.store_word(address, value)
}

/// `next t, off(base)`
pub fn next(cpu: &mut Cpu<'_>, ops: &[Word]) -> EResult<()> {
    let dest = cpu.regs.check(ops[0])?;
    let address = effective_address(cpu, ops[1], ops[2])?;
    let value = cpu.ram.load_word(address)?;
    cpu.regs.write(dest, value);
    Ok(())
}

/// `shift target`
pub fn shift(cpu: &mut Cpu<'_>, ops: &[Word]) -> EResult<()> {
    let address = (cpu.flow.program_counter() & 0xf000_0000) | ((ops[0] as u32) << 2);
    log::debug!("shift: jump to {address:#010x}");
    cpu.flow.jump(address);
    Ok(())
}

fn branch_if(cpu: &mut Cpu<'_>, ops: &[Word], taken: fn(Word, Word) -> bool) -> EResult<()> {
    let a = cpu.regs.get(ops[0])?;
    let b = cpu.regs.get(ops[1])?;
    if taken(a, b) {
        log::debug!("branch taken, offset {}", ops[2]);
        cpu.flow.branch(ops[2]);
    }
    Ok(())
}

/// `lineclear a, b, off`
pub fn lineclear(cpu: &mut Cpu<'_>, ops: &[Word]) -> EResult<()> {
    branch_if(cpu, ops, |a, b| a == b)
}

/// `nonclear a, b, off`
pub fn nonclear(cpu: &mut Cpu<'_>, ops: &[Word]) -> EResult<()> {
    branch_if(cpu, ops, |a, b| a != b)
}

/// `ghostpiece d, s, imm`
///
/// Despite the name this does write `d`.
pub fn ghostpiece(cpu: &mut Cpu<'_>, ops: &[Word]) -> EResult<()> {
    let dest = cpu.regs.check(ops[0])?;
    let imm = sext16(ops[2]);
    let sum = cpu.regs.get(ops[1])?.wrapping_add(imm);
    cpu.out.emit(&format!(
        "The value from adding {imm} to {} would be {sum}.\n",
        Word::from(dest)
    ));
    cpu.regs.write(dest, sum);
    Ok(())
}

/// `drop d`
pub fn drop(cpu: &mut Cpu<'_>, ops: &[Word]) -> EResult<()> {
    let dest = cpu.regs.check(ops[0])?;
    let roll: Word = cpu.rng.gen_range(1..=4);
    let value = cpu.regs.read(dest).wrapping_add(roll);
    cpu.regs.write(dest, value);
    Ok(())
}

/// `rotate a, b, _`
pub fn rotate(cpu: &mut Cpu<'_>, ops: &[Word]) -> EResult<()> {
    let a = cpu.regs.check(ops[0])?;
    let b = cpu.regs.check(ops[1])?;
    let (va, vb) = (cpu.regs.read(a), cpu.regs.read(b));
    cpu.regs.write(a, vb);
    cpu.regs.write(b, va);
    Ok(())
}

/// `slowgravity d, s, imm`
pub fn slowgravity(cpu: &mut Cpu<'_>, ops: &[Word]) -> EResult<()> {
    let dest = cpu.regs.check(ops[0])?;
    let value = cpu.regs.get(ops[1])?.wrapping_sub(sext16(ops[2]));
    cpu.regs.write(dest, value);
    Ok(())
}
