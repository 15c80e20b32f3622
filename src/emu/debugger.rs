use std::cell::RefCell;

use anyhow::{Context, Result};
use easy_repl::{command, repl::LoopStatus, CommandStatus, Repl};

use super::{
    board::Board,
    emulator::{EmuState, Emulator},
    engine::Output,
    registers::Register,
};

pub struct Debugger<'b, 'c, O: Output> {
    pub emu: RefCell<&'b mut Emulator<'c, O>>,
}

fn parse_address(addr: &str) -> Result<u32> {
    let parsed = match addr.strip_prefix("0x") {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => addr.parse::<u32>().or_else(|_| u32::from_str_radix(addr, 16)),
    };
    parsed.with_context(|| format!("`{addr}` is not an address"))
}

impl<'b, 'c, O: Output> Debugger<'b, 'c, O> {
    pub fn new(emu: &'b mut Emulator<'c, O>) -> Self {
        Self {
            emu: RefCell::new(emu),
        }
    }

    pub fn repl(&self) -> Result<()> {
        let mut repl = Repl::builder()
            .description("tetris-isa debug REPL")
            .add(
                "c",
                command! {
                    "Continue execution",
                    () => || {
                        self.emu.borrow_mut().state = EmuState::Continue;
                        Ok(CommandStatus::Quit)
                    }
                },
            )
            .add(
                "s",
                command! {
                    "Step one instruction",
                    () => || {
                        let mut emu = self.emu.borrow_mut();
                        if let Err(e) = emu.step_instr() {
                            eprintln!("{e:#}");
                        }
                        Ok(CommandStatus::Done)
                    }
                },
            )
            .add(
                "bt",
                command! {
                    "Print last X instructions executed",
                    (x:usize) => |x| {
                        let emu = self.emu.borrow();
                        let catalog = emu.catalog();
                        for (pc, instr) in emu.instr_history.iter().rev().take(x).rev() {
                            eprintln!("[pc={:08X}] {}", pc, catalog.render(instr));
                        }
                        Ok(CommandStatus::Done)
                    }
                },
            )
            .add(
                "pr",
                command! {
                    "Print the value of all registers",
                    () => || {
                        let emu = self.emu.borrow();
                        for reg in Register::all() {
                            eprintln!("{:>5}={:08X} ({})", reg.name(), emu.regs.read(reg), emu.regs.read(reg));
                        }
                        eprintln!("   pc={:08X}", emu.pc.value);
                        Ok(CommandStatus::Done)
                    }
                },
            )
            .add(
                "board",
                command! {
                    "Print the board and score",
                    () => || {
                        let emu = self.emu.borrow();
                        let board = Board::read(&emu.regs);
                        eprint!("{}", board.render());
                        eprintln!("score: {}", board.score);
                        Ok(CommandStatus::Done)
                    }
                },
            )
            .add(
                "peek",
                command! {
                    "Peek a word from memory",
                    (addr:String) => |addr: String| {
                        let emu = self.emu.borrow();
                        let addr = parse_address(&addr)?;
                        match emu.ram.load_word(addr) {
                            Ok(val) => eprintln!("{:08X}={:08X}", addr, val),
                            Err(e) => eprintln!("{e}"),
                        }
                        Ok(CommandStatus::Done)
                    }
                },
            )
            .add(
                "halt",
                command! {
                    "Halt execution",
                    () => || {
                        self.emu.borrow_mut().state = EmuState::Halt;
                        Ok(CommandStatus::Quit)
                    }
                },
            )
            .build()?;
        eprintln!("tetris-isa debug REPL");
        'repl: loop {
            eprintln!();
            {
                let emu = self.emu.borrow();
                match emu.fetch(emu.pc.value).map(|w| emu.catalog().resolve(w)) {
                    Some(Ok(instr)) => eprintln!(
                        "Next instruction:\n[pc={:08X}] --> {}",
                        emu.pc.value,
                        emu.catalog().render(&instr)
                    ),
                    Some(Err(e)) => eprintln!("[pc={:08X}] --> {e}", emu.pc.value),
                    None => eprintln!("[pc={:08X}] end of program", emu.pc.value),
                }
            }

            let status = repl.next()?;
            if let LoopStatus::Break = status {
                break 'repl;
            }
            {
                let emu = self.emu.borrow();
                if let EmuState::Halt = emu.state {
                    break 'repl;
                }
            }
        }
        Ok(())
    }
}
