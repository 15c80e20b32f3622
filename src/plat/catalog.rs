//! The instruction catalog: one immutable descriptor per mnemonic, looked up by encoding.

use std::fmt::{self, Write};

use rustc_hash::FxHashMap;

use crate::emu::{board, engine::Handler, exec, registers::Register};

use super::{Format, Mnemonic, OpKey, PResult, PlatformError, Template, Word};

/// Everything the machine knows about one instruction.
#[derive(Clone)]
pub struct Descriptor {
    pub mnemonic: Mnemonic,
    pub format: Format,
    pub template: Template,
    pub key: OpKey,
    pub(crate) handler: Handler,
}

impl fmt::Debug for Descriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Descriptor")
            .field("mnemonic", &self.mnemonic)
            .field("format", &self.format)
            .field("template", &self.template)
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

impl Descriptor {
    fn new(mnemonic: Mnemonic) -> PResult<Self> {
        let template = Template::parse(mnemonic)?;
        let format = mnemonic.format();
        let key = template.key(format);
        Ok(Self {
            mnemonic,
            format,
            template,
            key,
            handler: handler(mnemonic),
        })
    }

    pub fn operand_count(&self) -> usize {
        self.template.operand_count()
    }

    /// Formats `operands` the way a listing would show them.
    pub fn render(&self, operands: &[Word]) -> String {
        let reg = |i: usize| match operands.get(i) {
            Some(&r) => match Register::try_from(r) {
                Ok(r) => r.to_string(),
                Err(_) => format!("$?{r}"),
            },
            None => "?".to_owned(),
        };
        let imm = |i: usize| operands.get(i).map_or("?".to_owned(), Word::to_string);

        let mut out = self.mnemonic.name().to_owned();
        let n = self.operand_count();
        match self.format {
            Format::NoOperand => {}
            Format::RegRegReg => {
                let regs: Vec<String> = (0..n).map(reg).collect();
                let _ = write!(out, " {}", regs.join(", "));
            }
            Format::RegImm => {
                let mut parts: Vec<String> = (0..n.saturating_sub(1)).map(reg).collect();
                parts.push(imm(n.saturating_sub(1)));
                let _ = write!(out, " {}", parts.join(", "));
            }
            Format::RegOffsetBase => {
                let _ = write!(out, " {}, {}({})", reg(0), imm(1), reg(2));
            }
            Format::Branch => {
                let _ = write!(out, " {}, {}, {}", reg(0), reg(1), imm(2));
            }
            Format::Jump => {
                let target = operands.first().copied().unwrap_or_default() as u32;
                let _ = write!(out, " {:#x}", target << 2);
            }
        }
        out
    }
}

fn handler(mnemonic: Mnemonic) -> Handler {
    match mnemonic {
        Mnemonic::Harddrop => exec::harddrop,
        Mnemonic::Attack => exec::attack,
        Mnemonic::Delay => exec::delay,
        Mnemonic::Stack => exec::stack,
        Mnemonic::Garbage => exec::garbage,
        Mnemonic::Hold => exec::hold,
        Mnemonic::Next => exec::next,
        Mnemonic::Shift => exec::shift,
        Mnemonic::Lineclear => exec::lineclear,
        Mnemonic::Nonclear => exec::nonclear,
        Mnemonic::Downstack => board::downstack,
        Mnemonic::Topout => board::topout,
        Mnemonic::Allclear => board::allclear,
        Mnemonic::Viewboard => board::viewboard,
        Mnemonic::Tetris => board::tetris,
        Mnemonic::Ghostpiece => exec::ghostpiece,
        Mnemonic::Drop => exec::drop,
        Mnemonic::Rotate => exec::rotate,
        Mnemonic::Slowgravity => exec::slowgravity,
        Mnemonic::Combo => board::combo,
    }
}

/// An instruction with its operands pulled out, ready to be dispatched.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResolvedInstruction {
    pub key: OpKey,
    pub operands: Vec<Word>,
}

impl ResolvedInstruction {
    pub fn new(key: OpKey, operands: Vec<Word>) -> Self {
        Self { key, operands }
    }
}

/// The full, immutable instruction set.
#[derive(Debug)]
pub struct Catalog {
    descriptors: Vec<Descriptor>,
    by_key: FxHashMap<OpKey, usize>,
    by_mnemonic: FxHashMap<Mnemonic, usize>,
}

impl Catalog {
    /// Builds the catalog and checks that no two encodings can be confused.
    ///
    /// # Errors
    ///
    /// This function will return an error if a template is malformed or two templates overlap.
    pub fn new() -> PResult<Self> {
        let descriptors = Mnemonic::ALL
            .iter()
            .map(|&m| Descriptor::new(m))
            .collect::<PResult<Vec<_>>>()?;

        for (i, a) in descriptors.iter().enumerate() {
            for b in &descriptors[i + 1..] {
                if a.template.overlaps(&b.template) {
                    return Err(PlatformError::TemplateOverlap(a.mnemonic, b.mnemonic));
                }
            }
        }

        let mut by_key = FxHashMap::default();
        let mut by_mnemonic = FxHashMap::default();
        for (i, desc) in descriptors.iter().enumerate() {
            if let Some(prev) = by_key.insert(desc.key, i) {
                return Err(PlatformError::TemplateOverlap(
                    descriptors[prev].mnemonic,
                    desc.mnemonic,
                ));
            }
            by_mnemonic.insert(desc.mnemonic, i);
        }
        log::debug!("built instruction catalog with {} entries", descriptors.len());

        Ok(Self {
            descriptors,
            by_key,
            by_mnemonic,
        })
    }

    pub fn descriptors(&self) -> &[Descriptor] {
        &self.descriptors
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// Looks up the descriptor a resolved instruction dispatches to.
    pub fn lookup(&self, key: OpKey) -> Option<&Descriptor> {
        self.by_key.get(&key).map(|&i| &self.descriptors[i])
    }

    pub fn get(&self, mnemonic: Mnemonic) -> &Descriptor {
        // Every mnemonic is inserted by `new`.
        &self.descriptors[self.by_mnemonic[&mnemonic]]
    }

    /// Finds the one descriptor whose template matches `word`.
    ///
    /// # Errors
    ///
    /// This function will return an error if no template matches.
    pub fn decode(&self, word: u32) -> PResult<&Descriptor> {
        [OpKey::opcode_only(word), OpKey::with_funct(word)]
            .into_iter()
            .find_map(|key| self.lookup(key))
            .filter(|desc| desc.template.matches(word))
            .ok_or(PlatformError::UnknownEncoding(word))
    }

    /// Decodes `word` and extracts its operands.
    ///
    /// # Errors
    ///
    /// This function will return an error if no template matches.
    pub fn resolve(&self, word: u32) -> PResult<ResolvedInstruction> {
        let desc = self.decode(word)?;
        Ok(ResolvedInstruction::new(desc.key, desc.template.extract(word)))
    }

    /// Encodes `mnemonic` with the given operands.
    ///
    /// # Errors
    ///
    /// This function will return an error if the operands don't fit the template.
    pub fn encode(&self, mnemonic: Mnemonic, operands: &[Word]) -> PResult<u32> {
        self.get(mnemonic).template.encode(mnemonic, operands)
    }

    /// Builds a resolved instruction directly, as a decoder would have produced it.
    pub fn instr(&self, mnemonic: Mnemonic, operands: &[Word]) -> ResolvedInstruction {
        ResolvedInstruction::new(self.get(mnemonic).key, operands.to_vec())
    }

    /// Disassembles a resolved instruction. Unknown keys render as raw keys.
    pub fn render(&self, instr: &ResolvedInstruction) -> String {
        match self.lookup(instr.key) {
            Some(desc) => desc.render(&instr.operands),
            None => format!("<{}> {:?}", instr.key, instr.operands),
        }
    }
}
