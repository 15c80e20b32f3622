//! Common platform code: instruction formats, mnemonics and encoding templates.

use std::fmt;

use thiserror::Error;

pub mod catalog;

/// A machine word. Registers and memory cells both hold words.
pub type Word = i32;

/// An error raised while building the catalog or encoding/decoding instruction words.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlatformError {
    #[error("malformed template for `{mnemonic}`: {reason}")]
    MalformedTemplate {
        mnemonic: Mnemonic,
        reason: &'static str,
    },
    #[error("templates for `{0}` and `{1}` overlap")]
    TemplateOverlap(Mnemonic, Mnemonic),
    #[error("no instruction matches encoding {0:#010x}")]
    UnknownEncoding(u32),
    #[error("`{mnemonic}` takes {expected} operand(s), got {found}")]
    OperandCount {
        mnemonic: Mnemonic,
        expected: usize,
        found: usize,
    },
    #[error("operand {index} of `{mnemonic}` does not fit its {width}-bit field: {value}")]
    OperandOutOfRange {
        mnemonic: Mnemonic,
        index: usize,
        width: u32,
        value: Word,
    },
}

/// Type alias for Result<T, [PlatformError]>.
pub type PResult<T> = Result<T, PlatformError>;

/// Operand format classes, describing what a mnemonic's operand list contains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Format {
    /// Register operands only.
    RegRegReg,
    /// Registers followed by one trailing 16-bit immediate.
    RegImm,
    /// `reg, offset(base)`
    RegOffsetBase,
    /// `reg, reg, offset` where offset counts words.
    Branch,
    /// A 26-bit word-aligned target.
    Jump,
    /// No operands at all.
    NoOperand,
}

impl Format {
    /// Whether instructions of this format are told apart by their function bits.
    pub fn has_funct(self) -> bool {
        matches!(self, Format::RegRegReg | Format::NoOperand)
    }
}

/// Every instruction in the set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mnemonic {
    /// `d = s + imm`, trapping on overflow.
    Harddrop,
    /// `d, LO = low(a * b)`, `HI = high(a * b)`
    Attack,
    /// `HI = a % b`, `LO = a / b`; no-op when `b == 0`.
    Delay,
    /// `d = a + b`, trapping on overflow.
    Stack,
    /// `d = a - b`, trapping on overflow.
    Garbage,
    /// `mem[base + off] = t`
    Hold,
    /// `t = mem[base + off]`
    Next,
    /// Unconditional jump.
    Shift,
    /// Branch if equal.
    Lineclear,
    /// Branch if not equal.
    Nonclear,
    /// Clear one row if every column is filled.
    Downstack,
    /// Reset the game if any column reaches the top.
    Topout,
    /// Double the score on an empty board.
    Allclear,
    /// Print the board.
    Viewboard,
    /// Clear four rows at once.
    Tetris,
    /// `d = s + imm`, printing the result.
    Ghostpiece,
    /// `d += rand(1..=4)`
    Drop,
    /// Swap two registers.
    Rotate,
    /// `d = s - imm`
    Slowgravity,
    /// Add an immediate to every board column.
    Combo,
}

impl Mnemonic {
    /// All mnemonics in catalog order.
    pub const ALL: [Mnemonic; 20] = [
        Mnemonic::Harddrop,
        Mnemonic::Attack,
        Mnemonic::Delay,
        Mnemonic::Stack,
        Mnemonic::Garbage,
        Mnemonic::Hold,
        Mnemonic::Next,
        Mnemonic::Shift,
        Mnemonic::Lineclear,
        Mnemonic::Nonclear,
        Mnemonic::Downstack,
        Mnemonic::Topout,
        Mnemonic::Allclear,
        Mnemonic::Viewboard,
        Mnemonic::Tetris,
        Mnemonic::Ghostpiece,
        Mnemonic::Drop,
        Mnemonic::Rotate,
        Mnemonic::Slowgravity,
        Mnemonic::Combo,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Mnemonic::Harddrop => "harddrop",
            Mnemonic::Attack => "attack",
            Mnemonic::Delay => "delay",
            Mnemonic::Stack => "stack",
            Mnemonic::Garbage => "garbage",
            Mnemonic::Hold => "hold",
            Mnemonic::Next => "next",
            Mnemonic::Shift => "shift",
            Mnemonic::Lineclear => "lineclear",
            Mnemonic::Nonclear => "nonclear",
            Mnemonic::Downstack => "downstack",
            Mnemonic::Topout => "topout",
            Mnemonic::Allclear => "allclear",
            Mnemonic::Viewboard => "viewboard",
            Mnemonic::Tetris => "tetris",
            Mnemonic::Ghostpiece => "ghostpiece",
            Mnemonic::Drop => "drop",
            Mnemonic::Rotate => "rotate",
            Mnemonic::Slowgravity => "slowgravity",
            Mnemonic::Combo => "combo",
        }
    }

    pub fn format(self) -> Format {
        match self {
            Mnemonic::Harddrop | Mnemonic::Ghostpiece | Mnemonic::Slowgravity | Mnemonic::Combo => {
                Format::RegImm
            }
            Mnemonic::Attack
            | Mnemonic::Delay
            | Mnemonic::Stack
            | Mnemonic::Garbage
            | Mnemonic::Drop
            | Mnemonic::Rotate => Format::RegRegReg,
            Mnemonic::Hold | Mnemonic::Next => Format::RegOffsetBase,
            Mnemonic::Shift => Format::Jump,
            Mnemonic::Lineclear | Mnemonic::Nonclear => Format::Branch,
            Mnemonic::Downstack
            | Mnemonic::Topout
            | Mnemonic::Allclear
            | Mnemonic::Viewboard
            | Mnemonic::Tetris => Format::NoOperand,
        }
    }

    /// The encoding template of this instruction.
    ///
    /// `0` and `1` are literal bits. `f`, `s` and `t` mark the fields holding operands 0, 1 and 2.
    /// Whitespace is ignored.
    pub fn template(self) -> &'static str {
        match self {
            Mnemonic::Harddrop => "001000 sssss fffff tttttttttttttttt",
            Mnemonic::Attack => "011100 sssss ttttt fffff 00000 000010",
            Mnemonic::Delay => "000000 fffff sssss 00000 00000 011010",
            Mnemonic::Stack => "000000 sssss ttttt fffff 00000 100000",
            Mnemonic::Garbage => "000000 sssss ttttt fffff 00000 100010",
            Mnemonic::Hold => "101011 ttttt fffff ssssssssssssssss",
            Mnemonic::Next => "100011 ttttt fffff ssssssssssssssss",
            Mnemonic::Shift => "000010 ffffffffffffffffffffffffff",
            Mnemonic::Lineclear => "000100 fffff sssss tttttttttttttttt",
            Mnemonic::Nonclear => "000101 fffff sssss tttttttttttttttt",
            Mnemonic::Downstack => "000000 00000000000000000000 111111",
            Mnemonic::Topout => "000000 00000000000000000000 111110",
            Mnemonic::Allclear => "000000 00000000000000000000 111101",
            Mnemonic::Viewboard => "000000 00000000000000000000 111011",
            Mnemonic::Tetris => "000000 00000000000000000000 110111",
            Mnemonic::Ghostpiece => "111010 sssss fffff tttttttttttttttt",
            Mnemonic::Drop => "011101 00000 00000 fffff 00000 000001",
            Mnemonic::Rotate => "011101 sssss ttttt fffff 00000 000010",
            Mnemonic::Slowgravity => "111011 sssss fffff tttttttttttttttt",
            Mnemonic::Combo => "111100 00000 00000 ffffffffffffffff",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Mnemonic::Harddrop => "Add immediate to register, trap on overflow",
            Mnemonic::Attack => "Multiply; low word to dest and LO, high word to HI",
            Mnemonic::Delay => "Divide; LO = quotient, HI = remainder",
            Mnemonic::Stack => "Add two registers, trap on overflow",
            Mnemonic::Garbage => "Subtract two registers, trap on overflow",
            Mnemonic::Hold => "Store word to memory",
            Mnemonic::Next => "Load word from memory",
            Mnemonic::Shift => "Jump unconditionally to target",
            Mnemonic::Lineclear => "Branch if equal",
            Mnemonic::Nonclear => "Branch if not equal",
            Mnemonic::Downstack => "If every column holds at least 1, lower all by 1 and score 1",
            Mnemonic::Topout => "If any column reaches 20, reset the board and score",
            Mnemonic::Allclear => "If the board is empty, double the score",
            Mnemonic::Viewboard => "Print the board",
            Mnemonic::Tetris => "If every column holds at least 4, lower all by 4 and score 5",
            Mnemonic::Ghostpiece => "Add immediate to register and print the result",
            Mnemonic::Drop => "Add a random 1 to 4 to a register",
            Mnemonic::Rotate => "Swap two registers",
            Mnemonic::Slowgravity => "Subtract immediate from register",
            Mnemonic::Combo => "Add immediate to every board column",
        }
    }
}

impl fmt::Display for Mnemonic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The bits that select an instruction: the primary opcode, plus the function field for
/// formats that share an opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OpKey {
    pub opcode: u8,
    pub funct: Option<u8>,
}

impl OpKey {
    /// The key an encoded word would dispatch to if its opcode is function-keyed.
    pub fn with_funct(word: u32) -> Self {
        Self {
            opcode: (word >> 26) as u8,
            funct: Some((word & 0x3f) as u8),
        }
    }

    /// The key an encoded word would dispatch to if its opcode alone selects the instruction.
    pub fn opcode_only(word: u32) -> Self {
        Self {
            opcode: (word >> 26) as u8,
            funct: None,
        }
    }
}

impl fmt::Display for OpKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.funct {
            Some(funct) => write!(f, "opcode {:#04x} funct {:#04x}", self.opcode, funct),
            None => write!(f, "opcode {:#04x}", self.opcode),
        }
    }
}

/// One operand field inside an encoding template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Field {
    /// Index into the operand list.
    pub operand: usize,
    /// Position of the field's least significant bit.
    pub shift: u32,
    pub width: u32,
}

impl Field {
    fn mask(self) -> u32 {
        ((1u64 << self.width) - 1) as u32
    }

    /// Reads the field out of `word`. 16-bit fields are sign-extended.
    pub fn extract(self, word: u32) -> Word {
        let raw = (word >> self.shift) & self.mask();
        if self.width == 16 {
            raw as u16 as i16 as Word
        } else {
            raw as Word
        }
    }

    fn fits(self, value: Word) -> bool {
        match self.width {
            16 => (i16::MIN as Word..=u16::MAX as Word).contains(&value),
            w => value >= 0 && (value as u64) < (1u64 << w),
        }
    }

    fn insert(self, value: Word) -> u32 {
        (value as u32 & self.mask()) << self.shift
    }
}

/// A parsed encoding template.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Template {
    /// Bits fixed by the template.
    pub mask: u32,
    /// Values of the fixed bits.
    pub bits: u32,
    /// Operand fields ordered by operand index.
    pub fields: Vec<Field>,
}

impl Template {
    /// Parses the template string of `mnemonic`.
    ///
    /// # Errors
    ///
    /// This function will return an error if the template isn't exactly 32 bits wide,
    /// contains an unknown character, or splits an operand field into several runs.
    pub fn parse(mnemonic: Mnemonic) -> PResult<Self> {
        let malformed = |reason| PlatformError::MalformedTemplate { mnemonic, reason };
        let chars: Vec<char> = mnemonic
            .template()
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect();
        if chars.len() != 32 {
            return Err(malformed("template must be 32 bits wide"));
        }

        let mut mask = 0u32;
        let mut bits = 0u32;
        let mut fields: Vec<Field> = vec![];
        for (i, c) in chars.iter().enumerate() {
            let bit = 31 - i as u32;
            let operand = match c {
                '0' | '1' => {
                    mask |= 1 << bit;
                    if *c == '1' {
                        bits |= 1 << bit;
                    }
                    continue;
                }
                'f' => 0,
                's' => 1,
                't' => 2,
                _ => return Err(malformed("unknown template character")),
            };
            match fields.last_mut() {
                Some(field) if field.operand == operand && field.shift == bit + 1 => {
                    field.shift = bit;
                    field.width += 1;
                }
                _ => {
                    if fields.iter().any(|f| f.operand == operand) {
                        return Err(malformed("operand field is not contiguous"));
                    }
                    fields.push(Field {
                        operand,
                        shift: bit,
                        width: 1,
                    });
                }
            }
        }

        fields.sort_by_key(|f| f.operand);
        if fields.iter().enumerate().any(|(i, f)| f.operand != i) {
            return Err(malformed("operand fields must be f, s, t in that order"));
        }
        Ok(Self { mask, bits, fields })
    }

    pub fn matches(&self, word: u32) -> bool {
        word & self.mask == self.bits
    }

    /// Whether some word would match both templates.
    pub fn overlaps(&self, other: &Template) -> bool {
        (self.bits ^ other.bits) & (self.mask & other.mask) == 0
    }

    pub fn operand_count(&self) -> usize {
        self.fields.len()
    }

    /// Reads every operand out of `word`.
    pub fn extract(&self, word: u32) -> Vec<Word> {
        self.fields.iter().map(|f| f.extract(word)).collect()
    }

    /// Packs `operands` into the template.
    ///
    /// # Errors
    ///
    /// This function will return an error if the operand count is wrong or any operand doesn't fit its field.
    pub fn encode(&self, mnemonic: Mnemonic, operands: &[Word]) -> PResult<u32> {
        if operands.len() != self.fields.len() {
            return Err(PlatformError::OperandCount {
                mnemonic,
                expected: self.fields.len(),
                found: operands.len(),
            });
        }
        let mut word = self.bits;
        for (field, &value) in self.fields.iter().zip(operands) {
            if !field.fits(value) {
                return Err(PlatformError::OperandOutOfRange {
                    mnemonic,
                    index: field.operand,
                    width: field.width,
                    value,
                });
            }
            word |= field.insert(value);
        }
        Ok(word)
    }

    /// The dispatch key of words matching this template.
    pub fn key(&self, format: Format) -> OpKey {
        let opcode = (self.bits >> 26) as u8;
        let funct = (format.has_funct() && self.mask & 0x3f == 0x3f).then_some((self.bits & 0x3f) as u8);
        OpKey { opcode, funct }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_template_parse_i_format() {
        let t = Template::parse(Mnemonic::Harddrop).unwrap();
        assert_eq!(t.mask, 0xfc00_0000);
        assert_eq!(t.bits, 0x2000_0000);
        assert_eq!(
            t.fields,
            vec![
                Field { operand: 0, shift: 16, width: 5 },
                Field { operand: 1, shift: 21, width: 5 },
                Field { operand: 2, shift: 0, width: 16 },
            ]
        );
        assert_eq!(t.key(Format::RegImm), OpKey { opcode: 0x08, funct: None });
    }

    #[test]
    fn test_template_parse_no_operand() {
        let t = Template::parse(Mnemonic::Tetris).unwrap();
        assert_eq!(t.mask, u32::MAX);
        assert_eq!(t.bits, 0b110111);
        assert!(t.fields.is_empty());
        assert_eq!(t.key(Format::NoOperand), OpKey { opcode: 0, funct: Some(0x37) });
    }

    #[test]
    fn test_jump_field_is_unsigned() {
        let t = Template::parse(Mnemonic::Shift).unwrap();
        assert_eq!(t.fields, vec![Field { operand: 0, shift: 0, width: 26 }]);
        let word = t.encode(Mnemonic::Shift, &[0x03ff_ffff]).unwrap();
        assert_eq!(word, 0x0bff_ffff);
        assert_eq!(t.extract(word), vec![0x03ff_ffff]);
    }

    #[test]
    fn test_immediate_is_sign_extended() {
        let t = Template::parse(Mnemonic::Harddrop).unwrap();
        let word = t.encode(Mnemonic::Harddrop, &[9, 8, -100]).unwrap();
        assert_eq!(word, 0x2109_ff9c);
        assert_eq!(t.extract(word), vec![9, 8, -100]);
        // Unsigned spellings of the same bits come back negative.
        let word = t.encode(Mnemonic::Harddrop, &[9, 8, 0xffff]).unwrap();
        assert_eq!(t.extract(word), vec![9, 8, -1]);
    }

    #[test]
    fn test_encode_rejects_bad_operands() {
        let t = Template::parse(Mnemonic::Stack).unwrap();
        assert_eq!(
            t.encode(Mnemonic::Stack, &[1, 2]),
            Err(PlatformError::OperandCount {
                mnemonic: Mnemonic::Stack,
                expected: 3,
                found: 2
            })
        );
        assert!(matches!(
            t.encode(Mnemonic::Stack, &[1, 2, 32]),
            Err(PlatformError::OperandOutOfRange { index: 2, width: 5, value: 32, .. })
        ));
        assert!(matches!(
            t.encode(Mnemonic::Stack, &[-1, 2, 3]),
            Err(PlatformError::OperandOutOfRange { index: 0, .. })
        ));
    }

    #[test]
    fn test_overlap() {
        let stack = Template::parse(Mnemonic::Stack).unwrap();
        let garbage = Template::parse(Mnemonic::Garbage).unwrap();
        let drop = Template::parse(Mnemonic::Drop).unwrap();
        let rotate = Template::parse(Mnemonic::Rotate).unwrap();
        assert!(!stack.overlaps(&garbage));
        assert!(!drop.overlaps(&rotate));
        assert!(stack.overlaps(&stack));
    }
}
