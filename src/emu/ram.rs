use crate::plat::Word;

use super::{AddressFault, EResult, EmuError};

/// Base address of the data segment unless configured otherwise.
pub const DEFAULT_DATA_BASE: u32 = 0x1001_0000;
/// Size of the data segment in bytes unless configured otherwise.
pub const DEFAULT_DATA_SIZE: u32 = 0x1_0000;

/// Word-addressed data memory mapped at `[base, base + size)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ram {
    base: u32,
    words: Box<[Word]>,
}

impl Ram {
    /// Creates a new [`Ram`] instance of `size` bytes at `base`, initialized to zero.
    ///
    /// `size` is rounded down to a whole number of words, and the segment is clipped at the end
    /// of the address space.
    pub fn new(base: u32, size: u32) -> Self {
        let size = u64::from(size).min((1u64 << 32) - u64::from(base)) / 4;
        Self {
            base,
            words: vec![0; size as usize].into_boxed_slice(),
        }
    }

    pub fn base(&self) -> u32 {
        self.base
    }

    /// Size of the mapped segment in bytes.
    pub fn size(&self) -> u32 {
        (self.words.len() as u32).saturating_mul(4)
    }

    fn slot(&self, address: u32) -> EResult<usize> {
        if address % 4 != 0 {
            return Err(EmuError::AddressError {
                address,
                fault: AddressFault::Misaligned,
            });
        }
        match address.checked_sub(self.base) {
            Some(offset) if ((offset / 4) as usize) < self.words.len() => Ok((offset / 4) as usize),
            _ => Err(EmuError::AddressError {
                address,
                fault: AddressFault::Unmapped,
            }),
        }
    }

    /// Reads the word at `address`.
    ///
    /// # Errors
    ///
    /// Returns [`EmuError::AddressError`] if `address` is misaligned or unmapped.
    pub fn load_word(&self, address: u32) -> EResult<Word> {
        Ok(self.words[self.slot(address)?])
    }

    /// Writes `value` to `address`.
    ///
    /// # Errors
    ///
    /// Returns [`EmuError::AddressError`] if `address` is misaligned or unmapped.
    pub fn store_word(&mut self, address: u32, value: Word) -> EResult<()> {
        let slot = self.slot(address)?;
        self.words[slot] = value;
        Ok(())
    }
}

impl Default for Ram {
    fn default() -> Self {
        Self::new(DEFAULT_DATA_BASE, DEFAULT_DATA_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_store() {
        let mut ram = Ram::default();
        ram.store_word(DEFAULT_DATA_BASE + 8, -3).unwrap();
        assert_eq!(ram.load_word(DEFAULT_DATA_BASE + 8).unwrap(), -3);
        assert_eq!(ram.load_word(DEFAULT_DATA_BASE + 4).unwrap(), 0);
        let last = DEFAULT_DATA_BASE + DEFAULT_DATA_SIZE - 4;
        ram.store_word(last, 1).unwrap();
        assert_eq!(ram.load_word(last).unwrap(), 1);
    }

    #[test]
    fn test_misaligned() {
        let mut ram = Ram::default();
        let before = ram.clone();
        assert_eq!(
            ram.store_word(DEFAULT_DATA_BASE + 2, 5),
            Err(EmuError::AddressError {
                address: DEFAULT_DATA_BASE + 2,
                fault: AddressFault::Misaligned
            })
        );
        assert_eq!(ram, before);
    }

    #[test]
    fn test_unmapped() {
        let ram = Ram::new(0x100, 16);
        assert_eq!(ram.size(), 16);
        assert!(ram.load_word(0x10c).is_ok());
        for address in [0xfc, 0x110, 0, 0xffff_fffc] {
            assert_eq!(
                ram.load_word(address),
                Err(EmuError::AddressError {
                    address,
                    fault: AddressFault::Unmapped
                })
            );
        }
    }

    #[test]
    fn test_segment_clipped_at_top_of_address_space() {
        let ram = Ram::new(0xffff_fff0, 0x100);
        assert_eq!(ram.size(), 16);
        assert!(ram.load_word(0xffff_fffc).is_ok());
    }
}
