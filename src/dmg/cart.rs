// cartridge header parsing and ROM access
use crate::engine::InitializationError;

const HEADER_END: usize = 0x150;
const TITLE: std::ops::Range<usize> = 0x134..0x143;
const CHECKSUM: usize = 0x14D;

pub struct Cartridge {
    pub title: String,
    pub kind: u8,
    rom: Vec<u8>,
}

impl Cartridge {
    pub fn parse(rom: &[u8]) -> Result<Self, InitializationError> {
        if rom.len() < HEADER_END {
            return Err(InitializationError::InvalidImage(format!(
                "ROM too small: {} bytes, header needs {HEADER_END}",
                rom.len()
            )));
        }

        let expected = header_checksum(rom);
        if rom[CHECKSUM] != expected {
            return Err(InitializationError::InvalidImage(format!(
                "header checksum mismatch: stored 0x{:02X}, computed 0x{expected:02X}",
                rom[CHECKSUM]
            )));
        }

        let title = rom[TITLE]
            .iter()
            .take_while(|&&b| b != 0)
            .map(|&b| if b.is_ascii_graphic() || b == b' ' { b as char } else { '?' })
            .collect::<String>()
            .trim_end()
            .to_string();

        Ok(Self { title, kind: rom[0x147], rom: rom.to_vec() })
    }

    // TODO: MBC1/MBC3 bank switching; only the first 32 KiB are mapped
    pub fn read(&self, addr: u16) -> u8 {
        self.rom.get(addr as usize).copied().unwrap_or(0xFF)
    }
}

/// Checksum over 0x134..=0x14C as computed by the boot ROM.
pub fn header_checksum(rom: &[u8]) -> u8 {
    rom[0x134..=0x14C].iter().fold(0u8, |x, &b| x.wrapping_sub(b).wrapping_sub(1))
}
