use crate::error::DriverError;

// NB. addresses are u16 as per the chip-8; lengths are usize to stop endless casting

/// Represents memory map, ROM, RAM etc.
pub trait MemoryMap {
    /// write a chunk of bytes into "RAM"; None if it would run off the end
    fn write(&mut self, data: &[u8], addr: u16) -> Option<()> {
        let bytes = self.get_rw_slice(addr, data.len())?;
        bytes.copy_from_slice(data);
        Some(())
    }

    /// get a big-endian two-byte word (opcodes)
    fn get_word(&self, addr: u16) -> Option<u16> {
        let word = self.get_ro_slice(addr, 2)?;
        Some(((word[0] as u16) << 8) + (word[1] as u16))
    }

    /// get a r/w slice of the underlying memory
    fn get_rw_slice(&mut self, addr: u16, len: usize) -> Option<&mut [u8]>;

    /// get a r/o slice of the underlying memory
    fn get_ro_slice(&self, addr: u16, len: usize) -> Option<&[u8]>;
}

/// Defines the CHIP-8 memory map as contemporary interpreters lay it out:
///   0x0000-0x004f  unused (interpreter on real hardware)
///   0x0050-0x009f  font
///   0x00a0-0x01ff  unused
///   0x0200-0x0fff  program
///
/// call stack, registers and the framebuffer live outside addressable RAM
pub struct Chip8MemoryMap {
    bytes: Box<[u8]>,
    pub program_addr: u16,
    pub font_addr: u16,
}

impl MemoryMap for Chip8MemoryMap {
    fn get_rw_slice(&mut self, addr: u16, len: usize) -> Option<&mut [u8]> {
        let a = addr as usize;
        self.bytes.get_mut(a..a.checked_add(len)?)
    }
    fn get_ro_slice(&self, addr: u16, len: usize) -> Option<&[u8]> {
        let a = addr as usize;
        self.bytes.get(a..a.checked_add(len)?)
    }
}

/// how much RAM we have
pub const CHIP8_RAM_SIZE_BYTES: usize = 4096;

/// where the program is loaded
pub const CHIP8_PROGRAM_ADDR: u16 = 0x0200;

/// biggest program that fits between the load address and the top of RAM
pub const CHIP8_MAX_PROGRAM_BYTES: usize = CHIP8_RAM_SIZE_BYTES - CHIP8_PROGRAM_ADDR as usize;

impl Chip8MemoryMap {
    /// initialises CHIP-8 with contemporary memory contents
    pub fn new() -> Self {
        let mut mm = Chip8MemoryMap {
            bytes: vec![0u8; CHIP8_RAM_SIZE_BYTES].into_boxed_slice(),
            program_addr: CHIP8_PROGRAM_ADDR,
            font_addr: CHIP8_CONTEMPORARY_FONT_ADDR,
        };
        mm.install_font();
        mm
    }

    fn install_font(&mut self) {
        let start = self.font_addr as usize;
        self.bytes[start..start + CHIP8_CONTEMPORARY_FONT.len()]
            .copy_from_slice(&CHIP8_CONTEMPORARY_FONT);
    }

    /// zero everything and put the font back
    pub fn reset(&mut self) {
        self.bytes.fill(0);
        self.install_font();
    }

    /// check a program would fit at 0x200 without touching memory
    pub fn check_program(data: &[u8]) -> Result<(), DriverError> {
        if data.is_empty() {
            return Err(DriverError::InvalidImage("program is empty".into()));
        }
        if data.len() > CHIP8_MAX_PROGRAM_BYTES {
            return Err(DriverError::InvalidImage(format!(
                "program is {} bytes; at most {} fit above {:#05x}",
                data.len(),
                CHIP8_MAX_PROGRAM_BYTES,
                CHIP8_PROGRAM_ADDR
            )));
        }
        Ok(())
    }

    /// load a CHIP-8 program at 0x200
    pub fn load_program(&mut self, data: &[u8]) -> Result<(), DriverError> {
        Chip8MemoryMap::check_program(data)?;
        self.write(data, self.program_addr)
            .ok_or_else(|| DriverError::InvalidImage("program does not fit in RAM".into()))
    }

    /// address of the 5-byte glyph for hex digit `digit` (low nibble only)
    pub fn glyph_addr(&self, digit: u8) -> u16 {
        self.font_addr + (digit & 0x0f) as u16 * 5
    }
}

impl Default for Chip8MemoryMap {
    fn default() -> Self {
        Chip8MemoryMap::new()
    }
}

const CHIP8_CONTEMPORARY_FONT_ADDR: u16 = 0x050;
const CHIP8_CONTEMPORARY_FONT: [u8; 80] = [
    0xF0, 0x90, 0x90, 0x90, 0xF0, // 0
    0x20, 0x60, 0x20, 0x20, 0x70, // 1
    0xF0, 0x10, 0xF0, 0x80, 0xF0, // 2
    0xF0, 0x10, 0xF0, 0x10, 0xF0, // 3
    0x90, 0x90, 0xF0, 0x10, 0x10, // 4
    0xF0, 0x80, 0xF0, 0x10, 0xF0, // 5
    0xF0, 0x80, 0xF0, 0x90, 0xF0, // 6
    0xF0, 0x10, 0x20, 0x40, 0x40, // 7
    0xF0, 0x90, 0xF0, 0x90, 0xF0, // 8
    0xF0, 0x90, 0xF0, 0x10, 0xF0, // 9
    0xF0, 0x90, 0xF0, 0x90, 0x90, // A
    0xE0, 0x90, 0xE0, 0x90, 0xE0, // B
    0xF0, 0x80, 0x80, 0x80, 0xF0, // C
    0xE0, 0x90, 0x90, 0x90, 0xE0, // D
    0xF0, 0x80, 0xF0, 0x80, 0xF0, // E
    0xF0, 0x80, 0xF0, 0x80, 0x80, // F
];
