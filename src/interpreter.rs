//! # interpreter
//!
//! A plain CHIP-8 core, as contemporary interpreters behave rather than the
//! COSMAC VIP original:
//!  * V0-VF    16 general purpose 8bit registers; VF doubles as carry/collision
//!  * I        address register (only 12 bits are meaningful)
//!  * PC       program counter, starts at 0x200
//!  * stack    16 return addresses, kept outside addressable RAM
//!  * DT / ST  delay and sound timers, counting down at 60Hz
//!  * screen   64x32 monochrome, packed 1bpp, row major, MSB leftmost
//!
//! Quirks chosen where interpreters disagree:
//!  * 8XY6 / 8XYE shift VX in place, ignoring VY
//!  * FX55 / FX65 leave I alone
//!  * sprites wrap at the screen edges
//!  * FX0A takes the lowest held key, re-executing until one is held

use crate::display::CHIP8_RESOLUTION;
use crate::error::{CoreFault, DriverError};
use crate::input::KeyState;
use crate::memory::{Chip8MemoryMap, MemoryMap, CHIP8_PROGRAM_ADDR};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const STACK_DEPTH: usize = 16;
const SCREEN_WIDTH: usize = CHIP8_RESOLUTION.0;
const SCREEN_HEIGHT: usize = CHIP8_RESOLUTION.1;
const SCREEN_BYTES: usize = SCREEN_WIDTH * SCREEN_HEIGHT / 8;

pub struct Chip8Interpreter {
    memory: Chip8MemoryMap,
    v: [u8; 16],
    i: u16,
    program_counter: u16,
    stack: [u16; STACK_DEPTH],
    stack_pointer: usize,
    delay_timer: u8,
    sound_timer: u8,
    screen: [u8; SCREEN_BYTES],
    redraw: bool,
    keys: KeyState,
    rng: StdRng,
}

impl Chip8Interpreter {
    /// `seed` pins down CXNN for reproducible runs
    pub fn new(seed: Option<u64>) -> Chip8Interpreter {
        Chip8Interpreter {
            memory: Chip8MemoryMap::new(),
            v: [0; 16],
            i: 0,
            program_counter: CHIP8_PROGRAM_ADDR,
            stack: [0; STACK_DEPTH],
            stack_pointer: 0,
            delay_timer: 0,
            sound_timer: 0,
            screen: [0; SCREEN_BYTES],
            redraw: false,
            keys: KeyState::new(),
            rng: match seed {
                Some(s) => StdRng::seed_from_u64(s),
                None => StdRng::from_entropy(),
            },
        }
    }

    /// back to power-on state, keys included; memory holds only the font
    pub fn reset(&mut self) {
        self.memory.reset();
        self.v = [0; 16];
        self.i = 0;
        self.program_counter = self.memory.program_addr;
        self.stack = [0; STACK_DEPTH];
        self.stack_pointer = 0;
        self.delay_timer = 0;
        self.sound_timer = 0;
        self.screen = [0; SCREEN_BYTES];
        // so the blank screen actually gets shown
        self.redraw = true;
        self.keys.clear();
    }

    /// load a chip8 program
    pub fn load_program(&mut self, program: &[u8]) -> Result<(), DriverError> {
        self.memory.load_program(program)
    }

    /// fetch, decode and execute one instruction
    pub fn cycle(&mut self) -> Result<(), CoreFault> {
        let pc = self.program_counter;
        let opcode = self
            .memory
            .get_word(pc)
            .ok_or(CoreFault::AddressOutOfRange {
                pc,
                addr: pc as usize,
            })?;
        self.program_counter = pc.wrapping_add(2);

        let x = ((opcode >> 8) & 0xf) as usize;
        let y = ((opcode >> 4) & 0xf) as usize;
        let n = (opcode & 0xf) as u8;
        let nn = (opcode & 0xff) as u8;
        let nnn = opcode & 0x0fff;
        let invalid = CoreFault::InvalidInstruction { pc, opcode };

        match opcode >> 12 {
            0x0 => match opcode {
                0x00e0 => self.cls(),
                0x00ee => {
                    if self.stack_pointer == 0 {
                        return Err(CoreFault::StackUnderflow { pc });
                    }
                    self.stack_pointer -= 1;
                    self.program_counter = self.stack[self.stack_pointer];
                }
                // 0NNN: machine code routine on the VIP; nothing to call here
                _ => {}
            },
            0x1 => self.program_counter = nnn,
            0x2 => {
                if self.stack_pointer == STACK_DEPTH {
                    return Err(CoreFault::StackOverflow { pc });
                }
                self.stack[self.stack_pointer] = self.program_counter;
                self.stack_pointer += 1;
                self.program_counter = nnn;
            }
            0x3 => self.skip_if(self.v[x] == nn),
            0x4 => self.skip_if(self.v[x] != nn),
            0x5 if n == 0 => self.skip_if(self.v[x] == self.v[y]),
            0x6 => self.v[x] = nn,
            0x7 => self.v[x] = self.v[x].wrapping_add(nn),
            0x8 => match n {
                0x0 => self.v[x] = self.v[y],
                0x1 => self.v[x] |= self.v[y],
                0x2 => self.v[x] &= self.v[y],
                0x3 => self.v[x] ^= self.v[y],
                0x4 => {
                    let (sum, carry) = self.v[x].overflowing_add(self.v[y]);
                    self.v[x] = sum;
                    self.v[0xf] = carry as u8;
                }
                0x5 => {
                    let (diff, borrow) = self.v[x].overflowing_sub(self.v[y]);
                    self.v[x] = diff;
                    self.v[0xf] = !borrow as u8;
                }
                0x6 => {
                    let lsb = self.v[x] & 0x01;
                    self.v[x] >>= 1;
                    self.v[0xf] = lsb;
                }
                0x7 => {
                    let (diff, borrow) = self.v[y].overflowing_sub(self.v[x]);
                    self.v[x] = diff;
                    self.v[0xf] = !borrow as u8;
                }
                0xe => {
                    let msb = self.v[x] >> 7;
                    self.v[x] <<= 1;
                    self.v[0xf] = msb;
                }
                _ => return Err(invalid),
            },
            0x9 if n == 0 => self.skip_if(self.v[x] != self.v[y]),
            0xa => self.i = nnn,
            0xb => self.program_counter = nnn + self.v[0] as u16,
            0xc => self.v[x] = self.rng.gen::<u8>() & nn,
            0xd => self.draw_sprite(pc, self.v[x], self.v[y], n)?,
            0xe => match nn {
                0x9e => self.skip_if(self.keys.is_pressed(self.v[x] as usize)),
                0xa1 => self.skip_if(!self.keys.is_pressed(self.v[x] as usize)),
                _ => return Err(invalid),
            },
            0xf => match nn {
                0x07 => self.v[x] = self.delay_timer,
                0x0a => match self.keys.first_pressed() {
                    Some(key) => self.v[x] = key,
                    // spin on this instruction until something is held
                    None => self.program_counter = pc,
                },
                0x15 => self.delay_timer = self.v[x],
                0x18 => self.sound_timer = self.v[x],
                0x1e => self.i = self.i.wrapping_add(self.v[x] as u16),
                0x29 => self.i = self.memory.glyph_addr(self.v[x]),
                0x33 => {
                    let val = self.v[x];
                    let bcd = [val / 100, (val / 10) % 10, val % 10];
                    self.store(pc, &bcd)?;
                }
                0x55 => {
                    let regs = self.v;
                    self.store(pc, &regs[..=x])?;
                }
                0x65 => {
                    let src = self.memory.get_ro_slice(self.i, x + 1).ok_or(
                        CoreFault::AddressOutOfRange {
                            pc,
                            addr: self.i as usize + x,
                        },
                    )?;
                    self.v[..=x].copy_from_slice(src);
                }
                _ => return Err(invalid),
            },
            _ => return Err(invalid),
        }
        Ok(())
    }

    /// one 60Hz timer tick
    pub fn tick_timers(&mut self) {
        self.delay_timer = self.delay_timer.saturating_sub(1);
        self.sound_timer = self.sound_timer.saturating_sub(1);
    }

    fn skip_if(&mut self, cond: bool) {
        if cond {
            self.program_counter = self.program_counter.wrapping_add(2);
        }
    }

    fn store(&mut self, pc: u16, data: &[u8]) -> Result<(), CoreFault> {
        self.memory
            .write(data, self.i)
            .ok_or(CoreFault::AddressOutOfRange {
                pc,
                addr: self.i as usize + data.len() - 1,
            })
    }

    fn cls(&mut self) {
        self.screen = [0; SCREEN_BYTES];
        self.redraw = true;
    }

    fn draw_sprite(&mut self, pc: u16, x0: u8, y0: u8, rows: u8) -> Result<(), CoreFault> {
        let sprite = self
            .memory
            .get_ro_slice(self.i, rows as usize)
            .ok_or(CoreFault::AddressOutOfRange {
                pc,
                addr: self.i as usize + rows as usize,
            })?
            .to_vec();

        self.v[0xf] = 0;
        for (row, line) in sprite.iter().enumerate() {
            for col in 0..8 {
                if line & (0x80 >> col) == 0 {
                    continue;
                }
                let px = (x0 as usize + col) % SCREEN_WIDTH;
                let py = (y0 as usize + row) % SCREEN_HEIGHT;
                if self.flip_pixel(px, py) {
                    self.v[0xf] = 1;
                }
            }
        }
        self.redraw = true;
        Ok(())
    }

    /// xor one pixel on; true if it was lit before
    fn flip_pixel(&mut self, x: usize, y: usize) -> bool {
        let idx = y * SCREEN_WIDTH + x;
        let mask = 0x80 >> (idx % 8);
        let was_lit = self.screen[idx / 8] & mask != 0;
        self.screen[idx / 8] ^= mask;
        was_lit
    }

    pub fn pixel(&self, x: usize, y: usize) -> bool {
        let idx = y * SCREEN_WIDTH + x;
        self.screen[idx / 8] & (0x80 >> (idx % 8)) != 0
    }

    /// packed framebuffer, suitable for `Display::draw`
    pub fn screen(&self) -> &[u8] {
        &self.screen
    }

    /// has the screen changed since the last time we asked
    pub fn take_redraw(&mut self) -> bool {
        std::mem::replace(&mut self.redraw, false)
    }

    pub fn sound_active(&self) -> bool {
        self.sound_timer > 0
    }

    pub fn keys(&self) -> &KeyState {
        &self.keys
    }

    pub fn keys_mut(&mut self) -> &mut KeyState {
        &mut self.keys
    }

    pub fn program_counter(&self) -> u16 {
        self.program_counter
    }

    pub fn register(&self, r: usize) -> u8 {
        self.v[r]
    }

    pub fn index(&self) -> u16 {
        self.i
    }

    pub fn delay_timer(&self) -> u8 {
        self.delay_timer
    }

    pub fn memory(&self) -> &Chip8MemoryMap {
        &self.memory
    }
}
