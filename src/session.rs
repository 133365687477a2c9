//! The capability interface between the driver and a virtual machine core,
//! and the adapter that puts the CHIP-8 interpreter behind it.

use crate::display::Display;
use crate::error::{CoreFault, DriverError};
use crate::input::KeyState;
use crate::interpreter::Chip8Interpreter;
use crate::memory::Chip8MemoryMap;
use crate::program::ProgramImage;
use crate::sound::Sound;
use std::io;

/// One live virtual machine with its loaded program and key state.
///
/// Key indices must be below 16; anything else is a bug in the caller and
/// implementations panic.
pub trait Session {
    /// run one display frame's worth of instructions, timers and redraw
    fn advance_frame(&mut self) -> Result<(), DriverError>;

    /// reset the machine and load `image`, keeping this session's identity
    fn reload(&mut self, image: ProgramImage) -> Result<(), DriverError>;

    fn set_key_pressed(&mut self, key: usize);

    fn set_key_released(&mut self, key: usize);

    fn key_state(&self) -> KeyState;
}

/// Makes the one session a controller will ever own.
pub trait SessionFactory {
    type Session: Session;

    /// decide whether `image` is acceptable without touching any state
    fn validate(&self, image: &ProgramImage) -> Result<(), DriverError> {
        if image.is_empty() {
            return Err(DriverError::InvalidImage("program is empty".into()));
        }
        Ok(())
    }

    fn create(&mut self, image: ProgramImage) -> Result<Self::Session, DriverError>;
}

/// `Chip8Interpreter` wired to a display and a buzzer.
pub struct Chip8Session<D: Display, S: Sound> {
    core: Chip8Interpreter,
    display: D,
    sound: S,
    cycles_per_frame: u32,
    fault: Option<CoreFault>,
    beeping: bool,
    frames: u64,
}

impl<D: Display, S: Sound> Chip8Session<D, S> {
    fn new(core: Chip8Interpreter, display: D, sound: S, cycles_per_frame: u32) -> Self {
        debug_assert_eq!(
            core.screen().len(),
            display.get_display_size_bytes(),
            "display can't show this core's screen"
        );
        Chip8Session {
            core,
            display,
            sound,
            cycles_per_frame,
            fault: None,
            beeping: false,
            frames: 0,
        }
    }

    fn load(&mut self, image: ProgramImage) -> Result<(), DriverError> {
        Chip8MemoryMap::check_program(image.bytes())?;
        self.core.reset();
        self.core.load_program(image.bytes())?;
        self.fault = None;
        self.frames = 0;
        self.set_beeping(false);
        self.display.set_title(image.name());
        log::debug!("loaded {:?}", image);
        Ok(())
    }

    fn set_beeping(&mut self, on: bool) {
        if on == self.beeping {
            return;
        }
        let r = if on {
            self.sound.beep()
        } else {
            self.sound.stop()
        };
        if let Err(e) = r {
            log::warn!("buzzer: {}", e);
        }
        self.beeping = on;
    }

    /// the fault that stopped this session, if any; cleared by reload
    pub fn fault(&self) -> Option<CoreFault> {
        self.fault
    }

    /// frames advanced since the last (re)load
    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn core(&self) -> &Chip8Interpreter {
        &self.core
    }

    pub fn display(&self) -> &D {
        &self.display
    }

    pub fn sound(&self) -> &S {
        &self.sound
    }
}

impl<D: Display, S: Sound> Session for Chip8Session<D, S> {
    fn advance_frame(&mut self) -> Result<(), DriverError> {
        // a faulted core stays put until reloaded
        if let Some(fault) = self.fault {
            return Err(fault.into());
        }
        for _ in 0..self.cycles_per_frame {
            if let Err(fault) = self.core.cycle() {
                log::error!("{} after {} frames", fault, self.frames);
                self.fault = Some(fault);
                self.set_beeping(false);
                return Err(fault.into());
            }
        }
        self.core.tick_timers();
        if self.core.take_redraw() {
            self.display.draw(self.core.screen())?;
        }
        let sound = self.core.sound_active();
        self.set_beeping(sound);
        self.frames += 1;
        log::trace!("frame {} done, pc {:#06x}", self.frames, self.core.program_counter());
        Ok(())
    }

    fn reload(&mut self, image: ProgramImage) -> Result<(), DriverError> {
        self.load(image)
    }

    fn set_key_pressed(&mut self, key: usize) {
        self.core.keys_mut().press(key);
    }

    fn set_key_released(&mut self, key: usize) {
        self.core.keys_mut().release(key);
    }

    fn key_state(&self) -> KeyState {
        *self.core.keys()
    }
}

/// Hands its display and buzzer over to the first session it creates.
pub struct Chip8Factory<D: Display, S: Sound> {
    parts: Option<(D, S)>,
    cycles_per_frame: u32,
    seed: Option<u64>,
}

impl<D: Display, S: Sound> Chip8Factory<D, S> {
    pub fn new(display: D, sound: S, cycles_per_frame: u32, seed: Option<u64>) -> Self {
        Chip8Factory {
            parts: Some((display, sound)),
            cycles_per_frame,
            seed,
        }
    }
}

impl<D: Display, S: Sound> SessionFactory for Chip8Factory<D, S> {
    type Session = Chip8Session<D, S>;

    fn validate(&self, image: &ProgramImage) -> Result<(), DriverError> {
        Chip8MemoryMap::check_program(image.bytes())
    }

    fn create(&mut self, image: ProgramImage) -> Result<Self::Session, DriverError> {
        self.validate(&image)?;
        let (display, sound) = self.parts.take().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::AlreadyExists,
                "display already belongs to a session",
            )
        })?;
        let core = Chip8Interpreter::new(self.seed);
        let mut session = Chip8Session::new(core, display, sound, self.cycles_per_frame);
        session.load(image)?;
        Ok(session)
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::DummyDisplay;
    use crate::sound::CountingSound;

    fn image(words: &[u16]) -> ProgramImage {
        let bytes: Vec<u8> = words.iter().flat_map(|w| w.to_be_bytes()).collect();
        ProgramImage::new("test", bytes)
    }

    fn factory(cycles: u32) -> Chip8Factory<DummyDisplay, CountingSound> {
        Chip8Factory::new(DummyDisplay::new(), CountingSound::default(), cycles, Some(1))
    }

    #[test]
    fn test_create_loads_program() -> Result<(), DriverError> {
        let s = factory(10).create(image(&[0x6142, 0x1202]))?;
        assert_eq!(s.core().program_counter(), 0x200);
        assert_eq!(s.display().title, "test");
        assert_eq!(s.frames(), 0);
        Ok(())
    }

    #[test]
    fn test_factory_only_creates_once() -> Result<(), DriverError> {
        let mut f = factory(10);
        f.create(image(&[0x1200]))?;
        assert!(matches!(f.create(image(&[0x1200])), Err(DriverError::Io(_))));
        Ok(())
    }

    #[test]
    fn test_factory_rejects_bad_images() {
        let mut f = factory(10);
        assert!(matches!(
            f.create(ProgramImage::new("empty", vec![])),
            Err(e) if e.is_invalid_image()
        ));
        assert!(matches!(
            f.create(ProgramImage::new("huge", vec![0; 3585])),
            Err(e) if e.is_invalid_image()
        ));
        // nothing was handed over
        assert!(f.parts.is_some());
    }

    #[test]
    fn test_frame_runs_cycles_then_draws() -> Result<(), DriverError> {
        // V1 += 1 forever
        let mut s = factory(10).create(image(&[0x00e0, 0x7101, 0x1202]))?;
        s.advance_frame()?;
        // cls + 9 instructions of the 2-instruction loop
        assert_eq!(s.core().register(1), 5);
        assert_eq!(s.display().draws, 1);
        s.advance_frame()?;
        assert_eq!(s.core().register(1), 10);
        // nothing new on screen, nothing redrawn
        assert_eq!(s.display().draws, 1);
        assert_eq!(s.frames(), 2);
        Ok(())
    }

    #[test]
    fn test_fault_is_sticky_until_reload() -> Result<(), DriverError> {
        let mut s = factory(10).create(image(&[0x6001, 0xffff]))?;
        let e = s.advance_frame().unwrap_err();
        assert_eq!(
            e.core_fault(),
            Some(&CoreFault::InvalidInstruction {
                pc: 0x202,
                opcode: 0xffff
            })
        );
        // inspectable, and refuses to go on
        assert_eq!(s.core().register(0), 1);
        assert!(s.advance_frame().is_err());
        assert_eq!(s.display().draws, 0);

        s.reload(image(&[0x1200]))?;
        assert_eq!(s.fault(), None);
        s.advance_frame()?;
        Ok(())
    }

    #[test]
    fn test_reload_resets_keys_and_machine() -> Result<(), DriverError> {
        let mut s = factory(1).create(image(&[0x6133, 0x1202]))?;
        s.advance_frame()?;
        s.set_key_pressed(5);
        assert!(s.key_state().is_pressed(5));
        s.reload(image(&[0x1200]))?;
        assert!(s.key_state().all_released());
        assert_eq!(s.core().register(1), 0);
        assert_eq!(s.core().program_counter(), 0x200);
        Ok(())
    }

    #[test]
    fn test_bad_reload_leaves_session_alone() -> Result<(), DriverError> {
        let mut s = factory(1).create(image(&[0x6133, 0x1202]))?;
        s.advance_frame()?;
        assert!(s.reload(ProgramImage::new("x", vec![])).is_err());
        assert_eq!(s.core().register(1), 0x33);
        Ok(())
    }

    #[test]
    fn test_buzzer_follows_sound_timer() -> Result<(), DriverError> {
        // ST = 2, then spin
        let mut s = factory(2).create(image(&[0x6002, 0xf018, 0x1204]))?;
        s.advance_frame()?;
        assert_eq!((s.sound().beeps, s.sound().stops), (1, 0));
        s.advance_frame()?;
        assert_eq!((s.sound().beeps, s.sound().stops), (1, 1));
        s.advance_frame()?;
        assert_eq!((s.sound().beeps, s.sound().stops), (1, 1));
        Ok(())
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn test_key_out_of_range_is_a_bug() {
        let mut s = factory(1).create(image(&[0x1200])).unwrap();
        s.set_key_pressed(16);
    }
}
