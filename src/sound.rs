use beep::beep;
use std::error::Error;

/// Something that can make the CHIP-8 buzzer noise. Failures here are never
/// fatal to a session; callers log them and carry on.
pub trait Sound {
    fn beep(&mut self) -> Result<(), Box<dyn Error>>;
    fn stop(&mut self) -> Result<(), Box<dyn Error>>;
}

const SIMPLEBEEP_PITCH: u16 = 2093; // C

/// PC speaker tone via the `beep` crate
pub struct SimpleBeep {
    pitch: u16,
}

impl SimpleBeep {
    pub fn new() -> Self {
        SimpleBeep {
            pitch: SIMPLEBEEP_PITCH,
        }
    }
}

impl Default for SimpleBeep {
    fn default() -> Self {
        SimpleBeep::new()
    }
}

impl Sound for SimpleBeep {
    fn beep(&mut self) -> Result<(), Box<dyn Error>> {
        beep(self.pitch)?;
        Ok(())
    }

    fn stop(&mut self) -> Result<(), Box<dyn Error>> {
        beep(0)?;
        Ok(())
    }
}

#[derive(Default)]
pub struct Mute;

impl Sound for Mute {
    fn beep(&mut self) -> Result<(), Box<dyn Error>> {
        Ok(())
    }

    fn stop(&mut self) -> Result<(), Box<dyn Error>> {
        Ok(())
    }
}

/// counts buzzer edges, for tests
#[derive(Debug, Default)]
pub struct CountingSound {
    pub beeps: usize,
    pub stops: usize,
}

impl Sound for CountingSound {
    fn beep(&mut self) -> Result<(), Box<dyn Error>> {
        self.beeps += 1;
        Ok(())
    }

    fn stop(&mut self) -> Result<(), Box<dyn Error>> {
        self.stops += 1;
        Ok(())
    }
}

/// lets the buzzer be picked at runtime
impl<S: Sound + ?Sized> Sound for Box<S> {
    fn beep(&mut self) -> Result<(), Box<dyn Error>> {
        (**self).beep()
    }

    fn stop(&mut self) -> Result<(), Box<dyn Error>> {
        (**self).stop()
    }
}
