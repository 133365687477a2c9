use crate::error::DriverError;
use crossterm::event::{poll, read, Event, KeyCode, KeyModifiers};
use crossterm::terminal;
use std::collections::{HashMap, VecDeque};
use std::io;
use std::time::Duration;

/// CHIP-8 has a hex keypad, 0x0 - 0xf
pub const KEY_COUNT: usize = 16;

/// The pressed/released state of the 16 keypad keys, as the core sees it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KeyState([bool; KEY_COUNT]);

impl KeyState {
    pub fn new() -> Self {
        KeyState::default()
    }

    /// panics on `key >= 16`; that is a bug in the caller, not bad input
    pub fn press(&mut self, key: usize) {
        assert!(key < KEY_COUNT, "key index {} out of range", key);
        self.0[key] = true;
    }

    pub fn release(&mut self, key: usize) {
        assert!(key < KEY_COUNT, "key index {} out of range", key);
        self.0[key] = false;
    }

    pub fn is_pressed(&self, key: usize) -> bool {
        self.0.get(key).copied().unwrap_or(false)
    }

    /// lowest-numbered key held down, if any
    pub fn first_pressed(&self) -> Option<u8> {
        self.0.iter().position(|&k| k).map(|k| k as u8)
    }

    pub fn all_released(&self) -> bool {
        !self.0.iter().any(|&k| k)
    }

    pub fn clear(&mut self) {
        self.0 = [false; KEY_COUNT];
    }
}

/// map of keys on the keyboard to what the chip8 might expect
/// where '1' => 0x01 and 'a' => 0x0a
const CHIP8_LITERAL_KEYMAP: [(char, u8); KEY_COUNT] = [
    ('0', 0x00),
    ('1', 0x01),
    ('2', 0x02),
    ('3', 0x03),
    ('4', 0x04),
    ('5', 0x05),
    ('6', 0x06),
    ('7', 0x07),
    ('8', 0x08),
    ('9', 0x09),
    ('a', 0x0a),
    ('b', 0x0b),
    ('c', 0x0c),
    ('d', 0x0d),
    ('e', 0x0e),
    ('f', 0x0f),
];

/// ditto using left-hand side of qwerty keyboard, laid out like the COSMAC
/// keypad:
///   1 2 3 C      1 2 3 4
///   4 5 6 D  ->  q w e r
///   7 8 9 E      a s d f
///   A 0 B F      z x c v
const CHIP8_CONVENTIONAL_KEYMAP: [(char, u8); KEY_COUNT] = [
    ('x', 0x00),
    ('1', 0x01),
    ('2', 0x02),
    ('3', 0x03),
    ('q', 0x04),
    ('w', 0x05),
    ('e', 0x06),
    ('a', 0x07),
    ('s', 0x08),
    ('d', 0x09),
    ('z', 0x0a),
    ('c', 0x0b),
    ('4', 0x0c),
    ('r', 0x0d),
    ('f', 0x0e),
    ('v', 0x0f),
];

/// A one-to-one mapping between 16 UI controls and the 16 key indices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Keymap {
    controls: [char; KEY_COUNT],
}

impl Keymap {
    /// every index 0x0 - 0xf must appear exactly once, and no control may be
    /// used twice
    pub fn new(pairs: &[(char, u8)]) -> Result<Keymap, DriverError> {
        if pairs.len() != KEY_COUNT {
            return Err(DriverError::Config(format!(
                "keymap needs {} controls, got {}",
                KEY_COUNT,
                pairs.len()
            )));
        }
        let mut controls: [Option<char>; KEY_COUNT] = [None; KEY_COUNT];
        let mut seen = HashMap::new();
        for &(control, index) in pairs {
            let slot = controls.get_mut(index as usize).ok_or_else(|| {
                DriverError::Config(format!("key index {:#x} out of range", index))
            })?;
            if slot.is_some() {
                return Err(DriverError::Config(format!(
                    "key {:#x} is bound more than once",
                    index
                )));
            }
            if let Some(other) = seen.insert(control, index) {
                return Err(DriverError::Config(format!(
                    "control {:?} aliases keys {:#x} and {:#x}",
                    control, other, index
                )));
            }
            *slot = Some(control);
        }
        let mut out = ['\0'; KEY_COUNT];
        for (i, c) in controls.iter().enumerate() {
            // 16 distinct in-range indices from 16 pairs fills every slot
            out[i] = c.ok_or_else(|| DriverError::Config(format!("key {:#x} unbound", i)))?;
        }
        Ok(Keymap { controls: out })
    }

    pub fn conventional() -> Keymap {
        Keymap::from_table(&CHIP8_CONVENTIONAL_KEYMAP)
    }

    pub fn literal() -> Keymap {
        Keymap::from_table(&CHIP8_LITERAL_KEYMAP)
    }

    fn from_table(table: &[(char, u8); KEY_COUNT]) -> Keymap {
        let mut controls = ['\0'; KEY_COUNT];
        for &(c, i) in table {
            controls[i as usize] = c;
        }
        Keymap { controls }
    }

    /// the control bound to key `index`
    pub fn control_for(&self, index: usize) -> char {
        self.controls[index]
    }

    /// (control, index) for every key, in index order
    pub fn iter(&self) -> impl Iterator<Item = (char, usize)> + '_ {
        self.controls.iter().enumerate().map(|(i, &c)| (c, i))
    }
}

/// what the user asked the host to do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostEvent {
    /// a keyboard control went down (or auto-repeated)
    Control(char),
    /// move on to the next program in the list
    NextProgram,
    Reset,
    Quit,
}

/// reads host events
pub trait Input {
    /// wait up to `timeout` for something to happen; None if nothing relevant
    /// did
    fn poll_event(&mut self, timeout: Duration) -> Result<Option<HostEvent>, io::Error>;
}

/// Input from the terminal, using crossterm. Raw mode is on for as long as
/// this lives.
pub struct TermInput;

impl TermInput {
    pub fn new() -> Result<Self, io::Error> {
        terminal::enable_raw_mode()?;
        Ok(TermInput)
    }
}

impl Drop for TermInput {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
    }
}

impl Input for TermInput {
    fn poll_event(&mut self, timeout: Duration) -> Result<Option<HostEvent>, io::Error> {
        if !poll(timeout)? {
            return Ok(None);
        }
        let evt = match read()? {
            Event::Key(evt) => evt,
            other => {
                log::trace!("ignoring terminal event {:?}", other);
                return Ok(None);
            }
        };
        Ok(match evt.code {
            KeyCode::Char('c') if evt.modifiers.contains(KeyModifiers::CONTROL) => {
                Some(HostEvent::Quit)
            }
            KeyCode::Char(key) => Some(HostEvent::Control(key.to_ascii_lowercase())),
            KeyCode::Tab => Some(HostEvent::NextProgram),
            KeyCode::F(5) | KeyCode::Backspace => Some(HostEvent::Reset),
            KeyCode::Esc => Some(HostEvent::Quit),
            code => {
                log::trace!("unmapped key {:?}", code);
                None
            }
        })
    }
}

/// canned Input implementation for testing; never waits
#[derive(Debug, Default)]
pub struct ScriptedInput {
    events: VecDeque<HostEvent>,
}

impl ScriptedInput {
    pub fn new(events: &[HostEvent]) -> Self {
        ScriptedInput {
            events: events.iter().copied().collect(),
        }
    }

    pub fn push(&mut self, event: HostEvent) {
        self.events.push_back(event);
    }
}

impl Input for ScriptedInput {
    fn poll_event(&mut self, _timeout: Duration) -> Result<Option<HostEvent>, io::Error> {
        Ok(self.events.pop_front())
    }
}
