//! The event loop tying input, the refresh signal and the controller
//! together. Everything runs on one thread: input is serviced until the next
//! refresh is due, then the frame driver gets its turn.

use crate::error::{CoreFault, DriverError};
use crate::frame::RefreshSignal;
use crate::input::{HostEvent, Input, KEY_COUNT};
use crate::lifecycle::SessionController;
use crate::program::ProgramImage;
use crate::session::SessionFactory;
use std::fmt;
use std::path::PathBuf;

/// somewhere a program can be picked from
#[derive(Debug, Clone)]
pub enum ProgramSource {
    /// read afresh on every selection
    Path(PathBuf),
    Image(ProgramImage),
}

impl ProgramSource {
    pub fn load(&self) -> Result<ProgramImage, DriverError> {
        match self {
            ProgramSource::Path(path) => ProgramImage::from_path(path),
            ProgramSource::Image(image) => Ok(image.clone()),
        }
    }
}

impl fmt::Display for ProgramSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProgramSource::Path(path) => write!(f, "{}", path.display()),
            ProgramSource::Image(image) => write!(f, "{}", image.name()),
        }
    }
}

/// Synthesised key-up edges: a key stays down for `hold_frames` frames after
/// its most recent press.
#[derive(Debug)]
struct KeyHolds {
    hold_frames: u32,
    remaining: [u32; KEY_COUNT],
}

impl KeyHolds {
    fn new(hold_frames: u32) -> Self {
        KeyHolds {
            hold_frames,
            remaining: [0; KEY_COUNT],
        }
    }

    fn arm(&mut self, key: usize) {
        self.remaining[key] = self.hold_frames;
    }

    /// count a frame off every held key; returns the ones that ran out
    fn tick(&mut self) -> Vec<usize> {
        let mut expired = Vec::new();
        for (key, left) in self.remaining.iter_mut().enumerate() {
            if *left > 0 {
                *left -= 1;
                if *left == 0 {
                    expired.push(key);
                }
            }
        }
        expired
    }

    fn clear(&mut self) {
        self.remaining = [0; KEY_COUNT];
    }
}

pub struct Host<I: Input, R: RefreshSignal, F: SessionFactory> {
    input: I,
    refresh: R,
    controller: SessionController<F>,
    programs: Vec<ProgramSource>,
    current: Option<usize>,
    holds: KeyHolds,
    last_fault: Option<CoreFault>,
    quit: bool,
}

impl<I: Input, R: RefreshSignal, F: SessionFactory> Host<I, R, F> {
    pub fn new(
        input: I,
        refresh: R,
        controller: SessionController<F>,
        programs: Vec<ProgramSource>,
        key_hold_frames: u32,
    ) -> Self {
        Host {
            input,
            refresh,
            controller,
            programs,
            current: None,
            holds: KeyHolds::new(key_hold_frames),
            last_fault: None,
            quit: false,
        }
    }

    /// Load the first program and keep going until asked to quit.
    ///
    /// If the only program on offer can't even be started there is nothing
    /// to show, so that error comes straight back.
    pub fn run(&mut self) -> Result<(), DriverError> {
        if let Err(e) = self.select_next() {
            if self.programs.len() <= 1 && self.controller.session().is_none() {
                return Err(e);
            }
            self.absorb(e)?;
        }
        while !self.quit {
            self.pump_input()?;
            if self.quit {
                break;
            }
            self.refresh.wait_for_refresh();
            self.on_refresh()?;
        }
        log::debug!("quitting after {} frames", self.controller.driver().frames());
        Ok(())
    }

    /// handle input until the next refresh is due
    fn pump_input(&mut self) -> Result<(), DriverError> {
        while !self.quit {
            let remaining = self.refresh.time_until_refresh();
            match self.input.poll_event(remaining)? {
                Some(event) => self.handle(event)?,
                None if remaining.is_zero() => break,
                None => {}
            }
        }
        Ok(())
    }

    fn handle(&mut self, event: HostEvent) -> Result<(), DriverError> {
        log::trace!("host event {:?}", event);
        match event {
            HostEvent::Control(c) => {
                if let Some(key) = self.controller.on_control_activated(c) {
                    self.holds.arm(key);
                }
            }
            HostEvent::NextProgram => {
                if let Err(e) = self.select_next() {
                    self.absorb(e)?;
                }
            }
            HostEvent::Reset => self.controller.on_reset_requested(),
            HostEvent::Quit => self.quit = true,
        }
        Ok(())
    }

    /// pick the program after the current one (the first, to begin with)
    fn select_next(&mut self) -> Result<(), DriverError> {
        if self.programs.is_empty() {
            return Err(DriverError::InvalidImage("no programs to choose from".into()));
        }
        let next = self.current.map_or(0, |i| (i + 1) % self.programs.len());
        self.current = Some(next);
        let source = &self.programs[next];
        // an unreadable file is as unusable as an empty one
        let image = source
            .load()
            .map_err(|e| DriverError::InvalidImage(format!("{}: {}", source, e)))?;
        let selected = self.controller.on_program_selected(image);
        // a rejected image leaves the running session, its held keys and any
        // fault exactly as they were
        if !matches!(selected, Err(DriverError::InvalidImage(_))) {
            self.holds.clear();
            self.last_fault = None;
        }
        let chain = selected?;
        log::debug!("{} running on {}", self.programs[next], chain);
        Ok(())
    }

    fn on_refresh(&mut self) -> Result<(), DriverError> {
        if let Err(e) = self.controller.on_refresh() {
            self.absorb(e)?;
        }
        for key in self.holds.tick() {
            self.controller.on_key_released(key);
        }
        Ok(())
    }

    /// Faults and bad programs are for the user to deal with, by picking
    /// another program. Anything else (a broken terminal, say) ends the run.
    fn absorb(&mut self, e: DriverError) -> Result<(), DriverError> {
        match e {
            DriverError::CoreFault(fault) => {
                log::error!("program stopped: {}", fault);
                self.last_fault = Some(fault);
                Ok(())
            }
            DriverError::InvalidImage(reason) => {
                log::warn!("skipping program: {}", reason);
                Ok(())
            }
            e => Err(e),
        }
    }

    pub fn controller(&self) -> &SessionController<F> {
        &self.controller
    }

    /// the fault that stopped the current program, if it was stopped by one
    pub fn last_fault(&self) -> Option<CoreFault> {
        self.last_fault
    }

    pub fn current_program(&self) -> Option<usize> {
        self.current
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::DummyDisplay;
    use crate::frame::ImmediateRefresh;
    use crate::input::{KeyState, Keymap, ScriptedInput};
    use crate::lifecycle::Lifecycle;
    use crate::session::fake::{Call, FakeFactory};
    use crate::session::{Chip8Factory, Session};
    use crate::sound::CountingSound;
    use pretty_assertions::assert_eq;
    use std::collections::VecDeque;
    use std::io;
    use std::time::Duration;

    /// hands out one batch of events per refresh, then quits
    struct FramedInput {
        batches: VecDeque<VecDeque<HostEvent>>,
    }

    impl FramedInput {
        fn new(batches: Vec<Vec<HostEvent>>) -> Self {
            FramedInput {
                batches: batches.into_iter().map(VecDeque::from).collect(),
            }
        }
    }

    impl Input for FramedInput {
        fn poll_event(&mut self, _timeout: Duration) -> io::Result<Option<HostEvent>> {
            match self.batches.front_mut() {
                Some(batch) => match batch.pop_front() {
                    Some(event) => Ok(Some(event)),
                    None => {
                        self.batches.pop_front();
                        Ok(None)
                    }
                },
                None => Ok(Some(HostEvent::Quit)),
            }
        }
    }

    fn program(len: usize) -> ProgramSource {
        ProgramSource::Image(ProgramImage::new(format!("{}b", len), vec![0x12; len]))
    }

    fn fake_host(
        programs: Vec<ProgramSource>,
        batches: Vec<Vec<HostEvent>>,
        hold: u32,
    ) -> Host<FramedInput, ImmediateRefresh, FakeFactory> {
        let controller = SessionController::new(FakeFactory::default(), Keymap::conventional());
        Host::new(
            FramedInput::new(batches),
            ImmediateRefresh::default(),
            controller,
            programs,
            hold,
        )
    }

    #[test]
    fn test_runs_a_frame_per_refresh_until_quit() -> Result<(), DriverError> {
        let mut h = fake_host(vec![program(2)], vec![vec![], vec![], vec![HostEvent::Quit]], 5);
        h.run()?;
        assert_eq!(h.refresh.refreshes, 2);
        assert_eq!(h.controller().session().unwrap().frames, 3);
        Ok(())
    }

    #[test]
    fn test_key_released_after_hold_expires() -> Result<(), DriverError> {
        let mut h = fake_host(
            vec![program(2)],
            vec![vec![HostEvent::Control('w')], vec![], vec![], vec![HostEvent::Quit]],
            2,
        );
        h.run()?;
        let seen: Vec<bool> = h
            .controller()
            .session()
            .unwrap()
            .advances()
            .map(|(_, keys)| keys.is_pressed(5))
            .collect();
        assert_eq!(seen, vec![false, true, true, false]);
        Ok(())
    }

    #[test]
    fn test_auto_repeat_extends_hold() -> Result<(), DriverError> {
        let mut h = fake_host(
            vec![program(2)],
            vec![
                vec![HostEvent::Control('w')],
                vec![HostEvent::Control('w')],
                vec![],
                vec![HostEvent::Quit],
            ],
            2,
        );
        h.run()?;
        let s = h.controller().session().unwrap();
        let releases = s.calls.iter().filter(|c| **c == Call::Release(5)).count();
        assert_eq!(releases, 1);
        let seen: Vec<bool> = s.advances().map(|(_, keys)| keys.is_pressed(5)).collect();
        assert_eq!(seen, vec![false, true, true, true]);
        Ok(())
    }

    #[test]
    fn test_next_program_wraps_around() -> Result<(), DriverError> {
        let mut h = fake_host(
            vec![program(2), program(4)],
            vec![vec![HostEvent::NextProgram], vec![HostEvent::NextProgram], vec![HostEvent::Quit]],
            5,
        );
        h.run()?;
        assert_eq!(h.current_program(), Some(0));
        assert_eq!(h.controller().factory().created, 1);
        let reloads: Vec<&Call> = h
            .controller()
            .session()
            .unwrap()
            .calls
            .iter()
            .filter(|c| matches!(c, Call::Reload { .. }))
            .collect();
        assert_eq!(reloads, vec![&Call::Reload { len: 4 }, &Call::Reload { len: 2 }]);
        Ok(())
    }

    #[test]
    fn test_rejected_program_keeps_key_holds() -> Result<(), DriverError> {
        let mut h = fake_host(
            vec![program(2), program(0)],
            vec![
                vec![HostEvent::Control('w')],
                vec![HostEvent::NextProgram],
                vec![],
                vec![],
                vec![HostEvent::Quit],
            ],
            2,
        );
        h.run()?;
        let s = h.controller().session().unwrap();
        assert_eq!(s.program_len, 2);
        let seen: Vec<bool> = s.advances().map(|(_, keys)| keys.is_pressed(5)).collect();
        assert_eq!(seen, vec![false, true, true, false, false]);
        Ok(())
    }

    #[test]
    fn test_rejected_program_keeps_fault() -> Result<(), DriverError> {
        // V0 = 1, then garbage
        let bad = ProgramImage::new("bad", vec![0x60, 0x01, 0xff, 0xff]);
        let empty = ProgramImage::new("empty", vec![]);
        let factory = Chip8Factory::new(DummyDisplay::new(), CountingSound::default(), 1, Some(1));
        let controller = SessionController::new(factory, Keymap::conventional());
        let mut h = Host::new(
            FramedInput::new(vec![vec![], vec![HostEvent::NextProgram], vec![HostEvent::Quit]]),
            ImmediateRefresh::default(),
            controller,
            vec![ProgramSource::Image(bad), ProgramSource::Image(empty)],
            5,
        );
        h.run()?;
        assert_eq!(h.current_program(), Some(1));
        assert!(h.last_fault().is_some());
        assert!(h.controller().session().unwrap().fault().is_some());
        Ok(())
    }

    #[test]
    fn test_bad_program_is_skipped() -> Result<(), DriverError> {
        let mut h = fake_host(
            vec![program(0), program(2)],
            vec![vec![], vec![HostEvent::NextProgram], vec![HostEvent::Quit]],
            5,
        );
        h.run()?;
        assert_eq!(h.current_program(), Some(1));
        assert_eq!(h.controller().session().unwrap().program_len, 2);
        assert!(matches!(h.controller().lifecycle(), Lifecycle::Running(_)));
        Ok(())
    }

    #[test]
    fn test_lone_bad_program_ends_run() {
        let mut h = fake_host(vec![program(0)], vec![], 5);
        assert!(h.run().unwrap_err().is_invalid_image());
    }

    #[test]
    fn test_unreadable_path_is_an_invalid_image() {
        let missing = ProgramSource::Path(PathBuf::from("/nonexistent/pong.ch8"));
        let mut h = fake_host(vec![missing], vec![], 5);
        let e = h.run().unwrap_err();
        assert!(e.is_invalid_image());
        assert!(e.to_string().contains("pong.ch8"));
    }

    #[test]
    fn test_reset_stops_frames() -> Result<(), DriverError> {
        let mut h = fake_host(
            vec![program(2)],
            vec![vec![HostEvent::Reset], vec![], vec![HostEvent::Quit]],
            5,
        );
        h.run()?;
        assert_eq!(h.controller().lifecycle(), Lifecycle::Stopped);
        assert_eq!(h.controller().session().unwrap().frames, 1);
        Ok(())
    }

    #[test]
    fn test_fault_is_reported_and_run_continues() -> Result<(), DriverError> {
        // V0 = 1, then garbage
        let image = ProgramImage::new("bad", vec![0x60, 0x01, 0xff, 0xff]);
        let factory = Chip8Factory::new(DummyDisplay::new(), CountingSound::default(), 1, Some(1));
        let controller = SessionController::new(factory, Keymap::conventional());
        let mut h = Host::new(
            FramedInput::new(vec![vec![], vec![], vec![HostEvent::Quit]]),
            ImmediateRefresh::default(),
            controller,
            vec![ProgramSource::Image(image)],
            5,
        );
        h.run()?;
        assert_eq!(
            h.last_fault(),
            Some(CoreFault::InvalidInstruction {
                pc: 0x202,
                opcode: 0xffff
            })
        );
        assert_eq!(h.controller().lifecycle(), Lifecycle::Stopped);
        assert_eq!(h.refresh.refreshes, 2);
        Ok(())
    }

    #[test]
    fn test_key_holds_expire_independently() {
        let mut holds = KeyHolds::new(2);
        holds.arm(1);
        assert_eq!(holds.tick(), Vec::<usize>::new());
        holds.arm(2);
        assert_eq!(holds.tick(), vec![1]);
        assert_eq!(holds.tick(), vec![2]);
        assert_eq!(holds.tick(), Vec::<usize>::new());
    }

    #[test]
    fn test_input_before_first_refresh_is_all_handled() -> Result<(), DriverError> {
        let controller = SessionController::new(FakeFactory::default(), Keymap::literal());
        let input = ScriptedInput::new(&[
            HostEvent::Control('a'),
            HostEvent::Control('p'),
            HostEvent::Quit,
        ]);
        let mut h = Host::new(input, ImmediateRefresh::default(), controller, vec![program(2)], 5);
        h.run()?;
        assert_eq!(h.refresh.refreshes, 0);
        let keys: KeyState = h.controller().session().unwrap().key_state();
        assert!(keys.is_pressed(0xa));
        assert_eq!(keys.first_pressed(), Some(0xa));
        Ok(())
    }
}
