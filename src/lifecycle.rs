//! Owns the one session, and decides which frame chain (if any) is allowed
//! to drive it.

use crate::error::DriverError;
use crate::frame::{ChainId, FrameDriver};
use crate::input::Keymap;
use crate::program::ProgramImage;
use crate::router::KeyRouter;
use crate::session::{Session, SessionFactory};

/// Where the controller is in a session's life.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    /// no session yet
    Idle,
    /// a session exists and this chain is the one pumping it
    Running(ChainId),
    /// a session exists but nothing is pumping it: reset, faulted, or mid-reload
    Stopped,
}

impl Lifecycle {
    pub fn is_live(&self, chain: ChainId) -> bool {
        *self == Lifecycle::Running(chain)
    }

    pub fn live_chain(&self) -> Option<ChainId> {
        match self {
            Lifecycle::Running(chain) => Some(*chain),
            _ => None,
        }
    }

    /// ask whichever chain is running to stop at its next checkpoint
    pub fn stop(&mut self) {
        if let Lifecycle::Running(_) = self {
            *self = Lifecycle::Stopped;
        }
    }
}

/// The session lifecycle controller: creates the session on the first
/// program, reloads it for every later one, and starts a fresh frame chain
/// each time.
pub struct SessionController<F: SessionFactory> {
    factory: F,
    session: Option<F::Session>,
    lifecycle: Lifecycle,
    last_chain: u64,
    router: KeyRouter,
    driver: FrameDriver,
}

impl<F: SessionFactory> SessionController<F> {
    pub fn new(factory: F, keymap: Keymap) -> Self {
        SessionController {
            factory,
            session: None,
            lifecycle: Lifecycle::Idle,
            last_chain: 0,
            router: KeyRouter::new(keymap),
            driver: FrameDriver::new(),
        }
    }

    /// A program was picked. The first one creates the session and binds
    /// the keys; later ones stop the running chain and reload in place.
    /// Either way a new chain starts, and its id is returned.
    ///
    /// A bad image is turned away before anything changes.
    pub fn on_program_selected(&mut self, image: ProgramImage) -> Result<ChainId, DriverError> {
        if let Err(e) = self.factory.validate(&image) {
            log::warn!("rejected {:?}: {}", image, e);
            return Err(e);
        }

        let session = match self.session {
            Some(ref mut session) => {
                self.lifecycle.stop();
                log::debug!("reloading with {:?}", image);
                session.reload(image)?;
                session
            }
            ref mut slot @ None => {
                log::debug!("creating session for {:?}", image);
                let session = self.factory.create(image)?;
                self.router.bind();
                slot.insert(session)
            }
        };

        self.last_chain += 1;
        let chain = ChainId(self.last_chain);
        self.lifecycle = Lifecycle::Running(chain);
        self.driver.start(chain, &mut self.lifecycle, session)?;
        Ok(chain)
    }

    /// Stop pumping frames. The session stays; only a new program selection
    /// starts things up again.
    pub fn on_reset_requested(&mut self) {
        if let Some(chain) = self.lifecycle.live_chain() {
            log::debug!("reset requested, stopping {}", chain);
        }
        self.lifecycle.stop();
    }

    /// The display refreshed: let any scheduled frame run. Returns the number
    /// of frames advanced.
    pub fn on_refresh(&mut self) -> Result<usize, DriverError> {
        match &mut self.session {
            Some(session) => self.driver.on_refresh(&mut self.lifecycle, session),
            None => Ok(0),
        }
    }

    pub fn on_key_pressed(&mut self, key: usize) {
        match &mut self.session {
            Some(session) => self.router.on_press(session, key),
            None => log::trace!("key {:#x} down with no session", key),
        }
    }

    pub fn on_key_released(&mut self, key: usize) {
        match &mut self.session {
            Some(session) => self.router.on_release(session, key),
            None => log::trace!("key {:#x} up with no session", key),
        }
    }

    /// a UI control went down; the key it maps to, if any
    pub fn on_control_activated(&mut self, control: char) -> Option<usize> {
        let session = self.session.as_mut()?;
        self.router.on_control_activated(session, control)
    }

    pub fn on_control_deactivated(&mut self, control: char) -> Option<usize> {
        let session = self.session.as_mut()?;
        self.router.on_control_deactivated(session, control)
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    pub fn session(&self) -> Option<&F::Session> {
        self.session.as_ref()
    }

    pub fn router(&self) -> &KeyRouter {
        &self.router
    }

    pub fn driver(&self) -> &FrameDriver {
        &self.driver
    }

    pub fn factory(&self) -> &F {
        &self.factory
    }
}
