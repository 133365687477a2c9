use crate::input::{Keymap, KEY_COUNT};
use crate::session::Session;
use std::collections::HashMap;

/// Routes key edges from the 16 UI controls into the session's key state.
///
/// Handlers are registered once, when the first session comes into being.
/// A reload keeps the same session, so the same handlers keep working.
pub struct KeyRouter {
    keymap: Keymap,
    handlers: HashMap<char, usize>,
    binds: usize,
}

impl KeyRouter {
    pub fn new(keymap: Keymap) -> Self {
        KeyRouter {
            keymap,
            handlers: HashMap::new(),
            binds: 0,
        }
    }

    /// register a press and a release handler for every key's control
    pub fn bind(&mut self) {
        if self.is_bound() {
            log::warn!("key router already bound; ignoring rebind");
            return;
        }
        self.handlers = self.keymap.iter().collect();
        self.binds += 1;
        log::debug!("bound {} key controls", self.handlers.len());
    }

    pub fn is_bound(&self) -> bool {
        !self.handlers.is_empty()
    }

    /// how many times handlers were registered; never more than one
    pub fn bind_count(&self) -> usize {
        self.binds
    }

    pub fn keymap(&self) -> &Keymap {
        &self.keymap
    }

    pub fn on_press<S: Session + ?Sized>(&self, session: &mut S, key: usize) {
        assert!(key < KEY_COUNT, "key index {} out of range", key);
        log::trace!("key {:#x} down", key);
        session.set_key_pressed(key);
    }

    pub fn on_release<S: Session + ?Sized>(&self, session: &mut S, key: usize) {
        assert!(key < KEY_COUNT, "key index {} out of range", key);
        log::trace!("key {:#x} up", key);
        session.set_key_released(key);
    }

    /// the activated edge of a UI control; returns the key it pressed, if the
    /// control is bound to one
    pub fn on_control_activated<S: Session + ?Sized>(
        &self,
        session: &mut S,
        control: char,
    ) -> Option<usize> {
        let key = self.handler(control)?;
        self.on_press(session, key);
        Some(key)
    }

    pub fn on_control_deactivated<S: Session + ?Sized>(
        &self,
        session: &mut S,
        control: char,
    ) -> Option<usize> {
        let key = self.handler(control)?;
        self.on_release(session, key);
        Some(key)
    }

    fn handler(&self, control: char) -> Option<usize> {
        let key = self.handlers.get(&control).copied();
        if key.is_none() {
            log::trace!("no handler for control {:?}", control);
        }
        key
    }
}
