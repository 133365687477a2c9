//! # chip8
//!
//! Drives a CHIP-8 virtual machine from a display's refresh signal.
//!
//! ## Design
//!
//! * the core runs a fixed number of instructions per display frame, then
//!   ticks its timers once; there is no other clock
//! * one session per run: the first program creates it, every later program
//!   is reloaded into it
//! * each (re)load starts a new frame chain; an older chain notices it has
//!   been superseded at its next checkpoint and exits without advancing
//! * display, input and audio stay behind traits so tests can swap them out
//! * terminals only report key-down, so key-up is synthesised after a number
//!   of quiet frames
//!
//! Model
//!
//! Host
//!  |-- input, refresh signal, program list, key holds
//!  `-- session controller(keymap)
//!       |-- lifecycle: Idle -> Running(chain) <-> Stopped
//!       |-- key router, bound once
//!       |-- frame driver
//!       |    |-- start(chain): advance once, schedule next
//!       |    `-- on refresh: advance if chain still live, schedule next
//!       `-- session(display, audio)
//!            `-- interpreter(memory map, keys, timers)

pub mod config;
pub mod display;
pub mod error;
pub mod frame;
pub mod host;
pub mod input;
pub mod interpreter;
pub mod lifecycle;
pub mod memory;
pub mod program;
pub mod router;
pub mod session;
pub mod sound;

pub use error::{CoreFault, DriverError};
pub use frame::ChainId;
pub use lifecycle::{Lifecycle, SessionController};
pub use program::ProgramImage;
pub use session::{Session, SessionFactory};
