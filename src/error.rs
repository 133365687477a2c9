use std::io;
use thiserror::Error;

/// Everything the driver can report back to the host.
///
/// Out-of-range key indices are deliberately absent: they are caller bugs
/// and trip an assertion instead.
#[derive(Error, Debug)]
pub enum DriverError {
    /// empty or malformed program; nothing was mutated
    #[error("invalid program image: {0}")]
    InvalidImage(String),

    /// the core gave up during a frame; the chain that hit it has stopped
    #[error("core fault: {0}")]
    CoreFault(#[from] CoreFault),

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Unrecoverable conditions inside the CHIP-8 core. `pc` is the address of
/// the instruction that faulted.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoreFault {
    #[error("undefined instruction {opcode:#06x} at {pc:#06x}")]
    InvalidInstruction { pc: u16, opcode: u16 },

    #[error("call stack overflow at {pc:#06x}")]
    StackOverflow { pc: u16 },

    #[error("return with empty call stack at {pc:#06x}")]
    StackUnderflow { pc: u16 },

    #[error("memory access at {addr:#06x} out of range (pc {pc:#06x})")]
    AddressOutOfRange { pc: u16, addr: usize },
}

impl DriverError {
    pub fn is_invalid_image(&self) -> bool {
        matches!(self, DriverError::InvalidImage(_))
    }

    pub fn core_fault(&self) -> Option<&CoreFault> {
        match self {
            DriverError::CoreFault(fault) => Some(fault),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fault_message_names_pc() {
        let e = DriverError::from(CoreFault::InvalidInstruction {
            pc: 0x200,
            opcode: 0xf0ff,
        });
        assert_eq!(
            e.to_string(),
            "core fault: undefined instruction 0xf0ff at 0x0200"
        );
        assert!(e.core_fault().is_some());
        assert!(!e.is_invalid_image());
    }

    #[test]
    fn test_io_error_is_transparent() {
        let e = DriverError::from(io::Error::new(io::ErrorKind::NotFound, "no rom"));
        assert_eq!(e.to_string(), "no rom");
    }
}
