use crate::error::DriverError;
use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

/// Far more than any CHIP-8 machine can hold; anything longer is cut off here.
pub const READ_LIMIT: u64 = 64 * 1024;

/// An immutable CHIP-8 binary, handed over to a session exactly once.
#[derive(Clone, PartialEq, Eq)]
pub struct ProgramImage {
    name: String,
    bytes: Box<[u8]>,
}

impl ProgramImage {
    pub fn new(name: impl Into<String>, bytes: impl Into<Box<[u8]>>) -> Self {
        ProgramImage {
            name: name.into(),
            bytes: bytes.into(),
        }
    }

    /// Read the whole reader, stopping one byte past `READ_LIMIT` so that an
    /// endless or huge source still comes out too long. Length checks are
    /// left to whoever consumes the image.
    pub fn from_reader(name: impl Into<String>, reader: &mut impl Read) -> Result<Self, io::Error> {
        let mut buf = Vec::new();
        Read::take(reader, READ_LIMIT + 1).read_to_end(&mut buf)?;
        Ok(ProgramImage::new(name, buf))
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, DriverError> {
        let path = path.as_ref();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let mut f = File::open(path)?;
        Ok(ProgramImage::from_reader(name, &mut f)?)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

// the bytes themselves are noise in logs
impl fmt::Debug for ProgramImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgramImage")
            .field("name", &self.name)
            .field("len", &self.bytes.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_reader() -> Result<(), io::Error> {
        let mut src: &[u8] = &[0x00, 0xe0, 0x12, 0x00];
        let p = ProgramImage::from_reader("cls", &mut src)?;
        assert_eq!(p.bytes(), &[0x00, 0xe0, 0x12, 0x00]);
        assert_eq!(p.len(), 4);
        assert_eq!(p.name(), "cls");
        Ok(())
    }

    #[test]
    fn test_empty_reader_gives_empty_image() -> Result<(), io::Error> {
        let mut src: &[u8] = &[];
        assert!(ProgramImage::from_reader("nothing", &mut src)?.is_empty());
        Ok(())
    }

    #[test]
    fn test_endless_reader_is_cut_off() -> Result<(), io::Error> {
        let p = ProgramImage::from_reader("zeros", &mut io::repeat(0))?;
        assert_eq!(p.len() as u64, READ_LIMIT + 1);
        assert!(crate::memory::Chip8MemoryMap::check_program(p.bytes())
            .err()
            .map_or(false, |e| e.is_invalid_image()));
        Ok(())
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let e = ProgramImage::from_path("/nonexistent/definitely/not.ch8").unwrap_err();
        assert!(matches!(e, DriverError::Io(_)));
    }

    #[test]
    fn test_debug_hides_bytes() {
        let p = ProgramImage::new("big", vec![0xaa; 64]);
        assert_eq!(format!("{:?}", p), "ProgramImage { name: \"big\", len: 64 }");
    }
}
