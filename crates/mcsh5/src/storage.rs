//! The bytes of an open file: memory-mapped, or read into a buffer.

use std::fs;
use std::io;
use std::path::Path;

#[cfg(feature = "mmap")]
use memmap2::Mmap;

/// Backing bytes of one open file.
pub(crate) enum Storage {
    #[cfg(feature = "mmap")]
    Mapped {
        _file: fs::File,
        mmap: Mmap,
    },
    Owned(Vec<u8>),
}

impl Storage {
    /// Open `path`, mapping it when `memory_map` is set and supported.
    pub(crate) fn open(path: &Path, memory_map: bool) -> io::Result<Storage> {
        #[cfg(feature = "mmap")]
        {
            if memory_map {
                let file = fs::File::open(path)?;
                // Zero-length files cannot be mapped on every platform.
                if file.metadata()?.len() == 0 {
                    return Ok(Storage::Owned(Vec::new()));
                }
                // SAFETY: the mapping is read-only; the file must not be
                // modified by another process while it is open.
                let mmap = unsafe { Mmap::map(&file)? };
                return Ok(Storage::Mapped { _file: file, mmap });
            }
        }
        #[cfg(not(feature = "mmap"))]
        let _ = memory_map;
        fs::read(path).map(Storage::Owned)
    }

    pub(crate) fn bytes(&self) -> &[u8] {
        match self {
            #[cfg(feature = "mmap")]
            Storage::Mapped { mmap, .. } => mmap,
            Storage::Owned(buf) => buf,
        }
    }

    pub(crate) fn is_mapped(&self) -> bool {
        match self {
            #[cfg(feature = "mmap")]
            Storage::Mapped { .. } => true,
            Storage::Owned(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn mapped_and_buffered_agree() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(b"\x89HDF\r\n\x1a\nrest").unwrap();
        tmp.flush().unwrap();

        let buffered = Storage::open(tmp.path(), false).unwrap();
        assert!(!buffered.is_mapped());
        let mapped = Storage::open(tmp.path(), true).unwrap();
        assert_eq!(mapped.is_mapped(), cfg!(feature = "mmap"));
        assert_eq!(mapped.bytes(), buffered.bytes());
    }

    #[test]
    fn empty_file_is_not_mapped() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        let storage = Storage::open(tmp.path(), true).unwrap();
        assert!(storage.bytes().is_empty());
    }

    #[test]
    fn missing_file() {
        let err = Storage::open(Path::new("/definitely/not/here.h5"), true).err().unwrap();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }
}
