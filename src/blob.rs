// Side channels for bulk results: the pipe only carries completion metadata
// while the payload travels through a file or a shared-memory segment the
// application chose at call time.

use std::fs;
use std::io;
use std::path::PathBuf;

/// Out-of-band payload source, read once after the tracker signals
/// completion. The engine stays agnostic of where the bytes live.
pub trait BlobSource: Send {
    /// Read the payload; `len` is the byte count reported by the tracker,
    /// which sources without their own end marker rely on.
    fn read(&mut self, len: Option<usize>) -> io::Result<Vec<u8>>;
}

/// File the tracker writes before signalling completion.
pub struct FileBlobSource {
    path: PathBuf,
}

impl FileBlobSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl BlobSource for FileBlobSource {
    fn read(&mut self, _len: Option<usize>) -> io::Result<Vec<u8>> {
        fs::read(&self.path)
    }
}

#[cfg(windows)]
pub use windows_shm::SharedMemoryBlobSource;

#[cfg(unix)]
pub use unix_shm::SharedMemoryBlobSource;

#[cfg(windows)]
mod windows_shm {
    use super::BlobSource;
    use std::io;
    use windows::core::PCWSTR;
    use windows::Win32::Foundation::{CloseHandle, HANDLE, INVALID_HANDLE_VALUE};
    use windows::Win32::System::Memory::{
        CreateFileMappingW, MapViewOfFile, UnmapViewOfFile, FILE_MAP_ALL_ACCESS,
        MEMORY_MAPPED_VIEW_ADDRESS, PAGE_READWRITE,
    };

    /// Named shared-memory segment created before the call so the tracker
    /// can open it by name and fill it. The mapping is released on drop,
    /// immediately after the engine reads it.
    pub struct SharedMemoryBlobSource {
        mapping: HANDLE,
        view: MEMORY_MAPPED_VIEW_ADDRESS,
        size: usize,
    }

    // The raw view pointer is only touched from the thread that reads the
    // completed segment.
    unsafe impl Send for SharedMemoryBlobSource {}

    impl SharedMemoryBlobSource {
        pub fn create(name: &str, size: usize) -> io::Result<Self> {
            let wide: Vec<u16> = name.encode_utf16().chain(std::iter::once(0)).collect();
            unsafe {
                let mapping = CreateFileMappingW(
                    INVALID_HANDLE_VALUE,
                    None,
                    PAGE_READWRITE,
                    (size as u64 >> 32) as u32,
                    size as u32,
                    PCWSTR(wide.as_ptr()),
                )
                .map_err(io::Error::other)?;

                let view = MapViewOfFile(mapping, FILE_MAP_ALL_ACCESS, 0, 0, size);
                if view.Value.is_null() {
                    let err = io::Error::last_os_error();
                    let _ = CloseHandle(mapping);
                    return Err(err);
                }

                Ok(Self {
                    mapping,
                    view,
                    size,
                })
            }
        }
    }

    impl BlobSource for SharedMemoryBlobSource {
        fn read(&mut self, len: Option<usize>) -> io::Result<Vec<u8>> {
            let len = len.unwrap_or(self.size).min(self.size);
            let bytes = unsafe { std::slice::from_raw_parts(self.view.Value as *const u8, len) };
            Ok(bytes.to_vec())
        }
    }

    impl Drop for SharedMemoryBlobSource {
        fn drop(&mut self) {
            unsafe {
                let _ = UnmapViewOfFile(self.view);
                let _ = CloseHandle(self.mapping);
            }
        }
    }
}

#[cfg(unix)]
mod unix_shm {
    use super::BlobSource;
    use std::fs::{self, OpenOptions};
    use std::io::{self, Read};
    use std::path::PathBuf;

    /// Unix stand-in for a named shared-memory segment: a pre-sized file
    /// under /dev/shm the peer writes into. Removed on drop.
    pub struct SharedMemoryBlobSource {
        path: PathBuf,
    }

    impl SharedMemoryBlobSource {
        pub fn create(name: &str, size: usize) -> io::Result<Self> {
            let path = PathBuf::from("/dev/shm").join(name);
            let file = OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .truncate(true)
                .open(&path)?;
            file.set_len(size as u64)?;
            Ok(Self { path })
        }
    }

    impl BlobSource for SharedMemoryBlobSource {
        fn read(&mut self, len: Option<usize>) -> io::Result<Vec<u8>> {
            let mut file = fs::File::open(&self.path)?;
            match len {
                Some(len) => {
                    let mut buf = vec![0u8; len];
                    file.read_exact(&mut buf)?;
                    Ok(buf)
                }
                None => {
                    let mut buf = Vec::new();
                    file.read_to_end(&mut buf)?;
                    Ok(buf)
                }
            }
        }
    }

    impl Drop for SharedMemoryBlobSource {
        fn drop(&mut self) {
            let _ = fs::remove_file(&self.path);
        }
    }
}

/// Batches of hand histories travel as UTF-8 text joined by a double
/// newline.
pub(crate) const HANDS_DELIMITER: &str = "\n\n";

/// Split a side-channel payload into individual hand histories.
pub(crate) fn split_hands(bytes: &[u8]) -> Vec<String> {
    let text = String::from_utf8_lossy(bytes);
    text.split(HANDS_DELIMITER).map(str::to_string).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn file_source_reads_and_splits_hand_batches() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"hand1\n\nhand2\n\nhand3").unwrap();

        let mut source = FileBlobSource::new(file.path());
        let bytes = source.read(None).unwrap();
        assert_eq!(
            split_hands(&bytes),
            vec!["hand1".to_string(), "hand2".into(), "hand3".into()]
        );
    }

    #[test]
    fn split_keeps_empty_segments() {
        assert_eq!(split_hands(b"a\n\n\n\nb"), vec!["a", "", "b"]);
        assert_eq!(split_hands(b""), vec![""]);
    }
}
