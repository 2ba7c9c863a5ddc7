//! Byte source/sink shared by decoders and encoders.
//!
//! A [`Stream`] is a window `(offset, size)` over a backend handle. Child
//! streams share the parent's backend through a reference count and carve
//! their own window out of the parent's; the backend is closed when the last
//! stream over it goes away. The combine container uses this to hand each
//! embedded file its own sub-stream of one open handle.

use std::cell::RefCell;
use std::fs::OpenOptions;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::rc::Rc;

use crate::error::{bail_if, GryphErr};

enum Backend {
    File(std::fs::File),
    /// Fixed-size buffer. Reads and writes truncate at the end, the way a
    /// caller-provided arena would.
    Memory { data: Vec<u8>, pos: usize },
}

impl Backend {
    fn len(&mut self) -> u32 {
        match self {
            Backend::File(f) => f.metadata().map(|m| m.len() as u32).unwrap_or(0),
            Backend::Memory { data, .. } => data.len() as u32,
        }
    }

    fn seek(&mut self, pos: u32) -> Result<(), GryphErr> {
        match self {
            Backend::File(f) => {
                f.seek(SeekFrom::Start(pos as u64))?;
                Ok(())
            }
            Backend::Memory { data, pos: p } => {
                // The memory backend rejects positioning at or past the end;
                // a file handle leaves that to the OS.
                bail_if!(pos as usize >= data.len() && !data.is_empty(), Io);
                bail_if!(data.is_empty() && pos != 0, Io);
                *p = pos as usize;
                Ok(())
            }
        }
    }

    fn read(&mut self, out: &mut [u8]) -> Result<usize, GryphErr> {
        match self {
            Backend::File(f) => {
                let mut total = 0;
                while total < out.len() {
                    let n = f.read(&mut out[total..])?;
                    if n == 0 {
                        break;
                    }
                    total += n;
                }
                Ok(total)
            }
            Backend::Memory { data, pos } => {
                let avail = data.len().saturating_sub(*pos);
                let n = out.len().min(avail);
                out[..n].copy_from_slice(&data[*pos..*pos + n]);
                *pos += n;
                Ok(n)
            }
        }
    }

    fn write(&mut self, src: &[u8]) -> Result<usize, GryphErr> {
        match self {
            Backend::File(f) => {
                f.write_all(src)?;
                Ok(src.len())
            }
            Backend::Memory { data, pos } => {
                let avail = data.len().saturating_sub(*pos);
                let n = src.len().min(avail);
                data[*pos..*pos + n].copy_from_slice(&src[..n]);
                *pos += n;
                Ok(n)
            }
        }
    }
}

/// A positioned window over a shared file or memory handle.
pub struct Stream {
    backend: Rc<RefCell<Backend>>,
    /// Window start within the backend.
    offset: u32,
    /// Window length.
    size: u32,
    /// `(offset, size)` of the parent window when this stream was created
    /// with [`Stream::child`].
    parent_window: Option<(u32, u32)>,
    /// Kept so an encoder opened on an empty file can still be routed to a
    /// format by its extension.
    path: Option<PathBuf>,
}

impl Stream {
    /// Open an existing file for reading.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, GryphErr> {
        let file = OpenOptions::new().read(true).open(path.as_ref())?;
        let mut backend = Backend::File(file);
        let size = backend.len();
        Ok(Stream {
            backend: Rc::new(RefCell::new(backend)),
            offset: 0,
            size,
            parent_window: None,
            path: Some(path.as_ref().to_path_buf()),
        })
    }

    /// Create (or truncate) a file for writing.
    pub fn create(path: impl AsRef<Path>) -> Result<Self, GryphErr> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path.as_ref())?;
        Ok(Stream {
            backend: Rc::new(RefCell::new(Backend::File(file))),
            offset: 0,
            size: 0,
            parent_window: None,
            path: Some(path.as_ref().to_path_buf()),
        })
    }

    /// Wrap a fixed-size buffer. Writes never grow it.
    pub fn memory(data: Vec<u8>) -> Self {
        let size = data.len() as u32;
        Stream {
            backend: Rc::new(RefCell::new(Backend::Memory { data, pos: 0 })),
            offset: 0,
            size,
            parent_window: None,
            path: None,
        }
    }

    /// A new stream over the same backend, initially covering this stream's
    /// window. Usually followed by [`Stream::set_window`].
    pub fn child(&self) -> Self {
        Stream {
            backend: Rc::clone(&self.backend),
            offset: self.offset,
            size: self.size,
            parent_window: Some((self.offset, self.size)),
            path: None,
        }
    }

    /// Re-anchor the window. For a child stream `off` is relative to the
    /// parent's window; `size == 0` means "the rest of the parent". A root
    /// stream just moves its origin. Seeks to the new window start.
    pub fn set_window(&mut self, off: u32, size: u32) -> Result<(), GryphErr> {
        if let Some((parent_off, parent_size)) = self.parent_window {
            self.offset = parent_off + off;
            self.size = if size != 0 {
                size
            } else {
                parent_size.saturating_sub(self.offset)
            };
        } else {
            self.offset = off;
        }
        let target = self.offset;
        self.backend.borrow_mut().seek(target)
    }

    /// Window length in bytes.
    pub fn size(&self) -> u32 {
        self.size
    }

    pub(crate) fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Position at `pos` within the window.
    pub fn seek(&mut self, pos: u32) -> Result<(), GryphErr> {
        let target = self.offset + pos;
        self.backend.borrow_mut().seek(target)
    }

    /// Read up to `out.len()` bytes, returning how many were transferred.
    pub fn read(&mut self, out: &mut [u8]) -> Result<usize, GryphErr> {
        self.backend.borrow_mut().read(out)
    }

    /// Read exactly `out.len()` bytes or fail.
    pub fn read_exact(&mut self, out: &mut [u8]) -> Result<(), GryphErr> {
        let n = self.read(out)?;
        bail_if!(n != out.len(), Io);
        Ok(())
    }

    /// Write the whole of `src` or fail.
    pub fn write_all(&mut self, src: &[u8]) -> Result<(), GryphErr> {
        let n = self.backend.borrow_mut().write(src)?;
        bail_if!(n != src.len(), Io);
        Ok(())
    }

    /// Snapshot of a memory backend's buffer. `None` for file streams.
    pub fn to_vec(&self) -> Option<Vec<u8>> {
        match &*self.backend.borrow() {
            Backend::Memory { data, .. } => Some(data.clone()),
            Backend::File(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_read_truncates_and_advances() {
        let mut s = Stream::memory(vec![1, 2, 3, 4, 5]);
        let mut buf = [0u8; 4];
        assert_eq!(s.read(&mut buf).unwrap(), 4);
        assert_eq!(buf, [1, 2, 3, 4]);
        assert_eq!(s.read(&mut buf).unwrap(), 1);
        assert_eq!(buf[0], 5);
        assert_eq!(s.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn memory_seek_past_end_is_rejected() {
        let mut s = Stream::memory(vec![0u8; 8]);
        assert!(s.seek(7).is_ok());
        assert!(s.seek(8).is_err());
    }

    #[test]
    fn memory_write_truncates_at_capacity() {
        let mut s = Stream::memory(vec![0u8; 4]);
        s.seek(2).unwrap();
        assert!(s.write_all(&[9, 9, 9]).is_err());
        assert_eq!(s.to_vec().unwrap(), vec![0, 0, 9, 9]);
    }

    #[test]
    fn child_window_offsets_reads() {
        let mut parent = Stream::memory((0u8..16).collect());
        parent.set_window(0, 0).unwrap();
        let mut child = parent.child();
        child.set_window(4, 8).unwrap();
        assert_eq!(child.size(), 8);
        let mut buf = [0u8; 2];
        child.seek(0).unwrap();
        child.read_exact(&mut buf).unwrap();
        assert_eq!(buf, [4, 5]);
        child.seek(6).unwrap();
        child.read_exact(&mut buf).unwrap();
        assert_eq!(buf, [10, 11]);
    }

    #[test]
    fn file_backend_round_trips() {
        let dir = std::env::temp_dir().join(format!("gryph-stream-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("scratch.bin");

        {
            let mut out = Stream::create(&path).unwrap();
            out.seek(0).unwrap();
            out.write_all(b"gbtf1234abcd").unwrap();
            assert!(out.path().is_some());
        }

        let mut input = Stream::open(&path).unwrap();
        assert_eq!(input.size(), 12);
        let mut magic = [0u8; 4];
        input.seek(0).unwrap();
        input.read_exact(&mut magic).unwrap();
        assert_eq!(&magic, b"gbtf");

        let mut window = input.child();
        window.set_window(4, 4).unwrap();
        let mut four = [0u8; 4];
        window.read_exact(&mut four).unwrap();
        assert_eq!(&four, b"1234");

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn backend_outlives_parent_drop() {
        let parent = Stream::memory(vec![7u8; 4]);
        let mut child = parent.child();
        drop(parent);
        let mut buf = [0u8; 1];
        child.seek(3).unwrap();
        child.read_exact(&mut buf).unwrap();
        assert_eq!(buf[0], 7);
    }
}
