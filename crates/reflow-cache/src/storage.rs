//! Storage collaborator contract (spec §6.3): `open_read/open_write/exists/
//! remove/mkdir/rename`. The core never assumes a POSIX filesystem is
//! present; a host can back this with SD-card FAT I/O, an in-memory map for
//! tests, or anything else that can stream bytes.

use std::io;

/// Host-supplied byte storage. Reads/writes are sequential and scoped to a
/// single operation: open, use, close (spec §5 "Blocking I/O") — no handle
/// is held across a suspension point.
pub trait Storage {
    type Reader: io::Read;
    type Writer: io::Write;

    fn open_read(&self, path: &str) -> io::Result<Self::Reader>;
    fn open_write(&self, path: &str) -> io::Result<Self::Writer>;
    fn exists(&self, path: &str) -> bool;
    fn remove(&self, path: &str) -> io::Result<()>;
    fn mkdir_all(&self, path: &str) -> io::Result<()>;
    fn rename(&self, from: &str, to: &str) -> io::Result<()>;
}

/// `Storage` backed directly by `std::fs`, for hosts with a real filesystem.
pub struct FsStorage;

impl Storage for FsStorage {
    type Reader = std::fs::File;
    type Writer = std::fs::File;

    fn open_read(&self, path: &str) -> io::Result<Self::Reader> {
        std::fs::File::open(path)
    }

    fn open_write(&self, path: &str) -> io::Result<Self::Writer> {
        std::fs::File::create(path)
    }

    fn exists(&self, path: &str) -> bool {
        std::path::Path::new(path).exists()
    }

    fn remove(&self, path: &str) -> io::Result<()> {
        match std::fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }

    fn mkdir_all(&self, path: &str) -> io::Result<()> {
        std::fs::create_dir_all(path)
    }

    fn rename(&self, from: &str, to: &str) -> io::Result<()> {
        std::fs::rename(from, to)
    }
}

/// An in-memory `Storage` double, exported (not `cfg(test)`-gated) so both
/// this crate's own tests and downstream crates (`reflow-cursor`) can drive
/// the cache without touching a real filesystem.
pub mod test_support {
    use super::*;
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::io::Cursor;
    use std::rc::Rc;

    /// In-memory `Storage` double: a `HashMap<String, Vec<u8>>` behind a
    /// `Rc<RefCell<_>>` so tests can inspect what got written.
    #[derive(Clone, Default)]
    pub struct MemStorage {
        files: Rc<RefCell<HashMap<String, Vec<u8>>>>,
    }

    impl MemStorage {
        pub fn new() -> Self {
            Self::default()
        }
    }

    pub struct MemWriter {
        files: Rc<RefCell<HashMap<String, Vec<u8>>>>,
        path: String,
        buf: Vec<u8>,
    }

    impl io::Write for MemWriter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.buf.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Drop for MemWriter {
        fn drop(&mut self) {
            self.files
                .borrow_mut()
                .insert(self.path.clone(), std::mem::take(&mut self.buf));
        }
    }

    impl Storage for MemStorage {
        type Reader = Cursor<Vec<u8>>;
        type Writer = MemWriter;

        fn open_read(&self, path: &str) -> io::Result<Self::Reader> {
            self.files
                .borrow()
                .get(path)
                .cloned()
                .map(Cursor::new)
                .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, path.to_string()))
        }

        fn open_write(&self, path: &str) -> io::Result<Self::Writer> {
            Ok(MemWriter {
                files: self.files.clone(),
                path: path.to_string(),
                buf: Vec::new(),
            })
        }

        fn exists(&self, path: &str) -> bool {
            self.files.borrow().contains_key(path)
        }

        fn remove(&self, path: &str) -> io::Result<()> {
            self.files.borrow_mut().remove(path);
            Ok(())
        }

        fn mkdir_all(&self, _path: &str) -> io::Result<()> {
            Ok(())
        }

        fn rename(&self, from: &str, to: &str) -> io::Result<()> {
            let mut files = self.files.borrow_mut();
            let bytes = files
                .remove(from)
                .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, from.to_string()))?;
            files.insert(to.to_string(), bytes);
            Ok(())
        }
    }
}
