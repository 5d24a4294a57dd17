//! Persisted "was connected" marker
//!
//! The marker is the only state that survives a restart. Its presence means
//! the previous run ended with a connected wallet and a silent reconnect
//! should be attempted.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

/// File name of the marker inside the state directory
const MARKER_FILE: &str = "wallet_connected";

pub trait ConnectionMarker: Send + Sync {
    fn is_set(&self) -> bool;
    fn set(&self) -> io::Result<()>;
    /// Remove the marker; clearing an absent marker succeeds
    fn clear(&self) -> io::Result<()>;
}

/// Marker stored as an empty-ish file under the state directory
#[derive(Debug, Clone)]
pub struct FileMarker {
    path: PathBuf,
}

impl FileMarker {
    pub fn new(state_dir: &Path) -> Self {
        Self {
            path: state_dir.join(MARKER_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ConnectionMarker for FileMarker {
    fn is_set(&self) -> bool {
        self.path.is_file()
    }

    fn set(&self) -> io::Result<()> {
        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        std::fs::write(&self.path, b"true")
    }

    fn clear(&self) -> io::Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }
}

/// In-process marker for tests and ephemeral runs
#[derive(Debug, Default)]
pub struct MemoryMarker {
    set: AtomicBool,
}

impl MemoryMarker {
    pub fn new(set: bool) -> Self {
        Self {
            set: AtomicBool::new(set),
        }
    }
}

impl ConnectionMarker for MemoryMarker {
    fn is_set(&self) -> bool {
        self.set.load(Ordering::SeqCst)
    }

    fn set(&self) -> io::Result<()> {
        self.set.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn clear(&self) -> io::Result<()> {
        self.set.store(false, Ordering::SeqCst);
        Ok(())
    }
}
