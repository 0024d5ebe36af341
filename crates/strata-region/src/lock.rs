use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use strata_common::{Result, StrataError};

pub const SESSION_LOCK: &str = "session.lock";

fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// Ownership of a world directory.
///
/// Taking the lock writes a millisecond timestamp to `session.lock`. Whoever
/// wrote the value currently in the file owns the directory; everyone else
/// has lost the lock and must stop writing.
#[derive(Debug)]
pub struct SessionLock {
    path: PathBuf,
    stamp: i64,
}

impl SessionLock {
    pub fn acquire(dir: &Path) -> Result<Self> {
        let mut lock = Self {
            path: dir.join(SESSION_LOCK),
            stamp: 0,
        };
        lock.reacquire()?;
        Ok(lock)
    }

    /// Takes the lock back, even from another holder.
    pub fn reacquire(&mut self) -> Result<()> {
        // Two acquisitions in the same millisecond must still write different
        // values.
        let stamp = match self.read_stamp()? {
            Some(current) => now_millis().max(current + 1),
            None => now_millis(),
        };

        let mut writer = BufWriter::new(File::create(&self.path)?);
        writer.write_i64::<BigEndian>(stamp)?;
        writer.flush()?;

        self.stamp = stamp;
        log::debug!("took session lock {} ({})", self.path.display(), stamp);
        Ok(())
    }

    fn read_stamp(&self) -> Result<Option<i64>> {
        match fs::read(&self.path) {
            Ok(bytes) => match bytes.as_slice().read_i64::<BigEndian>() {
                Ok(stamp) => Ok(Some(stamp)),
                // A short file holds no valid stamp.
                Err(_) => Ok(None),
            },
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn is_held(&self) -> Result<bool> {
        Ok(self.read_stamp()? == Some(self.stamp))
    }

    /// Fails with `NoLock` if another process took the directory.
    pub fn check(&self) -> Result<()> {
        if self.is_held()? {
            Ok(())
        } else {
            log::warn!("session lock {} is no longer ours", self.path.display());
            Err(StrataError::NoLock)
        }
    }

    pub fn stamp(&self) -> i64 {
        self.stamp
    }
}
