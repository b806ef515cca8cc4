//! Session log files.
//!
//! One plain-text file per session, named after its creation time:
//!
//! ```text
//! === New Session Started at 20241103_141502 ===
//! Format: timestamp, device_id, ip_address, reading, master_duration
//! ===========================================
//!
//! 2024-11-03 14:15:07, 5, 192.168.1.41, 200, 0.00
//! 2024-11-03 14:15:08, 5, 192.168.1.41, 900, 1.02
//!
//! === Reset Summary at 2024-11-03 14:16:00 ===
//! Masters this session:
//! IP: 192.168.1.41, Device: 5, Total Time: 53.11 seconds
//! ====================================
//! ```
//!
//! Records carry the session generation they were produced in; a record
//! from an older generation is dropped rather than written to the rotated
//! file.

use crate::error::SwarmError;
use crate::types::DeviceId;
use chrono::{DateTime, Local};
use parking_lot::Mutex;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, warn};

/// File name prefix for session logs
pub const LOG_PREFIX: &str = "lightswarm";

/// One line per accepted reading
#[derive(Debug, Clone, PartialEq)]
pub struct ReadingRecord {
    pub session: u64,
    pub wall: DateTime<Local>,
    pub device_id: DeviceId,
    pub addr: IpAddr,
    pub reading: i32,
    /// Projected master time of this device when the reading arrived
    pub master_seconds: f64,
}

impl ReadingRecord {
    pub fn to_line(&self) -> String {
        format!(
            "{}, {}, {}, {}, {:.2}",
            self.wall.format("%Y-%m-%d %H:%M:%S"),
            self.device_id,
            self.addr,
            self.reading,
            self.master_seconds
        )
    }
}

/// Final duration of one device in the closing block
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryEntry {
    pub device_id: DeviceId,
    pub addr: Option<IpAddr>,
    pub seconds: f64,
}

/// Closing block written before a session is rotated
#[derive(Debug, Clone, PartialEq)]
pub struct ResetSummary {
    pub session: u64,
    pub wall: DateTime<Local>,
    pub entries: Vec<SummaryEntry>,
}

impl ResetSummary {
    pub fn to_text(&self) -> String {
        let mut out = format!(
            "\n=== Reset Summary at {} ===\nMasters this session:\n",
            self.wall.format("%Y-%m-%d %H:%M:%S")
        );
        for entry in &self.entries {
            let addr = entry
                .addr
                .map(|a| a.to_string())
                .unwrap_or_else(|| "unknown".to_string());
            out.push_str(&format!(
                "IP: {}, Device: {}, Total Time: {:.2} seconds\n",
                addr, entry.device_id, entry.seconds
            ));
        }
        out.push_str("====================================\n\n");
        out
    }
}

struct SessionFile {
    session: u64,
    path: PathBuf,
    writer: BufWriter<File>,
}

/// Append-only writer for the current session file
pub struct SessionLogger {
    dir: PathBuf,
    flush_each_line: bool,
    current: Mutex<Option<SessionFile>>,
    /// Set by `close`; no session may be opened afterwards
    closed: AtomicBool,
}

impl SessionLogger {
    /// Create the logger; the directory is created if missing
    pub fn new(dir: impl Into<PathBuf>, flush_each_line: bool) -> Result<Self, SwarmError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|source| SwarmError::SessionLog {
            path: dir.clone(),
            source,
        })?;

        Ok(Self {
            dir,
            flush_each_line,
            current: Mutex::new(None),
            closed: AtomicBool::new(false),
        })
    }

    /// Path of the open session file
    pub fn current_path(&self) -> Option<PathBuf> {
        self.current.lock().as_ref().map(|f| f.path.clone())
    }

    /// Generation of the open session file
    pub fn current_session(&self) -> Option<u64> {
        self.current.lock().as_ref().map(|f| f.session)
    }

    fn unique_path(&self, stem: &str) -> PathBuf {
        let first = self.dir.join(format!("{}.log", stem));
        if !first.exists() {
            return first;
        }
        (1..)
            .map(|n| self.dir.join(format!("{}_{}.log", stem, n)))
            .find(|p| !p.exists())
            .unwrap_or(first)
    }

    /// Close the current file (if any) and open a fresh one with a header.
    /// Fails with `NoSession` once the logger has been closed.
    pub fn new_session(&self, session: u64, started: DateTime<Local>) -> Result<PathBuf, SwarmError> {
        if self.is_closed() {
            return Err(SwarmError::NoSession);
        }

        let stamp = started.format("%Y%m%d_%H%M%S").to_string();
        let path = self.unique_path(&format!("{}_{}", LOG_PREFIX, stamp));

        let io_err = |source| SwarmError::SessionLog {
            path: path.clone(),
            source,
        };

        let file = OpenOptions::new()
            .create_new(true)
            .write(true)
            .open(&path)
            .map_err(io_err)?;
        let mut writer = BufWriter::new(file);

        write!(
            writer,
            "=== New Session Started at {} ===\n\
             Format: timestamp, device_id, ip_address, reading, master_duration\n\
             ===========================================\n\n",
            stamp
        )
        .map_err(io_err)?;
        writer.flush().map_err(io_err)?;

        let previous = {
            let mut current = self.current.lock();
            // `close` may have run while the file was being created
            if self.is_closed() {
                drop(current);
                drop(writer);
                if let Err(e) = fs::remove_file(&path) {
                    warn!("SessionLog: Failed to remove {:?}: {}", path, e);
                }
                return Err(SwarmError::NoSession);
            }
            current.replace(SessionFile {
                session,
                path: path.clone(),
                writer,
            })
        };
        if let Some(mut old) = previous {
            if let Err(e) = old.writer.flush() {
                warn!("SessionLog: Failed to flush {:?}: {}", old.path, e);
            }
        }

        info!("SessionLog: Created {:?} (session {})", path, session);
        Ok(path)
    }

    fn append(&self, session: u64, text: &str) -> Result<bool, SwarmError> {
        let mut guard = self.current.lock();
        let file = guard.as_mut().ok_or(SwarmError::NoSession)?;

        if file.session != session {
            debug!(
                "SessionLog: Dropping record from session {} (current {})",
                session, file.session
            );
            return Ok(false);
        }

        let path = file.path.clone();
        let io_err = |source| SwarmError::SessionLog { path, source };
        file.writer.write_all(text.as_bytes()).map_err(io_err)?;
        if self.flush_each_line {
            file.writer.flush().map_err(|source| SwarmError::SessionLog {
                path: file.path.clone(),
                source,
            })?;
        }
        Ok(true)
    }

    /// Append one reading line. Returns false if the record belongs to a
    /// session that has already been rotated.
    pub fn log_reading(&self, record: &ReadingRecord) -> Result<bool, SwarmError> {
        self.append(record.session, &format!("{}\n", record.to_line()))
    }

    /// Append the closing block of the current session
    pub fn write_reset_summary(&self, summary: &ResetSummary) -> Result<bool, SwarmError> {
        let written = self.append(summary.session, &summary.to_text())?;
        if written {
            info!(
                "SessionLog: Reset summary written ({} devices)",
                summary.entries.len()
            );
        }
        Ok(written)
    }

    /// Flush and close the current file for good. Returns false if nothing
    /// was open.
    pub fn close(&self) -> bool {
        let mut current = self.current.lock();
        self.closed.store(true, Ordering::SeqCst);
        match current.take() {
            Some(mut file) => {
                if let Err(e) = file.writer.flush() {
                    warn!("SessionLog: Failed to flush {:?}: {}", file.path, e);
                }
                info!("SessionLog: Closed {:?}", file.path);
                true
            }
            None => false,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}
