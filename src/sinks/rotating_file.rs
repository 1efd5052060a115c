//! Rotating file sink
//!
//! Rotates the active file by size, interval or calendar day. Backups are
//! named `<file>.1` (newest) through `<file>.N`, optionally gzip compressed
//! to `<file>.N.gz`, and pruned by count and by age.

use crate::core::{Formatter, LogEntry, LoggerError, OutputFormat, Result, Sink};
use chrono::{DateTime, Local, Timelike, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

const MAX_DELETION_FAILURES: usize = 5;

/// When to rotate the active log file
///
/// # Examples
///
/// ```
/// use rust_kafka_logger::sinks::RotationStrategy;
/// use std::time::Duration;
///
/// let by_size = RotationStrategy::Size { max_bytes: 100 * 1024 * 1024 };
/// let hourly = RotationStrategy::Time { interval: Duration::from_secs(3600) };
/// let nightly = RotationStrategy::daily(2);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum RotationStrategy {
    /// Rotate when the file reaches `max_bytes`
    Size { max_bytes: u64 },

    /// Rotate once `interval` has passed since the last rotation
    Time { interval: Duration },

    /// Rotate on the first write of a new day at or after `hour`
    Daily { hour: u8, local_time: bool },

    /// Leave rotation to something else
    Never,
}

impl Default for RotationStrategy {
    fn default() -> Self {
        RotationStrategy::Size {
            max_bytes: 100 * 1024 * 1024,
        }
    }
}

impl RotationStrategy {
    /// Daily rotation on the local clock; `hour` is clamped to 0-23
    pub fn daily(hour: u8) -> Self {
        RotationStrategy::Daily {
            hour: hour.min(23),
            local_time: true,
        }
    }
}

/// Rotation settings as they appear in configuration
///
/// A `max_size_mb` of zero disables size rotation; `max_age_days` of zero
/// keeps backups regardless of age.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RotationConfig {
    pub max_size_mb: u64,
    pub max_age_days: u32,
    pub max_backups: usize,
    /// Use local time instead of UTC for daily rotation
    pub local_time: bool,
    /// Rotate once a day at this hour instead of by size
    #[serde(skip_serializing_if = "Option::is_none")]
    pub daily_at_hour: Option<u8>,
    pub compress: bool,
}

impl Default for RotationConfig {
    fn default() -> Self {
        Self {
            max_size_mb: 100,
            max_age_days: 0,
            max_backups: 5,
            local_time: true,
            daily_at_hour: None,
            compress: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RotationPolicy {
    pub strategy: RotationStrategy,
    /// Backups kept after a rotation
    pub max_backup_files: usize,
    /// Backups older than this are deleted after a rotation
    pub max_age: Option<Duration>,
    pub compress: bool,
}

impl Default for RotationPolicy {
    fn default() -> Self {
        Self {
            strategy: RotationStrategy::default(),
            max_backup_files: 5,
            max_age: None,
            compress: false,
        }
    }
}

impl RotationPolicy {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_strategy(mut self, strategy: RotationStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Shorthand for [`RotationStrategy::Size`]
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_max_size(mut self, size: u64) -> Self {
        self.strategy = RotationStrategy::Size { max_bytes: size };
        self
    }

    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_max_backups(mut self, count: usize) -> Self {
        self.max_backup_files = count;
        self
    }

    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_max_age(mut self, age: Duration) -> Self {
        self.max_age = Some(age);
        self
    }

    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_compression(mut self, enabled: bool) -> Self {
        self.compress = enabled;
        self
    }
}

impl From<&RotationConfig> for RotationPolicy {
    fn from(config: &RotationConfig) -> Self {
        let strategy = match (config.daily_at_hour, config.max_size_mb) {
            (Some(hour), _) => RotationStrategy::Daily {
                hour: hour.min(23),
                local_time: config.local_time,
            },
            (None, 0) => RotationStrategy::Never,
            (None, mb) => RotationStrategy::Size {
                max_bytes: mb.saturating_mul(1024 * 1024),
            },
        };
        Self {
            strategy,
            max_backup_files: config.max_backups,
            max_age: (config.max_age_days > 0)
                .then(|| Duration::from_secs(u64::from(config.max_age_days) * 24 * 3600)),
            compress: config.compress,
        }
    }
}

/// File sink that rotates the underlying file
///
/// # Examples
///
/// ```no_run
/// use rust_kafka_logger::sinks::{RotatingFileSink, RotationPolicy};
///
/// let policy = RotationPolicy::new()
///     .with_max_size(50 * 1024 * 1024)
///     .with_max_backups(7)
///     .with_compression(true);
/// let sink = RotatingFileSink::with_policy("/var/log/app.log", policy).unwrap();
/// ```
pub struct RotatingFileSink {
    base_path: PathBuf,
    policy: RotationPolicy,
    formatter: Formatter,
    active: Mutex<ActiveFile>,
}

/// The open file and the bookkeeping that decides when it rotates
struct ActiveFile {
    writer: Option<BufWriter<File>>,
    current_size: u64,
    last_rotation: SystemTime,
    /// Consecutive failures to delete the oldest backup
    deletion_failure_count: usize,
}

impl RotatingFileSink {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::with_policy(path, RotationPolicy::default())
    }

    pub fn with_policy<P: AsRef<Path>>(path: P, policy: RotationPolicy) -> Result<Self> {
        let base_path = path.as_ref().to_path_buf();

        if let Some(parent) = base_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| {
                LoggerError::io_operation(
                    "create log directory",
                    format!("Failed to create directory '{}'", parent.display()),
                    e,
                )
            })?;
        }

        let (file, current_size, last_rotation) = open_active(&base_path)?;

        Ok(Self {
            base_path,
            policy,
            formatter: Formatter::new(OutputFormat::Text),
            active: Mutex::new(ActiveFile {
                writer: Some(BufWriter::new(file)),
                current_size,
                last_rotation,
                deletion_failure_count: 0,
            }),
        })
    }

    #[must_use]
    pub fn with_formatter(mut self, formatter: Formatter) -> Self {
        self.formatter = formatter;
        self
    }

    pub fn current_size(&self) -> u64 {
        self.active.lock().current_size
    }

    pub fn path(&self) -> &Path {
        &self.base_path
    }

    pub fn policy(&self) -> &RotationPolicy {
        &self.policy
    }

    pub fn last_rotation(&self) -> SystemTime {
        self.active.lock().last_rotation
    }

    fn should_rotate(&self, active: &ActiveFile) -> bool {
        match &self.policy.strategy {
            RotationStrategy::Never => false,
            RotationStrategy::Size { max_bytes } => active.current_size >= *max_bytes,
            RotationStrategy::Time { interval } => {
                SystemTime::now()
                    .duration_since(active.last_rotation)
                    .unwrap_or(Duration::ZERO)
                    >= *interval
            }
            RotationStrategy::Daily { hour, local_time } => {
                let now = SystemTime::now();
                if *local_time {
                    let now: DateTime<Local> = now.into();
                    let last: DateTime<Local> = active.last_rotation.into();
                    now.date_naive() != last.date_naive() && now.hour() >= u32::from(*hour)
                } else {
                    let now: DateTime<Utc> = now.into();
                    let last: DateTime<Utc> = active.last_rotation.into();
                    now.date_naive() != last.date_naive() && now.hour() >= u32::from(*hour)
                }
            }
        }
    }

    fn rotate(&self, active: &mut ActiveFile) -> Result<()> {
        if let Some(mut writer) = active.writer.take() {
            writer.flush().map_err(|e| {
                LoggerError::file_rotation(
                    self.base_path.display().to_string(),
                    format!("Failed to flush before rotation: {}", e),
                )
            })?;
        }

        self.remove_oldest(active)?;

        for i in (1..self.policy.max_backup_files).rev() {
            let from = self.backup_path(i);
            let to = self.backup_path(i + 1);
            for (from, to) in [(gz_path(&from), gz_path(&to)), (from, to)] {
                if from.exists() {
                    replace(&from, &to)?;
                }
            }
        }

        if self.policy.max_backup_files > 0 && self.base_path.exists() {
            let backup = self.backup_path(1);
            fs::rename(&self.base_path, &backup).map_err(|e| {
                LoggerError::file_rotation(
                    self.base_path.display().to_string(),
                    format!("Failed to rotate current log file: {}", e),
                )
            })?;
            if self.policy.compress {
                compress_file(&backup)?;
            }
        } else if self.base_path.exists() {
            fs::remove_file(&self.base_path)?;
        }

        let (file, size, _) = open_active(&self.base_path)?;
        active.writer = Some(BufWriter::new(file));
        active.current_size = size;
        active.last_rotation = SystemTime::now();

        self.prune_expired();
        Ok(())
    }

    /// Delete the backup that would fall off the end; abort after repeated failures
    fn remove_oldest(&self, active: &mut ActiveFile) -> Result<()> {
        let oldest = self.backup_path(self.policy.max_backup_files.max(1));
        let mut failed = false;
        for path in [gz_path(&oldest), oldest] {
            if path.exists() {
                if let Err(e) = fs::remove_file(&path) {
                    failed = true;
                    eprintln!(
                        "[LOGGER WARNING] Failed to remove oldest backup {}: {} (failure #{}/{})",
                        path.display(),
                        e,
                        active.deletion_failure_count + 1,
                        MAX_DELETION_FAILURES
                    );
                }
            }
        }

        if !failed {
            active.deletion_failure_count = 0;
            return Ok(());
        }
        active.deletion_failure_count += 1;
        if active.deletion_failure_count >= MAX_DELETION_FAILURES {
            return Err(LoggerError::file_rotation(
                self.base_path.display().to_string(),
                format!(
                    "Rotation aborted after {} consecutive failures to delete old backups",
                    active.deletion_failure_count
                ),
            ));
        }
        Ok(())
    }

    /// Remove backups whose modification time is older than `max_age`
    fn prune_expired(&self) {
        let Some(max_age) = self.policy.max_age else {
            return;
        };
        let now = SystemTime::now();
        for i in 1..=self.policy.max_backup_files {
            let plain = self.backup_path(i);
            for path in [gz_path(&plain), plain] {
                let expired = fs::metadata(&path)
                    .and_then(|m| m.modified())
                    .map(|modified| {
                        now.duration_since(modified).unwrap_or(Duration::ZERO) > max_age
                    })
                    .unwrap_or(false);
                if expired {
                    if let Err(e) = fs::remove_file(&path) {
                        eprintln!(
                            "[LOGGER WARNING] Failed to remove expired backup {}: {}",
                            path.display(),
                            e
                        );
                    }
                }
            }
        }
    }

    fn backup_path(&self, index: usize) -> PathBuf {
        let mut path = self.base_path.clone();
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("app.log")
            .to_string();
        path.set_file_name(format!("{}.{}", name, index));
        path
    }
}

impl Sink for RotatingFileSink {
    fn fire(&self, entry: &LogEntry) -> Result<()> {
        let mut line = self.formatter.render(entry)?;
        line.push('\n');

        let mut active = self.active.lock();
        if self.should_rotate(&active) {
            if let Err(e) = self.rotate(&mut active) {
                eprintln!(
                    "[LOGGER WARNING] Log rotation failed: {}. Continuing with current file.",
                    e
                );
                if active.writer.is_none() {
                    let (file, size, last_rotation) =
                        open_active(&self.base_path).map_err(|reopen| {
                            eprintln!("[LOGGER ERROR] Failed to reopen log file: {}", reopen);
                            e
                        })?;
                    active.writer = Some(BufWriter::new(file));
                    active.current_size = size;
                    active.last_rotation = last_rotation;
                }
                // let the file outgrow the limit rather than retry on every write
                active.current_size = 0;
                active.last_rotation = SystemTime::now();
            }
        }

        let writer = active
            .writer
            .as_mut()
            .ok_or_else(|| LoggerError::writer("Writer not initialized"))?;
        writer.write_all(line.as_bytes()).map_err(|e| {
            LoggerError::file_sink(
                self.base_path.display().to_string(),
                format!("Failed to write log entry: {}", e),
            )
        })?;
        active.current_size += line.len() as u64;
        Ok(())
    }

    fn flush(&self) -> Result<()> {
        if let Some(writer) = self.active.lock().writer.as_mut() {
            writer.flush().map_err(|e| {
                LoggerError::file_sink(
                    self.base_path.display().to_string(),
                    format!("Failed to flush: {}", e),
                )
            })?;
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "rotating_file"
    }
}

impl Drop for RotatingFileSink {
    fn drop(&mut self) {
        if let Some(mut writer) = self.active.get_mut().writer.take() {
            let _ = writer.flush();
        }
    }
}

fn open_active(path: &Path) -> Result<(File, u64, SystemTime)> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| {
            LoggerError::file_sink(path.display().to_string(), format!("Failed to open: {}", e))
        })?;
    let metadata = file.metadata().map_err(|e| {
        LoggerError::file_sink(
            path.display().to_string(),
            format!("Cannot access file metadata: {}", e),
        )
    })?;
    let modified = metadata.modified().unwrap_or_else(|_| SystemTime::now());
    Ok((file, metadata.len(), modified))
}

fn gz_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".gz");
    PathBuf::from(name)
}

/// Rename, removing the destination first on platforms that refuse to overwrite
fn replace(from: &Path, to: &Path) -> Result<()> {
    if fs::rename(from, to).is_ok() {
        return Ok(());
    }
    if to.exists() {
        let _ = fs::remove_file(to);
    }
    fs::rename(from, to).map_err(|e| {
        LoggerError::file_rotation(
            from.display().to_string(),
            format!("Failed to rotate backup files: {}", e),
        )
    })
}

/// Gzip `path` to `path.gz`, removing the original only once the archive is complete
fn compress_file(path: &Path) -> Result<()> {
    use std::io::{BufReader, Read};

    let gz = gz_path(path);
    let mut tmp_name = gz.as_os_str().to_os_string();
    tmp_name.push(".tmp");
    let tmp = PathBuf::from(tmp_name);

    let compress = || -> std::io::Result<()> {
        let mut reader = BufReader::with_capacity(64 * 1024, File::open(path)?);
        let output = BufWriter::with_capacity(64 * 1024, File::create(&tmp)?);
        let mut encoder = flate2::write::GzEncoder::new(output, flate2::Compression::default());
        let mut buffer = vec![0u8; 64 * 1024];
        loop {
            let read = reader.read(&mut buffer)?;
            if read == 0 {
                break;
            }
            encoder.write_all(&buffer[..read])?;
        }
        encoder.finish()?.flush()?;
        fs::rename(&tmp, &gz)
    };

    if let Err(e) = compress() {
        let _ = fs::remove_file(&tmp);
        return Err(LoggerError::io_operation(
            "compress log file",
            format!("Failed to compress {}", path.display()),
            e,
        ));
    }

    if let Err(e) = fs::remove_file(path) {
        eprintln!(
            "[LOGGER WARNING] Compressed {} but failed to remove the original: {}",
            path.display(),
            e
        );
    }
    Ok(())
}
