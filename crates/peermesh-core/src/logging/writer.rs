//! Append-only JSONL files, one per node per day.

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use super::entry::LogEntry;

/// Writer that appends entries to `<logs_dir>/raw/<date>_<instance>.jsonl`.
pub struct InstanceLogWriter {
    instance: String,
    writer: Mutex<BufWriter<File>>,
    path: PathBuf,
}

impl InstanceLogWriter {
    /// Open (or create) today's file for `instance`
    pub fn new(logs_dir: impl AsRef<Path>, instance: impl Into<String>) -> std::io::Result<Self> {
        let instance = instance.into();
        let raw_dir = logs_dir.as_ref().join("raw");
        fs::create_dir_all(&raw_dir)?;

        let date = chrono::Local::now().format("%Y-%m-%d");
        let path = raw_dir.join(format!("{}_{}.jsonl", date, instance));

        let file = OpenOptions::new().create(true).append(true).open(&path)?;

        Ok(Self {
            instance,
            writer: Mutex::new(BufWriter::new(file)),
            path,
        })
    }

    /// Instance name
    pub fn instance(&self) -> &str {
        &self.instance
    }

    /// Path to the JSONL file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one entry as a single line and flush
    pub fn write(&self, entry: &LogEntry) -> std::io::Result<()> {
        let json = entry
            .to_json_line()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;

        let mut writer = self.writer.lock();
        writeln!(writer, "{}", json)?;
        writer.flush()
    }

    /// Flush buffered data to disk
    pub fn flush(&self) -> std::io::Result<()> {
        self.writer.lock().flush()
    }
}

impl Drop for InstanceLogWriter {
    fn drop(&mut self) {
        let _ = self.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_writer_creates_directory_structure() {
        let temp = TempDir::new().unwrap();
        let logs_dir = temp.path().join("logs");

        let writer = InstanceLogWriter::new(&logs_dir, "love").unwrap();

        assert!(logs_dir.join("raw").exists());
        assert!(writer.path().exists());
        assert!(writer.path().to_string_lossy().ends_with("_love.jsonl"));
        assert_eq!(writer.instance(), "love");
    }

    #[test]
    fn test_writer_appends_one_line_per_entry() {
        let temp = TempDir::new().unwrap();
        let writer = InstanceLogWriter::new(temp.path(), "joy").unwrap();
        writer.write(&LogEntry::new("info", "joy", "mesh", "Dialing")).unwrap();
        writer
            .write(&LogEntry::new("warn", "joy", "mesh", "Dial failed"))
            .unwrap();

        let content = fs::read_to_string(writer.path()).unwrap();
        let entries: Vec<LogEntry> = content
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].level, "warn");
        assert!(entries.iter().all(|e| e.instance == "joy"));
    }

    #[test]
    fn test_instances_get_separate_files() {
        let temp = TempDir::new().unwrap();
        let love = InstanceLogWriter::new(temp.path(), "love").unwrap();
        let joy = InstanceLogWriter::new(temp.path(), "joy").unwrap();
        assert_ne!(love.path(), joy.path());
    }
}
