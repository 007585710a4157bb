//! In-memory mock filesystem for testing probes without real `/proc`.
//!
//! This module provides `MockFs` which simulates a filesystem in memory,
//! allowing Linux probe tests to run on macOS and in CI environments.

use crate::collector::traits::FileSystem;
use std::collections::{HashMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// In-memory filesystem for testing.
///
/// Stores files and directories in memory so tests can simulate `/proc` and
/// `/sys` states that would be hard to reproduce on a real host.
///
/// Clones share one read log.
#[derive(Debug, Clone, Default)]
pub struct MockFs {
    /// Map from path to file contents.
    files: HashMap<PathBuf, String>,
    /// Set of directories (for read_dir support).
    directories: HashSet<PathBuf>,
    /// Successful `read_to_string` calls per path.
    reads: Arc<Mutex<HashMap<PathBuf, usize>>>,
}

impl MockFs {
    /// Creates a new empty mock filesystem.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a file with the given content, replacing any previous content.
    ///
    /// Parent directories are automatically created.
    pub fn add_file(&mut self, path: impl AsRef<Path>, content: impl Into<String>) {
        let path = path.as_ref().to_path_buf();
        self.add_parents(&path);
        self.files.insert(path, content.into());
    }

    /// Adds an empty directory.
    pub fn add_dir(&mut self, path: impl AsRef<Path>) {
        let path = path.as_ref().to_path_buf();
        self.add_parents(&path);
        self.directories.insert(path);
    }

    /// Number of successful reads of `path` so far.
    pub fn read_count(&self, path: impl AsRef<Path>) -> usize {
        self.reads
            .lock()
            .map(|r| r.get(path.as_ref()).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    /// Removes a directory together with everything below it.
    pub fn remove_dir(&mut self, path: impl AsRef<Path>) {
        let path = path.as_ref();
        self.files.retain(|p, _| !p.starts_with(path));
        self.directories.retain(|p| !p.starts_with(path));
    }

    /// Adds a CPU's cpufreq files under `/sys/devices/system/cpu/cpuN/cpufreq`.
    ///
    /// Frequencies are in kHz, as the kernel reports them.
    pub fn add_cpufreq(&mut self, cpu: u32, cur_khz: u64, min_khz: u64, max_khz: u64) {
        let base = PathBuf::from(format!("/sys/devices/system/cpu/cpu{}/cpufreq", cpu));
        self.add_file(base.join("scaling_cur_freq"), format!("{}\n", cur_khz));
        self.add_file(base.join("scaling_min_freq"), format!("{}\n", min_khz));
        self.add_file(base.join("scaling_max_freq"), format!("{}\n", max_khz));
    }

    /// Adds a thermal zone reporting `millidegrees`.
    pub fn add_thermal_zone(&mut self, zone: u32, millidegrees: i64) {
        self.add_file(
            format!("/sys/class/thermal/thermal_zone{}/temp", zone),
            format!("{}\n", millidegrees),
        );
    }

    /// Adds an empty `/proc/[pid]` directory.
    pub fn add_pid(&mut self, pid: u32) {
        self.add_dir(format!("/proc/{}", pid));
    }

    /// Loads a mock filesystem from a directory snapshot, mounted at `mount_at`.
    ///
    /// This is useful for regression tests with captured `/proc` or `/sys`
    /// trees.
    pub fn from_snapshot(dir: &Path, mount_at: &Path) -> io::Result<Self> {
        let mut fs = Self::new();
        load_directory_recursive(&mut fs, dir, mount_at)?;
        Ok(fs)
    }

    fn add_parents(&mut self, path: &Path) {
        let mut parent = path.parent();
        while let Some(p) = parent {
            if !p.as_os_str().is_empty() {
                self.directories.insert(p.to_path_buf());
            }
            parent = p.parent();
        }
    }
}

fn load_directory_recursive(
    fs: &mut MockFs,
    real_path: &Path,
    virtual_path: &Path,
) -> io::Result<()> {
    fs.add_dir(virtual_path);

    for entry in std::fs::read_dir(real_path)? {
        let entry = entry?;
        let file_type = entry.file_type()?;
        let virtual_child = virtual_path.join(entry.file_name());

        if file_type.is_dir() {
            load_directory_recursive(fs, &entry.path(), &virtual_child)?;
        } else if file_type.is_file() {
            // Binary files are skipped.
            if let Ok(content) = std::fs::read_to_string(entry.path()) {
                fs.add_file(&virtual_child, content);
            }
        }
    }
    Ok(())
}

impl FileSystem for MockFs {
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        let content = self.files.get(path).cloned().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("file not found: {:?}", path),
            )
        })?;
        if let Ok(mut reads) = self.reads.lock() {
            *reads.entry(path.to_path_buf()).or_default() += 1;
        }
        Ok(content)
    }

    fn exists(&self, path: &Path) -> bool {
        self.files.contains_key(path) || self.directories.contains(path)
    }

    fn read_dir(&self, path: &Path) -> io::Result<Vec<PathBuf>> {
        if !self.directories.contains(path) {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("directory not found: {:?}", path),
            ));
        }

        let files = self.files.keys();
        let dirs = self.directories.iter().filter(|d| d.as_path() != path);
        let entries: HashSet<PathBuf> = files
            .chain(dirs)
            .filter(|p| p.parent() == Some(path))
            .cloned()
            .collect();

        Ok(entries.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_fs_add_file() {
        let mut fs = MockFs::new();
        fs.add_file("/proc/loadavg", "0.15 0.10 0.05 1/150 1234\n");

        assert!(fs.exists(Path::new("/proc/loadavg")));
        assert!(fs.exists(Path::new("/proc")));

        let content = fs.read_to_string(Path::new("/proc/loadavg")).unwrap();
        assert_eq!(content, "0.15 0.10 0.05 1/150 1234\n");
    }

    #[test]
    fn test_mock_fs_read_dir() {
        let mut fs = MockFs::new();
        fs.add_pid(1);
        fs.add_pid(2);
        fs.add_file("/proc/stat", "cpu 1 1 1 1\n");

        let entries = fs.read_dir(Path::new("/proc")).unwrap();
        assert_eq!(entries.len(), 3);
    }

    #[test]
    fn test_mock_fs_helpers() {
        let mut fs = MockFs::new();
        fs.add_cpufreq(0, 2_000_000, 800_000, 3_600_000);
        fs.add_thermal_zone(0, 45000);

        let cur = fs
            .read_to_string(Path::new(
                "/sys/devices/system/cpu/cpu0/cpufreq/scaling_cur_freq",
            ))
            .unwrap();
        assert_eq!(cur, "2000000\n");
        assert!(fs.exists(Path::new("/sys/class/thermal/thermal_zone0/temp")));
    }

    #[test]
    fn test_mock_fs_remove_dir() {
        let mut fs = MockFs::new();
        fs.add_cpufreq(0, 1, 1, 1);
        fs.add_cpufreq(1, 1, 1, 1);
        fs.add_file("/sys/class/thermal/thermal_zone0/temp", "1\n");

        fs.remove_dir("/sys/devices/system/cpu");

        assert!(!fs.exists(Path::new("/sys/devices/system/cpu")));
        assert!(!fs.exists(Path::new(
            "/sys/devices/system/cpu/cpu1/cpufreq/scaling_cur_freq"
        )));
        assert!(fs.exists(Path::new("/sys/class/thermal/thermal_zone0/temp")));
    }

    #[test]
    fn test_mock_fs_from_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("loadavg"), "1.00 2.00 3.00 1/1 1\n").unwrap();
        std::fs::create_dir(dir.path().join("42")).unwrap();

        let fs = MockFs::from_snapshot(dir.path(), Path::new("/proc")).unwrap();
        assert_eq!(
            fs.read_to_string(Path::new("/proc/loadavg")).unwrap(),
            "1.00 2.00 3.00 1/1 1\n"
        );
        assert!(fs.exists(Path::new("/proc/42")));
    }

    #[test]
    fn test_mock_fs_not_found() {
        let fs = MockFs::new();
        let result = fs.read_to_string(Path::new("/nonexistent"));
        assert!(result.is_err());
        assert_eq!(result.unwrap_err().kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn test_mock_fs_read_count_shared_between_clones() {
        let mut fs = MockFs::new();
        fs.add_file("/proc/stat", "cpu 1 2 3 4\n");
        let clone = fs.clone();
        clone.read_to_string(Path::new("/proc/stat")).unwrap();
        clone.read_to_string(Path::new("/proc/stat")).unwrap();
        let _ = clone.read_to_string(Path::new("/proc/uptime"));
        assert_eq!(fs.read_count("/proc/stat"), 2);
        assert_eq!(fs.read_count("/proc/uptime"), 0);
    }
}
