//! Captured stderr and fault signature scanning.
//!
//! Every launch writes stderr to a fresh `stderr.<token>.txt` in the node's
//! data directory. Tokens sort chronologically, so the lexicographically
//! greatest capture file belongs to the latest launch. A node started outside
//! the harness may only have `stderr.txt`.

use std::{
    fs::File,
    io::{self, BufRead, BufReader},
    path::{Path, PathBuf},
    time::{SystemTime, UNIX_EPOCH},
};

use readmode_domain::{FAULT_SIGNATURES, FaultSignature};

/// Capture file used when no per-launch capture exists.
pub const DEFAULT_STDERR_FILE: &str = "stderr.txt";

const CAPTURE_PREFIX: &str = "stderr.";
const CAPTURE_SUFFIX: &str = ".txt";

/// Reads a node's captured stderr. Never modifies anything on disk.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogScanner;

impl LogScanner {
    /// Token for a new capture file. Sorts after every token issued earlier.
    pub fn capture_token(launch: u64) -> String {
        let millis =
            SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_millis()).unwrap_or(0);
        format!("{millis:013}_{launch:04}")
    }

    /// File name of the stderr capture for `token`.
    pub fn capture_file_name(token: &str) -> String {
        format!("{CAPTURE_PREFIX}{token}{CAPTURE_SUFFIX}")
    }

    /// Whether `name` is a per-launch capture file, i.e. `stderr.<token>.txt`.
    pub fn is_capture_file(name: &str) -> bool {
        name.strip_prefix(CAPTURE_PREFIX).is_some_and(|rest| rest.contains(CAPTURE_SUFFIX))
    }

    /// Capture file of the latest launch, falling back to [`DEFAULT_STDERR_FILE`].
    pub fn latest_stderr_file(data_dir: &Path) -> io::Result<PathBuf> {
        let entries = match std::fs::read_dir(data_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Ok(data_dir.join(DEFAULT_STDERR_FILE));
            }
            Err(e) => return Err(e),
        };
        let mut latest: Option<String> = None;
        for entry in entries {
            let name = entry?.file_name();
            let Some(name) = name.to_str() else { continue };
            if Self::is_capture_file(name) && latest.as_deref().is_none_or(|l| l < name) {
                latest = Some(name.to_string());
            }
        }
        Ok(data_dir.join(latest.as_deref().unwrap_or(DEFAULT_STDERR_FILE)))
    }

    /// Whether the latest capture contains `signature` on any line.
    ///
    /// A missing capture file contains nothing.
    pub fn contains_signature(data_dir: &Path, signature: &FaultSignature) -> io::Result<bool> {
        let mut found = false;
        Self::scan(data_dir, |line| {
            found = signature.matches(line);
            found
        })?;
        Ok(found)
    }

    /// First registered signature present in the latest capture.
    pub fn classify(data_dir: &Path) -> io::Result<Option<FaultSignature>> {
        let mut found = None;
        Self::scan(data_dir, |line| {
            found = FAULT_SIGNATURES.iter().find(|sig| sig.matches(line)).copied();
            found.is_some()
        })?;
        Ok(found)
    }

    /// Feed each line of the latest capture to `stop` until it returns true.
    fn scan(data_dir: &Path, mut stop: impl FnMut(&str) -> bool) -> io::Result<()> {
        let path = Self::latest_stderr_file(data_dir)?;
        let file = match File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e),
        };
        let mut reader = BufReader::new(file);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            if reader.read_until(b'\n', &mut buf)? == 0 {
                return Ok(());
            }
            // Node logs may carry invalid UTF-8; the signatures are ASCII.
            if stop(&String::from_utf8_lossy(&buf)) {
                return Ok(());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use readmode_domain::KnownBug;

    use super::*;

    fn write(dir: &Path, name: &str, contents: &str) {
        std::fs::write(dir.join(name), contents).unwrap();
    }

    #[test]
    fn test_capture_file_names() {
        assert!(LogScanner::is_capture_file("stderr.2019_01_01_10_00_00.txt"));
        assert!(LogScanner::is_capture_file(&LogScanner::capture_file_name("x")));
        assert!(!LogScanner::is_capture_file("stderr.txt"));
        assert!(!LogScanner::is_capture_file("stdout.1.txt"));
    }

    #[test]
    fn test_tokens_sort_chronologically() {
        let first = LogScanner::capture_token(9);
        std::thread::sleep(std::time::Duration::from_millis(2));
        let second = LogScanner::capture_token(10);
        assert!(first < second);
    }

    #[test]
    fn test_latest_file_by_name_order() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "stderr.2019_01_01_10_00_00.txt", "old");
        write(dir.path(), "stderr.2019_01_02_09_00_00.txt", "new");
        write(dir.path(), "stderr.txt", "default");
        write(dir.path(), "stdout.2020_01_01_00_00_00.txt", "other");

        let latest = LogScanner::latest_stderr_file(dir.path()).unwrap();
        assert_eq!(latest, dir.path().join("stderr.2019_01_02_09_00_00.txt"));
    }

    #[test]
    fn test_falls_back_to_default_file() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "stderr.txt", "duplicate block added\n");
        let latest = LogScanner::latest_stderr_file(dir.path()).unwrap();
        assert_eq!(latest, dir.path().join(DEFAULT_STDERR_FILE));
        assert!(
            LogScanner::contains_signature(dir.path(), KnownBug::DuplicateBlock.signature())
                .unwrap()
        );
    }

    #[test]
    fn test_only_latest_capture_is_scanned() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "stderr.0000000000001_0001.txt", "error: duplicate block added\n");
        write(dir.path(), "stderr.0000000000002_0002.txt", "info: replay complete\n");
        assert!(
            !LogScanner::contains_signature(dir.path(), KnownBug::DuplicateBlock.signature())
                .unwrap()
        );
    }

    #[test]
    fn test_missing_directory_contains_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("node_09");
        assert!(
            !LogScanner::contains_signature(&missing, KnownBug::UnlinkableBlock.signature())
                .unwrap()
        );
        assert_eq!(LogScanner::classify(&missing).unwrap(), None);
    }

    #[test]
    fn test_classify_finds_each_registered_signature() {
        for sig in FAULT_SIGNATURES {
            let dir = tempfile::tempdir().unwrap();
            let log = format!("info starting\nwarn 3001 {} #1234\ninfo shutting down\n", sig.pattern);
            write(dir.path(), "stderr.0000000000001_0001.txt", &log);
            assert_eq!(LogScanner::classify(dir.path()).unwrap(), Some(*sig));
            for other in FAULT_SIGNATURES.iter().filter(|other| other.bug != sig.bug) {
                assert!(!LogScanner::contains_signature(dir.path(), other).unwrap());
            }
        }
    }

    #[test]
    fn test_invalid_utf8_lines_are_scanned() {
        let dir = tempfile::tempdir().unwrap();
        let mut bytes = b"\xff\xfe garbage\n".to_vec();
        bytes.extend_from_slice(b"\xffunlinkable block\n");
        std::fs::write(dir.path().join("stderr.0000000000001_0001.txt"), bytes).unwrap();
        assert!(
            LogScanner::contains_signature(dir.path(), KnownBug::UnlinkableBlock.signature())
                .unwrap()
        );
    }
}
