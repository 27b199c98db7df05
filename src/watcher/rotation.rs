//! Rotation and truncation detection.
//!
//! Two checks run before every pass. A file whose identity (device and
//! inode) no longer matches the open handle was replaced, typically renamed
//! away with a fresh file created in its place. A file that shrank below our
//! read offset was truncated. Either one restarts reading at byte 0 of the
//! file the path names now.
//!
//! An in-place rewrite that keeps the inode and leaves the file at least as
//! large as the old offset passes both checks and is read as an append. On
//! platforms without inode numbers only the size check applies.

use std::fs::Metadata;

/// Identity of the file behind a path or handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileIdentity {
    dev: u64,
    ino: u64,
}

impl FileIdentity {
    /// Extract the identity from stat results.
    #[cfg(unix)]
    #[must_use]
    pub fn of(metadata: &Metadata) -> Self {
        use std::os::unix::fs::MetadataExt;
        Self {
            dev: metadata.dev(),
            ino: metadata.ino(),
        }
    }

    /// Without inode numbers every file compares equal.
    #[cfg(not(unix))]
    #[must_use]
    pub fn of(_metadata: &Metadata) -> Self {
        Self { dev: 0, ino: 0 }
    }
}

/// What a tail pass should do before reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotationDecision {
    /// Seek to the stored offset and read forward.
    Continue,
    /// The file shrank: seek to byte 0 and reset the stored offset first.
    ResetAndReadFromStart,
}

/// Decide whether the bytes behind `last_offset` are still valid.
#[must_use]
pub fn decide(last_offset: u64, current_size: u64) -> RotationDecision {
    if current_size < last_offset {
        RotationDecision::ResetAndReadFromStart
    } else {
        RotationDecision::Continue
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_growth_continues() {
        assert_eq!(decide(10, 25), RotationDecision::Continue);
    }

    #[test]
    fn test_unchanged_size_continues() {
        assert_eq!(decide(42, 42), RotationDecision::Continue);
        assert_eq!(decide(0, 0), RotationDecision::Continue);
    }

    #[test]
    fn test_shrink_resets() {
        assert_eq!(decide(100, 4), RotationDecision::ResetAndReadFromStart);
        assert_eq!(decide(1, 0), RotationDecision::ResetAndReadFromStart);
    }

    #[test]
    fn test_same_size_is_left_to_identity_check() {
        assert_eq!(decide(64, 64), RotationDecision::Continue);
    }

    #[cfg(unix)]
    #[test]
    fn test_identity_distinguishes_files() {
        let dir = tempfile::TempDir::new().unwrap();
        let first = dir.path().join("a.log");
        let second = dir.path().join("b.log");
        std::fs::write(&first, "x").unwrap();
        std::fs::write(&second, "x").unwrap();

        let a = FileIdentity::of(&std::fs::metadata(&first).unwrap());
        let b = FileIdentity::of(&std::fs::metadata(&second).unwrap());
        assert_ne!(a, b);

        // Renaming keeps the identity with the file, not the name.
        std::fs::rename(&first, dir.path().join("a.log.1")).unwrap();
        let moved = FileIdentity::of(&std::fs::metadata(dir.path().join("a.log.1")).unwrap());
        assert_eq!(a, moved);
    }
}
