//! On-disk checkpoints: locating the newest one, reading and writing them.

use crate::error::{ArtifactLookupError, PodcastError};
use crate::pipeline::turns::Turn;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::debug;

/// The most recently modified file in `dir` whose name matches `pattern`.
///
/// `pattern` is a file-name glob where `*` matches any run of characters.
/// A missing directory counts as "nothing there", not as unreadable.
pub fn find_latest_artifact(dir: &Path, pattern: &str) -> Result<PathBuf, ArtifactLookupError> {
    let not_found = || ArtifactLookupError::NotFound {
        dir: dir.to_path_buf(),
        pattern: pattern.to_string(),
    };

    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(not_found()),
        Err(source) => {
            return Err(ArtifactLookupError::Unreadable {
                path: dir.to_path_buf(),
                source,
            })
        }
    };

    let mut best: Option<(SystemTime, PathBuf)> = None;
    for entry in entries {
        let entry = entry.map_err(|source| ArtifactLookupError::Unreadable {
            path: dir.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        if !glob_match(pattern, name) || !path.is_file() {
            continue;
        }
        let modified = entry
            .metadata()
            .and_then(|m| m.modified())
            .map_err(|source| ArtifactLookupError::Unreadable {
                path: path.clone(),
                source,
            })?;
        // Ties go to the lexicographically greater name so the pick is stable.
        let newer = match &best {
            None => true,
            Some((t, p)) => modified > *t || (modified == *t && path > *p),
        };
        if newer {
            best = Some((modified, path));
        }
    }

    let (_, path) = best.ok_or_else(not_found)?;
    debug!("Latest checkpoint for '{}': {}", pattern, path.display());
    Ok(path)
}

/// Match `name` against a glob where `*` is the only wildcard.
fn glob_match(pattern: &str, name: &str) -> bool {
    let parts: Vec<&str> = pattern.split('*').collect();
    let [first, middle @ .., last] = parts.as_slice() else {
        return pattern == name;
    };
    let Some(mut rest) = name.strip_prefix(first) else {
        return false;
    };
    for part in middle {
        match rest.find(part) {
            Some(i) => rest = &rest[i + part.len()..],
            None => return false,
        }
    }
    rest.len() >= last.len() && rest.ends_with(last)
}

/// Read a text checkpoint, decoding as UTF-8 and falling back to Latin-1.
pub fn read_text_lossless(path: &Path) -> Result<String, PodcastError> {
    let bytes = std::fs::read(path).map_err(|e| PodcastError::ArtifactUnreadable {
        path: path.to_path_buf(),
        detail: e.to_string(),
    })?;
    Ok(match String::from_utf8(bytes) {
        Ok(s) => s,
        Err(e) => e.into_bytes().iter().map(|&b| b as char).collect(),
    })
}

/// Read the stage-2 script checkpoint (`data.json`, a JSON string).
pub fn read_script(path: &Path) -> Result<String, PodcastError> {
    let raw = read_text_lossless(path)?;
    serde_json::from_str(&raw).map_err(|e| PodcastError::ArtifactUnreadable {
        path: path.to_path_buf(),
        detail: format!("expected a JSON string: {e}"),
    })
}

/// Read the stage-3 turn-list checkpoint (`podcast_ready_data.json`).
pub fn read_turns(path: &Path) -> Result<Vec<Turn>, PodcastError> {
    let raw = read_text_lossless(path)?;
    serde_json::from_str(&raw).map_err(|e| PodcastError::ArtifactUnreadable {
        path: path.to_path_buf(),
        detail: format!("expected a list of [speaker, text] pairs: {e}"),
    })
}

/// Write `contents` atomically: a temp file in the same directory, then rename.
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), PodcastError> {
    let write_err = |source| PodcastError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir).map_err(write_err)?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(write_err)?;
    tmp.write_all(contents).map_err(write_err)?;
    tmp.flush().map_err(write_err)?;
    tmp.persist(path).map_err(|e| write_err(e.error))?;
    Ok(())
}

/// Serialize `value` as pretty JSON and write it atomically.
pub fn write_json<T: serde::Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), PodcastError> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| PodcastError::Internal(format!("serialize {}: {e}", path.display())))?;
    write_atomic(path, json.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::time::Duration;

    fn touch(path: &Path, mtime: SystemTime) {
        fs::write(path, b"x").unwrap();
        let f = fs::File::options().write(true).open(path).unwrap();
        f.set_modified(mtime).unwrap();
    }

    #[test]
    fn picks_most_recent_match() {
        let dir = tempfile::tempdir().unwrap();
        let base = SystemTime::now() - Duration::from_secs(100);
        touch(&dir.path().join("old.json"), base);
        touch(&dir.path().join("new.json"), base + Duration::from_secs(50));
        touch(&dir.path().join("newest.txt"), base + Duration::from_secs(90));

        let found = find_latest_artifact(dir.path(), "*.json").unwrap();
        assert_eq!(found.file_name().unwrap(), "new.json");
    }

    #[test]
    fn prefix_pattern_ignores_other_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("extracted_text.txt"), "raw").unwrap();
        fs::write(dir.path().join("clean_extracted_text.txt"), "clean").unwrap();
        let found = find_latest_artifact(dir.path(), "clean_*.txt").unwrap();
        assert_eq!(found.file_name().unwrap(), "clean_extracted_text.txt");
    }

    #[test]
    fn missing_dir_and_empty_dir_are_not_found() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            find_latest_artifact(&dir.path().join("step2"), "*.json"),
            Err(ArtifactLookupError::NotFound { .. })
        ));
        assert!(matches!(
            find_latest_artifact(dir.path(), "*.json"),
            Err(ArtifactLookupError::NotFound { .. })
        ));
    }

    #[test]
    fn glob_wildcards() {
        assert!(glob_match("*.json", "data.json"));
        assert!(!glob_match("*.json", "dataxjson"));
        assert!(glob_match("clean_*.txt", "clean_extracted_text.txt"));
        assert!(!glob_match("clean_*.txt", "extracted_text.txt"));
        assert!(glob_match("podcast.*", "podcast.wav"));
        assert!(glob_match("a*b*c", "a-x-b-y-c"));
        assert!(!glob_match("ab*ba", "aba"));
        assert!(glob_match("exact.txt", "exact.txt"));
    }

    #[test]
    fn latin1_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clean.txt");
        fs::write(&path, [b'c', b'a', b'f', 0xE9]).unwrap();
        assert_eq!(read_text_lossless(&path).unwrap(), "café");
    }

    #[test]
    fn json_checkpoints_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("step2/data.json");
        write_json(&script, "Speaker 1: hello").unwrap();
        assert_eq!(read_script(&script).unwrap(), "Speaker 1: hello");

        let turns_path = dir.path().join("step3/podcast_ready_data.json");
        let turns = vec![Turn::new("Speaker 1", "hi"), Turn::new("Speaker 2", "hey")];
        write_json(&turns_path, &turns).unwrap();
        assert_eq!(read_turns(&turns_path).unwrap(), turns);
    }

    #[test]
    fn undecodable_checkpoint_is_unreadable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.json");
        fs::write(&path, "not json").unwrap();
        assert!(matches!(
            read_script(&path),
            Err(PodcastError::ArtifactUnreadable { .. })
        ));
    }
}
