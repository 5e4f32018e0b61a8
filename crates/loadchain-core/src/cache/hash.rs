use std::io::ErrorKind;
use std::path::Path;

/// Blake3 hash of a byte slice, hex encoded
pub fn hash_bytes(bytes: &[u8]) -> String {
    blake3::hash(bytes).to_hex().to_string()
}

/// Compute Blake3 hash of file content
pub fn hash_file(path: &Path) -> std::io::Result<String> {
    let content = std::fs::read(path)?;
    Ok(hash_bytes(&content))
}

/// Hash the contents of the watched configuration files.
///
/// Files are resolved against `root` and hashed in the given order. A
/// missing file contributes a fixed marker, so creating or deleting one
/// changes the result.
pub fn hash_watched_files(root: &Path, files: &[String]) -> std::io::Result<String> {
    let mut hasher = blake3::Hasher::new();
    for name in files {
        hasher.update(name.as_bytes());
        hasher.update(&[0]);
        match std::fs::read(root.join(name)) {
            Ok(content) => {
                hasher.update(b"present");
                hasher.update(blake3::hash(&content).as_bytes());
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                hasher.update(b"missing");
            }
            Err(e) => return Err(e),
        }
    }
    Ok(hasher.finalize().to_hex().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::{NamedTempFile, TempDir};

    #[test]
    fn test_hash_file_consistency() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"test content").unwrap();
        file.flush().unwrap();

        let hash1 = hash_file(file.path()).unwrap();
        let hash2 = hash_file(file.path()).unwrap();

        assert_eq!(hash1, hash2, "Hash should be consistent");
    }

    #[test]
    fn test_watched_file_content_changes_hash() {
        let dir = TempDir::new().unwrap();
        let watched = vec!["babel.config.js".to_string()];
        std::fs::write(dir.path().join("babel.config.js"), "module.exports = {}").unwrap();
        let before = hash_watched_files(dir.path(), &watched).unwrap();

        std::fs::write(
            dir.path().join("babel.config.js"),
            "module.exports = { presets: [] }",
        )
        .unwrap();
        let after = hash_watched_files(dir.path(), &watched).unwrap();

        assert_ne!(before, after);
    }

    #[test]
    fn test_missing_watched_file_is_stable() {
        let dir = TempDir::new().unwrap();
        let watched = vec![".browserslistrc".to_string()];

        let hash1 = hash_watched_files(dir.path(), &watched).unwrap();
        let hash2 = hash_watched_files(dir.path(), &watched).unwrap();
        assert_eq!(hash1, hash2);

        std::fs::write(dir.path().join(".browserslistrc"), "").unwrap();
        let created = hash_watched_files(dir.path(), &watched).unwrap();
        assert_ne!(hash1, created, "Creating an empty file should invalidate");
    }
}
