//! Save and load the alphabet as JSON.
//!
//! Generated text is only meaningful against the alphabet it was sampled
//! with, so runs write the alphabet next to their output. Only the ordered
//! characters are stored; the lookup index is rebuilt on load.

use std::path::Path;

use crate::core::{GenError, GenResult};
use crate::data::Alphabet;

/// Write `alphabet` to `path` as pretty JSON, creating parent directories.
///
/// # Errors
///
/// Returns [`GenError::Io`] if the directory or file cannot be written.
pub fn save_alphabet(alphabet: &Alphabet, path: &Path) -> GenResult<()> {
    let json = serde_json::to_string_pretty(alphabet)?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| GenError::io(e, Some(parent.to_path_buf())))?;
    }

    std::fs::write(path, json).map_err(|e| GenError::io(e, Some(path.to_path_buf())))
}

/// Read an alphabet written by [`save_alphabet`].
///
/// # Errors
///
/// Returns [`GenError::Io`] if the file cannot be read,
/// [`GenError::Serialization`] if it is not a valid alphabet or its
/// characters are not strictly ascending, and
/// [`GenError::EmptyCorpus`] if it holds no characters.
pub fn load_alphabet(path: &Path) -> GenResult<Alphabet> {
    let json =
        std::fs::read_to_string(path).map_err(|e| GenError::io(e, Some(path.to_path_buf())))?;
    let alphabet: Alphabet = serde_json::from_str(&json)?;
    if alphabet.size() == 0 {
        return Err(GenError::EmptyCorpus);
    }
    Ok(alphabet)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_alphabet_round_trip() {
        let alphabet = Alphabet::from_text("zarathustra spoke\n").expect("non-empty");
        let dir = std::env::temp_dir().join("chargen_test_alphabet");
        let path = dir.join("alphabet.json");

        save_alphabet(&alphabet, &path).expect("save");
        let loaded = load_alphabet(&path).expect("load");
        assert_eq!(loaded, alphabet);
        assert_eq!(loaded.char_to_index('\n'), Some(0));

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_save_creates_directory() {
        let root = std::env::temp_dir().join("chargen_test_nested");
        let path = root.join("deep").join("path").join("alphabet.json");
        let alphabet = Alphabet::from_text("ab").expect("non-empty");

        save_alphabet(&alphabet, &path).expect("save");
        assert!(path.exists());

        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn test_load_nonexistent_alphabet() {
        let result = load_alphabet(Path::new("/nonexistent/alphabet.json"));
        assert!(matches!(result, Err(GenError::Io { .. })));
    }

    #[test]
    fn test_load_rejects_garbage_and_empty() {
        let dir = std::env::temp_dir().join("chargen_test_bad_alphabet");
        fs::create_dir_all(&dir).expect("create dir");

        let garbage = dir.join("garbage.json");
        fs::write(&garbage, "not json").expect("write");
        assert!(matches!(
            load_alphabet(&garbage),
            Err(GenError::Serialization(_))
        ));

        let empty = dir.join("empty.json");
        fs::write(&empty, r#"{"chars": []}"#).expect("write");
        assert!(matches!(load_alphabet(&empty), Err(GenError::EmptyCorpus)));

        let reordered = dir.join("reordered.json");
        fs::write(&reordered, r#"{"chars": ["b", "a", "a"]}"#).expect("write");
        assert!(matches!(
            load_alphabet(&reordered),
            Err(GenError::Serialization(_))
        ));

        let _ = fs::remove_dir_all(&dir);
    }
}
