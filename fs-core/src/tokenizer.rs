//! Line tokenizer for the operation log

use crate::store::{RecordStore, Result};

/// Field delimiters used by the operation log
pub const LOG_DELIMITERS: &[char] = &[',', ' '];

/// Split `line` into owned, non-empty fields separated by any of `delims`.
///
/// Consecutive delimiters never produce empty fields and trailing
/// delimiters never produce a phantom final field. A trailing line
/// terminator (`\n` or `\r\n`) is not part of the last field.
pub fn tokenize(line: &str, delims: &[char]) -> Result<RecordStore<String>> {
    let line = line.trim_end_matches(|c| c == '\n' || c == '\r');
    let mut fields = RecordStore::new();
    for field in line.split(|c: char| delims.contains(&c)) {
        if !field.is_empty() {
            fields.push(field.to_owned())?;
        }
    }
    Ok(fields)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(line: &str) -> Vec<String> {
        tokenize(line, LOG_DELIMITERS).unwrap().iter().cloned().collect()
    }

    #[test]
    fn test_create_file_record() {
        assert_eq!(
            fields("create_file, /d-01/f-00, 0100, 0644"),
            vec!["create_file", "/d-01/f-00", "0100", "0644"]
        );
    }

    #[test]
    fn test_no_empty_fields() {
        assert_eq!(fields("unlink,,  /a ,"), vec!["unlink", "/a"]);
        assert_eq!(fields(" , "), Vec::<String>::new());
        assert!(fields("").is_empty());
    }

    #[test]
    fn test_strips_line_terminator() {
        assert_eq!(fields("rmdir, /d-00\n"), vec!["rmdir", "/d-00"]);
        assert_eq!(fields("rmdir, /d-00\r\n"), vec!["rmdir", "/d-00"]);
    }

    #[test]
    fn test_custom_delimiters() {
        let store = tokenize("a;b;;c", &[';']).unwrap();
        assert_eq!(store.len(), 3);
        assert_eq!(store.peek_top().map(String::as_str), Some("c"));
    }

    #[test]
    fn test_many_fields_grow_store() {
        let line = (0..40).map(|i| i.to_string()).collect::<Vec<_>>().join(", ");
        let store = tokenize(&line, LOG_DELIMITERS).unwrap();
        assert_eq!(store.len(), 40);
        assert_eq!(store.get(39).map(String::as_str), Some("39"));
    }
}
