//! Persistent category codebook
//!
//! Assigns dense integer codes to categorical values. A fresh codebook
//! orders codes by sorted value, which matches a label encoder fitted on
//! the same data. Once persisted, existing codes never move: unseen values
//! are appended after them, or rejected when the codebook is frozen.

use crate::config::CodebookMode;
use crate::error::{PipelineError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::{debug, info};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CategoryCodebook {
    /// column -> (value -> code)
    columns: BTreeMap<String, BTreeMap<String, i64>>,
}

impl CategoryCodebook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|_| PipelineError::MissingFile {
            path: path.to_path_buf(),
            hint: "run `aptprice features` in extend mode to create it".to_string(),
        })?;
        let codebook: Self = serde_json::from_reader(BufReader::new(file))?;
        info!(path = %path.display(), columns = codebook.columns.len(), "Loaded codebook");
        Ok(codebook)
    }

    /// Load `path` if it exists, otherwise start empty
    pub fn load_or_new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::new())
        }
    }

    /// Pretty JSON form, the persisted layout read back by [`CategoryCodebook::load`]
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Encode `values` of `column`, growing the codebook as `mode` allows
    pub fn encode_column(
        &mut self,
        column: &str,
        values: &[String],
        mode: CodebookMode,
    ) -> Result<Vec<i64>> {
        if mode == CodebookMode::Frozen {
            let mapping = self.columns.get(column);
            return values
                .iter()
                .map(|v| {
                    mapping
                        .and_then(|m| m.get(v.as_str()))
                        .copied()
                        .ok_or_else(|| PipelineError::UnknownCategory {
                            column: column.to_string(),
                            value: v.clone(),
                        })
                })
                .collect();
        }

        let mapping = self.columns.entry(column.to_string()).or_default();

        let unseen: BTreeSet<&str> = values
            .iter()
            .map(String::as_str)
            .filter(|v| !mapping.contains_key(*v))
            .collect();

        if !unseen.is_empty() {
            let mut next = mapping.len() as i64;
            for value in &unseen {
                mapping.insert(value.to_string(), next);
                next += 1;
            }
            debug!(column, added = unseen.len(), total = mapping.len(), "Extended codebook");
        }

        values
            .iter()
            .map(|v| {
                mapping.get(v.as_str()).copied().ok_or_else(|| PipelineError::UnknownCategory {
                    column: column.to_string(),
                    value: v.clone(),
                })
            })
            .collect()
    }

    pub fn code(&self, column: &str, value: &str) -> Option<i64> {
        self.columns.get(column)?.get(value).copied()
    }

    /// Number of known categories for `column`
    pub fn len(&self, column: &str) -> usize {
        self.columns.get(column).map_or(0, BTreeMap::len)
    }

    pub fn is_empty(&self) -> bool {
        self.columns.values().all(BTreeMap::is_empty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_fresh_codes_are_sorted() {
        let mut codebook = CategoryCodebook::new();
        let codes = codebook
            .encode_column("법정동", &strings(&["역삼동", "대치동", "역삼동"]), CodebookMode::Extend)
            .unwrap();
        // 대치동 < 역삼동 in code-point order
        assert_eq!(codes, vec![1, 0, 1]);
        assert_eq!(codebook.len("법정동"), 2);
    }

    #[test]
    fn test_distinct_values_get_distinct_codes() {
        let mut codebook = CategoryCodebook::new();
        let values = strings(&["c", "a", "b", "a", "c"]);
        let codes = codebook.encode_column("x", &values, CodebookMode::Ephemeral).unwrap();
        for (i, a) in values.iter().enumerate() {
            for (j, b) in values.iter().enumerate() {
                assert_eq!(a == b, codes[i] == codes[j]);
            }
        }
        assert!(codes.iter().all(|&c| c >= 0));
    }

    #[test]
    fn test_extend_appends_after_existing() {
        let mut codebook = CategoryCodebook::new();
        codebook
            .encode_column("아파트", &strings(&["자이", "래미안"]), CodebookMode::Extend)
            .unwrap();
        let before = codebook.code("아파트", "자이");

        let codes = codebook
            .encode_column("아파트", &strings(&["힐스테이트", "자이", "더샵"]), CodebookMode::Extend)
            .unwrap();
        assert_eq!(codebook.code("아파트", "자이"), before);
        // new values sorted among themselves, after the two existing codes
        assert_eq!(codes, vec![3, 1, 2]);
    }

    #[test]
    fn test_frozen_rejects_unseen() {
        let mut codebook = CategoryCodebook::new();
        codebook
            .encode_column("법정동", &strings(&["역삼동"]), CodebookMode::Extend)
            .unwrap();
        let err = codebook
            .encode_column("법정동", &strings(&["역삼동", "청담동"]), CodebookMode::Frozen)
            .unwrap_err();
        match err {
            PipelineError::UnknownCategory { column, value } => {
                assert_eq!(column, "법정동");
                assert_eq!(value, "청담동");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(codebook.len("법정동"), 1);
    }

    #[test]
    fn test_frozen_unknown_column_leaves_codebook_unchanged() {
        let mut codebook = CategoryCodebook::new();
        codebook
            .encode_column("법정동", &strings(&["역삼동"]), CodebookMode::Extend)
            .unwrap();
        let before = codebook.clone();

        let err = codebook
            .encode_column("아파트", &strings(&["래미안"]), CodebookMode::Frozen)
            .unwrap_err();
        assert!(matches!(err, PipelineError::UnknownCategory { .. }));
        assert!(!codebook.columns.contains_key("아파트"));
        assert_eq!(codebook, before);

        // known values of a known column still encode
        let codes = codebook
            .encode_column("법정동", &strings(&["역삼동"]), CodebookMode::Frozen)
            .unwrap();
        assert_eq!(codes, vec![0]);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("codebook.json");
        let mut codebook = CategoryCodebook::new();
        codebook
            .encode_column("법정동", &strings(&["삼성동", "청담동"]), CodebookMode::Extend)
            .unwrap();
        std::fs::write(&path, codebook.to_json().unwrap()).unwrap();

        let loaded = CategoryCodebook::load(&path).unwrap();
        assert_eq!(loaded, codebook);
        assert!(CategoryCodebook::load_or_new(dir.path().join("none.json")).unwrap().is_empty());
    }
}
