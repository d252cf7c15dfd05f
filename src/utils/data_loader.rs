//! CSV loading and saving for stage files
//!
//! Stage files are UTF-8 with a byte-order mark so spreadsheet tools pick
//! up the Korean headers. Older exports from Korean Windows machines are
//! CP949; those are decoded transparently on load.

use crate::error::{PipelineError, Result};
use encoding_rs::EUC_KR;
use polars::prelude::*;
use std::borrow::Cow;
use std::fs::{self, File};
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Text encoding a file was decoded with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextEncoding {
    Utf8,
    /// Windows code page 949 (EUC-KR superset)
    Cp949,
}

impl std::fmt::Display for TextEncoding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TextEncoding::Utf8 => write!(f, "UTF-8"),
            TextEncoding::Cp949 => write!(f, "CP949"),
        }
    }
}

/// Loader for stage CSV files. Every column comes back as a string column;
/// typing happens in the stage that owns the column.
#[derive(Debug, Clone, Default)]
pub struct DataLoader {
    /// Operator hint attached to `MissingFile` errors
    missing_hint: Option<String>,
}

impl DataLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a hint such as "run `aptprice preprocess` first"
    pub fn with_missing_hint(mut self, hint: impl Into<String>) -> Self {
        self.missing_hint = Some(hint.into());
        self
    }

    /// Load a CSV file with a header row
    pub fn load_csv(&self, path: impl AsRef<Path>) -> Result<DataFrame> {
        Ok(self.load_csv_with_encoding(path)?.0)
    }

    /// Load a CSV file and report which encoding it was decoded with
    pub fn load_csv_with_encoding(
        &self,
        path: impl AsRef<Path>,
    ) -> Result<(DataFrame, TextEncoding)> {
        let path = path.as_ref();
        let start = Instant::now();

        if !path.exists() {
            return Err(PipelineError::MissingFile {
                path: path.to_path_buf(),
                hint: self
                    .missing_hint
                    .clone()
                    .unwrap_or_else(|| "check the path".to_string()),
            });
        }

        let bytes = fs::read(path)?;
        let (text, encoding) = decode_text(&bytes).ok_or_else(|| PipelineError::Decode {
            path: path.to_path_buf(),
        })?;
        if encoding == TextEncoding::Cp949 {
            warn!(path = %path.display(), "File is not UTF-8, decoded as CP949");
        }

        let df = parse_csv(text.into_owned().into_bytes())?;

        info!(
            path = %path.display(),
            rows = df.height(),
            cols = df.width(),
            encoding = %encoding,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Loaded CSV"
        );
        Ok((df, encoding))
    }

    /// Get file info for display
    pub fn get_file_info(&self, path: impl AsRef<Path>) -> Result<FileInfo> {
        let path = path.as_ref();
        let (df, encoding) = self.load_csv_with_encoding(path)?;
        let file_size = fs::metadata(path)?.len();

        Ok(FileInfo {
            path: path.to_path_buf(),
            file_size,
            encoding,
            n_rows: df.height(),
            n_cols: df.width(),
            columns: df
                .get_column_names()
                .iter()
                .map(|c| c.to_string())
                .collect(),
            null_counts: df
                .get_columns()
                .iter()
                .map(|c| c.null_count())
                .collect(),
        })
    }
}

/// Decode bytes as UTF-8 (leading BOM stripped), falling back to CP949.
/// Returns `None` when neither decoding is valid.
pub fn decode_text(bytes: &[u8]) -> Option<(Cow<'_, str>, TextEncoding)> {
    let body = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    match std::str::from_utf8(body) {
        Ok(text) => Some((Cow::Borrowed(text), TextEncoding::Utf8)),
        Err(_) => EUC_KR
            .decode_without_bom_handling_and_without_replacement(bytes)
            .map(|text| (text, TextEncoding::Cp949)),
    }
}

fn parse_csv(bytes: Vec<u8>) -> Result<DataFrame> {
    // Schema inference is disabled: every column is read as text
    let df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(0))
        .into_reader_with_file_handle(Cursor::new(bytes))
        .finish()?;
    Ok(df)
}

/// Summary of a stage file
#[derive(Debug, Clone)]
pub struct FileInfo {
    pub path: PathBuf,
    pub file_size: u64,
    pub encoding: TextEncoding,
    pub n_rows: usize,
    pub n_cols: usize,
    pub columns: Vec<String>,
    pub null_counts: Vec<usize>,
}

/// Data saver for stage outputs
pub struct DataSaver;

impl DataSaver {
    /// Write `df` as BOM-prefixed UTF-8 CSV.
    ///
    /// The table is written to a temporary sibling first and renamed into
    /// place, so a failure never leaves a truncated file at `path`.
    pub fn save_csv(df: &mut DataFrame, path: impl AsRef<Path>) -> Result<()> {
        let mut staged = StagedFiles::new();
        staged.stage_csv(df, path)?;
        staged.commit()?;
        Ok(())
    }
}

/// Output files of one stage, written to temporary siblings and moved into
/// place together by [`StagedFiles::commit`]. Dropping without a commit
/// removes every temporary file, leaving the targets untouched.
#[derive(Debug, Default)]
pub struct StagedFiles {
    /// (temporary sibling, target), in staging order
    pending: Vec<(PathBuf, PathBuf)>,
}

impl StagedFiles {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage `df` as BOM-prefixed UTF-8 CSV for `path`
    pub fn stage_csv(&mut self, df: &mut DataFrame, path: impl AsRef<Path>) -> Result<()> {
        self.stage_with(path.as_ref(), |file| {
            file.write_all(UTF8_BOM)?;
            CsvWriter::new(&mut *file).include_header(true).finish(df)?;
            Ok(())
        })
    }

    /// Stage raw bytes for `path`
    pub fn stage_bytes(&mut self, bytes: &[u8], path: impl AsRef<Path>) -> Result<()> {
        self.stage_with(path.as_ref(), |file| Ok(file.write_all(bytes)?))
    }

    fn stage_with<F>(&mut self, path: &Path, write: F) -> Result<()>
    where
        F: FnOnce(&mut File) -> Result<()>,
    {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let tmp = temp_sibling(path);
        let written = File::create(&tmp)
            .map_err(PipelineError::from)
            .and_then(|mut file| {
                write(&mut file)?;
                file.sync_all()?;
                Ok(())
            });
        if let Err(err) = written {
            let _ = fs::remove_file(&tmp);
            return Err(err);
        }
        self.pending.push((tmp, path.to_path_buf()));
        Ok(())
    }

    /// Move every staged file into place in staging order and return the
    /// target paths. Stage the primary output last.
    pub fn commit(mut self) -> Result<Vec<PathBuf>> {
        let pending = std::mem::take(&mut self.pending);
        let mut committed = Vec::with_capacity(pending.len());
        let mut remaining = pending.into_iter();
        while let Some((tmp, target)) = remaining.next() {
            if let Err(err) = fs::rename(&tmp, &target) {
                let _ = fs::remove_file(&tmp);
                for (tmp, _) in remaining.by_ref() {
                    let _ = fs::remove_file(&tmp);
                }
                return Err(err.into());
            }
            debug!(path = %target.display(), "Committed stage file");
            committed.push(target);
        }
        Ok(committed)
    }
}

impl Drop for StagedFiles {
    fn drop(&mut self) {
        for (tmp, _) in self.pending.drain(..) {
            let _ = fs::remove_file(&tmp);
        }
    }
}

fn temp_sibling(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_save_then_load_keeps_korean_headers() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.csv");
        let mut df = df!(
            "법정동" => &["역삼동", "대치동"],
            "층" => &[5i64, 12],
        )
        .unwrap();
        DataSaver::save_csv(&mut df, &path).unwrap();

        let raw = fs::read(&path).unwrap();
        assert!(raw.starts_with(UTF8_BOM));

        let (loaded, encoding) = DataLoader::new().load_csv_with_encoding(&path).unwrap();
        assert_eq!(encoding, TextEncoding::Utf8);
        assert_eq!(loaded.height(), 2);
        assert_eq!(loaded.get_column_names()[0].as_str(), "법정동");
        // Everything is read back as text
        assert_eq!(loaded.column("층").unwrap().dtype(), &DataType::String);
        assert!(!temp_sibling(&path).exists());
    }

    #[test]
    fn test_missing_file_carries_hint() {
        let dir = tempdir().unwrap();
        let err = DataLoader::new()
            .with_missing_hint("run `aptprice generate` first")
            .load_csv(dir.path().join("nope.csv"))
            .unwrap_err();
        match err {
            PipelineError::MissingFile { hint, .. } => assert!(hint.contains("generate")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_cp949_fallback() {
        let (encoded, _, had_errors) = EUC_KR.encode("법정동,층\n역삼동,3\n");
        assert!(!had_errors);
        let dir = tempdir().unwrap();
        let path = dir.path().join("legacy.csv");
        fs::write(&path, &encoded).unwrap();

        let (df, encoding) = DataLoader::new().load_csv_with_encoding(&path).unwrap();
        assert_eq!(encoding, TextEncoding::Cp949);
        let value = df.column("법정동").unwrap().as_materialized_series().str().unwrap().get(0).map(str::to_string);
        assert_eq!(value.as_deref(), Some("역삼동"));
    }

    #[test]
    fn test_undecodable_bytes() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("garbage.csv");
        fs::write(&path, [0x61, 0x0A, 0xFF, 0xFF, 0xFF]).unwrap();
        let err = DataLoader::new().load_csv(&path).unwrap_err();
        assert!(matches!(err, PipelineError::Decode { .. }));
    }

    #[test]
    fn test_empty_fields_are_null() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("gaps.csv");
        fs::write(&path, "층,건축년도\n3,\n,2001\n").unwrap();
        let df = DataLoader::new().load_csv(&path).unwrap();
        assert_eq!(df.column("층").unwrap().null_count(), 1);
        assert_eq!(df.column("건축년도").unwrap().null_count(), 1);
    }

    #[test]
    fn test_file_info() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("info.csv");
        fs::write(&path, "a,b\n1,\n2,3\n").unwrap();
        let info = DataLoader::new().get_file_info(&path).unwrap();
        assert_eq!(info.n_rows, 2);
        assert_eq!(info.n_cols, 2);
        assert_eq!(info.columns, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(info.null_counts, vec![0, 1]);
    }

    #[test]
    fn test_dropped_stage_leaves_targets_untouched() {
        let dir = tempdir().unwrap();
        let side = dir.path().join("side.json");
        let primary = dir.path().join("primary.csv");
        fs::write(&primary, "old").unwrap();

        let mut staged = StagedFiles::new();
        staged.stage_bytes(b"{}", &side).unwrap();
        let mut df = df!("층" => &[1i64]).unwrap();
        staged.stage_csv(&mut df, &primary).unwrap();
        drop(staged);

        assert!(!side.exists());
        assert!(!temp_sibling(&side).exists());
        assert!(!temp_sibling(&primary).exists());
        assert_eq!(fs::read_to_string(&primary).unwrap(), "old");
    }

    #[test]
    fn test_commit_in_staging_order() {
        let dir = tempdir().unwrap();
        let mut staged = StagedFiles::new();
        staged.stage_bytes(b"a", dir.path().join("a.txt")).unwrap();
        staged.stage_bytes(b"b", dir.path().join("nested/b.txt")).unwrap();
        let committed = staged.commit().unwrap();

        assert_eq!(committed, vec![dir.path().join("a.txt"), dir.path().join("nested/b.txt")]);
        assert_eq!(fs::read_to_string(dir.path().join("nested/b.txt")).unwrap(), "b");
    }

    #[test]
    fn test_stage_fails_when_parent_is_a_file() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, "").unwrap();

        let mut staged = StagedFiles::new();
        assert!(staged.stage_bytes(b"x", blocker.join("out.json")).is_err());
        assert!(staged.commit().unwrap().is_empty());
    }
}
