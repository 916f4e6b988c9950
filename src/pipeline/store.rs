// Artifact store - sentence files and metrics documents

use super::types::QualityReport;
use std::path::{Path, PathBuf};

/// Write one sentence per line, optionally prefixed with `[n] ` (1-based).
///
/// Line breaks inside a sentence are replaced by spaces so that line `n`
/// is always sentence `n`. Overwrites any existing file.
pub async fn save_sentences(sentences: &[String], path: &Path, numbered: bool) -> Result<(), StoreError> {
    let mut contents = String::new();
    for (index, sentence) in sentences.iter().enumerate() {
        let line = sentence.replace(['\r', '\n'], " ");
        if numbered {
            contents.push_str(&format!("[{}] {}\n", index + 1, line));
        } else {
            contents.push_str(&line);
            contents.push('\n');
        }
    }

    write_file(path, contents.as_bytes()).await?;
    tracing::info!(
        path = %path.display(),
        sentences = sentences.len(),
        "Saved {} ({} sentences, {:.1} KB)",
        file_name(path),
        sentences.len(),
        contents.len() as f64 / 1024.0
    );
    Ok(())
}

/// Read sentences back, dropping a leading `[n] ` prefix where present
pub async fn load_sentences(path: &Path) -> Result<Vec<String>, StoreError> {
    let contents = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| StoreError::io(path, e))?;

    Ok(contents
        .lines()
        .map(|line| strip_index_prefix(line).to_string())
        .collect())
}

/// `"[12] text"` -> `"text"`; anything else is returned unchanged
pub fn strip_index_prefix(line: &str) -> &str {
    let Some(rest) = line.strip_prefix('[') else {
        return line;
    };
    let Some(close) = rest.find("] ") else {
        return line;
    };
    let digits = &rest[..close];
    if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
        &rest[close + 2..]
    } else {
        line
    }
}

/// Write the report as pretty JSON
pub async fn save_metrics(report: &QualityReport, path: &Path) -> Result<(), StoreError> {
    let json = serde_json::to_string_pretty(report).map_err(|e| StoreError::Serialize(e.to_string()))?;
    write_file(path, json.as_bytes()).await?;
    tracing::info!(
        path = %path.display(),
        "Saved {} ({:.1} KB)",
        file_name(path),
        json.len() as f64 / 1024.0
    );
    Ok(())
}

pub async fn load_metrics(path: &Path) -> Result<QualityReport, StoreError> {
    let contents = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| StoreError::io(path, e))?;
    serde_json::from_str(&contents).map_err(|e| StoreError::Serialize(format!("{}: {}", path.display(), e)))
}

pub(crate) async fn write_file(path: &Path, contents: &[u8]) -> Result<(), StoreError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| StoreError::io(parent, e))?;
    }
    tokio::fs::write(path, contents)
        .await
        .map_err(|e| StoreError::io(path, e))
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("IO error on {path}: {reason}")]
    Io { path: PathBuf, reason: String },

    #[error("Serialization error: {0}")]
    Serialize(String),

    #[error("Image encoding error: {0}")]
    Image(String),
}

impl StoreError {
    fn io(path: &Path, err: std::io::Error) -> Self {
        StoreError::Io {
            path: path.to_path_buf(),
            reason: err.to_string(),
        }
    }
}
