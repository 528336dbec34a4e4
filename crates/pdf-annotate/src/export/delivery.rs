//! Output naming and delivery

use super::ExportedDocument;
use crate::constants::{DEFAULT_BASE_NAME, EXPORT_FILE_SUFFIX};
use crate::types::{AnnotateError, Result};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};

/// Name of the exported file for a source file name.
///
/// Only the last path component of the source name is used. A trailing
/// `.pdf` (any case) is stripped before the suffix is appended.
pub fn output_file_name(source_file_name: Option<&str>) -> String {
    let name = source_file_name
        .and_then(|name| name.rsplit(['/', '\\']).next())
        .filter(|name| !matches!(*name, "" | "." | ".."))
        .unwrap_or(DEFAULT_BASE_NAME);
    let base = name
        .len()
        .checked_sub(4)
        .filter(|&split| {
            name.get(split..)
                .is_some_and(|ext| ext.eq_ignore_ascii_case(".pdf"))
        })
        .map_or(name, |split| &name[..split]);
    format!("{}{}", base, EXPORT_FILE_SUFFIX)
}

/// Write an exported document into `dir` under its output name.
///
/// The bytes go to a temporary file that is renamed into place; the temporary
/// file is removed whether or not delivery succeeds. Fails when the output
/// name is not a plain file name.
pub async fn deliver_to_dir(exported: &ExportedDocument, dir: impl AsRef<Path>) -> Result<PathBuf> {
    let dir = dir.as_ref();
    let file_name = exported.file_name.as_str();
    let plain = Path::new(file_name).file_name() == Some(OsStr::new(file_name));
    if !plain || file_name.contains('\\') {
        return Err(AnnotateError::Config(format!(
            "Output name {:?} is not a plain file name",
            file_name
        )));
    }
    tokio::fs::create_dir_all(dir).await?;

    let target = dir.join(file_name);
    let temp_path = dir.join(format!(".{}.part", file_name));

    let result = async {
        tokio::fs::write(&temp_path, &exported.bytes).await?;
        tokio::fs::rename(&temp_path, &target).await
    }
    .await;

    if result.is_err() {
        let _ = tokio::fs::remove_file(&temp_path).await;
    }
    result?;

    log::info!(
        "Delivered {} ({} bytes, {})",
        target.display(),
        exported.bytes.len(),
        ExportedDocument::MIME_TYPE
    );
    Ok(target)
}
