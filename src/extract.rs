//! Text extraction from uploaded files.

use std::path::PathBuf;

use tokio::process::Command;

use crate::error::ApiError;

/// Pulls readable text out of an upload based on its extension.
///
/// `.txt` and `.md` are decoded as UTF-8 (lossily, uploads are not always
/// clean); `.pdf` goes through the `pdftotext` system binary. Anything else
/// is rejected up front.
pub async fn extract_text(filename: &str, bytes: &[u8]) -> Result<String, ApiError> {
    let extension = filename
        .rsplit('.')
        .next()
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    match extension.as_str() {
        "txt" | "md" => Ok(String::from_utf8_lossy(bytes).into_owned()),
        "pdf" => {
            if bytes.is_empty() {
                return Err(ApiError::Validation(
                    "Empty PDF buffer (upload likely failed)".into(),
                ));
            }
            extract_pdf_text(bytes).await
        }
        _ => Err(ApiError::Validation(
            "Unsupported file type. Please upload .txt, .md, or .pdf".into(),
        )),
    }
}

async fn extract_pdf_text(bytes: &[u8]) -> Result<String, ApiError> {
    let temp_path = temp_pdf_path();
    tokio::fs::write(&temp_path, bytes)
        .await
        .map_err(|err| ApiError::Storage(format!("failed to stage PDF: {err}")))?;

    let output = Command::new("pdftotext")
        .arg(&temp_path)
        .arg("-") // stdout
        .output()
        .await;
    let _ = tokio::fs::remove_file(&temp_path).await;

    let output = output.map_err(|err| {
        ApiError::Upstream(format!("failed to run pdftotext (is it installed?): {err}"))
    })?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(ApiError::Validation(format!(
            "pdftotext failed: {}",
            stderr.trim()
        )));
    }

    let text = String::from_utf8_lossy(&output.stdout).into_owned();
    if text.trim().is_empty() {
        tracing::warn!("pdftotext extracted no text");
        return Err(ApiError::Validation(
            "No readable text found in PDF.".into(),
        ));
    }
    Ok(text)
}

fn temp_pdf_path() -> PathBuf {
    std::env::temp_dir().join(format!("pitchdesk_upload_{}.pdf", uuid::Uuid::new_v4()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn plain_text_passes_through() {
        let text = extract_text("notes.txt", "hello world".as_bytes())
            .await
            .unwrap();
        assert_eq!(text, "hello world");
    }

    #[tokio::test]
    async fn markdown_is_treated_as_text() {
        let text = extract_text("README.md", "# Title".as_bytes()).await.unwrap();
        assert_eq!(text, "# Title");
    }

    #[tokio::test]
    async fn extension_check_is_case_insensitive() {
        assert!(extract_text("NOTES.TXT", b"ok").await.is_ok());
    }

    #[tokio::test]
    async fn unsupported_extension_is_rejected() {
        let err = extract_text("image.png", &[1, 2, 3]).await.unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }

    #[tokio::test]
    async fn empty_pdf_is_rejected_before_spawning() {
        let err = extract_text("doc.pdf", &[]).await.unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }
}
