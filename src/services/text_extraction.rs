use anyhow::Context;
use std::path::{Path as StdPath, PathBuf};
use tokio::fs;

use crate::error::{Error, Result};

const ALLOWED_EXTENSIONS: [&str; 3] = ["pdf", "docx", "txt"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Pdf,
    Docx,
    Text,
}

impl SourceKind {
    pub fn from_filename(filename: &str) -> Result<Self> {
        let ext = StdPath::new(filename)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .unwrap_or_default();

        match ext.as_str() {
            "pdf" => Ok(SourceKind::Pdf),
            "docx" => Ok(SourceKind::Docx),
            "txt" => Ok(SourceKind::Text),
            "" => Err(Error::BadRequest("Uploaded file has no extension".into())),
            other => Err(Error::BadRequest(format!(
                "File type .{} is not allowed; expected one of {}",
                other,
                ALLOWED_EXTENSIONS.join(", ")
            ))),
        }
    }

    fn extension(self) -> &'static str {
        match self {
            SourceKind::Pdf => "pdf",
            SourceKind::Docx => "docx",
            SourceKind::Text => "txt",
        }
    }
}

/// Pulls plain text out of an uploaded source document.
pub async fn extract_text(filename: &str, data: &[u8]) -> Result<String> {
    let kind = SourceKind::from_filename(filename)?;

    let text = match kind {
        SourceKind::Text => String::from_utf8(data.to_vec())
            .map_err(|_| Error::BadRequest("Text file is not valid UTF-8".into()))?,
        SourceKind::Pdf => {
            if !data.starts_with(b"%PDF") {
                return Err(Error::BadRequest("Invalid PDF file content".into()));
            }
            let scratch = ScratchFile::write(kind, data).await?;
            let result = run_pdftotext(scratch.path()).await;
            scratch.remove().await;
            result?
        }
        SourceKind::Docx => {
            // docx is a zip container
            if !data.starts_with(b"PK") {
                return Err(Error::BadRequest("Invalid DOCX file content".into()));
            }
            let scratch = ScratchFile::write(kind, data).await?;
            let result = run_libreoffice(scratch.path()).await;
            scratch.remove().await;
            result?
        }
    };

    let text = text.trim().to_string();
    if text.is_empty() {
        return Err(Error::BadRequest(
            "Could not extract any text from the uploaded file".into(),
        ));
    }

    tracing::debug!(filename, chars = text.chars().count(), "source text extracted");
    Ok(text)
}

struct ScratchFile {
    path: PathBuf,
}

impl ScratchFile {
    async fn write(kind: SourceKind, data: &[u8]) -> Result<Self> {
        let path = std::env::temp_dir().join(format!(
            "maris-{}.{}",
            uuid::Uuid::new_v4(),
            kind.extension()
        ));
        fs::write(&path, data).await.map_err(|e| {
            tracing::error!("Failed to write upload to {}: {}", path.display(), e);
            Error::Internal(format!("Failed to store upload: {}", e))
        })?;
        Ok(Self { path })
    }

    fn path(&self) -> &StdPath {
        &self.path
    }

    async fn remove(self) {
        if let Err(e) = fs::remove_file(&self.path).await {
            tracing::warn!("Failed to remove {}: {}", self.path.display(), e);
        }
    }
}

async fn run_pdftotext(path: &StdPath) -> Result<String> {
    let output = tokio::process::Command::new("pdftotext")
        .arg("-layout")
        .arg(path)
        .arg("-")
        .output()
        .await
        .context("PDF text extraction is unavailable (pdftotext)")?;

    if !output.status.success() {
        tracing::warn!(
            status = %output.status,
            stderr = %String::from_utf8_lossy(&output.stderr),
            "pdftotext failed"
        );
        return Err(Error::BadRequest("Could not read the PDF file".into()));
    }
    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}

async fn run_libreoffice(path: &StdPath) -> Result<String> {
    let out_dir = path.parent().map(StdPath::to_path_buf).unwrap_or_else(std::env::temp_dir);
    let output = tokio::process::Command::new("libreoffice")
        .arg("--headless")
        .arg("--convert-to")
        .arg("txt:Text")
        .arg("--outdir")
        .arg(&out_dir)
        .arg(path)
        .output()
        .await
        .context("DOCX text extraction is unavailable (libreoffice)")?;

    if !output.status.success() {
        tracing::warn!(
            status = %output.status,
            stderr = %String::from_utf8_lossy(&output.stderr),
            "libreoffice conversion failed"
        );
        return Err(Error::BadRequest("Could not read the DOCX file".into()));
    }

    let converted = path.with_extension("txt");
    let text = fs::read_to_string(&converted).await;
    let _ = fs::remove_file(&converted).await;
    text.map_err(|e| {
        tracing::error!("Converted text missing at {}: {}", converted.display(), e);
        Error::BadRequest("Could not read the DOCX file".into())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extensions_are_case_insensitive() {
        assert_eq!(SourceKind::from_filename("notes.TXT").unwrap(), SourceKind::Text);
        assert_eq!(SourceKind::from_filename("a.b.Pdf").unwrap(), SourceKind::Pdf);
        assert_eq!(SourceKind::from_filename("lesson.docx").unwrap(), SourceKind::Docx);
    }

    #[test]
    fn unsupported_extensions_are_rejected() {
        let err = SourceKind::from_filename("slides.pptx").unwrap_err();
        assert!(err.to_string().contains(".pptx"));
        assert!(SourceKind::from_filename("README").is_err());
    }

    #[tokio::test]
    async fn text_uploads_are_trimmed() {
        let text = extract_text("chapter.txt", b"  Photosynthesis converts light.\n\n")
            .await
            .unwrap();
        assert_eq!(text, "Photosynthesis converts light.");
    }

    #[tokio::test]
    async fn blank_or_invalid_uploads_are_bad_requests() {
        assert!(matches!(
            extract_text("empty.txt", b"   \n").await,
            Err(Error::BadRequest(_))
        ));
        assert!(matches!(
            extract_text("binary.txt", &[0xff, 0xfe, 0x00]).await,
            Err(Error::BadRequest(_))
        ));
        assert!(matches!(
            extract_text("fake.pdf", b"not a pdf").await,
            Err(Error::BadRequest(_))
        ));
    }
}
