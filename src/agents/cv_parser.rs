//! CV parsing agent.
//!
//! Extracts résumé text into a structured record and validates files for
//! upload. Heavy document formats (PDF, DOCX) are delegated to a pluggable
//! extractor so the core does not bind to a specific parsing library; page
//! extraction yields between pages to keep the UI responsive.

use crate::constants::timing;
use crate::error::{Error, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::time::sleep;

/// Maximum upload size: exactly 5 MB is accepted, one byte more is not.
pub const MAX_UPLOAD_BYTES: u64 = 5 * 1024 * 1024;

/// Structured CV record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CvData {
    pub raw_text: String,
    pub filename: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub education: Vec<String>,
    #[serde(default)]
    pub experience: Vec<String>,
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default)]
    pub languages: Vec<String>,
    #[serde(default)]
    pub certifications: Vec<String>,
}

/// Seam to external PDF/DOCX text-extraction libraries.
///
/// Implementations return the document one page per entry; the agent
/// concatenates pages with scheduler yields in between.
#[async_trait]
pub trait DocumentTextExtractor: Send + Sync {
    async fn extract_pages(&self, path: &Path) -> Result<Vec<String>>;
}

/// Extractor that reads the whole file as UTF-8 text in a single page.
///
/// Suitable for plain-text documents; binary formats need a real backend.
#[derive(Debug, Default)]
pub struct PlainTextExtractor;

#[async_trait]
impl DocumentTextExtractor for PlainTextExtractor {
    async fn extract_pages(&self, path: &Path) -> Result<Vec<String>> {
        let text = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        Ok(vec![text])
    }
}

/// Optional LLM-backed enrichment of the structured fields.
#[async_trait]
pub trait CvEnricher: Send + Sync {
    async fn enrich(&self, raw_text: &str) -> Result<CvData>;
}

/// Parses and validates CV files, memoising results by path.
pub struct CvParserAgent {
    supported_formats: Vec<String>,
    extractor: Arc<dyn DocumentTextExtractor>,
    enricher: Option<Arc<dyn CvEnricher>>,
    cache: Mutex<HashMap<PathBuf, CvData>>,
}

impl CvParserAgent {
    pub fn new(extractor: Arc<dyn DocumentTextExtractor>) -> Self {
        Self {
            supported_formats: vec![".pdf".into(), ".docx".into(), ".txt".into()],
            extractor,
            enricher: None,
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_supported_formats(mut self, formats: Vec<String>) -> Self {
        self.supported_formats = formats;
        self
    }

    pub fn with_enricher(mut self, enricher: Arc<dyn CvEnricher>) -> Self {
        self.enricher = Some(enricher);
        self
    }

    /// Prepare a CV for parsing and upload: verify it exists, parse it (or
    /// reuse the cached record) and return both the path and the record.
    pub async fn prepare_cv(&self, path: impl AsRef<Path>) -> Result<(PathBuf, CvData)> {
        let path = self.canonical(path.as_ref())?;
        if let Some(cached) = self.cached(&path) {
            tracing::debug!(path = %path.display(), "CV served from cache");
            return Ok((path, cached));
        }

        let data = self.parse_cv(&path).await?;
        self.cache
            .lock()
            .expect("cv cache poisoned")
            .insert(path.clone(), data.clone());
        tracing::info!(path = %path.display(), "CV parsed and cached");
        Ok((path, data))
    }

    /// Parse a CV file into a structured record.
    pub async fn parse_cv(&self, path: impl AsRef<Path>) -> Result<CvData> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::not_found(path));
        }
        let extension = file_extension(path);
        if !self.is_supported(&extension) {
            return Err(Error::unsupported_format(extension));
        }

        let raw_text = self.extract_text(path).await?;
        let mut data = CvData {
            raw_text,
            filename: path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            ..CvData::default()
        };

        if let Some(enricher) = &self.enricher {
            match enricher.enrich(&data.raw_text).await {
                Ok(extra) => data = merge_enrichment(data, extra),
                Err(err) => {
                    tracing::warn!(error = %err, "CV enrichment failed; keeping raw record")
                }
            }
        }
        Ok(data)
    }

    /// Extract the raw text of a CV.
    pub async fn extract_text(&self, path: impl AsRef<Path>) -> Result<String> {
        let path = path.as_ref();
        match file_extension(path).as_str() {
            ".txt" => std::fs::read_to_string(path).map_err(|e| Error::io(path, e)),
            ".pdf" | ".docx" => {
                let pages = self.extractor.extract_pages(path).await?;
                let mut text = String::new();
                for page in pages {
                    text.push_str(&page);
                    // One yield per page keeps long documents from starving
                    // the UI loop.
                    sleep(timing::PDF_PAGE_PARSE_DELAY).await;
                }
                Ok(text)
            }
            other => Err(Error::unsupported_format(other)),
        }
    }

    /// Validate a CV file for upload: exists, within the size limit,
    /// non-empty, readable, supported format. Never raises.
    pub async fn validate_for_upload(&self, path: impl AsRef<Path>) -> bool {
        let path = path.as_ref();
        let meta = match std::fs::metadata(path) {
            Ok(meta) => meta,
            Err(_) => {
                tracing::warn!(path = %path.display(), "CV file does not exist");
                return false;
            }
        };
        if meta.len() == 0 {
            tracing::warn!(path = %path.display(), "CV file is empty");
            return false;
        }
        if meta.len() > MAX_UPLOAD_BYTES {
            tracing::warn!(
                path = %path.display(),
                size = meta.len(),
                max = MAX_UPLOAD_BYTES,
                "CV file too large for upload"
            );
            return false;
        }
        if !self.is_supported(&file_extension(path)) {
            tracing::warn!(path = %path.display(), "CV file format not supported");
            return false;
        }
        if std::fs::File::open(path).is_err() {
            tracing::warn!(path = %path.display(), "CV file is not readable");
            return false;
        }
        true
    }

    /// Cached record for a path, if parsed before.
    pub fn cached(&self, path: &Path) -> Option<CvData> {
        self.cache
            .lock()
            .expect("cv cache poisoned")
            .get(path)
            .cloned()
    }

    fn is_supported(&self, extension: &str) -> bool {
        self.supported_formats
            .iter()
            .any(|f| f.eq_ignore_ascii_case(extension))
    }

    fn canonical(&self, path: &Path) -> Result<PathBuf> {
        if !path.exists() {
            return Err(Error::not_found(path));
        }
        Ok(std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf()))
    }
}

fn file_extension(path: &Path) -> String {
    path.extension()
        .map(|e| format!(".{}", e.to_string_lossy().to_lowercase()))
        .unwrap_or_default()
}

/// Merge enrichment into a parsed record. `raw_text` and `filename` are
/// never overridden; structured fields are only filled when the enricher
/// produced something.
fn merge_enrichment(base: CvData, extra: CvData) -> CvData {
    fn pick(base: String, extra: String) -> String {
        if extra.is_empty() {
            base
        } else {
            extra
        }
    }
    fn pick_vec(base: Vec<String>, extra: Vec<String>) -> Vec<String> {
        if extra.is_empty() {
            base
        } else {
            extra
        }
    }

    CvData {
        raw_text: base.raw_text,
        filename: base.filename,
        name: pick(base.name, extra.name),
        email: pick(base.email, extra.email),
        phone: pick(base.phone, extra.phone),
        address: pick(base.address, extra.address),
        education: pick_vec(base.education, extra.education),
        experience: pick_vec(base.experience, extra.experience),
        skills: pick_vec(base.skills, extra.skills),
        languages: pick_vec(base.languages, extra.languages),
        certifications: pick_vec(base.certifications, extra.certifications),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingExtractor {
        pages: Vec<String>,
        calls: AtomicUsize,
    }

    impl CountingExtractor {
        fn new(pages: Vec<&str>) -> Self {
            Self {
                pages: pages.into_iter().map(String::from).collect(),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl DocumentTextExtractor for CountingExtractor {
        async fn extract_pages(&self, _path: &Path) -> Result<Vec<String>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.pages.clone())
        }
    }

    fn write_file(dir: &tempfile::TempDir, name: &str, bytes: &[u8]) -> PathBuf {
        let path = dir.path().join(name);
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(bytes).unwrap();
        path
    }

    #[tokio::test(start_paused = true)]
    async fn test_parse_txt_cv() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "resume.txt", b"Jane Doe\nRust engineer");

        let agent = CvParserAgent::new(Arc::new(PlainTextExtractor));
        let data = agent.parse_cv(&path).await.unwrap();
        assert_eq!(data.filename, "resume.txt");
        assert!(data.raw_text.contains("Rust engineer"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_parse_pdf_concatenates_pages() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "resume.pdf", b"%PDF-fake");

        let agent = CvParserAgent::new(Arc::new(CountingExtractor::new(vec!["page one ", "page two"])));
        let data = agent.parse_cv(&path).await.unwrap();
        assert_eq!(data.raw_text, "page one page two");
    }

    #[tokio::test(start_paused = true)]
    async fn test_unsupported_format_raises() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "resume.odt", b"odt-bytes");

        let agent = CvParserAgent::new(Arc::new(PlainTextExtractor));
        let result = agent.parse_cv(&path).await;
        assert!(matches!(result, Err(Error::UnsupportedFormat { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_file_raises_not_found() {
        let agent = CvParserAgent::new(Arc::new(PlainTextExtractor));
        let result = agent.parse_cv("/nowhere/resume.pdf").await;
        assert!(matches!(result, Err(Error::NotFound { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_prepare_cv_parses_exactly_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "resume.pdf", b"%PDF-fake");
        let extractor = Arc::new(CountingExtractor::new(vec!["only page"]));
        let agent = CvParserAgent::new(Arc::clone(&extractor) as Arc<dyn DocumentTextExtractor>);

        let (first_path, first) = agent.prepare_cv(&path).await.unwrap();
        let (second_path, second) = agent.prepare_cv(&path).await.unwrap();

        assert_eq!(first_path, second_path);
        assert_eq!(first, second);
        assert_eq!(extractor.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_upload_validation_size_boundary() {
        let dir = tempfile::tempdir().unwrap();
        let agent = CvParserAgent::new(Arc::new(PlainTextExtractor));

        let exact = write_file(&dir, "exact.txt", &vec![b'a'; MAX_UPLOAD_BYTES as usize]);
        assert!(agent.validate_for_upload(&exact).await);

        let over = write_file(&dir, "over.txt", &vec![b'a'; MAX_UPLOAD_BYTES as usize + 1]);
        assert!(!agent.validate_for_upload(&over).await);
    }

    #[tokio::test]
    async fn test_upload_validation_rejects_empty_and_missing() {
        let dir = tempfile::tempdir().unwrap();
        let agent = CvParserAgent::new(Arc::new(PlainTextExtractor));

        let empty = write_file(&dir, "empty.txt", b"");
        assert!(!agent.validate_for_upload(&empty).await);
        assert!(!agent.validate_for_upload(dir.path().join("gone.txt")).await);

        let wrong = write_file(&dir, "cv.exe", b"MZ");
        assert!(!agent.validate_for_upload(&wrong).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_enrichment_cannot_override_raw_text() {
        struct OverbearingEnricher;
        #[async_trait]
        impl CvEnricher for OverbearingEnricher {
            async fn enrich(&self, _raw: &str) -> Result<CvData> {
                Ok(CvData {
                    raw_text: "REWRITTEN".into(),
                    filename: "evil.pdf".into(),
                    name: "Jane Doe".into(),
                    skills: vec!["Rust".into()],
                    ..CvData::default()
                })
            }
        }

        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "resume.txt", b"original text");
        let agent = CvParserAgent::new(Arc::new(PlainTextExtractor))
            .with_enricher(Arc::new(OverbearingEnricher));

        let data = agent.parse_cv(&path).await.unwrap();
        assert_eq!(data.raw_text, "original text");
        assert_eq!(data.filename, "resume.txt");
        assert_eq!(data.name, "Jane Doe");
        assert_eq!(data.skills, vec!["Rust".to_string()]);
    }
}
