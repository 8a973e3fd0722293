//! Legacy office formats: render to PDF with an external converter, then
//! read the PDF.
//!
//! Each conversion gets its own temporary directory, removed when the
//! extraction returns on every path. The converter runs as
//! `<program> <args…> --outdir <dir> <input>` in its own process group;
//! the whole group is killed when the time limit expires, so helper
//! processes such as `soffice.bin` do not outlive the request.

use crate::config::IngestConfig;
use crate::error::ExtractError;
use crate::format::DocumentFormat;
use crate::output::{metadata, ExtractionResult};
use crate::pipeline::pdf::{read_pdf, PdfText};
use crate::pipeline::Extractor;
use crate::prompts;
use async_trait::async_trait;
use serde_json::json;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Value of `metadata.extraction_method` for converted documents.
pub const EXTRACTION_METHOD: &str = "LibreOffice + pdfium";

/// An external document-to-PDF converter.
#[derive(Debug, Clone)]
pub struct Converter {
    program: String,
    args: Vec<String>,
    time_limit: Duration,
}

impl Converter {
    pub fn new(program: impl Into<String>, args: Vec<String>, time_limit: Duration) -> Self {
        Self {
            program: program.into(),
            args,
            time_limit,
        }
    }

    pub fn from_config(config: &IngestConfig) -> Self {
        Self::new(
            config.converter_program.clone(),
            config.converter_args.clone(),
            Duration::from_secs(config.conversion_timeout_secs),
        )
    }

    /// Convert `input` into a PDF inside `out_dir` and return its path.
    pub async fn to_pdf(&self, input: &Path, out_dir: &Path) -> Result<PathBuf, ExtractError> {
        debug!(program = %self.program, input = %input.display(), "Starting converter");

        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .arg("--outdir")
            .arg(out_dir)
            .arg(input)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        command.process_group(0);

        let child = command
            .spawn()
            .map_err(|source| ExtractError::ConverterLaunch {
                program: self.program.clone(),
                source,
            })?;
        let pid = child.id();

        let output = match timeout(self.time_limit, child.wait_with_output()).await {
            Ok(result) => result.map_err(|source| ExtractError::ConverterLaunch {
                program: self.program.clone(),
                source,
            })?,
            Err(_) => {
                kill_process_group(pid);
                return Err(ExtractError::ConversionTimeout {
                    secs: self.time_limit.as_secs(),
                });
            }
        };

        if !output.status.success() {
            return Err(ExtractError::ConversionFailed {
                code: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let stem = input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        locate_output_pdf(out_dir, &stem).ok_or(ExtractError::NoPdfProduced)
    }
}

/// SIGKILL every process in the converter's group. The group id equals
/// the converter's pid.
#[cfg(unix)]
fn kill_process_group(pid: Option<u32>) {
    let Some(pid) = pid else { return };
    let Ok(pgid) = libc::pid_t::try_from(pid) else { return };
    // SAFETY: killpg only sends a signal and touches no memory.
    let rc = unsafe { libc::killpg(pgid, libc::SIGKILL) };
    if rc == 0 {
        debug!(pgid, "Killed converter process group");
    } else {
        debug!(pgid, "Converter process group already gone");
    }
}

#[cfg(not(unix))]
fn kill_process_group(_pid: Option<u32>) {}

/// Find the converter's output: `<stem>.pdf` if present, otherwise the
/// first PDF in `dir` by name.
pub fn locate_output_pdf(dir: &Path, stem: &str) -> Option<PathBuf> {
    let expected = dir.join(format!("{stem}.pdf"));
    if expected.is_file() {
        return Some(expected);
    }

    let mut candidates: Vec<PathBuf> = std::fs::read_dir(dir)
        .ok()?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| {
            p.is_file()
                && p.extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| e.eq_ignore_ascii_case("pdf"))
        })
        .collect();
    candidates.sort();
    let found = candidates.into_iter().next()?;
    info!(pdf = %found.display(), "Using fallback converter output");
    Some(found)
}

/// Extractor for formats that need an external converter (doc, docx, ppt).
#[derive(Debug, Clone)]
pub struct ConvertExtractor {
    converter: Converter,
    library: Option<PathBuf>,
    format: DocumentFormat,
    work_root: Option<PathBuf>,
}

impl ConvertExtractor {
    pub fn new(converter: Converter, library: Option<PathBuf>, format: DocumentFormat) -> Self {
        Self {
            converter,
            library,
            format,
            work_root: None,
        }
    }

    /// Create scratch directories under `root` instead of the system
    /// temporary directory.
    pub fn with_work_root(mut self, root: Option<PathBuf>) -> Self {
        self.work_root = root;
        self
    }

    async fn convert_and_read(&self, input: &Path) -> Result<PdfText, ExtractError> {
        let root = self.work_root.clone().unwrap_or_else(std::env::temp_dir);
        let workdir = tempfile::Builder::new()
            .prefix("docingest-")
            .tempdir_in(&root)
            .map_err(|source| ExtractError::Io { path: root, source })?;
        let pdf = self.converter.to_pdf(input, workdir.path()).await?;
        info!(pdf = %pdf.display(), "Conversion succeeded");
        read_pdf(&pdf, self.library.as_deref()).await
    }
}

#[async_trait]
impl Extractor for ConvertExtractor {
    async fn extract(&self, path: &Path, file_name: &str) -> ExtractionResult {
        let kind = self.format.kind_label();
        let label = format!("{kind} (.{})", self.format.extension());

        match self.convert_and_read(path).await {
            Ok(pdf) => converted_result(pdf, kind, &label, file_name),
            Err(e @ ExtractError::ConversionTimeout { .. }) => {
                warn!(file = %file_name, error = %e, "Converter timed out");
                ExtractionResult::placeholder(
                    prompts::conversion_timed_out(kind, file_name),
                    metadata([("format", json!(label)), ("error", json!(e.metadata_tag()))]),
                )
            }
            Err(e) => {
                warn!(file = %file_name, error = %e, "Conversion failed");
                ExtractionResult::placeholder(
                    prompts::processing_failed(kind, file_name, &e),
                    metadata([("format", json!(label)), ("error", json!(e.metadata_tag()))]),
                )
            }
        }
    }
}

/// Shape the text of a converted PDF. A PDF without any text layer becomes
/// a single "no extractable text" chunk counted as one page.
fn converted_result(pdf: PdfText, kind: &str, label: &str, file_name: &str) -> ExtractionResult {
    let PdfText { chunks, page_count } = pdf;
    if chunks.is_empty() {
        info!(file = %file_name, "Converted document has no text layer");
        return ExtractionResult::placeholder(
            prompts::document_without_text(kind, file_name),
            metadata([
                ("format", json!(label)),
                ("extraction_method", json!(EXTRACTION_METHOD)),
                ("conversion_quality", json!("high")),
                ("total_pages", json!(1)),
                ("extracted_chunks", json!(1)),
            ]),
        );
    }
    let extracted = chunks.len();
    ExtractionResult {
        chunks,
        page_count,
        metadata: metadata([
            ("format", json!(label)),
            ("extraction_method", json!(EXTRACTION_METHOD)),
            ("conversion_quality", json!("high")),
            ("total_pages", json!(page_count)),
            ("extracted_chunks", json!(extracted)),
        ]),
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::output::Chunk;
    use tempfile::TempDir;

    /// A converter that runs `sh <script>`; the script sees
    /// `--outdir <dir> <input>` as `$1 $2 $3`.
    fn scripted(dir: &TempDir, body: &str, limit: Duration) -> Converter {
        let script = dir.path().join("convert.sh");
        std::fs::write(&script, body).unwrap();
        Converter::new("sh", vec![script.display().to_string()], limit)
    }

    fn input(dir: &TempDir) -> PathBuf {
        let path = dir.path().join("minutes.doc");
        std::fs::write(&path, b"legacy bytes").unwrap();
        path
    }

    #[test]
    fn expected_name_is_preferred() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.pdf"), b"").unwrap();
        std::fs::write(dir.path().join("report.pdf"), b"").unwrap();
        let found = locate_output_pdf(dir.path(), "report").unwrap();
        assert_eq!(found.file_name().unwrap(), "report.pdf");
    }

    #[test]
    fn fallback_scan_finds_renamed_output() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"").unwrap();
        std::fs::write(dir.path().join("Report_1.PDF"), b"").unwrap();
        let found = locate_output_pdf(dir.path(), "report").unwrap();
        assert_eq!(found.file_name().unwrap(), "Report_1.PDF");
    }

    #[test]
    fn empty_directory_has_no_output() {
        let dir = tempfile::tempdir().unwrap();
        assert!(locate_output_pdf(dir.path(), "report").is_none());
    }

    #[tokio::test]
    async fn renamed_output_is_returned() {
        let dir = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let conv = scripted(&dir, "touch \"$2/normalised.pdf\"\n", Duration::from_secs(10));
        let pdf = conv.to_pdf(&input(&dir), out.path()).await.unwrap();
        assert_eq!(pdf.file_name().unwrap(), "normalised.pdf");
    }

    #[tokio::test]
    async fn non_zero_exit_carries_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let conv = scripted(
            &dir,
            "echo 'source file could not be loaded' >&2\nexit 3\n",
            Duration::from_secs(10),
        );
        let err = conv.to_pdf(&input(&dir), out.path()).await.unwrap_err();
        match err {
            ExtractError::ConversionFailed { code, stderr } => {
                assert_eq!(code, 3);
                assert_eq!(stderr, "source file could not be loaded");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_program_is_a_launch_error() {
        let dir = tempfile::tempdir().unwrap();
        let conv = Converter::new(
            "docingest-no-such-converter",
            vec![],
            Duration::from_secs(1),
        );
        let err = conv.to_pdf(&input(&dir), dir.path()).await.unwrap_err();
        assert!(matches!(err, ExtractError::ConverterLaunch { .. }));
    }

    fn is_empty_dir(dir: &Path) -> bool {
        std::fs::read_dir(dir).unwrap().next().is_none()
    }

    #[tokio::test]
    async fn timeout_kills_helper_processes() {
        let dir = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let conv = scripted(
            &dir,
            "(sleep 1; touch \"$2/late.pdf\") &\nexec sleep 30\n",
            Duration::from_millis(300),
        );

        let err = conv.to_pdf(&input(&dir), out.path()).await.unwrap_err();
        assert!(matches!(err, ExtractError::ConversionTimeout { .. }));

        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert!(!out.path().join("late.pdf").exists());
    }

    #[tokio::test]
    async fn timeout_yields_single_placeholder() {
        let dir = tempfile::tempdir().unwrap();
        let work = tempfile::tempdir().unwrap();
        let conv = scripted(&dir, "exec sleep 30\n", Duration::from_millis(300));
        let extractor = ConvertExtractor::new(conv, None, DocumentFormat::Doc)
            .with_work_root(Some(work.path().to_path_buf()));

        let started = std::time::Instant::now();
        let result = extractor.extract(&input(&dir), "minutes.doc").await;
        assert!(started.elapsed() < Duration::from_secs(10));

        assert_eq!(result.chunks.len(), 1);
        assert_eq!(result.page_count, 1);
        assert_eq!(result.error(), Some("timeout"));
        assert_eq!(result.metadata["format"], "Word document (.doc)");
        assert!(result.chunks[0].text.starts_with("[Word document: minutes.doc]"));
        assert!(is_empty_dir(work.path()), "scratch directory left behind");
    }

    #[tokio::test]
    async fn no_pdf_produced_yields_placeholder() {
        let dir = tempfile::tempdir().unwrap();
        let conv = scripted(&dir, "exit 0\n", Duration::from_secs(10));
        let extractor = ConvertExtractor::new(conv, None, DocumentFormat::Ppt);

        let result = extractor.extract(&input(&dir), "deck.ppt").await;
        assert_eq!(result.page_count, 1);
        assert_eq!(result.chunks.len(), 1);
        assert_eq!(
            result.error(),
            Some(ExtractError::NoPdfProduced.to_string().as_str())
        );
        assert!(result.chunks[0].text.starts_with("[Presentation: deck.ppt]"));
    }

    #[tokio::test]
    async fn failed_conversion_reports_error_text() {
        let dir = tempfile::tempdir().unwrap();
        let work = tempfile::tempdir().unwrap();
        let conv = scripted(
            &dir,
            "echo 'general input/output error' >&2\nexit 1\n",
            Duration::from_secs(10),
        );
        let extractor = ConvertExtractor::new(conv, None, DocumentFormat::Docx)
            .with_work_root(Some(work.path().to_path_buf()));

        let result = extractor.extract(&input(&dir), "letter.docx").await;
        assert_eq!(result.page_count, 1);
        assert!(result.error().unwrap().contains("general input/output error"));
        assert!(result.chunks[0].text.contains("Processing error:"));
        assert!(is_empty_dir(work.path()), "scratch directory left behind");
    }

    #[test]
    fn converted_text_keeps_real_page_count() {
        let pdf = PdfText {
            chunks: vec![
                Chunk::new(1, "Minutes").unwrap(),
                Chunk::new(3, "Actions").unwrap(),
            ],
            page_count: 3,
        };
        let result = converted_result(pdf, "Word document", "Word document (.doc)", "m.doc");

        assert_eq!(result.page_count, 3);
        assert_eq!(result.chunks.len(), 2);
        assert!(result.error().is_none());
        assert_eq!(result.metadata["format"], "Word document (.doc)");
        assert_eq!(result.metadata["extraction_method"], EXTRACTION_METHOD);
        assert_eq!(result.metadata["conversion_quality"], "high");
        assert_eq!(result.metadata["total_pages"], 3);
        assert_eq!(result.metadata["extracted_chunks"], 2);
    }

    #[test]
    fn converted_pdf_without_text_is_one_placeholder_page() {
        let pdf = PdfText {
            chunks: vec![],
            page_count: 5,
        };
        let result = converted_result(pdf, "Presentation", "Presentation (.ppt)", "scan.ppt");

        assert_eq!(result.page_count, 1);
        assert_eq!(result.chunks.len(), 1);
        assert!(result.error().is_none());
        assert_eq!(
            result.chunks[0].text,
            prompts::document_without_text("Presentation", "scan.ppt").trim()
        );
        assert_eq!(result.metadata["total_pages"], 1);
        assert_eq!(result.metadata["extracted_chunks"], 1);
    }
}
