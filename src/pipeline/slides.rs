//! Slide-deck extraction straight from the OOXML package.
//!
//! A `.pptx` is a zip of XML parts. Slide order comes from the
//! `p:sldIdLst` of `ppt/presentation.xml`, resolved through its
//! relationships part; packages without a usable list fall back to the
//! numeric order of `ppt/slides/slideN.xml`.

use crate::error::ExtractError;
use crate::output::{metadata, Chunk, ExtractionResult};
use crate::pipeline::Extractor;
use crate::prompts;
use async_trait::async_trait;
use serde_json::json;
use std::collections::HashMap;
use std::fs::File;
use std::io::{Read, Seek};
use std::path::Path;
use tracing::{debug, warn};
use zip::ZipArchive;

const P_NAMESPACE: &str = "http://schemas.openxmlformats.org/presentationml/2006/main";
const A_NAMESPACE: &str = "http://schemas.openxmlformats.org/drawingml/2006/main";
const R_NAMESPACE: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

/// Slide chunks and the total slide count.
#[derive(Debug, Clone)]
pub struct SlideText {
    pub chunks: Vec<Chunk>,
    pub slide_count: usize,
}

/// Read every slide of the deck at `path`.
pub fn read_slides(path: &Path) -> Result<SlideText, ExtractError> {
    let file = File::open(path).map_err(|source| ExtractError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    read_slides_from(file)
}

/// Read every slide from any seekable zip source.
pub fn read_slides_from<R: Read + Seek>(reader: R) -> Result<SlideText, ExtractError> {
    let mut archive = ZipArchive::new(reader)
        .map_err(|e| ExtractError::Presentation(format!("not a zip package: {e}")))?;

    let slide_paths = find_slide_paths(&mut archive);
    debug!(slides = slide_paths.len(), "Slide parts located");

    let mut chunks = Vec::new();
    for (idx, part) in slide_paths.iter().enumerate() {
        let xml = read_part(&mut archive, part)?;
        let text = slide_text(&xml)
            .map_err(|e| ExtractError::Presentation(format!("{part}: {e}")))?;
        chunks.extend(Chunk::new(idx + 1, &text));
    }

    Ok(SlideText {
        chunks,
        slide_count: slide_paths.len(),
    })
}

fn read_part<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    name: &str,
) -> Result<String, ExtractError> {
    let mut file = archive
        .by_name(name)
        .map_err(|e| ExtractError::Presentation(format!("missing part {name}: {e}")))?;
    let mut contents = String::new();
    file.read_to_string(&mut contents)
        .map_err(|e| ExtractError::Presentation(format!("unreadable part {name}: {e}")))?;
    Ok(contents)
}

fn find_slide_paths<R: Read + Seek>(archive: &mut ZipArchive<R>) -> Vec<String> {
    let ordered = read_part(archive, "ppt/presentation.xml")
        .ok()
        .zip(read_part(archive, "ppt/_rels/presentation.xml.rels").ok())
        .and_then(|(presentation, rels)| ordered_slide_paths(&presentation, &rels));

    if let Some(paths) = ordered {
        let available: Vec<String> = paths
            .into_iter()
            .filter(|p| archive.index_for_name(p).is_some())
            .collect();
        if !available.is_empty() {
            return available;
        }
    }

    let mut numbered: Vec<(u32, String)> = archive
        .file_names()
        .filter_map(|name| {
            let n = name
                .strip_prefix("ppt/slides/slide")?
                .strip_suffix(".xml")?
                .parse()
                .ok()?;
            Some((n, name.to_string()))
        })
        .collect();
    numbered.sort();
    numbered.into_iter().map(|(_, name)| name).collect()
}

/// Slide part names in presentation order, or `None` if either part is
/// malformed.
fn ordered_slide_paths(presentation_xml: &str, rels_xml: &str) -> Option<Vec<String>> {
    let rels_doc = roxmltree::Document::parse(rels_xml).ok()?;
    let targets: HashMap<&str, &str> = rels_doc
        .descendants()
        .filter(|n| n.has_tag_name("Relationship"))
        .filter(|n| {
            n.attribute("Type")
                .is_some_and(|t| t.ends_with("/slide"))
        })
        .filter_map(|n| Some((n.attribute("Id")?, n.attribute("Target")?)))
        .collect();

    let doc = roxmltree::Document::parse(presentation_xml).ok()?;
    let paths = doc
        .descendants()
        .filter(|n| n.has_tag_name((P_NAMESPACE, "sldId")))
        .filter_map(|n| n.attribute((R_NAMESPACE, "id")))
        .filter_map(|rid| targets.get(rid))
        .map(|target| normalise_target(target))
        .collect();
    Some(paths)
}

fn normalise_target(target: &str) -> String {
    match target.strip_prefix('/') {
        Some(absolute) => absolute.to_string(),
        None => format!("ppt/{}", target.trim_start_matches("./")),
    }
}

/// Text of one slide: each text-bearing shape on its own line, paragraphs
/// within a shape separated by newlines.
fn slide_text(xml: &str) -> Result<String, roxmltree::Error> {
    let doc = roxmltree::Document::parse(xml)?;
    let Some(tree) = doc
        .descendants()
        .find(|n| n.has_tag_name((P_NAMESPACE, "spTree")))
    else {
        return Ok(String::new());
    };

    let mut text = String::new();
    for shape in tree
        .children()
        .filter(|n| n.has_tag_name((P_NAMESPACE, "sp")))
    {
        let Some(body) = shape
            .children()
            .find(|n| n.has_tag_name((P_NAMESPACE, "txBody")))
        else {
            continue;
        };
        let paragraphs: Vec<String> = body
            .children()
            .filter(|n| n.has_tag_name((A_NAMESPACE, "p")))
            .map(|p| {
                p.descendants()
                    .filter(|n| n.has_tag_name((A_NAMESPACE, "t")))
                    .filter_map(|t| t.text())
                    .collect()
            })
            .collect();
        text.push_str(&paragraphs.join("\n"));
        text.push('\n');
    }
    Ok(text)
}

/// Extractor for `.pptx` uploads.
#[derive(Debug, Clone, Copy, Default)]
pub struct SlideExtractor;

#[async_trait]
impl Extractor for SlideExtractor {
    async fn extract(&self, path: &Path, file_name: &str) -> ExtractionResult {
        let owned = path.to_path_buf();
        let outcome = tokio::task::spawn_blocking(move || read_slides(&owned))
            .await
            .map_err(|e| ExtractError::Task(format!("slide task panicked: {}", e)))
            .and_then(|r| r);

        match outcome {
            Ok(SlideText {
                chunks,
                slide_count,
            }) => ExtractionResult {
                chunks,
                page_count: slide_count,
                metadata: metadata([
                    ("format", json!("PowerPoint")),
                    ("total_slides", json!(slide_count)),
                ]),
            },
            Err(e) => {
                warn!(file = %file_name, error = %e, "Slide extraction failed");
                ExtractionResult::placeholder(
                    prompts::processing_failed("PowerPoint", file_name, &e),
                    metadata([
                        ("format", json!("PowerPoint")),
                        ("error", json!(e.metadata_tag())),
                    ]),
                )
            }
        }
    }
}
