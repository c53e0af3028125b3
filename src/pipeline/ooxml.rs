//! WordprocessingML plumbing shared by DOCX extraction and rewriting.
//!
//! A `.docx` is a zip package; all body text lives in `word/document.xml`.
//! [`RunTable::parse`] walks that part once with `quick-xml` and records, for
//! every `w:r`, its `(paragraph, run)` address, its visible text, and the
//! event ranges of the text-bearing children (`w:t`, `w:tab`, `w:br`,
//! `w:cr`). Rewriting swaps exactly those ranges and re-emits every other
//! event untouched, so run properties (`w:rPr`) and sibling runs keep their
//! bytes.
//!
//! ## Addressing
//!
//! - `paragraph` counts every `w:p` start in document order, including empty
//!   and nested ones (text boxes, table cells).
//! - `run` counts every `w:r` inside the innermost open paragraph, including
//!   runs with no text.

use crate::error::DocPatchError;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use std::collections::BTreeMap;
use std::io::{Cursor, Read, Write};
use std::path::Path;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

/// Package part holding the document body.
pub const DOCUMENT_PART: &str = "word/document.xml";

const P: &[u8] = b"w:p";
const R: &[u8] = b"w:r";
const T: &[u8] = b"w:t";
const TAB: &[u8] = b"w:tab";
const BR: &[u8] = b"w:br";
const CR: &[u8] = b"w:cr";

fn corrupt(path: &Path, detail: impl Into<String>) -> DocPatchError {
    DocPatchError::CorruptDocument {
        path: path.to_path_buf(),
        detail: detail.into(),
    }
}

// ── Package I/O ──────────────────────────────────────────────────────────────

/// Read one part of the package as UTF-8.
pub fn read_part(package: &[u8], path: &Path, name: &str) -> Result<String, DocPatchError> {
    let mut archive = ZipArchive::new(Cursor::new(package))
        .map_err(|e| corrupt(path, format!("not a zip package: {e}")))?;
    let mut file = archive
        .by_name(name)
        .map_err(|e| corrupt(path, format!("missing part {name}: {e}")))?;
    let mut xml = String::new();
    file.read_to_string(&mut xml)
        .map_err(|e| corrupt(path, format!("unreadable part {name}: {e}")))?;
    Ok(xml)
}

/// Rebuild the package with `name` replaced by `content`.
///
/// Every other entry is copied raw (still compressed), so its bytes, CRC and
/// timestamps are unchanged.
pub fn replace_part(
    package: &[u8],
    path: &Path,
    name: &str,
    content: &[u8],
) -> Result<Vec<u8>, DocPatchError> {
    let mut archive = ZipArchive::new(Cursor::new(package))
        .map_err(|e| corrupt(path, format!("not a zip package: {e}")))?;
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let zip_err = |e: zip::result::ZipError| corrupt(path, format!("repacking failed: {e}"));

    for i in 0..archive.len() {
        let entry_name = archive.by_index_raw(i).map_err(zip_err)?.name().to_string();
        if entry_name == name {
            writer.start_file(entry_name, options).map_err(zip_err)?;
            writer
                .write_all(content)
                .map_err(|e| corrupt(path, format!("repacking failed: {e}")))?;
        } else {
            let entry = archive.by_index_raw(i).map_err(zip_err)?;
            writer.raw_copy_file(entry).map_err(zip_err)?;
        }
    }

    let cursor = writer.finish().map_err(zip_err)?;
    Ok(cursor.into_inner())
}

// ── Run table ────────────────────────────────────────────────────────────────

/// One `w:r` element and where its text lives in the event stream.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSpan {
    pub paragraph: usize,
    pub run: usize,
    /// Visible text: `w:t` content, `\t` for `w:tab`, `\n` for `w:br`/`w:cr`.
    pub text: String,
    /// Inclusive event ranges of the text-bearing direct children.
    slots: Vec<(usize, usize)>,
}

/// `document.xml` as an owned event list plus the runs found in it.
#[derive(Debug)]
pub struct RunTable {
    events: Vec<Event<'static>>,
    runs: Vec<RunSpan>,
}

struct OpenParagraph {
    index: usize,
    runs: usize,
    depth: usize,
}

struct OpenRun {
    span: usize,
    depth: usize,
}

struct OpenText {
    span: usize,
    start: usize,
    depth: usize,
}

impl RunTable {
    /// Walk the document part once.
    pub fn parse(xml: &str) -> Result<Self, String> {
        let mut reader = Reader::from_str(xml);
        let mut events: Vec<Event<'static>> = Vec::new();
        let mut runs: Vec<RunSpan> = Vec::new();

        let mut paragraphs: Vec<OpenParagraph> = Vec::new();
        let mut open_runs: Vec<OpenRun> = Vec::new();
        let mut open_text: Option<OpenText> = None;
        let mut next_paragraph = 0usize;
        let mut depth = 0usize;

        loop {
            let event = reader
                .read_event()
                .map_err(|e| format!("XML error at byte {}: {e}", reader.buffer_position()))?;
            let i = events.len();

            match &event {
                Event::Eof => break,
                Event::Start(e) => {
                    depth += 1;
                    match e.name().as_ref() {
                        P => {
                            paragraphs.push(OpenParagraph {
                                index: next_paragraph,
                                runs: 0,
                                depth,
                            });
                            next_paragraph += 1;
                        }
                        R => {
                            if let Some(span) = open_run(&mut paragraphs, &mut runs) {
                                open_runs.push(OpenRun { span, depth });
                            }
                        }
                        T => {
                            if let Some(run) = open_runs.last().filter(|r| r.depth + 1 == depth) {
                                open_text = Some(OpenText {
                                    span: run.span,
                                    start: i,
                                    depth,
                                });
                            }
                        }
                        _ => {}
                    }
                }
                Event::Empty(e) => match e.name().as_ref() {
                    P => next_paragraph += 1,
                    R => {
                        open_run(&mut paragraphs, &mut runs);
                    }
                    name @ (T | TAB | BR | CR) => {
                        if let Some(run) = open_runs.last().filter(|r| r.depth == depth) {
                            let span = &mut runs[run.span];
                            match name {
                                TAB => span.text.push('\t'),
                                BR | CR => span.text.push('\n'),
                                _ => {}
                            }
                            span.slots.push((i, i));
                        }
                    }
                    _ => {}
                },
                Event::Text(t) => {
                    if let Some(open) = &open_text {
                        let text = t.unescape().map_err(|e| e.to_string())?;
                        runs[open.span].text.push_str(&text);
                    }
                }
                Event::CData(c) => {
                    if let Some(open) = &open_text {
                        runs[open.span].text.push_str(&String::from_utf8_lossy(c));
                    }
                }
                Event::End(e) => {
                    match e.name().as_ref() {
                        T => {
                            if let Some(open) = open_text.take_if(|o| o.depth == depth) {
                                runs[open.span].slots.push((open.start, i));
                            }
                        }
                        R => {
                            if open_runs.last().is_some_and(|r| r.depth == depth) {
                                open_runs.pop();
                            }
                        }
                        P => {
                            if paragraphs.last().is_some_and(|p| p.depth == depth) {
                                paragraphs.pop();
                            }
                        }
                        _ => {}
                    }
                    depth = depth.saturating_sub(1);
                }
                _ => {}
            }

            events.push(event.into_owned());
        }

        Ok(Self { events, runs })
    }

    /// Every run in document order, empty ones included.
    pub fn runs(&self) -> &[RunSpan] {
        &self.runs
    }

    /// Find the run at `(paragraph, run)`.
    pub fn find(&self, paragraph: usize, run: usize) -> Option<&RunSpan> {
        self.runs
            .iter()
            .find(|s| s.paragraph == paragraph && s.run == run)
    }

    /// Serialise the event stream with the text of the given runs replaced.
    ///
    /// `edits` maps `(paragraph, run)` to the new visible text. The new text
    /// takes the place of the run's first text slot; the remaining slots are
    /// dropped. Everything else is written back as read.
    pub fn render(&self, edits: &BTreeMap<(usize, usize), String>) -> Result<Vec<u8>, String> {
        // (start, end, replacement events) sorted by start.
        let mut splices: Vec<(usize, usize, Vec<Event<'static>>)> = Vec::new();
        for span in &self.runs {
            let Some(text) = edits.get(&(span.paragraph, span.run)) else {
                continue;
            };
            for (n, &(start, end)) in span.slots.iter().enumerate() {
                let insert = if n == 0 { text_events(text) } else { Vec::new() };
                splices.push((start, end, insert));
            }
        }
        splices.sort_by_key(|(start, _, _)| *start);

        let mut writer = Writer::new(Vec::new());
        let mut pending = splices.into_iter().peekable();
        let mut i = 0;
        while i < self.events.len() {
            if let Some((_, end, insert)) = pending.next_if(|(start, _, _)| *start == i) {
                for ev in insert {
                    writer.write_event(ev).map_err(|e| e.to_string())?;
                }
                i = end + 1;
                continue;
            }
            writer
                .write_event(self.events[i].clone())
                .map_err(|e| e.to_string())?;
            i += 1;
        }
        Ok(writer.into_inner())
    }
}

/// Register a new run in the innermost open paragraph.
fn open_run(paragraphs: &mut [OpenParagraph], runs: &mut Vec<RunSpan>) -> Option<usize> {
    let paragraph = paragraphs.last_mut()?;
    runs.push(RunSpan {
        paragraph: paragraph.index,
        run: paragraph.runs,
        text: String::new(),
        slots: Vec::new(),
    });
    paragraph.runs += 1;
    Some(runs.len() - 1)
}

/// WordprocessingML for a run's visible text.
///
/// `\t` becomes `<w:tab/>`, `\n` becomes `<w:br/>`, everything else goes
/// into `<w:t xml:space="preserve">` so leading and trailing spaces survive.
fn text_events(text: &str) -> Vec<Event<'static>> {
    let mut out = Vec::new();
    let mut segment = String::new();

    let flush = |segment: &mut String, out: &mut Vec<Event<'static>>| {
        if segment.is_empty() {
            return;
        }
        out.push(Event::Start(
            BytesStart::new("w:t").with_attributes([("xml:space", "preserve")]),
        ));
        out.push(Event::Text(BytesText::new(segment).into_owned()));
        out.push(Event::End(BytesEnd::new("w:t")));
        segment.clear();
    };

    for c in text.chars() {
        match c {
            '\t' => {
                flush(&mut segment, &mut out);
                out.push(Event::Empty(BytesStart::new("w:tab")));
            }
            '\n' => {
                flush(&mut segment, &mut out);
                out.push(Event::Empty(BytesStart::new("w:br")));
            }
            c => segment.push(c),
        }
    }
    flush(&mut segment, &mut out);

    if out.is_empty() {
        out.push(Event::Empty(BytesStart::new("w:t")));
    }
    out
}
