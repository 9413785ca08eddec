// XLSX invoice template filling
//
// A template is filled by patching its active worksheet XML in place: only the target
// cells and the merge list change, every other part of the package is copied raw.

use std::collections::{BTreeMap, HashMap};
use std::io::{Cursor, Read, Seek, Write};
use std::path::Path;

use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use quarterbill_recon::layout::{CellRange, CellRef, CellValue, CellWrite};

const CALC_CHAIN_PART: &str = "xl/calcChain.xml";
const CONTENT_TYPES_PART: &str = "[Content_Types].xml";
const WORKBOOK_PART: &str = "xl/workbook.xml";
const WORKBOOK_RELS_PART: &str = "xl/_rels/workbook.xml.rels";

/// Worksheet children that the schema places after `<mergeCells>`. A new merge list
/// goes in front of the first of these.
const AFTER_MERGE_CELLS: &[&[u8]] = &[
    b"phoneticPr",
    b"conditionalFormatting",
    b"dataValidations",
    b"hyperlinks",
    b"printOptions",
    b"pageMargins",
    b"pageSetup",
    b"headerFooter",
    b"rowBreaks",
    b"colBreaks",
    b"customProperties",
    b"cellWatches",
    b"ignoredErrors",
    b"smartTags",
    b"drawing",
    b"legacyDrawing",
    b"legacyDrawingHF",
    b"drawingHF",
    b"picture",
    b"oleObjects",
    b"controls",
    b"webPublishItems",
    b"tableParts",
    b"extLst",
];

// =============================================================================
// Template
// =============================================================================

/// A loaded invoice template. Cheap to fill repeatedly: every fill starts from the
/// original bytes.
#[derive(Debug, Clone)]
pub struct XlsxTemplate {
    bytes: Vec<u8>,
    sheet_path: String,
    sheet_xml: String,
    existing_merges: Vec<CellRange>,
}

impl XlsxTemplate {
    pub fn open(path: &Path) -> Result<Self, String> {
        let bytes = std::fs::read(path)
            .map_err(|e| format!("Failed to read template {}: {}", path.display(), e))?;
        Self::from_bytes(bytes)
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, String> {
        let mut archive = ZipArchive::new(Cursor::new(bytes.as_slice()))
            .map_err(|e| format!("Failed to read template as XLSX: {}", e))?;

        let workbook_xml = read_zip_file(&mut archive, WORKBOOK_PART)?;
        let rels_xml = read_zip_file(&mut archive, WORKBOOK_RELS_PART)?;
        let sheet_path = resolve_active_worksheet_path(&workbook_xml, &rels_xml)
            .ok_or_else(|| "Template workbook has no worksheet".to_string())?;
        let sheet_xml = read_zip_file(&mut archive, &sheet_path)?;
        let existing_merges = scan_merge_cells(&sheet_xml)?;
        drop(archive);

        log::debug!(
            "template sheet {} with {} existing merge(s)",
            sheet_path,
            existing_merges.len()
        );
        Ok(Self {
            bytes,
            sheet_path,
            sheet_xml,
            existing_merges,
        })
    }

    /// Package path of the worksheet that gets filled.
    pub fn sheet_path(&self) -> &str {
        &self.sheet_path
    }

    /// Produce a filled copy of the template.
    ///
    /// Each value lands in the top-left cell of its range, keeping that cell's style.
    /// Merges that would overlap an existing (or earlier requested) merge are skipped.
    pub fn fill(&self, writes: &[CellWrite]) -> Result<Vec<u8>, String> {
        let merges = plan_merges(&self.existing_merges, writes);
        let patched = patch_sheet_xml(&self.sheet_xml, writes, &merges)?;
        if patched.replaced_formula {
            log::debug!("template formula cell overwritten, dropping calculation chain");
        }
        self.repackage(&patched.xml, patched.replaced_formula)
    }

    fn repackage(&self, sheet_xml: &str, drop_calc_chain: bool) -> Result<Vec<u8>, String> {
        let mut archive = ZipArchive::new(Cursor::new(self.bytes.as_slice()))
            .map_err(|e| format!("Failed to reopen template: {}", e))?;
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        let mut replaced: HashMap<&str, String> = HashMap::new();
        if drop_calc_chain {
            let content_types = read_zip_file(&mut archive, CONTENT_TYPES_PART)?;
            replaced.insert(
                CONTENT_TYPES_PART,
                strip_elements(&content_types, b"Override", |e| {
                    attr_value(e, b"PartName").as_deref() == Some("/xl/calcChain.xml")
                })?,
            );
            let rels = read_zip_file(&mut archive, WORKBOOK_RELS_PART)?;
            replaced.insert(
                WORKBOOK_RELS_PART,
                strip_elements(&rels, b"Relationship", |e| {
                    attr_value(e, b"Type").is_some_and(|t| t.ends_with("/calcChain"))
                })?,
            );
        }

        for i in 0..archive.len() {
            let file = archive
                .by_index_raw(i)
                .map_err(|e| format!("Failed to read template entry {}: {}", i, e))?;
            let name = file.name().to_string();

            if drop_calc_chain && name == CALC_CHAIN_PART {
                continue;
            }
            let content = if name == self.sheet_path {
                Some(sheet_xml)
            } else {
                replaced.get(name.as_str()).map(String::as_str)
            };

            match content {
                Some(content) => {
                    zip.start_file(name.as_str(), options)
                        .map_err(|e| format!("Failed to write '{}': {}", name, e))?;
                    zip.write_all(content.as_bytes())
                        .map_err(|e| format!("Failed to write '{}': {}", name, e))?;
                }
                None => {
                    zip.raw_copy_file(file)
                        .map_err(|e| format!("Failed to copy '{}': {}", name, e))?;
                }
            }
        }

        let cursor = zip
            .finish()
            .map_err(|e| format!("Failed to finish document: {}", e))?;
        Ok(cursor.into_inner())
    }
}

/// Decide which requested merges can be applied.
fn plan_merges(existing: &[CellRange], writes: &[CellWrite]) -> Vec<CellRange> {
    let mut planned: Vec<CellRange> = Vec::new();
    for write in writes.iter().filter(|w| w.merge) {
        let clash = existing
            .iter()
            .chain(planned.iter())
            .find(|m| m.overlaps(&write.range))
            .copied();
        match clash {
            Some(m) => log::debug!("merge {} skipped, overlaps {}", write.range, m),
            None => planned.push(write.range),
        }
    }
    planned
}

// =============================================================================
// Workbook structure
// =============================================================================

/// Read a file from a ZIP archive.
fn read_zip_file<R: Read + Seek>(archive: &mut ZipArchive<R>, path: &str) -> Result<String, String> {
    let mut file = archive
        .by_name(path)
        .map_err(|e| format!("File '{}' not found in XLSX: {}", path, e))?;
    let mut content = String::new();
    file.read_to_string(&mut content)
        .map_err(|e| format!("Failed to read '{}': {}", path, e))?;
    Ok(content)
}

/// Resolve the package path of the workbook's active tab (the first sheet when the
/// workbook does not name one).
fn resolve_active_worksheet_path(workbook_xml: &str, rels_xml: &str) -> Option<String> {
    let mut active_tab = 0usize;
    let mut sheet_rids: Vec<String> = Vec::new();

    let mut reader = Reader::from_str(workbook_xml);
    reader.config_mut().trim_text(true);
    loop {
        match reader.read_event() {
            Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e)) => match e.local_name().as_ref() {
                b"workbookView" => {
                    if let Some(tab) = attr_value(e, b"activeTab").and_then(|v| v.parse().ok()) {
                        active_tab = tab;
                    }
                }
                b"sheet" => {
                    // The relationship id lives in the r: namespace, whatever it is prefixed as.
                    let rid = e.attributes().flatten().find_map(|a| {
                        let key = a.key.as_ref();
                        (key.ends_with(b":id") || key == b"id")
                            .then(|| String::from_utf8_lossy(&a.value).into_owned())
                    });
                    if let Some(rid) = rid {
                        sheet_rids.push(rid);
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(_) => break,
            _ => {}
        }
    }

    let rid = sheet_rids.get(active_tab).or_else(|| sheet_rids.first())?;

    let mut reader = Reader::from_str(rels_xml);
    reader.config_mut().trim_text(true);
    loop {
        match reader.read_event() {
            Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e))
                if e.local_name().as_ref() == b"Relationship" =>
            {
                if attr_value(e, b"Id").as_deref() == Some(rid.as_str()) {
                    return attr_value(e, b"Target").map(|t| resolve_part_target(&t));
                }
            }
            Ok(Event::Eof) => break,
            Err(_) => break,
            _ => {}
        }
    }
    None
}

/// Relationship targets are relative to `xl/` unless absolute.
fn resolve_part_target(target: &str) -> String {
    match target.strip_prefix('/') {
        Some(absolute) => absolute.to_string(),
        None => format!("xl/{}", target),
    }
}

fn scan_merge_cells(sheet_xml: &str) -> Result<Vec<CellRange>, String> {
    let mut merges = Vec::new();
    let mut reader = Reader::from_str(sheet_xml);
    loop {
        match reader.read_event() {
            Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e))
                if e.local_name().as_ref() == b"mergeCell" =>
            {
                if let Some(range) = attr_value(e, b"ref").and_then(|r| CellRange::parse(&r).ok()) {
                    merges.push(range);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(format!("Failed to parse worksheet XML: {}", e)),
            _ => {}
        }
    }
    Ok(merges)
}

// =============================================================================
// Worksheet patching
// =============================================================================

#[derive(Debug)]
pub(crate) struct PatchedSheet {
    pub xml: String,
    /// An overwritten cell held a formula.
    pub replaced_formula: bool,
}

type PendingRow<'a> = BTreeMap<u16, &'a CellValue>;

/// Stream the worksheet XML, writing each value into its anchor cell and appending
/// `merges` to the merge list. Rows and cells stay in ascending order; missing rows
/// and cells are inserted where they belong.
pub(crate) fn patch_sheet_xml(
    xml: &str,
    writes: &[CellWrite],
    merges: &[CellRange],
) -> Result<PatchedSheet, String> {
    let mut pending: BTreeMap<u32, PendingRow> = BTreeMap::new();
    for write in writes {
        let anchor = write.anchor();
        pending.entry(anchor.row).or_default().insert(anchor.col, &write.value);
    }
    let bounds = write_bounds(writes);

    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(false);
    let mut out = SheetWriter {
        writer: Writer::new(Vec::with_capacity(xml.len() + 4096)),
        prefix: None,
    };

    let mut depth = 0usize;
    let mut saw_sheet_data = false;
    let mut in_sheet_data = false;
    let mut merges_written = merges.is_empty();
    let mut replaced_formula = false;

    let mut row_cells: Option<PendingRow> = None;
    let mut current_row = 0u32;
    let mut last_row: Option<u32> = None;
    let mut last_col: Option<u16> = None;

    loop {
        let event = reader
            .read_event()
            .map_err(|e| format!("Failed to parse worksheet XML: {}", e))?;
        match event {
            Event::Eof => break,

            Event::Start(e) => {
                let local = e.local_name().as_ref().to_vec();
                match local.as_slice() {
                    b"worksheet" if depth == 0 => {
                        out.prefix = e
                            .name()
                            .prefix()
                            .map(|p| String::from_utf8_lossy(p.as_ref()).into_owned());
                    }
                    b"mergeCells" if depth == 1 => {
                        out.merge_cells_start(&e, merges.len())?;
                        depth += 1;
                        continue;
                    }
                    b"sheetData" if depth == 1 => {
                        saw_sheet_data = true;
                        in_sheet_data = true;
                    }
                    b"row" if in_sheet_data && depth == 2 => {
                        let row = row_number(&e).unwrap_or_else(|| last_row.map_or(0, |r| r + 1));
                        out.flush_rows_before(&mut pending, row)?;
                        last_row = Some(row);
                        last_col = None;
                        current_row = row;
                        row_cells = pending.remove(&row);
                        if row_cells.is_some() {
                            out.write(Event::Start(without_spans(&e)))?;
                            depth += 1;
                            continue;
                        }
                    }
                    b"c" if depth == 3 && row_cells.is_some() => {
                        let col = cell_column(&e).unwrap_or_else(|| last_col.map_or(0, |c| c + 1));
                        last_col = Some(col);
                        if let Some(cells) = row_cells.as_mut() {
                            out.flush_cells_before(cells, current_row, col)?;
                            if let Some(value) = cells.remove(&col) {
                                replaced_formula |= skip_cell_body(&mut reader)?;
                                let style = attr_value(&e, b"s");
                                out.cell(CellRef { row: current_row, col }, style.as_deref(), value)?;
                                continue;
                            }
                        }
                    }
                    name if depth == 1 && !merges_written && AFTER_MERGE_CELLS.contains(&name) => {
                        out.merge_cells_block(merges)?;
                        merges_written = true;
                    }
                    _ => {}
                }
                out.write(Event::Start(e))?;
                depth += 1;
            }

            Event::Empty(e) => {
                let local = e.local_name().as_ref().to_vec();
                match local.as_slice() {
                    b"dimension" if depth == 1 => {
                        out.write(Event::Empty(widened_dimension(&e, bounds)))?;
                        continue;
                    }
                    b"mergeCells" if depth == 1 && !merges.is_empty() => {
                        out.merge_cells_start(&e, merges.len())?;
                        out.merge_cell_elements(merges)?;
                        out.end("mergeCells")?;
                        merges_written = true;
                        continue;
                    }
                    b"sheetData" if depth == 1 => {
                        saw_sheet_data = true;
                        if !pending.is_empty() {
                            out.write(Event::Start(e.to_owned()))?;
                            out.flush_rows_before(&mut pending, u32::MAX)?;
                            out.end("sheetData")?;
                            continue;
                        }
                    }
                    b"row" if in_sheet_data && depth == 2 => {
                        let row = row_number(&e).unwrap_or_else(|| last_row.map_or(0, |r| r + 1));
                        out.flush_rows_before(&mut pending, row)?;
                        last_row = Some(row);
                        if let Some(cells) = pending.remove(&row) {
                            out.write(Event::Start(without_spans(&e)))?;
                            out.cells(row, cells)?;
                            out.end("row")?;
                            continue;
                        }
                    }
                    b"c" if depth == 3 && row_cells.is_some() => {
                        let col = cell_column(&e).unwrap_or_else(|| last_col.map_or(0, |c| c + 1));
                        last_col = Some(col);
                        if let Some(cells) = row_cells.as_mut() {
                            out.flush_cells_before(cells, current_row, col)?;
                            if let Some(value) = cells.remove(&col) {
                                let style = attr_value(&e, b"s");
                                out.cell(CellRef { row: current_row, col }, style.as_deref(), value)?;
                                continue;
                            }
                        }
                    }
                    name if depth == 1 && !merges_written && AFTER_MERGE_CELLS.contains(&name) => {
                        out.merge_cells_block(merges)?;
                        merges_written = true;
                    }
                    _ => {}
                }
                out.write(Event::Empty(e))?;
            }

            Event::End(e) => {
                depth = depth.saturating_sub(1);
                match e.local_name().as_ref() {
                    b"row" if in_sheet_data && depth == 2 => {
                        if let Some(cells) = row_cells.take() {
                            out.cells(current_row, cells)?;
                        }
                    }
                    b"sheetData" if depth == 1 => {
                        out.flush_rows_before(&mut pending, u32::MAX)?;
                        in_sheet_data = false;
                    }
                    b"mergeCells" if depth == 1 => {
                        out.merge_cell_elements(merges)?;
                        merges_written = true;
                    }
                    b"worksheet" if depth == 0 => {
                        if !saw_sheet_data && !pending.is_empty() {
                            return Err("Template worksheet has no sheetData".to_string());
                        }
                        if !merges_written {
                            out.merge_cells_block(merges)?;
                            merges_written = true;
                        }
                    }
                    _ => {}
                }
                out.write(Event::End(e))?;
            }

            other => out.write(other)?,
        }
    }

    let xml = String::from_utf8(out.writer.into_inner())
        .map_err(|e| format!("Patched worksheet is not UTF-8: {}", e))?;
    Ok(PatchedSheet { xml, replaced_formula })
}

struct SheetWriter {
    writer: Writer<Vec<u8>>,
    prefix: Option<String>,
}

impl SheetWriter {
    fn write(&mut self, event: Event<'_>) -> Result<(), String> {
        self.writer
            .write_event(event)
            .map_err(|e| format!("Failed to write worksheet XML: {}", e))
    }

    fn tag(&self, local: &str) -> String {
        match &self.prefix {
            Some(prefix) => format!("{}:{}", prefix, local),
            None => local.to_string(),
        }
    }

    fn end(&mut self, local: &str) -> Result<(), String> {
        let tag = self.tag(local);
        self.write(Event::End(BytesEnd::new(tag)))
    }

    /// Write every pending row numbered below `before` as a new row.
    fn flush_rows_before(
        &mut self,
        pending: &mut BTreeMap<u32, PendingRow<'_>>,
        before: u32,
    ) -> Result<(), String> {
        let rest = pending.split_off(&before);
        let due = std::mem::replace(pending, rest);
        for (row, cells) in due {
            let mut start = BytesStart::new(self.tag("row"));
            start.push_attribute(("r", (row + 1).to_string().as_str()));
            self.write(Event::Start(start))?;
            self.cells(row, cells)?;
            self.end("row")?;
        }
        Ok(())
    }

    fn flush_cells_before(&mut self, cells: &mut PendingRow<'_>, row: u32, before: u16) -> Result<(), String> {
        let rest = cells.split_off(&before);
        let due = std::mem::replace(cells, rest);
        self.cells(row, due)
    }

    fn cells(&mut self, row: u32, cells: PendingRow<'_>) -> Result<(), String> {
        for (col, value) in cells {
            self.cell(CellRef { row, col }, None, value)?;
        }
        Ok(())
    }

    /// Text becomes an inline string, numbers a plain `<v>`.
    fn cell(&mut self, at: CellRef, style: Option<&str>, value: &CellValue) -> Result<(), String> {
        let mut start = BytesStart::new(self.tag("c"));
        start.push_attribute(("r", at.to_string().as_str()));
        if let Some(style) = style {
            start.push_attribute(("s", style));
        }

        match value {
            CellValue::Text(text) => {
                start.push_attribute(("t", "inlineStr"));
                self.write(Event::Start(start))?;
                let is_tag = self.tag("is");
                self.write(Event::Start(BytesStart::new(is_tag.as_str())))?;
                let mut t = BytesStart::new(self.tag("t"));
                if text.trim() != text {
                    t.push_attribute(("xml:space", "preserve"));
                }
                self.write(Event::Start(t))?;
                self.write(Event::Text(BytesText::new(text)))?;
                self.end("t")?;
                self.end("is")?;
            }
            CellValue::Number(n) => {
                self.write(Event::Start(start))?;
                let v_tag = self.tag("v");
                self.write(Event::Start(BytesStart::new(v_tag.as_str())))?;
                self.write(Event::Text(BytesText::new(&n.to_string())))?;
                self.end("v")?;
            }
        }
        self.end("c")
    }

    fn merge_cells_start(&mut self, existing: &BytesStart<'_>, added: usize) -> Result<(), String> {
        let count = attr_value(existing, b"count").and_then(|c| c.parse::<usize>().ok());
        let mut start = BytesStart::new(String::from_utf8_lossy(existing.name().as_ref()).into_owned());
        for attr in existing.attributes().flatten() {
            if attr.key.as_ref() != b"count" {
                start.push_attribute(attr);
            }
        }
        if let Some(count) = count {
            start.push_attribute(("count", (count + added).to_string().as_str()));
        }
        self.write(Event::Start(start))
    }

    fn merge_cell_elements(&mut self, merges: &[CellRange]) -> Result<(), String> {
        for range in merges {
            let mut cell = BytesStart::new(self.tag("mergeCell"));
            cell.push_attribute(("ref", range.to_string().as_str()));
            self.write(Event::Empty(cell))?;
        }
        Ok(())
    }

    fn merge_cells_block(&mut self, merges: &[CellRange]) -> Result<(), String> {
        if merges.is_empty() {
            return Ok(());
        }
        let mut start = BytesStart::new(self.tag("mergeCells"));
        start.push_attribute(("count", merges.len().to_string().as_str()));
        self.write(Event::Start(start))?;
        self.merge_cell_elements(merges)?;
        self.end("mergeCells")
    }
}

/// Consume a cell's children up to and including `</c>`. Returns whether it held a formula.
fn skip_cell_body(reader: &mut Reader<&[u8]>) -> Result<bool, String> {
    let mut depth = 0usize;
    let mut formula = false;
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                formula |= e.local_name().as_ref() == b"f";
                depth += 1;
            }
            Ok(Event::Empty(e)) => formula |= e.local_name().as_ref() == b"f",
            Ok(Event::End(_)) if depth == 0 => return Ok(formula),
            Ok(Event::End(_)) => depth -= 1,
            Ok(Event::Eof) => return Err("Unexpected end of worksheet XML inside a cell".to_string()),
            Ok(_) => {}
            Err(e) => return Err(format!("Failed to parse worksheet XML: {}", e)),
        }
    }
}

/// Row `spans` is an optional hint that goes stale once cells are inserted.
fn without_spans(e: &BytesStart<'_>) -> BytesStart<'static> {
    let mut start = BytesStart::new(String::from_utf8_lossy(e.name().as_ref()).into_owned());
    for attr in e.attributes().flatten() {
        if attr.key.as_ref() != b"spans" {
            start.push_attribute(attr);
        }
    }
    start.into_owned()
}

fn widened_dimension(e: &BytesStart<'_>, bounds: Option<CellRange>) -> BytesStart<'static> {
    let current = attr_value(e, b"ref").and_then(|r| CellRange::parse(&r).ok());
    let widened = match (current, bounds) {
        (Some(a), Some(b)) => Some(CellRange {
            first: CellRef {
                row: a.first.row.min(b.first.row),
                col: a.first.col.min(b.first.col),
            },
            last: CellRef {
                row: a.last.row.max(b.last.row),
                col: a.last.col.max(b.last.col),
            },
        }),
        _ => None,
    };
    let Some(widened) = widened else {
        return e.to_owned().into_owned();
    };

    let mut start = BytesStart::new(String::from_utf8_lossy(e.name().as_ref()).into_owned());
    for attr in e.attributes().flatten() {
        if attr.key.as_ref() != b"ref" {
            start.push_attribute(attr);
        }
    }
    start.push_attribute(("ref", widened.to_string().as_str()));
    start
}

fn write_bounds(writes: &[CellWrite]) -> Option<CellRange> {
    let mut anchors = writes.iter().map(CellWrite::anchor);
    let first = anchors.next()?;
    Some(anchors.fold(CellRange { first, last: first }, |acc, a| CellRange {
        first: CellRef {
            row: acc.first.row.min(a.row),
            col: acc.first.col.min(a.col),
        },
        last: CellRef {
            row: acc.last.row.max(a.row),
            col: acc.last.col.max(a.col),
        },
    }))
}

fn row_number(e: &BytesStart<'_>) -> Option<u32> {
    attr_value(e, b"r")?.parse::<u32>().ok()?.checked_sub(1)
}

fn cell_column(e: &BytesStart<'_>) -> Option<u16> {
    CellRef::parse(&attr_value(e, b"r")?).map(|c| c.col)
}

fn attr_value(e: &BytesStart<'_>, key: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.as_ref() == key)
        .map(|a| String::from_utf8_lossy(&a.value).into_owned())
}

/// Copy `xml`, dropping every `local` element matching `drop`.
fn strip_elements(
    xml: &str,
    local: &[u8],
    matches: impl Fn(&BytesStart<'_>) -> bool,
) -> Result<String, String> {
    let mut reader = Reader::from_str(xml);
    let mut writer = Writer::new(Vec::with_capacity(xml.len()));
    let err = |e: quick_xml::Error| format!("Failed to parse package XML: {}", e);

    loop {
        let event = reader.read_event().map_err(err)?;
        match event {
            Event::Eof => break,
            Event::Empty(ref e) if e.local_name().as_ref() == local && matches(e) => {}
            Event::Start(ref e) if e.local_name().as_ref() == local && matches(e) => {
                reader.read_to_end(e.name()).map_err(err)?;
            }
            other => writer
                .write_event(other)
                .map_err(|e| format!("Failed to write package XML: {}", e))?,
        }
    }
    String::from_utf8(writer.into_inner()).map_err(|e| format!("Package XML is not UTF-8: {}", e))
}

// =============================================================================
// Tests
// =============================================================================
