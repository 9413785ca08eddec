// Zip packaging of rendered documents

use std::fs::File;
use std::io::{BufWriter, Read};
use std::path::Path;

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::render::RenderedDocument;

/// Write `documents` into a new zip at `output`, each stored as `<subdir>/<file name>`.
///
/// A partially written archive is removed on failure.
pub fn write_archive(output: &Path, subdir: &str, documents: &[RenderedDocument]) -> Result<usize, String> {
    let result = write_members(output, subdir, documents);
    if result.is_err() {
        let _ = std::fs::remove_file(output);
    }
    result
}

fn write_members(output: &Path, subdir: &str, documents: &[RenderedDocument]) -> Result<usize, String> {
    let file = File::create(output)
        .map_err(|e| format!("Failed to create {}: {}", output.display(), e))?;
    let mut zip = ZipWriter::new(BufWriter::new(file));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for doc in documents {
        let member = format!("{}/{}", subdir, doc.file_name());
        let mut source = File::open(&doc.path)
            .map_err(|e| format!("Failed to open {}: {}", doc.path.display(), e))?;
        zip.start_file(member.as_str(), options)
            .map_err(|e| format!("Failed to add '{}': {}", member, e))?;
        std::io::copy(&mut source, &mut zip)
            .map_err(|e| format!("Failed to add '{}': {}", member, e))?;
    }

    zip.finish()
        .map_err(|e| format!("Failed to finish {}: {}", output.display(), e))?;
    log::info!("archived {} document(s) to {}", documents.len(), output.display());
    Ok(documents.len())
}

/// Member names of an existing archive, in stored order.
pub fn list_members(path: &Path) -> Result<Vec<String>, String> {
    let file = File::open(path).map_err(|e| format!("Failed to open {}: {}", path.display(), e))?;
    let mut archive = ZipArchive::new(file)
        .map_err(|e| format!("Failed to read {} as zip: {}", path.display(), e))?;
    (0..archive.len())
        .map(|i| {
            archive
                .by_index_raw(i)
                .map(|entry| entry.name().to_string())
                .map_err(|e| format!("Failed to read entry {} of {}: {}", i, path.display(), e))
        })
        .collect()
}

/// Read one archive member fully.
pub fn read_member(path: &Path, member: &str) -> Result<Vec<u8>, String> {
    let file = File::open(path).map_err(|e| format!("Failed to open {}: {}", path.display(), e))?;
    let mut archive = ZipArchive::new(file)
        .map_err(|e| format!("Failed to read {} as zip: {}", path.display(), e))?;
    let mut entry = archive
        .by_name(member)
        .map_err(|e| format!("Member '{}' not found: {}", member, e))?;
    let mut bytes = Vec::new();
    entry
        .read_to_end(&mut bytes)
        .map_err(|e| format!("Failed to read '{}': {}", member, e))?;
    Ok(bytes)
}
