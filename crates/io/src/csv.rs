// CSV/TSV monthly source import

use std::io::Read;
use std::path::Path;

use quarterbill_recon::model::{RawCell, RawSheet};

pub fn import(path: &Path) -> Result<RawSheet, String> {
    let content = read_file_as_utf8(path)?;
    let delimiter = sniff_delimiter(&content);
    import_from_string(&content, delimiter)
}

pub fn import_tsv(path: &Path) -> Result<RawSheet, String> {
    let content = read_file_as_utf8(path)?;
    import_from_string(&content, b'\t')
}

/// Detect the most likely field delimiter by checking consistency across the first few lines.
///
/// Monthly exports open with banner lines that have a single field, so only lines
/// producing more than one field with some candidate are sampled.
fn sniff_delimiter(content: &str) -> u8 {
    let candidates: &[u8] = &[b'\t', b';', b',', b'|'];
    let field_count = |line: &str, delim: u8| -> usize {
        csv::ReaderBuilder::new()
            .delimiter(delim)
            .has_headers(false)
            .flexible(true)
            .from_reader(line.as_bytes())
            .records()
            .next()
            .and_then(|r| r.ok())
            .map(|r| r.len())
            .unwrap_or(1)
    };

    let sample_lines: Vec<&str> = content
        .lines()
        .filter(|line| candidates.iter().any(|&d| field_count(line, d) > 1))
        .take(10)
        .collect();

    if sample_lines.is_empty() {
        return b',';
    }

    let mut best = b',';
    let mut best_score = 0u64;

    for &delim in candidates {
        let counts: Vec<usize> = sample_lines.iter().map(|line| field_count(line, delim)).collect();

        if counts.first().copied().unwrap_or(0) <= 1 {
            continue;
        }

        // Score: (number of lines with same field count as line 1) * field_count
        let target = counts[0];
        let consistent = counts.iter().filter(|&&c| c == target).count() as u64;
        let score = consistent * target as u64;

        if score > best_score {
            best_score = score;
            best = delim;
        }
    }

    best
}

/// Read file and convert to UTF-8 if needed (handles Windows-1252, Latin-1, etc.)
pub fn read_file_as_utf8(path: &Path) -> Result<String, String> {
    let mut file = std::fs::File::open(path).map_err(|e| e.to_string())?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes).map_err(|e| e.to_string())?;

    match String::from_utf8(bytes) {
        Ok(s) => Ok(s.trim_start_matches('\u{feff}').to_string()),
        Err(e) => {
            let bytes = e.into_bytes();
            // Fall back to Windows-1252 (common for Excel-exported CSVs)
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(&bytes);
            Ok(decoded.into_owned())
        }
    }
}

pub fn import_from_string(content: &str, delimiter: u8) -> Result<RawSheet, String> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(content.as_bytes());

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result.map_err(|e| e.to_string())?;
        rows.push(
            record
                .iter()
                .map(|field| {
                    if field.is_empty() {
                        RawCell::Empty
                    } else {
                        RawCell::Text(field.to_string())
                    }
                })
                .collect(),
        );
    }

    Ok(RawSheet::new(rows))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sniff_skips_single_field_banner_lines() {
        let content = "Advisory Fee Report\nJuly\n#;Client;Fee\n1;Acme;\"$1,234.56\"\n";
        assert_eq!(sniff_delimiter(content), b';');
    }

    #[test]
    fn sniff_defaults_to_comma() {
        assert_eq!(sniff_delimiter("one\ntwo\n"), b',');
        assert_eq!(sniff_delimiter("a,b,c\n1,2,3\n"), b',');
    }

    #[test]
    fn quoted_currency_survives_as_text() {
        let sheet = import_from_string("#,Client,Fee\n1,Acme,\"$1,234.56\"\n", b',').unwrap();
        assert_eq!(sheet.height(), 2);
        assert_eq!(sheet.cell(1, 2), &RawCell::Text("$1,234.56".into()));
        assert_eq!(sheet.cell(0, 5), &RawCell::Empty);
    }

    #[test]
    fn windows_1252_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("latin.csv");
        // "Café" in Windows-1252
        std::fs::write(&path, b"Client\nCaf\xe9\n").unwrap();
        let sheet = import(&path).unwrap();
        assert_eq!(sheet.cell(1, 0), &RawCell::Text("Café".into()));
    }

    #[test]
    fn utf8_bom_is_stripped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bom.csv");
        std::fs::write(&path, "\u{feff}Client,Fee\nAcme,1\n").unwrap();
        let sheet = import(&path).unwrap();
        assert_eq!(sheet.cell(0, 0), &RawCell::Text("Client".into()));
    }
}
