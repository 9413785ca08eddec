use std::io::Read;
use std::path::{Path, PathBuf};

use calamine::{open_workbook_auto, Data, Reader};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use rust_xlsxwriter::{Format, FormatBorder, Workbook};

use quarterbill_io::archive::{list_members, write_archive};
use quarterbill_io::render::render_invoices;
use quarterbill_io::xlsx_template::XlsxTemplate;
use quarterbill_recon::config::InvoiceConfig;
use quarterbill_recon::model::{InvoiceRecord, PeriodSlot};

const SHEET1: &str = "xl/worksheets/sheet1.xml";

fn build_template(dir: &Path) -> PathBuf {
    let path = dir.join("template.xlsx");
    let mut workbook = Workbook::new();
    let boxed = Format::new().set_border(FormatBorder::Thin);
    let bold = Format::new().set_bold();

    let ws = workbook.add_worksheet();
    ws.set_name("Invoice").unwrap();
    ws.write_string_with_format(0, 0, "INVOICE", &bold).unwrap();
    ws.write_blank(11, 3, &boxed).unwrap(); // D12
    ws.write_blank(20, 4, &boxed).unwrap(); // E21
    ws.merge_range(4, 0, 4, 2, "", &bold).unwrap(); // A5:C5 clashes with A5:F5
    ws.write_string(16, 1, "Period").unwrap();

    let notes = workbook.add_worksheet();
    notes.set_name("Notes").unwrap();
    notes.write_string(0, 0, "Remit within 30 days").unwrap();

    workbook.save(&path).unwrap();
    path
}

fn record(client: &str, client_id: &str, fees: [Decimal; 3]) -> InvoiceRecord {
    let labels = ["Jul 2025", "Aug 2025", "Sep 2025"];
    let periods = [0usize, 1, 2].map(|i| PeriodSlot {
        period_label: labels[i].into(),
        average_daily_balance: Some(dec!(120000.5)),
        days_in_period: Some(if i == 2 { 30 } else { 31 }),
        fee: Some(fees[i]),
    });
    InvoiceRecord {
        client: client.into(),
        advisor: Some("Jane".into()),
        client_id: Some(client_id.into()),
        periods,
        total: fees.iter().copied().sum::<Decimal>().round_dp(2),
        evaluation_period: "07/01/2025 - 09/30/2025".into(),
    }
}

fn read_part(xlsx: &Path, part: &str) -> String {
    let file = std::fs::File::open(xlsx).unwrap();
    let mut archive = zip::ZipArchive::new(file).unwrap();
    let mut entry = archive.by_name(part).unwrap();
    let mut content = String::new();
    entry.read_to_string(&mut content).unwrap();
    content
}

fn style_of(sheet_xml: &str, cell: &str) -> String {
    let needle = format!(r#"<c r="{cell}" s=""#);
    let start = sheet_xml.find(&needle).unwrap() + needle.len();
    let len = sheet_xml[start..].find('"').unwrap();
    sheet_xml[start..start + len].to_string()
}

#[test]
fn invoice_values_land_in_template_cells() {
    let dir = tempfile::tempdir().unwrap();
    let template_path = build_template(dir.path());
    let template = XlsxTemplate::open(&template_path).unwrap();
    assert_eq!(template.sheet_path(), SHEET1);

    let invoices = vec![record("Acme Corp", "ACME0000001XYZ", [dec!(100.00), dec!(150.50), dec!(200)])];
    let out_dir = dir.path().join("XLSX");
    let mut ticks = Vec::new();
    let outcome = render_invoices(&template, &invoices, &InvoiceConfig::default(), &out_dir, |done, total| {
        ticks.push((done, total))
    })
    .unwrap();

    assert!(outcome.failures.is_empty());
    assert_eq!(ticks, vec![(1, 1)]);
    let doc = &outcome.documents[0].path;
    assert_eq!(doc.file_name().unwrap(), "CF_invoice_Acme Corp.xlsx");

    let mut workbook = open_workbook_auto(doc).unwrap();
    let range = workbook.worksheet_range("Invoice").unwrap();
    let at = |row: u32, col: u32| range.get_value((row, col)).cloned().unwrap_or(Data::Empty);

    assert_eq!(at(0, 0), Data::String("INVOICE".into()));
    assert_eq!(at(11, 3), Data::String("07/01/2025 - 09/30/2025".into()));
    assert_eq!(at(13, 3), Data::String("$450.50".into()));
    assert_eq!(at(6, 0), Data::String("Client Name(s): Acme Corp".into()));
    assert_eq!(at(10, 3), Data::String("ACME000000".into()));
    assert_eq!(at(4, 0), Data::String("Billing Cycle: 07/01/2025 - 09/30/2025".into()));
    assert_eq!(at(17, 1), Data::String("Jul 2025".into()));
    assert_eq!(at(17, 2), Data::Float(120000.5));
    assert_eq!(at(19, 3), Data::Float(30.0));
    assert_eq!(at(18, 4), Data::String("$150.50".into()));
    assert_eq!(at(20, 4), Data::String("$450.50".into()));
}

#[test]
fn styles_merges_and_other_parts_are_preserved() {
    let dir = tempfile::tempdir().unwrap();
    let template_path = build_template(dir.path());
    let template = XlsxTemplate::open(&template_path).unwrap();

    let invoices = vec![record("Acme Corp", "A1", [dec!(1), dec!(2), dec!(3)])];
    let outcome = render_invoices(&template, &invoices, &InvoiceConfig::default(), dir.path(), |_, _| {}).unwrap();
    let doc = &outcome.documents[0].path;

    let before = read_part(&template_path, SHEET1);
    let after = read_part(doc, SHEET1);

    // Filled cells keep the template's style index.
    assert_eq!(style_of(&after, "D12"), style_of(&before, "D12"));
    assert_eq!(style_of(&after, "E21"), style_of(&before, "E21"));

    // The existing A5:C5 merge wins over the requested A5:F5.
    assert!(after.contains(r#"<mergeCell ref="A5:C5"/>"#));
    assert!(!after.contains(r#"ref="A5:F5""#));
    for merged in ["D12:E12", "D14:E14", "A7:F7", "D11:E11", "D13:E13", "A8:F8", "A16:F16"] {
        assert!(after.contains(&format!(r#"<mergeCell ref="{merged}"/>"#)), "{merged}");
    }

    for part in ["xl/styles.xml", "xl/worksheets/sheet2.xml", "xl/workbook.xml"] {
        assert_eq!(read_part(doc, part), read_part(&template_path, part), "{part}");
    }
}

#[test]
fn one_bad_document_does_not_stop_the_rest() {
    let dir = tempfile::tempdir().unwrap();
    let template = XlsxTemplate::open(&build_template(dir.path())).unwrap();
    let out_dir = dir.path().join("out");
    std::fs::create_dir_all(&out_dir).unwrap();
    // A directory squatting on Beta's output name makes its write fail.
    std::fs::create_dir(out_dir.join("CF_invoice_Beta.xlsx")).unwrap();

    let invoices = vec![
        record("Acme", "A1", [dec!(1), dec!(1), dec!(1)]),
        record("Beta", "B1", [dec!(2), dec!(2), dec!(2)]),
        record("Gamma", "G1", [dec!(3), dec!(3), dec!(3)]),
    ];
    let mut ticks = Vec::new();
    let outcome = render_invoices(&template, &invoices, &InvoiceConfig::default(), &out_dir, |done, _| {
        ticks.push(done)
    })
    .unwrap();

    assert_eq!(outcome.documents.len(), 2);
    assert_eq!(outcome.failures.len(), 1);
    assert_eq!(outcome.failures[0].client, "Beta");
    assert_eq!(ticks, vec![1, 2]);
}

#[test]
fn hostile_client_names_stay_inside_the_archive_folder() {
    let dir = tempfile::tempdir().unwrap();
    let template = XlsxTemplate::open(&build_template(dir.path())).unwrap();
    let out_dir = dir.path().join("XLSX");

    let invoices = vec![
        record("../../etc/passwd", "X1", [dec!(1), dec!(1), dec!(1)]),
        record("A/B Partners", "X2", [dec!(1), dec!(1), dec!(1)]),
        record("A\\B Partners", "X3", [dec!(1), dec!(1), dec!(1)]),
    ];
    let outcome = render_invoices(&template, &invoices, &InvoiceConfig::default(), &out_dir, |_, _| {}).unwrap();
    for doc in &outcome.documents {
        assert_eq!(doc.path.parent().unwrap(), out_dir);
    }

    let archive = dir.path().join("invoices.zip");
    write_archive(&archive, "XLSX", &outcome.documents).unwrap();
    assert_eq!(
        list_members(&archive).unwrap(),
        vec![
            "XLSX/CF_invoice_.._.._etc_passwd.xlsx",
            "XLSX/CF_invoice_A_B Partners.xlsx",
            "XLSX/CF_invoice_A_B Partners (2).xlsx",
        ]
    );
}

#[test]
fn template_without_workbook_part_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("not_a_template.xlsx");
    std::fs::write(&path, b"plain text").unwrap();
    assert!(XlsxTemplate::open(&path).is_err());
}
