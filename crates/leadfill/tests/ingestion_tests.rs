//! File-level ingestion tests: CSV and XLSX fixtures on disk through the
//! public `Ingestor` API.

mod common;

use common::{Cell, TestHarness};
use leadfill::{CanonicalField, Ingestor, PhoneNormalizer};

#[test]
fn test_repeated_phone_across_formats_flagged_once() {
    let harness = TestHarness::new();
    let path = harness.write_csv(
        "leads.csv",
        "endereco,numero,nome,celular\n\
         Rua A,10,Jo,+5511999990000\n\
         Rua A,10,Jo,11999990000\n",
    );

    let report = Ingestor::default().ingest_path(&path);

    assert!(!report.is_failed());
    assert_eq!(report.batch.len(), 2);
    assert_eq!(report.batch.duplicate_phones.len(), 1);
    assert!(report.batch.duplicate_phones.contains("11999990000"));
    for record in &report.batch.records {
        assert!(report.batch.has_duplicate_phone(record));
    }
}

#[test]
fn test_source_name_is_the_file_name() {
    let harness = TestHarness::new();
    let path = harness.write_csv("março.csv", "Endereço;Nome;Telefone\nRua A;Jo;11999990000\n");

    let report = Ingestor::default().ingest_path(&path);

    assert_eq!(report.batch.source_name.as_deref(), Some("março.csv"));
}

#[test]
fn test_records_missing_required_fields_never_emitted() {
    let rows = [
        "Rua A;Ana;11911110000",
        ";Bia;11922220000",
        "Rua C;;11933330000",
        "Rua D;Duda;",
        "Rua E;Eva;11955550000",
    ];

    // Same rows in forward and reverse order
    for ordered in [rows.to_vec(), rows.iter().rev().copied().collect()] {
        let harness = TestHarness::new();
        let content = format!("Endereço;Nome;Celular\n{}\n", ordered.join("\n"));
        let path = harness.write_csv("leads.csv", &content);

        let report = Ingestor::default().ingest_path(&path);

        assert_eq!(report.rows_invalid, 3);
        let owners: Vec<&str> = report
            .batch
            .records
            .iter()
            .map(|r| r.owner_name.as_str())
            .collect();
        assert_eq!(owners.len(), 2);
        assert!(owners.contains(&"Ana") && owners.contains(&"Eva"));
        for record in &report.batch.records {
            assert!(record.missing_required().is_empty());
        }
    }
}

#[test]
fn test_xlsx_with_sparse_columns() {
    let harness = TestHarness::new();
    let path = harness.write_xlsx(
        "leads.xlsx",
        &[
            &["Proprietário", "Logradouro", "Nº", "Apto", "WhatsApp", "E-mail"],
            &["Ana", "Av. Brasil", "500", "", "11911110000", ""],
            &["", "", "", "", "", ""],
            &["Bia", "Rua XV", "", "12", "11922220000", "bia@example.com"],
        ],
    );

    let report = Ingestor::default().ingest_path(&path);

    assert!(!report.is_failed(), "{:?}", report.diagnostic);
    assert_eq!(report.rows_empty, 1);
    assert_eq!(report.batch.len(), 2);
    assert_eq!(report.mapping.column(CanonicalField::OwnerName), Some(0));
    assert_eq!(report.mapping.column(CanonicalField::Address), Some(1));

    let ana = &report.batch.records[0];
    assert_eq!(ana.composed_address(), "Av. Brasil, 500");
    assert_eq!(ana.complement, "");

    let bia = &report.batch.records[1];
    assert_eq!(bia.row_number, 4);
    assert_eq!(bia.composed_address(), "Rua XV");
    assert_eq!(bia.complement, "12");
    assert_eq!(bia.email, "bia@example.com");
}

#[test]
fn test_corrupt_workbook_yields_empty_batch_with_diagnostic() {
    let harness = TestHarness::new();
    let path = harness.write_bytes("leads.xlsx", b"definitely not a zip archive");

    let report = Ingestor::default().ingest_path(&path);

    assert!(report.is_failed());
    assert!(report.batch.is_empty());
    assert!(report.diagnostic.unwrap().contains("Malformed source"));
}

#[test]
fn test_legacy_xls_is_read_as_a_workbook() {
    let harness = TestHarness::new();
    // Compound document signature followed by garbage
    let path = harness.write_bytes("leads.xls", &[0xd0, 0xcf, 0x11, 0xe0, 0xa1, 0xb1, 0x1a, 0xe1, 0x00]);

    let report = Ingestor::default().ingest_path(&path);

    assert!(report.is_failed());
    let diagnostic = report.diagnostic.unwrap();
    assert!(diagnostic.contains("Malformed source"), "{}", diagnostic);
    assert!(diagnostic.contains("not a valid workbook"), "{}", diagnostic);
}

#[test]
fn test_xlsx_with_numeric_phone_cells() {
    let harness = TestHarness::new();
    let path = harness.write_xlsx_cells(
        "leads.xlsx",
        &[
            &[Cell::Text("Nome"), Cell::Text("Endereço"), Cell::Text("Número"), Cell::Text("Celular")],
            &[Cell::Text("Ana"), Cell::Text("Rua A"), Cell::Number("10"), Cell::Number("5511999990000")],
        ],
    );

    let report = Ingestor::default().ingest_path(&path);

    assert!(!report.is_failed(), "{:?}", report.diagnostic);
    let ana = &report.batch.records[0];
    assert_eq!(ana.phone, "5511999990000");
    assert_eq!(ana.composed_address(), "Rua A, 10");
}

#[test]
fn test_missing_file_yields_diagnostic() {
    let harness = TestHarness::new();
    let report = Ingestor::default().ingest_path(&harness.path().join("nope.csv"));
    assert!(report.is_failed());
    assert!(report.batch.is_empty());
}

#[test]
fn test_header_only_file_is_a_valid_empty_batch() {
    let harness = TestHarness::new();
    let path = harness.write_csv("leads.csv", "Endereço;Nome;Celular\n");

    let report = Ingestor::default().ingest_path(&path);

    assert!(!report.is_failed());
    assert!(report.batch.is_empty());
    assert_eq!(report.rows_read, 0);
}

#[test]
fn test_custom_country_code() {
    let harness = TestHarness::new();
    let path = harness.write_csv(
        "leads.csv",
        "address,name,phone\n\
         Main St,Al,+1 (415) 555-0100\n\
         Main St,Bo,415.555.0100\n",
    );

    let report = Ingestor::new(PhoneNormalizer::new("1", 10)).ingest_path(&path);

    assert_eq!(report.batch.duplicate_phones.len(), 1);
    assert!(report.batch.duplicate_phones.contains("4155550100"));
}
