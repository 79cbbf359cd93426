use mansion_tax::allocation::{ConstituencyCode, CouncilCode};
use mansion_tax::sources::{DatasetImporter, SourceImportError, SourceTable};
use std::path::Path;

const CONSTITUENCIES: &[u8] = include_bytes!("../../../data/sample/constituencies.csv");
const CONCENTRATION: &[u8] = include_bytes!("../../../data/sample/concentration.csv");
const TRANSACTIONS: &[u8] = include_bytes!("../../../data/sample/council_transactions.csv");

#[test]
fn sample_tables_import_from_readers() {
    let tables = DatasetImporter::from_readers(CONSTITUENCIES, CONCENTRATION, TRANSACTIONS)
        .expect("sample dataset imports");

    assert_eq!(tables.constituencies.len(), 26);
    assert_eq!(tables.proxies.len(), 26);
    assert_eq!(tables.transactions.len(), 12);

    let total: u64 = tables
        .transactions
        .iter()
        .filter_map(|row| row.transaction_count)
        .sum();
    assert_eq!(total, 429);

    let skye = tables
        .constituencies
        .iter()
        .find(|c| c.code == ConstituencyCode::new("S16000141"))
        .expect("quoted name row present");
    assert_eq!(skye.name, "Skye, Lochaber and Badenoch");
    assert_eq!(skye.council, Some(CouncilCode::new("s12000017")));
}

#[test]
fn sample_directory_imports_from_disk() {
    let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../data/sample");

    let tables = DatasetImporter::from_dir(&dir).expect("sample directory imports");

    assert_eq!(tables.constituencies.len(), 26);
    let highland: Vec<_> = tables
        .proxies
        .iter()
        .filter(|proxy| proxy.high_value_band_ratio.is_none())
        .collect();
    assert_eq!(highland.len(), 2);
}

#[test]
fn missing_concentration_file_means_no_proxies() {
    let dir = tempfile::tempdir().expect("temp dir");
    std::fs::write(
        dir.path().join(SourceTable::Constituencies.file_name()),
        CONSTITUENCIES,
    )
    .expect("write constituencies");
    std::fs::write(
        dir.path().join(SourceTable::CouncilTransactions.file_name()),
        TRANSACTIONS,
    )
    .expect("write transactions");

    let tables = DatasetImporter::from_dir(dir.path()).expect("import without proxies");

    assert!(tables.proxies.is_empty());
    assert_eq!(tables.constituencies.len(), 26);
}

#[test]
fn missing_transaction_file_names_the_table() {
    let dir = tempfile::tempdir().expect("temp dir");
    std::fs::write(
        dir.path().join(SourceTable::Constituencies.file_name()),
        CONSTITUENCIES,
    )
    .expect("write constituencies");

    let err = DatasetImporter::from_dir(dir.path()).expect_err("transactions missing");

    match err {
        SourceImportError::Io { table, path, .. } => {
            assert_eq!(table, SourceTable::CouncilTransactions);
            assert!(path.ends_with("council_transactions.csv"));
        }
        other => panic!("unexpected error: {other}"),
    }
}
