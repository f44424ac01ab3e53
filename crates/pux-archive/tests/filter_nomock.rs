//! No-mock filter integration tests.
//!
//! Builds real export containers and runs them through the full
//! open → select → write → reopen pipeline:
//! - Vault selection by name, uuid, and account scope
//! - Select-everything sharing and byte-identical re-filtering
//! - Attachment byte round-trip
//! - Document hygiene diagnostics
//! - Duplicate identifiers and destination handling

use pux_archive::{
    ArchiveError, ContainerWriter, EntryInfo, ExportArchive, ExportContainer, FilterOptions,
    SelectionSpec,
};
use serde_json::{json, Value};
use std::io::Cursor;
use tempfile::TempDir;
use zip::CompressionMethod;

// ============================================================================
// Helpers
// ============================================================================

fn item(uuid: &str, document_id: Option<&str>) -> Value {
    match document_id {
        Some(id) => json!({
            "uuid": uuid,
            "categoryUuid": "006",
            "overview": {"title": format!("Item {uuid}")},
            "details": {"documentAttributes": {"fileName": "doc.bin", "documentId": id}}
        }),
        None => json!({"uuid": uuid, "categoryUuid": "001", "overview": {"title": "Login"}}),
    }
}

fn vault(uuid: &str, name: &str, items: Vec<Value>) -> Value {
    json!({
        "attrs": {"uuid": uuid, "name": name, "desc": "", "avatar": "", "type": "U"},
        "items": items
    })
}

fn account(uuid: &str, name: &str, vaults: Vec<Value>) -> Value {
    json!({
        "attrs": {
            "accountName": format!("{name} account"),
            "name": name,
            "avatar": "",
            "email": "user@example.com",
            "uuid": uuid,
            "domain": "https://my.1password.com/"
        },
        "vaults": vaults
    })
}

fn export_data(accounts: Vec<Value>) -> Value {
    json!({
        "attrs": {"version": 3, "description": "1Password Unencrypted Export", "createdAt": 1650000000},
        "accounts": accounts
    })
}

/// Account "A" with vaults Personal (d1) and Work (d2).
fn personal_work_data() -> Value {
    export_data(vec![account(
        "a1",
        "A",
        vec![
            vault("v1", "Personal", vec![item("i1", Some("d1"))]),
            vault("v2", "Work", vec![item("i2", Some("d2"))]),
        ],
    )])
}

fn build_archive(data: &Value, files: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = ContainerWriter::new(Cursor::new(Vec::new()));
    writer
        .write_entry(
            &EntryInfo::file("export.attributes"),
            br#"{"version": 3, "description": "1Password Unencrypted Export"}"#,
        )
        .expect("write attributes");
    writer
        .write_entry(&EntryInfo::file("export.data"), data.to_string().as_bytes())
        .expect("write data");
    writer
        .add_directory(&EntryInfo::directory("files/"))
        .expect("write files dir");
    for (name, content) in files {
        writer
            .write_entry(&EntryInfo::file(*name), content)
            .expect("write document file");
    }
    writer.finish().expect("finish").into_inner()
}

fn personal_work_archive() -> Vec<u8> {
    build_archive(
        &personal_work_data(),
        &[
            ("files/d1_passport.pdf", &b"%PDF personal"[..]),
            ("files/d2_contract.pdf", &b"%PDF work"[..]),
        ],
    )
}

fn filter_bytes(bytes: Vec<u8>, spec: Option<&SelectionSpec>) -> Vec<u8> {
    let archive = ExportArchive::from_bytes(bytes).expect("open archive");
    let filtered = archive.select(spec).expect("select");
    let (cursor, _) = filtered
        .write_filtered_to(Cursor::new(Vec::new()), &FilterOptions::default())
        .expect("write filtered");
    cursor.into_inner()
}

fn entry_names(bytes: Vec<u8>) -> Vec<String> {
    let container = ExportContainer::from_bytes(bytes).expect("reopen output");
    container.entries().iter().map(|e| e.name.clone()).collect()
}

// ============================================================================
// Selection scenarios
// ============================================================================

#[test]
fn test_select_personal_vault_only() {
    let archive = ExportArchive::from_bytes(personal_work_archive()).expect("open");
    let spec = SelectionSpec::new().with_vault("Personal");
    let filtered = archive.select(Some(&spec)).expect("select");

    let docs: Vec<_> = filtered.filtered_document_ids().iter().copied().collect();
    assert_eq!(docs, vec!["d1"]);

    let vaults = filtered.filtered_data()["accounts"][0]["vaults"]
        .as_array()
        .expect("vaults list");
    assert_eq!(vaults.len(), 1);
    assert_eq!(vaults[0]["attrs"]["uuid"], "v1");

    let account = filtered.filtered_account_by_uuid("a1").expect("account kept");
    assert!(account.filtered_vault_by_name("Personal").is_some());
    assert!(account.filtered_vault_by_name("Work").is_none());
    assert!(account.unfiltered_vault_by_name("Work").is_some());

    let (cursor, summary) = filtered
        .write_filtered_to(Cursor::new(Vec::new()), &FilterOptions::default())
        .expect("write");
    assert_eq!(summary.files_written, 1);
    assert_eq!(
        entry_names(cursor.into_inner()),
        vec!["export.attributes", "export.data", "files/", "files/d1_passport.pdf"]
    );
}

#[test]
fn test_select_by_vault_uuid_matches_name_selection() {
    let by_name = filter_bytes(
        personal_work_archive(),
        Some(&SelectionSpec::new().with_vault("Work")),
    );
    let by_uuid = filter_bytes(
        personal_work_archive(),
        Some(&SelectionSpec::new().with_account_vault("A", "v2")),
    );

    assert_eq!(by_name, by_uuid);
}

#[test]
fn test_nonexistent_vault_selects_no_documents() {
    let archive = ExportArchive::from_bytes(personal_work_archive()).expect("open");
    let spec = SelectionSpec::new().with_vault("Nonexistent");
    let filtered = archive.select(Some(&spec)).expect("select");

    assert!(filtered.filtered_document_ids().is_empty());
    assert_eq!(
        filtered
            .filtered_accounts()
            .map(|a| a.num_filtered_vaults())
            .sum::<usize>(),
        0
    );
    assert_eq!(filtered.filtered_entries().count(), 0);

    let (cursor, summary) = filtered
        .write_filtered_to(Cursor::new(Vec::new()), &FilterOptions::default())
        .expect("write");
    assert_eq!(summary.files_written, 0);
    assert_eq!(
        entry_names(cursor.into_inner()),
        vec!["export.attributes", "export.data", "files/"]
    );
}

#[test]
fn test_unknown_account_selects_nothing() {
    let archive = ExportArchive::from_bytes(personal_work_archive()).expect("open");
    let spec = SelectionSpec::new().with_account_vault("Nobody", "*");
    let filtered = archive.select(Some(&spec)).expect("select");

    assert_eq!(filtered.num_filtered_accounts(), 0);
    assert!(filtered.filtered_document_ids().is_empty());
    assert_eq!(filtered.filtered_data()["accounts"], json!([]));
    assert_eq!(filtered.filtered_data()["attrs"]["version"], 3);
}

#[test]
fn test_filtered_documents_are_subset_of_unfiltered() {
    let data = export_data(vec![
        account(
            "a1",
            "A",
            vec![
                vault("v1", "Personal", vec![item("i1", Some("d1")), item("i2", None)]),
                vault("v2", "Work", vec![item("i3", Some("d2"))]),
            ],
        ),
        account(
            "a2",
            "B",
            vec![vault("v3", "Personal", vec![item("i4", Some("d3"))])],
        ),
    ]);
    let archive = ExportArchive::from_bytes(build_archive(&data, &[])).expect("open");

    for spec in [
        SelectionSpec::new().with_vault("Personal"),
        SelectionSpec::new().with_account_vault("B", "*"),
        SelectionSpec::new().with_account_vault("a1", "Work").with_vault("v3"),
    ] {
        let filtered = archive.select(Some(&spec)).expect("select");
        let expected: std::collections::BTreeSet<&str> = filtered
            .filtered_accounts()
            .flat_map(|a| a.filtered_vaults())
            .flat_map(|v| v.document_ids().iter().copied())
            .collect();

        assert!(filtered
            .filtered_document_ids()
            .is_subset(filtered.unfiltered_document_ids()));
        assert_eq!(filtered.filtered_document_ids(), &expected);
    }
}

// ============================================================================
// Select everything
// ============================================================================

#[test]
fn test_select_everything_shares_unfiltered_view() {
    let archive = ExportArchive::from_bytes(personal_work_archive()).expect("open");

    for spec in [None, Some(SelectionSpec::new().with_account_vault("*", "*"))] {
        let filtered = archive.select(spec.as_ref()).expect("select");

        assert!(filtered.is_unfiltered());
        assert!(std::ptr::eq(
            filtered.filtered_data(),
            filtered.unfiltered_data()
        ));
        assert_eq!(
            filtered.filtered_document_ids(),
            filtered.unfiltered_document_ids()
        );
    }
}

#[test]
fn test_select_everything_keeps_all_files() {
    let output = filter_bytes(personal_work_archive(), None);

    assert_eq!(
        entry_names(output),
        vec![
            "export.attributes",
            "export.data",
            "files/",
            "files/d1_passport.pdf",
            "files/d2_contract.pdf"
        ]
    );
}

// ============================================================================
// Output properties
// ============================================================================

#[test]
fn test_refiltering_is_byte_identical() {
    let spec = SelectionSpec::new().with_vault("Work");

    let once = filter_bytes(personal_work_archive(), Some(&spec));
    let twice = filter_bytes(once.clone(), Some(&spec));

    assert_eq!(once, twice);
}

#[test]
fn test_attachment_bytes_round_trip() {
    let large: Vec<u8> = (0..200_000u32).map(|i| (i % 251) as u8).collect();
    let data = export_data(vec![account(
        "a1",
        "A",
        vec![vault("v1", "Personal", vec![item("i1", Some("d1"))])],
    )]);
    let source = build_archive(&data, &[("files/d1_blob.bin", large.as_slice())]);

    let archive = ExportArchive::from_bytes(source).expect("open");
    let filtered = archive.select(None).expect("select");
    // small buffer forces several copy rounds
    let options = FilterOptions::default().with_copy_buffer_size(4096);
    let (cursor, summary) = filtered
        .write_filtered_to(Cursor::new(Vec::new()), &options)
        .expect("write");

    let output = ExportContainer::from_bytes(cursor.into_inner()).expect("reopen");
    assert_eq!(output.read_entry("files/d1_blob.bin").expect("read"), large);
    assert_eq!(
        output.read_entry("export.attributes").expect("read"),
        archive
            .container()
            .read_entry("export.attributes")
            .expect("read source")
    );
    assert!(summary.bytes_copied >= large.len() as u64);
}

#[test]
fn test_export_data_is_canonical_json() {
    let output = filter_bytes(
        personal_work_archive(),
        Some(&SelectionSpec::new().with_vault("Personal")),
    );
    let container = ExportContainer::from_bytes(output).expect("reopen");
    let text = String::from_utf8(container.read_entry("export.data").expect("read"))
        .expect("utf-8 export data");

    assert!(text.starts_with("{\n  \"accounts\": ["));
    let parsed: Value = serde_json::from_str(&text).expect("valid json");
    assert_eq!(parsed["accounts"][0]["vaults"][0]["attrs"]["name"], "Personal");
}

#[test]
fn test_item_numbers_are_copied_exactly() {
    let data = r#"{
        "attrs": {"version": 3},
        "accounts": [{
            "attrs": {"name": "A", "uuid": "a1"},
            "vaults": [
                {"attrs": {"uuid": "v1", "name": "Personal"},
                 "items": [{"uuid": "i1", "big": 12345678901234567890123, "ratio": 1.50}]},
                {"attrs": {"uuid": "v2", "name": "Work"}, "items": []}
            ]
        }]
    }"#;
    let mut writer = ContainerWriter::new(Cursor::new(Vec::new()));
    writer
        .write_entry(&EntryInfo::file("export.attributes"), b"{}")
        .expect("write attributes");
    writer
        .write_entry(&EntryInfo::file("export.data"), data.as_bytes())
        .expect("write data");
    let source = writer.finish().expect("finish").into_inner();

    let spec = SelectionSpec::new().with_vault("Personal");
    let once = filter_bytes(source, Some(&spec));
    let twice = filter_bytes(once.clone(), Some(&spec));
    assert_eq!(once, twice);

    let container = ExportContainer::from_bytes(once).expect("reopen");
    let text = String::from_utf8(container.read_entry("export.data").expect("read"))
        .expect("utf-8 export data");
    assert!(text.contains("\"big\": 12345678901234567890123"));
    assert!(text.contains("\"ratio\": 1.50"));
}

#[test]
fn test_write_to_existing_destination_fails() {
    let dir = TempDir::new().expect("tempdir");
    let dest = dir.path().join("filtered.1pux");
    std::fs::write(&dest, b"keep me").expect("seed destination");

    let archive = ExportArchive::from_bytes(personal_work_archive()).expect("open");
    let filtered = archive.select(None).expect("select");
    let result = filtered.write_filtered_archive(&dest);

    assert!(matches!(result, Err(ArchiveError::DestinationExists(_))));
    assert_eq!(std::fs::read(&dest).expect("read"), b"keep me");
}

#[test]
fn test_write_to_file_and_reopen() {
    let dir = TempDir::new().expect("tempdir");
    let source_path = dir.path().join("export.1pux");
    let dest = dir.path().join("filtered.1pux");
    std::fs::write(&source_path, personal_work_archive()).expect("write source");

    let archive = ExportArchive::open(&source_path).expect("open");
    let spec = SelectionSpec::new().with_vault("Work");
    let summary = archive
        .select(Some(&spec))
        .expect("select")
        .write_filtered_archive(&dest)
        .expect("write");
    assert_eq!(summary.accounts, 1);
    assert_eq!(summary.vaults, 1);
    assert_eq!(summary.documents, 1);

    let reopened = ExportArchive::open(&dest).expect("reopen");
    let all = reopened.select(None).expect("select all");
    assert_eq!(all.num_unfiltered_accounts(), 1);
    let docs: Vec<_> = all.unfiltered_document_ids().iter().copied().collect();
    assert_eq!(docs, vec!["d2"]);
    assert!(all.diagnostics().is_clean());
}

#[test]
fn test_failed_write_removes_partial_destination() {
    let dir = TempDir::new().expect("tempdir");
    let dest = dir.path().join("filtered.1pux");

    // export.attributes missing: the write starts then fails
    let mut writer = ContainerWriter::new(Cursor::new(Vec::new()));
    writer
        .write_entry(
            &EntryInfo::file("export.data"),
            personal_work_data().to_string().as_bytes(),
        )
        .expect("write data");
    let bytes = writer.finish().expect("finish").into_inner();

    let archive = ExportArchive::from_bytes(bytes).expect("open");
    let result = archive.select(None).expect("select").write_filtered_archive(&dest);

    assert!(matches!(result, Err(ArchiveError::EntryNotFound(_))));
    assert!(!dest.exists());
}

// ============================================================================
// Diagnostics
// ============================================================================

#[test]
fn test_missing_document_file_is_reported() {
    let data = export_data(vec![account(
        "a1",
        "A",
        vec![vault(
            "v1",
            "Personal",
            vec![item("i1", Some("d1")), item("i2", Some("d9"))],
        )],
    )]);
    let source = build_archive(&data, &[("files/d1", &b"one"[..])]);

    let archive = ExportArchive::from_bytes(source).expect("open");
    let filtered = archive.select(None).expect("construction still succeeds");

    let missing: Vec<_> = filtered
        .diagnostics()
        .missing_file_document_ids
        .iter()
        .map(String::as_str)
        .collect();
    assert_eq!(missing, vec!["d9"]);
    assert!(filtered.diagnostics().extra_file_document_ids.is_empty());
}

#[test]
fn test_orphan_and_unexpected_entries_are_ignored() {
    let source = build_archive(
        &personal_work_data(),
        &[
            ("files/d1", &b"one"[..]),
            ("files/d2", &b"two"[..]),
            ("files/d7_orphan.txt", &b"orphan"[..]),
            ("notes.txt", &b"stray"[..]),
        ],
    );

    let archive = ExportArchive::from_bytes(source).expect("open");
    let filtered = archive.select(None).expect("select");
    let diagnostics = filtered.diagnostics();
    assert!(diagnostics.extra_file_document_ids.contains("d7"));
    assert_eq!(diagnostics.unexpected_entries, vec!["notes.txt"]);

    let (cursor, _) = filtered
        .write_filtered_to(Cursor::new(Vec::new()), &FilterOptions::default())
        .expect("write");
    let names = entry_names(cursor.into_inner());
    assert!(!names.iter().any(|n| n == "notes.txt"));
    assert!(!names.iter().any(|n| n.starts_with("files/d7")));
}

/// Archive whose central directory lists `files/d1_a` twice, "FIRST" then
/// "SECOND". Written under two names of equal length, then renamed in place.
fn repeated_attachment_archive() -> Vec<u8> {
    let stored = |name: &str| EntryInfo {
        compression: CompressionMethod::Stored,
        ..EntryInfo::file(name)
    };
    let mut writer = ContainerWriter::new(Cursor::new(Vec::new()));
    writer
        .write_entry(&EntryInfo::file("export.attributes"), b"{}")
        .expect("write attributes");
    writer
        .write_entry(
            &EntryInfo::file("export.data"),
            personal_work_data().to_string().as_bytes(),
        )
        .expect("write data");
    writer
        .write_entry(&stored("files/d1_a"), b"FIRST")
        .expect("write first");
    writer
        .write_entry(&stored("files/d1_b"), b"SECOND")
        .expect("write second");
    let mut bytes = writer.finish().expect("finish").into_inner();

    let (from, to) = (b"files/d1_b", b"files/d1_a");
    let mut renamed = 0;
    let mut at = 0;
    while at + from.len() <= bytes.len() {
        if &bytes[at..at + from.len()] == from {
            bytes[at..at + from.len()].copy_from_slice(to);
            renamed += 1;
        }
        at += 1;
    }
    // local header and central directory record
    assert_eq!(renamed, 2);
    bytes
}

#[test]
fn test_repeated_filename_keeps_first_copy() {
    let source = repeated_attachment_archive();

    let container = ExportContainer::from_bytes(source.clone()).expect("open container");
    let names: Vec<_> = container
        .entries()
        .iter()
        .filter(|e| e.name == "files/d1_a")
        .collect();
    assert_eq!(names.len(), 2);
    assert_eq!(container.read_entry("files/d1_a").expect("read"), b"FIRST");
    assert_eq!(container.read_entry_at(names[1]).expect("read"), b"SECOND");

    let archive = ExportArchive::from_bytes(source).expect("open");
    let filtered = archive.select(None).expect("select");
    assert_eq!(filtered.diagnostics().duplicate_filenames, vec!["files/d1_a"]);
    assert!(filtered.diagnostics().duplicate_document_ids.is_empty());
    assert_eq!(filtered.unfiltered_entries().len(), 1);

    let (cursor, summary) = filtered
        .write_filtered_to(Cursor::new(Vec::new()), &FilterOptions::default())
        .expect("write");
    assert_eq!(summary.files_written, 1);
    let output = ExportContainer::from_bytes(cursor.into_inner()).expect("reopen");
    assert_eq!(output.read_entry("files/d1_a").expect("read"), b"FIRST");
    assert_eq!(
        output
            .entries()
            .iter()
            .filter(|e| e.name == "files/d1_a")
            .count(),
        1
    );
}

// ============================================================================
// Duplicate identifiers
// ============================================================================

#[test]
fn test_duplicate_identifiers_abort_construction() {
    let cases = [
        export_data(vec![account(
            "a1",
            "A",
            vec![vault("v1", "Personal", vec![item("i1", None), item("i1", None)])],
        )]),
        export_data(vec![account(
            "a1",
            "A",
            vec![vault("v1", "Personal", vec![]), vault("v1", "Other", vec![])],
        )]),
        export_data(vec![account(
            "a1",
            "A",
            vec![vault("v1", "Personal", vec![]), vault("v2", "Personal", vec![])],
        )]),
        export_data(vec![account("a1", "A", vec![]), account("a1", "B", vec![])]),
        export_data(vec![account("a1", "A", vec![]), account("a2", "A", vec![])]),
    ];

    for data in cases {
        let archive = ExportArchive::from_bytes(build_archive(&data, &[])).expect("open");
        let result = archive.select(None);
        assert!(
            matches!(result, Err(ArchiveError::DuplicateIdentifier(_))),
            "expected duplicate identifier for {data}"
        );
    }
}

#[test]
fn test_item_without_uuid_is_malformed() {
    let data = export_data(vec![account(
        "a1",
        "A",
        vec![vault("v1", "Personal", vec![json!({"overview": {}})])],
    )]);
    let archive = ExportArchive::from_bytes(build_archive(&data, &[])).expect("open");

    let result = archive.select(None);
    assert!(matches!(result, Err(ArchiveError::MalformedArchive(msg)) if msg.contains("uuid")));
}
