//! E2E tests for the command line

use std::process::{Command, Output};

fn spedc(args: &[&str]) -> Output {
    Command::new("cargo")
        .args(["run", "--"])
        .args(args)
        .output()
        .expect("Failed to execute command")
}

/// Test a single FOMENTAR period as tables
#[test]
fn calculate_fomentar_table() {
    let output = spedc(&["calculate", "tests/data/fomentar_012024.txt"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "Command failed: {:?}", output);

    assert!(stdout.contains("FOMENTAR - 01/2024 - ACME INDUSTRIA LTDA"));
    // (1800 - 640) * 0.70
    assert!(stdout.contains("812.00"));
    // 348 incentivized + 290 not incentivized
    assert!(stdout.contains("638.00"));
    assert!(stdout.contains("80.00%"));
    assert!(stdout.contains("own-program-credit"));
    assert!(stdout.contains("special-debit-excluded"));
}

/// Test that periods are ordered by date and credit is carried forward
#[test]
fn calculate_multiple_periods() {
    let output = spedc(&[
        "calculate",
        "tests/data/fomentar_022024.txt",
        "tests/data/fomentar_012024.txt",
    ]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "Command failed: {:?}", output);

    let january = stdout.find("FOMENTAR - 01/2024").expect("January missing");
    let february = stdout.find("FOMENTAR - 02/2024").expect("February missing");
    assert!(january < february);
    assert!(stdout.contains("Total: 2 periods"));
    assert!(stdout.contains("900.00"));
}

/// Test JSON output
#[test]
fn calculate_json() {
    let output = spedc(&["calculate", "tests/data/fomentar_012024.txt", "--json"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "Command failed: {:?}", output);

    let json: serde_json::Value = serde_json::from_str(&stdout).expect("valid JSON");
    let period = &json["periods"][0];
    assert_eq!(period["label"], "01/2024");
    assert_eq!(period["header"]["cnpj"], "12345678000190");
    assert_eq!(period["result"]["program"], "Fomentar");
    assert_eq!(json["totals"]["periods"], 1);
    let exclusions = period["result"]["audit"]["exclusions"].as_array().unwrap();
    assert_eq!(exclusions.len(), 2);
}

/// Test CSV output of the line items
#[test]
fn calculate_csv() {
    let output = spedc(&["calculate", "tests/data/fomentar_012024.txt", "--csv"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "Command failed: {:?}", output);

    assert!(stdout.starts_with("period,quadro,code,description,value"));
    assert!(stdout.contains("01/2024,B,financed,ICMS financiado,812.00"));
}

/// Test the ProGoiás variant and its declaration line
#[test]
fn calculate_progoias_declarations() {
    let output = spedc(&[
        "calculate",
        "tests/data/fomentar_012024.txt",
        "--program",
        "progoias",
        "--declarations",
    ]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "Command failed: {:?}", output);

    assert!(stdout.contains("ProGoiás - 01/2024"));
    assert!(stdout.contains("|E115|GO020158|640,00|PROGOIÁS - Crédito Outorgado|"));
    assert!(stdout.contains("sibling-program-credit"));
    assert!(stdout.contains("296.00"));
}

/// Test the declarations are checked against the E115 records of the file
#[test]
fn calculate_checks_declared_e115() {
    let output = spedc(&[
        "calculate",
        "tests/data/fomentar_e115_012024.txt",
        "--declarations",
    ]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "Command failed: {:?}", output);

    assert!(stdout.contains("|E115|GO200019|812,00|ICMS financiado|"));
    assert!(stdout.contains("E115 check: 1 matching, 1 differing, 11 missing, 1 extra"));
    assert!(stdout.contains("GO200001 calculated 1800.00, declared 1500.00"));
    assert!(stdout.contains("+ GO200099 10.00 not calculated"));
    assert!(!stdout.contains("GO999999"));
}

/// Test the LogPRODUZIR freight calculation
#[test]
fn calculate_logproduzir() {
    let output = spedc(&[
        "calculate",
        "tests/data/logproduzir_012024.txt",
        "--program",
        "logproduzir",
        "--floor",
        "500",
        "--igp-di",
        "1.1",
    ]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "Command failed: {:?}", output);

    assert!(stdout.contains("LogPRODUZIR - 01/2024 - ACME TRANSPORTES LTDA"));
    assert!(stdout.contains("1200.00"));
    // (1200 - 550) * 0.73 * 0.80
    assert!(stdout.contains("379.60"));
    assert!(stdout.contains("820.40"));
}

/// Test that resolutions change the classification
#[test]
fn calculate_with_resolutions() {
    let without = spedc(&["calculate", "tests/data/generic_cfop_032024.txt"]);
    let with = spedc(&[
        "calculate",
        "tests/data/generic_cfop_032024.txt",
        "--resolutions",
        "tests/data/resolutions.json",
    ]);

    assert!(without.status.success(), "Command failed: {:?}", without);
    assert!(with.status.success(), "Command failed: {:?}", with);

    // 5949 not incentivized, credit split in half: (180 - 10) * 0.70
    assert!(String::from_utf8_lossy(&without.stdout).contains("119.00"));
    // 5949 incentivized and the credit excluded: 360 * 0.70
    let stdout = String::from_utf8_lossy(&with.stdout);
    assert!(stdout.contains("252.00"));
    assert!(stdout.contains("user-excluded"));
}

/// Test that an out of range rate is rejected
#[test]
fn calculate_rejects_invalid_rate() {
    let output = spedc(&["calculate", "tests/data/fomentar_012024.txt", "--rate", "1.5"]);
    let stderr = String::from_utf8_lossy(&output.stderr);

    assert!(!output.status.success());
    assert!(stderr.contains("financing_rate"));
}

/// Test the pending listing before and after resolutions
#[test]
fn pending_items() {
    let output = spedc(&["pending", "tests/data/generic_cfop_032024.txt"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "Command failed: {:?}", output);
    assert!(stdout.contains("5949"));
    assert!(stdout.contains("GO020001"));
    assert!(stdout.contains("E111:0"));

    let output = spedc(&[
        "pending",
        "tests/data/generic_cfop_032024.txt",
        "--resolutions",
        "tests/data/resolutions.json",
    ]);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(output.status.success(), "Command failed: {:?}", output);
    assert!(stdout.contains("Nothing pending"));
}

/// Test structure validation of a complete file
#[test]
fn validate_complete_file() {
    let output = spedc(&["validate", "tests/data/fomentar_012024.txt"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "Command failed: {:?}", output);
    assert!(stdout.contains("ACME INDUSTRIA LTDA"));
    assert!(stdout.contains("No issues found"));
    assert!(stdout.contains("C190=3"));
}

/// Test that a file without record 0000 fails validation
#[test]
fn validate_missing_header() {
    let output = spedc(&["validate", "tests/data/no_header.txt"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert_eq!(output.status.code(), Some(1));
    assert!(stdout.contains("Opening record 0000 not found"));
}

/// Test the layout listing
#[test]
fn layout_for_record_type() {
    let output = spedc(&["layout", "e111"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "Command failed: {:?}", output);
    assert!(stdout.contains("COD_AJ_APUR"));
    assert!(stdout.contains("VL_AJ_APUR"));

    let output = spedc(&["layout", "X999"]);
    assert!(!output.status.success());
}

/// Test the resolutions schema
#[test]
fn schema_json() {
    let output = spedc(&["schema"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "Command failed: {:?}", output);
    assert!(stdout.contains("generic_cfops"));
    assert!(stdout.contains("corrections"));
}
