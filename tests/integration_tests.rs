use assert_cmd::prelude::*;
use predicates::str::contains;
use std::process::Command;

#[test]
fn runs_without_arguments() {
    let mut cmd = Command::cargo_bin("nibble").unwrap();
    cmd.assert().success();
}

#[test]
fn runs_countdown() {
    let mut cmd = Command::cargo_bin("nibble").unwrap();
    cmd.arg("run").arg("tests/files/countdown.asm").arg("--minimal");

    cmd.assert()
        .success()
        .stdout(contains("R2  = 15"))
        .stdout(contains("Halted"));
}

#[test]
fn runs_path_shorthand() {
    let mut cmd = Command::cargo_bin("nibble").unwrap();
    cmd.arg("tests/files/countdown.asm");

    cmd.assert()
        .success()
        .stdout(contains("Running"))
        .stdout(contains("Completed"));
}

#[test]
fn loads_data_line() {
    let mut cmd = Command::cargo_bin("nibble").unwrap();
    cmd.arg("run").arg("tests/files/max.asm").arg("--minimal");

    // Data region starts 9 14, max written to address 2
    cmd.assert()
        .success()
        .stdout(contains("    0: 0009 000E 000E 0000"));
}

#[test]
fn traces_instructions() {
    let mut cmd = Command::cargo_bin("nibble").unwrap();
    cmd.arg("run")
        .arg("tests/files/countdown.asm")
        .arg("--minimal")
        .arg("--trace");

    cmd.assert()
        .success()
        .stdout(contains("  512: 4105  ADDI R1, R0, 5"))
        .stdout(contains("JG @1, R1"));
}

#[test]
fn step_limit_stops_endless_loop() {
    let mut cmd = Command::cargo_bin("nibble").unwrap();
    cmd.arg("run")
        .arg("tests/files/spin.asm")
        .arg("--max-steps")
        .arg("100");

    cmd.assert()
        .success()
        .stdout(contains("step limit of 100 reached"));
}

#[test]
fn step_limit_from_env() {
    let mut cmd = Command::cargo_bin("nibble").unwrap();
    cmd.env("NIBBLE_MAX_STEPS", "10")
        .arg("run")
        .arg("tests/files/spin.asm");

    cmd.assert()
        .success()
        .stdout(contains("step limit of 10 reached"));
}

#[test]
fn running_off_memory_is_a_soft_stop() {
    let mut cmd = Command::cargo_bin("nibble").unwrap();
    cmd.arg("run").arg("tests/files/no_halt.asm").arg("--minimal");

    cmd.assert()
        .success()
        .stdout(contains("Stopped"))
        .stdout(contains("Program counter 1024 is outside of memory"))
        .stdout(contains("R1  = 1"));
}

#[test]
fn unknown_opcode_is_an_error() {
    let bin = std::env::temp_dir().join("nibble_unknown_opcode.bin");
    std::fs::write(&bin, [0xB1, 0x23]).unwrap();

    let mut cmd = Command::cargo_bin("nibble").unwrap();
    cmd.arg("run").arg(&bin).arg("--minimal");
    cmd.assert().failure();
}

#[test]
fn checks_unresolved_label() {
    let mut cmd = Command::cargo_bin("nibble").unwrap();
    cmd.arg("check").arg("tests/files/bad_label.asm");

    cmd.assert()
        .failure()
        .stderr(contains("Label `nowhere` is never declared (line 2)"));
}

#[test]
fn rejects_bad_data() {
    let mut cmd = Command::cargo_bin("nibble").unwrap();
    cmd.arg("check").arg("tests/files/bad_data.asm");

    cmd.assert()
        .failure()
        .stderr(contains("Invalid data value `two`"));
}

#[test]
fn compiles_and_runs_binary() {
    let dir = std::env::temp_dir().join(format!("nibble-test-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let out = dir.join("countdown.bin");

    let mut cmd = Command::cargo_bin("nibble").unwrap();
    cmd.arg("compile").arg("tests/files/countdown.asm").arg(&out);
    cmd.assert().success().stdout(contains("Saved"));

    let bytes = std::fs::read(&out).unwrap();
    assert_eq!(&bytes[..4], &[0x41, 0x05, 0x00, 0x00]);
    assert_eq!(bytes.len(), 2 * 6);

    let mut cmd = Command::cargo_bin("nibble").unwrap();
    cmd.arg("run").arg(&out).arg("--minimal");
    cmd.assert().success().stdout(contains("R2  = 15"));

    std::fs::remove_dir_all(&dir).unwrap();
}
