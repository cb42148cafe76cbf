use assert_cmd::Command;
use predicates::prelude::*;

/// Input validation happens before any connection attempt, so these run with
/// no database at all. DATABASE_URI is pointed at a closed port to prove it.
fn gm() -> Command {
    let mut cmd = Command::cargo_bin("gm").expect("gm binary");
    cmd.env("DATABASE_URI", "postgres://nobody@127.0.0.1:1/none");
    cmd.env_remove("RUST_LOG");
    cmd
}

#[test]
fn help_lists_subcommands() {
    gm().arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("order"))
        .stdout(predicate::str::contains("reconcile"));
}

#[test]
fn order_submit_rejects_luhn_failure() {
    gm().args([
        "order",
        "submit",
        "--user",
        "6f1c2a56-4d8e-4f0b-9a35-0c1d2e3f4a5b",
        "--number",
        "79927398710",
    ])
    .assert()
    .failure()
    .stderr(predicate::str::contains("79927398710"));
}

#[test]
fn order_submit_rejects_malformed_user_id() {
    gm().args(["order", "submit", "--user", "not-a-uuid", "--number", "79927398713"])
        .assert()
        .failure();
}

#[test]
fn withdraw_rejects_sum_with_too_many_decimals() {
    gm().args([
        "withdraw",
        "--user",
        "6f1c2a56-4d8e-4f0b-9a35-0c1d2e3f4a5b",
        "--order",
        "79927398713",
        "--sum",
        "1.0000001",
    ])
    .assert()
    .failure()
    .stderr(predicate::str::contains("--sum"));
}

#[test]
fn reconcile_tick_requires_http_accrual_url() {
    gm().args(["reconcile", "tick", "--accrual", "ftp://accrual"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid --accrual"));
}
