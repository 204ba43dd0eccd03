use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

fn maptology_bin() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_maptology"))
}

/// A command with no credential and an unreachable service, so nothing
/// ever leaves the machine.
fn offline(dir: &Path) -> Command {
    let mut cmd = Command::new(maptology_bin());
    cmd.current_dir(dir)
        .env_remove("BIOPORTAL_API_KEY")
        .env("BIOPORTAL_BASE_URL", "http://127.0.0.1:9")
        .env("NO_COLOR", "1")
        .env("CLICOLOR", "0");
    cmd
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

fn write_sample(dir: &Path) -> PathBuf {
    let path = dir.join("samples.csv");
    fs::write(
        &path,
        "sex,age,site,collected\nM,34,liver,2021-03-04\nF,41,lung,2021-05-06\nM,29,liver,2022-01-02\n",
    )
    .expect("write csv");
    path
}

#[test]
fn inspect_reports_inferred_types() {
    let dir = tempfile::tempdir().expect("tempdir");
    let csv = write_sample(dir.path());

    let output = offline(dir.path())
        .arg("inspect")
        .arg(&csv)
        .output()
        .expect("run maptology");
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let out = stdout(&output);
    assert!(out.contains("3 rows, 4 columns"), "{out}");
    assert!(out.contains("Integer"), "{out}");
    assert!(out.contains("2021-03-04, 2021-05-06"), "{out}");
    assert!(out.contains("liver, lung"), "{out}");
}

#[test]
fn inspect_unknown_column_fails() {
    let dir = tempfile::tempdir().expect("tempdir");
    let csv = write_sample(dir.path());

    let output = offline(dir.path())
        .args(["inspect", "--column", "weight"])
        .arg(&csv)
        .output()
        .expect("run maptology");
    assert!(!output.status.success());
    assert!(stderr(&output).contains("unknown column: weight"));
}

#[test]
fn search_without_api_key_fails_before_any_request() {
    let dir = tempfile::tempdir().expect("tempdir");
    let output = offline(dir.path())
        .args(["search", "sex", "--ontology", "OMIT"])
        .output()
        .expect("run maptology");
    assert!(!output.status.success());
    assert!(stderr(&output).contains("no API key"), "{}", stderr(&output));
}

#[test]
fn repl_script_runs_offline_session() {
    let dir = tempfile::tempdir().expect("tempdir");
    let csv = write_sample(dir.path());
    let script = dir.path().join("session.repl");
    fs::write(
        &script,
        "# no ontologies yet\ncolumns\ncolumn site\nvalues\nvalue lung\ntype Categorical\nontology add OMIT\nmappings\nexport out\n",
    )
    .expect("write script");

    let output = offline(dir.path())
        .arg("repl")
        .arg(&csv)
        .arg("--script")
        .arg(&script)
        .output()
        .expect("run maptology");
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let out = stdout(&output);
    assert!(out.contains("Found 3 rows and 4 columns"), "{out}");
    assert!(out.contains("maptology> column site"), "{out}");
    assert!(
        out.contains("Please select at least one ontology first."),
        "{out}"
    );
    assert!(out.contains("Column 'site' converted to Categorical"), "{out}");
    // Adding an ontology reruns the searches, which need a key.
    assert!(out.contains("BioPortal API key not found"), "{out}");
    assert!(out.contains("(no mappings)"), "{out}");
    assert!(
        out.contains("No mappings available to generate schema."),
        "{out}"
    );
    assert!(!dir.path().join("out").join("column_mappings.csv").exists());
}

#[test]
fn repl_commands_fail_fast_unless_asked_to_continue() {
    let dir = tempfile::tempdir().expect("tempdir");
    let csv = write_sample(dir.path());

    let failing = offline(dir.path())
        .arg("repl")
        .arg(&csv)
        .args(["-c", "column weight", "-c", "columns"])
        .output()
        .expect("run maptology");
    assert!(!failing.status.success());
    assert!(stderr(&failing).contains("repl script failed at line 1"));
    assert!(!stdout(&failing).contains("maptology> columns"));

    let continuing = offline(dir.path())
        .arg("repl")
        .arg(&csv)
        .args(["--quiet", "--continue-on-error", "-c", "column weight", "-c", "columns"])
        .output()
        .expect("run maptology");
    assert!(continuing.status.success(), "stderr: {}", stderr(&continuing));
    assert!(stderr(&continuing).contains("unknown column: weight"));
    assert!(stdout(&continuing).contains("collected"));
    assert!(!stdout(&continuing).contains("maptology> "));
}
