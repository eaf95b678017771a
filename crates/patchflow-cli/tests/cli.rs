use assert_cmd::Command;

fn patchflow(workspace: &std::path::Path) -> Command {
    let mut cmd = Command::cargo_bin("patchflow").expect("binary");
    cmd.arg("--workspace").arg(workspace);
    cmd
}

#[test]
fn classify_emits_the_intent_as_json() {
    let dir = tempfile::tempdir().expect("workspace");
    let assert = patchflow(dir.path())
        .args(["--json", "classify", "refactor the parser module"])
        .assert()
        .success();
    let stdout = String::from_utf8(assert.get_output().stdout.clone()).expect("utf8");
    let value: serde_json::Value = serde_json::from_str(stdout.trim()).expect("json");
    assert_eq!(value["intent"], "refactor");
    assert_eq!(value["risk"], "medium");
}

#[test]
fn validate_rejects_a_dangerous_patch() {
    let dir = tempfile::tempdir().expect("workspace");
    let patch = dir.path().join("bad.patch");
    std::fs::write(&patch, "--- a/x.js\n+++ b/x.js\n+eval(payload)\n").expect("write patch");

    patchflow(dir.path())
        .arg("validate")
        .arg(&patch)
        .assert()
        .failure()
        .stdout(predicates::str::contains("Dangerous pattern"));
}

#[test]
fn repo_attach_then_session_create_round_trips() {
    let dir = tempfile::tempdir().expect("workspace");
    patchflow(dir.path())
        .args(["repo", "attach", "octocat/hello-world"])
        .assert()
        .success();

    let assert = patchflow(dir.path())
        .args(["--json", "session", "create", "octocat/hello-world"])
        .assert()
        .success();
    let stdout = String::from_utf8(assert.get_output().stdout.clone()).expect("utf8");
    let value: serde_json::Value = serde_json::from_str(stdout.trim()).expect("json");
    assert_eq!(value["state"], "IDLE");
    assert_eq!(value["mode"], "action");

    // A second create must be fine: the first session is still settled.
    patchflow(dir.path())
        .args(["session", "create", "octocat/hello-world"])
        .assert()
        .success();
}

#[test]
fn illegal_transition_fails_from_the_cli() {
    let dir = tempfile::tempdir().expect("workspace");
    patchflow(dir.path())
        .args(["repo", "attach", "octocat/hello-world"])
        .assert()
        .success();
    patchflow(dir.path())
        .args(["session", "create", "octocat/hello-world"])
        .assert()
        .success();

    patchflow(dir.path())
        .args(["session", "transition", "EXECUTING"])
        .assert()
        .failure()
        .stderr(predicates::str::contains("not allowed"));

    patchflow(dir.path())
        .args(["session", "transition", "PLANNING"])
        .assert()
        .success();
}
