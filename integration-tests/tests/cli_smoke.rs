use anyhow::Result;
use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::{Value, json};
use tempfile::{TempDir, tempdir};

/// `geointel` with an isolated home so no real `.env` or credentials leak in.
fn geointel(home: &TempDir) -> Command {
    let mut cmd = Command::new("cargo");
    cmd.arg("run")
        .arg("--quiet")
        .arg("-p")
        .arg("geointel")
        .arg("--bin")
        .arg("geointel")
        .arg("--");
    cmd.env("GEOINTEL_HOME", home.path())
        .env_remove("GEOINTEL_ACTIVE_LLM")
        .env_remove("OPENAI_API_KEY")
        .env_remove("GEMINI_API_KEY")
        .env_remove("AZURE_OPENAI_API_KEY")
        .env("NO_COLOR", "1");
    cmd
}

#[test]
fn help_lists_every_command() -> Result<()> {
    let home = tempdir()?;
    geointel(&home)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("verify-company"))
        .stdout(predicate::str::contains("report"))
        .stdout(predicate::str::contains("serve"));
    Ok(())
}

#[test]
fn unknown_model_is_reported() -> Result<()> {
    let home = tempdir()?;
    geointel(&home)
        .args(["prompts", "--model", "bogus", "--topic", "t", "--persona", "founder"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unsupported LLM provider: bogus"));
    Ok(())
}

#[test]
fn prompt_count_out_of_range_fails() -> Result<()> {
    let home = tempdir()?;
    geointel(&home)
        .args([
            "prompts",
            "--model",
            "openai",
            "--num-prompts",
            "11",
            "--topic",
            "t",
            "--persona",
            "founder",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("num_prompts must be between 1 and 10"));
    Ok(())
}

#[test]
fn unknown_evaluator_flag_fails_fast() -> Result<()> {
    let home = tempdir()?;
    geointel(&home)
        .args(["--evaluator", "claude", "content", "--topic", "t"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unsupported LLM provider: claude"));
    Ok(())
}

#[test]
fn report_without_models_is_empty() -> Result<()> {
    let home = tempdir()?;
    let input = home.path().join("report.json");
    std::fs::write(
        &input,
        json!({"brand": "Acme Corp", "prompts": ["What matters?"], "models": []}).to_string(),
    )?;

    let assert = geointel(&home)
        .arg("report")
        .arg("--input")
        .arg(&input)
        .assert()
        .success();
    let stdout = String::from_utf8(assert.get_output().stdout.clone())?;
    let report: Value = serde_json::from_str(&stdout)?;
    assert_eq!(report, json!({"per_model": {}, "combined": {}}));
    Ok(())
}

#[test]
fn unresolvable_domain_is_rejected() -> Result<()> {
    let home = tempdir()?;
    let assert = geointel(&home)
        .args([
            "verify-company",
            "http://this-domain-does-not-exist-xyz123.invalid",
        ])
        .assert()
        .success();
    let stdout = String::from_utf8(assert.get_output().stdout.clone())?;
    let verdict: Value = serde_json::from_str(&stdout)?;
    assert_eq!(
        verdict,
        json!({"valid": false, "reason": "Domain does not resolve"})
    );
    Ok(())
}

#[test]
fn config_file_overrides_defaults() -> Result<()> {
    let home = tempdir()?;
    let config = home.path().join("geointel.yaml");
    std::fs::write(
        &config,
        concat!(
            "providers:\n  local:\n    kind: openai\n    model: gpt-4o-mini\n",
            "discovery:\n  provider: local\n",
            "analysis:\n  evaluator: local\n",
            "content:\n  provider: local\n",
        ),
    )?;

    geointel(&home)
        .arg("--config")
        .arg(&config)
        .args(["prompts", "--model", "gemini", "--topic", "t", "--persona", "founder"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unsupported LLM provider: gemini"));
    Ok(())
}
