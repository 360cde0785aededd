use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn dqa_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("dqa");
    path
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let files_dir = root.join("files");
    fs::create_dir_all(&files_dir).unwrap();
    fs::write(
        files_dir.join("monitor.txt"),
        "The monitor weighs 5.4 kg without the stand. Panel size is 27 in with a resolution \
         of 1920 x 1080 px. The refresh rate is 144 hz. The stand allows tilt adjustment.",
    )
    .unwrap();
    fs::write(
        files_dir.join("speaker.txt"),
        "The speaker battery capacity is 4500 mah. Playback time is up to 12 hours at normal \
         volume. The enclosure is made of recycled plastic. Bluetooth range is about 10 m.",
    )
    .unwrap();
    fs::write(
        files_dir.join("specs.txt"),
        "Weight: 0.209 kg, width 12 cm",
    )
    .unwrap();

    let config_content = format!(
        r#"[storage]
db_path = "{root}/data/docqa.sqlite"
upload_dir = "{root}/data/uploads"

[chunking]
policy = "sentence"
target_words = 60
overlap_words = 5

[index]
backend = "semantic"

[retrieval]
top_k = 3
keyword_bonus = 0.05

[embedding]
provider = "hash"

[reader]
provider = "lexical"

[server]
bind = "127.0.0.1:7401"
"#,
        root = root.display()
    );

    let config_path = root.join("docqa.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_dqa(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = dqa_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run dqa binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();
    (stdout, stderr, success)
}

fn sample_path(tmp: &TempDir, name: &str) -> String {
    tmp.path().join("files").join(name).display().to_string()
}

#[test]
fn test_init_creates_database() {
    let (tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_dqa(&config_path, &["init"]);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("initialized"));
    assert!(tmp.path().join("data").join("docqa.sqlite").exists());
}

#[test]
fn test_init_idempotent() {
    let (_tmp, config_path) = setup_test_env();

    let (_, _, success1) = run_dqa(&config_path, &["init"]);
    assert!(success1, "First init failed");

    let (_, _, success2) = run_dqa(&config_path, &["init"]);
    assert!(success2, "Second init failed (not idempotent)");
}

#[test]
fn test_init_writes_starter_config() {
    let tmp = TempDir::new().unwrap();
    let config_path = tmp.path().join("fresh.toml");

    // Starter config uses relative paths, so pin the working directory
    // to the temp dir.
    let output = Command::new(dqa_binary())
        .current_dir(tmp.path())
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .arg("init")
        .output()
        .unwrap();
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "init failed: {}", stdout);
    assert!(stdout.contains("Wrote starter config"));
    assert!(config_path.exists());

    // Second init must not overwrite the existing config.
    let output = Command::new(dqa_binary())
        .current_dir(tmp.path())
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .arg("init")
        .output()
        .unwrap();
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(output.status.success());
    assert!(!stdout.contains("Wrote starter config"));
}

#[test]
fn test_add_and_ls() {
    let (tmp, config_path) = setup_test_env();

    run_dqa(&config_path, &["init"]);
    let monitor = sample_path(&tmp, "monitor.txt");
    let speaker = sample_path(&tmp, "speaker.txt");

    let (stdout, stderr, success) = run_dqa(&config_path, &["add", &monitor, &speaker]);
    assert!(success, "add failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("added 2 documents"));
    assert!(stdout.contains("ok"));

    let (stdout, _, success) = run_dqa(&config_path, &["ls"]);
    assert!(success);
    assert!(stdout.contains("monitor.txt"));
    assert!(stdout.contains("speaker.txt"));
}

#[test]
fn test_add_missing_file_fails() {
    let (tmp, config_path) = setup_test_env();

    run_dqa(&config_path, &["init"]);
    let missing = tmp.path().join("files").join("missing.txt");
    let (_, stderr, success) = run_dqa(&config_path, &["add", missing.to_str().unwrap()]);
    assert!(!success, "Adding a missing file should fail");
    assert!(
        stderr.contains("Failed to copy"),
        "Should report the copy failure, got: {}",
        stderr
    );
}

#[test]
fn test_ask_answers_from_corpus() {
    let (tmp, config_path) = setup_test_env();

    run_dqa(&config_path, &["init"]);
    let speaker = sample_path(&tmp, "speaker.txt");
    run_dqa(&config_path, &["add", &speaker]);

    let (stdout, stderr, success) =
        run_dqa(&config_path, &["ask", "what is the battery capacity?"]);
    assert!(success, "ask failed: stdout={}, stderr={}", stdout, stderr);
    assert!(
        stdout.contains("4500 mah"),
        "Expected the battery answer, got: {}",
        stdout
    );
    assert!(stdout.contains("Sources: chunk"));
}

#[test]
fn test_ask_numeric_fallback() {
    let (tmp, config_path) = setup_test_env();

    run_dqa(&config_path, &["init"]);
    let specs = sample_path(&tmp, "specs.txt");
    run_dqa(&config_path, &["add", &specs]);

    // Barely any keyword overlap, so the fused answer comes from the
    // numeric extractor with the override score.
    let (stdout, stderr, success) = run_dqa(&config_path, &["ask", "what is the weight?"]);
    assert!(success, "ask failed: stdout={}, stderr={}", stdout, stderr);
    assert!(
        stdout.contains("Answer: 0.209 kg"),
        "Expected the numeric span, got: {}",
        stdout
    );
    assert!(stdout.contains("Score: 0.950"));
}

#[test]
fn test_ask_json_output() {
    let (tmp, config_path) = setup_test_env();

    run_dqa(&config_path, &["init"]);
    let speaker = sample_path(&tmp, "speaker.txt");
    run_dqa(&config_path, &["add", &speaker]);

    let (stdout, _, success) = run_dqa(
        &config_path,
        &["ask", "what is the battery capacity?", "--json"],
    );
    assert!(success);

    let value: serde_json::Value =
        serde_json::from_str(&stdout).unwrap_or_else(|e| panic!("invalid JSON ({}): {}", e, stdout));
    assert!(value.get("qa_id").is_some());
    assert!(value["answer"].as_str().unwrap().contains("4500 mah"));
    assert!(!value["sources"].as_array().unwrap().is_empty());
}

#[test]
fn test_ask_empty_question_fails() {
    let (_tmp, config_path) = setup_test_env();

    run_dqa(&config_path, &["init"]);
    let (_, stderr, success) = run_dqa(&config_path, &["ask", "   "]);
    assert!(!success, "Blank question should fail");
    assert!(
        stderr.contains("Question must be provided"),
        "Should reject a blank question, got: {}",
        stderr
    );
}

#[test]
fn test_ask_with_no_documents() {
    let (_tmp, config_path) = setup_test_env();

    run_dqa(&config_path, &["init"]);
    let (stdout, _, success) = run_dqa(&config_path, &["ask", "what is the battery capacity?"]);
    assert!(success, "Empty corpus should not be an error");
    assert!(stdout.contains("No answer found."));
    assert!(stdout.contains("Score: 0.000"));
    assert!(stdout.contains("Sources: none"));
}

#[test]
fn test_ask_scoped_to_document() {
    let (tmp, config_path) = setup_test_env();

    run_dqa(&config_path, &["init"]);
    let monitor = sample_path(&tmp, "monitor.txt");
    let speaker = sample_path(&tmp, "speaker.txt");
    run_dqa(&config_path, &["add", &monitor, &speaker]);

    // Document 1 is monitor.txt; the speaker document must not be cited.
    let (stdout, _, success) = run_dqa(
        &config_path,
        &["ask", "how much does the monitor weigh?", "--doc", "1"],
    );
    assert!(success);
    assert!(
        stdout.contains("5.4 kg"),
        "Expected the weight answer, got: {}",
        stdout
    );
    assert!(!stdout.contains("4500 mah"));
}

#[test]
fn test_history_records_questions() {
    let (tmp, config_path) = setup_test_env();

    run_dqa(&config_path, &["init"]);
    let speaker = sample_path(&tmp, "speaker.txt");
    run_dqa(&config_path, &["add", &speaker]);

    run_dqa(&config_path, &["ask", "what is the battery capacity?"]);
    run_dqa(&config_path, &["ask", "how long is the playback time?"]);

    let (stdout, _, success) = run_dqa(&config_path, &["history"]);
    assert!(success);
    assert!(stdout.contains("what is the battery capacity?"));
    assert!(stdout.contains("how long is the playback time?"));

    // Newest first, limited.
    let (stdout, _, _) = run_dqa(&config_path, &["history", "--limit", "1"]);
    assert!(stdout.contains("how long is the playback time?"));
    assert!(!stdout.contains("what is the battery capacity?"));
}

#[test]
fn test_history_empty() {
    let (_tmp, config_path) = setup_test_env();

    run_dqa(&config_path, &["init"]);
    let (stdout, _, success) = run_dqa(&config_path, &["history"]);
    assert!(success);
    assert!(stdout.contains("No history."));
}

#[test]
fn test_rm_document() {
    let (tmp, config_path) = setup_test_env();

    run_dqa(&config_path, &["init"]);
    let monitor = sample_path(&tmp, "monitor.txt");
    run_dqa(&config_path, &["add", &monitor]);

    let (stdout, _, success) = run_dqa(&config_path, &["rm", "1"]);
    assert!(success);
    assert!(stdout.contains("removed document 1"));

    let (stdout, _, _) = run_dqa(&config_path, &["ls"]);
    assert!(stdout.contains("No documents."));
}

#[test]
fn test_rm_missing_document() {
    let (_tmp, config_path) = setup_test_env();

    run_dqa(&config_path, &["init"]);
    let (_, stderr, success) = run_dqa(&config_path, &["rm", "99"]);
    assert!(!success, "Removing a missing document should fail");
    assert!(
        stderr.contains("document not found"),
        "Should report not found, got: {}",
        stderr
    );
}

#[test]
fn test_export_creates_docx() {
    let (tmp, config_path) = setup_test_env();

    run_dqa(&config_path, &["init"]);
    let speaker = sample_path(&tmp, "speaker.txt");
    run_dqa(&config_path, &["add", &speaker]);
    run_dqa(&config_path, &["ask", "what is the battery capacity?"]);

    let out = tmp.path().join("answers.docx");
    let (_, stderr, success) = run_dqa(
        &config_path,
        &["export", "--ids", "1", "--out", out.to_str().unwrap()],
    );
    assert!(success, "export failed: {}", stderr);
    assert!(stderr.contains("Exported 1 records"));

    let bytes = fs::read(&out).unwrap();
    assert!(bytes.starts_with(b"PK"), "DOCX should be a zip archive");
}

#[test]
fn test_export_unknown_ids_fails() {
    let (_tmp, config_path) = setup_test_env();

    run_dqa(&config_path, &["init"]);
    let (_, stderr, success) = run_dqa(&config_path, &["export", "--ids", "9"]);
    assert!(!success, "Export with unknown ids should fail");
    assert!(
        stderr.contains("no history records"),
        "Should report missing records, got: {}",
        stderr
    );
}
