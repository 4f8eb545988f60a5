use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn dig_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("dig");
    path
}

fn git_available() -> bool {
    Command::new("git")
        .arg("--version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

fn git(dir: &Path, args: &[&str]) {
    let status = Command::new("git")
        .args([
            "-c",
            "user.name=Ada",
            "-c",
            "user.email=ada@example.com",
            "-c",
            "commit.gpgsign=false",
        ])
        .args(args)
        .current_dir(dir)
        .status()
        .unwrap();
    assert!(status.success(), "git {:?} failed", args);
}

/// A repository with two source files and a config that disables synthesis.
fn setup_test_env() -> (TempDir, PathBuf, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let repo = root.join("repo");
    fs::create_dir_all(repo.join("src")).unwrap();
    git(&repo, &["init", "-q"]);
    fs::write(
        repo.join("src/server.ts"),
        "import { route } from './routes';\n\nexport class Server {\n  start() { if (this.ready) { route(); } }\n}\n",
    )
    .unwrap();
    fs::write(
        repo.join("src/routes.ts"),
        "// request routing\nexport function route() {\n  return true;\n}\n",
    )
    .unwrap();
    fs::write(repo.join("notes.txt"), "not source\n").unwrap();
    git(&repo, &["add", "."]);
    git(&repo, &["commit", "-q", "-m", "Initial server"]);

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();
    let config_path = config_dir.join("dig.toml");
    fs::write(
        &config_path,
        r#"[excavation]
max_files = 10
request_interval_ms = 0

[synthesis]
provider = "disabled"
"#,
    )
    .unwrap();

    (tmp, config_path, repo)
}

fn run_dig(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = dig_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run dig binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

#[test]
fn test_classify_needs_no_config() {
    let (stdout, stderr, ok) = run_dig(
        Path::new("/nonexistent/dig.toml"),
        &["classify", "src/app.tsx", "node_modules/x/index.js", "README.md"],
    );
    assert!(ok, "classify failed: {}", stderr);
    assert!(stdout.contains("typescript"));
    let ignored_line = stdout.lines().find(|l| l.starts_with("node_modules")).unwrap();
    assert!(ignored_line.trim_end().ends_with("yes"));
}

#[test]
fn test_excavate_writes_report() {
    if !git_available() {
        eprintln!("git not installed, skipping");
        return;
    }
    let (tmp, config, repo) = setup_test_env();
    let out = tmp.path().join("out/report.json");

    let (_, stderr, ok) = run_dig(
        &config,
        &[
            "excavate",
            repo.to_str().unwrap(),
            "--skip-analysis",
            "--progress",
            "off",
            "--output",
            out.to_str().unwrap(),
        ],
    );
    assert!(ok, "excavate failed: {}", stderr);

    let report: serde_json::Value = serde_json::from_str(&fs::read_to_string(&out).unwrap()).unwrap();
    assert_eq!(report["modelUsed"], "none");
    assert_eq!(report["stats"]["totalFiles"], 2);
    assert_eq!(report["stats"]["totalCommits"], 1);
    assert_eq!(report["files"].as_array().unwrap().len(), 2);
    let edges = report["graph"]["edges"].as_array().unwrap();
    assert!(edges.iter().any(|e| e["relationship"] == "imports"
        && e["source"] == "file:src/server.ts"
        && e["target"] == "file:src/routes.ts"));
}

#[test]
fn test_excavate_stdout_and_json_progress() {
    if !git_available() {
        eprintln!("git not installed, skipping");
        return;
    }
    let (_tmp, config, repo) = setup_test_env();

    let (stdout, stderr, ok) = run_dig(
        &config,
        &[
            "excavate",
            repo.to_str().unwrap(),
            "--skip-analysis",
            "--progress",
            "json",
            "--select",
            "src/routes.ts",
        ],
    );
    assert!(ok, "excavate failed: {}", stderr);

    let report: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    let files = report["files"].as_array().unwrap();
    assert_eq!(files.len(), 1);
    assert_eq!(files[0]["path"], "src/routes.ts");

    let events: Vec<serde_json::Value> = stderr
        .lines()
        .filter_map(|l| serde_json::from_str(l).ok())
        .collect();
    assert!(events.iter().any(|e| e["percent"] == 100));
}

#[test]
fn test_stats_and_files_commands() {
    if !git_available() {
        eprintln!("git not installed, skipping");
        return;
    }
    let (_tmp, config, repo) = setup_test_env();

    let (stdout, stderr, ok) = run_dig(&config, &["stats", repo.to_str().unwrap()]);
    assert!(ok, "stats failed: {}", stderr);
    assert!(stdout.contains("Commits:     1"));
    assert!(stdout.contains("Ada"));

    let (stdout, stderr, ok) = run_dig(&config, &["files", repo.to_str().unwrap()]);
    assert!(ok, "files failed: {}", stderr);
    assert!(stdout.contains("src/server.ts"));
    assert!(stdout.contains("src/routes.ts"));
    assert!(!stdout.contains("notes.txt"));
}

#[test]
fn test_excavate_rejects_non_repository() {
    let tmp = TempDir::new().unwrap();
    let (_, stderr, ok) = run_dig(
        &tmp.path().join("missing.toml"),
        &[
            "excavate",
            tmp.path().to_str().unwrap(),
            "--skip-analysis",
            "--progress",
            "off",
        ],
    );
    assert!(!ok);
    assert!(stderr.contains("not a git repository"));
}

#[test]
fn test_invalid_config_is_reported() {
    let tmp = TempDir::new().unwrap();
    let config = tmp.path().join("dig.toml");
    fs::write(&config, "[synthesis]\nprovider = \"mystery\"\n").unwrap();

    let (_, stderr, ok) = run_dig(&config, &["stats", tmp.path().to_str().unwrap()]);
    assert!(!ok);
    assert!(stderr.contains("Unknown synthesis provider"));
}
