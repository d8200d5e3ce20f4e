use crate::common::file::{FileSpec, write_file};
use assert_cmd::Command;
use assert_fs::TempDir;
use derive_new::new;
use rstest::fixture;
use std::collections::BTreeSet;
use std::path::Path;

pub const DEFAULT_BRANCH: &str = "main";

#[fixture]
pub fn repository_dir() -> TempDir {
    TempDir::new().expect("Failed to create temp dir")
}

/// A repository whose HEAD points at a branch with no commits yet
#[fixture]
pub fn empty_repository_dir(repository_dir: TempDir) -> TempDir {
    run_git_command(repository_dir.path(), &["init", "-b", DEFAULT_BRANCH])
        .assert()
        .success();

    repository_dir
}

/// A repository with one commit of three files in nested directories
#[fixture]
pub fn init_repository_dir(empty_repository_dir: TempDir) -> TempDir {
    let dir = empty_repository_dir.path();

    write_file(FileSpec::new(dir.join("1.txt"), "one".to_string()));
    write_file(FileSpec::new(dir.join("a").join("2.txt"), "two".to_string()));
    write_file(FileSpec::new(
        dir.join("a").join("b").join("3.txt"),
        "three".to_string(),
    ));

    run_git_command(dir, &["add", "."]).assert().success();
    git_commit(dir, "Initial commit").assert().success();

    empty_repository_dir
}

pub fn run_dotgit_command(dir: &Path, args: &[&str]) -> Command {
    let mut cmd = Command::cargo_bin("dotgit").expect("Failed to find dotgit binary");
    cmd.env("RUST_LOG", "warn");
    cmd.current_dir(dir);
    for arg in args {
        cmd.arg(arg);
    }
    cmd
}

pub fn run_git_command(dir: &Path, args: &[&str]) -> Command {
    let mut cmd = Command::new("git");
    cmd.current_dir(dir);
    cmd.envs(vec![
        ("GIT_CONFIG_NOSYSTEM", "1"),
        ("GIT_CONFIG_GLOBAL", "/dev/null"),
    ]);
    for arg in args {
        cmd.arg(arg);
    }
    cmd
}

#[derive(Debug, Clone, new)]
struct RandomAuthor {
    name: String,
    email: String,
}

fn generate_random_author() -> RandomAuthor {
    use fake::Fake;
    use fake::faker::internet::en::FreeEmail;
    use fake::faker::name::en::Name;

    let name = Name().fake::<String>().replace(" ", "_");
    let email = FreeEmail().fake::<String>();
    RandomAuthor::new(name, email)
}

pub fn git_commit(dir: &Path, message: &str) -> Command {
    let author = generate_random_author();
    let mut cmd = run_git_command(dir, &["commit", "-q", "-m", message]);
    cmd.envs(vec![
        ("GIT_AUTHOR_NAME", author.name.as_str()),
        ("GIT_AUTHOR_EMAIL", author.email.as_str()),
        ("GIT_COMMITTER_NAME", author.name.as_str()),
        ("GIT_COMMITTER_EMAIL", author.email.as_str()),
    ]);
    cmd
}

/// Trimmed stdout of a git command that must succeed
pub fn git_output(dir: &Path, args: &[&str]) -> String {
    let output = run_git_command(dir, args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run git {:?}: {}", args, e));
    assert!(output.status.success(), "git {:?} failed", args);

    String::from_utf8(output.stdout)
        .expect("git output is not UTF-8")
        .trim()
        .to_string()
}

/// Graph output of a one-shot run, which must succeed
pub fn dump_graph(dir: &Path, args: &[&str]) -> String {
    let output = run_dotgit_command(dir, args)
        .output()
        .expect("Failed to run dotgit");
    assert!(
        output.status.success(),
        "dotgit failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    String::from_utf8(output.stdout).expect("dotgit output is not UTF-8")
}

/// Statements between the digraph header and trailer, order-insensitive
pub fn statements(graph: &str) -> BTreeSet<String> {
    let lines = graph.lines().collect::<Vec<_>>();
    assert_eq!(lines.first(), Some(&"digraph G {"));
    assert_eq!(lines.last(), Some(&"}"));

    lines[1..lines.len() - 1]
        .iter()
        .map(|line| line.to_string())
        .collect()
}

/// Labels of every declared node
pub fn node_labels(graph: &str) -> Vec<String> {
    statements(graph)
        .iter()
        .filter(|line| !line.contains(" -> "))
        .filter_map(|line| line.split('"').nth(1).map(str::to_string))
        .collect()
}
