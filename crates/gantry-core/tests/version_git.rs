use std::fs;

use git2::{IndexAddOption, Repository, Signature};
use tempfile::TempDir;

use gantry_core::archive::version;

fn signature() -> Signature<'static> {
    Signature::now("tester", "tester@example.com").unwrap()
}

fn commit_all(repo: &Repository, message: &str) -> git2::Oid {
    let mut index = repo.index().unwrap();
    index
        .add_all(["*"].iter(), IndexAddOption::DEFAULT, None)
        .unwrap();
    index.write().unwrap();
    let tree_id = index.write_tree().unwrap();
    let tree = repo.find_tree(tree_id).unwrap();

    let sig = signature();
    match repo.head() {
        Ok(head) => {
            let parent = repo.find_commit(head.target().unwrap()).unwrap();
            repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &[&parent])
                .unwrap()
        }
        Err(_) => repo
            .commit(Some("HEAD"), &sig, &sig, message, &tree, &[])
            .unwrap(),
    }
}

#[test]
fn version_counts_commits_on_the_current_branch() {
    let temp = TempDir::new().unwrap();
    let repo = Repository::init(temp.path()).unwrap();
    fs::write(temp.path().join("settings.py"), "x = 1\n").unwrap();
    commit_all(&repo, "first");
    fs::write(temp.path().join("items.py"), "y = 2\n").unwrap();
    commit_all(&repo, "second");

    let branch = repo.head().unwrap().shorthand().unwrap().to_string();
    let derived = version::derive(temp.path(), None);

    assert_eq!(derived, format!("r2-{branch}"));
}

#[test]
fn tag_wins_over_commit_count() {
    let temp = TempDir::new().unwrap();
    let repo = Repository::init(temp.path()).unwrap();
    fs::write(temp.path().join("settings.py"), "x = 1\n").unwrap();
    let oid = commit_all(&repo, "first");

    let object = repo.find_object(oid, None).unwrap();
    repo.tag_lightweight("v1.2.0", &object, false).unwrap();

    assert_eq!(version::derive(temp.path(), None), "v1.2.0");
}

#[test]
fn commits_after_a_tag_are_described_against_it() {
    let temp = TempDir::new().unwrap();
    let repo = Repository::init(temp.path()).unwrap();
    fs::write(temp.path().join("settings.py"), "x = 1\n").unwrap();
    let oid = commit_all(&repo, "first");
    let object = repo.find_object(oid, None).unwrap();
    repo.tag_lightweight("v1.2.0", &object, false).unwrap();

    fs::write(temp.path().join("items.py"), "y = 2\n").unwrap();
    commit_all(&repo, "second");

    let derived = version::derive(temp.path(), None);
    assert!(derived.starts_with("v1.2.0-1-g"), "got: {derived}");
}

#[test]
fn subdirectories_resolve_the_enclosing_repository() {
    let temp = TempDir::new().unwrap();
    let repo = Repository::init(temp.path()).unwrap();
    let nested = temp.path().join("spiders");
    fs::create_dir_all(&nested).unwrap();
    fs::write(nested.join("quotes.py"), "pass\n").unwrap();
    commit_all(&repo, "first");

    let branch = repo.head().unwrap().shorthand().unwrap().to_string();
    assert_eq!(version::derive(&nested, None), format!("r1-{branch}"));
}

#[test]
fn explicit_version_skips_the_repository() {
    let temp = TempDir::new().unwrap();
    let repo = Repository::init(temp.path()).unwrap();
    fs::write(temp.path().join("settings.py"), "x = 1\n").unwrap();
    commit_all(&repo, "first");

    assert_eq!(version::derive(temp.path(), Some("2024.07")), "2024.07");
}

#[test]
fn outside_any_repository_a_timestamp_is_used() {
    let temp = TempDir::new().unwrap();

    let derived = version::derive(temp.path(), None);

    assert_eq!(derived.len(), 14, "got: {derived}");
    assert!(derived.chars().all(|c| c.is_ascii_digit()));
}
