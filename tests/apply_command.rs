#![allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::indexing_slicing,
    clippy::panic
)]
//! Integration tests for applying a source state to a destination.
//!
//! These tests drive [`SourceState::apply_all`] through the live system and
//! observe second runs through a [`CanarySystem`] to check idempotence.

mod common;

use std::path::Path;

use chezmoi_cli::cli::TargetOpts;
use chezmoi_cli::commands;
use chezmoi_cli::format::FormatRegistry;
use chezmoi_cli::include::IncludeSet;
use chezmoi_cli::logging::Logger;
use chezmoi_cli::persistent::{PersistentState, SCRIPT_BUCKET, SqlitePersistentState};
use chezmoi_cli::state::{ApplyOptions, sha256};
use chezmoi_cli::system::{CanarySystem, RealSystem};

use common::{IntegrationTestContext, TestContextBuilder};

fn real_system(ctx: &IntegrationTestContext) -> RealSystem {
    let db = ctx.root.path().join("chezmoistate.db");
    RealSystem::new(Box::new(SqlitePersistentState::open(&db).unwrap()))
        .with_work_dir(ctx.dest_dir())
}

fn apply(ctx: &IntegrationTestContext) -> Vec<String> {
    let system = real_system(ctx);
    let formats = FormatRegistry::with_defaults();
    let state = ctx.read_state(&system, &formats);
    let canary = CanarySystem::new(&system);
    state
        .apply_all(&canary, &ctx.dest_dir(), &ApplyOptions::default())
        .unwrap();
    canary.mutations()
}

#[cfg(unix)]
fn perm(path: &Path) -> u32 {
    use std::os::unix::fs::PermissionsExt as _;
    std::fs::symlink_metadata(path).unwrap().permissions().mode() & 0o777
}

// ---------------------------------------------------------------------------
// End-to-end
// ---------------------------------------------------------------------------

#[cfg(unix)]
#[test]
fn first_apply_builds_tree_and_second_apply_is_silent() {
    let ctx = TestContextBuilder::new()
        .with_source_file("dot_bashrc", "X")
        .with_source_file("private_dot_ssh/config", "Y")
        .with_source_file("run_once_install.sh", "echo hi >> ran.txt\n")
        .build();

    let first = apply(&ctx);
    assert_eq!(
        first.iter().filter(|m| m.starts_with("run_script")).count(),
        1
    );
    assert_eq!(ctx.read_dest(".bashrc"), "X");
    assert_eq!(ctx.read_dest(".ssh/config"), "Y");
    assert_eq!(perm(&ctx.dest_path(".ssh")), 0o700);
    assert_eq!(perm(&ctx.dest_path(".bashrc")) & 0o044, 0o044);
    assert_eq!(ctx.read_dest("ran.txt"), "hi\n");

    let second = apply(&ctx);
    assert!(second.is_empty(), "unexpected mutations: {second:?}");
    assert_eq!(ctx.read_dest("ran.txt"), "hi\n");
}

#[cfg(unix)]
#[test]
fn once_script_hash_is_recorded() {
    let ctx = TestContextBuilder::new()
        .with_source_file("run_once_setup.sh", "true\n")
        .build();
    apply(&ctx);
    let db = SqlitePersistentState::open(&ctx.root.path().join("chezmoistate.db")).unwrap();
    assert_eq!(
        db.get(SCRIPT_BUCKET, b"setup.sh").unwrap(),
        Some(sha256(b"true\n"))
    );
}

#[cfg(unix)]
#[test]
fn changed_once_script_runs_again() {
    let ctx = TestContextBuilder::new()
        .with_source_file("run_once_setup.sh", "echo 1 >> log\n")
        .build();
    apply(&ctx);
    std::fs::write(
        ctx.source_dir().join("run_once_setup.sh"),
        "echo 2 >> log\n",
    )
    .unwrap();
    apply(&ctx);
    apply(&ctx);
    assert_eq!(ctx.read_dest("log"), "1\n2\n");
}

// ---------------------------------------------------------------------------
// Reconciliation details
// ---------------------------------------------------------------------------

#[test]
fn modified_destination_file_is_restored() {
    let ctx = TestContextBuilder::new()
        .with_source_file("dot_profile", "managed\n")
        .with_dest_file(".profile", "edited\n")
        .build();
    let mutations = apply(&ctx);
    assert_eq!(mutations.len(), 1, "{mutations:?}");
    assert_eq!(ctx.read_dest(".profile"), "managed\n");
}

#[test]
fn exact_directory_prunes_untracked_entries() {
    let ctx = TestContextBuilder::new()
        .with_source_file("exact_dot_config/a", "a")
        .with_source_file("exact_dot_config/b", "b")
        .with_dest_file(".config/a", "a")
        .with_dest_file(".config/b", "b")
        .with_dest_file(".config/c", "c")
        .with_dest_file(".config/sub/d", "d")
        .build();
    apply(&ctx);
    assert!(ctx.dest_path(".config/a").exists());
    assert!(ctx.dest_path(".config/b").exists());
    assert!(!ctx.dest_path(".config/c").exists());
    assert!(!ctx.dest_path(".config/sub").exists());
}

#[test]
fn ignored_children_survive_exact_directory() {
    let ctx = TestContextBuilder::new()
        .with_source_file(".chezmoiignore", ".config/keep\n")
        .with_source_file("exact_dot_config/a", "a")
        .with_dest_file(".config/keep", "k")
        .with_dest_file(".config/drop", "d")
        .build();
    apply(&ctx);
    assert!(ctx.dest_path(".config/keep").exists());
    assert!(!ctx.dest_path(".config/drop").exists());
}

#[test]
fn empty_source_file_removes_destination() {
    let ctx = TestContextBuilder::new()
        .with_source_file("dot_obsolete", "")
        .with_dest_file(".obsolete", "old")
        .build();
    apply(&ctx);
    assert!(!ctx.dest_path(".obsolete").exists());
}

#[cfg(unix)]
#[test]
fn symlinks_are_created_and_kept() {
    let ctx = TestContextBuilder::new()
        .with_source_file("symlink_dot_vimrc", ".config/nvim/init.vim\n")
        .build();
    apply(&ctx);
    assert_eq!(
        std::fs::read_link(ctx.dest_path(".vimrc")).unwrap(),
        Path::new(".config/nvim/init.vim")
    );
    assert!(apply(&ctx).is_empty());
}

#[test]
fn file_replaces_directory_of_the_same_name() {
    let ctx = TestContextBuilder::new()
        .with_source_file("dot_tool", "now a file")
        .with_dest_file(".tool/inner", "x")
        .build();
    apply(&ctx);
    assert_eq!(ctx.read_dest(".tool"), "now a file");
}

// ---------------------------------------------------------------------------
// Command surface
// ---------------------------------------------------------------------------

fn target_opts(targets: Vec<std::path::PathBuf>) -> TargetOpts {
    TargetOpts {
        targets,
        include: IncludeSet::ALL,
        recursive: true,
    }
}

#[test]
fn dry_run_leaves_destination_untouched() {
    let ctx = TestContextBuilder::new()
        .with_source_file("dot_bashrc", "X")
        .build();
    let mut global = ctx.global_opts();
    global.dry_run = true;
    commands::apply::run(&global, &target_opts(Vec::new()), &Logger::new("test")).unwrap();
    assert!(!ctx.dest_path(".bashrc").exists());
}

#[test]
fn apply_selected_targets_only() {
    let ctx = TestContextBuilder::new()
        .with_source_file("dot_a", "a")
        .with_source_file("dot_b", "b")
        .build();
    commands::apply::run(
        &ctx.global_opts(),
        &target_opts(vec![ctx.dest_path(".a")]),
        &Logger::new("test"),
    )
    .unwrap();
    assert!(ctx.dest_path(".a").exists());
    assert!(!ctx.dest_path(".b").exists());
}

#[test]
fn remove_flag_deletes_listed_targets() {
    let ctx = TestContextBuilder::new()
        .with_source_file(".chezmoiremove", ".old*\n!.old-keep\n")
        .with_dest_file(".oldrc", "x")
        .with_dest_file(".old-keep", "x")
        .build();
    let mut global = ctx.global_opts();
    global.remove = true;
    commands::apply::run(&global, &target_opts(Vec::new()), &Logger::new("test")).unwrap();
    assert!(!ctx.dest_path(".oldrc").exists());
    assert!(ctx.dest_path(".old-keep").exists());
}

#[test]
fn config_data_reaches_templates() {
    let ctx = TestContextBuilder::new()
        .with_source_file("dot_gitconfig.tmpl", "email = {{ email }}\n")
        .with_config("[data]\nemail = \"me@example.com\"\n")
        .build();
    commands::apply::run(
        &ctx.global_opts(),
        &target_opts(Vec::new()),
        &Logger::new("test"),
    )
    .unwrap();
    assert_eq!(ctx.read_dest(".gitconfig"), "email = me@example.com\n");
}
