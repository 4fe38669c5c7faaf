//! Build script for tagsync
//!
//! Embeds the identification logged on the first line of every run log:
//! - `GIT_HASH`: short commit hash, `-dirty` when tracked files are modified
//! - `BUILD_TIMESTAMP`: UTC time the script last ran
//! - `BUILD_PROFILE`: debug/release
//!
//! The script reruns only when the checked-out commit moves, so incremental
//! builds of the reconciler do not relink the binary just to refresh the stamp.

use std::process::Command;

fn git(args: &[&str]) -> Option<String> {
    let output = Command::new("git").args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    String::from_utf8(output.stdout)
        .ok()
        .map(|s| s.trim().to_string())
}

fn rerun_on_commit_change() {
    println!("cargo:rerun-if-changed=build.rs");

    let Some(git_dir) = git(&["rev-parse", "--git-dir"]) else {
        return;
    };
    println!("cargo:rerun-if-changed={}/HEAD", git_dir);
    println!("cargo:rerun-if-changed={}/index", git_dir);
    if let Some(branch_ref) = git(&["symbolic-ref", "-q", "HEAD"]) {
        println!("cargo:rerun-if-changed={}/{}", git_dir, branch_ref);
    }
}

fn main() {
    rerun_on_commit_change();

    let git_hash = match git(&["rev-parse", "--short=8", "HEAD"]) {
        Some(hash) => {
            let dirty = git(&["status", "--porcelain", "--untracked-files=no"])
                .map(|status| !status.is_empty())
                .unwrap_or(false);
            if dirty {
                format!("{}-dirty", hash)
            } else {
                hash
            }
        }
        None => "unknown".to_string(),
    };

    let build_timestamp = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true);
    let profile = std::env::var("PROFILE").unwrap_or_else(|_| "unknown".to_string());

    println!("cargo:rustc-env=GIT_HASH={}", git_hash);
    println!("cargo:rustc-env=BUILD_TIMESTAMP={}", build_timestamp);
    println!("cargo:rustc-env=BUILD_PROFILE={}", profile);
}
