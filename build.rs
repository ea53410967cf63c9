use std::process::Command;

fn main() {
    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-env-changed=HARBORTUI_BUILD_ID");

    println!(
        "cargo:rustc-env=BUILD_TIMESTAMP={}",
        chrono::Utc::now().format("%Y-%m-%d %H:%M UTC")
    );

    // Release pipelines without a git checkout pass the revision in.
    let revision = std::env::var("HARBORTUI_BUILD_ID").ok().or_else(git_revision);
    if let Some(revision) = revision {
        println!("cargo:rustc-env=GIT_HASH={revision}");
    }
}

fn git_revision() -> Option<String> {
    let output = Command::new("git")
        .args(["rev-parse", "--short", "HEAD"])
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let hash = String::from_utf8_lossy(&output.stdout).trim().to_string();
    (!hash.is_empty()).then_some(hash)
}
