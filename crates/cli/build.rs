use std::process::Command;

fn main() {
    // Commit count, when built from a git checkout
    let commit_count = Command::new("git")
        .args(["rev-list", "--count", "HEAD"])
        .output()
        .ok()
        .filter(|o| o.status.success())
        .map(|o| String::from_utf8_lossy(&o.stdout).trim().to_string())
        .unwrap_or_else(|| "0".to_string());

    // Generate version: PKG_VERSION+COMMITCOUNT
    let version = format!("{}+{}", env!("CARGO_PKG_VERSION"), commit_count);

    println!("cargo:rustc-env=FILINGS_VERSION={}", version);
    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-changed=.git/refs/heads/");
}
