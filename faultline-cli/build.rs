// Build script: stamp the binary with a version derived from git tags.
//
// Falls back to CARGO_PKG_VERSION when git is unavailable or the build
// happens outside a checkout (e.g. from a packaged crate).

use std::process::Command;

fn main() {
    let version = git_version().unwrap_or_else(|| env!("CARGO_PKG_VERSION").to_string());

    println!("cargo:rustc-env=FAULTLINE_VERSION={}", version);
    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-changed=.git/refs/heads");
    println!("cargo:rerun-if-changed=.git/refs/tags");
}

/// Map `git describe` output onto a version string
///
/// - `v0.3.0` -> `0.3.0`
/// - `v0.3.0-4-gabc123[-dirty]` -> `0.3.0`
/// - `abc123[-dirty]` -> `<pkg version>-abc123[-dirty]`
fn git_version() -> Option<String> {
    let output = Command::new("git")
        .args(["describe", "--tags", "--always", "--dirty"])
        .output()
        .ok()?;

    if !output.status.success() {
        return None;
    }

    let described = String::from_utf8(output.stdout).ok()?;
    let described = described.trim();

    if let Some(tagged) = described.strip_prefix('v') {
        let base = tagged.split('-').next().unwrap_or(tagged);
        return Some(base.to_string());
    }

    Some(format!("{}-{}", env!("CARGO_PKG_VERSION"), described))
}
