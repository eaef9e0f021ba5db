//! Build script: embeds version metadata at compile time.

use std::process::Command;

fn main() {
    // RECOVERY_VERSION from the environment wins (release builds); otherwise
    // use git describe.
    if let Ok(version) = std::env::var("RECOVERY_VERSION") {
        println!("cargo:rustc-env=RECOVERY_VERSION={version}");
    } else if let Ok(output) = Command::new("git")
        .args(["describe", "--tags", "--always", "--dirty"])
        .output()
        && output.status.success()
    {
        let version = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if !version.is_empty() {
            println!("cargo:rustc-env=RECOVERY_VERSION={version}");
        }
    }

    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-changed=.git/refs/");
    println!("cargo:rerun-if-env-changed=RECOVERY_VERSION");
}
