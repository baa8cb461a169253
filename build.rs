//! Build script: embeds the build version into the binary.

use std::process::Command;

fn main() {
    // Prefer MACPROV_VERSION if set (release builds), otherwise git describe.
    if let Ok(version) = std::env::var("MACPROV_VERSION") {
        println!("cargo:rustc-env=MACPROV_VERSION={version}");
    } else if let Ok(output) = Command::new("git")
        .args(["describe", "--tags", "--always", "--dirty"])
        .output()
        && output.status.success()
    {
        let version = String::from_utf8_lossy(&output.stdout).trim().to_string();
        println!("cargo:rustc-env=MACPROV_VERSION={version}");
    }

    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-changed=.git/refs/");
    println!("cargo:rerun-if-env-changed=MACPROV_VERSION");
}
