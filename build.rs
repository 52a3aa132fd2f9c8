// Stamps ORCHESTRATOR_VERSION into the binary. Release pipelines may set
// ORCHESTRATOR_PATCH_VERSION to replace the patch segment with a build number.

use std::env;

fn main() {
    let version = env::var("CARGO_PKG_VERSION").expect("CARGO_PKG_VERSION not set");

    let Some((major_minor, patch)) = version.rsplit_once('.') else {
        panic!("Cargo.toml version must be MAJOR.MINOR.PATCH, got {}", version);
    };

    let patch = match env::var("ORCHESTRATOR_PATCH_VERSION") {
        Ok(build) if !build.trim().is_empty() => {
            let build = build.trim().to_string();
            if build.parse::<u32>().is_err() {
                panic!("ORCHESTRATOR_PATCH_VERSION must be numeric, got {}", build);
            }
            build
        }
        _ => patch.to_string(),
    };

    println!("cargo:rustc-env=ORCHESTRATOR_VERSION={}.{}", major_minor, patch);
    println!("cargo:rerun-if-changed=Cargo.toml");
    println!("cargo:rerun-if-env-changed=ORCHESTRATOR_PATCH_VERSION");
}
