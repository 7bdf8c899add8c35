// build.rs

use chrono::Utc;
use std::env;
use std::fs;
use std::path::PathBuf;

fn main() {
    let out_dir = PathBuf::from(env::var("OUT_DIR").expect("cargo sets OUT_DIR"));

    // both binaries log this at start-up
    let stamp = Utc::now().format("%Y-%m-%d %H:%M:%S UTC");
    fs::write(
        out_dir.join("build_info.rs"),
        format!("pub const BUILD_DATE: &str = \"{stamp}\";\n"),
    )
    .expect("cannot write build_info.rs");

    println!("cargo:rerun-if-changed=build.rs");
}
