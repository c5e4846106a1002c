use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Кладёт config.toml рядом с бинарником (target/<profile>/), где его ищет load_config
fn main() {
    println!("cargo:rerun-if-changed=../../config.toml");

    let manifest_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR").unwrap());
    let source = manifest_dir.join("../../config.toml");
    if !source.exists() {
        println!("cargo:warning=config.toml not found, backend will use built-in defaults");
        return;
    }

    let out_dir = env::var("OUT_DIR").unwrap();
    let profile = env::var("PROFILE").unwrap();
    let Some(target_dir) = Path::new(&out_dir).ancestors().find(|p| p.ends_with(&profile)) else {
        println!("cargo:warning=target/{profile} not found, config.toml not copied");
        return;
    };

    let dest = target_dir.join("config.toml");
    fs::copy(&source, &dest).unwrap_or_else(|e| panic!("Failed to copy config.toml: {e}"));
}
