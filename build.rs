use std::{env, fs, path::PathBuf};

fn main() {
    built::write_built_file()
        .expect("Failed to acquire build-time information");

    // Linker memory layout for the RP2040 with a 2 MB QSPI flash.
    if env::var("CARGO_CFG_TARGET_OS").as_deref() == Ok("none") {
        let out = PathBuf::from(env::var_os("OUT_DIR").unwrap());
        fs::copy("memory.x", out.join("memory.x")).unwrap();
        println!("cargo:rustc-link-search={}", out.display());
    }
    println!("cargo:rerun-if-changed=memory.x");
}
