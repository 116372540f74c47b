use std::fs;

// Keeps the release VERSION file and the package version in step.
fn main() {
    let version = match fs::read_to_string("VERSION") {
        Ok(contents) => contents.trim().to_string(),
        Err(e) => panic!("VERSION file unreadable ({}): run `echo 0.3.0 > VERSION`", e),
    };

    let cargo_version = env!("CARGO_PKG_VERSION");
    if version != cargo_version {
        panic!(
            "\n\nVERSION mismatch: VERSION file says {}, Cargo.toml says {}\n\n",
            version, cargo_version
        );
    }

    println!("cargo:rerun-if-changed=VERSION");
}
