use std::env;
use std::path::PathBuf;

fn main() {
    let out_dir = PathBuf::from(env::var("OUT_DIR").unwrap());
    match xdp_programs::compile(&out_dir) {
        Ok(path) => {
            println!("cargo:rustc-env=XDP_REDIRECT_PROGRAM_O={}", path.display());
        }
        Err(e) => {
            // clang is not always available in a build environment (CI images
            // without the BPF toolchain); fall back to a zero-length blob and
            // let callers that actually load the program fail at runtime with
            // BpfLoadFailed rather than breaking every build of this crate.
            println!("cargo:warning=xdp-redirect filter not compiled: {e}");
            let placeholder = out_dir.join("xdp_redirect.o");
            std::fs::write(&placeholder, []).expect("write placeholder object");
            println!(
                "cargo:rustc-env=XDP_REDIRECT_PROGRAM_O={}",
                placeholder.display()
            );
        }
    }
    println!("cargo:rerun-if-changed={}", xdp_programs::source_path().display());
}
