fn main() {
    #[cfg(feature = "blas")]
    {
        // The CBLAS symbols for the `blas` backend come from the system OpenBLAS.
        // On macOS: brew install openblas
        // On Ubuntu: apt install libopenblas-dev
        println!("cargo:rerun-if-env-changed=OPENBLAS_LIB_DIR");
        if let Ok(lib_dir) = std::env::var("OPENBLAS_LIB_DIR") {
            println!("cargo:rustc-link-search=native={}", lib_dir);
        } else if cfg!(target_os = "macos") {
            println!("cargo:rustc-link-search=native=/opt/homebrew/opt/openblas/lib");
            println!("cargo:rustc-link-search=native=/usr/local/opt/openblas/lib");
        }
        println!("cargo:rustc-link-lib=openblas");
    }
}
