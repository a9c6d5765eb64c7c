// Build script for crashreplay - reports whether the target can replay against real mounts

fn main() {
    let target_os = std::env::var("CARGO_CFG_TARGET_OS").unwrap_or_default();

    // mount(2), umount2(2) and the xattr primitives are Linux-only
    if target_os != "linux" {
        println!("cargo:warning=crashreplay build configuration:");
        println!("cargo:warning=  - Target OS: {}", target_os);
        println!("cargo:warning=  - Mount replay: unsupported (mount/umount2 are Linux-only)");
        println!("cargo:warning=  - Extended attributes: unsupported (operations report ENOTSUP)");
    }

    println!("cargo:rerun-if-changed=build.rs");
}
