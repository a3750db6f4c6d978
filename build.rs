fn main() {
    // The editor page under frontend/dist is embedded with include_dir!,
    // which cargo does not see as an input. Rebuild when it changes.
    println!("cargo:rerun-if-changed=frontend/dist");
}
