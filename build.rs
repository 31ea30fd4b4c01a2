use anyhow::*;
use fs_extra::copy_items;
use fs_extra::dir::CopyOptions;
use std::env;
use std::path::PathBuf;

fn main() -> Result<()> {
    // Rerun whenever the viewer's resources (HDR backgrounds, glb models) change.
    println!("cargo:rerun-if-changed=res/*");

    let out_dir = env::var("OUT_DIR")?;
    let mut copy_options = CopyOptions::new();
    copy_options.overwrite = true;
    let manifest_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR")?);
    let res_src = manifest_dir.join("res");
    if res_src.exists() {
        copy_items(&[res_src], out_dir, &copy_options)?;
    }

    Ok(())
}
