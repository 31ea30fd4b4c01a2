//! Loading of external assets: the environment panorama and the model.
//!
//! Natively, paths are resolved against the asset root on disk. In the
//! browser they are fetched relative to the page origin.

pub mod gltf;
pub mod hdr;

use anyhow::Context as _;

#[cfg(target_arch = "wasm32")]
fn format_url(asset_root: &str, file_name: &str) -> anyhow::Result<reqwest::Url> {
    let window = web_sys::window().context("no global window")?;
    let origin = window
        .location()
        .origin()
        .map_err(|_| anyhow::anyhow!("page origin is not readable"))?;
    let base = reqwest::Url::parse(&format!("{}/{}/", origin, asset_root.trim_matches('/')))?;
    Ok(base.join(file_name)?)
}

/// Reads `file_name` below `asset_root` as raw bytes.
pub async fn load_binary(asset_root: &str, file_name: &str) -> anyhow::Result<Vec<u8>> {
    #[cfg(target_arch = "wasm32")]
    let data = {
        let url = format_url(asset_root, file_name)?;
        let response = reqwest::get(url.clone()).await?.error_for_status()?;
        response
            .bytes()
            .await
            .with_context(|| format!("reading body of {url}"))?
            .to_vec()
    };
    #[cfg(not(target_arch = "wasm32"))]
    let data = {
        let path = std::path::Path::new(asset_root).join(file_name);
        tokio::fs::read(&path)
            .await
            .with_context(|| format!("reading {}", path.display()))?
    };

    Ok(data)
}

/// Resolves `uri` relative to the directory of `base`, the way glTF external
/// references are specified.
pub fn sibling_path(base: &str, uri: &str) -> String {
    match base.rfind('/') {
        Some(slash) => format!("{}/{}", &base[..slash], uri),
        None => uri.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sibling_paths_keep_the_model_directory() {
        assert_eq!(sibling_path("models/duck.gltf", "duck0.bin"), "models/duck0.bin");
        assert_eq!(sibling_path("duck.gltf", "duck0.bin"), "duck0.bin");
    }

    #[cfg(not(target_arch = "wasm32"))]
    #[tokio::test]
    async fn missing_files_report_their_path() {
        let err = load_binary("does-not-exist", "bg.hdr").await.unwrap_err();
        assert!(format!("{err:#}").contains("bg.hdr"));
    }
}
