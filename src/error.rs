//! Setup failures.
//!
//! Every failure during setup is terminal for the viewing session: there is no
//! retry and nothing is rendered. The variants follow the three failure classes
//! a viewer can hit: the platform cannot give us a GPU context, the host page is
//! missing something we need, or an asset cannot be fetched or decoded.

use thiserror::Error;

pub type SetupResult<T> = Result<T, SetupError>;

#[derive(Error, Debug)]
pub enum SetupError {
    /// No suitable adapter / WebGL2 context.
    #[error("3D acceleration unavailable: {0}")]
    Unsupported(String),

    #[error("required page element `{0}` is missing")]
    MissingElement(&'static str),

    #[error("failed to load asset `{path}`: {source}")]
    Asset {
        path: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("could not create a rendering surface: {0}")]
    Surface(#[from] wgpu::CreateSurfaceError),

    #[error("could not open the GPU device: {0}")]
    Device(#[from] wgpu::RequestDeviceError),

    #[error("window creation failed: {0}")]
    Window(#[from] winit::error::OsError),

    /// Pipelines, targets or lookup textures could not be built.
    #[error("could not create GPU resources: {0:#}")]
    Resources(anyhow::Error),
}

impl SetupError {
    pub fn asset(path: &str, source: anyhow::Error) -> Self {
        SetupError::Asset {
            path: path.to_string(),
            source,
        }
    }

    /// Capability failures get a visible fallback message on the page.
    pub fn is_capability_failure(&self) -> bool {
        matches!(
            self,
            SetupError::Unsupported(_) | SetupError::Surface(_) | SetupError::Device(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn asset_error_names_the_path() {
        let err = SetupError::asset("bg.hdr", anyhow::anyhow!("404"));
        assert_eq!(err.to_string(), "failed to load asset `bg.hdr`: 404");
        assert!(!err.is_capability_failure());
    }

    #[test]
    fn unsupported_is_a_capability_failure() {
        assert!(SetupError::Unsupported("no adapter".into()).is_capability_failure());
        assert!(!SetupError::MissingElement("canvas").is_capability_failure());
    }
}
