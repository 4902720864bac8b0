// Renderer error taxonomy
//
// Setup errors are fatal at startup; any non-success Vulkan result that is
// not a transient swapchain condition is fatal at runtime. Transient
// staleness never appears here - it is absorbed by the frame scheduler.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Vulkan error: {0}")]
    Vulkan(#[from] ash::vk::Result),

    #[error("failed to load Vulkan library: {0}")]
    Loading(#[from] ash::LoadingError),

    #[error("no suitable GPU found")]
    NoSuitableGpu,

    #[error("surface unsupported: {0}")]
    UnsupportedSurface(&'static str),

    #[error("failed to load shader {path}: {source}")]
    ShaderLoad {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("shader {0} is not valid SPIR-V (size not a multiple of 4)")]
    ShaderFormat(PathBuf),

    #[error("no suitable memory type for requirements")]
    NoSuitableMemoryType,

    #[error("format not supported: {0}")]
    UnsupportedFormat(&'static str),
}

pub type RenderResult<T> = std::result::Result<T, RenderError>;
