// SPIR-V shader module loading
//
// Shaders are compiled to .spv by the build script and read from disk
// at startup. A missing or malformed file is a startup error, not a
// render-time one.

use ash::util::read_spv;
use ash::vk;
use std::fs::File;
use std::path::Path;

use super::DeviceContext;
use crate::error::{RenderError, RenderResult};

/// Read a SPIR-V file and wrap it in a shader module
pub fn load_shader_module(
    device: &DeviceContext,
    path: impl AsRef<Path>,
) -> RenderResult<vk::ShaderModule> {
    let path = path.as_ref();
    let mut file = File::open(path).map_err(|source| RenderError::ShaderLoad {
        path: path.to_path_buf(),
        source,
    })?;

    // read_spv validates alignment and the 4-byte word length for us
    let code = read_spv(&mut file).map_err(|_| RenderError::ShaderFormat(path.to_path_buf()))?;

    let create_info = vk::ShaderModuleCreateInfo::builder().code(&code);
    let module = unsafe { device.device.create_shader_module(&create_info, None)? };
    Ok(module)
}
