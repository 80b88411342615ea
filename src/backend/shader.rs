// Shader module loading
//
// Vulkan consumes SPIR-V bytecode. Shaders are read from disk at startup;
// the bytes are treated opaquely apart from word alignment.

use crate::error::{GraphicsError, Result};
use ash::vk;
use std::io::Cursor;
use std::path::Path;

/// Read a SPIR-V file into 32-bit words
pub fn read_spirv(path: &Path) -> Result<Vec<u32>> {
    let bytes = std::fs::read(path).map_err(|source| GraphicsError::ShaderOpenFailed {
        path: path.to_path_buf(),
        source,
    })?;

    let words = parse_spirv(&bytes).map_err(|source| GraphicsError::InvalidSpirv {
        path: path.to_path_buf(),
        source,
    })?;

    log::debug!("Loaded shader {:?} ({} bytes)", path, bytes.len());
    Ok(words)
}

/// Realign raw bytes to words. Rejects lengths that are not a multiple of 4;
/// byte-swapped modules are corrected using the magic number.
pub fn parse_spirv(bytes: &[u8]) -> std::io::Result<Vec<u32>> {
    ash::util::read_spv(&mut Cursor::new(bytes))
}

/// Shader module destroyed on drop. Only needed until the pipeline exists.
pub struct ShaderModule {
    device: ash::Device,
    pub module: vk::ShaderModule,
}

impl ShaderModule {
    pub fn new(device: &ash::Device, code: &[u32]) -> Result<Self> {
        let create_info = vk::ShaderModuleCreateInfo::default().code(code);

        let module = unsafe { device.create_shader_module(&create_info, None) }
            .map_err(GraphicsError::ShaderModuleCreationFailed)?;

        Ok(Self {
            device: device.clone(),
            module,
        })
    }

    pub fn load(device: &ash::Device, path: &Path) -> Result<Self> {
        Self::new(device, &read_spirv(path)?)
    }
}

impl Drop for ShaderModule {
    fn drop(&mut self) {
        unsafe { self.device.destroy_shader_module(self.module, None) };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SPIRV_MAGIC: u32 = 0x0723_0203;

    #[test]
    fn parses_word_aligned_spirv() {
        let mut bytes = SPIRV_MAGIC.to_le_bytes().to_vec();
        bytes.extend_from_slice(&[0u8; 12]);

        let words = parse_spirv(&bytes).unwrap();
        assert_eq!(words.len(), 4);
        assert_eq!(words[0], SPIRV_MAGIC);
    }

    #[test]
    fn rejects_truncated_bytecode() {
        let mut bytes = SPIRV_MAGIC.to_le_bytes().to_vec();
        bytes.push(0);
        assert!(parse_spirv(&bytes).is_err());
    }

    #[test]
    fn missing_file_is_open_failure() {
        let err = read_spirv(Path::new("shaders/does-not-exist.spv")).unwrap_err();
        assert!(matches!(err, GraphicsError::ShaderOpenFailed { .. }));
    }
}
