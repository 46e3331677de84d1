// Shader module loading
//
// Vulkan uses SPIR-V bytecode for shaders. build.rs compiles the GLSL in
// shaders/ with glslc; the .spv files are read here at startup.

use anyhow::{Context, Result};
use ash::vk;
use std::io::Cursor;
use std::path::Path;

use super::VulkanDevice;

/// Read a .spv file into 32-bit words
pub fn read_spirv(path: &Path) -> Result<Vec<u32>> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("Failed to open shader file {:?} (is glslc installed?)", path))?;

    parse_spirv(&bytes).with_context(|| format!("Invalid SPIR-V in {:?}", path))
}

/// Validates size and magic number; handles alignment and endianness
pub fn parse_spirv(bytes: &[u8]) -> Result<Vec<u32>> {
    let words = ash::util::read_spv(&mut Cursor::new(bytes))?;
    Ok(words)
}

/// Create a shader module from SPIR-V words
pub fn create_shader_module(device: &VulkanDevice, code: &[u32]) -> Result<vk::ShaderModule> {
    let create_info = vk::ShaderModuleCreateInfo::builder().code(code);

    unsafe {
        device
            .device
            .create_shader_module(&create_info, None)
            .context("Failed to create shader module")
    }
}

/// Load a .spv file and create its shader module
pub fn load_shader_module(device: &VulkanDevice, path: &Path) -> Result<vk::ShaderModule> {
    log::debug!("Loading shader {:?}", path);
    let code = read_spirv(path)?;
    create_shader_module(device, &code)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAGIC: u32 = 0x0723_0203;

    #[test]
    fn parses_words_with_magic() {
        let mut bytes = Vec::new();
        for word in [MAGIC, 0x0001_0000, 0, 1, 0] {
            bytes.extend_from_slice(&word.to_le_bytes());
        }

        let words = parse_spirv(&bytes).unwrap();
        assert_eq!(words.len(), 5);
        assert_eq!(words[0], MAGIC);
        assert_eq!(words[1], 0x0001_0000);
    }

    #[test]
    fn rejects_truncated_input() {
        let mut bytes = MAGIC.to_le_bytes().to_vec();
        bytes.push(0);
        assert!(parse_spirv(&bytes).is_err());
    }

    #[test]
    fn rejects_missing_magic() {
        let bytes = [0u8; 8];
        assert!(parse_spirv(&bytes).is_err());
    }

    #[test]
    fn missing_file_names_the_path() {
        let err = read_spirv(Path::new("no/such/shader.spv")).unwrap_err();
        assert!(format!("{:#}", err).contains("shader.spv"));
    }
}
