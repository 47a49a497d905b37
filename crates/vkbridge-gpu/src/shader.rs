//! SPIR-V shader loading.

use crate::error::{GpuError, Result};
use ash::vk;
use std::io::Cursor;
use std::path::Path;

/// Read a whole shader file.
pub fn read_shader_bytes(path: impl AsRef<Path>) -> Result<Vec<u8>> {
    let path = path.as_ref();
    std::fs::read(path).map_err(|source| {
        tracing::error!("Failed to open shader file {}: {}", path.display(), source);
        GpuError::ShaderLoad {
            path: path.to_path_buf(),
            source,
        }
    })
}

/// Decode SPIR-V bytecode into aligned words.
pub fn spirv_words(bytes: &[u8]) -> Result<Vec<u32>> {
    ash::util::read_spv(&mut Cursor::new(bytes)).map_err(GpuError::InvalidSpirv)
}

/// Create a shader module from SPIR-V bytecode.
///
/// # Safety
/// The device must be valid.
pub unsafe fn create_shader_module(device: &ash::Device, bytes: &[u8]) -> Result<vk::ShaderModule> {
    let code = spirv_words(bytes)?;
    let create_info = vk::ShaderModuleCreateInfo::default().code(&code);
    device
        .create_shader_module(&create_info, None)
        .map_err(GpuError::ShaderModule)
}

/// Load a SPIR-V file and create a shader module from it.
///
/// # Safety
/// The device must be valid.
pub unsafe fn load_shader_module(
    device: &ash::Device,
    path: impl AsRef<Path>,
) -> Result<vk::ShaderModule> {
    let path = path.as_ref();
    let bytes = read_shader_bytes(path)?;
    let module = create_shader_module(device, &bytes)?;
    tracing::debug!("Loaded shader module {}", path.display());
    Ok(module)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SPIRV_MAGIC: u32 = 0x0723_0203;

    #[test]
    fn missing_file_reports_path() {
        let path = std::env::temp_dir().join("vkbridge-missing-shader.spv");
        let err = read_shader_bytes(&path).unwrap_err();

        match err {
            GpuError::ShaderLoad {
                path: reported,
                source,
            } => {
                assert_eq!(reported, path);
                assert_eq!(source.kind(), std::io::ErrorKind::NotFound);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn whole_file_is_read() {
        let path = std::env::temp_dir().join(format!("vkbridge-shader-{}.spv", std::process::id()));
        let bytes: Vec<u8> = [SPIRV_MAGIC, 0x0001_0000]
            .iter()
            .flat_map(|word| word.to_le_bytes())
            .collect();
        std::fs::write(&path, &bytes).unwrap();

        let read = read_shader_bytes(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(read, bytes);
        assert_eq!(spirv_words(&read).unwrap(), vec![SPIRV_MAGIC, 0x0001_0000]);
    }

    #[test]
    fn truncated_bytecode_is_rejected() {
        assert!(matches!(
            spirv_words(&[0x03, 0x02, 0x23]),
            Err(GpuError::InvalidSpirv(_))
        ));
    }
}
