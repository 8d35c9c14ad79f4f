//! Baked shader asset header (spec.md §4.9 / §6.2).
//!
//! Only the reading side lives here — the offline baker that produces
//! these files is a non-goal. Grounded on the teacher's `src/import.rs`
//! (`serde::Deserialize` over a TOML graph description), generalized from
//! TOML to the JSON header format spec.md names explicitly.

use std::io::{self, Read, Write};

use serde::{Deserialize, Serialize};

const COMBINED_MAGIC: &[u8; 8] = b"ASSETBFF";
const COMBINED_VERSION: u32 = 1;

#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    #[error("i/o error reading asset: {0}")]
    Io(#[from] io::Error),
    #[error("malformed asset header: {0}")]
    Json(#[from] serde_json::Error),
    #[error("bad combined-file magic (expected ASSETBFF)")]
    BadMagic,
    #[error("unsupported combined-file version {0}")]
    UnsupportedVersion(u32),
    #[error("combined file truncated: expected {expected} bytes, found {found}")]
    Truncated { expected: usize, found: usize },
}

/// `Bindless` and the immutable-sampler family are the only attributes
/// spec.md §6.2 names; `StandaloneType` belongs to the reflection
/// generator and is out of scope.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BindingAttribute {
    Bindless,
    ImmutableSampler,
    ImmutableSamplerNearest,
    ImmutableSamplerLinear,
    ImmutableSamplerShadow,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DescriptorAccess {
    ReadOnly,
    ReadWrite,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DescriptorKind {
    UniformBuffer,
    StorageBuffer,
    SampledImage,
    StorageImage,
    Sampler,
    CombinedImageSampler,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Binding {
    pub name: String,
    pub count: u32,
    pub descriptor_type: DescriptorKind,
    pub access: DescriptorAccess,
    #[serde(default)]
    pub attributes: Vec<BindingAttribute>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct BindingSet {
    pub set_index: u32,
    pub bindings: Vec<Binding>,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct PushConstantRange {
    pub offset: u32,
    pub size: u32,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EntryPoint {
    pub name: String,
    pub stage: ShaderStage,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShaderStage {
    Vertex,
    Pixel,
    Compute,
}

/// Where the binary SPIR-V (or equivalent) payload lives, for the
/// *separate* file layout (spec.md §6.2).
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BinaryLocation {
    Path(String),
    Embedded,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ShaderAssetHeader {
    pub entry_points: Vec<EntryPoint>,
    pub binding_sets: Vec<BindingSet>,
    #[serde(default)]
    pub push_constants: Vec<PushConstantRange>,
    #[serde(default)]
    pub specialization_constants: Vec<String>,
    pub binary: BinaryLocation,
}

impl ShaderAssetHeader {
    pub fn to_json(&self) -> Result<String, AssetError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(text: &str) -> Result<Self, AssetError> {
        Ok(serde_json::from_str(text)?)
    }
}

/// Reads a combined `ASSETBFF` file: 8-byte magic, u32 version, u32
/// header-size, u32 binary-size, header bytes, binary bytes.
pub fn read_combined(mut reader: impl Read) -> Result<(ShaderAssetHeader, Vec<u8>), AssetError> {
    let mut magic = [0u8; 8];
    reader.read_exact(&mut magic)?;
    if &magic != COMBINED_MAGIC {
        return Err(AssetError::BadMagic);
    }

    let mut u32_buf = [0u8; 4];
    reader.read_exact(&mut u32_buf)?;
    let version = u32::from_le_bytes(u32_buf);
    if version != COMBINED_VERSION {
        return Err(AssetError::UnsupportedVersion(version));
    }

    reader.read_exact(&mut u32_buf)?;
    let header_size = u32::from_le_bytes(u32_buf) as usize;
    reader.read_exact(&mut u32_buf)?;
    let binary_size = u32::from_le_bytes(u32_buf) as usize;

    let mut header_bytes = vec![0u8; header_size];
    reader.read_exact(&mut header_bytes)?;
    let header_text = String::from_utf8_lossy(&header_bytes);
    let header = ShaderAssetHeader::from_json(&header_text)?;

    let mut binary = vec![0u8; binary_size];
    reader.read_exact(&mut binary)?;

    Ok((header, binary))
}

/// Writes the combined layout `read_combined` expects, for use by tests
/// and any harness that wants to assemble one in-process.
pub fn write_combined(mut writer: impl Write, header: &ShaderAssetHeader, binary: &[u8]) -> Result<(), AssetError> {
    let header_json = header.to_json()?;
    let header_bytes = header_json.as_bytes();

    writer.write_all(COMBINED_MAGIC)?;
    writer.write_all(&COMBINED_VERSION.to_le_bytes())?;
    writer.write_all(&(header_bytes.len() as u32).to_le_bytes())?;
    writer.write_all(&(binary.len() as u32).to_le_bytes())?;
    writer.write_all(header_bytes)?;
    writer.write_all(binary)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_header() -> ShaderAssetHeader {
        ShaderAssetHeader {
            entry_points: vec![EntryPoint {
                name: "main".into(),
                stage: ShaderStage::Compute,
            }],
            binding_sets: vec![BindingSet {
                set_index: 0,
                bindings: vec![Binding {
                    name: "g_Textures".into(),
                    count: 4096,
                    descriptor_type: DescriptorKind::SampledImage,
                    access: DescriptorAccess::ReadOnly,
                    attributes: vec![BindingAttribute::Bindless],
                }],
            }],
            push_constants: vec![PushConstantRange { offset: 0, size: 64 }],
            specialization_constants: Vec::new(),
            binary: BinaryLocation::Embedded,
        }
    }

    #[test]
    fn json_round_trip_is_identity() {
        let header = sample_header();
        let json = header.to_json().unwrap();
        let decoded = ShaderAssetHeader::from_json(&json).unwrap();
        assert_eq!(decoded.entry_points[0].name, header.entry_points[0].name);
        assert_eq!(decoded.binding_sets[0].bindings[0].attributes, header.binding_sets[0].bindings[0].attributes);
    }

    #[test]
    fn combined_file_round_trips() {
        let header = sample_header();
        let binary = vec![1u8, 2, 3, 4, 5];
        let mut buf = Vec::new();
        write_combined(&mut buf, &header, &binary).unwrap();

        let (decoded_header, decoded_binary) = read_combined(&buf[..]).unwrap();
        assert_eq!(decoded_binary, binary);
        assert_eq!(decoded_header.entry_points.len(), header.entry_points.len());
    }

    #[test]
    fn rejects_bad_magic() {
        let bytes = [0u8; 20];
        let err = read_combined(&bytes[..]).unwrap_err();
        assert!(matches!(err, AssetError::BadMagic));
    }
}
