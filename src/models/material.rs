use crate::scene::{MaterialFlags, TextureRole};

pub const MATERIAL_BACKFACE_CULLING_OFF: u32 = 0x2;
pub const MATERIAL_ALWAYS_ON_TOP: u32 = 0x1_0000;
pub const MATERIAL_LIT: u32 = 0x100_0000;

/// Size of a material record without texture entries.
pub const MATERIAL_BASE_SIZE: usize = 0x5C;
pub const TEXTURE_ENTRY_SIZE: usize = 0x14;

const SPECULAR: [f32; 3] = [0.9; 3];
const SPECULAR_POWER: f32 = 2.0;
// One ulp below 0.3, as in models exported by the game's tools.
const SPECULAR_LEVEL: f32 = 0.299_999_98;
const BLEND_STATE: [u32; 10] = [1, 4, 5, 5, 2, 0, 6, 7, 0, 0];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureEntry {
    pub flags: u32,
    pub texture_index: u32,
}

/// A material as written to the object chunk.
#[derive(Debug, Clone, PartialEq)]
pub struct MaterialRecord {
    pub flags: u32,
    pub color: [f32; 3],
    pub alpha: f32,
    /// Texture entries in on-disk order.
    pub textures: Vec<TextureEntry>,
}

pub fn material_flags(flags: MaterialFlags) -> u32 {
    let mut out = 0;
    if flags.backface_culling_disabled {
        out |= MATERIAL_BACKFACE_CULLING_OFF;
    }
    if flags.always_on_top {
        out |= MATERIAL_ALWAYS_ON_TOP;
    }
    if !flags.fullbright {
        out |= MATERIAL_LIT;
    }
    out
}

impl MaterialRecord {
    /// Build a record from slots in graph order. Diffuse slots are pushed to
    /// the front one at a time, so they end up reversed ahead of the others.
    pub fn new(
        flags: MaterialFlags,
        color: [f32; 3],
        alpha: f32,
        slots: impl IntoIterator<Item = (TextureRole, u32)>,
    ) -> MaterialRecord {
        let mut textures = std::collections::VecDeque::new();
        for (role, texture_index) in slots {
            let entry = TextureEntry {
                flags: role.slot_flags(),
                texture_index,
            };
            match role {
                TextureRole::Diffuse => textures.push_front(entry),
                TextureRole::Reflection | TextureRole::Emission => textures.push_back(entry),
            }
        }

        MaterialRecord {
            flags: material_flags(flags),
            color,
            alpha,
            textures: textures.into(),
        }
    }

    /// Mask stored in the material list: one bit for the material plus one
    /// per texture. `None` if it does not fit in 16 bits.
    pub fn texture_mask(&self) -> Option<u16> {
        let bits = u32::try_from(self.textures.len()).ok()?.checked_add(1)?;
        let mask = 1u32.checked_shl(bits)?.checked_sub(1)?;
        u16::try_from(mask).ok()
    }

    pub fn byte_len(&self) -> usize {
        MATERIAL_BASE_SIZE + self.textures.len() * TEXTURE_ENTRY_SIZE
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.byte_len());
        out.extend_from_slice(&self.flags.to_be_bytes());
        for f in self
            .color
            .into_iter()
            .chain([self.alpha])
            .chain(self.color)
            .chain(SPECULAR)
            .chain([SPECULAR_POWER, SPECULAR_LEVEL])
        {
            out.extend_from_slice(&f.to_be_bytes());
        }
        for v in BLEND_STATE {
            out.extend_from_slice(&v.to_be_bytes());
        }
        for tex in &self.textures {
            out.extend_from_slice(&tex.flags.to_be_bytes());
            out.extend_from_slice(&tex.texture_index.to_be_bytes());
            out.extend_from_slice(&0x8000_0000u32.to_be_bytes());
            out.extend_from_slice(&0u32.to_be_bytes());
            out.extend_from_slice(&1.0f32.to_be_bytes());
        }
        out
    }
}
