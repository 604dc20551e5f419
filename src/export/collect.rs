//! Material and texture collection.
//!
//! Every material in the scene is collected in scene order, whether or not a
//! mesh uses it, because its position is the material index meshes refer to.
//! Textures are deduplicated by archive name in first-seen order; that order
//! is what the companion texture archive must be built in.

use std::collections::HashMap;

use tracing::debug;

use crate::models::material::MaterialRecord;
use crate::scene::MaterialGraphReader;
use crate::scene::material::UNTITLED_TEXTURE;
use crate::validate::Warning;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Collection {
    pub materials: Vec<MaterialRecord>,
    /// Texture archive names, in archive order.
    pub textures: Vec<String>,
    pub warnings: Vec<Warning>,
}

#[derive(Default)]
struct TextureTable {
    names: Vec<String>,
    index: HashMap<String, u32>,
}

impl TextureTable {
    fn intern(&mut self, name: String) -> u32 {
        if let Some(&i) = self.index.get(&name) {
            return i;
        }
        let i = self.names.len() as u32;
        self.index.insert(name.clone(), i);
        self.names.push(name);
        i
    }

    /// Unresolved slots have no file identity and always get a fresh entry.
    fn push_untitled(&mut self) -> u32 {
        self.names.push(UNTITLED_TEXTURE.to_string());
        (self.names.len() - 1) as u32
    }
}

pub fn collect_materials<M: MaterialGraphReader>(materials: &[M]) -> Collection {
    let mut table = TextureTable::default();
    let mut warnings = Vec::new();
    let mut records = Vec::with_capacity(materials.len());

    for material in materials {
        let mut slots = Vec::new();
        for (slot_index, slot) in material.texture_slots().into_iter().enumerate() {
            if let Some(role) = slot.role.unknown() {
                warnings.push(
                    Warning::UnknownTextureRole {
                        material: material.name().to_string(),
                        role: role.clone(),
                    }
                    .logged(),
                );
            }

            let texture_index = match &slot.image {
                Some(image) => table.intern(image.archive_name()),
                None => {
                    warnings.push(
                        Warning::UnresolvedTexture {
                            material: material.name().to_string(),
                            slot: slot_index,
                        }
                        .logged(),
                    );
                    table.push_untitled()
                }
            };
            slots.push((slot.effective_role(), texture_index));
        }

        debug!(
            material = material.name(),
            textures = slots.len(),
            "collected material"
        );
        records.push(MaterialRecord::new(
            material.flags(),
            material.base_color(),
            material.opacity(),
            slots,
        ));
    }

    Collection {
        materials: records,
        textures: table.names,
        warnings,
    }
}
