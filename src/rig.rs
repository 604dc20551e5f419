/// Bone hierarchy construction and borrowing
pub mod hierarchy;
/// Vertex group to bone weight resolution
pub mod skin;

pub use hierarchy::{AliasMismatch, BoneHierarchy, HierarchyError, HierarchySource};
pub use skin::{ResolvedSkin, SkinBinding, SkinError};
