use glam::Vec3;

/// What a mesh is attached to in the host scene.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MeshParent {
    /// Deformed by the armature through its vertex groups.
    Armature,
    /// Parented directly to a single named bone.
    Bone(String),
    #[default]
    None,
}

/// One entry of a vertex's weight-group list.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GroupWeight {
    /// Slot in [`MeshSnapshot::vertex_groups`].
    pub group: usize,
    pub weight: f32,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Vertex {
    pub position: [f32; 3],
    /// Vertex normal as computed by the host. Only used when the mesh has no
    /// custom corner normals.
    pub normal: [f32; 3],
    /// Group assignments in the mesh's authored group order.
    #[cfg_attr(feature = "serde", serde(default))]
    pub groups: Vec<GroupWeight>,
}

/// A triangle with its per-corner (face-corner) attributes.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Triangle {
    pub corners: [u32; 3],
    /// Custom split normals, one per corner.
    #[cfg_attr(feature = "serde", serde(default))]
    pub normals: Option<[[f32; 3]; 3]>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub uvs: Option<[[f32; 2]; 3]>,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MeshSnapshot {
    pub name: String,
    pub vertices: Vec<Vertex>,
    pub triangles: Vec<Triangle>,
    /// Names of the mesh's vertex groups, in the mesh's internal order.
    #[cfg_attr(feature = "serde", serde(default))]
    pub vertex_groups: Vec<String>,
    /// Material slot names. Exporting requires exactly one.
    #[cfg_attr(feature = "serde", serde(default))]
    pub materials: Vec<String>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub parent: MeshParent,
    /// Node whose visibility toggles this mesh in game.
    #[cfg_attr(feature = "serde", serde(default))]
    pub visibility_node: Option<u32>,
}

impl MeshSnapshot {
    /// True when every triangle carries UVs.
    pub fn has_uvs(&self) -> bool {
        !self.triangles.is_empty() && self.triangles.iter().all(|t| t.uvs.is_some())
    }

    /// True when every triangle carries custom corner normals.
    pub fn has_custom_normals(&self) -> bool {
        !self.triangles.is_empty() && self.triangles.iter().all(|t| t.normals.is_some())
    }

    /// Name of a vertex group slot.
    pub fn group_name(&self, slot: usize) -> Option<&str> {
        self.vertex_groups.get(slot).map(String::as_str)
    }

    /// Groups that carry non-zero weight, in the vertex's authored order.
    pub fn weighted_groups(&self, vertex: usize) -> impl Iterator<Item = &GroupWeight> + '_ {
        self.vertices
            .get(vertex)
            .into_iter()
            .flat_map(|v| v.groups.iter())
            .filter(|g| g.weight > 0.0)
    }

    pub fn bounds(&self) -> Bounds {
        Bounds::from_points(self.vertices.iter().map(|v| v.position))
    }
}

/// Bounding sphere as stored in mesh and object records.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Bounds {
    pub center: [f32; 3],
    pub radius: f32,
}

impl Bounds {
    /// Centre of the axis-aligned box around `points`, radius reaching the
    /// farthest point.
    pub fn from_points<I>(points: I) -> Bounds
    where
        I: IntoIterator<Item = [f32; 3]>,
        I::IntoIter: Clone,
    {
        let points = points.into_iter();
        let mut min = Vec3::splat(f32::INFINITY);
        let mut max = Vec3::splat(f32::NEG_INFINITY);
        let mut any = false;
        for p in points.clone() {
            let p = Vec3::from(p);
            min = min.min(p);
            max = max.max(p);
            any = true;
        }
        if !any {
            return Bounds::default();
        }

        let center = (min + max) * 0.5;
        let radius = points
            .map(|p| center.distance(Vec3::from(p)))
            .fold(0.0f32, f32::max);

        Bounds {
            center: center.to_array(),
            radius,
        }
    }
}
