//! Sequential triangle strip joiner.
//!
//! Faces are visited in mesh order and appended to the current strip while
//! they share an edge with the previous face in the order GX expects. This
//! is not an optimizing stripifier: output has to line up with models built
//! by the game's own tools.

/// Index triples of one triangle: position, normal and optional UV indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StripFace {
    pub position: [u32; 3],
    pub normal: [u32; 3],
    pub uv: Option<[u32; 3]>,
}

impl StripFace {
    fn swap_first_corners(&mut self) {
        self.position.swap(0, 1);
        self.normal.swap(0, 1);
        if let Some(uv) = &mut self.uv {
            uv.swap(0, 1);
        }
    }

    /// True when this face starts on the last edge of `prev`.
    fn continues(&self, prev: &StripFace) -> bool {
        self.position[0] == prev.position[1]
            && self.position[1] == prev.position[2]
            && self.uv.map(|uv| [uv[0], uv[1]]) == prev.uv.map(|uv| [uv[1], uv[2]])
    }

    /// Offset every index, used when meshes share one vertex set.
    pub fn offset(mut self, position: u32, normal: u32, uv: u32) -> StripFace {
        self.position = self.position.map(|i| i + position);
        self.normal = self.normal.map(|i| i + normal);
        self.uv = self.uv.map(|uvs| uvs.map(|i| i + uv));
        self
    }
}

/// One display list strip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Strip {
    pub faces: Vec<StripFace>,
}

/// One vertex reference inside a strip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StripIndex {
    pub position: u32,
    pub normal: u32,
    pub uv: Option<u32>,
}

impl Strip {
    /// Number of vertex references the strip expands to.
    pub fn index_count(&self) -> usize {
        self.faces.len() + 2
    }

    /// The first face contributes all three corners, every later face only
    /// its last one.
    pub fn indices(&self) -> impl Iterator<Item = StripIndex> + '_ {
        let corner = |face: &StripFace, k: usize| StripIndex {
            position: face.position[k],
            normal: face.normal[k],
            uv: face.uv.map(|uv| uv[k]),
        };
        let head = self
            .faces
            .first()
            .into_iter()
            .flat_map(move |f| (0..3).map(move |k| corner(f, k)));
        let tail = self.faces.iter().skip(1).map(move |f| corner(f, 2));
        head.chain(tail)
    }
}

/// Join faces into strips.
pub fn build_strips(faces: &[StripFace]) -> Vec<Strip> {
    let Some((first, rest)) = faces.split_first() else {
        return Vec::new();
    };

    let mut strips = Vec::new();
    let mut last = *first;
    last.swap_first_corners();
    let mut current = vec![last];
    let mut odd = false;

    for face in rest {
        let mut face = *face;
        if odd {
            face.swap_first_corners();
        }

        if face.continues(&last) {
            current.push(face);
        } else {
            strips.push(Strip {
                faces: std::mem::take(&mut current),
            });
            // A new strip always starts with a swapped face.
            if !odd {
                face.swap_first_corners();
            }
            current.push(face);
            odd = true;
        }

        last = face;
        odd = !odd;
    }

    if !current.is_empty() {
        strips.push(Strip { faces: current });
    }
    strips
}

#[cfg(test)]
mod tests {
    use super::*;

    fn face(p: [u32; 3]) -> StripFace {
        StripFace {
            position: p,
            normal: p,
            uv: None,
        }
    }

    #[test]
    fn empty_input() {
        assert!(build_strips(&[]).is_empty());
    }

    #[test]
    fn single_face_is_swapped() {
        let strips = build_strips(&[face([0, 1, 2])]);
        assert_eq!(strips.len(), 1);
        assert_eq!(strips[0].faces[0].position, [1, 0, 2]);
        assert_eq!(strips[0].index_count(), 3);
    }

    #[test]
    fn adjacent_faces_join() {
        // After swapping the first face becomes (1, 0, 2), so a face starting
        // on edge (0, 2) continues the strip.
        let strips = build_strips(&[face([0, 1, 2]), face([0, 2, 3])]);
        assert_eq!(strips.len(), 1);
        let positions: Vec<u32> = strips[0].indices().map(|i| i.position).collect();
        assert_eq!(positions, vec![1, 0, 2, 3]);
    }

    #[test]
    fn disconnected_faces_break() {
        let strips = build_strips(&[face([0, 1, 2]), face([3, 4, 5]), face([3, 5, 6])]);
        assert_eq!(strips.len(), 2);
        // Second strip starts swapped; the face after it is not.
        assert_eq!(strips[1].faces[0].position, [4, 3, 5]);
        assert_eq!(strips[1].faces[1].position, [3, 5, 6]);
        let positions: Vec<u32> = strips[1].indices().map(|i| i.position).collect();
        assert_eq!(positions, vec![4, 3, 5, 6]);
    }

    #[test]
    fn uvs_must_match_to_join() {
        let mut a = face([0, 1, 2]);
        a.uv = Some([0, 1, 2]);
        let mut b = face([0, 2, 3]);
        b.uv = Some([5, 2, 3]);
        assert_eq!(build_strips(&[a, b]).len(), 2);

        b.uv = Some([0, 2, 3]);
        assert_eq!(build_strips(&[a, b]).len(), 1);
    }

    #[test]
    fn offsets_shift_every_index() {
        let mut f = face([0, 1, 2]);
        f.uv = Some([0, 0, 1]);
        let f = f.offset(10, 20, 30);
        assert_eq!(f.position, [10, 11, 12]);
        assert_eq!(f.normal, [20, 21, 22]);
        assert_eq!(f.uv, Some([30, 30, 31]));
    }
}
