//! Image charges mirrored across a conducting plane

use crate::physics::context::ParticleState;
use crate::physics::math::Scalar;
use crate::physics::topology::ImagePair;

/// Keeps every image at `(x, y, 2·m − z)` of its parent.
///
/// Parents are mirrored as stored; periodic-cell offsets are not unwrapped,
/// which only affects how images look, not the forces they produce.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageCharge {
    pairs: Vec<ImagePair>,
}

impl ImageCharge {
    pub fn new(pairs: &[ImagePair]) -> Self {
        Self { pairs: pairs.to_vec() }
    }

    pub fn pairs(&self) -> &[ImagePair] {
        &self.pairs
    }

    pub fn update_positions(&self, state: &mut ParticleState, mirror_location: Scalar) {
        for pair in &self.pairs {
            let parent = state.positions[pair.parent];
            let image = &mut state.positions[pair.image];
            image.x = parent.x;
            image.y = parent.y;
            image.z = 2.0 * mirror_location - parent.z;
        }
    }

    pub fn summary(&self, mirror_location: Scalar) -> String {
        format!(
            "Image charges: {} pairs, mirror plane at z = {} nm",
            self.pairs.len(),
            mirror_location
        )
    }
}
