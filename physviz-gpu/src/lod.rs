/*!
# Level of Detail (LOD) Management

Three geometry detail tiers switched by camera distance: full detail close
up, coarse geometry far away, with two thresholds in between.
*/

/// Level of detail enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LodLevel {
    /// Near the camera - full-detail geometry
    High,
    /// Mid distance - reduced tessellation
    Medium,
    /// Far away - coarse silhouette geometry
    Low,
}

impl LodLevel {
    /// Index into the per-level mesh array.
    pub fn mesh_index(self) -> usize {
        match self {
            LodLevel::High => 0,
            LodLevel::Medium => 1,
            LodLevel::Low => 2,
        }
    }

    /// Sphere tessellation (rings, segments) for this tier.
    pub fn detail(self) -> (u32, u32) {
        match self {
            LodLevel::High => (32, 48),
            LodLevel::Medium => (16, 24),
            LodLevel::Low => (8, 12),
        }
    }
}

/// Distance-based LOD selection
#[derive(Debug, Clone, Copy)]
pub struct LodSelector {
    near_threshold: f32,
    far_threshold: f32,
}

impl LodSelector {
    pub fn new(near_threshold: f32, far_threshold: f32) -> Self {
        let (near_threshold, far_threshold) = if near_threshold <= far_threshold {
            (near_threshold, far_threshold)
        } else {
            (far_threshold, near_threshold)
        };
        Self {
            near_threshold,
            far_threshold,
        }
    }

    pub fn select(&self, distance: f32) -> LodLevel {
        if distance < self.near_threshold {
            LodLevel::High
        } else if distance < self.far_threshold {
            LodLevel::Medium
        } else {
            LodLevel::Low
        }
    }
}

impl Default for LodSelector {
    fn default() -> Self {
        Self::new(14.0, 30.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selection_by_distance() {
        let selector = LodSelector::new(10.0, 20.0);
        assert_eq!(selector.select(5.0), LodLevel::High);
        assert_eq!(selector.select(10.0), LodLevel::Medium);
        assert_eq!(selector.select(15.0), LodLevel::Medium);
        assert_eq!(selector.select(20.0), LodLevel::Low);
        assert_eq!(selector.select(100.0), LodLevel::Low);
    }

    #[test]
    fn test_swapped_thresholds_are_normalized() {
        let selector = LodSelector::new(20.0, 10.0);
        assert_eq!(selector.select(5.0), LodLevel::High);
        assert_eq!(selector.select(15.0), LodLevel::Medium);
    }

    #[test]
    fn test_detail_decreases_with_distance() {
        let (high_rings, _) = LodLevel::High.detail();
        let (mid_rings, _) = LodLevel::Medium.detail();
        let (low_rings, _) = LodLevel::Low.detail();
        assert!(high_rings > mid_rings);
        assert!(mid_rings > low_rings);
    }

    #[test]
    fn test_mesh_indices_are_distinct() {
        assert_eq!(LodLevel::High.mesh_index(), 0);
        assert_eq!(LodLevel::Medium.mesh_index(), 1);
        assert_eq!(LodLevel::Low.mesh_index(), 2);
    }
}
