//! Distance-ordered sampling kernel for UV hole-filling.
//!
//! When a texel has insufficient confidence, neighboring texels are probed
//! in a fixed order until a usable sample is found. The ordering is the
//! deterministic sort (squared euclidean distance, dy, dx), so re-running
//! the search on identical input always visits the same cells.

/// Chebyshev距離 `distance` 以内の全非ゼロオフセットを探索順で返す。
pub fn sampling_kernel(distance: i32) -> Vec<[i32; 2]> {
    let mut offsets = Vec::new();
    for dy in -distance..=distance {
        for dx in -distance..=distance {
            if dx == 0 && dy == 0 {
                continue;
            }
            offsets.push([dx, dy]);
        }
    }
    offsets.sort_by_key(|o| (o[0] * o[0] + o[1] * o[1], o[1], o[0]));
    offsets
}
