//! Static UV calibration tables for the body mesh.
//!
//! Loaded once at startup from a JSON file and never mutated afterwards;
//! every reconstruction call shares the same tables through an `Arc`.
//! A malformed table is a startup-fatal configuration error: all downstream
//! code indexes by the fixed joint ordinal set and the fixed vertex count,
//! so there is no safe degraded mode.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::body::JointType;

/// UV空間 ⇔ メッシュ頂点の対応テーブル一式
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UvCalibrationTables {
    /// 推論出力テクセルグリッドの幅
    pub grid_width: usize,
    /// 推論出力テクセルグリッドの高さ
    pub grid_height: usize,
    /// メッシュ頂点ごとのUV座標 (u, v) ∈ [0, 1]
    pub vertex_uv: Vec<[f32; 2]>,
    /// 頂点ごとのレスト位置（探索失敗時のフォールバック）
    pub rest_vertices: Vec<[f32; 3]>,
    /// 三角形リスト（頂点インデックスのフラット列、3個ずつ）
    pub face_to_v: Vec<u32>,
    /// ジョイントordinal順の、各ジョイントに対応するテクセル集合 (x, y)
    pub joint_texels: Vec<Vec<[u32; 2]>>,
}

impl UvCalibrationTables {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref()).with_context(|| {
            format!("failed to read UV calibration {}", path.as_ref().display())
        })?;
        let tables: UvCalibrationTables =
            serde_json::from_str(&content).context("failed to parse UV calibration JSON")?;
        tables.validate()?;
        Ok(tables)
    }

    pub fn vertex_count(&self) -> usize {
        self.vertex_uv.len()
    }

    pub fn face_count(&self) -> usize {
        self.face_to_v.len() / 3
    }

    pub fn validate(&self) -> Result<()> {
        if self.grid_width == 0 || self.grid_height == 0 {
            bail!(
                "UV grid {}x{} is degenerate",
                self.grid_width,
                self.grid_height
            );
        }
        if self.vertex_uv.is_empty() {
            bail!("UV calibration has no vertices");
        }
        if self.rest_vertices.len() != self.vertex_uv.len() {
            bail!(
                "rest vertex count {} != UV vertex count {}",
                self.rest_vertices.len(),
                self.vertex_uv.len()
            );
        }
        if self.face_to_v.len() % 3 != 0 {
            bail!("face index list length {} is not a multiple of 3", self.face_to_v.len());
        }
        for &v in &self.face_to_v {
            if v as usize >= self.vertex_uv.len() {
                bail!("face references vertex {} out of {}", v, self.vertex_uv.len());
            }
        }
        for (i, uv) in self.vertex_uv.iter().enumerate() {
            if !(0.0..=1.0).contains(&uv[0]) || !(0.0..=1.0).contains(&uv[1]) {
                bail!("vertex {} UV ({}, {}) outside [0, 1]", i, uv[0], uv[1]);
            }
        }
        if self.joint_texels.len() != JointType::COUNT {
            bail!(
                "joint texel table has {} entries, joint set has {}",
                self.joint_texels.len(),
                JointType::COUNT
            );
        }
        for (i, texels) in self.joint_texels.iter().enumerate() {
            for t in texels {
                if t[0] as usize >= self.grid_width || t[1] as usize >= self.grid_height {
                    bail!(
                        "joint {} texel ({}, {}) outside {}x{} grid",
                        JointType::ALL[i].name(),
                        t[0],
                        t[1],
                        self.grid_width,
                        self.grid_height
                    );
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    pub(crate) fn small_tables() -> UvCalibrationTables {
        UvCalibrationTables {
            grid_width: 4,
            grid_height: 4,
            vertex_uv: vec![[0.0, 0.0], [1.0, 0.0], [0.0, 1.0]],
            rest_vertices: vec![[0.0; 3], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
            face_to_v: vec![0, 1, 2],
            joint_texels: vec![vec![[0, 0]]; JointType::COUNT],
        }
    }

    #[test]
    fn test_valid_tables_pass() {
        let tables = small_tables();
        tables.validate().unwrap();
        assert_eq!(tables.vertex_count(), 3);
        assert_eq!(tables.face_count(), 1);
    }

    #[test]
    fn test_face_index_out_of_range() {
        let mut tables = small_tables();
        tables.face_to_v = vec![0, 1, 7];
        assert!(tables.validate().is_err());
    }

    #[test]
    fn test_rest_vertex_count_mismatch() {
        let mut tables = small_tables();
        tables.rest_vertices.pop();
        assert!(tables.validate().is_err());
    }

    #[test]
    fn test_joint_table_wrong_length() {
        let mut tables = small_tables();
        tables.joint_texels.pop();
        assert!(tables.validate().is_err());
    }

    #[test]
    fn test_texel_outside_grid() {
        let mut tables = small_tables();
        tables.joint_texels[0] = vec![[4, 0]];
        assert!(tables.validate().is_err());
    }

    #[test]
    fn test_uv_outside_unit_square() {
        let mut tables = small_tables();
        tables.vertex_uv[0] = [1.5, 0.0];
        assert!(tables.validate().is_err());
    }

    #[test]
    fn test_degenerate_grid() {
        let mut tables = small_tables();
        tables.grid_width = 0;
        assert!(tables.validate().is_err());
    }
}
