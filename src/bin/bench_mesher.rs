use anyhow::Result;
use nalgebra::Matrix4;
use ndarray::Array3;
use std::sync::Arc;
use std::time::Instant;

use hitoe_body::body::JointType;
use hitoe_body::config::{DampeningConfig, FilterConfig, MesherConfig};
use hitoe_body::mesh::{
    BodyMesher, CameraFrame, CameraPosition, FeatureMap, UvCalibrationTables, VisionBackend,
};

const GRID: usize = 64;
const MESH_SIDE: usize = 32;

/// 合成feature mapを返すだけのバックエンド
struct SyntheticBackend;

impl VisionBackend for SyntheticBackend {
    fn infer(&mut self, _frame: &CameraFrame) -> Result<FeatureMap> {
        Ok(synthetic_features())
    }

    fn camera_position(&self) -> CameraPosition {
        CameraPosition::Back
    }
}

fn synthetic_features() -> FeatureMap {
    let mut features = Array3::zeros((GRID, GRID, 3));
    for y in 0..GRID {
        for x in 0..GRID {
            features[[y, x, 0]] = x as f32 / (GRID - 1) as f32;
            features[[y, x, 1]] = y as f32 / (GRID - 1) as f32;
            // 2割のセルを低信頼度にしてカーネル探索を発生させる
            features[[y, x, 2]] = if (x * 7 + y * 13) % 10 < 2 { 0.1 } else { 0.9 };
        }
    }
    features
}

/// MESH_SIDE x MESH_SIDE の規則格子メッシュ
fn synthetic_tables() -> Arc<UvCalibrationTables> {
    let mut vertex_uv = Vec::new();
    let mut rest_vertices = Vec::new();
    for y in 0..MESH_SIDE {
        for x in 0..MESH_SIDE {
            let u = x as f32 / (MESH_SIDE - 1) as f32;
            let v = y as f32 / (MESH_SIDE - 1) as f32;
            vertex_uv.push([u, v]);
            rest_vertices.push([u, v, 0.0]);
        }
    }

    let mut face_to_v = Vec::new();
    for y in 0..MESH_SIDE - 1 {
        for x in 0..MESH_SIDE - 1 {
            let i = (y * MESH_SIDE + x) as u32;
            let right = i + 1;
            let below = i + MESH_SIDE as u32;
            face_to_v.extend_from_slice(&[i, right, below]);
            face_to_v.extend_from_slice(&[right, below + 1, below]);
        }
    }

    let joint_texels = (0..JointType::COUNT)
        .map(|i| vec![[(i * 4) as u32, (i * 4) as u32]])
        .collect();

    Arc::new(UvCalibrationTables {
        grid_width: GRID,
        grid_height: GRID,
        vertex_uv,
        rest_vertices,
        face_to_v,
        joint_texels,
    })
}

fn main() -> Result<()> {
    println!("=== Mesher Bench ({}) ===", env!("GIT_VERSION"));

    let tables = synthetic_tables();
    println!(
        "mesh: {} vertices, {} faces, {}x{} grid",
        tables.vertex_count(),
        tables.face_count(),
        GRID,
        GRID
    );

    let mesher = BodyMesher::new(
        tables,
        Box::new(SyntheticBackend),
        &MesherConfig::default(),
        &FilterConfig::default(),
        &DampeningConfig::default(),
    )?;

    let features = synthetic_features();
    let identity = Matrix4::identity();

    // warmup
    let mesh = mesher.process_vision_output(&features, &identity, &identity)?;
    println!("derived joints: {}", mesh.joints.len());

    let iterations = 500;
    let start = Instant::now();
    for _ in 0..iterations {
        let _ = mesher.process_vision_output(&features, &identity, &identity)?;
    }
    let elapsed = start.elapsed();

    let avg_ms = elapsed.as_secs_f64() * 1000.0 / iterations as f64;
    println!(
        "process_vision_output: {:.3}ms/frame = {:.1} FPS",
        avg_ms,
        1000.0 / avg_ms
    );

    Ok(())
}
