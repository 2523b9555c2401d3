//! Body mesh reconstruction from the neural UV feature map.
//!
//! The inference backend is a black box behind [`VisionBackend`]: it turns a
//! camera frame into a `(grid_height, grid_width, 3)` feature map whose
//! channels are vision-space x, y in [0, 1] and confidence. This engine maps
//! that array through the UV calibration tables into a viewport-space vertex
//! buffer, a shared static face list and the per-joint positions that feed
//! the pose filter.
//!
//! Reconstruction is deterministic: identical feature map, tables and
//! transforms produce identical output, including the hole-filling search.

use anyhow::{bail, Result};
use nalgebra::{Matrix4, Vector4};
use ndarray::Array3;
use std::collections::VecDeque;
use std::sync::{Arc, Weak};

use crate::body::{JointFrame, JointSample, JointType};
use crate::config::{DampeningConfig, FilterConfig, MesherConfig};
use crate::filter::{BodyPoseFilter, DampeningSampler};

use super::calibration::UvCalibrationTables;
use super::kernel::sampling_kernel;

/// 推論出力: (grid_height, grid_width, 3) = (x, y, confidence)
pub type FeatureMap = Array3<f32>;

/// 物理カメラの向き。前面カメラはX軸を鏡像反転する。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraPosition {
    Front,
    Back,
}

/// ARレイヤーから渡される1カメラフレーム分の入力
#[derive(Clone)]
pub struct CameraFrame {
    pub timestamp_ms: f64,
    pub width: u32,
    pub height: u32,
    /// カメラ画像データ（バックエンドのみが解釈する）
    pub pixels: Arc<Vec<u8>>,
    /// vision空間 [0,1] → image空間 [0,1]
    pub vision_to_image: Matrix4<f32>,
    /// image空間 [0,1] → 正規化ビューポート空間 [0,1]
    pub image_to_viewport: Matrix4<f32>,
}

/// 推論バックエンドの差し替え点
///
/// プラットフォーム/モデルごとの実装を構築時に選択する。再構成アルゴリズム
/// 自体はfeature mapと変換行列を受け取った後はバックエンド非依存。
pub trait VisionBackend: Send {
    fn infer(&mut self, frame: &CameraFrame) -> Result<FeatureMap>;
    fn camera_position(&self) -> CameraPosition;
}

/// 1フレーム分の再構成結果。フレームごとに作り直され、同一性は持たない。
#[derive(Debug, Clone, PartialEq)]
pub struct ReconstructedMesh {
    /// ビューポート空間の頂点列
    pub vertices: Vec<[f32; 3]>,
    /// 静的トポロジ（全フレームで共有、コピーなし）
    pub faces: Arc<Vec<[u32; 3]>>,
    /// ジョイントordinal順の (位置, 信頼度)
    pub joints: Vec<([f32; 3], f32)>,
}

/// レンダリング側へ渡す再構成1回分
#[derive(Debug, Clone)]
pub struct MeshUpdate {
    pub mesh: ReconstructedMesh,
    /// ダンプニング+フィルタ適用後のジョイント
    pub joints: JointFrame,
    pub timestamp_ms: f64,
}

/// メッシュ更新の受け手（レンダリング統合側）
///
/// `faces` バッファのメモリ同一性は保証されない。値としての等価性のみ。
pub trait BodyMesherDelegate: Send + Sync {
    fn on_body_mesh_updated(&self, update: &MeshUpdate);
}

pub struct BodyMesher {
    tables: Arc<UvCalibrationTables>,
    faces: Arc<Vec<[u32; 3]>>,
    kernel: Vec<[i32; 2]>,
    confidence_threshold: f32,
    backend: Box<dyn VisionBackend>,
    filter: BodyPoseFilter,
    dampener: DampeningSampler,
    last_update_ms: Option<f64>,
    delegate: Option<Weak<dyn BodyMesherDelegate>>,
    /// visionループが積み、レンダリングtickが排出する
    pending: VecDeque<MeshUpdate>,
}

impl BodyMesher {
    pub fn new(
        tables: Arc<UvCalibrationTables>,
        backend: Box<dyn VisionBackend>,
        mesher_config: &MesherConfig,
        filter_config: &FilterConfig,
        dampening_config: &DampeningConfig,
    ) -> Result<Self> {
        tables.validate()?;
        let faces = Self::build_mesh_faces(&tables);
        Ok(Self {
            tables,
            faces,
            kernel: sampling_kernel(mesher_config.max_sampling_distance),
            confidence_threshold: mesher_config.confidence_threshold,
            backend,
            filter: BodyPoseFilter::from_config(filter_config),
            dampener: DampeningSampler::from_config(dampening_config),
            last_update_ms: None,
            delegate: None,
            pending: VecDeque::new(),
        })
    }

    /// 面リストを構築する。トポロジは静的なので構築は一度だけで、
    /// 以後の全フレーム出力が同じ `Arc` を共有する。
    fn build_mesh_faces(tables: &UvCalibrationTables) -> Arc<Vec<[u32; 3]>> {
        let faces = tables
            .face_to_v
            .chunks_exact(3)
            .map(|c| [c[0], c[1], c[2]])
            .collect();
        Arc::new(faces)
    }

    pub fn faces(&self) -> Arc<Vec<[u32; 3]>> {
        Arc::clone(&self.faces)
    }

    pub fn set_delegate(&mut self, delegate: &Arc<dyn BodyMesherDelegate>) {
        self.delegate = Some(Arc::downgrade(delegate));
    }

    pub fn dampening_period_ms(&self) -> f64 {
        self.dampener.period_ms()
    }

    pub fn set_dampening_period_ms(&mut self, period_ms: f64) {
        self.dampener.set_period_ms(period_ms);
    }

    /// UV座標をテクセル座標に丸める
    fn texel_of(&self, uv: [f32; 2]) -> (usize, usize) {
        let x = (uv[0] * (self.tables.grid_width - 1) as f32).round() as usize;
        let y = (uv[1] * (self.tables.grid_height - 1) as f32).round() as usize;
        (
            x.min(self.tables.grid_width - 1),
            y.min(self.tables.grid_height - 1),
        )
    }

    /// テクセル (x, y) の使用可能なサンプルを探す。
    ///
    /// その場の信頼度が閾値未満なら、サンプリングカーネルを距離昇順に
    /// 探索し、最初に閾値を満たした近傍を採用する。探索し尽くしたら None。
    fn sample_texel(&self, features: &FeatureMap, x: usize, y: usize) -> Option<([f32; 2], f32)> {
        let read = |tx: i64, ty: i64| -> Option<([f32; 2], f32)> {
            if tx < 0
                || ty < 0
                || tx >= self.tables.grid_width as i64
                || ty >= self.tables.grid_height as i64
            {
                return None;
            }
            let (tx, ty) = (tx as usize, ty as usize);
            let confidence = features[[ty, tx, 2]];
            if confidence >= self.confidence_threshold {
                Some(([features[[ty, tx, 0]], features[[ty, tx, 1]]], confidence))
            } else {
                None
            }
        };

        if let Some(hit) = read(x as i64, y as i64) {
            return Some(hit);
        }
        for offset in &self.kernel {
            if let Some(hit) = read(x as i64 + offset[0] as i64, y as i64 + offset[1] as i64) {
                return Some(hit);
            }
        }
        None
    }

    /// vision空間の点をviewport空間へ射影する
    fn project(
        &self,
        point: [f32; 2],
        vision_to_image: &Matrix4<f32>,
        image_to_viewport: &Matrix4<f32>,
    ) -> [f32; 3] {
        let mut image = vision_to_image * Vector4::new(point[0], point[1], 0.0, 1.0);
        if self.backend.camera_position() == CameraPosition::Front {
            // 前面カメラは鏡像
            image.x = 1.0 - image.x;
        }
        let viewport = image_to_viewport * image;
        [viewport.x, viewport.y, viewport.z]
    }

    /// 頂点バッファを構築する。信頼できるテクセルの無い頂点はレスト位置に退避。
    pub fn build_mesh_vertices(
        &self,
        features: &FeatureMap,
        vision_to_image: &Matrix4<f32>,
        image_to_viewport: &Matrix4<f32>,
    ) -> Vec<[f32; 3]> {
        let mut vertices = Vec::with_capacity(self.tables.vertex_count());
        for (i, &uv) in self.tables.vertex_uv.iter().enumerate() {
            let (x, y) = self.texel_of(uv);
            match self.sample_texel(features, x, y) {
                Some((point, _)) => {
                    vertices.push(self.project(point, vision_to_image, image_to_viewport));
                }
                None => vertices.push(self.tables.rest_vertices[i]),
            }
        }
        vertices
    }

    /// 各ジョイントのテクセル集合から粗いジョイント位置を導出する。
    ///
    /// 位置は信頼度加重平均、信頼度はセル集合全体の平均。欠損セルは
    /// エラーではなく低信頼度として現れる。
    pub fn derive_joints(
        &self,
        features: &FeatureMap,
        vision_to_image: &Matrix4<f32>,
        image_to_viewport: &Matrix4<f32>,
    ) -> Vec<([f32; 3], f32)> {
        let mut joints = Vec::with_capacity(JointType::COUNT);
        for joint in JointType::ALL {
            let texels = &self.tables.joint_texels[joint as usize];
            let mut weight_sum = 0.0_f32;
            let mut sum = [0.0_f32; 2];
            let mut confidence_sum = 0.0_f32;

            for t in texels {
                let (tx, ty) = (t[0] as usize, t[1] as usize);
                let confidence = features[[ty, tx, 2]];
                confidence_sum += confidence;
                if confidence > 0.0 {
                    sum[0] += features[[ty, tx, 0]] * confidence;
                    sum[1] += features[[ty, tx, 1]] * confidence;
                    weight_sum += confidence;
                }
            }

            if weight_sum > 0.0 {
                let point = [sum[0] / weight_sum, sum[1] / weight_sum];
                let position = self.project(point, vision_to_image, image_to_viewport);
                joints.push((position, confidence_sum / texels.len() as f32));
            } else {
                joints.push(([0.0; 3], 0.0));
            }
        }
        joints
    }

    /// 1回分の推論出力をメッシュ+ジョイントに変換する。
    ///
    /// feature mapの形状がキャリブレーショングリッドと合わない場合は
    /// 設定エラーとして即座に失敗する（フレーム単位の回復対象ではない）。
    pub fn process_vision_output(
        &self,
        features: &FeatureMap,
        vision_to_image: &Matrix4<f32>,
        image_to_viewport: &Matrix4<f32>,
    ) -> Result<ReconstructedMesh> {
        let (h, w, c) = features.dim();
        if h != self.tables.grid_height || w != self.tables.grid_width || c < 3 {
            bail!(
                "feature map {}x{}x{} does not match calibration grid {}x{}x3",
                h,
                w,
                c,
                self.tables.grid_height,
                self.tables.grid_width
            );
        }

        let vertices = self.build_mesh_vertices(features, vision_to_image, image_to_viewport);
        let joints = self.derive_joints(features, vision_to_image, image_to_viewport);
        Ok(ReconstructedMesh {
            vertices,
            faces: Arc::clone(&self.faces),
            joints,
        })
    }

    /// ライブフレーム入力。visionループから同期的に呼ばれる。
    ///
    /// 推論 → 再構成 → ダンプニング → フィルタの順に処理し、結果を
    /// レンダリングtickが排出するキューへ積む。
    pub fn update(&mut self, frame: &CameraFrame) -> Result<()> {
        let features = self.backend.infer(frame)?;
        let mesh =
            self.process_vision_output(&features, &frame.vision_to_image, &frame.image_to_viewport)?;

        let mut raw = JointFrame::new();
        for (i, &(position, confidence)) in mesh.joints.iter().enumerate() {
            if confidence > 0.0 {
                raw.set(JointType::ALL[i], JointSample::new(position, confidence));
            }
        }

        let dampened = self.dampener.sample(std::slice::from_ref(&raw), frame.timestamp_ms);
        let dt_ms = match self.last_update_ms {
            Some(last) => (frame.timestamp_ms - last).max(0.0),
            None => 0.0,
        };
        self.last_update_ms = Some(frame.timestamp_ms);
        let joints = self.filter.apply(&dampened, dt_ms);

        self.pending.push_back(MeshUpdate {
            mesh,
            joints,
            timestamp_ms: frame.timestamp_ms,
        });
        Ok(())
    }

    /// レンダリングtick。キューに積まれた更新をデリゲートへ配送する。
    /// デリゲートが既に破棄されていれば黙って捨てる。
    pub fn on_frame_will_render(&mut self) {
        let delegate = self
            .delegate
            .as_ref()
            .and_then(|weak| weak.upgrade());
        while let Some(update) = self.pending.pop_front() {
            if let Some(delegate) = &delegate {
                delegate.on_body_mesh_updated(&update);
            }
        }
    }

    /// 拡張点として予約。現状は何もしない。
    pub fn on_frame_did_render(&mut self) {}
}
