//! Recorded body-animation data and its JSON document format.
//!
//! Document layout (consumed by the playback engine, produced by the
//! recorder):
//!
//! ```json
//! {
//!   "totalTime": 1000.0,
//!   "animRows": [
//!     { "timestamp": 0.0, "joints": { "neck": [0.1, 0.2, 0.0] } }
//!   ],
//!   "initModelTransform": [16 floats, column-major],
//!   "version": 1,
//!   "boneLengths": { "neck_top": 0.21 }
//! }
//! ```
//!
//! Joint values are `[x, y, z]` or `[x, y, z, confidence]`; a missing
//! confidence defaults to 1.0 on conversion.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::joint::{JointFrame, JointSample, JointType};

/// 単位行列 (column-major)
pub const IDENTITY_TRANSFORM: [f32; 16] = [
    1.0, 0.0, 0.0, 0.0, //
    0.0, 1.0, 0.0, 0.0, //
    0.0, 0.0, 1.0, 0.0, //
    0.0, 0.0, 0.0, 1.0,
];

/// アニメーション1行: タイムスタンプ + ジョイント名→座標のマップ
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnimationRow {
    /// 先頭行からの経過ミリ秒（シーケンス内で非減少）
    #[serde(rename = "timestamp")]
    pub timestamp_ms: f64,
    /// ジョイント名 → [x, y, z] または [x, y, z, confidence]
    pub joints: BTreeMap<String, Vec<f32>>,
}

impl AnimationRow {
    /// ジョイントマップを固定ordinalの `JointFrame` に変換する。
    pub fn to_joint_frame(&self) -> JointFrame {
        let mut frame = JointFrame::new();
        for (name, value) in &self.joints {
            let joint = match JointType::from_name(name) {
                Some(j) => j,
                None => continue, // validated at load time
            };
            if value.len() < 3 {
                continue;
            }
            let confidence = if value.len() >= 4 { value[3] } else { 1.0 };
            frame.set(
                joint,
                JointSample::new([value[0], value[1], value[2]], confidence),
            );
        }
        frame
    }
}

/// 記録済みボディアニメーション一式
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BodyAnimationData {
    /// 総再生時間（ミリ秒）
    #[serde(rename = "totalTime")]
    pub total_time_ms: f64,
    /// タイムスタンプ昇順の行シーケンス
    #[serde(rename = "animRows")]
    pub rows: Vec<AnimationRow>,
    /// 記録開始時のモデル変換行列 (column-major 4x4)
    #[serde(rename = "initModelTransform")]
    pub init_model_transform: [f32; 16],
    pub version: i32,
    /// ジョイントペア名 → ボーン長（キャリブレーション用、任意）
    #[serde(
        rename = "boneLengths",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub bone_lengths: Option<BTreeMap<String, f32>>,
}

impl BodyAnimationData {
    /// JSON文字列からロードして検証する。
    ///
    /// 検証失敗はロード失敗として返す。部分的に構築されたデータが
    /// 呼び出し側に渡ることはない。
    pub fn from_json(json: &str) -> Result<Self> {
        let data: BodyAnimationData =
            serde_json::from_str(json).context("failed to parse body animation JSON")?;
        data.validate()?;
        Ok(data)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    fn validate(&self) -> Result<()> {
        let mut prev_ts = 0.0_f64;
        for (i, row) in self.rows.iter().enumerate() {
            if row.timestamp_ms < prev_ts {
                bail!(
                    "animation row {} timestamp {}ms decreases (prev {}ms)",
                    i,
                    row.timestamp_ms,
                    prev_ts
                );
            }
            prev_ts = row.timestamp_ms;

            for (name, value) in &row.joints {
                if JointType::from_name(name).is_none() {
                    bail!("animation row {} has unknown joint '{}'", i, name);
                }
                if value.len() != 3 && value.len() != 4 {
                    bail!(
                        "animation row {} joint '{}' has {} components (want 3 or 4)",
                        i,
                        name,
                        value.len()
                    );
                }
            }
        }
        Ok(())
    }

    /// 最終行のタイムスタンプ。行がなければ 0。
    pub fn last_row_timestamp(&self) -> f64 {
        self.rows.last().map(|r| r.timestamp_ms).unwrap_or(0.0)
    }
}

/// ライブジョイントフレームからアニメーションを記録するレコーダー
///
/// タイムスタンプは記録開始時刻を 0 にリベースして保存する。
pub struct BodyAnimRecorder {
    start_ms: Option<f64>,
    last_ms: f64,
    rows: Vec<AnimationRow>,
    init_model_transform: [f32; 16],
}

impl BodyAnimRecorder {
    pub fn new() -> Self {
        Self {
            start_ms: None,
            last_ms: 0.0,
            rows: Vec::new(),
            init_model_transform: IDENTITY_TRANSFORM,
        }
    }

    /// 記録を開始する。既存の行は破棄される。
    pub fn begin_record(&mut self, now_ms: f64, init_model_transform: [f32; 16]) {
        self.start_ms = Some(now_ms);
        self.last_ms = now_ms;
        self.rows.clear();
        self.init_model_transform = init_model_transform;
    }

    /// 1フレーム分のジョイントを記録する。`begin_record` 前は何もしない。
    pub fn record(&mut self, frame: &JointFrame, now_ms: f64) {
        let start = match self.start_ms {
            Some(s) => s,
            None => return,
        };
        let mut joints = BTreeMap::new();
        for (joint, sample) in frame.iter() {
            joints.insert(
                joint.name().to_string(),
                vec![
                    sample.position[0],
                    sample.position[1],
                    sample.position[2],
                    sample.confidence,
                ],
            );
        }
        self.last_ms = now_ms;
        self.rows.push(AnimationRow {
            timestamp_ms: (now_ms - start).max(0.0),
            joints,
        });
    }

    /// 記録を終了し、完成したアニメーションデータを返す。
    pub fn end_record(&mut self) -> BodyAnimationData {
        let total = match self.start_ms {
            Some(start) => (self.last_ms - start).max(0.0),
            None => 0.0,
        };
        self.start_ms = None;
        BodyAnimationData {
            total_time_ms: total,
            rows: std::mem::take(&mut self.rows),
            init_model_transform: self.init_model_transform,
            version: 1,
            bone_lengths: None,
        }
    }
}

impl Default for BodyAnimRecorder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_JSON: &str = r#"{
        "totalTime": 1000.0,
        "animRows": [
            { "timestamp": 0.0, "joints": { "neck": [0.1, 0.2, 0.0] } },
            { "timestamp": 500.0, "joints": { "neck": [0.2, 0.2, 0.0, 0.9] } },
            { "timestamp": 1000.0, "joints": { "neck": [0.3, 0.2, 0.0] } }
        ],
        "initModelTransform": [1,0,0,0, 0,1,0,0, 0,0,1,0, 0,0,0,1],
        "version": 1
    }"#;

    #[test]
    fn test_from_json() {
        let data = BodyAnimationData::from_json(SAMPLE_JSON).unwrap();
        assert_eq!(data.total_time_ms, 1000.0);
        assert_eq!(data.rows.len(), 3);
        assert_eq!(data.version, 1);
        assert!(data.bone_lengths.is_none());
        assert_eq!(data.last_row_timestamp(), 1000.0);
    }

    #[test]
    fn test_row_to_joint_frame_confidence_default() {
        let data = BodyAnimationData::from_json(SAMPLE_JSON).unwrap();
        let frame = data.rows[0].to_joint_frame();
        let neck = frame.get(JointType::Neck).unwrap();
        assert_eq!(neck.position, [0.1, 0.2, 0.0]);
        assert_eq!(neck.confidence, 1.0);

        let frame = data.rows[1].to_joint_frame();
        assert_eq!(frame.get(JointType::Neck).unwrap().confidence, 0.9);
    }

    #[test]
    fn test_decreasing_timestamp_rejected() {
        let json = r#"{
            "totalTime": 100.0,
            "animRows": [
                { "timestamp": 100.0, "joints": {} },
                { "timestamp": 50.0, "joints": {} }
            ],
            "initModelTransform": [1,0,0,0, 0,1,0,0, 0,0,1,0, 0,0,0,1],
            "version": 1
        }"#;
        assert!(BodyAnimationData::from_json(json).is_err());
    }

    #[test]
    fn test_unknown_joint_rejected() {
        let json = r#"{
            "totalTime": 0.0,
            "animRows": [
                { "timestamp": 0.0, "joints": { "tail": [0, 0, 0] } }
            ],
            "initModelTransform": [1,0,0,0, 0,1,0,0, 0,0,1,0, 0,0,0,1],
            "version": 1
        }"#;
        assert!(BodyAnimationData::from_json(json).is_err());
    }

    #[test]
    fn test_bad_component_count_rejected() {
        let json = r#"{
            "totalTime": 0.0,
            "animRows": [
                { "timestamp": 0.0, "joints": { "neck": [0, 0] } }
            ],
            "initModelTransform": [1,0,0,0, 0,1,0,0, 0,0,1,0, 0,0,0,1],
            "version": 1
        }"#;
        assert!(BodyAnimationData::from_json(json).is_err());
    }

    #[test]
    fn test_json_round_trip() {
        let data = BodyAnimationData::from_json(SAMPLE_JSON).unwrap();
        let json = data.to_json().unwrap();
        let reloaded = BodyAnimationData::from_json(&json).unwrap();

        assert_eq!(reloaded.total_time_ms, data.total_time_ms);
        assert_eq!(reloaded.rows.len(), data.rows.len());
        for (a, b) in data.rows.iter().zip(reloaded.rows.iter()) {
            assert_eq!(a.timestamp_ms, b.timestamp_ms);
            assert_eq!(a.joints, b.joints);
        }
    }

    #[test]
    fn test_recorder_rebases_timestamps() {
        let mut recorder = BodyAnimRecorder::new();
        recorder.begin_record(5000.0, IDENTITY_TRANSFORM);

        let mut frame = JointFrame::new();
        frame.set(JointType::Neck, JointSample::new([0.1, 0.2, 0.3], 0.8));
        recorder.record(&frame, 5000.0);
        recorder.record(&frame, 5100.0);

        let data = recorder.end_record();
        assert_eq!(data.rows.len(), 2);
        assert_eq!(data.rows[0].timestamp_ms, 0.0);
        assert_eq!(data.rows[1].timestamp_ms, 100.0);
        assert_eq!(data.total_time_ms, 100.0);

        // recorded output loads back through the strict validator
        let json = data.to_json().unwrap();
        let reloaded = BodyAnimationData::from_json(&json).unwrap();
        let neck = reloaded.rows[0].to_joint_frame();
        assert_eq!(neck.get(JointType::Neck).unwrap().confidence, 0.8);
    }

    #[test]
    fn test_record_before_begin_is_noop() {
        let mut recorder = BodyAnimRecorder::new();
        recorder.record(&JointFrame::new(), 100.0);
        let data = recorder.end_record();
        assert!(data.rows.is_empty());
        assert_eq!(data.total_time_ms, 0.0);
    }
}
