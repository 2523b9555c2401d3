use crate::body::{JointFrame, JointSample, JointType};
use crate::config::DampeningConfig;

/// ウィンドウ方式のダンプニングサンプラー
///
/// `period_ms` のウィンドウ内に観測した候補フレームを蓄積し、ウィンドウが
/// 閉じた時点でジョイントごとの**信頼度加重平均**を1フレームとして放出する。
/// ローパスフィルタと違い位相遅れを持たないため、オクルージョンによる
/// 単発スパイクの抑制に向く。
///
/// period 0 はダンプニング無効: 最新候補をそのまま返す。
/// ウィンドウ内に有効サンプルが無いジョイントは、既知の最新値に退避する。
pub struct DampeningSampler {
    period_ms: f64,
    window_start: Option<f64>,
    window: Vec<JointFrame>,
    last_emitted: Option<JointFrame>,
    last_known: [Option<JointSample>; JointType::COUNT],
}

impl DampeningSampler {
    pub fn new(period_ms: f64) -> Self {
        Self {
            period_ms,
            window_start: None,
            window: Vec::new(),
            last_emitted: None,
            last_known: [None; JointType::COUNT],
        }
    }

    pub fn from_config(config: &DampeningConfig) -> Self {
        Self::new(config.period_ms)
    }

    pub fn period_ms(&self) -> f64 {
        self.period_ms
    }

    /// ダンプニング周期を変更する。進行中のウィンドウは破棄される。
    pub fn set_period_ms(&mut self, period_ms: f64) {
        self.period_ms = period_ms;
        self.window.clear();
        self.window_start = None;
    }

    /// 候補フレーム列を取り込み、現時点で出力すべきフレームを返す。
    pub fn sample(&mut self, candidates: &[JointFrame], now_ms: f64) -> JointFrame {
        for frame in candidates {
            for (joint, sample) in frame.iter() {
                if sample.confidence > 0.0 {
                    self.last_known[joint as usize] = Some(*sample);
                }
            }
        }

        if self.period_ms <= 0.0 {
            let out = match candidates.last() {
                Some(frame) => frame.clone(),
                None => self.last_emitted.clone().unwrap_or_default(),
            };
            self.last_emitted = Some(out.clone());
            return out;
        }

        if !candidates.is_empty() {
            if self.window.is_empty() {
                self.window_start = Some(now_ms);
            }
            self.window.extend_from_slice(candidates);
        }

        let window_start = match self.window_start {
            Some(s) => s,
            None => return self.held_frame(candidates),
        };

        if window_start + self.period_ms > now_ms {
            return self.held_frame(candidates);
        }

        // window closed: aggregate and reset
        let emitted = self.aggregate_window();
        self.window.clear();
        self.window_start = None;
        self.last_emitted = Some(emitted.clone());
        emitted
    }

    /// ウィンドウが閉じるまでの間に返す値
    fn held_frame(&self, candidates: &[JointFrame]) -> JointFrame {
        match (&self.last_emitted, candidates.last()) {
            (Some(emitted), _) => emitted.clone(),
            (None, Some(latest)) => latest.clone(),
            (None, None) => JointFrame::new(),
        }
    }

    fn aggregate_window(&self) -> JointFrame {
        let mut out = JointFrame::new();
        for joint in JointType::ALL {
            let mut weight_sum = 0.0_f32;
            let mut position = [0.0_f32; 3];
            let mut confidence_sum = 0.0_f32;
            let mut count = 0;

            for frame in &self.window {
                if let Some(sample) = frame.get(joint) {
                    if sample.confidence <= 0.0 {
                        continue;
                    }
                    for (p, s) in position.iter_mut().zip(sample.position.iter()) {
                        *p += s * sample.confidence;
                    }
                    weight_sum += sample.confidence;
                    confidence_sum += sample.confidence;
                    count += 1;
                }
            }

            if count > 0 && weight_sum > 0.0 {
                for p in &mut position {
                    *p /= weight_sum;
                }
                out.set(joint, JointSample::new(position, confidence_sum / count as f32));
            } else if let Some(known) = self.last_known[joint as usize] {
                out.set(joint, known);
            }
        }
        out
    }

    pub fn reset(&mut self) {
        self.window.clear();
        self.window_start = None;
        self.last_emitted = None;
        self.last_known = [None; JointType::COUNT];
    }
}
