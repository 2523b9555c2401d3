use crate::body::{JointFrame, JointSample, JointType};
use crate::config::FilterConfig;

/// Low-pass filter component
struct LowPassFilter {
    prev: Option<f32>,
}

impl LowPassFilter {
    fn new() -> Self {
        Self { prev: None }
    }

    fn filter(&mut self, value: f32, alpha: f32) -> f32 {
        match self.prev {
            Some(prev) => {
                let result = alpha * value + (1.0 - alpha) * prev;
                self.prev = Some(result);
                result
            }
            None => {
                self.prev = Some(value);
                value
            }
        }
    }

    fn reset(&mut self) {
        self.prev = None;
    }
}

/// alpha = 1 / (1 + tau/Te), tau = 1/(2*pi*fc)
fn smoothing_factor(te: f32, cutoff: f32) -> f32 {
    let r = 2.0 * std::f32::consts::PI * cutoff * te;
    r / (r + 1.0)
}

/// One Euro Filter for a single scalar value
struct ScalarFilter {
    min_cutoff: f32,
    beta: f32,
    d_cutoff: f32,
    x_filter: LowPassFilter,
    dx_filter: LowPassFilter,
    prev_value: Option<f32>,
}

impl ScalarFilter {
    fn new(min_cutoff: f32, beta: f32, d_cutoff: f32) -> Self {
        Self {
            min_cutoff,
            beta,
            d_cutoff,
            x_filter: LowPassFilter::new(),
            dx_filter: LowPassFilter::new(),
            prev_value: None,
        }
    }

    fn filter(&mut self, value: f32, dt: f32) -> f32 {
        let dx = match self.prev_value {
            Some(prev) => {
                if dt > 0.0 {
                    (value - prev) / dt
                } else {
                    0.0
                }
            }
            None => 0.0,
        };
        self.prev_value = Some(value);

        let edx = self
            .dx_filter
            .filter(dx, smoothing_factor(dt, self.d_cutoff));
        let cutoff = self.min_cutoff + self.beta * edx.abs();
        self.x_filter.filter(value, smoothing_factor(dt, cutoff))
    }

    fn reset(&mut self) {
        self.x_filter.reset();
        self.dx_filter.reset();
        self.prev_value = None;
    }
}

/// ジョイントフレーム用 One Euro Filter
///
/// 成分ごとに独立した ScalarFilter を持つ。速度が大きいほどカットオフが
/// 上がり、低速時のジッタ除去と高速時の応答性を両立する。
///
/// 信頼度が閾値未満のジョイントはフィルタに通さず、前回のフィルタ済み
/// 値をそのまま出力する（一度も観測されていなければ出力からも省く）。
pub struct BodyPoseFilter {
    filters: Vec<[ScalarFilter; 3]>,
    prev_output: [Option<JointSample>; JointType::COUNT],
    confidence_threshold: f32,
}

impl BodyPoseFilter {
    pub fn new(min_cutoff: f32, beta: f32, d_cutoff: f32, confidence_threshold: f32) -> Self {
        let filters = (0..JointType::COUNT)
            .map(|_| std::array::from_fn(|_| ScalarFilter::new(min_cutoff, beta, d_cutoff)))
            .collect();
        Self {
            filters,
            prev_output: [None; JointType::COUNT],
            confidence_threshold,
        }
    }

    pub fn from_config(config: &FilterConfig) -> Self {
        Self::new(
            config.min_cutoff,
            config.beta,
            config.d_cutoff,
            config.confidence_threshold,
        )
    }

    /// 1フレーム分をフィルタする。dt_ms は前フレームからの経過ミリ秒。
    pub fn apply(&mut self, raw: &JointFrame, dt_ms: f64) -> JointFrame {
        let dt = (dt_ms / 1000.0) as f32;
        let mut out = JointFrame::new();

        for joint in JointType::ALL {
            let idx = joint as usize;
            let sample = raw.get(joint).copied();

            match sample {
                Some(s) if s.is_valid(self.confidence_threshold) => {
                    let f = &mut self.filters[idx];
                    let position = [
                        f[0].filter(s.position[0], dt),
                        f[1].filter(s.position[1], dt),
                        f[2].filter(s.position[2], dt),
                    ];
                    let filtered = JointSample::new(position, s.confidence);
                    self.prev_output[idx] = Some(filtered);
                    out.set(joint, filtered);
                }
                _ => {
                    // hold last filtered value; omit if never seen
                    if let Some(prev) = self.prev_output[idx] {
                        out.set(joint, prev);
                    }
                }
            }
        }
        out
    }

    pub fn reset(&mut self) {
        for joint_filters in &mut self.filters {
            for f in joint_filters {
                f.reset();
            }
        }
        self.prev_output = [None; JointType::COUNT];
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DT: f64 = 33.0; // ms

    fn frame_with(joint: JointType, position: [f32; 3], confidence: f32) -> JointFrame {
        let mut frame = JointFrame::new();
        frame.set(joint, JointSample::new(position, confidence));
        frame
    }

    #[test]
    fn test_smoothing_factor_bounds() {
        for &cutoff in &[0.1, 1.0, 10.0, 100.0] {
            for &te in &[0.001, 0.01, 0.033, 0.1] {
                let alpha = smoothing_factor(te, cutoff);
                assert!(alpha > 0.0 && alpha < 1.0, "alpha={} for te={}, cutoff={}", alpha, te, cutoff);
            }
        }
    }

    #[test]
    fn test_first_frame_passthrough() {
        let mut filter = BodyPoseFilter::new(1.0, 0.0, 1.0, 0.1);
        let raw = frame_with(JointType::Neck, [0.5, 0.6, 0.0], 0.9);
        let out = filter.apply(&raw, DT);
        assert_eq!(out.get(JointType::Neck).unwrap().position, [0.5, 0.6, 0.0]);
    }

    #[test]
    fn test_smooths_second_frame() {
        let mut filter = BodyPoseFilter::new(1.0, 0.0, 1.0, 0.1);
        filter.apply(&frame_with(JointType::Neck, [0.0, 0.0, 0.0], 0.9), DT);
        let out = filter.apply(&frame_with(JointType::Neck, [10.0, 0.0, 0.0], 0.9), DT);
        let x = out.get(JointType::Neck).unwrap().position[0];
        assert!(x > 0.0 && x < 10.0, "expected smoothing, got {}", x);
    }

    #[test]
    fn test_high_beta_more_responsive() {
        let mut low = BodyPoseFilter::new(1.0, 0.0, 1.0, 0.1);
        let mut high = BodyPoseFilter::new(1.0, 1.0, 1.0, 0.1);

        low.apply(&frame_with(JointType::Neck, [0.0; 3], 0.9), DT);
        high.apply(&frame_with(JointType::Neck, [0.0; 3], 0.9), DT);

        let target = frame_with(JointType::Neck, [10.0, 0.0, 0.0], 0.9);
        let r_low = low.apply(&target, DT).get(JointType::Neck).unwrap().position[0];
        let r_high = high.apply(&target, DT).get(JointType::Neck).unwrap().position[0];
        assert!(r_high > r_low, "high beta ({}) should lag less than low beta ({})", r_high, r_low);
    }

    #[test]
    fn test_zero_confidence_holds_previous() {
        let mut filter = BodyPoseFilter::new(1.0, 0.0, 1.0, 0.1);
        let prev = filter.apply(&frame_with(JointType::Neck, [1.0, 2.0, 3.0], 0.9), DT);

        // all-zero-confidence raw frame: output is the previous frame unchanged
        let mut zero = JointFrame::new();
        for joint in JointType::ALL {
            zero.set(joint, JointSample::new([99.0; 3], 0.0));
        }
        let out = filter.apply(&zero, DT);
        assert_eq!(out, prev);
    }

    #[test]
    fn test_never_seen_joint_omitted() {
        let mut filter = BodyPoseFilter::new(1.0, 0.0, 1.0, 0.1);
        let raw = frame_with(JointType::LeftWrist, [1.0; 3], 0.05);
        let out = filter.apply(&raw, DT);
        assert!(out.get(JointType::LeftWrist).is_none());
        assert!(out.is_empty());
    }

    #[test]
    fn test_reset() {
        let mut filter = BodyPoseFilter::new(1.0, 0.0, 1.0, 0.1);
        filter.apply(&frame_with(JointType::Neck, [1.0; 3], 0.9), DT);
        filter.reset();

        // after reset, first frame passes through again
        let out = filter.apply(&frame_with(JointType::Neck, [10.0, 0.0, 0.0], 0.9), DT);
        assert_eq!(out.get(JointType::Neck).unwrap().position, [10.0, 0.0, 0.0]);
    }
}
