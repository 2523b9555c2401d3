/// 追跡対象の14ボディジョイント
///
/// ordinal (0〜13) はUVキャリブレーションテーブルや派生ジョイント配列の
/// インデックスとして全コンポーネントで共有される。順序変更は不可。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(usize)]
pub enum JointType {
    Top = 0,
    Neck = 1,
    RightShoulder = 2,
    RightElbow = 3,
    RightWrist = 4,
    LeftShoulder = 5,
    LeftElbow = 6,
    LeftWrist = 7,
    RightHip = 8,
    RightKnee = 9,
    RightAnkle = 10,
    LeftHip = 11,
    LeftKnee = 12,
    LeftAnkle = 13,
}

impl JointType {
    pub const COUNT: usize = 14;

    pub const ALL: [JointType; Self::COUNT] = [
        Self::Top,
        Self::Neck,
        Self::RightShoulder,
        Self::RightElbow,
        Self::RightWrist,
        Self::LeftShoulder,
        Self::LeftElbow,
        Self::LeftWrist,
        Self::RightHip,
        Self::RightKnee,
        Self::RightAnkle,
        Self::LeftHip,
        Self::LeftKnee,
        Self::LeftAnkle,
    ];

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// アニメーションJSONのジョイントキー名
    pub fn name(&self) -> &'static str {
        match self {
            Self::Top => "top",
            Self::Neck => "neck",
            Self::RightShoulder => "rightShoulder",
            Self::RightElbow => "rightElbow",
            Self::RightWrist => "rightWrist",
            Self::LeftShoulder => "leftShoulder",
            Self::LeftElbow => "leftElbow",
            Self::LeftWrist => "leftWrist",
            Self::RightHip => "rightHip",
            Self::RightKnee => "rightKnee",
            Self::RightAnkle => "rightAnkle",
            Self::LeftHip => "leftHip",
            Self::LeftKnee => "leftKnee",
            Self::LeftAnkle => "leftAnkle",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|j| j.name() == name)
    }
}

/// 単一ジョイントのサンプル
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JointSample {
    /// 位置 (宣言された座標空間での x, y, z)
    pub position: [f32; 3],
    /// 信頼度スコア (0.0〜1.0)
    pub confidence: f32,
}

impl JointSample {
    pub fn new(position: [f32; 3], confidence: f32) -> Self {
        Self { position, confidence }
    }

    /// 信頼度が閾値以上か
    pub fn is_valid(&self, threshold: f32) -> bool {
        self.confidence >= threshold
    }
}

/// 1フレーム分のジョイント集合
///
/// ordinal 固定の14スロット。存在しないジョイントは None。
/// タイムスタンプは保持しない（呼び出し側が並走させる）。
#[derive(Debug, Clone, PartialEq, Default)]
pub struct JointFrame {
    samples: [Option<JointSample>; JointType::COUNT],
}

impl JointFrame {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, joint: JointType) -> Option<&JointSample> {
        self.samples[joint as usize].as_ref()
    }

    pub fn set(&mut self, joint: JointType, sample: JointSample) {
        self.samples[joint as usize] = Some(sample);
    }

    pub fn clear(&mut self, joint: JointType) {
        self.samples[joint as usize] = None;
    }

    pub fn is_empty(&self) -> bool {
        self.samples.iter().all(|s| s.is_none())
    }

    /// 存在するジョイントの数
    pub fn len(&self) -> usize {
        self.samples.iter().filter(|s| s.is_some()).count()
    }

    pub fn iter(&self) -> impl Iterator<Item = (JointType, &JointSample)> {
        self.samples
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.as_ref().map(|s| (JointType::ALL[i], s)))
    }

    /// 全ジョイントの平均信頼度（存在するもののみ）
    pub fn average_confidence(&self) -> f32 {
        let mut sum = 0.0;
        let mut n = 0;
        for (_, s) in self.iter() {
            sum += s.confidence;
            n += 1;
        }
        if n == 0 {
            0.0
        } else {
            sum / n as f32
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_joint_type_count() {
        assert_eq!(JointType::COUNT, 14);
        assert_eq!(JointType::ALL.len(), 14);
    }

    #[test]
    fn test_joint_type_from_index() {
        assert_eq!(JointType::from_index(0), Some(JointType::Top));
        assert_eq!(JointType::from_index(13), Some(JointType::LeftAnkle));
        assert_eq!(JointType::from_index(14), None);
    }

    #[test]
    fn test_joint_type_ordinals_stable() {
        for (i, joint) in JointType::ALL.iter().enumerate() {
            assert_eq!(*joint as usize, i);
        }
    }

    #[test]
    fn test_joint_type_name_round_trip() {
        for joint in JointType::ALL {
            assert_eq!(JointType::from_name(joint.name()), Some(joint));
        }
        assert_eq!(JointType::from_name("tail"), None);
    }

    #[test]
    fn test_sample_is_valid() {
        let s = JointSample::new([0.1, 0.2, 0.0], 0.7);
        assert!(s.is_valid(0.5));
        assert!(!s.is_valid(0.8));
    }

    #[test]
    fn test_frame_set_get() {
        let mut frame = JointFrame::new();
        assert!(frame.is_empty());
        assert!(frame.get(JointType::Neck).is_none());

        frame.set(JointType::Neck, JointSample::new([1.0, 2.0, 3.0], 0.9));
        let s = frame.get(JointType::Neck).unwrap();
        assert_eq!(s.position, [1.0, 2.0, 3.0]);
        assert_eq!(frame.len(), 1);

        frame.clear(JointType::Neck);
        assert!(frame.is_empty());
    }

    #[test]
    fn test_frame_iter_in_ordinal_order() {
        let mut frame = JointFrame::new();
        frame.set(JointType::LeftAnkle, JointSample::new([0.0; 3], 1.0));
        frame.set(JointType::Top, JointSample::new([0.0; 3], 1.0));

        let joints: Vec<JointType> = frame.iter().map(|(j, _)| j).collect();
        assert_eq!(joints, vec![JointType::Top, JointType::LeftAnkle]);
    }

    #[test]
    fn test_average_confidence() {
        let mut frame = JointFrame::new();
        assert_eq!(frame.average_confidence(), 0.0);

        frame.set(JointType::Top, JointSample::new([0.0; 3], 0.4));
        frame.set(JointType::Neck, JointSample::new([0.0; 3], 0.8));
        assert!((frame.average_confidence() - 0.6).abs() < 1e-6);
    }
}
