use std::fmt;
use std::str::FromStr;

use crate::error::PoseError;

/// PoseNet / MoveNet の 17 部位 (モデル出力順)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(usize)]
pub enum PartName {
    Nose = 0,
    LeftEye = 1,
    RightEye = 2,
    LeftEar = 3,
    RightEar = 4,
    LeftShoulder = 5,
    RightShoulder = 6,
    LeftElbow = 7,
    RightElbow = 8,
    LeftWrist = 9,
    RightWrist = 10,
    LeftHip = 11,
    RightHip = 12,
    LeftKnee = 13,
    RightKnee = 14,
    LeftAnkle = 15,
    RightAnkle = 16,
}

impl PartName {
    pub const COUNT: usize = 17;

    pub const ALL: [PartName; PartName::COUNT] = [
        Self::Nose,
        Self::LeftEye,
        Self::RightEye,
        Self::LeftEar,
        Self::RightEar,
        Self::LeftShoulder,
        Self::RightShoulder,
        Self::LeftElbow,
        Self::RightElbow,
        Self::LeftWrist,
        Self::RightWrist,
        Self::LeftHip,
        Self::RightHip,
        Self::LeftKnee,
        Self::RightKnee,
        Self::LeftAnkle,
        Self::RightAnkle,
    ];

    /// モデルが使う camelCase 名
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Nose => "nose",
            Self::LeftEye => "leftEye",
            Self::RightEye => "rightEye",
            Self::LeftEar => "leftEar",
            Self::RightEar => "rightEar",
            Self::LeftShoulder => "leftShoulder",
            Self::RightShoulder => "rightShoulder",
            Self::LeftElbow => "leftElbow",
            Self::RightElbow => "rightElbow",
            Self::LeftWrist => "leftWrist",
            Self::RightWrist => "rightWrist",
            Self::LeftHip => "leftHip",
            Self::RightHip => "rightHip",
            Self::LeftKnee => "leftKnee",
            Self::RightKnee => "rightKnee",
            Self::LeftAnkle => "leftAnkle",
            Self::RightAnkle => "rightAnkle",
        }
    }
}

impl fmt::Display for PartName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PartName {
    type Err = PoseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|part| part.as_str() == s)
            .ok_or_else(|| PoseError::UnknownPart(s.to_string()))
    }
}

/// ピクセル座標
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

/// 単一キーポイント
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Keypoint {
    pub part: PartName,
    /// フレーム上のピクセル座標
    pub position: Position,
    /// 信頼度スコア (0.0〜1.0)
    pub score: f32,
}

impl Keypoint {
    pub fn new(part: PartName, x: f32, y: f32, score: f32) -> Self {
        Self {
            part,
            position: Position { x, y },
            score,
        }
    }

    /// 信頼度が閾値以上か (閾値を含む)
    pub fn is_valid(&self, threshold: f32) -> bool {
        self.score >= threshold
    }
}

/// 1 回の推定結果。生成後は変更しない。
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PoseResult {
    keypoints: Vec<Keypoint>,
}

impl PoseResult {
    /// 同じ部位が 2 回出てきたらエラー
    pub fn new(keypoints: Vec<Keypoint>) -> Result<Self, PoseError> {
        let mut seen = [false; PartName::COUNT];
        for kp in &keypoints {
            let slot = &mut seen[kp.part as usize];
            if *slot {
                return Err(PoseError::DuplicatePart(kp.part));
            }
            *slot = true;
        }
        Ok(Self { keypoints })
    }

    /// MoveNet の正規化座標 (0.0〜1.0) をフレームサイズでピクセル座標に変換
    ///
    /// 入力は `[y, x, score]` × 17 (モデル出力順)
    pub fn from_normalized(raw: &[[f32; 3]; PartName::COUNT], width: u32, height: u32) -> Self {
        let keypoints = PartName::ALL
            .iter()
            .zip(raw.iter())
            .map(|(&part, &[y, x, score])| {
                Keypoint::new(part, x * width as f32, y * height as f32, score)
            })
            .collect();
        Self { keypoints }
    }

    /// 部位でキーポイントを取得
    pub fn get(&self, part: PartName) -> Option<&Keypoint> {
        self.keypoints.iter().find(|kp| kp.part == part)
    }

    pub fn require(&self, part: PartName) -> Result<&Keypoint, PoseError> {
        self.get(part).ok_or(PoseError::MissingKeypoint(part))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Keypoint> {
        self.keypoints.iter()
    }

    pub fn len(&self) -> usize {
        self.keypoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keypoints.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_part_name_count() {
        assert_eq!(PartName::COUNT, 17);
        assert_eq!(PartName::ALL.len(), PartName::COUNT);
    }

    #[test]
    fn test_part_name_round_trips_through_str() {
        for part in PartName::ALL {
            assert_eq!(part.as_str().parse::<PartName>(), Ok(part));
        }
        assert_eq!(
            "leftFoot".parse::<PartName>(),
            Err(PoseError::UnknownPart("leftFoot".into()))
        );
    }

    #[test]
    fn test_keypoint_is_valid_inclusive() {
        let kp = Keypoint::new(PartName::Nose, 10.0, 20.0, 0.6);
        assert!(kp.is_valid(0.6));
        assert!(!kp.is_valid(0.61));
    }

    #[test]
    fn test_pose_rejects_duplicate_part() {
        let result = PoseResult::new(vec![
            Keypoint::new(PartName::Nose, 0.0, 0.0, 0.9),
            Keypoint::new(PartName::LeftEye, 0.0, 0.0, 0.9),
            Keypoint::new(PartName::Nose, 1.0, 1.0, 0.5),
        ]);
        assert_eq!(result, Err(PoseError::DuplicatePart(PartName::Nose)));
    }

    #[test]
    fn test_pose_get_and_require() {
        let pose = PoseResult::new(vec![Keypoint::new(PartName::Nose, 320.0, 120.0, 0.9)]).unwrap();
        let nose = pose.get(PartName::Nose).unwrap();
        assert_eq!(nose.position, Position { x: 320.0, y: 120.0 });
        assert!(pose.get(PartName::LeftEye).is_none());
        assert_eq!(
            pose.require(PartName::RightEye),
            Err(PoseError::MissingKeypoint(PartName::RightEye))
        );
    }

    #[test]
    fn test_from_normalized_scales_to_pixels() {
        let mut raw = [[0.0f32; 3]; PartName::COUNT];
        raw[PartName::Nose as usize] = [0.25, 0.5, 0.8];
        let pose = PoseResult::from_normalized(&raw, 640, 480);

        assert_eq!(pose.len(), PartName::COUNT);
        let nose = pose.get(PartName::Nose).unwrap();
        assert_eq!(nose.position.x, 320.0);
        assert_eq!(nose.position.y, 120.0);
        assert_eq!(nose.score, 0.8);
    }
}
