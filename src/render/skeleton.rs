use crate::pose::PartName;

/// 骨格の接続定義 (PoseNet の隣接キーポイント)
///
/// 顔の接続は含まない
pub const SKELETON_CONNECTIONS: [(PartName, PartName); 12] = [
    // 左半身
    (PartName::LeftHip, PartName::LeftShoulder),
    (PartName::LeftElbow, PartName::LeftShoulder),
    (PartName::LeftElbow, PartName::LeftWrist),
    (PartName::LeftHip, PartName::LeftKnee),
    (PartName::LeftKnee, PartName::LeftAnkle),
    // 右半身
    (PartName::RightHip, PartName::RightShoulder),
    (PartName::RightElbow, PartName::RightShoulder),
    (PartName::RightElbow, PartName::RightWrist),
    (PartName::RightHip, PartName::RightKnee),
    (PartName::RightKnee, PartName::RightAnkle),
    // 胴体
    (PartName::LeftShoulder, PartName::RightShoulder),
    (PartName::LeftHip, PartName::RightHip),
];

/// キーポイントの色 (RGB)
pub const KEYPOINT_COLOR: u32 = 0x00FFFF; // aqua

/// 骨格線の色 (RGB)
pub const SKELETON_COLOR: u32 = 0x00FFFF; // aqua

/// キーポイントの半径 (px)
pub const KEYPOINT_RADIUS: u32 = 3;

/// 骨格線の太さ (px)
pub const LINE_WIDTH: u32 = 2;

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_no_duplicate_connections() {
        let mut seen = HashSet::new();
        for (a, b) in SKELETON_CONNECTIONS {
            let key = if (a as usize) < (b as usize) { (a, b) } else { (b, a) };
            assert!(seen.insert(key), "duplicate edge {a}-{b}");
        }
    }

    #[test]
    fn test_face_is_not_connected() {
        let face = [PartName::Nose, PartName::LeftEye, PartName::RightEye, PartName::LeftEar, PartName::RightEar];
        for (a, b) in SKELETON_CONNECTIONS {
            assert!(!face.contains(&a) && !face.contains(&b));
        }
    }
}
