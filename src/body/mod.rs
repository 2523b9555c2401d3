pub mod anim;
pub mod joint;

pub use anim::{AnimationRow, BodyAnimRecorder, BodyAnimationData, IDENTITY_TRANSFORM};
pub use joint::{JointFrame, JointSample, JointType};
