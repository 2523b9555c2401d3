pub mod dampening;
pub mod one_euro;

pub use dampening::DampeningSampler;
pub use one_euro::BodyPoseFilter;
