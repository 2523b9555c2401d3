pub mod calibration;
pub mod kernel;
pub mod mesher;

pub use calibration::UvCalibrationTables;
pub use kernel::sampling_kernel;
pub use mesher::{
    BodyMesher, BodyMesherDelegate, CameraFrame, CameraPosition, FeatureMap, MeshUpdate,
    ReconstructedMesh, VisionBackend,
};
