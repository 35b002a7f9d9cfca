mod backend;
mod backends;
mod registry;
mod result;

pub use backend::DetectorBackend;
#[cfg(feature = "backend-tract")]
pub use backends::{TractBackend, TractSettings};
pub use backends::{DetectionScript, ScriptedBackend};
pub use registry::BackendRegistry;
pub use result::{clean_label, BoundingBox, Detection};
