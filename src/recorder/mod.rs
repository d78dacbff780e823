pub mod backend;
pub mod recorder;
pub mod volume;

pub use backend::{CaptureBackend, CaptureSession, SpectrumSource};
pub use recorder::{
    ChunkHandler, RecorderCallbacks, RecorderOptions, RecorderStats, SilenceAwareRecorder,
    SilenceHandler, VolumeHandler,
};
pub use volume::volume_db;
