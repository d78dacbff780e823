use crate::error::RecorderError;
use tokio::sync::mpsc;

/// Frequency-analysis primitive: a live view of the capture signal.
pub trait SpectrumSource: Send + Sync {
    /// Snapshot of the current frequency-domain magnitude buffer, one value
    /// per bin.
    fn magnitudes(&self) -> Vec<f32>;
}

/// Handles produced by a capture backend once the device grants access.
pub struct CaptureSession {
    /// Energy analyzer over the live stream.
    pub spectrum: Box<dyn SpectrumSource>,
    /// Encoded chunk stream. The backend's encoder emits one chunk per
    /// encoder interval (100 ms) for as long as the session is live.
    pub chunks: mpsc::Receiver<Vec<u8>>,
}

/// Audio capture backend trait
///
/// Owns the device-capture primitive, the analyzer, and the encoder for one
/// capture session. Implementations are platform- or source-specific; the
/// recorder only depends on this surface.
#[async_trait::async_trait]
pub trait CaptureBackend: Send + Sync {
    /// Request access to the capture device and start the live session.
    ///
    /// Fails with `RecorderError::DeviceAccess` if permission is denied or
    /// no device is available. No retry is attempted here.
    async fn start(&mut self) -> Result<CaptureSession, RecorderError>;

    /// Stop capturing and release the device and processing resources.
    async fn stop(&mut self) -> Result<(), RecorderError>;

    /// Check if backend is currently capturing
    fn is_capturing(&self) -> bool;

    /// Get backend name for logging
    fn name(&self) -> &str;
}
