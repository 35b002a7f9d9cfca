use anyhow::Result;

use crate::detect::result::Detection;
use crate::frame::Frame;

/// Detector backend trait.
///
/// The detector is an opaque collaborator: given one frame it returns the
/// labeled boxes found in it, in the order the model reports them. Order
/// matters downstream because risky-label tie-breaks follow encounter order.
///
/// Backends may keep internal buffers, but no state they keep may change how a
/// later frame is classified.
pub trait DetectorBackend: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Run detection on a frame.
    ///
    /// Errors are fatal for the video being processed; the pipeline does not retry.
    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>>;

    /// Optional warm-up hook.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}
