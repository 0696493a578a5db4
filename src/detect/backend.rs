use anyhow::Result;

use crate::detect::result::Detection;
use crate::frame::Frame;

/// Person detector backend.
///
/// The monitor treats the detector as a black box: given a frame it returns
/// bounding boxes for the "person" class only, in frame pixel coordinates.
/// Any other classes the underlying model knows about are filtered out by the
/// backend before returning.
pub trait PersonDetector {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Run detection on a frame.
    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>>;

    /// Optional warm-up hook.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}
