/// Caller-supplied steering for model selection on one frame.
///
/// `target_size` names the model resolution the caller would like used;
/// the other fields describe how the frame was prepared and are informational.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RoiHint {
    pub target_size: Option<u32>,
    pub crop_applied: bool,
    pub num_rois: u32,
}

impl RoiHint {
    pub fn with_target_size(target_size: u32) -> Self {
        Self {
            target_size: Some(target_size),
            ..Self::default()
        }
    }
}
