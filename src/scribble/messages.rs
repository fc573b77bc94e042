use image::RgbaImage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(pub u64);

#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    Fetched(RgbaImage),
    LoadFailed { error: String },
    WorkerPanicked { message: String },
}

impl FetchOutcome {
    pub fn into_bitmap(self) -> Option<RgbaImage> {
        match self {
            FetchOutcome::Fetched(bitmap) => Some(bitmap),
            FetchOutcome::LoadFailed { .. } | FetchOutcome::WorkerPanicked { .. } => None,
        }
    }
}

/// Sent once per render request from the fetch worker back to the
/// interactive thread.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderMessage {
    pub request_id: RequestId,
    pub generation: u64,
    pub outcome: FetchOutcome,
}
