mod status;
mod tracker;

pub use status::{Lifecycle, ModelStatus, RemoteModelStatuses};
pub use tracker::{ModelStatusTracker, TrackerSnapshot, DEFAULT_SELECTED_MODEL};
