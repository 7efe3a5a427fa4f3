//! Radio front-end boundary: tunable settings and the receive-control trait

mod frontend;
mod settings;

pub use frontend::{is_frequency_supported, LoggingFrontend, RadioError, RadioFrontend};
pub use settings::{ModulationPreset, RadioSettings, UnknownPreset, DEFAULT_FREQUENCY_HZ};
