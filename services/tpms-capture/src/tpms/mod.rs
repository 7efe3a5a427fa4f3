//! TPMS protocol validation and field extraction

mod abarth_124;
pub mod checksum;
pub mod protocol;
mod schrader_eg53ma4;
mod schrader_gg4;
mod schrader_smd3ma4;
mod types;

pub use protocol::{Preamble, ProtocolSpec, ValidationError};
pub use types::{BatteryStatus, ProtocolId, Reading, UnknownProtocol, PSI_PER_BAR};
