//! TPMS capture - Manchester edge decoder and sweep search for sub-GHz
//! tire pressure sensors

pub mod capture;
pub mod config;
pub mod decoder;
pub mod history;
pub mod radio;
pub mod session;
pub mod sweep;
pub mod tpms;
