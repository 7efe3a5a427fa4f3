//! TPMS data types

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

/// 1 bar in PSI
pub const PSI_PER_BAR: f32 = 14.5038;

/// Supported sensor protocols
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum ProtocolId {
    SchraderGg4,
    SchraderSmd3ma4,
    SchraderEg53ma4,
    Abarth124,
}

impl ProtocolId {
    /// All protocols in registry order
    pub const ALL: [ProtocolId; 4] = [
        ProtocolId::SchraderGg4,
        ProtocolId::SchraderSmd3ma4,
        ProtocolId::SchraderEg53ma4,
        ProtocolId::Abarth124,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ProtocolId::SchraderGg4 => "Schrader GG4",
            ProtocolId::SchraderSmd3ma4 => "Schrader SMD3MA4",
            ProtocolId::SchraderEg53ma4 => "Schrader EG53MA4",
            ProtocolId::Abarth124 => "Abarth 124",
        }
    }

    /// Hex digits used when printing a sensor ID
    pub fn id_hex_width(&self) -> usize {
        match self {
            ProtocolId::SchraderGg4 => 7,
            ProtocolId::Abarth124 => 8,
            ProtocolId::SchraderSmd3ma4 | ProtocolId::SchraderEg53ma4 => 6,
        }
    }
}

impl fmt::Display for ProtocolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown TPMS protocol '{0}'")]
pub struct UnknownProtocol(pub String);

impl FromStr for ProtocolId {
    type Err = UnknownProtocol;

    /// Accepts the display name or the bare model ("EG53MA4"), case and
    /// whitespace insensitive.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '_' && *c != '-')
            .collect::<String>()
            .to_ascii_lowercase();
        let key = key.strip_prefix("schrader").unwrap_or(&key);

        match key {
            "gg4" => Ok(ProtocolId::SchraderGg4),
            "smd3ma4" => Ok(ProtocolId::SchraderSmd3ma4),
            "eg53ma4" => Ok(ProtocolId::SchraderEg53ma4),
            "abarth124" => Ok(ProtocolId::Abarth124),
            _ => Err(UnknownProtocol(s.to_string())),
        }
    }
}

/// Battery state reported by the sensor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BatteryStatus {
    Ok,
    Low,
    NotApplicable,
}

impl BatteryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BatteryStatus::Ok => "OK",
            BatteryStatus::Low => "Low",
            BatteryStatus::NotApplicable => "N/A",
        }
    }
}

/// A validated sensor reading
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reading {
    pub protocol: ProtocolId,

    /// Sensor serial number, never zero
    pub sensor_id: u32,

    /// Tire pressure in bar
    pub pressure_bar: f32,

    /// Temperature in degrees Celsius (absent for protocols that don't send it)
    pub temperature_c: Option<f32>,

    pub battery: BatteryStatus,
}

impl Reading {
    pub fn pressure_psi(&self) -> f32 {
        self.pressure_bar * PSI_PER_BAR
    }

    pub fn pressure_kpa(&self) -> f32 {
        self.pressure_bar * 100.0
    }

    /// Sensor ID as fixed-width hex, e.g. "0x1A2B3C"
    pub fn id_hex(&self) -> String {
        format!(
            "0x{:0width$X}",
            self.sensor_id,
            width = self.protocol.id_hex_width()
        )
    }

    /// Multi-line detail text for the receiver info view
    pub fn summary(&self) -> String {
        let mut out = format!(
            "{}\nId:{}\nBat:{}\n",
            self.protocol.name(),
            self.id_hex(),
            self.battery.as_str()
        );
        if let Some(temp) = self.temperature_c {
            out.push_str(&format!("Temp:{:2.0} C\n", temp));
        }
        out.push_str(&format!(
            "Pressure:{:2.1} PSI\n         {:3.0} kPa",
            self.pressure_psi(),
            self.pressure_kpa()
        ));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_from_str() {
        assert_eq!("EG53MA4".parse::<ProtocolId>().unwrap(), ProtocolId::SchraderEg53ma4);
        assert_eq!("Schrader GG4".parse::<ProtocolId>().unwrap(), ProtocolId::SchraderGg4);
        assert_eq!("abarth_124".parse::<ProtocolId>().unwrap(), ProtocolId::Abarth124);
        assert_eq!("smd3ma4".parse::<ProtocolId>().unwrap(), ProtocolId::SchraderSmd3ma4);
        assert!("kia".parse::<ProtocolId>().is_err());
    }

    #[test]
    fn test_summary_omits_missing_temperature() {
        let reading = Reading {
            protocol: ProtocolId::SchraderSmd3ma4,
            sensor_id: 0x1A2B3C,
            pressure_bar: 2.2,
            temperature_c: None,
            battery: BatteryStatus::NotApplicable,
        };
        let text = reading.summary();
        assert!(text.contains("Id:0x1A2B3C"));
        assert!(text.contains("Bat:N/A"));
        assert!(!text.contains("Temp:"));
        assert!(text.contains("PSI"));
    }

    #[test]
    fn test_pressure_units() {
        let reading = Reading {
            protocol: ProtocolId::SchraderEg53ma4,
            sensor_id: 1,
            pressure_bar: 2.3,
            temperature_c: Some(25.0),
            battery: BatteryStatus::NotApplicable,
        };
        assert!((reading.pressure_psi() - 33.36).abs() < 0.01);
        assert!((reading.pressure_kpa() - 230.0).abs() < 0.01);
    }
}
