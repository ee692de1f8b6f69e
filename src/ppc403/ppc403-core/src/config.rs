use serde::{Deserialize, Serialize};

use crate::constants::clocks::{SERIAL_CLOCK_HZ, SYSTEM_CLOCK_HZ};

/// Board clocking the core needs to know about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Ppc403Config {
    pub system_clock_hz: u32, // CPU/SysClk, serial clock when IOCR[SPC] is clear
    pub serial_clock_hz: u32, // External SerClk input
}

impl Default for Ppc403Config {
    fn default() -> Self {
        Self {
            system_clock_hz: SYSTEM_CLOCK_HZ,
            serial_clock_hz: SERIAL_CLOCK_HZ,
        }
    }
}

#[cfg(test)]
mod config_tests {
    use super::*;

    #[test]
    fn missing_fields_fall_back_to_403ga_clocks() {
        let config: Ppc403Config = serde_json::from_str(r#"{ "serial_clock_hz": 1843200 }"#).unwrap();
        assert_eq!(config.system_clock_hz, 33_333_333);
        assert_eq!(config.serial_clock_hz, 1_843_200);
    }
}
