//! Execution device selection.

use serde::{Deserialize, Serialize};

/// Where model forward passes run.
///
/// This is an explicit value passed to the tiled engine and the trainer;
/// there is no process-wide device flag.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Device {
    /// One thread, tiles and batch items in order.
    #[default]
    Cpu,
    /// Independent forward passes (tiles, validation batch items) on the rayon pool.
    Parallel,
}

impl Device {
    pub fn is_parallel(self) -> bool {
        matches!(self, Device::Parallel)
    }
}

impl std::str::FromStr for Device {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "cpu" | "serial" | "-1" => Ok(Device::Cpu),
            "parallel" | "rayon" => Ok(Device::Parallel),
            other => Err(format!("unknown device '{other}' (expected cpu|parallel)")),
        }
    }
}
