pub mod dht;
pub mod gpio;

use serde::{Deserialize, Serialize};

use crate::error::{OutputError, SensorError};

/// One successful sample. There is no partial reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorReading {
    pub temperature: i32,
    pub humidity: i32,
    #[serde(rename = "ts")]
    pub timestamp: i64,
}

/// Raw temperature/humidity sample, before it is stamped with a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sample {
    pub temperature: i32,
    pub humidity: i32,
}

impl Sample {
    pub fn at(self, timestamp: i64) -> SensorReading {
        SensorReading {
            temperature: self.temperature,
            humidity: self.humidity,
            timestamp,
        }
    }
}

pub trait Sensor {
    async fn sample(&mut self) -> Result<Sample, SensorError>;
}

/// Single digital output.
pub trait Output {
    async fn set(&mut self, on: bool) -> Result<(), OutputError>;
    async fn get(&mut self) -> Result<bool, OutputError>;
}
