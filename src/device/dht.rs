use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::debug;

use super::{Sample, Sensor};
use crate::error::SensorError;

/// DHT11 cannot be sampled faster than ~1 Hz.
pub const MIN_SAMPLE_INTERVAL: Duration = Duration::from_secs(1);

/// DHT11 behind the Linux IIO `dht11` driver. Each read of a channel file
/// triggers a bus transaction; timing glitches surface as `EIO`.
pub struct IioDht11 {
    temperature: PathBuf,
    humidity: PathBuf,
}

impl IioDht11 {
    pub fn new(device_dir: &Path) -> Self {
        Self {
            temperature: device_dir.join("in_temp_input"),
            humidity: device_dir.join("in_humidityrelative_input"),
        }
    }
}

impl Sensor for IioDht11 {
    async fn sample(&mut self) -> Result<Sample, SensorError> {
        let temperature = read_milli(&self.temperature).await?;
        let humidity = read_milli(&self.humidity).await?;
        debug!("DHT11 raw: temp={}m°C hum={}m%", temperature, humidity);
        Ok(Sample {
            temperature: from_milli(temperature),
            humidity: from_milli(humidity),
        })
    }
}

async fn read_milli(path: &Path) -> Result<i64, SensorError> {
    let raw = tokio::fs::read_to_string(path).await?;
    raw.trim()
        .parse()
        .map_err(|_| SensorError::Parse(raw.trim().to_string()))
}

fn from_milli(value: i64) -> i32 {
    (value as f64 / 1000.0).round() as i32
}
