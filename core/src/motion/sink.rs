//! Frame sinks: the hardware serial link and a tracing stand-in.

use super::{FrameSink, ServoPosition};
use crate::{EmmaError, Result};
use async_trait::async_trait;
use std::path::Path;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

/// Serial link to the servo board.
///
/// Writes one ASCII frame per step: a `$` sentinel followed by the three
/// angles zero-padded to three digits (`$180000090`), the framing the
/// board's sketch parses. Line settings (baud rate etc.) are expected to
/// be applied to the device before startup.
pub struct SerialLink {
    port: String,
    device: File,
}

impl SerialLink {
    pub async fn open(port: impl AsRef<Path>) -> Result<Self> {
        let port_name = port.as_ref().display().to_string();
        let device = OpenOptions::new()
            .write(true)
            .open(port.as_ref())
            .await
            .map_err(|e| EmmaError::Actuator(format!("open {}: {}", port_name, e)))?;
        info!(target = "motion", port = %port_name, "serial link open");
        Ok(Self {
            port: port_name,
            device,
        })
    }
}

#[async_trait]
impl FrameSink for SerialLink {
    async fn send(&mut self, frame: ServoPosition) -> Result<()> {
        let [left, right, head] = frame.angles();
        let packet = format!("${:03}{:03}{:03}", left, right, head);
        self.device
            .write_all(packet.as_bytes())
            .await
            .map_err(|e| EmmaError::Actuator(format!("write {}: {}", self.port, e)))?;
        self.device
            .flush()
            .await
            .map_err(|e| EmmaError::Actuator(format!("flush {}: {}", self.port, e)))?;
        Ok(())
    }
}

/// Sink for running without hardware attached: logs each frame and
/// reports success so the rest of the loop stays exercised.
#[derive(Default)]
pub struct TraceSink;

#[async_trait]
impl FrameSink for TraceSink {
    async fn send(&mut self, frame: ServoPosition) -> Result<()> {
        debug!(target = "motion", frame = %frame, "frame (no hardware)");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packet_framing_is_dollar_plus_padded_angles() {
        let frame = ServoPosition::new(5, 180, 90).unwrap();
        let [l, r, h] = frame.angles();
        let packet = format!("${:03}{:03}{:03}", l, r, h);
        assert_eq!(packet, "$005180090");
    }
}
