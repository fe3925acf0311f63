/*
 * Copyright 2024 The PPSSPP OpenEmu Core Contributors
 *
 * This file is part of PPSSPP OpenEmu Core.
 *
 * PPSSPP OpenEmu Core is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * PPSSPP OpenEmu Core is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with PPSSPP OpenEmu Core.  If not, see <https://www.gnu.org/licenses/>.
 */

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// PSP native screen size.
pub const PSP_SCREEN_WIDTH: i32 = 480;
pub const PSP_SCREEN_HEIGHT: i32 = 272;

/// Tunables for the emulation thread and the graphics context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    /// Sleep of the emulation thread between state checks while paused.
    pub idle_poll_ms: u64,
    /// Sleep between frame drain attempts while waiting for a pause to settle.
    pub pause_drain_poll_ms: u64,
    /// Longest a single render-thread frame rendezvous waits for the emulation thread.
    pub frame_wait_timeout_ms: u64,
    /// Size reported to the draw context when the backbuffer becomes available.
    pub backbuffer_width: i32,
    pub backbuffer_height: i32,
    /// Name of the emulation thread.
    pub thread_name: String,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            idle_poll_ms: 1,
            pause_drain_poll_ms: 10,
            frame_wait_timeout_ms: 100,
            backbuffer_width: PSP_SCREEN_WIDTH,
            backbuffer_height: PSP_SCREEN_HEIGHT,
            thread_name: "Emu".to_string(),
        }
    }
}

impl CoreConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load the configuration from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    pub fn idle_poll(&self) -> Duration {
        Duration::from_millis(self.idle_poll_ms)
    }

    pub fn pause_drain_poll(&self) -> Duration {
        Duration::from_millis(self.pause_drain_poll_ms)
    }

    pub fn frame_wait_timeout(&self) -> Duration {
        Duration::from_millis(self.frame_wait_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_polling_intervals() {
        let config = CoreConfig::default();
        assert_eq!(config.idle_poll(), Duration::from_millis(1));
        assert_eq!(config.pause_drain_poll(), Duration::from_millis(10));
        assert_eq!(config.backbuffer_width, 480);
        assert_eq!(config.backbuffer_height, 272);
        assert_eq!(config.thread_name, "Emu");
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config = CoreConfig::from_json_str(r#"{"pause_drain_poll_ms": 2, "extra": true}"#)
            .expect("valid config");
        assert_eq!(config.pause_drain_poll_ms, 2);
        assert_eq!(config.idle_poll_ms, 1);
        assert_eq!(config.frame_wait_timeout_ms, 100);
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        let err = CoreConfig::from_json_str("{ idle_poll_ms: ").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = CoreConfig::load("/nonexistent/ppsspp-openemu/config.json").unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
