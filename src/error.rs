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

use thiserror::Error;

/// Errors raised while creating or recreating the draw context.
#[derive(Error, Debug)]
pub enum ContextError {
    #[error("Draw context failed to create its shader presets")]
    PresetCreation,

    #[error("No draw context is available")]
    NoDrawContext,
}

/// Errors raised by the emulation thread coordinator.
#[derive(Error, Debug)]
pub enum EmuThreadError {
    #[error("Failed to spawn the emulation thread: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Errors raised while loading the core configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed reading config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Errors returned by the host entry points.
#[derive(Error, Debug)]
pub enum NativeError {
    #[error("{call} called out of order, expected {expected} first")]
    CallOrder {
        call: &'static str,
        expected: &'static str,
    },

    #[error("Graphics context error: {0}")]
    Context(#[from] ContextError),

    #[error("Emulation thread error: {0}")]
    EmuThread(#[from] EmuThreadError),
}
