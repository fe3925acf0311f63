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

//! Binds the PPSSPP emulator core into the OpenEmu host.
//!
//! The emulator runs on its own thread ([`emu_thread::EmuThread`]) and hands every finished
//! frame to the host's render thread ([`emu_thread::FramePump`]) through the render manager of
//! the OpenGL graphics context ([`implementation::opengl::OpenEmuGlContext`]). The host drives
//! everything through [`native::NativeApp`].

#[macro_use]
mod macros;

pub mod config;
pub mod emu_thread;
pub mod error;
pub mod implementation;
pub mod native;
pub mod render_manager;
pub mod state;

#[cfg(test)]
mod testing;

pub use config::CoreConfig;
pub use emu_thread::{EmuThread, FramePump};
pub use error::{ConfigError, ContextError, EmuThreadError, NativeError};
pub use implementation::opengl::OpenEmuGlContext;
pub use implementation::{
    DebugFlags, DrawBackend, DrawContext, DrawEvent, EmulatorCore, GraphicsContext,
};
pub use native::NativeApp;
pub use render_manager::{RenderFrame, RenderManager};
pub use state::{AtomicThreadState, ThreadState};
