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

use crate::render_manager::RenderManager;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

pub mod opengl;

/// Debug flags passed to [`DrawContext::begin_frame`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DebugFlags(u32);

impl DebugFlags {
    pub const NONE: DebugFlags = DebugFlags(0);
}

/// Backbuffer notifications delivered to a [`DrawContext`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawEvent {
    GotBackbuffer,
    LostBackbuffer,
}

/// The rendering backend's draw context.
pub trait DrawContext: Send {
    fn begin_frame(&mut self, flags: DebugFlags);

    /// Finish recording the current frame and hand it to the render manager. May block until
    /// the render thread took the frame.
    fn end_frame(&mut self);

    fn handle_event(&mut self, event: DrawEvent, width: i32, height: i32);

    /// Create the built-in shader presets. Returns `false` if the driver could not compile them.
    fn create_presets(&mut self) -> bool;

    /// Framebuffer object rendered into when the emulator targets the screen.
    fn set_default_framebuffer(&mut self, fbo: u32);
}

/// Creates draw contexts. Implemented by the OpenGL backend of the emulator.
pub trait DrawBackend: Send + Sync {
    type Draw: DrawContext;

    /// Create a fresh draw context whose frames are handed to `render_manager`.
    fn create_draw_context(&self, render_manager: Arc<RenderManager>) -> Self::Draw;
}

/// The emulator core, as seen by the emulation thread and the graphics context.
pub trait EmulatorCore: Send {
    fn begin_host_frame(&mut self);

    fn end_host_frame(&mut self);

    /// Run CPU and GPU emulation until the next frame boundary or `deadline` (in emulated
    /// cycles), whichever comes first.
    fn run_loop_until(&mut self, deadline: u64);

    /// The graphics device is usable again; recreate resources on `draw`.
    fn device_restore(&mut self, draw: &mut dyn DrawContext);

    /// The graphics device is about to go away; release all resources.
    fn device_lost(&mut self);
}

/// Thread-affinity hooks of the host graphics context, called by the emulation thread
/// coordinator.
pub trait GraphicsContext: Send + Sync {
    type Draw: DrawContext;

    /// Prepare the render side. Called on the host thread before the emulation thread exists.
    fn thread_start(&self);

    /// Render thread rendezvous: execute at most one frame from the emulation thread. Returns
    /// `false` once the emulation thread stopped handing out frames.
    fn thread_frame(&self) -> bool;

    /// Tear down the render side after the emulation thread was joined.
    fn thread_end(&self);

    /// Called by the emulation thread right before it exits.
    fn stop_thread(&self);

    fn swap_buffers(&self);

    /// Bind the host framebuffer as the render target of the next frame.
    fn set_render_target(&self);

    /// Run `f` with the current draw context. Returns `None` if there is none.
    fn with_draw_context<R, F>(&self, f: F) -> Option<R>
    where
        F: FnOnce(&mut Self::Draw) -> R;
}

/// Lock a mutex, ignoring poisoning. Every value guarded in this crate stays consistent between
/// calls, so a panic on another thread does not leave it half-written.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
