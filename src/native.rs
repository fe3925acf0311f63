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

//! Entry points called by the OpenEmu host.
//!
//! The host must call them in order: [`NativeApp::init`] before any graphics call,
//! [`NativeApp::init_graphics`] before the emulation thread is started, and
//! [`NativeApp::shutdown`] last. Out-of-order calls are rejected with
//! [`NativeError::CallOrder`].

use crate::config::CoreConfig;
use crate::emu_thread::{EmuThread, FramePump};
use crate::error::NativeError;
use crate::implementation::opengl::OpenEmuGlContext;
use crate::implementation::{DrawBackend, EmulatorCore};
use crate::state::ThreadState;
use log::{info, warn};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Uninitialized,
    Initialized,
    GraphicsReady,
    ShutDown,
}

pub type NativeContext<B, E> = OpenEmuGlContext<B, E>;

/// Host-facing state of the emulator integration.
pub struct NativeApp<B, E>
where
    B: DrawBackend + 'static,
    E: EmulatorCore + 'static,
{
    phase: Phase,
    config: CoreConfig,
    core: Arc<Mutex<E>>,
    ctx: Option<Arc<NativeContext<B, E>>>,
    emu_thread: Option<EmuThread<NativeContext<B, E>, E>>,
    restarting: bool,
}

impl<B, E> NativeApp<B, E>
where
    B: DrawBackend + 'static,
    E: EmulatorCore + 'static,
{
    pub fn new(core: E) -> Self {
        Self {
            phase: Phase::Uninitialized,
            config: CoreConfig::default(),
            core: Arc::new(Mutex::new(core)),
            ctx: None,
            emu_thread: None,
            restarting: false,
        }
    }

    fn expect_phase(
        &self,
        call: &'static str,
        allowed: &[Phase],
        expected: &'static str,
    ) -> Result<(), NativeError> {
        if allowed.contains(&self.phase) {
            Ok(())
        } else {
            Err(NativeError::CallOrder { call, expected })
        }
    }

    pub fn init(&mut self, config: CoreConfig) -> Result<(), NativeError> {
        self.expect_phase(
            "init",
            &[Phase::Uninitialized, Phase::ShutDown],
            "shutdown",
        )?;
        self.config = config;
        self.restarting = false;
        self.phase = Phase::Initialized;
        info!("Native app initialized.");
        Ok(())
    }

    /// Create the graphics context the host hands back to [`NativeApp::init_graphics`].
    pub fn create_graphics_context(
        &self,
        backend: B,
    ) -> Result<Arc<NativeContext<B, E>>, NativeError> {
        self.expect_phase("create_graphics_context", &[Phase::Initialized], "init")?;
        Ok(OpenEmuGlContext::create(
            backend,
            self.core.clone(),
            self.config.clone(),
        )?)
    }

    /// Bind the emulator to `ctx`, rendering into the host framebuffer `framebuffer`.
    pub fn init_graphics(
        &mut self,
        ctx: Arc<NativeContext<B, E>>,
        framebuffer: u32,
    ) -> Result<(), NativeError> {
        self.expect_phase("init_graphics", &[Phase::Initialized], "init")?;
        ctx.set_render_fbo(framebuffer);
        ctx.restore_device()?;
        self.emu_thread = Some(EmuThread::new(ctx.clone(), self.core.clone(), &self.config));
        self.ctx = Some(ctx);
        self.phase = Phase::GraphicsReady;
        info!("Native graphics initialized, rendering into FBO {framebuffer}.");
        Ok(())
    }

    fn emu_thread_mut(
        &mut self,
        call: &'static str,
    ) -> Result<&mut EmuThread<NativeContext<B, E>, E>, NativeError> {
        self.emu_thread.as_mut().ok_or(NativeError::CallOrder {
            call,
            expected: "init_graphics",
        })
    }

    /// Apply a thread state requested by the host.
    ///
    /// Start and pause requests go through the coordinator, a quit request stops the
    /// emulation thread from any state. The remaining states are only ever set by the
    /// emulation thread itself and are ignored.
    pub fn set_thread_state(&mut self, requested: ThreadState) -> Result<(), NativeError> {
        let emu_thread = self.emu_thread_mut("set_thread_state")?;
        match requested {
            ThreadState::StartRequested => emu_thread.start()?,
            ThreadState::PauseRequested => emu_thread.pause(),
            ThreadState::QuitRequested => emu_thread.terminate(),
            ThreadState::Disabled => {
                if emu_thread.state() == ThreadState::Stopped {
                    emu_thread.request_state(ThreadState::Disabled);
                } else {
                    warn!("Cannot disable a live emulation thread.");
                }
            }
            state => warn!("Ignoring host request for thread state {state:?}."),
        }
        Ok(())
    }

    pub fn thread_state(&self) -> ThreadState {
        self.emu_thread
            .as_ref()
            .map_or(ThreadState::Disabled, EmuThread::state)
    }

    /// Handle for the host render thread.
    pub fn frame_pump(&self) -> Option<FramePump<NativeContext<B, E>>> {
        self.emu_thread.as_ref().map(EmuThread::frame_pump)
    }

    /// Per-refresh render callback, for hosts that render on the thread owning the app.
    pub fn render(&self) {
        if let Some(emu_thread) = &self.emu_thread {
            emu_thread.frame_pump().render_tick();
        }
    }

    pub fn set_restarting(&mut self) {
        self.restarting = true;
    }

    pub fn is_restarting(&self) -> bool {
        self.restarting
    }

    pub fn graphics_context(&self) -> Option<&Arc<NativeContext<B, E>>> {
        self.ctx.as_ref()
    }

    /// Tear everything down. An emulation thread that is still alive is stopped first.
    pub fn shutdown(&mut self) -> Result<(), NativeError> {
        self.expect_phase(
            "shutdown",
            &[Phase::Initialized, Phase::GraphicsReady],
            "init",
        )?;
        if let Some(mut emu_thread) = self.emu_thread.take() {
            if !matches!(
                emu_thread.state(),
                ThreadState::Stopped | ThreadState::Disabled
            ) {
                if self.restarting {
                    info!("Stopping emulation thread for restart.");
                } else {
                    warn!("Shutdown while the emulation thread is alive, stopping it.");
                }
            }
            emu_thread.terminate();
        }
        self.ctx = None;
        self.phase = Phase::ShutDown;
        if self.restarting {
            info!("Native app shut down for restart.");
        } else {
            info!("Native app shut down.");
        }
        Ok(())
    }
}
