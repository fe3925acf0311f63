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

use crate::config::CoreConfig;
use crate::error::EmuThreadError;
use crate::implementation::{lock, DebugFlags, DrawContext, EmulatorCore, GraphicsContext};
use crate::state::{AtomicThreadState, ThreadState};
use log::{debug, error, info, warn};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, sleep, JoinHandle, ThreadId};
use std::time::Duration;

/// State shared between the coordinator and the emulation thread.
struct Shared<C, E> {
    state: Arc<AtomicThreadState>,
    started: AtomicBool,
    frames: AtomicU64,
    ctx: Arc<C>,
    core: Arc<Mutex<E>>,
    idle_poll: Duration,
}

impl<C, E> Shared<C, E>
where
    C: GraphicsContext + 'static,
    E: EmulatorCore + 'static,
{
    /// Emulate until the next frame boundary and hand the frame to the render thread.
    fn emu_frame(&self) {
        self.ctx.set_render_target();
        self.ctx
            .with_draw_context(|draw| draw.begin_frame(DebugFlags::NONE));
        {
            let mut core = lock(&self.core);
            core.begin_host_frame();
            core.run_loop_until(u64::MAX);
            core.end_host_frame();
        }
        // Blocks until the render thread took the frame.
        self.ctx.with_draw_context(|draw| draw.end_frame());
        self.frames.fetch_add(1, Ordering::Relaxed);
    }

    fn run(&self) {
        dbg_trace!("emu_thread - started");
        loop {
            match self.state.load() {
                ThreadState::StartRequested => {
                    if !self
                        .state
                        .transition(ThreadState::StartRequested, ThreadState::Running)
                    {
                        continue;
                    }
                    self.started.store(true, Ordering::Release);
                    debug!("Emulation thread running.");
                    self.emu_frame();
                }
                ThreadState::Running => self.emu_frame(),
                ThreadState::PauseRequested => {
                    if self
                        .state
                        .transition(ThreadState::PauseRequested, ThreadState::Paused)
                    {
                        debug!("Emulation thread paused.");
                    }
                    sleep(self.idle_poll);
                }
                ThreadState::Paused => sleep(self.idle_poll),
                ThreadState::QuitRequested | ThreadState::Disabled | ThreadState::Stopped => {
                    self.state.store(ThreadState::Stopped);
                    self.ctx.stop_thread();
                    dbg_trace!("emu_thread - stopped");
                    return;
                }
            }
        }
    }
}

/// Runs the emulator on a dedicated thread and drives its lifecycle from the host.
///
/// The emulation thread produces one frame per iteration and blocks until the render thread
/// takes it through [`GraphicsContext::thread_frame`]. Requests are only observed between
/// frames, so [`EmuThread::pause`] and [`EmuThread::stop`] keep feeding the render side until
/// the emulation thread acknowledged them. Neither has a timeout: if the emulation thread never
/// gets to its next state check, they do not return.
pub struct EmuThread<C, E>
where
    C: GraphicsContext + 'static,
    E: EmulatorCore + 'static,
{
    shared: Arc<Shared<C, E>>,
    thread: Option<JoinHandle<()>>,
    thread_name: String,
    pause_drain_poll: Duration,
}

impl<C, E> EmuThread<C, E>
where
    C: GraphicsContext + 'static,
    E: EmulatorCore + 'static,
{
    pub fn new(ctx: Arc<C>, core: Arc<Mutex<E>>, config: &CoreConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Arc::new(AtomicThreadState::default()),
                started: AtomicBool::new(false),
                frames: AtomicU64::new(0),
                ctx,
                core,
                idle_poll: config.idle_poll(),
            }),
            thread: None,
            thread_name: config.thread_name.clone(),
            pause_drain_poll: config.pause_drain_poll(),
        }
    }

    /// Start emulating, or resume if paused.
    ///
    /// A fresh start arms the render side on the calling thread and spawns the emulation
    /// thread. Resuming only flips the state; the paused thread picks it up. Requests in any
    /// other state are ignored.
    pub fn start(&mut self) -> Result<(), EmuThreadError> {
        match self.shared.state.load() {
            ThreadState::Paused => {
                if self
                    .shared
                    .state
                    .transition(ThreadState::Paused, ThreadState::StartRequested)
                {
                    info!("Resuming emulation thread.");
                }
                return Ok(());
            }
            ThreadState::Disabled | ThreadState::Stopped => {}
            state => {
                warn!("Emulation thread start requested while {state:?}, ignoring.");
                return Ok(());
            }
        }

        // A thread that exited on its own still needs to be joined.
        if self.thread.is_some() {
            self.finish_quit();
        }

        info!("Starting emulation thread.");
        self.shared.state.store(ThreadState::StartRequested);
        self.shared.ctx.thread_start();

        let shared = self.shared.clone();
        match thread::Builder::new()
            .name(self.thread_name.clone())
            .spawn(move || shared.run())
        {
            Ok(handle) => {
                self.thread = Some(handle);
                Ok(())
            }
            Err(err) => {
                error!("Failed to spawn the emulation thread: {err}");
                self.shared.state.store(ThreadState::Disabled);
                self.shared.ctx.thread_end();
                Err(err.into())
            }
        }
    }

    /// Stop a running emulation thread and join it. Does nothing unless running.
    pub fn stop(&mut self) {
        if !self
            .shared
            .state
            .transition(ThreadState::Running, ThreadState::QuitRequested)
        {
            debug!(
                "Emulation thread stop requested while {:?}, ignoring.",
                self.state()
            );
            return;
        }
        info!("Stopping emulation thread.");
        self.finish_quit();
    }

    /// Pause a running emulation thread and wait until it is paused. Does nothing unless
    /// running.
    pub fn pause(&self) {
        if !self
            .shared
            .state
            .transition(ThreadState::Running, ThreadState::PauseRequested)
        {
            debug!(
                "Emulation thread pause requested while {:?}, ignoring.",
                self.state()
            );
            return;
        }
        info!("Pausing emulation thread.");
        // The emulation thread only sees the request after its current frame was taken.
        while self.shared.state.load() == ThreadState::PauseRequested {
            self.shared.ctx.thread_frame();
            sleep(self.pause_drain_poll);
        }
    }

    /// Stop the emulation thread from any state and join it. Does nothing if there is no
    /// emulation thread.
    pub fn terminate(&mut self) {
        if self.thread.is_none() {
            return;
        }
        let state = self.state();
        if state != ThreadState::Stopped {
            info!("Terminating emulation thread ({state:?}).");
            self.shared.state.store(ThreadState::QuitRequested);
        }
        self.finish_quit();
    }

    fn finish_quit(&mut self) {
        if let Some(handle) = self.thread.take() {
            // The emulation thread may be blocked handing over a frame.
            while !handle.is_finished() && self.shared.ctx.thread_frame() {}
            if handle.join().is_err() {
                error!("Emulation thread panicked.");
                self.shared.state.store(ThreadState::Stopped);
            }
        }
        self.shared.ctx.thread_end();
        dbg_trace!("EmuThread::finish_quit - joined");
    }

    /// Directly store a state, bypassing the request protocol.
    pub(crate) fn request_state(&self, state: ThreadState) {
        self.shared.state.store(state)
    }

    pub fn state(&self) -> ThreadState {
        self.shared.state.load()
    }

    /// Whether the emulation thread ever picked up a start request.
    pub fn is_started(&self) -> bool {
        self.shared.started.load(Ordering::Acquire)
    }

    /// Frames emulated and handed to the render thread so far.
    pub fn frames_emulated(&self) -> u64 {
        self.shared.frames.load(Ordering::Relaxed)
    }

    pub fn worker_thread_id(&self) -> Option<ThreadId> {
        self.thread.as_ref().map(|handle| handle.thread().id())
    }

    /// A handle for the host render thread.
    pub fn frame_pump(&self) -> FramePump<C> {
        FramePump {
            state: self.shared.state.clone(),
            ctx: self.shared.ctx.clone(),
        }
    }
}

impl<C, E> Drop for EmuThread<C, E>
where
    C: GraphicsContext + 'static,
    E: EmulatorCore + 'static,
{
    fn drop(&mut self) {
        self.terminate();
    }
}

/// Render-thread side of the emulation thread: called once per host display refresh.
pub struct FramePump<C> {
    state: Arc<AtomicThreadState>,
    ctx: Arc<C>,
}

impl<C> FramePump<C>
where
    C: GraphicsContext,
{
    /// Take and execute one frame from the emulation thread, then present. Does nothing while
    /// paused.
    pub fn render_tick(&self) {
        if self.state.load() == ThreadState::Paused {
            return;
        }
        self.ctx.thread_frame();
        self.ctx.swap_buffers();
    }

    pub fn state(&self) -> ThreadState {
        self.state.load()
    }
}

impl<C> Clone for FramePump<C> {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
            ctx: self.ctx.clone(),
        }
    }
}
