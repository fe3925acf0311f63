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

//! Recording test doubles for the draw backend and the emulator core.

use crate::implementation::{DebugFlags, DrawBackend, DrawContext, DrawEvent, EmulatorCore};
use crate::render_manager::{RenderFrame, RenderManager};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// Ordered record of device and backbuffer notifications, shared by draw contexts and core.
#[derive(Debug, Default)]
pub struct Journal(Mutex<Vec<&'static str>>);

impl Journal {
    fn push(&self, entry: &'static str) {
        self.0.lock().unwrap().push(entry)
    }

    pub fn entries(&self) -> Vec<&'static str> {
        self.0.lock().unwrap().clone()
    }
}

#[derive(Debug, Default)]
pub struct DrawLog {
    contexts_created: AtomicU64,
    calls: AtomicU64,
    frames_begun: AtomicU64,
    frames_ended: AtomicU64,
    frames_rendered: AtomicU64,
    default_framebuffer: AtomicU32,
    events: Mutex<Vec<(DrawEvent, i32, i32)>>,
    journal: Arc<Journal>,
}

impl DrawLog {
    pub fn contexts_created(&self) -> u64 {
        self.contexts_created.load(Ordering::SeqCst)
    }

    /// Total number of calls into any draw context.
    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn frames_begun(&self) -> u64 {
        self.frames_begun.load(Ordering::SeqCst)
    }

    pub fn frames_ended(&self) -> u64 {
        self.frames_ended.load(Ordering::SeqCst)
    }

    /// Frames executed on a render thread.
    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered.load(Ordering::SeqCst)
    }

    pub fn default_framebuffer(&self) -> u32 {
        self.default_framebuffer.load(Ordering::SeqCst)
    }

    pub fn events(&self) -> Vec<(DrawEvent, i32, i32)> {
        self.events.lock().unwrap().clone()
    }

    pub fn journal(&self) -> Arc<Journal> {
        self.journal.clone()
    }

    fn call(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

pub struct RecordingDraw {
    log: Arc<DrawLog>,
    render_manager: Arc<RenderManager>,
    presets_ok: bool,
}

impl DrawContext for RecordingDraw {
    fn begin_frame(&mut self, _flags: DebugFlags) {
        self.log.call();
        self.log.frames_begun.fetch_add(1, Ordering::SeqCst);
    }

    fn end_frame(&mut self) {
        self.log.call();
        let id = self.log.frames_ended.fetch_add(1, Ordering::SeqCst) + 1;
        let log = self.log.clone();
        self.render_manager.finish_frame(RenderFrame::new(id, move || {
            log.frames_rendered.fetch_add(1, Ordering::SeqCst);
        }));
    }

    fn handle_event(&mut self, event: DrawEvent, width: i32, height: i32) {
        self.log.call();
        self.log.journal.push(match event {
            DrawEvent::GotBackbuffer => "got_backbuffer",
            DrawEvent::LostBackbuffer => "lost_backbuffer",
        });
        self.log.events.lock().unwrap().push((event, width, height));
    }

    fn create_presets(&mut self) -> bool {
        self.log.call();
        self.presets_ok
    }

    fn set_default_framebuffer(&mut self, fbo: u32) {
        self.log.call();
        self.log.default_framebuffer.store(fbo, Ordering::SeqCst);
    }
}

pub struct RecordingBackend {
    log: Arc<DrawLog>,
    presets_ok: bool,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self {
            log: Arc::new(DrawLog::default()),
            presets_ok: true,
        }
    }

    pub fn failing_presets() -> Self {
        Self {
            presets_ok: false,
            ..Self::new()
        }
    }

    pub fn log(&self) -> Arc<DrawLog> {
        self.log.clone()
    }

    pub fn journal(&self) -> Arc<Journal> {
        self.log.journal()
    }
}

impl DrawBackend for RecordingBackend {
    type Draw = RecordingDraw;

    fn create_draw_context(&self, render_manager: Arc<RenderManager>) -> RecordingDraw {
        self.log.contexts_created.fetch_add(1, Ordering::SeqCst);
        RecordingDraw {
            log: self.log.clone(),
            render_manager,
            presets_ok: self.presets_ok,
        }
    }
}

#[derive(Debug, Default)]
pub struct CoreLog {
    host_frames_begun: AtomicU64,
    host_frames_ended: AtomicU64,
    run_loops: AtomicU64,
    device_restores: AtomicU64,
    device_losts: AtomicU64,
}

impl CoreLog {
    pub fn host_frames_begun(&self) -> u64 {
        self.host_frames_begun.load(Ordering::SeqCst)
    }

    pub fn host_frames_ended(&self) -> u64 {
        self.host_frames_ended.load(Ordering::SeqCst)
    }

    pub fn run_loops(&self) -> u64 {
        self.run_loops.load(Ordering::SeqCst)
    }

    pub fn device_restores(&self) -> u64 {
        self.device_restores.load(Ordering::SeqCst)
    }

    pub fn device_losts(&self) -> u64 {
        self.device_losts.load(Ordering::SeqCst)
    }
}

pub struct RecordingCore {
    log: Arc<CoreLog>,
    journal: Arc<Journal>,
}

impl RecordingCore {
    pub fn new() -> Self {
        Self::with_journal(Arc::new(Journal::default()))
    }

    pub fn with_journal(journal: Arc<Journal>) -> Self {
        Self {
            log: Arc::new(CoreLog::default()),
            journal,
        }
    }

    pub fn log(&self) -> Arc<CoreLog> {
        self.log.clone()
    }
}

impl EmulatorCore for RecordingCore {
    fn begin_host_frame(&mut self) {
        self.log.host_frames_begun.fetch_add(1, Ordering::SeqCst);
    }

    fn end_host_frame(&mut self) {
        self.log.host_frames_ended.fetch_add(1, Ordering::SeqCst);
    }

    fn run_loop_until(&mut self, deadline: u64) {
        assert_eq!(deadline, u64::MAX);
        self.log.run_loops.fetch_add(1, Ordering::SeqCst);
    }

    fn device_restore(&mut self, draw: &mut dyn DrawContext) {
        draw.set_default_framebuffer(0);
        self.journal.push("device_restore");
        self.log.device_restores.fetch_add(1, Ordering::SeqCst);
    }

    fn device_lost(&mut self) {
        self.journal.push("device_lost");
        self.log.device_losts.fetch_add(1, Ordering::SeqCst);
    }
}
