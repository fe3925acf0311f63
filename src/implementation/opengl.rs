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
use crate::error::ContextError;
use crate::implementation::{
    lock, DrawBackend, DrawContext, DrawEvent, EmulatorCore, GraphicsContext,
};
use crate::render_manager::RenderManager;
use log::{error, info, warn};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

/// Called by [`OpenEmuGlContext::swap_buffers`]. The host presents the framebuffer itself, so
/// this is usually left unset.
pub type Presenter = Box<dyn Fn() + Send + Sync>;

/// The OpenGL graphics context handed to the emulator by the OpenEmu host.
///
/// Owns the draw context and its render manager and brackets their lifetime with backbuffer
/// and device notifications: while [`OpenEmuGlContext::is_device_live`] is `true`, the draw
/// context holds a valid backbuffer and the core was told the device is restored.
///
/// The draw context is locked while the emulation thread hands a frame over, so
/// [`OpenEmuGlContext::context_reset`] and [`OpenEmuGlContext::context_destroy`] must only be
/// called while the emulation thread is stopped or paused. A render manager recreated while the
/// emulation thread is paused starts armed.
pub struct OpenEmuGlContext<B, E>
where
    B: DrawBackend,
    E: EmulatorCore,
{
    backend: B,
    core: Arc<Mutex<E>>,
    config: CoreConfig,
    draw: Mutex<Option<B::Draw>>,
    render_manager: Mutex<Option<Arc<RenderManager>>>,
    render_fbo: AtomicU32,
    backbuffer: AtomicBool,
    /// Between `thread_start` and the emulation thread stopping. Render managers created in
    /// that window start armed.
    armed: AtomicBool,
    presenter: Option<Presenter>,
}

impl<B, E> OpenEmuGlContext<B, E>
where
    B: DrawBackend,
    E: EmulatorCore,
{
    /// Create the context together with its first draw context.
    pub fn create(
        backend: B,
        core: Arc<Mutex<E>>,
        config: CoreConfig,
    ) -> Result<Arc<Self>, ContextError> {
        Self::create_with_presenter(backend, core, config, None)
    }

    pub fn create_with_presenter(
        backend: B,
        core: Arc<Mutex<E>>,
        config: CoreConfig,
        presenter: Option<Presenter>,
    ) -> Result<Arc<Self>, ContextError> {
        let ctx = Self {
            backend,
            core,
            config,
            draw: Mutex::new(None),
            render_manager: Mutex::new(None),
            render_fbo: AtomicU32::new(0),
            backbuffer: AtomicBool::new(false),
            armed: AtomicBool::new(false),
            presenter,
        };
        ctx.create_draw_context()?;
        Ok(Arc::new(ctx))
    }

    fn create_draw_context(&self) -> Result<(), ContextError> {
        let render_manager = Arc::new(RenderManager::new(self.config.frame_wait_timeout()));
        let mut draw = self.backend.create_draw_context(render_manager.clone());
        if !draw.create_presets() {
            error!("Failed to create shader presets.");
            return Err(ContextError::PresetCreation);
        }
        if self.armed.load(Ordering::Acquire) {
            render_manager.thread_start();
        }
        lock(&self.draw).replace(draw);
        lock(&self.render_manager).replace(render_manager);
        Ok(())
    }

    fn destroy_draw_context(&self) {
        lock(&self.draw).take();
        lock(&self.render_manager).take();
    }

    /// The host recreated its GL context: rebuild the draw context and restore the device.
    pub fn context_reset(&self) -> Result<(), ContextError> {
        info!("Context reset");
        self.release_device();
        self.destroy_draw_context();
        self.create_draw_context()?;
        self.restore_device()
    }

    /// The host is about to destroy its GL context. Must be called while the context is still
    /// current.
    pub fn context_destroy(&self) {
        info!("Context destroy");
        self.shutdown();
    }

    /// Acquire the backbuffer and tell the core the device is usable. Does nothing if that
    /// already happened.
    pub fn restore_device(&self) -> Result<(), ContextError> {
        if self.backbuffer.load(Ordering::Acquire) {
            return Ok(());
        }
        let mut draw = lock(&self.draw);
        let draw = draw.as_mut().ok_or(ContextError::NoDrawContext)?;
        draw.handle_event(
            DrawEvent::GotBackbuffer,
            self.config.backbuffer_width,
            self.config.backbuffer_height,
        );
        self.backbuffer.store(true, Ordering::Release);
        lock(&self.core).device_restore(draw);
        Ok(())
    }

    /// Tell the core the device is lost, then give up the backbuffer.
    fn release_device(&self) {
        if !self.backbuffer.swap(false, Ordering::AcqRel) {
            return;
        }
        lock(&self.core).device_lost();
        match lock(&self.draw).as_mut() {
            Some(draw) => draw.handle_event(DrawEvent::LostBackbuffer, -1, -1),
            None => warn!("Backbuffer was held without a draw context."),
        }
    }

    /// Release the device and drop the draw context and render manager.
    pub fn shutdown(&self) {
        self.release_device();
        self.destroy_draw_context();
    }

    pub fn is_device_live(&self) -> bool {
        self.backbuffer.load(Ordering::Acquire)
    }

    pub fn has_draw_context(&self) -> bool {
        lock(&self.draw).is_some()
    }

    /// Remember the host framebuffer object the emulator renders into.
    pub fn set_render_fbo(&self, fbo: u32) {
        self.render_fbo.store(fbo, Ordering::Release);
    }

    pub fn render_fbo(&self) -> u32 {
        self.render_fbo.load(Ordering::Acquire)
    }

    pub fn render_manager(&self) -> Option<Arc<RenderManager>> {
        lock(&self.render_manager).clone()
    }

}

impl<B, E> GraphicsContext for OpenEmuGlContext<B, E>
where
    B: DrawBackend,
    E: EmulatorCore,
{
    type Draw = B::Draw;

    fn thread_start(&self) {
        self.armed.store(true, Ordering::Release);
        match self.render_manager() {
            Some(render_manager) => render_manager.thread_start(),
            None => warn!("thread_start without a draw context."),
        }
    }

    fn thread_frame(&self) -> bool {
        // The lock is released before waiting, so concurrent callers block on the channel only.
        match self.render_manager() {
            Some(render_manager) => render_manager.thread_frame(),
            None => false,
        }
    }

    fn thread_end(&self) {
        self.armed.store(false, Ordering::Release);
        if let Some(render_manager) = self.render_manager() {
            render_manager.thread_end();
        }
    }

    fn stop_thread(&self) {
        self.armed.store(false, Ordering::Release);
        if let Some(render_manager) = self.render_manager() {
            render_manager.stop_thread();
        }
    }

    fn swap_buffers(&self) {
        if let Some(presenter) = &self.presenter {
            presenter();
        }
    }

    fn set_render_target(&self) {
        let fbo = self.render_fbo();
        self.with_draw_context(|draw| draw.set_default_framebuffer(fbo));
    }

    fn with_draw_context<R, F>(&self, f: F) -> Option<R>
    where
        F: FnOnce(&mut Self::Draw) -> R,
    {
        lock(&self.draw).as_mut().map(f)
    }
}

impl<B, E> Drop for OpenEmuGlContext<B, E>
where
    B: DrawBackend,
    E: EmulatorCore,
{
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl<B, E> fmt::Debug for OpenEmuGlContext<B, E>
where
    B: DrawBackend,
    E: EmulatorCore,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenEmuGlContext")
            .field("render_fbo", &self.render_fbo())
            .field("device_live", &self.is_device_live())
            .field("render_manager", &self.render_manager())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{CoreLog, DrawLog, RecordingBackend, RecordingCore};
    use std::sync::atomic::AtomicU64;

    type TestContext = OpenEmuGlContext<RecordingBackend, RecordingCore>;

    fn context() -> (Arc<TestContext>, Arc<DrawLog>, Arc<CoreLog>) {
        let backend = RecordingBackend::new();
        let draw_log = backend.log();
        let core = RecordingCore::with_journal(backend.journal());
        let core_log = core.log();
        let ctx = TestContext::create(backend, Arc::new(Mutex::new(core)), CoreConfig::default())
            .expect("context");
        (ctx, draw_log, core_log)
    }

    #[test]
    fn create_builds_draw_context_without_device() {
        let (ctx, draw_log, core_log) = context();
        assert!(ctx.has_draw_context());
        assert!(!ctx.is_device_live());
        assert_eq!(draw_log.contexts_created(), 1);
        assert_eq!(core_log.device_restores(), 0);
    }

    #[test]
    fn failed_presets_fail_creation() {
        let backend = RecordingBackend::failing_presets();
        let core = Arc::new(Mutex::new(RecordingCore::new()));
        let err = TestContext::create(backend, core, CoreConfig::default()).unwrap_err();
        assert!(matches!(err, ContextError::PresetCreation));
    }

    #[test]
    fn reset_acquires_backbuffer_then_restores() {
        let (ctx, draw_log, core_log) = context();
        ctx.context_reset().unwrap();
        assert!(ctx.is_device_live());
        assert_eq!(draw_log.contexts_created(), 2);
        assert_eq!(
            draw_log.events(),
            vec![(DrawEvent::GotBackbuffer, 480, 272)]
        );
        assert_eq!(core_log.device_restores(), 1);
        assert_eq!(core_log.device_losts(), 0);
    }

    #[test]
    fn destroy_notifies_core_before_releasing() {
        let (ctx, draw_log, core_log) = context();
        ctx.context_reset().unwrap();
        ctx.context_destroy();
        assert!(!ctx.is_device_live());
        assert!(!ctx.has_draw_context());
        assert!(ctx.render_manager().is_none());
        assert_eq!(core_log.device_losts(), 1);
        assert_eq!(
            draw_log.events(),
            vec![
                (DrawEvent::GotBackbuffer, 480, 272),
                (DrawEvent::LostBackbuffer, -1, -1)
            ]
        );
        assert_eq!(
            draw_log.journal().entries(),
            vec![
                "got_backbuffer",
                "device_restore",
                "device_lost",
                "lost_backbuffer"
            ]
        );
    }

    #[test]
    fn reset_destroy_reset_leaves_device_restored() {
        let (ctx, _, core_log) = context();
        ctx.context_reset().unwrap();
        ctx.context_destroy();
        ctx.context_reset().unwrap();
        assert!(ctx.is_device_live());
        assert_eq!(core_log.device_restores(), core_log.device_losts() + 1);
    }

    #[test]
    fn repeated_reset_brackets_each_device() {
        let (ctx, draw_log, core_log) = context();
        ctx.context_reset().unwrap();
        ctx.context_reset().unwrap();
        assert_eq!(core_log.device_restores(), 2);
        assert_eq!(core_log.device_losts(), 1);
        let events = draw_log.events();
        assert_eq!(events.len(), 3);
        assert_eq!(events[1], (DrawEvent::LostBackbuffer, -1, -1));
    }

    #[test]
    fn no_draw_calls_after_destroy() {
        let (ctx, draw_log, _) = context();
        ctx.context_reset().unwrap();
        ctx.context_destroy();
        let calls = draw_log.calls();
        ctx.set_render_target();
        assert!(ctx.with_draw_context(|draw| draw.end_frame()).is_none());
        assert!(!ctx.thread_frame());
        ctx.thread_start();
        ctx.stop_thread();
        ctx.thread_end();
        ctx.context_destroy();
        assert_eq!(draw_log.calls(), calls);
    }

    #[test]
    fn reset_keeps_render_side_armed() {
        let (ctx, _, _) = context();
        ctx.thread_start();
        ctx.context_reset().unwrap();
        assert!(ctx.render_manager().unwrap().is_running());
        ctx.context_destroy();
        ctx.context_reset().unwrap();
        assert!(ctx.render_manager().unwrap().is_running());
        ctx.thread_end();
        ctx.context_reset().unwrap();
        assert!(!ctx.render_manager().unwrap().is_running());
    }

    #[test]
    fn render_target_uses_host_fbo() {
        let (ctx, draw_log, _) = context();
        ctx.set_render_fbo(42);
        ctx.set_render_target();
        assert_eq!(ctx.render_fbo(), 42);
        assert_eq!(draw_log.default_framebuffer(), 42);
    }

    #[test]
    fn swap_buffers_calls_presenter() {
        let swaps = Arc::new(AtomicU64::new(0));
        let counter = swaps.clone();
        let ctx = TestContext::create_with_presenter(
            RecordingBackend::new(),
            Arc::new(Mutex::new(RecordingCore::new())),
            CoreConfig::default(),
            Some(Box::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            })),
        )
        .unwrap();
        ctx.swap_buffers();
        ctx.swap_buffers();
        assert_eq!(swaps.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn restore_without_draw_context_fails() {
        let (ctx, _, core_log) = context();
        ctx.shutdown();
        assert!(matches!(
            ctx.restore_device(),
            Err(ContextError::NoDrawContext)
        ));
        assert_eq!(core_log.device_restores(), 0);
    }
}
