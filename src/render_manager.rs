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

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, SendTimeoutError, Sender};
use log::{debug, warn};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Granularity at which blocked producers and consumers re-check the run flag.
const RUN_POLL: Duration = Duration::from_millis(1);

/// The render work recorded by the emulation thread for one host-visible frame.
pub struct RenderFrame {
    id: u64,
    work: Box<dyn FnOnce() + Send>,
}

impl RenderFrame {
    pub fn new<F>(id: u64, work: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            id,
            work: Box::new(work),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    fn execute(self) {
        (self.work)()
    }
}

impl fmt::Debug for RenderFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderFrame").field("id", &self.id).finish()
    }
}

/// A frame in transit, with the channel its executor acknowledges on.
struct Handoff {
    frame: RenderFrame,
    ack: Sender<()>,
}

/// Hands frames from the emulation thread to the render thread.
///
/// The channel between them has zero capacity, and [`RenderManager::finish_frame`] only returns
/// once a render thread has taken the frame in [`RenderManager::thread_frame`] and finished
/// executing it. Every frame is therefore executed exactly once, and the emulation thread is
/// never more than one frame ahead of the host. Any number of threads may call `thread_frame`
/// at the same time; each frame goes to exactly one of them.
pub struct RenderManager {
    frame_send: Sender<Handoff>,
    frame_receive: Receiver<Handoff>,
    run: AtomicBool,
    frames_executed: AtomicU64,
    frame_wait_timeout: Duration,
}

impl RenderManager {
    pub fn new(frame_wait_timeout: Duration) -> Self {
        let (frame_send, frame_receive) = bounded(0);
        Self {
            frame_send,
            frame_receive,
            run: AtomicBool::new(false),
            frames_executed: AtomicU64::new(0),
            frame_wait_timeout,
        }
    }

    /// Arms the manager. Called on the host thread before the emulation thread is spawned.
    pub fn thread_start(&self) {
        dbg_trace!("RenderManager::thread_start");
        self.run.store(true, Ordering::Release);
    }

    /// Emulation thread side: blocks until a render thread took `frame` and executed it.
    ///
    /// If the manager is (or gets) stopped before a render thread took it, the frame is
    /// discarded.
    pub fn finish_frame(&self, frame: RenderFrame) {
        let id = frame.id();
        let (ack_send, ack_receive) = bounded(1);
        let mut handoff = Handoff {
            frame,
            ack: ack_send,
        };
        loop {
            if !self.run.load(Ordering::Acquire) {
                warn!("Render manager is not running, discarding frame {id}.");
                return;
            }
            match self.frame_send.send_timeout(handoff, RUN_POLL) {
                Ok(()) => break,
                Err(SendTimeoutError::Timeout(h)) => handoff = h,
                Err(SendTimeoutError::Disconnected(_)) => {
                    warn!("Render channel disconnected, discarding frame {id}.");
                    return;
                }
            }
        }
        // The sender is dropped without acknowledging if the render thread panicked.
        if ack_receive.recv().is_err() {
            warn!("Frame {id} was taken but never finished.");
        }
    }

    /// Render thread side: waits for the next frame and executes it.
    ///
    /// Returns `true` while the manager is running, even if no frame arrived within the
    /// configured wait timeout. Returns `false` once the emulation thread stopped the manager;
    /// this is what drain loops spin on.
    pub fn thread_frame(&self) -> bool {
        let deadline = Instant::now() + self.frame_wait_timeout;
        loop {
            if !self.run.load(Ordering::Acquire) {
                if let Ok(handoff) = self.frame_receive.try_recv() {
                    self.execute(handoff);
                }
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            match self.frame_receive.recv_timeout(RUN_POLL.min(deadline - now)) {
                Ok(handoff) => {
                    self.execute(handoff);
                    return true;
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => return false,
            }
        }
    }

    fn execute(&self, handoff: Handoff) {
        let Handoff { frame, ack } = handoff;
        dbg_trace!("RenderManager::execute - {}", frame.id());
        frame.execute();
        self.frames_executed.fetch_add(1, Ordering::Relaxed);
        ack.send(()).ok();
    }

    /// Emulation thread side, on exit: stops the manager so that pending and future
    /// `thread_frame` calls return `false`. Every frame handed over before has already been
    /// executed.
    pub fn stop_thread(&self) {
        dbg_trace!("RenderManager::stop_thread");
        self.run.store(false, Ordering::Release);
    }

    /// Host thread side, after the emulation thread was joined.
    pub fn thread_end(&self) {
        self.run.store(false, Ordering::Release);
        debug!(
            "Render manager ended after {} frames.",
            self.frames_executed()
        );
    }

    pub fn is_running(&self) -> bool {
        self.run.load(Ordering::Acquire)
    }

    /// Number of frames executed by render threads so far.
    pub fn frames_executed(&self) -> u64 {
        self.frames_executed.load(Ordering::Relaxed)
    }
}

impl fmt::Debug for RenderManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderManager")
            .field("run", &self.is_running())
            .field("frames_executed", &self.frames_executed())
            .finish()
    }
}
