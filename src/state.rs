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

use std::sync::atomic::{AtomicU8, Ordering};

/// Lifecycle state of the emulation thread.
///
/// The UI thread requests transitions (`StartRequested`, `PauseRequested`, `QuitRequested`),
/// the emulation thread acknowledges them (`Running`, `Paused`, `Stopped`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ThreadState {
    Disabled = 0,
    StartRequested = 1,
    Running = 2,
    PauseRequested = 3,
    Paused = 4,
    QuitRequested = 5,
    Stopped = 6,
}

impl ThreadState {
    fn from_raw(raw: u8) -> Self {
        match raw {
            0 => ThreadState::Disabled,
            1 => ThreadState::StartRequested,
            2 => ThreadState::Running,
            3 => ThreadState::PauseRequested,
            4 => ThreadState::Paused,
            5 => ThreadState::QuitRequested,
            // Only ever written through `ThreadState as u8`.
            _ => ThreadState::Stopped,
        }
    }
}

/// A [`ThreadState`] shared between the UI, render and emulation threads.
///
/// Polled rather than waited on. All accesses use acquire/release ordering, so anything
/// written before a transition is visible to the thread that observes it.
#[derive(Debug)]
pub struct AtomicThreadState(AtomicU8);

impl AtomicThreadState {
    pub fn new(state: ThreadState) -> Self {
        Self(AtomicU8::new(state as u8))
    }

    pub fn load(&self) -> ThreadState {
        ThreadState::from_raw(self.0.load(Ordering::Acquire))
    }

    pub fn store(&self, state: ThreadState) {
        self.0.store(state as u8, Ordering::Release)
    }

    /// Moves from `current` to `new`. Returns `false` and leaves the state untouched if
    /// another thread changed it in the meantime.
    pub fn transition(&self, current: ThreadState, new: ThreadState) -> bool {
        self.0
            .compare_exchange(current as u8, new as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

impl Default for AtomicThreadState {
    fn default() -> Self {
        Self::new(ThreadState::Disabled)
    }
}
