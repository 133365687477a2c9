//! The frame pump. A chain advances the session once when it starts and
//! then once per display refresh, for as long as it is the live chain.

use crate::error::DriverError;
use crate::lifecycle::Lifecycle;
use crate::session::Session;
use std::collections::VecDeque;
use std::fmt;
use std::time::{Duration, Instant};

/// Names one run of the frame pump. Ids only ever go up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ChainId(pub(crate) u64);

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "chain #{}", self.0)
    }
}

/// Source of display refresh notifications.
pub trait RefreshSignal {
    /// how long until the next refresh is due
    fn time_until_refresh(&self) -> Duration;

    /// block until the next refresh
    fn wait_for_refresh(&mut self);
}

/// A fixed-rate refresh signal, paced with spin_sleep so 60Hz stays 60Hz.
pub struct FrameClock {
    period: Duration,
    next: Instant,
}

impl FrameClock {
    pub fn new(hz: u32) -> Self {
        let period = Duration::from_secs(1) / hz.max(1);
        FrameClock {
            period,
            next: Instant::now() + period,
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }
}

impl RefreshSignal for FrameClock {
    fn time_until_refresh(&self) -> Duration {
        self.next.saturating_duration_since(Instant::now())
    }

    fn wait_for_refresh(&mut self) {
        let now = Instant::now();
        if self.next > now {
            spin_sleep::sleep(self.next - now);
        }
        self.next += self.period;
        let now = Instant::now();
        if self.next < now {
            // fell more than a whole frame behind; don't try to catch up
            log::debug!("refresh running {:?} late, resyncing", now - self.next);
            self.next = now + self.period;
        }
    }
}

/// refreshes whenever asked, for tests and headless runs
#[derive(Debug, Default)]
pub struct ImmediateRefresh {
    pub refreshes: u64,
}

impl RefreshSignal for ImmediateRefresh {
    fn time_until_refresh(&self) -> Duration {
        Duration::ZERO
    }

    fn wait_for_refresh(&mut self) {
        self.refreshes += 1;
    }
}

/// Cooperative, single-threaded frame pump.
///
/// `scheduled` holds callbacks waiting for the next refresh, tagged with the
/// chain that scheduled them. A callback whose chain is no longer live exits
/// without touching the session.
#[derive(Debug, Default)]
pub struct FrameDriver {
    scheduled: VecDeque<ChainId>,
    frames: u64,
    chain_frames: u64,
}

impl FrameDriver {
    pub fn new() -> Self {
        FrameDriver::default()
    }

    /// begin `chain`, which the lifecycle must already consider live: any
    /// callbacks left over from earlier chains are retired first, then one
    /// frame runs straight away
    pub fn start<S: Session + ?Sized>(
        &mut self,
        chain: ChainId,
        lifecycle: &mut Lifecycle,
        session: &mut S,
    ) -> Result<(), DriverError> {
        debug_assert!(lifecycle.is_live(chain), "{} started while not live", chain);
        self.retire_stale(lifecycle);
        log::debug!("{} starting", chain);
        self.chain_frames = 0;
        self.run_frame(chain, lifecycle, session)
    }

    /// service every callback that was waiting for this refresh; returns how
    /// many frames were advanced (never more than one)
    pub fn on_refresh<S: Session + ?Sized>(
        &mut self,
        lifecycle: &mut Lifecycle,
        session: &mut S,
    ) -> Result<usize, DriverError> {
        let due = std::mem::take(&mut self.scheduled);
        let mut advanced = 0;
        for chain in due {
            if !lifecycle.is_live(chain) {
                log::debug!("{} observed stop after {} frames", chain, self.chain_frames);
                continue;
            }
            self.run_frame(chain, lifecycle, session)?;
            advanced += 1;
        }
        Ok(advanced)
    }

    /// drop callbacks belonging to chains that are no longer live
    pub fn retire_stale(&mut self, lifecycle: &Lifecycle) {
        self.scheduled.retain(|&chain| {
            let live = lifecycle.is_live(chain);
            if !live {
                log::debug!("{} retired before its next frame", chain);
            }
            live
        });
    }

    fn run_frame<S: Session + ?Sized>(
        &mut self,
        chain: ChainId,
        lifecycle: &mut Lifecycle,
        session: &mut S,
    ) -> Result<(), DriverError> {
        if let Err(e) = session.advance_frame() {
            log::error!("{} stopped: {}", chain, e);
            lifecycle.stop();
            return Err(e);
        }
        self.frames += 1;
        self.chain_frames += 1;
        if lifecycle.is_live(chain) {
            self.scheduled.push_back(chain);
        } else {
            log::debug!("{} exits after {} frames", chain, self.chain_frames);
        }
        Ok(())
    }

    /// callbacks waiting for the next refresh, stale ones included
    pub fn outstanding(&self) -> usize {
        self.scheduled.len()
    }

    /// frames advanced by every chain so far
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// frames advanced by the most recently started chain
    pub fn chain_frames(&self) -> u64 {
        self.chain_frames
    }
}
