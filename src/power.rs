//! Power-key bootstrap: a short table of pin levels with timed dwell.

use crate::{
    transport::{PinLevel, PowerControl},
    ResolverReturn,
};
use colored::Colorize;

/// Dwell of each power step (ms); the zero entry ends the sequence.
///
/// Even steps drive the key active, odd steps release it: reset pulse, modem switch off,
/// second pulse, then time for the modem to come up.
pub const POWER_SEQUENCE: [u64; 5] = [1500, 2000, 1500, 10000, 0];

/// First step when the modem is assumed to be already powered off.
pub const POWERED_OFF_STEP: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerTick {
    /// Still dwelling in the current step.
    Waiting,
    /// Moved to the next step.
    Stepped(usize),
    /// Sentinel reached, pin released; the serial link can be opened.
    Done,
}

#[derive(Debug, Clone)]
pub struct PowerBootstrap {
    pin: u8,
    step: usize,
    step_started_at: u64,
}

pub fn level_for(step: usize) -> PinLevel {
    if step & 1 == 1 {
        PinLevel::Inactive
    } else {
        PinLevel::Active
    }
}

impl PowerBootstrap {
    /// Configures the pin and drives the first step.
    ///
    /// `skip_reset` starts at [`POWERED_OFF_STEP`], for a modem that stayed silent during the
    /// previous session.
    pub fn start<P: PowerControl + ?Sized>(
        power: &mut P,
        pin: u8,
        skip_reset: bool,
        now: u64,
    ) -> ResolverReturn<Self> {
        power.configure(pin)?;
        let mut bootstrap = PowerBootstrap {
            pin,
            step: if skip_reset { POWERED_OFF_STEP } else { 0 },
            step_started_at: now,
        };
        bootstrap.apply(power, now)?;
        Ok(bootstrap)
    }

    pub fn tick<P: PowerControl + ?Sized>(
        &mut self,
        power: &mut P,
        now: u64,
    ) -> ResolverReturn<PowerTick> {
        if POWER_SEQUENCE[self.step] == 0 {
            return Ok(PowerTick::Done);
        }
        if now.saturating_sub(self.step_started_at) < POWER_SEQUENCE[self.step] {
            return Ok(PowerTick::Waiting);
        }
        self.step += 1;
        self.apply(power, now)?;
        if POWER_SEQUENCE[self.step] == 0 {
            power.release(self.pin)?;
            log::debug!("Power sequence complete, pin {} released", self.pin);
            return Ok(PowerTick::Done);
        }
        Ok(PowerTick::Stepped(self.step))
    }

    pub fn step(&self) -> usize {
        self.step
    }

    fn apply<P: PowerControl + ?Sized>(&mut self, power: &mut P, now: u64) -> ResolverReturn<()> {
        let level: PinLevel = level_for(self.step);
        log::debug!(
            "{} - level {level:?} for {} ms",
            format!("[power step {}]", self.step).yellow(),
            POWER_SEQUENCE[self.step]
        );
        power.set_level(self.pin, level)?;
        self.step_started_at = now;
        Ok(())
    }
}
