//! The per-agent state record.
//!
//! An [`Agent`] is plain data: infection, testing, quarantine and isolation flags and timers plus
//! a personalized viral-load curve. All behavior lives in the compartments. Changes are applied in
//! batches through the strongly typed [`AgentUpdate`], and timers are shifted with
//! [`Agent::increment_timers`].
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};

use crate::viral_load::ViralLoadCurve;

/// A stable handle to an agent stored in an [`crate::agent_store::AgentStore`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AgentId(pub(crate) usize);

impl AgentId {
    pub fn id(&self) -> usize {
        self.0
    }
}

impl Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The boolean status flags of an agent.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Flag {
    Susceptible,
    Infected,
    Detectable,
    Infectious,
    Recovered,
    Testable,
    AwaitingResults,
    ToBeIsolated,
    UsingIsolationResources,
    ToBeQuarantined,
    UsingQuarantineResources,
    ToBeTransferred,
    EverInfected,
    EverIsolated,
    EverQuarantined,
}

/// The integer day counters of an agent.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Timer {
    /// Days since infection onset; may be negative for agents seeded before onset.
    Infection,
    DaysTillResults,
    Isolation,
    DaysTillQuarantine,
    DaysTillTransfer,
    Quarantine,
}

#[derive(Debug, Clone, PartialEq, Default)]
#[allow(clippy::struct_excessive_bools)]
pub struct Agent {
    pub viral_load_curve: ViralLoadCurve,
    pub infection_timer: i32,
    pub viral_load: f64,

    pub susceptible: bool,
    pub infected: bool,
    pub detectable: bool,
    pub infectious: bool,
    pub recovered: bool,

    pub testable: bool,
    pub awaiting_results: bool,
    pub days_till_results: i32,

    pub to_be_isolated: bool,
    pub using_isolation_resources: bool,
    pub isolation_timer: i32,

    pub to_be_quarantined: bool,
    pub using_quarantine_resources: bool,
    pub to_be_transferred: bool,
    pub days_till_quarantine: i32,
    pub days_till_transfer: i32,
    pub quarantine_timer: i32,

    pub ever_infected: bool,
    pub ever_isolated: bool,
    pub ever_quarantined: bool,
}

impl Agent {
    /// Creates an agent with the given curve. Every flag and timer not set by `initial` is
    /// false/0.
    pub fn new(viral_load_curve: ViralLoadCurve, initial: &AgentUpdate) -> Agent {
        let mut agent = Agent {
            viral_load_curve,
            ..Agent::default()
        };
        agent.apply(initial);
        agent
    }

    pub fn flag(&self, flag: Flag) -> bool {
        match flag {
            Flag::Susceptible => self.susceptible,
            Flag::Infected => self.infected,
            Flag::Detectable => self.detectable,
            Flag::Infectious => self.infectious,
            Flag::Recovered => self.recovered,
            Flag::Testable => self.testable,
            Flag::AwaitingResults => self.awaiting_results,
            Flag::ToBeIsolated => self.to_be_isolated,
            Flag::UsingIsolationResources => self.using_isolation_resources,
            Flag::ToBeQuarantined => self.to_be_quarantined,
            Flag::UsingQuarantineResources => self.using_quarantine_resources,
            Flag::ToBeTransferred => self.to_be_transferred,
            Flag::EverInfected => self.ever_infected,
            Flag::EverIsolated => self.ever_isolated,
            Flag::EverQuarantined => self.ever_quarantined,
        }
    }

    pub fn timer(&self, timer: Timer) -> i32 {
        match timer {
            Timer::Infection => self.infection_timer,
            Timer::DaysTillResults => self.days_till_results,
            Timer::Isolation => self.isolation_timer,
            Timer::DaysTillQuarantine => self.days_till_quarantine,
            Timer::DaysTillTransfer => self.days_till_transfer,
            Timer::Quarantine => self.quarantine_timer,
        }
    }

    fn timer_mut(&mut self, timer: Timer) -> &mut i32 {
        match timer {
            Timer::Infection => &mut self.infection_timer,
            Timer::DaysTillResults => &mut self.days_till_results,
            Timer::Isolation => &mut self.isolation_timer,
            Timer::DaysTillQuarantine => &mut self.days_till_quarantine,
            Timer::DaysTillTransfer => &mut self.days_till_transfer,
            Timer::Quarantine => &mut self.quarantine_timer,
        }
    }

    /// Applies every field set in `update`; fields left unset are untouched.
    pub fn apply(&mut self, update: &AgentUpdate) {
        macro_rules! apply_fields {
            ($($field:ident),* $(,)?) => {
                $(
                    if let Some(value) = update.$field {
                        self.$field = value;
                    }
                )*
            };
        }
        apply_fields!(
            infection_timer,
            viral_load,
            susceptible,
            infected,
            detectable,
            infectious,
            recovered,
            testable,
            awaiting_results,
            days_till_results,
            to_be_isolated,
            using_isolation_resources,
            isolation_timer,
            to_be_quarantined,
            using_quarantine_resources,
            to_be_transferred,
            days_till_quarantine,
            days_till_transfer,
            quarantine_timer,
            ever_infected,
            ever_isolated,
            ever_quarantined,
        );
    }

    /// Adds each signed delta to the named timer. Deltas for the same timer accumulate.
    pub fn increment_timers(&mut self, deltas: &[(Timer, i32)]) {
        for &(timer, delta) in deltas {
            *self.timer_mut(timer) += delta;
        }
    }

    /// Shorthand for `increment_timers(&[(timer, delta)])`.
    pub fn increment_timer(&mut self, timer: Timer, delta: i32) {
        self.increment_timers(&[(timer, delta)]);
    }
}

macro_rules! define_update_setters {
    ($($field:ident: $ty:ty),* $(,)?) => {
        /// A batch of field overwrites applied atomically by [`Agent::apply`].
        ///
        /// Built with chained setters; setting the same field twice keeps the last value.
        ///
        /// ```
        /// use sirqis::agent::AgentUpdate;
        ///
        /// let update = AgentUpdate::new().infected(true).susceptible(false);
        /// ```
        #[derive(Debug, Clone, Copy, Default, PartialEq)]
        #[must_use]
        pub struct AgentUpdate {
            $(pub $field: Option<$ty>,)*
        }

        impl AgentUpdate {
            pub fn new() -> AgentUpdate {
                AgentUpdate::default()
            }

            $(
                pub fn $field(mut self, value: $ty) -> AgentUpdate {
                    self.$field = Some(value);
                    self
                }
            )*
        }
    };
}

define_update_setters!(
    infection_timer: i32,
    viral_load: f64,
    susceptible: bool,
    infected: bool,
    detectable: bool,
    infectious: bool,
    recovered: bool,
    testable: bool,
    awaiting_results: bool,
    days_till_results: i32,
    to_be_isolated: bool,
    using_isolation_resources: bool,
    isolation_timer: i32,
    to_be_quarantined: bool,
    using_quarantine_resources: bool,
    to_be_transferred: bool,
    days_till_quarantine: i32,
    days_till_transfer: i32,
    quarantine_timer: i32,
    ever_infected: bool,
    ever_isolated: bool,
    ever_quarantined: bool,
);
