//! The timer scheduler.
//!
//! Timers live in one table keyed by `(owner, name)`; the dispatcher
//! asks for [`next_due`](TimerWheel::next_due) to size its sleep and
//! collects due fires on each wake. Firing is synchronous on the
//! dispatcher: a faulting timer function is logged and the timer
//! keeps its schedule (unless it was one-shot).
//!
//! Clock jumps get at most one catch-up per timer: the next fire is
//! recomputed from *now*, not accumulated from the missed schedule.

use chrono::{DateTime, Duration as ChronoDuration, NaiveTime, Utc};
use mudmux_plugin::{CoreError, TimerSpec};
use mudmux_types::PluginId;
use std::collections::HashMap;

/// One scheduled fire handed to the dispatcher.
#[derive(Debug, Clone)]
pub struct TimerFire {
    /// Owning plugin.
    pub owner: PluginId,
    /// Timer name.
    pub name: String,
    /// Handler routed through `Plugin::fire_timer`.
    pub handler: String,
    /// Whether to log the fire at debug level.
    pub log: bool,
}

/// One registered timer.
#[derive(Debug, Clone)]
pub struct TimerEntry {
    /// Timer name, unique per owner.
    pub name: String,
    /// Owning plugin.
    pub owner: PluginId,
    /// Handler name.
    pub handler: String,
    /// Interval for plain timers, seconds.
    pub interval_secs: u64,
    /// Whether the timer fires at all.
    pub enabled: bool,
    /// Removed after its first fire.
    pub one_shot: bool,
    /// Wall-clock anchor for time-of-day timers, UTC.
    pub time_of_day: Option<NaiveTime>,
    /// Log fires at debug level.
    pub log: bool,
    /// Last fire time.
    pub last_fire: Option<DateTime<Utc>>,
    /// Next scheduled fire.
    pub next_fire: DateTime<Utc>,
    /// How many times the timer has fired.
    pub raised_count: u64,
}

/// The timer table.
#[derive(Debug, Default)]
pub struct TimerWheel {
    timers: HashMap<(PluginId, String), TimerEntry>,
}

/// Parses an `HHMM` anchor into a UTC time of day.
fn parse_anchor(anchor: &str) -> Result<NaiveTime, CoreError> {
    let bad = || CoreError::BadTimeAnchor(anchor.to_string());
    if anchor.len() != 4 || !anchor.bytes().all(|b| b.is_ascii_digit()) {
        return Err(bad());
    }
    let hours: u32 = anchor[..2].parse().map_err(|_| bad())?;
    let minutes: u32 = anchor[2..].parse().map_err(|_| bad())?;
    NaiveTime::from_hms_opt(hours, minutes, 0).ok_or_else(bad)
}

/// The next wall-clock occurrence of `anchor` strictly after `now`.
fn next_time_of_day(anchor: NaiveTime, now: DateTime<Utc>) -> DateTime<Utc> {
    let today = now.date_naive().and_time(anchor).and_utc();
    if today > now {
        today
    } else {
        today + ChronoDuration::days(1)
    }
}

impl TimerWheel {
    /// Creates an empty wheel.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a timer.
    ///
    /// # Errors
    ///
    /// - [`CoreError::DuplicateTimer`] for an existing owner/name
    /// - [`CoreError::BadTimeAnchor`] for a malformed `HHMM` anchor
    pub fn add(
        &mut self,
        owner: &PluginId,
        spec: TimerSpec,
        now: DateTime<Utc>,
    ) -> Result<(), CoreError> {
        let key = (owner.clone(), spec.name.clone());
        if self.timers.contains_key(&key) {
            return Err(CoreError::DuplicateTimer(spec.name));
        }

        let time_of_day = spec
            .time_of_day
            .as_deref()
            .map(parse_anchor)
            .transpose()?;

        let next_fire = match time_of_day {
            Some(anchor) => next_time_of_day(anchor, now),
            None => now + ChronoDuration::seconds(spec.interval_secs as i64),
        };

        self.timers.insert(
            key,
            TimerEntry {
                name: spec.name,
                owner: owner.clone(),
                handler: spec.handler,
                interval_secs: spec.interval_secs,
                enabled: spec.enabled,
                one_shot: spec.one_shot,
                time_of_day,
                log: spec.log,
                last_fire: None,
                next_fire,
                raised_count: 0,
            },
        );
        Ok(())
    }

    /// Removes a timer; returns whether it existed.
    pub fn remove(&mut self, owner: &PluginId, name: &str) -> bool {
        self.timers
            .remove(&(owner.clone(), name.to_string()))
            .is_some()
    }

    /// Removes every timer owned by `owner`; returns how many.
    pub fn remove_owner(&mut self, owner: &PluginId) -> usize {
        let before = self.timers.len();
        self.timers.retain(|(timer_owner, _), _| timer_owner != owner);
        before - self.timers.len()
    }

    /// Enables or disables a timer. Re-enabling reschedules from
    /// *now* so a long-disabled timer doesn't fire immediately.
    ///
    /// # Errors
    ///
    /// [`CoreError::UnknownTimer`] for unknown owner/name.
    pub fn set_enabled(
        &mut self,
        owner: &PluginId,
        name: &str,
        enabled: bool,
        now: DateTime<Utc>,
    ) -> Result<(), CoreError> {
        let entry = self
            .timers
            .get_mut(&(owner.clone(), name.to_string()))
            .ok_or_else(|| CoreError::UnknownTimer(name.to_string()))?;
        if enabled && !entry.enabled {
            entry.next_fire = match entry.time_of_day {
                Some(anchor) => next_time_of_day(anchor, now),
                None => now + ChronoDuration::seconds(entry.interval_secs as i64),
            };
        }
        entry.enabled = enabled;
        Ok(())
    }

    /// Looks up a timer.
    #[must_use]
    pub fn get(&self, owner: &PluginId, name: &str) -> Option<&TimerEntry> {
        self.timers.get(&(owner.clone(), name.to_string()))
    }

    /// All timers, sorted by next fire.
    #[must_use]
    pub fn list(&self) -> Vec<&TimerEntry> {
        let mut entries: Vec<&TimerEntry> = self.timers.values().collect();
        entries.sort_by_key(|t| t.next_fire);
        entries
    }

    /// The earliest next fire among enabled timers.
    #[must_use]
    pub fn next_due(&self) -> Option<DateTime<Utc>> {
        self.timers
            .values()
            .filter(|t| t.enabled)
            .map(|t| t.next_fire)
            .min()
    }

    /// Collects every fire due at `now`, advancing schedules.
    ///
    /// Each due timer fires exactly once per call regardless of how
    /// far the clock jumped: plain timers reschedule `now + interval`,
    /// time-of-day timers re-anchor to the next wall-clock match
    /// after `now`. One-shots are removed.
    pub fn due(&mut self, now: DateTime<Utc>) -> Vec<TimerFire> {
        let mut fires = Vec::new();
        let mut finished: Vec<(PluginId, String)> = Vec::new();

        for (key, entry) in &mut self.timers {
            if !entry.enabled || entry.next_fire > now {
                continue;
            }
            entry.raised_count += 1;
            entry.last_fire = Some(now);
            fires.push(TimerFire {
                owner: entry.owner.clone(),
                name: entry.name.clone(),
                handler: entry.handler.clone(),
                log: entry.log,
            });

            if entry.one_shot {
                finished.push(key.clone());
            } else {
                entry.next_fire = match entry.time_of_day {
                    Some(anchor) => next_time_of_day(anchor, now),
                    None => now + ChronoDuration::seconds(entry.interval_secs as i64),
                };
            }
        }

        for key in finished {
            self.timers.remove(&key);
        }

        // Deterministic fire order for ties.
        fires.sort_by(|a, b| (&a.owner, &a.name).cmp(&(&b.owner, &b.name)));
        fires
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn owner() -> PluginId {
        PluginId::new("plugins.test")
    }

    fn t0() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-08-02T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn anchor_parses() {
        assert_eq!(
            parse_anchor("0930").unwrap(),
            NaiveTime::from_hms_opt(9, 30, 0).unwrap()
        );
        assert!(parse_anchor("930").is_err());
        assert!(parse_anchor("2560").is_err());
        assert!(parse_anchor("ab30").is_err());
    }

    #[test]
    fn interval_timer_schedules_and_fires() {
        let mut wheel = TimerWheel::new();
        wheel
            .add(&owner(), TimerSpec::every("poll", "on_poll", 30), t0())
            .unwrap();

        assert_eq!(wheel.next_due(), Some(t0() + ChronoDuration::seconds(30)));
        assert!(wheel.due(t0()).is_empty());

        let fires = wheel.due(t0() + ChronoDuration::seconds(30));
        assert_eq!(fires.len(), 1);
        assert_eq!(fires[0].handler, "on_poll");

        // Rescheduled relative to the fire time.
        let entry = wheel.get(&owner(), "poll").unwrap();
        assert_eq!(
            entry.next_fire,
            t0() + ChronoDuration::seconds(60)
        );
        assert_eq!(entry.raised_count, 1);
    }

    #[test]
    fn one_shot_removed_after_fire() {
        let mut wheel = TimerWheel::new();
        wheel
            .add(&owner(), TimerSpec::once("later", "on_later", 5), t0())
            .unwrap();

        let fires = wheel.due(t0() + ChronoDuration::seconds(5));
        assert_eq!(fires.len(), 1);
        assert!(wheel.get(&owner(), "later").is_none());
    }

    #[test]
    fn clock_jump_gets_single_catchup() {
        let mut wheel = TimerWheel::new();
        wheel
            .add(&owner(), TimerSpec::every("poll", "on_poll", 10), t0())
            .unwrap();

        // The clock jumps an hour: one fire, rescheduled from now.
        let late = t0() + ChronoDuration::hours(1);
        assert_eq!(wheel.due(late).len(), 1);
        assert!(wheel.due(late).is_empty());
        assert_eq!(
            wheel.get(&owner(), "poll").unwrap().next_fire,
            late + ChronoDuration::seconds(10)
        );
    }

    #[test]
    fn time_of_day_anchors_daily() {
        let mut wheel = TimerWheel::new();
        // 12:00Z now; anchor 0930 → tomorrow 09:30.
        wheel
            .add(&owner(), TimerSpec::daily_at("reset", "on_reset", "0930"), t0())
            .unwrap();
        let entry = wheel.get(&owner(), "reset").unwrap();
        assert_eq!(entry.next_fire.time(), NaiveTime::from_hms_opt(9, 30, 0).unwrap());
        assert_eq!(entry.next_fire.date_naive(), (t0() + ChronoDuration::days(1)).date_naive());

        // Fires once at the anchor even across a clock jump, then
        // re-anchors to the next day.
        let jump = entry.next_fire + ChronoDuration::hours(3);
        let fires = wheel.due(jump);
        assert_eq!(fires.len(), 1);
        let entry = wheel.get(&owner(), "reset").unwrap();
        assert!(entry.next_fire > jump);
        assert_eq!(entry.next_fire.time(), NaiveTime::from_hms_opt(9, 30, 0).unwrap());
    }

    #[test]
    fn disabled_timers_do_not_fire() {
        let mut wheel = TimerWheel::new();
        wheel
            .add(
                &owner(),
                TimerSpec::every("poll", "on_poll", 10).disabled(),
                t0(),
            )
            .unwrap();
        assert!(wheel.next_due().is_none());
        assert!(wheel.due(t0() + ChronoDuration::hours(1)).is_empty());

        wheel
            .set_enabled(&owner(), "poll", true, t0() + ChronoDuration::hours(1))
            .unwrap();
        let entry = wheel.get(&owner(), "poll").unwrap();
        assert_eq!(
            entry.next_fire,
            t0() + ChronoDuration::hours(1) + ChronoDuration::seconds(10)
        );
    }

    #[test]
    fn duplicate_and_unknown_errors() {
        let mut wheel = TimerWheel::new();
        wheel
            .add(&owner(), TimerSpec::every("poll", "h", 10), t0())
            .unwrap();
        assert!(matches!(
            wheel.add(&owner(), TimerSpec::every("poll", "h", 10), t0()),
            Err(CoreError::DuplicateTimer(_))
        ));
        assert!(matches!(
            wheel.set_enabled(&owner(), "missing", true, t0()),
            Err(CoreError::UnknownTimer(_))
        ));
    }

    #[test]
    fn remove_owner_clears_table() {
        let mut wheel = TimerWheel::new();
        wheel
            .add(&owner(), TimerSpec::every("a", "h", 10), t0())
            .unwrap();
        wheel
            .add(&owner(), TimerSpec::every("b", "h", 10), t0())
            .unwrap();
        assert_eq!(wheel.remove_owner(&owner()), 2);
        assert!(wheel.next_due().is_none());
    }
}
