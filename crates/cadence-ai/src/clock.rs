use chrono::{DateTime, Datelike, LocalResult, NaiveTime, TimeZone, Timelike, Utc, Weekday};
use chrono_tz::Tz;

/// Time source injected into the engines so tests can pin "now".
pub trait Clock: Send + Sync {
    fn now_utc(&self) -> DateTime<Utc>;
}

/// Production clock backed by the system time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_utc(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Fixed clock for tests and replays.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now_utc(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Resolve an IANA zone name, falling back to the configured default.
pub fn resolve_zone(name: Option<&str>, default: &str) -> Tz {
    name.and_then(|value| value.trim().parse::<Tz>().ok())
        .or_else(|| default.parse::<Tz>().ok())
        .unwrap_or(chrono_tz::Europe::Vienna)
}

/// Daily window in which outbound contact is allowed, in local wall-clock hours.
#[derive(Debug, Clone, Copy)]
pub struct ContactWindow {
    pub start_hour: u32,
    pub end_hour: u32,
}

impl Default for ContactWindow {
    fn default() -> Self {
        Self {
            start_hour: 18,
            end_hour: 21,
        }
    }
}

impl ContactWindow {
    /// Shift an instant so that it lands inside the window in `tz`.
    ///
    /// Instants before the window open on that local day move to the window
    /// start; instants past the close roll to the next day's start; instants
    /// already inside the window are returned unchanged.
    pub fn align(&self, tz: Tz, instant: DateTime<Utc>) -> DateTime<Utc> {
        let local = instant.with_timezone(&tz);
        let hour = local.hour();
        if hour < self.start_hour {
            next_local_hour(tz, instant, self.start_hour)
        } else if hour >= self.end_hour {
            next_local_hour(tz, instant, self.start_hour)
        } else {
            instant
        }
    }
}

/// Next occurrence of 18:00 local time in `tz`, strictly after `base`.
///
/// Heuristic optimum for DACH B2C follow-ups.
pub fn next_best_contact_time(tz: Tz, base: DateTime<Utc>) -> DateTime<Utc> {
    next_local_hour(tz, base, 18)
}

/// Next occurrence of `hour`:00 local (default caller passes 9), strictly after `base`.
pub fn next_morning(tz: Tz, base: DateTime<Utc>, hour: u32) -> DateTime<Utc> {
    next_local_hour(tz, base, hour)
}

/// Next `target` weekday at `hour`:00 local, strictly after `base`.
pub fn next_weekday(tz: Tz, base: DateTime<Utc>, target: Weekday, hour: u32) -> DateTime<Utc> {
    let mut candidate = next_local_hour(tz, base, hour);
    while candidate.with_timezone(&tz).weekday() != target {
        candidate = next_local_hour(tz, candidate, hour);
    }
    candidate
}

fn next_local_hour(tz: Tz, base: DateTime<Utc>, hour: u32) -> DateTime<Utc> {
    let target = NaiveTime::from_hms_opt(hour, 0, 0).unwrap_or(NaiveTime::MIN);
    let local = base.with_timezone(&tz);
    let mut date = local.date_naive();
    if local.time() >= target {
        date = date.succ_opt().unwrap_or(date);
    }

    // Walk forward over DST gaps until the wall-clock time exists and the
    // resulting instant is strictly after the base.
    loop {
        let resolved = match tz.from_local_datetime(&date.and_time(target)) {
            LocalResult::Single(dt) => Some(dt),
            LocalResult::Ambiguous(earliest, _) => Some(earliest),
            LocalResult::None => None,
        };
        if let Some(dt) = resolved {
            let instant = dt.with_timezone(&Utc);
            if instant > base {
                return instant;
            }
        }
        date = match date.succ_opt() {
            Some(next) => next,
            None => return base,
        };
    }
}
