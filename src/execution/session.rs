#![allow(dead_code)]
use chrono::{DateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Named trading session in engine time. Windows may wrap midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionWindow {
    pub name: SessionName,
    /// Inclusive start, minutes since midnight.
    pub start_minute: u32,
    /// Exclusive end, minutes since midnight.
    pub end_minute: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionName {
    London,
    NewYork,
    Tokyo,
    Sydney,
}

impl SessionName {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionName::London => "london",
            SessionName::NewYork => "newyork",
            SessionName::Tokyo => "tokyo",
            SessionName::Sydney => "sydney",
        }
    }
}

impl fmt::Display for SessionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl SessionWindow {
    pub fn new(name: SessionName, start_hour: u32, end_hour: u32) -> Self {
        Self {
            name,
            start_minute: start_hour * 60,
            end_minute: end_hour * 60,
        }
    }

    /// Parse a configured session name. `ny` is recognized as an alias for
    /// `newyork`.
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "london" => Some(Self::new(SessionName::London, 3, 11)),
            "newyork" | "ny" | "new_york" => Some(Self::new(SessionName::NewYork, 8, 16)),
            "tokyo" | "asia" => Some(Self::new(SessionName::Tokyo, 19, 3)),
            "sydney" => Some(Self::new(SessionName::Sydney, 17, 1)),
            _ => None,
        }
    }

    pub fn contains(&self, time: DateTime<Utc>) -> bool {
        let minute = time.hour() * 60 + time.minute();
        if self.start_minute <= self.end_minute {
            minute >= self.start_minute && minute < self.end_minute
        } else {
            // Wrapping window, e.g. tokyo 19:00-03:00.
            minute >= self.start_minute || minute < self.end_minute
        }
    }
}

/// True when `time` falls inside at least one configured window. An empty
/// window list disables the gate.
pub fn in_any_session(windows: &[SessionWindow], time: DateTime<Utc>) -> bool {
    windows.is_empty() || windows.iter().any(|w| w.contains(time))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 2, hour, minute, 0).unwrap()
    }

    #[test]
    fn ny_alias_resolves_to_newyork() {
        let w = SessionWindow::parse("ny").unwrap();
        assert_eq!(w.name, SessionName::NewYork);
        assert_eq!(w.start_minute, 8 * 60);
        assert_eq!(w.end_minute, 16 * 60);
    }

    #[test]
    fn window_bounds_are_inclusive_exclusive() {
        let london = SessionWindow::parse("london").unwrap();
        assert!(!london.contains(at(2, 59)));
        assert!(london.contains(at(3, 0)));
        assert!(london.contains(at(10, 59)));
        assert!(!london.contains(at(11, 0)));
    }

    #[test]
    fn wrapping_window_covers_midnight() {
        let tokyo = SessionWindow::parse("tokyo").unwrap();
        assert!(tokyo.contains(at(22, 0)));
        assert!(tokyo.contains(at(1, 30)));
        assert!(!tokyo.contains(at(12, 0)));
    }

    #[test]
    fn empty_session_list_disables_the_gate() {
        assert!(in_any_session(&[], at(12, 0)));
        let windows = vec![SessionWindow::parse("london").unwrap()];
        assert!(!in_any_session(&windows, at(23, 0)));
    }
}
