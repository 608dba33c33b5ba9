//! `TimeService`: system timezone discovery, wall-clock <-> UTC conversion,
//! cron-field formatting, and minute-boundary rounding (spec.md §4.2).
//!
//! Consolidates every place cron fields get formatted so callers never do it
//! themselves (spec.md §9, "Cron-field formatting scattered across
//! callers").

use chrono::{DateTime, Datelike, TimeZone, Timelike, Utc};
use chrono_tz::Tz;

/// The five numeric fields of a standard cron line, without leading zeros.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CronFields {
    pub minute: u32,
    pub hour: u32,
    pub day_of_month: u32,
    pub month: u32,
}

impl std::fmt::Display for CronFields {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {} {} {} *",
            self.minute, self.hour, self.day_of_month, self.month
        )
    }
}

/// Reads the host's system timezone and performs wall-clock conversions
/// against it — deliberately not `chrono::Local`, which reads the
/// process/libc default and can silently disagree with the host timezone
/// inside a container (spec.md §4.2).
#[derive(Debug, Clone)]
pub struct TimeService {
    system_timezone: Tz,
}

impl TimeService {
    /// Discover the system timezone from the host, falling back to UTC if
    /// it cannot be determined. Checked in order:
    /// 1. `TZ` environment variable (explicit override, mainly for tests).
    /// 2. `/etc/timezone` (Debian/Ubuntu-style).
    /// 3. The `/etc/localtime` symlink target, which on most Linux
    ///    distributions points into the system zoneinfo tree, e.g.
    ///    `/usr/share/zoneinfo/America/Los_Angeles`.
    pub fn discover() -> Self {
        let system_timezone = Self::read_system_timezone().unwrap_or(Tz::UTC);
        Self { system_timezone }
    }

    /// Construct a `TimeService` pinned to an explicit timezone, bypassing
    /// host discovery. Used by tests and by callers that already know the
    /// configured timezone (e.g. `HeatTargetSettings.timezone`).
    pub fn with_timezone(tz: Tz) -> Self {
        Self {
            system_timezone: tz,
        }
    }

    fn read_system_timezone() -> Option<Tz> {
        if let Ok(tz_env) = std::env::var("TZ") {
            if let Ok(tz) = tz_env.parse::<Tz>() {
                return Some(tz);
            }
        }

        if let Ok(contents) = std::fs::read_to_string("/etc/timezone") {
            if let Ok(tz) = contents.trim().parse::<Tz>() {
                return Some(tz);
            }
        }

        if let Ok(link_target) = std::fs::read_link("/etc/localtime") {
            let link_str = link_target.to_string_lossy();
            if let Some(zoneinfo_idx) = link_str.find("zoneinfo/") {
                let name = &link_str[zoneinfo_idx + "zoneinfo/".len()..];
                if let Ok(tz) = name.parse::<Tz>() {
                    return Some(tz);
                }
            }
        }

        None
    }

    pub fn system_timezone(&self) -> Tz {
        self.system_timezone
    }

    pub fn now_utc(&self) -> DateTime<Utc> {
        Utc::now()
    }

    pub fn to_local(&self, instant: DateTime<Utc>) -> DateTime<Tz> {
        instant.with_timezone(&self.system_timezone)
    }

    pub fn to_utc(&self, local: DateTime<Tz>) -> DateTime<Utc> {
        local.with_timezone(&Utc)
    }

    /// Convert a local wall-clock `(hour, minute)` in a given IANA timezone
    /// into the next UTC instant that wall-clock time occurs (today if still
    /// ahead of now, otherwise tomorrow).
    pub fn next_local_occurrence(
        &self,
        timezone: Tz,
        hour: u32,
        minute: u32,
    ) -> Option<DateTime<Utc>> {
        let now_local = Utc::now().with_timezone(&timezone);
        let today = timezone
            .with_ymd_and_hms(now_local.year(), now_local.month(), now_local.day(), hour, minute, 0)
            .single()?;
        let candidate = if today > now_local {
            today
        } else {
            today + chrono::Duration::days(1)
        };
        Some(candidate.with_timezone(&Utc))
    }

    /// Cron fields for an absolute instant, computed in the **system**
    /// timezone (spec.md §4.6 step 4: "Compute cron fields in the system
    /// timezone, not the process timezone"). Fields carry no leading zeros.
    pub fn cron_fields(&self, instant: DateTime<Utc>) -> CronFields {
        let local = self.to_local(instant);
        CronFields {
            minute: local.minute(),
            hour: local.hour(),
            day_of_month: local.day(),
            month: local.month(),
        }
    }

    /// The next minute boundary that is at least `margin_seconds` away from
    /// now, so a cron entry written for that minute is never missed by a
    /// runner about to fire the current minute (spec.md §4.2).
    pub fn round_up_to_minute_with_margin(
        &self,
        from: DateTime<Utc>,
        margin_seconds: i64,
    ) -> DateTime<Utc> {
        let floor_minute = from
            .date_naive()
            .and_hms_opt(from.hour(), from.minute(), 0)
            .expect("valid hh:mm:00");
        let floor_minute = Utc.from_utc_datetime(&floor_minute);

        let mut candidate = floor_minute + chrono::Duration::minutes(1);
        while (candidate - from).num_seconds() < margin_seconds {
            candidate += chrono::Duration::minutes(1);
        }
        candidate
    }
}

impl Default for TimeService {
    fn default() -> Self {
        Self::discover()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn cron_fields_have_no_leading_zeros_and_use_system_timezone() {
        let svc = TimeService::with_timezone(chrono_tz::America::New_York);
        // 2024-01-05 05:07:00 UTC is 2024-01-05 00:07:00 in New York (EST, UTC-5).
        let instant = Utc.with_ymd_and_hms(2024, 1, 5, 5, 7, 0).unwrap();
        let fields = svc.cron_fields(instant);
        assert_eq!(fields.minute, 7);
        assert_eq!(fields.hour, 0);
        assert_eq!(fields.day_of_month, 5);
        assert_eq!(fields.month, 1);
        assert_eq!(fields.to_string(), "7 0 5 1 *");
    }

    #[test]
    fn round_up_to_minute_with_margin_respects_margin() {
        let svc = TimeService::with_timezone(chrono_tz::UTC);
        let now = Utc.with_ymd_and_hms(2024, 1, 5, 10, 30, 50).unwrap();
        // 10 seconds left in the current minute; asking for a 30s margin must
        // skip to the minute after next.
        let rounded = svc.round_up_to_minute_with_margin(now, 30);
        assert_eq!(rounded, Utc.with_ymd_and_hms(2024, 1, 5, 10, 32, 0).unwrap());
    }

    #[test]
    fn round_up_to_minute_with_small_margin_uses_next_minute() {
        let svc = TimeService::with_timezone(chrono_tz::UTC);
        let now = Utc.with_ymd_and_hms(2024, 1, 5, 10, 30, 0).unwrap();
        let rounded = svc.round_up_to_minute_with_margin(now, 5);
        assert_eq!(rounded, Utc.with_ymd_and_hms(2024, 1, 5, 10, 31, 0).unwrap());
    }
}
