use chrono::{DateTime, Local, TimeDelta, Timelike};

pub const QUARTER: TimeDelta = TimeDelta::minutes(15);

pub fn round_down_to_quarter(time: DateTime<Local>) -> DateTime<Local> {
    let seconds = i64::from(time.minute() % 15) * 60 + i64::from(time.second());
    time - TimeDelta::seconds(seconds) - TimeDelta::nanoseconds(i64::from(time.nanosecond()))
}

/// Time the optimization may run starting at `now`, in whole seconds.
///
/// The optimization must finish `buffer` before the next quarter. When less than `minimum`
/// would remain, it gets the quarter after that as well.
pub fn execution_limit(now: DateTime<Local>, buffer: TimeDelta, minimum: TimeDelta) -> TimeDelta {
    let deadline = round_down_to_quarter(now) + QUARTER - buffer;
    let limit = TimeDelta::seconds((deadline - now).num_seconds());
    if limit >= minimum { limit } else { limit + QUARTER }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn at(minute: u32, second: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(2025, 6, 2, 12, minute, second).unwrap()
    }

    #[test]
    fn round_down() {
        assert_eq!(round_down_to_quarter(at(14, 59)), at(0, 0));
        assert_eq!(round_down_to_quarter(at(15, 0)), at(15, 0));
        assert_eq!(
            round_down_to_quarter(at(47, 3) + TimeDelta::milliseconds(250)),
            at(45, 0),
        );
    }

    #[test]
    fn limit_at_quarter_start() {
        let limit = execution_limit(at(0, 0), TimeDelta::seconds(30), TimeDelta::seconds(60));
        assert_eq!(limit, TimeDelta::seconds(14 * 60 + 30));
    }

    #[test]
    fn limit_just_above_minimum() {
        let limit = execution_limit(at(13, 29), TimeDelta::seconds(30), TimeDelta::seconds(60));
        assert_eq!(limit, TimeDelta::seconds(61));
    }

    #[test]
    fn limit_extends_to_next_quarter() {
        let limit = execution_limit(at(14, 0), TimeDelta::seconds(30), TimeDelta::seconds(60));
        assert_eq!(limit, TimeDelta::seconds(30 + 15 * 60));
    }
}
