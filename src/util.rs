use chrono::{DateTime, Datelike, Timelike, Utc};

pub fn year_key(timestamp: &DateTime<Utc>) -> String {
    format!("{}", timestamp.year())
}

pub fn month_key(timestamp: &DateTime<Utc>) -> String {
    timestamp.format("%Y-%m").to_string()
}

pub fn day_key(timestamp: &DateTime<Utc>) -> String {
    timestamp.format("%Y-%m-%d").to_string()
}

pub fn week_key(timestamp: &DateTime<Utc>) -> String {
    format!("{}-{:02}", timestamp.year(), timestamp.iso_week().week())
}

pub fn hour_key(timestamp: &DateTime<Utc>) -> String {
    format!("{}", timestamp.hour())
}

/// Whole days between two unix timestamps, ceiling-rounded.
pub fn ceil_days(first: i64, last: i64) -> i64 {
    let diff = (last - first).max(0);
    (diff + 86_399) / 86_400
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn ceil_days_rounds_up_partial_days() {
        assert_eq!(ceil_days(1_527_621_944, 1_528_755_935), 14);
    }

    #[test]
    fn ceil_days_same_instant_is_zero() {
        assert_eq!(ceil_days(100, 100), 0);
    }

    #[test]
    fn ceil_days_under_one_day_is_one() {
        assert_eq!(ceil_days(1_528_753_813, 1_528_753_992), 1);
    }

    #[test]
    fn bucket_keys_use_utc() {
        let ts = Utc.timestamp_opt(1_528_753_992, 0).unwrap();
        assert_eq!(year_key(&ts), "2018");
        assert_eq!(month_key(&ts), "2018-06");
        assert_eq!(day_key(&ts), "2018-06-11");
        assert_eq!(week_key(&ts), "2018-24");
        assert_eq!(hour_key(&ts), "21");
    }
}
