use chrono::{DateTime, FixedOffset, NaiveDate, TimeZone};

/// A point in time with an attached offset, as carried by tag 0/1.
///
/// Naive (offset-less) datetimes are a host-side concern handled before
/// values reach the encoder: `encode_datetime` requires a `FixedOffset`,
/// attaching the configured default timezone or failing with
/// `NaiveDatetimeNoTZ` (§4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateTimeValue(pub DateTime<FixedOffset>);

impl DateTimeValue {
    pub fn new(dt: DateTime<FixedOffset>) -> Self {
        Self(dt)
    }
}

impl From<DateTime<FixedOffset>> for DateTimeValue {
    fn from(dt: DateTime<FixedOffset>) -> Self {
        Self(dt)
    }
}

/// A calendar date with no time-of-day component; `encode_date` lowers this
/// to midnight UTC and routes through `encode_datetime`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateValue(pub NaiveDate);

impl DateValue {
    pub fn new(date: NaiveDate) -> Self {
        Self(date)
    }

    pub fn to_midnight_utc(self) -> DateTimeValue {
        let dt = self.0.and_hms_opt(0, 0, 0).expect("midnight is always valid");
        let utc = FixedOffset::east_opt(0).unwrap();
        DateTimeValue(utc.from_utc_datetime(&dt))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn date_lowers_to_midnight() {
        let date = DateValue::new(NaiveDate::from_ymd_opt(2013, 3, 21).unwrap());
        let dt = date.to_midnight_utc();
        let expected = FixedOffset::east_opt(0)
            .unwrap()
            .with_ymd_and_hms(2013, 3, 21, 0, 0, 0)
            .unwrap();
        assert_eq!(dt.0, expected);
    }
}
