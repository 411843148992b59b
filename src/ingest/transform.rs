//! Raw upstream rows to telemetry samples
//!
//! Each row is transformed independently. A row that cannot become a valid
//! sample is dropped with a [`TransformSkip`] reason; it never fails the
//! batch and never affects its neighbours.

use crate::types::{NewSample, RawRecord, ReplayWindow, GEAR_MAX, GEAR_REVERSE};
use crate::utils::parse_instant;

use super::SubjectResolver;

/// Why a raw row was dropped
#[derive(Debug, Clone, PartialEq)]
pub enum TransformSkip {
    MissingField(&'static str),
    InvalidTimestamp(String),
    /// Timestamp outside the window that produced the row
    OutOfWindow,
    OutOfRange(&'static str),
    UnknownDriver(u32),
}

impl std::fmt::Display for TransformSkip {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransformSkip::MissingField(field) => write!(f, "missing field {}", field),
            TransformSkip::InvalidTimestamp(raw) => write!(f, "invalid timestamp {:?}", raw),
            TransformSkip::OutOfWindow => write!(f, "timestamp outside window"),
            TransformSkip::OutOfRange(field) => write!(f, "{} out of range", field),
            TransformSkip::UnknownDriver(n) => write!(f, "unknown driver number {}", n),
        }
    }
}

/// Result of transforming a whole batch
#[derive(Debug, Default)]
pub struct TransformedBatch {
    pub samples: Vec<NewSample>,
    pub skipped: Vec<TransformSkip>,
}

/// Transform one raw row
pub fn transform(
    raw: &RawRecord,
    window: Option<&ReplayWindow>,
    resolver: &SubjectResolver,
) -> Result<NewSample, TransformSkip> {
    let speed = raw.speed.ok_or(TransformSkip::MissingField("speed"))?;
    let throttle = raw.throttle.ok_or(TransformSkip::MissingField("throttle"))?;
    let brake = raw.brake.ok_or(TransformSkip::MissingField("brake"))?;
    let gear = raw.n_gear.ok_or(TransformSkip::MissingField("n_gear"))?;
    let date = raw.date.as_deref().ok_or(TransformSkip::MissingField("date"))?;
    let driver_number = raw
        .driver_number
        .ok_or(TransformSkip::MissingField("driver_number"))?;

    let timestamp =
        parse_instant(date).ok_or_else(|| TransformSkip::InvalidTimestamp(date.to_string()))?;
    if let Some(window) = window {
        if !window.contains(timestamp) {
            return Err(TransformSkip::OutOfWindow);
        }
    }

    if !speed.is_finite() || speed < 0.0 {
        return Err(TransformSkip::OutOfRange("speed"));
    }
    if !is_percentage(throttle) {
        return Err(TransformSkip::OutOfRange("throttle"));
    }
    if !is_percentage(brake) {
        return Err(TransformSkip::OutOfRange("brake"));
    }
    if gear < i64::from(GEAR_REVERSE) || gear > i64::from(GEAR_MAX) {
        return Err(TransformSkip::OutOfRange("n_gear"));
    }

    let driver_id = resolver
        .driver_id(driver_number)
        .ok_or(TransformSkip::UnknownDriver(driver_number))?;

    Ok(NewSample {
        speed,
        throttle,
        brake,
        gear: gear as i8,
        timestamp,
        driver_id,
        race_id: resolver.race_id(),
    })
}

/// Transform every row, keeping arrival order of the survivors
pub fn transform_batch(
    records: &[RawRecord],
    window: Option<&ReplayWindow>,
    resolver: &SubjectResolver,
) -> TransformedBatch {
    let mut batch = TransformedBatch::default();
    for raw in records {
        match transform(raw, window, resolver) {
            Ok(sample) => batch.samples.push(sample),
            Err(skip) => batch.skipped.push(skip),
        }
    }
    batch
}

fn is_percentage(value: f64) -> bool {
    (0.0..=100.0).contains(&value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn resolver() -> SubjectResolver {
        SubjectResolver::new(1).with_driver(1, 10).with_driver(16, 11)
    }

    fn raw(second: u32) -> RawRecord {
        RawRecord {
            speed: Some(287.0),
            throttle: Some(99.0),
            brake: Some(0.0),
            n_gear: Some(7),
            date: Some(format!("2024-03-02T15:00:{:02}.250000+00:00", second)),
            driver_number: Some(1),
            ..Default::default()
        }
    }

    fn window() -> ReplayWindow {
        ReplayWindow::new(
            Utc.with_ymd_and_hms(2024, 3, 2, 15, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 3, 2, 15, 0, 5).unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn test_transform_maps_fields() {
        let sample = transform(&raw(1), Some(&window()), &resolver()).unwrap();

        assert_eq!(sample.speed, 287.0);
        assert_eq!(sample.gear, 7);
        assert_eq!(sample.driver_id, 10);
        assert_eq!(sample.race_id, 1);
        assert_eq!(
            sample.timestamp,
            Utc.with_ymd_and_hms(2024, 3, 2, 15, 0, 1).unwrap() + chrono::Duration::milliseconds(250)
        );
    }

    #[test]
    fn test_missing_required_fields() {
        let cases: [(fn(&mut RawRecord), &str); 6] = [
            (|r: &mut RawRecord| r.speed = None, "speed"),
            (|r: &mut RawRecord| r.throttle = None, "throttle"),
            (|r: &mut RawRecord| r.brake = None, "brake"),
            (|r: &mut RawRecord| r.n_gear = None, "n_gear"),
            (|r: &mut RawRecord| r.date = None, "date"),
            (|r: &mut RawRecord| r.driver_number = None, "driver_number"),
        ];

        for (strip, field) in cases {
            let mut record = raw(1);
            strip(&mut record);
            assert_eq!(
                transform(&record, None, &resolver()),
                Err(TransformSkip::MissingField(field))
            );
        }
    }

    #[test]
    fn test_out_of_window_is_skipped() {
        let record = raw(5);
        assert_eq!(
            transform(&record, Some(&window()), &resolver()),
            Err(TransformSkip::OutOfWindow)
        );
        // Without a window the same row is accepted
        assert!(transform(&record, None, &resolver()).is_ok());
    }

    #[test]
    fn test_range_checks() {
        let mut record = raw(1);
        record.throttle = Some(104.0);
        assert_eq!(
            transform(&record, None, &resolver()),
            Err(TransformSkip::OutOfRange("throttle"))
        );

        let mut record = raw(1);
        record.n_gear = Some(9);
        assert_eq!(
            transform(&record, None, &resolver()),
            Err(TransformSkip::OutOfRange("n_gear"))
        );

        let mut record = raw(1);
        record.speed = Some(-1.0);
        assert_eq!(
            transform(&record, None, &resolver()),
            Err(TransformSkip::OutOfRange("speed"))
        );

        let mut record = raw(1);
        record.n_gear = Some(-1);
        assert_eq!(transform(&record, None, &resolver()).unwrap().gear, -1);
    }

    #[test]
    fn test_unknown_driver_and_bad_timestamp() {
        let mut record = raw(1);
        record.driver_number = Some(44);
        assert_eq!(
            transform(&record, None, &resolver()),
            Err(TransformSkip::UnknownDriver(44))
        );

        let mut record = raw(1);
        record.date = Some("not-a-date".to_string());
        assert!(matches!(
            transform(&record, None, &resolver()),
            Err(TransformSkip::InvalidTimestamp(_))
        ));
    }

    #[test]
    fn test_batch_skip_isolated_per_record() {
        let mut broken = raw(2);
        broken.n_gear = None;
        let records = vec![raw(1), broken, raw(3)];

        let batch = transform_batch(&records, Some(&window()), &resolver());

        assert_eq!(batch.samples.len(), 2);
        assert_eq!(batch.skipped, vec![TransformSkip::MissingField("n_gear")]);
        let expected_first = transform(&records[0], Some(&window()), &resolver()).unwrap();
        let expected_last = transform(&records[2], Some(&window()), &resolver()).unwrap();
        assert_eq!(batch.samples[0], expected_first);
        assert_eq!(batch.samples[1], expected_last);
    }
}
