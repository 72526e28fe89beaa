//! Series — an immutable, date-ordered sequence of observations for one entity.
//!
//! A `Series` is validated once at construction (strictly increasing dates,
//! finite values) and is read-only afterwards. Forecasters never see the
//! whole series: they receive a borrowed [`SeriesView`] covering exactly the
//! training window of one fold.

use std::ops::Range;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from series construction.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SeriesError {
    #[error("length mismatch: {dates} dates vs {values} values")]
    LengthMismatch { dates: usize, values: usize },
    #[error("dates must be strictly increasing: {previous} followed by {next} at position {position}")]
    NonIncreasingDates {
        position: usize,
        previous: NaiveDate,
        next: NaiveDate,
    },
    #[error("non-finite value {value} at position {position}")]
    NonFiniteValue { position: usize, value: f64 },
}

/// Inclusive first/last date of a window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateSpan {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

/// Ordered observations for a single entity (e.g. one store × product).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawSeries")]
pub struct Series {
    entity: String,
    dates: Vec<NaiveDate>,
    values: Vec<f64>,
}

#[derive(Deserialize)]
struct RawSeries {
    entity: String,
    dates: Vec<NaiveDate>,
    values: Vec<f64>,
}

impl TryFrom<RawSeries> for Series {
    type Error = SeriesError;

    fn try_from(raw: RawSeries) -> Result<Self, Self::Error> {
        Series::new(raw.entity, raw.dates, raw.values)
    }
}

impl Series {
    /// Build a series, rejecting unordered/duplicate dates and non-finite values.
    pub fn new(
        entity: impl Into<String>,
        dates: Vec<NaiveDate>,
        values: Vec<f64>,
    ) -> Result<Self, SeriesError> {
        if dates.len() != values.len() {
            return Err(SeriesError::LengthMismatch {
                dates: dates.len(),
                values: values.len(),
            });
        }
        for (position, pair) in dates.windows(2).enumerate() {
            if pair[1] <= pair[0] {
                return Err(SeriesError::NonIncreasingDates {
                    position: position + 1,
                    previous: pair[0],
                    next: pair[1],
                });
            }
        }
        if let Some((position, &value)) = values.iter().enumerate().find(|(_, v)| !v.is_finite()) {
            return Err(SeriesError::NonFiniteValue { position, value });
        }
        Ok(Self {
            entity: entity.into(),
            dates,
            values,
        })
    }

    /// Build a series from `(date, value)` pairs.
    pub fn from_points(
        entity: impl Into<String>,
        points: impl IntoIterator<Item = (NaiveDate, f64)>,
    ) -> Result<Self, SeriesError> {
        let (dates, values) = points.into_iter().unzip();
        Self::new(entity, dates, values)
    }

    pub fn entity(&self) -> &str {
        &self.entity
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Borrow the window `[range.start, range.end)`, clamped to the series bounds.
    pub fn view(&self, range: Range<usize>) -> SeriesView<'_> {
        let end = range.end.min(self.len());
        let start = range.start.min(end);
        SeriesView {
            dates: &self.dates[start..end],
            values: &self.values[start..end],
        }
    }

    /// First/last date of a window, `None` when the window is empty or out of bounds.
    pub fn date_span(&self, range: Range<usize>) -> Option<DateSpan> {
        if range.start >= range.end || range.end > self.len() {
            return None;
        }
        Some(DateSpan {
            start: self.dates[range.start],
            end: self.dates[range.end - 1],
        })
    }

    /// Deterministic BLAKE3 digest of entity, dates and values.
    pub fn content_hash(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.entity.as_bytes());
        hasher.update(&(self.len() as u64).to_le_bytes());
        for date in &self.dates {
            hasher.update(&date.to_string().into_bytes());
        }
        for value in &self.values {
            hasher.update(&value.to_bits().to_le_bytes());
        }
        hasher.finalize().to_hex().to_string()
    }
}

/// Borrowed, read-only window of a [`Series`].
#[derive(Debug, Clone, Copy)]
pub struct SeriesView<'a> {
    dates: &'a [NaiveDate],
    values: &'a [f64],
}

impl<'a> SeriesView<'a> {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn dates(&self) -> &'a [NaiveDate] {
        self.dates
    }

    pub fn values(&self) -> &'a [f64] {
        self.values
    }

    pub fn last_value(&self) -> Option<f64> {
        self.values.last().copied()
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.dates.last().copied()
    }
}
