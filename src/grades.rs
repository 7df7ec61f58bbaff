//! Pollutant severity grades.
//!
//! Each pollutant owns five ascending, half-open intervals `[low, high)`;
//! the last interval is unbounded above. A value sitting exactly on a
//! boundary belongs to the higher interval. The same policy is used by the
//! pipeline and by the dashboard read path so labels never drift apart.
//!
//! The boundary tables are a versioned policy. The built-in
//! `GradePolicy::STANDARD` matches `config/grades.toml`; a different file can
//! be loaded with `GradePolicy::from_file` without touching any code.

use serde::Deserialize;
use std::fmt;
use std::path::Path;
use thiserror::Error;

// ---------------------------------------------------------------------------
// Labels
// ---------------------------------------------------------------------------

/// Five-level grade, ordered by increasing concentration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum GradeLabel {
    VeryGood,
    Good,
    Moderate,
    Bad,
    VeryBad,
}

impl GradeLabel {
    /// All labels in ascending severity; index `i` pairs with boundary `i`.
    pub const ALL: [GradeLabel; 5] = [
        GradeLabel::VeryGood,
        GradeLabel::Good,
        GradeLabel::Moderate,
        GradeLabel::Bad,
        GradeLabel::VeryBad,
    ];

    /// Display label as shown on the dashboard and in alert messages.
    pub fn label(self) -> &'static str {
        match self {
            GradeLabel::VeryGood => "아주 좋음",
            GradeLabel::Good => "좋음",
            GradeLabel::Moderate => "보통",
            GradeLabel::Bad => "나쁨",
            GradeLabel::VeryBad => "아주 나쁨",
        }
    }

    /// Display color. Depends on the label only, never on the pollutant.
    pub fn color(self) -> &'static str {
        match self {
            GradeLabel::VeryGood => "#2375C7",
            GradeLabel::Good => "#33CCFF",
            GradeLabel::Moderate => "#2CB606",
            GradeLabel::Bad => "#F29269",
            GradeLabel::VeryBad => "#EF2F2F",
        }
    }
}

impl fmt::Display for GradeLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ---------------------------------------------------------------------------
// Pollutants
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Pollutant {
    Pm10,
    Pm25,
    O3,
}

impl Pollutant {
    pub const ALL: [Pollutant; 3] = [Pollutant::Pm10, Pollutant::Pm25, Pollutant::O3];

    pub fn unit(self) -> &'static str {
        match self {
            Pollutant::Pm10 | Pollutant::Pm25 => "µg/m³",
            Pollutant::O3 => "ppm",
        }
    }
}

impl fmt::Display for Pollutant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pollutant::Pm10 => write!(f, "PM10"),
            Pollutant::Pm25 => write!(f, "PM2.5"),
            Pollutant::O3 => write!(f, "O3"),
        }
    }
}

// ---------------------------------------------------------------------------
// Policy
// ---------------------------------------------------------------------------

/// Lower bounds of the five intervals for one pollutant.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct BinTable {
    pub boundaries: [f64; 5],
}

impl BinTable {
    /// Returns the grade whose interval contains `value`.
    ///
    /// Values below the first boundary (negative or NaN) fall into the
    /// lowest interval.
    pub fn grade(&self, value: f64) -> GradeLabel {
        let index = self
            .boundaries
            .iter()
            .rposition(|&low| value >= low)
            .unwrap_or(0);
        GradeLabel::ALL[index]
    }

    fn validate(&self, pollutant: Pollutant) -> Result<(), PolicyError> {
        let b = &self.boundaries;
        if b.iter().any(|v| !v.is_finite()) {
            return Err(PolicyError::NonFinite(pollutant));
        }
        if b[0] != 0.0 {
            return Err(PolicyError::NonZeroStart(pollutant, b[0]));
        }
        if b.windows(2).any(|w| w[0] >= w[1]) {
            return Err(PolicyError::NotAscending(pollutant));
        }
        Ok(())
    }
}

/// Versioned set of bin tables, one per pollutant.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GradePolicy {
    pub version: u32,
    pub pm10: BinTable,
    pub pm25: BinTable,
    pub o3: BinTable,
}

#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("reading grade policy {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("grade policy is not valid TOML: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("{0} boundaries must all be finite")]
    NonFinite(Pollutant),
    #[error("{0} boundaries must start at 0, found {1}")]
    NonZeroStart(Pollutant, f64),
    #[error("{0} boundaries must be strictly ascending")]
    NotAscending(Pollutant),
}

impl GradePolicy {
    /// Version 1 tables (µg/m³ for particulates, ppm for ozone).
    pub const STANDARD: GradePolicy = GradePolicy {
        version: 1,
        pm10: BinTable { boundaries: [0.0, 15.0, 30.0, 80.0, 150.0] },
        pm25: BinTable { boundaries: [0.0, 8.0, 15.0, 35.0, 75.0] },
        o3: BinTable { boundaries: [0.0, 0.015, 0.030, 0.090, 0.150] },
    };

    pub fn from_toml_str(text: &str) -> Result<Self, PolicyError> {
        let policy: GradePolicy = toml::from_str(text)?;
        for pollutant in Pollutant::ALL {
            policy.table(pollutant).validate(pollutant)?;
        }
        Ok(policy)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, PolicyError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| PolicyError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn table(&self, pollutant: Pollutant) -> &BinTable {
        match pollutant {
            Pollutant::Pm10 => &self.pm10,
            Pollutant::Pm25 => &self.pm25,
            Pollutant::O3 => &self.o3,
        }
    }

    /// Grade and display color for `value` of `pollutant`.
    pub fn classify(&self, pollutant: Pollutant, value: f64) -> (GradeLabel, &'static str) {
        let grade = self.table(pollutant).grade(value);
        (grade, grade.color())
    }
}

impl Default for GradePolicy {
    fn default() -> Self {
        GradePolicy::STANDARD
    }
}

/// Classifies with the built-in standard tables.
pub fn classify(pollutant: Pollutant, value: f64) -> (GradeLabel, &'static str) {
    GradePolicy::STANDARD.classify(pollutant, value)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
