//! Dashboard read path.
//!
//! The dashboard shows only the most recent `dataTime` slice, grades each
//! pollutant with the same `GradePolicy` the pipeline uses, and charts
//! stations by value, highest first. This module provides that slice and
//! the graded rows; `render_table` is the text rendering used by the CLI.

use crate::db::ReadingSource;
use crate::grades::{GradeLabel, GradePolicy, Pollutant};
use crate::model::{NormalizedReading, PersistError};
use std::fmt::Write;

/// One stored row with its three grades.
#[derive(Debug, Clone, PartialEq)]
pub struct GradedReading {
    pub reading: NormalizedReading,
    pub pm10: GradeLabel,
    pub pm25: GradeLabel,
    pub o3: GradeLabel,
}

impl GradedReading {
    pub fn value(&self, pollutant: Pollutant) -> f64 {
        match pollutant {
            Pollutant::Pm10 => self.reading.pm10_value,
            Pollutant::Pm25 => self.reading.pm25_value,
            Pollutant::O3 => self.reading.o3_value,
        }
    }

    pub fn grade(&self, pollutant: Pollutant) -> GradeLabel {
        match pollutant {
            Pollutant::Pm10 => self.pm10,
            Pollutant::Pm25 => self.pm25,
            Pollutant::O3 => self.o3,
        }
    }
}

/// Rows for the most recent `dataTime`, or `None` when storage is empty.
pub fn latest_slice<R: ReadingSource>(
    source: &mut R,
) -> Result<Option<(String, Vec<NormalizedReading>)>, PersistError> {
    let Some(data_time) = source.latest_data_time()? else {
        return Ok(None);
    };
    let rows = source.rows_at(&data_time)?;
    Ok(Some((data_time, rows)))
}

pub fn grade_rows(rows: Vec<NormalizedReading>, policy: &GradePolicy) -> Vec<GradedReading> {
    rows.into_iter()
        .map(|reading| GradedReading {
            pm10: policy.classify(Pollutant::Pm10, reading.pm10_value).0,
            pm25: policy.classify(Pollutant::Pm25, reading.pm25_value).0,
            o3: policy.classify(Pollutant::O3, reading.o3_value).0,
            reading,
        })
        .collect()
}

/// Station count per grade, in ascending grade order.
pub fn label_counts(rows: &[GradedReading], pollutant: Pollutant) -> [(GradeLabel, usize); 5] {
    GradeLabel::ALL.map(|label| {
        let count = rows.iter().filter(|r| r.grade(pollutant) == label).count();
        (label, count)
    })
}

/// Rows ordered by one pollutant's value, highest first.
pub fn sorted_by(rows: &[GradedReading], pollutant: Pollutant) -> Vec<&GradedReading> {
    let mut sorted: Vec<&GradedReading> = rows.iter().collect();
    sorted.sort_by(|a, b| b.value(pollutant).total_cmp(&a.value(pollutant)));
    sorted
}

/// Plain-text table: one section per pollutant, then the grade tally.
pub fn render_table(data_time: &str, rows: &[GradedReading]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "최근 업데이트 시간: {}", data_time);

    for pollutant in Pollutant::ALL {
        let _ = writeln!(out, "\n{} ({})", pollutant, pollutant.unit());
        for row in sorted_by(rows, pollutant) {
            let grade = row.grade(pollutant);
            let _ = writeln!(
                out,
                "  {:<10} {:>9} {} {}",
                row.reading.station_name,
                format_value(pollutant, row.value(pollutant)),
                grade.color(),
                grade
            );
        }
        let tally: Vec<String> = label_counts(rows, pollutant)
            .iter()
            .filter(|(_, n)| *n > 0)
            .map(|(label, n)| format!("{} {}", label, n))
            .collect();
        let _ = writeln!(out, "  [{}]", tally.join(", "));
    }
    out
}

fn format_value(pollutant: Pollutant, value: f64) -> String {
    match pollutant {
        Pollutant::O3 => format!("{:.3}", value),
        Pollutant::Pm10 | Pollutant::Pm25 => format!("{:.0}", value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct MemorySource(Vec<NormalizedReading>);

    impl ReadingSource for MemorySource {
        fn latest_data_time(&mut self) -> Result<Option<String>, PersistError> {
            Ok(self.0.iter().map(|r| r.data_time.clone()).max())
        }

        fn rows_at(&mut self, data_time: &str) -> Result<Vec<NormalizedReading>, PersistError> {
            Ok(self.0.iter().filter(|r| r.data_time == data_time).cloned().collect())
        }
    }

    fn reading(station: &str, time: &str, pm10: f64, pm25: f64, o3: f64) -> NormalizedReading {
        NormalizedReading {
            station_name: station.to_string(),
            data_time: time.to_string(),
            pm10_value: pm10,
            pm25_value: pm25,
            o3_value: o3,
        }
    }

    #[test]
    fn test_latest_slice_selects_newest_data_time_only() {
        let mut source = MemorySource(vec![
            reading("강남구", "2026-10-18 13:00", 20.0, 10.0, 0.02),
            reading("강남구", "2026-10-18 14:00", 45.0, 0.0, 0.031),
            reading("종로구", "2026-10-18 14:00", 160.0, 80.0, 0.2),
        ]);
        let (time, rows) = latest_slice(&mut source).unwrap().expect("non-empty");
        assert_eq!(time, "2026-10-18 14:00");
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn test_latest_slice_of_empty_store_is_none() {
        assert!(latest_slice(&mut MemorySource(Vec::new())).unwrap().is_none());
    }

    #[test]
    fn test_grades_match_pipeline_classifier() {
        let graded = grade_rows(
            vec![reading("강남구", "t", 45.0, 0.0, 0.031)],
            &GradePolicy::STANDARD,
        );
        assert_eq!(graded[0].pm10, GradeLabel::Moderate);
        assert_eq!(graded[0].pm25, GradeLabel::VeryGood);
        assert_eq!(graded[0].o3, GradeLabel::Moderate);
    }

    #[test]
    fn test_sorted_by_is_descending() {
        let graded = grade_rows(
            vec![
                reading("a구", "t", 10.0, 1.0, 0.01),
                reading("b구", "t", 90.0, 1.0, 0.01),
                reading("c구", "t", 40.0, 1.0, 0.01),
            ],
            &GradePolicy::STANDARD,
        );
        let names: Vec<&str> = sorted_by(&graded, Pollutant::Pm10)
            .iter()
            .map(|r| r.reading.station_name.as_str())
            .collect();
        assert_eq!(names, vec!["b구", "c구", "a구"]);
    }

    #[test]
    fn test_label_counts_cover_every_row() {
        let graded = grade_rows(
            vec![
                reading("a구", "t", 10.0, 1.0, 0.01),
                reading("b구", "t", 160.0, 1.0, 0.01),
                reading("c구", "t", 150.0, 1.0, 0.01),
            ],
            &GradePolicy::STANDARD,
        );
        let counts = label_counts(&graded, Pollutant::Pm10);
        assert_eq!(counts[0], (GradeLabel::VeryGood, 1));
        assert_eq!(counts[4], (GradeLabel::VeryBad, 2));
        assert_eq!(counts.iter().map(|(_, n)| n).sum::<usize>(), 3);
    }

    #[test]
    fn test_render_table_mentions_time_station_and_grade() {
        let graded = grade_rows(
            vec![reading("종로구", "2026-10-18 14:00", 160.0, 20.0, 0.02)],
            &GradePolicy::STANDARD,
        );
        let text = render_table("2026-10-18 14:00", &graded);
        assert!(text.contains("최근 업데이트 시간: 2026-10-18 14:00"));
        assert!(text.contains("종로구"));
        assert!(text.contains("아주 나쁨"));
        assert!(text.contains("#EF2F2F"));
    }
}
