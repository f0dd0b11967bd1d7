use log::warn;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use super::config::{ClusterConfig, FeatureMode};
use super::record::{Component, ScoreRecord, StudentId, SubjectId};
use crate::error::{Error, Result};

/// Numeric profile of one student for one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub student_id: StudentId,
    pub values: Vec<f64>,
}

/// Why a student was left out of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SkipReason {
    MissingScore {
        subject: SubjectId,
        component: Component,
    },
    InvalidScore {
        subject: SubjectId,
        component: Component,
        value: f64,
    },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::MissingScore { subject, component } => {
                write!(f, "missing {} score for {}", component, subject)
            }
            SkipReason::InvalidScore {
                subject,
                component,
                value,
            } => write!(f, "invalid {} score {} for {}", component, value, subject),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedStudent {
    pub student_id: StudentId,
    pub reason: SkipReason,
}

/// Output of [`extract`]: vectors sorted by student id, the name of every
/// dimension, and the students that could not be used.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSet {
    pub dimensions: Vec<String>,
    pub vectors: Vec<FeatureVector>,
    pub skipped: Vec<SkippedStudent>,
}

impl FeatureSet {
    pub fn dimensionality(&self) -> usize {
        self.dimensions.len()
    }

    /// Vector values in student order, ready for the engine.
    pub fn matrix(&self) -> Vec<Vec<f64>> {
        self.vectors.iter().map(|v| v.values.clone()).collect()
    }
}

/// Running mean of repeated records for one (subject, component) pair.
#[derive(Debug, Clone, Copy, Default)]
struct Accumulator {
    sum: f64,
    count: usize,
}

impl Accumulator {
    fn mean(&self) -> f64 {
        self.sum / self.count as f64
    }
}

#[derive(Debug, Default)]
struct StudentScores<'a> {
    scores: BTreeMap<(&'a str, Component), Accumulator>,
    invalid: Option<SkipReason>,
}

/// Builds one feature vector per student from raw score records.
///
/// Records for subjects outside the config are ignored. Repeated records for
/// the same (student, subject, component) are averaged. Only components with a
/// non-zero weight are required; a student missing any required score, or with
/// a score outside `0..=100`, is excluded and reported in
/// [`FeatureSet::skipped`] rather than zero-filled.
///
/// Dimensions follow [`FeatureMode`]:
/// - `WeightedSubject` - per subject, `knowledge*w_k + skill*w_s + attitude*w_a`
/// - `SubjectMean` - per subject, mean of the required components
/// - `Category` - per required component, mean across subjects
///
/// # Errors
///
/// `InsufficientData` when fewer than `2 * k` students remain.
pub fn extract(records: &[ScoreRecord], config: &ClusterConfig) -> Result<FeatureSet> {
    let selected: BTreeSet<&str> = config.subjects().iter().map(String::as_str).collect();
    let required = config.weights().active_components();

    let mut students: BTreeMap<&str, StudentScores> = BTreeMap::new();
    for record in records {
        let entry = students.entry(record.student_id.as_str()).or_default();
        if !selected.contains(record.subject_id.as_str()) || !required.contains(&record.component) {
            continue;
        }
        if !record.is_valid_value() {
            if entry.invalid.is_none() {
                entry.invalid = Some(SkipReason::InvalidScore {
                    subject: record.subject_id.clone(),
                    component: record.component,
                    value: record.value,
                });
            }
            continue;
        }
        let acc = entry
            .scores
            .entry((record.subject_id.as_str(), record.component))
            .or_default();
        acc.sum += record.value;
        acc.count += 1;
    }

    let mut vectors = Vec::new();
    let mut skipped = Vec::new();
    for (student_id, scores) in students {
        match build_vector(&scores, config, &required) {
            Ok(values) => vectors.push(FeatureVector {
                student_id: student_id.to_string(),
                values,
            }),
            Err(reason) => skipped.push(SkippedStudent {
                student_id: student_id.to_string(),
                reason,
            }),
        }
    }

    if !skipped.is_empty() {
        warn!(
            "{} students excluded from clustering run {} for incomplete or invalid scores",
            skipped.len(),
            config.id()
        );
    }

    let required_students = 2 * config.k();
    if vectors.len() < required_students {
        return Err(Error::InsufficientData {
            usable: vectors.len(),
            required: required_students,
        });
    }

    Ok(FeatureSet {
        dimensions: dimension_names(config, &required),
        vectors,
        skipped,
    })
}

fn dimension_names(config: &ClusterConfig, required: &[Component]) -> Vec<String> {
    match config.feature_mode() {
        FeatureMode::WeightedSubject | FeatureMode::SubjectMean => config.subjects().to_vec(),
        FeatureMode::Category => required.iter().map(|c| c.to_string()).collect(),
    }
}

fn build_vector(
    scores: &StudentScores,
    config: &ClusterConfig,
    required: &[Component],
) -> std::result::Result<Vec<f64>, SkipReason> {
    if let Some(reason) = &scores.invalid {
        return Err(reason.clone());
    }

    // Subject-major lookup; the first gap found is the one reported.
    let mut grid = Vec::with_capacity(config.subjects().len());
    for subject in config.subjects() {
        let mut row = Vec::with_capacity(required.len());
        for &component in required {
            match scores.scores.get(&(subject.as_str(), component)) {
                Some(acc) => row.push(acc.mean()),
                None => {
                    return Err(SkipReason::MissingScore {
                        subject: subject.clone(),
                        component,
                    })
                }
            }
        }
        grid.push(row);
    }

    let weights = config.weights();
    let values = match config.feature_mode() {
        FeatureMode::WeightedSubject => grid
            .iter()
            .map(|row| {
                row.iter()
                    .zip(required)
                    .map(|(score, &c)| score * weights.fraction(c))
                    .sum()
            })
            .collect(),
        FeatureMode::SubjectMean => grid
            .iter()
            .map(|row| row.iter().sum::<f64>() / row.len() as f64)
            .collect(),
        FeatureMode::Category => (0..required.len())
            .map(|j| grid.iter().map(|row| row[j]).sum::<f64>() / grid.len() as f64)
            .collect(),
    };
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::student::config::ClusterConfigBuilder;
    use approx::assert_relative_eq;

    fn full_scores(student: &str, subject: &str, k: f64, s: f64, a: f64) -> Vec<ScoreRecord> {
        vec![
            ScoreRecord::new(student, subject, Component::Knowledge, k),
            ScoreRecord::new(student, subject, Component::Skill, s),
            ScoreRecord::new(student, subject, Component::Attitude, a),
        ]
    }

    fn base(k: usize) -> ClusterConfigBuilder {
        ClusterConfig::builder("test", k)
            .subjects(["math", "art"])
            .weights(50.0, 30.0, 20.0)
    }

    fn four_students() -> Vec<ScoreRecord> {
        let mut records = Vec::new();
        for (id, offset) in [("s4", 0.0), ("s2", 10.0), ("s3", 20.0), ("s1", 30.0)] {
            records.extend(full_scores(id, "math", 60.0 + offset, 50.0 + offset, 40.0 + offset));
            records.extend(full_scores(id, "art", 70.0, 80.0 - offset, 90.0));
        }
        records
    }

    #[test]
    fn test_weighted_subject_composite() {
        let config = base(2).build().unwrap();
        let set = extract(&four_students(), &config).unwrap();

        assert_eq!(set.dimensions, vec!["math", "art"]);
        assert_eq!(set.dimensionality(), 2);
        let ids: Vec<&str> = set.vectors.iter().map(|v| v.student_id.as_str()).collect();
        assert_eq!(ids, vec!["s1", "s2", "s3", "s4"]);

        // s4: math 60/50/40, art 70/80/90
        let s4 = &set.vectors[3].values;
        assert_relative_eq!(s4[0], 60.0 * 0.5 + 50.0 * 0.3 + 40.0 * 0.2, epsilon = 1e-9);
        assert_relative_eq!(s4[1], 70.0 * 0.5 + 80.0 * 0.3 + 90.0 * 0.2, epsilon = 1e-9);
        assert!(set.skipped.is_empty());
    }

    #[test]
    fn test_subject_mean_and_category_modes() {
        let records = four_students();
        let mean = extract(&records, &base(2).feature_mode(FeatureMode::SubjectMean).build().unwrap()).unwrap();
        assert_relative_eq!(mean.vectors[3].values[0], 50.0, epsilon = 1e-9);
        assert_relative_eq!(mean.vectors[3].values[1], 80.0, epsilon = 1e-9);

        let category = extract(&records, &base(2).feature_mode(FeatureMode::Category).build().unwrap()).unwrap();
        assert_eq!(category.dimensions, vec!["knowledge", "skill", "attitude"]);
        // s4 knowledge: (60 + 70) / 2
        assert_relative_eq!(category.vectors[3].values[0], 65.0, epsilon = 1e-9);
        assert_relative_eq!(category.vectors[3].values[2], 65.0, epsilon = 1e-9);
    }

    #[test]
    fn test_repeated_records_are_averaged() {
        let mut records = four_students();
        records.push(ScoreRecord::new("s4", "math", Component::Knowledge, 80.0));
        let config = base(2).feature_mode(FeatureMode::SubjectMean).build().unwrap();
        let set = extract(&records, &config).unwrap();
        // knowledge becomes (60 + 80) / 2 = 70
        assert_relative_eq!(set.vectors[3].values[0], (70.0 + 50.0 + 40.0) / 3.0, epsilon = 1e-9);
    }

    #[test]
    fn test_missing_component_excludes_student() {
        let mut records = four_students();
        records.retain(|r| !(r.student_id == "s3" && r.subject_id == "art" && r.component == Component::Attitude));
        records.extend(full_scores("s5", "math", 10.0, 10.0, 10.0));
        records.extend(full_scores("s5", "art", 10.0, 10.0, 10.0));

        let set = extract(&records, &base(2).build().unwrap()).unwrap();
        assert_eq!(set.vectors.len(), 4);
        assert_eq!(
            set.skipped,
            vec![SkippedStudent {
                student_id: "s3".to_string(),
                reason: SkipReason::MissingScore {
                    subject: "art".to_string(),
                    component: Component::Attitude,
                },
            }]
        );
    }

    #[test]
    fn test_zero_weight_component_not_required() {
        let mut records = four_students();
        records.retain(|r| r.component != Component::Attitude);
        let config = base(2).weights(60.0, 40.0, 0.0).build().unwrap();
        let set = extract(&records, &config).unwrap();
        assert_eq!(set.vectors.len(), 4);
        assert_relative_eq!(set.vectors[3].values[0], 60.0 * 0.6 + 50.0 * 0.4, epsilon = 1e-9);
    }

    #[test]
    fn test_invalid_score_excludes_student() {
        let mut records = four_students();
        records.push(ScoreRecord::new("s2", "art", Component::Skill, 140.0));
        records.extend(full_scores("s5", "math", 10.0, 10.0, 10.0));
        records.extend(full_scores("s5", "art", 10.0, 10.0, 10.0));
        let set = extract(&records, &base(2).build().unwrap()).unwrap();

        assert_eq!(set.skipped.len(), 1);
        assert_eq!(set.skipped[0].student_id, "s2");
        assert!(matches!(
            set.skipped[0].reason,
            SkipReason::InvalidScore { value, .. } if value == 140.0
        ));
        assert_eq!(set.skipped[0].reason.to_string(), "invalid skill score 140 for art");
    }

    #[test]
    fn test_unselected_subjects_ignored() {
        let mut records = four_students();
        records.push(ScoreRecord::new("s1", "music", Component::Skill, 250.0));
        let set = extract(&records, &base(2).build().unwrap()).unwrap();
        assert!(set.skipped.is_empty());
        assert_eq!(set.vectors.len(), 4);
    }

    #[test]
    fn test_insufficient_students() {
        let err = extract(&four_students(), &base(3).build().unwrap()).unwrap_err();
        assert!(matches!(
            err,
            Error::InsufficientData { usable: 4, required: 6 }
        ));
    }

    #[test]
    fn test_student_without_selected_subjects_is_skipped() {
        let mut records = four_students();
        records.push(ScoreRecord::new("s9", "music", Component::Skill, 50.0));
        let set = extract(&records, &base(2).build().unwrap()).unwrap();
        assert_eq!(set.skipped.len(), 1);
        assert_eq!(set.skipped[0].student_id, "s9");
        assert_eq!(set.skipped[0].reason.to_string(), "missing knowledge score for math");
    }
}
