//! End-to-end clustering run.
//!
//! [`ClusteringOrchestrator`] pulls scores from a [`ScoreSource`], labels output
//! through a [`Roster`], and chains feature extraction, normalization,
//! k-means, profiling and recommendations. Nothing is persisted here; the
//! returned [`ClusteringOutcome`] is plain serializable data for an external
//! store.

use chrono::{DateTime, Utc};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

use super::config::ClusterConfig;
use super::features::{extract, SkippedStudent};
use super::normalize::normalize;
use super::profile::{profile, ClusterProfile};
use super::recommend::{Recommendation, RecommendationGenerator};
use super::record::{ClusterAssignment, ScoreRecord, StudentId, StudentInfo};
use crate::cluster::{
    kmeans_with_cancel, mean_intra_cluster_distance, silhouette_score, CancelSignal, Centroid, RunStatus,
};
use crate::error::{Error, Result};

/// Error type collaborators may return.
pub type SourceError = Box<dyn std::error::Error + Send + Sync>;

/// Supplier of raw scores, typically the grading subsystem.
pub trait ScoreSource {
    fn fetch_scores(&self, config: &ClusterConfig) -> std::result::Result<Vec<ScoreRecord>, SourceError>;
}

impl ScoreSource for [ScoreRecord] {
    fn fetch_scores(&self, _config: &ClusterConfig) -> std::result::Result<Vec<ScoreRecord>, SourceError> {
        Ok(self.to_vec())
    }
}

impl ScoreSource for Vec<ScoreRecord> {
    fn fetch_scores(&self, config: &ClusterConfig) -> std::result::Result<Vec<ScoreRecord>, SourceError> {
        self.as_slice().fetch_scores(config)
    }
}

/// Student registry lookup, used only to label output.
pub trait Roster {
    fn lookup(&self, student_id: &str) -> Option<StudentInfo>;
}

/// Roster that knows nobody.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyRoster;

impl Roster for EmptyRoster {
    fn lookup(&self, _student_id: &str) -> Option<StudentInfo> {
        None
    }
}

impl Roster for BTreeMap<StudentId, StudentInfo> {
    fn lookup(&self, student_id: &str) -> Option<StudentInfo> {
        self.get(student_id).cloned()
    }
}

impl Roster for HashMap<StudentId, StudentInfo> {
    fn lookup(&self, student_id: &str) -> Option<StudentInfo> {
        self.get(student_id).cloned()
    }
}

/// Non-blocking conditions surfaced to the operator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RunWarning {
    NonConvergence { iterations: usize },
    Cancelled { iterations: usize },
    StudentsSkipped { count: usize },
}

impl fmt::Display for RunWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunWarning::NonConvergence { iterations } => {
                write!(f, "clustering did not converge within {} iterations", iterations)
            }
            RunWarning::Cancelled { iterations } => write!(
                f,
                "clustering was cancelled after {} iterations; results are partial",
                iterations
            ),
            RunWarning::StudentsSkipped { count } => {
                write!(f, "{} students were skipped for incomplete or invalid scores", count)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunMetadata {
    pub config_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub status: RunStatus,
    pub converged: bool,
    /// Set when the run was cancelled; the caller decides whether to keep it.
    pub partial: bool,
    pub iterations: usize,
    pub seed: u64,
    pub inertia: f64,
    pub mean_intra_cluster_distance: f64,
    pub silhouette: f64,
    pub student_count: usize,
    pub skipped_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentResult {
    pub assignment: ClusterAssignment,
    pub student: Option<StudentInfo>,
    pub recommendations: Vec<Recommendation>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusteringOutcome {
    pub metadata: RunMetadata,
    pub dimensions: Vec<String>,
    pub centroids: Vec<Centroid>,
    pub profiles: Vec<ClusterProfile>,
    /// Ordered by student id.
    pub students: Vec<StudentResult>,
    pub skipped: Vec<SkippedStudent>,
    pub warnings: Vec<RunWarning>,
}

impl ClusteringOutcome {
    pub fn assignments(&self) -> impl Iterator<Item = &ClusterAssignment> {
        self.students.iter().map(|s| &s.assignment)
    }
}

/// Runs the full pipeline against a score source and a roster.
pub struct ClusteringOrchestrator<'a, S: ?Sized, R: ?Sized> {
    scores: &'a S,
    roster: &'a R,
}

impl<'a, S, R> ClusteringOrchestrator<'a, S, R>
where
    S: ScoreSource + ?Sized,
    R: Roster + ?Sized,
{
    pub fn new(scores: &'a S, roster: &'a R) -> Self {
        Self { scores, roster }
    }

    /// Parses and validates `raw_config` before any score is fetched, then runs.
    pub fn run_json<C>(&self, raw_config: &str, cancel: &C) -> Result<ClusteringOutcome>
    where
        C: CancelSignal + ?Sized,
    {
        let config = ClusterConfig::from_json(raw_config)?;
        self.run(&config, cancel)
    }

    /// Executes one clustering run.
    ///
    /// # Errors
    ///
    /// - `ScoreSource` if fetching scores fails.
    /// - `InsufficientData` if fewer than `2 * k` students have complete scores.
    /// - Any engine or profiling error, which indicates malformed input.
    ///
    /// Cancellation is not an error: the outcome carries the last completed
    /// iteration with `metadata.partial` set.
    pub fn run<C>(&self, config: &ClusterConfig, cancel: &C) -> Result<ClusteringOutcome>
    where
        C: CancelSignal + ?Sized,
    {
        let started_at = Utc::now();
        info!("starting clustering run {} with k={}", config.id(), config.k());

        let records = self.scores.fetch_scores(config).map_err(Error::ScoreSource)?;
        let features = extract(&records, config)?;
        let matrix = normalize(&features.vectors, config.normalization());
        let result = kmeans_with_cancel(&matrix, &config.kmeans_config(), cancel)?;

        let assignments: Vec<ClusterAssignment> = features
            .vectors
            .iter()
            .zip(&result.assignments)
            .map(|(vector, a)| ClusterAssignment {
                student_id: vector.student_id.clone(),
                cluster_index: a.cluster,
                distance: a.distance,
            })
            .collect();

        let profiles = profile(
            &features.vectors,
            &features.dimensions,
            &assignments,
            &result.centroids,
            config.profile(),
        )?;

        let generator = RecommendationGenerator::new(
            config.recommendation(),
            &features.dimensions,
            &assignments,
            config.k(),
        );
        let students: Vec<StudentResult> = features
            .vectors
            .iter()
            .zip(assignments)
            .map(|(vector, assignment)| {
                let recommendations = generator.generate(vector, &assignment, &profiles[assignment.cluster_index]);
                StudentResult {
                    student: self.roster.lookup(&assignment.student_id),
                    assignment,
                    recommendations,
                }
            })
            .collect();

        let mut warnings = Vec::new();
        match result.status {
            RunStatus::Converged => {}
            RunStatus::MaxIterationsReached => warnings.push(RunWarning::NonConvergence {
                iterations: result.iterations,
            }),
            RunStatus::Cancelled => warnings.push(RunWarning::Cancelled {
                iterations: result.iterations,
            }),
        }
        if !features.skipped.is_empty() {
            warnings.push(RunWarning::StudentsSkipped {
                count: features.skipped.len(),
            });
        }
        for warning in &warnings {
            warn!("run {}: {}", config.id(), warning);
        }

        let metadata = RunMetadata {
            config_id: config.id().to_string(),
            started_at,
            finished_at: Utc::now(),
            status: result.status,
            converged: result.status.is_converged(),
            partial: result.status.is_partial(),
            iterations: result.iterations,
            seed: result.seed,
            inertia: result.inertia,
            mean_intra_cluster_distance: mean_intra_cluster_distance(&result.assignments),
            silhouette: silhouette_score(&matrix, &result.labels()),
            student_count: students.len(),
            skipped_count: features.skipped.len(),
        };
        info!(
            "clustering run {} done: {} students in {} clusters, silhouette {:.3}",
            metadata.config_id,
            metadata.student_count,
            config.k(),
            metadata.silhouette
        );

        Ok(ClusteringOutcome {
            metadata,
            dimensions: features.dimensions,
            centroids: result.centroids,
            profiles,
            students,
            skipped: features.skipped,
            warnings,
        })
    }
}
