use serde::{Deserialize, Serialize};
use std::fmt;

use super::features::FeatureVector;
use super::profile::ClusterProfile;
use super::record::{ClusterAssignment, StudentId};
use crate::error::{Error, Result};

/// Urgency of a recommendation, named as the grading system reports it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Priority {
    #[serde(rename = "rendah")]
    Low,
    #[serde(rename = "sedang")]
    Medium,
    #[serde(rename = "tinggi")]
    High,
}

impl Priority {
    pub fn as_str(self) -> &'static str {
        match self {
            Priority::Low => "rendah",
            Priority::Medium => "sedang",
            Priority::High => "tinggi",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationCategory {
    /// The student trails their own cluster in a dimension.
    Remedial,
    /// The student is well ahead of their own cluster in a dimension.
    Enrichment,
    /// A relative weakness shared by the whole cluster.
    ClusterFocus,
    General,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub student_id: StudentId,
    pub cluster_index: usize,
    pub category: RecommendationCategory,
    pub priority: Priority,
    pub dimension: Option<String>,
    pub text: String,
}

/// Text templates. Placeholders: `{dimension}`, `{score}`, `{cluster_mean}`,
/// `{gap}` and `{label}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecommendationTemplates {
    pub remedial: String,
    pub enrichment: String,
    pub cluster_focus: String,
    pub maintain: String,
    pub monitor: String,
}

impl Default for RecommendationTemplates {
    fn default() -> Self {
        Self {
            remedial: "Score in {dimension} ({score}) is {gap} points below the {label} average of \
                       {cluster_mean}; plan targeted remediation in {dimension}."
                .to_string(),
            enrichment: "Score in {dimension} ({score}) is {gap} points above the {label} average of \
                         {cluster_mean}; offer enrichment or peer tutoring in {dimension}."
                .to_string(),
            cluster_focus: "{dimension} is a shared weakness of the {label} group (average \
                            {cluster_mean}); reinforce it in group sessions."
                .to_string(),
            maintain: "Performance matches the {label} group; maintain the current pace and offer \
                       advanced material."
                .to_string(),
            monitor: "Performance matches the {label} group; continue regular monitoring and \
                      practice."
                .to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecommendationConfig {
    /// Distance percentile within a cluster at or above which priority is high.
    pub high_percentile: f64,
    /// Distance percentile within a cluster below which priority is low.
    pub low_percentile: f64,
    /// Divergence from the cluster mean, in member standard deviations, that
    /// triggers an individual recommendation.
    pub divergence_threshold: f64,
    /// Floor for the divergence threshold, in score points.
    pub min_divergence: f64,
    pub templates: RecommendationTemplates,
}

impl Default for RecommendationConfig {
    fn default() -> Self {
        Self {
            high_percentile: 0.75,
            low_percentile: 0.25,
            divergence_threshold: 1.0,
            min_divergence: 5.0,
            templates: RecommendationTemplates::default(),
        }
    }
}

impl RecommendationConfig {
    pub fn validate(&self) -> Result<()> {
        let in_unit = |p: f64| p.is_finite() && (0.0..=1.0).contains(&p);
        if !in_unit(self.low_percentile)
            || !in_unit(self.high_percentile)
            || self.low_percentile > self.high_percentile
        {
            return Err(Error::InvalidConfig(format!(
                "priority percentiles must satisfy 0 <= low ({}) <= high ({}) <= 1",
                self.low_percentile, self.high_percentile
            )));
        }
        for (name, value) in [
            ("divergence_threshold", self.divergence_threshold),
            ("min_divergence", self.min_divergence),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(Error::InvalidConfig(format!(
                    "{} must be a finite non-negative number, got {}",
                    name, value
                )));
            }
        }
        Ok(())
    }
}

/// Per-run recommendation builder.
///
/// Holds the sorted member distances of every cluster so priorities can be
/// read off as percentiles.
#[derive(Debug, Clone)]
pub struct RecommendationGenerator<'a> {
    config: &'a RecommendationConfig,
    dimensions: &'a [String],
    distances: Vec<Vec<f64>>,
}

impl<'a> RecommendationGenerator<'a> {
    pub fn new(
        config: &'a RecommendationConfig,
        dimensions: &'a [String],
        assignments: &[ClusterAssignment],
        k: usize,
    ) -> Self {
        let mut distances = vec![Vec::new(); k];
        for a in assignments {
            if let Some(cluster) = distances.get_mut(a.cluster_index) {
                cluster.push(a.distance);
            }
        }
        for cluster in distances.iter_mut() {
            cluster.sort_by(f64::total_cmp);
        }
        Self {
            config,
            dimensions,
            distances,
        }
    }

    /// Priority from the student's distance percentile within their cluster.
    ///
    /// With `m` members of which `b` lie strictly closer to the centroid, the
    /// percentile is `b / (m - 1)`. A lone member gets low priority.
    pub fn priority_for(&self, assignment: &ClusterAssignment) -> Priority {
        let cluster = match self.distances.get(assignment.cluster_index) {
            Some(c) if c.len() > 1 => c,
            _ => return Priority::Low,
        };
        let closer = cluster.partition_point(|&d| d < assignment.distance);
        let percentile = closer as f64 / (cluster.len() - 1) as f64;
        if percentile >= self.config.high_percentile {
            Priority::High
        } else if percentile < self.config.low_percentile {
            Priority::Low
        } else {
            Priority::Medium
        }
    }

    /// Recommendations for one student, most specific first. Never empty.
    ///
    /// Individual divergences from the cluster mean come first (largest gap
    /// first), then cluster-level weaknesses the student does not already
    /// have an individual item for, and finally a general item if nothing
    /// else applied.
    pub fn generate(
        &self,
        student: &FeatureVector,
        assignment: &ClusterAssignment,
        profile: &ClusterProfile,
    ) -> Vec<Recommendation> {
        let priority = self.priority_for(assignment);
        let templates = &self.config.templates;
        let make = |category, dimension: Option<String>, text: String| Recommendation {
            student_id: student.student_id.clone(),
            cluster_index: assignment.cluster_index,
            category,
            priority,
            dimension,
            text,
        };

        let mut divergent: Vec<(usize, f64)> = Vec::new();
        for (j, (&score, &mean)) in student.values.iter().zip(&profile.mean).enumerate() {
            let spread = profile.std_dev.get(j).copied().unwrap_or(0.0);
            let threshold = (self.config.divergence_threshold * spread).max(self.config.min_divergence);
            let gap = score - mean;
            if gap.abs() > threshold {
                divergent.push((j, gap));
            }
        }
        divergent.sort_by(|a, b| b.1.abs().total_cmp(&a.1.abs()).then(a.0.cmp(&b.0)));

        let mut out = Vec::new();
        for &(j, gap) in &divergent {
            let (category, template) = if gap < 0.0 {
                (RecommendationCategory::Remedial, &templates.remedial)
            } else {
                (RecommendationCategory::Enrichment, &templates.enrichment)
            };
            let dimension = self.dimension_name(j);
            let text = render(
                template,
                &[
                    ("{dimension}", dimension.clone()),
                    ("{score}", format!("{:.1}", student.values[j])),
                    ("{cluster_mean}", format!("{:.1}", profile.mean[j])),
                    ("{gap}", format!("{:.1}", gap.abs())),
                    ("{label}", profile.label.clone()),
                ],
            );
            out.push(make(category, Some(dimension), text));
        }

        for weakness in &profile.weaknesses {
            let covered = out.iter().any(|r| {
                r.category == RecommendationCategory::Remedial
                    && r.dimension.as_deref() == Some(weakness.dimension.as_str())
            });
            if covered {
                continue;
            }
            let text = render(
                &templates.cluster_focus,
                &[
                    ("{dimension}", weakness.dimension.clone()),
                    ("{cluster_mean}", format!("{:.1}", weakness.cluster_mean)),
                    ("{label}", profile.label.clone()),
                ],
            );
            out.push(make(
                RecommendationCategory::ClusterFocus,
                Some(weakness.dimension.clone()),
                text,
            ));
        }

        if out.is_empty() {
            let template = if profile.rank == 1 {
                &templates.maintain
            } else {
                &templates.monitor
            };
            let text = render(template, &[("{label}", profile.label.clone())]);
            out.push(make(RecommendationCategory::General, None, text));
        }
        out
    }

    fn dimension_name(&self, j: usize) -> String {
        self.dimensions
            .get(j)
            .cloned()
            .unwrap_or_else(|| format!("dimension {}", j + 1))
    }
}

fn render(template: &str, values: &[(&str, String)]) -> String {
    values
        .iter()
        .fold(template.to_string(), |text, (key, value)| text.replace(key, value))
}
