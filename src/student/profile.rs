use serde::{Deserialize, Serialize};

use super::features::FeatureVector;
use super::normalize::ColumnStats;
use super::record::ClusterAssignment;
use crate::cluster::Centroid;
use crate::error::{Error, Result};

/// Labels and thresholds used to describe clusters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileConfig {
    /// Ordered from best to worst. Rank 1 takes the first label, the last rank
    /// the last one, and ranks in between are spread over the rest.
    pub labels: Vec<String>,
    /// Distance from the global mean, in global standard deviations, beyond
    /// which a dimension counts as a relative strength or weakness.
    pub deviation_threshold: f64,
}

impl Default for ProfileConfig {
    fn default() -> Self {
        Self {
            labels: [
                "High Performers",
                "Above Average",
                "Average",
                "Below Average",
                "Needs Support",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            deviation_threshold: 1.0,
        }
    }
}

impl ProfileConfig {
    pub fn validate(&self) -> Result<()> {
        if self.labels.is_empty() || self.labels.iter().any(|l| l.trim().is_empty()) {
            return Err(Error::InvalidConfig(
                "cluster labels must be a non-empty list of non-empty names".to_string(),
            ));
        }
        if !self.deviation_threshold.is_finite() || self.deviation_threshold < 0.0 {
            return Err(Error::InvalidConfig(format!(
                "deviation threshold must be a finite non-negative number, got {}",
                self.deviation_threshold
            )));
        }
        Ok(())
    }

    /// Label for a zero-based `rank` among `k` clusters. Empty when there are
    /// no labels.
    pub fn label_for_rank(&self, rank: usize, k: usize) -> &str {
        let Some(last) = self.labels.len().checked_sub(1) else {
            return "";
        };
        if k < 2 || last == 0 {
            return &self.labels[0];
        }
        let idx = (rank * last + (k - 1) / 2) / (k - 1);
        &self.labels[idx.min(last)]
    }
}

/// A dimension where a cluster stands out from the whole population.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DimensionDeviation {
    pub dimension: String,
    pub cluster_mean: f64,
    pub global_mean: f64,
    /// `(cluster_mean - global_mean) / global_std_dev`
    pub z_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterProfile {
    pub cluster_index: usize,
    /// 1 is the highest composite score.
    pub rank: usize,
    pub label: String,
    pub member_count: usize,
    pub mean: Vec<f64>,
    pub std_dev: Vec<f64>,
    /// Average of `mean` across dimensions; the ranking key.
    pub composite_score: f64,
    pub strengths: Vec<DimensionDeviation>,
    pub weaknesses: Vec<DimensionDeviation>,
    pub characterization: String,
}

/// Describes every cluster of a finished run.
///
/// `assignments` must be aligned with `vectors` (same order, same student ids)
/// and `centroids` gives the cluster count. Clusters are ranked by composite
/// score, highest first, with ties going to the lower cluster index, and the
/// returned profiles are ordered by cluster index.
///
/// # Errors
///
/// - `InvalidConfig` if `config` fails [`ProfileConfig::validate`].
/// - `InvalidInput` if assignments and vectors do not line up, a cluster index
///   is out of range, or a cluster has no members.
/// - `DimensionMismatch` if a vector does not match `dimensions`.
pub fn profile(
    vectors: &[FeatureVector],
    dimensions: &[String],
    assignments: &[ClusterAssignment],
    centroids: &[Centroid],
    config: &ProfileConfig,
) -> Result<Vec<ClusterProfile>> {
    config.validate()?;
    let k = centroids.len();
    let dim = dimensions.len();
    if vectors.len() != assignments.len() {
        return Err(Error::InvalidInput(format!(
            "{} vectors but {} assignments",
            vectors.len(),
            assignments.len()
        )));
    }

    let mut members: Vec<Vec<&[f64]>> = vec![Vec::new(); k];
    for (vector, assignment) in vectors.iter().zip(assignments) {
        if vector.student_id != assignment.student_id {
            return Err(Error::InvalidInput(format!(
                "assignment for {} does not match vector for {}",
                assignment.student_id, vector.student_id
            )));
        }
        if vector.values.len() != dim {
            return Err(Error::DimensionMismatch {
                expected: dim,
                actual: vector.values.len(),
            });
        }
        if assignment.cluster_index >= k {
            return Err(Error::InvalidInput(format!(
                "cluster index {} out of range for {} clusters",
                assignment.cluster_index, k
            )));
        }
        members[assignment.cluster_index].push(&vector.values);
    }
    if let Some(empty) = members.iter().position(|m| m.is_empty()) {
        return Err(Error::InvalidInput(format!("cluster {} has no members", empty)));
    }

    let global = ColumnStats::from_rows(vectors.iter().map(|v| v.values.as_slice()));
    let stats: Vec<ColumnStats> = members
        .iter()
        .map(|m| ColumnStats::from_rows(m.iter().copied()))
        .collect();

    let composite: Vec<f64> = stats
        .iter()
        .map(|s| s.mean.iter().sum::<f64>() / dim.max(1) as f64)
        .collect();
    let mut order: Vec<usize> = (0..k).collect();
    order.sort_by(|&a, &b| composite[b].total_cmp(&composite[a]).then(a.cmp(&b)));
    let mut ranks = vec![0; k];
    for (rank, &cluster) in order.iter().enumerate() {
        ranks[cluster] = rank;
    }

    let profiles = (0..k)
        .map(|c| {
            let (strengths, weaknesses) = deviations(&stats[c].mean, &global, dimensions, config.deviation_threshold);
            let label = config.label_for_rank(ranks[c], k).to_string();
            let characterization =
                characterize(&label, members[c].len(), composite[c], &strengths, &weaknesses);
            ClusterProfile {
                cluster_index: c,
                rank: ranks[c] + 1,
                label,
                member_count: members[c].len(),
                mean: stats[c].mean.clone(),
                std_dev: stats[c].std_dev.clone(),
                composite_score: composite[c],
                strengths,
                weaknesses,
                characterization,
            }
        })
        .collect();
    Ok(profiles)
}

fn deviations(
    cluster_mean: &[f64],
    global: &ColumnStats,
    dimensions: &[String],
    threshold: f64,
) -> (Vec<DimensionDeviation>, Vec<DimensionDeviation>) {
    let mut strengths = Vec::new();
    let mut weaknesses = Vec::new();
    for (j, name) in dimensions.iter().enumerate() {
        if global.std_dev[j] <= 0.0 {
            continue;
        }
        let z_score = (cluster_mean[j] - global.mean[j]) / global.std_dev[j];
        let deviation = DimensionDeviation {
            dimension: name.clone(),
            cluster_mean: cluster_mean[j],
            global_mean: global.mean[j],
            z_score,
        };
        if z_score > threshold {
            strengths.push(deviation);
        } else if z_score < -threshold {
            weaknesses.push(deviation);
        }
    }
    strengths.sort_by(|a, b| b.z_score.total_cmp(&a.z_score));
    weaknesses.sort_by(|a, b| a.z_score.total_cmp(&b.z_score));
    (strengths, weaknesses)
}

fn characterize(
    label: &str,
    members: usize,
    composite: f64,
    strengths: &[DimensionDeviation],
    weaknesses: &[DimensionDeviation],
) -> String {
    let mut text = format!(
        "{}: {} student{}, average score {:.1}.",
        label,
        members,
        if members == 1 { "" } else { "s" },
        composite
    );
    if strengths.is_empty() && weaknesses.is_empty() {
        text.push_str(" Close to the overall average in every dimension.");
        return text;
    }
    if !strengths.is_empty() {
        text.push_str(" Relative strengths: ");
        text.push_str(&list_deviations(strengths));
        text.push('.');
    }
    if !weaknesses.is_empty() {
        text.push_str(" Relative weaknesses: ");
        text.push_str(&list_deviations(weaknesses));
        text.push('.');
    }
    text
}

fn list_deviations(items: &[DimensionDeviation]) -> String {
    items
        .iter()
        .map(|d| format!("{} ({:+.1} SD)", d.dimension, d.z_score))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn fixture() -> (Vec<FeatureVector>, Vec<String>, Vec<ClusterAssignment>, Vec<Centroid>) {
        // cluster 0: strong in math, cluster 1: low overall, cluster 2: strong in art
        let rows = [
            ([90.0, 60.0], 0),
            ([94.0, 62.0], 0),
            ([40.0, 45.0], 1),
            ([44.0, 41.0], 1),
            ([60.0, 95.0], 2),
            ([62.0, 91.0], 2),
        ];
        let vectors: Vec<FeatureVector> = rows
            .iter()
            .enumerate()
            .map(|(i, (v, _))| FeatureVector {
                student_id: format!("s{}", i),
                values: v.to_vec(),
            })
            .collect();
        let assignments = rows
            .iter()
            .enumerate()
            .map(|(i, (_, c))| ClusterAssignment {
                student_id: format!("s{}", i),
                cluster_index: *c,
                distance: 1.0,
            })
            .collect();
        let centroids = (0..3)
            .map(|index| Centroid {
                index,
                point: vec![0.0, 0.0],
            })
            .collect();
        (vectors, vec!["math".to_string(), "art".to_string()], assignments, centroids)
    }

    #[test]
    fn test_counts_means_and_ranks() {
        let (vectors, dims, assignments, centroids) = fixture();
        let profiles = profile(&vectors, &dims, &assignments, &centroids, &ProfileConfig::default()).unwrap();

        assert_eq!(profiles.len(), 3);
        assert_eq!(profiles.iter().map(|p| p.member_count).sum::<usize>(), vectors.len());
        assert_relative_eq!(profiles[0].mean[0], 92.0);
        assert_relative_eq!(profiles[0].std_dev[0], 2.0);
        assert_relative_eq!(profiles[1].composite_score, 42.5);

        // composites: c0 = 76.5, c1 = 42.5, c2 = 77.0
        assert_eq!(profiles[2].rank, 1);
        assert_eq!(profiles[2].label, "High Performers");
        assert_eq!(profiles[0].rank, 2);
        assert_eq!(profiles[0].label, "Average");
        assert_eq!(profiles[1].rank, 3);
        assert_eq!(profiles[1].label, "Needs Support");
    }

    #[test]
    fn test_strengths_and_weaknesses() {
        let (vectors, dims, assignments, centroids) = fixture();
        let profiles = profile(&vectors, &dims, &assignments, &centroids, &ProfileConfig::default()).unwrap();

        assert_eq!(profiles[0].strengths.len(), 1);
        assert_eq!(profiles[0].strengths[0].dimension, "math");
        assert_eq!(profiles[2].strengths[0].dimension, "art");
        assert!(profiles[1].strengths.is_empty());
        assert_eq!(profiles[1].weaknesses[0].dimension, "math");
        assert!(profiles[1].characterization.starts_with("Needs Support: 2 students"));
        assert!(profiles[1].characterization.contains("Relative weaknesses: math"));
    }

    #[test]
    fn test_high_threshold_gives_neutral_text() {
        let (vectors, dims, assignments, centroids) = fixture();
        let config = ProfileConfig {
            deviation_threshold: 10.0,
            ..ProfileConfig::default()
        };
        let profiles = profile(&vectors, &dims, &assignments, &centroids, &config).unwrap();
        for p in &profiles {
            assert!(p.strengths.is_empty() && p.weaknesses.is_empty());
            assert!(p.characterization.ends_with("Close to the overall average in every dimension."));
        }
    }

    #[test]
    fn test_label_for_rank_spreads_labels() {
        let config = ProfileConfig::default();
        assert_eq!(config.label_for_rank(0, 2), "High Performers");
        assert_eq!(config.label_for_rank(1, 2), "Needs Support");
        let four: Vec<&str> = (0..4).map(|r| config.label_for_rank(r, 4)).collect();
        assert_eq!(four, vec!["High Performers", "Above Average", "Below Average", "Needs Support"]);
        let seven: Vec<&str> = (0..7).map(|r| config.label_for_rank(r, 7)).collect();
        assert_eq!(seven[0], "High Performers");
        assert_eq!(seven[6], "Needs Support");

        let single = ProfileConfig {
            labels: vec!["Group".to_string()],
            deviation_threshold: 1.0,
        };
        assert_eq!(single.label_for_rank(2, 3), "Group");
        assert!(ProfileConfig { labels: vec![], deviation_threshold: 1.0 }.validate().is_err());
    }

    #[test]
    fn test_unvalidated_config_is_rejected() {
        let (vectors, dims, assignments, centroids) = fixture();
        let no_labels = ProfileConfig {
            labels: vec![],
            deviation_threshold: 1.0,
        };
        assert_eq!(no_labels.label_for_rank(0, 3), "");
        assert!(matches!(
            profile(&vectors, &dims, &assignments, &centroids, &no_labels),
            Err(Error::InvalidConfig(_))
        ));

        let bad_threshold = ProfileConfig {
            deviation_threshold: f64::NAN,
            ..ProfileConfig::default()
        };
        assert!(matches!(
            profile(&vectors, &dims, &assignments, &centroids, &bad_threshold),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_ranking_ties_prefer_lower_index() {
        let vectors: Vec<FeatureVector> = (0..4)
            .map(|i| FeatureVector {
                student_id: format!("s{}", i),
                values: vec![50.0],
            })
            .collect();
        let assignments: Vec<ClusterAssignment> = (0..4)
            .map(|i| ClusterAssignment {
                student_id: format!("s{}", i),
                cluster_index: i % 2,
                distance: 0.0,
            })
            .collect();
        let centroids = vec![
            Centroid { index: 0, point: vec![50.0] },
            Centroid { index: 1, point: vec![50.0] },
        ];
        let profiles = profile(&vectors, &["x".to_string()], &assignments, &centroids, &ProfileConfig::default()).unwrap();
        assert_eq!(profiles[0].rank, 1);
        assert_eq!(profiles[1].rank, 2);
    }

    #[test]
    fn test_rejects_misaligned_input() {
        let (vectors, dims, mut assignments, centroids) = fixture();
        assignments.swap(0, 1);
        assert!(matches!(
            profile(&vectors, &dims, &assignments, &centroids, &ProfileConfig::default()),
            Err(Error::InvalidInput(_))
        ));

        let (vectors, dims, mut assignments, centroids) = fixture();
        for a in assignments.iter_mut().filter(|a| a.cluster_index == 2) {
            a.cluster_index = 0;
        }
        assert!(matches!(
            profile(&vectors, &dims, &assignments, &centroids, &ProfileConfig::default()),
            Err(Error::InvalidInput(msg)) if msg.contains("no members")
        ));
    }
}
