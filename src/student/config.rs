//! Validated run configuration.
//!
//! A [`ClusterConfig`] can only be obtained through [`ClusterConfigBuilder::build`]
//! or [`ClusterConfig::from_json`], both of which reject malformed input, so the
//! rest of the crate never re-checks it.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::profile::ProfileConfig;
use super::recommend::RecommendationConfig;
use super::record::{Component, SubjectId};
use crate::cluster::KMeansConfig;
use crate::error::{Error, Result};

/// Allowed deviation of the weight sum from 100.
const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

pub const DEFAULT_MAX_ITERATIONS: usize = 100;
pub const DEFAULT_TOLERANCE: f64 = 1e-4;

/// Knowledge, skill and attitude weights as percentages summing to 100.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ComponentWeights {
    pub knowledge: f64,
    pub skill: f64,
    pub attitude: f64,
}

impl ComponentWeights {
    pub fn new(knowledge: f64, skill: f64, attitude: f64) -> Self {
        Self {
            knowledge,
            skill,
            attitude,
        }
    }

    /// Equal share for every component.
    pub fn equal() -> Self {
        let third = 100.0 / 3.0;
        Self::new(third, third, third)
    }

    pub fn percent(&self, component: Component) -> f64 {
        match component {
            Component::Knowledge => self.knowledge,
            Component::Skill => self.skill,
            Component::Attitude => self.attitude,
        }
    }

    /// Weight as a fraction of 1.
    pub fn fraction(&self, component: Component) -> f64 {
        self.percent(component) / 100.0
    }

    /// Components with a non-zero weight, in `Component::ALL` order.
    pub fn active_components(&self) -> Vec<Component> {
        Component::ALL
            .into_iter()
            .filter(|&c| self.percent(c) > 0.0)
            .collect()
    }

    pub fn validate(&self) -> Result<()> {
        for component in Component::ALL {
            let w = self.percent(component);
            if !w.is_finite() || w < 0.0 {
                return Err(Error::InvalidConfig(format!(
                    "{} weight must be a finite non-negative percentage, got {}",
                    component, w
                )));
            }
        }
        let sum = self.knowledge + self.skill + self.attitude;
        if (sum - 100.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(Error::InvalidConfig(format!(
                "component weights must sum to 100, got {}",
                sum
            )));
        }
        Ok(())
    }
}

/// How per-subject scores become feature dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureMode {
    /// One dimension per subject: weighted composite of its components.
    #[default]
    WeightedSubject,
    /// One dimension per subject: plain mean of its weighted-in components.
    SubjectMean,
    /// One dimension per component category, averaged over subjects.
    Category,
}

/// Scaling applied to feature vectors before clustering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Normalization {
    #[default]
    None,
    MinMax,
    ZScore,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClusterConfig {
    id: String,
    k: usize,
    subjects: Vec<SubjectId>,
    weights: ComponentWeights,
    seed: Option<u64>,
    feature_mode: FeatureMode,
    normalization: Normalization,
    max_iterations: usize,
    tolerance: f64,
    profile: ProfileConfig,
    recommendation: RecommendationConfig,
}

impl ClusterConfig {
    pub fn builder(id: impl Into<String>, k: usize) -> ClusterConfigBuilder {
        ClusterConfigBuilder::new(id, k)
    }

    /// Parses and validates a JSON configuration document.
    ///
    /// ```
    /// use student_clustering::student::ClusterConfig;
    ///
    /// let config = ClusterConfig::from_json(r#"{
    ///     "id": "term-1",
    ///     "k": 3,
    ///     "subjects": ["math", "science"],
    ///     "weights": { "knowledge": 40, "skill": 40, "attitude": 20 }
    /// }"#).unwrap();
    /// assert_eq!(config.k(), 3);
    /// ```
    pub fn from_json(json: &str) -> Result<Self> {
        let raw: RawClusterConfig = serde_json::from_str(json)?;
        raw.try_into()
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn k(&self) -> usize {
        self.k
    }

    pub fn subjects(&self) -> &[SubjectId] {
        &self.subjects
    }

    pub fn weights(&self) -> &ComponentWeights {
        &self.weights
    }

    pub fn seed(&self) -> Option<u64> {
        self.seed
    }

    pub fn feature_mode(&self) -> FeatureMode {
        self.feature_mode
    }

    pub fn normalization(&self) -> Normalization {
        self.normalization
    }

    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    pub fn profile(&self) -> &ProfileConfig {
        &self.profile
    }

    pub fn recommendation(&self) -> &RecommendationConfig {
        &self.recommendation
    }

    /// Engine parameters for this run.
    pub fn kmeans_config(&self) -> KMeansConfig {
        let config = KMeansConfig::new(self.k)
            .with_max_iterations(self.max_iterations)
            .with_tolerance(self.tolerance);
        match self.seed {
            Some(seed) => config.with_seed(seed),
            None => config,
        }
    }
}

/// Builder for [`ClusterConfig`]. Weights default to an equal split.
#[derive(Debug, Clone)]
pub struct ClusterConfigBuilder {
    id: String,
    k: usize,
    subjects: Vec<SubjectId>,
    weights: ComponentWeights,
    seed: Option<u64>,
    feature_mode: FeatureMode,
    normalization: Normalization,
    max_iterations: usize,
    tolerance: f64,
    profile: ProfileConfig,
    recommendation: RecommendationConfig,
}

impl ClusterConfigBuilder {
    pub fn new(id: impl Into<String>, k: usize) -> Self {
        Self {
            id: id.into(),
            k,
            subjects: Vec::new(),
            weights: ComponentWeights::equal(),
            seed: None,
            feature_mode: FeatureMode::default(),
            normalization: Normalization::default(),
            max_iterations: DEFAULT_MAX_ITERATIONS,
            tolerance: DEFAULT_TOLERANCE,
            profile: ProfileConfig::default(),
            recommendation: RecommendationConfig::default(),
        }
    }

    pub fn subjects<I, S>(mut self, subjects: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<SubjectId>,
    {
        self.subjects = subjects.into_iter().map(Into::into).collect();
        self
    }

    /// Percentages for knowledge, skill and attitude.
    pub fn weights(mut self, knowledge: f64, skill: f64, attitude: f64) -> Self {
        self.weights = ComponentWeights::new(knowledge, skill, attitude);
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn feature_mode(mut self, mode: FeatureMode) -> Self {
        self.feature_mode = mode;
        self
    }

    pub fn normalization(mut self, normalization: Normalization) -> Self {
        self.normalization = normalization;
        self
    }

    pub fn max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn profile(mut self, profile: ProfileConfig) -> Self {
        self.profile = profile;
        self
    }

    pub fn recommendation(mut self, recommendation: RecommendationConfig) -> Self {
        self.recommendation = recommendation;
        self
    }

    pub fn build(self) -> Result<ClusterConfig> {
        if self.id.trim().is_empty() {
            return Err(Error::InvalidConfig("config id must not be empty".to_string()));
        }
        if self.k < 2 {
            return Err(Error::InvalidConfig(format!(
                "number of clusters must be at least 2, got {}",
                self.k
            )));
        }
        if self.subjects.is_empty() {
            return Err(Error::InvalidConfig("no subjects selected".to_string()));
        }
        let mut seen = BTreeSet::new();
        for subject in &self.subjects {
            if subject.trim().is_empty() {
                return Err(Error::InvalidConfig("subject id must not be empty".to_string()));
            }
            if !seen.insert(subject.as_str()) {
                return Err(Error::InvalidConfig(format!(
                    "subject {} selected more than once",
                    subject
                )));
            }
        }
        self.weights.validate()?;
        if self.max_iterations == 0 {
            return Err(Error::InvalidConfig(
                "max_iterations must be at least 1".to_string(),
            ));
        }
        if !self.tolerance.is_finite() || self.tolerance < 0.0 {
            return Err(Error::InvalidConfig(format!(
                "tolerance must be a finite non-negative number, got {}",
                self.tolerance
            )));
        }
        self.profile.validate()?;
        self.recommendation.validate()?;

        Ok(ClusterConfig {
            id: self.id,
            k: self.k,
            subjects: self.subjects,
            weights: self.weights,
            seed: self.seed,
            feature_mode: self.feature_mode,
            normalization: self.normalization,
            max_iterations: self.max_iterations,
            tolerance: self.tolerance,
            profile: self.profile,
            recommendation: self.recommendation,
        })
    }
}

/// Loosely typed configuration as it arrives from an operator screen or store.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawClusterConfig {
    pub id: String,
    pub k: i64,
    pub subjects: Vec<String>,
    pub weights: ComponentWeights,
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default)]
    pub feature_mode: FeatureMode,
    #[serde(default)]
    pub normalization: Normalization,
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,
    #[serde(default)]
    pub profile: ProfileConfig,
    #[serde(default)]
    pub recommendation: RecommendationConfig,
}

fn default_max_iterations() -> usize {
    DEFAULT_MAX_ITERATIONS
}

fn default_tolerance() -> f64 {
    DEFAULT_TOLERANCE
}

impl TryFrom<RawClusterConfig> for ClusterConfig {
    type Error = Error;

    fn try_from(raw: RawClusterConfig) -> Result<Self> {
        let k = usize::try_from(raw.k)
            .map_err(|_| Error::InvalidConfig(format!("number of clusters must be at least 2, got {}", raw.k)))?;
        let mut builder = ClusterConfigBuilder::new(raw.id, k)
            .subjects(raw.subjects)
            .weights(raw.weights.knowledge, raw.weights.skill, raw.weights.attitude)
            .feature_mode(raw.feature_mode)
            .normalization(raw.normalization)
            .max_iterations(raw.max_iterations)
            .tolerance(raw.tolerance)
            .profile(raw.profile)
            .recommendation(raw.recommendation);
        if let Some(seed) = raw.seed {
            builder = builder.seed(seed);
        }
        builder.build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn valid() -> ClusterConfigBuilder {
        ClusterConfig::builder("cfg-1", 3)
            .subjects(["math", "science"])
            .weights(40.0, 40.0, 20.0)
    }

    #[test]
    fn test_valid_config() {
        let config = valid().seed(9).build().unwrap();
        assert_eq!(config.id(), "cfg-1");
        assert_eq!(config.k(), 3);
        assert_eq!(config.subjects(), ["math".to_string(), "science".to_string()]);
        assert_relative_eq!(config.weights().fraction(Component::Skill), 0.4);
        assert_eq!(config.feature_mode(), FeatureMode::WeightedSubject);
        assert_eq!(config.normalization(), Normalization::None);

        let engine = config.kmeans_config();
        assert_eq!(engine.k, 3);
        assert_eq!(engine.max_iterations, DEFAULT_MAX_ITERATIONS);
        assert_eq!(engine.seed, Some(9));
    }

    #[test]
    fn test_weights_must_sum_to_100() {
        let err = valid().weights(40.0, 40.0, 30.0).build().unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(msg) if msg.contains("sum to 100")));
        assert!(valid().weights(50.0, 60.0, -10.0).build().is_err());
        assert!(valid().weights(f64::NAN, 50.0, 50.0).build().is_err());
        assert!(ComponentWeights::equal().validate().is_ok());
    }

    #[test]
    fn test_invalid_cluster_count_and_subjects() {
        assert!(matches!(
            ClusterConfig::builder("c", 1).subjects(["math"]).build(),
            Err(Error::InvalidConfig(_))
        ));
        assert!(matches!(
            ClusterConfig::builder("c", 2).build(),
            Err(Error::InvalidConfig(msg)) if msg.contains("no subjects")
        ));
        assert!(ClusterConfig::builder("c", 2).subjects(["math", "math"]).build().is_err());
        assert!(ClusterConfig::builder("c", 2).subjects(["  "]).build().is_err());
        assert!(ClusterConfig::builder(" ", 2).subjects(["math"]).build().is_err());
        assert!(valid().max_iterations(0).build().is_err());
        assert!(valid().tolerance(f64::INFINITY).build().is_err());
    }

    #[test]
    fn test_active_components_skip_zero_weights() {
        let weights = ComponentWeights::new(60.0, 40.0, 0.0);
        assert_eq!(
            weights.active_components(),
            vec![Component::Knowledge, Component::Skill]
        );
    }

    #[test]
    fn test_from_json_with_defaults() {
        let config = ClusterConfig::from_json(
            r#"{
                "id": "semester-2",
                "k": 4,
                "subjects": ["math", "biology", "history"],
                "weights": { "knowledge": 50, "skill": 30, "attitude": 20 },
                "seed": 17,
                "normalization": "z_score",
                "feature_mode": "category"
            }"#,
        )
        .unwrap();
        assert_eq!(config.k(), 4);
        assert_eq!(config.seed(), Some(17));
        assert_eq!(config.normalization(), Normalization::ZScore);
        assert_eq!(config.feature_mode(), FeatureMode::Category);
        assert_eq!(config.max_iterations(), DEFAULT_MAX_ITERATIONS);
        assert_relative_eq!(config.tolerance(), DEFAULT_TOLERANCE);
        assert_eq!(config.profile(), &ProfileConfig::default());
    }

    #[test]
    fn test_from_json_rejects_bad_input() {
        let negative_k = r#"{"id":"x","k":-3,"subjects":["m"],"weights":{"knowledge":40,"skill":40,"attitude":20}}"#;
        assert!(matches!(
            ClusterConfig::from_json(negative_k),
            Err(Error::InvalidConfig(_))
        ));

        let bad_sum = r#"{"id":"x","k":3,"subjects":["m"],"weights":{"knowledge":40,"skill":40,"attitude":30}}"#;
        assert!(matches!(
            ClusterConfig::from_json(bad_sum),
            Err(Error::InvalidConfig(_))
        ));

        assert!(matches!(
            ClusterConfig::from_json("{not json"),
            Err(Error::ConfigParse(_))
        ));
        let unknown = r#"{"id":"x","k":3,"subjects":["m"],"weights":{"knowledge":40,"skill":40,"attitude":20},"colour":"red"}"#;
        assert!(matches!(
            ClusterConfig::from_json(unknown),
            Err(Error::ConfigParse(_))
        ));
    }
}
