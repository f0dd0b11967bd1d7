//! Student-performance clustering built on [`crate::cluster`].
//!
//! The pipeline runs leaves first:
//! - `features` - raw score records to feature vectors, with a skipped-student report
//! - `normalize` - optional global min-max or z-score scaling
//! - `profile` - per-cluster statistics, ranking and labels
//! - `recommend` - prioritized recommendations per student
//! - `pipeline` - the orchestrator wiring the above to external collaborators
//!
//! # Examples
//!
//! ```rust
//! use student_clustering::cluster::NeverCancel;
//! use student_clustering::student::{
//!     ClusterConfig, ClusteringOrchestrator, Component, EmptyRoster, ScoreRecord,
//! };
//!
//! let mut records = Vec::new();
//! for (i, score) in [15.0, 18.0, 52.0, 55.0, 91.0, 94.0].iter().enumerate() {
//!     for component in Component::ALL {
//!         records.push(ScoreRecord::new(format!("student-{}", i), "math", component, *score));
//!     }
//! }
//!
//! let config = ClusterConfig::builder("term-1", 3)
//!     .subjects(["math"])
//!     .weights(40.0, 40.0, 20.0)
//!     .seed(42)
//!     .build()
//!     .unwrap();
//!
//! let outcome = ClusteringOrchestrator::new(&records, &EmptyRoster)
//!     .run(&config, &NeverCancel)
//!     .unwrap();
//! assert_eq!(outcome.profiles.len(), 3);
//! ```

pub mod config;
pub mod features;
pub mod normalize;
pub mod pipeline;
pub mod profile;
pub mod recommend;
pub mod record;


pub use config::{ClusterConfig, ClusterConfigBuilder, ComponentWeights, FeatureMode, Normalization, RawClusterConfig};
pub use features::{extract, FeatureSet, FeatureVector, SkipReason, SkippedStudent};
pub use normalize::{normalize, ColumnStats};
pub use pipeline::{
    ClusteringOrchestrator, ClusteringOutcome, EmptyRoster, Roster, RunMetadata, RunWarning, ScoreSource,
    SourceError, StudentResult,
};
pub use profile::{profile, ClusterProfile, DimensionDeviation, ProfileConfig};
pub use recommend::{
    Priority, Recommendation, RecommendationCategory, RecommendationConfig, RecommendationGenerator,
    RecommendationTemplates,
};
pub use record::{ClusterAssignment, Component, ScoreRecord, StudentId, StudentInfo, SubjectId};
