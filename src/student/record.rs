use serde::{Deserialize, Serialize};
use std::fmt;

pub type StudentId = String;
pub type SubjectId = String;

/// Lowest valid score value.
pub const MIN_SCORE: f64 = 0.0;
/// Highest valid score value.
pub const MAX_SCORE: f64 = 100.0;

/// Assessment component a score belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Component {
    Knowledge,
    Skill,
    Attitude,
}

impl Component {
    pub const ALL: [Component; 3] = [Component::Knowledge, Component::Skill, Component::Attitude];

    pub fn as_str(self) -> &'static str {
        match self {
            Component::Knowledge => "knowledge",
            Component::Skill => "skill",
            Component::Attitude => "attitude",
        }
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One raw score from the grading subsystem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreRecord {
    pub student_id: StudentId,
    pub subject_id: SubjectId,
    pub component: Component,
    /// Expected in `MIN_SCORE..=MAX_SCORE`.
    pub value: f64,
}

impl ScoreRecord {
    pub fn new(
        student_id: impl Into<StudentId>,
        subject_id: impl Into<SubjectId>,
        component: Component,
        value: f64,
    ) -> Self {
        Self {
            student_id: student_id.into(),
            subject_id: subject_id.into(),
            component,
            value,
        }
    }

    pub fn is_valid_value(&self) -> bool {
        self.value.is_finite() && (MIN_SCORE..=MAX_SCORE).contains(&self.value)
    }
}

/// Roster entry, used only to label output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentInfo {
    pub id: StudentId,
    pub name: String,
    pub class: String,
}

/// Cluster membership of one student in one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterAssignment {
    pub student_id: StudentId,
    pub cluster_index: usize,
    /// Euclidean distance to the final centroid of `cluster_index`, in the
    /// space the engine clustered (after normalization, if any).
    pub distance: f64,
}
