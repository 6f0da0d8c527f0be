//! Column roles of the student records dataset

use crate::structs::{Dataset, PipelineError, Result};

/// A diagnostic range rule; violations are counted, never enforced
#[derive(Debug, Clone)]
pub struct RangeRule {
    pub column: String,
    pub label: String,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl RangeRule {
    #[must_use]
    pub fn new(column: &str, label: &str, min: Option<f64>, max: Option<f64>) -> Self {
        Self {
            column: column.to_string(),
            label: label.to_string(),
            min,
            max,
        }
    }

    #[must_use]
    pub fn violates(&self, value: f64) -> bool {
        self.min.is_some_and(|min| value < min) || self.max.is_some_and(|max| value > max)
    }
}

/// Names and roles of the columns the pipeline depends on
#[derive(Debug, Clone)]
pub struct StudentSchema {
    pub id: String,
    pub stress: String,
    pub sleep: String,
    pub target: String,
    /// Optional columns making up the total score
    pub score_components: Vec<String>,
    pub range_rules: Vec<RangeRule>,
}

impl Default for StudentSchema {
    fn default() -> Self {
        let stress = "Stress_Level (1-10)";
        let sleep = "Sleep_Hours_per_Night";
        let target = "Total_Score";

        Self {
            id: "Student_ID".to_string(),
            stress: stress.to_string(),
            sleep: sleep.to_string(),
            target: target.to_string(),
            score_components: [
                "Midterm_Score",
                "Final_Score",
                "Assignments_Avg",
                "Quizzes_Avg",
                "Participation_Score",
                "Projects_Score",
                target,
            ]
            .iter()
            .map(ToString::to_string)
            .collect(),
            range_rules: vec![
                RangeRule::new(stress, "stress", Some(1.0), Some(10.0)),
                RangeRule::new(sleep, "sleep hours", Some(0.0), None),
                RangeRule::new(target, "total score", Some(0.0), Some(100.0)),
            ],
        }
    }
}

impl StudentSchema {
    /// Columns that must be present for the pipeline to run
    #[must_use]
    pub fn required(&self) -> [&str; 4] {
        [
            self.id.as_str(),
            self.stress.as_str(),
            self.sleep.as_str(),
            self.target.as_str(),
        ]
    }

    /// Check that every required column exists, reporting all that are absent
    ///
    /// # Errors
    /// Returns `MissingColumns` listing each absent required column
    pub fn require(&self, dataset: &Dataset) -> Result<()> {
        let missing: Vec<String> = self
            .required()
            .iter()
            .filter(|name| !dataset.has_column(name))
            .map(ToString::to_string)
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(PipelineError::MissingColumns(missing))
        }
    }

    /// Score components present in the dataset
    #[must_use]
    pub fn present_components<'a>(&'a self, dataset: &Dataset) -> Vec<&'a str> {
        self.score_components
            .iter()
            .filter(|c| dataset.column(c).is_some_and(|col| col.is_numeric()))
            .map(String::as_str)
            .collect()
    }
}
