//! Answer evaluation against a fixed ground-truth question set.
//!
//! A response counts as judged relevant when a relevant question gets at
//! least one expected keyword back, or an irrelevant question gets none.
//! Accuracy and F1 compare that judgement with the ground-truth relevance
//! label, with "relevant" as the positive class.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::orchestrator::{Orchestrator, QueryRequest};

/// One ground-truth question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvalCase {
    pub query: String,
    /// Phrases a good answer should contain, matched case-insensitively.
    pub expected_keywords: Vec<String>,
    /// Whether the question is in scope for the assistant.
    pub is_relevant: bool,
}

impl EvalCase {
    pub fn new(query: impl Into<String>, expected_keywords: &[&str], is_relevant: bool) -> Self {
        Self {
            query: query.into(),
            expected_keywords: expected_keywords.iter().map(|&keyword| keyword.to_owned()).collect(),
            is_relevant,
        }
    }
}

/// The built-in question set.
pub fn default_cases() -> Vec<EvalCase> {
    vec![
        EvalCase::new(
            "When should I use a pie chart?",
            &["pie chart", "proportion", "small number", "categories"],
            true,
        ),
        EvalCase::new(
            "What are the key principles of effective dashboard design?",
            &["clarity", "simplicity", "user", "focus", "design"],
            true,
        ),
        EvalCase::new(
            "How do I choose color schemes for data visualization?",
            &["color", "perception", "accessibility", "contrast"],
            true,
        ),
        EvalCase::new(
            "What is a BAN in dashboard design?",
            &["Big-Ass Number", "Big", "key metric", "large"],
            true,
        ),
        EvalCase::new(
            "Best practices for displaying time series data",
            &["time series", "trend", "line chart", "data over time"],
            true,
        ),
        EvalCase::new("What sound does a cow make?", &[], false),
    ]
}

/// Score of a single response.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CaseScore {
    /// Fraction of expected keywords present; zero when none are expected.
    pub keyword_hit_rate: f64,
    pub judged_relevant: bool,
}

/// Score `response` against the expectations of `case`.
pub fn score_response(response: &str, case: &EvalCase) -> CaseScore {
    let response = response.to_lowercase();
    let keyword_hit_rate = if case.expected_keywords.is_empty() {
        0.0
    } else {
        let hits = case
            .expected_keywords
            .iter()
            .filter(|keyword| response.contains(&keyword.to_lowercase()))
            .count();
        hits as f64 / case.expected_keywords.len() as f64
    };

    let judged_relevant = if case.is_relevant {
        keyword_hit_rate > 0.0
    } else {
        keyword_hit_rate <= 0.0
    };

    CaseScore {
        keyword_hit_rate,
        judged_relevant,
    }
}

/// How a case ended.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CaseResult {
    Scored { response: String, score: CaseScore },
    Failed { error: String },
}

/// A case together with its result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CaseOutcome {
    pub case: EvalCase,
    pub result: CaseResult,
}

impl CaseOutcome {
    pub fn score(&self) -> Option<&CaseScore> {
        match &self.result {
            CaseResult::Scored { score, .. } => Some(score),
            CaseResult::Failed { .. } => None,
        }
    }
}

/// Per-case outcomes and aggregate metrics over the scored cases.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvalReport {
    pub outcomes: Vec<CaseOutcome>,
    pub accuracy: f64,
    pub f1_score: f64,
    pub average_hit_rate: f64,
}

impl EvalReport {
    /// Aggregate `outcomes`; failed cases are kept but not scored.
    pub fn from_outcomes(outcomes: Vec<CaseOutcome>) -> Self {
        let scored: Vec<(bool, &CaseScore)> = outcomes
            .iter()
            .filter_map(|outcome| outcome.score().map(|score| (outcome.case.is_relevant, score)))
            .collect();

        let (accuracy, f1_score, average_hit_rate) = if scored.is_empty() {
            (0.0, 0.0, 0.0)
        } else {
            let total = scored.len() as f64;
            let mut agree = 0_usize;
            let mut true_positive = 0_usize;
            let mut false_positive = 0_usize;
            let mut false_negative = 0_usize;
            for &(actual, score) in &scored {
                let predicted = score.judged_relevant;
                if actual == predicted {
                    agree += 1;
                }
                match (actual, predicted) {
                    (true, true) => true_positive += 1,
                    (false, true) => false_positive += 1,
                    (true, false) => false_negative += 1,
                    (false, false) => {}
                }
            }
            let f1_denominator = 2 * true_positive + false_positive + false_negative;
            let f1 = if f1_denominator == 0 {
                0.0
            } else {
                (2 * true_positive) as f64 / f1_denominator as f64
            };
            let hit_rate_sum: f64 = scored.iter().map(|(_, score)| score.keyword_hit_rate).sum();
            (agree as f64 / total, f1, hit_rate_sum / total)
        };

        Self {
            outcomes,
            accuracy,
            f1_score,
            average_hit_rate,
        }
    }

    pub fn failed_count(&self) -> usize {
        self.outcomes.iter().filter(|outcome| outcome.score().is_none()).count()
    }
}

/// Runs a question set through an orchestrator.
#[derive(Debug, Clone)]
pub struct Evaluator {
    cases: Vec<EvalCase>,
    top_k: Option<usize>,
}

impl Default for Evaluator {
    fn default() -> Self {
        Self::new(default_cases())
    }
}

impl Evaluator {
    pub fn new(cases: Vec<EvalCase>) -> Self {
        Self { cases, top_k: None }
    }

    #[must_use]
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = Some(top_k);
        self
    }

    pub fn cases(&self) -> &[EvalCase] {
        &self.cases
    }

    /// Ask every case in order. Failed queries are reported, not skipped.
    pub async fn run(&self, orchestrator: &Orchestrator) -> EvalReport {
        let mut outcomes = Vec::with_capacity(self.cases.len());
        for case in &self.cases {
            let mut request = QueryRequest::new(case.query.as_str());
            request.top_k = self.top_k;

            let result = match orchestrator.answer(&request).await {
                Ok(answer) => {
                    let score = score_response(&answer.answer, case);
                    info!(
                        "Query: {} | keyword hit rate {:.2} | judged relevant: {}",
                        case.query, score.keyword_hit_rate, score.judged_relevant
                    );
                    CaseResult::Scored {
                        response: answer.answer,
                        score,
                    }
                }
                Err(error) => {
                    warn!("Error evaluating query '{}': {error}", case.query);
                    CaseResult::Failed {
                        error: error.to_string(),
                    }
                }
            };
            outcomes.push(CaseOutcome {
                case: case.clone(),
                result,
            });
        }

        let report = EvalReport::from_outcomes(outcomes);
        info!(
            "Accuracy: {:.2}, F1 Score: {:.2}, Average Keyword Hit Rate: {:.2}",
            report.accuracy, report.f1_score, report.average_hit_rate
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scored(case: EvalCase, response: &str) -> CaseOutcome {
        let score = score_response(response, &case);
        CaseOutcome {
            case,
            result: CaseResult::Scored {
                response: response.to_owned(),
                score,
            },
        }
    }

    #[test]
    fn test_default_cases_match_ground_truth() {
        let cases = default_cases();
        assert_eq!(cases.len(), 6);
        assert_eq!(cases.iter().filter(|case| case.is_relevant).count(), 5);
        let cow = cases.last().unwrap();
        assert_eq!(cow.query, "What sound does a cow make?");
        assert!(cow.expected_keywords.is_empty());
    }

    #[test]
    fn test_keyword_hit_rate_is_case_insensitive() {
        let case = EvalCase::new("pie?", &["pie chart", "proportion", "small number", "categories"], true);
        let score = score_response("A PIE CHART shows each Proportion.", &case);
        assert!((score.keyword_hit_rate - 0.5).abs() < f64::EPSILON);
        assert!(score.judged_relevant);

        let miss = score_response("I don't know.", &case);
        assert!(miss.keyword_hit_rate.abs() < f64::EPSILON);
        assert!(!miss.judged_relevant);
    }

    #[test]
    fn test_irrelevant_case_without_keywords_is_judged_relevant() {
        let cow = EvalCase::new("What sound does a cow make?", &[], false);
        let score = score_response("I cannot answer that.", &cow);
        assert!(score.keyword_hit_rate.abs() < f64::EPSILON);
        assert!(score.judged_relevant);
    }

    #[test]
    fn test_report_metrics() {
        let outcomes = vec![
            scored(EvalCase::new("pie", &["pie"], true), "pie"),
            scored(EvalCase::new("ban", &["big"], true), "nothing"),
            scored(EvalCase::new("cow", &[], false), "moo"),
            CaseOutcome {
                case: EvalCase::new("color", &["color"], true),
                result: CaseResult::Failed {
                    error: "Generation failed: request timed out".to_owned(),
                },
            },
        ];
        let report = EvalReport::from_outcomes(outcomes);

        // actual [T, T, F], predicted [T, F, T]
        assert!((report.accuracy - 1.0 / 3.0).abs() < 1e-9);
        assert!((report.f1_score - 0.5).abs() < 1e-9);
        assert!((report.average_hit_rate - 1.0 / 3.0).abs() < 1e-9);
        assert_eq!(report.failed_count(), 1);
        assert_eq!(report.outcomes.len(), 4);
    }

    #[test]
    fn test_report_without_scored_cases_is_zero() {
        let report = EvalReport::from_outcomes(vec![CaseOutcome {
            case: EvalCase::new("pie", &["pie"], true),
            result: CaseResult::Failed {
                error: "Index is not available.".to_owned(),
            },
        }]);
        assert!(report.accuracy.abs() < f64::EPSILON);
        assert!(report.f1_score.abs() < f64::EPSILON);
        assert_eq!(report.failed_count(), 1);
    }
}
