// src/engine/randomize.rs

// Question and option ordering, fixed once when an attempt is created.

use std::collections::HashMap;

use rand::{Rng, rngs::StdRng};

use crate::models::{question::Question, test::TestDefinition};

/// Source of swap indices for a Fisher–Yates pass.
///
/// Injected so callers can replay or script a shuffle exactly.
pub trait ShuffleSource {
    /// Returns an index in `0..=upper`.
    fn pick(&mut self, upper: usize) -> usize;
}

impl ShuffleSource for StdRng {
    fn pick(&mut self, upper: usize) -> usize {
        self.gen_range(0..=upper)
    }
}

/// In-place Fisher–Yates shuffle.
pub fn fisher_yates<T, S: ShuffleSource + ?Sized>(items: &mut [T], source: &mut S) {
    for i in (1..items.len()).rev() {
        let j = source.pick(i).min(i);
        items.swap(i, j);
    }
}

/// Orderings persisted on the attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct Orderings {
    pub question_order: Vec<String>,
    pub option_orders: HashMap<String, Vec<usize>>,
}

/// Builds the question order (one shuffle over every section's ids, concatenated)
/// and, independently, one option permutation per choice question.
///
/// Option orders are always recorded for choice questions so scoring can
/// dereference them; they are the identity when option shuffling is off.
pub fn build_orderings<S: ShuffleSource + ?Sized>(
    test: &TestDefinition,
    questions: &HashMap<String, Question>,
    source: &mut S,
) -> Orderings {
    let mut question_order = test.all_question_ids();
    if test.randomize_questions {
        fisher_yates(&mut question_order, source);
    }

    let mut option_orders = HashMap::new();
    for qid in &question_order {
        let Some(q) = questions.get(qid) else {
            continue;
        };
        if !q.question_type.has_options() || q.options.is_empty() {
            continue;
        }
        let mut order: Vec<usize> = (0..q.options.len()).collect();
        if test.randomize_options {
            fisher_yates(&mut order, source);
        }
        option_orders.insert(qid.clone(), order);
    }

    Orderings {
        question_order,
        option_orders,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        question::QuestionType,
        test::{SectionDef, TestMode, TestStatus},
    };
    use rand::SeedableRng;

    /// Replays a fixed list of picks, then always picks 0.
    struct Scripted(Vec<usize>);

    impl ShuffleSource for Scripted {
        fn pick(&mut self, _upper: usize) -> usize {
            if self.0.is_empty() { 0 } else { self.0.remove(0) }
        }
    }

    fn question(id: &str, options: usize) -> Question {
        Question {
            id: id.to_string(),
            question_type: if options > 0 {
                QuestionType::SingleChoice
            } else {
                QuestionType::Essay
            },
            content: format!("Question {}", id),
            options: (0..options).map(|i| format!("opt{}", i)).collect(),
            correct_answer: None,
            tolerance: None,
            solution: None,
            marks: 1.0,
            subject_id: None,
        }
    }

    fn test_def(shuffle_q: bool, shuffle_o: bool) -> TestDefinition {
        TestDefinition {
            id: "t1".to_string(),
            org_id: None,
            title: "Mock".to_string(),
            mode: TestMode::Practice,
            status: TestStatus::Live,
            start_time: None,
            end_time: None,
            available_from: None,
            duration_minutes: None,
            sections: vec![
                SectionDef {
                    name: "A".to_string(),
                    question_ids: vec!["q1".into(), "q2".into()],
                    time_limit_minutes: None,
                },
                SectionDef {
                    name: "B".to_string(),
                    question_ids: vec!["q3".into(), "q4".into()],
                    time_limit_minutes: None,
                },
            ],
            assigned_student_ids: vec![],
            assigned_class_ids: vec![],
            is_public: true,
            requires_manual_grading: false,
            passing_score: None,
            randomize_questions: shuffle_q,
            randomize_options: shuffle_o,
            max_attempts: None,
        }
    }

    fn bank() -> HashMap<String, Question> {
        [question("q1", 4), question("q2", 3), question("q3", 0), question("q4", 2)]
            .into_iter()
            .map(|q| (q.id.clone(), q))
            .collect()
    }

    #[test]
    fn test_fisher_yates_always_zero_rotates_left() {
        let mut items = vec!["a", "b", "c", "d"];
        fisher_yates(&mut items, &mut Scripted(vec![]));
        assert_eq!(items, vec!["b", "c", "d", "a"]);
    }

    #[test]
    fn test_fisher_yates_scripted_identity() {
        // Picking i at every step swaps each element with itself.
        let mut items = vec![1, 2, 3, 4];
        fisher_yates(&mut items, &mut Scripted(vec![3, 2, 1]));
        assert_eq!(items, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_unshuffled_order_is_section_concatenation() {
        let orderings = build_orderings(&test_def(false, false), &bank(), &mut Scripted(vec![]));
        assert_eq!(orderings.question_order, vec!["q1", "q2", "q3", "q4"]);
        assert_eq!(orderings.option_orders["q1"], vec![0, 1, 2, 3]);
        assert!(!orderings.option_orders.contains_key("q3"));
    }

    #[test]
    fn test_shuffled_order_is_exact_for_scripted_source() {
        let orderings = build_orderings(&test_def(true, true), &bank(), &mut Scripted(vec![]));
        assert_eq!(orderings.question_order, vec!["q2", "q3", "q4", "q1"]);
        assert_eq!(orderings.option_orders["q2"], vec![1, 2, 0]);
        assert_eq!(orderings.option_orders["q4"], vec![1, 0]);
    }

    #[test]
    fn test_question_order_is_permutation() {
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..50 {
            let orderings = build_orderings(&test_def(true, true), &bank(), &mut rng);
            let mut sorted = orderings.question_order.clone();
            sorted.sort();
            assert_eq!(sorted, vec!["q1", "q2", "q3", "q4"]);

            let mut opts = orderings.option_orders["q1"].clone();
            opts.sort();
            assert_eq!(opts, vec![0, 1, 2, 3]);
        }
    }

    #[test]
    fn test_same_seed_replays_same_orderings() {
        let a = build_orderings(&test_def(true, true), &bank(), &mut StdRng::seed_from_u64(7));
        let b = build_orderings(&test_def(true, true), &bank(), &mut StdRng::seed_from_u64(7));
        assert_eq!(a, b);
    }
}
