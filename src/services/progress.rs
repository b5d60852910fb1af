//! 进度统计与练习评分
//! 纯函数：完成度随时可从持久化状态重新推导，本模块不持有任何状态

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::models::{LessonProgress, Question, QuestionOption};

/// 聚合计算的输入：一门课文及当前用户的进度行
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LessonSnapshot {
    pub lesson_id: String,
    pub exercise_count: i32,
    pub progress: Option<LessonProgress>,
}

/// 模块/课程进度汇总
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressSummary {
    pub total: i32,
    pub completed: i32,
    pub failed: i32,
    pub percentage: f64,
    pub is_completed: bool,
}

/// 单课分类结果
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LessonState {
    Completed,
    Failed,
    NotAttempted,
}

/// 评分结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scoring {
    pub score: f64,
    pub is_passed: bool,
    pub correct_answers: i32,
    pub total_questions: i32,
}

/// 练习提交结果：直接返回给调用方，不经过任何会话/闪存状态
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptOutcome {
    pub attempt_id: String,
    pub score: f64,
    pub is_passed: bool,
    pub correct_answers: i32,
    pub total_questions: i32,
    pub attempt_number: i32,
    pub progress: LessonProgress,
}

/// 单课分类：
/// - 已完成：进度行标记完成，或无练习且看过至少一次
/// - 未通过：有练习、有进度行、未完成且提交过
/// - 其余视为未开始
pub fn classify_lesson(snapshot: &LessonSnapshot) -> LessonState {
    let has_exercises = snapshot.exercise_count > 0;
    match &snapshot.progress {
        Some(progress) if progress.is_completed => LessonState::Completed,
        Some(progress) if !has_exercises && progress.views > 0 => LessonState::Completed,
        Some(progress) if has_exercises && progress.attempts > 0 => LessonState::Failed,
        _ => LessonState::NotAttempted,
    }
}

/// 模块/课程完成度；percentage 保留一位小数，空输入为 0
pub fn compute_progress(lessons: &[LessonSnapshot]) -> ProgressSummary {
    let total = lessons.len() as i32;
    let mut completed = 0;
    let mut failed = 0;

    for snapshot in lessons {
        match classify_lesson(snapshot) {
            LessonState::Completed => completed += 1,
            LessonState::Failed => failed += 1,
            LessonState::NotAttempted => {}
        }
    }

    let percentage = if total > 0 {
        (completed as f64 / total as f64 * 1000.0).round() / 10.0
    } else {
        0.0
    };

    ProgressSummary {
        total,
        completed,
        failed,
        percentage,
        is_completed: total > 0 && completed == total,
    }
}

/// 按选项顺序取每题第一个正确选项作为标准答案评分。
/// 没有正确选项的题目永远不得分；没有题目时得 0 分。
pub fn score_answers(
    questions: &[(Question, Vec<QuestionOption>)],
    answers: &HashMap<String, String>,
    passing_score: f64,
) -> Scoring {
    let total_questions = questions.len() as i32;
    let mut correct_answers = 0;

    for (question, options) in questions {
        let Some(selected) = answers.get(&question.id) else {
            continue;
        };
        if let Some(correct) = options.iter().find(|option| option.is_correct) {
            if *selected == correct.id {
                correct_answers += 1;
            }
        }
    }

    let score = if total_questions > 0 {
        correct_answers as f64 / total_questions as f64 * 100.0
    } else {
        0.0
    };

    Scoring {
        score,
        is_passed: score >= passing_score,
        correct_answers,
        total_questions,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(
        lesson_id: &str,
        exercise_count: i32,
        progress: Option<LessonProgress>,
    ) -> LessonSnapshot {
        LessonSnapshot {
            lesson_id: lesson_id.to_string(),
            exercise_count,
            progress,
        }
    }

    fn progress_row(
        lesson_id: &str,
        is_completed: bool,
        attempts: i32,
        views: i32,
    ) -> LessonProgress {
        LessonProgress {
            id: format!("progress-{lesson_id}"),
            user_id: "u1".to_string(),
            lesson_id: lesson_id.to_string(),
            is_completed,
            attempts,
            views,
            best_score: None,
            completed_at: None,
        }
    }

    fn question(id: &str, options: &[(&str, bool)]) -> (Question, Vec<QuestionOption>) {
        let question = Question {
            id: id.to_string(),
            exercise_id: "e1".to_string(),
            question_text: format!("题目 {id}"),
            question_type: "multiple_choice".to_string(),
            sort_order: 0,
        };
        let options = options
            .iter()
            .enumerate()
            .map(|(index, (option_id, is_correct))| QuestionOption {
                id: option_id.to_string(),
                question_id: id.to_string(),
                option_text: format!("选项 {option_id}"),
                is_correct: *is_correct,
                sort_order: index as i32,
            })
            .collect();
        (question, options)
    }

    #[test]
    fn test_two_of_five_lessons_completed() {
        let lessons = vec![
            snapshot("l1", 1, Some(progress_row("l1", true, 1, 1))),
            snapshot("l2", 1, Some(progress_row("l2", true, 2, 3))),
            snapshot("l3", 1, None),
            snapshot("l4", 0, None),
            snapshot("l5", 1, None),
        ];

        let summary = compute_progress(&lessons);
        assert_eq!(
            summary,
            ProgressSummary {
                total: 5,
                completed: 2,
                failed: 0,
                percentage: 40.0,
                is_completed: false,
            }
        );
    }

    #[test]
    fn test_all_lessons_completed() {
        let lessons = vec![
            snapshot("l1", 1, Some(progress_row("l1", true, 1, 1))),
            snapshot("l2", 0, Some(progress_row("l2", true, 0, 1))),
            snapshot("l3", 1, Some(progress_row("l3", true, 3, 2))),
        ];

        let summary = compute_progress(&lessons);
        assert_eq!(summary.percentage, 100.0);
        assert!(summary.is_completed);
    }

    #[test]
    fn test_empty_module_is_not_completed() {
        let summary = compute_progress(&[]);
        assert_eq!(summary.total, 0);
        assert_eq!(summary.percentage, 0.0);
        assert!(!summary.is_completed);
    }

    #[test]
    fn test_failed_lesson_classification() {
        // 有练习、提交过但未通过
        let failed = snapshot("l1", 1, Some(progress_row("l1", false, 2, 1)));
        assert_eq!(classify_lesson(&failed), LessonState::Failed);

        // 有练习、只看过没提交：未开始
        let viewed_only = snapshot("l2", 1, Some(progress_row("l2", false, 0, 4)));
        assert_eq!(classify_lesson(&viewed_only), LessonState::NotAttempted);

        // 无练习、看过即完成
        let no_exercises = snapshot("l3", 0, Some(progress_row("l3", false, 0, 1)));
        assert_eq!(classify_lesson(&no_exercises), LessonState::Completed);
    }

    #[test]
    fn test_failed_count_in_summary() {
        let lessons = vec![
            snapshot("l1", 1, Some(progress_row("l1", true, 1, 1))),
            snapshot("l2", 1, Some(progress_row("l2", false, 3, 1))),
            snapshot("l3", 1, None),
        ];

        let summary = compute_progress(&lessons);
        assert_eq!(summary.completed, 1);
        assert_eq!(summary.failed, 1);
    }

    #[test]
    fn test_percentage_rounds_to_one_decimal() {
        let lessons = vec![
            snapshot("l1", 0, Some(progress_row("l1", true, 0, 1))),
            snapshot("l2", 0, None),
            snapshot("l3", 0, None),
        ];

        let summary = compute_progress(&lessons);
        assert_eq!(summary.percentage, 33.3);
    }

    #[test]
    fn test_compute_progress_is_pure() {
        let lessons = vec![
            snapshot("l1", 1, Some(progress_row("l1", true, 1, 1))),
            snapshot("l2", 1, None),
        ];
        assert_eq!(compute_progress(&lessons), compute_progress(&lessons));
    }

    #[test]
    fn test_score_all_correct() {
        let questions = vec![
            question("q1", &[("o1", true), ("o2", false)]),
            question("q2", &[("o3", false), ("o4", true)]),
        ];
        let answers = HashMap::from([
            ("q1".to_string(), "o1".to_string()),
            ("q2".to_string(), "o4".to_string()),
        ]);

        let scoring = score_answers(&questions, &answers, 70.0);
        assert_eq!(scoring.score, 100.0);
        assert!(scoring.is_passed);
        assert_eq!(scoring.correct_answers, 2);
        assert_eq!(scoring.total_questions, 2);
    }

    #[test]
    fn test_score_half_correct_below_passing() {
        let questions = vec![
            question("q1", &[("o1", true), ("o2", false)]),
            question("q2", &[("o3", true), ("o4", false)]),
        ];
        let answers = HashMap::from([
            ("q1".to_string(), "o1".to_string()),
            ("q2".to_string(), "o4".to_string()),
        ]);

        let scoring = score_answers(&questions, &answers, 70.0);
        assert_eq!(scoring.score, 50.0);
        assert!(!scoring.is_passed);
    }

    #[test]
    fn test_question_without_correct_option_never_scores() {
        let questions = vec![question("q1", &[("o1", false), ("o2", false)])];
        let answers = HashMap::from([("q1".to_string(), "o1".to_string())]);

        let scoring = score_answers(&questions, &answers, 70.0);
        assert_eq!(scoring.correct_answers, 0);
        assert_eq!(scoring.score, 0.0);
    }

    #[test]
    fn test_first_correct_option_is_canonical() {
        // 两个都标了正确时，只认顺序上第一个
        let questions = vec![question("q1", &[("o1", true), ("o2", true)])];

        let first = HashMap::from([("q1".to_string(), "o1".to_string())]);
        assert_eq!(score_answers(&questions, &first, 70.0).correct_answers, 1);

        let second = HashMap::from([("q1".to_string(), "o2".to_string())]);
        assert_eq!(score_answers(&questions, &second, 70.0).correct_answers, 0);
    }

    #[test]
    fn test_zero_question_exercise_scores_zero() {
        let answers = HashMap::new();

        let scoring = score_answers(&[], &answers, 70.0);
        assert_eq!(scoring.score, 0.0);
        assert!(!scoring.is_passed);

        // 及格线为 0 时空练习也算通过
        assert!(score_answers(&[], &answers, 0.0).is_passed);
    }

    #[test]
    fn test_unanswered_question_counts_as_incorrect() {
        let questions = vec![
            question("q1", &[("o1", true)]),
            question("q2", &[("o2", true)]),
        ];
        let answers = HashMap::from([("q1".to_string(), "o1".to_string())]);

        let scoring = score_answers(&questions, &answers, 70.0);
        assert_eq!(scoring.correct_answers, 1);
        assert_eq!(scoring.score, 50.0);
    }
}
