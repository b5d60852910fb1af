use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 课程
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Course {
    pub id: String,
    pub teacher_id: String,
    pub language: String,
    pub title: String,
    pub description: Option<String>,
    pub level: String, // "beginner" | "intermediate" | "advanced"
    pub is_published: bool,
    pub sort_order: i32,
    pub created_at: DateTime<Utc>,
}

/// 模块：课程内有序的课文分组
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Module {
    pub id: String,
    pub course_id: String,
    pub title: String,
    pub description: Option<String>,
    pub sort_order: i32,
}

/// 课文
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lesson {
    pub id: String,
    pub module_id: String,
    pub title: String,
    pub description: Option<String>,
    pub duration_minutes: Option<i32>,
    pub sort_order: i32,
}

/// 课文正文内容
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LessonContent {
    pub id: String,
    pub lesson_id: String,
    pub content_type: String,
    pub content: String,
    pub sort_order: i32,
}

/// 练习：挂在课文下的选择题集合
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exercise {
    pub id: String,
    pub lesson_id: String,
    pub title: String,
    pub instructions: Option<String>,
    pub passing_score: f64,
    pub sort_order: i32,
}

/// 题目
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: String,
    pub exercise_id: String,
    pub question_text: String,
    pub question_type: String,
    pub sort_order: i32,
}

/// 题目选项
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionOption {
    pub id: String,
    pub question_id: String,
    pub option_text: String,
    pub is_correct: bool,
    pub sort_order: i32,
}

/// 每 (用户, 课文) 一行的进度记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LessonProgress {
    pub id: String,
    pub user_id: String,
    pub lesson_id: String,
    pub is_completed: bool,
    pub attempts: i32,
    pub views: i32,
    pub best_score: Option<f64>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// 练习提交记录（追加写，创建后不可变）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExerciseAttempt {
    pub id: String,
    pub user_id: String,
    pub exercise_id: String,
    pub score: f64,
    pub max_score: f64,
    pub is_passed: bool,
    pub answers: String, // JSON 序列化：question_id -> option_id
    pub attempt_number: i32,
    pub created_at: DateTime<Utc>,
}

/// 选课记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Enrollment {
    pub id: String,
    pub user_id: String,
    pub course_id: String,
    pub enrolled_at: DateTime<Utc>,
    pub progress_percentage: Option<f64>,
    pub last_accessed_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// 单课进度状态机：NotStarted -> Viewed -> Completed（终态）
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub enum ProgressStatus {
    NotStarted,
    Viewed,
    Completed,
}

impl ProgressStatus {
    /// 从进度行推导状态；行不存在即未开始
    pub fn from_row(row: Option<&LessonProgress>) -> Self {
        match row {
            None => ProgressStatus::NotStarted,
            Some(progress) if progress.is_completed => ProgressStatus::Completed,
            Some(_) => ProgressStatus::Viewed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_status_from_row() {
        assert_eq!(ProgressStatus::from_row(None), ProgressStatus::NotStarted);

        let mut progress = LessonProgress {
            id: "p1".to_string(),
            user_id: "u1".to_string(),
            lesson_id: "l1".to_string(),
            is_completed: false,
            attempts: 0,
            views: 1,
            best_score: None,
            completed_at: None,
        };
        assert_eq!(
            ProgressStatus::from_row(Some(&progress)),
            ProgressStatus::Viewed
        );

        progress.is_completed = true;
        assert_eq!(
            ProgressStatus::from_row(Some(&progress)),
            ProgressStatus::Completed
        );
    }
}
