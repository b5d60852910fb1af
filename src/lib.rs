//! 在线课堂核心库
//! 课程内容转换（编辑器 JSON -> Markdown）与学习进度追踪

pub mod models;
pub mod services;
pub mod utils;

pub use models::{
    Course, Enrollment, Exercise, ExerciseAttempt, Lesson, LessonContent, LessonProgress,
    Module, ProgressStatus, Question, QuestionOption,
};
pub use services::{
    convert_editor_state, AttemptOutcome, DatabaseService, LessonSnapshot, OptionInput,
    ProgressSummary, QuestionInput,
};
