// 服务模块
// 提供核心业务逻辑服务

pub mod converter;
pub mod database;
pub mod progress;

pub use converter::{
    convert_document,
    convert_editor_state,
    lesson_content_from_editor_state,
    render_html,
    EditorNode,
    EditorState,
    LessonContentPayload,
};

pub use database::{
    DatabaseService,
    OptionInput,
    QuestionInput,
};

pub use progress::{
    classify_lesson,
    compute_progress,
    score_answers,
    AttemptOutcome,
    LessonSnapshot,
    LessonState,
    ProgressSummary,
    Scoring,
};
