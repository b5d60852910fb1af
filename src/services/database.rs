//! 数据库服务模块
//! 提供 SQLite 数据库操作，支持课程管理与学习进度追踪

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use chrono::Utc;
use log::info;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{
    Course, Enrollment, Exercise, ExerciseAttempt, Lesson, LessonContent, LessonProgress,
    Module, Question, QuestionOption,
};
use crate::services::converter::lesson_content_from_editor_state;
use crate::services::progress::{compute_progress, score_answers, AttemptOutcome, LessonSnapshot, ProgressSummary};

/// 每门课文的默认练习标题
const DEFAULT_EXERCISE_TITLE: &str = "Lesson Quiz";
/// 默认及格线（百分比）
const DEFAULT_PASSING_SCORE: f64 = 70.0;

/// 题目同步输入（编辑端传入）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionInput {
    pub id: Option<String>,
    pub question_text: String,
    pub options: Vec<OptionInput>,
}

/// 选项同步输入
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptionInput {
    pub id: Option<String>,
    pub option_text: String,
    pub is_correct: bool,
}

/// 数据库服务
pub struct DatabaseService {
    pool: Arc<Mutex<Connection>>,
}

impl DatabaseService {
    /// 在默认数据目录下创建数据库服务
    pub fn new() -> Result<Self> {
        let db_path = crate::utils::get_database_path();
        if let Some(parent) = db_path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }
        Self::open(db_path)
    }

    /// 打开指定路径的数据库
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_connection(Connection::open(path)?)
    }

    /// 内存数据库（测试用）
    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        let service = Self {
            pool: Arc::new(Mutex::new(conn)),
        };
        service.initialize()?;
        Ok(service)
    }

    /// 初始化数据库表结构
    pub fn initialize(&self) -> Result<()> {
        let conn = self.pool.lock().unwrap();

        // Enable WAL mode for better concurrency
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
        ",
        )?;

        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS courses (
                id TEXT PRIMARY KEY,
                teacher_id TEXT NOT NULL,
                language TEXT NOT NULL,
                title TEXT NOT NULL,
                description TEXT,
                level TEXT NOT NULL CHECK(level IN ('beginner', 'intermediate', 'advanced')),
                is_published INTEGER NOT NULL DEFAULT 0,
                sort_order INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS modules (
                id TEXT PRIMARY KEY,
                course_id TEXT NOT NULL,
                title TEXT NOT NULL,
                description TEXT,
                sort_order INTEGER NOT NULL DEFAULT 0,
                FOREIGN KEY (course_id) REFERENCES courses(id) ON DELETE CASCADE
            );

            CREATE TABLE IF NOT EXISTS lessons (
                id TEXT PRIMARY KEY,
                module_id TEXT NOT NULL,
                title TEXT NOT NULL,
                description TEXT,
                duration_minutes INTEGER,
                sort_order INTEGER NOT NULL DEFAULT 0,
                FOREIGN KEY (module_id) REFERENCES modules(id) ON DELETE CASCADE
            );

            CREATE TABLE IF NOT EXISTS lesson_contents (
                id TEXT PRIMARY KEY,
                lesson_id TEXT NOT NULL,
                content_type TEXT NOT NULL DEFAULT 'text',
                content TEXT NOT NULL,
                sort_order INTEGER NOT NULL DEFAULT 0,
                FOREIGN KEY (lesson_id) REFERENCES lessons(id) ON DELETE CASCADE
            );

            CREATE TABLE IF NOT EXISTS exercises (
                id TEXT PRIMARY KEY,
                lesson_id TEXT NOT NULL,
                title TEXT NOT NULL,
                instructions TEXT,
                passing_score REAL NOT NULL DEFAULT 70,
                sort_order INTEGER NOT NULL DEFAULT 0,
                FOREIGN KEY (lesson_id) REFERENCES lessons(id) ON DELETE CASCADE
            );

            CREATE TABLE IF NOT EXISTS questions (
                id TEXT PRIMARY KEY,
                exercise_id TEXT NOT NULL,
                question_text TEXT NOT NULL,
                question_type TEXT NOT NULL DEFAULT 'multiple_choice',
                sort_order INTEGER NOT NULL DEFAULT 0,
                FOREIGN KEY (exercise_id) REFERENCES exercises(id) ON DELETE CASCADE
            );

            CREATE TABLE IF NOT EXISTS question_options (
                id TEXT PRIMARY KEY,
                question_id TEXT NOT NULL,
                option_text TEXT NOT NULL,
                is_correct INTEGER NOT NULL DEFAULT 0,
                sort_order INTEGER NOT NULL DEFAULT 0,
                FOREIGN KEY (question_id) REFERENCES questions(id) ON DELETE CASCADE
            );

            CREATE TABLE IF NOT EXISTS lesson_progress (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                lesson_id TEXT NOT NULL,
                is_completed INTEGER NOT NULL DEFAULT 0,
                attempts INTEGER NOT NULL DEFAULT 0,
                views INTEGER NOT NULL DEFAULT 0,
                best_score REAL,
                completed_at TEXT,
                UNIQUE(user_id, lesson_id),
                FOREIGN KEY (lesson_id) REFERENCES lessons(id) ON DELETE CASCADE
            );

            CREATE TABLE IF NOT EXISTS exercise_attempts (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                exercise_id TEXT NOT NULL,
                score REAL NOT NULL,
                max_score REAL NOT NULL DEFAULT 100,
                is_passed INTEGER NOT NULL DEFAULT 0,
                answers TEXT NOT NULL,
                attempt_number INTEGER NOT NULL DEFAULT 1,
                created_at TEXT NOT NULL,
                FOREIGN KEY (exercise_id) REFERENCES exercises(id) ON DELETE CASCADE
            );

            CREATE TABLE IF NOT EXISTS enrollments (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                course_id TEXT NOT NULL,
                enrolled_at TEXT NOT NULL,
                progress_percentage REAL,
                last_accessed_at TEXT,
                completed_at TEXT,
                UNIQUE(user_id, course_id),
                FOREIGN KEY (course_id) REFERENCES courses(id) ON DELETE CASCADE
            );

            CREATE INDEX IF NOT EXISTS idx_modules_course ON modules(course_id);
            CREATE INDEX IF NOT EXISTS idx_lessons_module ON lessons(module_id);
            CREATE INDEX IF NOT EXISTS idx_contents_lesson ON lesson_contents(lesson_id);
            CREATE INDEX IF NOT EXISTS idx_exercises_lesson ON exercises(lesson_id);
            CREATE INDEX IF NOT EXISTS idx_questions_exercise ON questions(exercise_id);
            CREATE INDEX IF NOT EXISTS idx_options_question ON question_options(question_id);
            CREATE INDEX IF NOT EXISTS idx_attempts_user_exercise
                ON exercise_attempts(user_id, exercise_id, attempt_number);
            CREATE INDEX IF NOT EXISTS idx_enrollments_user ON enrollments(user_id);
        ",
        )?;

        info!("数据库初始化完成");
        Ok(())
    }

    // ==================== 课程管理 ====================

    /// 创建课程，排序号取该教师现有课程的最大值 + 1
    pub fn create_course(
        &self,
        teacher_id: &str,
        language: &str,
        title: &str,
        description: Option<&str>,
        level: &str,
    ) -> Result<String> {
        let conn = self.pool.lock().unwrap();
        let id = Uuid::new_v4().to_string();

        let next_order: i32 = conn.query_row(
            "SELECT COALESCE(MAX(sort_order), -1) + 1 FROM courses WHERE teacher_id = ?",
            [teacher_id],
            |row| row.get(0),
        )?;

        conn.execute(
            "INSERT INTO courses (id, teacher_id, language, title, description, level, is_published, sort_order, created_at)
             VALUES (?, ?, ?, ?, ?, ?, 0, ?, ?)",
            params![id, teacher_id, language, title, description, level, next_order, Utc::now()],
        )?;

        Ok(id)
    }

    /// 获取单门课程
    pub fn get_course(&self, id: &str) -> Result<Option<Course>> {
        let conn = self.pool.lock().unwrap();
        let course = conn
            .query_row(
                "SELECT id, teacher_id, language, title, description, level, is_published, sort_order, created_at
                 FROM courses WHERE id = ?",
                [id],
                Self::row_to_course,
            )
            .optional()?;
        Ok(course)
    }

    /// 创建模块，排序号在课程内递增
    pub fn create_module(
        &self,
        course_id: &str,
        title: &str,
        description: Option<&str>,
    ) -> Result<String> {
        let conn = self.pool.lock().unwrap();
        let id = Uuid::new_v4().to_string();

        let next_order: i32 = conn.query_row(
            "SELECT COALESCE(MAX(sort_order), -1) + 1 FROM modules WHERE course_id = ?",
            [course_id],
            |row| row.get(0),
        )?;

        conn.execute(
            "INSERT INTO modules (id, course_id, title, description, sort_order)
             VALUES (?, ?, ?, ?, ?)",
            params![id, course_id, title, description, next_order],
        )?;

        Ok(id)
    }

    /// 课程下的模块（按排序号）
    pub fn get_modules(&self, course_id: &str) -> Result<Vec<Module>> {
        let conn = self.pool.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, course_id, title, description, sort_order
             FROM modules WHERE course_id = ? ORDER BY sort_order",
        )?;
        let modules = stmt
            .query_map([course_id], Self::row_to_module)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(modules)
    }

    /// 创建课文，排序号在模块内递增
    pub fn create_lesson(
        &self,
        module_id: &str,
        title: &str,
        description: Option<&str>,
        duration_minutes: Option<i32>,
    ) -> Result<String> {
        let conn = self.pool.lock().unwrap();
        let id = Uuid::new_v4().to_string();

        let next_order: i32 = conn.query_row(
            "SELECT COALESCE(MAX(sort_order), -1) + 1 FROM lessons WHERE module_id = ?",
            [module_id],
            |row| row.get(0),
        )?;

        conn.execute(
            "INSERT INTO lessons (id, module_id, title, description, duration_minutes, sort_order)
             VALUES (?, ?, ?, ?, ?, ?)",
            params![id, module_id, title, description, duration_minutes, next_order],
        )?;

        Ok(id)
    }

    /// 模块下的课文（按排序号）
    pub fn get_lessons(&self, module_id: &str) -> Result<Vec<Lesson>> {
        let conn = self.pool.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, module_id, title, description, duration_minutes, sort_order
             FROM lessons WHERE module_id = ? ORDER BY sort_order",
        )?;
        let lessons = stmt
            .query_map([module_id], Self::row_to_lesson)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(lessons)
    }

    // ==================== 课文内容 ====================

    /// 用编辑器状态替换课文内容。
    /// 转换成功存 Markdown，失败回退为原始纯文本；空内容不留记录。
    pub fn sync_lesson_content(&self, lesson_id: &str, raw_editor_state: &str) -> Result<()> {
        let payload = lesson_content_from_editor_state(raw_editor_state);

        let mut conn = self.pool.lock().unwrap();
        let tx = conn.transaction()?;

        tx.execute(
            "DELETE FROM lesson_contents WHERE lesson_id = ?",
            [lesson_id],
        )?;

        if !payload.content.is_empty() {
            tx.execute(
                "INSERT INTO lesson_contents (id, lesson_id, content_type, content, sort_order)
                 VALUES (?, ?, ?, ?, 0)",
                params![
                    Uuid::new_v4().to_string(),
                    lesson_id,
                    payload.content_type,
                    payload.content
                ],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    /// 课文内容（按排序号）
    pub fn get_lesson_contents(&self, lesson_id: &str) -> Result<Vec<LessonContent>> {
        let conn = self.pool.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, lesson_id, content_type, content, sort_order
             FROM lesson_contents WHERE lesson_id = ? ORDER BY sort_order",
        )?;
        let contents = stmt
            .query_map([lesson_id], Self::row_to_lesson_content)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(contents)
    }

    // ==================== 练习与题目 ====================

    /// 同步课文默认练习的题目与选项。
    /// 带 id 的条目按 id 更新（id 不存在则跳过），不带 id 的新建，
    /// 本次未出现的题目/选项删除。返回练习 id。
    pub fn sync_questions(
        &self,
        lesson_id: &str,
        questions: &[QuestionInput],
        passing_score: Option<f64>,
    ) -> Result<String> {
        let mut conn = self.pool.lock().unwrap();
        let tx = conn.transaction()?;

        let existing: Option<String> = tx
            .query_row(
                "SELECT id FROM exercises WHERE lesson_id = ? AND title = ?",
                params![lesson_id, DEFAULT_EXERCISE_TITLE],
                |row| row.get(0),
            )
            .optional()?;

        let exercise_id = match existing {
            Some(id) => id,
            None => {
                let id = Uuid::new_v4().to_string();
                tx.execute(
                    "INSERT INTO exercises (id, lesson_id, title, instructions, passing_score, sort_order)
                     VALUES (?, ?, ?, ?, ?, 0)",
                    params![
                        id,
                        lesson_id,
                        DEFAULT_EXERCISE_TITLE,
                        "Answer the following questions",
                        passing_score.unwrap_or(DEFAULT_PASSING_SCORE)
                    ],
                )?;
                id
            }
        };

        if let Some(score) = passing_score {
            tx.execute(
                "UPDATE exercises SET passing_score = ? WHERE id = ?",
                params![score, exercise_id],
            )?;
        }

        let mut kept_question_ids: Vec<String> = Vec::new();

        for (index, input) in questions.iter().enumerate() {
            let question_id = match &input.id {
                Some(id) => {
                    let found: Option<String> = tx
                        .query_row(
                            "SELECT id FROM questions WHERE id = ? AND exercise_id = ?",
                            params![id, exercise_id],
                            |row| row.get(0),
                        )
                        .optional()?;
                    // 编辑端引用了不存在的题目时跳过整条
                    let Some(found) = found else { continue };
                    tx.execute(
                        "UPDATE questions SET question_text = ?, question_type = 'multiple_choice', sort_order = ?
                         WHERE id = ?",
                        params![input.question_text, index as i32, found],
                    )?;
                    found
                }
                None => {
                    let id = Uuid::new_v4().to_string();
                    tx.execute(
                        "INSERT INTO questions (id, exercise_id, question_text, question_type, sort_order)
                         VALUES (?, ?, ?, 'multiple_choice', ?)",
                        params![id, exercise_id, input.question_text, index as i32],
                    )?;
                    id
                }
            };
            kept_question_ids.push(question_id.clone());

            let mut kept_option_ids: Vec<String> = Vec::new();
            for (option_index, option) in input.options.iter().enumerate() {
                match &option.id {
                    Some(id) => {
                        let found: Option<String> = tx
                            .query_row(
                                "SELECT id FROM question_options WHERE id = ? AND question_id = ?",
                                params![id, question_id],
                                |row| row.get(0),
                            )
                            .optional()?;
                        if let Some(found) = found {
                            tx.execute(
                                "UPDATE question_options SET option_text = ?, is_correct = ?, sort_order = ?
                                 WHERE id = ?",
                                params![option.option_text, option.is_correct, option_index as i32, found],
                            )?;
                            kept_option_ids.push(found);
                        }
                    }
                    None => {
                        let id = Uuid::new_v4().to_string();
                        tx.execute(
                            "INSERT INTO question_options (id, question_id, option_text, is_correct, sort_order)
                             VALUES (?, ?, ?, ?, ?)",
                            params![id, question_id, option.option_text, option.is_correct, option_index as i32],
                        )?;
                        kept_option_ids.push(id);
                    }
                }
            }

            delete_missing(&tx, "question_options", "question_id", &question_id, &kept_option_ids)?;
        }

        delete_missing(&tx, "questions", "exercise_id", &exercise_id, &kept_question_ids)?;
        tx.commit()?;

        Ok(exercise_id)
    }

    /// 课文的默认练习
    pub fn get_default_exercise(&self, lesson_id: &str) -> Result<Option<Exercise>> {
        let conn = self.pool.lock().unwrap();
        let exercise = conn
            .query_row(
                "SELECT id, lesson_id, title, instructions, passing_score, sort_order
                 FROM exercises WHERE lesson_id = ? AND title = ?",
                params![lesson_id, DEFAULT_EXERCISE_TITLE],
                Self::row_to_exercise,
            )
            .optional()?;
        Ok(exercise)
    }

    /// 练习的题目及其选项（均按排序号）
    pub fn get_exercise_questions(
        &self,
        exercise_id: &str,
    ) -> Result<Vec<(Question, Vec<QuestionOption>)>> {
        let conn = self.pool.lock().unwrap();
        load_questions_with_options(&conn, exercise_id)
    }

    // ==================== 学习进度 ====================

    /// 记录一次课文浏览。每次调用计一次真实浏览（HTTP 重试去重是调用方的责任）。
    /// 无练习的课文首次浏览即完成；完成状态只升不降。
    pub fn record_view(&self, user_id: &str, lesson_id: &str) -> Result<LessonProgress> {
        let mut conn = self.pool.lock().unwrap();
        let tx = conn.transaction()?;

        let exercise_count: i32 = tx.query_row(
            "SELECT COUNT(*) FROM exercises WHERE lesson_id = ?",
            [lesson_id],
            |row| row.get(0),
        )?;

        let progress_id = find_or_create_progress(&tx, user_id, lesson_id)?;
        tx.execute(
            "UPDATE lesson_progress SET views = views + 1 WHERE id = ?",
            [&progress_id],
        )?;

        let views: i32 = tx.query_row(
            "SELECT views FROM lesson_progress WHERE id = ?",
            [&progress_id],
            |row| row.get(0),
        )?;

        if exercise_count == 0 && views == 1 {
            tx.execute(
                "UPDATE lesson_progress SET is_completed = 1, completed_at = ?
                 WHERE id = ? AND is_completed = 0",
                params![Utc::now(), progress_id],
            )?;
        }

        let progress = get_progress_row(&tx, &progress_id)?;
        tx.commit()?;
        Ok(progress)
    }

    /// 记录一次练习提交：评分、追加提交记录、推进课文进度。
    /// 整个读-改-写在同一事务内完成。
    pub fn record_attempt(
        &self,
        user_id: &str,
        exercise_id: &str,
        answers: &HashMap<String, String>,
    ) -> Result<AttemptOutcome> {
        let mut conn = self.pool.lock().unwrap();
        let tx = conn.transaction()?;

        let (lesson_id, passing_score): (String, f64) = tx
            .query_row(
                "SELECT lesson_id, passing_score FROM exercises WHERE id = ?",
                [exercise_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?
            .with_context(|| format!("练习不存在: {exercise_id}"))?;

        let questions = load_questions_with_options(&tx, exercise_id)?;
        let scoring = score_answers(&questions, answers, passing_score);

        let attempt_number: i32 = tx.query_row(
            "SELECT COALESCE(MAX(attempt_number), 0) + 1 FROM exercise_attempts
             WHERE user_id = ? AND exercise_id = ?",
            [user_id, exercise_id],
            |row| row.get(0),
        )?;

        let attempt_id = Uuid::new_v4().to_string();
        tx.execute(
            "INSERT INTO exercise_attempts
             (id, user_id, exercise_id, score, max_score, is_passed, answers, attempt_number, created_at)
             VALUES (?, ?, ?, ?, 100, ?, ?, ?, ?)",
            params![
                attempt_id,
                user_id,
                exercise_id,
                scoring.score,
                scoring.is_passed,
                serde_json::to_string(answers)?,
                attempt_number,
                Utc::now()
            ],
        )?;

        let progress_id = find_or_create_progress(&tx, user_id, &lesson_id)?;
        tx.execute(
            "UPDATE lesson_progress SET attempts = attempts + 1 WHERE id = ?",
            [&progress_id],
        )?;
        tx.execute(
            "UPDATE lesson_progress SET best_score = ?
             WHERE id = ? AND (best_score IS NULL OR best_score < ?)",
            params![scoring.score, progress_id, scoring.score],
        )?;
        if scoring.is_passed {
            tx.execute(
                "UPDATE lesson_progress SET is_completed = 1, completed_at = ?
                 WHERE id = ? AND is_completed = 0",
                params![Utc::now(), progress_id],
            )?;
        }

        let progress = get_progress_row(&tx, &progress_id)?;
        tx.commit()?;

        info!(
            "记录练习提交: user={} exercise={} score={:.1} passed={} attempt={}",
            user_id, exercise_id, scoring.score, scoring.is_passed, attempt_number
        );

        Ok(AttemptOutcome {
            attempt_id,
            score: scoring.score,
            is_passed: scoring.is_passed,
            correct_answers: scoring.correct_answers,
            total_questions: scoring.total_questions,
            attempt_number,
            progress,
        })
    }

    /// 用户在某课文上的进度行
    pub fn get_progress(&self, user_id: &str, lesson_id: &str) -> Result<Option<LessonProgress>> {
        let conn = self.pool.lock().unwrap();
        Ok(find_progress(&conn, user_id, lesson_id)?)
    }

    /// 用户在某练习上的全部提交记录（按提交序号）
    pub fn get_attempts(&self, user_id: &str, exercise_id: &str) -> Result<Vec<ExerciseAttempt>> {
        let conn = self.pool.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, user_id, exercise_id, score, max_score, is_passed, answers, attempt_number, created_at
             FROM exercise_attempts WHERE user_id = ? AND exercise_id = ?
             ORDER BY attempt_number",
        )?;
        let attempts = stmt
            .query_map([user_id, exercise_id], Self::row_to_attempt)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(attempts)
    }

    /// 模块完成度汇总
    pub fn module_progress(&self, user_id: &str, module_id: &str) -> Result<ProgressSummary> {
        let conn = self.pool.lock().unwrap();
        let snapshots = load_snapshots(
            &conn,
            "SELECT l.id, (SELECT COUNT(*) FROM exercises e WHERE e.lesson_id = l.id)
             FROM lessons l WHERE l.module_id = ? ORDER BY l.sort_order",
            module_id,
            user_id,
        )?;
        Ok(compute_progress(&snapshots))
    }

    /// 课程完成度汇总（跨全部模块）
    pub fn course_progress(&self, user_id: &str, course_id: &str) -> Result<ProgressSummary> {
        let conn = self.pool.lock().unwrap();
        let snapshots = load_snapshots(
            &conn,
            "SELECT l.id, (SELECT COUNT(*) FROM exercises e WHERE e.lesson_id = l.id)
             FROM lessons l JOIN modules m ON m.id = l.module_id
             WHERE m.course_id = ? ORDER BY m.sort_order, l.sort_order",
            course_id,
            user_id,
        )?;
        Ok(compute_progress(&snapshots))
    }

    // ==================== 选课 ====================

    /// 选课（已选过则不重复），返回是否新建了记录
    pub fn enroll(&self, user_id: &str, course_id: &str) -> Result<bool> {
        let conn = self.pool.lock().unwrap();
        let inserted = conn.execute(
            "INSERT INTO enrollments (id, user_id, course_id, enrolled_at)
             VALUES (?, ?, ?, ?)
             ON CONFLICT(user_id, course_id) DO NOTHING",
            params![Uuid::new_v4().to_string(), user_id, course_id, Utc::now()],
        )?;
        Ok(inserted > 0)
    }

    /// 用户在某课程上的选课记录
    pub fn get_enrollment(&self, user_id: &str, course_id: &str) -> Result<Option<Enrollment>> {
        let conn = self.pool.lock().unwrap();
        let enrollment = conn
            .query_row(
                "SELECT id, user_id, course_id, enrolled_at, progress_percentage, last_accessed_at, completed_at
                 FROM enrollments WHERE user_id = ? AND course_id = ?",
                [user_id, course_id],
                Self::row_to_enrollment,
            )
            .optional()?;
        Ok(enrollment)
    }

    // ==================== 辅助方法 ====================

    fn row_to_course(row: &Row) -> rusqlite::Result<Course> {
        Ok(Course {
            id: row.get(0)?,
            teacher_id: row.get(1)?,
            language: row.get(2)?,
            title: row.get(3)?,
            description: row.get(4)?,
            level: row.get(5)?,
            is_published: row.get(6)?,
            sort_order: row.get(7)?,
            created_at: row.get(8)?,
        })
    }

    fn row_to_module(row: &Row) -> rusqlite::Result<Module> {
        Ok(Module {
            id: row.get(0)?,
            course_id: row.get(1)?,
            title: row.get(2)?,
            description: row.get(3)?,
            sort_order: row.get(4)?,
        })
    }

    fn row_to_lesson(row: &Row) -> rusqlite::Result<Lesson> {
        Ok(Lesson {
            id: row.get(0)?,
            module_id: row.get(1)?,
            title: row.get(2)?,
            description: row.get(3)?,
            duration_minutes: row.get(4)?,
            sort_order: row.get(5)?,
        })
    }

    fn row_to_lesson_content(row: &Row) -> rusqlite::Result<LessonContent> {
        Ok(LessonContent {
            id: row.get(0)?,
            lesson_id: row.get(1)?,
            content_type: row.get(2)?,
            content: row.get(3)?,
            sort_order: row.get(4)?,
        })
    }

    fn row_to_exercise(row: &Row) -> rusqlite::Result<Exercise> {
        Ok(Exercise {
            id: row.get(0)?,
            lesson_id: row.get(1)?,
            title: row.get(2)?,
            instructions: row.get(3)?,
            passing_score: row.get(4)?,
            sort_order: row.get(5)?,
        })
    }

    fn row_to_attempt(row: &Row) -> rusqlite::Result<ExerciseAttempt> {
        Ok(ExerciseAttempt {
            id: row.get(0)?,
            user_id: row.get(1)?,
            exercise_id: row.get(2)?,
            score: row.get(3)?,
            max_score: row.get(4)?,
            is_passed: row.get(5)?,
            answers: row.get(6)?,
            attempt_number: row.get(7)?,
            created_at: row.get(8)?,
        })
    }

    fn row_to_enrollment(row: &Row) -> rusqlite::Result<Enrollment> {
        Ok(Enrollment {
            id: row.get(0)?,
            user_id: row.get(1)?,
            course_id: row.get(2)?,
            enrolled_at: row.get(3)?,
            progress_percentage: row.get(4)?,
            last_accessed_at: row.get(5)?,
            completed_at: row.get(6)?,
        })
    }
}

fn row_to_lesson_progress(row: &Row) -> rusqlite::Result<LessonProgress> {
    Ok(LessonProgress {
        id: row.get(0)?,
        user_id: row.get(1)?,
        lesson_id: row.get(2)?,
        is_completed: row.get(3)?,
        attempts: row.get(4)?,
        views: row.get(5)?,
        best_score: row.get(6)?,
        completed_at: row.get(7)?,
    })
}

const PROGRESS_COLUMNS: &str =
    "id, user_id, lesson_id, is_completed, attempts, views, best_score, completed_at";

fn find_progress(
    conn: &Connection,
    user_id: &str,
    lesson_id: &str,
) -> rusqlite::Result<Option<LessonProgress>> {
    conn.query_row(
        &format!("SELECT {PROGRESS_COLUMNS} FROM lesson_progress WHERE user_id = ? AND lesson_id = ?"),
        [user_id, lesson_id],
        row_to_lesson_progress,
    )
    .optional()
}

fn get_progress_row(conn: &Connection, progress_id: &str) -> rusqlite::Result<LessonProgress> {
    conn.query_row(
        &format!("SELECT {PROGRESS_COLUMNS} FROM lesson_progress WHERE id = ?"),
        [progress_id],
        row_to_lesson_progress,
    )
}

/// 进度行的 find-or-create，返回行 id
fn find_or_create_progress(
    conn: &Connection,
    user_id: &str,
    lesson_id: &str,
) -> rusqlite::Result<String> {
    let existing: Option<String> = conn
        .query_row(
            "SELECT id FROM lesson_progress WHERE user_id = ? AND lesson_id = ?",
            [user_id, lesson_id],
            |row| row.get(0),
        )
        .optional()?;

    if let Some(id) = existing {
        return Ok(id);
    }

    let id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO lesson_progress (id, user_id, lesson_id, is_completed, attempts, views)
         VALUES (?, ?, ?, 0, 0, 0)",
        params![id, user_id, lesson_id],
    )?;
    Ok(id)
}

fn load_questions_with_options(
    conn: &Connection,
    exercise_id: &str,
) -> Result<Vec<(Question, Vec<QuestionOption>)>> {
    let mut question_stmt = conn.prepare(
        "SELECT id, exercise_id, question_text, question_type, sort_order
         FROM questions WHERE exercise_id = ? ORDER BY sort_order",
    )?;
    let questions = question_stmt
        .query_map([exercise_id], |row| {
            Ok(Question {
                id: row.get(0)?,
                exercise_id: row.get(1)?,
                question_text: row.get(2)?,
                question_type: row.get(3)?,
                sort_order: row.get(4)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    let mut option_stmt = conn.prepare(
        "SELECT id, question_id, option_text, is_correct, sort_order
         FROM question_options WHERE question_id = ? ORDER BY sort_order",
    )?;

    let mut result = Vec::with_capacity(questions.len());
    for question in questions {
        let options = option_stmt
            .query_map([&question.id], |row| {
                Ok(QuestionOption {
                    id: row.get(0)?,
                    question_id: row.get(1)?,
                    option_text: row.get(2)?,
                    is_correct: row.get(3)?,
                    sort_order: row.get(4)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        result.push((question, options));
    }

    Ok(result)
}

fn load_snapshots(
    conn: &Connection,
    sql: &str,
    scope_id: &str,
    user_id: &str,
) -> Result<Vec<LessonSnapshot>> {
    let mut stmt = conn.prepare(sql)?;
    let lessons = stmt
        .query_map([scope_id], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i32>(1)?))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    let mut snapshots = Vec::with_capacity(lessons.len());
    for (lesson_id, exercise_count) in lessons {
        let progress = find_progress(conn, user_id, &lesson_id)?;
        snapshots.push(LessonSnapshot {
            lesson_id,
            exercise_count,
            progress,
        });
    }
    Ok(snapshots)
}

/// 删除父级下不在保留列表里的行
fn delete_missing(
    conn: &Connection,
    table: &str,
    parent_column: &str,
    parent_id: &str,
    kept_ids: &[String],
) -> rusqlite::Result<()> {
    if kept_ids.is_empty() {
        conn.execute(
            &format!("DELETE FROM {table} WHERE {parent_column} = ?"),
            [parent_id],
        )?;
        return Ok(());
    }

    let placeholders = vec!["?"; kept_ids.len()].join(", ");
    let sql = format!(
        "DELETE FROM {table} WHERE {parent_column} = ? AND id NOT IN ({placeholders})"
    );

    let mut bind: Vec<&dyn rusqlite::ToSql> = Vec::with_capacity(kept_ids.len() + 1);
    bind.push(&parent_id);
    for id in kept_ids {
        bind.push(id);
    }
    conn.execute(&sql, bind.as_slice())?;
    Ok(())
}
