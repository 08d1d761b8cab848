//! `SQLite` schema definitions for fortnightly.
//!
//! This module contains the SQL statements for creating and managing
//! the database schema.

/// SQL statement to create the questions table.
pub const CREATE_QUESTIONS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS questions (
    id TEXT PRIMARY KEY,
    created_at TEXT NOT NULL,
    question_text TEXT NOT NULL CHECK (length(trim(question_text)) > 0),
    context TEXT,
    tag TEXT NOT NULL CHECK (tag IN (
        'Operations', 'Compliance', 'Technology',
        'General', 'Fellows Program', 'Company Success'
    )),
    fortnight_id TEXT NOT NULL,
    votes INTEGER NOT NULL DEFAULT 0 CHECK (votes >= 0),
    is_answered INTEGER NOT NULL DEFAULT 0,
    answer TEXT
)
";

/// SQL statement to create the index backing the fortnight listing.
pub const CREATE_FORTNIGHT_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_questions_fortnight
ON questions(fortnight_id, votes DESC, created_at DESC)
";

/// SQL statement to create the metadata table for storing key-value pairs.
pub const CREATE_METADATA_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS metadata (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
)
";

/// All schema creation statements in order.
pub const SCHEMA_STATEMENTS: &[&str] = &[
    CREATE_QUESTIONS_TABLE,
    CREATE_FORTNIGHT_INDEX,
    CREATE_METADATA_TABLE,
];
