//! Locations of the on-disk data directory and the files kept inside it.

use std::path::PathBuf;

pub const DATA_DIR_ENV: &str = "SAAS_BUILDER_DATA_DIR";
pub const DATABASE_PATH_ENV: &str = "DATABASE_PATH";

const DEFAULT_DATA_DIR: &str = "data";
const DATABASE_FILE: &str = "saas-builder.db";

pub const RESERVED_PAGE_RULES_FILE: &str = "reserved-page-rules.json";
pub const AI_CONTEXT_FILE: &str = "ai-context.json";
pub const LEGACY_AI_SETTINGS_FILE: &str = "ai-settings.json";

/// Directory holding the database and the prompt-construction JSON files.
pub fn data_dir() -> PathBuf {
    std::env::var_os(DATA_DIR_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR))
}

pub fn database_path() -> PathBuf {
    std::env::var_os(DATABASE_PATH_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| data_dir().join(DATABASE_FILE))
}
