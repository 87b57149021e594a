use crate::dialect::{Dialect, DialectKind};
use tracing::Level;

/// How compiled statements are logged.
#[derive(Debug, Clone)]
pub struct SqlLogConfig {
    /// Whether compiled statements are logged at all.
    pub enabled: bool,
    /// Tracing event level to emit at.
    pub level: Level,
    /// Truncate long SQL strings (in bytes, on a char boundary). `None` means no truncation.
    pub max_sql_length: Option<usize>,
}

impl Default for SqlLogConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            level: Level::DEBUG,
            max_sql_length: Some(200),
        }
    }
}

impl SqlLogConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    pub fn level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    pub fn max_sql_length(mut self, len: usize) -> Self {
        self.max_sql_length = Some(len);
        self
    }

    pub fn no_truncate(mut self) -> Self {
        self.max_sql_length = None;
        self
    }

    pub(crate) fn truncate<'a>(&self, sql: &'a str) -> std::borrow::Cow<'a, str> {
        match self.max_sql_length {
            Some(max) if sql.len() > max => {
                format!("{}...", truncate_sql_bytes(sql, max)).into()
            }
            _ => sql.into(),
        }
    }
}

fn truncate_sql_bytes(sql: &str, max_bytes: usize) -> &str {
    if sql.len() <= max_bytes {
        return sql;
    }
    let mut end = max_bytes;
    while end > 0 && !sql.is_char_boundary(end) {
        end -= 1;
    }
    &sql[..end]
}

/// Configuration for [`SqlBuilder`](crate::SqlBuilder).
#[derive(Debug, Clone)]
pub struct BuilderConfig {
    /// Target dialect.
    pub dialect: DialectKind,
    /// Largest page a paged select may request; larger windows are clamped.
    pub max_page_size: Option<i64>,
    /// Allow DELETE compiled from an empty query to remove every row.
    /// When false (the default) such a DELETE matches nothing.
    pub allow_delete_all: bool,
    /// Emit `SELECT *` instead of the explicit column list for single-table selects.
    pub select_star: bool,
    /// Statement logging.
    pub log: SqlLogConfig,
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self {
            dialect: DialectKind::Postgres,
            max_page_size: Some(1000),
            allow_delete_all: false,
            select_star: false,
            log: SqlLogConfig::default(),
        }
    }
}

impl BuilderConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dialect(mut self, dialect: DialectKind) -> Self {
        self.dialect = dialect;
        self
    }

    pub fn max_page_size(mut self, size: i64) -> Self {
        self.max_page_size = Some(size);
        self
    }

    pub fn unlimited_page_size(mut self) -> Self {
        self.max_page_size = None;
        self
    }

    pub fn allow_delete_all(mut self, allow: bool) -> Self {
        self.allow_delete_all = allow;
        self
    }

    pub fn select_star(mut self, enabled: bool) -> Self {
        self.select_star = enabled;
        self
    }

    pub fn log(mut self, log: SqlLogConfig) -> Self {
        self.log = log;
        self
    }

    pub(crate) fn dialect_impl(&self) -> &'static dyn Dialect {
        self.dialect.dialect()
    }
}
