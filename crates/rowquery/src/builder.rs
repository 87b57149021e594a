//! SQL compiler.
//!
//! [`SqlBuilder`] turns a [`Query`] or [`JoinQuery`] plus an [`OrderBy`] and a
//! [`Pagination`] window into a [`QueryData`]: statement text with named
//! parameter slots and the bound values. It holds no mutable state; every call
//! starts a fresh [`CompileContext`], so parameter names are unique within a
//! statement and identical across repeated compilations.
//!
//! Restriction payloads only ever reach SQL as bound parameters. Table and
//! column names come from row metadata, never from caller strings.
//!
//! ```ignore
//! use rowquery::{OrderBy, Pagination, Query, SqlBuilder};
//!
//! let builder = SqlBuilder::postgres();
//! let data = builder.select(
//!     &Query::<Person>::new().between(Person::AGE, 18, 65)?,
//!     &OrderBy::new().asc(Person::LAST_NAME),
//!     Pagination::page(1, 20)?,
//! )?;
//! // SELECT id, ... FROM people WHERE age BETWEEN :age_1 AND :age_2
//! //   ORDER BY last_name ASC LIMIT :limit_3 OFFSET :offset_4
//! if let Some(page) = data.short_circuit::<Person>() {
//!     return Ok(page);
//! }
//! let stmt = data.render(builder.dialect())?;
//! let rows = client.query(stmt.sql(), &stmt.params_ref()).await?;
//! ```

mod joined;
mod where_clause;

#[cfg(test)]
mod tests;

use tracing::{Level, debug, warn};

use crate::config::BuilderConfig;
use crate::dialect::Dialect;
use crate::error::{QueryError, QueryResult};
use crate::ident::write_column;
use crate::join::JoinQuery;
use crate::order::OrderBy;
use crate::pagination::{Page, Pagination};
use crate::param::{ParamIdxIncrementer, Params};
use crate::query::{Conditions, Query};
use crate::schema::{RowMeta, RowType};
use crate::sql::{SqlText, Statement};
use crate::value::Value;

/// Parameter naming and binding for one compilation.
#[derive(Debug)]
pub struct CompileContext {
    idx: ParamIdxIncrementer,
    params: Params,
    dialect: &'static dyn Dialect,
}

impl CompileContext {
    pub fn new(dialect: &'static dyn Dialect) -> Self {
        Self {
            idx: ParamIdxIncrementer::new(),
            params: Params::new(),
            dialect,
        }
    }

    /// Bind `value` under a fresh name derived from `base`; returns the name.
    pub fn bind(&mut self, base: &str, value: Value) -> String {
        let name = self.idx.next_name(base);
        self.params.insert(name.clone(), value);
        name
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn dialect(&self) -> &'static dyn Dialect {
        self.dialect
    }

    pub fn into_params(self) -> Params {
        self.params
    }
}

/// The FROM + WHERE fragment shared by a select and its COUNT companion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FromAndWhere {
    from: SqlText,
    conditions: Vec<SqlText>,
    params: Params,
    predicts_empty: bool,
}

impl FromAndWhere {
    /// FROM clause body (tables and joins, without the keyword).
    pub fn from_clause(&self) -> &SqlText {
        &self.from
    }

    /// Conjunctive WHERE conditions, in compile order.
    pub fn conditions(&self) -> &[SqlText] {
        &self.conditions
    }

    /// WHERE clause body, or `None` if nothing restricts the rows.
    pub fn where_clause(&self) -> Option<SqlText> {
        if self.conditions.is_empty() {
            return None;
        }
        let mut out = SqlText::empty();
        out.push_joined(&self.conditions, " AND ");
        Some(out)
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn predicts_empty_result(&self) -> bool {
        self.predicts_empty
    }

    /// `FROM ... [WHERE ...]` with named placeholders.
    pub fn to_sql(&self) -> String {
        let mut out = SqlText::empty();
        self.append_to(&mut out);
        out.to_named().trim_start().to_string()
    }

    fn append_to(&self, out: &mut SqlText) {
        out.push(" FROM ").push_text(&self.from);
        if let Some(where_clause) = self.where_clause() {
            out.push(" WHERE ").push_text(&where_clause);
        }
    }
}

/// A compiled statement with its bound parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryData {
    statement: SqlText,
    params: Params,
    scope: Option<FromAndWhere>,
    count: Option<Box<QueryData>>,
    pagination: Pagination,
    predicts_empty: bool,
}

impl QueryData {
    fn new(statement: SqlText, params: Params, predicts_empty: bool) -> Self {
        Self {
            statement,
            params,
            scope: None,
            count: None,
            pagination: Pagination::default(),
            predicts_empty,
        }
    }

    /// Statement text with `:name` placeholders.
    pub fn sql(&self) -> String {
        self.statement.to_named()
    }

    pub fn statement(&self) -> &SqlText {
        &self.statement
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    /// The FROM/WHERE fragment this statement was built from, if any.
    pub fn from_and_where(&self) -> Option<&FromAndWhere> {
        self.scope.as_ref()
    }

    /// COUNT companion of a paged select.
    pub fn count_query(&self) -> Option<&QueryData> {
        self.count.as_deref()
    }

    pub fn pagination(&self) -> Pagination {
        self.pagination
    }

    /// Returns `true` if the statement cannot match any row.
    pub fn predicts_empty_result(&self) -> bool {
        self.predicts_empty
    }

    /// An empty page when no database round trip is needed.
    pub fn short_circuit<T>(&self) -> Option<Page<T>> {
        if !self.predicts_empty {
            return None;
        }
        debug!(sql = %self.sql(), "short-circuiting statement predicted to match no rows");
        Some(Page::empty(self.pagination))
    }

    /// Render with the dialect's positional placeholders.
    pub fn render(&self, dialect: &dyn Dialect) -> QueryResult<Statement> {
        self.statement
            .render(dialect.placeholder_style(), &self.params)
    }
}

/// Dispatch a tracing event at a runtime-determined level.
macro_rules! emit_at_level {
    ($level:expr, $($field:tt)*) => {
        match $level {
            Level::ERROR => tracing::error!($($field)*),
            Level::WARN => tracing::warn!($($field)*),
            Level::INFO => tracing::info!($($field)*),
            Level::DEBUG => tracing::debug!($($field)*),
            Level::TRACE => tracing::trace!($($field)*),
        }
    };
}

/// Stateless SQL compiler.
#[derive(Debug, Clone, Default)]
pub struct SqlBuilder {
    config: BuilderConfig,
}

impl SqlBuilder {
    pub fn new(config: BuilderConfig) -> Self {
        Self { config }
    }

    /// Builder for PostgreSQL with default settings.
    pub fn postgres() -> Self {
        Self::default()
    }

    pub fn config(&self) -> &BuilderConfig {
        &self.config
    }

    pub fn dialect(&self) -> &'static dyn Dialect {
        self.config.dialect_impl()
    }

    /// Fresh per-statement compilation state.
    pub fn context(&self) -> CompileContext {
        CompileContext::new(self.dialect())
    }

    fn log(&self, op: &'static str, data: &QueryData) {
        let log = &self.config.log;
        if !log.enabled {
            return;
        }
        let sql = data.sql();
        let sql = log.truncate(&sql);
        emit_at_level!(
            log.level,
            target: "rowquery.sql",
            op,
            dialect = ?self.config.dialect,
            param_count = data.params.len(),
            predicts_empty = data.predicts_empty,
            sql = %sql,
        );
    }

    fn finish(&self, op: &'static str, data: QueryData) -> QueryData {
        self.log(op, &data);
        data
    }

    fn clamp(&self, mut pagination: Pagination) -> Pagination {
        if let Some(max) = self.config.max_page_size {
            let requested = pagination.limit;
            if pagination.clamp(max) {
                warn!(requested = ?requested, max, "page size clamped to max_page_size");
            }
        }
        pagination
    }

    // ==================== Single-row statements ====================

    /// `SELECT <columns> FROM <table> WHERE <id> = :id_1`
    pub fn find_by_id<R: RowType>(&self, id: impl Into<Value>) -> QueryResult<QueryData> {
        let meta = checked_meta::<R>()?;
        let mut ctx = self.context();
        let mut sql = SqlText::new("SELECT ");
        self.append_select_list(&mut sql, meta);
        sql.push(" FROM ").push(meta.table);
        self.append_id_guard(&mut ctx, &mut sql, meta, id.into());
        Ok(self.finish("find_by_id", QueryData::new(sql, ctx.into_params(), false)))
    }

    /// `DELETE FROM <table> WHERE <id> = :id_1`
    pub fn delete_by_id<R: RowType>(&self, id: impl Into<Value>) -> QueryResult<QueryData> {
        let meta = checked_meta::<R>()?;
        let mut ctx = self.context();
        let mut sql = SqlText::new("DELETE FROM ");
        sql.push(meta.table);
        self.append_id_guard(&mut ctx, &mut sql, meta, id.into());
        Ok(self.finish("delete_by_id", QueryData::new(sql, ctx.into_params(), false)))
    }

    /// Delete by identifier, guarded by the modification timestamp the caller
    /// last read. Zero affected rows means a concurrent modification.
    ///
    /// Fails with [`QueryError::Unsupported`] if the row type declares no
    /// modification column.
    pub fn delete_by_id_optimistic<R: RowType>(
        &self,
        id: impl Into<Value>,
        last_modified_at: impl Into<Value>,
    ) -> QueryResult<QueryData> {
        let meta = checked_meta::<R>()?;
        let Some(modified_at) = meta.modified_at else {
            return Err(QueryError::Unsupported(format!(
                "'{}' has no modification timestamp column",
                meta.table
            )));
        };
        let mut ctx = self.context();
        let mut sql = SqlText::new("DELETE FROM ");
        sql.push(meta.table);
        self.append_id_guard(&mut ctx, &mut sql, meta, id.into());
        let name = ctx.bind(modified_at, last_modified_at.into());
        sql.push(" AND ").push(modified_at).push(" = ").push_param(name);
        Ok(self.finish(
            "delete_by_id_optimistic",
            QueryData::new(sql, ctx.into_params(), false),
        ))
    }

    fn append_id_guard(
        &self,
        ctx: &mut CompileContext,
        sql: &mut SqlText,
        meta: &RowMeta,
        id: Value,
    ) {
        let name = ctx.bind(meta.id, id);
        sql.push(" WHERE ").push(meta.id).push(" = ").push_param(name);
    }

    // ==================== FROM / WHERE ====================

    /// Compile the FROM + WHERE fragment for row type `R`.
    ///
    /// `None` (or an empty query) yields no WHERE clause at all.
    pub fn from_and_where<R: RowType>(
        &self,
        query: Option<&Query<R>>,
    ) -> QueryResult<FromAndWhere> {
        let mut ctx = self.context();
        self.checked_scope(&mut ctx, query)
    }

    /// Compile the FROM + WHERE fragment of a join graph.
    pub fn from_and_where_joined(&self, query: &JoinQuery) -> FromAndWhere {
        let mut ctx = self.context();
        self.joined_scope(&mut ctx, query)
    }

    fn checked_scope<R: RowType>(
        &self,
        ctx: &mut CompileContext,
        query: Option<&Query<R>>,
    ) -> QueryResult<FromAndWhere> {
        let meta = checked_meta::<R>()?;
        let conditions = query.map(Query::conditions);
        if let Some(conditions) = conditions {
            conditions.check_columns(meta)?;
        }
        Ok(self.simple_scope(ctx, meta, conditions))
    }

    fn simple_scope(
        &self,
        ctx: &mut CompileContext,
        meta: &RowMeta,
        conditions: Option<&Conditions>,
    ) -> FromAndWhere {
        let mut where_clause = Vec::new();
        let mut predicts_empty = false;
        if let Some(conditions) = conditions {
            self.append_conditions(ctx, meta, None, conditions, &mut where_clause);
            predicts_empty = conditions.predicts_empty_result();
        }
        FromAndWhere {
            from: SqlText::new(meta.table),
            conditions: where_clause,
            params: ctx.params().clone(),
            predicts_empty,
        }
    }

    /// Append ` FROM <from clause>`.
    pub fn append_from_clause(&self, out: &mut SqlText, from_and_where: &FromAndWhere) {
        out.push(" FROM ").push_text(from_and_where.from_clause());
    }

    /// Append one WHERE condition per restriction of `query`, columns qualified
    /// with `alias` when given. Returns whether anything was appended.
    pub fn append_field_conditions_to_where_clause<R: RowType>(
        &self,
        ctx: &mut CompileContext,
        alias: Option<&str>,
        query: &Query<R>,
        where_clause: &mut Vec<SqlText>,
    ) -> QueryResult<bool> {
        let meta = checked_meta::<R>()?;
        query.conditions().check_columns(meta)?;
        Ok(self.append_conditions(ctx, meta, alias, query.conditions(), where_clause))
    }

    fn append_conditions(
        &self,
        ctx: &mut CompileContext,
        meta: &RowMeta,
        alias: Option<&str>,
        conditions: &Conditions,
        where_clause: &mut Vec<SqlText>,
    ) -> bool {
        let before = where_clause.len();
        for (column, restrictions) in conditions.fields() {
            let nullable = meta.column(column).is_none_or(|c| c.nullable);
            for r in restrictions {
                if let Some(cond) = ctx.restriction(alias, column, nullable, r) {
                    where_clause.push(cond);
                }
            }
        }
        where_clause.len() > before
    }

    /// Append ` ORDER BY ...` (nothing for an empty OrderBy). With a join
    /// graph, columns are qualified with the alias of their row type's node.
    pub fn append_order_by(
        &self,
        out: &mut SqlText,
        order: &OrderBy,
        join: Option<&JoinQuery>,
    ) -> QueryResult<()> {
        match join {
            None => order.append_clause(out, self.dialect(), &|_| Ok(None)),
            Some(jq) => order.append_clause(out, self.dialect(), &|item| {
                let node = jq
                    .selected_nodes()
                    .find(|n| n.meta().table == item.table())
                    .ok_or_else(|| {
                        QueryError::invalid_argument(format!(
                            "cannot order by '{}.{}': table is not selected by the join",
                            item.table(),
                            item.column()
                        ))
                    })?;
                node.meta().check_column(item.column())?;
                Ok(Some(node.alias().to_string()))
            }),
        }
    }

    fn append_select_list(&self, sql: &mut SqlText, meta: &RowMeta) {
        if self.config.select_star {
            sql.push("*");
            return;
        }
        let columns: Vec<&str> = meta.columns.iter().map(|c| c.name).collect();
        sql.push(&columns.join(", "));
    }

    fn append_paging(&self, ctx: &mut CompileContext, sql: &mut SqlText, pagination: Pagination) {
        let limit = pagination
            .limit
            .map(|n| ctx.bind("limit", Value::Int(n)));
        let offset = pagination
            .offset
            .map(|n| ctx.bind("offset", Value::Int(n)));
        self.dialect()
            .append_limit_offset(sql, limit.as_deref(), offset.as_deref());
    }

    // ==================== SELECT / COUNT ====================

    /// Paged select. When `pagination` is set, the result carries a COUNT
    /// companion over the same FROM/WHERE.
    pub fn select<R: RowType>(
        &self,
        query: &Query<R>,
        order: &OrderBy,
        pagination: Pagination,
    ) -> QueryResult<QueryData> {
        pagination.validate()?;
        let meta = checked_meta::<R>()?;
        order.check_columns(meta)?;
        let pagination = self.clamp(pagination);

        let mut ctx = self.context();
        let scope = self.checked_scope(&mut ctx, Some(query))?;

        let mut sql = SqlText::new("SELECT ");
        self.append_select_list(&mut sql, meta);
        scope.append_to(&mut sql);
        self.append_order_by(&mut sql, order, None)?;
        self.append_paging(&mut ctx, &mut sql, pagination);

        let count = (!pagination.is_empty()).then(|| Box::new(self.count_from(&scope)));
        let data = QueryData {
            predicts_empty: scope.predicts_empty,
            statement: sql,
            params: ctx.into_params(),
            scope: Some(scope),
            count,
            pagination,
        };
        Ok(self.finish("select", data))
    }

    /// Unpaged select of every matching row.
    pub fn select_all<R: RowType>(
        &self,
        query: &Query<R>,
        order: &OrderBy,
    ) -> QueryResult<QueryData> {
        self.select(query, order, Pagination::new())
    }

    /// `SELECT COUNT(*)` over the rows `query` selects.
    pub fn count_for_simple_select<R: RowType>(
        &self,
        query: Option<&Query<R>>,
    ) -> QueryResult<QueryData> {
        let scope = self.from_and_where(query)?;
        Ok(self.finish("count", self.count_from(&scope)))
    }

    /// `SELECT COUNT(*)` over the rows a joined select returns.
    pub fn count_for_joined_query(&self, query: &JoinQuery) -> QueryData {
        let scope = self.from_and_where_joined(query);
        self.finish("joined_count", self.count_from(&scope))
    }

    /// The COUNT companion of a select built by this builder.
    pub fn query_for_count_after_paged_select(&self, data: &QueryData) -> QueryResult<QueryData> {
        let scope = data.from_and_where().ok_or_else(|| {
            QueryError::Unsupported("statement has no FROM/WHERE scope to count".to_string())
        })?;
        Ok(self.finish("count", self.count_from(scope)))
    }

    fn count_from(&self, scope: &FromAndWhere) -> QueryData {
        let mut sql = SqlText::new("SELECT COUNT(*)");
        scope.append_to(&mut sql);
        let mut data = QueryData::new(sql, scope.params.clone(), scope.predicts_empty);
        data.scope = Some(scope.clone());
        data
    }

    // ==================== DELETE ====================

    /// Delete every row `query` selects.
    ///
    /// An empty query deletes nothing (`WHERE 1=0`) unless
    /// [`BuilderConfig::allow_delete_all`] is set.
    pub fn delete<R: RowType>(&self, query: &Query<R>) -> QueryResult<QueryData> {
        let mut ctx = self.context();
        let scope = self.checked_scope(&mut ctx, Some(query))?;
        let meta = R::meta();
        let mut sql = SqlText::new("DELETE FROM ");
        sql.push(meta.table);
        let predicts_empty = match scope.where_clause() {
            Some(where_clause) => {
                sql.push(" WHERE ").push_text(&where_clause);
                scope.predicts_empty
            }
            None if self.config.allow_delete_all => false,
            None => {
                warn!(
                    table = meta.table,
                    "DELETE without restrictions matches no rows; set allow_delete_all to delete everything"
                );
                sql.push(" WHERE 1=0");
                true
            }
        };
        Ok(self.finish("delete", QueryData::new(sql, ctx.into_params(), predicts_empty)))
    }
}

/// Metadata of `R`, checked before any of its names reach SQL text.
fn checked_meta<R: RowType>() -> QueryResult<&'static RowMeta> {
    let meta = R::meta();
    meta.validate()?;
    Ok(meta)
}

#[cfg(test)]
pub(crate) fn quiet() -> SqlBuilder {
    SqlBuilder::new(BuilderConfig::default().log(crate::config::SqlLogConfig::disabled()))
}

/// Column label and qualified name helper shared by the joined compiler.
fn qualified(alias: &str, column: &str) -> String {
    let mut out = String::new();
    write_column(&mut out, Some(alias), column);
    out
}
