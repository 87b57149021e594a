//! Join-graph compilation.
//!
//! INNER and LEFT nodes become physical joins in the FROM clause. EXISTS and
//! NOT EXISTS nodes become correlated subqueries, so a one-to-many relation
//! can filter the parent without multiplying its rows.
//!
//! Restrictions of a node on the outer side of a LEFT join go into that
//! join's ON clause: they decide which row is attached, never whether the
//! parent row is returned. INNER joins below a LEFT join are nested inside
//! it, `LEFT JOIN (a t1 INNER JOIN b t2 ON ...) ON ...`, so a missing inner
//! match drops the attached group instead of the parent row.

use std::collections::VecDeque;

use super::{CompileContext, FromAndWhere, QueryData, SqlBuilder, qualified};
use crate::error::QueryResult;
use crate::join::{JoinKind, JoinNode, JoinQuery, NodeId};
use crate::joined_row::column_label;
use crate::order::OrderBy;
use crate::pagination::Pagination;
use crate::sql::SqlText;

fn node(jq: &JoinQuery, id: NodeId) -> &JoinNode {
    &jq.nodes()[id.index()]
}

/// Nodes physically joined below `top` (including `top`), in alias order,
/// each paired with whether it sits on the outer side of a LEFT join.
fn physical_scope(jq: &JoinQuery, top: NodeId) -> Vec<(NodeId, bool)> {
    let mut members = Vec::new();
    let mut queue = VecDeque::from([(top, false)]);
    while let Some((id, outer)) = queue.pop_front() {
        members.push((id, outer));
        for &child in node(jq, id).children() {
            match node(jq, child).kind() {
                Some(JoinKind::Inner) => queue.push_back((child, outer)),
                Some(JoinKind::Left) => queue.push_back((child, true)),
                _ => {}
            }
        }
    }
    members
}

/// `head` and the nodes INNER-joined below it, in alias order.
fn inner_group(jq: &JoinQuery, head: NodeId) -> Vec<NodeId> {
    let mut group = Vec::new();
    let mut queue = VecDeque::from([head]);
    while let Some(id) = queue.pop_front() {
        group.push(id);
        queue.extend(
            node(jq, id)
                .children()
                .iter()
                .copied()
                .filter(|&c| node(jq, c).kind() == Some(JoinKind::Inner)),
        );
    }
    group
}

fn push_join_target(from: &mut SqlText, n: &JoinNode) {
    from.push(n.meta().table).push(" ").push(n.alias());
}

fn push_link(from: &mut SqlText, jq: &JoinQuery, n: &JoinNode) {
    let (Some(parent), Some(link)) = (n.parent(), n.link()) else {
        return;
    };
    from.push(&qualified(node(jq, parent).alias(), link.parent_column))
        .push(" = ")
        .push(&qualified(n.alias(), link.child_column));
}

impl SqlBuilder {
    pub(super) fn joined_scope(&self, ctx: &mut CompileContext, jq: &JoinQuery) -> FromAndWhere {
        let mut from = SqlText::empty();
        let mut conditions = Vec::new();
        self.compile_scope(ctx, jq, NodeId::ROOT, &mut from, &mut conditions);
        FromAndWhere {
            from,
            conditions,
            params: ctx.params().clone(),
            predicts_empty: jq.predicts_empty_result(),
        }
    }

    /// FROM body and WHERE conditions for the scope rooted at `top`.
    ///
    /// The FROM body (with its ON conditions) is compiled before the WHERE
    /// conditions, so parameter numbers follow the statement text.
    fn compile_scope(
        &self,
        ctx: &mut CompileContext,
        jq: &JoinQuery,
        top: NodeId,
        from: &mut SqlText,
        where_clause: &mut Vec<SqlText>,
    ) {
        let members = physical_scope(jq, top);

        for &(id, outer) in &members {
            let n = node(jq, id);
            if id == top {
                push_join_target(from, n);
                continue;
            }
            match n.kind() {
                Some(JoinKind::Inner) if outer => {
                    // Emitted inside the LEFT join group it belongs to.
                }
                Some(JoinKind::Inner) => {
                    from.push(" INNER JOIN ");
                    push_join_target(from, n);
                    from.push(" ON ");
                    push_link(from, jq, n);
                }
                Some(JoinKind::Left) => {
                    let group = inner_group(jq, id);
                    from.push(" LEFT JOIN ");
                    if group.len() > 1 {
                        from.push("(");
                        push_join_target(from, n);
                        for &member in &group[1..] {
                            let m = node(jq, member);
                            from.push(" INNER JOIN ");
                            push_join_target(from, m);
                            from.push(" ON ");
                            push_link(from, jq, m);
                        }
                        from.push(")");
                    } else {
                        push_join_target(from, n);
                    }
                    from.push(" ON ");
                    push_link(from, jq, n);

                    let mut on = Vec::new();
                    for &member in &group {
                        self.node_conditions(ctx, jq, node(jq, member), &mut on);
                    }
                    for cond in &on {
                        from.push(" AND ").push_text(cond);
                    }
                }
                _ => {}
            }
        }

        for &(id, outer) in &members {
            if !outer {
                self.node_conditions(ctx, jq, node(jq, id), where_clause);
            }
        }
    }

    /// The node's own restrictions followed by its EXISTS/NOT EXISTS children.
    fn node_conditions(
        &self,
        ctx: &mut CompileContext,
        jq: &JoinQuery,
        n: &JoinNode,
        out: &mut Vec<SqlText>,
    ) {
        self.append_conditions(ctx, n.meta(), Some(n.alias()), &n.conditions, out);
        for &child in n.children() {
            if let Some(cond) = self.exists_condition(ctx, jq, child) {
                out.push(cond);
            }
        }
    }

    /// `[NOT] EXISTS (SELECT 1 FROM ... WHERE parent.col = child.col AND ...)`.
    ///
    /// Returns `None` for physical children and for a NOT EXISTS whose
    /// subquery cannot match (it would hold for every row).
    fn exists_condition(
        &self,
        ctx: &mut CompileContext,
        jq: &JoinQuery,
        child: NodeId,
    ) -> Option<SqlText> {
        let n = node(jq, child);
        let kind = n.kind()?;
        if kind.is_physical() {
            return None;
        }
        if kind == JoinKind::NotExists && jq.scope_empty(child) {
            return None;
        }
        let parent = node(jq, n.parent()?);
        let link = n.link()?;

        let mut from = SqlText::empty();
        let mut conditions = Vec::new();
        self.compile_scope(ctx, jq, child, &mut from, &mut conditions);

        let mut out = SqlText::new(kind.keyword());
        out.push(" (SELECT 1 FROM ")
            .push_text(&from)
            .push(" WHERE ")
            .push(&qualified(parent.alias(), link.parent_column))
            .push(" = ")
            .push(&qualified(n.alias(), link.child_column));
        for cond in &conditions {
            out.push(" AND ").push_text(cond);
        }
        out.push(")");
        Some(out)
    }

    fn append_joined_select_list(&self, sql: &mut SqlText, jq: &JoinQuery) {
        let mut columns = Vec::new();
        for n in jq.selected_nodes() {
            for col in n.meta().columns {
                columns.push(format!(
                    "{} AS {}",
                    qualified(n.alias(), col.name),
                    column_label(n.alias(), col.name)
                ));
            }
        }
        sql.push(&columns.join(", "));
    }

    /// Select over a join graph. Every selected column is labelled
    /// `{alias}__{column}` so [`JoinedRow`](crate::JoinedRow) can split the
    /// fetched row by row type.
    ///
    /// Paging applies to the joined rows; the COUNT companion counts the same
    /// rows.
    pub fn joined_select(
        &self,
        query: &JoinQuery,
        order: &OrderBy,
        pagination: Pagination,
    ) -> QueryResult<QueryData> {
        pagination.validate()?;
        let pagination = self.clamp(pagination);

        let mut ctx = self.context();
        let scope = self.joined_scope(&mut ctx, query);

        let mut sql = SqlText::new("SELECT ");
        self.append_joined_select_list(&mut sql, query);
        scope.append_to(&mut sql);
        self.append_order_by(&mut sql, order, Some(query))?;
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
        Ok(self.finish("joined_select", data))
    }

    /// Delete the root rows a joined select would return:
    /// `DELETE FROM <root> WHERE <id> IN (SELECT t0.<id> FROM ...)`.
    ///
    /// A graph that restricts nothing (no WHERE condition and no INNER join
    /// below the root) deletes nothing unless
    /// [`BuilderConfig::allow_delete_all`](crate::BuilderConfig) is set.
    pub fn joined_delete(&self, query: &JoinQuery) -> QueryData {
        let root = query.root_node();
        let meta = root.meta();
        let mut sql = SqlText::new("DELETE FROM ");
        sql.push(meta.table);

        let mut ctx = self.context();
        let scope = self.joined_scope(&mut ctx, query);
        let inner_joined = physical_scope(query, NodeId::ROOT)
            .iter()
            .any(|&(id, outer)| !outer && id != NodeId::ROOT);
        let unrestricted = scope.conditions.is_empty() && !inner_joined;
        if unrestricted && !self.config.allow_delete_all {
            tracing::warn!(
                table = meta.table,
                "DELETE without restrictions matches no rows; set allow_delete_all to delete everything"
            );
            sql.push(" WHERE 1=0");
            return self.finish("joined_delete", QueryData::new(sql, Default::default(), true));
        }

        sql.push(" WHERE ")
            .push(meta.id)
            .push(" IN (SELECT ")
            .push(&qualified(root.alias(), meta.id));
        scope.append_to(&mut sql);
        sql.push(")");
        let predicts_empty = scope.predicts_empty;
        self.finish("joined_delete", QueryData::new(sql, ctx.into_params(), predicts_empty))
    }
}
