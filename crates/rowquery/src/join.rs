//! Join graphs over several row types.
//!
//! A [`JoinQuery`] is rooted at one [`Query`] (the driving row type used for
//! counting and paging). Every further node is attached through a declared
//! reference, so the join condition is always `fk = id` and never restated
//! by the caller.
//!
//! ```ignore
//! // orders LEFT JOIN shipments, keep orders that have a line for SKU-1
//! let jq = JoinQuery::root(Query::<Order>::new().eq(Order::STATUS, "open"))
//!     .join(JoinKind::Left, Order::SHIPMENT_ID, Query::<Shipment>::new())
//!     .join_referencing(
//!         JoinKind::Exists,
//!         Query::<OrderLine>::new().eq(OrderLine::SKU, "SKU-1"),
//!         OrderLine::ORDER_ID,
//!     )
//!     .build()?;
//! ```
//!
//! Builder errors are collected and reported by [`JoinQueryBuilder::build`],
//! which also assigns aliases `t0, t1, ...` in breadth-first order from the
//! root. Given the same sequence of calls the aliases are always the same.

use std::any::{TypeId, type_name};
use std::collections::VecDeque;

use tracing::trace;

use crate::error::{QueryError, QueryResult};
use crate::query::{Conditions, Query};
use crate::schema::{Field, RowMeta, RowType};

/// How a node is attached to its parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JoinKind {
    /// `INNER JOIN`; the node's restrictions filter the result.
    Inner,
    /// `LEFT JOIN`; the node's restrictions only decide which row is attached.
    Left,
    /// Correlated `EXISTS (...)` semi-join; the node is not selected.
    Exists,
    /// Correlated `NOT EXISTS (...)` anti-join; the node is not selected.
    NotExists,
}

impl JoinKind {
    /// Whether the node becomes part of the FROM clause.
    pub fn is_physical(self) -> bool {
        matches!(self, JoinKind::Inner | JoinKind::Left)
    }

    pub(crate) fn keyword(self) -> &'static str {
        match self {
            JoinKind::Inner => "INNER JOIN",
            JoinKind::Left => "LEFT JOIN",
            JoinKind::Exists => "EXISTS",
            JoinKind::NotExists => "NOT EXISTS",
        }
    }
}

/// Position of a node in a built [`JoinQuery`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub const ROOT: NodeId = NodeId(0);

    pub fn index(self) -> usize {
        self.0
    }
}

/// Join condition between a node and its parent:
/// `parent.parent_column = child.child_column`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Link {
    pub parent_column: &'static str,
    pub child_column: &'static str,
}

/// One node of a built join graph.
#[derive(Debug, Clone)]
pub struct JoinNode {
    id: NodeId,
    type_id: TypeId,
    row_type: &'static str,
    meta: &'static RowMeta,
    alias: String,
    edge: Option<(NodeId, JoinKind, Link)>,
    children: Vec<NodeId>,
    selected: bool,
    pub(crate) conditions: Conditions,
}

impl JoinNode {
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn alias(&self) -> &str {
        &self.alias
    }

    pub fn meta(&self) -> &'static RowMeta {
        self.meta
    }

    /// Rust type name of the row type, for diagnostics.
    pub fn row_type(&self) -> &'static str {
        self.row_type
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.edge.map(|(p, _, _)| p)
    }

    pub fn kind(&self) -> Option<JoinKind> {
        self.edge.map(|(_, k, _)| k)
    }

    pub fn link(&self) -> Option<Link> {
        self.edge.map(|(_, _, l)| l)
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// Whether the node's columns appear in a joined select.
    pub fn is_selected(&self) -> bool {
        self.selected
    }

    pub(crate) fn type_id(&self) -> TypeId {
        self.type_id
    }
}

/// A validated join graph with assigned aliases.
#[derive(Debug, Clone)]
pub struct JoinQuery {
    nodes: Vec<JoinNode>,
}

impl JoinQuery {
    /// Start a join graph rooted at `query`.
    pub fn root<R: RowType>(query: Query<R>) -> JoinQueryBuilder {
        JoinQueryBuilder {
            root: PendingNode::new(query),
            joins: Vec::new(),
            error: None,
        }
    }

    pub fn root_node(&self) -> &JoinNode {
        &self.nodes[0]
    }

    /// Nodes in alias (breadth-first) order.
    pub fn nodes(&self) -> &[JoinNode] {
        &self.nodes
    }

    pub fn node(&self, id: NodeId) -> Option<&JoinNode> {
        self.nodes.get(id.0)
    }

    /// The node holding row type `R`.
    pub fn node_of<R: RowType>(&self) -> Option<NodeId> {
        let wanted = TypeId::of::<R>();
        self.nodes.iter().find(|n| n.type_id == wanted).map(|n| n.id)
    }

    /// Nodes whose columns a joined select returns, in alias order.
    pub fn selected_nodes(&self) -> impl Iterator<Item = &JoinNode> {
        self.nodes.iter().filter(|n| n.selected)
    }

    /// Returns `true` if no row can match.
    ///
    /// Covers the root, nodes reached through INNER joins only, and EXISTS
    /// subqueries that cannot match. LEFT and NOT EXISTS branches never empty
    /// the result on their own.
    pub fn predicts_empty_result(&self) -> bool {
        self.scope_empty(NodeId::ROOT)
    }

    /// Whether the scope rooted at `id` (the node plus its INNER and EXISTS
    /// descendants) cannot match any row.
    pub(crate) fn scope_empty(&self, id: NodeId) -> bool {
        let node = &self.nodes[id.0];
        if node.conditions.predicts_empty_result() {
            return true;
        }
        node.children.iter().any(|c| {
            matches!(
                self.nodes[c.0].kind(),
                Some(JoinKind::Inner) | Some(JoinKind::Exists)
            ) && self.scope_empty(*c)
        })
    }
}

struct PendingNode {
    type_id: TypeId,
    row_type: &'static str,
    meta: &'static RowMeta,
    conditions: Conditions,
}

impl PendingNode {
    fn new<R: RowType>(query: Query<R>) -> Self {
        Self {
            type_id: TypeId::of::<R>(),
            row_type: type_name::<R>(),
            meta: R::meta(),
            conditions: query.into_conditions(),
        }
    }
}

enum Parent {
    /// The parent's `fk` references the new node (many-to-one).
    Referencing {
        type_id: TypeId,
        row_type: &'static str,
        fk: &'static str,
    },
    /// The new node's `fk` references the parent's table (one-to-many).
    ReferencedBy { table: &'static str, fk: &'static str },
}

struct PendingJoin {
    node: PendingNode,
    kind: JoinKind,
    parent: Parent,
}

/// Collects nodes and edges; see [`JoinQuery::root`].
pub struct JoinQueryBuilder {
    root: PendingNode,
    joins: Vec<PendingJoin>,
    error: Option<QueryError>,
}

impl JoinQueryBuilder {
    fn fail(&mut self, message: String) {
        if self.error.is_none() {
            self.error = Some(QueryError::graph(message));
        }
    }

    /// Attach `query`'s row type `T` to the node of `S` through `via`, a field
    /// of `S` that references `T`.
    pub fn join<S: RowType, T: RowType>(
        mut self,
        kind: JoinKind,
        via: Field<S>,
        query: Query<T>,
    ) -> Self {
        let target = T::meta().table;
        match S::meta().reference(via.column()) {
            Some(r) if r.target == target => {}
            Some(r) => self.fail(format!(
                "'{}.{}' references '{}', not '{target}'",
                S::meta().table,
                via.column(),
                r.target
            )),
            None => self.fail(format!(
                "'{}.{}' declares no reference",
                S::meta().table,
                via.column()
            )),
        }
        self.joins.push(PendingJoin {
            node: PendingNode::new(query),
            kind,
            parent: Parent::Referencing {
                type_id: TypeId::of::<S>(),
                row_type: type_name::<S>(),
                fk: via.column(),
            },
        });
        self
    }

    /// Attach `query`'s row type `C` below the node its field `via` references
    /// (one-to-many: several `C` rows per parent row).
    pub fn join_referencing<C: RowType>(
        mut self,
        kind: JoinKind,
        query: Query<C>,
        via: Field<C>,
    ) -> Self {
        let table = match C::meta().reference(via.column()) {
            Some(r) => r.target,
            None => {
                self.fail(format!(
                    "'{}.{}' declares no reference",
                    C::meta().table,
                    via.column()
                ));
                ""
            }
        };
        self.joins.push(PendingJoin {
            node: PendingNode::new(query),
            kind,
            parent: Parent::ReferencedBy {
                table,
                fk: via.column(),
            },
        });
        self
    }

    /// Validate the graph and assign aliases.
    pub fn build(self) -> QueryResult<JoinQuery> {
        if let Some(err) = self.error {
            return Err(err);
        }

        let mut pending: Vec<PendingNode> = Vec::with_capacity(self.joins.len() + 1);
        pending.push(self.root);
        let mut edges: Vec<(JoinKind, Parent)> = Vec::with_capacity(self.joins.len());
        for join in self.joins {
            if let Some(existing) = pending.iter().find(|n| n.type_id == join.node.type_id) {
                return Err(QueryError::graph(format!(
                    "row type {} is joined twice (alias collision on '{}')",
                    existing.row_type, existing.meta.table
                )));
            }
            pending.push(join.node);
            edges.push((join.kind, join.parent));
        }
        for n in &pending {
            n.meta.validate()?;
            n.conditions.check_columns(n.meta)?;
        }

        // Resolve each non-root node's parent index and link.
        let mut parents: Vec<Option<(usize, JoinKind, Link)>> = vec![None];
        for (i, (kind, parent)) in edges.iter().enumerate() {
            let child = i + 1;
            let resolved = match parent {
                Parent::Referencing {
                    type_id,
                    row_type,
                    fk,
                } => {
                    let idx = pending
                        .iter()
                        .position(|n| n.type_id == *type_id)
                        .ok_or_else(|| {
                            QueryError::graph(format!(
                                "join via {row_type}.{fk} but {row_type} is not part of the graph"
                            ))
                        })?;
                    let link = Link {
                        parent_column: *fk,
                        child_column: pending[child].meta.id,
                    };
                    (idx, link)
                }
                Parent::ReferencedBy { table, fk } => {
                    let candidates: Vec<usize> = pending
                        .iter()
                        .enumerate()
                        .filter(|(j, n)| *j != child && n.meta.table == *table)
                        .map(|(j, _)| j)
                        .collect();
                    let idx = match candidates.as_slice() {
                        [idx] => *idx,
                        [] => {
                            return Err(QueryError::graph(format!(
                                "{}.{fk} references '{table}' which is not part of the graph",
                                pending[child].row_type
                            )));
                        }
                        _ => {
                            return Err(QueryError::graph(format!(
                                "{}.{fk} references '{table}' which appears more than once",
                                pending[child].row_type
                            )));
                        }
                    };
                    let link = Link {
                        parent_column: pending[idx].meta.id,
                        child_column: *fk,
                    };
                    (idx, link)
                }
            };
            if resolved.0 == child {
                return Err(QueryError::graph(format!(
                    "{} cannot be joined to itself",
                    pending[child].row_type
                )));
            }
            parents.push(Some((resolved.0, *kind, resolved.1)));
        }

        // Breadth-first walk from the root; children in declaration order.
        let mut order: Vec<usize> = Vec::with_capacity(pending.len());
        let mut queue = VecDeque::from([0usize]);
        while let Some(idx) = queue.pop_front() {
            order.push(idx);
            for (child, p) in parents.iter().enumerate() {
                if matches!(p, Some((parent, _, _)) if *parent == idx) {
                    queue.push_back(child);
                }
            }
        }
        if order.len() != pending.len() {
            let unreachable: Vec<&str> = (0..pending.len())
                .filter(|i| !order.contains(i))
                .map(|i| pending[i].row_type)
                .collect();
            return Err(QueryError::graph(format!(
                "not reachable from the root {}: {}",
                pending[0].row_type,
                unreachable.join(", ")
            )));
        }

        let mut new_id = vec![0usize; pending.len()];
        for (pos, idx) in order.iter().enumerate() {
            new_id[*idx] = pos;
        }

        let mut slots: Vec<Option<PendingNode>> = pending.into_iter().map(Some).collect();
        let mut nodes: Vec<JoinNode> = Vec::with_capacity(order.len());
        for (pos, idx) in order.iter().enumerate() {
            let Some(p) = slots[*idx].take() else {
                return Err(QueryError::graph("node visited twice".to_string()));
            };
            let edge = parents[*idx]
                .map(|(parent, kind, link)| (NodeId(new_id[parent]), kind, link));
            let selected = match edge {
                None => true,
                Some((parent, kind, _)) => kind.is_physical() && nodes[parent.0].selected,
            };
            let alias = format!("t{pos}");
            trace!(
                alias = %alias,
                table = p.meta.table,
                row_type = p.row_type,
                "assigned join alias"
            );
            nodes.push(JoinNode {
                id: NodeId(pos),
                type_id: p.type_id,
                row_type: p.row_type,
                meta: p.meta,
                alias,
                edge,
                children: Vec::new(),
                selected,
                conditions: p.conditions,
            });
        }
        for pos in 1..nodes.len() {
            if let Some(parent) = nodes[pos].parent() {
                nodes[parent.0].children.push(NodeId(pos));
            }
        }

        Ok(JoinQuery { nodes })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_rows::{Order, OrderLine, Person, Shipment};

    #[test]
    fn aliases_follow_breadth_first_order() {
        let jq = JoinQuery::root(Query::<OrderLine>::new())
            .join(JoinKind::Inner, OrderLine::ORDER_ID, Query::<Order>::new())
            .join(JoinKind::Left, Order::SHIPMENT_ID, Query::<Shipment>::new())
            .build()
            .unwrap();
        let aliases: Vec<(&str, &str)> = jq
            .nodes()
            .iter()
            .map(|n| (n.meta().table, n.alias()))
            .collect();
        assert_eq!(
            aliases,
            vec![("order_lines", "t0"), ("orders", "t1"), ("shipments", "t2")]
        );
        assert_eq!(jq.node_of::<Shipment>(), Some(NodeId(2)));
        assert_eq!(
            jq.node(NodeId(2)).unwrap().link(),
            Some(Link {
                parent_column: "shipment_id",
                child_column: "id"
            })
        );
    }

    #[test]
    fn declaration_order_of_dependent_joins_does_not_matter() {
        // The shipment join names Order before Order has been attached.
        let jq = JoinQuery::root(Query::<OrderLine>::new())
            .join(JoinKind::Left, Order::SHIPMENT_ID, Query::<Shipment>::new())
            .join(JoinKind::Inner, OrderLine::ORDER_ID, Query::<Order>::new())
            .build()
            .unwrap();
        assert_eq!(jq.node(NodeId(1)).unwrap().meta().table, "orders");
        assert_eq!(jq.node(NodeId(2)).unwrap().meta().table, "shipments");
        assert_eq!(jq.node(NodeId(2)).unwrap().parent(), Some(NodeId(1)));
    }

    #[test]
    fn one_to_many_link_points_back_to_parent_id() {
        let jq = JoinQuery::root(Query::<Order>::new())
            .join_referencing(JoinKind::Exists, Query::<OrderLine>::new(), OrderLine::ORDER_ID)
            .build()
            .unwrap();
        let line = jq.node(NodeId(1)).unwrap();
        assert_eq!(
            line.link(),
            Some(Link {
                parent_column: "id",
                child_column: "order_id"
            })
        );
        assert!(!line.is_selected());
        assert_eq!(jq.selected_nodes().count(), 1);
    }

    #[test]
    fn joining_a_type_twice_is_an_alias_collision() {
        let err = JoinQuery::root(Query::<Order>::new())
            .join(JoinKind::Left, Order::SHIPMENT_ID, Query::<Shipment>::new())
            .join(JoinKind::Inner, Order::SHIPMENT_ID, Query::<Shipment>::new())
            .build()
            .unwrap_err();
        assert!(err.is_graph_error());
        assert!(err.to_string().contains("joined twice"));
    }

    #[test]
    fn unknown_source_row_type_is_rejected() {
        let err = JoinQuery::root(Query::<Person>::new())
            .join(JoinKind::Left, Order::SHIPMENT_ID, Query::<Shipment>::new())
            .build()
            .unwrap_err();
        assert!(err.is_graph_error());
        assert!(err.to_string().contains("not part of the graph"));
    }

    #[test]
    fn missing_reference_is_rejected() {
        let err = JoinQuery::root(Query::<Order>::new())
            .join(JoinKind::Inner, Order::STATUS, Query::<Shipment>::new())
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("declares no reference"));

        let err = JoinQuery::root(Query::<Shipment>::new())
            .join_referencing(JoinKind::Exists, Query::<OrderLine>::new(), OrderLine::ORDER_ID)
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("'orders' which is not part of the graph"));
    }

    #[test]
    fn cycle_without_root_is_unreachable() {
        // Order hangs off Shipment and Shipment hangs off Order; neither
        // reaches the Person root.
        let err = JoinQuery::root(Query::<Person>::new())
            .join_referencing(JoinKind::Inner, Query::<Shipment>::new(), Shipment::ID)
            .build();
        assert!(err.is_err());

        let err = JoinQuery::root(Query::<Person>::new())
            .join(JoinKind::Inner, Order::SHIPMENT_ID, Query::<Shipment>::new())
            .join_referencing(JoinKind::Inner, Query::<Order>::new(), Order::SHIPMENT_ID)
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("not reachable from the root"));
    }

    #[test]
    fn predicted_empty_follows_inner_and_exists_scopes() {
        let empty_lines = || {
            Query::<OrderLine>::new()
                .in_list(OrderLine::SKU, Vec::<&str>::new())
                .unwrap()
        };

        let exists = JoinQuery::root(Query::<Order>::new())
            .join_referencing(JoinKind::Exists, empty_lines(), OrderLine::ORDER_ID)
            .build()
            .unwrap();
        assert!(exists.predicts_empty_result());

        let not_exists = JoinQuery::root(Query::<Order>::new())
            .join_referencing(JoinKind::NotExists, empty_lines(), OrderLine::ORDER_ID)
            .build()
            .unwrap();
        assert!(!not_exists.predicts_empty_result());

        let left = JoinQuery::root(Query::<Order>::new())
            .join(
                JoinKind::Left,
                Order::SHIPMENT_ID,
                Query::<Shipment>::new()
                    .in_list(Shipment::STATUS, Vec::<&str>::new())
                    .unwrap(),
            )
            .build()
            .unwrap();
        assert!(!left.predicts_empty_result());
    }
}
