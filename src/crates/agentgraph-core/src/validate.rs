//! Workflow structural validation
//!
//! Runs before compilation and on workflow create/update. Structural
//! violations are hard errors; a disconnected node is only a warning - the
//! workflow executes, the node never fires.
//!
//! Cross-workflow checks (agent existence, sub-graph inclusion cycles beyond
//! a direct self-reference) need the entity store and run where the store is
//! available: the compiler's resolver fails on missing agents, and its
//! recursion guard rejects inclusion cycles.
//!
//! Condition parseability is checked by [`validate_conditions`], which the
//! API layer runs on workflow create and update. The compiler deliberately
//! does not: workflows stored before strict validation still execute, with
//! unparseable conditions degrading to the default route at runtime.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::error::{GraphError, Result};
use crate::expr;
use crate::graph::{NodeKind, WorkflowDef, END, START};

/// Result of a successful validation: non-fatal findings only.
#[derive(Debug, Default)]
pub struct ValidationReport {
    pub warnings: Vec<String>,
}

/// Validate a workflow definition.
pub fn validate(def: &WorkflowDef) -> Result<ValidationReport> {
    let mut node_ids = HashSet::new();
    for node in &def.nodes {
        if node.node_id == START || node.node_id == END {
            return Err(GraphError::Validation(format!(
                "node id '{}' is reserved",
                node.node_id
            )));
        }
        if !node_ids.insert(node.node_id.as_str()) {
            return Err(GraphError::Validation(format!(
                "duplicate node id '{}'",
                node.node_id
            )));
        }
    }

    validate_edges(def, &node_ids)?;
    validate_nodes(def, &node_ids)?;

    let reachable = reachable_nodes(def);
    if !reachable.contains(END) {
        return Err(GraphError::Validation(
            "no path from __start__ to __end__".to_string(),
        ));
    }

    let mut warnings = Vec::new();
    for node in &def.nodes {
        if !reachable.contains(node.node_id.as_str()) {
            warnings.push(format!(
                "node '{}' is not reachable from __start__ and will never fire",
                node.node_id
            ));
        }
    }

    Ok(ValidationReport { warnings })
}

fn validate_edges(def: &WorkflowDef, node_ids: &HashSet<&str>) -> Result<()> {
    let mut has_start_edge = false;

    for edge in &def.edges {
        if edge.source_node == END {
            return Err(GraphError::Validation(
                "__end__ cannot be an edge source".to_string(),
            ));
        }
        if edge.target_node == START {
            return Err(GraphError::Validation(
                "__start__ cannot be an edge target".to_string(),
            ));
        }
        if edge.source_node == START {
            has_start_edge = true;
        } else if !node_ids.contains(edge.source_node.as_str()) {
            return Err(GraphError::Validation(format!(
                "edge source '{}' is not a node",
                edge.source_node
            )));
        }
        if edge.target_node != END && !node_ids.contains(edge.target_node.as_str()) {
            return Err(GraphError::Validation(format!(
                "edge target '{}' is not a node",
                edge.target_node
            )));
        }
    }

    if !has_start_edge {
        return Err(GraphError::Validation(
            "workflow has no edge from __start__".to_string(),
        ));
    }

    Ok(())
}

fn validate_nodes(def: &WorkflowDef, node_ids: &HashSet<&str>) -> Result<()> {
    for node in &def.nodes {
        match &node.kind {
            NodeKind::Router { router_config } => {
                for route in &router_config.routes {
                    if route.target != END && !node_ids.contains(route.target.as_str()) {
                        return Err(GraphError::Validation(format!(
                            "router '{}' routes to unknown node '{}'",
                            node.node_id, route.target
                        )));
                    }
                }
                if let Some(default) = &router_config.default {
                    if default != END && !node_ids.contains(default.as_str()) {
                        return Err(GraphError::Validation(format!(
                            "router '{}' defaults to unknown node '{}'",
                            node.node_id, default
                        )));
                    }
                }
            }
            NodeKind::Parallel { parallel_nodes, .. } => {
                if parallel_nodes.is_empty() {
                    return Err(GraphError::Validation(format!(
                        "parallel node '{}' lists no targets",
                        node.node_id
                    )));
                }
                for target in parallel_nodes {
                    if !node_ids.contains(target.as_str()) {
                        return Err(GraphError::Validation(format!(
                            "parallel node '{}' references unknown node '{}'",
                            node.node_id, target
                        )));
                    }
                }
            }
            NodeKind::Subgraph {
                subgraph_workflow_id,
            } => {
                if *subgraph_workflow_id == def.id {
                    return Err(GraphError::Validation(format!(
                        "subgraph node '{}' references its own workflow",
                        node.node_id
                    )));
                }
            }
            NodeKind::Agent { .. } | NodeKind::Join { .. } => {}
        }
    }

    Ok(())
}

/// Parse every edge and router condition, rejecting anything outside the
/// expression grammar. Run at workflow create/update so malformed conditions
/// never enter the store.
pub fn validate_conditions(def: &WorkflowDef) -> Result<()> {
    for edge in &def.edges {
        if let Some(condition) = &edge.condition {
            expr::parse(condition).map_err(|e| {
                GraphError::Validation(format!(
                    "edge {} -> {}: {}",
                    edge.source_node, edge.target_node, e
                ))
            })?;
        }
    }
    for node in &def.nodes {
        if let NodeKind::Router { router_config } = &node.kind {
            for route in &router_config.routes {
                expr::parse(&route.condition).map_err(|e| {
                    GraphError::Validation(format!("router '{}': {}", node.node_id, e))
                })?;
            }
        }
    }
    Ok(())
}

/// Nodes (plus possibly `__end__`) reachable from `__start__`, following
/// edges, router routes, and parallel containment.
fn reachable_nodes(def: &WorkflowDef) -> HashSet<String> {
    let mut successors: HashMap<&str, Vec<&str>> = HashMap::new();
    for edge in &def.edges {
        successors
            .entry(edge.source_node.as_str())
            .or_default()
            .push(edge.target_node.as_str());
    }
    for node in &def.nodes {
        match &node.kind {
            NodeKind::Parallel { parallel_nodes, .. } => {
                let entry = successors.entry(node.node_id.as_str()).or_default();
                entry.extend(parallel_nodes.iter().map(String::as_str));
            }
            NodeKind::Router { router_config } => {
                let entry = successors.entry(node.node_id.as_str()).or_default();
                entry.extend(router_config.routes.iter().map(|r| r.target.as_str()));
                if let Some(default) = &router_config.default {
                    entry.push(default.as_str());
                }
            }
            _ => {}
        }
    }

    let mut reachable = HashSet::new();
    let mut queue = VecDeque::from([START]);
    while let Some(current) = queue.pop_front() {
        if !reachable.insert(current.to_string()) {
            continue;
        }
        if let Some(next) = successors.get(current) {
            queue.extend(next.iter().copied());
        }
    }
    reachable
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{EdgeDef, JoinStrategy, NodeDef, RouteRule, RouterConfig};
    use serde_json::json;
    use uuid::Uuid;

    fn agent_node(id: &str) -> NodeDef {
        NodeDef {
            node_id: id.to_string(),
            kind: NodeKind::Agent {
                agent_id: Uuid::new_v4(),
            },
            config: json!({}),
        }
    }

    fn linear_def() -> WorkflowDef {
        WorkflowDef {
            id: Uuid::new_v4(),
            name: "linear".to_string(),
            state_schema: None,
            nodes: vec![agent_node("a"), agent_node("b")],
            edges: vec![
                EdgeDef::direct(START, "a"),
                EdgeDef::direct("a", "b"),
                EdgeDef::direct("b", END),
            ],
            is_template: false,
        }
    }

    #[test]
    fn test_valid_linear_workflow() {
        let report = validate(&linear_def()).unwrap();
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn test_duplicate_node_id() {
        let mut def = linear_def();
        def.nodes.push(agent_node("a"));
        assert!(matches!(validate(&def), Err(GraphError::Validation(_))));
    }

    #[test]
    fn test_dangling_edge_target() {
        let mut def = linear_def();
        def.edges.push(EdgeDef::direct("a", "ghost"));
        assert!(validate(&def).is_err());
    }

    #[test]
    fn test_missing_start_edge() {
        let mut def = linear_def();
        def.edges.retain(|e| e.source_node != START);
        assert!(validate(&def).is_err());
    }

    #[test]
    fn test_no_path_to_end() {
        let mut def = linear_def();
        def.edges.retain(|e| e.target_node != END);
        assert!(validate(&def).is_err());
    }

    #[test]
    fn test_unreachable_node_warns() {
        let mut def = linear_def();
        def.nodes.push(agent_node("island"));
        def.edges.push(EdgeDef::direct("island", END));
        let report = validate(&def).unwrap();
        assert_eq!(report.warnings.len(), 1);
        assert!(report.warnings[0].contains("island"));
    }

    #[test]
    fn test_malformed_condition_rejected_at_creation() {
        let mut def = linear_def();
        def.edges[1].condition = Some("state.score >> 0.8".to_string());
        // Structural validation passes; the creation-time condition check
        // is the one that rejects.
        assert!(validate(&def).is_ok());
        let err = validate_conditions(&def).unwrap_err();
        assert!(err.to_string().contains("parse error"));
    }

    #[test]
    fn test_router_unknown_target() {
        let mut def = linear_def();
        def.nodes.push(NodeDef {
            node_id: "r".to_string(),
            kind: NodeKind::Router {
                router_config: RouterConfig {
                    routes: vec![RouteRule {
                        condition: "true".to_string(),
                        target: "nowhere".to_string(),
                    }],
                    default: None,
                },
            },
            config: json!({}),
        });
        def.edges.push(EdgeDef::direct("b", "r"));
        assert!(validate(&def).is_err());
    }

    #[test]
    fn test_parallel_members_count_as_reachable() {
        let def = WorkflowDef {
            id: Uuid::new_v4(),
            name: "fanout".to_string(),
            state_schema: None,
            nodes: vec![
                NodeDef {
                    node_id: "p".to_string(),
                    kind: NodeKind::Parallel {
                        parallel_nodes: vec!["x".to_string(), "y".to_string()],
                        fan_out_key: None,
                    },
                    config: json!({}),
                },
                agent_node("x"),
                agent_node("y"),
                NodeDef {
                    node_id: "j".to_string(),
                    kind: NodeKind::Join {
                        strategy: JoinStrategy::List,
                        output_key: "results".to_string(),
                    },
                    config: json!({}),
                },
            ],
            edges: vec![
                EdgeDef::direct(START, "p"),
                EdgeDef::direct("x", "j"),
                EdgeDef::direct("y", "j"),
                EdgeDef::direct("j", END),
            ],
            is_template: false,
        };

        let report = validate(&def).unwrap();
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn test_subgraph_self_reference() {
        let id = Uuid::new_v4();
        let def = WorkflowDef {
            id,
            name: "self".to_string(),
            state_schema: None,
            nodes: vec![NodeDef {
                node_id: "s".to_string(),
                kind: NodeKind::Subgraph {
                    subgraph_workflow_id: id,
                },
                config: json!({}),
            }],
            edges: vec![EdgeDef::direct(START, "s"), EdgeDef::direct("s", END)],
            is_template: false,
        };
        assert!(validate(&def).is_err());
    }
}
