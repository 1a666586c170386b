//! Workflow compiler
//!
//! Lowers a validated [`WorkflowDef`] into an executable [`Plan`]: one
//! operator per node, an edge group per source, and the reducer table for the
//! workflow's state. Agent nodes are pre-resolved through an
//! [`AgentResolver`] so the plan holds live provider handles and tool
//! instances; sub-graph nodes are compiled recursively with a cycle guard.

use futures::future::BoxFuture;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

use crate::agent::AgentOperator;
use crate::error::{GraphError, Result};
use crate::expr::{self, Expr};
use crate::graph::{EdgeDef, JoinStrategy, NodeId, NodeKind, WorkflowDef, END};
use crate::llm::ChatProvider;
use crate::state::StateSchema;
use crate::tool::Tool;
use crate::validate;

/// A pre-resolved agent record: everything an agent operator needs, loaded
/// from the entity store once at compile time.
pub struct AgentBinding {
    pub name: String,
    pub instructions: String,
    pub provider: Arc<dyn ChatProvider>,
    pub model: String,
    pub max_tokens: Option<u32>,
    pub tools: Vec<Arc<dyn Tool>>,
    pub output_schema: Option<Value>,
}

/// Supplies the compiler with entity-store lookups: agent records (with
/// bound tools and a provider handle) and workflow definitions for
/// sub-graph nodes.
#[async_trait::async_trait]
pub trait AgentResolver: Send + Sync {
    async fn resolve_agent(&self, agent_id: Uuid) -> Result<AgentBinding>;

    async fn load_workflow(&self, workflow_id: Uuid) -> Result<WorkflowDef>;
}

/// An executable lowering of one workflow.
pub struct Plan {
    pub workflow_id: Uuid,
    pub operators: HashMap<NodeId, Operator>,
    pub edges: HashMap<NodeId, EdgeGroup>,
    pub schema: StateSchema,
    /// Per-node wall-clock budgets from `config.timeout_seconds`.
    pub timeouts: HashMap<NodeId, u64>,
}

impl std::fmt::Debug for AgentBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentBinding")
            .field("name", &self.name)
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .finish_non_exhaustive()
    }
}

impl std::fmt::Debug for Plan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Plan")
            .field("workflow_id", &self.workflow_id)
            .field("operators", &self.operators.keys().collect::<Vec<_>>())
            .field("edges", &self.edges.keys().collect::<Vec<_>>())
            .field("timeouts", &self.timeouts)
            .finish_non_exhaustive()
    }
}

/// Executable realisation of a node.
pub enum Operator {
    Agent(AgentOperator),
    /// Routing itself lives in the node's [`EdgeGroup`]; the operator only
    /// marks the node as current.
    Router,
    Parallel(ParallelOperator),
    Join(JoinOperator),
    Subgraph(SubgraphOperator),
}

impl Operator {
    pub fn type_name(&self) -> &'static str {
        match self {
            Operator::Agent(_) => "agent",
            Operator::Router => "router",
            Operator::Parallel(_) => "parallel",
            Operator::Join(_) => "join",
            Operator::Subgraph(_) => "subgraph",
        }
    }
}

/// Fan-out dispatcher. With `fan_out_key` set, one dispatch per item of the
/// list under that state key (falling back to `input[fan_out_key]`).
pub struct ParallelOperator {
    pub targets: Vec<NodeId>,
    pub fan_out_key: Option<String>,
    /// Join node all siblings converge on; `None` when siblings run straight
    /// to `__end__`.
    pub barrier: Option<NodeId>,
}

/// Fan-in aggregator over `state.intermediate`, restricted to the sibling
/// keys wired at compile time.
pub struct JoinOperator {
    pub strategy: JoinStrategy,
    pub output_key: String,
    pub sources: Vec<NodeId>,
}

/// An embedded workflow, compiled into its own plan. The executor runs it
/// under the derived thread id `subgraph_{node_id}`.
pub struct SubgraphOperator {
    pub node_id: NodeId,
    pub plan: Arc<Plan>,
}

/// Outgoing edges of one source node.
pub enum EdgeGroup {
    Direct(NodeId),
    Conditional {
        routes: Vec<CompiledRoute>,
        default: NodeId,
    },
}

/// One conditional route. `expr` is `None` when the stored condition does not
/// parse; evaluating such a route reports the parse failure and falls
/// through, so legacy workflows degrade to their default route instead of
/// halting.
pub struct CompiledRoute {
    pub expr: Option<Expr>,
    pub raw: String,
    pub target: NodeId,
}

impl Plan {
    /// Pick the next target leaving `source`: declaration-order first-true,
    /// falling back to the group default. Returns the chosen target plus any
    /// recovered evaluation error to record on the step. A source with no
    /// outgoing group routes to `__end__`.
    pub fn next_from(&self, source: &str, state: &Value) -> (NodeId, Option<String>) {
        match self.edges.get(source) {
            None => (END.to_string(), None),
            Some(EdgeGroup::Direct(target)) => (target.clone(), None),
            Some(EdgeGroup::Conditional { routes, default }) => {
                let mut errors: Vec<String> = Vec::new();
                for route in routes {
                    match &route.expr {
                        None => errors.push(format!(
                            "condition '{}' failed to parse",
                            route.raw
                        )),
                        Some(expr) => match expr.eval_bool(state) {
                            Ok(true) => {
                                let soft_error = if errors.is_empty() {
                                    None
                                } else {
                                    Some(errors.join("; "))
                                };
                                return (route.target.clone(), soft_error);
                            }
                            Ok(false) => {}
                            Err(e) => errors.push(format!("condition '{}': {}", route.raw, e)),
                        },
                    }
                }
                let soft_error = if errors.is_empty() {
                    None
                } else {
                    Some(errors.join("; "))
                };
                (default.clone(), soft_error)
            }
        }
    }

    pub fn timeout_for(&self, node_id: &str) -> Option<u64> {
        self.timeouts.get(node_id).copied()
    }
}

/// Lowers workflow definitions into plans.
pub struct Compiler<'r> {
    resolver: &'r dyn AgentResolver,
}

impl<'r> Compiler<'r> {
    pub fn new(resolver: &'r dyn AgentResolver) -> Self {
        Self { resolver }
    }

    pub async fn compile(&self, def: &WorkflowDef) -> Result<Plan> {
        self.compile_with_stack(def, vec![def.id]).await
    }

    /// Recursive compilation with the inclusion stack as cycle guard.
    fn compile_with_stack<'a>(
        &'a self,
        def: &'a WorkflowDef,
        stack: Vec<Uuid>,
    ) -> BoxFuture<'a, Result<Plan>> {
        Box::pin(async move {
            let report = validate::validate(def)?;
            for warning in &report.warnings {
                warn!(workflow = %def.id, "{}", warning);
            }

            let schema = StateSchema::from_declared(def.state_schema.as_ref());
            let mut operators = HashMap::new();
            let mut timeouts = HashMap::new();

            for node in &def.nodes {
                if let Some(timeout) = node.timeout_seconds() {
                    timeouts.insert(node.node_id.clone(), timeout);
                }

                let operator = match &node.kind {
                    NodeKind::Agent { agent_id } => {
                        let binding =
                            self.resolver.resolve_agent(*agent_id).await.map_err(|e| {
                                GraphError::Compilation {
                                    workflow_id: def.id,
                                    message: format!(
                                        "agent node '{}': {}",
                                        node.node_id, e
                                    ),
                                }
                            })?;
                        Operator::Agent(AgentOperator {
                            name: node.node_id.clone(),
                            instructions: binding.instructions,
                            provider: binding.provider,
                            model: binding.model,
                            max_tokens: binding.max_tokens,
                            tools: binding.tools,
                            output_schema: binding.output_schema,
                        })
                    }
                    NodeKind::Router { .. } => Operator::Router,
                    NodeKind::Parallel {
                        parallel_nodes,
                        fan_out_key,
                    } => Operator::Parallel(ParallelOperator {
                        targets: parallel_nodes.clone(),
                        fan_out_key: fan_out_key.clone(),
                        barrier: None,
                    }),
                    NodeKind::Join {
                        strategy,
                        output_key,
                    } => Operator::Join(JoinOperator {
                        strategy: *strategy,
                        output_key: output_key.clone(),
                        sources: Vec::new(),
                    }),
                    NodeKind::Subgraph {
                        subgraph_workflow_id,
                    } => {
                        if stack.contains(subgraph_workflow_id) {
                            return Err(GraphError::Compilation {
                                workflow_id: def.id,
                                message: format!(
                                    "subgraph inclusion cycle through workflow {}",
                                    subgraph_workflow_id
                                ),
                            });
                        }
                        let sub_def =
                            self.resolver.load_workflow(*subgraph_workflow_id).await?;
                        let mut sub_stack = stack.clone();
                        sub_stack.push(*subgraph_workflow_id);
                        let sub_plan = self.compile_with_stack(&sub_def, sub_stack).await?;
                        Operator::Subgraph(SubgraphOperator {
                            node_id: node.node_id.clone(),
                            plan: Arc::new(sub_plan),
                        })
                    }
                };
                operators.insert(node.node_id.clone(), operator);
            }

            let edges = build_edge_groups(def, &operators);
            wire_barriers(def, &mut operators, &edges)?;

            Ok(Plan {
                workflow_id: def.id,
                operators,
                edges,
                schema,
                timeouts,
            })
        })
    }
}

/// Group edges by source. Router sources take their group from
/// `router_config`; parallel sources get no group at all - their routing is
/// the `Send` dispatch.
fn build_edge_groups(
    def: &WorkflowDef,
    operators: &HashMap<NodeId, Operator>,
) -> HashMap<NodeId, EdgeGroup> {
    let mut by_source: HashMap<&str, Vec<&EdgeDef>> = HashMap::new();
    let mut source_order: Vec<&str> = Vec::new();
    for edge in &def.edges {
        let entry = by_source.entry(edge.source_node.as_str()).or_default();
        if entry.is_empty() {
            source_order.push(edge.source_node.as_str());
        }
        entry.push(edge);
    }

    let mut groups = HashMap::new();

    for source in source_order {
        if matches!(operators.get(source), Some(Operator::Parallel(_))) {
            continue;
        }

        if let Some(def_node) = def.node(source) {
            if let NodeKind::Router { router_config } = &def_node.kind {
                groups.insert(source.to_string(), router_group(router_config));
                continue;
            }
        }

        let edges = &by_source[source];
        let group = if edges.len() == 1 && edges[0].condition.is_none() {
            EdgeGroup::Direct(edges[0].target_node.clone())
        } else {
            let mut routes = Vec::new();
            let mut default = END.to_string();
            for edge in edges {
                match &edge.condition {
                    Some(condition) => routes.push(CompiledRoute {
                        expr: expr::parse(condition).ok(),
                        raw: condition.clone(),
                        target: edge.target_node.clone(),
                    }),
                    None => default = edge.target_node.clone(),
                }
            }
            EdgeGroup::Conditional { routes, default }
        };
        groups.insert(source.to_string(), group);
    }

    // Routers with no stored edge rows still route through their config.
    for node in &def.nodes {
        if let NodeKind::Router { router_config } = &node.kind {
            groups
                .entry(node.node_id.clone())
                .or_insert_with(|| router_group(router_config));
        }
    }

    groups
}

fn router_group(router_config: &crate::graph::RouterConfig) -> EdgeGroup {
    let routes = router_config
        .routes
        .iter()
        .map(|rule| CompiledRoute {
            expr: expr::parse(&rule.condition).ok(),
            raw: rule.condition.clone(),
            target: rule.target.clone(),
        })
        .collect();
    EdgeGroup::Conditional {
        routes,
        default: router_config
            .default
            .clone()
            .unwrap_or_else(|| END.to_string()),
    }
}

/// Wire each parallel operator to the join its siblings converge on, and
/// reject the structurally detectable non-commutative conflicts: routers as
/// siblings, nested fan-out, and join siblings claiming the same output key.
fn wire_barriers(
    def: &WorkflowDef,
    operators: &mut HashMap<NodeId, Operator>,
    edges: &HashMap<NodeId, EdgeGroup>,
) -> Result<()> {
    let parallel_nodes: Vec<(NodeId, Vec<NodeId>)> = operators
        .iter()
        .filter_map(|(id, op)| match op {
            Operator::Parallel(p) => Some((id.clone(), p.targets.clone())),
            _ => None,
        })
        .collect();

    for (parallel_id, targets) in parallel_nodes {
        let mut convergence: Option<NodeId> = None;
        let mut join_output_keys: HashMap<String, NodeId> = HashMap::new();

        for target in &targets {
            match operators.get(target) {
                Some(Operator::Parallel(_)) => {
                    return Err(compile_err(
                        def.id,
                        format!(
                            "parallel node '{}': nested fan-out via '{}' is not supported",
                            parallel_id, target
                        ),
                    ));
                }
                Some(Operator::Router) => {
                    return Err(compile_err(
                        def.id,
                        format!(
                            "parallel node '{}': sibling '{}' is a router; routers claim \
                             'current_node' and cannot run as fan-out siblings",
                            parallel_id, target
                        ),
                    ));
                }
                Some(Operator::Join(join)) => {
                    if let Some(other) =
                        join_output_keys.insert(join.output_key.clone(), target.clone())
                    {
                        return Err(compile_err(
                            def.id,
                            format!(
                                "parallel node '{}': siblings '{}' and '{}' both write \
                                 state key '{}'",
                                parallel_id, other, target, join.output_key
                            ),
                        ));
                    }
                }
                _ => {}
            }

            let next = match edges.get(target) {
                Some(EdgeGroup::Direct(next)) => next.clone(),
                Some(EdgeGroup::Conditional { .. }) => {
                    return Err(compile_err(
                        def.id,
                        format!(
                            "parallel node '{}': sibling '{}' must converge through a \
                             direct edge",
                            parallel_id, target
                        ),
                    ));
                }
                None => {
                    return Err(compile_err(
                        def.id,
                        format!(
                            "parallel node '{}': sibling '{}' has no outgoing edge",
                            parallel_id, target
                        ),
                    ));
                }
            };

            match &convergence {
                None => convergence = Some(next),
                Some(existing) if *existing == next => {}
                Some(existing) => {
                    return Err(compile_err(
                        def.id,
                        format!(
                            "parallel node '{}': siblings diverge to '{}' and '{}'",
                            parallel_id, existing, next
                        ),
                    ));
                }
            }
        }

        let convergence = convergence.filter(|target| target != END);

        if let Some(join_id) = &convergence {
            if let Some(Operator::Join(join)) = operators.get_mut(join_id) {
                join.sources = targets.clone();
            }
        }
        if let Some(Operator::Parallel(parallel)) = operators.get_mut(&parallel_id) {
            parallel.barrier = convergence;
        }
    }

    Ok(())
}

fn compile_err(workflow_id: Uuid, message: String) -> GraphError {
    GraphError::Compilation {
        workflow_id,
        message,
    }
}
