/// Module for computing analytical metrics to evaluate CFG obfuscation transforms.
///
/// Implements a minimal set of metrics quantified by code size, control flow complexity and
/// dominator overlap to assess transform potency (analyst effort) against code growth. The module
/// provides functions to collect metrics from a `Function`, compare pre- and post-obfuscation
/// states, and compute dominator/post-dominator pairs for control flow analysis.
///
/// # Usage
/// ```rust,ignore
/// let func = builder.finish()?;
/// let metrics = metrics::collect_metrics(&func)?;
/// println!("{}", serde_json::to_string_pretty(&metrics)?);
/// ```
use cleft_core::cfg_ir::{EdgeType, Function, Instruction};
use cleft_utils::errors::MetricsError;
use petgraph::{
    algo::dominators::simple_fast,
    graph::{DiGraph, NodeIndex},
    visit::Reversed,
    Direction,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Represents a set of analytical metrics for evaluating obfuscation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    /// Number of basic blocks in the CFG.
    pub block_cnt: usize,
    /// Number of edges in the CFG.
    pub edge_cnt: usize,
    /// Number of instructions, terminators and merges included.
    pub inst_cnt: usize,
    /// Number of merge nodes.
    pub merge_cnt: usize,
    /// Fraction of nodes whose immediate dominator is also their immediate post-dominator.
    pub dom_overlap: f64,
    /// Composite potency score (heuristic based on nodes, edges, and overlap).
    pub potency: f64,
}

/// Collects metrics from a function's CFG.
///
/// # Returns
/// A `Metrics` struct with computed metrics, or an error if the CFG is empty.
pub fn collect_metrics(func: &Function) -> Result<Metrics, MetricsError> {
    if func.cfg.node_count() == 0 {
        return Err(MetricsError::EmptyCfg);
    }

    let (doms, post_doms) = dominator_pairs(func);
    let overlap = dom_overlap(&doms, &post_doms);

    let merge_cnt = func
        .cfg
        .node_weights()
        .flat_map(|block| block.instructions.iter())
        .filter(|inst| matches!(inst, Instruction::Merge(_)))
        .count();
    let block_cnt = func.block_count();
    let edge_cnt = func.cfg.edge_count();

    Ok(Metrics {
        block_cnt,
        edge_cnt,
        inst_cnt: func.instruction_count(),
        merge_cnt,
        dom_overlap: overlap,
        potency: score(overlap, block_cnt, edge_cnt),
    })
}

// Define a type alias for the HashMap used in dominator pairs
type DominatorMap = HashMap<NodeIndex, NodeIndex>;

/// Computes dominator and post-dominator pairs for the CFG.
///
/// Post-dominators are computed on the reversed graph from a virtual exit node that every
/// block without successors flows into.
fn dominator_pairs(func: &Function) -> (DominatorMap, DominatorMap) {
    let doms = simple_fast(&func.cfg, func.entry);
    let mut dom_map = HashMap::new();
    for n in func.cfg.node_indices() {
        if let Some(idom) = doms.immediate_dominator(n) {
            dom_map.insert(n, idom);
        }
    }

    let mut g: DiGraph<(), EdgeType> = func.cfg.map(|_, _| (), |_, e| *e);
    let exit = g.add_node(());
    let sinks: Vec<NodeIndex> = func
        .cfg
        .node_indices()
        .filter(|&n| {
            func.cfg
                .neighbors_directed(n, Direction::Outgoing)
                .next()
                .is_none()
        })
        .collect();
    for sink in sinks {
        g.add_edge(sink, exit, EdgeType::Jump);
    }

    let post = simple_fast(Reversed(&g), exit);
    let mut pdom_map = HashMap::new();
    for n in func.cfg.node_indices() {
        if let Some(ipdom) = post.immediate_dominator(n) {
            if ipdom != exit {
                pdom_map.insert(n, ipdom);
            }
        }
    }

    (dom_map, pdom_map)
}

/// Computes the fraction of nodes whose dominator and post-dominator coincide.
///
/// A higher overlap suggests a more linear CFG, reducing obfuscation potency.
fn dom_overlap(doms: &DominatorMap, pdoms: &DominatorMap) -> f64 {
    let common = doms
        .iter()
        .filter(|(n, d)| pdoms.get(*n) == Some(*d))
        .count();
    if doms.is_empty() {
        0.0
    } else {
        common as f64 / doms.len() as f64
    }
}

/// Computes a composite potency score for the CFG.
///
/// Combines block count, edge count, and dominator overlap into a heuristic score estimating
/// analyst effort. Weights are tuned for prototype use.
fn score(overlap: f64, nodes: usize, edges: usize) -> f64 {
    5.0 * (nodes as f64).log2() + edges as f64 + 30.0 * (1.0 - overlap)
}

/// Compares two sets of metrics to evaluate an obfuscation transform.
///
/// Computes the difference in potency scores, adjusted for instruction count growth. A positive
/// result indicates the transform increases complexity without excessive size growth.
pub fn compare(before: &Metrics, after: &Metrics) -> f64 {
    after.potency - before.potency - 0.25 * (after.inst_cnt as f64 - before.inst_cnt as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cleft_core::cfg_ir::{FunctionBuilder, Type};

    fn linear() -> Function {
        let mut b = FunctionBuilder::new("linear", &[Type::I32]);
        let x = b.param(0);
        let next = b.create_block();
        let y = b.add(x, x);
        b.jump(next);
        b.switch_to_block(next);
        b.ret(Some(y.into()));
        b.finish().unwrap()
    }

    fn diamond() -> Function {
        let mut b = FunctionBuilder::new("diamond", &[Type::I1]);
        let c = b.param(0);
        let left = b.create_block();
        let right = b.create_block();
        let join = b.create_block();
        b.branch(c, left, right);
        b.switch_to_block(left);
        b.jump(join);
        b.switch_to_block(right);
        b.jump(join);
        b.switch_to_block(join);
        let m = b.merge(Type::I32, &[(left, 1i64.into()), (right, 2i64.into())]);
        b.ret(Some(m.into()));
        b.finish().unwrap()
    }

    /// Tests metrics computation for linear control flow.
    #[test]
    fn test_collect_metrics_linear() {
        let metrics = collect_metrics(&linear()).expect("Metrics computation failed");
        assert_eq!(metrics.block_cnt, 2, "Block count mismatch");
        assert_eq!(metrics.edge_cnt, 1);
        assert_eq!(metrics.inst_cnt, 3);
        assert_eq!(metrics.merge_cnt, 0);
        assert_eq!(metrics.dom_overlap, 0.0, "Linear CFG has no shared idom/ipdom");
        assert!(metrics.potency > 0.0, "Potency score should be positive");
    }

    #[test]
    fn test_collect_metrics_diamond() {
        let metrics = collect_metrics(&diamond()).unwrap();
        assert_eq!(metrics.block_cnt, 4);
        assert_eq!(metrics.edge_cnt, 4);
        assert_eq!(metrics.merge_cnt, 1);
        assert!(
            metrics.dom_overlap >= 0.0 && metrics.dom_overlap <= 1.0,
            "Invalid overlap"
        );
    }

    #[test]
    fn test_compare_prefers_more_complex_cfg() {
        let before = collect_metrics(&linear()).unwrap();
        let after = collect_metrics(&diamond()).unwrap();
        assert!(compare(&before, &after) > 0.0);
        assert_eq!(compare(&before, &before), 0.0);
    }
}
