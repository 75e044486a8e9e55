use cleft_analysis::reachable::defined_integer_values;
use cleft_analysis::ReachableIntegerValues;
use cleft_core::cfg_ir::{FunctionBuilder, Predicate, Type};
use cleft_core::{DominatorTree, Function};
use indexmap::IndexSet;

/// entry(n, p) branches on `n` into a loop whose exit stores into `p`.
fn loop_with_side_exit() -> Function {
    let mut b = FunctionBuilder::new("walk", &[Type::I32, Type::Ptr]);
    let (n, p) = (b.param(0), b.param(1));
    let entry = b.entry_block();
    let header = b.create_block();
    let body = b.create_block();
    let early = b.create_block();
    let exit = b.create_block();
    let neg = b.icmp(Predicate::Slt, n, 0);
    b.branch(neg, early, header);

    b.switch_to_block(header);
    let i = b.merge(Type::I32, &[(entry, 0i64.into())]);
    let more = b.icmp(Predicate::Slt, i, n);
    b.branch(more, body, exit);

    b.switch_to_block(body);
    let next = b.add(i, 1);
    let slot = b.alloca();
    b.store(slot, next);
    b.jump(header);
    b.add_incoming(i, body, next).unwrap();

    b.switch_to_block(early);
    b.store(p, n);
    b.jump(exit);

    b.switch_to_block(exit);
    b.ret(None);
    b.finish().unwrap()
}

fn analyse(func: &Function) -> (DominatorTree, ReachableIntegerValues) {
    let tree = DominatorTree::compute(func);
    let mut analysis = ReachableIntegerValues::new();
    analysis.run(func, &tree);
    (tree, analysis)
}

#[test]
fn test_entry_holds_exactly_the_arguments() {
    let func = loop_with_side_exit();
    let (_, analysis) = analyse(&func);
    let entry: Vec<_> = analysis.values(func.entry).unwrap().iter().copied().collect();
    assert_eq!(entry, func.params);
}

#[test]
fn test_children_inherit_from_their_dominator() {
    let func = loop_with_side_exit();
    let (tree, analysis) = analyse(&func);
    let defined = defined_integer_values(&func);
    for block in func.blocks() {
        let Some(idom) = tree.immediate_dominator(block) else {
            continue;
        };
        let own = analysis.values(block).unwrap();
        let mut expected: IndexSet<_> = analysis.values(idom).unwrap().clone();
        expected.extend(defined[&idom].iter().copied());
        assert!(
            expected.iter().all(|v| own.contains(v)),
            "bb{} misses values of bb{}",
            block.index(),
            idom.index()
        );
        assert_eq!(own.len(), expected.len());
    }
}

#[test]
fn test_block_never_sees_its_own_definitions() {
    let func = loop_with_side_exit();
    let (_, analysis) = analyse(&func);
    let defined = defined_integer_values(&func);
    for block in func.blocks() {
        let own = analysis.values(block).unwrap();
        assert!(defined[&block].iter().all(|v| !own.contains(v)));
    }
}

#[test]
fn test_pointers_are_only_visible_as_arguments() {
    let func = loop_with_side_exit();
    let (_, analysis) = analyse(&func);
    for block in func.blocks() {
        for value in analysis.values(block).unwrap() {
            let ty = func.value_type(*value).unwrap();
            assert!(ty.is_integer() || func.is_param(*value));
        }
    }
}

#[test]
fn test_rerun_gives_the_same_map() {
    let func = loop_with_side_exit();
    let (tree, mut analysis) = analyse(&func);
    let first = analysis.map().clone();
    analysis.run(&func, &tree);
    assert_eq!(&first, analysis.map());
}

#[test]
fn test_unreachable_block_is_empty() {
    let mut b = FunctionBuilder::new("f", &[Type::I32]);
    let x = b.param(0);
    let dead = b.create_block();
    b.ret(Some(x.into()));
    b.switch_to_block(dead);
    b.ret(None);
    let func = b.finish().unwrap();

    let (_, analysis) = analyse(&func);
    assert!(analysis.values(dead).unwrap().is_empty());
}
