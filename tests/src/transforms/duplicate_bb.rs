use cleft_analysis::ReachableIntegerValues;
use cleft_core::cfg_ir::{
    BlockId, FunctionBuilder, Instruction, Opcode, Operand, Predicate, Terminator, Type,
};
use cleft_core::{verify::verify, DominatorTree, Function, ValueId};
use cleft_transform::duplicate_bb::{
    duplicate, duplicate_blocks, select_targets, DuplicateBb, DuplicationTarget, RewriteMap,
};
use cleft_transform::selector::RandomSelector;
use cleft_transform::Transform;
use cleft_utils::Ratio;
use cleft_verification::{PracticalTester, VerificationConfig};
use rand::rngs::StdRng;
use rand::SeedableRng;

/// Entry defines `x`; A only touches memory; Exit returns `x`.
fn entry_a_exit() -> (Function, BlockId, BlockId, ValueId) {
    let mut b = FunctionBuilder::new("scenario", &[]);
    let a_block = b.create_block();
    let exit = b.create_block();
    let x = b.copy(Operand::Const(5));
    b.jump(a_block);
    b.switch_to_block(a_block);
    let slot = b.alloca();
    b.store(slot, x);
    b.jump(exit);
    b.switch_to_block(exit);
    b.ret(Some(x.into()));
    (b.finish().unwrap(), a_block, exit, x)
}

fn reachable(func: &Function) -> ReachableIntegerValues {
    let mut analysis = ReachableIntegerValues::new();
    analysis.run(func, &DominatorTree::compute(func));
    analysis
}

#[test]
fn test_entry_a_exit_scenario() {
    let (mut func, a_block, exit, x) = entry_a_exit();
    let analysis = reachable(&func);
    assert!(analysis.values(func.entry).unwrap().is_empty());
    assert_eq!(analysis.values(a_block).unwrap().len(), 1);
    assert!(analysis.values(a_block).unwrap().contains(&x));
    assert_eq!(analysis.values(exit).unwrap().len(), 1);
    assert!(analysis.values(exit).unwrap().contains(&x));

    let out = duplicate(
        &mut func,
        DuplicationTarget {
            block: a_block,
            context: x,
        },
        &mut RewriteMap::new(),
    )
    .unwrap();
    let diamond = out.diamond;

    // Entry -> Guard(A) -> {Then, Else} -> Tail -> Exit
    assert_eq!(func.successors(func.entry), vec![a_block]);
    let mut arms = func.successors(a_block);
    arms.sort();
    assert_eq!(arms, vec![diamond.then_block, diamond.else_block]);
    assert_eq!(func.successors(diamond.then_block), vec![diamond.tail]);
    assert_eq!(func.successors(diamond.else_block), vec![diamond.tail]);
    assert_eq!(func.successors(diamond.tail), vec![exit]);

    let guard = func.block(a_block).unwrap();
    let Instruction::Op(icmp) = &guard.instructions[0] else {
        panic!("guard must start with the comparison");
    };
    assert_eq!(icmp.opcode, Opcode::Icmp(Predicate::Eq));
    assert_eq!(icmp.operands, vec![Operand::Value(x), Operand::Const(0)]);

    // alloca, store and jump in each arm; one merge for the slot in the tail
    for arm in [diamond.then_block, diamond.else_block] {
        assert_eq!(func.block(arm).unwrap().instructions.len(), 3);
    }
    let tail = func.block(diamond.tail).unwrap();
    assert_eq!(tail.instructions.len(), 2);
    assert!(tail.instructions[0].is_merge());
    assert!(matches!(
        tail.terminator(),
        Some(Terminator::Jump { target }) if *target == exit
    ));
    verify(&func).unwrap();
}

#[test]
fn test_merge_incoming_values_are_the_clones() {
    let mut b = FunctionBuilder::new("chain", &[Type::I64]);
    let n = b.param(0);
    let body = b.create_block();
    b.jump(body);
    b.switch_to_block(body);
    let a = b.add(n, 1);
    let c = b.mul(a, a);
    b.ret(Some(c.into()));
    let mut func = b.finish().unwrap();

    let out = duplicate(
        &mut func,
        DuplicationTarget {
            block: body,
            context: n,
        },
        &mut RewriteMap::new(),
    )
    .unwrap();
    let diamond = out.diamond;
    assert_eq!(out.merges, 2);

    let tail = func.block(diamond.tail).unwrap();
    for (index, inst) in tail.instructions[..2].iter().enumerate() {
        let Instruction::Merge(merge) = inst else {
            panic!("tail must start with merges");
        };
        for (arm, operand) in &merge.incoming {
            let arm_inst = &func.block(*arm).unwrap().instructions[index];
            assert_eq!(*operand, Operand::Value(arm_inst.result().unwrap()));
        }
    }

    // The clone of `a * a` in each arm reads that arm's clone of `a`.
    for arm in [diamond.then_block, diamond.else_block] {
        let insts = &func.block(arm).unwrap().instructions;
        let cloned_a = insts[0].result().unwrap();
        let Instruction::Op(mul) = &insts[1] else {
            panic!("expected the cloned multiplication");
        };
        assert_eq!(mul.operands, vec![cloned_a.into(), cloned_a.into()]);
    }
    verify(&func).unwrap();
}

#[test]
fn test_later_guard_reads_the_rewritten_context() {
    let mut b = FunctionBuilder::new("twice", &[Type::I32]);
    let x = b.param(0);
    let first = b.create_block();
    let second = b.create_block();
    b.jump(first);
    b.switch_to_block(first);
    let y = b.add(x, 7);
    b.jump(second);
    b.switch_to_block(second);
    let z = b.sub(y, x);
    b.ret(Some(z.into()));
    let mut func = b.finish().unwrap();

    let analysis = reachable(&func);
    assert!(analysis.values(second).unwrap().contains(&y));

    let mut rewrite = RewriteMap::new();
    duplicate(
        &mut func,
        DuplicationTarget {
            block: first,
            context: x,
        },
        &mut rewrite,
    )
    .unwrap();
    let merged_y = rewrite[&y];
    assert_ne!(merged_y, y);

    duplicate(
        &mut func,
        DuplicationTarget {
            block: second,
            context: y,
        },
        &mut rewrite,
    )
    .unwrap();
    let Instruction::Op(icmp) = &func.block(second).unwrap().instructions[0] else {
        panic!("guard must start with the comparison");
    };
    assert_eq!(icmp.operands[0], Operand::Value(merged_y));
    assert!(func
        .blocks()
        .flat_map(|bb| func.block(bb).unwrap().instructions.iter())
        .all(|inst| inst.result() != Some(y) && !inst.used_values().any(|v| v == y)));
    verify(&func).unwrap();
}

#[test]
fn test_landing_blocks_are_never_selected() {
    let mut b = FunctionBuilder::new("landing", &[Type::I32]);
    let x = b.param(0);
    let normal = b.create_block();
    let pad = b.create_landing_pad();
    let c = b.icmp(Predicate::Eq, x, 3);
    b.branch(c, pad, normal);
    b.switch_to_block(normal);
    b.ret(Some(x.into()));
    b.switch_to_block(pad);
    let r = b.add(x, 1);
    b.ret(Some(r.into()));
    let func = b.finish().unwrap();

    let analysis = reachable(&func);
    for seed in 0..16 {
        let mut selector = RandomSelector::from_seed(seed);
        let targets = select_targets(&func, analysis.map(), Ratio::ALWAYS, &mut selector).unwrap();
        assert!(targets.iter().all(|t| t.block != pad));
        assert_eq!(targets.len(), 2);
    }

    let mut mutated = func.clone();
    let mut selector = RandomSelector::from_seed(1);
    duplicate_blocks(&mut mutated, analysis.map(), Ratio::ALWAYS, &mut selector).unwrap();
    assert_eq!(
        mutated.block(pad).unwrap().instructions,
        func.block(pad).unwrap().instructions
    );
    verify(&mutated).unwrap();
}

#[test]
fn test_zero_ratio_leaves_function_untouched() {
    let (func, ..) = entry_a_exit();
    let mut copy = func.clone();
    let mut rng = StdRng::seed_from_u64(8);
    let mutated = DuplicateBb::new(Ratio::NEVER)
        .apply(&mut copy, &mut rng)
        .unwrap();
    assert!(!mutated);
    assert_eq!(copy.block_count(), func.block_count());
    assert_eq!(copy.to_string(), func.to_string());
}

#[test]
fn test_blocks_without_context_are_skipped() {
    let mut b = FunctionBuilder::new("empty", &[]);
    let next = b.create_block();
    b.jump(next);
    b.switch_to_block(next);
    b.ret(None);
    let mut func = b.finish().unwrap();

    let mut rng = StdRng::seed_from_u64(0);
    assert!(!DuplicateBb::new(Ratio::ALWAYS)
        .apply(&mut func, &mut rng)
        .unwrap());
    assert_eq!(func.block_count(), 2);
}

#[test]
fn test_full_ratio_keeps_function_valid_across_seeds() {
    let (func, ..) = entry_a_exit();
    for seed in 0..8 {
        let mut copy = func.clone();
        let mut rng = StdRng::seed_from_u64(seed);
        assert!(DuplicateBb::new(Ratio::ALWAYS)
            .apply(&mut copy, &mut rng)
            .unwrap());
        // Entry has no context; A and Exit are duplicated.
        assert_eq!(copy.block_count(), func.block_count() + 6);
        verify(&copy).unwrap();
    }
}

/// Header jumping to itself, and a branch whose two targets are the same block.
fn odd_edges() -> Vec<Function> {
    let mut b = FunctionBuilder::new("self_loop", &[Type::I32]);
    let n = b.param(0);
    let entry = b.entry_block();
    let header = b.create_block();
    let exit = b.create_block();
    b.jump(header);
    b.switch_to_block(header);
    let i = b.merge(Type::I32, &[(entry, 0i64.into())]);
    let next = b.add(i, 1);
    let more = b.icmp(Predicate::Slt, next, n);
    b.branch(more, header, exit);
    b.add_incoming(i, header, next).unwrap();
    b.switch_to_block(exit);
    b.ret(Some(next.into()));
    let self_loop = b.finish().unwrap();

    let mut b = FunctionBuilder::new("same_target", &[Type::I16]);
    let x = b.param(0);
    let join = b.create_block();
    let c = b.icmp(Predicate::Eq, x, 0);
    b.branch(c, join, join);
    b.switch_to_block(join);
    let y = b.add(x, 1);
    b.ret(Some(y.into()));
    let same_target = b.finish().unwrap();

    vec![self_loop, same_target]
}

#[test]
fn test_odd_edges_stay_valid_and_equivalent() {
    let tester = PracticalTester::new(VerificationConfig::development()).unwrap();
    for original in odd_edges() {
        for seed in 0..16 {
            let mut copy = original.clone();
            let mut rng = StdRng::seed_from_u64(seed);
            assert!(DuplicateBb::new(Ratio::ALWAYS)
                .apply(&mut copy, &mut rng)
                .unwrap());
            verify(&copy).unwrap();
            let result = tester.test_equivalence(&original, &copy).unwrap();
            assert!(
                result.overall_passed,
                "{} with seed {seed}: {:?}",
                original.name, result.mismatches
            );
        }
    }
}
