use cleft_core::cfg_ir::{FunctionBuilder, Predicate, Type};
use cleft_core::{verify::verify, Function, Module};
use cleft_transform::{build_passes, pass, PassConfig};
use cleft_utils::{Ratio, Seed};
use cleft_verification::{execute, PracticalTester, VerificationConfig};

/// Sums `step` into `*acc` until it exceeds `limit`, returning the iteration count.
fn accumulate() -> Function {
    let mut b = FunctionBuilder::new("accumulate", &[Type::Ptr, Type::I32, Type::I32]);
    let (acc, step, limit) = (b.param(0), b.param(1), b.param(2));
    let entry = b.entry_block();
    let header = b.create_block();
    let body = b.create_block();
    let exit = b.create_block();
    let start = b.load(Type::I32, acc);
    b.jump(header);

    b.switch_to_block(header);
    let count = b.merge(Type::I32, &[(entry, 0i64.into())]);
    let total = b.merge(Type::I32, &[(entry, start.into())]);
    let over = b.icmp(Predicate::Sgt, total, limit);
    let capped = b.icmp(Predicate::Sge, count, 20);
    let stop = b.binary(cleft_core::cfg_ir::BinaryOp::Or, over, capped);
    b.branch(stop, exit, body);

    b.switch_to_block(body);
    let next_total = b.add(total, step);
    let next_count = b.add(count, 1);
    b.store(acc, next_total);
    b.jump(header);
    b.add_incoming(count, body, next_count).unwrap();
    b.add_incoming(total, body, next_total).unwrap();

    b.switch_to_block(exit);
    b.ret(Some(count.into()));
    b.finish().unwrap()
}

/// Branch-free bit fiddling over a narrow type.
fn mix() -> Function {
    let mut b = FunctionBuilder::new("mix", &[Type::I8, Type::I8]);
    let (x, y) = (b.param(0), b.param(1));
    let s = b.add(x, y);
    let t = b.xor(s, 0x5a);
    let u = b.and(t, y);
    let v = b.add(u, s);
    let w = b.mul(v, 3);
    b.ret(Some(w.into()));
    b.finish().unwrap()
}

fn module() -> Module {
    Module {
        name: "equivalence".into(),
        functions: vec![accumulate(), mix()],
    }
}

#[test]
fn test_reference_semantics() {
    let run = execute(&accumulate(), &[10, 5, 30], 10_000).unwrap();
    assert_eq!(run.value, Some(5));
    assert_eq!(run.memory, vec![35]);

    let run = execute(&mix(), &[100, 100], 100).unwrap();
    // s = -56, t = -110, u = 0, v = -56, w = -168 wraps to 88
    assert_eq!(run.value, Some(88));
}

#[test]
fn test_pipeline_preserves_behaviour_across_seeds() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    let tester = PracticalTester::new(VerificationConfig::development()).unwrap();
    for (seed, ratio) in [(1, 1.0), (2, 0.5), (3, 0.25), (4, 1.0)] {
        let ratio = Ratio::new(ratio).unwrap();
        let cfg = PassConfig {
            duplicate_ratio: ratio,
            mba_ratio: ratio,
            ..PassConfig::default()
        };
        let passes = build_passes(&["duplicate-bb", "mba"], &cfg).unwrap();
        let original = module();
        let mut transformed = module();
        pass::run_module(&mut transformed, &passes, &cfg, &Seed::from_u64(seed)).unwrap();

        for func in &transformed.functions {
            verify(func).unwrap();
        }
        for result in tester.test_module(&original, &transformed).unwrap() {
            assert!(
                result.overall_passed,
                "seed {seed}: {} mismatches on {}: {:?}",
                result.mismatches.len(),
                result.function,
                result.mismatches
            );
        }
    }
}

#[test]
fn test_repeated_duplication_stays_equivalent() {
    let cfg = PassConfig::default();
    let passes = build_passes(&["duplicate-bb", "duplicate-bb", "mba"], &cfg).unwrap();
    let original = accumulate();
    let mut transformed = accumulate();
    let outcomes = pass::run(&mut transformed, &passes, &cfg, &Seed::from_u64(77)).unwrap();
    assert_eq!(outcomes.len(), 3);
    assert!(outcomes.iter().all(|o| o.kept));
    verify(&transformed).unwrap();

    let tester = PracticalTester::new(VerificationConfig::development()).unwrap();
    let result = tester.test_equivalence(&original, &transformed).unwrap();
    assert!(result.overall_passed, "{:?}", result.mismatches);
}
