use cleft_core::cfg_ir::{FunctionBuilder, Predicate, Type};
use cleft_core::{verify::verify, Module};
use cleft_transform::{build_passes, pass, PassConfig};
use cleft_utils::Seed;

#[test]
fn test_transformed_module_survives_json() {
    let mut b = FunctionBuilder::new("max", &[Type::I16, Type::I16]);
    let (x, y) = (b.param(0), b.param(1));
    let left = b.create_block();
    let join = b.create_block();
    let entry = b.entry_block();
    let c = b.icmp(Predicate::Sgt, x, y);
    b.branch(c, left, join);
    b.switch_to_block(left);
    let bumped = b.add(x, 0);
    b.jump(join);
    b.switch_to_block(join);
    let m = b.merge(Type::I16, &[(entry, y.into()), (left, bumped.into())]);
    b.ret(Some(m.into()));

    let mut module = Module {
        name: "unit".into(),
        functions: vec![b.finish().unwrap()],
    };
    let cfg = PassConfig::default();
    let passes = build_passes(&["duplicate-bb", "mba"], &cfg).unwrap();
    pass::run_module(&mut module, &passes, &cfg, &Seed::from_u64(5)).unwrap();

    let text = serde_json::to_string(&module).unwrap();
    let back: Module = serde_json::from_str(&text).unwrap();
    assert_eq!(back.name, "unit");
    assert_eq!(back.functions[0].to_string(), module.functions[0].to_string());
    verify(&back.functions[0]).unwrap();
}
