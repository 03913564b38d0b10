// End-to-end tests: IR text in, finished register allocation out. These
// exercise the whole pipeline (parser, builder, dominance, liveness,
// intervals, linear scan) the way the sirac driver drives it.

use sira::ir::{Inst, LocalValue, Value};
use sira::x64::call_convention::GP_ARGUMENT_REGS;
use sira::x64::{Emitter, Operand, TextEmitter};

#[test]
fn diamond_round_trip_shares_one_operand() {
    let module = sira::parse::parse_module(
        r#"
        fn pick(i64 %a): i64 {
        entry:
          %c = icmp gt i64 %a, 0
          condbr %c, ^pos, ^neg
        pos:
          %x = add i64 %a, 1
          br ^join
        neg:
          %y = sub i64 0, %a
          br ^join
        join:
          %p = phi i64 [%x, ^pos], [%y, ^neg]
          ret i64 %p
        }
        "#,
    )
    .unwrap();
    let func = module.find_function("pick").unwrap();
    let alloc = func.register_allocation();
    let ivs = func.live_intervals();

    // Find the phi; its group is the phi plus one copy per arm.
    let phi = func
        .inst_ids()
        .find(|&id| func.inst(id).inst.is_phi())
        .unwrap();
    let group = ivs.group(LocalValue::Local(phi)).unwrap();
    assert_eq!(group.len(), 3);
    let shared = alloc.operand(group[0]);
    for &m in group {
        assert_eq!(alloc.operand(m), shared);
    }
    // The shared storage is distinct from the argument's register.
    assert_ne!(shared, alloc.operand(LocalValue::Argument(func.args()[0].id)));
}

#[test]
fn eight_parameters_follow_the_convention() {
    let module = sira::parse::parse_module(
        r#"
        fn wide(i64 %a, i64 %b, i64 %c, i64 %d, i64 %e, i64 %f, i64 %g, i64 %h): i64 {
        entry:
          %s = add i64 %a, %h
          ret i64 %s
        }
        "#,
    )
    .unwrap();
    let func = module.find_function("wide").unwrap();
    let alloc = func.register_allocation();
    for (i, arg) in func.args().iter().take(6).enumerate() {
        assert_eq!(
            alloc.operand(LocalValue::Argument(arg.id)),
            Operand::Gp(GP_ARGUMENT_REGS[i])
        );
    }
    assert_eq!(
        alloc.operand(LocalValue::Argument(func.args()[6].id)),
        Operand::ArgSlot { offset: 16 }
    );
    assert_eq!(
        alloc.operand(LocalValue::Argument(func.args()[7].id)),
        Operand::ArgSlot { offset: 24 }
    );
}

#[test]
fn call_heavy_program_allocates_soundly() {
    let module = sira::parse::parse_module(
        r#"
        extern fn observe(i64, i64, i64, i64, i64, i64, i64, i64): i64
        fn driver(i64 %n): i64 {
        entry:
          br ^head
        head:
          %i = phi i64 [0, ^entry], [%next, ^body]
          %cond = icmp lt i64 %i, %n
          condbr %cond, ^body, ^done
        body:
          %r = call i64 @observe(%i, %i, %i, %i, %i, %i, %i, %i)
          %next = add i64 %i, 1
          br ^head
        done:
          ret i64 %i
        }
        "#,
    )
    .unwrap();
    let func = module.find_function("driver").unwrap();
    let alloc = func.register_allocation();
    let ivs = func.live_intervals();

    // The eight pinned argument copies land on the convention slots.
    let call = func
        .inst_ids()
        .find(|&id| matches!(func.inst(id).inst, Inst::Call { .. }))
        .unwrap();
    let Inst::Call { args, .. } = &func.inst(call).inst else {
        unreachable!()
    };
    for (i, arg) in args.iter().take(6).enumerate() {
        let Value::Local(copy) = arg else {
            panic!("call argument is not a copy")
        };
        assert_eq!(
            alloc.operand(LocalValue::Local(*copy)),
            Operand::Gp(GP_ARGUMENT_REGS[i])
        );
    }
    assert_eq!(alloc.call_overflow_area(call), 16);

    // No two simultaneously live values outside one group share an
    // operand.
    let entries: Vec<_> = ivs
        .iter()
        .filter(|(v, _)| func.type_of(*v).is_allocatable())
        .collect();
    for (i, &(va, ra)) in entries.iter().enumerate() {
        for &(vb, rb) in &entries[i + 1..] {
            if ra.intersects(rb) && alloc.operand(va) == alloc.operand(vb) {
                let same_group = ivs.group(va).is_some_and(|g| g.contains(&vb));
                assert!(same_group, "{va} and {vb} collide");
            }
        }
    }
}

#[test]
fn mixed_module_emits_a_listing() {
    let module = sira::parse::parse_module(
        r#"
        extern fn print(i64): void
        fn modsum(i64 %a, i64 %b): i64 {
        entry:
          %t = divrem i64 %a, %b
          %q = proj %t, 0
          %r = proj %t, 1
          %s = add i64 %q, %r
          call void @print(%s)
          ret i64 %s
        }
        "#,
    )
    .unwrap();
    let func = module.find_function("modsum").unwrap();
    let listing = TextEmitter.emit(func, func.register_allocation());
    assert!(listing.contains("@modsum:"));
    assert!(listing.contains("divrem"));
    assert!(listing.contains("call @print"));
}

#[test]
fn error_paths_surface_as_compile_errors() {
    for (src, needle) in [
        ("fn f(): i64 {\nentry:\n  ret i64 %nope\n}", "undefined value"),
        (
            "fn f(): i64 {\nentry:\n  %x = add i64 1, 2\n  %x = add i64 3, 4\n  ret i64 %x\n}",
            "value redefined",
        ),
        (
            "fn f(): void {\nentry:\n  call void @ghost()\n  ret void\n}",
            "unresolved callee",
        ),
        (
            "fn f(): i64 {\nentry:\n  %x = add i32 1, 2\n  ret i64 %x\n}",
            "type mismatch",
        ),
    ] {
        let err = sira::parse::parse_module(src).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains(needle), "{msg:?} does not mention {needle:?}");
    }
}
