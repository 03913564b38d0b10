// This binary is the sira driver. It reads an IR text file, parses it into
// a module and prints the requested stage for every function: the parsed IR,
// the dominator tree, the liveness sets, the live intervals or the finished
// register allocation. User errors print as `error: ...` and exit with code
// 1; internal invariant violations panic loudly, which is deliberate so the
// two are never confused.

use std::process::ExitCode;

use clap::{Parser, ValueEnum};

use sira::ir::FunctionData;
use sira::x64::{Emitter, TextEmitter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum DumpStage {
    /// The parsed IR after builder normalization.
    Ir,
    /// Immediate dominators per block.
    Doms,
    /// Live-in/live-out sets per block.
    Liveness,
    /// Live intervals in begin order.
    Intervals,
    /// The register allocation.
    Alloc,
    /// Instruction listing with resolved operands.
    Emit,
}

/// SSA IR analyzer and register allocator.
#[derive(Parser, Debug)]
#[command(name = "sirac", version, about)]
struct Cli {
    /// IR text file to compile.
    input: std::path::PathBuf,

    /// Which stage to print.
    #[arg(long, value_enum, default_value_t = DumpStage::Alloc)]
    dump: DumpStage,
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    let source = match std::fs::read_to_string(&cli.input) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("error: cannot read {}: {e}", cli.input.display());
            return ExitCode::FAILURE;
        }
    };
    let module = match sira::parse::parse_module(&source) {
        Ok(m) => m,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::FAILURE;
        }
    };

    for func in module.functions() {
        dump_function(func, cli.dump);
    }
    ExitCode::SUCCESS
}

fn dump_function(func: &FunctionData, stage: DumpStage) {
    match stage {
        DumpStage::Ir => print!("{}", func.display()),
        DumpStage::Doms => {
            let dom = func.dominator_tree();
            println!("dominators of @{}:", func.name());
            for (id, block) in func.blocks().iter() {
                match dom.idom(id) {
                    Some(idom) => println!(
                        "  ^{} <- ^{}",
                        block.name,
                        func.blocks().get(idom).name
                    ),
                    None => println!("  ^{} (entry)", block.name),
                }
            }
        }
        DumpStage::Liveness => {
            let live = func.liveness();
            println!("liveness of @{}:", func.name());
            for (id, block) in func.blocks().iter() {
                let mut ins: Vec<String> = live
                    .live_in(id)
                    .iter()
                    .map(|&v| func.value_name(v))
                    .collect();
                let mut outs: Vec<String> = live
                    .live_out(id)
                    .iter()
                    .map(|&v| func.value_name(v))
                    .collect();
                ins.sort();
                outs.sort();
                println!("  ^{}: in {ins:?} out {outs:?}", block.name);
            }
        }
        DumpStage::Intervals => {
            let ivs = func.live_intervals();
            println!("live intervals of @{}:", func.name());
            for (v, range) in ivs.iter() {
                let grouped = if ivs.group(v).is_some() { " (grouped)" } else { "" };
                println!("  %{} {range}{grouped}", func.value_name(v));
            }
        }
        DumpStage::Alloc => {
            let alloc = func.register_allocation();
            print!("{}", alloc.display(func));
        }
        DumpStage::Emit => {
            let alloc = func.register_allocation();
            print!("{}", TextEmitter.emit(func, alloc));
        }
    }
}
