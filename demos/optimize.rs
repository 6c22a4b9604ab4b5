use clap::Parser;

use transduce_rs::circuit::Circuit;
use transduce_rs::network::{Config, FaninSort, Transduction};
use transduce_rs::signal::Signal;

#[derive(Debug, Parser)]
#[command(author, version)]
struct Cli {
    /// Seed for the random circuit generator.
    #[arg(value_name = "INT", default_value = "0")]
    seed: u64,

    /// Number of primary inputs.
    #[clap(long, value_name = "INT", default_value = "8")]
    inputs: usize,

    /// Number of random two-input gates.
    #[clap(long, value_name = "INT", default_value = "100")]
    gates: usize,

    /// Number of primary outputs.
    #[clap(long, value_name = "INT", default_value = "8")]
    outputs: usize,

    /// Use the exact (MSPF) don't-care computation.
    #[clap(long)]
    mspf: bool,

    /// Refuse rewrites that deepen the network.
    #[clap(long)]
    level_aware: bool,
}

fn random_circuit(seed: u64, inputs: usize, gates: usize, outputs: usize) -> Circuit {
    let mut state = seed.wrapping_mul(0x9e3779b97f4a7c15).wrapping_add(1);
    let mut next = move || {
        state = state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        state >> 33
    };
    let mut c = Circuit::new(inputs);
    let mut lits: Vec<Signal> = (0..inputs).map(|i| c.input(i)).collect();
    for _ in 0..gates {
        let a = lits[next() as usize % lits.len()].negate_if(next() & 1 != 0);
        let mut b = lits[next() as usize % lits.len()].negate_if(next() & 1 != 0);
        while b.index() == a.index() {
            b = lits[next() as usize % lits.len()].negate_if(next() & 1 != 0);
        }
        lits.push(c.and(a, b));
    }
    let half = lits.len() / 2;
    for _ in 0..outputs {
        let f = lits[half + next() as usize % (lits.len() - half)];
        c.add_output(f.negate_if(next() & 1 != 0));
    }
    c
}

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    simplelog::TermLogger::init(
        simplelog::LevelFilter::Info,
        simplelog::Config::default(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    )?;

    let time_total = std::time::Instant::now();

    let args = Cli::parse();
    println!("args = {:?}", args);

    let circuit = random_circuit(args.seed, args.inputs, args.gates, args.outputs);
    println!(
        "circuit: {} inputs, {} gates, {} outputs",
        circuit.num_inputs(),
        circuit.num_gates(),
        circuit.num_outputs()
    );

    let config = Config {
        sort: FaninSort::Topological,
        level_aware: args.level_aware,
        ..Config::default()
    };
    let mut t = Transduction::new(&circuit, config);
    println!("imported: {:?}", t);
    t.print_stats();

    let count = t.optimize(true, args.mspf, args.mspf, true, true);
    println!("optimize removed {} wires", count);
    t.print_stats();
    assert!(t.verify());

    let out = t.to_circuit();
    println!(
        "exported: {} gates ({} before)",
        out.num_gates(),
        circuit.num_gates()
    );

    let time_total = time_total.elapsed();
    println!("Total time: {:.3} s", time_total.as_secs_f64());

    Ok(())
}
