use clap::Parser;
use std::path::PathBuf;

use dimflow::fixpoint::DEFAULT_MAX_PASSES;
use dimflow::infer::InferOptions;
use dimflow::pipeline;

#[derive(Debug, Clone, clap::ValueEnum)]
enum EmitStage {
    Typing,
    Dot,
    BuildInfo,
}

#[derive(Parser, Debug)]
#[command(
    name = "dimflow",
    version,
    about = "Dimension-flow type inference for nested block programs"
)]
struct Cli {
    /// Input program description (.json)
    source: PathBuf,

    /// Output stage
    #[arg(long, value_enum, default_value_t = EmitStage::Typing)]
    emit: EmitStage,

    /// Restrict output to one schema (by name)
    #[arg(long)]
    schema: Option<String>,

    /// Block expansion depth for DOT output
    #[arg(long, default_value_t = 1)]
    depth: usize,

    /// Output file path (stdout when absent)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Saturation pass cap per schema
    #[arg(long, default_value_t = DEFAULT_MAX_PASSES)]
    max_passes: usize,

    /// Keep results when a dim is both required and excluded somewhere
    #[arg(long)]
    allow_inconsistent: bool,

    /// Print phases and timing
    #[arg(long)]
    verbose: bool,
}

fn main() {
    let cli = Cli::parse();

    if cli.verbose {
        eprintln!("dimflow: source = {}", cli.source.display());
        eprintln!("dimflow: emit   = {:?}", cli.emit);
    }

    // ── Load program ──
    let source = match std::fs::read_to_string(&cli.source) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("dimflow: error: {}: {}", cli.source.display(), e);
            std::process::exit(2);
        }
    };
    let mut loaded = match dimflow::loader::load_str(&source) {
        Ok(l) => l,
        Err(e) => {
            eprintln!("dimflow: error: {}: {}", cli.source.display(), e);
            std::process::exit(2);
        }
    };
    let program = &loaded.program;

    if cli.verbose {
        eprintln!(
            "dimflow: loaded {} schemas, {} seeded",
            program.schemas().count(),
            loaded.typing.len()
        );
    }

    let roots = match &cli.schema {
        Some(name) => match program.schema_by_name(name) {
            Some(s) => vec![s.id],
            None => {
                eprintln!("dimflow: error: no schema named '{}'", name);
                std::process::exit(2);
            }
        },
        None => pipeline::all_schemas(program),
    };

    // ── Infer ──
    let opts = InferOptions {
        max_passes: cli.max_passes,
        check_consistency: !cli.allow_inconsistent,
        verbose: cli.verbose,
        ..InferOptions::default()
    };
    // Build info fingerprints every schema, not only the selected one.
    let infer_roots = match cli.emit {
        EmitStage::BuildInfo => pipeline::all_schemas(program),
        _ => roots.clone(),
    };
    if let Err(e) = pipeline::infer_all(program, &infer_roots, &mut loaded.typing, &opts) {
        eprintln!("dimflow: {}", dimflow::diag::render(&e));
        std::process::exit(1);
    }

    // ── Emit ──
    let text = match cli.emit {
        EmitStage::Typing => pipeline::typing_report(program, &loaded.typing, &roots),
        EmitStage::Dot => dimflow::dot::emit_dot(program, &roots, cli.depth, Some(&loaded.typing)),
        EmitStage::BuildInfo => pipeline::compute_provenance(&source, program, &loaded.typing).to_json(),
    };

    match &cli.output {
        Some(path) => {
            if let Err(e) = std::fs::write(path, &text) {
                eprintln!("dimflow: error: {}: {}", path.display(), e);
                std::process::exit(2);
            }
            if cli.verbose {
                eprintln!("dimflow: wrote {}", path.display());
            }
        }
        None => print!("{}", text),
    }
}
