use std::fmt;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::process;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use clap::Parser;
use tracing::field::{Field, Visit};
use tracing::span::{Attributes, Id, Record};
use tracing::{Event, Level, Metadata, Subscriber};

use ontmap::emitter::ntriples::NTriplesEmitter;
use ontmap::emitter::turtle::TurtleEmitter;
use ontmap::emitter::{add_standard_prefixes, emit_graph, TriplesEmitter};
use ontmap::graph::MemGraph;
use ontmap::loader::{load_graph, load_mapping};
use ontmap::{FunctionRegistry, Graph, MapConfig};

/// Map individuals of a source graph into a target graph with class-scoped rules.
#[derive(Parser)]
#[command(name = "ontmap", version, about)]
struct Cli {
    /// Source graph in N-Triples.
    input: PathBuf,

    /// Schema graph (source and target ontologies) in N-Triples.
    #[arg(short, long, value_name = "FILE")]
    schema: PathBuf,

    /// Mapping document (JSON).
    #[arg(short, long, value_name = "FILE")]
    mapping: PathBuf,

    /// Output file path [default: stdout].
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Output format: ntriples, turtle.
    #[arg(short, long, value_name = "FORMAT", default_value = "ntriples")]
    format: String,

    /// Configuration file (JSON).
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Write the compiled mapping graph instead of running inference.
    #[arg(long)]
    dump_mapping: bool,

    /// Verbose output.
    #[arg(short, long)]
    verbose: bool,

    /// Quiet output.
    #[arg(short, long)]
    quiet: bool,
}

/// Minimal stderr subscriber enabled by `--verbose`.
///
/// Events are printed as they arrive; spans only get distinct ids.
struct StderrSubscriber {
    next_span: AtomicU64,
}

struct Message(String);

impl Visit for Message {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.0 = format!("{value:?}");
        }
    }
}

impl Subscriber for StderrSubscriber {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        *metadata.level() <= Level::DEBUG
    }

    fn new_span(&self, _: &Attributes<'_>) -> Id {
        Id::from_u64(self.next_span.fetch_add(1, Ordering::Relaxed))
    }

    fn record(&self, _: &Id, _: &Record<'_>) {}

    fn record_follows_from(&self, _: &Id, _: &Id) {}

    fn event(&self, event: &Event<'_>) {
        let mut message = Message(String::new());
        event.record(&mut message);
        eprintln!("[{}] {}", event.metadata().level(), message.0);
    }

    fn enter(&self, _: &Id) {}

    fn exit(&self, _: &Id) {}
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    if cli.verbose {
        let subscriber = StderrSubscriber {
            next_span: AtomicU64::new(1),
        };
        if let Err(err) = tracing::subscriber::set_global_default(subscriber) {
            eprintln!("Warning: verbose logging unavailable: {err}");
        }
    }

    let config = match &cli.config {
        Some(path) => MapConfig::from_json_file(path)?,
        None => MapConfig::default(),
    };
    let schema = load_graph(&cli.schema)?;
    let document = load_mapping(&cli.mapping)?;
    let functions = Arc::new(FunctionRegistry::with_builtins());
    let model = document.build(functions, schema, config)?;

    let (graph, summary) = if cli.dump_mapping {
        let graph = model.to_graph();
        let summary = format!(
            "Compiled {} rules into {} mapping triples",
            model.rules().count(),
            graph.len()
        );
        (graph, summary)
    } else {
        let source = load_graph(&cli.input)?;
        let mut target = MemGraph::new();
        let stats = model.run_inference(&source, &mut target)?;
        let summary = format!(
            "Mapped {} individuals: {} rules fired, {} triples written",
            stats.individuals, stats.rules_fired, stats.triples_written
        );
        (target, summary)
    };

    let output_writer: Box<dyn Write> = match &cli.output {
        Some(path) => Box::new(BufWriter::new(File::create(path)?)),
        None => Box::new(BufWriter::new(io::stdout().lock())),
    };

    let format = cli.format.to_lowercase();
    let mut emitter: Box<dyn TriplesEmitter> = match format.as_str() {
        "ntriples" | "nt" => Box::new(NTriplesEmitter::new(output_writer)),
        "turtle" | "ttl" => Box::new(TurtleEmitter::new(output_writer)),
        _ => {
            return Err(format!("Unknown format: {format}. Use 'ntriples' or 'turtle'.").into());
        }
    };
    add_standard_prefixes(emitter.as_mut())?;
    emit_graph(emitter.as_mut(), &graph)?;
    emitter.flush()?;

    if !cli.quiet {
        eprintln!("{summary}");
    }
    Ok(())
}

fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}
