//! Export a demo graph as Graphviz DOT.

use std::path::PathBuf;

use clap::Args;
use depgraph_config::Config;
use depgraph_core::graph::SocketRef;
use depgraph_core::{DefaultDotOptions, Graph, GraphExecutor, ToDotOptions};

use crate::demo::{Demo, Functions, arith_graph};

/// Export a demo graph as Graphviz DOT.
#[derive(Args)]
pub struct DotArgs {
    /// Graph to export
    #[arg(value_enum)]
    pub demo: Demo,

    /// Output file (defaults to stdout, or <demo>.dot in the configured output directory)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Colors sockets by value type.
struct TypeColors;

impl ToDotOptions for TypeColors {
    fn socket_font_color(&self, graph: &Graph<'_>, socket: SocketRef) -> Option<String> {
        let value_type = match socket {
            SocketRef::Input(id) => graph.input(id).value_type(),
            SocketRef::Output(id) => graph.output(id).value_type(),
        };
        if value_type.is::<bool>() {
            Some("#c04060".to_string())
        } else if value_type.is::<f64>() {
            Some("#4060c0".to_string())
        } else {
            None
        }
    }
}

/// Run the dot command.
pub fn run(args: DotArgs, config: &Config) -> anyhow::Result<()> {
    let functions = Functions::new();
    let arith = arith_graph(&functions)?;
    let arith_executor = GraphExecutor::new(&arith).named("Arith");
    let graph = args.demo.build(&functions, &arith_executor)?;

    let text = if config.dot.socket_colors {
        graph.to_dot(&TypeColors)
    } else {
        graph.to_dot(&DefaultDotOptions)
    };

    let output = match args.output {
        Some(path) => Some(path),
        None => config.dot_output_path(&format!("{:?}", args.demo).to_lowercase())?,
    };
    match output {
        Some(path) => {
            super::write_output(&path, &text)?;
            println!("Wrote {}", path.display());
        }
        None => print!("{text}"),
    }
    Ok(())
}
