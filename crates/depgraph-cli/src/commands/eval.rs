//! Evaluate a demo graph.

use anyhow::{Context as _, bail};
use clap::Args;
use depgraph_config::Config;
use depgraph_core::{ExecutorOptions, GraphExecutor, LazyFunction, execute_eagerly};

use crate::demo::{Demo, EvalLogger, Functions, arith_graph, parse_value};

/// Evaluate a demo graph.
#[derive(Args)]
pub struct EvalArgs {
    /// Graph to evaluate
    #[arg(value_enum)]
    pub demo: Demo,

    /// Input value as name=value (repeatable); unset inputs use demo defaults
    #[arg(short, long = "input", value_name = "NAME=VALUE")]
    pub inputs: Vec<String>,

    /// Threads used by the executor (overrides the configuration; 0 = all cores)
    #[arg(short, long)]
    pub threads: Option<usize>,

    /// Print how often each node ran
    #[arg(long)]
    pub stats: bool,
}

/// Run the eval command.
pub fn run(args: EvalArgs, config: &Config) -> anyhow::Result<()> {
    let options = match args.threads {
        Some(0) => ExecutorOptions::available_parallelism(),
        Some(n) => ExecutorOptions::with_threads(n),
        None => config.executor_options(),
    };

    let functions = Functions::new();
    let arith = arith_graph(&functions)?;
    let arith_executor = GraphExecutor::new(&arith).named("Arith").options(options);
    let graph = args.demo.build(&functions, &arith_executor)?;
    let logger = EvalLogger::new(&graph, config.logging.log_socket_values);
    let executor = GraphExecutor::new(&graph).logger(&logger).options(options);

    let mut given: Vec<(String, String)> = Vec::new();
    for input in &args.inputs {
        let (name, text) = input
            .split_once('=')
            .with_context(|| format!("input '{input}' is not NAME=VALUE"))?;
        if !executor.inputs().iter().any(|i| i.debug_name == name) {
            let names: Vec<&str> = executor.inputs().iter().map(|i| i.debug_name.as_str()).collect();
            bail!("unknown input '{name}', expected one of: {}", names.join(", "));
        }
        given.push((name.to_string(), text.to_string()));
    }

    let mut values = Vec::with_capacity(executor.inputs().len());
    for input in executor.inputs() {
        let text = given
            .iter()
            .rev()
            .find(|(name, _)| *name == input.debug_name)
            .map_or(args.demo.default_input(&input.debug_name), |(_, text)| text.as_str());
        values.push(parse_value(input.value_type, text).with_context(|| format!("input '{}'", input.debug_name))?);
    }

    tracing::info!(demo = ?args.demo, threads = options.threads, "evaluating");
    let outputs = execute_eagerly(&executor, values, None);

    for (output, value) in executor.outputs().iter().zip(&outputs) {
        let text = value
            .as_ref()
            .and_then(|v| output.value_type.format(v))
            .unwrap_or_else(|| "<missing>".to_string());
        println!("{} = {}", output.debug_name, text);
    }

    if args.stats {
        println!();
        println!("Node executions:");
        for node in graph.function_nodes() {
            println!("  {:<12} {}", graph.node(node).name(), logger.executions(node));
        }
    }

    Ok(())
}
