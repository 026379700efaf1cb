use clap::Parser;
use serde_json::Value;
use tracing_subscriber::EnvFilter;

use tagel::expr::ExprInterpreter;
use tagel::{ElContext, Registry, Scanner};

/// Scan tag text into key-value pairs, or evaluate one expression with the
/// default interpreter.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Expression for the default interpreter, e.g. "upper('abc')"
    expr: Option<String>,
    /// Scan this tag/property text and print the pairs instead
    #[arg(long)]
    scan: Option<String>,
    /// Extra context JSON, reachable from expressions as `extra`
    #[arg(long)]
    extra: Option<String>,
    /// Debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    let args = Args::parse();
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if args.verbose { "debug" } else { "warn" }));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    if let Some(text) = args.scan.as_deref() {
        match Scanner::default().tags(text) {
            Ok(tags) => println!("{}", serde_json::to_string_pretty(&tags).unwrap()),
            Err(e) => {
                eprintln!("scan failed: {e}");
                std::process::exit(1);
            }
        }
        return;
    }

    let Some(expr) = args.expr.as_deref() else {
        eprintln!("nothing to do: pass an expression or --scan <TEXT>");
        std::process::exit(2);
    };

    let extra: Value = match args.extra.as_deref() {
        Some(text) => match serde_json::from_str(text) {
            Ok(v) => v,
            Err(e) => {
                eprintln!("invalid --extra JSON: {e}");
                std::process::exit(1);
            }
        },
        None => Value::Null,
    };

    let interpreters = Registry::new().register("eval", ExprInterpreter::with_builtins());
    let ctx = ElContext::new(&interpreters, &extra);
    match ctx.eval_with("eval", expr) {
        Ok(result) => println!("{}", serde_json::to_string_pretty(&result).unwrap()),
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    }
}
