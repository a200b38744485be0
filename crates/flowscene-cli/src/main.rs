mod serve;

use flowscene::{BrowserEngine, BrowserOptions, Reconciler, RenderEngine, SvgEngine};
use serde::Serialize;
use std::io::Read;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Debug)]
enum CliError {
    Usage(&'static str),
    Io(std::io::Error),
    Flowscene(flowscene::Error),
    Json(serde_json::Error),
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CliError::Usage(msg) => write!(f, "{msg}"),
            CliError::Io(err) => write!(f, "I/O error: {err}"),
            CliError::Flowscene(err) => write!(f, "{err}"),
            CliError::Json(err) => write!(f, "JSON error: {err}"),
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<flowscene::Error> for CliError {
    fn from(value: flowscene::Error) -> Self {
        Self::Flowscene(value)
    }
}

impl From<serde_json::Error> for CliError {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}

#[derive(Debug, Clone, Copy, Default)]
enum Command {
    #[default]
    Reconcile,
    Extract,
    Visual,
    Serve,
}

#[derive(Debug, Default)]
struct Args {
    command: Command,
    input: Option<String>,
    pretty: bool,
    svg: Option<String>,
    browser_exe: Option<String>,
    node_cwd: Option<String>,
    timeout_ms: Option<u64>,
    port: Option<u16>,
}

fn usage() -> &'static str {
    "flowscene\n\
\n\
USAGE:\n\
  flowscene [reconcile] [--pretty] [--svg <file>] [--browser-exe <path>] [--node-cwd <dir>] [--timeout-ms <n>] [<path>|-]\n\
  flowscene extract [--pretty] [<path>|-]\n\
  flowscene visual [--pretty] [--svg <file>] [--browser-exe <path>] [--node-cwd <dir>] [--timeout-ms <n>] [<path>|-]\n\
  flowscene serve [--port <n>] [--svg <file>] [--browser-exe <path>] [--node-cwd <dir>] [--timeout-ms <n>]\n\
\n\
NOTES:\n\
  - If <path> is omitted or '-', input is read from stdin.\n\
  - reconcile prints the scene graph JSON; extract prints the logical graph only.\n\
  - --svg reads a pre-rendered Mermaid SVG instead of rendering in a headless browser.\n\
  - Live rendering runs `node` with `puppeteer` and `mermaid` resolvable from --node-cwd.\n\
  - FLOWSCENE_BROWSER_EXE, FLOWSCENE_MERMAID_URL, FLOWSCENE_READY_TIMEOUT_MS and\n\
    FLOWSCENE_PROCESS_TIMEOUT_MS configure live rendering; flags win over them.\n\
  - serve listens on --port, else $PORT, else 3000, and answers POST /parse-mermaid.\n\
  - Logging goes to stderr and follows RUST_LOG (default: info).\n\
"
}

fn parse_args(argv: &[String]) -> Result<Args, CliError> {
    let mut args = Args::default();

    let mut it = argv.iter().skip(1).peekable();
    while let Some(a) = it.next() {
        match a.as_str() {
            "--help" | "-h" => return Err(CliError::Usage(usage())),
            "reconcile" => args.command = Command::Reconcile,
            "extract" => args.command = Command::Extract,
            "visual" => args.command = Command::Visual,
            "serve" => args.command = Command::Serve,
            "--pretty" => args.pretty = true,
            "--svg" => {
                let Some(path) = it.next() else {
                    return Err(CliError::Usage(usage()));
                };
                args.svg = Some(path.to_string());
            }
            "--browser-exe" => {
                let Some(path) = it.next() else {
                    return Err(CliError::Usage(usage()));
                };
                args.browser_exe = Some(path.to_string());
            }
            "--node-cwd" => {
                let Some(dir) = it.next() else {
                    return Err(CliError::Usage(usage()));
                };
                args.node_cwd = Some(dir.to_string());
            }
            "--timeout-ms" => {
                let Some(ms) = it.next() else {
                    return Err(CliError::Usage(usage()));
                };
                let ms = ms.parse::<u64>().map_err(|_| CliError::Usage(usage()))?;
                if ms == 0 {
                    return Err(CliError::Usage(usage()));
                }
                args.timeout_ms = Some(ms);
            }
            "--port" => {
                let Some(port) = it.next() else {
                    return Err(CliError::Usage(usage()));
                };
                args.port = Some(port.parse::<u16>().map_err(|_| CliError::Usage(usage()))?);
            }
            "-" => {
                if args.input.is_some() {
                    return Err(CliError::Usage(usage()));
                }
                args.input = Some("-".to_string());
            }
            other if other.starts_with('-') => return Err(CliError::Usage(usage())),
            path => {
                if args.input.is_some() {
                    return Err(CliError::Usage(usage()));
                }
                args.input = Some(path.to_string());
            }
        }
    }

    Ok(args)
}

fn read_input(input: Option<&str>) -> Result<String, CliError> {
    match input {
        None | Some("-") => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            Ok(buf)
        }
        Some(path) => Ok(std::fs::read_to_string(path)?),
    }
}

fn write_json(value: &impl Serialize, pretty: bool) -> Result<(), CliError> {
    if pretty {
        serde_json::to_writer_pretty(std::io::stdout().lock(), value)?;
    } else {
        serde_json::to_writer(std::io::stdout().lock(), value)?;
    }
    Ok(())
}

fn browser_options(args: &Args) -> BrowserOptions {
    let mut options = BrowserOptions::from_env();
    if let Some(exe) = &args.browser_exe {
        options = options.with_browser_exe(exe);
    }
    if let Some(dir) = &args.node_cwd {
        options = options.with_node_cwd(dir);
    }
    if let Some(ms) = args.timeout_ms {
        options = options.with_process_timeout(Duration::from_millis(ms));
    }
    options
}

/// `--svg` replays a pre-rendered document; otherwise render live.
fn build_engine(args: &Args) -> Result<Box<dyn RenderEngine + Send + Sync>, CliError> {
    if let Some(path) = &args.svg {
        let svg = std::fs::read_to_string(path)?;
        tracing::debug!(path = %path, bytes = svg.len(), "using pre-rendered svg");
        return Ok(Box::new(SvgEngine::new(svg)));
    }
    Ok(Box::new(BrowserEngine::new(browser_options(args))))
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(args: Args) -> Result<(), CliError> {
    match args.command {
        Command::Serve => {
            let port = match args.port {
                Some(port) => port,
                None => std::env::var("PORT")
                    .ok()
                    .map(|p| p.parse::<u16>().map_err(|_| CliError::Usage(usage())))
                    .transpose()?
                    .unwrap_or(serve::DEFAULT_PORT),
            };
            let request_timeout = browser_options(&args).process_timeout + serve::TIMEOUT_SLACK;
            let engine = build_engine(&args)?;
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()?;
            let state = serve::AppState::new(engine.into(), request_timeout);
            runtime.block_on(serve::run(port, state))?;
            Ok(())
        }
        Command::Extract => {
            let text = read_input(args.input.as_deref())?;
            let graph = flowscene::extract(&text)?;
            write_json(&graph, args.pretty)
        }
        Command::Visual => {
            let text = read_input(args.input.as_deref())?;
            let tree = Reconciler::new(build_engine(&args)?).visual_tree(&text)?;
            write_json(&tree, args.pretty)
        }
        Command::Reconcile => {
            let text = read_input(args.input.as_deref())?;
            let scene = Reconciler::new(build_engine(&args)?).reconcile(&text)?;
            write_json(&scene, args.pretty)
        }
    }
}

fn main() {
    let args = match parse_args(&std::env::args().collect::<Vec<_>>()) {
        Ok(v) => v,
        Err(CliError::Usage(msg)) => {
            eprintln!("{msg}");
            std::process::exit(2);
        }
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(1);
        }
    };

    init_logging();

    match run(args) {
        Ok(()) => {}
        Err(CliError::Usage(msg)) => {
            eprintln!("{msg}");
            std::process::exit(2);
        }
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests;
