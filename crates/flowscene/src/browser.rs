//! Live rendering through a headless browser.
//!
//! Each [`BrowserEngine::render`] call spawns one Node.js process running [`PAGE_SCRIPT`], which
//! launches one browser, renders the diagram with Mermaid, waits for the layout to settle and
//! prints the visual tree as JSON on stdout. The browser never outlives the call: the script
//! closes it in a `finally` block and arms its own watchdog, and the Rust side kills and reaps
//! the process once `process_timeout` has passed.
//!
//! Puppeteer starts the browser in its own process group, so killing `node` does not reach it.
//! The script therefore talks to the browser over a pipe instead of a WebSocket: the browser
//! shuts itself down when that pipe closes, including after a hard kill of `node`.

use flowscene_core::visual::RawVisualTree;
use flowscene_core::{RenderEngine, RenderError, VisualTree};
use serde::Serialize;
use std::io::{Read, Write};
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

pub const ENV_BROWSER_EXE: &str = "FLOWSCENE_BROWSER_EXE";
pub const ENV_MERMAID_URL: &str = "FLOWSCENE_MERMAID_URL";
pub const ENV_READY_TIMEOUT_MS: &str = "FLOWSCENE_READY_TIMEOUT_MS";
pub const ENV_PROCESS_TIMEOUT_MS: &str = "FLOWSCENE_PROCESS_TIMEOUT_MS";

/// Exit code the page script uses when the root `svg` element never appeared.
const EXIT_NOT_READY: i32 = 3;

/// Exit code the page script uses when its own watchdog fired.
const EXIT_WATCHDOG: i32 = 4;

const WAIT_POLL: Duration = Duration::from_millis(20);

/// Time the page script gets to close its browser before the hard kill.
const WATCHDOG_MARGIN: Duration = Duration::from_millis(1000);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrowserOptions {
    /// Node.js executable.
    pub program: PathBuf,
    /// Extra arguments placed before `-e <script>`.
    pub node_args: Vec<String>,
    /// Working directory for the script; `puppeteer` and `mermaid` are resolved from here.
    pub node_cwd: Option<PathBuf>,
    /// Browser binary handed to Puppeteer. `None` lets Puppeteer pick its own.
    pub browser_exe: Option<PathBuf>,
    /// Mermaid bundle to load into the page. `None` loads `mermaid/dist/mermaid.min.js` from
    /// `node_modules`.
    pub mermaid_url: Option<String>,
    /// How long to wait for the root `svg` element.
    pub ready_timeout: Duration,
    /// Interval between layout samples while waiting for the layout to settle.
    pub poll_interval: Duration,
    /// Consecutive identical layout samples that count as settled.
    pub stable_samples: u32,
    /// Upper bound on the settle wait; the last sample is used when it runs out.
    pub max_settle: Duration,
    /// Hard deadline for the whole subprocess.
    pub process_timeout: Duration,
}

impl Default for BrowserOptions {
    fn default() -> Self {
        Self {
            program: PathBuf::from("node"),
            node_args: Vec::new(),
            node_cwd: None,
            browser_exe: None,
            mermaid_url: None,
            ready_timeout: Duration::from_millis(10_000),
            poll_interval: Duration::from_millis(100),
            stable_samples: 2,
            max_settle: Duration::from_millis(3_000),
            process_timeout: Duration::from_millis(30_000),
        }
    }
}

impl BrowserOptions {
    /// Defaults overridden by `FLOWSCENE_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for the `FLOWSCENE_*` keys.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut out = Self::default();
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(exe) = non_empty(ENV_BROWSER_EXE) {
            out.browser_exe = Some(PathBuf::from(exe));
        }
        if let Some(url) = non_empty(ENV_MERMAID_URL) {
            out.mermaid_url = Some(url);
        }
        if let Some(ms) =
            non_empty(ENV_READY_TIMEOUT_MS).and_then(|v| parse_ms(ENV_READY_TIMEOUT_MS, &v))
        {
            out.ready_timeout = ms;
        }
        if let Some(ms) =
            non_empty(ENV_PROCESS_TIMEOUT_MS).and_then(|v| parse_ms(ENV_PROCESS_TIMEOUT_MS, &v))
        {
            out.process_timeout = ms;
        }
        out
    }

    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    pub fn with_node_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.node_args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_node_cwd(mut self, dir: impl Into<PathBuf>) -> Self {
        self.node_cwd = Some(dir.into());
        self
    }

    pub fn with_browser_exe(mut self, exe: impl Into<PathBuf>) -> Self {
        self.browser_exe = Some(exe.into());
        self
    }

    pub fn with_mermaid_url(mut self, url: impl Into<String>) -> Self {
        self.mermaid_url = Some(url.into());
        self
    }

    pub fn with_ready_timeout(mut self, timeout: Duration) -> Self {
        self.ready_timeout = timeout;
        self
    }

    pub fn with_process_timeout(mut self, timeout: Duration) -> Self {
        self.process_timeout = timeout;
        self
    }
}

fn parse_ms(key: &str, value: &str) -> Option<Duration> {
    match value.trim().parse::<u64>() {
        Ok(ms) => Some(Duration::from_millis(ms)),
        Err(err) => {
            tracing::warn!(key, value, %err, "ignoring malformed millisecond setting");
            None
        }
    }
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

/// What the page script reads from stdin.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PageInput<'a> {
    code: &'a str,
    browser_exe: Option<String>,
    mermaid_url: Option<&'a str>,
    ready_timeout_ms: u64,
    poll_interval_ms: u64,
    stable_samples: u32,
    max_settle_ms: u64,
    watchdog_ms: u64,
}

/// Renders through Mermaid in a headless browser, one subprocess per call.
#[derive(Debug, Clone, Default)]
pub struct BrowserEngine {
    options: BrowserOptions,
}

impl BrowserEngine {
    pub fn new(options: BrowserOptions) -> Self {
        Self { options }
    }

    pub fn from_env() -> Self {
        Self::new(BrowserOptions::from_env())
    }

    pub fn options(&self) -> &BrowserOptions {
        &self.options
    }

    fn page_input<'a>(&'a self, source: &'a str) -> PageInput<'a> {
        let o = &self.options;
        PageInput {
            code: source,
            browser_exe: o.browser_exe.as_ref().map(|p| p.display().to_string()),
            mermaid_url: o.mermaid_url.as_deref(),
            ready_timeout_ms: millis(o.ready_timeout),
            poll_interval_ms: millis(o.poll_interval),
            stable_samples: o.stable_samples.max(1),
            max_settle_ms: millis(o.max_settle),
            watchdog_ms: millis(watchdog(o.process_timeout)),
        }
    }

    fn spawn(&self) -> Result<Child, RenderError> {
        let mut cmd = Command::new(&self.options.program);
        if let Some(cwd) = &self.options.node_cwd {
            cmd.current_dir(cwd);
        }
        cmd.args(&self.options.node_args)
            .arg("-e")
            .arg(PAGE_SCRIPT)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let child = cmd.spawn().map_err(|source| RenderError::Spawn {
            program: self.options.program.display().to_string(),
            source,
        })?;
        tracing::debug!(
            pid = child.id(),
            program = %self.options.program.display(),
            "spawned render process"
        );
        Ok(child)
    }
}

/// The script's own deadline: `WATCHDOG_MARGIN` ahead of the hard kill, but never less than
/// half of `process_timeout`.
fn watchdog(process_timeout: Duration) -> Duration {
    process_timeout
        .saturating_sub(WATCHDOG_MARGIN)
        .max(process_timeout / 2)
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> JoinHandle<std::io::Result<Vec<u8>>> {
    std::thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            pipe.read_to_end(&mut buf)?;
        }
        Ok(buf)
    })
}

fn joined(handle: JoinHandle<std::io::Result<Vec<u8>>>) -> Result<Vec<u8>, RenderError> {
    handle
        .join()
        .map_err(|_| RenderError::Engine {
            message: "render process reader panicked".to_string(),
        })?
        .map_err(RenderError::Io)
}

/// Last non-empty line of the script's stderr, for error messages.
fn last_line(stderr: &[u8]) -> Option<String> {
    String::from_utf8_lossy(stderr)
        .lines()
        .rev()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .map(str::to_string)
}

impl RenderEngine for BrowserEngine {
    fn render(&self, source: &str) -> Result<VisualTree, RenderError> {
        let input = serde_json::to_vec(&self.page_input(source)).map_err(|e| RenderError::Engine {
            message: format!("failed to encode page input: {e}"),
        })?;

        let mut child = self.spawn()?;
        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());
        if let Some(mut stdin) = child.stdin.take() {
            // A script that exits early closes its stdin; the exit status tells why.
            if let Err(err) = stdin.write_all(&input) {
                tracing::debug!(%err, "render process did not take its input");
            }
        }

        let started = Instant::now();
        let status = loop {
            if let Some(status) = child.try_wait()? {
                break status;
            }
            if started.elapsed() >= self.options.process_timeout {
                let waited_ms = millis(started.elapsed());
                tracing::warn!(pid = child.id(), waited_ms, "render process timed out; killing");
                if let Err(err) = child.kill() {
                    tracing::debug!(%err, "kill after timeout failed");
                }
                child.wait()?;
                return Err(RenderError::Timeout { waited_ms });
            }
            std::thread::sleep(WAIT_POLL);
        };

        let stdout = joined(stdout)?;
        let stderr = joined(stderr)?;
        tracing::debug!(
            code = ?status.code(),
            elapsed_ms = millis(started.elapsed()),
            stdout_bytes = stdout.len(),
            "render process exited"
        );

        match status.code() {
            Some(EXIT_NOT_READY) => {
                return Err(RenderError::Timeout {
                    waited_ms: millis(self.options.ready_timeout),
                });
            }
            Some(EXIT_WATCHDOG) => {
                return Err(RenderError::Timeout {
                    waited_ms: millis(started.elapsed()),
                });
            }
            _ => {}
        }
        if !status.success() {
            return Err(RenderError::Engine {
                message: last_line(&stderr).unwrap_or_else(|| format!("render process {status}")),
            });
        }

        let text = String::from_utf8_lossy(&stdout);
        let line = text
            .lines()
            .rev()
            .map(str::trim)
            .find(|l| !l.is_empty())
            .ok_or_else(|| RenderError::InvalidOutput {
                message: "render process printed nothing".to_string(),
            })?;
        let raw: RawVisualTree =
            serde_json::from_str(line).map_err(|e| RenderError::InvalidOutput {
                message: e.to_string(),
            })?;
        Ok(raw.into())
    }
}

/// Node.js side of [`BrowserEngine`]. Reads [`PageInput`] JSON on stdin, prints a
/// `RawVisualTree` JSON line on stdout, exits with 3 when the diagram never rendered.
pub const PAGE_SCRIPT: &str = r#"
const fs = require('fs');
const path = require('path');
const { createRequire } = require('module');
const requireFromCwd = createRequire(path.join(process.cwd(), 'package.json'));
const puppeteer = requireFromCwd('puppeteer');

const input = JSON.parse(fs.readFileSync(0, 'utf8'));
const EXIT_NOT_READY = 3;
const EXIT_WATCHDOG = 4;

class NotReady extends Error {}

(async () => {
  const launchOpts = {
    headless: 'shell',
    pipe: true,
    args: ['--no-sandbox', '--disable-setuid-sandbox'],
  };
  if (input.browserExe) {
    launchOpts.executablePath = input.browserExe;
  }
  const browser = await puppeteer.launch(launchOpts);
  const watchdog = setTimeout(() => {
    browser.close().finally(() => process.exit(EXIT_WATCHDOG));
  }, Math.max(input.watchdogMs, 1));

  try {
    const page = await browser.newPage();
    await page.setContent('<!doctype html><html><head></head><body><div id="flowscene"></div></body></html>');
    if (input.mermaidUrl) {
      await page.addScriptTag({ url: input.mermaidUrl });
    } else {
      await page.addScriptTag({ path: requireFromCwd.resolve('mermaid/dist/mermaid.min.js') });
    }

    await page.evaluate((code) => {
      const mermaid = globalThis.mermaid;
      mermaid.initialize({ startOnLoad: false, securityLevel: 'loose' });
      mermaid
        .render('flowscene-svg', code)
        .then(({ svg, bindFunctions }) => {
          const host = document.getElementById('flowscene');
          host.innerHTML = svg;
          if (bindFunctions) bindFunctions(host);
        })
        .catch((e) => {
          globalThis.__flowsceneError = String((e && e.message) || e);
        });
    }, input.code);

    try {
      await page.waitForFunction(
        () => document.querySelector('#flowscene svg') || globalThis.__flowsceneError,
        { timeout: input.readyTimeoutMs },
      );
    } catch (e) {
      throw new NotReady(String(e));
    }
    const renderError = await page.evaluate(() => globalThis.__flowsceneError || null);
    if (renderError) {
      throw new Error(renderError);
    }

    const sample = () =>
      page.evaluate(() =>
        Array.from(document.querySelectorAll('#flowscene svg g.node'))
          .map((g) => {
            const b = g.getBBox();
            return [g.id, b.x, b.y, b.width, b.height].join(',');
          })
          .join(';'),
      );
    const settleStart = Date.now();
    let last = await sample();
    let agreeing = 1;
    while (agreeing < input.stableSamples && Date.now() - settleStart < input.maxSettleMs) {
      await new Promise((r) => setTimeout(r, input.pollIntervalMs));
      const next = await sample();
      agreeing = next === last ? agreeing + 1 : 1;
      last = next;
    }

    const tree = await page.evaluate(() => {
      const svg = document.querySelector('#flowscene svg');
      const toRoot = (el) => svg.getScreenCTM().inverse().multiply(el.getScreenCTM());
      const textOf = (el) => {
        const out = [];
        const walker = document.createTreeWalker(el, NodeFilter.SHOW_TEXT);
        while (walker.nextNode()) out.push(walker.currentNode.textContent);
        return out;
      };
      const boxOf = (el) => {
        const b = el.getBBox();
        const m = toRoot(el);
        const corners = [
          [b.x, b.y],
          [b.x + b.width, b.y],
          [b.x, b.y + b.height],
          [b.x + b.width, b.y + b.height],
        ].map(([x, y]) => new DOMPoint(x, y).matrixTransform(m));
        const xs = corners.map((p) => p.x);
        const ys = corners.map((p) => p.y);
        const x = Math.min(...xs);
        const y = Math.min(...ys);
        return { x, y, width: Math.max(...xs) - x, height: Math.max(...ys) - y };
      };

      const nodes = [];
      for (const el of new Set(svg.querySelectorAll('g[id^="flowchart-"], g.node'))) {
        if (!el.id) continue;
        nodes.push({
          id: el.id,
          fragments: textOf(el),
          classList: Array.from(el.classList),
          bbox: boxOf(el),
        });
      }

      const labels = new Map();
      for (const el of svg.querySelectorAll('g.edgeLabel')) {
        const keyed = el.querySelector('[data-id]');
        const id = keyed ? keyed.getAttribute('data-id') : el.id;
        if (id && !labels.has(id)) labels.set(id, textOf(el));
      }

      const edges = [];
      const seen = new Set();
      for (const el of svg.querySelectorAll('path[data-edge="true"], g.edgePaths > path, g.edgePath')) {
        const p = el.tagName === 'path' ? el : el.querySelector('path');
        if (!el.id || (p && seen.has(p))) continue;
        if (p) seen.add(p);
        const m = p ? toRoot(p) : null;
        edges.push({
          id: el.id,
          fragments: labels.get(el.id) || [],
          d: p ? p.getAttribute('d') : null,
          matrix: m ? [m.a, m.b, m.c, m.d, m.e, m.f] : null,
        });
      }
      return { nodes, edges };
    });

    process.stdout.write(JSON.stringify(tree) + '\n');
  } finally {
    clearTimeout(watchdog);
    await browser.close();
  }
})().catch((e) => {
  console.error(e && e.message ? e.message : e);
  process.exit(e instanceof NotReady ? EXIT_NOT_READY : 1);
});
"#;
