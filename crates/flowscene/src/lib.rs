#![forbid(unsafe_code)]

//! `flowscene` reconciles Mermaid flowchart source with the layout a headless browser produces
//! for it.
//!
//! Everything except the live browser adapter lives in `flowscene-core` and is re-exported here.
//! The adapter, [`browser::BrowserEngine`], drives Mermaid through a Node.js + Puppeteer
//! subprocess and needs `node` with the `puppeteer` and `mermaid` packages installed in its
//! working directory.

pub use flowscene_core::*;

pub mod browser;

pub use browser::{BrowserEngine, BrowserOptions};
