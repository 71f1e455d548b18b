//! Browser engines behind `reqtrack::BrowserSession`.

pub mod chromium;

pub use chromium::{find_chromium, ChromiumBrowser, ChromiumSession};
