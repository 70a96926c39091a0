//! Logging and debugging facilities for Lateralus.
//!
//! This module provides:
//! - Target and span names for filtering `tracing` output per subsystem
//! - Tree-drawing options shared by the component tree dump
//! - [`PerfSpan`], a guard that times an operation
//!
//! # Tracing Integration
//!
//! Lateralus only emits `tracing` events; install a subscriber in your
//! application to see them:
//!
//! ```ignore
//! tracing_subscriber::fmt()
//!     .with_env_filter("lateralus::dispose=trace")
//!     .init();
//! ```

/// Span names used throughout Lateralus.
pub mod span_names {
    /// Component construction span.
    pub const ADD_COMPONENT: &str = "lateralus::add_component";
    /// Event-map binding span.
    pub const DELEGATE: &str = "lateralus::delegate";
    /// Disposal span.
    pub const DISPOSE: &str = "lateralus::dispose";
    /// Provider request span.
    pub const COLLECT: &str = "lateralus::collect";
    /// Deferred task processing span.
    pub const DEFERRED: &str = "lateralus::deferred";
}

/// Target names for log filtering.
pub mod targets {
    /// Event hub target.
    pub const HUB: &str = "lateralus::hub";
    /// Bubbling (`emit`, `amplify`, `collect`) target.
    pub const EVENTS: &str = "lateralus::events";
    /// Event-map binding target.
    pub const DELEGATE: &str = "lateralus::delegate";
    /// Component tree target.
    pub const TREE: &str = "lateralus::tree";
    /// Disposal target.
    pub const DISPOSE: &str = "lateralus::dispose";
    /// Model and collection target.
    pub const MODEL: &str = "lateralus::model";
    /// View target.
    pub const VIEW: &str = "lateralus::view";
    /// Deferred task target.
    pub const DEFERRED: &str = "lateralus::deferred";
    /// Performance spans.
    pub const PERF: &str = "lateralus::perf";
}

/// Style options for tree visualization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TreeStyle {
    /// ASCII characters for tree branches.
    Ascii,
    /// Unicode box-drawing characters.
    #[default]
    Unicode,
    /// Compact dash-prefixed lines.
    Compact,
}

/// Configuration for tree debug output.
#[derive(Debug, Clone)]
pub struct TreeFormatOptions {
    /// The style of tree visualization.
    pub style: TreeStyle,
    /// Whether to show node kinds.
    pub show_kinds: bool,
    /// Whether to show owned views and models under each component.
    pub show_parts: bool,
    /// Whether to show per-type counters.
    pub show_counters: bool,
    /// Maximum depth to traverse (None for unlimited).
    pub max_depth: Option<usize>,
    /// Indent size for each level.
    pub indent_size: usize,
}

impl Default for TreeFormatOptions {
    fn default() -> Self {
        Self {
            style: TreeStyle::default(),
            show_kinds: true,
            show_parts: false,
            show_counters: false,
            max_depth: None,
            indent_size: 2,
        }
    }
}

impl TreeFormatOptions {
    /// Options for detailed debugging output.
    pub fn detailed() -> Self {
        Self {
            show_parts: true,
            show_counters: true,
            ..Default::default()
        }
    }

    /// Options for minimal output: names only.
    pub fn minimal() -> Self {
        Self {
            show_kinds: false,
            show_parts: false,
            show_counters: false,
            ..Default::default()
        }
    }

    /// Build the line prefix for a node at `depth`.
    pub fn prefix(&self, depth: usize, is_last: bool) -> String {
        if depth == 0 {
            return String::new();
        }

        let (branch, tee, corner) = match self.style {
            TreeStyle::Ascii => ("|", "+--", "`--"),
            TreeStyle::Unicode => ("\u{2502}", "\u{251c}\u{2500}\u{2500}", "\u{2514}\u{2500}\u{2500}"),
            TreeStyle::Compact => ("", "-", "-"),
        };

        let mut prefix = String::new();
        for _ in 0..(depth - 1) {
            prefix.push_str(branch);
            prefix.extend(std::iter::repeat_n(' ', self.indent_size));
        }
        prefix.push_str(if is_last { corner } else { tee });
        prefix.push(' ');
        prefix
    }

    /// Build the prefix for detail lines printed under a node at `depth`.
    pub fn detail_prefix(&self, depth: usize) -> String {
        let branch = match self.style {
            TreeStyle::Ascii => "|",
            TreeStyle::Unicode => "\u{2502}",
            TreeStyle::Compact => "",
        };

        let mut prefix = String::new();
        for _ in 0..depth {
            prefix.push_str(branch);
            prefix.extend(std::iter::repeat_n(' ', self.indent_size));
        }
        prefix
    }
}

/// A guard that keeps a tracing span entered until dropped.
///
/// Useful for tracking the duration of an operation.
#[derive(Debug)]
pub struct PerfSpan {
    _span: tracing::span::EnteredSpan,
}

impl PerfSpan {
    /// Enter a performance span for `operation`.
    pub fn new(operation: &'static str) -> Self {
        let span = tracing::info_span!(target: "lateralus::perf", "perf", operation);
        Self {
            _span: span.entered(),
        }
    }
}
