//! Component tree dumps for logging and debugging.

use std::fmt;

use lateralus_core::{Result, TreeFormatOptions};
use serde::Serialize;

use crate::node::Node;
use crate::registry::NodeKind;

/// A serializable view of one component subtree.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TreeSnapshot {
    /// Display name.
    pub name: String,
    /// Key under the owner, for components.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance_name: Option<String>,
    /// Node kind.
    pub kind: NodeKind,
    /// Display name of the component's view.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub view: Option<String>,
    /// Display name of the bound model.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Child components in insertion order.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub components: Vec<TreeSnapshot>,
}

impl TreeSnapshot {
    /// Capture the subtree below `node`.
    pub fn capture(node: &Node) -> Result<Self> {
        let kind = node.kind()?;
        let view = match kind {
            NodeKind::Component => node.view()?.map(|v| v.to_string()),
            _ => None,
        };
        let components = node
            .components()?
            .iter()
            .map(|(_, child)| Self::capture(child))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            name: node.name()?,
            instance_name: node.instance_name()?,
            kind,
            view,
            model: node.model()?.map(|m| m.to_string()),
            components,
        })
    }

    /// The snapshot as JSON.
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

/// Renders the component tree below a node.
///
/// ```
/// use lateralus::prelude::*;
///
/// let app = Lateralus::new().unwrap();
/// app.add_component(&ComponentClass::base()).unwrap();
/// tracing::debug!("{}", app.tree_debug());
/// ```
#[derive(Debug, Clone)]
pub struct ComponentTreeDebug {
    root: Node,
    options: TreeFormatOptions,
}

impl ComponentTreeDebug {
    /// Create a visualizer for the tree below `root` with default options.
    pub fn new(root: Node) -> Self {
        Self {
            root,
            options: TreeFormatOptions::default(),
        }
    }

    /// Replace the formatting options.
    pub fn with_options(mut self, options: TreeFormatOptions) -> Self {
        self.options = options;
        self
    }

    /// Format the whole tree with a header line.
    pub fn format_all(&self) -> Result<String> {
        let app = self.root.lateralus();
        let count = self.root.shared.registry.read().len();
        let mut output = format!("Component Tree ({count} nodes):\n");
        self.format_into(&app, 0, true, &mut output)?;
        Ok(output)
    }

    /// Capture the whole tree as a [`TreeSnapshot`].
    pub fn snapshot(&self) -> Result<TreeSnapshot> {
        TreeSnapshot::capture(&self.root.lateralus())
    }

    /// Format the subtree starting at `node`.
    pub fn format_subtree(&self, node: &Node) -> Result<String> {
        let mut output = String::new();
        self.format_into(node, 0, true, &mut output)?;
        Ok(output)
    }

    fn format_into(&self, node: &Node, depth: usize, is_last: bool, output: &mut String) -> Result<()> {
        if self.options.max_depth.is_some_and(|max| depth > max) {
            return Ok(());
        }

        let kind = node.kind()?;
        let label = node.instance_name()?.unwrap_or(node.name()?);
        output.push_str(&self.options.prefix(depth, is_last));
        output.push_str(&label);
        if self.options.show_kinds {
            output.push_str(&format!(" ({kind})"));
        }
        output.push('\n');

        if self.options.show_parts {
            let detail = self.options.detail_prefix(depth);
            if kind == NodeKind::Component {
                if let Some(view) = node.view()? {
                    output.push_str(&format!("{detail}  .view = {view}\n"));
                }
            }
            if let Some(model) = node.model()? {
                output.push_str(&format!("{detail}  .model = {model}\n"));
            }
        }
        if self.options.show_counters {
            if let Some(counters) = node.component_counters()? {
                let mut counters: Vec<_> = counters.into_iter().collect();
                counters.sort();
                let detail = self.options.detail_prefix(depth);
                for (type_name, counter) in counters {
                    output.push_str(&format!("{detail}  #{type_name} = {counter}\n"));
                }
            }
        }

        let children = node.components()?;
        let count = children.len();
        for (i, (_, child)) in children.iter().enumerate() {
            self.format_into(child, depth + 1, i + 1 == count, output)?;
        }
        Ok(())
    }
}

impl fmt::Display for ComponentTreeDebug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.format_all() {
            Ok(output) => f.write_str(&output),
            Err(e) => write!(f, "Error formatting component tree: {e}"),
        }
    }
}
