use crate::store::Entry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MenuNode {
    Group { label: String, children: Vec<NodeId> },
    /// `action` is the command-line template for launch items and the entry id for snippets.
    Leaf { label: String, action: String },
    Separator,
}

/// Menu nodes stored in a flat arena; node 0 is the root group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuTree {
    nodes: Vec<MenuNode>,
}

impl MenuTree {
    pub fn new(root_label: &str) -> Self {
        Self {
            nodes: vec![MenuNode::Group {
                label: root_label.to_string(),
                children: Vec::new(),
            }],
        }
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn node(&self, id: NodeId) -> &MenuNode {
        &self.nodes[id.0]
    }

    pub fn get(&self, index: usize) -> Option<&MenuNode> {
        self.nodes.get(index)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        match &self.nodes[id.0] {
            MenuNode::Group { children, .. } => children,
            _ => &[],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.children(self.root()).is_empty()
    }

    /// Nesting depth of groups below the root; a flat menu has depth 0.
    pub fn depth(&self) -> usize {
        self.depth_below(self.root())
    }

    fn depth_below(&self, id: NodeId) -> usize {
        self.children(id)
            .iter()
            .filter(|child| matches!(self.node(**child), MenuNode::Group { .. }))
            .map(|child| 1 + self.depth_below(*child))
            .max()
            .unwrap_or(0)
    }

    fn push(&mut self, parent: NodeId, node: MenuNode) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(node);
        if let MenuNode::Group { children, .. } = &mut self.nodes[parent.0] {
            children.push(id);
        }
        id
    }

    pub fn add_group(&mut self, parent: NodeId, label: &str) -> NodeId {
        self.push(
            parent,
            MenuNode::Group {
                label: label.to_string(),
                children: Vec::new(),
            },
        )
    }

    pub fn add_leaf(&mut self, parent: NodeId, label: &str, action: &str) -> NodeId {
        self.push(
            parent,
            MenuNode::Leaf {
                label: label.to_string(),
                action: action.to_string(),
            },
        )
    }

    pub fn add_separator(&mut self, parent: NodeId) -> NodeId {
        self.push(parent, MenuNode::Separator)
    }
}

/// Builds the launch menu from the launch-list grammar:
/// `---` separator, `..` close group, `>> label` open group, `label=command` item.
pub fn parse_launch_list(text: &str, root_label: &str) -> MenuTree {
    let mut tree = MenuTree::new(root_label);
    let mut stack = vec![tree.root()];
    for line in text.split('\n').map(str::trim).filter(|l| !l.is_empty()) {
        let current = *stack.last().unwrap_or(&tree.root());
        if line.starts_with("---") {
            tree.add_separator(current);
        } else if line == ".." {
            if stack.len() > 1 {
                stack.pop();
            }
        } else if let Some(label) = line.strip_prefix(">> ") {
            if !label.is_empty() {
                let group = tree.add_group(current, label);
                stack.push(group);
            }
        } else if let Some((label, command)) = line.split_once('=')
            && !label.is_empty()
            && !command.is_empty()
        {
            tree.add_leaf(current, label, command);
        }
    }
    tree
}

/// One item per entry in index order, then a separator when there is at least one.
pub fn snippet_menu(entries: &[Entry]) -> MenuTree {
    let mut tree = MenuTree::new("");
    let root = tree.root();
    for entry in entries {
        tree.add_leaf(root, entry.key(), entry.value());
    }
    if !entries.is_empty() {
        tree.add_separator(root);
    }
    tree
}

/// Splits a command line on spaces; `"` toggles quoting and is not emitted.
pub fn tokenize_command_line(line: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    let mut had_quotes = false;
    for ch in line.chars() {
        match ch {
            '"' => {
                quoted = !quoted;
                had_quotes = true;
            }
            ' ' if !quoted => {
                if !current.is_empty() || had_quotes {
                    tokens.push(std::mem::take(&mut current));
                }
                had_quotes = false;
            }
            _ => current.push(ch),
        }
    }
    if !current.is_empty() || had_quotes {
        tokens.push(current);
    }
    tokens
}
