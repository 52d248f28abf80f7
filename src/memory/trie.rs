//! Token trie over action paths.
//!
//! Each node owns one path token; an event is stored at the node
//! reached by walking its full action path. Wildcard descent mirrors
//! the pattern semantics of [`crate::subject::matches`]: `Any` fans out
//! over all children, a trailing `All` collects the whole subtree
//! including the current node.

use crate::model::Event;
use crate::subject::{Subject, TextSubject};

/// An event plus its global insertion position, used to merge and order
/// results across queries.
#[derive(Debug, Clone)]
pub(crate) struct StoredEvent {
    pub position: u64,
    pub event: Event,
}

#[derive(Debug, Default)]
pub(crate) struct Node {
    token: Option<TextSubject>,
    events: Vec<StoredEvent>,
    children: Vec<Node>,
}

impl Node {
    /// Insert an event at the node addressed by `path`, creating
    /// intermediate nodes as needed.
    pub fn insert(&mut self, path: &[TextSubject], stored: StoredEvent) {
        match path.split_first() {
            None => self.events.push(stored),
            Some((head, rest)) => {
                let child = match self.children.iter_mut().position(|c| c.token.as_ref() == Some(head)) {
                    Some(i) => &mut self.children[i],
                    None => {
                        self.children.push(Node {
                            token: Some(head.clone()),
                            ..Node::default()
                        });
                        let last = self.children.len() - 1;
                        &mut self.children[last]
                    }
                };
                child.insert(rest, stored);
            }
        }
    }

    /// Collect every stored event matching `pattern`, starting at this
    /// node. The caller validates the pattern.
    pub fn find<'a>(&'a self, pattern: &[Subject], out: &mut Vec<&'a StoredEvent>) {
        match pattern.split_first() {
            None => out.extend(self.events.iter()),
            Some((Subject::All, _)) => self.collect_all(out),
            Some((Subject::Any, rest)) => {
                for child in &self.children {
                    child.find(rest, out);
                }
            }
            Some((Subject::Text(token), rest)) => {
                if let Some(child) = self
                    .children
                    .iter()
                    .find(|c| c.token.as_ref() == Some(token))
                {
                    child.find(rest, out);
                }
            }
        }
    }

    /// Whole subtree, this node's events included.
    fn collect_all<'a>(&'a self, out: &mut Vec<&'a StoredEvent>) {
        out.extend(self.events.iter());
        for child in &self.children {
            child.collect_all(out);
        }
    }
}
