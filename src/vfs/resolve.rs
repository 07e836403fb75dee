//! Path resolution over the node tree.
//!
//! A walk consumes `/`-separated components left to right. Following a symlink does not
//! move the walk: the target is spliced in front of the unresolved remainder and the walk
//! continues from the directory holding the link (or from the root, for absolute targets).

use tracing::trace;

use crate::core::Result;
use crate::core::utils::validate_name;
use crate::error::FsError;
use crate::vfs::node::{NodeId, Tree};

/// Upper bound on symlink redirections within one resolution.
pub const MAX_LINKS: usize = 255;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum Symlinks {
    /// Symlinks are addressed like any other node.
    Ignore,
    /// Every symlink on the path is followed.
    Follow,
    /// Every symlink except one in the final position is followed.
    FollowIntermediate,
}

#[derive(Debug, Copy, Clone)]
pub(crate) struct Policy {
    pub(crate) check_faults: bool,
    pub(crate) symlinks: Symlinks,
}

impl Policy {
    /// `open`, `stat`, `eval_symlinks`, `mkdir_all`.
    pub(crate) const FOLLOW: Policy = Policy {
        check_faults: true,
        symlinks: Symlinks::Follow,
    };

    /// `lstat`, `mkdir`.
    pub(crate) const NOFOLLOW_LAST: Policy = Policy {
        check_faults: true,
        symlinks: Symlinks::FollowIntermediate,
    };

    /// Locating the insertion point of `set`.
    pub(crate) const BUILD: Policy = Policy {
        check_faults: false,
        symlinks: Symlinks::Ignore,
    };
}

/// Result of a walk.
#[derive(Debug)]
pub(crate) struct Walk {
    /// Last node reached. On `DoesNotExist` this is the directory the missing name was
    /// looked up in.
    pub(crate) node: NodeId,
    /// Unresolved part of the path. Starts with the failing component on error and is
    /// empty on success.
    pub(crate) remainder: String,
    /// Nodes from the root (exclusive) down to `node` (inclusive).
    pub(crate) trail: Vec<NodeId>,
    pub(crate) outcome: Result<()>,
}

impl Walk {
    pub(crate) fn into_node(self) -> Result<NodeId> {
        self.outcome.map(|()| self.node)
    }

    /// Absolute path of `node` as reached by this walk, without any symlink.
    pub(crate) fn canonical_path(&self, tree: &Tree) -> String {
        if self.trail.is_empty() {
            return "/".to_string();
        }
        self.trail
            .iter()
            .map(|&id| format!("/{}", tree.node(id).name))
            .collect()
    }
}

/// Walks the absolute `path` from the root of `tree`.
pub(crate) fn resolve(tree: &Tree, path: &str, policy: Policy) -> Walk {
    let mut walker = Walker {
        tree,
        path,
        policy,
        links: 0,
        node: Tree::ROOT,
        trail: Vec::new(),
        remainder: path.strip_prefix('/').unwrap_or(path).to_string(),
    };
    let outcome = walker.run();
    Walk {
        node: walker.node,
        remainder: walker.remainder,
        trail: walker.trail,
        outcome,
    }
}

struct Walker<'a> {
    tree: &'a Tree,
    path: &'a str,
    policy: Policy,
    links: usize,
    node: NodeId,
    trail: Vec<NodeId>,
    remainder: String,
}

impl Walker<'_> {
    fn run(&mut self) -> Result<()> {
        while !self.remainder.is_empty() {
            self.check_fault()?;

            // `rest` keeps its leading separator, so a trailing `/` still marks the
            // component before it as intermediate
            let (name, rest) = match self.remainder.find('/') {
                Some(pos) => (&self.remainder[..pos], &self.remainder[pos..]),
                None => (self.remainder.as_str(), ""),
            };
            if name.is_empty() {
                self.remainder = self.remainder[1..].to_string();
                continue;
            }
            validate_name(name);

            if !self.tree.node(self.node).is_dir() {
                return Err(FsError::not_a_directory(self.path));
            }
            let child = self
                .tree
                .lookup(self.node, name)
                .ok_or_else(|| FsError::does_not_exist(self.path))?;

            self.remainder = rest.to_string();
            self.enter(child)?;
        }
        self.check_fault()
    }

    /// Moves the walk onto `child`, or redirects it if `child` is a symlink to follow.
    fn enter(&mut self, child: NodeId) -> Result<()> {
        let tree = self.tree;
        let target = match tree.node(child).symlink_target() {
            Some(target) if self.follows_symlink() => target,
            _ => {
                self.node = child;
                self.trail.push(child);
                return Ok(());
            }
        };

        self.links += 1;
        if self.links > MAX_LINKS {
            return Err(FsError::too_many_links(self.path));
        }
        trace!(
            "{}: following link '{}' -> '{}'",
            self.path,
            tree.node(child).name,
            target
        );

        let target = match target.strip_prefix('/') {
            Some(absolute) => {
                self.node = Tree::ROOT;
                self.trail.clear();
                absolute
            }
            None => target,
        };
        let rest = self.remainder.strip_prefix('/').unwrap_or(&self.remainder);
        self.remainder = format!("{target}/{rest}");
        Ok(())
    }

    fn follows_symlink(&self) -> bool {
        match self.policy.symlinks {
            Symlinks::Ignore => false,
            Symlinks::Follow => true,
            Symlinks::FollowIntermediate => !self.remainder.is_empty(),
        }
    }

    fn check_fault(&self) -> Result<()> {
        if self.policy.check_faults {
            if let Some(err) = &self.tree.node(self.node).error {
                return Err(FsError::Injected(err.clone()));
            }
        }
        Ok(())
    }
}
