//! Compressed radix tree for route matching.
//!
//! Paths are stored as byte fragments along tree edges, so routes sharing a
//! prefix (e.g. `/api/v1/`) share nodes. Three segment kinds participate in
//! matching:
//!
//! - static segments match byte-for-byte,
//! - `:name` parameters match exactly one segment,
//! - `*name` catch-alls absorb the rest of the path and must be last.
//!
//! Insertion splits and reorders edges while keeping siblings sorted by how
//! many routes pass through them, so the most-traveled branch is probed
//! first. Lookup walks the tree iteratively with an explicit stack of
//! skipped wildcard branches, which lets a dead-ended static branch roll
//! back and retry the wildcard sibling without recursion.
//!
//! Node paths and the child-index digest are raw bytes, not `str`: an edge
//! split lands wherever the shared prefix ends, which may be in the middle
//! of a multi-byte character.

use std::borrow::Cow;

use percent_encoding::percent_decode_str;

use super::params::Params;

/// Kind tag of a tree vertex.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) enum NodeKind {
    /// Literal segment, matched byte-for-byte.
    #[default]
    Static,
    /// The root of a method tree.
    Root,
    /// A `:name` segment.
    Param,
    /// A `*name` segment.
    CatchAll,
}

/// A vertex of the radix tree.
///
/// `indices` holds the first byte of each static child in child order; the
/// wildcard child (at most one, always last) is not indexed. Siblings are
/// kept sorted by descending `priority`, with `indices` permuted in
/// lockstep, so lookups probe the busiest branch first.
pub(crate) struct Node<T> {
    /// Byte fragment this node contributes to the accumulated path.
    pub(crate) path: Vec<u8>,
    /// First byte of each static child, in child order.
    pub(crate) indices: Vec<u8>,
    /// True iff the last child is a param or catch-all node.
    pub(crate) wild_child: bool,
    pub(crate) kind: NodeKind,
    /// Count of registered routes passing through this node.
    pub(crate) priority: u32,
    pub(crate) children: Vec<Node<T>>,
    /// Handler chain when this node terminates a route; empty otherwise.
    pub(crate) handlers: Vec<T>,
    /// The complete pattern that registered `handlers`.
    pub(crate) full_path: String,
}

impl<T> Default for Node<T> {
    fn default() -> Self {
        Self {
            path: Vec::new(),
            indices: Vec::new(),
            wild_child: false,
            kind: NodeKind::Static,
            priority: 0,
            children: Vec::new(),
            handlers: Vec::new(),
            full_path: String::new(),
        }
    }
}

/// Counts the `:` and `*` wildcards in a pattern, for pre-sizing the
/// capture buffer.
pub(crate) fn count_params(path: &str) -> usize {
    path.bytes().filter(|&b| b == b':' || b == b'*').count()
}

/// Counts the `/`-delimited sections of a pattern, for pre-sizing the skip
/// stack.
pub(crate) fn count_sections(path: &str) -> usize {
    path.bytes().filter(|&b| b == b'/').count()
}

fn longest_common_prefix(a: &[u8], b: &[u8]) -> usize {
    a.iter().zip(b).take_while(|(x, y)| x == y).count()
}

/// Scans `path` for the next `:name` or `*name` segment.
///
/// Returns the segment including its sigil, its byte offset, and whether the
/// segment is well-formed (a second `:` or `*` before the next `/` makes it
/// invalid). `None` when the path holds no wildcard at all.
pub(crate) fn find_wildcard(path: &[u8]) -> Option<(&[u8], usize, bool)> {
    for (start, &c) in path.iter().enumerate() {
        if c != b':' && c != b'*' {
            continue;
        }

        let mut valid = true;
        for (end, &c) in path[start + 1..].iter().enumerate() {
            match c {
                b'/' => return Some((&path[start..start + 1 + end], start, valid)),
                b':' | b'*' => valid = false,
                _ => {}
            }
        }
        return Some((&path[start..], start, valid));
    }
    None
}

/// Lookup outcome at the tree level.
pub(crate) struct NodeValue<'a, T> {
    /// Handler chain of the matched terminal, if any.
    pub(crate) handlers: Option<&'a [T]>,
    /// Whether a trailing-slash redirect would reach a terminal.
    pub(crate) tsr: bool,
    /// The registered pattern behind `handlers`.
    pub(crate) full_path: &'a str,
}

/// A branch point where a static child was taken while a wildcard sibling
/// existed. If the static branch dead-ends, the walk restores this state
/// and retries the wildcard.
pub(crate) struct Skipped<'a, T> {
    /// Remaining request path at the branch point, prefix included.
    path: &'a [u8],
    node: &'a Node<T>,
    /// Captured-parameter count to restore on rollback.
    params_count: usize,
}

pub(crate) type SkippedNodes<'a, T> = Vec<Skipped<'a, T>>;

impl<T> Node<T> {
    /// Adds a child, keeping the wildcard child (if any) at the end.
    fn add_child(&mut self, child: Node<T>) {
        if self.wild_child && !self.children.is_empty() {
            let wildcard_pos = self.children.len() - 1;
            self.children.insert(wildcard_pos, child);
        } else {
            self.children.push(child);
        }
    }

    /// Bumps the priority of the child at `pos` and bubbles it left past
    /// lower-priority siblings, permuting `indices` identically. Returns the
    /// child's new position.
    fn increment_child_prio(&mut self, pos: usize) -> usize {
        self.children[pos].priority += 1;
        let prio = self.children[pos].priority;

        let mut new_pos = pos;
        while new_pos > 0 && self.children[new_pos - 1].priority < prio {
            self.children.swap(new_pos - 1, new_pos);
            new_pos -= 1;
        }

        if new_pos != pos {
            let index_byte = self.indices.remove(pos);
            self.indices.insert(new_pos, index_byte);
        }

        new_pos
    }

    /// Registers `handlers` under `path`, splitting and reordering edges as
    /// needed.
    ///
    /// Not safe against concurrent callers or concurrent lookups; all
    /// registrations are expected to complete before dispatch begins.
    ///
    /// # Panics
    ///
    /// On malformed patterns (unnamed or doubled wildcards, catch-alls not
    /// at the end of the path or not preceded by `/`), on wildcard conflicts
    /// with previously registered routes, and on duplicate registration of
    /// the same pattern.
    pub(crate) fn add_route(&mut self, path: &str, handlers: Vec<T>) {
        let full_path = path;
        self.priority += 1;

        // Empty tree
        if self.path.is_empty() && self.children.is_empty() {
            self.insert_child(path.as_bytes(), full_path, handlers);
            self.kind = NodeKind::Root;
            return;
        }

        let mut n = self;
        let mut path: &[u8] = path.as_bytes();
        let mut parent_full_path_index = 0;

        'walk: loop {
            // The longest common prefix contains no ':' or '*', since an
            // existing edge never keeps those past insert_child.
            let i = longest_common_prefix(path, &n.path);

            // Split edge
            if i < n.path.len() {
                let index_byte = n.path[i];
                let child = Node {
                    path: n.path[i..].to_vec(),
                    wild_child: n.wild_child,
                    kind: NodeKind::Static,
                    indices: std::mem::take(&mut n.indices),
                    children: std::mem::take(&mut n.children),
                    handlers: std::mem::take(&mut n.handlers),
                    priority: n.priority - 1,
                    full_path: std::mem::take(&mut n.full_path),
                };

                n.children = vec![child];
                n.indices = vec![index_byte];
                n.path.truncate(i);
                n.wild_child = false;
                n.full_path = lossy_prefix(full_path, parent_full_path_index + i);
            }

            // Make the rest of the path a descendant of this node
            if i < path.len() {
                path = &path[i..];
                let c = path[0];

                // '/' after param
                if n.kind == NodeKind::Param && c == b'/' && n.children.len() == 1 {
                    parent_full_path_index += n.path.len();
                    n = &mut n.children[0];
                    n.priority += 1;
                    continue 'walk;
                }

                // Check if a child with the next path byte exists
                let mut matched = None;
                for (j, &index_byte) in n.indices.iter().enumerate() {
                    if index_byte == c {
                        matched = Some(j);
                        break;
                    }
                }
                if let Some(j) = matched {
                    parent_full_path_index += n.path.len();
                    let j = n.increment_child_prio(j);
                    n = &mut n.children[j];
                    continue 'walk;
                }

                // Otherwise insert it
                if c != b':' && c != b'*' && n.kind != NodeKind::CatchAll {
                    n.indices.push(c);
                    n.add_child(Node {
                        full_path: full_path.to_string(),
                        ..Node::default()
                    });
                    let pos = n.increment_child_prio(n.indices.len() - 1);
                    n = &mut n.children[pos];
                } else if n.wild_child {
                    // Inserting below a wildcard; check that the new pattern
                    // agrees with the existing one.
                    let last = n.children.len() - 1;
                    n = &mut n.children[last];
                    n.priority += 1;

                    if path.len() >= n.path.len()
                        && n.path[..] == path[..n.path.len()]
                        // Adding a child to a catch-all is not possible
                        && n.kind != NodeKind::CatchAll
                        // Check for a longer wildcard, e.g. :name and :names
                        && (n.path.len() >= path.len() || path[n.path.len()] == b'/')
                    {
                        continue 'walk;
                    }

                    // Wildcard conflict
                    let path_seg = if n.kind == NodeKind::CatchAll {
                        path
                    } else {
                        path.split(|&b| b == b'/').next().unwrap_or(path)
                    };
                    let path_seg = String::from_utf8_lossy(path_seg);
                    let wildcard = String::from_utf8_lossy(&n.path);
                    let prefix = match full_path.find(path_seg.as_ref()) {
                        Some(pos) => format!("{}{}", &full_path[..pos], wildcard),
                        None => wildcard.to_string(),
                    };
                    panic!(
                        "'{path_seg}' in new path '{full_path}' conflicts with existing \
                         wildcard '{wildcard}' in existing prefix '{prefix}'"
                    );
                }

                n.insert_child(path, full_path, handlers);
                return;
            }

            // Otherwise attach the handler chain to the current node
            assert!(
                n.handlers.is_empty(),
                "handlers are already registered for path '{full_path}'"
            );
            n.handlers = handlers;
            n.full_path = full_path.to_string();
            return;
        }
    }

    /// Builds out a leaf under construction, consuming `path` wildcard by
    /// wildcard.
    fn insert_child(&mut self, mut path: &[u8], full_path: &str, handlers: Vec<T>) {
        let mut n = self;

        loop {
            // Find prefix until first wildcard
            let Some((wildcard, i, valid)) = find_wildcard(path) else {
                break;
            };

            // The wildcard name must not contain ':' or '*'
            assert!(
                valid,
                "only one wildcard per path segment is allowed, has: '{}' in path '{full_path}'",
                String::from_utf8_lossy(wildcard)
            );

            // Check if the wildcard has a name
            assert!(
                wildcard.len() >= 2,
                "wildcards must be named with a non-empty name in path '{full_path}'"
            );

            if wildcard[0] == b':' {
                // param
                if i > 0 {
                    // Insert prefix before the current wildcard
                    n.path = path[..i].to_vec();
                    path = &path[i..];
                }

                n.add_child(Node {
                    kind: NodeKind::Param,
                    path: wildcard.to_vec(),
                    full_path: full_path.to_string(),
                    ..Node::default()
                });
                n.wild_child = true;
                let last = n.children.len() - 1;
                n = &mut n.children[last];
                n.priority += 1;

                // If the path doesn't end with the wildcard, there will be
                // another subpath starting with '/'
                if wildcard.len() < path.len() {
                    path = &path[wildcard.len()..];

                    n.add_child(Node {
                        priority: 1,
                        full_path: full_path.to_string(),
                        ..Node::default()
                    });
                    let last = n.children.len() - 1;
                    n = &mut n.children[last];
                    continue;
                }

                // Otherwise we're done. Insert the handle in the new leaf
                n.handlers = handlers;
                return;
            }

            // catch-all
            assert!(
                i + wildcard.len() == path.len(),
                "catch-all routes are only allowed at the end of the path in path '{full_path}'"
            );

            assert!(
                n.path.last() != Some(&b'/'),
                "catch-all conflicts with existing handle for the path segment root in path \
                 '{full_path}'"
            );

            // Currently fixed width 1 for '/'
            assert!(
                i > 0 && path[i - 1] == b'/',
                "no / before catch-all in path '{full_path}'"
            );
            let i = i - 1;

            n.path = path[..i].to_vec();

            // First node: empty catch-all carrying the '/' index, so a
            // zero-length match stays distinguishable from a non-empty one.
            n.add_child(Node {
                wild_child: true,
                kind: NodeKind::CatchAll,
                full_path: full_path.to_string(),
                ..Node::default()
            });
            n.indices = vec![b'/'];
            let last = n.children.len() - 1;
            n = &mut n.children[last];
            n.priority += 1;

            // Second node: leaf holding the variable
            n.children = vec![Node {
                path: path[i..].to_vec(),
                kind: NodeKind::CatchAll,
                handlers,
                priority: 1,
                full_path: full_path.to_string(),
                ..Node::default()
            }];

            return;
        }

        // No wildcard found; store the tail and attach the handler chain
        n.path = path.to_vec();
        n.handlers = handlers;
        n.full_path = full_path.to_string();
    }

    /// Walks the tree for `path`, capturing wildcard values into `params`.
    ///
    /// `skipped_nodes` records branch points where a static child was taken
    /// over a wildcard sibling; a dead end rolls back to the most recent
    /// viable record. On a miss, `tsr` reports whether the same path with a
    /// toggled trailing slash would have reached a terminal.
    ///
    /// The tree is only read; concurrent lookups are safe as long as each
    /// supplies its own `params` and `skipped_nodes` buffers.
    pub(crate) fn get_value<'a>(
        &'a self,
        path: &'a str,
        params: &mut Params<'a>,
        skipped_nodes: &mut SkippedNodes<'a, T>,
        unescape: bool,
    ) -> NodeValue<'a, T> {
        let mut n = self;
        let mut path: &'a [u8] = path.as_bytes();
        let mut value = NodeValue {
            handlers: None,
            tsr: false,
            full_path: "",
        };
        // Set right after a rollback: the restored node retries only its
        // wildcard child, never the static branch that already failed.
        let mut backtracking = false;

        'walk: loop {
            let prefix: &[u8] = &n.path;

            if path.len() > prefix.len() && &path[..prefix.len()] == prefix {
                let full = path;
                path = &path[prefix.len()..];

                // Try all the non-wildcard children first by matching the
                // indices
                if !backtracking {
                    let idxc = path[0];
                    for (i, &c) in n.indices.iter().enumerate() {
                        if c == idxc {
                            if n.wild_child {
                                skipped_nodes.push(Skipped {
                                    path: full,
                                    node: n,
                                    params_count: params.len(),
                                });
                            }
                            n = &n.children[i];
                            continue 'walk;
                        }
                    }
                }
                backtracking = false;

                if !n.wild_child {
                    // Dead end on a static branch; roll back to the last
                    // viable skipped wildcard, if any.
                    if path != b"/" {
                        while let Some(skipped) = skipped_nodes.pop() {
                            if skipped.path.ends_with(path) {
                                path = skipped.path;
                                n = skipped.node;
                                params.truncate(skipped.params_count);
                                backtracking = true;
                                continue 'walk;
                            }
                        }
                    }

                    // Nothing found. A redirect without the trailing slash
                    // may still work if a leaf exists for that path.
                    value.tsr = path == b"/" && !n.handlers.is_empty();
                    return value;
                }

                // Handle the wildcard child, which is always last
                n = &n.children[n.children.len() - 1];

                match n.kind {
                    NodeKind::Param => {
                        // Find param end (either '/' or path end)
                        let end = path.iter().position(|&c| c == b'/').unwrap_or(path.len());

                        params.push(
                            String::from_utf8_lossy(&n.path[1..]),
                            decode_value(&path[..end], unescape),
                        );

                        // We need to go deeper!
                        if end < path.len() {
                            if !n.children.is_empty() {
                                path = &path[end..];
                                n = &n.children[0];
                                continue 'walk;
                            }

                            // ... but we can't
                            value.tsr = path.len() == end + 1;
                            return value;
                        }

                        if !n.handlers.is_empty() {
                            value.handlers = Some(n.handlers.as_slice());
                            value.full_path = &n.full_path;
                            return value;
                        }
                        if n.children.len() == 1 {
                            // No handle found. Check if one exists for this
                            // path plus a trailing slash.
                            let child = &n.children[0];
                            value.tsr = child.path == b"/" && !child.handlers.is_empty();
                        }
                        return value;
                    }

                    NodeKind::CatchAll => {
                        params.push(
                            String::from_utf8_lossy(&n.path[2..]),
                            decode_value(path, unescape),
                        );

                        value.handlers = Some(n.handlers.as_slice());
                        value.full_path = &n.full_path;
                        return value;
                    }

                    NodeKind::Static | NodeKind::Root => {
                        unreachable!("wildcard child must be a param or catch-all node")
                    }
                }
            }

            if path == prefix {
                // Roll back if this node cannot terminate the walk but a
                // skipped wildcard might.
                if n.handlers.is_empty() && path != b"/" {
                    while let Some(skipped) = skipped_nodes.pop() {
                        if skipped.path.ends_with(path) {
                            path = skipped.path;
                            n = skipped.node;
                            params.truncate(skipped.params_count);
                            backtracking = true;
                            continue 'walk;
                        }
                    }
                }

                // We should have reached the node containing the handle
                if !n.handlers.is_empty() {
                    value.handlers = Some(n.handlers.as_slice());
                    value.full_path = &n.full_path;
                    return value;
                }

                // No handle, but a wildcard child means a handle must exist
                // for this path plus a trailing slash
                if path == b"/" && n.wild_child && n.kind != NodeKind::Root {
                    value.tsr = true;
                    return value;
                }

                // Check if a handle for this path plus a trailing slash
                // exists, for a redirect recommendation
                for (i, &c) in n.indices.iter().enumerate() {
                    if c == b'/' {
                        let child = &n.children[i];
                        value.tsr = (child.path.len() == 1 && !child.handlers.is_empty())
                            || (child.kind == NodeKind::CatchAll
                                && !child.children[0].handlers.is_empty());
                        return value;
                    }
                }

                return value;
            }

            // Nothing found. Recommend redirecting with an extra trailing
            // slash if a leaf exists for that path.
            value.tsr = path == b"/"
                || (prefix.len() == path.len() + 1
                    && prefix[path.len()] == b'/'
                    && path == &prefix[..prefix.len() - 1]
                    && !n.handlers.is_empty());

            if !value.tsr && path != b"/" {
                while let Some(skipped) = skipped_nodes.pop() {
                    if skipped.path.ends_with(path) {
                        path = skipped.path;
                        n = skipped.node;
                        params.truncate(skipped.params_count);
                        backtracking = true;
                        continue 'walk;
                    }
                }
            }

            return value;
        }
    }
}

/// Captured values stay raw unless `unescape` is set; a value that fails to
/// decode is kept raw rather than rejected.
fn decode_value(raw: &[u8], unescape: bool) -> Cow<'_, str> {
    match String::from_utf8_lossy(raw) {
        Cow::Borrowed(s) => {
            if unescape {
                percent_decode_str(s)
                    .decode_utf8()
                    .unwrap_or(Cow::Borrowed(s))
            } else {
                Cow::Borrowed(s)
            }
        }
        Cow::Owned(s) => {
            if unescape {
                match percent_decode_str(&s).decode_utf8() {
                    Ok(decoded) => Cow::Owned(decoded.into_owned()),
                    Err(_) => Cow::Owned(s),
                }
            } else {
                Cow::Owned(s)
            }
        }
    }
}

/// Truncates `full_path` to `len` bytes for a split intermediate, falling
/// back to a lossy conversion when the split lands inside a multi-byte
/// character.
fn lossy_prefix(full_path: &str, len: usize) -> String {
    match full_path.get(..len) {
        Some(prefix) => prefix.to_string(),
        None => String::from_utf8_lossy(&full_path.as_bytes()[..len]).into_owned(),
    }
}
