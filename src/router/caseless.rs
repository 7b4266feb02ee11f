//! Case-insensitive path recovery.
//!
//! Re-walks a route tree comparing bytes under Unicode simple case folding,
//! producing the registered spelling of a path that only differs in case
//! (and, optionally, in a trailing slash). Because tree edges split on byte
//! boundaries, a multi-byte character can straddle two nodes; a rolling
//! 4-byte buffer carries the unconsumed bytes of the current folded
//! character across node boundaries.

use super::tree::{Node, NodeKind};

impl<T> Node<T> {
    /// Looks up `path` case-insensitively and returns the case-corrected
    /// registered path, if one exists. With `fix_trailing_slash`, a missing
    /// or extra trailing `/` is repaired when a terminal exists under the
    /// alternative spelling.
    ///
    /// Parameter and catch-all values are copied into the corrected path
    /// verbatim, without case folding.
    pub(crate) fn find_case_insensitive_path(
        &self,
        path: &str,
        fix_trailing_slash: bool,
    ) -> Option<String> {
        let buf = Vec::with_capacity(path.len() + 1);
        let ci_path = self.find_case_insensitive_path_rec(
            path.as_bytes(),
            buf,
            [0u8; 4], // empty rune buffer
            fix_trailing_slash,
        )?;
        Some(String::from_utf8_lossy(&ci_path).into_owned())
    }

    fn find_case_insensitive_path_rec(
        &self,
        mut path: &[u8],
        mut ci_path: Vec<u8>,
        mut rb: [u8; 4],
        fix_trailing_slash: bool,
    ) -> Option<Vec<u8>> {
        let mut n = self;
        let mut np_len = n.path.len();

        'walk: while path.len() >= np_len
            && (np_len == 0 || eq_fold(&path[1..np_len], &n.path[1..]))
        {
            let old_path = path;
            path = &path[np_len..];
            ci_path.extend_from_slice(&n.path);

            if path.is_empty() {
                // We should have reached the node containing the handle
                if !n.handlers.is_empty() {
                    return Some(ci_path);
                }

                // No handle found. Try to fix the path by adding a trailing
                // slash.
                if fix_trailing_slash {
                    for (i, &c) in n.indices.iter().enumerate() {
                        if c == b'/' {
                            let child = &n.children[i];
                            if (child.path.len() == 1 && !child.handlers.is_empty())
                                || (child.kind == NodeKind::CatchAll
                                    && !child.children[0].handlers.is_empty())
                            {
                                ci_path.push(b'/');
                                return Some(ci_path);
                            }
                            return None;
                        }
                    }
                }
                return None;
            }

            if !n.wild_child {
                // Skip bytes of the current rune already consumed by the
                // node we just matched.
                rb = shift_rune_bytes(rb, np_len);

                if rb[0] != 0 {
                    // Old rune not finished
                    let idxc = rb[0];
                    for (i, &c) in n.indices.iter().enumerate() {
                        if c == idxc {
                            n = &n.children[i];
                            np_len = n.path.len();
                            continue 'walk;
                        }
                    }
                } else if let Some((rune, off)) = rune_at_boundary(old_path, np_len) {
                    // Calculate the lowercase bytes of the current rune
                    let lo = fold_lower(rune);
                    rb = shift_rune_bytes(encode_rune(lo), off);

                    let idxc = rb[0];
                    for (i, &c) in n.indices.iter().enumerate() {
                        // Lowercase matches
                        if c == idxc {
                            // Uppercase may also exist as an index, so both
                            // branches have to be explored; recurse.
                            if let Some(out) = n.children[i].find_case_insensitive_path_rec(
                                path,
                                ci_path.clone(),
                                rb,
                                fix_trailing_slash,
                            ) {
                                return Some(out);
                            }
                            break;
                        }
                    }

                    // Same for the uppercase rune, if it differs
                    let up = fold_upper(rune);
                    if up != lo {
                        rb = shift_rune_bytes(encode_rune(up), off);

                        let idxc = rb[0];
                        for (i, &c) in n.indices.iter().enumerate() {
                            // Uppercase matches
                            if c == idxc {
                                n = &n.children[i];
                                np_len = n.path.len();
                                continue 'walk;
                            }
                        }
                    }
                }

                // Nothing found. A redirect without the trailing slash may
                // still work if a leaf exists for that path.
                if fix_trailing_slash && path == b"/" && !n.handlers.is_empty() {
                    return Some(ci_path);
                }
                return None;
            }

            // The wildcard child is always last; values are copied through
            // without folding.
            n = &n.children[n.children.len() - 1];
            match n.kind {
                NodeKind::Param => {
                    // Find param end (either '/' or path end)
                    let end = path.iter().position(|&c| c == b'/').unwrap_or(path.len());

                    // Add the param value to the corrected path
                    ci_path.extend_from_slice(&path[..end]);

                    // We need to go deeper!
                    if end < path.len() {
                        if !n.children.is_empty() {
                            n = &n.children[0];
                            np_len = n.path.len();
                            path = &path[end..];
                            continue 'walk;
                        }

                        // ... but we can't
                        if fix_trailing_slash && path.len() == end + 1 {
                            return Some(ci_path);
                        }
                        return None;
                    }

                    if !n.handlers.is_empty() {
                        return Some(ci_path);
                    }

                    if fix_trailing_slash && n.children.len() == 1 {
                        // No handle found. Check if one exists for this path
                        // plus a trailing slash.
                        let child = &n.children[0];
                        if child.path == b"/" && !child.handlers.is_empty() {
                            ci_path.push(b'/');
                            return Some(ci_path);
                        }
                    }

                    return None;
                }

                NodeKind::CatchAll => {
                    ci_path.extend_from_slice(path);
                    return Some(ci_path);
                }

                NodeKind::Static | NodeKind::Root => {
                    unreachable!("wildcard child must be a param or catch-all node")
                }
            }
        }

        // Nothing found. Try to fix the path by adding or removing a
        // trailing slash.
        if fix_trailing_slash {
            if path == b"/" {
                return Some(ci_path);
            }
            if !path.is_empty()
                && path.len() + 1 == np_len
                && n.path[path.len()] == b'/'
                && eq_fold(&path[1..], &n.path[1..path.len()])
                && !n.handlers.is_empty()
            {
                ci_path.extend_from_slice(&n.path);
                return Some(ci_path);
            }
        }
        None
    }
}

/// Discards the first `n` bytes of the rune buffer, zero-filling the tail.
fn shift_rune_bytes(rb: [u8; 4], n: usize) -> [u8; 4] {
    match n {
        0 => rb,
        1 => [rb[1], rb[2], rb[3], 0],
        2 => [rb[2], rb[3], 0, 0],
        3 => [rb[3], 0, 0, 0],
        _ => [0; 4],
    }
}

fn encode_rune(c: char) -> [u8; 4] {
    let mut buf = [0u8; 4];
    c.encode_utf8(&mut buf);
    buf
}

/// Simple one-to-one case mappings; multi-character expansions collapse to
/// their first scalar, matching per-rune folding.
fn fold_lower(c: char) -> char {
    c.to_lowercase().next().unwrap_or(c)
}

fn fold_upper(c: char) -> char {
    c.to_uppercase().next().unwrap_or(c)
}

fn is_rune_start(b: u8) -> bool {
    b & 0xC0 != 0x80
}

/// Decodes the character containing the byte at `pos` of `bytes`; the
/// character may begin up to three bytes earlier. Returns the character and
/// how many of its bytes precede `pos`.
fn rune_at_boundary(bytes: &[u8], pos: usize) -> Option<(char, usize)> {
    let mut off = 0;
    let max = pos.min(3);
    loop {
        let i = pos - off;
        if is_rune_start(bytes[i]) {
            let (rune, _) = decode_rune(&bytes[i..])?;
            return Some((rune, off));
        }
        off += 1;
        if off >= max {
            return None;
        }
    }
}

/// Decodes the first UTF-8 scalar of `bytes`; an invalid byte decodes as
/// the replacement character with width 1.
fn decode_rune(bytes: &[u8]) -> Option<(char, usize)> {
    let first = *bytes.first()?;
    if first < 0x80 {
        return Some((first as char, 1));
    }
    let len = match first {
        0xC0..=0xDF => 2,
        0xE0..=0xEF => 3,
        0xF0..=0xF7 => 4,
        _ => return Some((char::REPLACEMENT_CHARACTER, 1)),
    };
    match bytes.get(..len).and_then(|s| std::str::from_utf8(s).ok()) {
        Some(s) => s.chars().next().map(|c| (c, len)),
        None => Some((char::REPLACEMENT_CHARACTER, 1)),
    }
}

/// Unicode simple-fold equality over raw bytes; invalid sequences compare
/// as replacement characters.
fn eq_fold(mut a: &[u8], mut b: &[u8]) -> bool {
    loop {
        match (decode_rune(a), decode_rune(b)) {
            (None, None) => return true,
            (Some((ca, la)), Some((cb, lb))) => {
                if fold_lower(ca) != fold_lower(cb) {
                    return false;
                }
                a = &a[la..];
                b = &b[lb..];
            }
            _ => return false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eq_fold_ascii_and_unicode() {
        assert!(eq_fold(b"Users", b"users"));
        assert!(eq_fold("CAFÉ".as_bytes(), "café".as_bytes()));
        assert!(!eq_fold(b"users", b"user"));
        assert!(!eq_fold(b"abc", b"abd"));
    }

    #[test]
    fn test_shift_rune_bytes() {
        let rb = [1, 2, 3, 4];
        assert_eq!(shift_rune_bytes(rb, 0), [1, 2, 3, 4]);
        assert_eq!(shift_rune_bytes(rb, 2), [3, 4, 0, 0]);
        assert_eq!(shift_rune_bytes(rb, 4), [0; 4]);
    }

    #[test]
    fn test_rune_at_boundary_backs_up() {
        // 'é' is C3 A9; position 2 lands on its continuation byte.
        let bytes = "xé".as_bytes();
        let (rune, off) = rune_at_boundary(bytes, 2).unwrap();
        assert_eq!(rune, 'é');
        assert_eq!(off, 1);

        let (rune, off) = rune_at_boundary(b"ab", 1).unwrap();
        assert_eq!(rune, 'b');
        assert_eq!(off, 0);
    }

    #[test]
    fn test_simple_walk() {
        let mut root: Node<&'static str> = Node::default();
        root.add_route("/Users", vec!["users"]);

        let fixed = root.find_case_insensitive_path("/users", false);
        assert_eq!(fixed.as_deref(), Some("/Users"));
        assert!(root.find_case_insensitive_path("/userz", false).is_none());
    }

    #[test]
    fn test_param_values_copied_verbatim() {
        let mut root: Node<&'static str> = Node::default();
        root.add_route("/Users/:id/Posts", vec!["posts"]);

        let fixed = root.find_case_insensitive_path("/users/AbC/posts", false);
        assert_eq!(fixed.as_deref(), Some("/Users/AbC/Posts"));
    }
}
