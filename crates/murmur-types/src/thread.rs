use std::collections::{HashMap, HashSet};

use uuid::Uuid;

use crate::models::{Comment, CommentThread};

/// Rebuild one-level comment threads from a flat list.
///
/// Replies to replies are attached to the root of their chain. A reply whose
/// parent is absent (deleted or hidden) becomes a top-level comment, as does
/// anything caught in a parent cycle. Roots and replies are both ordered
/// oldest first, ties broken by id.
pub fn build_threads(mut comments: Vec<Comment>) -> Vec<CommentThread> {
    comments.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));

    let parents: HashMap<Uuid, Option<Uuid>> =
        comments.iter().map(|c| (c.id, c.parent_id)).collect();

    let mut roots: Vec<CommentThread> = Vec::new();
    let mut root_index: HashMap<Uuid, usize> = HashMap::new();
    let mut replies: Vec<(Uuid, Comment)> = Vec::new();

    for comment in comments {
        match resolve_root(comment.id, &parents) {
            Some(root) if root != comment.id => replies.push((root, comment)),
            _ => {
                root_index.insert(comment.id, roots.len());
                roots.push(CommentThread {
                    comment,
                    replies: Vec::new(),
                });
            }
        }
    }

    // `replies` is already in order, so pushing keeps each thread sorted.
    for (root, reply) in replies {
        if let Some(&idx) = root_index.get(&root) {
            roots[idx].replies.push(reply);
        }
    }

    roots
}

/// Follow parent links to the top. Returns `None` on a cycle.
fn resolve_root(id: Uuid, parents: &HashMap<Uuid, Option<Uuid>>) -> Option<Uuid> {
    let mut seen = HashSet::new();
    let mut current = id;

    loop {
        if !seen.insert(current) {
            return None;
        }
        match parents.get(&current).copied().flatten() {
            Some(parent) if parents.contains_key(&parent) => current = parent,
            _ => return Some(current),
        }
    }
}
