//! Invite tree reconstruction.
//!
//! The invite graph stored for a group is a set of "A invited B" edges. For
//! display it is turned into a tree:
//!
//! - the root is the one user who invited someone but was never invited;
//! - when there is no such user, or several, the inviter of the earliest
//!   edge is used instead;
//! - a depth-first walk with a visited set breaks cycles, children ordered
//!   by invite time;
//! - members the walk never reaches become extra trees in `detached`.

use std::collections::{HashMap, HashSet};

use list_db::repositories::InviteGraph;
use list_db::repositories::invite::InviteEdge;
use sea_orm::prelude::DateTimeWithTimeZone;
use serde::Serialize;

/// A user in the invite tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InviteTreeNode {
    pub user_id: String,
    /// When the user joined the group. `None` for users that only appear
    /// in edges (e.g. an inviter who has since left).
    pub joined_at: Option<DateTimeWithTimeZone>,
    /// When this user was invited by their parent in the tree.
    pub invited_at: Option<DateTimeWithTimeZone>,
    pub children: Vec<InviteTreeNode>,
}

impl InviteTreeNode {
    fn new(
        user_id: &str,
        joined_at: Option<DateTimeWithTimeZone>,
        invited_at: Option<DateTimeWithTimeZone>,
    ) -> Self {
        Self {
            user_id: user_id.to_string(),
            joined_at,
            invited_at,
            children: Vec::new(),
        }
    }

    /// Number of users in this subtree, including this one.
    #[must_use]
    pub fn size(&self) -> usize {
        let mut size = 0;
        let mut pending = vec![self];
        while let Some(node) = pending.pop() {
            size += 1;
            pending.extend(&node.children);
        }
        size
    }
}

// Long invite chains nest deeply; drop them without recursing.
impl Drop for InviteTreeNode {
    fn drop(&mut self) {
        let mut pending = std::mem::take(&mut self.children);
        while let Some(mut node) = pending.pop() {
            pending.append(&mut node.children);
        }
    }
}

/// Invite tree of a group.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InviteTree {
    pub root: Option<InviteTreeNode>,
    pub detached: Vec<InviteTreeNode>,
}

impl InviteTree {
    /// Total number of users across the root tree and detached trees.
    #[must_use]
    pub fn len(&self) -> usize {
        self.root.as_ref().map_or(0, InviteTreeNode::size)
            + self.detached.iter().map(InviteTreeNode::size).sum::<usize>()
    }

    /// Whether the tree holds no users at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

struct Walker<'a> {
    children: HashMap<&'a str, Vec<&'a InviteEdge>>,
    joined: HashMap<&'a str, DateTimeWithTimeZone>,
    visited: HashSet<&'a str>,
}

/// A node being filled in and the position in its outgoing edges.
struct Frame<'w, 'a> {
    node: InviteTreeNode,
    edges: &'w [&'a InviteEdge],
    next: usize,
}

impl<'w, 'a> Frame<'w, 'a> {
    fn new(
        children: &'w HashMap<&'a str, Vec<&'a InviteEdge>>,
        joined: &HashMap<&'a str, DateTimeWithTimeZone>,
        user_id: &str,
        invited_at: Option<DateTimeWithTimeZone>,
    ) -> Self {
        Self {
            node: InviteTreeNode::new(user_id, joined.get(user_id).copied(), invited_at),
            edges: children.get(user_id).map_or(&[], Vec::as_slice),
            next: 0,
        }
    }
}

impl<'a> Walker<'a> {
    /// Depth-first walk from `user_id` over unvisited invitees.
    fn walk(&mut self, user_id: &'a str) -> Option<InviteTreeNode> {
        self.visited.insert(user_id);
        let mut stack = vec![Frame::new(&self.children, &self.joined, user_id, None)];
        let mut finished = None;

        while let Some(top) = stack.last_mut() {
            let unvisited = top.edges[top.next..]
                .iter()
                .position(|e| !self.visited.contains(e.invitee_id.as_str()));

            if let Some(offset) = unvisited {
                let edge = top.edges[top.next + offset];
                top.next += offset + 1;
                self.visited.insert(edge.invitee_id.as_str());
                stack.push(Frame::new(
                    &self.children,
                    &self.joined,
                    &edge.invitee_id,
                    Some(edge.created_at),
                ));
                continue;
            }

            if let Some(done) = stack.pop() {
                match stack.last_mut() {
                    Some(parent) => parent.node.children.push(done.node),
                    None => finished = Some(done.node),
                }
            }
        }

        finished
    }
}

/// Build the invite tree of a group from its raw graph.
#[must_use]
pub fn build_invite_tree(graph: &InviteGraph) -> InviteTree {
    let mut edges: Vec<&InviteEdge> = graph.edges.iter().collect();
    edges.sort_by(|a, b| a.created_at.cmp(&b.created_at));

    let mut children: HashMap<&str, Vec<&InviteEdge>> = HashMap::new();
    for &edge in &edges {
        children
            .entry(edge.inviter_id.as_str())
            .or_default()
            .push(edge);
    }

    let joined: HashMap<&str, DateTimeWithTimeZone> = graph
        .members
        .iter()
        .map(|m| (m.user_id.as_str(), m.joined_at))
        .collect();

    // Everyone, members in join order first, then users only seen in edges.
    let mut members: Vec<_> = graph.members.iter().collect();
    members.sort_by(|a, b| a.joined_at.cmp(&b.joined_at));
    let mut everyone: Vec<&str> = members.iter().map(|m| m.user_id.as_str()).collect();
    let mut seen: HashSet<&str> = everyone.iter().copied().collect();
    for &edge in &edges {
        for id in [edge.inviter_id.as_str(), edge.invitee_id.as_str()] {
            if seen.insert(id) {
                everyone.push(id);
            }
        }
    }

    let root_id = find_root(&edges).or_else(|| everyone.first().copied());

    let mut walker = Walker {
        children,
        joined,
        visited: HashSet::new(),
    };

    let root = root_id.and_then(|id| walker.walk(id));

    let inviters_of: HashMap<&str, Vec<&str>> =
        edges.iter().fold(HashMap::new(), |mut acc, edge| {
            acc.entry(edge.invitee_id.as_str())
                .or_default()
                .push(edge.inviter_id.as_str());
            acc
        });

    let mut detached = Vec::new();
    // Start detached trees at users nobody unvisited invited, so a chain
    // hangs together under its own top.
    for &user_id in &everyone {
        if walker.visited.contains(user_id) {
            continue;
        }
        let has_pending_inviter = inviters_of
            .get(user_id)
            .is_some_and(|inviters| inviters.iter().any(|i| !walker.visited.contains(i)));
        if !has_pending_inviter {
            detached.extend(walker.walk(user_id));
        }
    }
    // Whatever is left sits on a cycle of unvisited users.
    for &user_id in &everyone {
        if !walker.visited.contains(user_id) {
            detached.extend(walker.walk(user_id));
        }
    }

    InviteTree { root, detached }
}

fn find_root<'a>(edges: &[&'a InviteEdge]) -> Option<&'a str> {
    let invitees: HashSet<&str> = edges.iter().map(|e| e.invitee_id.as_str()).collect();

    let candidates: HashSet<&str> = edges
        .iter()
        .map(|e| e.inviter_id.as_str())
        .filter(|inviter| !invitees.contains(inviter))
        .collect();

    if candidates.len() == 1 {
        return candidates.into_iter().next();
    }
    edges.first().map(|e| e.inviter_id.as_str())
}
