//! Undirected piece graph and union-find used by the resolver and clustering.

use kitgraph_model::{Connection, Design};
use std::collections::{HashMap, VecDeque};

/// Adjacency list over a design's pieces.
///
/// Nodes are the piece ids in lexical order. Each node lists its edges as
/// `(neighbor, connection index)` in design connection order.
#[derive(Debug)]
pub(crate) struct PieceGraph<'a> {
    ids: Vec<&'a str>,
    edges: Vec<Vec<(usize, usize)>>,
}

impl<'a> PieceGraph<'a> {
    /// Graph over every piece, keeping the connections accepted by `keep`
    /// whose endpoints both exist.
    pub(crate) fn new(design: &'a Design, mut keep: impl FnMut(usize, &Connection) -> bool) -> Self {
        let mut ids: Vec<&str> = design.pieces.iter().map(|p| p.id.as_str()).collect();
        ids.sort_unstable();
        ids.dedup();
        let index: HashMap<&str, usize> = ids.iter().enumerate().map(|(i, id)| (*id, i)).collect();
        let mut edges = vec![Vec::new(); ids.len()];
        for (ci, connection) in design.connections.iter().enumerate() {
            let a = index.get(connection.connected.anchor().as_str());
            let b = index.get(connection.connecting.anchor().as_str());
            if let (Some(&a), Some(&b)) = (a, b) {
                if a != b && keep(ci, connection) {
                    edges[a].push((b, ci));
                    edges[b].push((a, ci));
                }
            }
        }
        Self { ids, edges }
    }

    pub(crate) fn len(&self) -> usize {
        self.ids.len()
    }

    pub(crate) fn id(&self, node: usize) -> &'a str {
        self.ids[node]
    }

    #[cfg(test)]
    pub(crate) fn node(&self, id: &str) -> Option<usize> {
        self.ids.binary_search(&id).ok()
    }

    pub(crate) fn edges(&self, node: usize) -> &[(usize, usize)] {
        &self.edges[node]
    }

    pub(crate) fn degree(&self, node: usize) -> usize {
        self.edges[node].len()
    }

    /// Connected components, each sorted, ordered by their lowest node.
    pub(crate) fn components(&self) -> Vec<Vec<usize>> {
        let mut seen = vec![false; self.len()];
        let mut out = Vec::new();
        for start in 0..self.len() {
            if seen[start] {
                continue;
            }
            seen[start] = true;
            let mut component = vec![start];
            let mut queue = VecDeque::from([start]);
            while let Some(node) = queue.pop_front() {
                for &(next, _) in self.edges(node) {
                    if !seen[next] {
                        seen[next] = true;
                        component.push(next);
                        queue.push_back(next);
                    }
                }
            }
            component.sort_unstable();
            out.push(component);
        }
        out
    }
}

/// Union-find with path compression and union by rank.
#[derive(Debug, Clone)]
pub(crate) struct UnionFind {
    parent: Vec<usize>,
    rank: Vec<usize>,
}

impl UnionFind {
    pub(crate) fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
            rank: vec![0; n],
        }
    }

    pub(crate) fn find(&mut self, x: usize) -> usize {
        if self.parent[x] != x {
            self.parent[x] = self.find(self.parent[x]);
        }
        self.parent[x]
    }

    pub(crate) fn union(&mut self, x: usize, y: usize) {
        let root_x = self.find(x);
        let root_y = self.find(y);
        if root_x == root_y {
            return;
        }
        match self.rank[root_x].cmp(&self.rank[root_y]) {
            std::cmp::Ordering::Less => self.parent[root_x] = root_y,
            std::cmp::Ordering::Greater => self.parent[root_y] = root_x,
            std::cmp::Ordering::Equal => {
                self.parent[root_y] = root_x;
                self.rank[root_x] += 1;
            }
        }
    }

    /// Sets as sorted member lists, ordered by their lowest member.
    pub(crate) fn groups(&mut self) -> Vec<Vec<usize>> {
        let mut by_root: HashMap<usize, Vec<usize>> = HashMap::new();
        for x in 0..self.parent.len() {
            let root = self.find(x);
            by_root.entry(root).or_default().push(x);
        }
        let mut groups: Vec<Vec<usize>> = by_root.into_values().collect();
        groups.sort_unstable_by_key(|g| g[0]);
        groups
    }
}
