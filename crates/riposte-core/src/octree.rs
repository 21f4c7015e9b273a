//! Loose octree over collision primitives.
//!
//! Nodes live in an arena indexed by `u32`; child and parent links are
//! plain indices, with [`NULL`] marking an empty slot, so the upward
//! search needs no back-references. The tree is *loose*: an item is held
//! by the deepest node whose region fully contains its bounds, and an
//! item straddling a child boundary stays at the parent instead of being
//! split across children.
//!
//! Insertion is deferred: [`enqueue`](Octree::enqueue) parks the primitive
//! and the next [`update`](Octree::update) drains the queue, so items can
//! be registered while the tree is busy elsewhere in the tick. `update`
//! also integrates every contained body, re-homes the ones that moved,
//! and ages empty leaves: an empty leaf counts down and is pruned at
//! zero, while a region that regains content earns a longer lifespan,
//! keeping hot regions allocated.

use std::collections::{HashMap, VecDeque};

use riposte_contact::{Contact, ContactParams};
use riposte_types::{Aabb, BodySet, Containment, PhysicsError};

use crate::narrow;
use crate::prim::{PrimId, PrimitiveSet};

/// Sentinel for an absent arena link.
const NULL: u32 = u32::MAX;

/// Ticks a fresh empty leaf survives before pruning.
const BASE_LIFESPAN: u32 = 8;

/// Upper bound on the lifespan a frequently reused region can earn.
const LIFESPAN_CAP: u32 = 64;

#[derive(Debug)]
struct Node {
    region: Aabb,
    items: Vec<PrimId>,
    parent: u32,
    children: [u32; 8],
    /// `-1` until the countdown starts, then ticks toward zero.
    current_life: i32,
    max_lifespan: u32,
}

impl Node {
    fn new(region: Aabb, parent: u32) -> Self {
        Self {
            region,
            items: Vec::new(),
            parent,
            children: [NULL; 8],
            current_life: -1,
            max_lifespan: BASE_LIFESPAN,
        }
    }

    fn is_leaf(&self) -> bool {
        self.children.iter().all(|&c| c == NULL)
    }
}

/// Dynamic loose octree, the broad phase of the engine.
#[derive(Debug)]
pub struct Octree {
    nodes: Vec<Node>,
    free: Vec<u32>,
    root: u32,
    min_size: f64,
    pending: VecDeque<PrimId>,
    locations: HashMap<PrimId, u32>,
}

impl Octree {
    /// Build a tree covering `play_area`, subdividing no finer than
    /// `min_size`.
    ///
    /// The root region is the smallest power-of-two cube enclosing the
    /// play area, so octant edges stay representable through repeated
    /// halving.
    ///
    /// # Errors
    ///
    /// [`PhysicsError::DegenerateRegion`] for a zero-size or non-finite
    /// play area, [`PhysicsError::InvalidConfig`] for a bad `min_size`.
    pub fn new(play_area: Aabb, min_size: f64) -> Result<Self, PhysicsError> {
        if play_area.is_degenerate() {
            let size = play_area.size();
            return Err(PhysicsError::DegenerateRegion {
                size: [size.x, size.y, size.z],
            });
        }
        if !min_size.is_finite() || min_size <= 0.0 {
            return Err(PhysicsError::invalid_config(format!(
                "minimum node size must be finite and positive, got {min_size}"
            )));
        }

        let region = play_area.enclosing_cube();
        Ok(Self {
            nodes: vec![Node::new(region, NULL)],
            free: Vec::new(),
            root: 0,
            min_size,
            pending: VecDeque::new(),
            locations: HashMap::new(),
        })
    }

    /// The root region: the power-of-two cube enclosing the play area.
    #[must_use]
    pub fn root_region(&self) -> Aabb {
        self.nodes[self.root as usize].region
    }

    /// Live nodes in the arena.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len() - self.free.len()
    }

    /// Primitives currently placed in the tree (pending ones excluded).
    #[must_use]
    pub fn item_count(&self) -> usize {
        self.locations.len()
    }

    /// Region of the node holding the primitive, if it has been placed.
    #[must_use]
    pub fn holding_region(&self, prim: PrimId) -> Option<Aabb> {
        self.locations
            .get(&prim)
            .map(|&node| self.nodes[node as usize].region)
    }

    /// Park a primitive for insertion during the next [`update`](Self::update).
    pub fn enqueue(&mut self, prim: PrimId) {
        self.pending.push_back(prim);
    }

    /// Drop a primitive from the tree (and from the pending queue).
    ///
    /// Returns `false` if the tree never knew the primitive.
    pub fn remove(&mut self, prim: PrimId) -> bool {
        let was_pending = self.pending.iter().any(|&p| p == prim);
        self.pending.retain(|&p| p != prim);
        self.detach(prim).is_some() || was_pending
    }

    /// Advance the tree by one tick.
    ///
    /// In order: drain pending insertions; age and prune empty leaves;
    /// integrate every contained body, marking primitives whose body did
    /// not move as stationary; re-home every moved primitive into the
    /// deepest node that still contains it. A moved body that no longer
    /// fits the root region is pinned there with a warning rather than
    /// aborting the step.
    ///
    /// # Errors
    ///
    /// [`PhysicsError::PlayAreaExceeded`] if a *newly inserted* item does
    /// not fit the root region (the item stays queued so the caller can
    /// rebuild with a larger play area and retry);
    /// [`PhysicsError::InvalidPrimitive`] / [`PhysicsError::InvalidBody`]
    /// if the sets and the tree have gone out of sync.
    pub fn update(
        &mut self,
        prims: &mut PrimitiveSet,
        bodies: &mut BodySet,
        dt: f64,
    ) -> Result<(), PhysicsError> {
        while let Some(prim_id) = self.pending.pop_front() {
            if self.locations.contains_key(&prim_id) {
                continue;
            }
            let prim = prims
                .get(prim_id)
                .ok_or(PhysicsError::InvalidPrimitive { index: prim_id.raw() })?;
            let node = match prim.aabb(bodies) {
                Some(bounds) => match self.place(self.root, &bounds) {
                    Ok(node) => node,
                    Err(err) => {
                        self.pending.push_front(prim_id);
                        return Err(err);
                    }
                },
                // Planes and other unbounded primitives live at the root.
                None => self.root,
            };
            self.attach(prim_id, node);
        }

        let mut moved = Vec::new();
        self.update_node(self.root, prims, bodies, dt, &mut moved)?;

        for prim_id in moved {
            let Some(bounds) = prims.get(prim_id).and_then(|p| p.aabb(bodies)) else {
                continue;
            };
            let Some(&current) = self.locations.get(&prim_id) else {
                continue;
            };
            match self.place(current, &bounds) {
                Ok(node) if node != current => {
                    self.detach(prim_id);
                    self.attach(prim_id, node);
                }
                Ok(_) => {}
                Err(PhysicsError::PlayAreaExceeded {
                    required,
                    available,
                }) => {
                    tracing::warn!(
                        prim = %prim_id,
                        required,
                        available,
                        "body left the play area, pinning it to the root node"
                    );
                    self.detach(prim_id);
                    self.attach(prim_id, self.root);
                }
                Err(err) => return Err(err),
            }
        }
        Ok(())
    }

    /// Collect narrow-phase contacts for every pair the tree can bring
    /// together: items sharing a node pairwise, and each item against
    /// every item held by a strict ancestor. Disjoint subtrees are never
    /// tested against each other, and each pair is visited exactly once,
    /// in tree order.
    ///
    /// # Errors
    ///
    /// Propagates narrow-phase lookup failures; see
    /// [`narrow::contacts_between`].
    pub fn collect_contacts(
        &self,
        prims: &PrimitiveSet,
        bodies: &BodySet,
        params: ContactParams,
        out: &mut Vec<Contact>,
    ) -> Result<usize, PhysicsError> {
        let before = out.len();
        let mut ancestors = Vec::new();
        self.gather(self.root, &mut ancestors, prims, bodies, params, out)?;
        Ok(out.len() - before)
    }

    fn gather(
        &self,
        index: u32,
        ancestors: &mut Vec<PrimId>,
        prims: &PrimitiveSet,
        bodies: &BodySet,
        params: ContactParams,
        out: &mut Vec<Contact>,
    ) -> Result<(), PhysicsError> {
        let node = &self.nodes[index as usize];

        for &above in ancestors.iter() {
            for &local in &node.items {
                narrow::contacts_between(prims, bodies, above, local, params, out)?;
            }
        }
        for i in 0..node.items.len() {
            for j in (i + 1)..node.items.len() {
                narrow::contacts_between(prims, bodies, node.items[i], node.items[j], params, out)?;
            }
        }

        if node.is_leaf() {
            return Ok(());
        }
        let added = node.items.len();
        ancestors.extend(node.items.iter().copied());
        for &child in &node.children {
            if child != NULL {
                self.gather(child, ancestors, prims, bodies, params, out)?;
            }
        }
        ancestors.truncate(ancestors.len() - added);
        Ok(())
    }

    /// Lifespan bookkeeping, pruning, and integration for one node, then
    /// its children.
    fn update_node(
        &mut self,
        index: u32,
        prims: &mut PrimitiveSet,
        bodies: &mut BodySet,
        dt: f64,
        moved: &mut Vec<PrimId>,
    ) -> Result<(), PhysicsError> {
        let is_leaf = self.nodes[index as usize].is_leaf();
        let node = &mut self.nodes[index as usize];
        if node.items.is_empty() {
            if is_leaf {
                if node.current_life < 0 {
                    node.current_life = node.max_lifespan as i32;
                } else if node.current_life > 0 {
                    node.current_life -= 1;
                }
            }
        } else if node.current_life >= 0 {
            // The region is in use again: reward it with a longer lease.
            node.max_lifespan = (node.max_lifespan * 2).min(LIFESPAN_CAP);
            node.current_life = -1;
        }

        for octant in 0..8 {
            let child = self.nodes[index as usize].children[octant];
            if child == NULL {
                continue;
            }
            let expired = {
                let child_node = &self.nodes[child as usize];
                child_node.current_life == 0
                    && child_node.items.is_empty()
                    && child_node.is_leaf()
            };
            if expired {
                tracing::debug!(node = child, "pruning expired empty octree node");
                self.nodes[index as usize].children[octant] = NULL;
                self.free.push(child);
            }
        }

        let item_count = self.nodes[index as usize].items.len();
        for i in 0..item_count {
            let prim_id = self.nodes[index as usize].items[i];
            let prim = prims
                .get_mut(prim_id)
                .ok_or(PhysicsError::InvalidPrimitive { index: prim_id.raw() })?;
            let Some(body_id) = prim.body else {
                continue;
            };
            let body = bodies
                .get_mut(body_id)
                .ok_or(PhysicsError::InvalidBody { id: body_id })?;
            let did_move = body.integrate(dt);
            prim.set_stationary(!did_move);
            if did_move {
                moved.push(prim_id);
            }
        }

        for octant in 0..8 {
            let child = self.nodes[index as usize].children[octant];
            if child != NULL {
                self.update_node(child, prims, bodies, dt, moved)?;
            }
        }
        Ok(())
    }

    /// Find the node that should hold an item with the given bounds,
    /// starting the search at `from`: climb while the region does not
    /// fully contain the bounds, then descend into the unique containing
    /// octant until the item straddles, the node is a sparse leaf, or the
    /// minimum subdivision size is reached.
    fn place(&mut self, from: u32, bounds: &Aabb) -> Result<u32, PhysicsError> {
        let mut node = from;
        while self.nodes[node as usize].region.contains(bounds) != Containment::Contains {
            let parent = self.nodes[node as usize].parent;
            if parent == NULL {
                let root_region = self.root_region();
                return Err(PhysicsError::PlayAreaExceeded {
                    required: required_edge(&root_region, bounds),
                    available: root_region.size().x,
                });
            }
            node = parent;
        }

        loop {
            let current = &self.nodes[node as usize];
            if current.is_leaf() && current.items.len() < 2 {
                break;
            }
            let region = current.region;
            if region.size().x * 0.5 < self.min_size {
                break;
            }
            let mut fit = None;
            for octant in 0..8 {
                if region.octant(octant).contains(bounds) == Containment::Contains {
                    fit = Some(octant);
                    break;
                }
            }
            let Some(octant) = fit else {
                // Straddles a child boundary: this node keeps it.
                break;
            };
            node = self.ensure_child(node, octant);
        }
        Ok(node)
    }

    fn ensure_child(&mut self, parent: u32, octant: usize) -> u32 {
        let existing = self.nodes[parent as usize].children[octant];
        if existing != NULL {
            return existing;
        }
        let region = self.nodes[parent as usize].region.octant(octant);
        let child = self.alloc_node(region, parent);
        self.nodes[parent as usize].children[octant] = child;
        child
    }

    fn alloc_node(&mut self, region: Aabb, parent: u32) -> u32 {
        let node = Node::new(region, parent);
        if let Some(index) = self.free.pop() {
            self.nodes[index as usize] = node;
            index
        } else {
            let index = self.nodes.len() as u32;
            self.nodes.push(node);
            index
        }
    }

    fn attach(&mut self, prim: PrimId, node: u32) {
        self.nodes[node as usize].items.push(prim);
        self.locations.insert(prim, node);
    }

    fn detach(&mut self, prim: PrimId) -> Option<u32> {
        let node = self.locations.remove(&prim)?;
        let items = &mut self.nodes[node as usize].items;
        if let Some(pos) = items.iter().position(|&p| p == prim) {
            items.remove(pos);
        }
        Some(node)
    }
}

/// Edge of the smallest cube concentric with the root that would contain
/// the bounds; reported in capacity errors so the caller knows how big a
/// rebuild needs to be.
fn required_edge(root_region: &Aabb, bounds: &Aabb) -> f64 {
    let center = root_region.center();
    let mut required: f64 = 0.0;
    for axis in 0..3 {
        let reach = (bounds.min[axis] - center[axis])
            .abs()
            .max((bounds.max[axis] - center[axis]).abs());
        required = required.max(2.0 * reach);
    }
    required
}
