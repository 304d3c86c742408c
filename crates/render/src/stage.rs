use glam::Vec2;

/// Handle to a visual on a [`Stage`]. Stale handles (destroyed visuals) never
/// alias a newer visual because the slot generation is part of the id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VisualId {
    index: u32,
    generation: u32,
}

impl std::fmt::Display for VisualId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}v{}", self.index, self.generation)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisualKind {
    Sprite,
    Text,
    /// Filled rectangle, used as label/overlay background.
    Panel,
    /// Groups children; child positions are relative to it.
    Container,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PointerEvent {
    Down,
    Over,
    Out,
}

/// A pointer listener. The action is plain data interpreted by the scene.
#[derive(Debug, Clone, PartialEq)]
pub struct Listener<A> {
    pub event: PointerEvent,
    pub action: A,
}

/// A render object: sprite, text, panel or container.
#[derive(Debug, Clone, PartialEq)]
pub struct Visual<A> {
    pub kind: VisualKind,
    pub texture: Option<String>,
    pub frame: u32,
    pub text: String,
    /// Fill colour for panels.
    pub fill: Option<u32>,
    /// Relative to the parent container, render space.
    pub position: Vec2,
    /// Normalized anchor, (0.5, 0.5) is the centre.
    pub origin: Vec2,
    /// Display size before scaling; `None` for visuals without a hit area.
    pub size: Option<Vec2>,
    pub scale: f32,
    pub alpha: f32,
    pub tint: Option<u32>,
    pub depth: i32,
    pub visible: bool,
    pub active: bool,
    listeners: Vec<Listener<A>>,
    parent: Option<VisualId>,
    children: Vec<VisualId>,
}

impl<A> Visual<A> {
    pub fn new(kind: VisualKind) -> Self {
        Self {
            kind,
            texture: None,
            frame: 0,
            text: String::new(),
            fill: None,
            position: Vec2::ZERO,
            origin: Vec2::splat(0.5),
            size: None,
            scale: 1.0,
            alpha: 1.0,
            tint: None,
            depth: 0,
            visible: true,
            active: true,
            listeners: Vec::new(),
            parent: None,
            children: Vec::new(),
        }
    }

    pub fn sprite(texture: &str) -> Self {
        Self {
            texture: Some(texture.to_string()),
            ..Self::new(VisualKind::Sprite)
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::new(VisualKind::Text)
        }
    }

    pub fn panel(size: Vec2, fill: u32) -> Self {
        Self {
            size: Some(size),
            fill: Some(fill),
            ..Self::new(VisualKind::Panel)
        }
    }

    pub fn container() -> Self {
        Self::new(VisualKind::Container)
    }

    pub fn at(mut self, position: Vec2) -> Self {
        self.position = position;
        self
    }

    pub fn with_depth(mut self, depth: i32) -> Self {
        self.depth = depth;
        self
    }

    pub fn with_size(mut self, size: Vec2) -> Self {
        self.size = Some(size);
        self
    }

    pub fn with_origin(mut self, origin: Vec2) -> Self {
        self.origin = origin;
        self
    }

    pub fn with_scale(mut self, scale: f32) -> Self {
        self.scale = scale;
        self
    }

    pub fn with_alpha(mut self, alpha: f32) -> Self {
        self.alpha = alpha;
        self
    }

    pub fn listeners(&self) -> &[Listener<A>] {
        &self.listeners
    }

    pub fn parent(&self) -> Option<VisualId> {
        self.parent
    }

    pub fn children(&self) -> &[VisualId] {
        &self.children
    }

    /// Restore the pooled defaults. Structure (parent, children) is kept.
    fn reset(&mut self) {
        self.frame = 0;
        self.position = Vec2::ZERO;
        self.scale = 1.0;
        self.alpha = 1.0;
        self.tint = None;
        self.visible = true;
        self.active = true;
        self.listeners.clear();
    }
}

struct Slot<A> {
    generation: u32,
    visual: Option<Visual<A>>,
}

/// Arena of visuals forming an explicit ownership tree.
///
/// Destroying a visual destroys its children; listeners live on the visual and
/// go with it, so a recycled object can never fire a stale handler.
pub struct Stage<A> {
    slots: Vec<Slot<A>>,
    free: Vec<u32>,
    live: usize,
}

impl<A> Default for Stage<A> {
    fn default() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            live: 0,
        }
    }
}

impl<A: Clone> Stage<A> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spawn(&mut self, visual: Visual<A>) -> VisualId {
        self.live += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.visual = Some(visual);
            return VisualId {
                index,
                generation: slot.generation,
            };
        }
        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            visual: Some(visual),
        });
        VisualId {
            index,
            generation: 0,
        }
    }

    /// Spawn `visual` as the last child of `parent`.
    pub fn spawn_child(&mut self, parent: VisualId, visual: Visual<A>) -> VisualId {
        let id = self.spawn(visual);
        self.add_child(parent, id);
        id
    }

    pub fn contains(&self, id: VisualId) -> bool {
        self.get(id).is_some()
    }

    pub fn get(&self, id: VisualId) -> Option<&Visual<A>> {
        self.slots
            .get(id.index as usize)
            .filter(|s| s.generation == id.generation)
            .and_then(|s| s.visual.as_ref())
    }

    pub fn get_mut(&mut self, id: VisualId) -> Option<&mut Visual<A>> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|s| s.generation == id.generation)
            .and_then(|s| s.visual.as_mut())
    }

    /// Apply `f` to the visual if it still exists.
    pub fn update(&mut self, id: VisualId, f: impl FnOnce(&mut Visual<A>)) -> bool {
        match self.get_mut(id) {
            Some(v) => {
                f(v);
                true
            }
            None => false,
        }
    }

    /// Reparent `child` under `parent`. Returns false if either is gone or
    /// the move would create a cycle.
    pub fn add_child(&mut self, parent: VisualId, child: VisualId) -> bool {
        if parent == child || !self.contains(parent) || !self.contains(child) {
            return false;
        }
        if self.ancestors(parent).any(|a| a == child) {
            return false;
        }
        self.detach(child);
        if let Some(p) = self.get_mut(parent) {
            p.children.push(child);
        }
        if let Some(c) = self.get_mut(child) {
            c.parent = Some(parent);
        }
        true
    }

    fn detach(&mut self, child: VisualId) {
        let Some(parent) = self.get(child).and_then(|c| c.parent) else {
            return;
        };
        if let Some(p) = self.get_mut(parent) {
            p.children.retain(|c| *c != child);
        }
        if let Some(c) = self.get_mut(child) {
            c.parent = None;
        }
    }

    /// Destroy a visual and its whole subtree. Returns how many visuals were removed.
    pub fn destroy(&mut self, id: VisualId) -> usize {
        if !self.contains(id) {
            return 0;
        }
        self.detach(id);
        let mut removed = 0;
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            let slot = &mut self.slots[next.index as usize];
            if slot.generation != next.generation {
                continue;
            }
            if let Some(visual) = slot.visual.take() {
                stack.extend(visual.children);
                slot.generation = slot.generation.wrapping_add(1);
                self.free.push(next.index);
                self.live -= 1;
                removed += 1;
            }
        }
        removed
    }

    pub fn children(&self, id: VisualId) -> &[VisualId] {
        self.get(id).map(|v| v.children.as_slice()).unwrap_or(&[])
    }

    fn ancestors(&self, id: VisualId) -> impl Iterator<Item = VisualId> + '_ {
        std::iter::successors(self.get(id).and_then(|v| v.parent), move |p| {
            self.get(*p).and_then(|v| v.parent)
        })
    }

    pub fn on(&mut self, id: VisualId, event: PointerEvent, action: A) -> bool {
        self.update(id, |v| v.listeners.push(Listener { event, action }))
    }

    /// Remove every listener from the visual and its subtree.
    pub fn clear_listeners(&mut self, id: VisualId) {
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            if let Some(v) = self.get_mut(next) {
                v.listeners.clear();
                stack.extend(v.children.iter().copied());
            }
        }
    }

    /// Reset the visual and its subtree to pooled defaults.
    pub fn reset_tree(&mut self, id: VisualId) {
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            if let Some(v) = self.get_mut(next) {
                v.reset();
                stack.extend(v.children.iter().copied());
            }
        }
    }

    /// Position in render space, summing container offsets.
    pub fn world_position(&self, id: VisualId) -> Option<Vec2> {
        let own = self.get(id)?.position;
        Some(
            self.ancestors(id)
                .filter_map(|a| self.get(a))
                .fold(own, |acc, a| acc + a.position),
        )
    }

    /// Visible, active, and every ancestor visible.
    pub fn is_shown(&self, id: VisualId) -> bool {
        let Some(v) = self.get(id) else {
            return false;
        };
        v.visible
            && v.active
            && self
                .ancestors(id)
                .all(|a| self.get(a).is_some_and(|p| p.visible && p.active))
    }

    /// Sort key: top-level depth first, then depth within the container.
    pub fn render_order(&self, id: VisualId) -> (i32, i32) {
        let own = self.get(id).map(|v| v.depth).unwrap_or_default();
        let root = self.ancestors(id).last().and_then(|r| self.get(r)).map(|r| r.depth);
        (root.unwrap_or(own), own)
    }

    /// Axis-aligned bounds in render space, if the visual has a size.
    pub fn bounds(&self, id: VisualId) -> Option<(Vec2, Vec2)> {
        let v = self.get(id)?;
        let size = v.size? * v.scale;
        let min = self.world_position(id)? - v.origin * size;
        Some((min, min + size))
    }

    /// Topmost shown visual with a listener for `event` whose bounds contain `point`.
    pub fn hit_test(&self, point: Vec2, event: PointerEvent) -> Option<VisualId> {
        self.ids()
            .filter(|id| self.is_shown(*id))
            .filter(|id| {
                self.get(*id)
                    .is_some_and(|v| v.listeners.iter().any(|l| l.event == event))
            })
            .filter(|id| {
                self.bounds(*id)
                    .is_some_and(|(min, max)| point.cmpge(min).all() && point.cmple(max).all())
            })
            .max_by_key(|id| (self.render_order(*id), *id))
    }

    /// Actions bound to `event` on `id`, if it is currently shown.
    pub fn dispatch(&self, id: VisualId, event: PointerEvent) -> Vec<A> {
        if !self.is_shown(id) {
            return Vec::new();
        }
        self.get(id)
            .map(|v| {
                v.listeners
                    .iter()
                    .filter(|l| l.event == event)
                    .map(|l| l.action.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Ids of every live visual, in slot order.
    pub fn ids(&self) -> impl Iterator<Item = VisualId> + '_ {
        self.slots.iter().enumerate().filter_map(|(i, s)| {
            s.visual.as_ref().map(|_| VisualId {
                index: i as u32,
                generation: s.generation,
            })
        })
    }

    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    pub fn count_kind(&self, kind: VisualKind) -> usize {
        self.slots
            .iter()
            .filter_map(|s| s.visual.as_ref())
            .filter(|v| v.kind == kind)
            .count()
    }

    /// Visuals that would currently be drawn.
    pub fn shown_count(&self) -> usize {
        self.ids().filter(|id| self.is_shown(*id)).count()
    }
}
