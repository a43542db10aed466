// ==========================================================================
// Dependency graphs
// ==========================================================================
//
// Three square matrices over the session's variables:
//
//   function: i's lambda/method-group output needs j as an input
//   bound:    a bound of i mentions j
//   shape:    the shape of i mentions j
//
// A cell is Direct when set by an observation, Indirect when implied by the
// transitive closure, NotDependent otherwise. Cells invalidated by a fix are
// Unknown until the next query recomputes the closure.

use derive_more::Debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Dependency {
    Unknown,
    NotDependent,
    Direct,
    Indirect,
}

impl Dependency {
    fn depends(self) -> bool {
        matches!(self, Dependency::Direct | Dependency::Indirect)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DepKind {
    Bound,
    Shape,
}

#[derive(Debug, Clone)]
pub(crate) struct DependencyGraph {
    size: usize,
    #[debug(skip)]
    cells: Vec<Dependency>,
    /// Indirect cells may be stale.
    dirty: bool,
}

impl DependencyGraph {
    pub fn new(size: usize) -> Self {
        DependencyGraph {
            size,
            cells: vec![Dependency::NotDependent; size * size],
            dirty: false,
        }
    }

    /// Seed from a direct-dependency predicate and close transitively.
    pub fn from_direct(size: usize, mut direct: impl FnMut(usize, usize) -> bool) -> Self {
        let mut graph = DependencyGraph {
            size,
            cells: vec![Dependency::Unknown; size * size],
            dirty: false,
        };
        for i in 0..size {
            for j in 0..size {
                if direct(i, j) {
                    graph.cells[i * size + j] = Dependency::Direct;
                }
            }
        }
        graph.deduce_all();
        graph
    }

    fn cell(&self, i: usize, j: usize) -> Dependency {
        self.cells[i * self.size + j]
    }

    fn set(&mut self, i: usize, j: usize, dep: Dependency) {
        self.cells[i * self.size + j] = dep;
    }

    pub fn set_direct(&mut self, i: usize, j: usize) {
        if self.cell(i, j) != Dependency::Direct {
            self.set(i, j, Dependency::Direct);
            self.dirty = true;
        }
    }

    pub fn is_direct(&self, i: usize, j: usize) -> bool {
        self.cell(i, j) == Dependency::Direct
    }

    /// Drop a direct edge that no longer holds; the closure is recomputed
    /// lazily.
    pub fn forget_direct(&mut self, i: usize, j: usize) {
        debug_assert!(self.is_direct(i, j));
        self.set(i, j, Dependency::Unknown);
        self.dirty = true;
    }

    /// A fixed variable neither depends on anything nor is depended on.
    pub fn clear_var(&mut self, var: usize) {
        for k in 0..self.size {
            self.set(var, k, Dependency::NotDependent);
            self.set(k, var, Dependency::NotDependent);
        }
        self.dirty = true;
    }

    fn refresh(&mut self) {
        if !self.dirty {
            return;
        }
        for cell in &mut self.cells {
            if *cell != Dependency::Direct {
                *cell = Dependency::Unknown;
            }
        }
        self.deduce_all();
    }

    fn deduce_all(&mut self) {
        while self.deduce() {}
        for cell in &mut self.cells {
            if *cell == Dependency::Unknown {
                *cell = Dependency::NotDependent;
            }
        }
        self.dirty = false;
    }

    /// One pass of `i -> k -> j` implies `i -> j`. True if anything changed.
    fn deduce(&mut self) -> bool {
        let mut changed = false;
        for i in 0..self.size {
            for j in 0..self.size {
                if self.cell(i, j) != Dependency::Unknown {
                    continue;
                }
                if (0..self.size)
                    .any(|k| self.cell(i, k).depends() && self.cell(k, j).depends())
                {
                    self.set(i, j, Dependency::Indirect);
                    changed = true;
                }
            }
        }
        changed
    }

    #[cfg(test)]
    pub fn depends_on(&mut self, i: usize, j: usize) -> bool {
        self.refresh();
        self.cell(i, j).depends()
    }

    pub fn depends_on_any(&mut self, i: usize) -> bool {
        self.refresh();
        (0..self.size).any(|j| self.cell(i, j).depends())
    }

    pub fn any_depends_on(&mut self, j: usize) -> bool {
        self.refresh();
        (0..self.size).any(|i| self.cell(i, j).depends())
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Dependencies {
    pub function: DependencyGraph,
    pub bound: DependencyGraph,
    pub shape: DependencyGraph,
}

impl Dependencies {
    pub fn new(size: usize) -> Self {
        Dependencies {
            function: DependencyGraph::new(size),
            bound: DependencyGraph::new(size),
            shape: DependencyGraph::new(size),
        }
    }

    pub fn graph(&mut self, kind: DepKind) -> &mut DependencyGraph {
        match kind {
            DepKind::Bound => &mut self.bound,
            DepKind::Shape => &mut self.shape,
        }
    }
}
