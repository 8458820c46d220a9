//! Cell storage and the mark-sweep collector

use std::sync::Arc;
use std::time::Instant;

use indexmap::IndexMap;

use crate::error::{ScriptError, ScriptResult};
use crate::host::{HostFn, HostObject};
use crate::value::{CellRef, ScriptValue};

/// Heap configuration
#[derive(Debug, Clone)]
pub struct HeapConfig {
    /// Allocations between two collections triggered by
    /// `collect_if_needed` (default: 1024)
    pub gc_threshold: usize,
    /// Bytes of reported outside memory that also trigger a collection
    /// (default: 8 MiB)
    pub extra_memory_threshold: usize,
}

impl Default for HeapConfig {
    fn default() -> Self {
        Self {
            gc_threshold: 1024,
            extra_memory_threshold: 8 * 1024 * 1024,
        }
    }
}

/// Heap statistics
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct HeapStats {
    /// Number of collections
    pub collections: u64,
    /// Cells reclaimed in last collection
    pub last_reclaimed: usize,
    /// Cells currently allocated
    pub live_cells: usize,
    /// Cells with at least one protection
    pub protected_cells: usize,
    /// Total time spent collecting (nanoseconds)
    pub total_time_ns: u64,
}

pub(crate) enum Cell {
    Object(IndexMap<String, ScriptValue>),
    Array(Vec<ScriptValue>),
    Function {
        name: String,
        body: HostFn,
        properties: IndexMap<String, ScriptValue>,
    },
    Host(Arc<dyn HostObject>),
}

impl Cell {
    pub(crate) fn kind(&self) -> &'static str {
        match self {
            Self::Object(_) => "Object",
            Self::Array(_) => "Array",
            Self::Function { .. } => "Function",
            Self::Host(_) => "Host",
        }
    }

    fn trace(&self, worklist: &mut Vec<CellRef>) {
        let values: Box<dyn Iterator<Item = &ScriptValue>> = match self {
            Self::Object(properties) | Self::Function { properties, .. } => {
                Box::new(properties.values())
            }
            Self::Array(items) => Box::new(items.iter()),
            Self::Host(_) => return,
        };
        worklist.extend(values.filter_map(ScriptValue::as_cell));
    }
}

struct Slot {
    generation: u32,
    protect_count: u32,
    marked: bool,
    cell: Option<Cell>,
}

pub(crate) struct Heap {
    config: HeapConfig,
    slots: Vec<Slot>,
    free: Vec<u32>,
    allocated_since_gc: usize,
    extra_memory_since_gc: usize,
    collections: u64,
    last_reclaimed: usize,
    total_time_ns: u64,
}

impl Heap {
    pub(crate) fn new(config: HeapConfig) -> Self {
        Self {
            config,
            slots: Vec::new(),
            free: Vec::new(),
            allocated_since_gc: 0,
            extra_memory_since_gc: 0,
            collections: 0,
            last_reclaimed: 0,
            total_time_ns: 0,
        }
    }

    pub(crate) fn alloc(&mut self, cell: Cell) -> CellRef {
        self.allocated_since_gc += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.cell = Some(cell);
            return CellRef {
                index,
                generation: slot.generation,
            };
        }
        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            protect_count: 0,
            marked: false,
            cell: Some(cell),
        });
        CellRef {
            index,
            generation: 0,
        }
    }

    fn slot(&self, cell: CellRef) -> Option<&Slot> {
        self.slots
            .get(cell.index as usize)
            .filter(|slot| slot.generation == cell.generation && slot.cell.is_some())
    }

    fn slot_mut(&mut self, cell: CellRef) -> Option<&mut Slot> {
        self.slots
            .get_mut(cell.index as usize)
            .filter(|slot| slot.generation == cell.generation && slot.cell.is_some())
    }

    pub(crate) fn is_alive(&self, cell: CellRef) -> bool {
        self.slot(cell).is_some()
    }

    pub(crate) fn cell(&self, cell: CellRef) -> ScriptResult<&Cell> {
        self.slot(cell)
            .and_then(|slot| slot.cell.as_ref())
            .ok_or(stale(cell))
    }

    pub(crate) fn cell_mut(&mut self, cell: CellRef) -> ScriptResult<&mut Cell> {
        self.slot_mut(cell)
            .and_then(|slot| slot.cell.as_mut())
            .ok_or(stale(cell))
    }

    /// Fail if `value` holds a handle to a collected cell
    pub(crate) fn check_value(&self, value: &ScriptValue) -> ScriptResult<()> {
        match value.as_cell() {
            Some(cell) if !self.is_alive(cell) => Err(stale(cell)),
            _ => Ok(()),
        }
    }

    pub(crate) fn protect(&mut self, cell: CellRef) -> ScriptResult<u32> {
        let slot = self.slot_mut(cell).ok_or(stale(cell))?;
        slot.protect_count += 1;
        Ok(slot.protect_count)
    }

    /// Returns false when the cell was not protected (or no longer exists)
    pub(crate) fn unprotect(&mut self, cell: CellRef) -> bool {
        match self.slot_mut(cell) {
            Some(slot) if slot.protect_count > 0 => {
                slot.protect_count -= 1;
                true
            }
            _ => false,
        }
    }

    pub(crate) fn protect_count(&self, cell: CellRef) -> u32 {
        self.slot(cell).map_or(0, |slot| slot.protect_count)
    }

    pub(crate) fn report_extra_memory(&mut self, bytes: usize) {
        self.extra_memory_since_gc = self.extra_memory_since_gc.saturating_add(bytes);
    }

    pub(crate) fn should_collect(&self) -> bool {
        self.allocated_since_gc >= self.config.gc_threshold
            || self.extra_memory_since_gc >= self.config.extra_memory_threshold
    }

    pub(crate) fn config(&self) -> &HeapConfig {
        &self.config
    }

    /// Mark from `roots` and every protected cell, then sweep. The swept
    /// cells are returned so the caller can drop them outside the heap lock.
    pub(crate) fn collect(&mut self, roots: &[CellRef]) -> Vec<Cell> {
        let start = Instant::now();

        let mut worklist: Vec<CellRef> = roots.to_vec();
        for (index, slot) in self.slots.iter().enumerate() {
            if slot.cell.is_some() && slot.protect_count > 0 {
                worklist.push(CellRef {
                    index: index as u32,
                    generation: slot.generation,
                });
            }
        }

        // Mark
        while let Some(cell) = worklist.pop() {
            let Some(slot) = self.slot_mut(cell) else {
                continue;
            };
            if slot.marked {
                continue;
            }
            slot.marked = true;
            if let Some(cell) = slot.cell.as_ref() {
                cell.trace(&mut worklist);
            }
        }

        // Sweep
        let mut garbage = Vec::new();
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if slot.marked {
                slot.marked = false;
                continue;
            }
            if let Some(cell) = slot.cell.take() {
                garbage.push(cell);
                slot.generation = slot.generation.wrapping_add(1);
                slot.protect_count = 0;
                self.free.push(index as u32);
            }
        }

        self.collections += 1;
        self.last_reclaimed = garbage.len();
        self.allocated_since_gc = 0;
        self.extra_memory_since_gc = 0;
        self.total_time_ns += start.elapsed().as_nanos() as u64;
        garbage
    }

    pub(crate) fn stats(&self) -> HeapStats {
        let live = self.slots.iter().filter(|slot| slot.cell.is_some());
        let (live_cells, protected_cells) = live.fold((0, 0), |(live, protected), slot| {
            (live + 1, protected + usize::from(slot.protect_count > 0))
        });
        HeapStats {
            collections: self.collections,
            last_reclaimed: self.last_reclaimed,
            live_cells,
            protected_cells,
            total_time_ns: self.total_time_ns,
        }
    }
}

fn stale(cell: CellRef) -> ScriptError {
    ScriptError::StaleHandle {
        index: cell.index,
        generation: cell.generation,
    }
}
