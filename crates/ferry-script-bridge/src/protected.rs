//! Counted protection of script cells held from native code

use ferry_script::{CellRef, ScriptContext, ScriptError, ScriptResult, WeakScriptContext};
use tracing::warn;

/// A script cell kept alive for as long as this handle (or a clone) lives
///
/// Each handle owns exactly one protection, taken on creation or clone and
/// released on drop. The context is held weakly: once it is gone, dropping
/// the handle does nothing and using it reports an error.
pub struct Protected {
    ctx: WeakScriptContext,
    cell: CellRef,
}

impl Protected {
    pub fn new(ctx: &ScriptContext, cell: CellRef) -> ScriptResult<Self> {
        ctx.protect(cell)?;
        Ok(Self {
            ctx: ctx.downgrade(),
            cell,
        })
    }

    pub fn cell(&self) -> CellRef {
        self.cell
    }

    pub fn context(&self) -> ScriptResult<ScriptContext> {
        self.ctx
            .upgrade()
            .ok_or_else(|| ScriptError::internal("script context has been destroyed"))
    }

    /// True if the cell lives in `ctx`
    pub fn belongs_to(&self, ctx: &ScriptContext) -> bool {
        self.ctx.upgrade().is_some_and(|own| own.ptr_eq(ctx))
    }
}

impl Clone for Protected {
    fn clone(&self) -> Self {
        if let Some(ctx) = self.ctx.upgrade()
            && let Err(e) = ctx.protect(self.cell)
        {
            warn!(cell = %self.cell, error = %e, "failed to protect cloned handle");
        }
        Self {
            ctx: self.ctx.clone(),
            cell: self.cell,
        }
    }
}

impl Drop for Protected {
    fn drop(&mut self) {
        if let Some(ctx) = self.ctx.upgrade() {
            ctx.unprotect(self.cell);
        }
    }
}

impl std::fmt::Debug for Protected {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Protected").field("cell", &self.cell).finish()
    }
}
