//! Entry point tying a script context to the object protocol

use ferry_core::{BridgeResult, ObjectRef, Value};
use ferry_script::{ScriptContext, ScriptValue};
use tracing::debug;

use crate::adapter::ScriptObject;
use crate::convert::{WrapperCache, to_native, to_script};
use crate::error::IntoBridge;

/// A script context with the bridge installed
#[derive(Clone, Debug)]
pub struct ScriptBridge {
    ctx: ScriptContext,
}

impl ScriptBridge {
    /// Install the bridge on `ctx`
    pub fn install(ctx: ScriptContext) -> Self {
        WrapperCache::of(&ctx);
        debug!("script bridge installed");
        Self { ctx }
    }

    /// A fresh context owned by the current thread, with the bridge installed
    pub fn new() -> Self {
        Self::install(ScriptContext::new())
    }

    pub fn context(&self) -> &ScriptContext {
        &self.ctx
    }

    /// The global object as a native object
    pub fn global(&self) -> BridgeResult<ScriptObject> {
        ScriptObject::new(&self.ctx, self.ctx.global()).into_bridge()
    }

    /// Bind `value` to a global name
    pub fn expose(&self, name: &str, value: &Value) -> BridgeResult<()> {
        let value = self.to_script(value)?;
        self.ctx
            .set_property(self.ctx.global(), name, value)
            .into_bridge()
    }

    pub fn expose_object(&self, name: &str, object: ObjectRef) -> BridgeResult<()> {
        self.expose(name, &Value::Object(object))
    }

    pub fn to_script(&self, value: &Value) -> BridgeResult<ScriptValue> {
        to_script(&self.ctx, value).into_bridge()
    }

    pub fn to_native(&self, value: &ScriptValue) -> BridgeResult<Value> {
        to_native(&self.ctx, value).into_bridge()
    }

    /// Collect the heap and forget host cells that did not survive
    pub fn collect(&self) -> BridgeResult<usize> {
        let reclaimed = self.ctx.collect().into_bridge()?;
        let pruned = WrapperCache::of(&self.ctx).prune(&self.ctx);
        debug!(reclaimed, pruned, "bridge collection");
        Ok(reclaimed)
    }

    /// Safepoint: collect only once the allocation threshold is reached
    pub fn collect_if_needed(&self) -> BridgeResult<bool> {
        let collected = self.ctx.collect_if_needed().into_bridge()?;
        if collected {
            WrapperCache::of(&self.ctx).prune(&self.ctx);
        }
        Ok(collected)
    }
}

impl Default for ScriptBridge {
    fn default() -> Self {
        Self::new()
    }
}
