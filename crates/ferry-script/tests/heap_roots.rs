//! Root and thread-affinity behaviour of the script heap.

use std::any::Any;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

use ferry_script::{
    CellRef, HeapConfig, HostObject, MAX_ARRAY_LENGTH, ScriptContext, ScriptError, ScriptResult,
    ScriptValue,
};
use proptest::prelude::*;

struct DropCounter {
    drops: Arc<AtomicUsize>,
}

impl Drop for DropCounter {
    fn drop(&mut self) {
        self.drops.fetch_add(1, Ordering::SeqCst);
    }
}

impl HostObject for DropCounter {
    fn class_name(&self) -> &str {
        "DropCounter"
    }

    fn get(&self, _ctx: &ScriptContext, name: &str) -> ScriptResult<ScriptValue> {
        Ok(match name {
            "drops" => ScriptValue::Number(self.drops.load(Ordering::SeqCst) as f64),
            _ => ScriptValue::Undefined,
        })
    }

    fn set(&self, _ctx: &ScriptContext, name: &str, _value: ScriptValue) -> ScriptResult<()> {
        Err(ScriptError::type_error(format!("{} is read-only", name)))
    }

    fn property_names(&self, _ctx: &ScriptContext) -> Vec<String> {
        vec!["drops".to_string()]
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[test]
fn test_reachable_from_global_survives() {
    let ctx = ScriptContext::new();
    let child = ctx.make_object().unwrap();
    ctx.set_property(ctx.global(), "child", ScriptValue::Cell(child))
        .unwrap();
    ctx.collect().unwrap();
    assert!(ctx.is_alive(child));

    ctx.delete_property(ctx.global(), "child").unwrap();
    ctx.collect().unwrap();
    assert!(!ctx.is_alive(child));
}

#[test]
fn test_protected_until_balanced() {
    let ctx = ScriptContext::new();
    let cell = ctx.make_object().unwrap();
    ctx.protect(cell).unwrap();
    ctx.protect(cell).unwrap();
    assert_eq!(ctx.protect_count(cell), 2);

    ctx.unprotect(cell);
    ctx.collect().unwrap();
    assert!(ctx.is_alive(cell));

    ctx.unprotect(cell);
    ctx.collect().unwrap();
    assert!(!ctx.is_alive(cell));
    assert!(matches!(
        ctx.protect(cell),
        Err(ScriptError::StaleHandle { .. })
    ));
}

#[test]
fn test_host_object_dropped_when_swept() {
    let ctx = ScriptContext::new();
    let drops = Arc::new(AtomicUsize::new(0));
    let host = ctx
        .make_host_object(Arc::new(DropCounter {
            drops: drops.clone(),
        }))
        .unwrap();
    assert_eq!(ctx.class_name(host).unwrap(), "DropCounter");
    assert_eq!(ctx.get_property(host, "drops").unwrap(), ScriptValue::Number(0.0));

    ctx.collect().unwrap();
    assert_eq!(drops.load(Ordering::SeqCst), 1);
    assert_eq!(ctx.stats().last_reclaimed, 1);
}

#[test]
fn test_wrong_thread_is_rejected() {
    let ctx = ScriptContext::new();
    let cell = ctx.make_object().unwrap();
    ctx.protect(cell).unwrap();

    let remote = ctx.clone();
    let outcome = thread::spawn(move || {
        let read = remote.get_property(cell, "x");
        let alloc = remote.make_object();
        let collect = remote.collect();
        // Bookkeeping is allowed anywhere.
        remote.unprotect(cell);
        (read, alloc, collect)
    })
    .join()
    .unwrap();

    assert!(matches!(outcome.0, Err(ScriptError::WrongThread { .. })));
    assert!(matches!(outcome.1, Err(ScriptError::WrongThread { .. })));
    assert!(matches!(outcome.2, Err(ScriptError::WrongThread { .. })));
    assert_eq!(ctx.protect_count(cell), 0);
}

#[test]
fn test_collect_if_needed_uses_threshold() {
    let ctx = ScriptContext::with_config(HeapConfig {
        gc_threshold: 4,
        ..Default::default()
    });
    for _ in 0..3 {
        ctx.make_object().unwrap();
    }
    assert!(!ctx.collect_if_needed().unwrap());
    ctx.make_object().unwrap();
    assert!(ctx.collect_if_needed().unwrap());
    assert_eq!(ctx.stats().collections, 1);
}

#[test]
fn test_array_rejects_huge_index_and_length() {
    let ctx = ScriptContext::new();
    let array = ctx
        .make_array(vec![ScriptValue::Number(1.0), ScriptValue::Number(2.0)])
        .unwrap();
    let out_of_range = ScriptError::thrown("RangeError", "Invalid array index");

    let err = ctx
        .set_property(array, "18446744073709551615", ScriptValue::Null)
        .unwrap_err();
    assert_eq!(err, out_of_range);
    let err = ctx
        .set_index(array, MAX_ARRAY_LENGTH, ScriptValue::Null)
        .unwrap_err();
    assert_eq!(err, out_of_range);

    let err = ctx
        .set_property(array, "length", ScriptValue::Number(4.0e9))
        .unwrap_err();
    assert_eq!(err, ScriptError::thrown("RangeError", "Invalid array length"));
    assert_eq!(ctx.length(array).unwrap(), 2);

    ctx.set_index(array, 4, ScriptValue::Null).unwrap();
    assert_eq!(ctx.length(array).unwrap(), 5);
}

struct Buffer {
    bytes: usize,
}

impl HostObject for Buffer {
    fn class_name(&self) -> &str {
        "Buffer"
    }

    fn get(&self, _ctx: &ScriptContext, _name: &str) -> ScriptResult<ScriptValue> {
        Ok(ScriptValue::Undefined)
    }

    fn set(&self, _ctx: &ScriptContext, name: &str, _value: ScriptValue) -> ScriptResult<()> {
        Err(ScriptError::type_error(format!("{} is read-only", name)))
    }

    fn property_names(&self, _ctx: &ScriptContext) -> Vec<String> {
        Vec::new()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn extra_memory_cost(&self) -> usize {
        self.bytes
    }
}

#[test]
fn test_host_memory_cost_triggers_collection() {
    let ctx = ScriptContext::with_config(HeapConfig {
        gc_threshold: 1000,
        extra_memory_threshold: 1024,
    });

    ctx.make_host_object(Arc::new(Buffer { bytes: 512 })).unwrap();
    assert!(!ctx.collect_if_needed().unwrap());
    ctx.make_host_object(Arc::new(Buffer { bytes: 512 })).unwrap();
    assert!(ctx.collect_if_needed().unwrap());
    assert!(!ctx.collect_if_needed().unwrap());

    ctx.report_extra_memory(2048);
    assert!(ctx.collect_if_needed().unwrap());
}

proptest! {
    #[test]
    fn protection_counts_balance(ops in prop::collection::vec(any::<bool>(), 0..32)) {
        let ctx = ScriptContext::new();
        let cell: CellRef = ctx.make_object().unwrap();
        let mut expected = 0u32;
        for protect in ops {
            if protect {
                ctx.protect(cell).unwrap();
                expected += 1;
            } else {
                ctx.unprotect(cell);
                expected = expected.saturating_sub(1);
            }
        }
        prop_assert_eq!(ctx.protect_count(cell), expected);
        ctx.collect().unwrap();
        prop_assert_eq!(ctx.is_alive(cell), expected > 0);
    }
}
