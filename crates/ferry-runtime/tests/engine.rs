//! Engine dispatch and marshaled objects used from other threads.

use std::sync::{Arc, mpsc};
use std::thread;

use ferry_core::{
    BridgeError, Method, NativeMethod, Object, ObjectExt, ObjectRef, StaticBoundObject, Value,
};
use ferry_runtime::{Engine, RuntimeConfig, RuntimeError, ScriptRegistry, add_evaluator};
use ferry_script::{ScriptResult, ScriptValue};
use ferry_script_bridge::ScriptObject;
use serial_test::serial;

fn library() -> ObjectRef {
    Arc::new(
        StaticBoundObject::new("Library")
            .with_method("getVersion", |_| Ok(Value::string("1.2.3")))
            .with_method("engineThread", |_| {
                Ok(Value::string(thread::current().name().unwrap_or_default()))
            })
            .with_method("explode", |_| panic!("library exploded")),
    )
}

fn engine_with_library() -> Engine {
    Engine::builder()
        .thread_name("ferry-test")
        .with_init(|bridge| bridge.expose_object("lib", library()))
        .build()
        .unwrap()
}

#[test]
fn test_marshaled_global_from_workers() {
    let engine = engine_with_library();
    let handle = engine.handle();

    let workers: Vec<_> = (0..4)
        .map(|_| {
            let handle = handle.clone();
            thread::spawn(move || {
                let global = handle.global().unwrap();
                (
                    global.call_ns("lib.getVersion", &[]).unwrap(),
                    global.call_ns("lib.engineThread", &[]).unwrap(),
                )
            })
        })
        .collect();

    for worker in workers {
        let (version, thread_name) = worker.join().unwrap();
        assert_eq!(version, Value::string("1.2.3"));
        assert_eq!(thread_name, Value::string("ferry-test"));
    }
    engine.shutdown();
}

#[test]
fn test_script_object_needs_marshaling() {
    let engine = Engine::new().unwrap();
    let handle = engine.handle();

    let raw = handle
        .run(|bridge| {
            let ctx = bridge.context();
            let cell = ctx.make_object()?;
            ctx.set_property(cell, "port", ScriptValue::Number(8080.0))?;
            ScriptObject::new(ctx, cell)
        })
        .unwrap()
        .unwrap();
    let err = raw.get("port").unwrap_err();
    assert!(matches!(
        err,
        BridgeError::ForeignRuntime { ref name, .. } if name == "WrongThreadError"
    ));

    let object = handle
        .eval(|bridge| {
            let ctx = bridge.context();
            let cell = ctx.make_object().map_err(ferry_script_bridge::bridge_error)?;
            bridge.to_native(&ScriptValue::Cell(cell))
        })
        .unwrap();
    let object = object.as_object().unwrap();
    object.set("port", Value::int(8080)).unwrap();
    assert_eq!(object.get_int("port", 0).unwrap(), 8080);
    assert_eq!(object.property_names(), vec!["port".to_string()]);
}

#[test]
fn test_marshaled_method_round_trip() {
    let engine = Engine::new().unwrap();
    let handle = engine.handle();

    let double = NativeMethod::shared("double", |args| {
        Ok(Value::int(args.first().map_or(Ok(0), Value::to_int)? * 2))
    });
    handle
        .run(move |bridge| bridge.expose("double", &Value::Method(double)))
        .unwrap()
        .unwrap();

    let method = handle.global().unwrap().get("double").unwrap();
    let method = method.as_method().unwrap();
    assert_eq!(method.call(&[Value::int(21)]).unwrap(), Value::int(42));
}

#[test]
fn test_try_run_reports_backpressure() {
    let engine = Engine::builder().queue_capacity(1).build().unwrap();
    let handle = engine.handle();

    let (started_tx, started_rx) = mpsc::channel();
    let (release_tx, release_rx) = mpsc::channel::<()>();
    let blocker = handle
        .try_run(move |_| {
            started_tx.send(()).unwrap();
            release_rx.recv().unwrap();
            1
        })
        .unwrap();
    started_rx.recv().unwrap();

    let queued = handle.try_run(|_| 2).unwrap();
    assert_eq!(handle.try_run(|_| 3).unwrap_err(), RuntimeError::QueueFull(1));

    release_tx.send(()).unwrap();
    assert_eq!(blocker.blocking_recv().unwrap().unwrap(), 1);
    assert_eq!(queued.blocking_recv().unwrap().unwrap(), 2);
}

#[test]
fn test_collects_between_jobs() {
    let engine = Engine::with_config(RuntimeConfig::new().gc_threshold(1)).unwrap();
    let handle = engine.handle();

    handle
        .run(|bridge| {
            for _ in 0..8 {
                bridge.context().make_object().unwrap();
            }
        })
        .unwrap();
    handle.run(|_| ()).unwrap();

    let stats = engine.stats().snapshot();
    assert!(stats.collections >= 1);
    assert_eq!(stats.jobs_submitted, 2);
}

#[test]
fn test_shutdown_stops_jobs() {
    let engine = Engine::new().unwrap();
    let handle = engine.handle();
    let global = handle.global().unwrap();
    engine.shutdown();

    assert_eq!(handle.run(|_| ()).unwrap_err(), RuntimeError::ShutDown);
    assert!(global.get("anything").is_err());
}

#[tokio::test]
async fn test_run_async() {
    let engine = engine_with_library();
    let handle = engine.handle();

    let version = handle
        .run_async(|bridge| {
            let global = bridge.global()?;
            global.call_ns("lib.getVersion", &[])
        })
        .await
        .unwrap()
        .unwrap();
    assert_eq!(version, Value::string("1.2.3"));
}

#[test]
#[serial]
fn test_global_registry_through_engine() {
    let evaluator: ObjectRef = Arc::new(
        StaticBoundObject::new("UpperEvaluator")
            .with_method("canEvaluate", |args| {
                Ok(Value::bool(args.first().and_then(Value::as_str) == Some("text/upper")))
            })
            .with_method("evaluate", |args| {
                let code = args.get(2).map_or(Ok(""), Value::to_str)?;
                Ok(Value::string(code.to_uppercase()))
            }),
    );
    add_evaluator(evaluator.clone());

    let engine = Engine::new().unwrap();
    let handle = engine.handle();
    let result = handle
        .run(|bridge| {
            let scope = bridge.global()?;
            ScriptRegistry::global().evaluate("text/upper", "main", "ferry", Arc::new(scope))
        })
        .unwrap()
        .unwrap();
    assert_eq!(result, Value::string("FERRY"));

    assert!(ferry_runtime::remove_evaluator(&evaluator));
    assert!(!ScriptRegistry::global().can_evaluate("text/upper"));
}

#[test]
fn test_panicking_job_leaves_engine_running() {
    let engine = engine_with_library();
    let handle = engine.handle();

    let err = handle.run(|_| -> i32 { panic!("job exploded") }).unwrap_err();
    assert_eq!(err, RuntimeError::JobPanicked("job exploded".to_string()));

    let receiver = handle
        .try_run(|_| -> i32 { panic!("queued job exploded {}", 2) })
        .unwrap();
    assert_eq!(
        receiver.blocking_recv().unwrap().unwrap_err(),
        RuntimeError::JobPanicked("queued job exploded 2".to_string())
    );

    assert_eq!(handle.run(|_| 7).unwrap(), 7);
    assert!(engine.is_running());
    engine.shutdown();
    let stats = handle.stats().snapshot();
    assert_eq!(stats.jobs_panicked, 2);
    assert_eq!(stats.jobs_completed, 3);
}

#[test]
fn test_panicking_native_method_leaves_engine_running() {
    let engine = engine_with_library();
    let handle = engine.handle();

    let from_script = handle
        .run(|bridge| -> ScriptResult<ScriptValue> {
            let ctx = bridge.context();
            let lib = ctx.get_property(ctx.global(), "lib")?;
            let lib = lib.as_cell();
            let explode = ctx.get_property(lib.unwrap_or(ctx.global()), "explode")?;
            ctx.call_value(&explode, lib, &[])
        })
        .unwrap_err();
    assert_eq!(
        from_script,
        RuntimeError::JobPanicked("library exploded".to_string())
    );

    let worker = {
        let handle = handle.clone();
        thread::spawn(move || {
            let global = handle.global().unwrap();
            let err = global.call_ns("lib.explode", &[]).unwrap_err();
            (err, global.call_ns("lib.getVersion", &[]).unwrap())
        })
    };
    let (err, version) = worker.join().unwrap();
    assert_eq!(err.message(), "Job panicked: library exploded");
    assert_eq!(version, Value::string("1.2.3"));
    engine.shutdown();
}

#[test]
fn test_marshaled_value_returns_as_itself() {
    let engine = Engine::new().unwrap();
    let handle = engine.handle();
    handle
        .run(|bridge| -> ScriptResult<()> {
            let ctx = bridge.context();
            let config = ctx.make_object()?;
            ctx.set_property(config, "port", ScriptValue::Number(8080.0))?;
            let ports = ctx.make_array(vec![ScriptValue::Number(80.0)])?;
            ctx.set_property(ctx.global(), "config", ScriptValue::Cell(config))?;
            ctx.set_property(ctx.global(), "ports", ScriptValue::Cell(ports))
        })
        .unwrap()
        .unwrap();

    let worker = {
        let handle = handle.clone();
        thread::spawn(move || {
            let global = handle.global().unwrap();
            global.set("copy", global.get("config").unwrap()).unwrap();
            global.set("portsCopy", global.get("ports").unwrap()).unwrap();
            global.get("copy").unwrap().as_object().unwrap().equals(
                global.get("config").unwrap().as_object().unwrap().as_ref(),
            )
        })
    };
    assert!(worker.join().unwrap());

    let same = handle
        .run(|bridge| -> ScriptResult<bool> {
            let ctx = bridge.context();
            let global = ctx.global();
            let pairs = [("config", "copy"), ("ports", "portsCopy")];
            for (original, copy) in pairs {
                let original = ctx.get_property(global, original)?;
                let copy = ctx.get_property(global, copy)?;
                let Some(cell) = copy.as_cell() else {
                    return Ok(false);
                };
                if !ctx.strict_equals(&original, &copy) || ctx.host_object(cell)?.is_some() {
                    return Ok(false);
                }
            }
            Ok(true)
        })
        .unwrap()
        .unwrap();
    assert!(same);
}

#[test]
fn test_rejected_jobs_are_not_counted() {
    let engine = Engine::new().unwrap();
    let handle = engine.handle();
    handle.run(|_| ()).unwrap();
    engine.shutdown();

    assert_eq!(handle.run(|_| ()).unwrap_err(), RuntimeError::ShutDown);
    assert_eq!(handle.try_run(|_| ()).unwrap_err(), RuntimeError::ShutDown);

    let stats = handle.stats().snapshot();
    assert_eq!(stats.jobs_submitted, 1);
    assert_eq!(stats.jobs_completed, 1);
    assert_eq!(handle.stats().jobs_in_flight(), 0);
}
