//! Process-wide registry of script evaluators
//!
//! An evaluator is any [`Object`] exposing some of these methods:
//!
//! | Method                                  | Result                           |
//! |-----------------------------------------|----------------------------------|
//! | `canEvaluate(mimeType)`                 | truthy if it runs that language  |
//! | `evaluate(mimeType, name, code, scope)` | the value of the evaluated code  |
//! | `canPreprocess(url)`                    | truthy if it rewrites that URL   |
//! | `preprocess(url, scope)`                | object with `data` and `mimeType` |
//!
//! Evaluators are asked in registration order; the first one that accepts
//! handles the request.

use std::sync::OnceLock;

use ferry_core::{BridgeError, BridgeResult, Method, Object, ObjectExt, ObjectRef, Value};
use parking_lot::RwLock;
use tracing::{debug, warn};

/// Output of [`ScriptRegistry::preprocess`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Preprocessed {
    pub data: String,
    pub mime_type: String,
}

/// Ordered set of evaluators
#[derive(Default)]
pub struct ScriptRegistry {
    evaluators: RwLock<Vec<ObjectRef>>,
}

impl ScriptRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The registry shared by the whole process
    pub fn global() -> &'static ScriptRegistry {
        static REGISTRY: OnceLock<ScriptRegistry> = OnceLock::new();
        REGISTRY.get_or_init(ScriptRegistry::new)
    }

    pub fn add_evaluator(&self, evaluator: ObjectRef) {
        debug!(evaluator = evaluator.type_name(), "evaluator added");
        self.evaluators.write().push(evaluator);
    }

    /// Remove every registration of `evaluator`
    pub fn remove_evaluator(&self, evaluator: &ObjectRef) -> bool {
        let mut evaluators = self.evaluators.write();
        let before = evaluators.len();
        evaluators.retain(|e| !e.equals(evaluator.as_ref()));
        before != evaluators.len()
    }

    pub fn len(&self) -> usize {
        self.evaluators.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.evaluators.read().is_empty()
    }

    pub fn clear(&self) {
        self.evaluators.write().clear();
    }

    fn snapshot(&self) -> Vec<ObjectRef> {
        self.evaluators.read().clone()
    }

    /// First evaluator whose `predicate` method accepts `arg`
    fn find(&self, predicate: &str, arg: &str) -> Option<ObjectRef> {
        self.snapshot().into_iter().find(|evaluator| {
            let answer = match evaluator.get_method(predicate) {
                Ok(Some(method)) => method.call(&[Value::string(arg)]),
                Ok(None) => return false,
                Err(e) => Err(e),
            };
            match answer {
                Ok(answer) => answer.is_truthy(),
                Err(e) => {
                    warn!(
                        evaluator = evaluator.type_name(),
                        predicate,
                        error = %e,
                        "evaluator predicate failed"
                    );
                    false
                }
            }
        })
    }

    pub fn can_evaluate(&self, mime_type: &str) -> bool {
        self.find("canEvaluate", mime_type).is_some()
    }

    pub fn can_preprocess(&self, url: &str) -> bool {
        self.find("canPreprocess", url).is_some()
    }

    /// Evaluate `code` with the first evaluator accepting `mime_type`
    pub fn evaluate(
        &self,
        mime_type: &str,
        name: &str,
        code: &str,
        scope: ObjectRef,
    ) -> BridgeResult<Value> {
        let evaluator = self.find("canEvaluate", mime_type).ok_or_else(|| {
            BridgeError::native(format!(
                "Could not find an evaluator for MIME type: {mime_type}"
            ))
        })?;
        debug!(evaluator = evaluator.type_name(), mime_type, name, "evaluating");
        evaluator.call_ns(
            "evaluate",
            &[
                Value::string(mime_type),
                Value::string(name),
                Value::string(code),
                Value::Object(scope),
            ],
        )
    }

    /// Rewrite the resource at `url` with the first evaluator accepting it
    pub fn preprocess(&self, url: &str, scope: ObjectRef) -> BridgeResult<Preprocessed> {
        let evaluator = self.find("canPreprocess", url).ok_or_else(|| {
            BridgeError::native(format!("Could not find a preprocessor for URL: {url}"))
        })?;
        debug!(evaluator = evaluator.type_name(), url, "preprocessing");
        let result = evaluator.call_ns("preprocess", &[Value::string(url), Value::Object(scope)])?;
        let result = result.to_object()?;
        let data = result.get("data")?.to_str()?.to_string();
        let mime_type = result.get("mimeType")?.to_str()?.to_string();
        Ok(Preprocessed { data, mime_type })
    }
}

impl std::fmt::Debug for ScriptRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<String> = self
            .snapshot()
            .iter()
            .map(|e| e.type_name().to_string())
            .collect();
        f.debug_struct("ScriptRegistry")
            .field("evaluators", &names)
            .finish()
    }
}

/// Register `evaluator` with the process-wide registry
pub fn add_evaluator(evaluator: ObjectRef) {
    ScriptRegistry::global().add_evaluator(evaluator);
}

pub fn remove_evaluator(evaluator: &ObjectRef) -> bool {
    ScriptRegistry::global().remove_evaluator(evaluator)
}
