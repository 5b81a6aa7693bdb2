use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use cascade_proto::{Script, ScriptKind};
use cascade_store::{StorageBackend, StoreError};

/// Errors from colocated script execution.
#[derive(Debug, thiserror::Error)]
pub enum ExecError {
    /// No handler registered under the requested name.
    #[error("unknown script: {0}")]
    UnknownScript(String),

    /// Inline execution requested but no interpreter is registered.
    #[error("no interpreter registered on this node")]
    NoInterpreter,

    /// The script itself reported a failure.
    #[error("script failed: {0}")]
    Failed(String),

    /// A store operation performed by the script failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Everything a script sees while running on a node.
///
/// The backend handle lets a script invoke read/write against the local
/// store, the way the data path itself would.
pub struct ScriptContext<'a> {
    /// Opaque binary blob shipped alongside the script.
    pub binary: &'a [u8],
    /// Inline source, or the fallback source of a named script.
    pub source: &'a str,
    /// The node's local storage backend.
    pub backend: &'a dyn StorageBackend,
}

/// A named script handler registered on a node.
pub type ScriptHandler =
    Arc<dyn Fn(&ScriptContext<'_>) -> Result<Vec<u8>, ExecError> + Send + Sync>;

/// Interpreter for inline script source.
pub trait ScriptEngine: Send + Sync {
    fn run(&self, ctx: &ScriptContext<'_>) -> Result<Vec<u8>, ExecError>;
}

/// Per-node script registry.
///
/// Named dispatch resolves here first; inline source falls through to the
/// registered interpreter, if any.
#[derive(Default)]
pub struct ScriptRegistry {
    handlers: RwLock<HashMap<String, ScriptHandler>>,
    interpreter: RwLock<Option<Arc<dyn ScriptEngine>>>,
}

impl ScriptRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler under a name, replacing any previous one.
    pub fn register(&self, name: impl Into<String>, handler: ScriptHandler) {
        self.handlers
            .write()
            .expect("lock poisoned")
            .insert(name.into(), handler);
    }

    /// Install the interpreter used for inline source.
    pub fn set_interpreter(&self, engine: Arc<dyn ScriptEngine>) {
        *self.interpreter.write().expect("lock poisoned") = Some(engine);
    }

    /// Names of all registered handlers, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .handlers
            .read()
            .expect("lock poisoned")
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }

    /// Run a script against the local backend.
    pub fn run(&self, script: &Script, backend: &dyn StorageBackend) -> Result<Vec<u8>, ExecError> {
        match &script.kind {
            ScriptKind::Named { name, source } => {
                let handler = self.handlers.read().expect("lock poisoned").get(name).cloned();
                let ctx = ScriptContext {
                    binary: &script.binary,
                    source,
                    backend,
                };
                match handler {
                    Some(handler) => handler(&ctx),
                    // A node that never heard of the name can still run the
                    // shipped source, if it has an interpreter.
                    None => match self.interpreter.read().expect("lock poisoned").clone() {
                        Some(engine) => engine.run(&ctx),
                        None => Err(ExecError::UnknownScript(name.clone())),
                    },
                }
            }
            ScriptKind::Inline { source } => {
                let ctx = ScriptContext {
                    binary: &script.binary,
                    source,
                    backend,
                };
                match self.interpreter.read().expect("lock poisoned").clone() {
                    Some(engine) => engine.run(&ctx),
                    None => Err(ExecError::NoInterpreter),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cascade_store::MemoryBackend;
    use cascade_types::{Identifier, IoFlags};

    /// Interpreter that ignores the source and echoes the binary blob.
    struct EchoEngine;

    impl ScriptEngine for EchoEngine {
        fn run(&self, ctx: &ScriptContext<'_>) -> Result<Vec<u8>, ExecError> {
            Ok(ctx.binary.to_vec())
        }
    }

    #[test]
    fn named_handler_dispatch() {
        let registry = ScriptRegistry::new();
        registry.register(
            "greet",
            Arc::new(|ctx: &ScriptContext<'_>| {
                let mut out = b"hello ".to_vec();
                out.extend_from_slice(ctx.binary);
                Ok(out)
            }),
        );

        let backend = MemoryBackend::new();
        let script = Script::named("greet", "", b"world".to_vec());
        let out = registry.run(&script, &backend).unwrap();
        assert_eq!(out, b"hello world");
    }

    #[test]
    fn unknown_name_without_interpreter_fails() {
        let registry = ScriptRegistry::new();
        let backend = MemoryBackend::new();
        let script = Script::named("missing", "", vec![]);
        let err = registry.run(&script, &backend).unwrap_err();
        assert!(matches!(err, ExecError::UnknownScript(_)));
    }

    #[test]
    fn unknown_name_falls_back_to_interpreter() {
        let registry = ScriptRegistry::new();
        registry.set_interpreter(Arc::new(EchoEngine));
        let backend = MemoryBackend::new();
        let script = Script::named("missing", "source", b"fallback".to_vec());
        assert_eq!(registry.run(&script, &backend).unwrap(), b"fallback");
    }

    #[test]
    fn inline_without_interpreter_fails() {
        let registry = ScriptRegistry::new();
        let backend = MemoryBackend::new();
        let script = Script::inline("anything", vec![]);
        let err = registry.run(&script, &backend).unwrap_err();
        assert!(matches!(err, ExecError::NoInterpreter));
    }

    #[test]
    fn inline_with_interpreter_runs() {
        let registry = ScriptRegistry::new();
        registry.set_interpreter(Arc::new(EchoEngine));
        let backend = MemoryBackend::new();
        let script = Script::inline("ignored", b"binary data".to_vec());
        assert_eq!(registry.run(&script, &backend).unwrap(), b"binary data");
    }

    #[test]
    fn script_can_touch_the_local_store() {
        let registry = ScriptRegistry::new();
        // Splits the binary blob at the first '|' into key and payload,
        // writes the payload, reads it back.
        registry.register(
            "store-roundtrip",
            Arc::new(|ctx: &ScriptContext<'_>| {
                let split = ctx
                    .binary
                    .iter()
                    .position(|b| *b == b'|')
                    .ok_or_else(|| ExecError::Failed("missing separator".into()))?;
                let id = Identifier::transform(&ctx.binary[..split], 0);
                ctx.backend
                    .write_at(&id, 0, &ctx.binary[split + 1..], IoFlags::empty())?;
                Ok(ctx.backend.read_at(&id, 0, 0)?)
            }),
        );

        let backend = MemoryBackend::new();
        let script = Script::named("store-roundtrip", "", b"key|payload bytes".to_vec());
        let out = registry.run(&script, &backend).unwrap();
        assert_eq!(out, b"payload bytes");
        assert!(backend.exists(&Identifier::transform(b"key", 0)));
    }

    #[test]
    fn handler_errors_are_reported() {
        let registry = ScriptRegistry::new();
        registry.register(
            "boom",
            Arc::new(|_: &ScriptContext<'_>| Err(ExecError::Failed("deliberate".into()))),
        );
        let backend = MemoryBackend::new();
        let err = registry
            .run(&Script::named("boom", "", vec![]), &backend)
            .unwrap_err();
        assert!(err.to_string().contains("deliberate"));
    }

    #[test]
    fn names_are_sorted() {
        let registry = ScriptRegistry::new();
        registry.register("zeta", Arc::new(|_: &ScriptContext<'_>| Ok(vec![])));
        registry.register("alpha", Arc::new(|_: &ScriptContext<'_>| Ok(vec![])));
        assert_eq!(registry.names(), vec!["alpha", "zeta"]);
    }
}
