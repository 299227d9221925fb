use crate::{
    Activation, BoxingRegistry, CallShape, DEFAULT_MAX_SCOPE_DEPTH, ExecutionError, FunctionBody,
    FunctionRef, HandleTable, HostAny, NativeResult, ObjectRef, PlainObject, ScopeChain, Value,
    ValueError, Word,
};

#[derive(Debug, Clone, Copy)]
pub struct EngineSettings {
    /// Longest dynamic scope chain an activation may build.
    pub max_scope_depth: usize,
    /// Initial capacity of the handle table backing packed words.
    pub handle_capacity: usize,
    /// Shape `Engine::call` specializes callees for.
    pub default_shape: CallShape,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            max_scope_depth: DEFAULT_MAX_SCOPE_DEPTH,
            handle_capacity: 64,
            default_shape: CallShape::Direct,
        }
    }
}

/// Entry point for running compiled bodies against one global object.
pub struct Engine {
    settings: EngineSettings,
    global: ObjectRef,
    boxing: BoxingRegistry,
    handles: HandleTable,
}

impl Engine {
    pub fn new(settings: EngineSettings) -> Self {
        Self::with_registry(settings, BoxingRegistry::new())
    }

    /// Use an explicitly constructed boxing registry instead of an empty one.
    pub fn with_registry(settings: EngineSettings, boxing: BoxingRegistry) -> Self {
        log::debug!("creating engine with {settings:?}");
        Self {
            settings,
            global: PlainObject::shared(),
            boxing,
            handles: HandleTable::with_capacity(settings.handle_capacity),
        }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn global(&self) -> &ObjectRef {
        &self.global
    }

    pub fn boxing(&self) -> &BoxingRegistry {
        &self.boxing
    }

    pub fn boxing_mut(&mut self) -> &mut BoxingRegistry {
        &mut self.boxing
    }

    /// Run a global-code body against the global object.
    pub fn run_global(&self, function: &FunctionRef) -> NativeResult {
        let FunctionBody::Global(code) = function.body() else {
            return Err(ExecutionError::ShapeMismatch {
                function: function.name().to_owned(),
                expected: CallShape::Global,
            });
        };
        log::debug!("global code '{}' started", function.name());
        let result = code(function, &self.global);
        log::debug!("global code '{}' finished", function.name());
        result
    }

    /// A fresh activation with the global object as the outermost scope.
    pub fn activation(
        &self,
        function: FunctionRef,
        receiver: ObjectRef,
        args: &[Value],
    ) -> Activation {
        Activation::new(function, receiver, args)
            .with_scope(ScopeChain::empty().prepend(0, self.global.clone()))
            .with_max_scope_depth(self.settings.max_scope_depth)
    }

    /// Run an evaluated-code body with the global object as receiver.
    pub fn run_eval(&self, function: &FunctionRef, args: &[Value]) -> NativeResult {
        if !matches!(function.body(), FunctionBody::Eval(_)) {
            return Err(ExecutionError::ShapeMismatch {
                function: function.name().to_owned(),
                expected: CallShape::Eval,
            });
        }
        let mut activation = self.activation(function.clone(), self.global.clone(), args);
        log::debug!("eval code '{}' started", function.name());
        let result = activation.run();
        log::debug!("eval code '{}' finished", function.name());
        result
    }

    /// Call `callee` with `this` and `args`.
    ///
    /// Global and eval bodies run in an activation scoped to the global
    /// object, which also stands in for a receiver that is not an object.
    /// Generic bodies are specialized for the configured default shape.
    pub fn call(&self, callee: &Value, this: &Value, args: &[Value]) -> NativeResult {
        let Value::Function(function) = callee else {
            return Err(ExecutionError::NotCallable(callee.tag()));
        };
        match function.body() {
            FunctionBody::Global(_) | FunctionBody::Eval(_) => {
                let receiver = match this {
                    Value::Object(object) => object.clone(),
                    _ => self.global.clone(),
                };
                self.activation(function.clone(), receiver, args).run()
            }
            FunctionBody::Generic(_) => {
                function.specialize(self.settings.default_shape)?.invoke(this, args)
            }
        }
    }

    pub fn box_host(&self, host: HostAny) -> Value {
        self.boxing.box_host(host)
    }

    pub fn box_host_named(&self, host: HostAny, type_name: &'static str) -> Value {
        self.boxing.box_host_named(host, type_name)
    }

    /// Pack `value` into a word whose references are rooted in this engine.
    pub fn pack(&mut self, value: &Value) -> Result<Word, ValueError> {
        Word::pack(value, &mut self.handles)
    }

    pub fn unpack(&self, word: Word) -> Result<Value, ValueError> {
        word.unpack(&self.handles)
    }

    /// Drop every rooted payload; previously packed reference words become
    /// stale.
    pub fn release_handles(&mut self) {
        log::debug!("releasing {} handles", self.handles.len());
        self.handles.clear();
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(EngineSettings::default())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{FunctionRecord, HostObject, NativeHandle, SlotLayout, Tag};

    /// Eval code that resolves the name passed as its only argument.
    fn read_named() -> FunctionRef {
        Arc::new(FunctionRecord::eval(
            "read",
            1,
            SlotLayout::new(["name"], []),
            |_f, _this, private, _shared, scope| {
                let name = private[0].as_string().map(|name| name.to_string()).unwrap_or_default();
                scope
                    .resolve(&name)
                    .map(|(_, value)| value)
                    .ok_or(ExecutionError::UnresolvedReference { name })
            },
        ))
    }

    #[test]
    fn global_code_sees_the_global_object() {
        let engine = Engine::default();
        let main = Arc::new(FunctionRecord::global("main", |_f, global| {
            global.put("answer", Value::from(42.0));
            Ok(Value::Undefined)
        }));
        assert_eq!(engine.run_global(&main), Ok(Value::Undefined));
        assert_eq!(engine.global().get("answer"), Some(Value::from(42.0)));
    }

    #[test]
    fn run_global_rejects_other_bodies() {
        let engine = Engine::default();
        let host = Arc::new(FunctionRecord::host("h", 0, |_, _| Ok(Value::Undefined)));
        assert_eq!(
            engine.run_global(&host),
            Err(ExecutionError::ShapeMismatch {
                function: "h".into(),
                expected: CallShape::Global,
            })
        );
        assert!(engine.run_eval(&host, &[]).is_err());
    }

    #[test]
    fn eval_code_falls_back_to_globals() {
        let engine = Engine::default();
        engine.global().put("g", Value::from("global"));
        let read = read_named();
        assert_eq!(engine.run_eval(&read, &[Value::from("g")]), Ok(Value::from("global")));
        assert!(matches!(
            engine.run_eval(&read, &[Value::from("nope")]),
            Err(ExecutionError::UnresolvedReference { .. })
        ));
    }

    #[test]
    fn called_eval_code_sees_globals() {
        let engine = Engine::default();
        engine.global().put("g", Value::from("global"));
        let read = Value::from(read_named());
        let global = Value::Object(engine.global().clone());

        assert_eq!(engine.call(&read, &global, &[Value::from("g")]), Ok(Value::from("global")));
        assert_eq!(
            engine.call(&read, &Value::Undefined, &[Value::from("g")]),
            Ok(Value::from("global"))
        );
        assert_eq!(
            engine.call(&read, &Value::from(3.0), &[Value::from("g")]),
            Ok(Value::from("global"))
        );
    }

    #[test]
    fn called_global_code_defaults_its_receiver() {
        let engine = Engine::default();
        let mark = Value::from(Arc::new(FunctionRecord::global("mark", |_f, this| {
            this.put("marked", Value::TRUE);
            Ok(Value::Undefined)
        })));
        engine.call(&mark, &Value::NULL, &[]).expect("call");
        assert_eq!(engine.global().get("marked"), Some(Value::TRUE));

        let target = PlainObject::shared();
        engine.call(&mark, &Value::Object(target.clone()), &[]).expect("call");
        assert_eq!(target.get("marked"), Some(Value::TRUE));
    }

    #[test]
    fn activation_respects_scope_limit() {
        let engine = Engine::new(EngineSettings {
            max_scope_depth: 1,
            ..EngineSettings::default()
        });
        let function = Arc::new(FunctionRecord::eval(
            "f",
            0,
            SlotLayout::default(),
            |_, _, _, _, _| Ok(Value::Undefined),
        ));
        let mut activation = engine.activation(function, engine.global().clone(), &[]);
        assert_eq!(
            activation.enter_scope(PlainObject::shared()),
            Err(ExecutionError::ScopeDepthExceeded { limit: 1 })
        );
    }

    #[test]
    fn call_requires_a_function() {
        let engine = Engine::default();
        assert_eq!(
            engine.call(&Value::from(1.0), &Value::Undefined, &[]),
            Err(ExecutionError::NotCallable(Tag::Number))
        );
        let twice = Value::from(Arc::new(FunctionRecord::host("twice", 1, |_, args| {
            let n: f64 = args.first().cloned().unwrap_or_default().unbox()?;
            Ok(Value::from(n * 2.0))
        })));
        assert_eq!(
            engine.call(&twice, &Value::Undefined, &[Value::from(4.0)]),
            Ok(Value::from(8.0))
        );
    }

    #[test]
    fn reflective_default_shape() {
        let engine = Engine::new(EngineSettings {
            default_shape: CallShape::Reflective,
            ..EngineSettings::default()
        });
        let echo = Value::from(Arc::new(FunctionRecord::host("echo", 1, |_, args| {
            Ok(args.first().cloned().unwrap_or_default())
        })));
        assert_eq!(engine.call(&echo, &Value::Undefined, &[Value::NULL]), Ok(Value::NULL));
    }

    #[test]
    fn packed_words_live_until_release() {
        let mut engine = Engine::default();
        let word = engine.pack(&Value::from("kept")).expect("pack");
        assert_eq!(engine.unpack(word), Ok(Value::from("kept")));
        engine.release_handles();
        assert!(matches!(engine.unpack(word), Err(ValueError::StaleHandle(_))));
        let number = engine.pack(&Value::from(0.5)).expect("pack");
        assert_eq!(engine.unpack(number), Ok(Value::from(0.5)));
    }

    #[test]
    fn registered_boxing_is_used() {
        struct Celsius(f64);
        let mut engine = Engine::default();
        engine
            .boxing_mut()
            .register::<Celsius>(|host| host.downcast_ref::<Celsius>().map(|c| Value::from(c.0)));
        let boxed = engine.box_host(Arc::new(Celsius(21.5)));
        assert_eq!(boxed, Value::from(21.5));
        assert_eq!(engine.boxing().len(), 1);
    }

    #[test]
    fn unclaimed_hosts_keep_their_name() {
        struct Socket;
        let engine = Engine::default();
        let boxed = engine.box_host_named(Arc::new(Socket), "Socket");
        let handle: NativeHandle = boxed.unbox().expect("handle");
        assert_eq!(handle.type_name(), "Socket");
    }
}
