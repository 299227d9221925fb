//! Activations and closures.
//!
//! An activation owns the private slot array of one invocation and a
//! handle to its shared slot array. Closures created inside it retain only
//! the shared array, so whatever a long-lived closure keeps alive is
//! exactly the set of variables it was compiled to close over.
use core::any::Any;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::{
    CallShape, ExecutionError, FunctionBody, FunctionRef, HostObject, NativeResult, ObjectRef,
    ScopeChain, Value,
};

pub const DEFAULT_MAX_SCOPE_DEPTH: usize = 1024;

/// Slots closed over by nested functions.
///
/// Cloning shares the storage. Every write replaces a whole [`Value`] under
/// the lock, so readers on other threads never see a partial update.
#[derive(Debug, Clone, Default)]
pub struct SharedSlots(Arc<RwLock<Vec<Value>>>);

impl SharedSlots {
    pub fn new(count: usize) -> Self {
        Self(Arc::new(RwLock::new(vec![Value::Undefined; count])))
    }

    pub fn get(&self, index: usize) -> Option<Value> {
        self.0.read().get(index).cloned()
    }

    /// Returns `false` if `index` is outside the array.
    pub fn set(&self, index: usize, value: Value) -> bool {
        match self.0.write().get_mut(index) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.0.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn snapshot(&self) -> Vec<Value> {
        self.0.read().clone()
    }

    #[inline]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

// ── Captured environments ──────────────────────────────────────────

/// The shared slots of an enclosing activation, addressed by the names its
/// layout gave them. Environments of nested closures link outward.
#[derive(Debug)]
pub struct Environment {
    names: Arc<[Arc<str>]>,
    slots: SharedSlots,
    parent: Option<Arc<Environment>>,
}

impl Environment {
    pub fn slots(&self) -> &SharedSlots {
        &self.slots
    }

    pub fn names(&self) -> &[Arc<str>] {
        &self.names
    }

    pub fn parent(&self) -> Option<&Arc<Environment>> {
        self.parent.as_ref()
    }

    /// Nearest environment declaring `name`, with the slot index there.
    fn binding(&self, name: &str) -> Option<(&Environment, usize)> {
        let mut current = Some(self);
        while let Some(env) = current {
            if let Some(index) = env.names.iter().position(|slot| &**slot == name) {
                return Some((env, index));
            }
            current = env.parent.as_deref();
        }
        None
    }

    pub fn lookup(&self, name: &str) -> Option<Value> {
        let (env, index) = self.binding(name)?;
        env.slots.get(index)
    }

    /// Returns `false` if no enclosing activation declares `name`.
    pub fn assign(&self, name: &str, value: Value) -> bool {
        self.binding(name)
            .is_some_and(|(env, index)| env.slots.set(index, value))
    }
}

/// Seen from compiled code as the innermost scope object, so captured
/// variables resolve through the same chain as `with` objects.
impl HostObject for Environment {
    fn get(&self, name: &str) -> Option<Value> {
        self.lookup(name)
    }

    fn put(&self, name: &str, value: Value) {
        if !self.assign(name, value) {
            log::debug!("ignoring write to undeclared captured name '{name}'");
        }
    }

    fn has_property(&self, name: &str) -> bool {
        self.binding(name).is_some()
    }

    fn class_name(&self) -> &'static str {
        "Environment"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

// ── Activations ────────────────────────────────────────────────────

pub struct Activation {
    function: FunctionRef,
    receiver: ObjectRef,
    args: Vec<Value>,
    private: Vec<Value>,
    shared: SharedSlots,
    enclosing: Option<Arc<Environment>>,
    scope: ScopeChain,
    max_scope_depth: usize,
}

impl Activation {
    /// Allocate slots from the function's layout. The leading private
    /// slots take the arguments; extra arguments are dropped.
    pub fn new(function: FunctionRef, receiver: ObjectRef, args: &[Value]) -> Self {
        let mut private = vec![Value::Undefined; function.layout().private.len()];
        let count = args.len().min(function.arity()).min(private.len());
        private[..count].clone_from_slice(&args[..count]);
        Self {
            shared: SharedSlots::new(function.layout().shared.len()),
            function,
            receiver,
            args: args.to_vec(),
            private,
            enclosing: None,
            scope: ScopeChain::empty(),
            max_scope_depth: DEFAULT_MAX_SCOPE_DEPTH,
        }
    }

    #[must_use]
    pub fn with_scope(mut self, scope: ScopeChain) -> Self {
        self.scope = scope;
        self
    }

    #[must_use]
    pub fn with_max_scope_depth(mut self, limit: usize) -> Self {
        self.max_scope_depth = limit;
        self
    }

    pub fn function(&self) -> &FunctionRef {
        &self.function
    }

    pub fn receiver(&self) -> &ObjectRef {
        &self.receiver
    }

    /// Arguments as passed, including any beyond the declared arity.
    pub fn args(&self) -> &[Value] {
        &self.args
    }

    pub fn private(&self) -> &[Value] {
        &self.private
    }

    pub fn private_mut(&mut self) -> &mut [Value] {
        &mut self.private
    }

    pub fn shared(&self) -> &SharedSlots {
        &self.shared
    }

    pub fn enclosing(&self) -> Option<&Arc<Environment>> {
        self.enclosing.as_ref()
    }

    pub fn scope(&self) -> &ScopeChain {
        &self.scope
    }

    /// Push a `with`/eval scope object in front of the chain.
    pub fn enter_scope(&mut self, object: ObjectRef) -> Result<(), ExecutionError> {
        let depth = self.scope.len();
        if depth >= self.max_scope_depth {
            log::warn!("'{}' exceeded scope depth {}", self.function.name(), self.max_scope_depth);
            return Err(ExecutionError::ScopeDepthExceeded {
                limit: self.max_scope_depth,
            });
        }
        log::debug!("'{}' entering scope {depth}", self.function.name());
        self.scope = self.scope.prepend(depth, object);
        Ok(())
    }

    /// Look a name up in the private slots, then the shared slots, then the
    /// captured environment, then the dynamic scope chain.
    pub fn resolve(&self, name: &str) -> Result<Value, ExecutionError> {
        let layout = self.function.layout();
        if let Some(index) = layout.private_index(name) {
            return Ok(self.private[index].clone());
        }
        if let Some(value) = layout.shared_index(name).and_then(|index| self.shared.get(index)) {
            return Ok(value);
        }
        if let Some(value) = self.enclosing.as_ref().and_then(|env| env.lookup(name)) {
            return Ok(value);
        }
        if let Some((depth, value)) = self.scope.resolve(name) {
            log::trace!("resolved '{name}' at scope depth {depth}");
            return Ok(value);
        }
        Err(ExecutionError::UnresolvedReference {
            name: name.to_owned(),
        })
    }

    /// Close over this activation's shared slots. The environment it was
    /// itself created in stays reachable behind them.
    pub fn capture(&self, function: FunctionRef) -> Closure {
        let environment = Environment {
            names: self.function.layout().shared.clone().into(),
            slots: self.shared.clone(),
            parent: self.enclosing.clone(),
        };
        Closure {
            function,
            environment: Arc::new(environment),
        }
    }

    /// Run the function body against this activation's slots.
    pub fn run(&mut self) -> NativeResult {
        log::debug!("running '{}'", self.function.name());
        let function = self.function.clone();
        match function.body() {
            FunctionBody::Global(code) => code(&function, &self.receiver),
            FunctionBody::Eval(code) => {
                let scope = match &self.enclosing {
                    Some(env) => self.scope.prepend(self.scope.len(), env.clone()),
                    None => self.scope.clone(),
                };
                code(&function, &self.receiver, &mut self.private, &self.shared, &scope)
            }
            FunctionBody::Generic(_) => function
                .specialize(CallShape::Direct)?
                .invoke(&Value::Object(self.receiver.clone()), &self.args),
        }
    }
}

// ── Closures ───────────────────────────────────────────────────────

/// A function paired with the shared slots of the activation it was
/// created in.
#[derive(Debug, Clone)]
pub struct Closure {
    function: FunctionRef,
    environment: Arc<Environment>,
}

impl Closure {
    pub fn function(&self) -> &FunctionRef {
        &self.function
    }

    pub fn environment(&self) -> &Arc<Environment> {
        &self.environment
    }

    /// Shared slots of the activation the closure was created in.
    pub fn captured(&self) -> &SharedSlots {
        &self.environment.slots
    }

    /// A fresh activation with its own slots, enclosed by the captured
    /// environment.
    pub fn activate(&self, receiver: ObjectRef, args: &[Value]) -> Activation {
        let mut activation = Activation::new(self.function.clone(), receiver, args);
        activation.enclosing = Some(self.environment.clone());
        activation
    }

    pub fn call(&self, receiver: ObjectRef, args: &[Value], scope: ScopeChain) -> NativeResult {
        self.activate(receiver, args).with_scope(scope).run()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{FunctionRecord, PlainObject, SlotLayout};

    fn eval_fn(name: &str, arity: usize, private: &[&str], shared: &[&str]) -> FunctionRef {
        let layout = SlotLayout::new(private.iter().copied(), shared.iter().copied());
        Arc::new(FunctionRecord::eval(name, arity, layout, |_f, _this, private, shared, _scope| {
            Ok(private.first().cloned().or_else(|| shared.get(0)).unwrap_or_default())
        }))
    }

    /// Eval code that reads `y` through the scope chain it is handed.
    fn read_y(layout: SlotLayout) -> FunctionRef {
        Arc::new(FunctionRecord::eval("readY", 0, layout, |_f, _this, _private, _shared, scope| {
            Ok(scope.resolve("y").map(|(_, value)| value).unwrap_or_default())
        }))
    }

    #[test]
    fn slots_follow_the_layout() {
        let function = eval_fn("f", 2, &["a", "b", "c"], &["y"]);
        let activation = Activation::new(
            function,
            PlainObject::shared(),
            &[Value::from(1.0), Value::from(2.0), Value::from(3.0)],
        );
        assert_eq!(activation.private(), &[Value::from(1.0), Value::from(2.0), Value::Undefined]);
        assert_eq!(activation.shared().snapshot(), vec![Value::Undefined]);
        assert_eq!(activation.args().len(), 3);
    }

    #[test]
    fn resolve_prefers_slots_over_scope() {
        let function = eval_fn("f", 1, &["a"], &["y"]);
        let with = PlainObject::shared();
        with.put("a", Value::from("from scope"));
        with.put("w", Value::from("only scope"));

        let mut activation = Activation::new(function, PlainObject::shared(), &[Value::TRUE]);
        activation.enter_scope(with).expect("enter");
        activation.shared().set(0, Value::from(7.0));

        assert_eq!(activation.resolve("a"), Ok(Value::TRUE));
        assert_eq!(activation.resolve("y"), Ok(Value::from(7.0)));
        assert_eq!(activation.resolve("w"), Ok(Value::from("only scope")));
        assert_eq!(
            activation.resolve("missing"),
            Err(ExecutionError::UnresolvedReference {
                name: "missing".into(),
            })
        );
    }

    #[test]
    fn scope_depth_is_bounded() {
        let function = eval_fn("deep", 0, &[], &[]);
        let mut activation =
            Activation::new(function, PlainObject::shared(), &[]).with_max_scope_depth(2);
        activation.enter_scope(PlainObject::shared()).expect("first");
        activation.enter_scope(PlainObject::shared()).expect("second");
        assert_eq!(
            activation.enter_scope(PlainObject::shared()),
            Err(ExecutionError::ScopeDepthExceeded { limit: 2 })
        );
        assert_eq!(activation.scope().len(), 2);
    }

    #[test]
    fn run_hands_slots_to_eval_code() {
        let function = eval_fn("first", 1, &["a"], &[]);
        let mut activation = Activation::new(function, PlainObject::shared(), &[Value::from("x")]);
        assert_eq!(activation.run(), Ok(Value::from("x")));
    }

    #[test]
    fn host_function_receives_arguments() {
        let function = Arc::new(FunctionRecord::host("count", 1, |this, args| {
            assert!(this.is_object());
            Ok(Value::from(args.len() as f64))
        }));
        let mut activation = Activation::new(function, PlainObject::shared(), &[Value::TRUE]);
        assert_eq!(activation.run(), Ok(Value::from(1.0)));
    }

    #[test]
    fn host_closure_receives_arguments() {
        let outer = eval_fn("outer", 0, &[], &[]);
        let activation = Activation::new(outer, PlainObject::shared(), &[]);
        let identity = Arc::new(FunctionRecord::host("id", 1, |_, args| {
            Ok(args.first().cloned().unwrap_or_default())
        }));
        let closure = activation.capture(identity);
        let result = closure.call(PlainObject::shared(), &[Value::from(7.0)], ScopeChain::empty());
        assert_eq!(result, Ok(Value::from(7.0)));
    }

    #[test]
    fn closure_keeps_only_shared_slots() {
        let outer = eval_fn("outer", 2, &["a", "b"], &["y", "z"]);
        let mut activation = Activation::new(
            outer,
            PlainObject::shared(),
            &[Value::from(1.0), Value::from(2.0)],
        );
        activation.shared().set(0, Value::from("y0"));

        let closure = activation.capture(read_y(SlotLayout::default()));
        assert!(closure.captured().ptr_eq(activation.shared()));
        assert_eq!(closure.captured().len(), 2);

        activation.private_mut()[0] = Value::from(100.0);
        activation.private_mut()[1] = Value::from(200.0);
        drop(activation);

        let result = closure.call(PlainObject::shared(), &[], ScopeChain::empty()).expect("call");
        assert_eq!(result, Value::from("y0"));
    }

    #[test]
    fn closure_slots_are_separate_from_captured_ones() {
        let outer = eval_fn("outer", 0, &[], &["y", "z"]);
        let activation = Activation::new(outer, PlainObject::shared(), &[]);
        activation.shared().set(0, Value::from("outer y"));

        let closure = activation.capture(eval_fn("inner", 0, &[], &["w"]));
        let inner = closure.activate(PlainObject::shared(), &[]);

        assert_eq!(inner.shared().len(), 1);
        assert!(!inner.shared().ptr_eq(activation.shared()));
        assert_eq!(inner.resolve("w"), Ok(Value::Undefined));
        assert_eq!(inner.resolve("y"), Ok(Value::from("outer y")));
        assert_eq!(inner.resolve("z"), Ok(Value::Undefined));
    }

    #[test]
    fn inner_names_shadow_captured_ones() {
        let outer = eval_fn("outer", 0, &[], &["y"]);
        let activation = Activation::new(outer, PlainObject::shared(), &[]);
        activation.shared().set(0, Value::from("outer"));

        let closure = activation.capture(read_y(SlotLayout::new([], ["y"])));
        let mut inner = closure.activate(PlainObject::shared(), &[]);
        inner.shared().set(0, Value::from("inner"));
        assert_eq!(inner.resolve("y"), Ok(Value::from("inner")));
        // the body only sees the captured binding through the chain
        assert_eq!(inner.run(), Ok(Value::from("outer")));
    }

    #[test]
    fn nested_closures_reach_every_enclosing_activation() {
        let outer = eval_fn("outer", 0, &[], &["x"]);
        let outer_activation = Activation::new(outer, PlainObject::shared(), &[]);
        outer_activation.shared().set(0, Value::from("x0"));

        let middle = outer_activation.capture(eval_fn("middle", 0, &[], &["y"]));
        let middle_activation = middle.activate(PlainObject::shared(), &[]);
        middle_activation.shared().set(0, Value::from("y0"));

        let inner = middle_activation.capture(eval_fn("inner", 0, &[], &[]));
        let inner_activation = inner.activate(PlainObject::shared(), &[]);
        assert_eq!(inner_activation.resolve("x"), Ok(Value::from("x0")));
        assert_eq!(inner_activation.resolve("y"), Ok(Value::from("y0")));

        assert!(inner.environment().assign("x", Value::from("x1")));
        assert_eq!(outer_activation.shared().get(0), Some(Value::from("x1")));
        assert!(!inner.environment().assign("nope", Value::TRUE));
    }

    #[test]
    fn closure_sees_later_shared_writes() {
        let outer = eval_fn("outer", 0, &[], &["y"]);
        let activation = Activation::new(outer, PlainObject::shared(), &[]);
        let closure = activation.capture(eval_fn("inner", 0, &[], &[]));
        activation.shared().set(0, Value::from(5.0));
        assert_eq!(closure.captured().get(0), Some(Value::from(5.0)));
        assert!(!closure.captured().set(9, Value::TRUE));
    }
}
