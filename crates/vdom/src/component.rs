//! Component definitions: a closed set of optional lifecycle hooks.
//!
//! A definition is resolved once when it is built. The reconciler calls the
//! hooks at fixed points of the instance lifecycle; absent hooks are no-ops
//! (and `should_update` defaults to `true`).

use crate::keys::{InstanceId, NodeKey};
use crate::node::VirtualNode;
use crate::props::{Props, State};
use core::fmt;
use std::rc::Rc;

type InitialStateFn = dyn Fn(&Props) -> State;
type RenderFn = dyn Fn(&Props, &State) -> VirtualNode;
type ShouldUpdateFn = dyn Fn(&Props, &State, &Props, &State) -> bool;
type PhaseHookFn = dyn Fn(&Props, &State);
type TransitionHookFn = dyn Fn(&Props, &State, &Props, &State);
type AfterHookFn = dyn Fn(&HookContext<'_>);
type SinkFn = dyn Fn(InstanceId, State);

/// Bound `send` for one instance: queues a partial state for the next flush.
///
/// Sending never renders synchronously. Sends that arrive after the instance
/// or its application is gone are dropped.
#[derive(Clone)]
pub struct Updater {
    instance: InstanceId,
    sink: Rc<SinkFn>,
}

impl Updater {
    #[must_use]
    pub fn new(instance: InstanceId, sink: Rc<SinkFn>) -> Self {
        Self { instance, sink }
    }

    /// Merge `partial` into the instance's pending state.
    pub fn send(&self, partial: State) {
        (self.sink)(self.instance, partial);
    }
}

impl fmt::Debug for Updater {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Updater").field("instance", &self.instance).finish()
    }
}

/// Arguments of `after_mount` and `after_update`.
#[derive(Debug)]
pub struct HookContext<'ctx> {
    /// The instance the hook runs for.
    pub instance: InstanceId,
    /// Root host node of the realised output.
    pub host: NodeKey,
    pub props: &'ctx Props,
    pub state: &'ctx State,
    /// Props and state before the update; `None` after mount.
    pub previous: Option<(&'ctx Props, &'ctx State)>,
    /// Bound state updater for this instance.
    pub send: &'ctx Updater,
}

#[derive(Default)]
struct Hooks {
    initial_state: Option<Box<InitialStateFn>>,
    render: Option<Box<RenderFn>>,
    should_update: Option<Box<ShouldUpdateFn>>,
    before_mount: Option<Box<PhaseHookFn>>,
    after_mount: Option<Box<AfterHookFn>>,
    before_update: Option<Box<TransitionHookFn>>,
    after_update: Option<Box<AfterHookFn>>,
    before_unmount: Option<Box<PhaseHookFn>>,
}

struct Definition {
    name: String,
    hooks: Hooks,
}

/// Shared handle to a component definition.
///
/// Two handles are the same component only if they come from the same
/// `build()` call; clones compare equal.
#[derive(Clone)]
pub struct Component(Rc<Definition>);

impl Component {
    #[must_use]
    pub fn builder(name: impl Into<String>) -> ComponentBuilder {
        ComponentBuilder {
            name: name.into(),
            hooks: Hooks::default(),
        }
    }

    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.0.name
    }

    /// Shorthand for [`VirtualNode::component`].
    #[must_use]
    pub fn node(&self, props: Props) -> VirtualNode {
        VirtualNode::component(self, props)
    }

    #[must_use]
    pub fn initial_state(&self, props: &Props) -> State {
        self.0
            .hooks
            .initial_state
            .as_ref()
            .map_or_else(State::new, |hook| hook(props))
    }

    /// Project props and state to output. Never handed a state setter.
    #[must_use]
    pub fn render(&self, props: &Props, state: &State) -> VirtualNode {
        self.0
            .hooks
            .render
            .as_ref()
            .map_or(VirtualNode::Empty, |hook| hook(props, state))
    }

    #[must_use]
    pub fn should_update(
        &self,
        prev_props: &Props,
        prev_state: &State,
        next_props: &Props,
        next_state: &State,
    ) -> bool {
        self.0
            .hooks
            .should_update
            .as_ref()
            .is_none_or(|hook| hook(prev_props, prev_state, next_props, next_state))
    }

    pub fn before_mount(&self, props: &Props, state: &State) {
        if let Some(hook) = &self.0.hooks.before_mount {
            hook(props, state);
        }
    }

    pub fn after_mount(&self, context: &HookContext<'_>) {
        if let Some(hook) = &self.0.hooks.after_mount {
            hook(context);
        }
    }

    pub fn before_update(
        &self,
        props: &Props,
        state: &State,
        next_props: &Props,
        next_state: &State,
    ) {
        if let Some(hook) = &self.0.hooks.before_update {
            hook(props, state, next_props, next_state);
        }
    }

    pub fn after_update(&self, context: &HookContext<'_>) {
        if let Some(hook) = &self.0.hooks.after_update {
            hook(context);
        }
    }

    pub fn before_unmount(&self, props: &Props, state: &State) {
        if let Some(hook) = &self.0.hooks.before_unmount {
            hook(props, state);
        }
    }
}

impl PartialEq for Component {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Component {}

impl fmt::Debug for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Component").field(&self.0.name).finish()
    }
}

/// Collects the optional hooks of a component definition.
pub struct ComponentBuilder {
    name: String,
    hooks: Hooks,
}

impl ComponentBuilder {
    #[must_use]
    pub fn initial_state(mut self, hook: impl Fn(&Props) -> State + 'static) -> Self {
        self.hooks.initial_state = Some(Box::new(hook));
        self
    }

    #[must_use]
    pub fn render(mut self, hook: impl Fn(&Props, &State) -> VirtualNode + 'static) -> Self {
        self.hooks.render = Some(Box::new(hook));
        self
    }

    /// Arguments: previous props, previous state, next props, next state.
    #[must_use]
    pub fn should_update(
        mut self,
        hook: impl Fn(&Props, &State, &Props, &State) -> bool + 'static,
    ) -> Self {
        self.hooks.should_update = Some(Box::new(hook));
        self
    }

    #[must_use]
    pub fn before_mount(mut self, hook: impl Fn(&Props, &State) + 'static) -> Self {
        self.hooks.before_mount = Some(Box::new(hook));
        self
    }

    #[must_use]
    pub fn after_mount(mut self, hook: impl Fn(&HookContext<'_>) + 'static) -> Self {
        self.hooks.after_mount = Some(Box::new(hook));
        self
    }

    /// Arguments: current props, current state, next props, next state.
    #[must_use]
    pub fn before_update(
        mut self,
        hook: impl Fn(&Props, &State, &Props, &State) + 'static,
    ) -> Self {
        self.hooks.before_update = Some(Box::new(hook));
        self
    }

    #[must_use]
    pub fn after_update(mut self, hook: impl Fn(&HookContext<'_>) + 'static) -> Self {
        self.hooks.after_update = Some(Box::new(hook));
        self
    }

    #[must_use]
    pub fn before_unmount(mut self, hook: impl Fn(&Props, &State) + 'static) -> Self {
        self.hooks.before_unmount = Some(Box::new(hook));
        self
    }

    #[must_use]
    pub fn build(self) -> Component {
        Component(Rc::new(Definition {
            name: self.name,
            hooks: self.hooks,
        }))
    }
}

impl fmt::Debug for ComponentBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentBuilder").field("name", &self.name).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::props::into_state;
    use serde_json::json;
    use std::cell::RefCell;

    #[test]
    fn absent_hooks_fall_back_to_defaults() {
        let bare = Component::builder("Bare").build();
        let props = Props::new();
        let state = bare.initial_state(&props);
        assert!(state.is_empty());
        assert_eq!(bare.render(&props, &state), VirtualNode::Empty);
        assert!(bare.should_update(&props, &state, &props, &state));
    }

    #[test]
    fn identity_is_by_definition() {
        let first = Component::builder("Same").build();
        let second = Component::builder("Same").build();
        assert_eq!(first, first.clone());
        assert_ne!(first, second);
    }

    #[test]
    fn updater_forwards_to_sink() {
        let received: Rc<RefCell<Vec<(InstanceId, State)>>> = Rc::default();
        let log = Rc::clone(&received);
        let updater = Updater::new(
            InstanceId(7),
            Rc::new(move |instance, partial| log.borrow_mut().push((instance, partial))),
        );
        updater.send(into_state(json!({ "text": "Mirror Shield" })));
        let calls = received.borrow();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, InstanceId(7));
        assert_eq!(calls[0].1.get("text"), Some(&json!("Mirror Shield")));
    }
}
