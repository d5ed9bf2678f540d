#![forbid(unsafe_code)]

//! Drop-target registry and hit-testing.
//!
//! One [`DropTargetRegistry`] exists per origin kind. It maps elements to
//! their [`DropTargetArgs`] and answers "which targets is the pointer over".
//!
//! # Hit-testing
//!
//! [`compute_actual_targets`](DropTargetRegistry::compute_actual_targets)
//! walks the explicit chain of marked ancestors innermost-first. An element
//! whose can-drop predicate refuses is skipped, and the walk continues with
//! its ancestors.
//!
//! [`compute_over`](DropTargetRegistry::compute_over) adds stickiness: when
//! the live result is shorter than the previous one, previous records may be
//! retained in the missing inner positions.
//!
//! ```text
//!  previous (outer → inner):  [ board, column, card ]
//!  actual   (outer → inner):  [ board ]
//!  result   (outer → inner):  [ board, column*, card* ]   * = sticky
//! ```
//!
//! # Invariants
//!
//! 1. Results are innermost-first.
//! 2. Stickiness never makes the result longer than `previous`.
//! 3. A sticky record carries the previous data and drop effect verbatim.
//! 4. A sticky record is only kept when every outer position matches
//!    `previous`, the element is still registered, can-drop allows it, and
//!    its sticky predicate holds.
//!
//! # Failure Modes
//!
//! - A marker without a registry entry is skipped (trace log).
//! - Registering the same element twice replaces the first registration.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::rc::Rc;

use crate::cleanup::Cleanup;
use crate::document::{Markers, NodeId, SharedDocument};
use crate::error::Result;
use crate::input::Input;
use crate::logging::{trace, warn};
use crate::types::{
    DragEvent, DropEffect, DropTargetRecord, ElementDragEvent, EventName, OriginKind, TargetData,
};

// ---------------------------------------------------------------------------
// Registration descriptor
// ---------------------------------------------------------------------------

/// What a drop-target predicate sees.
pub struct DropTargetFeedback<'a, S> {
    /// Pointer snapshot.
    pub input: &'a Input,
    /// Source payload of the current session.
    pub source: &'a S,
    /// The registered element being evaluated.
    pub element: NodeId,
}

type FeedbackFn<S, T> = Rc<dyn Fn(&DropTargetFeedback<'_, S>) -> T>;
type ElementHandler<S> = Rc<dyn Fn(&ElementDragEvent<'_, S>)>;

/// Registration record for one drop target.
///
/// Every callback is optional. Absent predicates allow dropping and disable
/// stickiness; absent data yields [`TargetData::empty`]; absent drop effect
/// yields the registry kind's default.
pub struct DropTargetArgs<S> {
    element: NodeId,
    get_data: Option<FeedbackFn<S, TargetData>>,
    can_drop: Option<FeedbackFn<S, bool>>,
    get_drop_effect: Option<FeedbackFn<S, DropEffect>>,
    get_is_sticky: Option<FeedbackFn<S, bool>>,
    on_generate_drag_preview: Option<ElementHandler<S>>,
    on_drag_start: Option<ElementHandler<S>>,
    on_drag: Option<ElementHandler<S>>,
    on_drop_target_change: Option<ElementHandler<S>>,
    on_drag_enter: Option<ElementHandler<S>>,
    on_drag_leave: Option<ElementHandler<S>>,
    on_drop: Option<ElementHandler<S>>,
}

impl<S> fmt::Debug for DropTargetArgs<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DropTargetArgs")
            .field("element", &self.element)
            .field("can_drop", &self.can_drop.is_some())
            .field("sticky", &self.get_is_sticky.is_some())
            .finish_non_exhaustive()
    }
}

impl<S> DropTargetArgs<S> {
    /// Descriptor for `element` with no callbacks.
    #[must_use]
    pub fn new(element: NodeId) -> Self {
        Self {
            element,
            get_data: None,
            can_drop: None,
            get_drop_effect: None,
            get_is_sticky: None,
            on_generate_drag_preview: None,
            on_drag_start: None,
            on_drag: None,
            on_drop_target_change: None,
            on_drag_enter: None,
            on_drag_leave: None,
            on_drop: None,
        }
    }

    /// The registered element.
    #[must_use]
    pub fn element(&self) -> NodeId {
        self.element
    }

    /// Data attached to this target's records.
    #[must_use]
    pub fn with_data(
        mut self,
        f: impl Fn(&DropTargetFeedback<'_, S>) -> TargetData + 'static,
    ) -> Self {
        self.get_data = Some(Rc::new(f));
        self
    }

    /// Whether the current session may drop here.
    #[must_use]
    pub fn with_can_drop(mut self, f: impl Fn(&DropTargetFeedback<'_, S>) -> bool + 'static) -> Self {
        self.can_drop = Some(Rc::new(f));
        self
    }

    /// Drop effect shown while this is the innermost target.
    #[must_use]
    pub fn with_drop_effect(
        mut self,
        f: impl Fn(&DropTargetFeedback<'_, S>) -> DropEffect + 'static,
    ) -> Self {
        self.get_drop_effect = Some(Rc::new(f));
        self
    }

    /// Whether this target stays active after the pointer leaves it.
    #[must_use]
    pub fn with_sticky(mut self, f: impl Fn(&DropTargetFeedback<'_, S>) -> bool + 'static) -> Self {
        self.get_is_sticky = Some(Rc::new(f));
        self
    }

    #[must_use]
    pub fn on_generate_drag_preview(mut self, f: impl Fn(&ElementDragEvent<'_, S>) + 'static) -> Self {
        self.on_generate_drag_preview = Some(Rc::new(f));
        self
    }

    #[must_use]
    pub fn on_drag_start(mut self, f: impl Fn(&ElementDragEvent<'_, S>) + 'static) -> Self {
        self.on_drag_start = Some(Rc::new(f));
        self
    }

    #[must_use]
    pub fn on_drag(mut self, f: impl Fn(&ElementDragEvent<'_, S>) + 'static) -> Self {
        self.on_drag = Some(Rc::new(f));
        self
    }

    #[must_use]
    pub fn on_drop_target_change(mut self, f: impl Fn(&ElementDragEvent<'_, S>) + 'static) -> Self {
        self.on_drop_target_change = Some(Rc::new(f));
        self
    }

    /// Derived from a change event: this target was not in `previous`.
    #[must_use]
    pub fn on_drag_enter(mut self, f: impl Fn(&ElementDragEvent<'_, S>) + 'static) -> Self {
        self.on_drag_enter = Some(Rc::new(f));
        self
    }

    /// Derived from a change event: this target is no longer in `current`.
    #[must_use]
    pub fn on_drag_leave(mut self, f: impl Fn(&ElementDragEvent<'_, S>) + 'static) -> Self {
        self.on_drag_leave = Some(Rc::new(f));
        self
    }

    #[must_use]
    pub fn on_drop(mut self, f: impl Fn(&ElementDragEvent<'_, S>) + 'static) -> Self {
        self.on_drop = Some(Rc::new(f));
        self
    }

    fn feedback<'a>(&self, input: &'a Input, source: &'a S) -> DropTargetFeedback<'a, S> {
        DropTargetFeedback {
            input,
            source,
            element: self.element,
        }
    }

    fn allows_drop(&self, feedback: &DropTargetFeedback<'_, S>) -> bool {
        self.can_drop.as_ref().is_none_or(|f| f(feedback))
    }

    fn is_sticky(&self, feedback: &DropTargetFeedback<'_, S>) -> bool {
        self.get_is_sticky.as_ref().is_some_and(|f| f(feedback))
    }

    fn handler(&self, name: EventName) -> Option<&ElementHandler<S>> {
        match name {
            EventName::GenerateDragPreview => self.on_generate_drag_preview.as_ref(),
            EventName::DragStart => self.on_drag_start.as_ref(),
            EventName::Drag => self.on_drag.as_ref(),
            EventName::DropTargetChange => self.on_drop_target_change.as_ref(),
            EventName::Drop => self.on_drop.as_ref(),
        }
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

struct Registration<S> {
    handle: u64,
    args: Rc<DropTargetArgs<S>>,
}

/// Live registry of drop targets for one origin kind.
pub struct DropTargetRegistry<S> {
    kind: OriginKind,
    marker: Markers,
    default_drop_effect: DropEffect,
    document: SharedDocument,
    entries: RefCell<HashMap<NodeId, Registration<S>>>,
    next_handle: Cell<u64>,
}

impl<S> fmt::Debug for DropTargetRegistry<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DropTargetRegistry")
            .field("kind", &self.kind)
            .field("len", &self.len())
            .finish()
    }
}

impl<S> DropTargetRegistry<S> {
    /// Number of registered targets.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    /// True when nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    /// Whether `element` currently has a registration.
    #[must_use]
    pub fn is_registered(&self, element: NodeId) -> bool {
        self.entries.borrow().contains_key(&element)
    }
}

impl<S: 'static> DropTargetRegistry<S> {
    /// Empty registry for `kind` over `document`.
    #[must_use]
    pub fn new(kind: OriginKind, default_drop_effect: DropEffect, document: SharedDocument) -> Rc<Self> {
        Rc::new(Self {
            kind,
            marker: Markers::drop_target(kind),
            default_drop_effect,
            document,
            entries: RefCell::new(HashMap::new()),
            next_handle: Cell::new(0),
        })
    }

    /// Origin kind served by this registry.
    #[must_use]
    pub fn kind(&self) -> OriginKind {
        self.kind
    }

    /// Register a drop target.
    ///
    /// Marks the element and stores the descriptor. Running the returned
    /// cleanup removes both, unless a later registration for the same element
    /// has replaced this one.
    pub fn register(self: &Rc<Self>, args: DropTargetArgs<S>) -> Result<Cleanup> {
        let element = args.element;
        self.document.borrow_mut().set_marker(element, self.marker)?;

        let handle = self.next_handle.get();
        self.next_handle.set(handle + 1);
        let replaced = self
            .entries
            .borrow_mut()
            .insert(
                element,
                Registration {
                    handle,
                    args: Rc::new(args),
                },
            )
            .is_some();
        if replaced {
            warn!(
                kind = self.kind.as_str(),
                element = element.raw(),
                "drop target registered twice; replacing the earlier registration"
            );
        }

        let registry = Rc::downgrade(self);
        Ok(Cleanup::new(move || {
            if let Some(registry) = registry.upgrade() {
                registry.unregister(element, handle);
            }
        }))
    }

    fn unregister(&self, element: NodeId, handle: u64) {
        let removed = {
            let mut entries = self.entries.borrow_mut();
            match entries.get(&element) {
                Some(entry) if entry.handle == handle => entries.remove(&element),
                _ => None,
            }
        };
        if removed.is_some() {
            self.document.borrow_mut().remove_marker(element, self.marker);
        }
    }

    fn lookup(&self, element: NodeId) -> Option<Rc<DropTargetArgs<S>>> {
        self.entries
            .borrow()
            .get(&element)
            .map(|entry| Rc::clone(&entry.args))
    }

    // -----------------------------------------------------------------------
    // Hit-testing
    // -----------------------------------------------------------------------

    /// Genuine targets under `hit`, innermost first.
    pub fn compute_actual_targets(
        &self,
        hit: Option<NodeId>,
        input: &Input,
        source: &S,
    ) -> Vec<DropTargetRecord> {
        let Some(hit) = hit else {
            return Vec::new();
        };
        // Collected up front so no document borrow is held during callbacks.
        let chain = self.document.borrow().marked_ancestors(hit, self.marker);

        let mut result = Vec::with_capacity(chain.len());
        for element in chain {
            let Some(args) = self.lookup(element) else {
                trace!(element = element.raw(), "marked element has no registration");
                continue;
            };
            let feedback = args.feedback(input, source);
            if !args.allows_drop(&feedback) {
                continue;
            }
            let data = args
                .get_data
                .as_ref()
                .map_or_else(TargetData::empty, |f| f(&feedback));
            let drop_effect = args
                .get_drop_effect
                .as_ref()
                .map_or(self.default_drop_effect, |f| f(&feedback));
            result.push(DropTargetRecord::new(element, data, drop_effect));
        }
        result
    }

    /// Targets the pointer is over, with stickiness applied against
    /// `previous`. Innermost first.
    pub fn compute_over(
        &self,
        hit: Option<NodeId>,
        input: &Input,
        source: &S,
        previous: &[DropTargetRecord],
    ) -> Vec<DropTargetRecord> {
        let actual = self.compute_actual_targets(hit, input, source);
        if actual.len() >= previous.len() {
            return actual;
        }

        // Outermost first.
        let last: Vec<&DropTargetRecord> = previous.iter().rev().collect();
        let mut fresh = actual.into_iter().rev();
        let mut result: Vec<DropTargetRecord> = Vec::with_capacity(last.len());

        for (index, prev) in last.iter().enumerate() {
            if let Some(record) = fresh.next() {
                result.push(record);
                continue;
            }

            let parent = index.checked_sub(1).map(|i| result[i].element);
            let last_parent = index.checked_sub(1).map(|i| last[i].element);
            if parent != last_parent {
                break;
            }
            let Some(args) = self.lookup(prev.element) else {
                break;
            };
            let feedback = args.feedback(input, source);
            if !args.allows_drop(&feedback) || !args.is_sticky(&feedback) {
                break;
            }
            let mut sticky = (*prev).clone();
            sticky.is_active_due_to_stickiness = true;
            result.push(sticky);
        }

        result.reverse();
        result
    }

    // -----------------------------------------------------------------------
    // Dispatch
    // -----------------------------------------------------------------------

    /// Deliver a lifecycle event to the affected targets.
    ///
    /// Registrations are looked up at delivery time, so a target removed by
    /// an earlier callback is skipped.
    pub fn dispatch(&self, event: &DragEvent<S>) {
        if event.name != EventName::DropTargetChange {
            for record in &event.location.current.drop_targets {
                self.deliver(event.name, event, record, None);
            }
            return;
        }

        let current: HashSet<NodeId> = event
            .location
            .current
            .drop_targets
            .iter()
            .map(|r| r.element)
            .collect();
        let mut visited = HashSet::new();

        for record in &event.location.previous.drop_targets {
            visited.insert(record.element);
            let derived = (!current.contains(&record.element)).then_some(Derived::Leave);
            self.deliver(EventName::DropTargetChange, event, record, derived);
        }
        for record in &event.location.current.drop_targets {
            if visited.contains(&record.element) {
                continue;
            }
            self.deliver(EventName::DropTargetChange, event, record, Some(Derived::Enter));
        }
    }

    fn deliver(
        &self,
        name: EventName,
        event: &DragEvent<S>,
        record: &DropTargetRecord,
        derived: Option<Derived>,
    ) {
        let ev = ElementDragEvent { event, this: record };
        if let Some(f) = self.lookup(record.element).and_then(|a| a.handler(name).cloned()) {
            f(&ev);
        }
        let Some(derived) = derived else {
            return;
        };
        // Looked up again: the change handler may have unregistered it.
        let derived_handler = self.lookup(record.element).and_then(|a| match derived {
            Derived::Enter => a.on_drag_enter.clone(),
            Derived::Leave => a.on_drag_leave.clone(),
        });
        if let Some(f) = derived_handler {
            f(&ev);
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Derived {
    Enter,
    Leave,
}
