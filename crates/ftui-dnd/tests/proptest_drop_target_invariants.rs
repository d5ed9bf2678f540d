//! Property-based invariant tests for drop-target hit-testing and sessions.
//!
//! 1. Genuine hits are innermost-first and exclude refused targets.
//! 2. Stickiness never lengthens the result past `previous`.
//! 3. Sticky records sit innermost, reuse previous data, and the remaining
//!    records equal the genuine hit.
//! 4. Every session publishes exactly one drop, last.
//! 5. `previous` of each published event equals `current` of the one before.
//! 6. Registration churn never leaves a refused target in a genuine hit.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use ftui_dnd::{
    Adapter, AdapterConfig, Cleanup, Document, DragDropContext, DragEvent, DragType, DropEffect,
    DropTargetArgs, DropTargetRecord, DropTargetRegistry, EventName, EventSink, Input,
    ManualFrameClock, MonitorArgs, MouseButtons, NativeEvent, NativeEventKind, NodeId, OriginKind,
    SharedDocument, TargetData, Window,
};
use proptest::prelude::*;

// ── Helpers ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
struct Flags {
    registered: bool,
    can_drop: bool,
    sticky: bool,
}

fn flags_strategy() -> impl Strategy<Value = Flags> {
    (any::<bool>(), any::<bool>(), any::<bool>()).prop_map(|(registered, can_drop, sticky)| Flags {
        registered,
        can_drop,
        sticky,
    })
}

fn chain_strategy() -> impl Strategy<Value = Vec<Flags>> {
    prop::collection::vec(flags_strategy(), 1..12)
}

/// A straight chain `root > e0 > e1 > ...`; returns the elements outermost first.
fn chain(doc: &SharedDocument, depth: usize) -> Vec<NodeId> {
    let mut doc = doc.borrow_mut();
    let mut parent = doc.root();
    let mut nodes = Vec::with_capacity(depth);
    for _ in 0..depth {
        parent = doc.append_element(parent).unwrap();
        nodes.push(parent);
    }
    nodes
}

fn register_chain(
    registry: &Rc<DropTargetRegistry<()>>,
    nodes: &[NodeId],
    flags: &[Flags],
) -> Vec<Cleanup> {
    nodes
        .iter()
        .zip(flags)
        .filter(|(_, f)| f.registered)
        .map(|(node, f)| {
            let (can_drop, sticky, depth) = (f.can_drop, f.sticky, node.raw());
            registry
                .register(
                    DropTargetArgs::new(*node)
                        .with_can_drop(move |_| can_drop)
                        .with_sticky(move |_| sticky)
                        .with_data(move |_| TargetData::new(depth)),
                )
                .unwrap()
        })
        .collect()
}

fn elements(records: &[DropTargetRecord]) -> Vec<NodeId> {
    records.iter().map(|r| r.element).collect()
}

fn forward(sink: &EventSink<()>) -> impl Fn(&DragEvent<()>) + 'static {
    let sink = Rc::clone(sink);
    move |ev| sink(ev)
}

fn registry() -> (SharedDocument, Rc<DropTargetRegistry<()>>) {
    let doc = Document::shared();
    let registry = DropTargetRegistry::new(OriginKind::Element, DropEffect::Move, Rc::clone(&doc));
    (doc, registry)
}

// ═════════════════════════════════════════════════════════════════════════
// 1. Genuine hits are innermost-first and exclude refused targets
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn actual_targets_innermost_first(flags in chain_strategy(), hit in 0usize..12) {
        let (doc, registry) = registry();
        let nodes = chain(&doc, flags.len());
        let _cleanups = register_chain(&registry, &nodes, &flags);
        let hit = hit.min(nodes.len() - 1);

        let found = registry.compute_actual_targets(Some(nodes[hit]), &Input::default(), &());
        let expected: Vec<NodeId> = (0..=hit)
            .rev()
            .filter(|&i| flags[i].registered && flags[i].can_drop)
            .map(|i| nodes[i])
            .collect();
        prop_assert_eq!(elements(&found), expected);
        prop_assert!(found.iter().all(|r| !r.is_active_due_to_stickiness));
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 2 & 3. Stickiness shape
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn stickiness_only_fills_inner_positions(
        flags in chain_strategy(),
        first in 0usize..12,
        second in prop::option::of(0usize..12),
    ) {
        let (doc, registry) = registry();
        let nodes = chain(&doc, flags.len());
        let _cleanups = register_chain(&registry, &nodes, &flags);
        let first = first.min(nodes.len() - 1);
        let second = second.map(|s| nodes[s.min(nodes.len() - 1)]);

        let previous = registry.compute_over(Some(nodes[first]), &Input::default(), &(), &[]);
        let actual = registry.compute_actual_targets(second, &Input::default(), &());
        let over = registry.compute_over(second, &Input::default(), &(), &previous);

        if actual.len() >= previous.len() {
            prop_assert_eq!(elements(&over), elements(&actual));
            return Ok(());
        }

        prop_assert!(over.len() <= previous.len());
        prop_assert!(over.len() >= actual.len());

        let sticky = over.len() - actual.len();
        prop_assert_eq!(elements(&over[sticky..]), elements(&actual));
        for record in &over[..sticky] {
            prop_assert!(record.is_active_due_to_stickiness);
            let prior = previous.iter().find(|p| p.element == record.element);
            prop_assert!(prior.is_some(), "sticky record not in previous");
            if let Some(prior) = prior {
                prop_assert!(record.data.ptr_eq(&prior.data));
                prop_assert_eq!(record.drop_effect, prior.drop_effect);
            }
        }
        prop_assert!(over[sticky..].iter().all(|r| !r.is_active_due_to_stickiness));
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 4 & 5. Session transcripts
// ═════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone)]
enum Step {
    Enter(usize),
    Over(usize),
    OverNothing,
    LeaveWindow,
    IdleMove,
    PointerDown,
    Drop(usize),
    Frame,
}

fn step_strategy() -> impl Strategy<Value = Step> {
    prop_oneof![
        3 => (0usize..6).prop_map(Step::Enter),
        5 => (0usize..6).prop_map(Step::Over),
        1 => Just(Step::OverNothing),
        1 => Just(Step::LeaveWindow),
        2 => Just(Step::IdleMove),
        1 => Just(Step::PointerDown),
        1 => (0usize..6).prop_map(Step::Drop),
        4 => Just(Step::Frame),
    ]
}

type Published = Rc<RefCell<Vec<(EventName, Vec<NodeId>, Vec<NodeId>)>>>;

fn run_session(flags: &[Flags], steps: &[Step]) -> (Published, bool) {
    let clock = ManualFrameClock::new();
    let ctx = DragDropContext::new(Window::new(), Document::shared(), clock.clone());
    let adapter = Adapter::<()>::new(&ctx, AdapterConfig::new(OriginKind::Element));
    let nodes = chain(ctx.document(), flags.len());
    let _registrations: Vec<Cleanup> = register_chain(adapter.drop_targets(), &nodes, flags);

    let log: Published = Rc::new(RefCell::new(Vec::new()));
    let l = Rc::clone(&log);
    let push: EventSink<()> = Rc::new(move |ev: &DragEvent<()>| {
        l.borrow_mut().push((
            ev.name,
            elements(&ev.location.current.drop_targets),
            elements(&ev.location.previous.drop_targets),
        ));
    });
    let _monitor = adapter.monitor_for(
        MonitorArgs::new()
            .on_generate_drag_preview(forward(&push))
            .on_drag_start(forward(&push))
            .on_drag(forward(&push))
            .on_drop_target_change(forward(&push))
            .on_drop(forward(&push)),
    );

    let held = Input::at(1.0, 1.0).with_buttons(MouseButtons::PRIMARY);
    let node = |i: usize| nodes[i.min(nodes.len() - 1)];
    let fire = |kind: NativeEventKind, target: Option<NodeId>, input: Input| {
        let mut ev = NativeEvent::new(kind, input);
        ev.target = target;
        ctx.window().dispatch(&mut ev);
    };

    let mut start = NativeEvent::new(NativeEventKind::DragStart, held);
    start.target = Some(node(0));
    adapter.start(&mut start, DragType::new(OriginKind::Element, ()));

    for step in steps {
        match step {
            Step::Enter(i) => fire(NativeEventKind::DragEnter, Some(node(*i)), held),
            Step::Over(i) => fire(NativeEventKind::DragOver, Some(node(*i)), held),
            Step::OverNothing => fire(NativeEventKind::DragOver, None, held),
            Step::LeaveWindow => fire(NativeEventKind::DragLeave, None, held),
            Step::IdleMove => fire(NativeEventKind::PointerMove, None, Input::default()),
            Step::PointerDown => fire(NativeEventKind::PointerDown, None, held),
            Step::Drop(i) => fire(NativeEventKind::Drop, Some(node(*i)), held),
            Step::Frame => {
                clock.advance_frame();
            }
        }
    }
    fire(NativeEventKind::DragEnd, None, held);
    clock.advance_frame();

    (log, adapter.can_start())
}

proptest! {
    #[test]
    fn exactly_one_drop_and_it_is_last(
        flags in prop::collection::vec(flags_strategy(), 1..6),
        steps in prop::collection::vec(step_strategy(), 0..40),
    ) {
        let (log, idle) = run_session(&flags, &steps);
        let log = log.borrow();
        let drops = log.iter().filter(|(n, _, _)| *n == EventName::Drop).count();
        prop_assert_eq!(drops, 1);
        prop_assert_eq!(log.last().map(|(n, _, _)| *n), Some(EventName::Drop));
        prop_assert!(idle, "session flag left set");
    }

    #[test]
    fn previous_chain_is_unbroken(
        flags in prop::collection::vec(flags_strategy(), 1..6),
        steps in prop::collection::vec(step_strategy(), 0..40),
    ) {
        let (log, _) = run_session(&flags, &steps);
        let log = log.borrow();
        prop_assert_eq!(log[0].0, EventName::GenerateDragPreview);
        prop_assert_eq!(log[1].0, EventName::DragStart);
        prop_assert!(log[0].2.is_empty());
        prop_assert!(log[1].2.is_empty());
        for pair in log[1..].windows(2) {
            prop_assert_eq!(&pair[1].2, &pair[0].1);
        }
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 6. Registration churn
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn churn_never_publishes_refused_genuine_targets(
        ops in prop::collection::vec((0usize..6, any::<bool>(), any::<bool>()), 1..30),
    ) {
        let (doc, registry) = registry();
        let nodes = chain(&doc, 6);
        let allowed: Vec<Rc<Cell<bool>>> = (0..6).map(|_| Rc::new(Cell::new(true))).collect();
        let mut held: Vec<Option<Cleanup>> = (0..6).map(|_| None).collect();
        let mut previous = Vec::new();

        for (index, register, allow) in ops {
            allowed[index].set(allow);
            match (register, held[index].take()) {
                (true, None) => {
                    let gate = Rc::clone(&allowed[index]);
                    held[index] = Some(
                        registry
                            .register(DropTargetArgs::new(nodes[index]).with_can_drop(move |_| gate.get()))
                            .unwrap(),
                    );
                }
                (true, Some(existing)) => held[index] = Some(existing),
                (false, Some(existing)) => existing.run(),
                (false, None) => {}
            }

            let over = registry.compute_over(Some(nodes[5]), &Input::default(), &(), &previous);
            for (position, record) in over.iter().enumerate() {
                let depth = nodes.iter().position(|n| *n == record.element).unwrap();
                if !record.is_active_due_to_stickiness {
                    prop_assert!(allowed[depth].get());
                    prop_assert!(registry.is_registered(record.element));
                }
                if let Some(outer) = over.get(position + 1) {
                    let outer_depth = nodes.iter().position(|n| *n == outer.element).unwrap();
                    prop_assert!(outer_depth < depth, "not innermost-first");
                }
            }
            previous = over;
        }
    }
}
