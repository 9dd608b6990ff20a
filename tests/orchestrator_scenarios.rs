//! Orchestrator behaviour driven directly through the event handler seam
//!
//! The engine here only counts how often it is asked to continue, so every
//! test can check that each step resumes it exactly once.

use kataribe::{
    Command, CommandError, CompletionToken, DialogueConfig, DialogueError, DialogueEventHandler,
    DialogueOption, DialogueOrchestrator, DialogueView, FunctionLibrary, InMemoryVariableStorage,
    Line, LineStatus, LocalizedLine, LocalizedOption, NextAction, OptionId, OptionSelector,
    OptionSet, ParamKind, ParamSpec, ResumeHandle, ScriptEngine, Value, VariableStorage,
};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct CountingEngine {
    continues: AtomicUsize,
    selected: Mutex<Vec<OptionId>>,
    stopped: AtomicBool,
    library: Mutex<Option<(Arc<dyn VariableStorage>, Arc<FunctionLibrary>)>>,
}

impl CountingEngine {
    fn continues(&self) -> usize {
        self.continues.load(Ordering::SeqCst)
    }
}

impl ScriptEngine for CountingEngine {
    fn continue_dialogue(&self) {
        self.continues.fetch_add(1, Ordering::SeqCst);
    }

    fn set_selected_option(&self, id: OptionId) {
        self.selected.lock().unwrap().push(id);
    }

    fn set_node(&self, node: &str) -> Result<(), DialogueError> {
        if self.node_exists(node) {
            Ok(())
        } else {
            Err(DialogueError::unknown_node(node))
        }
    }

    fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    fn node_exists(&self, node: &str) -> bool {
        node == "Start"
    }

    fn current_node(&self) -> Option<String> {
        Some("Start".to_string())
    }

    fn bind_library(&self, variables: Arc<dyn VariableStorage>, functions: Arc<FunctionLibrary>) {
        *self.library.lock().unwrap() = Some((variables, functions));
    }
}

/// Completes tokens inline, or holds them until `release` when `holding`
#[derive(Default)]
struct TestView {
    holding: bool,
    held: Mutex<Vec<CompletionToken>>,
    statuses: Mutex<Vec<LineStatus>>,
    presented: Mutex<Vec<String>>,
    selector: Mutex<Option<OptionSelector>>,
    offered: Mutex<Vec<LocalizedOption>>,
    completed: AtomicUsize,
}

impl TestView {
    fn holding() -> Arc<Self> {
        Arc::new(Self {
            holding: true,
            ..Self::default()
        })
    }

    fn inline() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn settle(&self, token: CompletionToken) {
        if self.holding {
            self.held.lock().unwrap().push(token);
        } else {
            token.complete();
        }
    }

    fn release(&self) {
        let tokens: Vec<_> = self.held.lock().unwrap().drain(..).collect();
        for token in tokens {
            token.complete();
        }
    }

    fn statuses(&self) -> Vec<LineStatus> {
        self.statuses.lock().unwrap().clone()
    }

    fn select(&self, id: OptionId) -> Result<(), DialogueError> {
        let selector = self.selector.lock().unwrap().clone().expect("options were offered");
        selector.select(id)
    }
}

impl DialogueView for TestView {
    fn run_line(&self, line: &LocalizedLine, on_done: CompletionToken) {
        self.presented.lock().unwrap().push(line.text.clone());
        self.settle(on_done);
    }

    fn line_status_changed(&self, line: &LocalizedLine) {
        self.statuses.lock().unwrap().push(line.status);
    }

    fn dismiss_line(&self, _line: &LocalizedLine, on_done: CompletionToken) {
        self.settle(on_done);
    }

    fn run_options(&self, options: &[LocalizedOption], selector: OptionSelector) {
        *self.offered.lock().unwrap() = options.to_vec();
        *self.selector.lock().unwrap() = Some(selector);
    }

    fn dialogue_complete(&self) {
        self.completed.fetch_add(1, Ordering::SeqCst);
    }
}

fn orchestrator(
    config: DialogueConfig,
    views: &[Arc<TestView>],
) -> (DialogueOrchestrator, Arc<CountingEngine>) {
    let engine = Arc::new(CountingEngine::default());
    let builder = DialogueOrchestrator::builder(engine.clone())
        .config(config)
        .variable_storage(Arc::new(InMemoryVariableStorage::new()));
    let builder = views
        .iter()
        .fold(builder, |builder, view| builder.view(view.clone()));
    (builder.build(), engine)
}

fn option_set() -> OptionSet {
    OptionSet::new(vec![
        DialogueOption::new(0, Line::new("opt:a", "Ask about the lighthouse")),
        DialogueOption::new(1, Line::new("opt:b", "Swim across")).disabled(),
    ])
}

#[test]
fn line_waits_for_every_view_then_resumes_once() {
    let fast = TestView::inline();
    let slow = TestView::holding();
    let (dialogue, engine) = orchestrator(DialogueConfig::default(), &[fast.clone(), slow.clone()]);

    assert_eq!(dialogue.on_line(Line::new("l1", "Hello")), NextAction::Wait);
    assert_eq!(dialogue.current_line().unwrap().status, LineStatus::Running);

    slow.release();
    assert_eq!(dialogue.current_line().unwrap().status, LineStatus::Delivered);
    assert_eq!(fast.statuses(), [LineStatus::Delivered]);

    dialogue.request_next_line().unwrap();
    assert_eq!(fast.statuses(), [LineStatus::Delivered, LineStatus::Ended]);
    assert_eq!(engine.continues(), 0, "dismissal still pending on the slow view");

    slow.release();
    assert_eq!(engine.continues(), 1);
    assert!(dialogue.current_line().is_none());

    assert!(matches!(dialogue.request_next_line(), Err(DialogueError::Misuse { .. })));
    assert_eq!(engine.continues(), 1);
}

#[test]
fn proceed_while_running_interrupts() {
    let view = TestView::holding();
    let (dialogue, engine) = orchestrator(DialogueConfig::default(), &[view.clone()]);

    dialogue.on_line(Line::new("l1", "A long line"));
    dialogue.request_next_line().unwrap();
    assert_eq!(view.statuses(), [LineStatus::Interrupted]);

    view.release();
    assert_eq!(view.statuses(), [LineStatus::Interrupted, LineStatus::Delivered]);

    dialogue.request_next_line().unwrap();
    view.release();
    assert_eq!(
        view.statuses(),
        [LineStatus::Interrupted, LineStatus::Delivered, LineStatus::Ended]
    );
    assert_eq!(engine.continues(), 1);
}

#[test]
fn second_proceed_forces_dismissal() {
    let view = TestView::holding();
    let (dialogue, engine) = orchestrator(DialogueConfig::default(), &[view.clone()]);

    dialogue.on_line(Line::new("l1", "A long line"));
    dialogue.request_next_line().unwrap();
    dialogue.request_next_line().unwrap();
    assert_eq!(view.statuses(), [LineStatus::Interrupted, LineStatus::Ended]);

    // Releases the stale presentation token and the dismissal token
    view.release();
    assert_eq!(view.statuses(), [LineStatus::Interrupted, LineStatus::Ended]);
    assert_eq!(engine.continues(), 1);
}

#[test]
fn auto_advance_dismisses_without_proceed() {
    let view = TestView::inline();
    let config = DialogueConfig {
        auto_advance_lines: true,
        ..DialogueConfig::default()
    };
    let (dialogue, engine) = orchestrator(config, &[view.clone()]);

    dialogue.on_line(Line::new("l1", "Hello"));
    assert_eq!(engine.continues(), 1);
    assert_eq!(view.statuses(), [LineStatus::Delivered, LineStatus::Ended]);
}

#[test]
fn empty_view_slots_are_skipped() {
    let engine = Arc::new(CountingEngine::default());
    let dialogue = DialogueOrchestrator::builder(engine.clone())
        .config(DialogueConfig {
            auto_advance_lines: true,
            ..DialogueConfig::default()
        })
        .view_slot(None)
        .view(TestView::inline())
        .view_slot(None)
        .build();

    dialogue.on_line(Line::new("l1", "Hello"));
    assert_eq!(engine.continues(), 1);
}

#[test]
fn option_selection_is_validated_and_accepted_once() {
    let view = TestView::inline();
    let (dialogue, engine) = orchestrator(DialogueConfig::default(), &[view.clone()]);

    assert_eq!(dialogue.on_options(option_set()), NextAction::Wait);
    assert_eq!(view.offered.lock().unwrap().len(), 2);

    assert!(matches!(view.select(7), Err(DialogueError::UnknownOption { id: 7 })));
    assert!(matches!(view.select(1), Err(DialogueError::OptionUnavailable { id: 1 })));
    assert_eq!(engine.continues(), 0);
    assert!(dialogue.current_options().is_some());

    view.select(0).unwrap();
    assert_eq!(*engine.selected.lock().unwrap(), [0]);
    assert_eq!(engine.continues(), 1);
    assert!(dialogue.current_options().is_none());

    assert!(matches!(view.select(0), Err(DialogueError::Misuse { .. })));
    assert_eq!(engine.continues(), 1);
}

#[test]
fn selected_option_can_run_as_a_line() {
    let view = TestView::holding();
    let config = DialogueConfig {
        run_selected_option_as_line: true,
        ..DialogueConfig::default()
    };
    let (dialogue, engine) = orchestrator(config, &[view.clone()]);

    dialogue.on_options(option_set());
    view.select(0).unwrap();
    assert_eq!(*engine.selected.lock().unwrap(), [0]);
    assert_eq!(engine.continues(), 0);
    assert_eq!(*view.presented.lock().unwrap(), ["Ask about the lighthouse"]);

    view.release();
    dialogue.request_next_line().unwrap();
    view.release();
    assert_eq!(engine.continues(), 1);
}

#[test]
fn options_supersede_an_unfinished_line() {
    let view = TestView::holding();
    let (dialogue, engine) = orchestrator(DialogueConfig::default(), &[view.clone()]);

    dialogue.on_line(Line::new("l1", "Interrupted by choices"));
    dialogue.on_options(option_set());

    // The stale presentation token completes into nothing
    view.release();
    assert!(view.statuses().is_empty());
    assert_eq!(engine.continues(), 0);

    view.select(0).unwrap();
    assert_eq!(engine.continues(), 1);
}

#[test]
fn unhandled_command_reaches_the_listener_verbatim() {
    let (dialogue, engine) = orchestrator(DialogueConfig::default(), &[TestView::inline()]);
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    dialogue.on_unhandled_command(move |text| sink.lock().unwrap().push(text.to_string()));

    assert_eq!(dialogue.on_command(Command::new("<<unknown_cmd>>")), NextAction::Next);
    assert_eq!(*seen.lock().unwrap(), ["unknown_cmd"]);
    assert_eq!(engine.continues(), 0);
}

#[test]
fn pausing_handler_that_resumes_inline_does_not_pause() {
    let (dialogue, engine) = orchestrator(DialogueConfig::default(), &[TestView::inline()]);
    dialogue
        .add_pausing_command_handler("jump", vec![], |_, resume: ResumeHandle| resume.resume())
        .unwrap();

    assert_eq!(dialogue.on_command(Command::new("jump")), NextAction::Next);
    assert_eq!(engine.continues(), 0);
}

#[test]
fn pausing_handler_resumes_the_engine_exactly_once() {
    let (dialogue, engine) = orchestrator(DialogueConfig::default(), &[TestView::inline()]);
    let held: Arc<Mutex<Option<ResumeHandle>>> = Arc::new(Mutex::new(None));
    let slot = held.clone();
    dialogue
        .add_pausing_command_handler(
            "wait",
            vec![ParamSpec::required(ParamKind::Float)],
            move |_, resume| {
                *slot.lock().unwrap() = Some(resume);
            },
        )
        .unwrap();

    assert_eq!(dialogue.on_command(Command::new("wait 2")), NextAction::Wait);
    assert_eq!(engine.continues(), 0);

    let resume = held.lock().unwrap().take().unwrap();
    resume.resume();
    resume.resume();
    assert_eq!(engine.continues(), 1);
}

#[test]
fn duplicate_handler_keeps_the_first() {
    let (dialogue, _engine) = orchestrator(DialogueConfig::default(), &[TestView::inline()]);
    let calls = Arc::new(AtomicUsize::new(0));
    let first = calls.clone();
    dialogue
        .add_command_handler("shake", vec![], move |_| {
            first.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

    let err = dialogue.add_command_handler("shake", vec![], |_| {}).unwrap_err();
    assert_eq!(err, CommandError::duplicate("shake"));

    dialogue.on_command(Command::new("shake"));
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    dialogue.remove_command_handler("shake");
    dialogue.add_command_handler("shake", vec![], |_| {}).unwrap();
}

#[test]
fn handler_arity_is_enforced() {
    let (dialogue, _engine) = orchestrator(DialogueConfig::default(), &[TestView::inline()]);
    let calls = Arc::new(Mutex::new(Vec::new()));
    let sink = calls.clone();
    dialogue
        .add_command_handler(
            "cmd",
            vec![ParamSpec::required(ParamKind::Text), ParamSpec::required(ParamKind::Text)],
            move |args| {
                let words: Vec<String> = args
                    .iter()
                    .filter_map(|a| a.as_text())
                    .map(String::from)
                    .collect();
                sink.lock().unwrap().push(words.join(" "));
            },
        )
        .unwrap();

    for text in ["cmd a", "cmd a b c", "cmd a b"] {
        assert_eq!(dialogue.on_command(Command::new(text)), NextAction::Next);
    }
    assert_eq!(*calls.lock().unwrap(), ["a b"]);
}

#[test]
fn start_requires_views_storage_and_a_known_node() {
    let engine = Arc::new(CountingEngine::default());
    let no_views = DialogueOrchestrator::builder(engine.clone())
        .variable_storage(Arc::new(InMemoryVariableStorage::new()))
        .build();
    assert!(matches!(no_views.start(), Err(DialogueError::MissingViews)));

    let no_storage = DialogueOrchestrator::builder(engine.clone())
        .view(TestView::inline())
        .build();
    assert!(matches!(no_storage.start(), Err(DialogueError::MissingVariableStorage)));

    let (dialogue, engine) = orchestrator(DialogueConfig::default(), &[TestView::inline()]);
    assert!(matches!(
        dialogue.start_dialogue("Elsewhere"),
        Err(DialogueError::UnknownNode { .. })
    ));
    assert_eq!(engine.continues(), 0);
    assert!(!dialogue.is_running());
}

#[test]
fn start_then_stop() {
    let view = TestView::inline();
    let (dialogue, engine) = orchestrator(DialogueConfig::default(), &[view.clone()]);

    dialogue.start().unwrap();
    assert!(dialogue.is_running());
    assert_eq!(engine.continues(), 1);
    assert!(matches!(dialogue.start(), Err(DialogueError::Misuse { .. })));

    dialogue.stop();
    assert!(engine.stopped.load(Ordering::SeqCst));
    assert!(!dialogue.is_running());
    assert_eq!(view.completed.load(Ordering::SeqCst), 1);

    dialogue.stop();
    assert_eq!(dialogue.on_dialogue_complete(), NextAction::Next);
    assert_eq!(view.completed.load(Ordering::SeqCst), 1);
}

#[test]
fn start_binds_storage_and_functions_to_the_engine() {
    let (dialogue, engine) = orchestrator(DialogueConfig::default(), &[TestView::inline()]);
    dialogue
        .add_function("twice", 1, |args| {
            Value::Number(args[0].as_number().unwrap_or_default() * 2.0)
        })
        .unwrap();
    assert!(engine.library.lock().unwrap().is_none());

    dialogue.start().unwrap();

    let (variables, functions) = engine.library.lock().unwrap().clone().unwrap();
    variables.set("$seen", true.into()).unwrap();
    assert_eq!(
        dialogue.variable_storage().unwrap().get("$seen"),
        Some(Value::Bool(true))
    );
    assert_eq!(
        functions.call("twice", &[Value::Number(4.0)]),
        Some(Value::Number(8.0))
    );
}
