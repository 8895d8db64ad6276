//! Property tests: transitions over random action sequences.
//!
//! Every accepted action appends exactly one entry and keeps the hash chain
//! intact; actors outside the current stage never move an application.

use certflow_engine::{NextStage, StageRegistry, WorkflowEngine};
use certflow_types::{
    Actor, ApplicantDetails, Application, ApplicationState, ReviewAction, Role, Stage, Status,
    WorkflowError,
};
use chrono::{Duration, TimeZone, Utc};
use proptest::prelude::*;

// ---------------------------------------------------------------------------
// Helpers / Strategies
// ---------------------------------------------------------------------------

fn arb_role() -> impl Strategy<Value = Role> {
    prop::sample::select(Role::ALL.to_vec())
}

/// Actions an officer might send, with and without usable text
fn arb_action() -> impl Strategy<Value = ReviewAction> {
    prop_oneof![
        4 => Just(ReviewAction::approve()),
        1 => prop_oneof![Just(""), Just("document mismatch")].prop_map(|r| ReviewAction::reject(r)),
        2 => prop_oneof![Just(""), Just("verify address")]
            .prop_map(|d| ReviewAction::request_recheck(d)),
        2 => Just(ReviewAction::complete_recheck()),
        1 => "[a-z ]{0,20}".prop_map(|r| ReviewAction::submit_report(r)),
    ]
}

fn arb_steps() -> impl Strategy<Value = Vec<(Role, ReviewAction)>> {
    prop::collection::vec((arb_role(), arb_action()), 0..30)
}

fn actor_for(role: Role) -> Actor {
    Actor::new(format!("{}-1", role.as_str().to_lowercase()), "Actor", role)
}

fn fresh(engine: &WorkflowEngine) -> Application {
    let applicant = Actor::new("applicant-1", "Lakshmi Devi", Role::Applicant);
    let at = Utc.with_ymd_and_hms(2026, 1, 5, 9, 0, 0).unwrap();
    engine
        .open(
            &applicant,
            ApplicantDetails::new("Lakshmi Devi", "123412341234", "BC-A"),
            at,
        )
        .unwrap()
}

/// Replay steps, keeping only accepted transitions
fn replay(engine: &WorkflowEngine, steps: &[(Role, ReviewAction)]) -> Application {
    let mut app = fresh(engine);
    for (i, (role, action)) in steps.iter().enumerate() {
        let at = app.created_at + Duration::minutes(i as i64 + 1);
        if let Ok(t) = engine.apply(&app, &actor_for(*role), action, at) {
            app = t.application;
        }
    }
    app
}

/// Close any outstanding recheck so the holding stage can act again
fn settle(engine: &WorkflowEngine, app: Application) -> Application {
    match app.outstanding_recheck().map(|r| r.raised_by) {
        Some(raised_by) => {
            engine
                .apply(
                    &app,
                    &actor_for(raised_by.role()),
                    &ReviewAction::complete_recheck(),
                    Utc::now(),
                )
                .unwrap()
                .application
        }
        None => app,
    }
}

// ---------------------------------------------------------------------------
// Property Tests
// ---------------------------------------------------------------------------

proptest! {
    /// Accepted actions append one entry, keep the prefix and the chain valid.
    #[test]
    fn history_is_append_only(steps in arb_steps()) {
        let engine = WorkflowEngine::default();
        let mut app = fresh(&engine);

        for (i, (role, action)) in steps.iter().enumerate() {
            let at = app.created_at + Duration::minutes(i as i64 + 1);
            if let Ok(t) = engine.apply(&app, &actor_for(*role), action, at) {
                prop_assert_eq!(t.application.history.len(), app.history.len() + 1);
                prop_assert_eq!(&t.application.history[..app.history.len()], &app.history[..]);
                prop_assert_eq!(t.application.version, app.version + 1);
                prop_assert_eq!(t.application.last_entry(), Some(&t.entry));
                prop_assert!(t.application.verify_history().is_ok());
                app = t.application;
            }
        }
    }

    /// Stage-owned actions by anyone but the stage's role (or ADMIN) fail
    /// with Unauthorized.
    #[test]
    fn outsiders_are_unauthorized(
        steps in arb_steps(),
        role in arb_role(),
        action in prop_oneof![
            Just(ReviewAction::approve()),
            Just(ReviewAction::reject("document mismatch")),
            Just(ReviewAction::request_recheck("verify address")),
            Just(ReviewAction::submit_report("field visit")),
        ],
    ) {
        let engine = WorkflowEngine::default();
        let app = replay(&engine, &steps);
        let stage = match app.state {
            ApplicationState::Pending { stage } => stage,
            _ => return Ok(()),
        };
        prop_assume!(!role.owns(stage) && !role.is_admin());

        let result = engine.apply(&app, &actor_for(role), &action, Utc::now());
        let unauthorized = matches!(result, Err(WorkflowError::Unauthorized { .. }));
        prop_assert!(unauthorized);
    }

    /// APPROVE advances to the next stage or completes at the last one.
    #[test]
    fn approve_follows_registry(steps in arb_steps()) {
        let engine = WorkflowEngine::default();
        let app = settle(&engine, replay(&engine, &steps));
        let stage = match app.state {
            ApplicationState::Pending { stage } => stage,
            _ => return Ok(()),
        };

        let t = engine
            .apply(&app, &actor_for(stage.role()), &ReviewAction::approve(), Utc::now())
            .unwrap();
        match StageRegistry::standard().next_stage(stage).unwrap() {
            NextStage::Stage(next) => {
                prop_assert_eq!(t.application.state, ApplicationState::Pending { stage: next });
                prop_assert_eq!(t.application.status(), Status::Pending);
            }
            NextStage::Completed => {
                prop_assert_eq!(stage, Stage::Mro);
                prop_assert_eq!(t.application.status(), Status::Completed);
            }
        }
    }

    /// Terminal applications refuse every review action.
    #[test]
    fn terminal_states_are_final(steps in arb_steps(), role in arb_role(), action in arb_action()) {
        let engine = WorkflowEngine::default();
        let mut app = settle(&engine, replay(&engine, &steps));
        if !app.is_terminal() {
            app = engine
                .apply(&app, &actor_for(Role::Admin), &ReviewAction::reject("withdrawn"), Utc::now())
                .unwrap()
                .application;
        }

        let result = engine.apply(&app, &actor_for(role), &action, Utc::now());
        let invalid = matches!(result, Err(WorkflowError::InvalidTransition(_)));
        prop_assert!(invalid);
    }
}
