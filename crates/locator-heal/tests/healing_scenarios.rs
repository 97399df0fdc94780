//! End-to-end healing scenarios over the in-memory driver.

use locator_heal::prelude::*;
use std::sync::Arc;

const LOGIN_PAGE: &str = r#"<html><body>
    <form id="login">
        <input name="username">
        <input name="password" type="password">
        <button id="submit-btn">Sign in</button>
    </form>
</body></html>"#;

fn quick_wait() -> WaitOptions {
    WaitOptions::default().with_timeout(40).with_poll_interval(5)
}

fn in_memory() -> DocumentSnapshotter {
    DocumentSnapshotter::new(SnapshotConfig::default().without_persistence())
}

fn resolver(oracle: Arc<ScriptedOracle>) -> LocatorResolver {
    LocatorResolver::new(oracle)
        .with_snapshotter(in_memory())
        .with_wait(quick_wait())
}

fn orchestrator(oracle: Arc<ScriptedOracle>) -> ValidationOrchestrator {
    ValidationOrchestrator::new(oracle)
        .with_snapshotter(in_memory())
        .with_scroll(ScrollOptions::default().with_max_attempts(2).with_pauses(0, 0))
}

mod single_locator {
    use super::*;

    #[test]
    fn present_locator_resolves_without_snapshot_or_oracle() {
        let driver = Arc::new(StaticPageDriver::new(LOGIN_PAGE));
        let session = Session::from_arc(driver.clone());
        let oracle = Arc::new(ScriptedOracle::new());

        let resolution = resolver(oracle.clone())
            .resolve(&session, &Locator::id("submit-btn"))
            .unwrap();

        assert_eq!(resolution.state, ResolutionState::Resolved);
        assert_eq!(resolution.element.tag_name, "button");
        assert!(!driver.was_called("page_source"));
        assert_eq!(oracle.calls(), 0);
    }

    #[test]
    fn damaged_xpath_heals_then_hits_cache() {
        let driver = Arc::new(StaticPageDriver::new(
            r#"<html><body><button id="new">Go</button></body></html>"#,
        ));
        let session = Session::from_arc(driver.clone());
        let damaged = Locator::xpath("//button[@id='old']");
        let oracle = Arc::new(ScriptedOracle::new().answer(&damaged, "//button[@id='new']"));
        let resolver = resolver(oracle.clone());

        let healed = resolver.resolve(&session, &damaged).unwrap();
        assert_eq!(healed.state, ResolutionState::ResolvedAfterHeal);
        assert_eq!(healed.locator, Locator::xpath("//button[@id='new']"));
        assert_eq!(healed.element.attribute("id"), Some("new"));
        assert_eq!(oracle.calls(), 1);

        let cached = resolver.resolve(&session, &damaged).unwrap();
        assert_eq!(cached.state, ResolutionState::ResolvedFromCache);
        assert_eq!(cached.element.text, "Go");
        assert_eq!(oracle.calls(), 1);
        assert_eq!(driver.call_count("page_source"), 1);
    }

    #[test]
    fn cached_mapping_shared_across_resolvers() {
        let cache = Arc::new(HealedLocatorCache::new());
        cache.insert(&Locator::id("old"), Locator::id("submit-btn"));
        let oracle = Arc::new(ScriptedOracle::new());
        let resolver = resolver(oracle.clone()).with_cache(Arc::clone(&cache));
        let session = Session::new(StaticPageDriver::new(LOGIN_PAGE));

        let resolution = resolver.resolve(&session, &Locator::id("old")).unwrap();
        assert_eq!(resolution.state, ResolutionState::ResolvedFromCache);
        assert_eq!(oracle.calls(), 0);
    }

    #[test]
    fn unavailable_oracle_surfaces_not_found_with_cause() {
        let session = Session::new(StaticPageDriver::new(LOGIN_PAGE));
        let oracle = Arc::new(ScriptedOracle::new().unavailable("connection refused"));

        let err = resolver(oracle)
            .resolve(&session, &Locator::id("gone"))
            .unwrap_err();

        match &err {
            HealError::ElementNotFound { locator, .. } => assert_eq!(locator, "id=gone"),
            other => panic!("unexpected error: {other}"),
        }
        assert!(matches!(err.cause(), Some(HealError::OracleUnavailable { .. })));
        assert!(err.to_string().contains("connection refused"));
    }

    #[test]
    fn healing_disabled_session_fails_plainly() {
        let session = Session::new(StaticPageDriver::new(LOGIN_PAGE));
        let damaged = Locator::id("gone");
        let oracle = Arc::new(ScriptedOracle::new().answer(&damaged, "id=submit-btn"));
        let resolver = resolver(oracle.clone());

        let result = session.without_healing(|| resolver.resolve(&session, &damaged));
        assert!(matches!(result, Err(HealError::ElementNotFound { .. })));
        assert_eq!(oracle.calls(), 0);
        assert!(session.healing().is_enabled());
    }
}

mod batch {
    use super::*;

    #[test]
    fn failed_final_check_returns_empty_not_partial() {
        let session = Session::new(StaticPageDriver::new(LOGIN_PAGE));
        let damaged = Locator::id("login-button");
        let oracle = Arc::new(ScriptedOracle::new().answer(&damaged, "//button[@id='still-wrong']"));
        let batch = [Locator::name("username"), Locator::name("password"), damaged];

        let out = orchestrator(oracle.clone()).validate_and_heal(&session, &batch);

        assert!(out.is_empty());
        assert_eq!(oracle.calls(), 1);
    }

    #[test]
    fn healed_batch_keeps_positions() {
        let session = Session::new(StaticPageDriver::new(LOGIN_PAGE));
        let damaged = Locator::id("login-button");
        let oracle = Arc::new(ScriptedOracle::new().answer(&damaged, "id=submit-btn"));
        let batch = [Locator::name("username"), damaged, Locator::name("password")];

        let report = orchestrator(oracle).run(&session, &batch);

        assert_eq!(report.outcome, BatchOutcome::Healed);
        assert_eq!(report.found, vec![0, 2]);
        assert_eq!(
            report.into_locators(),
            vec![Locator::name("username"), Locator::id("submit-btn"), Locator::name("password")]
        );
    }
}

mod concurrency {
    use super::*;

    #[test]
    fn sessions_on_many_threads_share_one_resolver() {
        let damaged = Locator::id("old-submit");
        let oracle = Arc::new(ScriptedOracle::new().answer(&damaged, "id=submit-btn"));
        let resolver = resolver(oracle.clone());

        std::thread::scope(|scope| {
            for _ in 0..6 {
                let resolver = &resolver;
                let damaged = &damaged;
                scope.spawn(move || {
                    let session = Session::new(StaticPageDriver::new(LOGIN_PAGE));
                    for _ in 0..3 {
                        let resolution = resolver.resolve(&session, damaged).unwrap();
                        assert!(resolution.was_healed());
                        assert_eq!(resolution.locator, Locator::id("submit-btn"));
                    }
                });
            }
        });

        assert_eq!(resolver.cache().len(), 1);
        assert!(oracle.calls() >= 1);
        assert!(oracle.calls() <= 6);
    }

    #[test]
    fn disabling_one_session_leaves_others_healing() {
        let damaged = Locator::id("old-submit");
        let oracle = Arc::new(ScriptedOracle::new().answer(&damaged, "id=submit-btn"));
        let resolver = resolver(oracle);
        let quiet = Session::new(StaticPageDriver::new(LOGIN_PAGE));
        let active = Session::new(StaticPageDriver::new(LOGIN_PAGE));

        let _guard = quiet.healing().disable();
        std::thread::scope(|scope| {
            let handle = scope.spawn(|| resolver.resolve(&active, &damaged));
            assert!(handle.join().unwrap().is_ok());
        });
        assert!(!quiet.healing().is_enabled());
    }
}
