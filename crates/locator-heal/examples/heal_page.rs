//! Healing Demo
//!
//! Resolves a broken locator and validates a batch against an in-memory page,
//! using the offline structural oracle.
//!
//! Run with: `cargo run --example heal_page`

use locator_heal::prelude::*;
use std::sync::Arc;

const BEFORE: &str = r#"<html><body>
    <form id="login">
        <input id="username" name="username">
        <input id="password" name="password" type="password">
        <button id="submit-btn" class="btn primary">Sign in</button>
    </form>
</body></html>"#;

const AFTER: &str = r#"<html><body>
    <form id="login">
        <input id="user-name" name="username">
        <input id="pass-word" name="password" type="password">
        <button id="login-submit" class="btn primary">Sign in</button>
    </form>
</body></html>"#;

fn main() -> HealResult<()> {
    println!("=== Locator Healing Demo ===\n");

    let driver = Arc::new(StaticPageDriver::new(BEFORE));
    let session = Session::from_arc(driver.clone());
    let oracle: Arc<dyn RepairOracle> = Arc::new(StructuralFallbackOracle::new());
    let config = HealerConfig::new()
        .with_snapshot(SnapshotConfig::default().without_persistence())
        .with_wait(WaitOptions::default().with_timeout(200).with_poll_interval(50))
        .with_scroll(ScrollOptions::default().with_max_attempts(1).with_pauses(0, 0));

    let resolver = config.resolver(Arc::clone(&oracle));
    let submit = Locator::id("submit-btn");

    let first = resolver.resolve(&session, &submit)?;
    println!("1. Before redesign: {} -> {}", submit, first.state);

    driver.set_markup(AFTER);
    let healed = resolver.resolve(&session, &submit)?;
    println!("2. After redesign:  {} -> {} via {}", submit, healed.state, healed.locator);

    let cached = resolver.resolve(&session, &submit)?;
    println!("3. Next lookup:     {} -> {}", submit, cached.state);

    println!("\n--- Batch validation ---");
    let batch = [Locator::id("username"), Locator::id("password"), submit];
    let report = config.orchestrator(oracle).run(&session, &batch);
    for repair in &report.repairs {
        let replacement = repair
            .replacement
            .as_ref()
            .map_or_else(|| "(none)".to_string(), Locator::key);
        println!("  [{}] {} -> {}", repair.index, repair.original, replacement);
    }
    println!("Outcome: {:?}", report.outcome);

    println!("\n=== Demo Complete ===");
    Ok(())
}
