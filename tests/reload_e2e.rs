use std::sync::Arc;

use serde_json::{json, Value};

use schemeswitch::{
    ConfigError, ConfigTree, DuplicatePolicy, HighWaterMark, InMemoryRegistry, LiveConfig,
    ReloadPolicy, SchemeSwitcher, StepHook, SwitchError, TriggerTime,
};

fn setup(block: &Value) -> (SchemeSwitcher<InMemoryRegistry>, LiveConfig) {
    let live = ConfigTree::from_json(json!({
        "ddtSchemes": { "default": "steadyState" }
    }))
    .unwrap()
    .into_live();
    let registry = InMemoryRegistry::new();
    registry.register("region0", Arc::clone(&live));
    let switcher = SchemeSwitcher::new("switch", registry, block).unwrap();
    (switcher, live)
}

fn euler_at_one() -> Value {
    json!({ "1": { "ddtSchemes": { "default": "Euler" } } })
}

#[test]
fn reload_reset_lets_due_entries_apply_again() {
    let block = json!({ "schemeSwitch": euler_at_one() });
    let (mut switcher, live) = setup(&block);
    assert_eq!(switcher.tick(2.0).unwrap().applied_count(), 1);

    live.lock()
        .unwrap()
        .insert_section("ddtSchemes", serde_json::Map::new());

    switcher.read(&block).unwrap();
    assert_eq!(switcher.high_water_mark(), HighWaterMark::UNSET);
    assert_eq!(switcher.tick(2.0).unwrap().applied_count(), 1);
    assert_eq!(
        live.lock().unwrap().setting_str("ddtSchemes", "default"),
        Some("Euler")
    );
}

#[test]
fn reload_keep_preserves_mark() {
    let block = json!({ "schemeSwitch": euler_at_one(), "onReload": "keep" });
    let (mut switcher, _live) = setup(&block);
    switcher.tick(2.0).unwrap();

    let extended = json!({
        "onReload": "keep",
        "schemeSwitch": {
            "1": { "ddtSchemes": { "default": "Euler" } },
            "3": { "ddtSchemes": { "default": "backward" } }
        }
    });
    switcher.read(&extended).unwrap();
    assert_eq!(switcher.high_water_mark().value(), 1.0);

    let report = switcher.tick(3.0).unwrap();
    assert_eq!(report.applied, vec![TriggerTime::new(3.0).unwrap()]);
}

#[test]
fn identical_reload_yields_identical_schedule() {
    let block = json!({ "schemeSwitch": euler_at_one() });
    let (mut switcher, _live) = setup(&block);
    let first = switcher.schedule().clone();
    switcher.read(&block).unwrap();
    assert_eq!(*switcher.schedule(), first);
    assert_eq!(switcher.schedule().fingerprint(), first.fingerprint());
}

#[test]
fn failed_reload_keeps_previous_state() {
    let block = json!({ "schemeSwitch": {
        "1": { "ddtSchemes": { "default": "Euler" } },
        "5": { "ddtSchemes": { "default": "backward" } }
    }});
    let (mut switcher, live) = setup(&block);
    switcher.tick(1.0).unwrap();
    let fingerprint = switcher.schedule().fingerprint();

    let broken = json!({ "schemeSwitch": { "later": { "ddtSchemes": { "default": "CrankNicolson 0.9" } } } });
    let err = switcher.read(&broken).unwrap_err();
    assert!(matches!(
        err,
        SwitchError::Config(ConfigError::InvalidTriggerTime { .. })
    ));

    let malformed = json!({ "schemeSwitch": { "2": { "ddtSchemes": "Euler" } } });
    assert!(switcher.read(&malformed).unwrap_err().is_config());

    assert_eq!(switcher.schedule().fingerprint(), fingerprint);
    assert_eq!(switcher.high_water_mark().value(), 1.0);

    switcher.tick(5.0).unwrap();
    assert_eq!(
        live.lock().unwrap().setting_str("ddtSchemes", "default"),
        Some("backward")
    );
}

#[test]
fn duplicate_policy_from_options() {
    let schedule = json!({
        "10": { "ddtSchemes": { "default": "Euler" } },
        "1e1": { "ddtSchemes": { "default": "backward" } }
    });

    let (switcher, _live) = setup(&json!({ "schemeSwitch": schedule.clone() }));
    assert_eq!(switcher.options().duplicates, DuplicatePolicy::LastWins);
    assert_eq!(switcher.schedule().len(), 1);
    assert_eq!(
        switcher
            .schedule()
            .get(TriggerTime::new(10.0).unwrap())
            .unwrap()
            .key,
        "1e1"
    );

    let err = SchemeSwitcher::new(
        "switch",
        InMemoryRegistry::new(),
        &json!({ "schemeSwitch": schedule, "duplicates": "reject" }),
    )
    .unwrap_err();
    assert!(matches!(
        err,
        SwitchError::Config(ConfigError::DuplicateTriggerTime { .. })
    ));
}

#[test]
fn custom_target_names() {
    let live = ConfigTree::from_json(json!({ "ddtSchemes": { "default": "steadyState" } }))
        .unwrap()
        .into_live();
    let registry = InMemoryRegistry::new();
    registry.register("solid", Arc::clone(&live));

    let block = json!({
        "schemeSwitch": euler_at_one(),
        "target": "fluid",
        "fallbackTarget": "solid"
    });
    let mut switcher = SchemeSwitcher::new("switch", registry, &block).unwrap();
    assert_eq!(switcher.options().on_reload, ReloadPolicy::Reset);
    assert_eq!(switcher.tick(1.0).unwrap().change_count(), 1);
    assert_eq!(
        live.lock().unwrap().setting_str("ddtSchemes", "default"),
        Some("Euler")
    );

    switcher
        .read(&json!({ "schemeSwitch": euler_at_one(), "target": "fluid", "fallbackTarget": null }))
        .unwrap();
    let err = switcher.tick(1.0).unwrap_err();
    assert!(err.is_lookup());
}
