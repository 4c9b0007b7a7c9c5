//! Turns a manifest's `MonitorSpec` list into entities in a fresh
//! `ComponentStore` (spec §6).

use std::collections::HashSet;

use crate::error::{LoaderError, LoaderResult};
use crate::spec::MonitorSpec;
use crate::state::MonitorState;
use crate::store::ComponentStore;

/// Validate and spawn every `MonitorSpec` into `store`. Fails the whole
/// batch on the first invalid or duplicate-named spec, leaving `store`
/// untouched by specs processed before the failure — callers load into a
/// fresh store and discard it on error rather than trying to patch a
/// partially loaded one.
pub fn load(specs: Vec<MonitorSpec>) -> LoaderResult<ComponentStore> {
    let mut seen = HashSet::with_capacity(specs.len());
    for spec in &specs {
        spec.validate()?;
        if !seen.insert(spec.name.clone()) {
            return Err(LoaderError::DuplicateName { name: spec.name.clone() });
        }
    }

    let mut store = ComponentStore::new();
    for spec in specs {
        let pulse = spec.pulse.normalized();
        let state = MonitorState::new(spec.name, spec.intervention.is_some(), !spec.enabled);
        store.spawn(state, pulse, spec.intervention, spec.codes);
    }
    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::{CodeConfig, DurationSpec, PulseConfig, PulseTransport};
    use std::time::Duration;

    fn spec(name: &str) -> MonitorSpec {
        MonitorSpec {
            name: name.into(),
            enabled: true,
            pulse: PulseConfig {
                transport: PulseTransport::Tcp { host: "h".into(), port: 1 },
                interval: DurationSpec(Duration::from_secs(1)),
                timeout: DurationSpec(Duration::from_secs(1)),
                unhealthy_threshold: 0,
                healthy_threshold: 0,
            },
            intervention: None,
            codes: CodeConfig::new(),
        }
    }

    #[test]
    fn load_spawns_one_entity_per_spec() {
        let store = load(vec![spec("a"), spec("b")]).unwrap();
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn load_normalizes_zero_thresholds() {
        let store = load(vec![spec("a")]).unwrap();
        let e = store.entity_by_name("a").unwrap();
        let pulse = store.pulse(e).unwrap();
        assert_eq!(pulse.unhealthy_threshold, 1);
        assert_eq!(pulse.healthy_threshold, 2);
    }

    #[test]
    fn load_rejects_duplicate_names() {
        let err = load(vec![spec("a"), spec("a")]).unwrap_err();
        assert_eq!(err, LoaderError::DuplicateName { name: "a".into() });
    }

    #[test]
    fn load_rejects_empty_name() {
        let mut bad = spec("");
        bad.name = String::new();
        let err = load(vec![bad]).unwrap_err();
        assert_eq!(err, LoaderError::EmptyName);
    }
}
