//! Deterministic fixture-backed host for tests.
//!
//! [`FixtureHost`] answers every capability query from fixed values and
//! records the order of invocations plus mutation counts, which is what the
//! exit-code matrix tests assert on. Counters use interior mutability
//! because the capability traits take `&self`.

use std::cell::{Cell, RefCell};

use crate::error::HostError;
use crate::preflight::DEFAULT_SWITCH_NAME;

use super::{
    Adapter, FeatureState, MetricsProbe, NetInventory, PrivilegeProbe, ResourceSnapshot,
    ServiceProbe, SwitchDescriptor, SwitchProvider, SwitchSpec, VirtFeature,
};

const GIB: u64 = 1024 * 1024 * 1024;

/// A host backed by fixed fixtures.
///
/// # Example
///
/// ```
/// use lab_preflight::host::FeatureState;
/// use lab_preflight::host::fixtures::FixtureHost;
///
/// let host = FixtureHost::ready()
///     .with_feature_state(FeatureState::Disabled)
///     .with_services(0);
/// assert_eq!(host.enable_calls(), 0);
/// ```
#[derive(Debug)]
pub struct FixtureHost {
    elevated: bool,
    feature_state: Option<FeatureState>,
    enable_fails: bool,
    services_running: Option<usize>,
    adapters: Vec<Adapter>,
    existing_switch: Option<SwitchDescriptor>,
    switch_create_fails: bool,
    snapshot: Option<ResourceSnapshot>,

    calls: RefCell<Vec<&'static str>>,
    enable_calls: Cell<usize>,
    create_calls: Cell<usize>,
    created: RefCell<Vec<SwitchSpec>>,
}

impl FixtureHost {
    /// A host where every precondition already holds: elevated, feature
    /// enabled, services running, one eligible adapter, switch present,
    /// generous resources.
    #[must_use]
    pub fn ready() -> Self {
        Self {
            elevated: true,
            feature_state: Some(FeatureState::Enabled),
            enable_fails: false,
            services_running: Some(2),
            adapters: vec![Adapter {
                name: String::from("eth0"),
                description: String::from("e1000e"),
                is_up: true,
                is_connected: true,
                is_virtual: false,
            }],
            existing_switch: Some(SwitchDescriptor {
                name: String::from(DEFAULT_SWITCH_NAME),
                adapter: Some(String::from("eth0")),
            }),
            switch_create_fails: false,
            snapshot: Some(ResourceSnapshot {
                total_ram_bytes: 32 * GIB,
                free_disk_bytes: 500 * GIB,
                logical_cores: 8,
                os_name: String::from("Fixture Linux 6.10"),
            }),
            calls: RefCell::new(Vec::new()),
            enable_calls: Cell::new(0),
            create_calls: Cell::new(0),
            created: RefCell::new(Vec::new()),
        }
    }

    /// Sets the elevation answer.
    #[must_use]
    pub fn with_elevated(mut self, elevated: bool) -> Self {
        self.elevated = elevated;
        self
    }

    /// Sets the virtualization feature state.
    #[must_use]
    pub fn with_feature_state(mut self, state: FeatureState) -> Self {
        self.feature_state = Some(state);
        self
    }

    /// Makes the feature-state query fail.
    #[must_use]
    pub fn with_feature_query_error(mut self) -> Self {
        self.feature_state = None;
        self
    }

    /// Makes the enable operation fail.
    #[must_use]
    pub fn with_enable_error(mut self) -> Self {
        self.enable_fails = true;
        self
    }

    /// Sets how many probed services report running.
    #[must_use]
    pub fn with_services(mut self, running: usize) -> Self {
        self.services_running = Some(running);
        self
    }

    /// Makes the service probe fail.
    #[must_use]
    pub fn with_service_probe_error(mut self) -> Self {
        self.services_running = None;
        self
    }

    /// Replaces the adapter inventory.
    #[must_use]
    pub fn with_adapters(mut self, adapters: Vec<Adapter>) -> Self {
        self.adapters = adapters;
        self
    }

    /// Removes the pre-existing switch.
    #[must_use]
    pub fn with_no_switch(mut self) -> Self {
        self.existing_switch = None;
        self
    }

    /// Makes switch creation fail.
    #[must_use]
    pub fn with_switch_create_error(mut self) -> Self {
        self.switch_create_fails = true;
        self
    }

    /// Replaces the resource snapshot.
    #[must_use]
    pub fn with_snapshot(mut self, snapshot: ResourceSnapshot) -> Self {
        self.snapshot = Some(snapshot);
        self
    }

    /// Makes the metrics read fail.
    #[must_use]
    pub fn with_metrics_error(mut self) -> Self {
        self.snapshot = None;
        self
    }

    /// Every capability invocation so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.borrow().clone()
    }

    /// How many times the feature enable was invoked.
    #[must_use]
    pub fn enable_calls(&self) -> usize {
        self.enable_calls.get()
    }

    /// How many times switch creation was invoked.
    #[must_use]
    pub fn switch_creates(&self) -> usize {
        self.create_calls.get()
    }

    /// Specs of every switch creation attempted.
    #[must_use]
    pub fn created_switches(&self) -> Vec<SwitchSpec> {
        self.created.borrow().clone()
    }

    fn record(&self, call: &'static str) {
        self.calls.borrow_mut().push(call);
    }
}

impl PrivilegeProbe for FixtureHost {
    fn is_elevated(&self) -> bool {
        self.record("is_elevated");
        self.elevated
    }
}

impl VirtFeature for FixtureHost {
    fn feature_state(&self) -> Result<FeatureState, HostError> {
        self.record("feature_state");
        self.feature_state.ok_or_else(|| HostError::FeatureQuery {
            context: String::from("fixture"),
            source: std::io::Error::other("fixture feature query failure"),
        })
    }

    fn enable_feature(&self) -> Result<(), HostError> {
        self.record("enable_feature");
        self.enable_calls.set(self.enable_calls.get() + 1);
        if self.enable_fails {
            return Err(HostError::FeatureEnable {
                context: String::from("fixture enable failure"),
            });
        }
        Ok(())
    }
}

impl ServiceProbe for FixtureHost {
    fn running_services(&self, _names: &[String]) -> Result<usize, HostError> {
        self.record("service_probe");
        self.services_running.ok_or_else(|| HostError::ServiceProbe {
            context: String::from("fixture probe failure"),
        })
    }
}

impl NetInventory for FixtureHost {
    fn adapters(&self) -> Result<Vec<Adapter>, HostError> {
        self.record("adapters");
        Ok(self.adapters.clone())
    }
}

impl SwitchProvider for FixtureHost {
    fn find_switch(&self, name: &str) -> Result<Option<SwitchDescriptor>, HostError> {
        self.record("find_switch");
        Ok(self
            .existing_switch
            .as_ref()
            .filter(|s| s.name == name)
            .cloned())
    }

    fn create_switch(&self, spec: &SwitchSpec) -> Result<(), HostError> {
        self.record("create_switch");
        self.create_calls.set(self.create_calls.get() + 1);
        if self.switch_create_fails {
            return Err(HostError::SwitchCreate {
                name: spec.name.clone(),
                context: String::from("fixture create failure"),
            });
        }
        self.created.borrow_mut().push(spec.clone());
        Ok(())
    }
}

impl MetricsProbe for FixtureHost {
    fn snapshot(&self) -> Result<ResourceSnapshot, HostError> {
        self.record("metrics");
        self.snapshot.clone().ok_or_else(|| HostError::Metrics {
            context: String::from("fixture metrics failure"),
        })
    }
}
