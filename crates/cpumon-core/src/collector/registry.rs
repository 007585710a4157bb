//! Static table of collector types per platform.

use std::collections::BTreeSet;
use std::path::PathBuf;

use tracing::{debug, info};

use crate::collector::collector::{CollectorOptions, MetricsCollector};
use crate::collector::cpu::{CPU_COLLECTOR, CpuCollector};
use crate::collector::error::CollectorError;
use crate::collector::probe::{LinuxProbe, MacProbe, NullProbe, PlatformProbe};
use crate::collector::traits::{RealCommand, RealFs};
use crate::config::AppConfig;
use crate::util::Platform;

/// Collector types available on each platform.
const TABLE: &[(Platform, &[&str])] = &[
    (Platform::Linux, &[CPU_COLLECTOR]),
    (Platform::MacOs, &[CPU_COLLECTOR]),
    (Platform::Windows, &[]),
];

/// Collector types available for a platform id.
///
/// Unknown ids resolve to an empty set.
pub fn resolve(platform_id: &str) -> BTreeSet<&'static str> {
    Platform::from_id(platform_id)
        .map(resolve_platform)
        .unwrap_or_default()
}

fn resolve_platform(platform: Platform) -> BTreeSet<&'static str> {
    TABLE
        .iter()
        .filter(|(p, _)| *p == platform)
        .flat_map(|(_, names)| names.iter().copied())
        .collect()
}

/// Instantiates collectors for one platform.
#[derive(Debug, Clone)]
pub struct CollectorRegistry {
    platform: Option<Platform>,
    platform_id: String,
    proc_path: PathBuf,
    sys_path: PathBuf,
}

impl CollectorRegistry {
    pub fn new(platform: Platform) -> Self {
        Self {
            platform: Some(platform),
            platform_id: platform.as_id().to_string(),
            proc_path: PathBuf::from("/proc"),
            sys_path: PathBuf::from("/sys"),
        }
    }

    /// Registry for a platform with no table entry; offers nothing.
    pub fn unknown(platform_id: impl Into<String>) -> Self {
        Self {
            platform: None,
            platform_id: platform_id.into(),
            proc_path: PathBuf::from("/proc"),
            sys_path: PathBuf::from("/sys"),
        }
    }

    /// Registry for a platform id as found in configuration files.
    pub fn for_platform_id(platform_id: &str) -> Self {
        match Platform::from_id(platform_id) {
            Some(p) => Self::new(p),
            None => Self::unknown(platform_id),
        }
    }

    /// Registry for the platform this process runs on.
    pub fn for_current_platform() -> Self {
        Self::for_platform_id(crate::util::current_platform_id())
    }

    /// Overrides the Linux `/proc` and `/sys` roots.
    pub fn with_probe_roots(
        mut self,
        proc_path: impl Into<PathBuf>,
        sys_path: impl Into<PathBuf>,
    ) -> Self {
        self.proc_path = proc_path.into();
        self.sys_path = sys_path.into();
        self
    }

    pub fn platform(&self) -> Option<Platform> {
        self.platform
    }

    pub fn platform_id(&self) -> &str {
        &self.platform_id
    }

    /// Collector types this registry can instantiate.
    pub fn available(&self) -> BTreeSet<&'static str> {
        self.platform.map(resolve_platform).unwrap_or_default()
    }

    /// Creates and configures a collector of type `type_id`.
    pub fn instantiate(
        &self,
        type_id: &str,
        options: &CollectorOptions,
    ) -> Result<Box<dyn MetricsCollector>, CollectorError> {
        let unsupported = || CollectorError::UnsupportedCollector {
            collector: type_id.to_string(),
            platform: self.platform_id.clone(),
        };
        if !self.available().contains(type_id) {
            return Err(unsupported());
        }
        let platform = self.platform.ok_or_else(unsupported)?;

        let probe = self.probe_for(platform);
        let collector = match type_id {
            CPU_COLLECTOR => CpuCollector::with_options(probe, options.clone())?,
            _ => return Err(unsupported()),
        };
        debug!(collector = type_id, platform = %platform, "instantiated collector");
        Ok(Box::new(collector))
    }

    /// Instantiates every enabled collector in `config`, keyed by type id.
    ///
    /// Disabled collectors are skipped. An enabled collector this platform
    /// does not offer fails the whole call.
    pub fn instantiate_enabled(
        &self,
        config: &AppConfig,
    ) -> Result<Vec<(String, Box<dyn MetricsCollector>)>, CollectorError> {
        let mut collectors = Vec::new();
        for (name, entry) in &config.collectors {
            if !entry.enabled {
                info!(collector = %name, "collector disabled, skipping");
                continue;
            }
            let options = CollectorOptions::from_value(&entry.options)?;
            collectors.push((name.clone(), self.instantiate(name, &options)?));
        }
        Ok(collectors)
    }

    fn probe_for(&self, platform: Platform) -> Box<dyn PlatformProbe> {
        match platform {
            Platform::Linux => Box::new(LinuxProbe::new(
                RealFs::new(),
                RealCommand::new(),
                self.proc_path.clone(),
                self.sys_path.clone(),
            )),
            Platform::MacOs => Box::new(MacProbe::new(RealCommand::new())),
            Platform::Windows => Box::new(NullProbe::new(platform)),
        }
    }
}
