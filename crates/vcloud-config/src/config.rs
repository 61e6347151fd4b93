use std::fmt;
use std::path::Path;
use std::time::Duration;

use serde_json::{Map, Value};
use tracing::debug;
use vcloud_saga::{Backoff, RetryPolicy};

use crate::error::ConfigError;
use crate::raw::{
    RawBackoffMode, RawCloudConfig, RawControl, RawDebug, RawEntities, RawThrottle,
    RawTimeLimits, RawVcd,
};

const RETRIES_DEFAULT: u32 = 5;
const RETRIES_UPLOAD_VAPP_FILES: u32 = 7;
const RETRIES_CPI: u32 = 1;
const DELAY_SECS: u64 = 1;
const BACKOFF_SECS: u64 = 2;
const BACKOFF_MAX_SECS: u64 = 60;

const TIMELIMIT_DEFAULT: u64 = 120;
const TIMELIMIT_DELETE_VAPP_TEMPLATE: u64 = 120;
const TIMELIMIT_DELETE_VAPP: u64 = 120;
const TIMELIMIT_DELETE_MEDIA: u64 = 120;
const TIMELIMIT_INSTANTIATE_VAPP_TEMPLATE: u64 = 300;
const TIMELIMIT_POWER_ON: u64 = 600;
const TIMELIMIT_POWER_OFF: u64 = 300;
const TIMELIMIT_UNDEPLOY: u64 = 720;
const TIMELIMIT_PROCESS_DESCRIPTOR_VAPP_TEMPLATE: u64 = 300;
const TIMELIMIT_HTTP_REQUEST: u64 = 240;

const REST_THROTTLE_MIN: f64 = 0.0;
const REST_THROTTLE_MAX: f64 = 1.0;

const DEBUG_DELETE_VAPP: bool = true;

/// A string that never shows up in `Debug` output.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

/// Operations that have their own time limit when waiting on remote tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationClass {
    Default,
    DeleteVAppTemplate,
    DeleteVApp,
    DeleteMedia,
    InstantiateVAppTemplate,
    PowerOn,
    PowerOff,
    Undeploy,
    ProcessDescriptorVAppTemplate,
    HttpRequest,
}

impl fmt::Display for OperationClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Default => "default",
            Self::DeleteVAppTemplate => "delete_vapp_template",
            Self::DeleteVApp => "delete_vapp",
            Self::DeleteMedia => "delete_media",
            Self::InstantiateVAppTemplate => "instantiate_vapp_template",
            Self::PowerOn => "power_on",
            Self::PowerOff => "power_off",
            Self::Undeploy => "undeploy",
            Self::ProcessDescriptorVAppTemplate => "process_descriptor_vapp_template",
            Self::HttpRequest => "http_request",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryCounts {
    pub default: u32,
    pub upload_vapp_files: u32,
    pub cpi: u32,
}

/// Time limits for waiting on remote tasks, per operation class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeLimits {
    pub default: Duration,
    pub delete_vapp_template: Duration,
    pub delete_vapp: Duration,
    pub delete_media: Duration,
    pub instantiate_vapp_template: Duration,
    pub power_on: Duration,
    pub power_off: Duration,
    pub undeploy: Duration,
    pub process_descriptor_vapp_template: Duration,
    pub http_request: Duration,
}

impl TimeLimits {
    #[must_use]
    pub fn for_class(&self, class: OperationClass) -> Duration {
        match class {
            OperationClass::Default => self.default,
            OperationClass::DeleteVAppTemplate => self.delete_vapp_template,
            OperationClass::DeleteVApp => self.delete_vapp,
            OperationClass::DeleteMedia => self.delete_media,
            OperationClass::InstantiateVAppTemplate => self.instantiate_vapp_template,
            OperationClass::PowerOn => self.power_on,
            OperationClass::PowerOff => self.power_off,
            OperationClass::Undeploy => self.undeploy,
            OperationClass::ProcessDescriptorVAppTemplate => {
                self.process_descriptor_vapp_template
            }
            OperationClass::HttpRequest => self.http_request,
        }
    }
}

/// Bounds, in seconds, of the random pause the transport inserts between REST calls.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RestThrottle {
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Clone)]
pub struct ControlConfig {
    retries: RetryCounts,
    delay: Duration,
    time_limits: TimeLimits,
    backoff: Backoff,
    rest_throttle: RestThrottle,
}

impl ControlConfig {
    #[must_use]
    pub fn retries(&self) -> RetryCounts {
        self.retries
    }

    /// Pause between two polls of a remote task.
    #[must_use]
    pub fn delay(&self) -> Duration {
        self.delay
    }

    #[must_use]
    pub fn time_limits(&self) -> &TimeLimits {
        &self.time_limits
    }

    #[must_use]
    pub fn time_limit(&self, class: OperationClass) -> Duration {
        self.time_limits.for_class(class)
    }

    #[must_use]
    pub fn backoff(&self) -> Backoff {
        self.backoff
    }

    #[must_use]
    pub fn rest_throttle(&self) -> RestThrottle {
        self.rest_throttle
    }

    /// Policy for the whole-operation retries around lifecycle calls.
    #[must_use]
    pub fn cpi_retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.retries.cpi, self.backoff)
    }

    /// Policy for uploading a single template or media file.
    #[must_use]
    pub fn upload_retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.retries.upload_vapp_files, self.backoff)
    }
}

#[derive(Debug, Clone)]
pub struct EntitiesConfig {
    pub organization: String,
    pub virtual_datacenter: String,
    pub vapp_catalog: String,
    pub media_catalog: String,
    /// Metadata key under which the agent environment is stored on each VM.
    pub vm_metadata_key: String,
    pub media_storage_profile: Option<String>,
    pub vapp_storage_profile: Option<String>,
    pub description: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DebugConfig {
    /// Whether deleting a VM really removes its vApp and configuration media.
    pub delete_vapp: bool,
}

/// Settings for the single vCloud Director endpoint.
#[derive(Debug, Clone)]
pub struct VcdConfig {
    url: String,
    user: String,
    password: Secret,
    entities: EntitiesConfig,
    control: ControlConfig,
    debug: DebugConfig,
}

impl VcdConfig {
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    #[must_use]
    pub fn user(&self) -> &str {
        &self.user
    }

    #[must_use]
    pub fn password(&self) -> &Secret {
        &self.password
    }

    #[must_use]
    pub fn entities(&self) -> &EntitiesConfig {
        &self.entities
    }

    #[must_use]
    pub fn control(&self) -> &ControlConfig {
        &self.control
    }

    #[must_use]
    pub fn debug(&self) -> DebugConfig {
        self.debug
    }
}

/// Complete cloud configuration with every default applied.
#[derive(Debug, Clone)]
pub struct CloudConfig {
    agent_properties: Map<String, Value>,
    vcd: VcdConfig,
}

impl CloudConfig {
    /// # Errors
    ///
    /// Returns an error if the document is not valid TOML or fails validation.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let raw: RawCloudConfig = toml::from_str(content)?;
        Self::finalize(raw)
    }

    /// # Errors
    ///
    /// Returns an error if the document is not valid JSON or fails validation.
    pub fn from_json_str(content: &str) -> Result<Self, ConfigError> {
        let raw: RawCloudConfig = serde_json::from_str(content)?;
        Self::finalize(raw)
    }

    /// Build the configuration from options handed over as a JSON value.
    ///
    /// # Errors
    ///
    /// Returns an error if the value does not have the expected shape or fails validation.
    pub fn from_json_value(value: Value) -> Result<Self, ConfigError> {
        let raw: RawCloudConfig = serde_json::from_value(value)?;
        Self::finalize(raw)
    }

    /// Load a configuration file. Files ending in `.json` are parsed as JSON,
    /// everything else as TOML.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        debug!(path = %path.display(), json = is_json, "loading cloud configuration");
        if is_json {
            Self::from_json_str(&content)
        } else {
            Self::from_toml_str(&content)
        }
    }

    /// Properties merged into every agent environment.
    #[must_use]
    pub fn agent_properties(&self) -> &Map<String, Value> {
        &self.agent_properties
    }

    #[must_use]
    pub fn vcd(&self) -> &VcdConfig {
        &self.vcd
    }

    fn finalize(raw: RawCloudConfig) -> Result<Self, ConfigError> {
        let count = raw.vcds.len();
        let Some(vcd) = raw.vcds.into_iter().next().filter(|_| count == 1) else {
            return Err(ConfigError::VcdCount { count });
        };
        Ok(Self {
            agent_properties: raw.agent,
            vcd: build_vcd(vcd)?,
        })
    }
}

fn build_vcd(raw: RawVcd) -> Result<VcdConfig, ConfigError> {
    if raw.url.trim().is_empty() {
        return Err(ConfigError::EmptyField { field: "url" });
    }
    if raw.user.is_empty() {
        return Err(ConfigError::EmptyField { field: "user" });
    }
    Ok(VcdConfig {
        url: raw.url,
        user: raw.user,
        password: Secret(raw.password),
        entities: build_entities(raw.entities)?,
        control: build_control(raw.control.unwrap_or_default())?,
        debug: build_debug(raw.debug.unwrap_or_default()),
    })
}

fn build_entities(raw: RawEntities) -> Result<EntitiesConfig, ConfigError> {
    if raw.vm_metadata_key.is_empty() {
        return Err(ConfigError::EmptyField {
            field: "entities.vm_metadata_key",
        });
    }
    Ok(EntitiesConfig {
        organization: raw.organization,
        virtual_datacenter: raw.virtual_datacenter,
        vapp_catalog: raw.vapp_catalog,
        media_catalog: raw.media_catalog,
        vm_metadata_key: raw.vm_metadata_key,
        media_storage_profile: raw.media_storage_profile,
        vapp_storage_profile: raw.vapp_storage_profile,
        description: raw.description.unwrap_or_default(),
    })
}

fn build_control(raw: RawControl) -> Result<ControlConfig, ConfigError> {
    let retries = raw.retries.unwrap_or_default();
    let base = Duration::from_secs(raw.backoff.unwrap_or(BACKOFF_SECS));
    let backoff = match raw.backoff_mode.unwrap_or(RawBackoffMode::Fixed) {
        RawBackoffMode::Fixed => Backoff::Fixed(base),
        RawBackoffMode::Exponential => Backoff::Exponential {
            base,
            max: Duration::from_secs(raw.backoff_max.unwrap_or(BACKOFF_MAX_SECS)),
        },
    };

    Ok(ControlConfig {
        retries: RetryCounts {
            default: retries.default.unwrap_or(RETRIES_DEFAULT),
            upload_vapp_files: retries
                .upload_vapp_files
                .unwrap_or(RETRIES_UPLOAD_VAPP_FILES),
            cpi: retries.cpi.unwrap_or(RETRIES_CPI),
        },
        delay: Duration::from_secs(raw.delay.unwrap_or(DELAY_SECS)),
        time_limits: build_time_limits(raw.time_limit_sec.unwrap_or_default()),
        backoff,
        rest_throttle: build_throttle(raw.rest_throttle.unwrap_or_default())?,
    })
}

fn build_time_limits(raw: RawTimeLimits) -> TimeLimits {
    let secs = |value: Option<u64>, default: u64| Duration::from_secs(value.unwrap_or(default));
    TimeLimits {
        default: secs(raw.default, TIMELIMIT_DEFAULT),
        delete_vapp_template: secs(raw.delete_vapp_template, TIMELIMIT_DELETE_VAPP_TEMPLATE),
        delete_vapp: secs(raw.delete_vapp, TIMELIMIT_DELETE_VAPP),
        delete_media: secs(raw.delete_media, TIMELIMIT_DELETE_MEDIA),
        instantiate_vapp_template: secs(
            raw.instantiate_vapp_template,
            TIMELIMIT_INSTANTIATE_VAPP_TEMPLATE,
        ),
        power_on: secs(raw.power_on, TIMELIMIT_POWER_ON),
        power_off: secs(raw.power_off, TIMELIMIT_POWER_OFF),
        undeploy: secs(raw.undeploy, TIMELIMIT_UNDEPLOY),
        process_descriptor_vapp_template: secs(
            raw.process_descriptor_vapp_template,
            TIMELIMIT_PROCESS_DESCRIPTOR_VAPP_TEMPLATE,
        ),
        http_request: secs(raw.http_request, TIMELIMIT_HTTP_REQUEST),
    }
}

fn build_throttle(raw: RawThrottle) -> Result<RestThrottle, ConfigError> {
    let min = raw.min.unwrap_or(REST_THROTTLE_MIN);
    let max = raw.max.unwrap_or(REST_THROTTLE_MAX);
    if min > max {
        return Err(ConfigError::InvalidThrottle { min, max });
    }
    Ok(RestThrottle { min, max })
}

fn build_debug(raw: RawDebug) -> DebugConfig {
    DebugConfig {
        delete_vapp: raw.delete_vapp.unwrap_or(DEBUG_DELETE_VAPP),
    }
}
