//! Configuration as written by the operator, before defaults are applied.

use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Deserialize)]
pub(crate) struct RawCloudConfig {
    #[serde(default)]
    pub(crate) agent: Map<String, Value>,
    #[serde(default)]
    pub(crate) vcds: Vec<RawVcd>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawVcd {
    pub(crate) url: String,
    pub(crate) user: String,
    pub(crate) password: String,
    pub(crate) entities: RawEntities,
    pub(crate) control: Option<RawControl>,
    pub(crate) debug: Option<RawDebug>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawEntities {
    pub(crate) organization: String,
    pub(crate) virtual_datacenter: String,
    pub(crate) vapp_catalog: String,
    pub(crate) media_catalog: String,
    pub(crate) vm_metadata_key: String,
    pub(crate) media_storage_profile: Option<String>,
    pub(crate) vapp_storage_profile: Option<String>,
    pub(crate) description: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub(crate) struct RawControl {
    pub(crate) retries: Option<RawRetries>,
    pub(crate) delay: Option<u64>,
    pub(crate) time_limit_sec: Option<RawTimeLimits>,
    pub(crate) backoff: Option<u64>,
    pub(crate) backoff_mode: Option<RawBackoffMode>,
    pub(crate) backoff_max: Option<u64>,
    pub(crate) rest_throttle: Option<RawThrottle>,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub(crate) enum RawBackoffMode {
    Fixed,
    Exponential,
}

#[derive(Debug, Deserialize, Default)]
pub(crate) struct RawRetries {
    pub(crate) default: Option<u32>,
    pub(crate) upload_vapp_files: Option<u32>,
    pub(crate) cpi: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
pub(crate) struct RawTimeLimits {
    pub(crate) default: Option<u64>,
    pub(crate) delete_vapp_template: Option<u64>,
    pub(crate) delete_vapp: Option<u64>,
    pub(crate) delete_media: Option<u64>,
    pub(crate) instantiate_vapp_template: Option<u64>,
    pub(crate) power_on: Option<u64>,
    pub(crate) power_off: Option<u64>,
    pub(crate) undeploy: Option<u64>,
    pub(crate) process_descriptor_vapp_template: Option<u64>,
    pub(crate) http_request: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
pub(crate) struct RawThrottle {
    pub(crate) min: Option<f64>,
    pub(crate) max: Option<f64>,
}

#[derive(Debug, Deserialize, Default)]
pub(crate) struct RawDebug {
    pub(crate) delete_vapp: Option<bool>,
}
