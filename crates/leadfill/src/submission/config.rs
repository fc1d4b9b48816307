use crate::config::{Config, TimingsConfig};

use super::profile::FormProfile;

pub struct EngineConfig {
    pub target_url: String,
    pub reload_per_record: bool,
    pub timings: TimingsConfig,
    pub confirm_address_with_enter: bool,
    pub skip_repeated_phones: bool,
    pub profile: FormProfile,
}

impl EngineConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            target_url: config.target.url.clone(),
            reload_per_record: config.target.reload_per_record,
            timings: config.timings.clone(),
            confirm_address_with_enter: config.job.confirm_address_with_enter,
            skip_repeated_phones: config.job.skip_repeated_phones,
            profile: config.form_profile(),
        }
    }
}
