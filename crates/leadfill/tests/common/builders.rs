//! Builders for test configs, records and batches.

#![allow(dead_code)]

use leadfill::config::{Config, TimingsConfig};
use leadfill::submission::FormProfile;
use leadfill::{Batch, CanonicalField, PhoneNormalizer, Record};

pub const TARGET_URL: &str = "https://form.test/cadastro";

/// Builder for `Config` instances with zero settle delays.
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        let mut config = Config::for_target(TARGET_URL);
        config.target.probe = "cadastro de leads".to_string();
        config.timings = TimingsConfig::immediate();
        Self { config }
    }

    pub fn probe(mut self, probe: &str) -> Self {
        self.config.target.probe = probe.to_string();
        self
    }

    pub fn log_capacity(mut self, capacity: usize) -> Self {
        self.config.job.log_capacity = capacity;
        self
    }

    pub fn retain_log_on_restart(mut self, retain: bool) -> Self {
        self.config.job.retain_log_on_restart = retain;
        self
    }

    pub fn skip_repeated_phones(mut self, skip: bool) -> Self {
        self.config.job.skip_repeated_phones = skip;
        self
    }

    pub fn inter_record_millis(mut self, millis: u64) -> Self {
        self.config.timings.inter_record = millis;
        self
    }

    pub fn form(mut self, form: FormProfile) -> Self {
        self.config.form = Some(form);
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A valid lead at `row` with the given owner and phone.
pub fn lead(row: usize, owner: &str, phone: &str) -> Record {
    Record::new(row)
        .with(CanonicalField::Address, "Rua das Flores")
        .with(CanonicalField::HouseNumber, &(100 + row).to_string())
        .with(CanonicalField::OwnerName, owner)
        .with(CanonicalField::Phone, phone)
}

/// Batch of valid leads, one per phone, in the given order.
pub fn batch_of(phones: &[&str]) -> Batch {
    let records = phones
        .iter()
        .enumerate()
        .map(|(i, phone)| lead(i + 2, &format!("Lead {}", i + 1), phone))
        .collect();
    Batch::new(records, PhoneNormalizer::default()).with_source_name("leads.csv")
}

/// `count` leads with distinct phones.
pub fn distinct_batch(count: usize) -> Batch {
    let phones: Vec<String> = (0..count).map(|i| format!("119{:08}", i)).collect();
    let refs: Vec<&str> = phones.iter().map(String::as_str).collect();
    batch_of(&refs)
}
