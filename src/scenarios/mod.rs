//! # Scenario Catalog
//!
//! Named, ready-to-run scenarios. Each entry builds a fresh [`Scenario`] bound
//! to an application namespace.

pub mod ecc_strict_mtls;

use serde::Serialize;

use crate::scenario::Scenario;
use crate::template::ConfigTemplate;

/// A scenario the CLI can run by name
#[derive(Clone, Copy, Serialize)]
pub struct CatalogEntry {
    pub name: &'static str,
    pub feature: &'static str,
    pub description: &'static str,
    #[serde(skip)]
    build: fn(&str) -> Scenario,
    #[serde(skip)]
    templates: fn(&str) -> Vec<ConfigTemplate>,
}

impl CatalogEntry {
    /// Fresh, pending scenario for `namespace`
    pub fn build(&self, namespace: &str) -> Scenario {
        (self.build)(namespace)
    }

    /// Config templates the scenario applies, bound to `namespace`
    pub fn templates(&self, namespace: &str) -> Vec<ConfigTemplate> {
        (self.templates)(namespace)
    }
}

static CATALOG: &[CatalogEntry] = &[CatalogEntry {
    name: ecc_strict_mtls::NAME,
    feature: ecc_strict_mtls::FEATURE,
    description: "STRICT mTLS between client and server uses an ECDSA workload certificate",
    build: ecc_strict_mtls::scenario,
    templates: ecc_strict_mtls::templates,
}];

pub fn catalog() -> &'static [CatalogEntry] {
    CATALOG
}

pub fn find(name: &str) -> Option<&'static CatalogEntry> {
    CATALOG.iter().find(|entry| entry.name == name)
}
