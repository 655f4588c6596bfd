//! # Config Templates
//!
//! Declarative documents with `{{.Name}}` placeholders. Evaluation substitutes
//! every placeholder and then reads the resource header (`apiVersion`, `kind`,
//! `metadata`) of each YAML document so the applier knows what to wait for.
//!
//! ```rust
//! use meshverify::template::ConfigTemplate;
//!
//! let template = ConfigTemplate::new(
//!     "peer-authentication",
//!     "apiVersion: security.istio.io/v1beta1\nkind: PeerAuthentication\nmetadata:\n  name: default\n  namespace: {{.AppNamespace}}\n",
//! )
//! .with_value("AppNamespace", "echo");
//!
//! let resolved = template.evaluate().unwrap();
//! assert_eq!(resolved.resources()[0].kind, "PeerAuthentication");
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::errors::ConfigError;

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*\.([A-Za-z_][A-Za-z0-9_]*)\s*\}\}").expect("placeholder pattern")
});

// Anything still delimited after substitution is an action we do not evaluate.
static LEFTOVER_ACTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{(.*?)\}\}").expect("action pattern"));

/// A named declarative document plus its substitution values
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigTemplate {
    name: String,
    body: String,
    values: BTreeMap<String, String>,
}

impl ConfigTemplate {
    pub fn new(name: impl Into<String>, body: impl Into<String>) -> Self {
        Self { name: name.into(), body: body.into(), values: BTreeMap::new() }
    }

    /// Set a substitution value
    pub fn with_value(mut self, placeholder: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(placeholder.into(), value.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    /// Placeholder names referenced by the body
    pub fn placeholders(&self) -> BTreeSet<String> {
        PLACEHOLDER.captures_iter(&self.body).map(|c| c[1].to_string()).collect()
    }

    /// Substitute placeholders without parsing the result
    pub fn render(&self) -> Result<String, ConfigError> {
        let mut missing: Option<String> = None;

        let rendered = PLACEHOLDER.replace_all(&self.body, |caps: &regex::Captures<'_>| {
            match self.values.get(&caps[1]) {
                Some(value) => value.clone(),
                None => {
                    missing.get_or_insert_with(|| caps[1].to_string());
                    caps[0].to_string()
                }
            }
        });

        if let Some(placeholder) = missing {
            return Err(ConfigError::UnresolvedPlaceholder {
                template: self.name.clone(),
                placeholder,
            });
        }

        if let Some(caps) = LEFTOVER_ACTION.captures(&rendered) {
            return Err(ConfigError::UnresolvedPlaceholder {
                template: self.name.clone(),
                placeholder: caps[1].trim().to_string(),
            });
        }

        Ok(rendered.into_owned())
    }

    /// Render and parse into a config ready for submission
    pub fn evaluate(&self) -> Result<ResolvedConfig, ConfigError> {
        let yaml = self.render()?;
        let resources = parse_resources(&self.name, &yaml)?;
        Ok(ResolvedConfig { name: self.name.clone(), yaml, resources })
    }
}

/// A fully rendered config and the resources it declares
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedConfig {
    name: String,
    yaml: String,
    resources: Vec<ResourceRef>,
}

impl ResolvedConfig {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn yaml(&self) -> &str {
        &self.yaml
    }

    pub fn resources(&self) -> &[ResourceRef] {
        &self.resources
    }
}

/// Identity of a single declared resource
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ResourceRef {
    pub api_version: String,
    pub kind: String,
    pub name: String,
    pub namespace: Option<String>,
}

impl ResourceRef {
    /// API group, empty for the core group (`v1`)
    pub fn group(&self) -> &str {
        self.api_version.rsplit_once('/').map(|(group, _)| group).unwrap_or("")
    }

    /// Fully qualified type name accepted by `kubectl get`
    pub fn kubectl_type(&self) -> String {
        let kind = self.kind.to_lowercase();
        match self.group() {
            "" => kind,
            group => format!("{}.{}", kind, group),
        }
    }

    /// Namespace the resource lands in, given the submission namespace
    pub fn namespace_or<'a>(&'a self, default: &'a str) -> &'a str {
        self.namespace.as_deref().unwrap_or(default)
    }
}

impl fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{}/{}.{}", self.kind, self.name, ns),
            None => write!(f, "{}/{}", self.kind, self.name),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DocumentHeader {
    api_version: String,
    kind: String,
    metadata: DocumentMetadata,
}

#[derive(Debug, Deserialize)]
struct DocumentMetadata {
    name: String,
    #[serde(default)]
    namespace: Option<String>,
}

fn parse_resources(template: &str, yaml: &str) -> Result<Vec<ResourceRef>, ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidDocument {
        template: template.to_string(),
        reason,
    };

    let mut resources = Vec::new();
    for (index, document) in serde_yaml::Deserializer::from_str(yaml).enumerate() {
        let value = serde_yaml::Value::deserialize(document)
            .map_err(|e| invalid(format!("document {}: {}", index, e)))?;

        if value.is_null() {
            continue;
        }

        let header: DocumentHeader = serde_yaml::from_value(value)
            .map_err(|e| invalid(format!("document {}: {}", index, e)))?;

        resources.push(ResourceRef {
            api_version: header.api_version,
            kind: header.kind,
            name: header.metadata.name,
            namespace: header.metadata.namespace,
        });
    }

    if resources.is_empty() {
        return Err(invalid("no resource documents".to_string()));
    }

    Ok(resources)
}
