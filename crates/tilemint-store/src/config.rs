use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tilemint::store::ConfigSource;
use tilemint::{CustomerPolicy, FrontendCodeTables, ProductKey, ProductTemplate};

use crate::Result;

/// A [`ConfigSource`] held entirely in memory, usually loaded from a JSON
/// document such as:
///
/// ```json
/// {
///   "templates": { "P1-A-LM": { "front": { "tile_fields": ["TXT=AB,SN1"] } } },
///   "policies": { "C1": { "serial_length": 5, "exclude": "I,O" } },
///   "split_steps": ["LMCD"],
///   "frontend": { "machine": { "EQ01": "M1" } }
/// }
/// ```
///
/// Templates are keyed by the display form of their [`ProductKey`]; policies
/// by customer.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StaticConfig {
    pub templates: BTreeMap<String, ProductTemplate>,
    pub policies: BTreeMap<String, CustomerPolicy>,
    pub split_steps: BTreeSet<String>,
    pub frontend: FrontendCodeTables,
}

impl StaticConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let mut config: Self = serde_json::from_str(json)?;
        for (customer, policy) in &mut config.policies {
            if policy.customer.is_empty() {
                policy.customer.clone_from(customer);
            }
        }
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let config = Self::from_json_str(&std::fs::read_to_string(path)?)?;
        #[cfg(feature = "tracing")]
        tracing::debug!(
            path = %path.display(),
            templates = config.templates.len(),
            policies = config.policies.len(),
            "loaded configuration"
        );
        Ok(config)
    }

    #[must_use]
    pub fn with_template(mut self, key: &ProductKey, template: ProductTemplate) -> Self {
        self.templates.insert(key.to_string(), template);
        self
    }

    #[must_use]
    pub fn with_policy(mut self, policy: CustomerPolicy) -> Self {
        self.policies.insert(policy.customer.clone(), policy);
        self
    }

    #[must_use]
    pub fn with_split_step(mut self, step: impl Into<String>) -> Self {
        self.split_steps.insert(step.into());
        self
    }
}

impl ConfigSource for StaticConfig {
    fn load_product_template(&self, key: &ProductKey) -> tilemint::Result<Option<ProductTemplate>> {
        Ok(self.templates.get(&key.to_string()).cloned())
    }

    fn load_customer_policy(&self, customer: &str) -> tilemint::Result<Option<CustomerPolicy>> {
        Ok(self.policies.get(customer).cloned())
    }

    fn is_split_step(&self, step: &str) -> tilemint::Result<bool> {
        Ok(self.split_steps.contains(step))
    }
}
