//! Layered configuration loading.
//!
//! Resources are parsed in order and deep-merged: later documents override
//! scalar keys of earlier ones, tables merge recursively, and `service` /
//! `endpoint` entries merge by their `name`.

use crate::config::resource::ConfigResource;
use crate::config::schema::ContextConfig;
use crate::config::validation::validate_config;
use crate::error::ConfigurationError;

/// Array-of-table keys whose entries are matched by `name` when merging.
const NAMED_SECTIONS: &[&str] = &["service", "endpoint"];

/// Read, merge and validate a sequence of configuration resources.
pub fn load_config(resources: &[ConfigResource]) -> Result<ContextConfig, ConfigurationError> {
    if resources.is_empty() {
        return Err(ConfigurationError::NoResources);
    }

    let mut merged = toml::Table::new();
    for resource in resources {
        let content = resource.read()?;
        let document: toml::Table =
            toml::from_str(&content).map_err(|source| ConfigurationError::Parse {
                resource: resource.name().to_string(),
                source,
            })?;
        tracing::debug!(resource = %resource, "Configuration resource parsed");
        merge_tables(&mut merged, document);
    }

    let config: ContextConfig = toml::Value::Table(merged)
        .try_into()
        .map_err(ConfigurationError::Schema)?;

    validate_config(&config).map_err(ConfigurationError::Invalid)?;

    Ok(config)
}

/// Merge `overlay` into `base`, overlay winning on conflicts.
pub fn merge_tables(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        match (base.get_mut(&key), value) {
            (Some(toml::Value::Table(existing)), toml::Value::Table(incoming)) => {
                merge_tables(existing, incoming);
            }
            (Some(toml::Value::Array(existing)), toml::Value::Array(incoming))
                if NAMED_SECTIONS.contains(&key.as_str()) =>
            {
                merge_named(existing, incoming);
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}

fn merge_named(base: &mut Vec<toml::Value>, overlay: Vec<toml::Value>) {
    for item in overlay {
        let existing = entry_name(&item)
            .and_then(|name| base.iter_mut().find(|e| entry_name(e) == Some(name)));
        match (existing, item) {
            (Some(toml::Value::Table(existing)), toml::Value::Table(incoming)) => {
                merge_tables(existing, incoming);
            }
            (_, item) => base.push(item),
        }
    }
}

fn entry_name(value: &toml::Value) -> Option<&str> {
    value.get("name").and_then(toml::Value::as_str)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inline(name: &str, contents: &str) -> ConfigResource {
        ConfigResource::inline(name, contents)
    }

    #[test]
    fn test_empty_resource_list() {
        assert!(matches!(load_config(&[]), Err(ConfigurationError::NoResources)));
    }

    #[test]
    fn test_later_resources_override_earlier_ones() {
        let config = load_config(&[
            ConfigResource::builtin_defaults(),
            inline(
                "app",
                r#"
                [context]
                name = "orders"

                [[service]]
                name = "lifecycle-log"
                enabled = false

                [[service]]
                name = "ingest"
                component = "log"
                [service.properties]
                level = "debug"
                "#,
            ),
            inline(
                "site",
                r#"
                [[service]]
                name = "ingest"
                requires = ["orders-core"]
                [service.properties]
                level = "warn"
                "#,
            ),
        ])
        .unwrap();

        assert_eq!(config.context.name, "orders");
        assert_eq!(config.services.len(), 2);

        let defaults = config.service("lifecycle-log").unwrap();
        assert_eq!(defaults.component, "log");
        assert!(!defaults.enabled);

        let ingest = config.service("ingest").unwrap();
        assert_eq!(ingest.requires, vec!["orders-core".to_string()]);
        assert_eq!(ingest.property_str("level"), Some("warn"));
    }

    #[test]
    fn test_parse_error_names_the_resource() {
        let err = load_config(&[inline("broken", "[context\nname = 1")]).unwrap_err();
        match err {
            ConfigurationError::Parse { resource, .. } => assert_eq!(resource, "broken"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_schema_mismatch() {
        let err = load_config(&[inline("app", "[[service]]\nname = \"x\"\n")]).unwrap_err();
        assert!(matches!(err, ConfigurationError::Schema(_)));
    }

    #[test]
    fn test_validation_runs_on_merged_document() {
        let err = load_config(&[inline(
            "app",
            "[[endpoint]]\nname = \"in\"\nservice = \"ghost\"\naddress = \"vm://in\"\n",
        )])
        .unwrap_err();
        assert!(matches!(err, ConfigurationError::Invalid(ref errors) if errors.len() == 1));
    }

    #[test]
    fn test_unnamed_entries_are_appended() {
        let mut base: toml::Table = toml::from_str("[[service]]\ncomponent = \"a\"\n").unwrap();
        let overlay: toml::Table = toml::from_str("[[service]]\ncomponent = \"b\"\n").unwrap();
        merge_tables(&mut base, overlay);
        assert_eq!(base["service"].as_array().unwrap().len(), 2);
    }
}
