//! ConfigurationMapper - resolves the destination list for one event key

use contracts::{Configuration, Destination};

/// Ordered destination configurations, queried per event key
#[derive(Debug, Clone, Default)]
pub struct ConfigurationMapper {
    configs: Vec<Configuration>,
}

impl ConfigurationMapper {
    pub fn new(configs: Vec<Configuration>) -> Self {
        Self { configs }
    }

    pub fn configs(&self) -> &[Configuration] {
        &self.configs
    }

    pub fn is_empty(&self) -> bool {
        self.configs.is_empty()
    }

    /// Destinations subscribed to `event_key`, in configuration order
    pub fn destinations_for(&self, event_key: &str) -> Vec<Destination> {
        self.configs
            .iter()
            .filter(|config| config.handles(event_key))
            .cloned()
            .map(Destination::new)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(name: &str, actions: &[&str]) -> Configuration {
        let mut config = Configuration::new(name);
        config.actions = actions.iter().map(|a| a.to_string()).collect();
        config
    }

    #[test]
    fn test_destinations_for_preserves_order() {
        let mapper = ConfigurationMapper::new(vec![
            config("b", &["product.update"]),
            config("a", &["*"]),
            config("c", &["product.delete"]),
        ]);

        let names: Vec<_> = mapper
            .destinations_for("product.update")
            .into_iter()
            .map(|d| d.config.name)
            .collect();
        assert_eq!(names, vec!["b", "a"]);
    }

    #[test]
    fn test_no_match() {
        let mapper = ConfigurationMapper::new(vec![config("a", &["x"])]);
        assert!(mapper.destinations_for("y").is_empty());
    }
}
