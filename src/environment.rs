use strum::{Display, EnumString};

/// Deployment environment, selects `config/{environment}.toml`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, EnumString, Display)]
#[strum(serialize_all = "snake_case")]
pub enum Environment {
    #[default]
    Development,
    Production,
    Test,
}

impl Environment {
    /// Developer conveniences such as `issue-token` are off in production.
    pub fn allows_dev_tools(self) -> bool {
        self != Self::Production
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn test_parses_config_names() {
        assert_eq!(Environment::from_str("production").unwrap(), Environment::Production);
        assert_eq!(Environment::Test.to_string(), "test");
        assert!(Environment::from_str("staging").is_err());
    }

    #[test]
    fn test_dev_tools_are_disabled_in_production() {
        assert!(Environment::Development.allows_dev_tools());
        assert!(!Environment::Production.allows_dev_tools());
    }
}
