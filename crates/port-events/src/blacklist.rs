//! Connectors that must never trigger discovery

use port_detect::ConnectorId;
use serde::{Deserialize, Serialize};

/// Static set of ignored connectors, matched case-insensitively
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Blacklist {
    entries: Vec<String>,
}

impl Blacklist {
    pub fn new<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            entries: entries
                .into_iter()
                .map(Into::into)
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
        }
    }

    /// Parse a comma-separated list ("COM1, COM5")
    pub fn parse(list: &str) -> Self {
        Self::new(list.split(','))
    }

    pub fn contains(&self, connector: &ConnectorId) -> bool {
        self.entries.iter().any(|e| connector.eq_ignore_case(e))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_case_insensitive_match() {
        let blacklist = Blacklist::new(["COM5"]);
        assert!(blacklist.contains(&ConnectorId::from("COM5")));
        assert!(blacklist.contains(&ConnectorId::from("com5")));
        assert!(!blacklist.contains(&ConnectorId::from("COM50")));
        assert!(!blacklist.contains(&ConnectorId::from("COM")));
    }

    #[test]
    fn test_parse_comma_list() {
        let blacklist = Blacklist::parse(" COM1, ,/dev/ttyS0 ,");
        assert_eq!(blacklist.entries(), ["COM1", "/dev/ttyS0"]);
        assert!(Blacklist::parse("").is_empty());
    }

    #[test]
    fn test_deserialize_from_list() {
        let blacklist: Blacklist = serde_json::from_str(r#"["COM3"]"#).unwrap();
        assert!(blacklist.contains(&ConnectorId::from("com3")));
    }
}
