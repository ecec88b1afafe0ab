//! Keyword/value options for contact laws.
//!
//! Laws declare their on/off switches in `register_settings`, the pair style
//! parses the user's tokens once, and each law reads its values back in
//! `load_settings`.

use std::collections::BTreeMap;

use crate::error::{GranularError, Result};

#[derive(Debug, Default)]
pub struct Settings {
    on_off: BTreeMap<String, bool>,
}

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares an on/off option. Registering an existing keyword again shares it.
    pub fn register_on_off(&mut self, name: &str, default: bool) {
        self.on_off.entry(name.to_string()).or_insert(default);
    }

    /// Consumes `keyword value` pairs, rejecting anything not registered.
    pub fn parse_arguments<S: AsRef<str>>(&mut self, args: &[S]) -> Result<()> {
        let mut tokens = args.iter().map(AsRef::as_ref);
        while let Some(keyword) = tokens.next() {
            let slot = self
                .on_off
                .get_mut(keyword)
                .ok_or_else(|| GranularError::UnknownSetting(keyword.to_string()))?;
            let value = tokens
                .next()
                .ok_or_else(|| GranularError::MissingSettingValue(keyword.to_string()))?;
            *slot = parse_on_off(value).ok_or_else(|| GranularError::InvalidSettingValue {
                keyword: keyword.to_string(),
                value: value.to_string(),
            })?;
        }
        Ok(())
    }

    /// Current value of a registered option.
    pub fn on_off(&self, name: &str) -> Result<bool> {
        self.on_off
            .get(name)
            .copied()
            .ok_or_else(|| GranularError::UnknownSetting(name.to_string()))
    }

    pub fn keywords(&self) -> impl Iterator<Item = &str> {
        self.on_off.keys().map(String::as_str)
    }
}

fn parse_on_off(value: &str) -> Option<bool> {
    match value.to_lowercase().as_str() {
        "on" | "yes" | "true" => Some(true),
        "off" | "no" | "false" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_registered_options() {
        let mut settings = Settings::new();
        settings.register_on_off("tangential_damping", true);
        settings.register_on_off("viscous", false);

        settings
            .parse_arguments(&["viscous", "on", "tangential_damping", "off"])
            .unwrap();
        assert!(settings.on_off("viscous").unwrap());
        assert!(!settings.on_off("tangential_damping").unwrap());
    }

    #[test]
    fn test_defaults_survive_empty_arguments() {
        let mut settings = Settings::new();
        settings.register_on_off("limitForce", false);
        settings.parse_arguments::<&str>(&[]).unwrap();
        assert!(!settings.on_off("limitForce").unwrap());
    }

    #[test]
    fn test_unknown_keyword_rejected() {
        let mut settings = Settings::new();
        settings.register_on_off("viscous", false);
        let err = settings.parse_arguments(&["cohesion", "on"]).unwrap_err();
        assert!(matches!(err, GranularError::UnknownSetting(ref k) if k == "cohesion"));
        assert!(err.is_config_error());
    }

    #[test]
    fn test_bad_and_missing_values() {
        let mut settings = Settings::new();
        settings.register_on_off("viscous", false);
        assert!(matches!(
            settings.parse_arguments(&["viscous", "maybe"]),
            Err(GranularError::InvalidSettingValue { .. })
        ));
        assert!(matches!(
            settings.parse_arguments(&["viscous"]),
            Err(GranularError::MissingSettingValue(_))
        ));
    }

    #[test]
    fn test_duplicate_registration_keeps_first_default() {
        let mut settings = Settings::new();
        settings.register_on_off("tangential_damping", true);
        settings.register_on_off("tangential_damping", false);
        assert!(settings.on_off("tangential_damping").unwrap());
        assert_eq!(settings.keywords().count(), 1);
    }
}
