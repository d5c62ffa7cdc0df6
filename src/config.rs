//! Device configuration, parsed from the option string handed to `Device::init`.

use simple_error::{bail, try_with, SimpleResult};

#[derive(Clone, Debug, Default, PartialEq)]
pub struct DeviceConfig {
    /// 0 is quiet, 1 logs scene statistics on commit.
    pub verbose: u32,
}

impl DeviceConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn verbose(mut self, level: u32) -> Self {
        self.verbose = level;
        self
    }

    /// Parses a comma separated list of `key=value` options, e.g. `"verbose=1"`.
    /// Keys that are not given keep their default.
    pub fn parse(options: &str) -> SimpleResult<Self> {
        let mut config = Self::default();
        for option in options.split(',').map(str::trim).filter(|o| !o.is_empty()) {
            let (key, value) = match option.find('=') {
                Some(i) => (option[..i].trim(), option[i + 1..].trim()),
                None => bail!("missing value for device option \"{}\"", option),
            };
            match key {
                "verbose" => {
                    config.verbose = try_with!(value.parse(), "invalid verbose level \"{}\"", value)
                }
                _ => bail!("unknown device option \"{}\"", key),
            }
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_option_string() {
        let config = DeviceConfig::parse(" verbose = 2 ").unwrap();
        assert_eq!(config, DeviceConfig::new().verbose(2));
    }

    #[test]
    fn empty_string_is_default() {
        assert_eq!(DeviceConfig::parse("").unwrap(), DeviceConfig::default());
        assert_eq!(DeviceConfig::parse(" , ").unwrap(), DeviceConfig::default());
    }

    #[test]
    fn bad_options_are_rejected() {
        assert!(DeviceConfig::parse("verbose").is_err());
        assert!(DeviceConfig::parse("verbose=loud").is_err());
        assert!(DeviceConfig::parse("verbose=-1").is_err());

        let err = DeviceConfig::parse("threads=4").unwrap_err();
        assert_eq!(err.as_str(), "unknown device option \"threads\"");
    }
}
