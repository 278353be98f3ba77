//! INI file configuration adapter.

use std::path::Path;

use configparser::ini::Ini;

use crate::domain::error::SigtraderError;
use crate::ports::config_port::ConfigPort;

#[derive(Debug)]
pub struct FileConfigAdapter {
    config: Ini,
}

impl FileConfigAdapter {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, SigtraderError> {
        let path = path.as_ref();
        let mut config = Ini::new();
        config.load(path).map_err(|reason| SigtraderError::ConfigParse {
            file: path.display().to_string(),
            reason,
        })?;
        Ok(Self { config })
    }

    pub fn from_string(content: &str) -> Result<Self, SigtraderError> {
        let mut config = Ini::new();
        config
            .read(content.to_string())
            .map_err(|reason| SigtraderError::ConfigParse {
                file: "<string>".to_string(),
                reason,
            })?;
        Ok(Self { config })
    }

    fn parse_bool(value: &str) -> Option<bool> {
        match value.trim().to_lowercase().as_str() {
            "true" | "yes" | "on" | "1" => Some(true),
            "false" | "no" | "off" | "0" => Some(false),
            _ => None,
        }
    }
}

impl ConfigPort for FileConfigAdapter {
    fn get_string(&self, section: &str, key: &str) -> Option<String> {
        self.config
            .get(section, key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn get_int(&self, section: &str, key: &str, default: i64) -> i64 {
        self.config
            .getint(section, key)
            .ok()
            .flatten()
            .unwrap_or(default)
    }

    fn get_double(&self, section: &str, key: &str, default: f64) -> f64 {
        self.config
            .getfloat(section, key)
            .ok()
            .flatten()
            .unwrap_or(default)
    }

    fn get_bool(&self, section: &str, key: &str, default: bool) -> bool {
        self.config
            .get(section, key)
            .as_deref()
            .and_then(Self::parse_bool)
            .unwrap_or(default)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", content).unwrap();
        file
    }

    #[test]
    fn from_string_parses_config() {
        let content = r#"
[postgres]
connection_string = host=localhost dbname=crypto_data

[pipeline]
symbols = BTC/USDT,ETH/USDT

[strategy]
short_window = 10
"#;
        let adapter = FileConfigAdapter::from_string(content).unwrap();
        assert_eq!(
            adapter.get_string("postgres", "connection_string"),
            Some("host=localhost dbname=crypto_data".to_string())
        );
        assert_eq!(
            adapter.get_string("pipeline", "symbols"),
            Some("BTC/USDT,ETH/USDT".to_string())
        );
    }

    #[test]
    fn get_string_returns_none_for_missing_or_blank() {
        let adapter =
            FileConfigAdapter::from_string("[data]\nsource = csv\ncsv_dir =\n").unwrap();
        assert_eq!(adapter.get_string("data", "missing"), None);
        assert_eq!(adapter.get_string("missing_section", "key"), None);
        assert_eq!(adapter.get_string("data", "csv_dir"), None);
    }

    #[test]
    fn keys_are_case_insensitive() {
        let adapter = FileConfigAdapter::from_string("[Strategy]\nShort_Window = 12\n").unwrap();
        assert_eq!(adapter.get_int("strategy", "short_window", 0), 12);
    }

    #[test]
    fn get_int_returns_value_or_default() {
        let adapter =
            FileConfigAdapter::from_string("[strategy]\nlong_window = 50\nbad = abc\n").unwrap();
        assert_eq!(adapter.get_int("strategy", "long_window", 0), 50);
        assert_eq!(adapter.get_int("strategy", "missing", 42), 42);
        assert_eq!(adapter.get_int("strategy", "bad", 42), 42);
    }

    #[test]
    fn get_double_returns_value_or_default() {
        let adapter = FileConfigAdapter::from_string(
            "[backtest]\ninitial_capital = 50000.5\ninvestment_fraction = lots\n",
        )
        .unwrap();
        assert_eq!(adapter.get_double("backtest", "initial_capital", 0.0), 50000.5);
        assert_eq!(adapter.get_double("backtest", "missing", 0.4), 0.4);
        assert_eq!(adapter.get_double("backtest", "investment_fraction", 0.4), 0.4);
    }

    #[test]
    fn get_bool_values() {
        let adapter = FileConfigAdapter::from_string(
            "[pipeline]\na = true\nb = yes\nc = 0\nd = off\ne = maybe\n",
        )
        .unwrap();
        assert!(adapter.get_bool("pipeline", "a", false));
        assert!(adapter.get_bool("pipeline", "b", false));
        assert!(!adapter.get_bool("pipeline", "c", true));
        assert!(!adapter.get_bool("pipeline", "d", true));
        assert!(adapter.get_bool("pipeline", "e", true));
        assert!(!adapter.get_bool("pipeline", "missing", false));
    }

    #[test]
    fn from_file_reads_config() {
        let file = create_temp_config("[sqlite]\npath = /tmp/signals.db\n");
        let adapter = FileConfigAdapter::from_file(file.path()).unwrap();
        assert_eq!(
            adapter.get_string("sqlite", "path"),
            Some("/tmp/signals.db".to_string())
        );
    }

    #[test]
    fn from_file_missing_is_parse_error() {
        let err = FileConfigAdapter::from_file("/nonexistent/path/config.ini").unwrap_err();
        match err {
            SigtraderError::ConfigParse { file, .. } => {
                assert_eq!(file, "/nonexistent/path/config.ini");
            }
            other => panic!("expected ConfigParse, got: {other}"),
        }
    }
}
