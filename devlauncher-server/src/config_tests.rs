//! Configuration tests for defaults, file layering and environment overrides

#[cfg(test)]
mod tests {
    use super::super::config::{Config, LogFormat};
    use crate::Error;
    use serial_test::serial;
    use std::env;
    use std::io::Write;

    #[test]
    fn test_default_config_values() {
        let config = Config::default();

        assert!(config.database.url.starts_with("sqlite:"));
        assert_eq!(config.database.max_connections, Some(5));
        assert!(config.database.migrate_on_startup);
        assert_eq!(config.templates.root.to_str(), Some("./templates"));
        assert_eq!((config.ports.min, config.ports.max), (3000, 9999));
        assert_eq!(config.ports.excluded.len(), 18);
        assert_eq!(config.ports.max_reservation_retries, 5);
        assert_eq!(config.execution.container_cli, "docker");
        assert_eq!(config.logging.format, LogFormat::Pretty);
        assert!(config.validate().is_ok());
    }

    #[test]
    #[serial]
    fn test_load_without_files_uses_defaults() {
        let config = Config::load().unwrap();
        assert_eq!(config.ports.max_attempts, 100);
        assert_eq!(config.execution.subsystem_distro, "Ubuntu");
    }

    #[test]
    #[serial]
    fn test_explicit_file_is_layered() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[ports]\nmin = 4000\nmax = 4100\nexcluded = [4001]\n\n[logging]\nformat = \"json\"\n\n[execution]\nsubsystem_distro = \"Debian\""
        )
        .unwrap();

        let config = Config::load_from_file(file.path()).unwrap();
        assert_eq!((config.ports.min, config.ports.max), (4000, 4100));
        assert!(config.ports.is_excluded(4001));
        assert!(!config.ports.is_excluded(8080));
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.execution.subsystem_distro, "Debian");
        assert_eq!(config.execution.container_cli, "docker");
    }

    #[test]
    #[serial]
    fn test_environment_variable_override() {
        env::set_var("DEVLAUNCHER_PORTS__MIN", "5000");
        env::set_var("DEVLAUNCHER_DATABASE__URL", "sqlite:/tmp/devlauncher-test.db");

        let result = Config::load();

        env::remove_var("DEVLAUNCHER_PORTS__MIN");
        env::remove_var("DEVLAUNCHER_DATABASE__URL");

        let config = result.unwrap();
        assert_eq!(config.ports.min, 5000);
        assert_eq!(config.database.url, "sqlite:/tmp/devlauncher-test.db");
    }

    #[test]
    #[serial]
    fn test_inverted_port_range_is_rejected() {
        env::set_var("DEVLAUNCHER_PORTS__MIN", "9000");
        env::set_var("DEVLAUNCHER_PORTS__MAX", "8000");

        let result = Config::load();

        env::remove_var("DEVLAUNCHER_PORTS__MIN");
        env::remove_var("DEVLAUNCHER_PORTS__MAX");

        let err = result.unwrap_err();
        assert!(matches!(err, Error::Core(ref core) if core.category() == "configuration"));
    }

    #[test]
    fn test_empty_container_cli_is_rejected() {
        let mut config = Config::default();
        config.execution.container_cli = " ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_projects_root_fallback() {
        let mut config = Config::default();
        let root = config.projects.resolved_root();
        assert!(root.ends_with("devlauncher-projects") || root == std::path::Path::new("./projects"));

        config.projects.root = Some("/srv/projects".into());
        assert_eq!(config.projects.resolved_root().to_str(), Some("/srv/projects"));
    }
}
