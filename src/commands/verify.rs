//! Verify command - validates configuration and object definitions

use anyhow::Result;
use colored::Colorize;
use std::path::PathBuf;

use super::common::{load_config, load_objects};
use crate::objects::ObjectStore;

/// Definitions that load fine but will never be actively checked
fn unchecked_objects(objects: &ObjectStore) -> Vec<String> {
    let hosts = objects
        .hosts
        .iter()
        .filter(|host| host.check_command.is_none())
        .map(|host| format!("host {} has no check command (assumed UP)", host.name));
    let services = objects
        .services
        .iter()
        .filter(|service| service.check_command.is_none())
        .map(|service| {
            format!(
                "service {}/{} has no check command",
                service.host_name, service.description
            )
        });
    hosts.chain(services).collect()
}

/// Execute the verify command
pub fn execute(config_path: Option<PathBuf>, objects_path: PathBuf) -> Result<()> {
    let config = load_config(config_path.as_deref())?;
    println!("{} Configuration", "✓".green().bold());

    let (objects, periods) = load_objects(&objects_path, &config)?;
    println!(
        "{} {} hosts, {} services, {} time periods",
        "✓".green().bold(),
        objects.hosts.len(),
        objects.services.len(),
        periods.len()
    );
    println!(
        "{} {} host and {} service dependencies",
        "✓".green().bold(),
        objects.host_dependencies.len(),
        objects.service_dependencies.len()
    );

    for warning in unchecked_objects(&objects) {
        println!("  {} {}", "⚠".yellow().bold(), warning);
    }
    println!("\n{} Definitions are valid", "✓".green().bold());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_unchecked_objects_listed() {
        let mut objects = ObjectStore::new();
        let host = objects.add_host("web1").unwrap();
        objects.host_mut(host).check_command = Some("check_dummy 0".to_string());
        objects.add_service(host, "http").unwrap();

        assert_eq!(
            unchecked_objects(&objects),
            vec!["service web1/http has no check command".to_string()]
        );
    }

    #[test]
    fn test_verify_accepts_valid_definitions() {
        let temp = tempfile::tempdir().unwrap();
        let config = temp.path().join("vigil.toml");
        fs::write(
            &config,
            format!("check_result_path = {:?}\n", temp.path().join("spool")),
        )
        .unwrap();
        let objects = temp.path().join("objects.yaml");
        fs::write(
            &objects,
            "hosts:\n  - name: web1\n    check_command: check_dummy 0\nservices:\n  - host: web1\n    description: http\n    check_command: check_dummy 0\n",
        )
        .unwrap();

        assert!(execute(Some(config), objects).is_ok());
    }
}
