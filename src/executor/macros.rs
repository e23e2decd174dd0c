//! `$MACRO$` substitution in check command lines

use regex::{Captures, Regex};
use shell_escape::escape;
use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::OnceLock;

use crate::models::{Host, Service};

fn macro_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\$\$|\$([A-Z][A-Z0-9_]*)\$").expect("Invalid macro pattern")
    })
}

/// Values available to a command line
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MacroContext {
    pub host_name: String,
    pub host_alias: String,
    pub host_address: String,
    pub host_state: String,
    pub host_attempt: u32,
    pub service_description: Option<String>,
    pub service_state: Option<String>,
    pub service_attempt: Option<u32>,
    /// `$ARG1$`, `$ARG2$`, ... from `command!arg1!arg2`
    pub args: Vec<String>,
}

impl MacroContext {
    pub fn for_host(host: &Host, args: Vec<String>) -> Self {
        Self {
            host_name: host.name.clone(),
            host_alias: host.alias.clone(),
            host_address: host.address.clone(),
            host_state: host.current_state.to_string(),
            host_attempt: host.current_attempt,
            args,
            ..Self::default()
        }
    }

    pub fn for_service(host: &Host, service: &Service, args: Vec<String>) -> Self {
        Self {
            service_description: Some(service.description.clone()),
            service_state: Some(service.current_state.to_string()),
            service_attempt: Some(service.current_attempt),
            ..Self::for_host(host, args)
        }
    }

    fn lookup(&self, name: &str) -> Option<String> {
        let value = match name {
            "HOSTNAME" => self.host_name.clone(),
            "HOSTALIAS" => self.host_alias.clone(),
            "HOSTADDRESS" => self.host_address.clone(),
            "HOSTSTATE" => self.host_state.clone(),
            "HOSTATTEMPT" => self.host_attempt.to_string(),
            "SERVICEDESC" => self.service_description.clone()?,
            "SERVICESTATE" => self.service_state.clone()?,
            "SERVICEATTEMPT" => self.service_attempt?.to_string(),
            _ => {
                // Arguments are inserted verbatim; they are part of the
                // command definition, not of monitored data
                let n: usize = name.strip_prefix("ARG")?.parse().ok()?;
                return self.args.get(n.checked_sub(1)?).cloned();
            }
        };
        Some(escape(Cow::Owned(value)).into_owned())
    }
}

/// Split `name!arg1!arg2` into the command name and its arguments
pub fn split_check_command(check_command: &str) -> (&str, Vec<String>) {
    let mut parts = check_command.split('!');
    let name = parts.next().unwrap_or("").trim();
    (name, parts.map(str::to_string).collect())
}

/// Resolve a check command reference to a raw command line template and
/// its arguments. A name with no command definition is used as the
/// command line itself.
pub fn resolve_command(
    check_command: &str,
    commands: &HashMap<String, String>,
) -> (String, Vec<String>) {
    let (name, args) = split_check_command(check_command);
    match commands.get(name) {
        Some(template) => (template.clone(), args),
        None => (name.to_string(), args),
    }
}

/// Substitute macros in `template`. `$$` yields a literal `$`; unknown
/// macros are left in place.
pub fn expand_command(template: &str, context: &MacroContext) -> String {
    macro_pattern()
        .replace_all(template, |caps: &Captures| match caps.get(1) {
            None => "$".to_string(),
            Some(name) => context
                .lookup(name.as_str())
                .unwrap_or_else(|| caps[0].to_string()),
        })
        .into_owned()
}
