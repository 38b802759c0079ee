//! Topology discovery against a live session.
//!
//! Every query result is handed to a pure parser so the parsing rules can be
//! exercised with captured device output.

use super::{ContextMode, DeviceTopology, FailoverUnit, SoftwareVersion, INSIDE_INTERFACE_HACK};
use crate::transport::{Scope, Session};
use crate::utils::{BackupError, Result};
use regex::Regex;
use std::sync::LazyLock;
use tracing::{debug, info};

pub const SHOW_VERSION: &str = "show version | include ^Cisco.*Appliance.*Version";
pub const SHOW_MODE: &str = "show mode";
pub const SHOW_FAILOVER: &str = "show failover | include ^Failover (On|Off)";
pub const SHOW_CONTEXT: &str = "show context";
pub const SHOW_INSIDE_INTERFACE: &str = "show interface inside | include ^Interface";

static NUMBER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+").unwrap());
static CONTEXT_MODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Security context mode: (single|multiple)").unwrap());
static FAILOVER_ON: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*Failover On\b").unwrap());
static CONTEXT_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[ *]([A-Za-z0-9\-]+)").unwrap());
static INSIDE_UP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^Interface.*inside.*is up").unwrap());

/// Discover the topology of the device behind `session`.
///
/// On a multiple context device this leaves the session in the system
/// scope, which is where every later backup command has to run.
pub fn inspect<S: Session + ?Sized>(session: &mut S) -> Result<DeviceTopology> {
    let version = parse_version(&session.send(SHOW_VERSION)?)?;
    let context_mode = parse_context_mode(&session.send(SHOW_MODE)?)?;
    let failover_units = parse_failover_units(&session.send(SHOW_FAILOVER)?);

    let (contexts, interface_hack) = match context_mode {
        ContextMode::Multiple => {
            session.change_scope(&Scope::System)?;
            (parse_contexts(&session.send(SHOW_CONTEXT)?), None)
        }
        ContextMode::Single => (
            Vec::new(),
            parse_interface_hack(&session.send(SHOW_INSIDE_INTERFACE)?),
        ),
    };

    let topology = DeviceTopology {
        version,
        context_mode,
        failover_units,
        contexts,
        interface_hack,
    };

    info!(
        version = %topology.version,
        mode = %topology.context_mode,
        standby = topology.has_standby(),
        contexts = ?topology.contexts,
        "Discovered device topology"
    );

    Ok(topology)
}

/// Parse `Cisco Adaptive Security Appliance Software Version 9.16(3)23`.
///
/// Releases without an interim number (`9.1(5)`) parse with `interim = 0`.
pub fn parse_version(output: &str) -> Result<SoftwareVersion> {
    let digits = NUMBER
        .find_iter(output)
        .take(4)
        .map(|m| m.as_str().parse::<u32>())
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|_| BackupError::parse("software version", output))?;

    match digits.as_slice() {
        [major, minor, maintenance, rest @ ..] => Ok(SoftwareVersion::new(
            *major,
            *minor,
            *maintenance,
            rest.first().copied().unwrap_or(0),
        )),
        _ => Err(BackupError::parse("software version", output)),
    }
}

pub fn parse_context_mode(output: &str) -> Result<ContextMode> {
    let caps = CONTEXT_MODE
        .captures(output)
        .ok_or_else(|| BackupError::parse("security context mode", output))?;

    match &caps[1] {
        "multiple" => Ok(ContextMode::Multiple),
        _ => Ok(ContextMode::Single),
    }
}

pub fn parse_failover_units(output: &str) -> Vec<FailoverUnit> {
    let mut units = vec![FailoverUnit::Active];
    if FAILOVER_ON.is_match(output) {
        units.push(FailoverUnit::Standby);
    }
    units
}

/// Context names from `show context`, `*` marking the current context.
pub fn parse_contexts(output: &str) -> Vec<String> {
    output
        .lines()
        .filter_map(|line| CONTEXT_LINE.captures(line))
        .map(|caps| caps[1].to_string())
        .inspect(|name| debug!(context = %name, "Found context"))
        .collect()
}

pub fn parse_interface_hack(output: &str) -> Option<String> {
    INSIDE_UP
        .is_match(output.trim_start())
        .then(|| INSIDE_INTERFACE_HACK.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedSession;

    const SHOW_CONTEXT_OUTPUT: &str = "\
Context Name      Class      Interfaces           Mode         URL
*admin            default    management0/0        Routed       disk0:/admin.cfg
 ctx1             default    GigabitEthernet0/0.10,
                             GigabitEthernet0/1.10 Routed      disk0:/ctx1.cfg
 ctx-2            gold       GigabitEthernet0/2   Transparent  disk0:/ctx-2.cfg

Total active Security Contexts: 3";

    #[test]
    fn test_parse_version() {
        let version =
            parse_version("Cisco Adaptive Security Appliance Software Version 9.16(3)23").unwrap();
        assert_eq!(version, SoftwareVersion::new(9, 16, 3, 23));
    }

    #[test]
    fn test_parse_version_without_interim() {
        let version =
            parse_version("Cisco Adaptive Security Appliance Software Version 9.1(5)").unwrap();
        assert_eq!(version, SoftwareVersion::new(9, 1, 5, 0));
    }

    #[test]
    fn test_parse_version_rejects_garbage() {
        assert!(matches!(
            parse_version("% Invalid input detected at '^' marker."),
            Err(BackupError::Parse { .. })
        ));
        assert!(parse_version("Version 9.16").is_err());
    }

    #[test]
    fn test_parse_version_rejects_oversized_numbers() {
        assert!(matches!(
            parse_version("Cisco Adaptive Security Appliance Software Version 9.16(3)99999999999"),
            Err(BackupError::Parse { .. })
        ));
        assert!(parse_version("Version 99999999999.16(3)23").is_err());
    }

    #[test]
    fn test_parse_context_mode() {
        assert_eq!(
            parse_context_mode("Security context mode: multiple\n").unwrap(),
            ContextMode::Multiple
        );
        assert_eq!(
            parse_context_mode("Security context mode: single").unwrap(),
            ContextMode::Single
        );
        assert!(parse_context_mode("ERROR: % Invalid input").is_err());
    }

    #[test]
    fn test_parse_failover_units() {
        assert_eq!(
            parse_failover_units("Failover On"),
            vec![FailoverUnit::Active, FailoverUnit::Standby]
        );
        assert_eq!(parse_failover_units("Failover Off"), vec![FailoverUnit::Active]);
        assert_eq!(parse_failover_units(""), vec![FailoverUnit::Active]);
        assert_eq!(parse_failover_units("Failover Only"), vec![FailoverUnit::Active]);
    }

    #[test]
    fn test_parse_contexts() {
        assert_eq!(parse_contexts(SHOW_CONTEXT_OUTPUT), vec!["admin", "ctx1", "ctx-2"]);
    }

    #[test]
    fn test_parse_interface_hack() {
        assert_eq!(
            parse_interface_hack(
                "Interface GigabitEthernet0/1 \"inside\", is up, line protocol is up"
            )
            .as_deref(),
            Some(";int=inside")
        );
        assert_eq!(
            parse_interface_hack(
                "Interface GigabitEthernet0/1 \"inside\", is administratively down, line protocol is down"
            ),
            None
        );
        assert_eq!(parse_interface_hack("ERROR: inside not found"), None);
    }

    #[test]
    fn test_inspect_multiple_context_failover() {
        let mut session = ScriptedSession::new()
            .reply(SHOW_VERSION, "Cisco Adaptive Security Appliance Software Version 9.16(3)23")
            .reply(SHOW_MODE, "Security context mode: multiple")
            .reply(SHOW_FAILOVER, "Failover On")
            .reply(SHOW_CONTEXT, SHOW_CONTEXT_OUTPUT);

        let topology = inspect(&mut session).unwrap();

        assert_eq!(topology.context_mode, ContextMode::Multiple);
        assert_eq!(
            topology.failover_units,
            vec![FailoverUnit::Active, FailoverUnit::Standby]
        );
        assert_eq!(topology.contexts, vec!["admin", "ctx1", "ctx-2"]);
        assert_eq!(topology.interface_hack, None);
        assert_eq!(
            session.sent(),
            vec![SHOW_VERSION, SHOW_MODE, SHOW_FAILOVER, "changeto system", SHOW_CONTEXT]
        );
    }

    #[test]
    fn test_inspect_single_context_with_inside_up() {
        let mut session = ScriptedSession::new()
            .reply(SHOW_VERSION, "Cisco Adaptive Security Appliance Software Version 9.8(4)10")
            .reply(SHOW_MODE, "Security context mode: single")
            .reply(SHOW_FAILOVER, "Failover Off")
            .reply(
                SHOW_INSIDE_INTERFACE,
                "Interface GigabitEthernet0/1 \"inside\", is up, line protocol is up",
            );

        let topology = inspect(&mut session).unwrap();

        assert_eq!(topology.context_mode, ContextMode::Single);
        assert_eq!(topology.failover_units, vec![FailoverUnit::Active]);
        assert!(topology.contexts.is_empty());
        assert_eq!(topology.interface_hack.as_deref(), Some(";int=inside"));
        assert!(!session.sent().iter().any(|c| c.starts_with("changeto")));
    }

    #[test]
    fn test_inspect_aborts_on_unknown_mode() {
        let mut session = ScriptedSession::new()
            .reply(SHOW_VERSION, "Cisco Adaptive Security Appliance Software Version 9.16(3)23")
            .reply(SHOW_MODE, "% Invalid input detected");

        assert!(matches!(inspect(&mut session), Err(BackupError::Parse { .. })));
        assert_eq!(session.sent(), vec![SHOW_VERSION, SHOW_MODE]);
    }
}
