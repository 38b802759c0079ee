//! Literal command sequences for each capture step.
//!
//! Tech-support output and backup archives cannot be written to an scp
//! destination directly, so both are staged on `flash:/`, copied out, and
//! deleted again.

use super::{CommandBatch, CommandPlan, ContextSource};
use crate::destination::{ArtifactKind, SYSTEM_CONTEXT};
use crate::topology::{DeviceTopology, FailoverUnit, MIN_FULL_BACKUP_VERSION};
use tracing::info;

pub struct PlanBuilder<'a> {
    topology: &'a DeviceTopology,
    url: &'a str,
    passphrase: &'a str,
}

impl<'a> PlanBuilder<'a> {
    pub fn new(topology: &'a DeviceTopology, url: &'a str, passphrase: &'a str) -> Self {
        Self {
            topology,
            url,
            passphrase,
        }
    }

    fn copy_to_destination(&self, source: &str, file: &str) -> String {
        format!(
            "copy /noconfirm {} {}/{}{}",
            source,
            self.url,
            file,
            self.topology.url_suffix()
        )
    }

    fn staged(&self, unit: FailoverUnit, create: String, file: &str) -> CommandBatch {
        CommandBatch::new(
            unit,
            vec![
                create,
                self.copy_to_destination(&format!("flash:/{}", file), file),
                format!("delete /noconfirm flash:/{}", file),
            ],
        )
    }

    pub fn tech_support(&self, unit: FailoverUnit) -> CommandBatch {
        let file = ArtifactKind::TechSupport.file_name(unit);
        self.staged(unit, format!("show tech-support file flash:/{}", file), &file)
    }

    /// Running and startup config, then one copy per resolved context.
    pub fn configuration(&self, unit: FailoverUnit, sources: &[ContextSource]) -> CommandBatch {
        let mut commands = vec![
            self.copy_to_destination(
                "running-config",
                &ArtifactKind::RunningConfig.file_name(unit),
            ),
            self.copy_to_destination(
                "startup-config",
                &ArtifactKind::StartupConfig.file_name(unit),
            ),
        ];

        commands.extend(sources.iter().map(|src| {
            self.copy_to_destination(
                &src.source,
                &ArtifactKind::ContextConfig(&src.context).file_name(unit),
            )
        }));

        CommandBatch::new(unit, commands)
    }

    /// Full backup archives, one batch per archive. Empty when the firmware
    /// predates the `backup` command.
    pub fn full_backup(&self, unit: FailoverUnit) -> Vec<CommandBatch> {
        if !self.topology.version.supports_full_backup() {
            info!(
                unit = %unit,
                version = %self.topology.version,
                "Backup command not available before {}, skipping full backup",
                MIN_FULL_BACKUP_VERSION
            );
            return Vec::new();
        }

        if !self.topology.has_contexts() {
            let file = ArtifactKind::Archive(None).file_name(unit);
            let create = format!(
                "backup /noconfirm passphrase {} location flash:/{}",
                self.passphrase, file
            );
            return vec![self.staged(unit, create, &file)];
        }

        std::iter::once(SYSTEM_CONTEXT)
            .chain(self.topology.contexts.iter().map(String::as_str))
            .map(|context| {
                let file = ArtifactKind::Archive(Some(context)).file_name(unit);
                let create = format!(
                    "backup /noconfirm context {} passphrase {} location flash:/{}",
                    context, self.passphrase, file
                );
                self.staged(unit, create, &file)
            })
            .collect()
    }

    /// Everything for one unit: tech-support, configuration, full backup.
    pub fn unit_plan(&self, unit: FailoverUnit, sources: &[ContextSource]) -> CommandPlan {
        let mut plan = vec![self.tech_support(unit), self.configuration(unit, sources)];
        plan.extend(self.full_backup(unit));
        plan
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::command_count;
    use crate::topology::{ContextMode, SoftwareVersion};

    const URL: &str = "scp://backup:pw@10.0.0.5//backup/asa1/daily_2";

    fn single(version: SoftwareVersion, hack: Option<&str>) -> DeviceTopology {
        DeviceTopology {
            version,
            context_mode: ContextMode::Single,
            failover_units: vec![FailoverUnit::Active],
            contexts: vec![],
            interface_hack: hack.map(str::to_string),
        }
    }

    fn multiple(contexts: &[&str]) -> DeviceTopology {
        DeviceTopology {
            version: SoftwareVersion::new(9, 16, 3, 23),
            context_mode: ContextMode::Multiple,
            failover_units: vec![FailoverUnit::Active, FailoverUnit::Standby],
            contexts: contexts.iter().map(|c| c.to_string()).collect(),
            interface_hack: None,
        }
    }

    fn sources(contexts: &[&str]) -> Vec<ContextSource> {
        contexts
            .iter()
            .map(|c| ContextSource {
                context: c.to_string(),
                source: format!("disk0:/{}.cfg", c),
            })
            .collect()
    }

    #[test]
    fn test_tech_support_commands() {
        let topology = single(SoftwareVersion::new(9, 8, 4, 0), Some(";int=inside"));
        let builder = PlanBuilder::new(&topology, URL, "pass");

        let batch = builder.tech_support(FailoverUnit::Active);

        assert_eq!(batch.target, FailoverUnit::Active);
        assert_eq!(
            batch.commands,
            vec![
                "show tech-support file flash:/tech-support_active.txt".to_string(),
                format!(
                    "copy /noconfirm flash:/tech-support_active.txt {}/tech-support_active.txt;int=inside",
                    URL
                ),
                "delete /noconfirm flash:/tech-support_active.txt".to_string(),
            ]
        );
    }

    #[test]
    fn test_configuration_with_contexts() {
        let topology = multiple(&["ctx1", "ctx2"]);
        let builder = PlanBuilder::new(&topology, URL, "pass");

        let batch = builder.configuration(FailoverUnit::Standby, &sources(&["ctx1", "ctx2"]));

        assert_eq!(
            batch.commands,
            vec![
                format!("copy /noconfirm running-config {}/running-config_standby.cfg", URL),
                format!("copy /noconfirm startup-config {}/startup-config_standby.cfg", URL),
                format!("copy /noconfirm disk0:/ctx1.cfg {}/context_ctx1_standby.cfg", URL),
                format!("copy /noconfirm disk0:/ctx2.cfg {}/context_ctx2_standby.cfg", URL),
            ]
        );
    }

    #[test]
    fn test_single_context_plan_has_eight_commands() {
        let topology = single(SoftwareVersion::new(9, 12, 4, 0), None);
        let builder = PlanBuilder::new(&topology, URL, "pass");

        let plan = builder.unit_plan(FailoverUnit::Active, &[]);

        assert_eq!(command_count(&plan, FailoverUnit::Active), 8);
        assert_eq!(command_count(&plan, FailoverUnit::Standby), 0);

        let archive = &plan[2];
        assert_eq!(
            archive.commands[0],
            "backup /noconfirm passphrase pass location flash:/backup_active.tar.gz"
        );
    }

    #[test]
    fn test_multiple_context_full_backup() {
        let topology = multiple(&["ctx1", "ctx2"]);
        let builder = PlanBuilder::new(&topology, URL, "Se(r)et");

        for unit in [FailoverUnit::Active, FailoverUnit::Standby] {
            let batches = builder.full_backup(unit);
            assert_eq!(command_count(&batches, unit), 9);

            let creates: Vec<&str> = batches.iter().map(|b| b.commands[0].as_str()).collect();
            assert_eq!(
                creates,
                vec![
                    format!("backup /noconfirm context system passphrase Se(r)et location flash:/backup_system_{}.tar.gz", unit),
                    format!("backup /noconfirm context ctx1 passphrase Se(r)et location flash:/backup_ctx1_{}.tar.gz", unit),
                    format!("backup /noconfirm context ctx2 passphrase Se(r)et location flash:/backup_ctx2_{}.tar.gz", unit),
                ]
            );
        }
    }

    #[test]
    fn test_old_firmware_skips_full_backup() {
        let topology = single(SoftwareVersion::new(9, 1, 5, 0), None);
        let builder = PlanBuilder::new(&topology, URL, "pass");

        assert!(builder.full_backup(FailoverUnit::Active).is_empty());

        let plan = builder.unit_plan(FailoverUnit::Active, &[]);
        assert_eq!(command_count(&plan, FailoverUnit::Active), 5);
        assert!(plan
            .iter()
            .flat_map(|b| &b.commands)
            .all(|c| !c.starts_with("backup ")));
    }

    #[test]
    fn test_unit_plan_orders_steps() {
        let topology = multiple(&["ctxA"]);
        let builder = PlanBuilder::new(&topology, URL, "pass");

        let plan = builder.unit_plan(FailoverUnit::Standby, &sources(&["ctxA"]));

        assert_eq!(plan.len(), 4);
        assert!(plan.iter().all(|b| b.target == FailoverUnit::Standby));
        assert!(plan[0].commands[0].starts_with("show tech-support"));
        assert!(plan[1].commands[0].contains("running-config"));
        assert!(plan[1].commands[2].contains("context_ctxA_standby.cfg"));
        assert!(plan[2].commands[0].starts_with("backup /noconfirm context system"));
        assert!(plan[3].commands[0].starts_with("backup /noconfirm context ctxA"));
        assert_eq!(command_count(&plan, FailoverUnit::Standby), 3 + 3 + 9);
    }
}
