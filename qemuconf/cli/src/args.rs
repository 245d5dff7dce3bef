mod edit;
mod profile;

use anyhow::{Context, Result};
use std::io::Read;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use qemuconf_core::{
    cmdline::{join_args, render_command_line, split_command_line},
    data::MEMORY_CANDIDATES_MB,
    error::Warning,
    generate,
    host::parse_cpu_help,
    parse, HostCapabilities, VmHardwareConfig,
};

use profile::Format;

#[derive(Debug, Parser)]
#[command(version, about = "Read, edit and generate QEMU hardware settings")]
pub(crate) struct Args {
    #[command(subcommand)]
    command: Command,
    #[arg(long, global = true, help = "File holding the output of `qemu-system-* -cpu help`")]
    cpu_help: Option<PathBuf>,
    #[arg(long, global = true, help = "Number of logical host CPUs, detected when omitted")]
    host_cpus: Option<usize>,
    #[command(flatten)]
    pub(crate) verbose: clap_verbosity_flag::Verbosity<clap_verbosity_flag::WarnLevel>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Read a QEMU command line and print the resulting profile
    Parse {
        #[arg(long, conflicts_with = "tokens", help = "Command line as a single string")]
        cmdline: Option<String>,
        #[arg(long, default_value = "toml")]
        format: Format,
        #[arg(last = true, help = "Command line tokens, read from stdin when neither these nor --cmdline are given")]
        tokens: Vec<String>,
    },
    /// Print the QEMU arguments for a profile
    Generate {
        profile: PathBuf,
        #[arg(long, help = "Print the complete command line, including the executable and unrecognized options")]
        full: bool,
    },
    /// Apply edits to a profile
    Edit(edit::EditArgs),
    /// Summarize a profile
    Show { profile: PathBuf },
}

impl Args {
    pub(crate) fn run(self) -> Result<()> {
        let host = self.host()?;
        match self.command {
            Command::Parse { cmdline, format, tokens } => {
                let tokens = match (cmdline, tokens.is_empty()) {
                    (Some(cmdline), _) => split_command_line(&cmdline).context("Couldn't split command line")?,
                    (None, false) => tokens,
                    (None, true) => {
                        let mut input = String::new();
                        std::io::stdin()
                            .read_to_string(&mut input)
                            .context("Couldn't read command line from stdin")?;
                        split_command_line(&input).context("Couldn't split command line")?
                    }
                };
                let (config, warnings) = parse(&tokens, &host);
                report(&warnings);
                print!("{}", format.serialize(&config.to_store())?);
            }
            Command::Generate { profile, full } => {
                let config = profile::load(&profile, &host)?;
                if full {
                    println!("{}", render_command_line(&config));
                } else {
                    generate(&config).iter().for_each(|arg| println!("{arg}"));
                }
            }
            Command::Edit(args) => args.run(&host)?,
            Command::Show { profile } => {
                let config = profile::load(&profile, &host)?;
                summary(&config).iter().for_each(|line| println!("{line}"));
            }
        }
        Ok(())
    }

    fn host(&self) -> Result<HostCapabilities> {
        let logical_cpus = self.host_cpus.unwrap_or_else(num_cpus::get);
        let cpu_models = self.cpu_help.as_deref().map(read_cpu_help).transpose()?.unwrap_or_default();
        log::debug!("Host has {logical_cpus} logical CPUs and {} known CPU models", cpu_models.len());
        Ok(HostCapabilities::from_count(logical_cpus, cpu_models))
    }
}

fn read_cpu_help(path: &Path) -> Result<Vec<String>> {
    let output = std::fs::read_to_string(path).with_context(|| format!("Couldn't read CPU list {}", path.display()))?;
    Ok(parse_cpu_help(&output))
}

fn summary(config: &VmHardwareConfig) -> Vec<String> {
    let mut lines: Vec<String> = config
        .executable()
        .map(|executable| format!("Executable: {executable}"))
        .into_iter()
        .chain(
            config
                .display()
                .iter()
                .map(|display| format!(" - {}: {}", display.name, display.value)),
        )
        .collect();
    if !config.memory().is_candidate() {
        let sizes = MEMORY_CANDIDATES_MB.map(|size| size.to_string()).join(", ");
        lines.push(format!("   RAM is not one of the usual sizes ({sizes} MiB)"));
    }
    lines.extend(
        config
            .extra_args()
            .iter()
            .map(|arg| format!(" - Other: {}", join_args(&arg.to_args()))),
    );
    lines
}

pub(crate) fn report(warnings: &[Warning]) {
    warnings.iter().for_each(|warning| log::warn!("{warning}"));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_flags_unusual_memory_and_lists_other_options() {
        let host = HostCapabilities::from_count(4, vec![]);
        let (config, _) = parse(&["qemu-system-x86_64", "-m", "3000", "-name", "my vm", "disk.img"], &host);
        let lines = summary(&config);
        assert_eq!(lines[0], "Executable: qemu-system-x86_64");
        assert!(lines.contains(&" - RAM: 3000 MiB".to_string()));
        assert!(lines.iter().any(|line| line.starts_with("   RAM is not one of the usual sizes (256, 512")));
        assert_eq!(lines[lines.len() - 2..], [" - Other: -name 'my vm'", " - Other: disk.img"]);

        let (config, _) = parse(&["-m", "4G"], &host);
        assert!(!summary(&config).iter().any(|line| line.contains("usual sizes")));
    }
}
