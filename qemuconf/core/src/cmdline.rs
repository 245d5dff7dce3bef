//! Conversion between a shell-style command line and argument vectors.

use std::borrow::Cow;

use itertools::Itertools;

use crate::{args::generate, config::VmHardwareConfig, error::CmdlineError};

/// Splits command-line text into tokens.
///
/// Whitespace separates tokens. Single quotes are literal, double quotes honor backslash
/// escapes of `"`, `\`, `$` and `` ` ``. A backslash before a line break joins lines.
pub fn split_command_line(text: &str) -> Result<Vec<String>, CmdlineError> {
    let mut tokens = Vec::new();
    let mut current: Option<String> = None;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            c if c.is_whitespace() => tokens.extend(current.take()),
            '\\' => match chars.next() {
                Some('\n') => tokens.extend(current.take()),
                Some('\r') if chars.peek() == Some(&'\n') => {
                    chars.next();
                    tokens.extend(current.take());
                }
                Some(escaped) => current.get_or_insert_with(String::new).push(escaped),
                None => return Err(CmdlineError::TrailingEscape),
            },
            '\'' => {
                let token = current.get_or_insert_with(String::new);
                loop {
                    match chars.next() {
                        Some('\'') => break,
                        Some(c) => token.push(c),
                        None => return Err(CmdlineError::UnbalancedQuote('\'')),
                    }
                }
            }
            '"' => {
                let token = current.get_or_insert_with(String::new);
                loop {
                    match chars.next() {
                        Some('"') => break,
                        Some('\\') => match chars.next() {
                            Some(escaped @ ('"' | '\\' | '$' | '`')) => token.push(escaped),
                            Some('\n') => {}
                            Some(c) => {
                                token.push('\\');
                                token.push(c);
                            }
                            None => return Err(CmdlineError::UnbalancedQuote('"')),
                        },
                        Some(c) => token.push(c),
                        None => return Err(CmdlineError::UnbalancedQuote('"')),
                    }
                }
            }
            c => current.get_or_insert_with(String::new).push(c),
        }
    }
    tokens.extend(current);
    Ok(tokens)
}

fn needs_quoting(arg: &str) -> bool {
    arg.is_empty()
        || arg
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, '\'' | '"' | '\\' | '$' | '`' | ';' | '&' | '|' | '<' | '>' | '(' | ')' | '*' | '?' | '#'))
}

/// Quotes an argument for a POSIX shell when it would otherwise be split or expanded.
pub fn quote(arg: &str) -> Cow<'_, str> {
    if needs_quoting(arg) {
        Cow::Owned(format!("'{}'", arg.replace('\'', r"'\''")))
    } else {
        Cow::Borrowed(arg)
    }
}

/// Joins arguments into a single line that [`split_command_line`] reads back unchanged.
pub fn join_args<S: AsRef<str>>(args: &[S]) -> String {
    args.iter().map(|arg| quote(arg.as_ref())).join(" ")
}

/// Groups each flag with its value, one entry per line of a readable command.
pub fn format_command_line<S: AsRef<str>>(args: &[S]) -> Vec<String> {
    let mut lines = Vec::new();
    let mut args = args.iter().map(|arg| arg.as_ref()).peekable();
    while let Some(arg) = args.next() {
        let quoted = quote(arg);
        let value = args.next_if(|value| arg.starts_with('-') && !value.starts_with('-'));
        lines.push(match value {
            Some(value) => format!("{quoted} {}", quote(value)),
            None => quoted.into_owned(),
        });
    }
    lines
}

/// Full command line for a configuration: executable, hardware arguments, then preserved
/// unrecognized options, one flag per line joined with shell line continuations.
pub fn render_command_line(config: &VmHardwareConfig) -> String {
    let hardware = generate(config);
    let extra = config.extra_args().to_args();
    log::debug!("Rendering {} hardware and {} other arguments", hardware.len(), extra.len());

    config
        .executable()
        .map(|executable| quote(executable).into_owned())
        .into_iter()
        .chain(format_command_line(&hardware))
        .chain(format_command_line(&extra))
        .join(" \\\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::HostCapabilities;

    #[test]
    fn splits_plain_and_quoted() {
        let tokens = split_command_line(r#"qemu-system-x86_64 -name "my vm" -append 'console=ttyS0 quiet' -x a\ b"#).unwrap();
        assert_eq!(
            tokens,
            ["qemu-system-x86_64", "-name", "my vm", "-append", "console=ttyS0 quiet", "-x", "a b"]
        );
    }

    #[test]
    fn line_continuations() {
        let tokens = split_command_line("qemu-system-x86_64 \\\n  -m 2G \\\r\n  -smp 4").unwrap();
        assert_eq!(tokens, ["qemu-system-x86_64", "-m", "2G", "-smp", "4"]);
    }

    #[test]
    fn empty_quotes_make_a_token() {
        assert_eq!(split_command_line(r#"-a "" -b"#).unwrap(), ["-a", "", "-b"]);
        assert_eq!(split_command_line(r#""a\"b\n""#).unwrap(), [r#"a"b\n"#]);
        assert!(split_command_line("   ").unwrap().is_empty());
    }

    #[test]
    fn split_errors() {
        assert_eq!(split_command_line("-name 'vm"), Err(CmdlineError::UnbalancedQuote('\'')));
        assert_eq!(split_command_line("-name \"vm"), Err(CmdlineError::UnbalancedQuote('"')));
        assert_eq!(split_command_line("-name vm\\"), Err(CmdlineError::TrailingEscape));
    }

    #[test]
    fn join_then_split() {
        let args = ["-drive", "file=/tmp/my disk.qcow2", "", "it's", "$HOME"];
        assert_eq!(split_command_line(&join_args(&args)).unwrap(), args);
    }

    #[test]
    fn formats_flag_value_pairs() {
        let lines = format_command_line(&["-m", "1024M", "-enable-kvm", "-usb", "-bios", "/a b/bios.bin", "disk.img"]);
        assert_eq!(lines, ["-m 1024M", "-enable-kvm", "-usb", "-bios '/a b/bios.bin'", "disk.img"]);
    }

    #[test]
    fn rendered_positionals_stay_separate() {
        let host = HostCapabilities::from_count(4, vec![]);
        let (config, _) = crate::parse(&["-snapshot", "-enable-kvm", "disk.img", "-usb"], &host);
        let rendered = render_command_line(&config);
        assert!(rendered.ends_with("-usb \\\ndisk.img \\\n-snapshot"), "{rendered}");

        let (reparsed, _) = crate::parse(&split_command_line(&rendered).unwrap(), &host);
        assert_eq!(reparsed.extra_args().len(), 2);
        assert_eq!(reparsed.extra_args().get(""), Some("disk.img"));
        assert_eq!(reparsed.extra_args().get("snapshot"), Some(""));
        assert_eq!(reparsed.extra_args().to_args(), config.extra_args().to_args());
    }

    #[test]
    fn rendered_command_parses_back() {
        let host = HostCapabilities::from_count(16, vec![]);
        let tokens = split_command_line(
            "qemu-system-x86_64 -machine q35 -m 4G -smp 4,sockets=1,cores=2,threads=2 -enable-kvm \
             -drive 'file=/vm/a b.qcow2,if=virtio' -usb -no-reboot",
        )
        .unwrap();
        let (config, warnings) = crate::parse(&tokens, &host);
        assert!(warnings.is_empty());

        let rendered = render_command_line(&config);
        assert!(rendered.starts_with("qemu-system-x86_64 \\\n-cpu default \\\n-smp 4,sockets=1,cores=2,threads=2"));
        assert!(rendered.ends_with("-drive 'file=/vm/a b.qcow2,if=virtio' \\\n-no-reboot"));

        let (reparsed, warnings) = crate::parse(&split_command_line(&rendered).unwrap(), &host);
        assert!(warnings.is_empty());
        assert!(reparsed.same_settings(&config));
        assert_eq!(reparsed.extra_args(), config.extra_args());
        assert_eq!(reparsed.executable(), Some("qemu-system-x86_64"));
    }
}
