use std::ffi::{OsStr, OsString};
use std::path::Path;

use crate::config::ToolConfig;
use crate::request::AcquisitionRequest;

/// Builds the ewfacquire argument vector for a request.
///
/// Every value is its own element, so free text reaches the tool as a single
/// token regardless of spaces or quotes. Case metadata flags are emitted as a
/// complete block, in a fixed order, only when metadata is present.
pub fn build_args(request: &AcquisitionRequest, config: &ToolConfig) -> Vec<OsString> {
    let mut args: Vec<OsString> = Vec::with_capacity(22);
    args.push("-u".into());

    if let Some(meta) = request.metadata() {
        let pairs: [(&str, &str); 7] = [
            ("-C", meta.case_number.as_str()),
            ("-D", meta.description.as_str()),
            ("-E", meta.evidence_number.as_str()),
            ("-e", meta.examiner.as_str()),
            ("-N", meta.notes.as_str()),
            ("-m", meta.media_type.as_arg()),
            ("-M", meta.media_flags.as_arg()),
        ];
        for (flag, value) in pairs {
            args.push(flag.into());
            args.push(value.into());
        }
    }

    args.push("-d".into());
    args.push(config.digest.as_arg().into());
    args.push("-t".into());
    args.push(request.output().as_os_str().to_owned());
    args.push(request.input().as_os_str().to_owned());
    args
}

/// Renders a command as a POSIX shell line, for logs and dry runs
pub fn render_command_line(tool: &Path, args: &[OsString]) -> String {
    std::iter::once(tool.as_os_str())
        .chain(args.iter().map(OsString::as_os_str))
        .map(shell_quote)
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn shell_quote(token: &OsStr) -> String {
    let token = token.to_string_lossy();
    let plain = !token.is_empty()
        && token
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "_-./:=@%+,".contains(c));

    if plain {
        token.into_owned()
    } else {
        format!("'{}'", token.replace('\'', r"'\''"))
    }
}
