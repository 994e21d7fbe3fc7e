// Setup commands: settings file and SMTP password storage

use std::io::{self, BufRead, Write};
use std::path::Path;

use cardops_config::secrets::set_smtp_password;
use cardops_config::Settings;

use crate::{mail, CliError, Context};

pub(crate) fn cmd_config_init(config: Option<&Path>, force: bool) -> Result<(), CliError> {
    let path = config.map(Path::to_path_buf).unwrap_or_else(Settings::config_path);
    if path.exists() && !force {
        return Err(CliError::usage(format!("{} already exists", path.display()))
            .with_hint("pass --force to overwrite it"));
    }
    Settings::default()
        .save_to(&path)
        .map_err(|e| CliError::io(format!("cannot write {}: {e}", path.display())))?;
    eprintln!("wrote {}", path.display());
    Ok(())
}

pub(crate) fn cmd_mail_set_password(ctx: &Context) -> Result<(), CliError> {
    let username = ctx.settings.mail.username.trim();
    if username.is_empty() {
        return Err(mail::not_configured());
    }

    if atty::is(atty::Stream::Stdin) {
        eprint!("SMTP password for {username}: ");
        io::stderr().flush().ok();
    }
    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .map_err(|e| CliError::io(format!("cannot read password: {e}")))?;
    let password = line.trim_end_matches(['\r', '\n']);
    if password.is_empty() {
        return Err(CliError::usage("no password given on stdin"));
    }

    set_smtp_password(username, password).map_err(CliError::mail)?;
    eprintln!("stored SMTP password for {username} in the system keychain");
    Ok(())
}
