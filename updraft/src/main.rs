//! updraft CLI entrypoint.
//!
//! Checks a release source for newer versions of a tool and fetches the
//! verified executable for this platform.

use camino::Utf8Path;
use clap::Parser;
use std::io::Write;
use updraft::cli::{CheckArgs, Cli, Command, DownloadArgs};
use updraft::config::load_config;
use updraft::dirs::SystemBaseDirs;
use updraft::error::{Result, UpdaterError};
use updraft::output::{manual_upgrade_hint, update_summary, write_line, write_progress};
use updraft::updater::{Updater, UpdaterBuilder};

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    let mut stdout = std::io::stdout();
    let mut stderr = std::io::stderr();
    let run_result = run(&cli, &mut stdout, &mut stderr);
    let exit_code = exit_code_for_run_result(run_result, &mut stderr);
    if exit_code != 0 {
        std::process::exit(exit_code);
    }
}

fn run(cli: &Cli, stdout: &mut dyn Write, stderr: &mut dyn Write) -> Result<()> {
    let file_config = load_config(cli.config.as_deref(), &SystemBaseDirs)?;
    let config = cli.apply_overrides(file_config);

    match &cli.command {
        Command::Check(args) => {
            let updater = Updater::from_config(&args.current_version, &config)?;
            run_check(&updater, args, cli.quiet, stdout, stderr)
        }
        Command::Download(args) => {
            let current_version = args.current_version.as_deref().unwrap_or("0.0.0");
            let mut builder = UpdaterBuilder::from_config(current_version, &config)?
                .executable_name(&args.executable);
            if let Some(platform) = args.platform() {
                builder = builder.platform(platform);
            }
            run_download(&builder.build()?, args, cli.quiet, stdout, stderr)
        }
    }
}

fn run_check(
    updater: &Updater,
    args: &CheckArgs,
    quiet: bool,
    stdout: &mut dyn Write,
    stderr: &mut dyn Write,
) -> Result<()> {
    write_progress(stderr, quiet, "Checking for updates...");
    let info = updater.get_update_info()?;

    if args.json {
        let json = serde_json::to_string_pretty(&info).map_err(std::io::Error::other)?;
        write_line(stdout, json);
    } else {
        write_line(stdout, update_summary(updater.current_version(), info.as_ref()));
    }
    Ok(())
}

fn run_download(
    updater: &Updater,
    args: &DownloadArgs,
    quiet: bool,
    stdout: &mut dyn Write,
    stderr: &mut dyn Write,
) -> Result<()> {
    let tag = match (&args.release, &args.current_version) {
        (Some(tag), _) => tag.clone(),
        (None, Some(_)) => {
            write_progress(stderr, quiet, "Checking for updates...");
            let Some(info) = updater.get_update_info()? else {
                write_line(stdout, update_summary(updater.current_version(), None));
                return Ok(());
            };
            info.latest_version
        }
        (None, None) => {
            write_progress(stderr, quiet, "Looking up the latest release...");
            updater.latest_version()?.version
        }
    };

    write_progress(
        stderr,
        quiet,
        format!("Downloading {} {tag} for {}...", args.executable, updater.platform()),
    );
    let artefact = updater.download_version(&tag)?;

    let Some(output) = &args.output else {
        write_line(stdout, artefact.local_path().display());
        return Ok(());
    };
    persist(artefact.local_path(), output)?;
    write_progress(stderr, quiet, format!("Wrote {output}"));
    write_line(stdout, output);
    Ok(())
}

/// Move the extracted executable to `dest`, copying across filesystems.
fn persist(src: &std::path::Path, dest: &Utf8Path) -> Result<()> {
    let persist_error = |source| UpdaterError::Persist {
        path: dest.to_owned(),
        source,
    };

    if std::fs::rename(src, dest).is_ok() {
        return Ok(());
    }
    std::fs::copy(src, dest).map_err(persist_error)?;
    std::fs::remove_file(src).map_err(persist_error)?;
    Ok(())
}

fn exit_code_for_run_result(result: Result<()>, stderr: &mut dyn Write) -> i32 {
    match result {
        Ok(()) => 0,
        Err(err) => {
            write_line(stderr, format!("error: {err}"));
            if matches!(err, UpdaterError::Pipeline(_) | UpdaterError::Persist { .. }) {
                write_line(stderr, manual_upgrade_hint());
            }
            1
        }
    }
}
