use anyhow::{Context, Result};
use clap::Parser;
use console::style;
use crossbeam_channel::RecvTimeoutError;
use dialoguer::{Confirm, Input, Select, theme::ColorfulTheme};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::info;

use ewfwizard::cli::{Cli, Commands, ProgressReporter};
use ewfwizard::devices::{device_selection_options, format_device_table, list_block_devices};
use ewfwizard::request::{normalize_output_path, validate_paths};
use ewfwizard::{
    AcquisitionRequest, BlockDevice, CaseMetadata, MediaFlags, MediaType, ProgressMonitor,
    ToolConfig, logging,
};

const EVENT_POLL_INTERVAL: Duration = Duration::from_millis(100);

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose, cli.debug);

    let mut config = match &cli.config {
        Some(path) => ToolConfig::load(path)?,
        None => ToolConfig::default(),
    };
    config = cli.tool.apply(config);

    match cli.command {
        Some(Commands::Devices) => print_devices(&config),
        Some(Commands::Acquire {
            input,
            output,
            case,
            dry_run,
        }) => {
            let request =
                AcquisitionRequest::new(input, normalize_output_path(output), case.into_metadata())
                    .context("Invalid acquisition request")?;
            if dry_run {
                let monitor = ProgressMonitor::new(request, config)?;
                println!("{}", monitor.command_line());
                println!("log: {}", monitor.log_path().display());
                return Ok(());
            }
            run_acquisition(request, config)
        }
        Some(Commands::Wizard { yes }) => run_interactive_wizard(config, yes),
        None => run_interactive_wizard(config, false),
    }
}

fn print_devices(config: &ToolConfig) -> Result<()> {
    let devices =
        list_block_devices(&config.lsblk_path).context("Failed to list block devices")?;
    print!("{}", format_device_table(&devices));
    Ok(())
}

fn run_interactive_wizard(config: ToolConfig, skip_confirm: bool) -> Result<()> {
    print_banner();

    let theme = ColorfulTheme::default();
    let device = select_device(&theme, &config)?;

    let output: String = Input::with_theme(&theme)
        .with_prompt("Where should the image be written? (base name, suffix is added by ewfacquire)")
        .validate_with(|text: &String| -> Result<(), String> {
            validate_paths(
                std::path::Path::new(&device.path),
                &normalize_output_path(text.trim()),
            )
            .map_err(|e| e.to_string())
        })
        .interact_text()
        .context("Failed to get output path")?;
    let output = normalize_output_path(output.trim());

    let add_metadata = Confirm::with_theme(&theme)
        .with_prompt("Record case metadata?")
        .default(true)
        .interact()
        .context("Failed to confirm")?;
    let metadata = if add_metadata {
        Some(prompt_case_metadata(&theme)?)
    } else {
        None
    };

    let request = AcquisitionRequest::new(PathBuf::from(&device.path), output, metadata)
        .context("Invalid acquisition request")?;

    println!();
    println!("{}", style("Operation Summary:").cyan().bold());
    println!("Source: {} ({})", device.path, device.size_human());
    println!("Image:  {}", request.output().display());
    println!("Log:    {}", request.log_path().display());
    println!("Digest: md5 + {}", config.digest);
    if let Some(meta) = request.metadata() {
        println!("Case:   {} / evidence {}", meta.case_number, meta.evidence_number);
    }
    println!();

    if !skip_confirm {
        let confirmed = Confirm::with_theme(&theme)
            .with_prompt("Confirm and start acquisition?")
            .default(true)
            .interact()
            .context("Failed to confirm")?;

        if !confirmed {
            println!("\nOperation cancelled.");
            return Ok(());
        }
    }

    run_acquisition(request, config)
}

fn select_device(theme: &ColorfulTheme, config: &ToolConfig) -> Result<BlockDevice> {
    loop {
        println!("\n{}", style("Discovering block devices...").cyan());
        let devices =
            list_block_devices(&config.lsblk_path).context("Failed to list block devices")?;

        if devices.is_empty() {
            anyhow::bail!("No block devices found. Are you running as root?");
        }

        println!();
        print!("{}", format_device_table(&devices));
        println!();

        let mut options = device_selection_options(&devices);
        options.push("Rescan devices".to_string());

        let selection = Select::with_theme(theme)
            .with_prompt("Select the device to acquire")
            .items(&options)
            .default(0)
            .interact()
            .context("Failed to select device")?;

        if let Some(device) = devices.into_iter().nth(selection) {
            return Ok(device);
        }
    }
}

fn prompt_case_metadata(theme: &ColorfulTheme) -> Result<CaseMetadata> {
    let text = |prompt: &str| -> Result<String> {
        Input::<String>::with_theme(theme)
            .with_prompt(prompt)
            .allow_empty(true)
            .interact_text()
            .with_context(|| format!("Failed to read {}", prompt.to_lowercase()))
    };

    let case_number = text("Case number")?;
    let description = text("Description")?;
    let evidence_number = text("Evidence number")?;
    let examiner = text("Examiner")?;
    let notes = text("Notes")?;

    let media_type = Select::with_theme(theme)
        .with_prompt("Media type")
        .items(&MediaType::ALL.map(|m| m.to_string()))
        .default(0)
        .interact()
        .context("Failed to select media type")?;
    let media_flags = Select::with_theme(theme)
        .with_prompt("Media characteristics")
        .items(&MediaFlags::ALL.map(|m| m.to_string()))
        .default(0)
        .interact()
        .context("Failed to select media characteristics")?;

    Ok(CaseMetadata::new(case_number)
        .with_description(description)
        .with_evidence_number(evidence_number)
        .with_examiner(examiner)
        .with_notes(notes)
        .with_media(MediaType::ALL[media_type], MediaFlags::ALL[media_flags]))
}

fn run_acquisition(request: AcquisitionRequest, config: ToolConfig) -> Result<()> {
    let monitor = ProgressMonitor::new(request, config).context("Failed to prepare ewfacquire")?;
    println!("{} {}", style("Command:").bold(), monitor.command_line());

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })
    .context("Failed to set Ctrl+C handler")?;

    let handle = monitor.start().context("Failed to start acquisition")?;
    let reporter = ProgressReporter::new(true)?;
    let mut cancelled = false;

    loop {
        match handle.events().recv_timeout(EVENT_POLL_INTERVAL) {
            Ok(event) => reporter.handle(&event),
            Err(RecvTimeoutError::Timeout) => reporter.tick(),
            Err(RecvTimeoutError::Disconnected) => break,
        }

        if !cancelled && !running.load(Ordering::SeqCst) {
            handle.cancel();
            cancelled = true;
        }
    }

    let report = handle.join()?;
    reporter.finish(&report);
    info!(state = %report.state, lines = report.lines, "acquisition finished");

    println!();
    println!("Log file: {}", report.log_path.display());
    let report = report.into_result()?;

    println!("{}", style("Acquisition Complete!").green().bold());
    if let Some(status) = report.exit_status {
        println!("ewfacquire exited with {}", status);
    }
    println!();
    Ok(())
}

fn print_banner() {
    println!();
    println!("{}", style("ewfwizard - Forensic Acquisition").cyan().bold());
    println!("This wizard creates a forensic image with ewfacquire.");
}
