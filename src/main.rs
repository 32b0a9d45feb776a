use std::path::PathBuf;

use anyhow::Context;
use clap::{CommandFactory, Parser};

use rmfeature::prelude::*;
use rmfeature::{
    open_container, text, AssumeYes, FeatureFit, FixedRegion, SharedPrompt, TerminalPrompt,
};

#[derive(Debug, Parser)]
#[command(
    name = "rmfeature",
    version,
    about = "Fit and remove a spectral feature from a one-dimensional spectrum"
)]
struct Cli {
    /// The spectrum to correct
    input: PathBuf,

    /// Where to write the corrected spectrum
    output: PathBuf,

    /// Initial values for cte m A mu fwhmL fwhmD, all six or none
    #[arg(value_name = "PARAMS", allow_negative_numbers = true)]
    params: Vec<f64>,

    /// The line profile to fit
    #[arg(long, default_value_t = Profile::Voigt)]
    profile: Profile,

    /// The extension holding the spectrum, by name or index
    #[arg(long, default_value = rmfeature::container::DEFAULT_EXTENSION)]
    extension: String,

    /// Left edge of the fitting region, inclusive
    #[arg(long, requires = "right", allow_negative_numbers = true)]
    left: Option<i64>,

    /// Right edge of the fitting region, exclusive
    #[arg(long, requires = "left", allow_negative_numbers = true)]
    right: Option<i64>,

    /// Write the corrected spectrum without asking
    #[arg(short, long)]
    yes: bool,

    /// Maximum number of solver iterations per fit
    #[arg(long)]
    max_iter: Option<usize>,

    /// Write the pixel, original, best fit and corrected columns here
    #[arg(long)]
    dump: Option<PathBuf>,

    /// Render the fit to a PNG or SVG file
    #[cfg(feature = "plot")]
    #[arg(long)]
    plot: Option<PathBuf>,

    /// Render the spectrum as loaded, before fitting, to a PNG or SVG file
    #[cfg(feature = "plot")]
    #[arg(long)]
    plot_loaded: Option<PathBuf>,
}

/// Prints the fit report and writes the requested side products
#[derive(Debug, Default)]
struct Report {
    dump: Option<PathBuf>,
    #[cfg(feature = "plot")]
    plot: Option<PathBuf>,
    #[cfg(feature = "plot")]
    plot_loaded: Option<PathBuf>,
}

impl Presenter for Report {
    fn spectrum_loaded(&mut self, spectrum: &Spectrum) {
        log::info!("Loaded a spectrum of {} pixels", spectrum.len());
        #[cfg(feature = "plot")]
        if let Some(path) = self.plot_loaded.as_ref() {
            if let Err(e) = rmfeature::plot::draw_spectrum_file(spectrum, path) {
                log::warn!("Failed to draw {}: {e}", path.display());
            }
        }
    }

    fn fit_completed(&mut self, spectrum: &Spectrum, fit: &FeatureFit) {
        println!("{fit}");
        if let Some(path) = self.dump.as_ref() {
            if let Err(e) = text::to_file(spectrum, fit, path) {
                log::warn!("Failed to write {}: {e}", path.display());
            }
        }
        #[cfg(feature = "plot")]
        if let Some(path) = self.plot.as_ref() {
            if let Err(e) = rmfeature::plot::draw_file(spectrum, fit, path) {
                log::warn!("Failed to draw {}: {e}", path.display());
            }
        }
    }
}

/// The starting point named on the command line, `None` unless exactly zero
/// or six values were given
fn initial_guess(args: &Cli) -> Option<InitialGuess> {
    match args.params.len() {
        0 => Some(InitialGuess::Estimate),
        _ => LineParams::from_slice(&args.params)
            .ok()
            .map(InitialGuess::Explicit),
    }
}

fn removal_config(args: &Cli) -> Option<RemovalConfig> {
    let initial = initial_guess(args)?;
    let mut fit_config = FitConfig::default();
    if let Some(max_iter) = args.max_iter {
        fit_config = fit_config.max_iter(max_iter);
    }
    Some(
        RemovalConfig::default()
            .profile(args.profile)
            .extension(args.extension.clone())
            .initial(initial)
            .fit(fit_config),
    )
}

fn main() -> anyhow::Result<()> {
    pretty_env_logger::init();
    let args = Cli::parse();

    let Some(config) = removal_config(&args) else {
        Cli::command().print_help()?;
        return Ok(());
    };

    let mut container = open_container(&args.input)
        .with_context(|| format!("Failed to open {}", args.input.display()))?;

    let prompt = SharedPrompt::new(TerminalPrompt::stdio());
    let mut regions: Box<dyn RegionProvider> = match (args.left, args.right) {
        (Some(left), Some(right)) => Box::new(FixedRegion(left, right)),
        _ => Box::new(prompt.clone()),
    };
    let mut confirmation: Box<dyn ConfirmationProvider> = if args.yes {
        Box::new(AssumeYes(true))
    } else {
        Box::new(prompt)
    };
    let mut report = Report {
        dump: args.dump.clone(),
        #[cfg(feature = "plot")]
        plot: args.plot.clone(),
        #[cfg(feature = "plot")]
        plot_loaded: args.plot_loaded.clone(),
    };

    let remover = FeatureRemover::new(config);
    let outcome = remover
        .run(
            container.as_mut(),
            regions.as_mut(),
            confirmation.as_mut(),
            &mut report,
            &args.output,
        )
        .with_context(|| format!("Failed to remove the feature from {}", args.input.display()))?;

    match outcome {
        RemovalOutcome::Written { destination, .. } => {
            println!("Corrected spectrum written to {}", destination.display());
        }
        RemovalOutcome::Discarded { .. } => {
            println!("Corrected spectrum not written");
        }
    }
    Ok(())
}
