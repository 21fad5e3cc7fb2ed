//! MasterForge command line
//!
//! Usage:
//!   masterforge analyze <in.wav>                 - Analysis report (JSON)
//!   masterforge spec [prefs] [--ai cand.json]    - Chain specification (JSON)
//!   masterforge master <in.wav> <out.wav> [...]  - Master to 16-bit WAV
//!
//! `RUST_LOG=info` shows job progress.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use log::info;
use serde::de::DeserializeOwned;

use mf_master::{
    ChainSpec, ChainSpecCandidate, Genre, LoudnessTarget, MasteringPreferences, StereoWidth,
    TonePreference, analyze, generate_chain_spec,
};
use mf_offline::{JobEvent, OfflineConfig, RenderJob, RenderPool, decode_wav, write_wav16};

#[derive(Parser, Debug)]
#[command(name = "masterforge", version, about = "Preference-driven audio mastering")]
struct Cli {
    /// JSON configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Analyze a WAV file and print the report as JSON
    Analyze {
        /// Input WAV file
        input: PathBuf,
    },
    /// Generate a chain specification and print it as JSON
    Spec {
        #[command(flatten)]
        prefs: PrefArgs,

        #[command(flatten)]
        ai: AiArgs,

        /// Analyze this WAV file first for adaptive corrections
        #[arg(long)]
        analyze: Option<PathBuf>,
    },
    /// Master a WAV file to 16-bit PCM
    Master {
        /// Input WAV file
        input: PathBuf,
        /// Output WAV file
        output: PathBuf,

        #[command(flatten)]
        prefs: PrefArgs,

        #[command(flatten)]
        ai: AiArgs,

        /// Reference track to match
        #[arg(long)]
        reference: Option<PathBuf>,

        /// Render this chain specification instead of generating one
        #[arg(
            long,
            conflicts_with_all = [
                "reference", "genre", "loudness", "tone", "width", "compression",
                "saturation", "bass", "treble", "ai",
            ]
        )]
        spec: Option<PathBuf>,

        /// Worker threads (0 = auto)
        #[arg(short = 'j', long)]
        threads: Option<usize>,

        /// Impulse response directory
        #[arg(long)]
        ir_dir: Option<PathBuf>,
    },
}

/// Preference overrides; unset flags keep the configured value
#[derive(Args, Debug, Default)]
struct PrefArgs {
    /// Genre (electronic, hipHop, rock, pop, classical, jazz, acoustic, rnB, speech, unknown)
    #[arg(long, value_parser = parse_enum::<Genre>)]
    genre: Option<Genre>,

    /// Loudness target: quiet, streaming, loud or integrated LUFS
    #[arg(long, allow_hyphen_values = true, value_parser = parse_loudness)]
    loudness: Option<LoudnessTarget>,

    /// Tone (balanced, warm, bright, punchy, vintage)
    #[arg(long, value_parser = parse_enum::<TonePreference>)]
    tone: Option<TonePreference>,

    /// Stereo width (narrow, normal, wide)
    #[arg(long, value_parser = parse_enum::<StereoWidth>)]
    width: Option<StereoWidth>,

    /// Compression amount (0-100)
    #[arg(long)]
    compression: Option<f64>,

    /// Saturation amount (0-100)
    #[arg(long)]
    saturation: Option<f64>,

    /// Bass shelf gain in dB (-6..6)
    #[arg(long, allow_hyphen_values = true)]
    bass: Option<f64>,

    /// Treble shelf gain in dB (-6..6)
    #[arg(long, allow_hyphen_values = true)]
    treble: Option<f64>,
}

impl PrefArgs {
    fn apply(&self, mut prefs: MasteringPreferences) -> MasteringPreferences {
        if let Some(genre) = self.genre {
            prefs.genre = genre;
        }
        if let Some(loudness) = self.loudness {
            prefs.loudness = loudness;
        }
        if let Some(tone) = self.tone {
            prefs.tone = tone;
        }
        if let Some(width) = self.width {
            prefs.stereo_width = width;
        }
        if let Some(amount) = self.compression {
            prefs.compression_amount = amount;
        }
        if let Some(amount) = self.saturation {
            prefs.saturation_amount = amount;
        }
        if let Some(gain) = self.bass {
            prefs.bass_boost = gain;
        }
        if let Some(gain) = self.treble {
            prefs.treble_boost = gain;
        }
        prefs
    }
}

#[derive(Args, Debug, Default)]
struct AiArgs {
    /// Candidate chain specification (JSON) to blend in
    #[arg(long)]
    ai: Option<PathBuf>,

    /// Blend strength (0-100)
    #[arg(long, requires = "ai")]
    ai_strength: Option<f64>,
}

impl AiArgs {
    fn candidate(&self) -> Result<Option<ChainSpecCandidate>> {
        let Some(path) = &self.ai else {
            return Ok(None);
        };
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        // A malformed candidate is ignored like any other rejected one
        match ChainSpecCandidate::from_json(&text) {
            Ok(candidate) => Ok(Some(candidate)),
            Err(e) => {
                eprintln!("warning: {}: {e}", path.display());
                Ok(None)
            }
        }
    }
}

fn parse_enum<T: DeserializeOwned>(s: &str) -> Result<T, String> {
    serde_json::from_value(serde_json::Value::String(s.to_string())).map_err(|e| e.to_string())
}

fn parse_loudness(s: &str) -> Result<LoudnessTarget, String> {
    match s {
        "quiet" => Ok(LoudnessTarget::Quiet),
        "streaming" => Ok(LoudnessTarget::Streaming),
        "loud" => Ok(LoudnessTarget::Loud),
        other => other
            .parse::<f64>()
            .ok()
            .filter(|lufs| lufs.is_finite())
            .map(LoudnessTarget::Custom)
            .ok_or_else(|| format!("expected quiet, streaming, loud or a LUFS value, got '{other}'")),
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => OfflineConfig::from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => OfflineConfig::default(),
    };

    match cli.command {
        Commands::Analyze { input } => run_analyze(&input),
        Commands::Spec { prefs, ai, analyze } => run_spec(config, &prefs, &ai, analyze.as_deref()),
        Commands::Master {
            input,
            output,
            prefs,
            ai,
            reference,
            spec,
            threads,
            ir_dir,
        } => {
            let mut config = config;
            if let Some(threads) = threads {
                config = config.with_threads(threads);
            }
            if let Some(dir) = ir_dir {
                config = config.with_impulse_response_dir(dir);
            }
            let options = MasterOptions {
                prefs,
                ai,
                reference,
                spec,
            };
            run_master(config, &input, &output, &options)
        }
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let text =
        fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("Failed to parse {}", path.display()))
}

fn run_analyze(input: &Path) -> Result<()> {
    let buffer =
        decode_wav(input).with_context(|| format!("Failed to decode {}", input.display()))?;
    let report = analyze(&buffer).context("Analysis failed")?;
    print_json(&report)
}

fn run_spec(
    config: OfflineConfig,
    prefs: &PrefArgs,
    ai: &AiArgs,
    analyze_path: Option<&Path>,
) -> Result<()> {
    let preferences = prefs.apply(config.preferences.clone());
    let report = match analyze_path {
        Some(path) => {
            let buffer =
                decode_wav(path).with_context(|| format!("Failed to decode {}", path.display()))?;
            Some(analyze(&buffer).context("Analysis failed")?)
        }
        None => None,
    };

    let candidate = ai.candidate()?;
    let generated = generate_chain_spec(
        &preferences,
        report.as_ref(),
        candidate.as_ref(),
        Some(ai.ai_strength.unwrap_or(config.ai_strength)),
    );
    for note in &generated.notes {
        eprintln!("note: {note}");
    }
    for warning in &generated.warnings {
        eprintln!("warning: {warning}");
    }
    print_json(&generated.spec)
}

struct MasterOptions {
    prefs: PrefArgs,
    ai: AiArgs,
    reference: Option<PathBuf>,
    spec: Option<PathBuf>,
}

fn run_master(
    config: OfflineConfig,
    input: &Path,
    output: &Path,
    options: &MasterOptions,
) -> Result<()> {
    if input == output {
        bail!("Refusing to overwrite the input file {}", input.display());
    }

    let pool = RenderPool::new(config).context("Failed to start render pool")?;
    let buffer =
        decode_wav(input).with_context(|| format!("Failed to decode {}", input.display()))?;
    info!(
        "{}: {} ch, {:.1}s @ {} Hz",
        input.display(),
        buffer.channel_count(),
        buffer.duration(),
        buffer.sample_rate()
    );

    let job = match &options.spec {
        Some(path) => {
            let spec: ChainSpec = read_json(path)?;
            RenderJob::with_spec(buffer, spec)
        }
        None => {
            let mut preferences = options.prefs.apply(pool.config().preferences.clone());
            if let Some(path) = &options.reference {
                let reference = decode_wav(path)
                    .with_context(|| format!("Failed to decode {}", path.display()))?;
                preferences.reference =
                    Some(analyze(&reference).context("Reference analysis failed")?);
            }
            let job = RenderJob::with_preferences(buffer, preferences);
            match options.ai.candidate()? {
                Some(candidate) => job.candidate(candidate, options.ai.ai_strength),
                None => job,
            }
        }
    };
    let job = job.name(input.display().to_string());

    let handle = pool.submit(job);
    for event in handle.events().iter() {
        match event {
            JobEvent::Analysis { progress, .. } => {
                log::debug!("analysis {:?} {:.0}%", progress.phase, progress.fraction_complete * 100.0)
            }
            JobEvent::Generated { notes, warnings, .. } => {
                notes.iter().for_each(|n| eprintln!("note: {n}"));
                warnings.iter().for_each(|w| eprintln!("warning: {w}"));
            }
            JobEvent::Render { state, .. } => info!("render: {state:?}"),
            JobEvent::Started { .. } | JobEvent::Finished { .. } => {}
        }
    }
    let result = handle.wait().context("Mastering failed")?;

    let report = &result.mastered.report;
    for warning in &report.warnings {
        eprintln!("warning: {warning}");
    }
    let bytes = write_wav16(output, &result.mastered.buffer)
        .with_context(|| format!("Failed to write {}", output.display()))?;

    eprintln!(
        "{} -> {} ({} bytes): peak {:.2} -> {:.2} dBFS in {:.2}s",
        input.display(),
        output.display(),
        bytes,
        report.input_peak_db,
        report.output_peak_db,
        result.duration.as_secs_f64()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_master_flags() {
        let cli = Cli::try_parse_from([
            "masterforge",
            "master",
            "in.wav",
            "out.wav",
            "--tone",
            "warm",
            "--loudness",
            "-11.5",
            "--bass",
            "-2",
            "--genre",
            "hipHop",
        ])
        .unwrap();

        let Commands::Master { prefs, .. } = cli.command else {
            panic!("expected master");
        };
        let applied = prefs.apply(MasteringPreferences::default());
        assert_eq!(applied.tone, TonePreference::Warm);
        assert_eq!(applied.loudness, LoudnessTarget::Custom(-11.5));
        assert_eq!(applied.bass_boost, -2.0);
        assert_eq!(applied.genre, Genre::HipHop);
        assert_eq!(applied.compression_amount, 50.0);
    }

    #[test]
    fn test_rejects_unknown_tone() {
        assert!(Cli::try_parse_from(["masterforge", "spec", "--tone", "sparkly"]).is_err());
        assert!(Cli::try_parse_from(["masterforge", "spec", "--loudness", "deafening"]).is_err());
    }

    #[test]
    fn test_spec_file_excludes_generation_flags() {
        let with_spec = |extra: &[&str]| {
            let mut args = vec!["masterforge", "master", "in.wav", "out.wav", "--spec", "s.json"];
            args.extend_from_slice(extra);
            Cli::try_parse_from(args)
        };
        assert!(with_spec(&[]).is_ok());
        assert!(with_spec(&["--tone", "warm"]).is_err());
        assert!(with_spec(&["--loudness", "-10"]).is_err());
        assert!(with_spec(&["--compression", "80"]).is_err());
        assert!(with_spec(&["--ai", "cand.json"]).is_err());
        assert!(with_spec(&["--reference", "ref.wav"]).is_err());
        assert!(with_spec(&["-j", "2"]).is_ok());
    }

    #[test]
    fn test_ai_strength_requires_candidate() {
        assert!(Cli::try_parse_from(["masterforge", "spec", "--ai-strength", "40"]).is_err());
    }

    #[test]
    fn test_malformed_candidate_is_ignored() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(&mut file, b"{not json").unwrap();
        let ai = AiArgs {
            ai: Some(file.path().to_path_buf()),
            ai_strength: None,
        };
        assert!(ai.candidate().unwrap().is_none());
    }
}
