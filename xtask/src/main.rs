use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use ml_stacks_core::stacks::{StackEnv, StackKind, StacksConfig};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

const LAMBDA_PACKAGE: &str = "ml_stacks_lambda";
const LAMBDA_BINARIES: [&str; 3] = ["inference_lambda", "training_lambda", "transform_lambda"];

// ── CLI definition ─────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "xtask",
    about = "Task runner for the SageMaker stacks workspace",
    long_about = "Synthesizes CloudFormation templates for each stack, packages the\n\
                  Lambda binaries, and runs CI checks."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render CloudFormation templates for one or all stacks
    Synth {
        /// Stack to synthesize, or "all"
        #[arg(long, default_value = "all")]
        stack: String,
        /// Directory receiving `<stack>.template.json`
        #[arg(long, default_value = "cdk.out")]
        out_dir: PathBuf,
        /// JSON file overriding the sample stack configuration
        #[arg(long)]
        config: Option<PathBuf>,
        /// Target account (falls back to AWS_ACCOUNT_ID)
        #[arg(long, env = "CDK_DEFAULT_ACCOUNT")]
        account: Option<String>,
        /// Target region (falls back to AWS_REGION)
        #[arg(long, env = "CDK_DEFAULT_REGION")]
        region: Option<String>,
    },
    /// Build and zip the Lambda binaries as `bootstrap` artifacts
    LambdaPackage {
        /// Compilation target triple for Lambda binaries
        #[arg(long, default_value = "x86_64-unknown-linux-gnu")]
        target: String,
        /// Build profile used for binaries
        #[arg(value_enum, long, default_value_t = BuildProfile::Release)]
        profile: BuildProfile,
        /// Directory receiving `<binary>.zip`
        #[arg(long, default_value = "dist")]
        dist_dir: PathBuf,
    },
    /// Run CI checks (fmt, clippy, tests)
    Ci,
}

#[derive(Clone, Copy, ValueEnum)]
enum BuildProfile {
    Debug,
    Release,
}

impl BuildProfile {
    fn dir_name(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Release => "release",
        }
    }

    fn as_cargo_flag(self) -> Option<&'static str> {
        match self {
            Self::Debug => None,
            Self::Release => Some("--release"),
        }
    }
}

// ── helpers ────────────────────────────────────────────────────────

fn step(label: &str) {
    eprintln!("\n=== {label} ===");
}

fn run_cargo(args: &[&str]) -> Result<()> {
    eprintln!("+ cargo {}", args.join(" "));
    let status = Command::new("cargo")
        .args(args)
        .status()
        .context("failed to execute cargo")?;
    if !status.success() {
        bail!("cargo {} exited with {status}", args.join(" "));
    }
    Ok(())
}

fn resolve_setting(flag: Option<String>, fallback_var: &str, label: &str) -> Result<String> {
    flag.filter(|value| !value.trim().is_empty())
        .or_else(|| std::env::var(fallback_var).ok())
        .filter(|value| !value.trim().is_empty())
        .with_context(|| format!("{label} is required: pass --{label} or set {fallback_var}"))
}

// ── synth ──────────────────────────────────────────────────────────

fn load_config(path: Option<&Path>) -> Result<StacksConfig> {
    let Some(path) = path else {
        return Ok(StacksConfig::default());
    };
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("invalid config {}", path.display()))
}

fn selected_stacks(stack: &str) -> Result<Vec<StackKind>> {
    if stack == "all" {
        return Ok(StackKind::ALL.to_vec());
    }
    Ok(vec![stack.parse::<StackKind>()?])
}

fn synth(
    stack: &str,
    out_dir: &Path,
    config_path: Option<&Path>,
    account: Option<String>,
    region: Option<String>,
) -> Result<()> {
    let env = StackEnv::new(
        resolve_setting(account, "AWS_ACCOUNT_ID", "account")?,
        resolve_setting(region, "AWS_REGION", "region")?,
    )?;
    let config = load_config(config_path)?;
    let stacks = selected_stacks(stack)?;

    fs::create_dir_all(out_dir)
        .with_context(|| format!("failed to create {}", out_dir.display()))?;

    for kind in stacks {
        let template = config
            .synth(kind, &env)
            .with_context(|| format!("failed to synthesize {kind}"))?;
        let path = out_dir.join(format!("{kind}.template.json"));
        fs::write(&path, template.render()?)
            .with_context(|| format!("failed to write {}", path.display()))?;
        eprintln!(
            "{kind}: {} ({} resources, sha256 {})",
            path.display(),
            template.resources.len(),
            template.fingerprint()?
        );
    }
    Ok(())
}

// ── lambda packaging ───────────────────────────────────────────────

fn package_lambdas(target: &str, profile: BuildProfile, dist_dir: &Path) -> Result<()> {
    ensure_rust_target_installed(target)?;

    step("Build lambda binaries");
    let mut cargo_args = vec!["build", "-p", LAMBDA_PACKAGE, "--target", target];
    for binary in LAMBDA_BINARIES {
        cargo_args.extend(["--bin", binary]);
    }
    if let Some(flag) = profile.as_cargo_flag() {
        cargo_args.push(flag);
    }
    run_cargo(&cargo_args)?;

    step("Package lambda zip artifacts");
    let target_dir = Path::new("target").join(target).join(profile.dir_name());
    fs::create_dir_all(dist_dir)
        .with_context(|| format!("failed to create {}", dist_dir.display()))?;

    for binary in LAMBDA_BINARIES {
        let zip_path = dist_dir.join(format!("{binary}.zip"));
        package_lambda_zip(&target_dir.join(binary_name(binary, target)), &zip_path)?;
        eprintln!("- {}", zip_path.display());
    }
    Ok(())
}

fn ensure_rust_target_installed(target: &str) -> Result<()> {
    let output = match Command::new("rustup")
        .args(["target", "list", "--installed"])
        .output()
    {
        Ok(value) => value,
        Err(error) => {
            eprintln!(
                "warning: failed to run `rustup target list --installed` ({error}); continuing without target preflight"
            );
            return Ok(());
        }
    };

    if !output.status.success() {
        bail!(
            "failed to list installed rust targets: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }

    let installed = String::from_utf8_lossy(&output.stdout);
    if !installed.lines().any(|line| line.trim() == target) {
        bail!(
            "required rust target `{target}` is not installed. install it with `rustup target add {target}` and re-run `cargo run -p xtask -- lambda-package`"
        );
    }
    Ok(())
}

fn binary_name(bin_name: &str, target: &str) -> String {
    if target.contains("windows") {
        format!("{bin_name}.exe")
    } else {
        bin_name.to_string()
    }
}

fn package_lambda_zip(binary_path: &Path, zip_path: &Path) -> Result<()> {
    if !binary_path.exists() {
        bail!("expected lambda binary at '{}'", binary_path.display());
    }

    let binary = fs::read(binary_path)
        .with_context(|| format!("failed to read {}", binary_path.display()))?;
    let file = fs::File::create(zip_path)
        .with_context(|| format!("failed to create {}", zip_path.display()))?;
    let mut zip = ZipWriter::new(file);
    let options = FileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .unix_permissions(0o755);
    zip.start_file("bootstrap", options)
        .context("failed to start bootstrap entry in lambda zip")?;
    zip.write_all(&binary)
        .context("failed to write bootstrap entry")?;
    zip.finish().context("failed to finish lambda zip")?;
    Ok(())
}

// ── CI ─────────────────────────────────────────────────────────────

fn ci_check() -> Result<()> {
    step("Check formatting");
    run_cargo(&["fmt", "--all", "--", "--check"])?;

    step("Clippy");
    run_cargo(&[
        "clippy",
        "--all-targets",
        "--all-features",
        "--",
        "-D",
        "warnings",
    ])?;

    step("Test ml_stacks_core");
    run_cargo(&["test", "-p", "ml_stacks_core"])?;

    step("Test ml_stacks_lambda");
    run_cargo(&["test", "-p", LAMBDA_PACKAGE])
}

// ── main ───────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Synth {
            stack,
            out_dir,
            config,
            account,
            region,
        } => synth(&stack, &out_dir, config.as_deref(), account, region),
        Commands::LambdaPackage {
            target,
            profile,
            dist_dir,
        } => package_lambdas(&target, profile, &dist_dir),
        Commands::Ci => {
            ci_check()?;
            eprintln!("\nCI job passed.");
            Ok(())
        }
    }
}
