use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use eccfs_core::adapter::ReadOnlyAdapter;
use eccfs_core::check::check_tree;
use eccfs_core::config::OverlayConfig;
use eccfs_core::decode::Decoder;
use eccfs_core::encode::{Encoder, EncoderConfig};
use eccfs_core::overlay::{FileKind, OverlayReadEngine};

const CAT_BUF: usize = 64 * 1024;

#[derive(Parser)]
#[command(name = "eccfs", version, about = "Reed-Solomon fragment tools and read-only overlay")]
struct Cli {
    /// More log output on stderr (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
    /// JSON overlay config (import_dir, ecc_dirs, reverify_interval_secs)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Args, Clone, Default)]
struct OverlayArgs {
    /// Writable import directory; shadows the ecc dirs
    #[arg(long)]
    importdir: Option<String>,
    /// Comma-separated ecc directories, searched in order
    #[arg(long)]
    eccdirs: Option<String>,
    /// Seconds a verified chunk is trusted before it is hashed again
    #[arg(long)]
    reverify_secs: Option<u64>,
}

#[derive(Subcommand)]
enum Cmd {
    /// Split a file into n data and m parity fragments <stem>-NNNN.rs
    Encode {
        input: PathBuf,
        #[arg(value_parser = clap::value_parser!(u32).range(1..=31))]
        n: u32,
        #[arg(value_parser = clap::value_parser!(u32).range(0..=31))]
        m: u32,
        stem: PathBuf,
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Reconstruct a file from its fragments (stdout unless --output)
    Decode {
        stem: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Print the decode summary as JSON on stderr
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Verify every fragment across the ecc directories
    Check {
        #[arg(long)]
        eccdirs: Option<String>,
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Attributes of an overlay path
    Stat {
        path: String,
        #[command(flatten)]
        overlay: OverlayArgs,
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Read an overlay path to stdout
    Cat {
        path: String,
        #[command(flatten)]
        overlay: OverlayArgs,
        #[arg(long, default_value_t = 0)]
        offset: u64,
        #[arg(long)]
        length: Option<u64>,
    },
    /// List an overlay directory
    Ls {
        #[arg(default_value = "/")]
        path: String,
        #[command(flatten)]
        overlay: OverlayArgs,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    match cli.cmd {
        Cmd::Encode { input, n, m, stem, json } => encode(&input, n, m, &stem, json)?,
        Cmd::Decode { stem, output, json } => decode(&stem, output.as_deref(), json)?,
        Cmd::Check { eccdirs, json } => check(cli.config.as_deref(), eccdirs, json)?,
        Cmd::Stat { path, overlay, json } => stat(&adapter(cli.config.as_deref(), &overlay)?, &path, json)?,
        Cmd::Cat { path, overlay, offset, length } => {
            cat(&adapter(cli.config.as_deref(), &overlay)?, &path, offset, length)?
        }
        Cmd::Ls { path, overlay } => ls(&adapter(cli.config.as_deref(), &overlay)?, &path)?,
    }
    Ok(())
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(io::stderr).init();
}

fn overlay_config(config: Option<&Path>, args: &OverlayArgs) -> Result<OverlayConfig> {
    let mut cfg = match (config, &args.importdir, &args.eccdirs) {
        (_, Some(import), Some(ecc)) => OverlayConfig::from_options(import, ecc)?,
        (Some(path), _, _) => {
            OverlayConfig::load(path).with_context(|| format!("load config {}", path.display()))?
        }
        _ => bail!("need --importdir and --eccdirs, or --config"),
    };
    if let Some(secs) = args.reverify_secs {
        cfg = cfg.with_reverify_interval(Duration::from_secs(secs));
    }
    Ok(cfg)
}

fn adapter(config: Option<&Path>, args: &OverlayArgs) -> Result<ReadOnlyAdapter> {
    let cfg = overlay_config(config, args)?;
    tracing::debug!(
        import = %cfg.import_dir.display(),
        ecc_dirs = cfg.ecc_dirs.len(),
        reverify_secs = cfg.reverify_interval_secs,
        "overlay configured"
    );
    let engine = OverlayReadEngine::new(cfg)?;
    Ok(ReadOnlyAdapter::new(Arc::new(engine)))
}

fn encode(input: &Path, n: u32, m: u32, stem: &Path, json: bool) -> Result<()> {
    let summary = Encoder::encode(input, stem, &EncoderConfig { n, m })
        .with_context(|| format!("encode {}", input.display()))?;
    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!(
            "{}: {} bytes -> {} fragments of {} bytes (n={}, m={}), file sha1 {}",
            input.display(),
            summary.orig_size,
            summary.fragments.len(),
            summary.blocksize,
            n,
            m,
            summary.file_hash_hex
        );
    }
    Ok(())
}

fn decode(stem: &Path, output: Option<&Path>, json: bool) -> Result<()> {
    let decoded = Decoder::decode(stem).with_context(|| format!("decode {}", stem.display()))?;
    match output {
        Some(p) => {
            let mut w = BufWriter::new(File::create(p).with_context(|| format!("create {}", p.display()))?);
            w.write_all(&decoded.data)?;
            w.flush()?;
        }
        None => {
            let mut out = io::stdout().lock();
            out.write_all(&decoded.data)?;
            out.flush()?;
        }
    }
    if json {
        eprintln!("{}", serde_json::to_string_pretty(&decoded.summary)?);
    }
    Ok(())
}

fn check(config: Option<&Path>, eccdirs: Option<String>, json: bool) -> Result<()> {
    let dirs: Vec<PathBuf> = match (eccdirs, config) {
        (Some(list), _) => list.split(',').filter(|s| !s.is_empty()).map(PathBuf::from).collect(),
        (None, Some(path)) => OverlayConfig::load(path)?.ecc_dirs,
        (None, None) => bail!("need --eccdirs or --config"),
    };
    let report = check_tree(&dirs)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        for p in &report.tree_problems {
            println!("TREE  {p}");
        }
        for f in &report.files {
            if f.ok() {
                println!("OK    {} ({} fragments)", f.path, f.fragments);
            } else {
                println!("BAD   {}: {}", f.path, f.problems.join("; "));
            }
        }
        println!("{} ok, {} bad", report.files_ok, report.files_bad);
    }
    if !report.ok() {
        bail!("check found {} bad files and {} tree problems", report.files_bad, report.tree_problems.len());
    }
    Ok(())
}

fn kind_str(k: FileKind) -> &'static str {
    match k {
        FileKind::File => "file",
        FileKind::Directory => "dir",
        FileKind::Symlink => "symlink",
        FileKind::Other => "other",
    }
}

fn stat(fs: &ReadOnlyAdapter, path: &str, json: bool) -> Result<()> {
    let attr = fs.getattr(path).with_context(|| format!("stat {path}"))?;
    if json {
        println!("{}", serde_json::to_string_pretty(&attr)?);
    } else {
        println!("{path}: {} size={} mode={:o} source={:?}", kind_str(attr.kind), attr.size, attr.mode, attr.source);
    }
    Ok(())
}

fn cat(fs: &ReadOnlyAdapter, path: &str, mut offset: u64, length: Option<u64>) -> Result<()> {
    let mut remaining = length.unwrap_or(u64::MAX);
    let mut buf = vec![0u8; CAT_BUF];
    let mut out = io::stdout().lock();
    while remaining > 0 {
        let want = remaining.min(CAT_BUF as u64) as usize;
        let got = fs.read(path, &mut buf[..want], offset).with_context(|| format!("read {path} at {offset}"))?;
        if got == 0 {
            break;
        }
        out.write_all(&buf[..got])?;
        offset += got as u64;
        remaining -= got as u64;
    }
    out.flush()?;
    Ok(())
}

fn ls(fs: &ReadOnlyAdapter, path: &str) -> Result<()> {
    let mut entries = fs.readdir(path).with_context(|| format!("list {path}"))?;
    entries.sort_by(|a, b| a.name.cmp(&b.name));
    for e in entries {
        println!("{}\t{}", kind_str(e.kind), e.name);
    }
    Ok(())
}
