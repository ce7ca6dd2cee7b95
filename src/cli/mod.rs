use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::Parser;
use tracing::{error, info, warn};

use crate::config::AppConfig;
use crate::error::{ConfigError, SyncError};
use crate::model::field::FieldKind;
use crate::model::locale::{self, Locale};
use crate::services::{
    ai::ClaudeBackend,
    auth::{AuthSession, TokenSigner},
    fingerprint::{FsRecordStore, Selection, TargetFilter},
    pipeline::{self, TranslateRun},
    remote::{HttpTransport, Platform, PushTarget, RemoteSync, StoreClient},
    urls::UrlLocalizer,
};

pub mod command;
pub mod env;

use command::{parse_fields, Phase};

/// Translate App Store metadata with Claude and push it to App Store Connect.
#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct Cli {
    /// Translate stale fields for every present locale
    #[arg(long)]
    pub translate: bool,

    /// Rewrite privacy/terms URLs in translated descriptions
    #[arg(long)]
    pub fix_urls: bool,

    /// Upload translations to App Store Connect
    #[arg(long)]
    pub send: bool,

    /// Retranslate even when the stored translation is fresh
    #[arg(long)]
    pub force: bool,

    /// Limit translation to one locale or one locale file (`de`, `de/promo.txt`)
    #[arg(long, value_name = "LOCALE[/FILE]")]
    pub only: Option<String>,

    /// Fields to process: new, desc, promo, keywords or all
    #[arg(long, num_args = 1.., value_name = "FIELD")]
    pub fields: Vec<String>,

    #[arg(long, value_name = "VERSION")]
    pub ios_version: Option<String>,

    #[arg(long, value_name = "VERSION")]
    pub mac_version: Option<String>,

    /// Environment file to load instead of `./.env`
    #[arg(long, value_name = "PATH")]
    pub env: Option<PathBuf>,

    /// Directory holding one sub-directory per locale
    #[arg(long, default_value = ".")]
    pub root: PathBuf,

    #[arg(short, long)]
    pub verbose: bool,
}

/// Validated invocation: everything that can fail before work starts.
struct Invocation {
    phases: Vec<Phase>,
    fields: Option<Vec<FieldKind>>,
    only: Option<TargetFilter>,
    targets: Vec<PushTarget>,
}

impl Invocation {
    fn new(cli: &Cli, config: &AppConfig) -> Result<Self, ConfigError> {
        let phases = Phase::planned(cli.translate, cli.fix_urls, cli.send);
        if phases.is_empty() {
            return Err(ConfigError::Missing("one of --translate, --fix-urls, --send"));
        }

        let fields = if cli.fields.is_empty() {
            None
        } else {
            Some(parse_fields(&cli.fields)?)
        };
        let only = cli.only.as_deref().map(TargetFilter::parse).transpose()?;

        if phases.contains(&Phase::Translate) {
            config.require_translation()?;
        }

        let mut targets = Vec::new();
        if phases.contains(&Phase::Send) {
            if cli.ios_version.is_none() && cli.mac_version.is_none() {
                return Err(ConfigError::Missing("--ios-version or --mac-version"));
            }
            config.require_upload(cli.ios_version.is_some(), cli.mac_version.is_some())?;

            for (platform, version, app_id) in [
                (Platform::Ios, &cli.ios_version, &config.app_ids.ios),
                (Platform::MacOs, &cli.mac_version, &config.app_ids.mac),
            ] {
                if let Some(v) = version {
                    targets.push(PushTarget {
                        platform,
                        app_id: app_id.clone(),
                        version: v.clone(),
                    });
                }
            }
        }

        Ok(Self {
            phases,
            fields,
            only,
            targets,
        })
    }
}

/// Run the requested phases in order. Summaries go to stdout.
///
/// Returns whether any phase reported a failure. `Err` is reserved for
/// configuration problems, an unreadable source tree, a fatal authorization
/// failure, or an interrupt.
pub fn run(cli: &Cli, config: &AppConfig, cancel: &AtomicBool) -> Result<bool, SyncError> {
    let inv = Invocation::new(cli, config)?;
    let store = FsRecordStore::new(&config.content_root);
    let present = store.present_locales();
    let mut failed = false;

    for phase in &inv.phases {
        if cancel.load(Ordering::SeqCst) {
            break;
        }
        info!(phase = %phase, "starting");

        failed |= match phase {
            Phase::Translate => translate(config, &store, &present, &inv, cli.force, cancel)?,
            Phase::FixUrls => fix_urls(config, &store, &present, cancel)?,
            Phase::Send => send(config, &store, &present, &inv, cancel)?,
        };
    }

    if cancel.load(Ordering::SeqCst) {
        return Err(SyncError::Cancelled);
    }
    Ok(failed)
}

fn translate(
    config: &AppConfig,
    store: &FsRecordStore,
    present: &[&'static Locale],
    inv: &Invocation,
    force: bool,
    cancel: &AtomicBool,
) -> Result<bool, SyncError> {
    let sources = store.load_sources()?;
    if sources.is_empty() {
        error!(root = %store.root().display(), "no English source files found");
        return Ok(true);
    }

    let targets: Vec<&'static Locale> = locale::targets().filter(|l| present.contains(l)).collect();
    if targets.is_empty() {
        warn!("no target locale directories found");
    }

    let backend = ClaudeBackend::new(config.claude.clone(), config.http_timeout)?;
    let ctx = TranslateRun {
        config,
        store,
        backend: &backend,
        locales: &targets,
        sources: &sources,
        cancel,
    };
    let sel = Selection {
        fields: inv.fields.as_deref(),
        force,
        only: inv.only,
    };

    let summary = pipeline::run(&ctx, &sel)?;
    println!("{summary}");
    Ok(summary.has_failures())
}

fn fix_urls(
    config: &AppConfig,
    store: &FsRecordStore,
    present: &[&'static Locale],
    cancel: &AtomicBool,
) -> Result<bool, SyncError> {
    let bases = config.base_urls.configured();
    if bases.is_empty() {
        warn!("BASE_PRIVACY_URL and BASE_TERMS_URL not set, skipping URL fix");
        return Ok(false);
    }

    let urls = UrlLocalizer::new(&bases).map_err(ConfigError::from)?;
    let summary = pipeline::fix_urls(store, &urls, present, cancel);
    println!("{summary}");
    Ok(summary.has_failures())
}

fn send(
    config: &AppConfig,
    store: &FsRecordStore,
    present: &[&'static Locale],
    inv: &Invocation,
    cancel: &AtomicBool,
) -> Result<bool, SyncError> {
    let signer = TokenSigner::from_credentials(&config.store)?;
    let auth = AuthSession::new(signer, config.token);
    let transport = HttpTransport::new(&config.store_api_url, config.http_timeout)?;
    let client = StoreClient::new(&transport, &auth, config.remote_retry);
    let sync = RemoteSync::new(&client, store, cancel);

    let fields = inv.fields.clone().unwrap_or_else(|| FieldKind::ALL.to_vec());
    let mut failed = false;

    for target in &inv.targets {
        if cancel.load(Ordering::SeqCst) {
            break;
        }
        let summary = sync.push(target, present, &fields)?;
        println!("{summary}");
        failed |= summary.has_failures();
    }

    Ok(failed)
}
