use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing::{debug, Level};
use tracing_subscriber::FmtSubscriber;

use rolo::config::{self, Config};
use rolo::device::{DeviceProvider, FileDeviceProvider};
use rolo::feed::{Feed, FeedState, Feeds};
use rolo::model::{ContactRecord, ContactSummary, DeviceContact, DeviceContactDraft, ListedContact};
use rolo::remote::RandomUserClient;
use rolo::service::SyncService;
use rolo::store::ContactStore;

#[derive(Parser, Debug)]
#[command(name = "rolo")]
struct Cli {
    /// Path to an alternate configuration file
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Log service activity to stderr
    #[arg(long, short = 'v', default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch pages of remote profiles into the local cache
    Fetch(FetchArgs),
    List(ListArgs),
    Show(ShowArgs),
    Add(AddArgs),
    /// Update fields of a cached contact; omitted fields keep their stored values
    Edit(EditArgs),
}

#[derive(Args, Debug)]
struct FetchArgs {
    /// Pages to fetch; each page is an independent request of 25 profiles
    #[arg(long, default_value_t = 1)]
    pages: u32,
}

#[derive(Args, Debug)]
struct ListArgs {
    /// Case-insensitive name filter
    filter: Option<String>,

    #[arg(long, value_enum, default_value = "cached")]
    source: Source,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Source {
    Cached,
    Device,
    All,
}

#[derive(Args, Debug)]
struct ShowArgs {
    id: i64,

    #[arg(long, value_enum, default_value = "cached")]
    source: ShowSource,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ShowSource {
    Cached,
    Device,
}

#[derive(Args, Debug)]
struct AddArgs {
    #[arg(long)]
    first: Option<String>,

    #[arg(long)]
    last: Option<String>,

    #[arg(long)]
    email: Option<String>,

    #[arg(long)]
    phone: Option<String>,

    /// Write to the device address book instead of the local cache
    #[arg(long, default_value_t = false)]
    to_device: bool,
}

#[derive(Args, Debug)]
struct EditArgs {
    id: i64,

    #[arg(long)]
    first: Option<String>,

    #[arg(long)]
    last: Option<String>,

    #[arg(long)]
    email: Option<String>,

    #[arg(long)]
    phone: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose)?;

    let config = config::load(cli.config.as_deref())?;
    debug!(path = %config.config_path.display(), "configuration resolved");

    let store = Arc::new(ContactStore::open(&config.db_path)?);
    let service = SyncService::new(store);
    let provider = FileDeviceProvider::open(&config.device.path);
    let feeds = Feeds::new();

    match cli.command {
        Command::Fetch(args) => handle_fetch(args, &config, &service, &feeds).await,
        Command::List(args) => handle_list(args, &service, &provider, &feeds).await,
        Command::Show(args) => handle_show(args, &service, &provider).await,
        Command::Add(args) => handle_add(args, &service, &provider, &feeds).await,
        Command::Edit(args) => handle_edit(args, &service, &feeds).await,
    }
}

fn init_tracing(verbose: bool) -> Result<()> {
    let level = if verbose { Level::DEBUG } else { Level::WARN };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("set tracing subscriber")?;
    Ok(())
}

async fn handle_fetch(
    args: FetchArgs,
    config: &Config,
    service: &SyncService,
    feeds: &Feeds,
) -> Result<()> {
    if args.pages == 0 {
        bail!("--pages must be at least 1");
    }

    let remote = RandomUserClient::new(config.remote.url.clone(), config.remote.timeout)?;

    for page in 1..=args.pages {
        let outcome = feeds
            .cached
            .run(async {
                service.fetch_and_cache(&remote).await?;
                service.search_cached(None)
            })
            .await;
        let summaries = feed_result(outcome, &feeds.cached)?;
        println!(
            "Fetched page {page}; cache holds {} contact(s).",
            summaries.len()
        );
    }

    Ok(())
}

async fn handle_list(
    args: ListArgs,
    service: &SyncService,
    provider: &FileDeviceProvider,
    feeds: &Feeds,
) -> Result<()> {
    let filter = args
        .filter
        .as_deref()
        .map(str::trim)
        .filter(|f| !f.is_empty());

    let rows: Vec<ListedContact> = match args.source {
        Source::Cached => {
            let outcome = feeds.cached.run(async { service.search_cached(filter) }).await;
            feed_result(outcome, &feeds.cached)?
                .into_iter()
                .map(ListedContact::Cached)
                .collect()
        }
        Source::Device => {
            let outcome = feeds.device.run(device_rows(provider, filter)).await;
            feed_result(outcome, &feeds.device)?
                .into_iter()
                .map(ListedContact::Device)
                .collect()
        }
        Source::All => {
            let outcome = feeds.cached.run(async { service.search_cached(filter) }).await;
            let mut rows: Vec<ListedContact> = feed_result(outcome, &feeds.cached)?
                .into_iter()
                .map(ListedContact::Cached)
                .collect();
            let outcome = feeds.device.run(device_rows(provider, filter)).await;
            rows.extend(
                feed_result(outcome, &feeds.device)?
                    .into_iter()
                    .map(ListedContact::Device),
            );
            rows
        }
    };

    if rows.is_empty() {
        match filter {
            Some(filter) => println!("No matches for \"{filter}\""),
            None => println!("No contacts."),
        }
        return Ok(());
    }

    if let Some(filter) = filter {
        println!("Found {} contact(s) matching \"{}\"", rows.len(), filter);
    }

    // Results: id<TAB>name<TAB>phone<TAB>email, tagged by origin in --source all
    let tagged = matches!(args.source, Source::All);
    for row in &rows {
        match row {
            ListedContact::Cached(contact) => {
                print_summary_row(contact, tagged.then_some("cached"));
            }
            ListedContact::Device(contact) => {
                print_device_row(contact, tagged.then_some("device"));
            }
        }
    }

    Ok(())
}

async fn handle_show(
    args: ShowArgs,
    service: &SyncService,
    provider: &FileDeviceProvider,
) -> Result<()> {
    match args.source {
        ShowSource::Cached => match service.contact_by_id(args.id)? {
            Some(record) => print_record(&record),
            None => bail!("no cached contact with id {}", args.id),
        },
        ShowSource::Device => match provider.get(args.id).await? {
            Some(contact) => print_device_contact(&contact),
            None => bail!("no device contact with id {}", args.id),
        },
    }
    Ok(())
}

async fn handle_add(
    args: AddArgs,
    service: &SyncService,
    provider: &FileDeviceProvider,
    feeds: &Feeds,
) -> Result<()> {
    let first = non_empty(args.first);
    let last = non_empty(args.last);
    let email = non_empty(args.email);
    let phone = non_empty(args.phone);

    if first.is_none() && last.is_none() && email.is_none() && phone.is_none() {
        bail!("nothing to add; pass at least one of --first, --last, --email, --phone");
    }

    if args.to_device {
        let draft = DeviceContactDraft {
            first_name: first,
            last_name: last,
            phone,
            email,
        };
        let id = provider.upsert(&draft).await?;
        println!("Saved device contact {id}.");
        return Ok(());
    }

    let record = ContactRecord {
        first_name: first,
        last_name: last,
        email,
        phone,
        ..ContactRecord::default()
    };
    let outcome = feeds.edits.run(async { service.insert_new(&record) }).await;
    let stored = feed_result(outcome, &feeds.edits)?;
    match stored.id {
        Some(id) => println!("Added contact {id}."),
        None => println!("Added contact."),
    }

    Ok(())
}

async fn handle_edit(args: EditArgs, service: &SyncService, feeds: &Feeds) -> Result<()> {
    let partial = ContactRecord {
        id: Some(args.id),
        first_name: non_empty(args.first),
        last_name: non_empty(args.last),
        email: non_empty(args.email),
        phone: non_empty(args.phone),
        ..ContactRecord::default()
    };

    let outcome = feeds.edits.run(async { service.merge_update(&partial) }).await;
    let merged = feed_result(outcome, &feeds.edits)?;
    println!("Updated contact {}.", args.id);
    print_record(&merged);

    Ok(())
}

/// Unwrap a feed outcome, turning the feed's error state into a process failure.
fn feed_result<T: Clone + PartialEq>(outcome: Option<T>, feed: &Feed<T>) -> Result<T> {
    match outcome {
        Some(value) => Ok(value),
        None => match feed.current() {
            FeedState::Error(message) => Err(anyhow!(message)),
            _ => Err(anyhow!("operation did not complete")),
        },
    }
}

/// Full device rows for the listing: resolve each directory entry to its detail.
async fn device_rows(
    provider: &FileDeviceProvider,
    filter: Option<&str>,
) -> rolo::Result<Vec<DeviceContact>> {
    let needle = filter.map(str::to_lowercase);
    let refs = provider.list().await?;
    let mut rows = Vec::with_capacity(refs.len());
    for entry in refs {
        if let Some(needle) = &needle {
            if !entry.display_name.to_lowercase().contains(needle.as_str()) {
                continue;
            }
        }
        if let Some(contact) = provider.get(entry.id).await? {
            rows.push(contact);
        }
    }
    Ok(rows)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn print_summary_row(contact: &ContactSummary, tag: Option<&str>) {
    let name = contact.display_name();
    println!(
        "{}\t{}\t{}\t{}{}",
        contact.id,
        if name.is_empty() { " " } else { name.as_str() },
        contact.phone.as_deref().unwrap_or(" "),
        contact.email.as_deref().unwrap_or(" "),
        tag.map(|t| format!("\t[{t}]")).unwrap_or_default(),
    );
}

fn print_device_row(contact: &DeviceContact, tag: Option<&str>) {
    println!(
        "{}\t{}\t{}\t{}{}",
        contact.id,
        contact.display_name,
        if contact.phone.is_empty() { " " } else { contact.phone.as_str() },
        if contact.email.is_empty() { " " } else { contact.email.as_str() },
        tag.map(|t| format!("\t[{t}]")).unwrap_or_default(),
    );
}

fn print_record(record: &ContactRecord) {
    if let Some(id) = record.id {
        println!("Id: {id}");
    }
    let name = record.display_name();
    if !name.is_empty() {
        match record.name_title.as_deref() {
            Some(title) => println!("Name: {title} {name}"),
            None => println!("Name: {name}"),
        }
    }
    print_field("Gender", record.gender.as_deref());
    print_field("Email", record.email.as_deref());
    print_field("Phone", record.phone.as_deref());
    print_field("Cell", record.cell.as_deref());
    if let (Some(id_name), Some(id_value)) = (
        record.external_id_name.as_deref(),
        record.external_id_value.as_deref(),
    ) {
        println!("{id_name}: {id_value}");
    }
    print_field(
        "Picture",
        record
            .picture_medium
            .as_deref()
            .or(record.picture_large.as_deref()),
    );
    if let (Some(seed), Some(page)) = (record.source_seed.as_deref(), record.source_page) {
        println!("Source: page {page}, seed {seed}");
    }
}

fn print_field(label: &str, value: Option<&str>) {
    if let Some(value) = value {
        println!("{label}: {value}");
    }
}

fn print_device_contact(contact: &DeviceContact) {
    println!("Id: {}", contact.id);
    println!("Name: {}", contact.display_name);
    if !contact.phone.is_empty() {
        println!("Phone: {}", contact.phone);
    }
    if !contact.email.is_empty() {
        println!("Email: {}", contact.email);
    }
}
