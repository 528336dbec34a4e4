mod logger;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use pdf_annotate::{
    Annotation, AnnotationKind, AnnotationStore, DEFAULT_BASE_SCALE, FileKey, JsonSidecar,
    Mutation, NormalizedRect, StickyNote,
};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(
    name = "pdfa",
    about = "Annotate PDFs and export them with the annotations baked in",
    version
)]
struct Cli {
    /// Directory holding the annotation sidecar files
    #[arg(long, global = true, default_value = ".pdf-annotations")]
    sidecar_dir: PathBuf,

    /// Increase log verbosity (-v for debug, -vv for trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Highlight regions of a page
    Highlight(MarkupArgs),

    /// Underline regions of a page
    Underline(MarkupArgs),

    /// Toggle the bookmark on a page
    Bookmark {
        /// Input PDF file
        #[arg(short, long)]
        input: PathBuf,

        /// Page number (1-based)
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
        page: u32,
    },

    /// Pin a sticky note to a page
    Note {
        /// Input PDF file
        #[arg(short, long)]
        input: PathBuf,

        /// Page number (1-based)
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
        page: u32,

        /// Horizontal position as a fraction of the page width
        #[arg(long, value_parser = parse_fraction)]
        x: f64,

        /// Vertical position as a fraction of the page height
        #[arg(long, value_parser = parse_fraction)]
        y: f64,

        /// Note text
        #[arg(long)]
        text: String,

        /// Note color (CSS hex or rgb()/rgba())
        #[arg(long)]
        color: Option<String>,
    },

    /// Remove every annotation of one kind
    Clear {
        /// Input PDF file
        #[arg(short, long)]
        input: PathBuf,

        /// Kind of annotation to clear
        #[arg(long, value_enum)]
        kind: KindArg,
    },

    /// Print the stored annotations of a document
    List {
        /// Input PDF file
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Convert sticky notes saved with pixel positions to page fractions
    MigrateNotes {
        /// Input PDF file
        #[arg(short, long)]
        input: PathBuf,

        /// Display scale the pixel positions were taken at
        #[arg(long, default_value_t = DEFAULT_BASE_SCALE)]
        reference_scale: f64,
    },

    /// Export a copy of the document with annotations baked into every page
    Export {
        /// Input PDF file
        #[arg(short, long)]
        input: PathBuf,

        /// Output directory (defaults to the input's directory)
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Export scale on top of the display scale
        #[arg(long)]
        scale: Option<f64>,

        /// Display scale the export is relative to
        #[arg(long, default_value_t = DEFAULT_BASE_SCALE)]
        base_scale: f64,

        /// Page rotation in degrees (multiple of 90)
        #[arg(long, default_value = "0", allow_hyphen_values = true)]
        rotation: i32,

        /// Substitute blank pages for pages that fail to render
        #[arg(long)]
        continue_on_error: bool,

        /// Export options JSON file; flags override its values
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[derive(Args)]
struct MarkupArgs {
    /// Input PDF file
    #[arg(short, long)]
    input: PathBuf,

    /// Page number (1-based)
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    page: u32,

    /// Region as page fractions `x,y,w,h`; repeat for multi-line selections
    #[arg(long = "rect", required = true, value_parser = parse_rect)]
    rects: Vec<NormalizedRect>,

    /// Fill color (CSS hex or rgb()/rgba())
    #[arg(long)]
    color: Option<String>,
}

#[derive(Clone, Copy, ValueEnum)]
enum KindArg {
    Bookmarks,
    Notes,
    Highlights,
    Underlines,
}

fn parse_fraction(value: &str) -> Result<f64, String> {
    let fraction: f64 = value
        .trim()
        .parse()
        .map_err(|_| format!("'{value}' is not a number"))?;
    if (0.0..=1.0).contains(&fraction) {
        Ok(fraction)
    } else {
        Err(format!("{fraction} is outside 0..=1"))
    }
}

fn parse_rect(value: &str) -> Result<NormalizedRect, String> {
    let parts = value
        .split(',')
        .map(parse_fraction)
        .collect::<Result<Vec<_>, _>>()?;
    let &[x, y, w, h] = parts.as_slice() else {
        return Err(format!("expected x,y,w,h but got '{value}'"));
    };
    let rect = NormalizedRect::new(x, y, w, h);
    if !rect.is_within_page() {
        return Err(format!("rect '{value}' extends past the page"));
    }
    Ok(rect)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logger::CliLogger::from_verbosity(cli.verbose)
        .init()
        .context("Failed to install logger")?;

    let store = AnnotationStore::new(JsonSidecar::new(&cli.sidecar_dir));

    match cli.command {
        Commands::Highlight(args) => {
            add_markup(&store, AnnotationKind::Highlight, args).await?;
        }

        Commands::Underline(args) => {
            add_markup(&store, AnnotationKind::Underline, args).await?;
        }

        Commands::Bookmark { input, page } => {
            let key = open(&store, &input).await?;
            let bookmarked = persisted(store.toggle_bookmark(&key, page).await)?;
            if bookmarked {
                println!("Bookmarked page {page}");
            } else {
                println!("Removed bookmark from page {page}");
            }
        }

        Commands::Note {
            input,
            page,
            x,
            y,
            text,
            color,
        } => {
            let key = open(&store, &input).await?;
            let mut note = StickyNote::new(page, x, y, text);
            if let Some(color) = color {
                note = note.with_color(color);
            }
            persisted(store.add_sticky_note(&key, note).await)?;
            println!("Added note to page {page}");
        }

        Commands::Clear { input, kind } => {
            let key = open(&store, &input).await?;
            let (mutation, label) = match kind {
                KindArg::Bookmarks => (
                    store.replace_bookmarks(&key, std::iter::empty()).await,
                    "bookmarks",
                ),
                KindArg::Notes => (
                    store.replace_sticky_notes(&key, Vec::new()).await,
                    "sticky notes",
                ),
                KindArg::Highlights => (
                    store
                        .replace_annotations(&key, AnnotationKind::Highlight, Vec::new())
                        .await,
                    "highlights",
                ),
                KindArg::Underlines => (
                    store
                        .replace_annotations(&key, AnnotationKind::Underline, Vec::new())
                        .await,
                    "underlines",
                ),
            };
            persisted(mutation)?;
            println!("Cleared {label}");
        }

        Commands::List { input } => {
            let key = open(&store, &input).await?;
            print_annotations(&store, &key);
        }

        Commands::MigrateNotes {
            input,
            reference_scale,
        } => {
            let key = open(&store, &input).await?;
            render::migrate_notes(&store, &key, &input, reference_scale).await?;
        }

        Commands::Export {
            input,
            output_dir,
            scale,
            base_scale,
            rotation,
            continue_on_error,
            config,
        } => {
            let key = open(&store, &input).await?;
            let output_dir = match output_dir {
                Some(dir) => dir,
                None => input
                    .parent()
                    .filter(|parent| !parent.as_os_str().is_empty())
                    .map_or_else(|| PathBuf::from("."), Path::to_path_buf),
            };
            render::export(
                &store,
                key,
                &input,
                render::ExportArgs {
                    output_dir,
                    scale,
                    base_scale,
                    rotation,
                    continue_on_error,
                    config,
                },
            )
            .await?;
        }
    }

    Ok(())
}

/// Load the annotations of `input`
async fn open(store: &AnnotationStore<JsonSidecar>, input: &Path) -> Result<FileKey> {
    if !input.is_file() {
        anyhow::bail!("Input file not found: {}", input.display());
    }
    let key = FileKey::from_path(input);
    store.init_for_file(&key).await;
    Ok(key)
}

/// The process exits after each command, so an unsaved change is an error
fn persisted<T>(mutation: Mutation<T>) -> Result<T> {
    mutation
        .persisted
        .context("Failed to save annotations")?;
    Ok(mutation.value)
}

async fn add_markup(
    store: &AnnotationStore<JsonSidecar>,
    kind: AnnotationKind,
    args: MarkupArgs,
) -> Result<()> {
    let key = open(store, &args.input).await?;
    let rect_count = args.rects.len();
    let mut annotation = Annotation::new(kind, args.page, args.rects);
    if let Some(color) = args.color {
        annotation = annotation.with_color(color);
    }
    persisted(store.add_annotation(&key, annotation).await)?;
    println!("Added {kind} ({rect_count} rects) to page {}", args.page);
    Ok(())
}

fn print_annotations(store: &AnnotationStore<JsonSidecar>, key: &FileKey) {
    println!("Annotations for {key}:");

    let bookmarks = store.bookmarks(key);
    if bookmarks.is_empty() {
        println!("  Bookmarks: none");
    } else {
        let pages: Vec<String> = bookmarks.iter().map(u32::to_string).collect();
        println!("  Bookmarks: {}", pages.join(", "));
    }

    let notes = store.sticky_notes(key);
    println!("  Sticky notes: {}", notes.len());
    for note in &notes {
        let legacy = if note.is_legacy_pixel_position() {
            " (pixel position, run migrate-notes)"
        } else {
            ""
        };
        println!(
            "    page {} at ({:.3}, {:.3}){}: {}",
            note.page, note.x, note.y, legacy, note.text
        );
    }

    for kind in [AnnotationKind::Highlight, AnnotationKind::Underline] {
        let annotations = store.annotations(key, kind);
        println!("  {}s: {}", kind, annotations.len());
        for annotation in &annotations {
            println!(
                "    page {}: {} rects, {}",
                annotation.page,
                annotation.rects.len(),
                annotation.color.as_deref().unwrap_or("default color")
            );
        }
    }
}

/// Commands that rasterize pages
#[cfg(feature = "pdfium")]
mod render {
    use anyhow::{Context, Result};
    use pdf_annotate::{
        AnnotationStore, ExportEvent, ExportOptions, ExportPipeline, ExportRequest, FailurePolicy,
        FileKey, JsonSidecar, LopdfAssembler, PageRenderer, PdfiumRenderer, Rotation,
        deliver_to_dir,
    };
    use std::path::{Path, PathBuf};

    pub struct ExportArgs {
        pub output_dir: PathBuf,
        pub scale: Option<f64>,
        pub base_scale: f64,
        pub rotation: i32,
        pub continue_on_error: bool,
        pub config: Option<PathBuf>,
    }

    pub async fn export(
        store: &AnnotationStore<JsonSidecar>,
        key: FileKey,
        input: &Path,
        args: ExportArgs,
    ) -> Result<()> {
        let mut options = match &args.config {
            Some(path) => ExportOptions::load(path)
                .await
                .with_context(|| format!("Failed to load {}", path.display()))?,
            None => ExportOptions::default(),
        };
        if let Some(scale) = args.scale {
            options.export_scale = scale;
        }
        if args.continue_on_error {
            options.failure_policy = FailurePolicy::Continue;
        }

        let renderer = PdfiumRenderer::open(input).await?;
        let file_name = input
            .file_name()
            .map(|name| name.to_string_lossy().into_owned());
        let request = ExportRequest::new(key, file_name)
            .with_base_scale(args.base_scale)
            .with_rotation(Rotation::from_degrees(args.rotation)?);

        let (event_tx, mut event_rx) = tokio::sync::mpsc::unbounded_channel();
        let pipeline = ExportPipeline::new(store, LopdfAssembler, options).with_progress(event_tx);
        let export = async move { pipeline.export(Some(&renderer), &request).await };
        let report = async {
            while let Some(event) = event_rx.recv().await {
                match event {
                    ExportEvent::PageFinished { page, total, .. } => {
                        log::info!("Exported page {}/{}", page, total);
                    }
                    ExportEvent::PageFailed { page, message } => {
                        log::warn!("Page {} replaced with a blank page: {}", page, message);
                    }
                    ExportEvent::PageStarted { .. } | ExportEvent::Finalizing { .. } => {}
                }
            }
        };
        let (result, ()) = tokio::join!(export, report);
        let exported = result?;

        let path = deliver_to_dir(&exported, &args.output_dir).await?;
        println!(
            "Exported {} pages → {}",
            exported.page_count(),
            path.display()
        );
        if !exported.failed_pages.is_empty() {
            println!("  Blank pages substituted for: {:?}", exported.failed_pages);
        }
        Ok(())
    }

    pub async fn migrate_notes(
        store: &AnnotationStore<JsonSidecar>,
        key: &FileKey,
        input: &Path,
        reference_scale: f64,
    ) -> Result<()> {
        let notes = store.sticky_notes(key);
        if !notes.iter().any(|note| note.is_legacy_pixel_position()) {
            println!("No notes need migrating");
            return Ok(());
        }

        let renderer = PdfiumRenderer::open(input).await?;
        let mut migrated = 0;
        let mut converted = Vec::with_capacity(notes.len());
        for note in notes {
            if !note.is_legacy_pixel_position() {
                converted.push(note);
                continue;
            }
            let viewport = renderer
                .viewport(note.page, reference_scale, Rotation::None)
                .with_context(|| format!("Note refers to missing page {}", note.page))?;
            converted.push(note.normalized_from(viewport.width, viewport.height));
            migrated += 1;
        }

        store
            .replace_sticky_notes(key, converted)
            .await
            .persisted
            .context("Failed to save annotations")?;
        println!("Migrated {migrated} notes");
        Ok(())
    }
}

#[cfg(not(feature = "pdfium"))]
mod render {
    use anyhow::{Result, bail};
    use pdf_annotate::{AnnotationStore, FileKey, JsonSidecar};
    use std::path::{Path, PathBuf};

    #[allow(dead_code)]
    pub struct ExportArgs {
        pub output_dir: PathBuf,
        pub scale: Option<f64>,
        pub base_scale: f64,
        pub rotation: i32,
        pub continue_on_error: bool,
        pub config: Option<PathBuf>,
    }

    pub async fn export(
        _store: &AnnotationStore<JsonSidecar>,
        _key: FileKey,
        _input: &Path,
        _args: ExportArgs,
    ) -> Result<()> {
        bail!("pdfa was built without the `pdfium` feature; exporting needs page rendering")
    }

    pub async fn migrate_notes(
        _store: &AnnotationStore<JsonSidecar>,
        _key: &FileKey,
        _input: &Path,
        _reference_scale: f64,
    ) -> Result<()> {
        bail!("pdfa was built without the `pdfium` feature; migrating notes needs page sizes")
    }
}
