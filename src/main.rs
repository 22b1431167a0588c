//! epub-extract - Extract chapters, images and metadata from EPUB files

use std::{fs, path::PathBuf, process::ExitCode};

use clap::Parser;

use epub_extract::{
    epub::EpubExtractor, error::EpubError, sanitize::SanitizeOptions, types::ChapterOptions,
};

#[derive(Parser)]
#[command(name = "epub-extract")]
#[command(version, about = "Extract chapters, images and metadata from EPUB files", long_about = None)]
#[command(after_help = "EXAMPLES:
    epub-extract -i book.epub                      Write chapters, images and epub_info.json
    epub-extract -i book.epub -b out --list        Also write chapters_list.json
    epub-extract -i book.epub --clean-opt style=true --kill-tag aside")]
struct Cli {
    /// Input EPUB file
    #[arg(short, long, value_name = "FILE")]
    input: PathBuf,

    /// Name of the file the combined chapters are written to
    #[arg(short, long, value_name = "NAME", default_value = "output.html")]
    output: String,

    /// Directory in which the book directory is created
    #[arg(short, long, value_name = "DIR", default_value = "./")]
    base_path: PathBuf,

    /// Path image references in the chapters should point to
    #[arg(long, value_name = "PATH")]
    images_path: Option<String>,

    /// Do not extract images
    #[arg(long)]
    no_images: bool,

    /// Sanitize chapter markup with the default options
    #[arg(long)]
    clean: bool,

    /// JSON file with sanitizer options (implies --clean)
    #[arg(long, value_name = "FILE")]
    clean_config: Option<PathBuf>,

    /// Set a sanitizer option, e.g. `style=true` (implies --clean)
    #[arg(long, value_name = "NAME=BOOL")]
    clean_opt: Vec<String>,

    /// Remove an element together with its content (implies --clean)
    #[arg(long, value_name = "TAG")]
    kill_tag: Vec<String>,

    /// Remove an element but keep its content (implies --clean)
    #[arg(long, value_name = "TAG")]
    remove_tag: Vec<String>,

    /// Also write every chapter separately to chapters_list.json
    #[arg(long)]
    list: bool,
}

impl Cli {
    fn sanitize_options(&self) -> Result<Option<SanitizeOptions>, EpubError> {
        let enabled = self.clean
            || self.clean_config.is_some()
            || !self.clean_opt.is_empty()
            || !self.kill_tag.is_empty()
            || !self.remove_tag.is_empty();
        if !enabled {
            return Ok(None);
        }

        let mut options = match &self.clean_config {
            Some(path) => SanitizeOptions::from_json(&fs::read_to_string(path)?)?,
            None => SanitizeOptions::default(),
        };

        for toggle in &self.clean_opt {
            options.apply(toggle)?;
        }
        options.kill_tags.extend(self.kill_tag.iter().cloned());
        options.remove_tags.extend(self.remove_tag.iter().cloned());

        Ok(Some(options))
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<(), String> {
    let sanitize = cli.sanitize_options().map_err(|e| e.to_string())?;

    let mut extractor = EpubExtractor::open(&cli.input)
        .with_output_file(cli.output.as_str())
        .with_base_path(cli.base_path.clone());
    if !extractor.is_open() {
        return Err(format!("unable to open {}", cli.input.display()));
    }

    let options = ChapterOptions {
        extract_images: !cli.no_images,
        images_path: cli.images_path.clone(),
        as_list: false,
        sanitize,
    };

    let chapters = extractor.get_chapters(&options);
    let book = chapters.and_then(|chapters| extractor.write_to_file(&chapters, None));
    print_path("chapters", book);

    let images = extractor.get_epub_info().and_then(|info| info.images.clone());
    print_path("images", images);

    let info = extractor.get_epub_info().cloned();
    let info_path = info.and_then(|info| extractor.write_to_file(&info, Some("epub_info.json")));
    print_path("info", info_path);

    if cli.list {
        let options = ChapterOptions {
            extract_images: false,
            as_list: true,
            ..options
        };
        let chapters = extractor.get_chapters(&options);
        let list = chapters
            .and_then(|chapters| extractor.write_to_file(&chapters, Some("chapters_list.json")));
        print_path("list", list);
    }

    extractor.close();
    Ok(())
}

fn print_path(label: &str, path: Option<PathBuf>) {
    match path {
        Some(path) => println!("{label}: {}", path.display()),
        None => println!("{label}: (none)"),
    }
}
