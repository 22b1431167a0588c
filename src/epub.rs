use std::{
    fs::{self, File},
    io::{BufReader, Read, Seek},
    path::{Path, PathBuf},
};

use log::{debug, info, warn};

use crate::{
    archive::EpubArchive,
    chapter::ChapterBuilder,
    error::EpubError,
    output::{Artifact, assemble_document, assemble_list, is_structured_target, write_artifact},
    types::{ChapterOptions, Chapters, EpubInfo, ManifestItem, NavPoint, TableOfContents},
    utils::{NormalizeWhitespace, XmlElement, XmlReader, file_name, image_relative_path},
};

/// Location of the OCF container document
pub const CONTAINER_PATH: &str = "META-INF/container.xml";

/// Location of the optional document declaring genres
pub const METADATA_PATH: &str = "META-INF/metadata.xml";

/// Marker identifying the NCX navigation document among the archive entries
pub const NAVIGATION_MARKER: &str = ".ncx";

/// Dublin Core elements copied into [EpubInfo]
pub const METADATA_FIELDS: [&str; 6] = [
    "title",
    "language",
    "creator",
    "date",
    "identifier",
    "description",
];

pub const DC_NAMESPACE: &str = "http://purl.org/dc/elements/1.1/";
pub const ATOM_NAMESPACE: &str = "http://www.w3.org/2005/Atom";

/// Image prefix used when neither an override nor an extraction directory is known
pub const DEFAULT_IMAGES_PATH: &str = "images/";

const IMAGES_DIR: &str = "images/";
const PACKAGE_ELEMENT: &str = "package";

/// An extraction session over one EPUB archive
///
/// `EpubExtractor` reads the publication lazily: the package document, the
/// descriptive metadata and the table of contents are parsed on first use and
/// cached for the lifetime of the session. Artifacts (chapters, images, the
/// metadata record) are written below a per-book directory,
/// `<base_path>/<title>/<identifier>`.
///
/// Opening never fails. If the archive cannot be opened the session is still
/// created, but every operation that needs the archive returns `None`. In the
/// same way a malformed part of the publication degrades to an empty value and
/// a logged warning instead of an error, so one broken document never prevents
/// the rest of the book from being extracted.
///
/// ```rust, no_run
/// # use epub_extract::{epub::EpubExtractor, types::ChapterOptions};
/// let mut extractor = EpubExtractor::open("path/to/book.epub").with_base_path("./books");
///
/// if let Some(info) = extractor.get_epub_info() {
///     println!("{} by {}", info.title, info.creator);
/// }
///
/// if let Some(chapters) = extractor.get_chapters(&ChapterOptions::default()) {
///     extractor.write_to_file(&chapters, None);
/// }
/// ```
pub struct EpubExtractor<R: Read + Seek> {
    /// The archive, or `None` when it could not be opened
    archive: Option<EpubArchive<R>>,

    /// Name of the file chapters are written to by default
    output_file: String,

    /// Directory below which per-book directories are created
    base_path: PathBuf,

    /// The parsed package document
    ///
    /// A synthetic empty `package` element is cached when the real one cannot be
    /// located, so the lookup is attempted only once.
    package: Option<XmlElement>,

    /// Metadata record, populated on first access
    info: Option<EpubInfo>,
}

impl EpubExtractor<BufReader<File>> {
    /// Opens the EPUB file at `path`
    ///
    /// A missing or unreadable file is logged; the returned session then reports
    /// `None` from every operation.
    pub fn open<P: AsRef<Path>>(path: P) -> Self {
        let archive = match EpubArchive::open(&path) {
            Ok(archive) => Some(archive),
            Err(err) => {
                warn!(
                    "Unable to open \"{}\" as an EPUB archive: {}",
                    path.as_ref().display(),
                    err
                );
                None
            }
        };

        Self::with_archive(archive)
    }
}

impl<R: Read + Seek> EpubExtractor<R> {
    /// Creates a session over an archive held in any seekable reader
    pub fn from_reader(reader: R) -> Self {
        let archive = match EpubArchive::from_reader(reader) {
            Ok(archive) => Some(archive),
            Err(err) => {
                warn!("Unable to read the EPUB archive: {}", err);
                None
            }
        };

        Self::with_archive(archive)
    }

    fn with_archive(archive: Option<EpubArchive<R>>) -> Self {
        Self {
            archive,
            output_file: String::from("output.html"),
            base_path: PathBuf::from("./"),
            package: None,
            info: None,
        }
    }

    /// Sets the file name chapters are written to, `output.html` by default
    pub fn with_output_file(mut self, output_file: impl Into<String>) -> Self {
        self.output_file = output_file.into();
        self
    }

    /// Sets the directory per-book directories are created in, `./` by default
    pub fn with_base_path(mut self, base_path: impl Into<PathBuf>) -> Self {
        self.base_path = base_path.into();
        self
    }

    /// Whether the archive was opened successfully
    pub fn is_open(&self) -> bool {
        self.archive.is_some()
    }

    pub fn output_file(&self) -> &str {
        &self.output_file
    }

    /// Ends the session and releases the archive
    pub fn close(self) {}

    /// Returns the package document, locating and parsing it on first use
    fn package(&mut self) -> Option<&XmlElement> {
        let archive = self.archive.as_mut()?;

        let package = match self.package.take() {
            Some(package) => package,
            None => Self::locate_package(archive).unwrap_or_else(|err| {
                warn!("Unable to load the package document: {}", err);
                XmlElement::new(PACKAGE_ELEMENT)
            }),
        };

        Some(&*self.package.insert(package))
    }

    /// Finds the package document through `META-INF/container.xml` and parses it
    ///
    /// The first `rootfile` element names the package document. Its location is
    /// handed to the archive so that manifest references can be resolved
    /// relative to it.
    fn locate_package(archive: &mut EpubArchive<R>) -> Result<XmlElement, EpubError> {
        let container = XmlReader::parse_bytes(&archive.read(CONTAINER_PATH)?)?;

        let rootfile = container
            .find_elements_by_name("rootfile")
            .next()
            .ok_or_else(|| EpubError::NonCanonicalFile {
                tag: "rootfile".to_string(),
            })?;

        let full_path =
            rootfile
                .get_attr("full-path")
                .ok_or_else(|| EpubError::MissingRequiredAttribute {
                    tag: "rootfile".to_string(),
                    attribute: "full-path".to_string(),
                })?;

        archive.set_package_path(&full_path);
        XmlReader::parse_bytes(&archive.read(&full_path)?)
    }

    /// Lists the resources declared in the package manifest, in document order
    ///
    /// Items without an `href` are skipped. A missing manifest yields an empty list.
    pub fn manifest(&mut self) -> Vec<ManifestItem> {
        let Some(package) = self.package() else {
            return vec![];
        };

        let Some(manifest) = package.find_children_by_name("manifest").next() else {
            warn!("The package document has no manifest.");
            return vec![];
        };

        manifest
            .find_children_by_name("item")
            .filter_map(|item| {
                Some(ManifestItem {
                    href: item.get_attr("href")?,
                    id: item.get_attr("id"),
                    media_type: item.get_attr("media-type"),
                })
            })
            .collect()
    }

    /// Returns the metadata record of the publication
    ///
    /// On first access the six Dublin Core fields, the genres and the table of
    /// contents are read; later calls return the cached record, including any
    /// artifact paths recorded since.
    ///
    /// ## Return
    /// - `Some(&EpubInfo)`: The record; fields the publication lacks are empty
    /// - `None`: The archive could not be opened
    pub fn get_epub_info(&mut self) -> Option<&EpubInfo> {
        self.archive.as_ref()?;

        if self.info.is_none() {
            let info = self.read_info();
            self.info = Some(info);
        }

        self.info.as_ref()
    }

    /// Returns the table of contents read from the NCX document
    pub fn table_of_contents(&mut self) -> Option<&TableOfContents> {
        self.get_epub_info().map(|info| &info.table_of_contents)
    }

    fn read_info(&mut self) -> EpubInfo {
        let mut info = EpubInfo::default();

        let metadata = self
            .package()
            .and_then(|package| package.find_children_by_name("metadata").next());
        if metadata.is_none() {
            warn!("The package document has no metadata block.");
        }

        for name in METADATA_FIELDS {
            let value = metadata
                .and_then(|metadata| {
                    metadata.children().find(|element| {
                        element.name == name && element.namespace.as_deref() == Some(DC_NAMESPACE)
                    })
                })
                .map(|element| element.own_text().unwrap_or_default().normalize_whitespace());

            let value = value.unwrap_or_else(|| {
                warn!("The package metadata does not declare dc:{}.", name);
                String::new()
            });

            match name {
                "title" => info.title = value,
                "language" => info.language = value,
                "creator" => info.creator = value,
                "date" => info.date = value,
                "identifier" => info.identifier = value,
                _ => info.description = value,
            }
        }

        if let Some(archive) = self.archive.as_mut() {
            info.genres = Self::read_genres(archive);
            info.table_of_contents = Self::read_table_of_contents(archive);
        }

        info
    }

    /// Collects the labels of the Atom categories in `META-INF/metadata.xml`
    fn read_genres(archive: &mut EpubArchive<R>) -> Vec<String> {
        let root = match archive
            .read(METADATA_PATH)
            .and_then(|data| XmlReader::parse_bytes(&data))
        {
            Ok(root) => root,
            Err(EpubError::ResourceNotFound { .. }) => {
                debug!("No {} in the archive, the book has no genres.", METADATA_PATH);
                return vec![];
            }
            Err(err) => {
                warn!("Unable to read genres from {}: {}", METADATA_PATH, err);
                return vec![];
            }
        };

        root.children()
            .filter(|element| {
                element.name == "category" && element.namespace.as_deref() == Some(ATOM_NAMESPACE)
            })
            .filter_map(|element| element.get_attr("label"))
            .collect()
    }

    /// Reads the first archive entry that looks like an NCX document
    fn read_table_of_contents(archive: &mut EpubArchive<R>) -> TableOfContents {
        let Some(path) = archive
            .entries()
            .into_iter()
            .find(|entry| entry.contains(NAVIGATION_MARKER))
        else {
            debug!("No NCX document in the archive, the table of contents is empty.");
            return TableOfContents::default();
        };

        match archive
            .read(&path)
            .and_then(|data| XmlReader::parse_bytes(&data))
        {
            Ok(ncx) => Self::parse_ncx(&ncx),
            Err(err) => {
                warn!("Unable to parse the NCX document \"{}\": {}", path, err);
                TableOfContents::default()
            }
        }
    }

    /// Builds the table of contents from a parsed NCX document
    ///
    /// Every `navPoint`, nested ones included, is visited in document order. A
    /// point lacking its `id`, its label or its target is dropped.
    fn parse_ncx(ncx: &XmlElement) -> TableOfContents {
        let heading = |name: &str| {
            ncx.find_elements_by_name(name)
                .next()
                .and_then(|element| element.find_children_by_name("text").next())
                .map(XmlElement::text)
        };

        let navpoints = ncx
            .find_elements_by_name("navPoint")
            .filter_map(|nav_point| {
                let raw_id = nav_point.get_attr("id")?;
                let label = nav_point
                    .find_children_by_name("navLabel")
                    .next()?
                    .find_children_by_name("text")
                    .next()?
                    .text();
                let target_reference = nav_point
                    .find_children_by_name("content")
                    .next()?
                    .get_attr("src")?;

                Some(NavPoint {
                    raw_id,
                    label,
                    target_reference,
                })
            })
            .collect();

        TableOfContents {
            title: heading("docTitle"),
            author: heading("docAuthor"),
            navpoints,
        }
    }

    /// Returns the directory holding this book's artifacts, creating it on first use
    ///
    /// The directory is `<base_path>/<title>/<identifier>`. Path separators in the
    /// title and identifier are replaced, and empty components are skipped.
    pub fn book_dir(&mut self) -> Option<PathBuf> {
        if let Some(book_dir) = self.info.as_ref().and_then(|info| info.book_dir.clone()) {
            return Some(book_dir);
        }
        self.archive.as_ref()?;

        match self.create_book_dir() {
            Ok(book_dir) => {
                if let Some(info) = self.info.as_mut() {
                    info.book_dir = Some(book_dir.clone());
                }
                Some(book_dir)
            }
            Err(err) => {
                warn!("{}", err);
                None
            }
        }
    }

    fn create_book_dir(&mut self) -> Result<PathBuf, EpubError> {
        let info = self
            .get_epub_info()
            .ok_or_else(|| EpubError::OutputDirUnavailable {
                reason: "the archive is not open".to_string(),
            })?;
        let components = [info.title.clone(), info.identifier.clone()];

        let mut book_dir = self.base_path.clone();
        for component in components.iter().filter_map(|value| path_component(value)) {
            book_dir.push(component);
        }

        fs::create_dir_all(&book_dir).map_err(|err| EpubError::OutputDirUnavailable {
            reason: format!("unable to create \"{}\": {}", book_dir.display(), err),
        })?;

        Ok(book_dir)
    }

    /// Writes every image of the publication into `<book_dir>/images/`
    ///
    /// A manifest item is treated as an image when its reference has an `images`
    /// directory; the part of the reference below that directory is kept. The
    /// first extracted image whose file name contains `cover` and whose media
    /// type is an image type is recorded as the cover. Items that cannot be read
    /// or written are logged and skipped.
    ///
    /// ## Return
    /// - `Some(PathBuf)`: The images directory, also stored as [EpubInfo::images]
    /// - `None`: There is no archive, or no book directory could be created
    pub fn extract_images(&mut self) -> Option<PathBuf> {
        let images_dir = self.book_dir()?.join(IMAGES_DIR);
        if let Err(err) = fs::create_dir_all(&images_dir) {
            warn!(
                "Unable to create the images directory \"{}\": {}",
                images_dir.display(),
                err
            );
            return None;
        }

        let items = self.manifest();
        let archive = self.archive.as_mut()?;
        let mut cover = None;

        for item in &items {
            let Some(relative_path) = image_relative_path(&item.href) else {
                continue;
            };

            let target = images_dir.join(&relative_path);
            let result = archive.read_resolved(&item.href).and_then(|data| {
                if let Some(parent) = target.parent() {
                    fs::create_dir_all(parent)?;
                }
                fs::write(&target, data)?;
                Ok(())
            });

            match result {
                Ok(()) => debug!("Extracted \"{}\" to \"{}\".", item.href, target.display()),
                Err(err) => {
                    warn!("Unable to extract image \"{}\": {}", item.href, err);
                    continue;
                }
            }

            let is_cover = file_name(&item.href)
                .is_some_and(|name| name.to_ascii_lowercase().contains("cover"));
            if cover.is_none() && is_cover && item.may_be_image() {
                cover = Some(target);
            }
        }

        if let Some(info) = self.info.as_mut() {
            info.images = Some(images_dir.clone());
            if cover.is_some() {
                info.cover = cover;
            }
        }

        Some(images_dir)
    }

    /// Builds the chapters of the publication
    ///
    /// Every manifest item whose reference contains `.htm` or `.xml` becomes a
    /// chapter, in manifest order. When `options.extract_images` is set the images
    /// are extracted first, and image references in the chapters point into the
    /// extracted directory unless `options.images_path` overrides it. Without
    /// either, image references point to `images/`.
    ///
    /// ## Return
    /// - `Some(Chapters::Document)`: All chapters inside a single `div`
    /// - `Some(Chapters::List)`: One serialized `section` per chapter, if `options.as_list`
    /// - `None`: The archive could not be opened
    pub fn get_chapters(&mut self, options: &ChapterOptions) -> Option<Chapters> {
        self.archive.as_ref()?;

        let images_dir = if options.extract_images {
            self.extract_images()
        } else {
            self.info.as_ref().and_then(|info| info.images.clone())
        };

        let images_path = match (&options.images_path, images_dir) {
            (Some(images_path), _) => images_path.clone(),
            (None, Some(images_dir)) => images_dir.to_string_lossy().to_string(),
            (None, None) => DEFAULT_IMAGES_PATH.to_string(),
        };

        let builder = ChapterBuilder::new()
            .sanitize(options.sanitize.as_ref())
            .images_path(Some(&images_path));

        let items = self.manifest();
        let archive = self.archive.as_mut()?;
        let mut chapters = Vec::new();

        for (index, item) in items.iter().enumerate() {
            if !item.is_chapter() {
                continue;
            }

            match archive.read_resolved(&item.href) {
                Ok(data) => {
                    debug!("Building chapter {} from \"{}\".", index, item.href);
                    chapters.push(builder.build(&data, &item.href));
                }
                Err(err) => warn!("Skipping chapter \"{}\": {}", item.href, err),
            }
        }

        let result = if options.as_list {
            assemble_list(&chapters).map(Chapters::List)
        } else {
            assemble_document(chapters).map(Chapters::Document)
        };

        result
            .map_err(|err| warn!("Unable to serialize the chapters: {}", err))
            .ok()
    }

    /// Writes an artifact into the book directory
    ///
    /// The file name defaults to the session's output file. Names containing
    /// `.js` receive JSON with sorted keys, anything else the artifact's plain
    /// text. Writing the session's output file records its path as
    /// [EpubInfo::book].
    ///
    /// ## Return
    /// - `Some(PathBuf)`: The path written to
    /// - `None`: There is no archive or book directory, or writing failed
    pub fn write_to_file<A: Artifact + ?Sized>(
        &mut self,
        artifact: &A,
        filename: Option<&str>,
    ) -> Option<PathBuf> {
        self.archive.as_ref()?;

        let filename = filename
            .filter(|name| !name.is_empty())
            .unwrap_or(self.output_file.as_str())
            .to_string();
        let path = self.book_dir()?.join(&filename);

        if let Err(err) = write_artifact(&path, artifact, is_structured_target(&filename)) {
            warn!("Unable to write \"{}\": {}", path.display(), err);
            return None;
        }
        info!("Wrote \"{}\".", path.display());

        if filename == self.output_file {
            if let Some(info) = self.info.as_mut() {
                info.book = Some(path.clone());
            }
        }

        Some(path)
    }
}

/// Turns a metadata value into a single directory name
fn path_component(value: &str) -> Option<String> {
    let component = value.trim().replace(['/', '\\'], "_");
    match component.as_str() {
        "" | "." | ".." => None,
        _ => Some(component),
    }
}

#[cfg(test)]
mod tests {
    use std::{io::Cursor, path::Path};

    use crate::{
        epub::{EpubExtractor, path_component},
        error::EpubError,
        fixtures::{CHAPTER_ONE, COVER_BYTES, CONTAINER, EpubFixture},
        output::render,
        types::{ChapterOptions, Chapters, NavPoint, TableOfContents},
    };

    fn extractor(fixture: EpubFixture, base_path: &Path) -> EpubExtractor<Cursor<Vec<u8>>> {
        EpubExtractor::from_reader(fixture.into_reader()).with_base_path(base_path)
    }

    fn package(metadata: &str, manifest: &str) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<package xmlns="http://www.idpf.org/2007/opf" version="2.0">
  <metadata xmlns:dc="http://purl.org/dc/elements/1.1/">{}</metadata>
  <manifest>{}</manifest>
</package>"#,
            metadata, manifest
        )
    }

    fn ncx(body: &str) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<ncx xmlns="http://www.daisy.org/z3986/2005/ncx/" version="2005-1">{}</ncx>"#,
            body
        )
    }

    #[test]
    fn test_missing_archive() {
        let mut extractor = EpubExtractor::open("./no/such/book.epub");
        assert!(!extractor.is_open());
        assert!(extractor.get_epub_info().is_none());
        assert!(extractor.table_of_contents().is_none());
        assert!(extractor.book_dir().is_none());
        assert!(extractor.extract_images().is_none());
        assert!(extractor.get_chapters(&ChapterOptions::default()).is_none());
        assert!(extractor.write_to_file("text", None).is_none());
        assert!(extractor.manifest().is_empty());
        extractor.close();

        let extractor = EpubExtractor::from_reader(Cursor::new(b"not a zip file".to_vec()));
        assert!(!extractor.is_open());
    }

    #[test]
    fn test_epub_info() {
        let base = tempfile::tempdir().unwrap();
        let mut extractor = extractor(EpubFixture::sample(), base.path());
        let info = extractor.get_epub_info().unwrap();

        assert_eq!(info.title, "Sample Book");
        assert_eq!(info.language, "en");
        assert_eq!(info.creator, "Jane Doe");
        assert_eq!(info.date, "2020-01-01");
        assert_eq!(info.identifier, "book-1234");
        assert_eq!(info.description, "A small sample.");
        assert_eq!(info.genres, vec!["Fantasy", "Adventure"]);
        assert!(info.images.is_none());
        assert!(info.cover.is_none());
        assert!(info.book.is_none());

        let toc = &info.table_of_contents;
        assert_eq!(toc.title.as_deref(), Some("Sample Book"));
        assert_eq!(toc.author.as_deref(), Some("Jane Doe"));
        assert_eq!(
            toc.navpoints,
            vec![NavPoint {
                raw_id: "np1".to_string(),
                label: "Chapter One".to_string(),
                target_reference: "chapter1.xhtml#start".to_string(),
            }]
        );
    }

    #[test]
    fn test_epub_info_missing_fields() {
        let base = tempfile::tempdir().unwrap();
        let fixture = EpubFixture::sample()
            .file(
                "OEBPS/content.opf",
                package("<dc:title>Only a title</dc:title><title>not dc</title>", ""),
            )
            .without("META-INF/metadata.xml");

        let mut extractor = extractor(fixture, base.path());
        let info = extractor.get_epub_info().unwrap().clone();

        assert_eq!(info.title, "Only a title");
        assert_eq!(info.language, "");
        assert_eq!(info.creator, "");
        assert_eq!(info.date, "");
        assert_eq!(info.identifier, "");
        assert_eq!(info.description, "");
        assert!(info.genres.is_empty());

        let json = render(&info, true).unwrap();
        for key in ["title", "language", "creator", "date", "identifier", "description"] {
            assert!(json.contains(&format!("\"{}\": ", key)), "missing {key}");
        }
    }

    #[test]
    fn test_epub_info_is_memoized() {
        let base = tempfile::tempdir().unwrap();
        let mut extractor = extractor(EpubFixture::sample(), base.path());
        let first = extractor.get_epub_info().unwrap().clone();

        // Swapping the archive out shows the record is not read again
        extractor.archive = Some(EpubFixture::new().into_archive());
        let second = extractor.get_epub_info().unwrap().clone();

        assert_eq!(first, second);
    }

    #[test]
    fn test_missing_container() {
        let base = tempfile::tempdir().unwrap();
        let fixture = EpubFixture::sample().without("META-INF/container.xml");
        let mut extractor = extractor(fixture, base.path());

        let info = extractor.get_epub_info().unwrap();
        assert_eq!(info.title, "");
        assert_eq!(info.identifier, "");
        assert_eq!(info.genres, vec!["Fantasy", "Adventure"]);

        assert!(extractor.manifest().is_empty());
        let options = ChapterOptions {
            extract_images: false,
            ..ChapterOptions::default()
        };
        assert_eq!(
            extractor.get_chapters(&options),
            Some(Chapters::Document("<div></div>".to_string()))
        );
    }

    #[test]
    fn test_container_without_full_path() {
        let base = tempfile::tempdir().unwrap();
        let container = CONTAINER.replace("full-path=", "data-path=");
        let fixture = EpubFixture::sample().file("META-INF/container.xml", container);
        let mut extractor = extractor(fixture, base.path());

        assert_eq!(extractor.get_epub_info().unwrap().title, "");
        assert!(extractor.manifest().is_empty());
    }

    #[test]
    fn test_table_of_contents_drops_incomplete_points() {
        let base = tempfile::tempdir().unwrap();
        let toc = ncx(r#"
            <docTitle><text></text></docTitle>
            <navMap>
              <navPoint id="a"><navLabel><text>A</text></navLabel><content src="a.xhtml"/>
                <navPoint id="a1"><navLabel><text>A.1</text></navLabel><content src="a.xhtml#1"/></navPoint>
              </navPoint>
              <navPoint><navLabel><text>No id</text></navLabel><content src="b.xhtml"/></navPoint>
              <navPoint id="c"><navLabel><text>No target</text></navLabel></navPoint>
              <navPoint id="d"><content src="d.xhtml"/></navPoint>
              <navPoint id="e"><navLabel><text>E</text></navLabel><content src="e.xhtml"/></navPoint>
            </navMap>"#);
        let fixture = EpubFixture::sample().file("OEBPS/toc.ncx", toc);
        let mut extractor = extractor(fixture, base.path());

        let toc = extractor.table_of_contents().unwrap();
        assert_eq!(toc.title.as_deref(), Some(""));
        assert_eq!(toc.author, None);

        let ids = toc
            .navpoints
            .iter()
            .map(|point| point.raw_id.as_str())
            .collect::<Vec<_>>();
        assert_eq!(ids, vec!["a", "a1", "e"]);
        assert_eq!(toc.navpoints[1].target_reference, "a.xhtml#1");
    }

    #[test]
    fn test_table_of_contents_absent() {
        let base = tempfile::tempdir().unwrap();
        let fixture = EpubFixture::sample().without("OEBPS/toc.ncx");
        let mut extractor = extractor(fixture, base.path());
        assert_eq!(
            extractor.table_of_contents(),
            Some(&TableOfContents::default())
        );

        let fixture = EpubFixture::sample().file("OEBPS/toc.ncx", "<ncx><navMap>");
        let mut extractor = EpubExtractor::from_reader(fixture.into_reader());
        assert_eq!(
            extractor.table_of_contents(),
            Some(&TableOfContents::default())
        );
    }

    #[test]
    fn test_book_dir() {
        let base = tempfile::tempdir().unwrap();
        let mut extractor = extractor(EpubFixture::sample(), base.path());

        let book_dir = extractor.book_dir().unwrap();
        assert_eq!(book_dir, base.path().join("Sample Book").join("book-1234"));
        assert!(book_dir.is_dir());
        assert_eq!(
            extractor.get_epub_info().unwrap().book_dir.as_ref(),
            Some(&book_dir)
        );
    }

    #[test]
    fn test_book_dir_blocked_by_file() {
        let base = tempfile::tempdir().unwrap();
        std::fs::write(base.path().join("Sample Book"), "occupied").unwrap();
        let mut extractor = extractor(EpubFixture::sample(), base.path());

        assert!(matches!(
            extractor.create_book_dir(),
            Err(EpubError::OutputDirUnavailable { .. })
        ));
        assert!(extractor.book_dir().is_none());
        assert!(extractor.get_epub_info().unwrap().book_dir.is_none());
        assert!(extractor.write_to_file("text", None).is_none());
    }

    #[test]
    fn test_path_component() {
        assert_eq!(path_component(" A/B\\C ").as_deref(), Some("A_B_C"));
        assert_eq!(path_component(""), None);
        assert_eq!(path_component(".."), None);
    }

    #[test]
    fn test_extract_images() {
        let base = tempfile::tempdir().unwrap();
        let mut extractor = extractor(EpubFixture::sample(), base.path());

        let images_dir = extractor.extract_images().unwrap();
        let book_dir = base.path().join("Sample Book").join("book-1234");
        assert_eq!(images_dir, book_dir.join("images/"));
        assert!(images_dir.to_string_lossy().ends_with('/'));

        let cover = images_dir.join("cover.jpg");
        assert_eq!(std::fs::read(&cover).unwrap(), COVER_BYTES);
        assert_eq!(std::fs::read_dir(&images_dir).unwrap().count(), 1);

        let info = extractor.get_epub_info().unwrap();
        assert_eq!(info.images.as_ref(), Some(&images_dir));
        assert_eq!(info.cover.as_ref(), Some(&cover));
    }

    #[test]
    fn test_extract_images_cover_requires_image_type() {
        let base = tempfile::tempdir().unwrap();
        let fixture = EpubFixture::sample()
            .file(
                "OEBPS/content.opf",
                package(
                    "<dc:title>Pictures</dc:title><dc:identifier>p-1</dc:identifier>",
                    r#"<item id="a" href="images/cover-page.xhtml" media-type="application/xhtml+xml"/>
                       <item id="b" href="Images/nested/pic.png" media-type="image/png"/>
                       <item id="c" href="images/missing.png" media-type="image/png"/>"#,
                ),
            )
            .file("OEBPS/images/cover-page.xhtml", CHAPTER_ONE)
            .file("OEBPS/Images/nested/pic.png", b"png");
        let mut extractor = extractor(fixture, base.path());

        let images_dir = extractor.extract_images().unwrap();
        assert!(images_dir.join("nested/pic.png").is_file());
        assert!(images_dir.join("cover-page.xhtml").is_file());
        assert!(!images_dir.join("missing.png").exists());
        assert!(extractor.get_epub_info().unwrap().cover.is_none());
    }

    #[test]
    fn test_get_chapters() {
        let base = tempfile::tempdir().unwrap();
        let mut extractor = extractor(EpubFixture::sample(), base.path());

        let Some(Chapters::Document(document)) = extractor.get_chapters(&ChapterOptions::default())
        else {
            panic!("expected a combined document");
        };

        assert!(document.starts_with(r#"<div><section id="chapter1.xhtml">"#));
        assert!(document.ends_with("</section></div>"));
        assert_eq!(document.matches("<section").count(), 2);
        assert!(document.contains(r#"<section id="text/chapter2.xhtml">"#));
        assert!(document.contains(r##"href="#sec2""##));
        assert!(document.contains(r#"data-pid="2""#));

        let images_dir = extractor.get_epub_info().unwrap().images.clone().unwrap();
        let cover = images_dir.join("cover.jpg");
        assert!(cover.is_file());
        assert_eq!(std::fs::read_dir(&images_dir).unwrap().count(), 1);
        assert!(document.contains(&format!(r#"src="{}""#, cover.display())));
    }

    #[test]
    fn test_get_chapters_as_list() {
        let base = tempfile::tempdir().unwrap();
        let mut extractor = extractor(EpubFixture::sample(), base.path());

        let options = ChapterOptions {
            extract_images: false,
            as_list: true,
            ..ChapterOptions::default()
        };
        let Some(Chapters::List(chapters)) = extractor.get_chapters(&options) else {
            panic!("expected a list of chapters");
        };

        assert_eq!(chapters.len(), 2);
        assert!(chapters[0].starts_with(r#"<section id="chapter1.xhtml">"#));
        assert!(chapters[0].contains(r#"src="images/cover.jpg""#));
        assert!(chapters[1].starts_with(r#"<section id="text/chapter2.xhtml">"#));
        assert!(!base.path().join("Sample Book").exists());

        let options = ChapterOptions {
            images_path: Some("static/img".to_string()),
            ..options
        };
        let Some(Chapters::List(chapters)) = extractor.get_chapters(&options) else {
            panic!("expected a list of chapters");
        };
        assert!(chapters[0].contains(r#"src="static/img/cover.jpg""#));
    }

    #[test]
    fn test_get_chapters_skips_unreadable_items() {
        let base = tempfile::tempdir().unwrap();
        let fixture = EpubFixture::sample().file(
            "OEBPS/content.opf",
            package(
                "<dc:title>Gaps</dc:title>",
                r#"<item id="m" href="missing.xhtml" media-type="application/xhtml+xml"/>
                   <item id="c1" href="chapter1.xhtml" media-type="application/xhtml+xml"/>
                   <item href="../outside.xhtml"/>
                   <item id="no-href"/>"#,
            ),
        );
        let mut extractor = extractor(fixture, base.path());
        assert_eq!(extractor.manifest().len(), 3);

        let options = ChapterOptions {
            extract_images: false,
            as_list: true,
            ..ChapterOptions::default()
        };
        let Some(Chapters::List(chapters)) = extractor.get_chapters(&options) else {
            panic!("expected a list of chapters");
        };
        assert_eq!(chapters.len(), 1);
        assert!(chapters[0].starts_with(r#"<section id="chapter1.xhtml">"#));
    }

    #[test]
    fn test_write_to_file() {
        let base = tempfile::tempdir().unwrap();
        let mut extractor =
            extractor(EpubFixture::sample(), base.path()).with_output_file("book.html");

        let path = extractor.write_to_file("<div></div>", None).unwrap();
        let book_dir = base.path().join("Sample Book").join("book-1234");
        assert_eq!(path, book_dir.join("book.html"));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "<div></div>");

        let list = vec!["<section></section>".to_string()];
        let list_path = extractor
            .write_to_file(&list, Some("chapters_list.json"))
            .unwrap();
        assert_eq!(
            std::fs::read_to_string(&list_path).unwrap(),
            "[\n    \"<section></section>\"\n]"
        );

        let info = extractor.get_epub_info().unwrap().clone();
        assert_eq!(info.book.as_ref(), Some(&path));

        let info_path = extractor
            .write_to_file(&info, Some("epub_info.json"))
            .unwrap();
        let content = std::fs::read_to_string(info_path).unwrap();
        let value: serde_json::Value = serde_json::from_str(&content).unwrap();
        assert_eq!(value["title"], "Sample Book");
        assert_eq!(value["book"].as_str(), path.to_str());
        assert!(content.find("\"book\"").unwrap() < content.find("\"creator\"").unwrap());
        assert!(content.find("\"identifier\"").unwrap() < content.find("\"title\"").unwrap());

        // Writing other files leaves the recorded book untouched
        assert_eq!(
            extractor.get_epub_info().unwrap().book.as_ref(),
            Some(&path)
        );
    }
}
